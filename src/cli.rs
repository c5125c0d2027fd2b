use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zipdex")]
#[command(version)]
#[command(about = "Indexed ZIP reader/writer with case-insensitive lookup", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipdex list -v data1.zip                   list entries with sizes and dates\n  \
  zipdex extract data1.zip -x joe            extract all files except joe\n  \
  zipdex cat foo.zip README.TXT | more       send one entry to a pager\n  \
  zipdex create out.zip src/*.rs -C src      store files relative to src\n  \
  zipdex list https://example.com/a.zip      list a remote ZIP")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List entries
    List {
        /// ZIP file path or HTTP URL
        #[arg(value_name = "ARCHIVE")]
        archive: String,

        /// Show sizes, ratio and timestamps
        #[arg(short = 'v')]
        verbose: bool,
    },

    /// Extract entries to disk
    Extract(ExtractArgs),

    /// Write entry contents to stdout
    Cat {
        /// ZIP file path or HTTP URL
        #[arg(value_name = "ARCHIVE")]
        archive: String,

        /// Entry names, matched ignoring case
        #[arg(value_name = "NAMES", required = true)]
        names: Vec<String>,
    },

    /// Print the archive comment
    Comment {
        /// ZIP file path or HTTP URL
        #[arg(value_name = "ARCHIVE")]
        archive: String,
    },

    /// Create an archive from files
    Create {
        /// Archive to write
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Files to add, in order
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Store files relative to this directory
        #[arg(short = 'C', value_name = "DIR")]
        base_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Entries to extract (default: all); `*` and `?` are wildcards
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<PathBuf>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,
}

impl Command {
    /// The archive a read command works on.
    pub fn source(&self) -> Option<&str> {
        match self {
            Command::List { archive, .. }
            | Command::Cat { archive, .. }
            | Command::Comment { archive } => Some(archive.as_str()),
            Command::Extract(args) => Some(args.archive.as_str()),
            Command::Create { .. } => None,
        }
    }
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || matches!(self.command, Command::Cat { .. })
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}

pub fn is_http_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
