//! Main entry point for the zipdex CLI application.
//!
//! Lists, extracts and prints entries of ZIP archives on the local
//! filesystem or behind HTTP URLs, and creates new archives from files.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::Write;
use std::path::{Component, Path};

use zipdex::cli::{Command, ExtractArgs, is_http_url};
use zipdex::zip::destination_path;
use zipdex::{Cli, EntryRecord, HttpRangeReader, ReadAt, ZipArchive, ZipCreator};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the appropriate handler
/// based on the subcommand and whether the source is a local file or URL.
fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Create {
        archive,
        files,
        base_dir,
    } = &cli.command
    {
        return create_archive(archive, files, base_dir.as_deref(), &cli);
    }

    let Some(source) = cli.command.source() else {
        bail!("no archive given");
    };

    if is_http_url(source) {
        // Remote ZIP file via HTTP Range requests
        let reader = HttpRangeReader::new(source.to_string())
            .with_context(|| format!("cannot reach {source}"))?;
        let archive = ZipArchive::try_from_reader(reader)
            .with_context(|| format!("cannot open {source}"))?;

        run(&archive, &cli)?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            let transferred = archive.reader().map_or(0, |r| r.transferred_bytes());
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    } else {
        let archive =
            ZipArchive::try_open(source).with_context(|| format!("cannot open {source}"))?;
        run(&archive, &cli)?;
    }

    Ok(())
}

/// Run a read command against an opened archive.
fn run<R: ReadAt>(archive: &ZipArchive<R>, cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::List { verbose, .. } => list_files(archive, *verbose),
        Command::Extract(args) => extract_files(archive, args, cli),
        Command::Cat { names, .. } => cat_files(archive, names),
        Command::Comment { .. } => {
            let comment = archive.comment().context("archive has no comment")?;
            std::io::stdout().write_all(&comment)?;
            println!();
            Ok(())
        }
        Command::Create { .. } => bail!("create does not read an archive"),
    }
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format: just file names, one per line
/// - Verbose format (`-v`): detailed table with size, compression ratio and timestamps
fn list_files<R: ReadAt>(archive: &ZipArchive<R>, verbose: bool) -> Result<()> {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in archive.entries() {
        if !verbose {
            println!("{}", entry.name);
            continue;
        }

        let info = &entry.info;
        let (year, month, day) = info.mod_date();
        let (hour, minute, _second) = info.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            info.uncompressed_size,
            info.compressed_size,
            ratio(info.compressed_size, info.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.name
        );

        if !info.is_directory() {
            total_uncompressed += info.uncompressed_size;
            total_compressed += info.compressed_size;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }

    Ok(())
}

/// Compression ratio as percentage saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!(
            "{:>4}%",
            100i64 - (compressed.saturating_mul(100) / uncompressed) as i64
        )
    } else {
        "  0%".to_string()
    }
}

/// Extract the entries selected by name, pattern and exclusion list.
fn extract_files<R: ReadAt>(
    archive: &ZipArchive<R>,
    args: &ExtractArgs,
    cli: &Cli,
) -> Result<()> {
    let ExtractArgs {
        files,
        extract_dir,
        exclude,
        never_overwrite,
        overwrite,
        junk_paths,
        ..
    } = args;
    let dest_dir = extract_dir.as_deref().unwrap_or(Path::new("."));

    let selected = archive
        .entries()
        .filter(|e| !e.info.is_directory())
        .filter(|e| files.is_empty() || files.iter().any(|f| selects(f, e)))
        .filter(|e| {
            !exclude
                .iter()
                .any(|x| e.name.contains(x.as_str()) || glob_match(x, &e.name))
        });

    for entry in selected {
        if !is_safe_name(&entry.name) {
            if !cli.is_very_quiet() {
                eprintln!("Skipping: {} (unsafe path)", entry.name);
            }
            continue;
        }

        let override_name = junk_paths.then(|| base_name(&entry.name));
        let output_path = destination_path(dest_dir, &entry.name, override_name);

        if output_path.exists() {
            if *never_overwrite {
                if !cli.is_quiet() {
                    eprintln!("Skipping: {} (file exists)", entry.name);
                }
                continue;
            }
            if !*overwrite {
                if !cli.is_quiet() {
                    eprintln!("Skipping: {} (use -o to overwrite)", entry.name);
                }
                continue;
            }
        }

        if !cli.is_quiet() {
            println!("  extracting: {}", entry.name);
        }
        archive
            .extract_to(&entry.name, dest_dir, override_name)
            .with_context(|| format!("cannot extract {}", entry.name))?;
    }

    Ok(())
}

/// Whether a positional FILES argument selects `entry`.
fn selects(pattern: &str, entry: &EntryRecord) -> bool {
    if has_glob_chars(pattern) {
        glob_match(pattern, &entry.name)
    } else {
        // No wildcards: same lookup rules as the library, or a base name match
        zipdex::zip::hash::eq_ignore_case(pattern, &entry.name)
            || zipdex::zip::hash::eq_ignore_case(pattern, base_name(&entry.name))
    }
}

/// Write the named entries to stdout, one after another.
fn cat_files<R: ReadAt>(archive: &ZipArchive<R>, names: &[String]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for name in names {
        let data = archive
            .get_data_by_name(name)
            .with_context(|| format!("cannot read {name}"))?;
        stdout.write_all(&data)?;
    }
    stdout.flush()?;
    Ok(())
}

/// Build a new archive from files on disk.
fn create_archive(
    archive: &Path,
    files: &[std::path::PathBuf],
    base_dir: Option<&Path>,
    cli: &Cli,
) -> Result<()> {
    let mut creator = ZipCreator::new();
    for file in files {
        match base_dir {
            Some(dir) => creator.add_file_from_dir(file, dir),
            None => creator.add_file(file, None),
        }
        .with_context(|| format!("cannot add {}", file.display()))?;
    }

    if !cli.is_quiet() {
        for entry in creator.pending() {
            println!("  adding: {}", entry.name_in_archive);
        }
    }

    creator
        .save_as(archive)
        .with_context(|| format!("cannot write {}", archive.display()))
}

/// Entry names that would escape the destination directory.
fn is_safe_name(name: &str) -> bool {
    let path = Path::new(name);
    !name.starts_with('/')
        && !name.starts_with('\\')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Wildcard match where `*` spans any run of characters and `?` exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    // Last `*` seen and the text position it was tried against
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

/// Human-readable byte count.
fn format_size(size: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if size < 1024 {
        return format!("{size} bytes");
    }
    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
