use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap, RANGE};
use std::cell::Cell;
use std::time::Duration;

use super::ReadAt;
use crate::error::{Result, ZipError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRY: u32 = 10;
const RETRY_STEP: Duration = Duration::from_millis(500);

/// Random access to a remote archive through HTTP Range requests.
///
/// Only the byte ranges the archive reader asks for are fetched, so listing
/// a large remote ZIP costs little more than its central directory.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: Cell<u64>,
    max_retry: u32,
}

impl HttpRangeReader {
    /// Probe `url` with a HEAD request.
    ///
    /// The server must advertise byte ranges and report a Content-Length.
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        let resp = client.head(&url).send()?;
        if !resp.status().is_success() {
            return Err(ZipError::Http(format!("HEAD {url}: {}", resp.status())));
        }

        let size = probe_headers(resp.headers())?;
        log::debug!("{url}: {size} bytes, ranges supported");

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: Cell::new(0),
            max_retry: DEFAULT_MAX_RETRY,
        })
    }

    /// Body bytes received so far.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.get()
    }

    /// GET one range, retrying connection failures and timeouts with a
    /// linear backoff.
    fn fetch(&self, first: u64, last: u64) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let sent = self
                .client
                .get(&self.url)
                .header(RANGE, format!("bytes={first}-{last}"))
                .send();
            match sent {
                Ok(resp) if resp.status() == StatusCode::PARTIAL_CONTENT => return Ok(resp),
                Ok(resp) => {
                    return Err(ZipError::Http(format!(
                        "range {first}-{last}: {}",
                        resp.status()
                    )));
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    attempt += 1;
                    if attempt >= self.max_retry {
                        return Err(ZipError::Http(format!(
                            "range {first}-{last}: giving up after {attempt} attempts: {e}"
                        )));
                    }
                    log::warn!("range {first}-{last}: retry {attempt}/{}: {e}", self.max_retry);
                    std::thread::sleep(RETRY_STEP * attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl ReadAt for HttpRangeReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let Some((first, last)) = clamp_range(offset, buf.len(), self.size) else {
            return Ok(0);
        };

        // One request per call; a short body is a short read
        let body = self.fetch(first, last)?.bytes()?;
        let n = body.len().min(buf.len());
        buf[..n].copy_from_slice(&body[..n]);
        self.transferred_bytes
            .set(self.transferred_bytes.get() + n as u64);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// Content-Length of a HEAD response whose server accepts byte ranges.
fn probe_headers(headers: &HeaderMap) -> Result<u64> {
    let ranges = headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none");
    if !ranges.contains("bytes") {
        return Err(ZipError::Http(
            "server does not support Range requests".to_string(),
        ));
    }

    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| ZipError::Http("server did not report Content-Length".to_string()))
}

/// Inclusive byte range for reading `len` bytes at `offset` from a resource
/// of `size` bytes, or `None` if nothing can be read.
fn clamp_range(offset: u64, len: usize, size: u64) -> Option<(u64, u64)> {
    if len == 0 || offset >= size {
        return None;
    }
    let last = offset.saturating_add(len as u64 - 1).min(size - 1);
    Some((offset, last))
}
