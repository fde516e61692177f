//! Artifact downloader
//!
//! Streams a remote artifact into a job's scratch directory while hashing it.
//!
//! - Redirects are followed up to the configured limit.
//! - Only responses with status 200, 301 or 302 are accepted. Any other status
//!   is a fetch failure and the destination file is never created.
//! - The body is written chunk by chunk; the SHA-256 digest is updated with
//!   exactly the bytes written, so it equals the digest of the finished file.
//! - The whole transfer runs under the configured deadline.

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// HTTP status codes accepted as a successful fetch
pub const ACCEPTED_STATUS_CODES: [u16; 3] = [200, 301, 302];

/// Fallback file name when the URL has no path segment
const DEFAULT_FILE_NAME: &str = "artifact";

/// A fully written artifact
#[derive(Debug, Clone)]
pub struct Downloaded {
    /// Location of the artifact inside the scratch directory
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
    /// Number of bytes written
    pub size: u64,
}

/// Streams artifacts over HTTP(S)
#[derive(Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    timeout: Duration,
    max_size_bytes: Option<u64>,
}

impl HttpDownloader {
    /// Build a downloader from configuration
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to create HTTP client: {}",
                    e
                )))
            })?;

        Ok(Self {
            client,
            timeout: config.timeout,
            max_size_bytes: config.max_size_bytes,
        })
    }

    /// Download `url` into `dir`, returning the file location and its digest
    ///
    /// The file name comes from the URL's last path segment, so `dir` must be
    /// private to the calling job.
    pub async fn download(&self, url: &str, dir: &Path) -> Result<Downloaded> {
        let file_name = artifact_file_name(url)?;
        let path = dir.join(file_name);

        match tokio::time::timeout(self.timeout, self.fetch_to(url, &path)).await {
            Ok(Ok(downloaded)) => Ok(downloaded),
            Ok(Err(e)) => {
                remove_partial(&path).await;
                Err(e)
            }
            Err(_) => {
                remove_partial(&path).await;
                Err(Error::Download(DownloadError::Timeout {
                    url: url.to_string(),
                    timeout: self.timeout,
                }))
            }
        }
    }

    async fn fetch_to(&self, url: &str, path: &Path) -> Result<Downloaded> {
        let mut response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Download(DownloadError::Timeout {
                    url: url.to_string(),
                    timeout: self.timeout,
                })
            } else {
                Error::Network(e)
            }
        })?;

        let status = response.status().as_u16();
        if !ACCEPTED_STATUS_CODES.contains(&status) {
            tracing::warn!(url, status, "artifact fetch rejected");
            return Err(Error::Download(DownloadError::UnexpectedStatus {
                url: url.to_string(),
                status,
            }));
        }

        if let (Some(limit), Some(length)) = (self.max_size_bytes, response.content_length())
            && length > limit
        {
            return Err(Error::Download(DownloadError::TooLarge {
                url: url.to_string(),
                limit,
            }));
        }

        let mut file = tokio::fs::File::create(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create '{}': {}", path.display(), e),
            ))
        })?;

        let mut hasher = Sha256::new();
        let mut size: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            size += chunk.len() as u64;
            if let Some(limit) = self.max_size_bytes
                && size > limit
            {
                return Err(Error::Download(DownloadError::TooLarge {
                    url: url.to_string(),
                    limit,
                }));
            }
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;

        let sha256 = format!("{:x}", hasher.finalize());
        tracing::debug!(url, size, sha256 = %sha256, path = %path.display(), "artifact downloaded");

        Ok(Downloaded {
            path: path.to_path_buf(),
            sha256,
            size,
        })
    }
}

/// Derive the artifact file name from the last path segment of `url`
///
/// The segment is percent-decoded. A URL without a path segment (e.g.
/// `https://example.com/`) falls back to `artifact`; segments that would
/// escape the scratch directory are rejected.
pub fn artifact_file_name(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;

    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    if segment.is_empty() {
        return Ok(DEFAULT_FILE_NAME.to_string());
    }

    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    if decoded == "."
        || decoded == ".."
        || decoded.contains('/')
        || decoded.contains('\\')
        || decoded.contains('\0')
        || decoded.trim().is_empty()
    {
        return Err(Error::Download(DownloadError::InvalidFileName {
            url: url.to_string(),
        }));
    }

    Ok(decoded)
}

/// Compute the lowercase hex SHA-256 of a file on disk
pub async fn sha256_file(path: &Path) -> Result<String> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove partial artifact");
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
