//! HTTP downloader for sources that expose one file per unit at a templated URL.
//!
//! `{unit}` in the URL and file name templates is replaced by the unit's
//! canonical form (`2024-01-31` for dates). The response body is streamed to
//! a `.part` file next to the target and renamed into place only after the
//! last byte is flushed, so a failed attempt never leaves an artifact that
//! looks complete.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_FILENAME_TEMPLATE, READ_TIMEOUT_SECS, UNIT_PLACEHOLDER,
    USER_AGENT,
};
use super::error::DownloadError;
use super::rate_limiter::parse_retry_after;
use super::Downloader;
use crate::unit::WorkUnit;

/// Downloads `url_template` with `{unit}` substituted into `output_dir`.
///
/// The client is built once and reused, so connections are pooled across
/// units.
///
/// # Example
///
/// ```no_run
/// use chrono::NaiveDate;
/// use datefetch_core::download::{Downloader, HttpDownloader};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let downloader = HttpDownloader::new("https://data.example.com/daily/{unit}.csv", "./data")?;
/// let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let path = downloader.download(&day).await?;
/// println!("saved {}", path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    url_template: String,
    filename_template: String,
    output_dir: PathBuf,
}

impl HttpDownloader {
    /// Creates a downloader with default timeouts: 30s to connect, 5min of
    /// socket silence per read. Total transfer time is not capped here; the
    /// orchestrator's per-attempt timeout bounds it.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Fatal`] when the template lacks `{unit}`,
    /// does not expand to a valid URL, or the HTTP client cannot be built.
    pub fn new(
        url_template: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, DownloadError> {
        Self::with_timeouts(
            url_template,
            output_dir,
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(READ_TIMEOUT_SECS),
        )
    }

    /// Creates a downloader with explicit connect and read timeouts.
    ///
    /// # Errors
    ///
    /// Same conditions as [`HttpDownloader::new`].
    #[instrument(level = "debug", skip_all)]
    pub fn with_timeouts(
        url_template: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let url_template = url_template.into();
        if !url_template.contains(UNIT_PLACEHOLDER) {
            return Err(DownloadError::fatal(format!(
                "URL template '{url_template}' has no {UNIT_PLACEHOLDER} placeholder"
            )));
        }
        let probe = url_template.replace(UNIT_PLACEHOLDER, "probe");
        Url::parse(&probe).map_err(|e| {
            DownloadError::fatal(format!("URL template '{url_template}' is not a valid URL: {e}"))
        })?;

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DownloadError::fatal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url_template,
            filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
            output_dir: output_dir.into(),
        })
    }

    /// Overrides the `{unit}.csv` file name template.
    #[must_use]
    pub fn with_filename_template(mut self, template: impl Into<String>) -> Self {
        self.filename_template = template.into();
        self
    }

    /// Returns the directory artifacts are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Expands the URL template for one unit.
    #[must_use]
    pub fn url_for(&self, unit: &str) -> String {
        self.url_template.replace(UNIT_PLACEHOLDER, unit)
    }

    /// Expands the file name template for one unit.
    ///
    /// Path separators in the unit are replaced so the artifact always lands
    /// directly inside the output directory.
    #[must_use]
    pub fn filename_for(&self, unit: &str) -> String {
        let safe_unit = unit.replace(['/', '\\'], "_");
        self.filename_template.replace(UNIT_PLACEHOLDER, &safe_unit)
    }

    /// Fetches one unit and returns the path of the stored artifact.
    ///
    /// # Errors
    ///
    /// Returns a classified [`DownloadError`]; see [`classify_status`] for
    /// the HTTP status mapping.
    #[instrument(skip(self), fields(url))]
    pub async fn fetch(&self, unit: &str) -> Result<PathBuf, DownloadError> {
        let url = self.url_for(unit);
        tracing::Span::current().record("url", url.as_str());
        debug!("starting download");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_request_error(&url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(classify_status(&url, status.as_u16(), retry_after.as_deref()));
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                DownloadError::fatal(format!(
                    "cannot create output directory {}: {e}",
                    self.output_dir.display()
                ))
            })?;

        let final_path = self.output_dir.join(self.filename_for(unit));
        let partial_path = partial_path_for(&final_path);

        let mut file = File::create(&partial_path).await.map_err(|e| {
            DownloadError::permanent(format!("cannot create {}: {e}", partial_path.display()))
        })?;

        let stream_result = stream_to_file(&mut file, response, &url, &partial_path).await;
        drop(file);
        let bytes_written = match stream_result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %partial_path.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&partial_path).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&partial_path, &final_path).await {
            let _ = tokio::fs::remove_file(&partial_path).await;
            return Err(DownloadError::permanent(format!(
                "cannot move download into {}: {e}",
                final_path.display()
            )));
        }

        info!(path = %final_path.display(), bytes = bytes_written, "download complete");
        Ok(final_path)
    }
}

#[async_trait]
impl<U: WorkUnit> Downloader<U> for HttpDownloader {
    async fn download(&self, unit: &U) -> Result<PathBuf, DownloadError> {
        self.fetch(&unit.to_string()).await
    }
}

fn partial_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| classify_request_error(url, &e))?;

        writer.write_all(&chunk).await.map_err(|e| {
            DownloadError::permanent(format!("write to {} failed: {e}", file_path.display()))
        })?;

        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| {
        DownloadError::permanent(format!("flush of {} failed: {e}", file_path.display()))
    })?;

    Ok(bytes_written)
}

/// Classifies a non-success HTTP status.
///
/// | Status | Class | Rationale |
/// |--------|-------|-----------|
/// | 401, 403, 407 | Fatal | credentials are wrong for every unit |
/// | 408 | Transient | request timeout |
/// | 429 | RateLimited | penalize the limiter, honor `Retry-After` |
/// | 5xx | Transient | server may recover; `Retry-After` honored when present |
/// | other 4xx | Permanent | no data for this unit |
/// | anything else | Permanent | unexpected |
#[must_use]
#[allow(clippy::match_same_arms)]
pub fn classify_status(url: &str, status: u16, retry_after: Option<&str>) -> DownloadError {
    let hint = retry_after.and_then(parse_retry_after);
    let message = format!("HTTP {status} from {url}");
    match status {
        401 | 403 | 407 => DownloadError::auth_required(url, status),
        408 => DownloadError::transient(message),
        429 => DownloadError::rate_limited(message, hint),
        500..=599 => DownloadError::transient_with_retry_after(message, hint),
        400..=499 => DownloadError::permanent(message),
        _ => DownloadError::permanent(message),
    }
}

/// Classifies a transport-level reqwest error.
fn classify_request_error(url: &str, error: &reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::transient(format!("timeout downloading {url}"))
    } else if error.is_builder() || is_tls_error(error) {
        DownloadError::fatal(format!("cannot request {url}: {error}"))
    } else {
        DownloadError::transient(format!("network error downloading {url}: {error}"))
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}
