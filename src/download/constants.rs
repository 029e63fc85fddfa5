//! Fixed values shared by the HTTP downloader and the rate limiter.

use std::time::Duration;

/// TCP/TLS connect timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Per-read timeout in seconds while streaming a body.
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Upper bound applied to server `Retry-After` hints.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Placeholder replaced by the unit's canonical form in URL and file templates.
pub const UNIT_PLACEHOLDER: &str = "{unit}";

/// File name template used when none is configured.
pub const DEFAULT_FILENAME_TEMPLATE: &str = "{unit}.csv";

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("datefetch/", env!("CARGO_PKG_VERSION"));
