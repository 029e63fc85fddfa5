//! Config file loading for `datefetch` run defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use datefetch_core::Backoff;

/// Directory name under the platform config home.
const CONFIG_DIR_NAME: &str = "datefetch";

/// `key = value` file configuration for run defaults.
///
/// Every field is optional; CLI flags win over file values, file values win
/// over built-in defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    /// Directory artifacts (and by default the progress file) go to.
    pub output_dir: Option<PathBuf>,
    /// Progress file location.
    pub state_file: Option<PathBuf>,
    /// URL template with a `{unit}` placeholder.
    pub url_template: Option<String>,
    /// Artifact file name template.
    pub filename_template: Option<String>,
    /// Rate limiter budget (1..=1000).
    pub requests_per_minute: Option<u32>,
    /// Attempt budget per unit (1..=10).
    pub max_retries: Option<u32>,
    /// Base delay between attempts in seconds (0..=3600).
    pub retry_delay_secs: Option<u64>,
    /// Delay growth between attempts.
    pub backoff: Option<Backoff>,
    /// Per-attempt time budget in seconds (1..=3600).
    pub download_timeout_secs: Option<u64>,
    /// Units in flight (1..=100).
    pub concurrency: Option<u8>,
    /// Whether artifacts are validated.
    pub validate: Option<bool>,
    /// Minimum accepted artifact size in bytes.
    pub min_file_size: Option<u64>,
    /// Require artifacts to parse as a delimited table.
    pub tabular: Option<bool>,
    /// Header columns every table must contain.
    pub require_columns: Option<Vec<String>>,
    /// Minimum data rows below the header.
    pub min_rows: Option<usize>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against the same ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        validate_range("requests_per_minute", self.requests_per_minute.map(u64::from), 1, 1000)?;
        validate_range("max_retries", self.max_retries.map(u64::from), 1, 10)?;
        validate_range("retry_delay_secs", self.retry_delay_secs, 0, 3600)?;
        validate_range("download_timeout_secs", self.download_timeout_secs, 1, 3600)?;
        validate_range("concurrency", self.concurrency.map(u64::from), 1, 100)?;

        if let Some(template) = &self.url_template
            && !template.contains(datefetch_core::download::UNIT_PLACEHOLDER)
        {
            bail!("Invalid config value for `url_template`: '{template}' has no {{unit}} placeholder");
        }
        Ok(())
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// `verbosity` values accepted in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl FromStr for VerbositySetting {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "default" => Self::Default,
            "verbose" => Self::Verbose,
            "quiet" => Self::Quiet,
            "debug" => Self::Debug,
            other => bail!("'{other}' is not one of default, verbose, quiet, debug"),
        })
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Path that was consulted, if any could be resolved.
    pub path: Option<PathBuf>,
    /// Parsed values; default when no file was found.
    pub config: FileConfig,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/datefetch/config.toml`
/// 2. `$HOME/.config/datefetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads `explicit` when given (it must exist), otherwise the default path
/// if present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref().filter(|candidate| candidate.exists()) else {
        return Ok(LoadedConfig {
            path,
            ..LoadedConfig::default()
        });
    };

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config,
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_no, raw_line) in (1..).zip(raw.lines()) {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() || line.starts_with('[') {
            continue;
        }

        let Some((key, value)) = line.split_once('=').map(|(k, v)| (k.trim(), v.trim())) else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };
        let context = || format!("Invalid `{key}` value on line {line_no}");
        let text = || unquote(value).with_context(context);

        match key {
            "output_dir" => cfg.output_dir = Some(PathBuf::from(text()?)),
            "state_file" => cfg.state_file = Some(PathBuf::from(text()?)),
            "url_template" => cfg.url_template = Some(text()?),
            "filename_template" => cfg.filename_template = Some(text()?),
            "requests_per_minute" => {
                cfg.requests_per_minute = Some(parse_unsigned(value).with_context(context)?);
            }
            "max_retries" => cfg.max_retries = Some(parse_unsigned(value).with_context(context)?),
            "retry_delay_secs" => {
                cfg.retry_delay_secs = Some(parse_unsigned(value).with_context(context)?);
            }
            "backoff" => {
                let backoff = text()?
                    .parse::<Backoff>()
                    .map_err(anyhow::Error::msg)
                    .with_context(context)?;
                cfg.backoff = Some(backoff);
            }
            "download_timeout_secs" => {
                cfg.download_timeout_secs = Some(parse_unsigned(value).with_context(context)?);
            }
            "concurrency" => cfg.concurrency = Some(parse_unsigned(value).with_context(context)?),
            "validate" => cfg.validate = Some(parse_bool(value).with_context(context)?),
            "min_file_size" => {
                cfg.min_file_size = Some(parse_unsigned(value).with_context(context)?);
            }
            "tabular" => cfg.tabular = Some(parse_bool(value).with_context(context)?),
            "require_columns" => {
                let columns = text()?
                    .split(',')
                    .map(str::trim)
                    .filter(|column| !column.is_empty())
                    .map(str::to_string)
                    .collect();
                cfg.require_columns = Some(columns);
            }
            "min_rows" => cfg.min_rows = Some(parse_unsigned(value).with_context(context)?),
            "verbosity" => cfg.verbosity = Some(text()?.parse().with_context(context)?),
            unknown => bail!("Unknown configuration key: '{unknown}' on line {line_no}"),
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Cuts a trailing `# comment`, ignoring `#` inside double quotes.
fn strip_inline_comment(line: &str) -> &str {
    let mut quotes = 0usize;
    let cut = line.char_indices().find(|&(_, ch)| {
        if ch == '"' {
            quotes += 1;
        }
        ch == '#' && quotes % 2 == 0
    });
    cut.map_or(line, |(index, _)| &line[..index])
}

fn unquote(raw: &str) -> Result<String> {
    raw.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Expected a double-quoted string, got {raw}"))
}

fn parse_unsigned<T: TryFrom<u64>>(raw: &str) -> Result<T> {
    let value: u64 = raw
        .parse()
        .with_context(|| format!("Expected a non-negative integer, got '{raw}'"))?;
    T::try_from(value).map_err(|_| anyhow::anyhow!("{value} is too large"))
}

fn parse_bool(raw: &str) -> Result<bool> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("Expected true or false, got '{raw}'"))
}
