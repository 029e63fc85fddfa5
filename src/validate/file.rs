//! File-level artifact checks: size floor and optional CSV shape.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{ValidationError, Validator};

/// Default minimum artifact size in bytes.
pub const DEFAULT_MIN_FILE_SIZE: u64 = 100;

/// Data rows required when a table check is enabled without an explicit count.
pub const DEFAULT_MIN_ROWS: usize = 1;

/// Delimiters tried, in order, when sniffing a CSV header.
const DELIMITERS: [u8; 2] = [b',', b';'];

/// Shape requirements for CSV artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRules {
    /// Column names that must appear in the header.
    pub required_columns: Vec<String>,
    /// Minimum number of data rows below the header.
    pub min_rows: usize,
}

/// Checks that an artifact exists, is large enough and, when [`CsvRules`]
/// are set, parses as a `,` or `;` delimited table with the required shape.
///
/// `CsvRules::default()` only demands a table: more than one header column,
/// any number of rows. Header bytes that are not valid UTF-8 are replaced
/// rather than rejected; sources publishing Latin-1 files still pass.
#[derive(Debug, Clone)]
pub struct FileValidator {
    min_file_size: u64,
    csv: Option<CsvRules>,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_FILE_SIZE)
    }
}

impl FileValidator {
    /// Creates a size-only validator.
    #[must_use]
    pub fn new(min_file_size: u64) -> Self {
        Self {
            min_file_size,
            csv: None,
        }
    }

    /// Adds CSV shape checks.
    #[must_use]
    pub fn with_csv_rules(mut self, rules: CsvRules) -> Self {
        self.csv = Some(rules);
        self
    }

    /// Returns the configured size floor.
    #[must_use]
    pub fn min_file_size(&self) -> u64 {
        self.min_file_size
    }
}

#[async_trait]
impl Validator for FileValidator {
    #[instrument(skip(self), fields(path = %artifact.display()))]
    async fn validate(&self, artifact: &Path) -> Result<(), ValidationError> {
        let metadata = match tokio::fs::metadata(artifact).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ValidationError::Missing {
                    path: artifact.to_path_buf(),
                });
            }
            Err(e) => return Err(ValidationError::io(artifact, e)),
        };

        let size = metadata.len();
        if size < self.min_file_size {
            return Err(ValidationError::TooSmall {
                path: artifact.to_path_buf(),
                size,
                min: self.min_file_size,
            });
        }

        let Some(rules) = &self.csv else {
            debug!(size, "artifact passed size check");
            return Ok(());
        };

        let bytes = tokio::fs::read(artifact)
            .await
            .map_err(|e| ValidationError::io(artifact, e))?;
        check_csv(artifact, &bytes, rules)
    }
}

/// Validates CSV bytes against `rules`.
fn check_csv(path: &Path, bytes: &[u8], rules: &CsvRules) -> Result<(), ValidationError> {
    let Some((delimiter, columns)) = sniff_header(bytes) else {
        return Err(ValidationError::NotTabular {
            path: path.to_path_buf(),
        });
    };

    let missing: Vec<String> = rules
        .required_columns
        .iter()
        .filter(|required| !columns.iter().any(|column| column == *required))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }

    let mut rows = 0usize;
    for record in table_reader(bytes, delimiter).byte_records() {
        let record = record.map_err(|e| ValidationError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if record.iter().any(|field| !field.is_empty()) {
            rows += 1;
        }
    }
    if rows < rules.min_rows {
        return Err(ValidationError::TooFewRows {
            path: path.to_path_buf(),
            rows,
            min: rules.min_rows,
        });
    }

    debug!(delimiter = %char::from(delimiter), columns = columns.len(), rows, "artifact passed CSV checks");
    Ok(())
}

fn table_reader(bytes: &[u8], delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes)
}

/// Picks the first delimiter whose header parses into more than one column.
fn sniff_header(bytes: &[u8]) -> Option<(u8, Vec<String>)> {
    DELIMITERS.into_iter().find_map(|delimiter| {
        let mut reader = table_reader(bytes, delimiter);
        let header = reader.byte_headers().ok()?;
        (header.len() > 1).then(|| (delimiter, header.iter().map(clean_cell).collect()))
    })
}

fn clean_cell(cell: &[u8]) -> String {
    String::from_utf8_lossy(cell)
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}
