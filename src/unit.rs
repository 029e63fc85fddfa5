//! Work units: the ordered identifiers a batch run iterates over.
//!
//! The orchestrator never looks inside a unit. It needs a total order, a
//! canonical string form (used as the progress-file key) and a way to step
//! to the next unit so it can expand an inclusive `start..=end` range.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

/// A schedulable item in a batch run.
///
/// `Display` must produce the canonical key written to the progress file and
/// `FromStr` must accept it back.
pub trait WorkUnit: Ord + Clone + fmt::Display + FromStr + Send + Sync + 'static {
    /// Returns the unit that immediately follows this one, if any.
    fn successor(&self) -> Option<Self>;
}

impl WorkUnit for NaiveDate {
    fn successor(&self) -> Option<Self> {
        self.succ_opt()
    }
}

impl WorkUnit for u32 {
    fn successor(&self) -> Option<Self> {
        self.checked_add(1)
    }
}

/// Range bounds were given in the wrong order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid range: start {start} is after end {end}\n  Suggestion: swap the bounds or check the dates")]
pub struct RangeError {
    /// Canonical form of the start bound.
    pub start: String,
    /// Canonical form of the end bound.
    pub end: String,
}

/// Expands an inclusive range into its ascending sequence of units.
///
/// # Errors
///
/// Returns [`RangeError`] when `start > end`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use datefetch_core::units_between;
///
/// let start = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let days: Vec<String> = units_between(&start, &end)
///     .unwrap()
///     .iter()
///     .map(ToString::to_string)
///     .collect();
/// assert_eq!(days, ["2024-02-28", "2024-02-29", "2024-03-01"]);
/// ```
pub fn units_between<U: WorkUnit>(start: &U, end: &U) -> Result<Vec<U>, RangeError> {
    if start > end {
        return Err(RangeError {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    let mut units = vec![start.clone()];
    let mut current = start.clone();
    while current < *end {
        match current.successor() {
            Some(next) => {
                units.push(next.clone());
                current = next;
            }
            None => break,
        }
    }
    Ok(units)
}
