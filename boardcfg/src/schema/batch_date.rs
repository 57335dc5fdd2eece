//! Manufacturing batch identifier: month followed by a four-digit year.

use chrono::Datelike;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchDateError {
    #[error("batch date must be 5 or 6 digits (M{{YYYY}} or MM{{YYYY}}), got '{0}'")]
    Format(String),
    #[error("batch month must be between 1 and 12, got {0}")]
    Month(u32),
}

/// Parsed batch date. The original text is kept so `12025` and `012025`
/// are written back exactly as entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDate {
    raw: String,
    month: u32,
    year: u32,
}

impl BatchDate {
    /// Strict parse: surrounding whitespace is a format error, so a stored
    /// batch date always equals its parsed form.
    pub fn parse(raw: &str) -> Result<Self, BatchDateError> {
        if !(raw.len() == 5 || raw.len() == 6) || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BatchDateError::Format(raw.to_string()));
        }
        let (month, year) = raw.split_at(raw.len() - 4);
        let month: u32 = month
            .parse()
            .map_err(|_| BatchDateError::Format(raw.to_string()))?;
        let year: u32 = year
            .parse()
            .map_err(|_| BatchDateError::Format(raw.to_string()))?;
        if !(1..=12).contains(&month) {
            return Err(BatchDateError::Month(month));
        }
        Ok(Self {
            raw: raw.to_string(),
            month,
            year,
        })
    }

    /// Batch date for the current local month, e.g. `32026`.
    pub fn current() -> Self {
        let now = chrono::Local::now();
        let month = now.month();
        let year = now.year().max(0) as u32;
        Self {
            raw: format!("{}{:04}", month, year),
            month,
            year,
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for BatchDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for BatchDate {
    type Err = BatchDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("12025", 1, 2025)]
    #[case("92026", 9, 2026)]
    #[case("122025", 12, 2025)]
    #[case("012025", 1, 2025)]
    fn test_valid_batch_dates(#[case] input: &str, #[case] month: u32, #[case] year: u32) {
        let date = BatchDate::parse(input).unwrap();
        assert_eq!(date.month(), month);
        assert_eq!(date.year(), year);
        assert_eq!(date.as_str(), input);
    }

    #[rstest]
    #[case("2025")]
    #[case("1234567")]
    #[case("1a2025")]
    #[case("")]
    #[case(" 12026 ")]
    #[case("12026\n")]
    fn test_malformed_batch_dates(#[case] input: &str) {
        assert!(matches!(
            BatchDate::parse(input),
            Err(BatchDateError::Format(_))
        ));
    }

    #[rstest]
    #[case("02025", 0)]
    #[case("132025", 13)]
    #[case("992025", 99)]
    fn test_month_out_of_range(#[case] input: &str, #[case] month: u32) {
        assert_eq!(BatchDate::parse(input), Err(BatchDateError::Month(month)));
    }

    #[test]
    fn test_current_is_parseable() {
        let now = BatchDate::current();
        assert_eq!(BatchDate::parse(now.as_str()).unwrap(), now);
    }
}
