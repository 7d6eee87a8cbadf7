use chrono::NaiveDate;

use crate::error::ConfigError;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Read the calendar date from a line starting `<year> <Mon> <day> ...`.
///
/// Only the year is digit-checked and the month matched against the English
/// abbreviations; anything else about the prefix is taken at face value, so
/// `9999 Jan 1` is a date. A day that does not exist in the given month, or a
/// day token that is not a number, yields `None` like any other undated line.
pub fn extract_date(line: &str) -> Option<NaiveDate> {
    let mut tokens = line.split_whitespace();
    let (year, month, day) = (tokens.next()?, tokens.next()?, tokens.next()?);

    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let month = MONTH_ABBREVIATIONS.iter().position(|m| *m == month)? as u32 + 1;
    let year: i32 = year.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Half-open date range `[start, end)` selecting the log content to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: NaiveDate,
    end: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// The single day before `today`: `[today - 1, today)`.
    pub fn day_before(today: NaiveDate) -> Self {
        Self {
            start: today.pred_opt().unwrap_or(today),
            end: today,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test_case("2024 Jan 15 09:30:12 host [BW-App] x", Some(ymd(2024, 1, 15)) ; "full line")]
    #[test_case("2023 Dec 31", Some(ymd(2023, 12, 31)) ; "exactly three tokens")]
    #[test_case("9999 Jan 1", Some(ymd(9999, 1, 1)) ; "far future year")]
    #[test_case("  2024   Feb   29  rest", Some(ymd(2024, 2, 29)) ; "irregular spacing")]
    #[test_case("2024 Jan", None ; "too few tokens")]
    #[test_case("", None ; "empty")]
    #[test_case("24a Jan 15 x", None ; "year not digits")]
    #[test_case("2024 January 15 x", None ; "month spelled out")]
    #[test_case("2024 jan 15 x", None ; "month lower case")]
    #[test_case("2024 Feb 30 x", None ; "day out of range")]
    #[test_case("2024 Feb xx x", None ; "day not a number")]
    #[test_case("\tat com.example.Foo.bar(Foo.java:42)", None ; "stack frame continuation")]
    fn test_extract_date(line: &str, expected: Option<NaiveDate>) {
        assert_eq!(extract_date(line), expected);
    }

    #[test]
    fn test_extract_date_is_idempotent() {
        let line = "2024 Mar 03 23:59:59 iface node [BW_Thing] A b c: d";
        assert_eq!(extract_date(line), extract_date(line));
        assert_eq!(extract_date(line), Some(ymd(2024, 3, 3)));
    }

    #[test]
    fn test_window_day_before() {
        let w = Window::day_before(ymd(2024, 3, 1));
        assert_eq!(w.start(), ymd(2024, 2, 29));
        assert_eq!(w.end(), ymd(2024, 3, 1));
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        assert!(Window::new(ymd(2024, 1, 16), ymd(2024, 1, 15)).is_err());
        assert!(Window::new(ymd(2024, 1, 15), ymd(2024, 1, 15)).is_ok());
    }
}
