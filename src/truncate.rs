use anyhow::{Context, Result};
use log::debug;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::date::{extract_date, Window};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TruncateStats {
    pub lines_read: usize,
    pub lines_kept: usize,
    /// Scanning ended on the first line dated exactly `window.end()`.
    pub reached_end: bool,
}

/// Copy the lines of `reader` that fall inside `window` to `writer`.
///
/// Undated lines follow the dated line before them, but only once a line
/// dated exactly `window.start()` has been seen. Lines dated after the start
/// are kept even without that anchor. The first line dated exactly
/// `window.end()` stops the scan, so nothing after it is read even if later
/// lines would qualify; input is expected in non-decreasing date order.
pub fn truncate_reader<R: BufRead, W: Write>(
    mut reader: R,
    writer: &mut W,
    window: &Window,
) -> io::Result<TruncateStats> {
    let mut stats = TruncateStats::default();
    let mut in_window = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        stats.lines_read += 1;
        let keep = match extract_date(&String::from_utf8_lossy(&buf)) {
            None => in_window,
            Some(date) if date < window.start() => false,
            Some(date) if date == window.start() => {
                in_window = true;
                true
            }
            Some(date) if date == window.end() => {
                stats.reached_end = true;
                break;
            }
            Some(_) => true,
        };
        if keep {
            writer.write_all(&buf)?;
            stats.lines_kept += 1;
        }
    }
    Ok(stats)
}

/// Rewrite `path` so it only holds the content selected by `window`.
///
/// The result is written to a temporary file in the same directory and then
/// renamed over the original. If anything fails before the rename the
/// original is left untouched.
pub fn truncate_file(path: &Path, window: &Window) -> Result<TruncateStats> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    let stats = {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let stats = truncate_reader(BufReader::new(file), &mut writer, window)
            .with_context(|| format!("Failed to truncate log file: {}", path.display()))?;
        writer.flush()?;
        stats
    };

    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())
            .with_context(|| format!("Failed to copy permissions of {}", path.display()))?;
    }
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {} with truncated content", path.display()))?;

    debug!(
        "Truncated {} to [{}, {}): kept {} of {} lines{}",
        path.display(),
        window.start(),
        window.end(),
        stats.lines_kept,
        stats.lines_read,
        if stats.reached_end { ", stopped at end date" } else { "" }
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window(start: (i32, u32, u32), end: (i32, u32, u32)) -> Window {
        Window::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
        .unwrap()
    }

    fn run(input: &str, window: &Window) -> (String, TruncateStats) {
        let mut out = Vec::new();
        let stats = truncate_reader(input.as_bytes(), &mut out, window).unwrap();
        (String::from_utf8(out).unwrap(), stats)
    }

    #[test]
    fn test_keeps_start_day_and_its_continuations() {
        let input = "\
2024 Jan 14 23:59:00 old line
  old continuation
2024 Jan 15 00:00:01 first kept
  kept continuation
  another kept continuation
2024 Jan 16 00:00:00 end boundary
2024 Jan 16 00:00:01 never scanned
";
        let (out, stats) = run(input, &window((2024, 1, 15), (2024, 1, 16)));
        assert_eq!(
            out,
            "\
2024 Jan 15 00:00:01 first kept
  kept continuation
  another kept continuation
"
        );
        assert_eq!(stats.lines_read, 6);
        assert_eq!(stats.lines_kept, 3);
        assert!(stats.reached_end);
    }

    #[test]
    fn test_continuations_dropped_before_start_anchor() {
        let input = "\
orphan before anything
2024 Jan 14 10:00:00 before window
  continuation of before-window line
2024 Jan 17 10:00:00 after start without anchor
  continuation not kept without anchor
";
        let (out, stats) = run(input, &window((2024, 1, 15), (2024, 1, 20)));
        assert_eq!(out, "2024 Jan 17 10:00:00 after start without anchor\n");
        assert!(!stats.reached_end);
    }

    #[test]
    fn test_dates_past_end_are_kept_when_end_day_is_skipped() {
        let input = "\
2024 Jan 15 10:00:00 start
2024 Jan 18 10:00:00 past end but end day never logged
  trailing continuation
";
        let (out, _) = run(input, &window((2024, 1, 15), (2024, 1, 16)));
        assert_eq!(out, input);
    }

    #[test]
    fn test_end_date_earlier_in_file_hides_later_window_content() {
        let input = "\
2024 Jan 16 10:00:00 end day first
2024 Jan 15 10:00:00 in window but unreachable
";
        let (out, stats) = run(input, &window((2024, 1, 15), (2024, 1, 16)));
        assert_eq!(out, "");
        assert_eq!(stats.lines_read, 1);
    }

    #[test]
    fn test_output_is_subsequence_and_keeps_missing_final_newline() {
        let input = "2024 Jan 15 10:00:00 a\nb\n2024 Jan 15 10:00:01 c";
        let (out, stats) = run(input, &window((2024, 1, 15), (2024, 1, 16)));
        assert_eq!(out, input);
        assert_eq!(stats.lines_kept, 3);
    }

    #[test]
    fn test_non_utf8_bytes_written_back_unchanged() {
        let input: &[u8] = b"2024 Jan 15 10:00:00 caf\xe9\n\xff\xfe continuation\n";
        let mut out = Vec::new();
        truncate_reader(input, &mut out, &window((2024, 1, 15), (2024, 1, 16))).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_truncate_file_replaces_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(
            &path,
            "2024 Jan 14 09:00:00 drop\n2024 Jan 15 09:00:00 keep\n  more\n2024 Jan 16 09:00:00 stop\n",
        )
        .unwrap();

        let stats = truncate_file(&path, &window((2024, 1, 15), (2024, 1, 16))).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "2024 Jan 15 09:00:00 keep\n  more\n");
        assert_eq!(stats.lines_kept, 2);
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_truncate_file_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.log");
        let err = truncate_file(&missing, &window((2024, 1, 15), (2024, 1, 16)));
        assert!(err.is_err());
    }
}
