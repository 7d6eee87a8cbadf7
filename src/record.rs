use anyhow::{Context, Result};
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{ConfigError, LineError};

pub const DEFAULT_MARKER_PATTERN: &str = r"(\[BW[-_]\w+\])";
pub const DEFAULT_EXCLUDED_MARKERS: [&str; 3] = ["[BW-Core]", "[BW_Core]", "[BW_Plugin]"];

/// One event decoded from a marker-bearing log line.
///
/// A line looks like
/// `<y> <Mon> <d> HH:MM:SS <interface...> <host> [BW-Xxx] <code> <job_id> <path>: <message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    log_time: String,
    interface: String,
    message_code: String,
    job_id: String,
    process_path: String,
    message: String,
}

impl Record {
    /// `HH:MM` of the line's timestamp.
    pub fn log_time(&self) -> &str {
        &self.log_time
    }

    /// Everything before the marker except its last two tokens.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn message_code(&self) -> &str {
        &self.message_code
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn process_path(&self) -> &str {
        &self.process_path
    }

    /// Free text after the first colon following the marker, untrimmed.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// What to do with a line that carries a marker but not the expected layout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Log a warning and continue with the next line.
    #[default]
    Skip,
    /// Fail the whole file.
    Abort,
}

/// Marker regex plus the marker values to ignore.
#[derive(Debug, Clone)]
pub struct MarkerPattern {
    regex: Regex,
    exclude: HashSet<String>,
}

impl MarkerPattern {
    /// The marker is capture group 1 when the pattern has one, else the whole match.
    pub fn new<I, S>(pattern: &str, exclude: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::MarkerPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            exclude: exclude.into_iter().map(Into::into).collect(),
        })
    }

    /// The `[BW-xxx]`/`[BW_xxx]` marker with the core and plugin markers excluded.
    pub fn bw_default() -> Result<Self, ConfigError> {
        Self::new(DEFAULT_MARKER_PATTERN, DEFAULT_EXCLUDED_MARKERS)
    }

    pub fn find<'a>(&self, line: &'a str) -> Option<&'a str> {
        let caps = self.regex.captures(line)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }

    pub fn is_excluded(&self, marker: &str) -> bool {
        self.exclude.contains(marker)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    pub lines: usize,
    pub parsed: usize,
    pub excluded: usize,
    pub malformed: usize,
}

/// Whitespace tokens of `s` paired with their byte offsets.
fn tokens_with_offsets(s: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in s.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(from)) => {
                tokens.push((from, &s[from..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(from) = start {
        tokens.push((from, &s[from..]));
    }
    tokens
}

/// Split on whitespace into at most `max` fields; the last keeps its inner spacing.
fn split_fields(s: &str, max: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(max);
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if fields.len() + 1 == max {
            fields.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(i) => {
                fields.push(&rest[..i]);
                rest = rest[i..].trim_start();
            }
            None => {
                fields.push(rest);
                break;
            }
        }
    }
    fields
}

/// Decode `line` around an already located `marker`.
pub fn parse_line(line: &str, marker: &str) -> Result<Record, LineError> {
    let mut sides = line.split(marker);
    let left = sides.next().unwrap_or_default();
    let right = sides.next().unwrap_or_default();

    let tokens = tokens_with_offsets(left);
    if tokens.len() < 4 {
        return Err(LineError::MissingTimestamp { found: tokens.len() });
    }
    let timestamp = tokens[3].1;
    let log_time = timestamp.rsplit_once(':').map_or(timestamp, |(hm, _)| hm);
    let interface = left[..tokens[tokens.len() - 2].0].trim_end();

    let (head, message) = right.split_once(':').ok_or_else(|| LineError::MissingColon {
        marker: marker.to_string(),
    })?;
    let fields = split_fields(head, 3);
    let &[message_code, job_id, process_path] = fields.as_slice() else {
        return Err(LineError::FieldCount {
            marker: marker.to_string(),
            found: fields.len(),
        });
    };

    Ok(Record {
        log_time: log_time.to_string(),
        interface: interface.to_string(),
        message_code: message_code.to_string(),
        job_id: job_id.to_string(),
        process_path: process_path.to_string(),
        message: message.to_string(),
    })
}

/// Scan `reader` for marker lines, appending their records to `records`.
///
/// `source` only names the input in log messages and errors.
pub fn extract_from_reader<R: BufRead>(
    mut reader: R,
    source: &str,
    marker: &MarkerPattern,
    policy: MalformedPolicy,
    records: &mut Vec<Record>,
) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("Failed to read {} after line {}", source, stats.lines))?;
        if n == 0 {
            break;
        }
        stats.lines += 1;
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\n', '\r']);

        let Some(found) = marker.find(line) else {
            continue;
        };
        if marker.is_excluded(found) {
            stats.excluded += 1;
            continue;
        }
        match parse_line(line, found) {
            Ok(record) => {
                stats.parsed += 1;
                records.push(record);
            }
            Err(e) => match policy {
                MalformedPolicy::Skip => {
                    stats.malformed += 1;
                    warn!("Skipping malformed line {}:{}: {}", source, stats.lines, e);
                }
                MalformedPolicy::Abort => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Malformed line {}:{}", source, stats.lines)));
                }
            },
        }
    }
    Ok(stats)
}

/// Read every record from `path`, append them to `records`, and return the
/// whole list stably sorted by job id.
pub fn extract_records(
    path: &Path,
    marker: &MarkerPattern,
    policy: MalformedPolicy,
    mut records: Vec<Record>,
) -> Result<(Vec<Record>, ExtractStats)> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    let source = path.display().to_string();
    let stats = extract_from_reader(BufReader::new(file), &source, marker, policy, &mut records)?;
    sort_by_job_id(&mut records);
    debug!(
        "Extracted from {}: Lines={}, Records={}, Excluded={}, Malformed={}",
        source, stats.lines, stats.parsed, stats.excluded, stats.malformed
    );
    Ok((records, stats))
}

pub fn sort_by_job_id(records: &mut [Record]) {
    records.sort_by(|a, b| a.job_id.cmp(&b.job_id));
}

#[cfg(test)]
pub(crate) fn sample(message_code: &str, job_id: &str, message: &str) -> Record {
    Record {
        log_time: "09:30".to_string(),
        interface: "2024 Jan 15 09:30:12".to_string(),
        message_code: message_code.to_string(),
        job_id: job_id.to_string(),
        process_path: "/path".to_string(),
        message: message.to_string(),
    }
}
