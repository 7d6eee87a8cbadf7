use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::classify::{get_category, get_identity, get_status};
use crate::correlate::{correlate, Run};
use crate::date::Window;
use crate::record::{extract_records, sort_by_job_id, MalformedPolicy, MarkerPattern, Record};
use crate::report::{ReportRow, ReportSink};
use crate::truncate::truncate_file;

/// Only records whose message code contains this are reported.
pub const ENTRY_MARKER: &str = "Entry";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub window: Window,
    /// Written in the first column of every row, regardless of the record's own date.
    pub report_date: NaiveDate,
    pub marker: MarkerPattern,
    pub on_malformed: MalformedPolicy,
    /// Rewrite each log to `window` before extracting.
    pub truncate: bool,
}

impl PipelineOptions {
    /// The daily run: yesterday's content, reported as yesterday.
    pub fn daily(today: NaiveDate, marker: MarkerPattern) -> Self {
        let window = Window::day_before(today);
        Self {
            window,
            report_date: window.start(),
            marker,
            on_malformed: MalformedPolicy::default(),
            truncate: true,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub files: Vec<PathBuf>,
    pub lines_kept: usize,
    pub records: usize,
    pub malformed: usize,
    pub runs: usize,
    pub rows: usize,
}

/// Rows for every `Entry` record of every run, each carrying its run's status.
pub fn report_rows(runs: &[Run], report_date: NaiveDate) -> Vec<ReportRow> {
    let mut rows = Vec::new();
    for run in runs {
        let status = get_status(run);
        for record in run.records().iter().filter(|r| r.message_code().contains(ENTRY_MARKER)) {
            rows.push(ReportRow {
                report_date,
                interface: record.interface().to_string(),
                category: get_category(record).map(str::to_string),
                identity: get_identity(record).map(str::to_string),
                status,
                log_time: record.log_time().to_string(),
                job_id: record.job_id().to_string(),
            });
        }
    }
    rows
}

fn emit<S: ReportSink + ?Sized>(
    runs: &[Run],
    report_date: NaiveDate,
    sink: &mut S,
) -> Result<usize> {
    let rows = report_rows(runs, report_date);
    for row in &rows {
        sink.write_row(row)?;
    }
    sink.flush()?;
    Ok(rows.len())
}

fn gather(
    path: &Path,
    options: &PipelineOptions,
    records: Vec<Record>,
    summary: &mut FileSummary,
) -> Result<Vec<Record>> {
    if options.truncate {
        let stats = truncate_file(path, &options.window)?;
        summary.lines_kept += stats.lines_kept;
    }
    let (records, stats) = extract_records(path, &options.marker, options.on_malformed, records)
        .with_context(|| format!("Failed to extract records from {}", path.display()))?;
    summary.records += stats.parsed;
    summary.malformed += stats.malformed;
    summary.files.push(path.to_path_buf());
    Ok(records)
}

/// Truncate one log file, correlate its records and append its rows to `sink`.
pub fn process<S: ReportSink + ?Sized>(
    path: &Path,
    options: &PipelineOptions,
    sink: &mut S,
) -> Result<FileSummary> {
    process_many(std::slice::from_ref(&path.to_path_buf()), options, sink)
}

/// Like `process`, but correlates records across all `paths` before emitting.
pub fn process_many<S: ReportSink + ?Sized>(
    paths: &[PathBuf],
    options: &PipelineOptions,
    sink: &mut S,
) -> Result<FileSummary> {
    let mut summary = FileSummary::default();
    let mut records = Vec::new();
    for path in paths {
        records = gather(path, options, records, &mut summary)?;
    }
    sort_by_job_id(&mut records);

    let runs = correlate(records);
    summary.runs = runs.len();
    summary.rows = emit(&runs, options.report_date, sink)?;

    debug!(
        "Processed {:?}: Kept lines={}, Records={}, Malformed={}, Runs={}, Rows={}",
        summary.files,
        summary.lines_kept,
        summary.records,
        summary.malformed,
        summary.runs,
        summary.rows
    );
    if summary.malformed > 0 {
        info!("{} malformed marker line(s) skipped", summary.malformed);
    }
    Ok(summary)
}
