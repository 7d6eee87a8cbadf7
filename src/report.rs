use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{Writer, WriterBuilder};
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::classify::RunStatus;

pub const DEFAULT_OUTPUT_FILE: &str = "Invent Monitoring.csv";

/// One line of the monitoring report.
///
/// Column order: report date, blank, interface, category, identity, blank,
/// status, log time, job id. Absent category or identity is written blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub report_date: NaiveDate,
    pub interface: String,
    pub category: Option<String>,
    pub identity: Option<String>,
    pub status: RunStatus,
    pub log_time: String,
    pub job_id: String,
}

impl ReportRow {
    pub fn to_fields(&self) -> [String; 9] {
        [
            self.report_date.format("%Y-%m-%d").to_string(),
            String::new(),
            self.interface.clone(),
            self.category.clone().unwrap_or_default(),
            self.identity.clone().unwrap_or_default(),
            String::new(),
            self.status.to_string(),
            self.log_time.clone(),
            self.job_id.clone(),
        ]
    }
}

pub trait ReportSink {
    fn write_row(&mut self, row: &ReportRow) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn rows_written(&self) -> usize;
}

/// Headerless CSV rows with `\n` line endings.
pub struct CsvReportWriter<W: Write> {
    writer: Writer<W>,
    rows_written: usize,
}

impl<W: Write> CsvReportWriter<W> {
    pub fn from_writer(inner: W) -> Self {
        let writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(inner);
        Self { writer, rows_written: 0 }
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush report writer: {}", e.error()))
    }
}

impl CsvReportWriter<File> {
    /// Open `path` for appending, creating it if needed. Existing rows are kept.
    pub fn append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("Failed to open report file for append: {}", path.display()))?;
        debug!("Appending report rows to {}", path.display());
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> ReportSink for CsvReportWriter<W> {
    fn write_row(&mut self, row: &ReportRow) -> Result<()> {
        self.writer
            .write_record(row.to_fields())
            .context("Failed to write report row")?;
        self.rows_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush report file")
    }

    fn rows_written(&self) -> usize {
        self.rows_written
    }
}
