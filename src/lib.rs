//! Daily monitoring of provisioning batch jobs from their application logs.
//!
//! Each log is cut down to a date window, marker lines are decoded into
//! records, records are grouped by job id, and one CSV row is appended per
//! job entry record with the job's overall status.

pub mod classify;
pub mod config;
pub mod correlate;
pub mod date;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod truncate;

pub use classify::{get_category, get_identity, get_status, RunStatus};
pub use config::Settings;
pub use correlate::{correlate, Run};
pub use date::{extract_date, Window};
pub use pipeline::{process, process_many, FileSummary, PipelineOptions};
pub use record::{extract_records, MalformedPolicy, MarkerPattern, Record};
pub use report::{CsvReportWriter, ReportRow, ReportSink};
pub use truncate::truncate_file;
