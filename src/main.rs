use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use glob::{glob, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use time::macros::format_description;

use invent_monitor::config::Settings;
use invent_monitor::pipeline::{process, process_many, FileSummary};
use invent_monitor::record::MalformedPolicy;
use invent_monitor::report::{CsvReportWriter, ReportSink};

#[derive(Parser, Clone)]
#[command(name = "Invent Monitor")]
#[command(
    about = "Summarises provisioning jobs from yesterday's BW application logs into a CSV report."
)]
#[command(version = "1.1.0")]
struct Cli {
    #[arg(short, long, help = "Optional YAML settings file; flags override its values")]
    config: Option<PathBuf>,
    #[arg(short, long, help = "Log file, or directory of log files, to process [default: log]")]
    input: Option<PathBuf>,
    #[arg(short, long, help = "CSV report to append to [default: \"Invent Monitoring.csv\"]")]
    output: Option<PathBuf>,
    #[arg(long, help = "First day kept, YYYY-MM-DD [default: yesterday]")]
    start_date: Option<NaiveDate>,
    #[arg(long, help = "Day at which scanning stops, YYYY-MM-DD [default: today]")]
    end_date: Option<NaiveDate>,
    #[arg(long, help = "Date written in the report's first column [default: start date]")]
    report_date: Option<NaiveDate>,
    #[arg(long, help = "Fail a file on its first malformed marker line instead of skipping it")]
    strict: bool,
    #[arg(long, help = "Extract from the logs as they are, without rewriting them to the window")]
    no_truncate: bool,
    #[arg(long, help = "Correlate job ids across all files instead of per file")]
    combine: bool,
    #[arg(short, long, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(input) = &self.input {
            settings.input_dir = input.clone();
        }
        if let Some(output) = &self.output {
            settings.output = output.clone();
        }
        settings.start_date = self.start_date.or(settings.start_date);
        settings.end_date = self.end_date.or(settings.end_date);
        settings.report_date = self.report_date.or(settings.report_date);
        if self.strict {
            settings.on_malformed = MalformedPolicy::Abort;
        }
        if self.no_truncate {
            settings.truncate = false;
        }
        Ok(settings)
    }
}

fn find_log_files(directory: &Path) -> Result<Vec<PathBuf>> {
    if directory.is_file() {
        return Ok(vec![directory.to_path_buf()]);
    }
    if !directory.is_dir() {
        return Err(anyhow::anyhow!("Log directory not found: {}", directory.display()));
    }
    let pattern = Path::new(&Pattern::escape(&directory.to_string_lossy())).join("*");
    let pattern_str = pattern.to_string_lossy();
    info!("Searching for files matching pattern: {}", pattern_str);
    let mut paths: Vec<PathBuf> = glob(&pattern_str)?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    if paths.is_empty() {
        warn!("No files found matching the pattern: {}", pattern_str);
    }
    Ok(paths)
}

fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, elapsed.subsec_millis())
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", cli.log_level);
            LevelFilter::Info
        }
    };
    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .init()?;

    info!("Starting Invent Monitor");
    let settings = cli.settings()?;
    let today = Local::now().date_naive();
    let options = settings.pipeline_options(today)?;
    info!(
        "Window: [{}, {}), report date {}, truncate={}, malformed lines: {:?}",
        options.window.start(),
        options.window.end(),
        options.report_date,
        options.truncate,
        options.on_malformed
    );
    info!("Report file: {}", settings.output.display());

    let files = find_log_files(&settings.input_dir)
        .with_context(|| format!("Failed to list log files in {}", settings.input_dir.display()))?;
    if files.is_empty() {
        warn!("No log files found. Exiting.");
        return Ok(());
    }
    info!("Total files to process: {}", files.len());

    let mut files_with_errors: Vec<PathBuf> = Vec::new();
    let mut total = FileSummary::default();

    if cli.combine {
        let mut sink = CsvReportWriter::append(&settings.output)?;
        match process_many(&files, &options, &mut sink) {
            Ok(summary) => total = summary,
            Err(e) => {
                error!("Error processing {} files together: {:#}", files.len(), e);
                files_with_errors.extend(files.iter().cloned());
            }
        }
    } else {
        let progress_bar = ProgressBar::new(files.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        for path in &files {
            let file_start = Instant::now();
            let outcome = CsvReportWriter::append(&settings.output).and_then(|mut sink| {
                let summary = process(path, &options, &mut sink)?;
                debug!("{} rows appended for {}", sink.rows_written(), path.display());
                Ok(summary)
            });
            match outcome {
                Ok(summary) => {
                    progress_bar.set_message(format!(
                        "OK: {} ({} rows, {})",
                        file_label(path),
                        summary.rows,
                        format_elapsed(file_start.elapsed())
                    ));
                    total.files.extend(summary.files);
                    total.lines_kept += summary.lines_kept;
                    total.records += summary.records;
                    total.malformed += summary.malformed;
                    total.runs += summary.runs;
                    total.rows += summary.rows;
                }
                Err(e) => {
                    error!("Error processing file {}: {:#}", path.display(), e);
                    progress_bar.set_message(format!("ERR: {}", file_label(path)));
                    files_with_errors.push(path.clone());
                }
            }
            progress_bar.inc(1);
        }
        progress_bar.finish_with_message(format!(
            "Processing finished. {} files OK, {} errors.",
            total.files.len(),
            files_with_errors.len()
        ));
    }

    info!("-------------------- FINAL SUMMARY --------------------");
    info!("Total execution time: {}", format_elapsed(start_time.elapsed()));
    info!("Total input files found: {}", files.len());
    info!("Files processed successfully: {}", total.files.len());
    info!("Records parsed: {} ({} malformed lines skipped)", total.records, total.malformed);
    info!("Jobs correlated: {}", total.runs);
    info!("Rows appended to {}: {}", settings.output.display(), total.rows);
    if !files_with_errors.is_empty() {
        warn!("Files with processing errors: {}", files_with_errors.len());
        for err_file in files_with_errors.iter().take(10) {
            warn!("  - {}", err_file.display());
        }
        if files_with_errors.len() > 10 {
            warn!("  ... (and {} more)", files_with_errors.len() - 10);
        }
    }
    info!("-------------------------------------------------------");

    if !files_with_errors.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
