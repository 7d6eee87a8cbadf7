use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::date::Window;
use crate::pipeline::PipelineOptions;
use crate::record::{
    MalformedPolicy, MarkerPattern, DEFAULT_EXCLUDED_MARKERS, DEFAULT_MARKER_PATTERN,
};
use crate::report::DEFAULT_OUTPUT_FILE;

pub const DEFAULT_INPUT_DIR: &str = "log";

/// Run settings, optionally loaded from YAML; every field has a default.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory of logs, or a single log file.
    #[serde(alias = "logfile")]
    pub input_dir: PathBuf,
    #[serde(alias = "outputfile")]
    pub output: PathBuf,
    pub marker_pattern: String,
    pub exclude: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub report_date: Option<NaiveDate>,
    pub on_malformed: MalformedPolicy,
    pub truncate: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output: PathBuf::from(DEFAULT_OUTPUT_FILE),
            marker_pattern: DEFAULT_MARKER_PATTERN.to_string(),
            exclude: DEFAULT_EXCLUDED_MARKERS.iter().map(|m| m.to_string()).collect(),
            start_date: None,
            end_date: None,
            report_date: None,
            on_malformed: MalformedPolicy::default(),
            truncate: true,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open configuration file: {}", path.display()))?;
        serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse configuration YAML from {}", path.display()))
    }

    /// Window defaults to `[today - 1, today)`; an explicit bound replaces only its side.
    pub fn window(&self, today: NaiveDate) -> Result<Window> {
        let daily = Window::day_before(today);
        let window = Window::new(
            self.start_date.unwrap_or(daily.start()),
            self.end_date.unwrap_or(daily.end()),
        )?;
        Ok(window)
    }

    pub fn pipeline_options(&self, today: NaiveDate) -> Result<PipelineOptions> {
        let window = self.window(today)?;
        let marker = MarkerPattern::new(&self.marker_pattern, self.exclude.iter().cloned())?;
        Ok(PipelineOptions {
            window,
            report_date: self.report_date.unwrap_or(window.start()),
            marker,
            on_malformed: self.on_malformed,
            truncate: self.truncate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.input_dir, PathBuf::from("log"));
        assert_eq!(settings.output, PathBuf::from("Invent Monitoring.csv"));
        assert_eq!(settings.exclude, vec!["[BW-Core]", "[BW_Core]", "[BW_Plugin]"]);

        let options = settings.pipeline_options(ymd(2024, 1, 16)).unwrap();
        assert_eq!(options.window, Window::new(ymd(2024, 1, 15), ymd(2024, 1, 16)).unwrap());
        assert_eq!(options.report_date, ymd(2024, 1, 15));
        assert_eq!(options.on_malformed, MalformedPolicy::Skip);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml =
            "output: report.csv\nstart_date: 2024-01-10\non_malformed: abort\ntruncate: false\n";
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.output, PathBuf::from("report.csv"));
        assert_eq!(settings.input_dir, PathBuf::from("log"));
        assert_eq!(settings.on_malformed, MalformedPolicy::Abort);

        let options = settings.pipeline_options(ymd(2024, 1, 16)).unwrap();
        assert_eq!(options.window.start(), ymd(2024, 1, 10));
        assert_eq!(options.window.end(), ymd(2024, 1, 16));
        assert_eq!(options.report_date, ymd(2024, 1, 10));
        assert!(!options.truncate);
    }

    #[test]
    fn test_logfile_and_outputfile_keys() {
        let yaml = "logfile: log/app.log\noutputfile: x.csv\nend_date: 2024-01-16\n";
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.input_dir, PathBuf::from("log/app.log"));
        assert_eq!(settings.output, PathBuf::from("x.csv"));
        assert_eq!(settings.end_date, Some(ymd(2024, 1, 16)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(serde_yaml::from_str::<Settings>("report_file: x.csv\n").is_err());
    }

    #[test]
    fn test_inverted_window_rejected() {
        let settings = Settings {
            start_date: Some(ymd(2024, 2, 1)),
            ..Settings::default()
        };
        assert!(settings.pipeline_options(ymd(2024, 1, 16)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.yaml");
        std::fs::write(&path, "input_dir: /var/log/bw\nexclude: []\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.input_dir, PathBuf::from("/var/log/bw"));
        assert!(settings.exclude.is_empty());
        assert!(Settings::load(&dir.path().join("missing.yaml")).is_err());
    }
}
