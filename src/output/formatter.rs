//! Output formatters for run reports
//!
//! Provides table, JSON and CSV renderings of run and suite reports.

use serde::Serialize;

use crate::models::RunReport;
use crate::results::SuiteReport;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const MAGENTA: &str = "\x1b[35m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Run report formatter
#[derive(Clone, Debug)]
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
    show_on_success: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
            show_on_success: false,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Print iteration logs of passing runs too
    pub fn show_on_success(mut self, show: bool) -> Self {
        self.show_on_success = show;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.colorize {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    /// Format one run report
    pub fn format_run(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_run_table(report),
            OutputFormat::Json => to_json(report, false),
            OutputFormat::JsonPretty => to_json(report, true),
            OutputFormat::Csv => self.format_run_csv(report),
        }
    }

    fn format_run_table(&self, report: &RunReport) -> String {
        if report.setup_error.is_some() {
            return self.format_setup_failure(report);
        }

        let mut output = String::new();

        if !report.failed && !self.show_on_success {
            let stats = self.paint(
                BLUE,
                &format!(
                    "it: {}, avg: {}ms",
                    report.iterations.len(),
                    report.average_duration.as_millis()
                ),
            );
            output.push_str(&self.paint(
                GREEN,
                &format!(
                    "PASS : {} (variant {}) {}",
                    report.name, report.variant, stats
                ),
            ));
            output.push('\n');
            return output;
        }

        let (result, color) = if report.failed {
            ("FAIL", YELLOW)
        } else {
            ("PASS", GREEN)
        };
        let title = format!("{} : {} (variant {})", result, report.name, report.variant);
        output.push('\n');
        output.push_str(&self.paint(BOLD, &self.paint(color, &title)));
        output.push('\n');
        output.push_str(&format!("  {} — {}\n", report.description, report.author));
        output.push_str(&format!("  id: {}\n", report.id));

        if !report.log.is_empty() {
            output.push_str(&indent(&report.log));
        }

        for result in &report.iterations {
            if !result.failed() && !self.show_on_success {
                continue;
            }

            output.push('\n');
            output.push_str(&self.paint(
                MAGENTA,
                &format!(
                    "Iteration [{}] log after {}ms",
                    result.iteration + 1,
                    result.duration.as_millis()
                ),
            ));
            output.push('\n');

            if result.log.is_empty() {
                output.push_str("  <no log>\n");
            } else {
                output.push_str(&indent(&result.log));
            }

            if result.failed() {
                output.push_str(&self.paint(RED, &format!("  error: {}", result.outcome)));
                output.push('\n');
            }

            if let Some(stack) = &result.stack {
                output.push_str(&format!("    Test panic:\n\n{stack}\n"));
            }
        }

        if report.is_partial() {
            output.push_str(&self.paint(
                YELLOW,
                &format!(
                    "  only {} of {} iteration(s) reported before the deadline\n",
                    report.iterations.len(),
                    report.stress
                ),
            ));
        }

        output
    }

    fn format_setup_failure(&self, report: &RunReport) -> String {
        let mut output = String::new();
        output.push('\n');
        output.push_str(&self.paint(
            BOLD,
            &self.paint(
                YELLOW,
                &format!(
                    "{} FAIL {} (variant {})",
                    report.id, report.name, report.variant
                ),
            ),
        ));
        output.push_str("\n\n");
        output.push_str(&self.paint(MAGENTA, "setup function:"));
        output.push_str("\n\n");

        if !report.log.is_empty() {
            output.push_str(&indent(&report.log));
        }
        if let Some(error) = &report.setup_error {
            output.push_str(&self.paint(RED, &format!("  error: {error}")));
            output.push('\n');
        }
        if let Some(stack) = &report.setup_stack {
            output.push_str(&format!("{stack}\n"));
        }

        output
    }

    fn format_run_csv(&self, report: &RunReport) -> String {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        let record = csv_record(report);
        if writer.write_record(&record).is_err() {
            return String::new();
        }
        writer
            .into_inner()
            .map(|bytes| String::from_utf8_lossy(&bytes).trim_end().to_string())
            .unwrap_or_default()
    }

    /// CSV header matching [`ResultFormatter::format_run`] in CSV mode
    pub fn csv_header() -> &'static str {
        "id,name,variant,result,iterations,stress,avg_ms,message"
    }

    /// Format the closing summary of a suite
    pub fn format_suite(&self, suite: &SuiteReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_suite_table(suite),
            OutputFormat::Json => to_json(suite, false),
            OutputFormat::JsonPretty => to_json(suite, true),
            OutputFormat::Csv => String::new(),
        }
    }

    fn format_suite_table(&self, suite: &SuiteReport) -> String {
        let mut output = String::new();
        output.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

        let fail_str = if suite.failed() > 0 {
            self.paint(RED, &suite.failed().to_string())
        } else {
            suite.failed().to_string()
        };
        output.push_str(&format!(
            "Runs: {} | Pass: {} | Fail: {} | Not started: {}\n",
            suite.total(),
            self.paint(GREEN, &suite.passed().to_string()),
            fail_str,
            suite.not_started.len()
        ));

        let elapsed = suite.finished_at - suite.started_at;
        output.push_str(&format!(
            "Duration: {}ms | Limit: {}\n",
            elapsed.num_milliseconds(),
            suite.limit
        ));

        if suite.deadline_exceeded {
            output.push_str(&self.paint(YELLOW, "Deadline exceeded before the suite completed\n"));
        }
        output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        output
    }
}

fn csv_record(report: &RunReport) -> Vec<String> {
    let message = report
        .setup_error
        .clone()
        .or_else(|| {
            report
                .iterations
                .iter()
                .find(|r| r.failed())
                .map(|r| r.outcome.to_string())
        })
        .unwrap_or_default();

    vec![
        report.id.clone(),
        report.name.clone(),
        report.variant.clone(),
        if report.failed { "FAIL" } else { "PASS" }.to_string(),
        report.iterations.len().to_string(),
        report.stress.to_string(),
        report.average_duration.as_millis().to_string(),
        message,
    ]
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_default()
}

fn indent(text: &str) -> String {
    let mut output = String::new();
    for line in text.trim_end().lines() {
        output.push_str("  ");
        output.push_str(line);
        output.push('\n');
    }
    output
}
