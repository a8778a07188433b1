use crate::core::models::ScanReport;
use colored::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Batch progress: one bar counting finished targets, with status lines
/// printed above it.
pub struct ProgressManager {
    multi: MultiProgress,
    overall: ProgressBar,
}

impl ProgressManager {
    pub fn new(total_targets: usize) -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_targets as u64));
        let style = ProgressStyle::with_template("{spinner:.blue} [{elapsed_precise}] {pos}/{len} targets {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        overall.set_style(style);
        overall.enable_steady_tick(Duration::from_millis(80));
        Self { multi, overall }
    }

    pub fn target_started(&self, host: &str) {
        self.overall.set_message(format!("scanning {}", host));
    }

    pub fn target_finished(&self, report: &ScanReport) {
        self.overall.inc(1);
        match report.fetch.status {
            Some(status) => self.print_success(&format!(
                "{} answered {} ({} exposed paths, {} banners, {} issues)",
                report.target,
                status,
                report.exposed_paths().count(),
                report.captured_banners().count(),
                report.errors.len()
            )),
            None => self.print_warning(&format!(
                "{} unreachable ({} banners, {} issues)",
                report.target,
                report.captured_banners().count(),
                report.errors.len()
            )),
        }
    }

    pub fn print_status(&self, status: &str, message: &str, color: colored::Color) {
        let formatted = format!("{} {}", status.color(color).bold(), message.normal());
        if self.multi.println(&formatted).is_err() {
            eprintln!("{}", formatted);
        }
    }

    pub fn print_success(&self, message: &str) {
        self.print_status("OK", message, colored::Color::Green);
    }

    pub fn print_error(&self, message: &str) {
        self.print_status("ERR", message, colored::Color::Red);
    }

    pub fn print_warning(&self, message: &str) {
        self.print_status("WARN", message, colored::Color::Yellow);
    }

    pub fn finish(&self) {
        self.overall.finish_and_clear();
    }
}
