use crate::reporters::BatchReport;
use colored::*;
use std::path::Path;

pub fn print_summary(reports: &BatchReport, rejected: usize, output: &Path) {
    println!("\n{}", "═══════════════════════════════════════".green().bold());
    println!("{}", "onionscan run complete".green().bold());
    println!("{}", "═══════════════════════════════════════".green().bold());

    let reachable = reports.values().filter(|r| r.fetch.status.is_some()).count();
    let exposed: usize = reports.values().map(|r| r.exposed_paths().count()).sum();
    let issues: usize = reports.values().map(|r| r.errors.len()).sum();

    println!("\n{}", "Results:".yellow().bold());
    println!("  Targets: {}", reports.len().to_string().green().bold());
    println!("  Reachable: {}", reachable.to_string().green().bold());
    println!("  Exposed paths: {}", exposed.to_string().green().bold());

    if issues > 0 {
        println!("  Issues: {}", issues.to_string().red().bold());
    }
    if rejected > 0 {
        println!("  Invalid targets skipped: {}", rejected.to_string().red().bold());
    }

    if !reports.is_empty() {
        println!("\n{}", super::table::TableBuilder::scan_summary(reports.values()));
    }

    println!("\n{}", format!("Report written to {}", output.display()).green().dimmed());
}
