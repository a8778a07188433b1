use crate::core::models::ScanReport;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    pub fn new() -> Self {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_content_arrangement(ContentArrangement::Dynamic);

        Self { table }
    }

    /// One row per target, in the order given.
    pub fn scan_summary<'a>(reports: impl IntoIterator<Item = &'a ScanReport>) -> String {
        let mut builder = Self::new();

        builder.table.set_header(vec![
            Cell::new("Target").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Exposed paths").add_attribute(Attribute::Bold),
            Cell::new("Banners").add_attribute(Attribute::Bold),
            Cell::new("Artifacts").add_attribute(Attribute::Bold),
            Cell::new("Issues").add_attribute(Attribute::Bold),
        ]);

        for report in reports {
            let status = match report.fetch.status {
                Some(code) if (200..400).contains(&code) => Cell::new(code).fg(Color::Green),
                Some(code) => Cell::new(code).fg(Color::Yellow),
                None => Cell::new("unreachable").fg(Color::Red),
            };

            let exposed: Vec<&str> = report.exposed_paths().map(|p| p.path.as_str()).collect();
            let banners: Vec<String> = report
                .captured_banners()
                .map(|b| format!("{}/{}", b.port, b.protocol.label()))
                .collect();

            let issues = if report.errors.is_empty() {
                Cell::new(0)
            } else {
                Cell::new(report.errors.len()).fg(Color::Red)
            };

            builder.table.add_row(vec![
                Cell::new(&report.target),
                status,
                Cell::new(exposed.join(", ")),
                Cell::new(banners.join(", ")),
                Cell::new(report.artifacts.finding_count()),
                issues,
            ]);
        }

        builder.table.to_string()
    }
}
