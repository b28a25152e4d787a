use colored::*;
use playlist::{DownloadSummary, ManifestEntry};
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct ManifestRow<'a> {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "File")]
    name: &'a str,
    #[tabled(rename = "Modified")]
    modified: String,
}

/// Numbered listing, newest first, numbered from 1.
pub fn manifest_table(entries: &[ManifestEntry]) -> String {
    let rows = entries.iter().enumerate().map(|(i, entry)| ManifestRow {
        index: i + 1,
        name: &entry.name,
        modified: entry.modified_display(),
    });
    Table::new(rows).with(Style::modern()).to_string()
}

pub fn summary_line(summary: &DownloadSummary) -> String {
    let counts = summary.to_string();
    let counts = if summary.is_complete() {
        counts.green().bold()
    } else {
        counts.yellow().bold()
    };
    format!("{} {} segments downloaded", "Done:".green(), counts)
}
