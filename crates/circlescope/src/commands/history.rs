//! `history` handler: one page of recent inspections.

use chrono::{Local, Utc};
use circlescope_core::{ApiClient, HistoryEntry};
use tabled::Tabled;

use crate::cli::{GlobalOpts, HistoryArgs};
use crate::error::CliError;
use crate::output::{self, should_color, status_label};

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Diameter (mm)")]
    diameter: String,
    #[tabled(rename = "Result")]
    status: String,
}

fn to_row(entry: &HistoryEntry, color: bool) -> HistoryRow {
    HistoryRow {
        time: entry
            .timestamp
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string(),
        diameter: entry.diameter_display(),
        status: status_label(entry.status, color),
    }
}

pub async fn handle(
    api: &ApiClient,
    args: &HistoryArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let page = api.history(args.limit, args.offset).await?;
    let now = Utc::now();
    let entries: Vec<HistoryEntry> = page
        .items
        .iter()
        .map(|item| HistoryEntry::from_history_item(item, now))
        .collect();
    tracing::debug!(
        returned = entries.len(),
        total = ?page.total,
        "history page fetched"
    );

    let color = should_color(global.color);
    let out = output::render_list(global.output, &entries, |e| to_row(e, color))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
