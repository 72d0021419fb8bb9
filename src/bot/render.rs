//! Reply formatting. Pure string building; handlers gather the data.

use time::UtcOffset;
use time::macros::format_description;

use crate::checker::CheckOutcome;
use crate::index::LoadReport;

pub const START_TEXT: &str = "Send a product code to check it.";

pub const HELP_TEXT: &str = "How to use:\n\
    - Send one or more codes directly (separated by spaces or new lines).\n\
    - /check <code> checks a single code.\n\
    - /stats shows how many codes are indexed.\n\
    - /reload refreshes the index from the source sheet (admins).";

pub const FAILURE_TEXT: &str = "Something went wrong while checking. Please try again.";

pub const RELOAD_DENIED_TEXT: &str = "You are not allowed to use /reload.";

pub const RELOAD_FAILED_TEXT: &str =
    "Reload failed; still answering from the previous snapshot.";

pub const CHECK_USAGE_TEXT: &str = "Usage: /check <code>";

/// One line per outcome: verdict, then tally enrichment when the ledger bump
/// succeeded.
pub fn render_outcomes(outcomes: &[CheckOutcome], display_offset: UtcOffset) -> String {
    outcomes
        .iter()
        .map(|outcome| render_outcome(outcome, display_offset))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_outcome(outcome: &CheckOutcome, display_offset: UtcOffset) -> String {
    let verdict = if outcome.known {
        format!("✅ {} — authentic product", outcome.code)
    } else {
        format!("❌ {} — not recognized as an authentic product", outcome.code)
    };
    match &outcome.stats {
        Some(stats) => format!(
            "{verdict} | Last checked: {} | Times checked: {}",
            display_ts(stats.last_checked_at, display_offset),
            stats.count
        ),
        None => verdict,
    }
}

pub fn render_stats(unique: usize) -> String {
    format!("📊 Codes indexed: {unique}")
}

pub fn render_reload(report: &LoadReport) -> String {
    format!(
        "🔄 Reloaded. Cells read: {} | Unique codes: {}",
        report.cells, report.unique
    )
}

fn display_ts(ts: time::OffsetDateTime, display_offset: UtcOffset) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    ts.to_offset(display_offset)
        .format(&fmt)
        .unwrap_or_else(|_| ts.to_string())
}
