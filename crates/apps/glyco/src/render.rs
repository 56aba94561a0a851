//! Plain-text rendering of a published series

use chrono::Local;
use glucose::{RefreshOutcome, SeriesSnapshot};
use std::fmt::Write;

/// One-line description of a refresh
pub fn summary(outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Published { snapshot, stats } => format!(
            "{} points from {} ({} new, {} duplicates, {} failed sources) in {}ms",
            snapshot.points.len(),
            snapshot.label,
            stats.added_readings,
            stats.discarded_readings,
            stats.failed_sources,
            stats.duration_ms
        ),
        RefreshOutcome::Debounced(snapshot) => format!(
            "{} points from {} (refreshed recently, use --force to refetch)",
            snapshot.points.len(),
            snapshot.label
        ),
        RefreshOutcome::Superseded { generation } => {
            format!("refresh {generation} was superseded")
        }
    }
}

/// The series as a table, with a marker line before each gap
pub fn series(snapshot: &SeriesSnapshot) -> String {
    let mut out = String::new();

    if let Some(window) = &snapshot.window {
        let _ = writeln!(
            out,
            "{} → {}  [{}]",
            window.start().with_timezone(&Local).format("%a %H:%M"),
            window.end().with_timezone(&Local).format("%a %H:%M"),
            snapshot.label
        );
    }

    if snapshot.points.is_empty() {
        let message = snapshot
            .error_message
            .as_deref()
            .unwrap_or("No glucose data in range");
        let _ = writeln!(out, "  {message}");
        return out;
    }

    for point in &snapshot.points {
        if point.has_gap_before {
            let _ = writeln!(out, "  ·· gap ··");
        }
        let _ = writeln!(
            out,
            "  {}  {:>3.0} mg/dL",
            point.time.with_timezone(&Local).format("%H:%M"),
            point.value
        );
    }
    out
}
