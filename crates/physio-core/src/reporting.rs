//! Dashboard read projections.
//!
//! Pure functions over already-loaded sessions and transfer records. Nothing
//! here writes.

use crate::session::{DisplayStatus, Session};
use crate::transfer::TransferRecord;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: Option<NaiveDate>,
    pub total: usize,
    pub scheduled: usize,
    pub confirmed: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub no_show: usize,
    /// Minutes held by non-cancelled sessions.
    pub booked_minutes: u32,
}

/// Counts the sessions on `date` by display status.
pub fn daily_summary(sessions: &[Session], date: NaiveDate, now: NaiveDateTime) -> DailySummary {
    let mut summary = DailySummary {
        date: Some(date),
        ..DailySummary::default()
    };
    for session in sessions.iter().filter(|s| s.scheduled_date == date) {
        summary.total += 1;
        if session.occupies_slot() {
            summary.booked_minutes += session.duration_minutes;
        }
        let counter = match session.display_status(now) {
            DisplayStatus::Scheduled => &mut summary.scheduled,
            DisplayStatus::Confirmed => &mut summary.confirmed,
            DisplayStatus::InProgress => &mut summary.in_progress,
            DisplayStatus::Completed => &mut summary.completed,
            DisplayStatus::Cancelled => &mut summary.cancelled,
            DisplayStatus::NoShow => &mut summary.no_show,
        };
        *counter += 1;
    }
    summary
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub year: i32,
    pub month: u32,
    pub monthly_total: usize,
    pub inter_branch: usize,
    pub intra_branch: usize,
    /// Newest first, across all months.
    pub recent: Vec<TransferRecord>,
}

pub fn transfer_stats(
    records: &[TransferRecord],
    year: i32,
    month: u32,
    limit: usize,
) -> TransferStats {
    let in_month: Vec<&TransferRecord> = records
        .iter()
        .filter(|r| r.transferred_at.year() == year && r.transferred_at.month() == month)
        .collect();
    let inter_branch = in_month.iter().filter(|r| r.inter_branch).count();

    let mut recent = records.to_vec();
    recent.sort_by(|a, b| b.transferred_at.cmp(&a.transferred_at));
    recent.truncate(limit);

    TransferStats {
        year,
        month,
        monthly_total: in_month.len(),
        inter_branch,
        intra_branch: in_month.len() - inter_branch,
        recent,
    }
}
