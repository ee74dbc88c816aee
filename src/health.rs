use chrono::{DateTime, Utc};

use crate::models::BuildSet;

/// One green-rate summary row for a window of recent builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthRow {
    pub time: String,
    pub pending: usize,
    pub success: usize,
    pub unstable: usize,
    pub aborted: usize,
    pub failed: usize,
    pub rate: String,
}

/// Builds the health row for a build set, stamped with the current time.
pub fn health_row(set: &BuildSet) -> HealthRow {
    health_row_at(set, Utc::now())
}

fn health_row_at(set: &BuildSet, now: DateTime<Utc>) -> HealthRow {
    let pending = set.pending.len();
    let aborted = set.aborted.len();
    let success = set.success.len();

    // Green rate only counts completed builds. When everything in the
    // window is pending or aborted the rate is undefined and rendered as
    // a sentinel rather than dividing by zero.
    let completed = set.count.saturating_sub(pending + aborted);
    #[allow(clippy::cast_precision_loss)]
    let rate = if completed == 0 {
        "N/A".to_string()
    } else {
        format!("{:.2}%", success as f64 * 100.0 / completed as f64)
    };

    HealthRow {
        time: now.format("%Y-%m-%d %H:%M").to_string(),
        pending,
        success,
        unstable: set.unstable.len(),
        aborted,
        failed: set.failed.len(),
        rate,
    }
}

/// Column header aligned with [`HealthRow::to_line`].
pub fn header() -> String {
    format!(
        "{:<16} {:>7} {:>7} {:>8} {:>7} {:>6} {:>8}",
        "UTC Time", "Pending", "Success", "Unstable", "Aborted", "Failed", "Rate"
    )
}

impl HealthRow {
    /// Fixed-width row for tabular alignment across repeated invocations.
    pub fn to_line(&self) -> String {
        format!(
            "{:<16} {:>7} {:>7} {:>8} {:>7} {:>6} {:>8}",
            self.time, self.pending, self.success, self.unstable, self.aborted, self.failed,
            self.rate
        )
    }
}
