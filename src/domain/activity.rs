use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_INACTIVITY_DAYS: u32 = 25;
pub const MAX_INACTIVITY_DAYS: u32 = 36_500;
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// How long a document may stay untouched, and how often the sweep looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub inactivity_threshold_days: u32,
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            inactivity_threshold_days: DEFAULT_INACTIVITY_DAYS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl RetentionPolicy {
    /// Documents whose last activity is strictly before this instant are stale.
    ///
    /// A threshold reaching past the earliest representable instant keeps
    /// everything.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::try_days(i64::from(self.inactivity_threshold_days))
            .and_then(|threshold| now.checked_sub_signed(threshold))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Selection used by the store's count queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityFilter {
    All,
    ActiveSince(DateTime<Utc>),
    InactiveBefore(DateTime<Utc>),
}

impl ActivityFilter {
    pub fn matches(&self, last_activity: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::ActiveSince(cutoff) => last_activity >= *cutoff,
            Self::InactiveBefore(cutoff) => last_activity < *cutoff,
        }
    }
}

/// Outcome of one sweep run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub deleted_count: u64,
    pub cutoff: DateTime<Utc>,
    pub remaining_total: u64,
    pub remaining_active: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Point-in-time view of the store as the retention policy sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub total_users: u64,
    pub active_users: u64,
    pub inactive_users: u64,
    pub inactivity_days: u32,
    pub sweep_interval_ms: u64,
    pub is_running: bool,
    pub next_sweep: Option<DateTime<Utc>>,
    pub sweeps_completed: u64,
    pub last_sweep: Option<SweepReport>,
}
