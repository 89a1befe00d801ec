use chrono::{DateTime, Duration, Utc};

use crate::food::models::Analysis;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// How long a stored analysis may be served before it is regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    window: Duration,
}

impl FreshnessPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Fresh while strictly younger than the window.
    pub fn is_fresh(&self, analysis: &Analysis, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(analysis.created_at) < self.window
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

pub fn is_fresh(analysis: &Analysis, now: DateTime<Utc>) -> bool {
    FreshnessPolicy::default().is_fresh(analysis, now)
}
