//! When will the remaining amount be low enough to sleep?

use chrono::{DateTime, Duration, Utc};

use super::intake::IntakeEvent;
use super::params::ModelParams;

#[derive(Debug, Clone, Copy, Default)]
pub struct SleepReadinessPredictor {
    params: ModelParams,
}

impl SleepReadinessPredictor {
    pub fn new(params: ModelParams) -> Self {
        Self { params }
    }

    /// Time at which a single dose falls to the sleep threshold.
    ///
    /// Doses at or under the threshold are already safe and return `now`.
    pub fn can_sleep_at(
        &self,
        intake_mg: f64,
        intake_at: DateTime<Utc>,
        half_life_hours: f64,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let threshold = self.params.sleep_threshold_mg;
        if intake_mg <= threshold || !(half_life_hours.is_finite() && half_life_hours > 0.0) {
            return now;
        }

        let hours_needed =
            half_life_hours * (intake_mg / threshold).log2() + self.params.absorption_hours();
        intake_at + Duration::milliseconds((hours_needed * 3_600_000.0).round() as i64)
    }

    /// Latest per-event answer; the largest dose decides when the whole
    /// system is clear. Answers already in the past collapse to `now`.
    pub fn aggregate(&self, events: &[IntakeEvent], half_life_hours: f64, now: DateTime<Utc>) -> DateTime<Utc> {
        events
            .iter()
            .map(|e| self.can_sleep_at(e.amount_mg, e.intake_at, half_life_hours, now))
            .fold(now, |latest, t| latest.max(t))
    }
}
