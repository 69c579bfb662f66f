//! Sums single-dose decay over all of a user's intake events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::decay::{round_tenth, DecayModel};
use super::intake::IntakeEvent;
use super::level::PerceptionBand;
use super::params::ModelParams;

/// Total at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub remaining_mg: f64,
    pub is_peaking: bool,
    /// Events that still contribute a non-zero amount.
    pub contributing_events: usize,
}

/// One sample of a chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPoint {
    /// Hours relative to the series origin (negative = past).
    pub hour_offset: f64,
    pub timestamp: DateTime<Utc>,
    pub remaining_mg: f64,
}

/// One hourly step of a forward projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub hours_ahead: u32,
    pub remaining_mg: f64,
    pub band: PerceptionBand,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateEstimator {
    decay: DecayModel,
}

impl AggregateEstimator {
    pub fn new(params: ModelParams) -> Self {
        Self {
            decay: DecayModel::new(params),
        }
    }

    pub fn decay_model(&self) -> &DecayModel {
        &self.decay
    }

    /// Earliest intake time that can still contribute at `at`.
    pub fn retention_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        at - self.decay.params().retention()
    }

    fn within_retention<'a>(
        &self,
        events: &'a [IntakeEvent],
        at: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a IntakeEvent> {
        let start = self.retention_start(at);
        events.iter().filter(move |e| e.intake_at >= start)
    }

    /// Sum of the per-event remaining amounts at `at`.
    pub fn total_remaining(&self, events: &[IntakeEvent], half_life_hours: f64, at: DateTime<Utc>) -> f64 {
        self.snapshot(events, half_life_hours, at).remaining_mg
    }

    /// True when any event is still inside its absorption window at `at`.
    pub fn is_any_peaking(&self, events: &[IntakeEvent], half_life_hours: f64, at: DateTime<Utc>) -> bool {
        self.snapshot(events, half_life_hours, at).is_peaking
    }

    pub fn snapshot(&self, events: &[IntakeEvent], half_life_hours: f64, at: DateTime<Utc>) -> Snapshot {
        let mut total = 0.0;
        let mut is_peaking = false;
        let mut contributing_events = 0;

        for event in self.within_retention(events, at) {
            let point = self
                .decay
                .evaluate(event.amount_mg, event.elapsed_minutes(at), half_life_hours);
            total += point.amount_mg;
            is_peaking |= point.is_peaking;
            if point.amount_mg > 0.0 {
                contributing_events += 1;
            }
        }

        Snapshot {
            remaining_mg: round_tenth(total),
            is_peaking,
            contributing_events,
        }
    }

    /// Unrounded total, sampled for charts.
    pub fn total_exact(&self, events: &[IntakeEvent], half_life_hours: f64, at: DateTime<Utc>) -> f64 {
        self.within_retention(events, at)
            .map(|e| {
                self.decay
                    .remaining_exact(e.amount_mg, e.elapsed_minutes(at), half_life_hours)
            })
            .sum()
    }

    /// Samples the total from `from` to `to` inclusive every `interval`,
    /// with offsets measured from `origin`.
    ///
    /// Returns an empty series for a non-positive interval or an inverted
    /// range.
    pub fn sample_series(
        &self,
        events: &[IntakeEvent],
        half_life_hours: f64,
        origin: DateTime<Utc>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: Duration,
    ) -> Vec<GraphPoint> {
        if interval <= Duration::zero() || to < from {
            return Vec::new();
        }

        let mut points = Vec::new();
        let mut t = from;
        while t <= to {
            let offset_ms = (t - origin).num_milliseconds() as f64;
            points.push(GraphPoint {
                hour_offset: offset_ms / 3_600_000.0,
                timestamp: t,
                remaining_mg: round_tenth(self.total_exact(events, half_life_hours, t)),
            });
            t += interval;
        }
        points
    }

    /// Pure elimination of an aggregate `hours_ahead` into the future.
    ///
    /// Only meaningful once every contributing dose is past its peak.
    pub fn project_forward(current_mg: f64, half_life_hours: f64, hours_ahead: f64) -> f64 {
        if hours_ahead <= 0.0 {
            return current_mg;
        }
        DecayModel::elimination_only(current_mg, hours_ahead, half_life_hours)
    }

    /// Hourly projection for `hours` hours, starting with the current value.
    pub fn forecast(current_mg: f64, half_life_hours: f64, hours: u32) -> Vec<ForecastPoint> {
        (0..=hours)
            .map(|h| {
                let remaining = Self::project_forward(current_mg, half_life_hours, h as f64);
                ForecastPoint {
                    hours_ahead: h,
                    remaining_mg: round_tenth(remaining),
                    band: PerceptionBand::from_mg(remaining),
                }
            })
            .collect()
    }

    /// Largest additional dose (whole mg) that can be taken now so that the
    /// total is at most `target_mg` after `hours_until_target` hours.
    ///
    /// Zero when the target is in the past or closer than one absorption
    /// window.
    pub fn max_safe_intake(
        &self,
        current_mg: f64,
        half_life_hours: f64,
        hours_until_target: f64,
        target_mg: f64,
    ) -> f64 {
        if hours_until_target <= 0.0 || hours_until_target < self.decay.params().absorption_hours() {
            return 0.0;
        }
        if !(half_life_hours.is_finite() && half_life_hours > 0.0) {
            return 0.0;
        }

        let max_total = target_mg / 0.5_f64.powf(hours_until_target / half_life_hours);
        let additional = max_total - current_mg;
        if additional < 0.0 {
            0.0
        } else {
            additional.round()
        }
    }
}
