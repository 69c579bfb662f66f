//! Personal half-life learning from perception feedback.
//!
//! Two passes share the same target: make the perception level implied by
//! the model match what the user reports.
//!
//! * realtime: every feedback with a preceding intake nudges the half-life
//!   by an exponential moving average.
//! * batch: once enough unconsumed feedback has accumulated, a grid search
//!   picks the half-life with the lowest mean squared perception error.
//!
//! Both return a [`LearningUpdate`] computed entirely in memory; nothing is
//! written until the caller commits it. Callers must not run two learning
//! passes for the same user concurrently.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::perception::mg_to_sense_level;
use super::state::{FeedbackEvent, LearningHistoryEntry, LearningReason, PersonalizationState};
use crate::model::{DecayModel, IntakeEvent, LearningParams, MetabolismProfile, ModelParams};

/// State change produced by a learning pass, ready to be committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningUpdate {
    pub state: PersonalizationState,
    pub history: LearningHistoryEntry,
    /// Feedback ids to flag as consumed.
    pub consumed_feedback: Vec<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalizationLearner {
    params: LearningParams,
    model: ModelParams,
}

impl PersonalizationLearner {
    pub fn new(params: LearningParams, model: ModelParams) -> Self {
        Self { params, model }
    }

    pub fn params(&self) -> &LearningParams {
        &self.params
    }

    /// Incremental update after one feedback event.
    ///
    /// Returns `None` when the feedback has no preceding intake; such
    /// feedback is kept for batch learning but moves nothing.
    pub fn on_feedback(
        &self,
        profile: &MetabolismProfile,
        state: &PersonalizationState,
        feedback: &FeedbackEvent,
    ) -> Option<LearningUpdate> {
        if !feedback.has_preceding_intake() {
            return None;
        }

        let expected = mg_to_sense_level(feedback.predicted_mg);
        let sense_diff = feedback.perceived_level.as_f64() - expected;

        // Feeling more alert than predicted means the dose lingers longer.
        let previous = state
            .personal_half_life_hours
            .unwrap_or_else(|| profile.metabolism.base_half_life());
        let candidate = self
            .params
            .clamp_half_life(previous + sense_diff * self.params.adjustment_per_level);
        let rate = self.params.learning_rate;
        let updated = self
            .params
            .clamp_half_life((1.0 - rate) * previous + rate * candidate);

        let total_feedback_count = state.total_feedback_count + 1;
        let confidence = self
            .params
            .confidence_for(total_feedback_count as usize)
            .max(state.confidence);

        Some(LearningUpdate {
            state: PersonalizationState {
                personal_half_life_hours: Some(updated),
                confidence,
                total_feedback_count,
            },
            history: LearningHistoryEntry {
                user_id: feedback.user_id,
                recorded_at: feedback.feedback_at,
                previous_half_life: Some(previous),
                new_half_life: updated,
                data_points_used: total_feedback_count as usize,
                error_improvement_percent: 0.0,
                reason: LearningReason::RealtimeFeedback,
            },
            consumed_feedback: vec![feedback.id],
        })
    }

    /// Grid-search recalibration over unconsumed feedback.
    ///
    /// `intakes` must cover the retention window before the earliest
    /// feedback. Returns `None` below `min_data_points`.
    pub fn batch_learn(
        &self,
        user_id: i64,
        state: &PersonalizationState,
        unconsumed: &[FeedbackEvent],
        intakes: &[IntakeEvent],
        at: DateTime<Utc>,
    ) -> Option<LearningUpdate> {
        let mut feedback: Vec<&FeedbackEvent> = unconsumed.iter().filter(|f| !f.consumed).collect();
        if feedback.len() < self.params.min_data_points {
            return None;
        }
        feedback.sort_by_key(|f| f.feedback_at);

        let retention = self.model.retention();
        let mut best: Option<(f64, f64)> = None;
        for candidate in self.params.grid_candidates() {
            let mse = mean_squared_error(&feedback, intakes, candidate, retention);
            // strict comparison: ties keep the lower half-life scanned first
            if best.map_or(true, |(_, best_mse)| mse < best_mse) {
                best = Some((candidate, mse));
            }
        }
        let (best_half_life, best_mse) = best?;

        let previous = state.personal_half_life_hours;
        let improvement = previous
            .map(|hl| mean_squared_error(&feedback, intakes, hl, retention))
            .filter(|prev_mse| *prev_mse > 0.0)
            .map(|prev_mse| (prev_mse - best_mse) / prev_mse * 100.0)
            .unwrap_or(0.0);

        let confidence = self
            .params
            .confidence_for(feedback.len())
            .max(state.confidence);

        Some(LearningUpdate {
            state: PersonalizationState {
                personal_half_life_hours: Some(best_half_life),
                confidence,
                total_feedback_count: state.total_feedback_count,
            },
            history: LearningHistoryEntry {
                user_id,
                recorded_at: at,
                previous_half_life: previous,
                new_half_life: best_half_life,
                data_points_used: feedback.len(),
                error_improvement_percent: improvement,
                reason: LearningReason::BatchLearning,
            },
            consumed_feedback: feedback.iter().map(|f| f.id).collect(),
        })
    }
}

/// Amount (mg) at `at` rebuilt from the intakes of the preceding retention
/// window, using elimination-only decay.
pub fn reconstruct_amount(
    intakes: &[IntakeEvent],
    at: DateTime<Utc>,
    half_life_hours: f64,
    retention: Duration,
) -> f64 {
    let start = at - retention;
    intakes
        .iter()
        .filter(|e| e.intake_at > start && e.intake_at < at)
        .map(|e| DecayModel::elimination_only(e.amount_mg, e.elapsed_hours(at), half_life_hours))
        .sum()
}

fn mean_squared_error(
    feedback: &[&FeedbackEvent],
    intakes: &[IntakeEvent],
    half_life_hours: f64,
    retention: Duration,
) -> f64 {
    let total: f64 = feedback
        .iter()
        .map(|fb| {
            let predicted = reconstruct_amount(intakes, fb.feedback_at, half_life_hours, retention);
            let diff = fb.perceived_level.as_f64() - mg_to_sense_level(predicted);
            diff * diff
        })
        .sum();
    total / feedback.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::PerceivedLevel;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap()
    }

    fn feedback(id: i64, at: DateTime<Utc>, level: i64, predicted_mg: f64) -> FeedbackEvent {
        FeedbackEvent {
            id,
            user_id: 7,
            feedback_at: at,
            perceived_level: PerceivedLevel::new(level).unwrap(),
            predicted_mg,
            note: String::new(),
            hours_since_last_intake: 2.0,
            last_intake_amount_mg: 150.0,
            consumed: false,
        }
    }

    fn intake(id: i64, amount_mg: f64, at: DateTime<Utc>) -> IntakeEvent {
        IntakeEvent {
            id,
            user_id: 7,
            label: String::new(),
            amount_mg,
            intake_at: at,
        }
    }

    #[test]
    fn alert_feedback_lengthens_half_life() {
        let learner = PersonalizationLearner::default();
        let profile = MetabolismProfile::default();
        let state = PersonalizationState::default();
        // 50 mg predicted -> expected level 2, reported 5 -> +0.3 h candidate
        let update = learner
            .on_feedback(&profile, &state, &feedback(1, t0(), 5, 50.0))
            .unwrap();

        let hl = update.state.personal_half_life_hours.unwrap();
        assert!((hl - (0.8 * 5.0 + 0.2 * 5.3)).abs() < 1e-12);
        assert_eq!(update.state.total_feedback_count, 1);
        assert!((update.state.confidence - 0.05).abs() < 1e-12);
        assert_eq!(update.history.reason, LearningReason::RealtimeFeedback);
        assert_eq!(update.history.previous_half_life, Some(5.0));
        assert_eq!(update.consumed_feedback, vec![1]);
    }

    #[test]
    fn sleepy_feedback_shortens_half_life() {
        let learner = PersonalizationLearner::default();
        let state = PersonalizationState {
            personal_half_life_hours: Some(6.0),
            confidence: 0.4,
            total_feedback_count: 8,
        };
        let update = learner
            .on_feedback(&MetabolismProfile::default(), &state, &feedback(2, t0(), 1, 200.0))
            .unwrap();
        let hl = update.state.personal_half_life_hours.unwrap();
        assert!(hl < 6.0 && hl > 5.6);
        assert!((update.state.confidence - 0.45).abs() < 1e-12);
    }

    #[test]
    fn feedback_without_intake_moves_nothing() {
        let learner = PersonalizationLearner::default();
        let mut fb = feedback(3, t0(), 5, 0.0);
        fb.hours_since_last_intake = 0.0;
        assert!(learner
            .on_feedback(&MetabolismProfile::default(), &PersonalizationState::default(), &fb)
            .is_none());
    }

    #[test]
    fn candidate_is_clamped_at_range_edge() {
        let learner = PersonalizationLearner::default();
        let state = PersonalizationState {
            personal_half_life_hours: Some(12.0),
            confidence: 0.0,
            total_feedback_count: 0,
        };
        let update = learner
            .on_feedback(&MetabolismProfile::default(), &state, &feedback(4, t0(), 5, 0.0))
            .unwrap();
        assert_eq!(update.state.personal_half_life_hours, Some(12.0));
    }

    #[test]
    fn batch_needs_min_data_points() {
        let learner = PersonalizationLearner::default();
        let fbs: Vec<_> = (0..3)
            .map(|i| feedback(i, t0() + Duration::hours(i + 1), 3, 100.0))
            .collect();
        assert!(learner
            .batch_learn(7, &PersonalizationState::default(), &fbs, &[], t0())
            .is_none());
    }

    #[test]
    fn batch_prefers_slow_elimination_for_persistently_alert_user() {
        let learner = PersonalizationLearner::default();
        let intakes = vec![intake(1, 200.0, t0())];
        let fbs: Vec<_> = (0..6)
            .map(|i| feedback(10 + i, t0() + Duration::hours(6 + i), 5, 30.0))
            .collect();
        let at = t0() + Duration::hours(12);

        let update = learner
            .batch_learn(7, &PersonalizationState::default(), &fbs, &intakes, at)
            .unwrap();

        assert_eq!(update.state.personal_half_life_hours, Some(12.0));
        assert_eq!(update.history.reason, LearningReason::BatchLearning);
        assert_eq!(update.history.previous_half_life, None);
        assert_eq!(update.history.error_improvement_percent, 0.0);
        assert_eq!(update.history.data_points_used, 6);
        assert_eq!(update.consumed_feedback, vec![10, 11, 12, 13, 14, 15]);
        assert!((update.state.confidence - 0.3).abs() < 1e-12);
    }

    #[test]
    fn batch_ties_resolve_to_lowest_candidate() {
        // no intakes: every candidate predicts level 1, all MSEs are equal
        let learner = PersonalizationLearner::default();
        let fbs: Vec<_> = (0..5)
            .map(|i| feedback(i, t0() + Duration::hours(i), 4, 0.0))
            .collect();
        let update = learner
            .batch_learn(7, &PersonalizationState::default(), &fbs, &[], t0())
            .unwrap();
        assert_eq!(update.state.personal_half_life_hours, Some(2.0));
    }

    #[test]
    fn batch_reports_improvement_over_previous() {
        let learner = PersonalizationLearner::default();
        let intakes = vec![intake(1, 200.0, t0())];
        let fbs: Vec<_> = (0..6)
            .map(|i| feedback(i, t0() + Duration::hours(6 + i), 5, 30.0))
            .collect();
        let state = PersonalizationState {
            personal_half_life_hours: Some(3.0),
            confidence: 0.6,
            total_feedback_count: 12,
        };
        let update = learner
            .batch_learn(7, &state, &fbs, &intakes, t0() + Duration::hours(12))
            .unwrap();
        assert!(update.history.error_improvement_percent > 0.0);
        assert_eq!(update.history.previous_half_life, Some(3.0));
        // confidence never drops below what was already earned
        assert_eq!(update.state.confidence, 0.6);
        assert_eq!(update.state.total_feedback_count, 12);
    }

    #[test]
    fn reconstruction_ignores_absorption_and_window_edges() {
        let intakes = vec![
            intake(1, 100.0, t0()),
            intake(2, 500.0, t0() - Duration::hours(30)),
            intake(3, 80.0, t0() + Duration::hours(6)),
        ];
        let at = t0() + Duration::hours(5);
        let amount = reconstruct_amount(&intakes, at, 5.0, Duration::hours(24));
        assert!((amount - 50.0).abs() < 1e-9);
    }
}
