//! Orchestration over a [`Repository`].
//!
//! Every operation follows the same shape: fetch what the pure components
//! need, run them at the caller's `at`, and write back the result. Input is
//! validated before anything is stored.
//!
//! Learning operations (`submit_feedback`, `run_batch_learning`) read the
//! personalization state, compute an update in memory and commit it. Callers
//! must not run two of them for the same user at the same time.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, Result, ValidationError};
use crate::learning::{
    FeedbackEvent, LearningHistoryEntry, NewFeedback, PerceivedLevel, PersonalizationLearner,
    PersonalizationPhase, PersonalizationState,
};
use crate::model::{
    AggregateEstimator, ForecastPoint, GraphPoint, HalfLifeResolver, IntakeCorrection, IntakeEvent,
    LearningParams, MetabolismProfile, ModelParams, NewIntake, SleepReadinessPredictor,
    StimulationLevel,
};
use crate::repository::Repository;
use crate::storage::Config;

/// Number of history entries returned with learning statistics.
const RECENT_HISTORY_LIMIT: usize = 5;

/// Longest look-back accepted for graphs and intake history.
pub const MAX_WINDOW_DAYS: u32 = 3650;

fn check_window_days(field: &'static str, days: u32) -> std::result::Result<(), ValidationError> {
    if (1..=MAX_WINDOW_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field,
            message: format!("must be between 1 and {MAX_WINDOW_DAYS}, got {days}"),
        })
    }
}

/// Current state of a user at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub at: DateTime<Utc>,
    pub remaining_mg: f64,
    pub is_peaking: bool,
    /// Half-life used for this computation.
    pub half_life_hours: f64,
    pub base_half_life_hours: f64,
    pub is_personalized: bool,
    pub confidence: f64,
    pub sleep_ready_at: DateTime<Utc>,
    pub level: StimulationLevel,
    pub message: String,
    /// Intakes still contributing a non-zero amount.
    pub active_intakes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub at: DateTime<Utc>,
    pub current_mg: f64,
    pub half_life_hours: f64,
    pub sleep_ready_at: DateTime<Utc>,
    pub points: Vec<ForecastPoint>,
}

/// Answer to "how much more can I take and still be under the target?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeBudget {
    pub at: DateTime<Utc>,
    pub target_at: DateTime<Utc>,
    pub target_mg: f64,
    pub current_mg: f64,
    pub half_life_hours: f64,
    pub max_additional_mg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    pub feedback: FeedbackEvent,
    /// Present when the feedback moved the half-life.
    pub learning: Option<LearningHistoryEntry>,
    pub state: PersonalizationState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStats {
    pub base_half_life_hours: f64,
    /// Half-life currently used for calculations.
    pub current_half_life_hours: f64,
    pub personal_half_life_hours: Option<f64>,
    pub confidence: f64,
    pub total_feedback_count: u32,
    /// Stored feedback, including feedback without a preceding intake.
    pub feedback_count: u64,
    pub is_personalized: bool,
    pub phase: PersonalizationPhase,
    /// Newest first.
    pub recent_history: Vec<LearningHistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    /// UTC calendar day.
    pub date: NaiveDate,
    pub total_mg: f64,
    pub intake_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeHistory {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Oldest first.
    pub events: Vec<IntakeEvent>,
    pub daily_totals: Vec<DailyTotal>,
    pub total_mg: f64,
}

pub struct CaffeineService<R: Repository> {
    repo: R,
    model: ModelParams,
    resolver: HalfLifeResolver,
    estimator: AggregateEstimator,
    sleep: SleepReadinessPredictor,
    learner: PersonalizationLearner,
}

impl<R: Repository> CaffeineService<R> {
    pub fn new(repo: R, model: ModelParams, learning: LearningParams) -> Self {
        Self {
            repo,
            model,
            resolver: HalfLifeResolver::new(learning),
            estimator: AggregateEstimator::new(model),
            sleep: SleepReadinessPredictor::new(model),
            learner: PersonalizationLearner::new(learning, model),
        }
    }

    pub fn with_config(repo: R, config: &Config) -> Self {
        Self::new(repo, config.model, config.learning)
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn learning_params(&self) -> &LearningParams {
        self.learner.params()
    }

    fn require_profile(&self, user_id: i64) -> Result<MetabolismProfile> {
        self.repo
            .get_profile(user_id)?
            .ok_or_else(|| CoreError::user_not_found(user_id))
    }

    /// Users without a stored profile are treated as normal metabolizers
    /// with no modifiers.
    fn profile_or_default(&self, user_id: i64) -> Result<MetabolismProfile> {
        Ok(self.repo.get_profile(user_id)?.unwrap_or_default())
    }

    fn resolve_half_life(&self, user_id: i64) -> Result<(MetabolismProfile, PersonalizationState, f64)> {
        let profile = self.profile_or_default(user_id)?;
        let state = self.repo.get_personalization_state(user_id)?;
        let half_life = self.resolver.resolve(&profile, &state);
        Ok((profile, state, half_life))
    }

    /// Intakes that can contribute anywhere in `[from, ..]`.
    fn intakes_for(&self, user_id: i64, from: DateTime<Utc>) -> Result<Vec<IntakeEvent>> {
        self.repo
            .list_intake_events(user_id, self.estimator.retention_start(from))
    }

    // Status and charts

    pub fn compute_status(&self, user_id: i64, at: DateTime<Utc>) -> Result<Status> {
        let (profile, state, half_life) = self.resolve_half_life(user_id)?;
        let events = self.intakes_for(user_id, at)?;
        let snapshot = self.estimator.snapshot(&events, half_life, at);
        let level = StimulationLevel::from_mg(snapshot.remaining_mg);
        debug!(
            user_id,
            remaining_mg = snapshot.remaining_mg,
            half_life,
            "computed status"
        );

        Ok(Status {
            at,
            remaining_mg: snapshot.remaining_mg,
            is_peaking: snapshot.is_peaking,
            half_life_hours: half_life,
            base_half_life_hours: self.resolver.base_half_life(profile.metabolism),
            is_personalized: state.is_personalized(&self.learning_params().gate),
            confidence: state.confidence,
            sleep_ready_at: self.sleep.aggregate(&events, half_life, at),
            level,
            message: level.message().to_string(),
            active_intakes: snapshot.contributing_events,
        })
    }

    /// Samples from `window_days` days before `at` to half as far after it.
    pub fn compute_graph(
        &self,
        user_id: i64,
        window_days: u32,
        interval_minutes: u32,
        at: DateTime<Utc>,
    ) -> Result<Vec<GraphPoint>> {
        check_window_days("window_days", window_days)?;
        if interval_minutes == 0 {
            return Err(ValidationError::InvalidValue {
                field: "interval_minutes",
                message: "must be at least 1".into(),
            }
            .into());
        }

        let (_, _, half_life) = self.resolve_half_life(user_id)?;
        let from = at - Duration::hours(24 * i64::from(window_days));
        let to = at + Duration::hours(12 * i64::from(window_days));
        let events = self.intakes_for(user_id, from)?;
        let points = self.estimator.sample_series(
            &events,
            half_life,
            at,
            from,
            to,
            Duration::minutes(i64::from(interval_minutes)),
        );
        debug!(user_id, points = points.len(), "computed graph");
        Ok(points)
    }

    pub fn predict(&self, user_id: i64, at: DateTime<Utc>, hours: u32) -> Result<Prediction> {
        let (_, _, half_life) = self.resolve_half_life(user_id)?;
        let events = self.intakes_for(user_id, at)?;
        let current = self.estimator.total_remaining(&events, half_life, at);

        Ok(Prediction {
            at,
            current_mg: current,
            half_life_hours: half_life,
            sleep_ready_at: self.sleep.aggregate(&events, half_life, at),
            points: AggregateEstimator::forecast(current, half_life, hours),
        })
    }

    pub fn max_safe_intake(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
        target_at: DateTime<Utc>,
        target_mg: f64,
    ) -> Result<IntakeBudget> {
        let target_mg = ValidationError::check_positive("target_mg", target_mg)?;
        let (_, _, half_life) = self.resolve_half_life(user_id)?;
        let events = self.intakes_for(user_id, at)?;
        let current = self.estimator.total_remaining(&events, half_life, at);
        let hours_until = (target_at - at).num_milliseconds() as f64 / 3_600_000.0;

        Ok(IntakeBudget {
            at,
            target_at,
            target_mg,
            current_mg: current,
            half_life_hours: half_life,
            max_additional_mg: self
                .estimator
                .max_safe_intake(current, half_life, hours_until, target_mg),
        })
    }

    // Intakes

    pub fn record_intake(
        &self,
        user_id: i64,
        label: &str,
        amount_mg: f64,
        at: DateTime<Utc>,
    ) -> Result<IntakeEvent> {
        let intake = NewIntake::new(label, amount_mg, at)?;
        let event = self.repo.add_intake_event(user_id, &intake)?;
        debug!(user_id, intake_id = event.id, amount_mg, "recorded intake");
        Ok(event)
    }

    pub fn correct_intake(
        &self,
        user_id: i64,
        intake_id: i64,
        correction: IntakeCorrection,
    ) -> Result<IntakeEvent> {
        let mut event = self
            .repo
            .get_intake_event(user_id, intake_id)?
            .ok_or_else(|| CoreError::intake_not_found(intake_id))?;
        let amount = correction.apply(event.amount_mg)?;
        if !self.repo.update_intake_amount(user_id, intake_id, amount)? {
            return Err(CoreError::intake_not_found(intake_id));
        }
        event.amount_mg = amount;
        Ok(event)
    }

    pub fn delete_intake(&self, user_id: i64, intake_id: i64) -> Result<()> {
        if self.repo.delete_intake_event(user_id, intake_id)? {
            Ok(())
        } else {
            Err(CoreError::intake_not_found(intake_id))
        }
    }

    /// Intakes of the last `days` days up to `at`, with per-day totals.
    pub fn intake_history(&self, user_id: i64, days: u32, at: DateTime<Utc>) -> Result<IntakeHistory> {
        check_window_days("days", days)?;

        let from = at - Duration::hours(24 * i64::from(days));
        let events: Vec<IntakeEvent> = self
            .repo
            .list_intake_events(user_id, from)?
            .into_iter()
            .filter(|e| e.intake_at <= at)
            .collect();

        let mut per_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for event in &events {
            let entry = per_day.entry(event.intake_at.date_naive()).or_default();
            entry.0 += event.amount_mg;
            entry.1 += 1;
        }

        Ok(IntakeHistory {
            from,
            to: at,
            total_mg: events.iter().map(|e| e.amount_mg).sum(),
            daily_totals: per_day
                .into_iter()
                .map(|(date, (total_mg, intake_count))| DailyTotal {
                    date,
                    total_mg,
                    intake_count,
                })
                .collect(),
            events,
        })
    }

    // Profiles

    pub fn get_profile(&self, user_id: i64) -> Result<MetabolismProfile> {
        self.require_profile(user_id)
    }

    pub fn save_profile(&self, user_id: i64, profile: &MetabolismProfile) -> Result<()> {
        if let Some(mass) = profile.body_mass_kg {
            ValidationError::check_positive("body_mass_kg", mass)?;
        }
        self.repo.save_profile(user_id, profile)
    }

    // Learning

    /// Stores a perception report and applies the incremental update.
    ///
    /// The feedback is stored even when there is no preceding intake; it
    /// then moves nothing but remains available to batch learning.
    pub fn submit_feedback(
        &self,
        user_id: i64,
        perceived_level: i64,
        note: &str,
        at: DateTime<Utc>,
    ) -> Result<FeedbackOutcome> {
        let perceived_level = PerceivedLevel::new(perceived_level)?;
        let profile = self.require_profile(user_id)?;
        let state = self.repo.get_personalization_state(user_id)?;
        let half_life = self.resolver.resolve(&profile, &state);

        let events = self.intakes_for(user_id, at)?;
        let predicted_mg = self.estimator.total_remaining(&events, half_life, at);
        let (hours_since_last_intake, last_intake_amount_mg) = self
            .repo
            .latest_intake_event(user_id, at)?
            .map(|e| (e.elapsed_hours(at), e.amount_mg))
            .unwrap_or((0.0, 0.0));

        let feedback = self.repo.save_feedback(
            user_id,
            &NewFeedback {
                feedback_at: at,
                perceived_level,
                predicted_mg,
                note: note.to_string(),
                hours_since_last_intake,
                last_intake_amount_mg,
            },
        )?;

        let Some(update) = self.learner.on_feedback(&profile, &state, &feedback) else {
            debug!(user_id, feedback_id = feedback.id, "feedback stored without learning");
            return Ok(FeedbackOutcome {
                feedback,
                learning: None,
                state,
            });
        };

        self.repo.commit_learning(user_id, &update)?;
        info!(
            user_id,
            previous = ?update.history.previous_half_life,
            new = update.history.new_half_life,
            confidence = update.state.confidence,
            "realtime learning committed"
        );

        let mut feedback = feedback;
        feedback.consumed = true;
        Ok(FeedbackOutcome {
            feedback,
            learning: Some(update.history),
            state: update.state,
        })
    }

    /// Grid-search recalibration over all unconsumed feedback.
    ///
    /// `Ok(None)` when there is not enough feedback yet.
    pub fn run_batch_learning(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<LearningHistoryEntry>> {
        self.require_profile(user_id)?;
        let state = self.repo.get_personalization_state(user_id)?;
        let unconsumed = self.repo.list_unconsumed_feedback(user_id)?;

        let Some(earliest) = unconsumed.iter().map(|f| f.feedback_at).min() else {
            debug!(user_id, "no unconsumed feedback, batch learning skipped");
            return Ok(None);
        };
        if unconsumed.len() < self.learning_params().min_data_points {
            debug!(
                user_id,
                available = unconsumed.len(),
                required = self.learning_params().min_data_points,
                "not enough feedback for batch learning"
            );
            return Ok(None);
        }

        let intakes = self
            .repo
            .list_intake_events(user_id, earliest - self.model.retention())?;
        let Some(update) = self
            .learner
            .batch_learn(user_id, &state, &unconsumed, &intakes, at)
        else {
            return Ok(None);
        };

        self.repo.commit_learning(user_id, &update)?;
        info!(
            user_id,
            new = update.history.new_half_life,
            data_points = update.history.data_points_used,
            improvement = update.history.error_improvement_percent,
            "batch learning committed"
        );
        Ok(Some(update.history))
    }

    pub fn get_learning_stats(&self, user_id: i64) -> Result<LearningStats> {
        let profile = self.require_profile(user_id)?;
        let state = self.repo.get_personalization_state(user_id)?;
        let gate = &self.learning_params().gate;

        Ok(LearningStats {
            base_half_life_hours: self.resolver.base_half_life(profile.metabolism),
            current_half_life_hours: self.resolver.resolve(&profile, &state),
            personal_half_life_hours: state.personal_half_life_hours,
            confidence: state.confidence,
            total_feedback_count: state.total_feedback_count,
            feedback_count: self.repo.count_feedback(user_id)?,
            is_personalized: state.is_personalized(gate),
            phase: state.phase(gate),
            recent_history: self
                .repo
                .recent_learning_history(user_id, RECENT_HISTORY_LIMIT)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::LearningReason;
    use crate::model::Metabolism;
    use crate::storage::Database;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn service() -> CaffeineService<Database> {
        CaffeineService::new(
            Database::open_memory().unwrap(),
            ModelParams::default(),
            LearningParams::default(),
        )
    }

    fn with_profile() -> CaffeineService<Database> {
        let svc = service();
        svc.save_profile(1, &MetabolismProfile::default()).unwrap();
        svc
    }

    #[test]
    fn status_without_intakes_is_faded() {
        let status = service().compute_status(1, t0()).unwrap();
        assert_eq!(status.remaining_mg, 0.0);
        assert_eq!(status.level, StimulationLevel::Faded);
        assert_eq!(status.sleep_ready_at, t0());
        assert_eq!(status.half_life_hours, 5.0);
        assert!(!status.is_personalized);
    }

    #[test]
    fn status_after_one_dose() {
        let svc = with_profile();
        svc.record_intake(1, "coffee", 100.0, t0()).unwrap();

        let at_peak = svc.compute_status(1, t0() + Duration::minutes(45)).unwrap();
        assert_eq!(at_peak.remaining_mg, 100.0);
        assert!(!at_peak.is_peaking);
        assert_eq!(at_peak.active_intakes, 1);

        let later = svc
            .compute_status(1, t0() + Duration::minutes(45 + 5 * 60))
            .unwrap();
        assert_eq!(later.remaining_mg, 50.0);
        assert_eq!(later.level, StimulationLevel::Faded);
    }

    #[test]
    fn record_intake_rejects_non_positive_amount() {
        let svc = service();
        let err = svc.record_intake(1, "coffee", 0.0, t0()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(svc.intake_history(1, 1, t0()).unwrap().events.is_empty());
    }

    #[test]
    fn graph_window_spans_past_and_future() {
        let svc = service();
        svc.record_intake(1, "espresso", 80.0, t0()).unwrap();
        let points = svc.compute_graph(1, 1, 60, t0()).unwrap();
        // 24 h back and 12 h ahead, hourly, both ends inclusive.
        assert_eq!(points.len(), 37);
        assert_eq!(points[0].hour_offset, -24.0);
        assert_eq!(points[36].hour_offset, 12.0);
        assert_eq!(points[24].remaining_mg, 0.0);
        assert!(points[25].remaining_mg > 0.0);
    }

    #[test]
    fn graph_rejects_zero_interval() {
        let err = service().compute_graph(1, 1, 0, t0()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn oversized_windows_are_rejected() {
        let svc = service();
        let err = svc.compute_graph(1, u32::MAX, 60, t0()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        let err = svc.compute_graph(1, MAX_WINDOW_DAYS + 1, 60, t0()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = svc.intake_history(1, u32::MAX, t0()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(svc.intake_history(1, MAX_WINDOW_DAYS, t0()).is_ok());
    }

    #[test]
    fn batch_learning_without_intakes_settles_on_lowest_half_life() {
        let svc = with_profile();
        // No intake precedes any feedback: every candidate scores the same.
        for i in 0..5 {
            svc.submit_feedback(1, 4, "", t0() + Duration::hours(i)).unwrap();
        }

        let entry = svc
            .run_batch_learning(1, t0() + Duration::hours(6))
            .unwrap()
            .unwrap();
        assert_eq!(entry.new_half_life, 2.0);
        assert_eq!(entry.data_points_used, 5);

        let state = svc.repository().get_personalization_state(1).unwrap();
        assert_eq!(state.personal_half_life_hours, Some(2.0));
        assert!((state.confidence - 0.25).abs() < 1e-12);
        assert_eq!(state.total_feedback_count, 0);
        // Below the gate, status keeps using the profile half-life.
        let status = svc.compute_status(1, t0() + Duration::hours(6)).unwrap();
        assert_eq!(status.half_life_hours, 5.0);
    }

    #[test]
    fn correct_and_delete_intake() {
        let svc = service();
        let event = svc.record_intake(1, "latte", 120.0, t0()).unwrap();

        let halved = svc
            .correct_intake(1, event.id, IntakeCorrection::Ratio(0.5))
            .unwrap();
        assert_eq!(halved.amount_mg, 60.0);

        let bad = svc.correct_intake(1, event.id, IntakeCorrection::Ratio(1.5));
        assert!(matches!(bad, Err(CoreError::Validation(_))));

        svc.delete_intake(1, event.id).unwrap();
        assert!(svc.delete_intake(1, event.id).unwrap_err().is_not_found());
        assert!(svc
            .correct_intake(1, event.id, IntakeCorrection::Amount(10.0))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn intake_history_groups_by_day() {
        let svc = service();
        svc.record_intake(1, "a", 100.0, t0() - Duration::days(1)).unwrap();
        svc.record_intake(1, "b", 50.0, t0()).unwrap();
        svc.record_intake(1, "c", 30.0, t0() + Duration::hours(2)).unwrap();
        svc.record_intake(1, "future", 30.0, t0() + Duration::days(2)).unwrap();

        let history = svc.intake_history(1, 3, t0() + Duration::hours(3)).unwrap();
        assert_eq!(history.events.len(), 3);
        assert_eq!(history.total_mg, 180.0);
        assert_eq!(history.daily_totals.len(), 2);
        assert_eq!(history.daily_totals[1].total_mg, 80.0);
        assert_eq!(history.daily_totals[1].intake_count, 2);
    }

    #[test]
    fn feedback_requires_profile_and_valid_level() {
        let svc = service();
        assert!(svc
            .submit_feedback(1, 3, "", t0())
            .unwrap_err()
            .is_not_found());

        let svc = with_profile();
        let err = svc.submit_feedback(1, 6, "", t0()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::PerceivedLevelOutOfRange(6))
        ));
        assert_eq!(svc.repository().count_feedback(1).unwrap(), 0);
    }

    #[test]
    fn feedback_without_intake_is_stored_but_learns_nothing() {
        let svc = with_profile();
        let outcome = svc.submit_feedback(1, 4, "wired", t0()).unwrap();
        assert!(outcome.learning.is_none());
        assert!(!outcome.feedback.consumed);
        assert_eq!(outcome.state, PersonalizationState::default());
        assert_eq!(svc.repository().list_unconsumed_feedback(1).unwrap().len(), 1);
    }

    #[test]
    fn alert_feedback_raises_half_life() {
        let svc = with_profile();
        svc.record_intake(1, "coffee", 100.0, t0()).unwrap();

        // 5 h after the peak roughly 50 mg remain, an expected level of 2.
        let at = t0() + Duration::minutes(45 + 5 * 60);
        let outcome = svc.submit_feedback(1, 5, "", at).unwrap();
        let entry = outcome.learning.unwrap();
        assert_eq!(entry.reason, LearningReason::RealtimeFeedback);
        assert_eq!(entry.previous_half_life, Some(5.0));
        assert!(entry.new_half_life > 5.0);
        assert_eq!(outcome.state.total_feedback_count, 1);
        assert!(outcome.feedback.consumed);

        let stored = svc.repository().get_personalization_state(1).unwrap();
        assert_eq!(stored, outcome.state);
        assert!(svc.repository().list_unconsumed_feedback(1).unwrap().is_empty());
    }

    #[test]
    fn batch_learning_is_noop_with_little_feedback() {
        let svc = with_profile();
        for i in 0..3 {
            svc.submit_feedback(1, 3, "", t0() + Duration::hours(i)).unwrap();
        }
        assert_eq!(svc.run_batch_learning(1, t0() + Duration::hours(4)).unwrap(), None);
        assert_eq!(svc.repository().list_unconsumed_feedback(1).unwrap().len(), 3);
    }

    #[test]
    fn batch_learning_requires_profile() {
        assert!(service()
            .run_batch_learning(1, t0())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn stats_reflect_profile_and_history() {
        let svc = service();
        svc.save_profile(
            1,
            &MetabolismProfile {
                metabolism: Metabolism::Slow,
                ..Default::default()
            },
        )
        .unwrap();
        svc.record_intake(1, "coffee", 200.0, t0()).unwrap();
        svc.submit_feedback(1, 1, "sleepy", t0() + Duration::hours(3)).unwrap();

        let stats = svc.get_learning_stats(1).unwrap();
        assert_eq!(stats.base_half_life_hours, 8.0);
        assert_eq!(stats.total_feedback_count, 1);
        assert_eq!(stats.feedback_count, 1);
        assert_eq!(stats.phase, PersonalizationPhase::Personalizing);
        assert!(!stats.is_personalized);
        assert_eq!(stats.recent_history.len(), 1);
        assert!(stats.personal_half_life_hours.unwrap() < 8.0);
        // Below the gate the profile baseline is still in charge.
        assert_eq!(stats.current_half_life_hours, 8.0);
    }

    #[test]
    fn budget_is_zero_inside_absorption_window() {
        let svc = service();
        let budget = svc
            .max_safe_intake(1, t0(), t0() + Duration::minutes(30), 50.0)
            .unwrap();
        assert_eq!(budget.max_additional_mg, 0.0);

        let budget = svc
            .max_safe_intake(1, t0(), t0() + Duration::hours(5), 50.0)
            .unwrap();
        assert_eq!(budget.max_additional_mg, 100.0);
    }

    #[test]
    fn save_profile_rejects_bad_body_mass() {
        let svc = service();
        let profile = MetabolismProfile {
            body_mass_kg: Some(-3.0),
            ..Default::default()
        };
        assert!(matches!(
            svc.save_profile(1, &profile),
            Err(CoreError::Validation(_))
        ));
        assert!(svc.get_profile(1).unwrap_err().is_not_found());
    }
}
