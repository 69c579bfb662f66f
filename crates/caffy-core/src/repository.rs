//! Persistence boundary consumed by the service layer.
//!
//! The calculation components never touch a repository; the service
//! fetches what they need, runs them, and writes their results back.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::learning::{FeedbackEvent, LearningHistoryEntry, LearningUpdate, NewFeedback, PersonalizationState};
use crate::model::{IntakeEvent, MetabolismProfile, NewIntake};

pub trait Repository {
    // Profiles

    fn get_profile(&self, user_id: i64) -> Result<Option<MetabolismProfile>>;

    fn save_profile(&self, user_id: i64, profile: &MetabolismProfile) -> Result<()>;

    // Intake events

    /// Intakes at or after `since`, ordered by intake time ascending.
    fn list_intake_events(&self, user_id: i64, since: DateTime<Utc>) -> Result<Vec<IntakeEvent>>;

    /// Most recent intake at or before `at`.
    fn latest_intake_event(&self, user_id: i64, at: DateTime<Utc>) -> Result<Option<IntakeEvent>>;

    fn get_intake_event(&self, user_id: i64, intake_id: i64) -> Result<Option<IntakeEvent>>;

    fn add_intake_event(&self, user_id: i64, intake: &NewIntake) -> Result<IntakeEvent>;

    /// Returns false when no such intake exists for the user.
    fn update_intake_amount(&self, user_id: i64, intake_id: i64, amount_mg: f64) -> Result<bool>;

    /// Returns false when no such intake exists for the user.
    fn delete_intake_event(&self, user_id: i64, intake_id: i64) -> Result<bool>;

    // Personalization

    /// Zero state when nothing has been learned yet.
    fn get_personalization_state(&self, user_id: i64) -> Result<PersonalizationState>;

    fn save_personalization_state(&self, user_id: i64, state: &PersonalizationState) -> Result<()>;

    // Feedback

    fn save_feedback(&self, user_id: i64, feedback: &NewFeedback) -> Result<FeedbackEvent>;

    /// Unconsumed feedback ordered by timestamp ascending.
    fn list_unconsumed_feedback(&self, user_id: i64) -> Result<Vec<FeedbackEvent>>;

    fn mark_feedback_consumed(&self, user_id: i64, feedback_ids: &[i64]) -> Result<()>;

    fn count_feedback(&self, user_id: i64) -> Result<u64>;

    // Learning history

    fn append_learning_history(&self, entry: &LearningHistoryEntry) -> Result<()>;

    /// Newest first.
    fn recent_learning_history(&self, user_id: i64, limit: usize) -> Result<Vec<LearningHistoryEntry>>;

    /// Writes a learning outcome: state, history entry and consumed flags.
    ///
    /// Implementations backed by a transactional store should override this
    /// so the three writes land together or not at all.
    fn commit_learning(&self, user_id: i64, update: &LearningUpdate) -> Result<()> {
        self.save_personalization_state(user_id, &update.state)?;
        self.append_learning_history(&update.history)?;
        self.mark_feedback_consumed(user_id, &update.consumed_feedback)
    }
}
