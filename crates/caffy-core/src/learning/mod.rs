//! Personal half-life learning.

mod learner;
mod perception;
mod state;

pub use learner::{reconstruct_amount, LearningUpdate, PersonalizationLearner};
pub use perception::mg_to_sense_level;
pub use state::{
    FeedbackEvent, LearningHistoryEntry, LearningReason, NewFeedback, PerceivedLevel,
    PersonalizationPhase, PersonalizationState,
};
