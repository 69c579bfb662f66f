//! Per-user personalization records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::model::PersonalizationGate;

/// Learned elimination parameters of one user.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PersonalizationState {
    /// Absent until the first learning pass produced a value.
    pub personal_half_life_hours: Option<f64>,
    /// 0.0..=1.0
    pub confidence: f64,
    pub total_feedback_count: u32,
}

/// Where a user stands on the way to a personalized half-life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalizationPhase {
    Unpersonalized,
    Personalizing,
    Personalized,
}

impl PersonalizationState {
    /// The single "is personalized" predicate.
    pub fn is_personalized(&self, gate: &PersonalizationGate) -> bool {
        self.total_feedback_count >= gate.min_feedback_count && self.confidence >= gate.min_confidence
    }

    /// The learned half-life, but only when the gate holds.
    pub fn authoritative_half_life(&self, gate: &PersonalizationGate) -> Option<f64> {
        if self.is_personalized(gate) {
            self.personal_half_life_hours
        } else {
            None
        }
    }

    pub fn phase(&self, gate: &PersonalizationGate) -> PersonalizationPhase {
        if self.is_personalized(gate) {
            PersonalizationPhase::Personalized
        } else if self.total_feedback_count > 0 || self.personal_half_life_hours.is_some() {
            PersonalizationPhase::Personalizing
        } else {
            PersonalizationPhase::Unpersonalized
        }
    }
}

/// Subjective alertness on a 1 (sleepy) to 5 (very alert) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct PerceivedLevel(u8);

impl PerceivedLevel {
    pub fn new(level: i64) -> Result<Self, ValidationError> {
        if (1..=5).contains(&level) {
            Ok(Self(level as u8))
        } else {
            Err(ValidationError::PerceivedLevelOutOfRange(level))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

impl TryFrom<i64> for PerceivedLevel {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PerceivedLevel> for u8 {
    fn from(level: PerceivedLevel) -> Self {
        level.0
    }
}

/// Feedback as captured, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub feedback_at: DateTime<Utc>,
    pub perceived_level: PerceivedLevel,
    /// Model estimate (mg) at the moment of the feedback.
    pub predicted_mg: f64,
    pub note: String,
    /// Zero when there is no earlier intake.
    pub hours_since_last_intake: f64,
    pub last_intake_amount_mg: f64,
}

/// A stored perception report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub id: i64,
    pub user_id: i64,
    pub feedback_at: DateTime<Utc>,
    pub perceived_level: PerceivedLevel,
    pub predicted_mg: f64,
    pub note: String,
    pub hours_since_last_intake: f64,
    pub last_intake_amount_mg: f64,
    /// Set once a learning pass has used this event.
    pub consumed: bool,
}

impl FeedbackEvent {
    pub fn from_new(id: i64, user_id: i64, new: NewFeedback) -> Self {
        Self {
            id,
            user_id,
            feedback_at: new.feedback_at,
            perceived_level: new.perceived_level,
            predicted_mg: new.predicted_mg,
            note: new.note,
            hours_since_last_intake: new.hours_since_last_intake,
            last_intake_amount_mg: new.last_intake_amount_mg,
            consumed: false,
        }
    }

    /// True when a dose was recorded before this feedback.
    pub fn has_preceding_intake(&self) -> bool {
        self.hours_since_last_intake > 0.0 && self.last_intake_amount_mg > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningReason {
    RealtimeFeedback,
    BatchLearning,
}

impl LearningReason {
    pub fn as_str(self) -> &'static str {
        match self {
            LearningReason::RealtimeFeedback => "realtime_feedback",
            LearningReason::BatchLearning => "batch_learning",
        }
    }
}

impl fmt::Display for LearningReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LearningReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realtime_feedback" => Ok(LearningReason::RealtimeFeedback),
            "batch_learning" => Ok(LearningReason::BatchLearning),
            other => Err(format!("unknown learning reason: {other}")),
        }
    }
}

/// Append-only audit record of one half-life change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningHistoryEntry {
    pub user_id: i64,
    pub recorded_at: DateTime<Utc>,
    pub previous_half_life: Option<f64>,
    pub new_half_life: f64,
    pub data_points_used: usize,
    pub error_improvement_percent: f64,
    pub reason: LearningReason,
}
