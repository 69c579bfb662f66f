//! Recorded intake events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A single recorded dose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeEvent {
    pub id: i64,
    pub user_id: i64,
    /// Drink name or free-form label.
    #[serde(default)]
    pub label: String,
    /// Ingested amount in mg.
    pub amount_mg: f64,
    pub intake_at: DateTime<Utc>,
}

impl IntakeEvent {
    /// Minutes from intake to `at` (negative for future intakes).
    pub fn elapsed_minutes(&self, at: DateTime<Utc>) -> f64 {
        (at - self.intake_at).num_milliseconds() as f64 / 60_000.0
    }

    pub fn elapsed_hours(&self, at: DateTime<Utc>) -> f64 {
        self.elapsed_minutes(at) / 60.0
    }
}

/// A new intake before it has been stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIntake {
    pub label: String,
    pub amount_mg: f64,
    pub intake_at: DateTime<Utc>,
}

impl NewIntake {
    pub fn new(label: impl Into<String>, amount_mg: f64, intake_at: DateTime<Utc>) -> Result<Self, ValidationError> {
        Ok(Self {
            label: label.into(),
            amount_mg: ValidationError::check_positive("amount_mg", amount_mg)?,
            intake_at,
        })
    }
}

/// A correction to an already recorded amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum IntakeCorrection {
    /// Replace the amount outright.
    Amount(f64),
    /// Keep only this fraction of the recorded amount (e.g. half a cup = 0.5).
    Ratio(f64),
}

impl IntakeCorrection {
    /// Applies the correction to `current_mg`, validating the input.
    pub fn apply(self, current_mg: f64) -> Result<f64, ValidationError> {
        match self {
            IntakeCorrection::Amount(mg) => ValidationError::check_positive("amount_mg", mg),
            IntakeCorrection::Ratio(ratio) => {
                if !(ratio.is_finite() && ratio > 0.0 && ratio <= 1.0) {
                    return Err(ValidationError::InvalidValue {
                        field: "ratio",
                        message: format!("must be in (0, 1], got {ratio}"),
                    });
                }
                Ok(current_mg * ratio)
            }
        }
    }
}
