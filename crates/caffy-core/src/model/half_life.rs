//! Elimination half-life from metabolism class and personal attributes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::params::LearningParams;
use crate::error::ValidationError;
use crate::learning::PersonalizationState;

/// Reference body mass (kg) for the weight correction.
const REFERENCE_BODY_MASS_KG: f64 = 70.0;

/// Coarse metabolism classification chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metabolism {
    #[default]
    Normal,
    /// e.g. smokers
    Fast,
    /// e.g. pregnancy, oral contraceptives, reduced liver function
    Slow,
}

impl Metabolism {
    /// Baseline half-life in hours.
    pub fn base_half_life(self) -> f64 {
        match self {
            Metabolism::Normal => 5.0,
            Metabolism::Fast => 3.0,
            Metabolism::Slow => 8.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metabolism::Normal => "normal",
            Metabolism::Fast => "fast",
            Metabolism::Slow => "slow",
        }
    }
}

impl fmt::Display for Metabolism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metabolism {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Metabolism::Normal),
            "fast" => Ok(Metabolism::Fast),
            "slow" => Ok(Metabolism::Slow),
            other => Err(ValidationError::InvalidValue {
                field: "metabolism",
                message: format!("expected normal, fast or slow, got '{other}'"),
            }),
        }
    }
}

/// Personal attributes that shift the baseline half-life.
///
/// Absent attributes apply no modifier.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetabolismProfile {
    #[serde(default)]
    pub metabolism: Metabolism,
    #[serde(default)]
    pub body_mass_kg: Option<f64>,
    #[serde(default)]
    pub is_smoker: bool,
    #[serde(default)]
    pub is_pregnant: bool,
    #[serde(default)]
    pub exercises_per_week: Option<u32>,
}

/// Chooses the half-life used for every calculation of a user.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfLifeResolver {
    params: LearningParams,
}

impl HalfLifeResolver {
    pub fn new(params: LearningParams) -> Self {
        Self { params }
    }

    pub fn base_half_life(&self, metabolism: Metabolism) -> f64 {
        metabolism.base_half_life()
    }

    /// The learned half-life once the personalization gate is met,
    /// otherwise the baseline adjusted by the profile modifiers.
    pub fn resolve(&self, profile: &MetabolismProfile, state: &PersonalizationState) -> f64 {
        if let Some(learned) = state.authoritative_half_life(&self.params.gate) {
            return learned;
        }
        self.modified_half_life(profile)
    }

    /// Baseline with smoker, pregnancy, exercise and body-mass modifiers,
    /// clamped into the configured range.
    pub fn modified_half_life(&self, profile: &MetabolismProfile) -> f64 {
        let mut half_life = profile.metabolism.base_half_life();

        if profile.is_smoker {
            half_life *= 0.65;
        }
        if profile.is_pregnant {
            half_life *= 2.0;
        }
        match profile.exercises_per_week {
            Some(n) if n >= 5 => half_life *= 0.9,
            Some(n) if n <= 1 => half_life *= 1.1,
            _ => {}
        }
        // Zero, negative or NaN body mass skips the correction.
        if let Some(mass) = profile.body_mass_kg.filter(|m| *m > 0.0 && m.is_finite()) {
            half_life *= (REFERENCE_BODY_MASS_KG / mass).powf(0.3);
        }

        self.params.clamp_half_life(half_life)
    }
}
