//! Immutable parameter bundles handed to each component at construction.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Parameters of the absorption/elimination model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Minutes from intake until the dose is fully absorbed (peak).
    #[serde(default = "default_absorption_minutes")]
    pub absorption_minutes: f64,

    /// Remaining amount (mg) considered safe for sleep.
    #[serde(default = "default_sleep_threshold_mg")]
    pub sleep_threshold_mg: f64,

    /// Events older than this contribute nothing.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: f64,

    /// Amounts below this floor (mg) are reported as zero.
    #[serde(default = "default_residual_floor_mg")]
    pub residual_floor_mg: f64,
}

fn default_absorption_minutes() -> f64 {
    45.0
}
fn default_sleep_threshold_mg() -> f64 {
    50.0
}
fn default_retention_hours() -> f64 {
    24.0
}
fn default_residual_floor_mg() -> f64 {
    1.0
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            absorption_minutes: default_absorption_minutes(),
            sleep_threshold_mg: default_sleep_threshold_mg(),
            retention_hours: default_retention_hours(),
            residual_floor_mg: default_residual_floor_mg(),
        }
    }
}

impl ModelParams {
    /// Absorption window expressed in hours.
    pub fn absorption_hours(&self) -> f64 {
        self.absorption_minutes / 60.0
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.retention_hours * 3_600_000.0) as i64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("model.absorption_minutes", self.absorption_minutes)?;
        positive("model.sleep_threshold_mg", self.sleep_threshold_mg)?;
        positive("model.retention_hours", self.retention_hours)?;
        if !(self.residual_floor_mg.is_finite() && self.residual_floor_mg >= 0.0) {
            return Err(invalid("model.residual_floor_mg", "must be >= 0"));
        }
        Ok(())
    }
}

/// Thresholds that decide whether a learned half-life is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalizationGate {
    #[serde(default = "default_gate_min_feedback")]
    pub min_feedback_count: u32,
    #[serde(default = "default_gate_min_confidence")]
    pub min_confidence: f64,
}

fn default_gate_min_feedback() -> u32 {
    5
}
fn default_gate_min_confidence() -> f64 {
    0.3
}

impl Default for PersonalizationGate {
    fn default() -> Self {
        Self {
            min_feedback_count: default_gate_min_feedback(),
            min_confidence: default_gate_min_confidence(),
        }
    }
}

/// Upper bound on grid steps between the half-life limits.
const MAX_GRID_STEPS: usize = 1000;

/// Parameters of the personalization learner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningParams {
    #[serde(default = "default_min_half_life")]
    pub min_half_life: f64,
    #[serde(default = "default_max_half_life")]
    pub max_half_life: f64,
    /// EMA weight given to the new candidate.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_grid_step_hours")]
    pub grid_step_hours: f64,
    /// Unconsumed feedback events required before a batch pass runs.
    #[serde(default = "default_min_data_points")]
    pub min_data_points: usize,
    /// Hours of half-life shift per perception level of surprise.
    #[serde(default = "default_adjustment_per_level")]
    pub adjustment_per_level: f64,
    #[serde(default = "default_confidence_cap")]
    pub confidence_cap: f64,
    /// Feedback count at which confidence would reach 1.0 before the cap.
    #[serde(default = "default_confidence_saturation")]
    pub confidence_saturation: u32,
    #[serde(default)]
    pub gate: PersonalizationGate,
}

fn default_min_half_life() -> f64 {
    2.0
}
fn default_max_half_life() -> f64 {
    12.0
}
fn default_learning_rate() -> f64 {
    0.2
}
fn default_grid_step_hours() -> f64 {
    0.5
}
fn default_min_data_points() -> usize {
    5
}
fn default_adjustment_per_level() -> f64 {
    0.1
}
fn default_confidence_cap() -> f64 {
    0.95
}
fn default_confidence_saturation() -> u32 {
    20
}

impl Default for LearningParams {
    fn default() -> Self {
        Self {
            min_half_life: default_min_half_life(),
            max_half_life: default_max_half_life(),
            learning_rate: default_learning_rate(),
            grid_step_hours: default_grid_step_hours(),
            min_data_points: default_min_data_points(),
            adjustment_per_level: default_adjustment_per_level(),
            confidence_cap: default_confidence_cap(),
            confidence_saturation: default_confidence_saturation(),
            gate: PersonalizationGate::default(),
        }
    }
}

impl LearningParams {
    /// Clamp a half-life into the configured range.
    pub fn clamp_half_life(&self, hours: f64) -> f64 {
        hours.clamp(self.min_half_life, self.max_half_life)
    }

    /// Confidence earned by `count` feedback events.
    pub fn confidence_for(&self, count: usize) -> f64 {
        let saturation = self.confidence_saturation.max(1) as f64;
        (count as f64 / saturation).min(self.confidence_cap)
    }

    /// Half-life candidates scanned by the batch grid search, ascending.
    ///
    /// Computed from an integer index so repeated float addition cannot
    /// skip the upper bound.
    pub fn grid_candidates(&self) -> Vec<f64> {
        let span = self.max_half_life - self.min_half_life;
        let steps = (span / self.grid_step_hours + 1e-9).floor() as usize;
        (0..=steps)
            .map(|i| self.min_half_life + i as f64 * self.grid_step_hours)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("learning.min_half_life", self.min_half_life)?;
        positive("learning.max_half_life", self.max_half_life)?;
        if self.min_half_life >= self.max_half_life {
            return Err(invalid(
                "learning.min_half_life",
                "must be smaller than learning.max_half_life",
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(invalid("learning.learning_rate", "must be in (0, 1]"));
        }
        positive("learning.grid_step_hours", self.grid_step_hours)?;
        let span = self.max_half_life - self.min_half_life;
        if span / self.grid_step_hours > MAX_GRID_STEPS as f64 {
            return Err(invalid(
                "learning.grid_step_hours",
                &format!("too small, the half-life range allows at most {MAX_GRID_STEPS} steps"),
            ));
        }
        if self.min_data_points == 0 {
            return Err(invalid("learning.min_data_points", "must be at least 1"));
        }
        if !(self.confidence_cap > 0.0 && self.confidence_cap <= 1.0) {
            return Err(invalid("learning.confidence_cap", "must be in (0, 1]"));
        }
        if self.confidence_saturation == 0 {
            return Err(invalid("learning.confidence_saturation", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.gate.min_confidence) {
            return Err(invalid("learning.gate.min_confidence", "must be in [0, 1]"));
        }
        Ok(())
    }
}

fn positive(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(key, "must be a positive number"))
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
