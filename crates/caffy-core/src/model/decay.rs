//! Two-phase decay of a single dose.
//!
//! The dose rises along a quarter sine wave during the absorption window
//! and then decays exponentially, with the half-life clock starting at the
//! peak rather than at intake.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use super::params::ModelParams;

/// Remaining amount of one dose at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayPoint {
    /// Remaining amount in mg, rounded to one decimal.
    pub amount_mg: f64,
    /// True while the dose is still inside its absorption window.
    pub is_peaking: bool,
}

/// Evaluates a single intake at an arbitrary elapsed time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecayModel {
    params: ModelParams,
}

impl DecayModel {
    pub fn new(params: ModelParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Remaining amount (mg, one decimal) `elapsed_minutes` after intake.
    pub fn remaining_amount(&self, intake_mg: f64, elapsed_minutes: f64, half_life_hours: f64) -> f64 {
        self.evaluate(intake_mg, elapsed_minutes, half_life_hours).amount_mg
    }

    /// Remaining amount together with the absorption flag.
    pub fn evaluate(&self, intake_mg: f64, elapsed_minutes: f64, half_life_hours: f64) -> DecayPoint {
        let (amount, is_peaking) = self.raw(intake_mg, elapsed_minutes, half_life_hours);
        DecayPoint {
            amount_mg: round_tenth(amount),
            is_peaking,
        }
    }

    /// Unrounded remaining amount, used when sampling curves.
    pub fn remaining_exact(&self, intake_mg: f64, elapsed_minutes: f64, half_life_hours: f64) -> f64 {
        self.raw(intake_mg, elapsed_minutes, half_life_hours).0
    }

    /// First-order decay with no absorption phase, used for reconstructing
    /// historical amounts.
    pub fn elimination_only(intake_mg: f64, elapsed_hours: f64, half_life_hours: f64) -> f64 {
        if !is_usable_half_life(half_life_hours) {
            return 0.0;
        }
        intake_mg * 0.5_f64.powf(elapsed_hours / half_life_hours)
    }

    fn raw(&self, intake_mg: f64, elapsed_minutes: f64, half_life_hours: f64) -> (f64, bool) {
        let absorption = self.params.absorption_minutes;
        let elapsed_hours = elapsed_minutes / 60.0;

        let (amount, is_peaking) = if elapsed_minutes < 0.0 {
            (0.0, false)
        } else if elapsed_minutes < absorption {
            let ratio = elapsed_minutes / absorption;
            (intake_mg * (ratio * FRAC_PI_2).sin(), true)
        } else {
            let elimination_hours = elapsed_hours - self.params.absorption_hours();
            (
                Self::elimination_only(intake_mg, elimination_hours, half_life_hours),
                false,
            )
        };

        if elapsed_hours > self.params.retention_hours || amount < self.params.residual_floor_mg {
            (0.0, is_peaking)
        } else {
            (amount, is_peaking)
        }
    }
}

fn is_usable_half_life(hours: f64) -> bool {
    hours.is_finite() && hours > 0.0
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
