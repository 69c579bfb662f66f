//! Coarse labels for remaining amounts.

use serde::{Deserialize, Serialize};

/// Status band of the current total, used for the status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulationLevel {
    /// Effect has mostly worn off (<= 50 mg)
    Faded,
    /// Good range for concentration (<= 200 mg)
    Focused,
    /// Over-stimulated, anxiety likely (<= 800 mg)
    Excessive,
    /// Stop all intake (<= 1000 mg)
    Dangerous,
    /// Seek medical advice
    Critical,
}

impl StimulationLevel {
    pub fn from_mg(mg: f64) -> Self {
        if mg > 1000.0 {
            StimulationLevel::Critical
        } else if mg > 800.0 {
            StimulationLevel::Dangerous
        } else if mg > 200.0 {
            StimulationLevel::Excessive
        } else if mg > 50.0 {
            StimulationLevel::Focused
        } else {
            StimulationLevel::Faded
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            StimulationLevel::Critical => "Critical level. Contact a doctor.",
            StimulationLevel::Dangerous => "Very high level. Stop all caffeine intake now.",
            StimulationLevel::Excessive => "Over the comfortable range. You may feel anxious.",
            StimulationLevel::Focused => "Good range for focus.",
            StimulationLevel::Faded => "The effect has mostly worn off.",
        }
    }
}

/// How a projected amount is likely to feel, used by forecasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerceptionBand {
    Negligible,
    Slight,
    Moderate,
    Active,
    Excessive,
}

impl PerceptionBand {
    pub fn from_mg(mg: f64) -> Self {
        if mg < 25.0 {
            PerceptionBand::Negligible
        } else if mg < 75.0 {
            PerceptionBand::Slight
        } else if mg < 125.0 {
            PerceptionBand::Moderate
        } else if mg < 175.0 {
            PerceptionBand::Active
        } else {
            PerceptionBand::Excessive
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PerceptionBand::Negligible => "negligible",
            PerceptionBand::Slight => "slight",
            PerceptionBand::Moderate => "moderate",
            PerceptionBand::Active => "active",
            PerceptionBand::Excessive => "excessive",
        }
    }
}
