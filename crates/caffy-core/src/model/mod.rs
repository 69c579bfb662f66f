//! Pharmacokinetic model.
//!
//! Everything here is a pure function of its inputs: the target time is
//! always passed in explicitly, so the same code serves live status,
//! historical charts and forecasts.

mod aggregate;
mod decay;
mod half_life;
mod intake;
mod level;
mod params;
mod sleep;

pub use aggregate::{AggregateEstimator, ForecastPoint, GraphPoint, Snapshot};
pub use decay::{DecayModel, DecayPoint};
pub use half_life::{HalfLifeResolver, Metabolism, MetabolismProfile};
pub use intake::{IntakeCorrection, IntakeEvent, NewIntake};
pub use level::{PerceptionBand, StimulationLevel};
pub use params::{LearningParams, ModelParams, PersonalizationGate};
pub use sleep::SleepReadinessPredictor;
