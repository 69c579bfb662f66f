//! # Caffy Core Library
//!
//! Core logic for the Caffy caffeine tracker: a pharmacokinetic decay
//! model, a personal half-life learner and the SQLite storage behind them.
//! The `caffy` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Model**: pure calculations (decay curve, aggregate totals, sleep
//!   readiness, half-life resolution), always evaluated at an explicit time
//! - **Learning**: realtime EMA updates and batch grid search from
//!   perception feedback
//! - **Storage**: SQLite persistence and TOML-based configuration
//! - **Service**: fetch, compute and store, over any [`Repository`]
//!
//! ## Key Components
//!
//! - [`CaffeineService`]: every user-facing operation
//! - [`AggregateEstimator`]: total remaining amount across intakes
//! - [`PersonalizationLearner`]: learns a personal half-life
//! - [`Database`]: SQLite-backed [`Repository`]
//! - [`Config`]: application configuration management

pub mod error;
pub mod learning;
pub mod model;
pub mod repository;
pub mod service;
pub mod storage;

pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use learning::{
    FeedbackEvent, LearningHistoryEntry, LearningReason, PerceivedLevel, PersonalizationLearner,
    PersonalizationPhase, PersonalizationState,
};
pub use model::{
    AggregateEstimator, DecayModel, HalfLifeResolver, IntakeCorrection, IntakeEvent, Metabolism,
    MetabolismProfile, SleepReadinessPredictor, StimulationLevel,
};
pub use repository::Repository;
pub use service::{CaffeineService, FeedbackOutcome, IntakeBudget, IntakeHistory, LearningStats, Prediction, Status};
pub use storage::{Config, Database};
