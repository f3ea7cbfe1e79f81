//! Core domain math for the TSUKIHI microsimulation engine.
//!
//! This crate holds the pure, side-effect-free building blocks that the
//! engine composes every simulated month:
//!
//! - [`prob`]: probability/rate/logit algebra
//! - [`discount`]: monthly discounting of costs and life months
//! - [`response`]: the two-threshold piecewise-linear response curve used
//!   to map a patient's propensity to a per-outcome response factor
//! - [`mortality`]: composition of competing monthly mortality risks
//! - [`strata`]: CD4 and viral-load strata
//! - [`sampling`]: distribution helpers that consume pre-drawn uniforms
//!
//! Everything here is deterministic: functions that need randomness take
//! an already-drawn uniform in `[0, 1)` as an argument, so the engine
//! keeps full control of its random stream.

pub mod discount;
pub mod mortality;
pub mod prelude;
pub mod prob;
pub mod response;
pub mod sampling;
pub mod strata;

pub use discount::DiscountFactor;
pub use mortality::{MortalityRisk, RiskComposition};
pub use response::ResponseCurve;
pub use strata::{Cd4Strata, HvlStrata};
