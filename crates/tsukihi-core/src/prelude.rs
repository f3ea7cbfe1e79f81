//! Convenience re-exports for downstream crates.

pub use crate::discount::DiscountFactor;
pub use crate::mortality::{MortalityRisk, RiskComposition};
pub use crate::prob::{
    logit_to_prob, prob_logit_adjustment, prob_rate_multiply, prob_to_logit, prob_to_rate,
    rate_to_prob,
};
pub use crate::response::ResponseCurve;
pub use crate::sampling::{categorical_index, clamp_non_negative};
pub use crate::strata::{Cd4Strata, HvlStrata};
