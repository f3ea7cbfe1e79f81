//! Response heterogeneity: baseline logit covariates and adherence
//! interventions.

use serde::{Deserialize, Serialize};
use tsukihi_core::strata::Cd4Strata;

use crate::inputs::nat_hist::NormalParams;
use crate::types::LogitDistribution;

/// Number of adult age categories for the heterogeneity coefficients.
pub const HET_AGE_CATS: usize = 5;

/// Adult age category for the heterogeneity age coefficient.
pub fn het_age_category(age_months: u32) -> usize {
    match age_months / 12 {
        0..=29 => 0,
        30..=39 => 1,
        40..=49 => 2,
        50..=59 => 3,
        _ => 4,
    }
}

/// One configured adherence-intervention period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionPeriod {
    pub enable: bool,
    /// Normal draw for the intervention duration in months.
    pub duration: NormalParams,
    /// Draw for the additive logit adjustment while active.
    pub adjustment: NormalParams,
    pub adjustment_distribution: LogitDistribution,
    pub cost_at_start: f64,
    pub cost_monthly: f64,
}

impl Default for InterventionPeriod {
    fn default() -> Self {
        Self {
            enable: false,
            duration: NormalParams::default(),
            adjustment: NormalParams::default(),
            adjustment_distribution: LogitDistribution::Normal,
            cost_at_start: 0.0,
            cost_monthly: 0.0,
        }
    }
}

/// Heterogeneity inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeterogeneityInputs {
    /// Baseline per-patient response logit draw.
    pub baseline_logit: NormalParams,
    /// Additive coefficient per adult age category.
    pub age_coefficient: [f64; HET_AGE_CATS],
    /// Coefficients for late childhood and early childhood.
    pub age_coefficient_late_childhood: f64,
    pub age_coefficient_early_childhood: f64,
    /// Additive coefficient per current true CD4 stratum.
    pub cd4_coefficient: [f64; Cd4Strata::COUNT],
    pub female_coefficient: f64,
    pub oi_history_coefficient: f64,
    pub prior_toxicity_coefficient: f64,
    /// Per entry risk factor, parallel to the cohort risk factors.
    pub risk_factor_coefficient: Vec<f64>,
    /// Sequential adherence-intervention periods.
    pub interventions: Vec<InterventionPeriod>,
}

impl Default for HeterogeneityInputs {
    fn default() -> Self {
        Self {
            baseline_logit: NormalParams::default(),
            age_coefficient: [0.0; HET_AGE_CATS],
            age_coefficient_late_childhood: 0.0,
            age_coefficient_early_childhood: 0.0,
            cd4_coefficient: [0.0; Cd4Strata::COUNT],
            female_coefficient: 0.0,
            oi_history_coefficient: 0.0,
            prior_toxicity_coefficient: 0.0,
            risk_factor_coefficient: Vec::new(),
            interventions: Vec::new(),
        }
    }
}

impl HeterogeneityInputs {
    /// First enabled intervention period at or after `from`.
    pub fn next_intervention(&self, from: usize) -> Option<usize> {
        (from..self.interventions.len()).find(|i| self.interventions[*i].enable)
    }
}
