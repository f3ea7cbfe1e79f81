//! Chronic conditions (CHRMs): incidence and staged ongoing effects.

use serde::{Deserialize, Serialize};
use tsukihi_core::strata::Cd4Strata;

/// Number of stages a chronic condition progresses through.
pub const CHRM_STAGES: usize = 3;

/// One chronic condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChrmDef {
    pub name: String,
    /// Probability of being prevalent at model entry (HIV-positive only).
    pub prevalence_at_entry: f64,
    /// Monthly incidence by CD4 stratum; HIV-negative patients use
    /// `incidence_hiv_negative`.
    pub incidence: [f64; Cd4Strata::COUNT],
    pub incidence_hiv_negative: f64,
    /// Rate multiplier applied while on qualifying ART.
    pub on_art_multiplier: f64,
    /// Incidence rate multiplier per entry risk factor carried.
    pub risk_factor_multipliers: Vec<f64>,
    /// Months spent in each stage; the final stage lasts until death.
    pub stage_months: [u32; CHRM_STAGES - 1],
    /// Monthly cost while in each stage.
    pub stage_cost: [f64; CHRM_STAGES],
    /// Monthly QOL modifier while in each stage.
    pub stage_qol_modifier: [f64; CHRM_STAGES],
    /// Monthly death-rate ratio while in each stage.
    pub stage_death_rate_ratio: [f64; CHRM_STAGES],
}

impl Default for ChrmDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            prevalence_at_entry: 0.0,
            incidence: [0.0; Cd4Strata::COUNT],
            incidence_hiv_negative: 0.0,
            on_art_multiplier: 1.0,
            risk_factor_multipliers: Vec::new(),
            stage_months: [12; CHRM_STAGES - 1],
            stage_cost: [0.0; CHRM_STAGES],
            stage_qol_modifier: [1.0; CHRM_STAGES],
            stage_death_rate_ratio: [1.0; CHRM_STAGES],
        }
    }
}

impl ChrmDef {
    /// Stage index for a condition that started `months_since_start` ago.
    pub fn stage_for(&self, months_since_start: u32) -> usize {
        let mut elapsed = 0;
        for (stage, len) in self.stage_months.iter().enumerate() {
            elapsed += len;
            if months_since_start < elapsed {
                return stage;
            }
        }
        CHRM_STAGES - 1
    }
}

/// Chronic-condition inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChrmsInputs {
    pub enable: bool,
    pub chrms: Vec<ChrmDef>,
}

impl ChrmsInputs {
    pub fn chrm_count(&self) -> usize {
        self.chrms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progression() {
        let chrm = ChrmDef {
            stage_months: [6, 18],
            ..Default::default()
        };
        assert_eq!(chrm.stage_for(0), 0);
        assert_eq!(chrm.stage_for(5), 0);
        assert_eq!(chrm.stage_for(6), 1);
        assert_eq!(chrm.stage_for(23), 1);
        assert_eq!(chrm.stage_for(24), 2);
        assert_eq!(chrm.stage_for(500), 2);
    }

    #[test]
    fn test_disabled_by_default() {
        let inputs = ChrmsInputs::default();
        assert!(!inputs.enable);
        assert_eq!(inputs.chrm_count(), 0);
    }
}
