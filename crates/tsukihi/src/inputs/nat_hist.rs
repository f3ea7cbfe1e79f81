//! Natural history: CD4/HVL drift off ART, background mortality,
//! opportunistic infections.

use serde::{Deserialize, Serialize};
use tsukihi_core::strata::{Cd4Strata, HvlStrata};

use crate::types::{Gender, OiSeverity};

/// Mean and standard deviation of a normal draw.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalParams {
    pub mean: f64,
    pub std_dev: f64,
}

impl NormalParams {
    pub fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }
}

/// Gating conditions controlling whether an OI event is logged into the
/// patient's OI history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OiHistoryGates {
    pub min_cd4: Option<f64>,
    pub max_cd4: Option<f64>,
    pub min_hvl: Option<HvlStrata>,
    pub max_hvl: Option<HvlStrata>,
    /// Logged only while the patient has at most this many observed ART failures.
    pub max_art_failures: Option<u32>,
    /// Never log this OI type.
    pub excluded: bool,
}

impl Default for OiHistoryGates {
    fn default() -> Self {
        Self {
            min_cd4: None,
            max_cd4: None,
            min_hvl: None,
            max_hvl: None,
            max_art_failures: None,
            excluded: false,
        }
    }
}

/// One opportunistic infection type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OiDef {
    pub name: String,
    pub severity: OiSeverity,
    /// Monthly probability by CD4 stratum without prior history of this OI.
    pub prob_primary: [f64; Cd4Strata::COUNT],
    /// Monthly probability by CD4 stratum with prior history.
    pub prob_secondary: [f64; Cd4Strata::COUNT],
    /// Rate multiplier applied while on qualifying ART.
    pub on_art_multiplier: f64,
    /// Death-rate ratio added in the month of a severe acute event.
    pub acute_death_rate_ratio: f64,
    /// Months a severe history keeps contributing a residual ratio.
    pub history_duration_months: u32,
    /// Residual death-rate ratio while the history window is open.
    pub history_death_rate_ratio: f64,
    /// Acute event cost and QOL modifier.
    pub acute_cost: f64,
    pub acute_qol_modifier: f64,
    /// Probability an acute event reveals undetected HIV.
    pub detection_prob: f64,
    /// Probability of linkage to care when detected through this OI.
    pub linkage_prob: f64,
    /// History logging gates.
    pub history_gates: OiHistoryGates,
}

impl Default for OiDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            severity: OiSeverity::Mild,
            prob_primary: [0.0; Cd4Strata::COUNT],
            prob_secondary: [0.0; Cd4Strata::COUNT],
            on_art_multiplier: 1.0,
            acute_death_rate_ratio: 1.0,
            history_duration_months: 0,
            history_death_rate_ratio: 1.0,
            acute_cost: 0.0,
            acute_qol_modifier: 1.0,
            detection_prob: 0.0,
            linkage_prob: 1.0,
            history_gates: OiHistoryGates::default(),
        }
    }
}

/// Natural-history inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatHistInputs {
    /// Monthly CD4 decline off ART, keyed by (CD4 stratum, HVL stratum).
    pub cd4_decline: [[NormalParams; HvlStrata::COUNT]; Cd4Strata::COUNT],
    /// Std dev of the once-per-patient between-subject increment added
    /// to every off-ART decline mean.
    pub cd4_decline_between_subject_sd: f64,
    /// Monthly probability that HVL steps one stratum toward its target.
    pub hvl_drift_prob: f64,
    /// Monthly CD4-percentage decline off ART for early childhood.
    pub cd4_percentage_decline: NormalParams,
    /// HIV death-rate ratio by CD4 stratum.
    pub hiv_death_rate_ratio: [f64; Cd4Strata::COUNT],
    /// HIV death-rate ratio for early childhood, by CD4 percentage band
    /// (below / at-or-above `peds_cd4_percentage_threshold`).
    pub hiv_death_rate_ratio_peds: [f64; 2],
    pub peds_cd4_percentage_threshold: f64,
    /// Background mortality: monthly death rate per age year and gender.
    /// The last entry covers all older ages.
    pub background_mortality: Vec<[f64; Gender::COUNT]>,
    /// Cohort-wide multiplier applied to the background rate.
    pub background_mortality_multiplier: f64,
    /// The OI catalogue, walked in order for the single monthly draw.
    pub ois: Vec<OiDef>,
    /// Treat TB as a generic OI slot when the TB module is disabled.
    pub tb_as_oi_when_disabled: Option<usize>,
}

impl Default for NatHistInputs {
    fn default() -> Self {
        Self {
            cd4_decline: [[NormalParams::default(); HvlStrata::COUNT]; Cd4Strata::COUNT],
            cd4_decline_between_subject_sd: 0.0,
            hvl_drift_prob: 0.0,
            cd4_percentage_decline: NormalParams::default(),
            hiv_death_rate_ratio: [1.0; Cd4Strata::COUNT],
            hiv_death_rate_ratio_peds: [1.0; 2],
            peds_cd4_percentage_threshold: 15.0,
            background_mortality: vec![[0.0; Gender::COUNT]],
            background_mortality_multiplier: 1.0,
            ois: Vec::new(),
            tb_as_oi_when_disabled: None,
        }
    }
}

impl NatHistInputs {
    /// Monthly background mortality rate for an age (in months) and gender.
    pub fn background_rate(&self, age_months: u32, gender: Gender) -> f64 {
        if self.background_mortality.is_empty() {
            return 0.0;
        }
        let age_years = (age_months / 12) as usize;
        let idx = age_years.min(self.background_mortality.len() - 1);
        self.background_mortality[idx][gender.index()] * self.background_mortality_multiplier
    }

    /// Number of configured OI types.
    pub fn oi_count(&self) -> usize {
        self.ois.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_rate_lookup() {
        let inputs = NatHistInputs {
            background_mortality: vec![[0.001, 0.002], [0.003, 0.004]],
            ..Default::default()
        };
        assert_eq!(inputs.background_rate(6, Gender::Male), 0.001);
        assert_eq!(inputs.background_rate(6, Gender::Female), 0.002);
        // Ages past the table use the last row.
        assert_eq!(inputs.background_rate(1200, Gender::Male), 0.003);
    }

    #[test]
    fn test_background_multiplier_applies_to_rate() {
        let inputs = NatHistInputs {
            background_mortality: vec![[0.01, 0.01]],
            background_mortality_multiplier: 1.5,
            ..Default::default()
        };
        assert!((inputs.background_rate(0, Gender::Male) - 0.015).abs() < 1e-12);
    }

    #[test]
    fn test_empty_table_is_zero_rate() {
        let inputs = NatHistInputs {
            background_mortality: Vec::new(),
            ..Default::default()
        };
        assert_eq!(inputs.background_rate(360, Gender::Female), 0.0);
    }
}
