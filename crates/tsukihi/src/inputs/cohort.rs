//! Cohort composition: entry distributions and HIV incidence.

use serde::{Deserialize, Serialize};
use tsukihi_core::strata::Cd4Strata;

use crate::types::{Gender, HivState, TransmRisk};

/// One stratum of the custom age distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeStratum {
    pub min_months: u32,
    pub max_months: u32,
    pub weight: f64,
}

/// How entry age is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgeDistribution {
    /// Single normal draw, in months.
    Normal { mean: f64, std_dev: f64 },
    /// CDF over up to eight [min, max] strata, uniform within a stratum.
    Custom(Vec<AgeStratum>),
}

impl Default for AgeDistribution {
    fn default() -> Self {
        AgeDistribution::Normal {
            mean: 360.0,
            std_dev: 60.0,
        }
    }
}

/// A user-labelled binary risk factor sampled at entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactorDef {
    pub name: String,
    /// Bernoulli probability of carrying the factor at entry.
    pub prevalence: f64,
    /// Monthly death-rate ratio while the factor is present (1 = none).
    #[serde(default = "one")]
    pub death_rate_ratio: f64,
}

fn one() -> f64 {
    1.0
}

/// One age bin of the monthly HIV incidence table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidenceBin {
    /// Upper age bound (exclusive), in months.
    pub max_age_months: u32,
    /// Monthly infection probability by gender then risk category.
    pub prob: [[f64; TransmRisk::COUNT]; Gender::COUNT],
}

/// One segment of the piecewise incidence-reduction multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncidenceReduction {
    /// Calendar month the segment starts.
    pub start_month: u32,
    /// Multiplier applied to the incidence rate from that month on.
    pub multiplier: f64,
}

/// Cohort entry and incidence inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortInputs {
    /// Entry age distribution.
    pub age: AgeDistribution,
    /// Fraction of the cohort that is male.
    pub male_fraction: f64,
    /// Entry distribution over HIV states
    /// (negative, acute, chronic asymptomatic, chronic symptomatic).
    pub initial_hiv_state: [f64; HivState::COUNT],
    /// Entry CD4 for HIV-positive patients: normal mean and std dev.
    pub initial_cd4_mean: f64,
    pub initial_cd4_std_dev: f64,
    /// Sample on the square-root scale and square the result.
    pub initial_cd4_sqrt_scale: bool,
    /// Highest representable CD4 count; draws clamp into [0, max].
    pub max_cd4: f64,
    /// Entry HVL distribution conditioned on the CD4 stratum.
    pub initial_hvl_given_cd4: [[f64; 7]; Cd4Strata::COUNT],
    /// Setpoint HVL distribution conditioned on the CD4 stratum, used
    /// when incident infection happens during the run.
    pub setpoint_hvl_given_cd4: [[f64; 7]; Cd4Strata::COUNT],
    /// Distribution over transmission risk categories.
    pub transm_risk_dist: [f64; TransmRisk::COUNT],
    /// User-labelled entry risk factors.
    pub risk_factors: Vec<RiskFactorDef>,
    /// Fraction of HIV-negative entrants considered high risk for HIV.
    pub high_risk_fraction: f64,
    /// Monthly HIV incidence by age bin (applies to high-risk negatives;
    /// low-risk negatives use `low_risk_incidence_multiplier`).
    pub incidence: Vec<IncidenceBin>,
    /// Rate multiplier applied to incidence for low-risk negatives.
    pub low_risk_incidence_multiplier: f64,
    /// Piecewise calendar multiplier on the incidence rate.
    pub incidence_reduction: Vec<IncidenceReduction>,
    /// Months spent in the acute syndrome before chronic transition.
    pub acute_duration_months: u32,
    /// Distribution over CD4 response types on ART.
    pub cd4_response_type_dist: [f64; 4],
}

impl Default for CohortInputs {
    fn default() -> Self {
        Self {
            age: AgeDistribution::default(),
            male_fraction: 0.5,
            initial_hiv_state: [1.0, 0.0, 0.0, 0.0],
            initial_cd4_mean: 350.0,
            initial_cd4_std_dev: 150.0,
            initial_cd4_sqrt_scale: false,
            max_cd4: 2_000.0,
            initial_hvl_given_cd4: [[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]; Cd4Strata::COUNT],
            setpoint_hvl_given_cd4: [[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]; Cd4Strata::COUNT],
            transm_risk_dist: [0.0, 0.0, 1.0],
            risk_factors: Vec::new(),
            high_risk_fraction: 1.0,
            incidence: Vec::new(),
            low_risk_incidence_multiplier: 1.0,
            incidence_reduction: Vec::new(),
            acute_duration_months: 2,
            cd4_response_type_dist: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl CohortInputs {
    /// Monthly infection probability for an uninfected patient.
    pub fn incidence_prob(&self, gender: Gender, age_months: u32, risk: TransmRisk) -> f64 {
        for bin in &self.incidence {
            if age_months < bin.max_age_months {
                return bin.prob[gender.index()][risk.index()];
            }
        }
        0.0
    }

    /// Calendar incidence-reduction multiplier for a month.
    pub fn incidence_multiplier(&self, month: u32) -> f64 {
        let mut mult = 1.0;
        for seg in &self.incidence_reduction {
            if month >= seg.start_month {
                mult = seg.multiplier;
            }
        }
        mult
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incidence_lookup_uses_age_bins() {
        let inputs = CohortInputs {
            incidence: vec![
                IncidenceBin {
                    max_age_months: 300,
                    prob: [[0.01; 3]; 2],
                },
                IncidenceBin {
                    max_age_months: 600,
                    prob: [[0.002; 3]; 2],
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            inputs.incidence_prob(Gender::Male, 200, TransmRisk::Other),
            0.01
        );
        assert_eq!(
            inputs.incidence_prob(Gender::Female, 400, TransmRisk::Other),
            0.002
        );
        // Past the last bin there is no incidence.
        assert_eq!(
            inputs.incidence_prob(Gender::Male, 900, TransmRisk::Other),
            0.0
        );
    }

    #[test]
    fn test_incidence_multiplier_piecewise() {
        let inputs = CohortInputs {
            incidence_reduction: vec![
                IncidenceReduction {
                    start_month: 12,
                    multiplier: 0.8,
                },
                IncidenceReduction {
                    start_month: 24,
                    multiplier: 0.5,
                },
            ],
            ..Default::default()
        };
        assert_eq!(inputs.incidence_multiplier(0), 1.0);
        assert_eq!(inputs.incidence_multiplier(12), 0.8);
        assert_eq!(inputs.incidence_multiplier(36), 0.5);
    }

    #[test]
    fn test_defaults_are_hiv_negative_cohort() {
        let inputs = CohortInputs::default();
        assert_eq!(inputs.initial_hiv_state[0], 1.0);
        assert!(inputs.risk_factors.is_empty());
    }
}
