//! Pediatrics: maternal state, mother-to-child transmission,
//! breastfeeding, early-childhood CD4 percentage, EID and infant
//! prophylaxis.

use serde::{Deserialize, Serialize};

use crate::inputs::nat_hist::NormalParams;
use crate::types::{Breastfeeding, MaternalStatus, PedsHivState};

/// One EID assay in the test schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EidAssayDef {
    pub name: String,
    /// Visit age at which this assay is offered, in months.
    pub offer_age_months: u32,
    pub offer_prob: f64,
    /// Probability of a positive result per pediatric HIV state; the
    /// `Negative` entry is the false-positive rate.
    pub prob_positive_iu: f64,
    pub prob_positive_ip: f64,
    pub prob_positive_pp: f64,
    pub prob_positive_uninfected: f64,
    /// Months until the result returns and the pickup probability.
    pub result_return_months: u32,
    pub pickup_prob: f64,
    pub cost: f64,
    /// Index of the confirmatory assay run on a positive result.
    pub confirmatory: Option<usize>,
}

impl Default for EidAssayDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            offer_age_months: 0,
            offer_prob: 1.0,
            prob_positive_iu: 1.0,
            prob_positive_ip: 1.0,
            prob_positive_pp: 1.0,
            prob_positive_uninfected: 0.0,
            result_return_months: 1,
            pickup_prob: 1.0,
            cost: 0.0,
            confirmatory: None,
        }
    }
}

impl EidAssayDef {
    /// Positive-result probability for a pediatric HIV state.
    pub fn prob_positive(&self, state: PedsHivState) -> f64 {
        match state {
            PedsHivState::Negative => self.prob_positive_uninfected,
            PedsHivState::IntraUterine => self.prob_positive_iu,
            PedsHivState::IntraPartum => self.prob_positive_ip,
            PedsHivState::PostPartum => self.prob_positive_pp,
        }
    }
}

/// One infant HIV prophylaxis line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfantProphDef {
    pub name: String,
    /// Dose age in months and eligibility window.
    pub dose_age_months: u32,
    pub max_age_months: u32,
    /// Probability the dose is effective when given.
    pub prob_effective: f64,
    /// Rate multiplier on MTCT while effective.
    pub transmission_multiplier: f64,
    /// Months the protective effect lasts.
    pub effect_months: u32,
    pub prob_major_toxicity: f64,
    pub cost: f64,
    /// Only infants with a recent negative EID result are eligible.
    pub requires_negative_eid: bool,
}

impl Default for InfantProphDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            dose_age_months: 0,
            max_age_months: 24,
            prob_effective: 0.0,
            transmission_multiplier: 1.0,
            effect_months: 0,
            prob_major_toxicity: 0.0,
            cost: 0.0,
            requires_negative_eid: false,
        }
    }
}

/// Early-infant-diagnosis subsystem inputs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EidInputs {
    pub enable: bool,
    /// Probability of being enrolled in the EID system at birth.
    pub prob_enrolled: f64,
    pub assays: Vec<EidAssayDef>,
    /// Probability of linkage to care after a confirmed positive.
    pub linkage_prob: f64,
    /// Probability a false-positive infant is started in care anyway.
    pub false_positive_link_prob: f64,
    pub infant_prophs: Vec<InfantProphDef>,
}

/// Pediatrics module inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PedsInputs {
    pub enable: bool,
    /// Distribution over maternal status at birth.
    pub maternal_status_dist: [f64; MaternalStatus::COUNT],
    /// Probability the mother is on ART at delivery given HIV-positive,
    /// and suppressed given on ART.
    pub prob_mother_on_art: f64,
    pub prob_mother_suppressed: f64,
    /// Probabilities the maternal status is known to the provider.
    pub prob_maternal_status_known: f64,
    pub prob_suppression_known: f64,
    /// Monthly probability the mother dies.
    pub prob_maternal_death: f64,
    /// Monthly probability an HIV-negative mother seroconverts while
    /// breastfeeding.
    pub prob_maternal_incident_infection: f64,
    /// Intrauterine / intrapartum transmission probability by maternal
    /// status.
    pub prob_mtct_iu: [f64; MaternalStatus::COUNT],
    pub prob_mtct_ip: [f64; MaternalStatus::COUNT],
    /// Monthly postpartum transmission probability by maternal status,
    /// applied while breastfeeding.
    pub prob_mtct_pp_monthly: [f64; MaternalStatus::COUNT],
    /// Rate multipliers on MTCT when the mother is on ART / suppressed.
    pub mother_on_art_multiplier: f64,
    pub mother_suppressed_multiplier: f64,
    /// Distribution over breastfeeding modes at birth.
    pub breastfeeding_dist: [f64; Breastfeeding::COUNT],
    /// Age breastfeeding stops.
    pub breastfeeding_stop_age: NormalParams,
    /// Entry CD4 percentage for infected infants.
    pub initial_cd4_percentage: NormalParams,
    /// Conversion from CD4 percentage to absolute CD4 at the early→late
    /// childhood transition: `absolute = percentage * factor`.
    pub percentage_to_absolute_factor: f64,
    /// Mortality rate multiplier for HIV-exposed-uninfected children.
    pub heu_mortality_multiplier: f64,
    /// Months the HEU multiplier applies from birth.
    pub heu_mortality_months: u32,
    pub eid: EidInputs,
}

impl Default for PedsInputs {
    fn default() -> Self {
        Self {
            enable: false,
            maternal_status_dist: [1.0, 0.0, 0.0, 0.0],
            prob_mother_on_art: 0.0,
            prob_mother_suppressed: 0.0,
            prob_maternal_status_known: 1.0,
            prob_suppression_known: 1.0,
            prob_maternal_death: 0.0,
            prob_maternal_incident_infection: 0.0,
            prob_mtct_iu: [0.0; MaternalStatus::COUNT],
            prob_mtct_ip: [0.0; MaternalStatus::COUNT],
            prob_mtct_pp_monthly: [0.0; MaternalStatus::COUNT],
            mother_on_art_multiplier: 1.0,
            mother_suppressed_multiplier: 1.0,
            breastfeeding_dist: [0.0, 0.0, 0.0, 1.0],
            breastfeeding_stop_age: NormalParams::new(18.0, 0.0),
            initial_cd4_percentage: NormalParams::new(35.0, 5.0),
            percentage_to_absolute_factor: 15.0,
            heu_mortality_multiplier: 1.0,
            heu_mortality_months: 0,
            eid: EidInputs::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disabled_replacement_fed() {
        let inputs = PedsInputs::default();
        assert!(!inputs.enable);
        assert_eq!(inputs.breastfeeding_dist[Breastfeeding::Replacement.index()], 1.0);
    }

    #[test]
    fn test_assay_prob_by_state() {
        let assay = EidAssayDef {
            prob_positive_uninfected: 0.02,
            prob_positive_iu: 0.98,
            ..Default::default()
        };
        assert_eq!(assay.prob_positive(PedsHivState::Negative), 0.02);
        assert_eq!(assay.prob_positive(PedsHivState::IntraUterine), 0.98);
    }
}
