//! Tuberculosis module inputs: natural history, diagnostics, treatment,
//! prophylaxis, LTFU.

use serde::{Deserialize, Serialize};
use tsukihi_core::strata::Cd4Strata;

use crate::types::{TbState, TbStrain};

/// Number of HIV classes used by the TB tables: HIV-negative plus the
/// six CD4 strata for HIV-positive patients.
pub const HIV_CLASSES: usize = 1 + Cd4Strata::COUNT;

/// Table index for a patient's HIV class.
pub fn hiv_class(hiv_positive: bool, cd4_strata: Cd4Strata) -> usize {
    if hiv_positive {
        1 + cd4_strata.index()
    } else {
        0
    }
}

/// Maximum slots in a diagnostic test chain.
pub const TB_CHAIN_SLOTS: usize = 4;

/// One age bin of the TB infection table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TbInfectionBin {
    /// Upper age bound (exclusive), in months.
    pub max_age_months: u32,
    /// Monthly infection probability per HIV class.
    pub prob: [f64; HIV_CLASSES],
}

/// Relapse hazard from the previously-treated and default states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbRelapseInputs {
    /// Base monthly relapse rate.
    pub base_rate: f64,
    /// The hazard grows as `(months since treatment)^exponent` once past
    /// the threshold.
    pub exponent: f64,
    pub threshold_months: u32,
    /// Months after treatment stop during which the treatment's
    /// anti-relapse efficacy still applies.
    pub efficacy_horizon: u32,
    /// Multiplier per HIV class.
    pub hiv_class_multiplier: [f64; HIV_CLASSES],
    /// Extra multiplier for patients in the treatment-default state.
    pub default_multiplier: f64,
}

impl Default for TbRelapseInputs {
    fn default() -> Self {
        Self {
            base_rate: 0.0,
            exponent: 0.0,
            threshold_months: 0,
            efficacy_horizon: 0,
            hiv_class_multiplier: [1.0; HIV_CLASSES],
            default_multiplier: 1.0,
        }
    }
}

/// One diagnostic test definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbTestDef {
    pub name: String,
    pub accept_prob: f64,
    /// Probability the patient picks up the returned result.
    pub pickup_prob: f64,
    /// Probability of a positive result per (true TB state, HIV class).
    /// Rows for uninfected/latent encode 1 - specificity.
    pub prob_positive: [[f64; HIV_CLASSES]; TbState::COUNT],
    /// Months until the result returns.
    pub result_return_months: u32,
    /// A skipped pickup resets the whole chain.
    pub reset_chain_on_no_pickup: bool,
    pub cost: f64,
    /// Probability empiric treatment starts alongside a positive result.
    pub empiric_start_on_positive: f64,
    /// Probability empiric treatment stops on a negative result.
    pub empiric_stop_on_negative: f64,
}

impl Default for TbTestDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            accept_prob: 1.0,
            pickup_prob: 1.0,
            prob_positive: [[0.0; HIV_CLASSES]; TbState::COUNT],
            result_return_months: 0,
            reset_chain_on_no_pickup: false,
            cost: 0.0,
            empiric_start_on_positive: 0.0,
            empiric_stop_on_negative: 0.0,
        }
    }
}

/// Eligibility gates for starting a diagnostic chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbDiagEligibility {
    /// Symptoms tracker triggers testing and overrides the cooldown.
    pub on_symptoms: bool,
    /// Test upon HIV diagnosis.
    pub on_hiv_diagnosis: bool,
    /// Test in a month with an acute OI.
    pub on_acute_oi: bool,
    /// Test while observed CD4 is below this bound.
    pub observed_cd4_below: Option<f64>,
    /// Calendar month testing begins.
    pub min_month: u32,
    /// Periodic interval testing for the eligible fraction.
    pub interval_months: Option<u32>,
    /// Probability of being eligible for interval testing, rolled once.
    pub interval_eligibility_prob: f64,
    /// Cooldown after a completed treatment, overridable by symptoms only.
    pub min_months_post_treatment: u32,
}

impl Default for TbDiagEligibility {
    fn default() -> Self {
        Self {
            on_symptoms: true,
            on_hiv_diagnosis: false,
            on_acute_oi: false,
            observed_cd4_below: None,
            min_month: 0,
            interval_months: None,
            interval_eligibility_prob: 0.0,
            min_months_post_treatment: 0,
        }
    }
}

/// Diagnostic chain configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbDiagnosticsInputs {
    pub enable: bool,
    /// Evaluate chained tests within a single month when results allow.
    pub allow_multiple_tests_per_month: bool,
    pub tests: Vec<TbTestDef>,
    /// Test index per chain slot; `None` ends the chain.
    pub chain: [Option<usize>; TB_CHAIN_SLOTS],
    /// Next slot to move to after a positive / negative result at each
    /// slot; `None` concludes the chain with that interpretation.
    pub next_on_positive: [Option<usize>; TB_CHAIN_SLOTS],
    pub next_on_negative: [Option<usize>; TB_CHAIN_SLOTS],
    /// Run drug-susceptibility testing alongside the test at this slot.
    pub dst_at_slot: Option<usize>,
    /// Months for the DST result to return.
    pub dst_return_months: u32,
    /// Probability the DST reports the true strain; otherwise DS.
    pub dst_accuracy: f64,
    pub dst_cost: f64,
    /// Probability of entering the model already in TB treatment, per
    /// true TB state, for HIV-positive and HIV-negative patients.
    pub init_in_treatment_hiv_pos: [f64; TbState::COUNT],
    pub init_in_treatment_hiv_neg: [f64; TbState::COUNT],
    pub eligibility: TbDiagEligibility,
}

impl Default for TbDiagnosticsInputs {
    fn default() -> Self {
        Self {
            enable: false,
            allow_multiple_tests_per_month: false,
            tests: Vec::new(),
            chain: [None; TB_CHAIN_SLOTS],
            next_on_positive: [None; TB_CHAIN_SLOTS],
            next_on_negative: [None; TB_CHAIN_SLOTS],
            dst_at_slot: None,
            dst_return_months: 1,
            dst_accuracy: 1.0,
            dst_cost: 0.0,
            init_in_treatment_hiv_pos: [0.0; TbState::COUNT],
            init_in_treatment_hiv_neg: [0.0; TbState::COUNT],
            eligibility: TbDiagEligibility::default(),
        }
    }
}

/// One TB treatment line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbTreatmentDef {
    pub name: String,
    /// Total duration and the months belonging to stage 1.
    pub duration_months: u32,
    pub stage1_months: u32,
    /// Monthly cost per stage.
    pub monthly_cost: [f64; 2],
    /// Toxicity probabilities per stage for HIV-negative patients.
    pub prob_major_tox_hiv_neg: [f64; 2],
    pub prob_minor_tox_hiv_neg: [f64; 2],
    /// Per stage for HIV-positive patients, off and on ART; on-ART
    /// values blend with the off-ART values by the toxicity response
    /// factor.
    pub prob_major_tox_off_art: [f64; 2],
    pub prob_major_tox_on_art: [f64; 2],
    pub prob_minor_tox_off_art: [f64; 2],
    pub prob_minor_tox_on_art: [f64; 2],
    pub cost_major_tox: f64,
    pub cost_minor_tox: f64,
    pub qol_major_tox: f64,
    pub qol_minor_tox: f64,
    pub major_tox_death_rate_ratio: f64,
    /// Probability of cure at completion, per HIV class.
    pub prob_success: [f64; HIV_CLASSES],
    /// Efficacy of the treatment against this strain; failure is forced
    /// for strains the line does not cover.
    pub covers_strain: [bool; TbStrain::COUNT],
    /// Early observed failure check at this month on treatment.
    pub observed_failure_month: Option<u32>,
    /// Cost of the confirmatory test on observed failure.
    pub observed_failure_confirm_cost: f64,
    /// Switch to the next line on observed failure.
    pub switch_on_observed_failure: bool,
    /// Times this line may repeat.
    pub max_repeats: u32,
    /// Probability resistance escalates when the line fails.
    pub prob_resistance_on_failure: f64,
    /// Disease-side efficacy while on and shortly after treatment.
    pub anti_infection_multiplier: f64,
    pub anti_activation_multiplier: f64,
    pub anti_relapse_multiplier: f64,
    pub efficacy_horizon: u32,
}

impl Default for TbTreatmentDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            duration_months: 6,
            stage1_months: 2,
            monthly_cost: [0.0; 2],
            prob_major_tox_hiv_neg: [0.0; 2],
            prob_minor_tox_hiv_neg: [0.0; 2],
            prob_major_tox_off_art: [0.0; 2],
            prob_major_tox_on_art: [0.0; 2],
            prob_minor_tox_off_art: [0.0; 2],
            prob_minor_tox_on_art: [0.0; 2],
            cost_major_tox: 0.0,
            cost_minor_tox: 0.0,
            qol_major_tox: 1.0,
            qol_minor_tox: 1.0,
            major_tox_death_rate_ratio: 1.0,
            prob_success: [1.0; HIV_CLASSES],
            covers_strain: [true, false, false],
            observed_failure_month: None,
            observed_failure_confirm_cost: 0.0,
            switch_on_observed_failure: true,
            max_repeats: 0,
            prob_resistance_on_failure: 0.0,
            anti_infection_multiplier: 1.0,
            anti_activation_multiplier: 1.0,
            anti_relapse_multiplier: 1.0,
            efficacy_horizon: 0,
        }
    }
}

/// One TB prophylaxis line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbProphDef {
    pub name: String,
    pub duration_months: u32,
    pub monthly_cost: f64,
    /// Rate multipliers while on prophylaxis.
    pub infection_multiplier: f64,
    pub activation_multiplier: [f64; TbStrain::COUNT],
    pub reinfection_multiplier: [f64; TbStrain::COUNT],
    /// Multipliers after stopping, decaying over the horizon.
    pub post_infection_multiplier: f64,
    pub post_activation_multiplier: [f64; TbStrain::COUNT],
    pub decay_horizon_months: u32,
    /// Toxicity probabilities by HIV/ART status.
    pub prob_major_tox_hiv_neg: f64,
    pub prob_minor_tox_hiv_neg: f64,
    pub prob_major_tox_off_art: f64,
    pub prob_major_tox_on_art: f64,
    pub prob_minor_tox_off_art: f64,
    pub prob_minor_tox_on_art: f64,
    pub cost_major_tox: f64,
    pub cost_minor_tox: f64,
    pub qol_major_tox: f64,
    pub qol_minor_tox: f64,
    pub major_tox_death_rate_ratio: f64,
    /// Times this line may restart.
    pub max_restarts: u32,
}

impl Default for TbProphDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            duration_months: 6,
            monthly_cost: 0.0,
            infection_multiplier: 1.0,
            activation_multiplier: [1.0; TbStrain::COUNT],
            reinfection_multiplier: [1.0; TbStrain::COUNT],
            post_infection_multiplier: 1.0,
            post_activation_multiplier: [1.0; TbStrain::COUNT],
            decay_horizon_months: 0,
            prob_major_tox_hiv_neg: 0.0,
            prob_minor_tox_hiv_neg: 0.0,
            prob_major_tox_off_art: 0.0,
            prob_major_tox_on_art: 0.0,
            prob_minor_tox_off_art: 0.0,
            prob_minor_tox_on_art: 0.0,
            cost_major_tox: 0.0,
            cost_minor_tox: 0.0,
            qol_major_tox: 1.0,
            qol_minor_tox: 1.0,
            major_tox_death_rate_ratio: 1.0,
            max_restarts: 0,
        }
    }
}

/// Start/stop policy for TB prophylaxis; OR or AND over the configured
/// conditions, split by whether the patient is known HIV-positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbProphPolicy {
    pub use_or: bool,
    pub observed_cd4_below: Option<f64>,
    /// Require being on / off ART.
    pub on_art: Option<bool>,
    /// Require (or forbid) a TB diagnosis history.
    pub tb_diagnosis_history: Option<bool>,
    /// Require (or forbid) a TB treatment history.
    pub treatment_history: Option<bool>,
    /// Require the immune-reactive tracker.
    pub immune_reactive: Option<bool>,
    /// Months on prophylaxis (stop policies).
    pub months_on_proph: Option<u32>,
    /// Start only after a TB diagnosis.
    pub after_tb_diagnosis: bool,
}

impl Default for TbProphPolicy {
    fn default() -> Self {
        Self {
            use_or: true,
            observed_cd4_below: None,
            on_art: None,
            tb_diagnosis_history: None,
            treatment_history: None,
            immune_reactive: None,
            months_on_proph: None,
            after_tb_diagnosis: false,
        }
    }
}

/// TB prophylaxis program inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbProphProgram {
    pub enable: bool,
    pub lines: Vec<TbProphDef>,
    /// Order in which lines are taken; indexes into `lines`.
    pub order: Vec<usize>,
    pub start_known_hiv_pos: TbProphPolicy,
    pub start_not_known_hiv_pos: TbProphPolicy,
    pub stop_known_hiv_pos: TbProphPolicy,
    pub stop_not_known_hiv_pos: TbProphPolicy,
    /// Monthly probability of dropping off prophylaxis.
    pub prob_dropoff: f64,
    /// Move to the next line after a major toxicity (else stop for good).
    pub move_to_next_after_toxicity: bool,
    /// Probability prophylaxis stops when the patient goes HIV-LTFU at
    /// an integrated clinic.
    pub prob_stop_at_hiv_ltfu: f64,
    /// A scheduled start may proceed while HIV-LTFU.
    pub allow_start_while_hiv_ltfu: bool,
}

impl Default for TbProphProgram {
    fn default() -> Self {
        Self {
            enable: false,
            lines: Vec::new(),
            order: Vec::new(),
            start_known_hiv_pos: TbProphPolicy::default(),
            start_not_known_hiv_pos: TbProphPolicy::default(),
            stop_known_hiv_pos: TbProphPolicy::default(),
            stop_not_known_hiv_pos: TbProphPolicy::default(),
            prob_dropoff: 0.0,
            move_to_next_after_toxicity: false,
            prob_stop_at_hiv_ltfu: 0.0,
            allow_start_while_hiv_ltfu: false,
        }
    }
}

/// TB LTFU/RTC inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbLtfuInputs {
    pub use_tb_ltfu: bool,
    /// Monthly LTFU probability per treatment stage.
    pub prob_ltfu_by_stage: [f64; 2],
    /// Monthly RTC probability for HIV-negative / HIV-positive patients.
    pub prob_rtc: [f64; 2],
    /// Being lost this long forces a return to care.
    pub max_months_ltfu: u32,
    /// Months lost mid-treatment before long-term effects set in and the
    /// patient defaults.
    pub months_to_default: u32,
    /// Probability a default escalates resistance.
    pub prob_resistance_on_default: f64,
}

impl Default for TbLtfuInputs {
    fn default() -> Self {
        Self {
            use_tb_ltfu: false,
            prob_ltfu_by_stage: [0.0; 2],
            prob_rtc: [0.0; 2],
            max_months_ltfu: 0,
            months_to_default: 2,
            prob_resistance_on_default: 0.0,
        }
    }
}

/// Complete TB module inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbInputs {
    pub enable: bool,
    /// HIV LTFU drives TB LTFU and proph decisions.
    pub integrated_clinic: bool,
    /// Entry distribution over TB states.
    pub initial_state_dist: [f64; TbState::COUNT],
    /// Entry distribution over strains for infected entrants.
    pub initial_strain_dist: [f64; TbStrain::COUNT],
    /// Probability of the immune-reactive tracker on latent entry or
    /// new infection.
    pub prob_immune_reactive: f64,
    /// Probability of the sputum-high tracker on pulmonary activation.
    pub prob_sputum_high: [f64; HIV_CLASSES],
    /// Probability symptoms appear on activation.
    pub prob_symptoms_on_activation: f64,
    /// Monthly infection probability by age bin and HIV class.
    pub infection: Vec<TbInfectionBin>,
    /// Rate multiplier for reinfection from latent/history states.
    pub reinfection_multiplier: f64,
    /// Strain distribution for new infections.
    pub infection_strain_dist: [f64; TbStrain::COUNT],
    /// Two-stage activation probabilities by HIV class: while within
    /// `early_activation_months` of infection, and after.
    pub early_activation_months: u32,
    pub prob_activation_early: [f64; HIV_CLASSES],
    pub prob_activation_late: [f64; HIV_CLASSES],
    /// Share of activations that are pulmonary.
    pub pulmonary_fraction: f64,
    /// Monthly death-rate ratio while TB is active, by HIV class, for
    /// pulmonary and extrapulmonary disease.
    pub active_pulm_death_rate_ratio: [f64; HIV_CLASSES],
    pub active_extrapulm_death_rate_ratio: [f64; HIV_CLASSES],
    /// Rate multiplier on active-TB mortality while on TB treatment.
    pub treatment_mortality_multiplier: f64,
    pub relapse: TbRelapseInputs,
    /// Self-cure from active disease.
    pub enable_self_cure: bool,
    pub months_to_self_cure: u32,
    /// Calendar natural-history multiplier: three values over two
    /// boundary months.
    pub calendar_boundaries: [u32; 2],
    pub calendar_multipliers: [f64; 3],
    pub diagnostics: TbDiagnosticsInputs,
    pub treatments: Vec<TbTreatmentDef>,
    /// Initial treatment line weights by (observed strain, previously
    /// treated flag); each entry is a weight vector over lines.
    pub initial_line_weights: [[Vec<f64>; 2]; TbStrain::COUNT],
    pub proph: TbProphProgram,
    pub ltfu: TbLtfuInputs,
}

impl Default for TbInputs {
    fn default() -> Self {
        Self {
            enable: false,
            integrated_clinic: false,
            initial_state_dist: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            initial_strain_dist: [1.0, 0.0, 0.0],
            prob_immune_reactive: 0.0,
            prob_sputum_high: [0.0; HIV_CLASSES],
            prob_symptoms_on_activation: 1.0,
            infection: Vec::new(),
            reinfection_multiplier: 1.0,
            infection_strain_dist: [1.0, 0.0, 0.0],
            early_activation_months: 24,
            prob_activation_early: [0.0; HIV_CLASSES],
            prob_activation_late: [0.0; HIV_CLASSES],
            pulmonary_fraction: 1.0,
            active_pulm_death_rate_ratio: [1.0; HIV_CLASSES],
            active_extrapulm_death_rate_ratio: [1.0; HIV_CLASSES],
            treatment_mortality_multiplier: 1.0,
            relapse: TbRelapseInputs::default(),
            enable_self_cure: false,
            months_to_self_cure: 0,
            calendar_boundaries: [0, 0],
            calendar_multipliers: [1.0; 3],
            diagnostics: TbDiagnosticsInputs::default(),
            treatments: Vec::new(),
            initial_line_weights: Default::default(),
            proph: TbProphProgram::default(),
            ltfu: TbLtfuInputs::default(),
        }
    }
}

impl TbInputs {
    /// Monthly TB infection probability for an age and HIV class.
    pub fn infection_prob(&self, age_months: u32, class: usize) -> f64 {
        for bin in &self.infection {
            if age_months < bin.max_age_months {
                return bin.prob[class];
            }
        }
        0.0
    }

    /// Calendar natural-history multiplier for a month.
    pub fn calendar_multiplier(&self, month: u32) -> f64 {
        if month < self.calendar_boundaries[0] {
            self.calendar_multipliers[0]
        } else if month < self.calendar_boundaries[1] {
            self.calendar_multipliers[1]
        } else {
            self.calendar_multipliers[2]
        }
    }

    /// Weights over treatment lines for an observed strain and
    /// prior-treatment flag; uniform over line 0 when unconfigured.
    pub fn initial_line_weights_for(
        &self,
        strain: TbStrain,
        previously_treated: bool,
    ) -> Vec<f64> {
        let weights = &self.initial_line_weights[strain.index()][previously_treated as usize];
        if weights.is_empty() && !self.treatments.is_empty() {
            let mut w = vec![0.0; self.treatments.len()];
            w[0] = 1.0;
            return w;
        }
        weights.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hiv_class_indexing() {
        assert_eq!(hiv_class(false, Cd4Strata::VeryHigh), 0);
        assert_eq!(hiv_class(true, Cd4Strata::VeryLow), 1);
        assert_eq!(hiv_class(true, Cd4Strata::VeryHigh), 6);
    }

    #[test]
    fn test_infection_prob_age_bins() {
        let inputs = TbInputs {
            infection: vec![
                TbInfectionBin {
                    max_age_months: 180,
                    prob: [0.001; HIV_CLASSES],
                },
                TbInfectionBin {
                    max_age_months: 1_440,
                    prob: [0.002; HIV_CLASSES],
                },
            ],
            ..Default::default()
        };
        assert_eq!(inputs.infection_prob(100, 0), 0.001);
        assert_eq!(inputs.infection_prob(400, 3), 0.002);
        assert_eq!(inputs.infection_prob(2_000, 0), 0.0);
    }

    #[test]
    fn test_calendar_multiplier_segments() {
        let inputs = TbInputs {
            calendar_boundaries: [12, 36],
            calendar_multipliers: [1.0, 0.8, 0.6],
            ..Default::default()
        };
        assert_eq!(inputs.calendar_multiplier(0), 1.0);
        assert_eq!(inputs.calendar_multiplier(12), 0.8);
        assert_eq!(inputs.calendar_multiplier(48), 0.6);
    }

    #[test]
    fn test_initial_line_default_falls_to_first() {
        let inputs = TbInputs {
            treatments: vec![TbTreatmentDef::default(), TbTreatmentDef::default()],
            ..Default::default()
        };
        let w = inputs.initial_line_weights_for(TbStrain::Ds, false);
        assert_eq!(w, vec![1.0, 0.0]);
    }
}
