//! General patient state: identity, time, accumulators, heterogeneity.

use serde::{Deserialize, Serialize};

use crate::types::{CostSubgroup, Gender, TransmRisk};

/// Identity, clock, cost/benefit accumulators and the adherence
/// intervention state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralState {
    /// Unique patient identifier.
    pub patient_id: u64,
    /// True if this patient is written to the trace file.
    pub tracing_enabled: bool,
    /// The current month number.
    pub month: u32,
    /// Month the patient entered the model (nonzero for warmup reuse).
    pub initial_month: u32,
    /// Current age in months.
    pub age_months: u32,
    pub gender: Gender,
    pub transm_risk: TransmRisk,
    /// Entry risk factors, parallel to the configured catalogue.
    pub risk_factors: Vec<bool>,

    /// Discounted / undiscounted cost accumulators.
    pub costs_discounted: f64,
    pub costs_undiscounted: f64,
    /// Life months lived.
    pub lms_discounted: f64,
    pub lms_undiscounted: f64,
    /// Quality-adjusted (discounted) life months.
    pub qalms_discounted: f64,
    /// Parallel accumulators for the alternative discount rates.
    pub multi_disc_costs: Vec<f64>,
    pub multi_disc_lms: Vec<f64>,
    pub multi_disc_qalms: Vec<f64>,
    /// QOL accumulator for the current month; floored at zero.
    pub qol_month: f64,
    /// Cost subgroups the patient belongs to this month.
    pub cost_subgroups: [bool; CostSubgroup::COUNT],

    /// Baseline heterogeneity logit drawn at entry.
    pub baseline_logit: f64,
    /// Once-per-patient pre-ART logit increment (LTFU covariate).
    pub pre_art_logit_base: f64,

    /// Adherence-intervention state.
    pub on_intervention: bool,
    pub curr_intervention: Option<usize>,
    pub next_intervention: Option<usize>,
    pub month_intervention_started: u32,
    pub month_intervention_ends: u32,
    /// Additive logit increment while the intervention is active.
    pub intervention_logit_increment: f64,
}

impl GeneralState {
    pub fn new(patient_id: u64, risk_factor_count: usize, alt_rate_count: usize) -> Self {
        Self {
            patient_id,
            tracing_enabled: false,
            month: 0,
            initial_month: 0,
            age_months: 0,
            gender: Gender::Female,
            transm_risk: TransmRisk::Other,
            risk_factors: vec![false; risk_factor_count],
            costs_discounted: 0.0,
            costs_undiscounted: 0.0,
            lms_discounted: 0.0,
            lms_undiscounted: 0.0,
            qalms_discounted: 0.0,
            multi_disc_costs: vec![0.0; alt_rate_count],
            multi_disc_lms: vec![0.0; alt_rate_count],
            multi_disc_qalms: vec![0.0; alt_rate_count],
            qol_month: 1.0,
            cost_subgroups: [false; CostSubgroup::COUNT],
            baseline_logit: 0.0,
            pre_art_logit_base: 0.0,
            on_intervention: false,
            curr_intervention: None,
            next_intervention: None,
            month_intervention_started: 0,
            month_intervention_ends: 0,
            intervention_logit_increment: 0.0,
        }
    }

    /// Months since model entry.
    pub fn months_since_entry(&self) -> u32 {
        self.month - self.initial_month
    }

    /// Age in whole years.
    pub fn age_years(&self) -> u32 {
        self.age_months / 12
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sizes_vectors() {
        let gs = GeneralState::new(5, 3, 2);
        assert_eq!(gs.risk_factors.len(), 3);
        assert_eq!(gs.multi_disc_costs.len(), 2);
        assert_eq!(gs.patient_id, 5);
    }

    #[test]
    fn test_age_years() {
        let mut gs = GeneralState::new(0, 0, 0);
        gs.age_months = 371;
        assert_eq!(gs.age_years(), 30);
    }
}
