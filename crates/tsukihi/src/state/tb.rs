//! TB state: disease, strain, trackers, diagnostics, treatment, proph.

use serde::{Deserialize, Serialize};

use crate::types::{TbCareState, TbDiagResult, TbState, TbStrain, TbTracker};

/// A diagnostic result awaiting pickup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingTbResult {
    pub test: usize,
    pub slot: usize,
    pub month_due: u32,
    pub result: TbDiagResult,
    pub will_pickup: bool,
    /// A skipped pickup resets the chain for this test definition.
    pub reset_chain_on_no_pickup: bool,
}

/// A drug-susceptibility result awaiting pickup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingDstResult {
    pub month_due: u32,
    pub strain: TbStrain,
}

/// TB state group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TbPatientState {
    pub state: TbState,
    pub strain: TbStrain,
    pub observed_strain: Option<TbStrain>,
    /// Most recent observed strain before the current one.
    pub observed_strain_history: Option<TbStrain>,
    pub trackers: [bool; TbTracker::COUNT],
    pub care_state: TbCareState,

    pub month_of_state_change: Option<u32>,
    pub month_of_infection: Option<u32>,
    pub self_cured: bool,
    /// Any true TB history, including before model entry.
    pub ever_had_tb: bool,

    /// Diagnostic chain position: current slot and the next slot.
    pub chain_slot: Option<usize>,
    pub next_chain_slot: Option<usize>,
    /// Interval-testing eligibility, rolled once.
    pub interval_testing_eligible: bool,
    /// Month the last chain concluded; no new chain starts that month.
    pub month_of_chain_end: Option<u32>,
    pub pending_result: Option<PendingTbResult>,
    pub pending_dst: Option<PendingDstResult>,
    pub month_of_positive_diagnosis: Option<u32>,
    /// Treatment-or-empiric history at the time the chain started.
    pub treated_at_chain_start: bool,

    /// Prophylaxis.
    pub on_proph: bool,
    pub ever_proph: bool,
    pub scheduled_proph: Option<(usize, u32)>,
    pub proph_line: usize,
    pub month_of_proph_start: Option<u32>,
    pub month_of_proph_stop: Option<u32>,
    pub proph_starts_by_line: Vec<u32>,
    pub next_proph_line: Option<usize>,
    pub proph_major_toxicity: bool,
    pub proph_eligible: bool,

    /// Treatment.
    pub on_treatment: bool,
    pub on_empiric_treatment: bool,
    pub treatment_line: usize,
    pub month_of_treatment_start: Option<u32>,
    /// Months already served before an interruption.
    pub previous_treatment_months: u32,
    /// The current course is destined to succeed.
    pub treatment_will_succeed: bool,
    pub repeats_of_current_line: u32,
    pub next_treatment_line: Option<usize>,
    pub ever_completed_treatment: bool,
    pub ever_on_treatment: bool,
    pub month_of_treatment_stop: Option<u32>,
    pub month_of_initial_treatment_stop: Option<u32>,
    pub had_treatment_major_tox: bool,

    /// TB LTFU.
    pub month_of_tb_ltfu: Option<u32>,
    pub will_default_on_ltfu: bool,
    pub incomplete_treatment_line: Option<usize>,

    /// Unfavorable-outcome flags: (died, failed, defaulted, relapsed).
    pub unfavorable: [bool; 4],
}

impl TbPatientState {
    pub fn new(proph_line_count: usize) -> Self {
        Self {
            state: TbState::Uninfected,
            strain: TbStrain::Ds,
            observed_strain: None,
            observed_strain_history: None,
            trackers: [false; TbTracker::COUNT],
            care_state: TbCareState::Unlinked,
            month_of_state_change: None,
            month_of_infection: None,
            self_cured: false,
            ever_had_tb: false,
            chain_slot: None,
            next_chain_slot: Some(0),
            interval_testing_eligible: false,
            month_of_chain_end: None,
            pending_result: None,
            pending_dst: None,
            month_of_positive_diagnosis: None,
            treated_at_chain_start: false,
            on_proph: false,
            ever_proph: false,
            scheduled_proph: None,
            proph_line: 0,
            month_of_proph_start: None,
            month_of_proph_stop: None,
            proph_starts_by_line: vec![0; proph_line_count],
            next_proph_line: None,
            proph_major_toxicity: false,
            proph_eligible: true,
            on_treatment: false,
            on_empiric_treatment: false,
            treatment_line: 0,
            month_of_treatment_start: None,
            previous_treatment_months: 0,
            treatment_will_succeed: false,
            repeats_of_current_line: 0,
            next_treatment_line: None,
            ever_completed_treatment: false,
            ever_on_treatment: false,
            month_of_treatment_stop: None,
            month_of_initial_treatment_stop: None,
            had_treatment_major_tox: false,
            month_of_tb_ltfu: None,
            will_default_on_ltfu: false,
            incomplete_treatment_line: None,
            unfavorable: [false; 4],
        }
    }

    pub fn tracker(&self, t: TbTracker) -> bool {
        self.trackers[t.index()]
    }

    pub fn set_tracker(&mut self, t: TbTracker, value: bool) {
        self.trackers[t.index()] = value;
    }

    /// Months on the current (possibly empiric) treatment, counting any
    /// previously served months.
    pub fn months_on_treatment(&self, month: u32) -> u32 {
        match self.month_of_treatment_start {
            Some(start) if self.on_treatment || self.on_empiric_treatment => {
                month.saturating_sub(start) + self.previous_treatment_months
            }
            _ => 0,
        }
    }

    /// Months since the last treatment stop, if any.
    pub fn months_since_treatment_stop(&self, month: u32) -> Option<u32> {
        self.month_of_treatment_stop.map(|m| month.saturating_sub(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state() {
        let tb = TbPatientState::new(2);
        assert_eq!(tb.state, TbState::Uninfected);
        assert_eq!(tb.care_state, TbCareState::Unlinked);
        assert_eq!(tb.proph_starts_by_line.len(), 2);
    }

    #[test]
    fn test_trackers() {
        let mut tb = TbPatientState::new(0);
        assert!(!tb.tracker(TbTracker::Symptoms));
        tb.set_tracker(TbTracker::Symptoms, true);
        assert!(tb.tracker(TbTracker::Symptoms));
    }

    #[test]
    fn test_months_on_treatment_counts_prior_service() {
        let mut tb = TbPatientState::new(0);
        tb.on_treatment = true;
        tb.month_of_treatment_start = Some(10);
        tb.previous_treatment_months = 3;
        assert_eq!(tb.months_on_treatment(14), 7);
    }
}
