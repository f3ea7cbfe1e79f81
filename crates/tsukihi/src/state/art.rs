//! ART state: regimen, efficacy, response, envelopes, toxicity effects.

use serde::{Deserialize, Serialize};
use tsukihi_core::strata::HvlStrata;

use crate::types::{
    ArtEfficacy, ArtFailType, ArtStopType, Cd4ResponseType, HetOutcome, RespType, StiState,
    ToxSeverity,
};

/// Upper bound on a CD4 (or CD4-percentage) trajectory, capturing the
/// best response ever achieved on ART.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cd4Envelope {
    pub active: bool,
    /// Regimen that set the envelope and the month it activated.
    pub line: usize,
    pub month_of_start: u32,
    pub slope: f64,
    pub value: f64,
}

impl Cd4Envelope {
    /// Activate the envelope at the current value.
    pub fn activate(&mut self, line: usize, month: u32, value: f64, slope: f64) {
        self.active = true;
        self.line = line;
        self.month_of_start = month;
        self.value = value;
        self.slope = slope;
    }

    /// Advance the envelope bound by its slope.
    pub fn grow(&mut self) {
        if self.active {
            self.value += self.slope;
        }
    }
}

/// One active ART toxicity effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToxicityEffect {
    /// Regimen and sub-regimen that caused the toxicity.
    pub line: usize,
    pub sub_regimen: usize,
    pub severity: ToxSeverity,
    /// Index into the sub-regimen's toxicity templates.
    pub tox_index: usize,
    pub month_of_start: u32,
}

/// ART state group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtState {
    pub may_receive: bool,
    pub on_art: bool,
    /// On a resuppression attempt rather than a fresh line.
    pub on_resuppression: bool,
    pub failed_resuppressions: u32,
    pub has_taken_art: bool,
    pub taken_by_line: Vec<bool>,
    pub cd4_response_type: Cd4ResponseType,

    /// Current regimen; valid while `on_art`.
    pub curr_line: usize,
    pub curr_sub_regimen: usize,
    pub month_of_regimen_start: u32,
    pub month_of_sub_regimen_start: u32,
    pub month_first_art: Option<u32>,
    pub prev_line: Option<usize>,
    pub month_of_prev_stop: Option<u32>,
    pub next_line: Option<usize>,
    pub next_is_resuppression: bool,

    pub efficacy: ArtEfficacy,
    pub month_of_efficacy_change: u32,

    /// Response logits: drawn base, with increment, and pre-increment.
    pub response_logit: f64,
    pub response_logit_base: f64,
    pub response_logit_pre_increment: f64,
    /// Month the regimen-specific increment stops applying, if bounded.
    pub month_increment_ends: Option<u32>,
    /// Per-outcome response fractions (0 = non-responder, 1 = full),
    /// the resolved outcome values, and the responder classes.
    pub response_factors: [f64; HetOutcome::COUNT],
    pub response_values: [f64; HetOutcome::COUNT],
    pub response_types: [RespType; HetOutcome::COUNT],
    /// The ART effect (OI/CHRM/mortality multipliers) applies.
    pub apply_art_effect: bool,
    /// Outcome values resolved at regimen start.
    pub prob_initial_efficacy: f64,
    pub prob_resuppression: f64,
    pub prob_late_fail: f64,
    pub prob_restart_after_fail: f64,
    pub cost_factor: f64,

    /// Slopes installed for the current regimen.
    pub cd4_slope: f64,
    pub cd4_percentage_slope: f64,
    pub had_success_on_regimen: bool,
    pub month_of_initial_success: Option<u32>,

    /// Success envelopes: overall and per-regimen, absolute and
    /// percentage metrics.
    pub overall_envelope: Cd4Envelope,
    pub indiv_envelope: Cd4Envelope,
    pub overall_percentage_envelope: Cd4Envelope,
    pub indiv_percentage_envelope: Cd4Envelope,

    /// Observed values bookkeeping for failure diagnosis.
    pub observed_hvl_at_start: Option<HvlStrata>,
    pub max_observed_cd4_on_art: f64,
    pub max_observed_cd4_percentage_on_art: f64,
    pub min_observed_hvl_on_art: Option<HvlStrata>,
    pub observed_ois_since_fail_or_stop: Vec<u32>,
    pub failed_cd4_tests: u32,
    pub failed_hvl_tests: u32,
    pub failed_oi_events: u32,
    pub observed_failure: bool,
    pub observed_failure_type: Option<ArtFailType>,
    pub month_of_observed_failure: Option<u32>,
    pub num_observed_failures: u32,

    pub stop_type: ArtStopType,
    /// Unsuccessful-month counters for resistance accrual.
    pub months_unsuccessful_by_line: Vec<u32>,
    pub months_unsuccessful_by_hvl: [u32; HvlStrata::COUNT],

    /// Active toxicity effects, walked monthly.
    pub active_toxicities: Vec<ToxicityEffect>,
    pub has_major_toxicity: bool,
    pub has_chronic_tox_switch: bool,
    pub has_severe_toxicity: bool,
    pub had_prev_toxicity: bool,

    /// Structured treatment interruption.
    pub sti_state: StiState,
    pub month_of_sti_change: Option<u32>,
    pub sti_interruptions_on_regimen: u32,
}

impl ArtState {
    pub fn new(art_line_count: usize, oi_count: usize) -> Self {
        Self {
            may_receive: true,
            on_art: false,
            on_resuppression: false,
            failed_resuppressions: 0,
            has_taken_art: false,
            taken_by_line: vec![false; art_line_count],
            cd4_response_type: Cd4ResponseType::Type1,
            curr_line: 0,
            curr_sub_regimen: 0,
            month_of_regimen_start: 0,
            month_of_sub_regimen_start: 0,
            month_first_art: None,
            prev_line: None,
            month_of_prev_stop: None,
            next_line: if art_line_count > 0 { Some(0) } else { None },
            next_is_resuppression: false,
            efficacy: ArtEfficacy::Failure,
            month_of_efficacy_change: 0,
            response_logit: 0.0,
            response_logit_base: 0.0,
            response_logit_pre_increment: 0.0,
            month_increment_ends: None,
            response_factors: [1.0; HetOutcome::COUNT],
            response_values: [1.0; HetOutcome::COUNT],
            response_types: [RespType::Full; HetOutcome::COUNT],
            apply_art_effect: false,
            prob_initial_efficacy: 0.0,
            prob_resuppression: 0.0,
            prob_late_fail: 0.0,
            prob_restart_after_fail: 0.0,
            cost_factor: 1.0,
            cd4_slope: 0.0,
            cd4_percentage_slope: 0.0,
            had_success_on_regimen: false,
            month_of_initial_success: None,
            overall_envelope: Cd4Envelope::default(),
            indiv_envelope: Cd4Envelope::default(),
            overall_percentage_envelope: Cd4Envelope::default(),
            indiv_percentage_envelope: Cd4Envelope::default(),
            observed_hvl_at_start: None,
            max_observed_cd4_on_art: 0.0,
            max_observed_cd4_percentage_on_art: 0.0,
            min_observed_hvl_on_art: None,
            observed_ois_since_fail_or_stop: vec![0; oi_count],
            failed_cd4_tests: 0,
            failed_hvl_tests: 0,
            failed_oi_events: 0,
            observed_failure: false,
            observed_failure_type: None,
            month_of_observed_failure: None,
            num_observed_failures: 0,
            stop_type: ArtStopType::NotStopped,
            months_unsuccessful_by_line: vec![0; art_line_count],
            months_unsuccessful_by_hvl: [0; HvlStrata::COUNT],
            active_toxicities: Vec::new(),
            has_major_toxicity: false,
            has_chronic_tox_switch: false,
            has_severe_toxicity: false,
            had_prev_toxicity: false,
            sti_state: StiState::None,
            month_of_sti_change: None,
            sti_interruptions_on_regimen: 0,
        }
    }

    /// Months on the current regimen.
    pub fn months_on_regimen(&self, month: u32) -> u32 {
        month.saturating_sub(self.month_of_regimen_start)
    }

    /// Months since the last efficacy change.
    pub fn months_since_efficacy_change(&self, month: u32) -> u32 {
        month.saturating_sub(self.month_of_efficacy_change)
    }

    /// The response fraction for a heterogeneity outcome.
    pub fn response_factor(&self, outcome: HetOutcome) -> f64 {
        self.response_factors[outcome.index()]
    }

    /// The resolved outcome value for a heterogeneity outcome.
    pub fn response_value(&self, outcome: HetOutcome) -> f64 {
        self.response_values[outcome.index()]
    }

    /// True if suppression succeeded on the current regimen and the
    /// month is still inside the given horizon.
    pub fn within_efficacy_horizon(&self, month: u32, horizon: u32) -> bool {
        self.had_success_on_regimen && self.months_on_regimen(month) <= horizon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_activation_and_growth() {
        let mut env = Cd4Envelope::default();
        assert!(!env.active);
        env.activate(1, 10, 350.0, 2.5);
        env.grow();
        env.grow();
        assert_eq!(env.value, 355.0);
        assert_eq!(env.line, 1);
    }

    #[test]
    fn test_inactive_envelope_does_not_grow() {
        let mut env = Cd4Envelope::default();
        env.value = 100.0;
        env.grow();
        assert_eq!(env.value, 100.0);
    }

    #[test]
    fn test_months_on_regimen() {
        let mut art = ArtState::new(2, 0);
        art.month_of_regimen_start = 6;
        assert_eq!(art.months_on_regimen(29), 23);
    }

    #[test]
    fn test_next_line_empty_when_no_art() {
        let art = ArtState::new(0, 0);
        assert_eq!(art.next_line, None);
    }
}
