//! Disease state: HIV infection, CD4/HVL, OIs, CHRMs, death.

use serde::{Deserialize, Serialize};
use tsukihi_core::mortality::MortalityRisk;
use tsukihi_core::strata::{Cd4Strata, HvlStrata};

use crate::types::{DeathCause, HivState, OiHistoryExtent, PedsHivState};

/// Disease state group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseState {
    pub hiv_state: HivState,
    pub peds_hiv_state: PedsHivState,
    /// Infected at model entry rather than during the run.
    pub prevalent_case: bool,
    pub month_of_infection: Option<u32>,
    pub month_of_chronic_transition: Option<u32>,

    /// True CD4 and its lifetime minimum (absolute metric).
    pub true_cd4: f64,
    pub min_true_cd4: f64,
    /// True CD4 percentage and minimum (early-childhood metric).
    pub true_cd4_percentage: f64,
    pub min_true_cd4_percentage: f64,
    /// Once-per-patient between-subject increment on the off-ART
    /// CD4 decline mean.
    pub cd4_decline_increment: f64,

    /// Viral load: current, setpoint and drift target.
    pub hvl: HvlStrata,
    pub setpoint_hvl: HvlStrata,
    pub target_hvl: HvlStrata,

    /// At most one acute OI per month; the table index of the current one.
    pub current_oi: Option<usize>,
    /// Per-OI logged history and the month of the last severe event.
    pub oi_history: Vec<bool>,
    pub last_severe_oi_month: Vec<Option<u32>>,
    /// Widest class of OI history logged so far.
    pub oi_history_extent: OiHistoryExtent,
    /// First logged OI (month, type).
    pub first_oi: Option<(u32, usize)>,
    /// Per-OI counts since the last clinic visit.
    pub ois_since_last_visit: Vec<u32>,

    /// Chronic conditions and their start months.
    pub chrms: Vec<bool>,
    pub chrm_start_month: Vec<Option<u32>>,

    pub alive: bool,
    /// Mortality risks accumulated this month; cleared at month start.
    pub mortality_risks: Vec<MortalityRisk<DeathCause>>,
    pub cause_of_death: Option<DeathCause>,
    pub month_of_death: Option<u32>,
}

impl DiseaseState {
    pub fn new(oi_count: usize, chrm_count: usize) -> Self {
        Self {
            hiv_state: HivState::Negative,
            peds_hiv_state: PedsHivState::Negative,
            prevalent_case: false,
            month_of_infection: None,
            month_of_chronic_transition: None,
            true_cd4: 0.0,
            min_true_cd4: f64::MAX,
            true_cd4_percentage: 0.0,
            min_true_cd4_percentage: f64::MAX,
            cd4_decline_increment: 0.0,
            hvl: HvlStrata::VeryLow,
            setpoint_hvl: HvlStrata::VeryLow,
            target_hvl: HvlStrata::VeryLow,
            current_oi: None,
            oi_history: vec![false; oi_count],
            last_severe_oi_month: vec![None; oi_count],
            oi_history_extent: OiHistoryExtent::None,
            first_oi: None,
            ois_since_last_visit: vec![0; oi_count],
            chrms: vec![false; chrm_count],
            chrm_start_month: vec![None; chrm_count],
            alive: true,
            mortality_risks: Vec::new(),
            cause_of_death: None,
            month_of_death: None,
        }
    }

    /// Current true CD4 stratum.
    pub fn cd4_strata(&self) -> Cd4Strata {
        Cd4Strata::from_count(self.true_cd4)
    }

    /// True if any OI history has been logged.
    pub fn has_oi_history(&self) -> bool {
        self.oi_history_extent != OiHistoryExtent::None
    }

    /// Count of OI types with logged history.
    pub fn oi_history_count(&self) -> u32 {
        self.oi_history.iter().filter(|h| **h).count() as u32
    }

    /// Record a new lower CD4 if below the running minimum.
    pub fn track_cd4_minimum(&mut self) {
        if self.true_cd4 < self.min_true_cd4 {
            self.min_true_cd4 = self.true_cd4;
        }
        if self.true_cd4_percentage < self.min_true_cd4_percentage {
            self.min_true_cd4_percentage = self.true_cd4_percentage;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_alive_uninfected() {
        let ds = DiseaseState::new(3, 2);
        assert!(ds.alive);
        assert_eq!(ds.hiv_state, HivState::Negative);
        assert_eq!(ds.oi_history.len(), 3);
        assert_eq!(ds.chrms.len(), 2);
    }

    #[test]
    fn test_cd4_minimum_tracking() {
        let mut ds = DiseaseState::new(0, 0);
        ds.true_cd4 = 300.0;
        ds.track_cd4_minimum();
        ds.true_cd4 = 250.0;
        ds.track_cd4_minimum();
        ds.true_cd4 = 400.0;
        ds.track_cd4_minimum();
        assert_eq!(ds.min_true_cd4, 250.0);
    }

    #[test]
    fn test_oi_history_count() {
        let mut ds = DiseaseState::new(4, 0);
        ds.oi_history[1] = true;
        ds.oi_history[3] = true;
        assert_eq!(ds.oi_history_count(), 2);
    }
}
