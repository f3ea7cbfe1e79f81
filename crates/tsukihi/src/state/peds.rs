//! Pediatric state: maternal status, breastfeeding, EID, infant proph.

use serde::{Deserialize, Serialize};

use crate::types::{Breastfeeding, MaternalStatus, PedsAgeCat};

/// An EID test whose result has not yet returned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingEidResult {
    pub assay: usize,
    pub month_due: u32,
    pub positive: bool,
    /// A positive from a confirmatory assay concludes the chain.
    pub confirmatory: bool,
}

/// Pediatric state group. Inert unless the pediatrics module is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedsState {
    pub age_category: PedsAgeCat,

    /// Maternal state and its provider-known shadows.
    pub maternal_status: MaternalStatus,
    pub maternal_status_known: bool,
    pub mother_alive: bool,
    pub mother_on_art: bool,
    pub mother_on_art_known: bool,
    pub mother_suppressed: bool,
    pub mother_suppressed_known: bool,
    pub month_of_maternal_death: Option<u32>,

    /// Feeding mode and the age it stops.
    pub breastfeeding: Breastfeeding,
    pub breastfeeding_stop_age_months: u32,

    /// EID subsystem.
    pub in_eid_system: bool,
    pub is_false_positive: bool,
    pub false_positive_linked: bool,
    pub pending_eid_results: Vec<PendingEidResult>,
    pub month_of_last_negative_eid: Option<u32>,
    pub missed_eid_visits: u32,

    /// Infant prophylaxis, parallel to the configured lines.
    pub infant_proph_given: Vec<bool>,
    pub infant_proph_effective: Vec<bool>,
    pub infant_proph_effect_ends: Vec<Option<u32>>,

    /// HIV-exposed-uninfected bookkeeping.
    pub hiv_exposed: bool,
    pub never_exposed: bool,
}

impl PedsState {
    pub fn new(infant_proph_count: usize) -> Self {
        Self {
            age_category: PedsAgeCat::Adult,
            maternal_status: MaternalStatus::Negative,
            maternal_status_known: true,
            mother_alive: true,
            mother_on_art: false,
            mother_on_art_known: false,
            mother_suppressed: false,
            mother_suppressed_known: false,
            month_of_maternal_death: None,
            breastfeeding: Breastfeeding::Replacement,
            breastfeeding_stop_age_months: 0,
            in_eid_system: false,
            is_false_positive: false,
            false_positive_linked: false,
            pending_eid_results: Vec::new(),
            month_of_last_negative_eid: None,
            missed_eid_visits: 0,
            infant_proph_given: vec![false; infant_proph_count],
            infant_proph_effective: vec![false; infant_proph_count],
            infant_proph_effect_ends: vec![None; infant_proph_count],
            hiv_exposed: false,
            never_exposed: true,
        }
    }

    /// True while the patient is still breastfeeding at `age_months`.
    pub fn is_breastfeeding(&self, age_months: u32) -> bool {
        self.breastfeeding.exposes_to_transmission()
            && age_months < self.breastfeeding_stop_age_months
    }

    /// Combined MTCT rate multiplier from effective infant proph lines.
    pub fn infant_proph_multiplier(&self, month: u32, multipliers: &[f64]) -> f64 {
        let mut mult = 1.0;
        for (i, effective) in self.infant_proph_effective.iter().enumerate() {
            if *effective {
                if let Some(end) = self.infant_proph_effect_ends[i] {
                    if month < end {
                        mult *= multipliers.get(i).copied().unwrap_or(1.0);
                    }
                }
            }
        }
        mult
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breastfeeding_window() {
        let mut peds = PedsState::new(0);
        peds.breastfeeding = Breastfeeding::Exclusive;
        peds.breastfeeding_stop_age_months = 18;
        assert!(peds.is_breastfeeding(6));
        assert!(!peds.is_breastfeeding(18));
        peds.breastfeeding = Breastfeeding::Replacement;
        assert!(!peds.is_breastfeeding(6));
    }

    #[test]
    fn test_infant_proph_multiplier_expires() {
        let mut peds = PedsState::new(1);
        peds.infant_proph_effective[0] = true;
        peds.infant_proph_effect_ends[0] = Some(6);
        assert_eq!(peds.infant_proph_multiplier(3, &[0.5]), 0.5);
        assert_eq!(peds.infant_proph_multiplier(6, &[0.5]), 1.0);
    }
}
