//! Dynamic transmission: warmup freezing and the per-month effective
//! incidence applied to HIV-negative patients.
//!
//! The warmup cohort runs with table incidence; at its end the
//! per-calendar-month incident infections and negative counts are
//! frozen. The main run then prices each month's incidence from the
//! modeled cohort's community viral load, modulated by the
//! self-transmission multiplier derived from the frozen series.

use serde::{Deserialize, Serialize};
use tsukihi_core::strata::{Cd4Strata, HvlStrata};

use crate::inputs::transmission::TransmissionInputs;
use crate::stats::RunStats;

/// The community viral-load snapshot for one month of the main run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CommunitySnapshot {
    /// Sum of per-infected transmission rates over living HIV-positive
    /// patients.
    pub total_transmission_rate: f64,
    /// Living HIV-negative patients exposed this month.
    pub num_negative: u64,
}

impl CommunitySnapshot {
    /// Add one infected person's contribution.
    pub fn add_infected(
        &mut self,
        inputs: &TransmissionInputs,
        acute: bool,
        cd4: Cd4Strata,
        hvl: HvlStrata,
    ) {
        self.total_transmission_rate += inputs.rate_for(acute, cd4, hvl);
    }
}

/// One frozen warmup month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WarmupMonth {
    pub incident_infections: u64,
    pub negatives_at_start: u64,
}

/// The frozen warmup series plus the transmission inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmissionModel {
    inputs: TransmissionInputs,
    warmup: Vec<WarmupMonth>,
    /// Mean warmup incidence per negative, the reference for the
    /// self-transmission multiplier.
    reference_incidence: f64,
}

impl TransmissionModel {
    /// Freeze the warmup cohort's series from its run stats.
    pub fn freeze(inputs: &TransmissionInputs, warmup_stats: &RunStats) -> Self {
        let warmup: Vec<WarmupMonth> = warmup_stats
            .time_summaries
            .iter()
            .map(|t| WarmupMonth {
                incident_infections: t.num_incident_infections,
                negatives_at_start: t.num_hiv_negative_at_start,
            })
            .collect();
        let mut total_incidence = 0.0;
        let mut months_with_negatives = 0u32;
        for m in &warmup {
            if m.negatives_at_start > 0 {
                total_incidence += m.incident_infections as f64 / m.negatives_at_start as f64;
                months_with_negatives += 1;
            }
        }
        let reference_incidence = if months_with_negatives > 0 {
            total_incidence / months_with_negatives as f64
        } else {
            0.0
        };
        Self {
            inputs: inputs.clone(),
            warmup,
            reference_incidence,
        }
    }

    /// The frozen warmup series.
    pub fn warmup(&self) -> &[WarmupMonth] {
        &self.warmup
    }

    /// Self-transmission multiplier for a month: the attributable share
    /// scaled by how the frozen warmup incidence for that month relates
    /// to the warmup mean. Depends only on frozen values.
    pub fn self_transmission_multiplier(&self, month: u32) -> f64 {
        let base = self.inputs.attributable_fraction;
        let frozen = match self.warmup.get(month as usize) {
            Some(m) if m.negatives_at_start > 0 => m,
            _ => return base,
        };
        if self.reference_incidence <= 0.0 {
            return base;
        }
        let month_incidence = frozen.incident_infections as f64 / frozen.negatives_at_start as f64;
        base * month_incidence / self.reference_incidence
    }

    /// Effective monthly incidence per HIV-negative for a month of the
    /// main run.
    pub fn effective_incidence(&self, month: u32, community: &CommunitySnapshot) -> f64 {
        if community.num_negative == 0 {
            return 0.0;
        }
        let per_negative_rate =
            community.total_transmission_rate / community.num_negative as f64;
        let rate = per_negative_rate
            * self.inputs.period_multiplier(month)
            * self.self_transmission_multiplier(month);
        tsukihi_core::prob::rate_to_prob(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::SimContext;

    fn inputs_with_rate(rate: f64) -> TransmissionInputs {
        let mut inputs = TransmissionInputs::default();
        inputs.enable = true;
        for row in inputs.rate.iter_mut() {
            for cell in row.iter_mut() {
                *cell = rate;
            }
        }
        inputs
    }

    fn uniform_warmup(months: usize, incident: u64, negatives: u64) -> RunStats {
        let sim = SimContext::default();
        let mut stats = RunStats::new(&sim);
        for m in 0..months {
            let t = stats.time_summary_mut(m as u32);
            t.num_incident_infections = incident;
            t.num_hiv_negative_at_start = negatives;
        }
        stats
    }

    #[test]
    fn test_uniform_warmup_multiplier_is_attributable_fraction() {
        let inputs = inputs_with_rate(0.001);
        let stats = uniform_warmup(24, 5, 1_000);
        let model = TransmissionModel::freeze(&inputs, &stats);
        for m in 0..24 {
            assert!((model.self_transmission_multiplier(m) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_effective_incidence_matches_community_rate() {
        // 1,000 infected contributing rate 0.001 each over 1,000
        // negatives: the per-negative monthly rate is 0.001.
        let inputs = inputs_with_rate(0.001);
        let stats = uniform_warmup(12, 1, 1_000);
        let model = TransmissionModel::freeze(&inputs, &stats);
        let mut community = CommunitySnapshot {
            total_transmission_rate: 0.0,
            num_negative: 1_000,
        };
        for _ in 0..1_000 {
            community.add_infected(&inputs, false, Cd4Strata::MidHigh, HvlStrata::Medium);
        }
        let expected = tsukihi_core::prob::rate_to_prob(0.001);
        assert!((model.effective_incidence(0, &community) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_no_negatives_means_no_incidence() {
        let inputs = inputs_with_rate(0.001);
        let stats = uniform_warmup(1, 0, 0);
        let model = TransmissionModel::freeze(&inputs, &stats);
        let community = CommunitySnapshot::default();
        assert_eq!(model.effective_incidence(0, &community), 0.0);
    }

    #[test]
    fn test_multiplier_tracks_frozen_series_only() {
        let inputs = inputs_with_rate(0.001);
        let mut stats = uniform_warmup(2, 10, 1_000);
        stats.time_summary_mut(1).num_incident_infections = 30;
        let model = TransmissionModel::freeze(&inputs, &stats);
        // Month 1 carries triple the mean-relative weight of month 0.
        let m0 = model.self_transmission_multiplier(0);
        let m1 = model.self_transmission_multiplier(1);
        assert!((m1 / m0 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_acute_override_feeds_snapshot() {
        let mut inputs = inputs_with_rate(0.001);
        inputs.acute_rate = 0.01;
        let mut community = CommunitySnapshot::default();
        community.add_infected(&inputs, true, Cd4Strata::High, HvlStrata::Low);
        assert!((community.total_transmission_rate - 0.01).abs() < 1e-12);
    }
}
