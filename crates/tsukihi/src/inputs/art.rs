//! ART regimen definitions: efficacy, CD4 slopes, heterogeneity
//! response curves, toxicity templates.

use serde::{Deserialize, Serialize};
use tsukihi_core::response::ResponseCurve;

use crate::inputs::nat_hist::NormalParams;
use crate::types::{Cd4ResponseType, LogitDistribution, ToxDuration, ToxSeverity};

/// Number of CD4 slope stages while suppressed on a regimen.
pub const ART_SLOPE_STAGES: usize = 3;

/// One toxicity template attached to a sub-regimen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToxicityDef {
    pub name: String,
    pub severity: ToxSeverity,
    /// Probability the toxicity is scheduled at regimen start.
    pub probability: f64,
    /// Normal draw for the month offset of onset.
    pub time_to_onset: NormalParams,
    /// QOL component: modifier and how long it stays in scope.
    pub qol_modifier: f64,
    pub qol_duration: ToxDuration,
    /// Cost component.
    pub cost: f64,
    pub cost_duration: ToxDuration,
    /// Chronic-death component (chronic severity only).
    pub chronic_death_duration: ToxDuration,
    /// Months after onset before the chronic ratio starts applying.
    pub months_to_chronic_death_impact: u32,
    pub chronic_death_rate_ratio: f64,
    /// Acute death-rate ratio in the onset month (major severity only).
    pub acute_major_death_rate_ratio: f64,
    /// Cost booked if the acute major toxicity causes death.
    pub acute_major_death_cost: f64,
    /// A major onset counts as severe and triggers regimen stop policy.
    pub switch_sub_regimen_on_onset: bool,
}

impl Default for ToxicityDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            severity: ToxSeverity::Minor,
            probability: 0.0,
            time_to_onset: NormalParams::default(),
            qol_modifier: 1.0,
            qol_duration: ToxDuration::ThisMonth,
            cost: 0.0,
            cost_duration: ToxDuration::ThisMonth,
            chronic_death_duration: ToxDuration::UntilDeath,
            months_to_chronic_death_impact: 0,
            chronic_death_rate_ratio: 1.0,
            acute_major_death_rate_ratio: 1.0,
            acute_major_death_cost: 0.0,
            switch_sub_regimen_on_onset: false,
        }
    }
}

/// One sub-regimen of an ART line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubRegimenDef {
    /// Scheduled switch to the next sub-regimen, if any.
    pub months_to_switch: Option<u32>,
    /// Toxicity templates rolled independently at start.
    pub toxicities: Vec<ToxicityDef>,
}

/// Heterogeneity response curves, one per outcome.
///
/// Each curve maps the patient's response propensity directly to the
/// outcome value: `lower_value` is the non-responder value and
/// `upper_value` the full-responder value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HetOutcomeCurves {
    /// Probability of initial suppression.
    pub suppression: ResponseCurve,
    /// Monthly probability of late failure past the horizon.
    pub late_failure: ResponseCurve,
    /// Rate multiplier on OI incidence while on ART.
    pub art_effect_oi: ResponseCurve,
    /// Rate multiplier on CHRM incidence while on ART.
    pub art_effect_chrm: ResponseCurve,
    /// Rate multiplier on the HIV death-rate ratio while on ART.
    pub art_effect_mortality: ResponseCurve,
    /// Share of unsuccessful months that accrue resistance.
    pub resistance: ResponseCurve,
    /// Blend factor for on-ART toxicity probabilities.
    pub toxicity: ResponseCurve,
    /// Proportion of the monthly regimen cost actually incurred.
    pub cost: ResponseCurve,
    /// Probability of restarting this regimen after failure.
    pub restart: ResponseCurve,
    /// Probability a resuppression attempt succeeds.
    pub resuppression: ResponseCurve,
}

impl Default for HetOutcomeCurves {
    fn default() -> Self {
        Self {
            suppression: ResponseCurve::flat(1.0),
            late_failure: ResponseCurve::flat(0.0),
            art_effect_oi: ResponseCurve::flat(1.0),
            art_effect_chrm: ResponseCurve::flat(1.0),
            art_effect_mortality: ResponseCurve::flat(1.0),
            resistance: ResponseCurve::flat(1.0),
            toxicity: ResponseCurve::flat(1.0),
            cost: ResponseCurve::flat(1.0),
            restart: ResponseCurve::flat(1.0),
            resuppression: ResponseCurve::flat(0.0),
        }
    }
}

/// One ART line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtLineInputs {
    pub name: String,
    /// Monthly regimen cost for a full responder.
    pub monthly_cost: f64,
    /// Sub-regimens in switch order; at least one.
    pub sub_regimens: Vec<SubRegimenDef>,
    /// Protected months after initial suppression with no late-fail rolls.
    pub efficacy_horizon: u32,
    /// Protected months after a successful resuppression.
    pub efficacy_horizon_resuppression: u32,
    /// Force the regimen to fail at this many months on ART.
    pub force_fail_month: Option<u32>,
    /// This line is a resuppression regimen rather than a switch.
    pub is_resuppression: bool,
    /// CD4 slope on suppressive ART: normal draw per
    /// (CD4 response type, stage).
    pub cd4_slope: [[NormalParams; ART_SLOPE_STAGES]; Cd4ResponseType::COUNT],
    /// Month offsets at which stage 2 and stage 3 begin.
    pub stage_bounds: [u32; ART_SLOPE_STAGES - 1],
    /// CD4-percentage slope for early childhood, per
    /// (pediatric age category at stage start, stage).
    pub cd4_percentage_slope: [[NormalParams; ART_SLOPE_STAGES]; 4],
    pub stage_bounds_percentage: [u32; ART_SLOPE_STAGES - 1],
    /// Multipliers on the off-ART CD4 decline while failed, before and
    /// after `fail_multiplier_boundary` months of failure.
    pub cd4_multiplier_fail_early: f64,
    pub cd4_multiplier_fail_late: f64,
    pub fail_multiplier_boundary: u32,
    /// Patient-regimen response logit draw.
    pub response_logit: NormalParams,
    pub response_logit_distribution: LogitDistribution,
    /// Regimen-specific increment added to the drawn logit.
    pub response_logit_increment: f64,
    /// Stop adding the increment after this many months on the regimen.
    pub response_increment_duration: Option<u32>,
    /// Heterogeneity outcome curves.
    pub het: HetOutcomeCurves,
}

impl Default for ArtLineInputs {
    fn default() -> Self {
        Self {
            name: String::new(),
            monthly_cost: 0.0,
            sub_regimens: vec![SubRegimenDef::default()],
            efficacy_horizon: 0,
            efficacy_horizon_resuppression: 0,
            force_fail_month: None,
            is_resuppression: false,
            cd4_slope: [[NormalParams::default(); ART_SLOPE_STAGES]; Cd4ResponseType::COUNT],
            stage_bounds: [6, 48],
            cd4_percentage_slope: [[NormalParams::default(); ART_SLOPE_STAGES]; 4],
            stage_bounds_percentage: [6, 48],
            cd4_multiplier_fail_early: 1.0,
            cd4_multiplier_fail_late: 1.0,
            fail_multiplier_boundary: 0,
            response_logit: NormalParams::default(),
            response_logit_distribution: LogitDistribution::Normal,
            response_logit_increment: 0.0,
            response_increment_duration: None,
            het: HetOutcomeCurves::default(),
        }
    }
}

impl ArtLineInputs {
    /// Slope stage for a regimen suppressed for `months_since_efficacy`.
    pub fn stage_for(&self, months_since_efficacy: u32) -> usize {
        if months_since_efficacy < self.stage_bounds[0] {
            0
        } else if months_since_efficacy < self.stage_bounds[1] {
            1
        } else {
            2
        }
    }

    /// True when this month crosses into a new stage; returns the stage.
    pub fn stage_boundary_crossed(&self, months_since_efficacy: u32) -> Option<usize> {
        if months_since_efficacy == self.stage_bounds[0] {
            Some(1)
        } else if months_since_efficacy == self.stage_bounds[1] {
            Some(2)
        } else {
            None
        }
    }

    /// Fail multiplier for a regimen failed for `months_failed`.
    pub fn fail_multiplier(&self, months_failed: u32) -> f64 {
        if months_failed < self.fail_multiplier_boundary {
            self.cd4_multiplier_fail_early
        } else {
            self.cd4_multiplier_fail_late
        }
    }
}

/// ART module inputs: the ordered lines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtInputs {
    pub lines: Vec<ArtLineInputs>,
    /// Maximum consecutive failed resuppression attempts before moving on.
    pub max_failed_resuppressions: u32,
}

impl ArtInputs {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, index: usize) -> &ArtLineInputs {
        &self.lines[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_lookup() {
        let line = ArtLineInputs {
            stage_bounds: [6, 48],
            ..Default::default()
        };
        assert_eq!(line.stage_for(0), 0);
        assert_eq!(line.stage_for(5), 0);
        assert_eq!(line.stage_for(6), 1);
        assert_eq!(line.stage_for(47), 1);
        assert_eq!(line.stage_for(48), 2);
    }

    #[test]
    fn test_stage_boundary_crossing() {
        let line = ArtLineInputs::default();
        assert_eq!(line.stage_boundary_crossed(6), Some(1));
        assert_eq!(line.stage_boundary_crossed(48), Some(2));
        assert_eq!(line.stage_boundary_crossed(7), None);
    }

    #[test]
    fn test_fail_multiplier_cut() {
        let line = ArtLineInputs {
            cd4_multiplier_fail_early: 0.5,
            cd4_multiplier_fail_late: 1.2,
            fail_multiplier_boundary: 12,
            ..Default::default()
        };
        assert_eq!(line.fail_multiplier(0), 0.5);
        assert_eq!(line.fail_multiplier(11), 0.5);
        assert_eq!(line.fail_multiplier(12), 1.2);
    }

    #[test]
    fn test_default_line_has_one_sub_regimen() {
        assert_eq!(ArtLineInputs::default().sub_regimens.len(), 1);
    }
}
