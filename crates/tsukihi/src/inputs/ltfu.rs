//! Loss-to-follow-up and return-to-care inputs.

use serde::{Deserialize, Serialize};
use tsukihi_core::response::ResponseCurve;

use crate::inputs::nat_hist::NormalParams;
use crate::types::CareState;

/// Logistic regression coefficients for return to care.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RtcCoefficients {
    pub background: f64,
    /// Added while true CD4 is below `cd4_threshold`.
    pub cd4_below_threshold: f64,
    pub cd4_threshold: f64,
    /// Added in the month of an acute severe / mild OI.
    pub acute_severe_oi: f64,
    pub acute_mild_oi: f64,
    /// Added in the month after a positive TB diagnosis.
    pub tb_positive_diagnosis: f64,
}

/// LTFU and RTC inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LtfuInputs {
    pub use_ltfu: bool,
    /// Once-per-patient pre-ART increment to the response logit.
    pub pre_art_logit: NormalParams,
    /// Maps the LTFU response propensity to p(LTFU): lower value for
    /// non-responders, upper for full responders.
    pub ltfu_curve: ResponseCurve,
    /// Curves replacing `ltfu_curve` while an adherence intervention is
    /// active, one per intervention period.
    pub ltfu_curve_on_intervention: Vec<ResponseCurve>,
    /// Curve used off intervention when intervention curves are enabled.
    pub ltfu_curve_off_intervention: ResponseCurve,
    pub use_intervention_curves: bool,
    /// Months a patient must remain lost before RTC rolls (bypassed by
    /// an acute OI).
    pub min_months_remain_lost: u32,
    pub rtc: RtcCoefficients,
    /// Window after an observed failure during which a patient lost on a
    /// failed regimen restarts the same regimen at return.
    pub max_months_after_observed_failure_to_restart: u32,
    /// Probability of restarting the same regimen when lost on a failed
    /// regimen without an observed failure.
    pub prob_restart_without_observed_failure: f64,
    /// Probability of keeping OI prophylaxis while lost.
    pub prob_remain_on_oi_proph: f64,
    /// Probability an active adherence intervention resumes at RTC.
    pub prob_resume_intervention_rtc: f64,
    pub cost_resume_intervention_rtc: f64,
    /// Scale on intervention monthly cost per care state.
    pub intervention_cost_scale: [f64; CareState::COUNT],
}

impl Default for LtfuInputs {
    fn default() -> Self {
        Self {
            use_ltfu: false,
            pre_art_logit: NormalParams::default(),
            ltfu_curve: ResponseCurve::flat(0.0),
            ltfu_curve_on_intervention: Vec::new(),
            ltfu_curve_off_intervention: ResponseCurve::flat(0.0),
            use_intervention_curves: false,
            min_months_remain_lost: 0,
            rtc: RtcCoefficients::default(),
            max_months_after_observed_failure_to_restart: 0,
            prob_restart_without_observed_failure: 0.0,
            prob_remain_on_oi_proph: 0.0,
            prob_resume_intervention_rtc: 0.0,
            cost_resume_intervention_rtc: 0.0,
            intervention_cost_scale: [1.0; CareState::COUNT],
        }
    }
}

impl LtfuInputs {
    /// The LTFU curve in effect for a patient.
    pub fn active_ltfu_curve(&self, intervention: Option<usize>) -> &ResponseCurve {
        if !self.use_intervention_curves {
            return &self.ltfu_curve;
        }
        match intervention {
            Some(i) => self
                .ltfu_curve_on_intervention
                .get(i)
                .unwrap_or(&self.ltfu_curve_off_intervention),
            None => &self.ltfu_curve_off_intervention,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_selection() {
        let on = ResponseCurve::flat(0.5);
        let base = ResponseCurve::flat(0.1);
        let inputs = LtfuInputs {
            use_intervention_curves: true,
            ltfu_curve_on_intervention: vec![on],
            ltfu_curve_off_intervention: base,
            ..Default::default()
        };
        assert_eq!(inputs.active_ltfu_curve(Some(0)).factor(0.5), 0.5);
        assert_eq!(inputs.active_ltfu_curve(None).factor(0.5), 0.1);
        // Unknown period falls back to the off-intervention curve.
        assert_eq!(inputs.active_ltfu_curve(Some(9)).factor(0.5), 0.1);
    }

    #[test]
    fn test_base_curve_when_intervention_curves_disabled() {
        let inputs = LtfuInputs {
            ltfu_curve: ResponseCurve::flat(0.2),
            ..Default::default()
        };
        assert_eq!(inputs.active_ltfu_curve(Some(0)).factor(0.0), 0.2);
    }
}
