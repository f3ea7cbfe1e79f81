//! HIV testing programs, linkage, and PrEP.

use serde::{Deserialize, Serialize};

use crate::types::{HivState, TransmRisk};

/// Number of acceptance buckets in the user-defined test program.
pub const ACCEPT_BUCKETS: usize = 5;

/// One entry of the test-interval frequency distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestInterval {
    pub months: u32,
    pub weight: f64,
}

/// The user-defined HIV testing program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestProgram {
    pub enable: bool,
    /// Age at which the program starts offering tests, in months.
    pub start_age_months: u32,
    /// Weights assigning each patient an acceptance bucket at entry.
    pub accept_bucket_weights: [f64; ACCEPT_BUCKETS],
    /// Acceptance probability per bucket and current HIV state.
    pub accept_prob: [[f64; HivState::COUNT]; ACCEPT_BUCKETS],
    /// Distribution over offer intervals.
    pub interval_dist: Vec<TestInterval>,
    /// Probability of returning for the result.
    pub return_prob: f64,
    /// Probability of a positive result per true HIV state; the entry
    /// for `Negative` is the false-positive rate (1 - specificity).
    pub result_positive_prob: [f64; HivState::COUNT],
    pub cost_offer: f64,
    pub cost_test: f64,
    pub cost_return: f64,
}

impl Default for TestProgram {
    fn default() -> Self {
        Self {
            enable: false,
            start_age_months: 0,
            accept_bucket_weights: [1.0, 0.0, 0.0, 0.0, 0.0],
            accept_prob: [[0.0; HivState::COUNT]; ACCEPT_BUCKETS],
            interval_dist: vec![TestInterval {
                months: 12,
                weight: 1.0,
            }],
            return_prob: 1.0,
            result_positive_prob: [0.0, 1.0, 1.0, 1.0],
            cost_offer: 0.0,
            cost_test: 0.0,
            cost_return: 0.0,
        }
    }
}

/// The background testing program running in parallel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundTesting {
    pub enable: bool,
    pub start_age_months: u32,
    /// Monthly acceptance probability per HIV state.
    pub accept_prob: [f64; HivState::COUNT],
    pub return_prob: f64,
    /// Positive-result probability per true HIV state.
    pub result_positive_prob: [f64; HivState::COUNT],
    pub cost_test: f64,
}

impl Default for BackgroundTesting {
    fn default() -> Self {
        Self {
            enable: false,
            start_age_months: 0,
            accept_prob: [0.0; HivState::COUNT],
            return_prob: 1.0,
            result_positive_prob: [0.0, 1.0, 1.0, 1.0],
            cost_test: 0.0,
        }
    }
}

/// PrEP rollout and effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepInputs {
    pub enable: bool,
    /// Shape parameter of the time-varying uptake curve.
    pub rollout_shape: f64,
    /// Months over which the rollout ramps.
    pub rollout_duration_months: u32,
    /// Peak monthly uptake probability per risk category.
    pub uptake_prob: [f64; TransmRisk::COUNT],
    /// Coverage Bernoulli on uptake: the offer actually reaches the patient.
    pub coverage: f64,
    pub monthly_cost: f64,
    pub qol_modifier: f64,
    /// Rate multiplier replacing the base incidence while on PrEP.
    pub incidence_multiplier: f64,
    /// Monthly dropout probability before and after the threshold month.
    pub dropout_pre_threshold: f64,
    pub dropout_post_threshold: f64,
    /// Months on PrEP at which the dropout regime switches.
    pub dropout_threshold_months: u32,
    /// Dropped-out patients may take PrEP up again after the rollout.
    pub allow_reuptake: bool,
}

impl Default for PrepInputs {
    fn default() -> Self {
        Self {
            enable: false,
            rollout_shape: 1.0,
            rollout_duration_months: 0,
            uptake_prob: [0.0; TransmRisk::COUNT],
            coverage: 1.0,
            monthly_cost: 0.0,
            qol_modifier: 1.0,
            incidence_multiplier: 1.0,
            dropout_pre_threshold: 0.0,
            dropout_post_threshold: 0.0,
            dropout_threshold_months: 0,
            allow_reuptake: false,
        }
    }
}

impl PrepInputs {
    /// Uptake probability in a calendar month for a risk category.
    ///
    /// The rollout ramps the peak probability with a power-law shape
    /// over the rollout duration, then holds it.
    pub fn uptake_prob_at(&self, month: u32, risk: TransmRisk) -> f64 {
        let peak = self.uptake_prob[risk.index()];
        if self.rollout_duration_months == 0 || month >= self.rollout_duration_months {
            return peak;
        }
        let frac = month as f64 / self.rollout_duration_months as f64;
        peak * frac.powf(self.rollout_shape)
    }
}

/// HIV testing and detection inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingInputs {
    /// Probability of being already detected at model entry, per state.
    pub prob_detected_at_entry: [f64; HivState::COUNT],
    /// Probability of linkage at entry given detected at entry.
    pub prob_linked_at_entry: f64,
    /// Probability of linkage on a non-OI-driven detection.
    pub linkage_prob: f64,
    pub program: TestProgram,
    pub background: BackgroundTesting,
    pub prep: PrepInputs,
}

impl Default for TestingInputs {
    fn default() -> Self {
        Self {
            prob_detected_at_entry: [0.0; HivState::COUNT],
            prob_linked_at_entry: 0.0,
            linkage_prob: 1.0,
            program: TestProgram::default(),
            background: BackgroundTesting::default(),
            prep: PrepInputs::default(),
        }
    }
}
