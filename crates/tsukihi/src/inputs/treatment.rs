//! Treatment policy: ART start/stop/observed-failure rules, clinic
//! visit schedule, lab-test schedule, STI protocol.

use serde::{Deserialize, Serialize};
use tsukihi_core::strata::HvlStrata;

/// Criteria for starting an ART line. All configured bounds must hold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtStartPolicy {
    /// Observed CD4 must be at or below this bound.
    pub max_cd4: Option<f64>,
    /// Observed CD4 must be at or above this bound.
    pub min_cd4: Option<f64>,
    /// Observed HVL must be at or above this stratum.
    pub min_hvl: Option<HvlStrata>,
    /// Require at least this many observed OI events on record.
    pub min_observed_ois: Option<u32>,
    /// Require an observed severe OI on record.
    pub require_severe_oi_history: bool,
    /// Earliest month the line may start.
    pub min_month: u32,
    /// Latest month the line may start.
    pub max_month: Option<u32>,
    /// Cooldown since the previous regimen stop.
    pub months_since_prev_stop: Option<u32>,
}

/// Criteria for stopping an ART line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtStopPolicy {
    /// Stop after this many months on the regimen.
    pub max_months: Option<u32>,
    /// Stop on a major toxicity.
    pub on_major_toxicity: bool,
    /// Stop once observed failure is diagnosed.
    pub on_observed_failure: bool,
    /// With observed failure, also require CD4 below this bound.
    pub fail_requires_cd4_below: Option<f64>,
    /// With observed failure, also require a severe OI this month.
    pub fail_requires_severe_oi: bool,
    /// Stop this many months after the observed failure diagnosis.
    pub months_from_observed_failure: Option<u32>,
}

impl Default for ArtStopPolicy {
    fn default() -> Self {
        Self {
            max_months: None,
            on_major_toxicity: true,
            on_observed_failure: true,
            fail_requires_cd4_below: None,
            fail_requires_severe_oi: false,
            months_from_observed_failure: None,
        }
    }
}

/// Counting rules that confirm an observed ART failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtFailurePolicy {
    /// HVL test results at or above the start-of-regimen stratum needed
    /// for a virologic diagnosis.
    pub hvl_tests_to_fail: Option<u32>,
    /// CD4 test results counting toward an immunologic diagnosis.
    pub cd4_tests_to_fail: Option<u32>,
    /// A CD4 result counts when it drops below this fraction of the
    /// maximum observed on the regimen.
    pub cd4_drop_fraction: f64,
    /// Observed OI events counting toward a clinical diagnosis.
    pub ois_to_fail: Option<u32>,
    /// Only severe OIs count toward the clinical diagnosis.
    pub severe_ois_only: bool,
    /// Diagnosis requires events within this trailing window.
    pub window_months: u32,
}

impl Default for ArtFailurePolicy {
    fn default() -> Self {
        Self {
            hvl_tests_to_fail: None,
            cd4_tests_to_fail: None,
            cd4_drop_fraction: 0.5,
            ois_to_fail: None,
            severe_ois_only: true,
            window_months: 12,
        }
    }
}

/// Structured treatment interruption protocol.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StiPolicy {
    pub enable: bool,
    /// Months on the regimen before the first interruption.
    pub months_before_interruption: u32,
    /// Months off ART per interruption.
    pub interruption_months: u32,
    /// Maximum interruptions per regimen.
    pub max_interruptions: u32,
}

/// Treatment-policy inputs; the per-line vectors parallel the ART lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreatmentInputs {
    pub art_start: Vec<ArtStartPolicy>,
    pub art_stop: Vec<ArtStopPolicy>,
    pub art_failure: Vec<ArtFailurePolicy>,
    pub sti: StiPolicy,
    /// Months between regular clinic visits while in care.
    pub clinic_visit_interval: u32,
    /// Months between scheduled CD4 tests, and the lag before the first.
    pub cd4_test_interval: u32,
    pub cd4_test_lag: u32,
    /// Months between scheduled HVL tests, and the lag before the first.
    pub hvl_test_interval: u32,
    pub hvl_test_lag: u32,
    /// Months before a lab result returns and becomes observed.
    pub test_return_delay: u32,
    /// Std dev of the observed-CD4 measurement noise.
    pub cd4_test_std_dev: f64,
}

impl Default for TreatmentInputs {
    fn default() -> Self {
        Self {
            art_start: Vec::new(),
            art_stop: Vec::new(),
            art_failure: Vec::new(),
            sti: StiPolicy::default(),
            clinic_visit_interval: 3,
            cd4_test_interval: 6,
            cd4_test_lag: 0,
            hvl_test_interval: 6,
            hvl_test_lag: 0,
            test_return_delay: 1,
            cd4_test_std_dev: 0.0,
        }
    }
}

impl TreatmentInputs {
    /// Start policy for a line, or a permissive default.
    pub fn start_policy(&self, line: usize) -> ArtStartPolicy {
        self.art_start.get(line).cloned().unwrap_or_default()
    }

    /// Stop policy for a line, or the default.
    pub fn stop_policy(&self, line: usize) -> ArtStopPolicy {
        self.art_stop.get(line).cloned().unwrap_or_default()
    }

    /// Observed-failure policy for a line, or the default.
    pub fn failure_policy(&self, line: usize) -> ArtFailurePolicy {
        self.art_failure.get(line).cloned().unwrap_or_default()
    }
}
