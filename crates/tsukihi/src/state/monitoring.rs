//! Monitoring state: detection, linkage, observed labs, visits, LTFU,
//! PrEP.

use serde::{Deserialize, Serialize};
use tsukihi_core::strata::{Cd4Strata, HvlStrata};

use crate::types::{CareState, EmergencyKind, LtfuState};

/// A lab test performed but not yet returned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingLabResult {
    pub month_due: u32,
    pub value: f64,
}

/// Monitoring state group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringState {
    /// Detection and linkage.
    pub detected: bool,
    pub month_of_detection: Option<u32>,
    pub linked: bool,
    pub month_of_linkage: Option<u32>,
    pub care_state: CareState,
    /// High-risk flag driving which incidence applies while negative.
    pub high_risk: bool,

    /// HIV test program state.
    pub accept_bucket: usize,
    pub test_interval_months: u32,
    pub next_hiv_test_month: Option<u32>,

    /// PrEP state.
    pub on_prep: bool,
    pub ever_prep: bool,
    pub prep_dropout: bool,
    pub month_of_prep_start: Option<u32>,
    pub prep_dropout_threshold_month: u32,

    /// Observed CD4 (absolute metric).
    pub observed_cd4: Option<f64>,
    pub min_observed_cd4: f64,
    pub month_of_observed_cd4: Option<u32>,
    pub pending_cd4_result: Option<PendingLabResult>,
    pub next_cd4_test_month: Option<u32>,
    /// Observed CD4 percentage (early-childhood metric).
    pub observed_cd4_percentage: Option<f64>,
    pub min_observed_cd4_percentage: f64,
    /// Observed HVL.
    pub observed_hvl: Option<HvlStrata>,
    pub max_observed_hvl: Option<HvlStrata>,
    pub month_of_observed_hvl: Option<u32>,
    pub pending_hvl_result: Option<PendingLabResult>,
    pub next_hvl_test_month: Option<u32>,

    /// Observed OI counts.
    pub observed_ois_total: Vec<u32>,
    pub observed_ois_since_visit: Vec<u32>,

    /// Clinic visit schedule.
    pub has_regular_visit: bool,
    pub month_of_regular_visit: u32,
    pub emergency_visit: Option<(EmergencyKind, u32)>,
    pub had_prev_visit: bool,

    /// LTFU state.
    pub ltfu_state: LtfuState,
    pub month_of_ltfu_change: Option<u32>,
    pub had_prev_ltfu: bool,
    pub had_prev_rtc: bool,
    pub was_on_art_when_lost: bool,
}

impl MonitoringState {
    pub fn new(oi_count: usize) -> Self {
        Self {
            detected: false,
            month_of_detection: None,
            linked: false,
            month_of_linkage: None,
            care_state: CareState::HivNegative,
            high_risk: false,
            accept_bucket: 0,
            test_interval_months: 12,
            next_hiv_test_month: None,
            on_prep: false,
            ever_prep: false,
            prep_dropout: false,
            month_of_prep_start: None,
            prep_dropout_threshold_month: 0,
            observed_cd4: None,
            min_observed_cd4: f64::MAX,
            month_of_observed_cd4: None,
            pending_cd4_result: None,
            next_cd4_test_month: None,
            observed_cd4_percentage: None,
            min_observed_cd4_percentage: f64::MAX,
            observed_hvl: None,
            max_observed_hvl: None,
            month_of_observed_hvl: None,
            pending_hvl_result: None,
            next_hvl_test_month: None,
            observed_ois_total: vec![0; oi_count],
            observed_ois_since_visit: vec![0; oi_count],
            has_regular_visit: false,
            month_of_regular_visit: 0,
            emergency_visit: None,
            had_prev_visit: false,
            ltfu_state: LtfuState::Never,
            month_of_ltfu_change: None,
            had_prev_ltfu: false,
            had_prev_rtc: false,
            was_on_art_when_lost: false,
        }
    }

    /// Observed CD4 stratum, if a result has returned.
    pub fn observed_cd4_strata(&self) -> Option<Cd4Strata> {
        self.observed_cd4.map(Cd4Strata::from_count)
    }

    /// True if a clinic visit (regular or emergency) happens this month.
    pub fn has_visit_this_month(&self, month: u32) -> bool {
        if self.has_regular_visit && self.month_of_regular_visit == month {
            return true;
        }
        matches!(self.emergency_visit, Some((_, m)) if m == month)
    }

    /// Months on PrEP as of `month`.
    pub fn months_on_prep(&self, month: u32) -> u32 {
        match self.month_of_prep_start {
            Some(start) if self.on_prep => month.saturating_sub(start),
            _ => 0,
        }
    }
}
