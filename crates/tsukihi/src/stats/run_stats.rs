//! Per-run event counters, survival accumulators and time summaries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::inputs::SimContext;
use crate::types::{ArtStopType, DeathCause, Gender, HivState};

/// Survival horizons (months) for the truncated sub-cohort summaries.
pub const SURVIVAL_TRUNCATIONS: [u32; 4] = [12, 60, 120, 240];

/// Running mean/min/max/variance accumulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurvivalAccumulator {
    pub count: u64,
    pub sum: f64,
    pub sum_squares: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl SurvivalAccumulator {
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_squares += value * value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_squares / self.count as f64 - mean * mean).max(0.0).sqrt()
    }

    pub fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_squares += other.sum_squares;
        if let Some(m) = other.min {
            self.min = Some(self.min.map_or(m, |s| s.min(m)));
        }
        if let Some(m) = other.max {
            self.max = Some(self.max.map_or(m, |s| s.max(m)));
        }
    }
}

/// One calendar month of longitudinal counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimeSummary {
    pub num_alive: u64,
    pub num_hiv_positive: u64,
    pub num_on_art: u64,
    pub num_in_care: u64,
    /// HIV-negative patients alive at the start of the month; the
    /// denominator frozen by the transmission warmup.
    pub num_hiv_negative_at_start: u64,
    /// Incident infections during the month.
    pub num_incident_infections: u64,
    pub num_deaths: u64,
    pub num_on_prep: u64,
    pub num_active_tb: u64,
}

/// Per-run statistics aggregate.
///
/// Every updater-side event lands here through the updater context; the
/// writer renders the sections of the stats file from it. Two instances
/// can be merged for parallel cohort execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub run_set_name: String,
    pub run_name: String,

    /// Population summary.
    pub num_patients: u64,
    pub num_hiv_positive: u64,
    pub total_costs: f64,
    pub total_lms: f64,
    pub total_qalms: f64,
    pub total_costs_hiv_positive: f64,
    pub total_lms_hiv_positive: f64,
    pub total_qalms_hiv_positive: f64,
    pub total_clinic_visits: u64,

    /// HIV screening.
    pub num_detected: u64,
    pub num_linked: u64,
    pub num_tests_performed: u64,
    pub sum_months_infection_to_detection: f64,
    pub num_incident_detections: u64,
    pub sum_months_to_detection_prevalent: f64,
    pub num_prevalent_detections: u64,
    pub sum_cd4_at_detection_incident: f64,
    pub sum_cd4_at_detection_prevalent: f64,

    /// Survival (life months), overall and truncated.
    pub survival: SurvivalAccumulator,
    pub survival_truncated: Vec<SurvivalAccumulator>,
    pub survival_hiv_positive: SurvivalAccumulator,

    /// Initial distributions.
    pub initial_age: SurvivalAccumulator,
    pub initial_cd4: SurvivalAccumulator,
    pub num_by_gender: [u64; Gender::COUNT],
    pub num_by_initial_hiv_state: [u64; HivState::COUNT],

    /// OI counters, per configured OI type.
    pub num_primary_ois: Vec<u64>,
    pub num_secondary_ois: Vec<u64>,
    pub num_detected_ois: Vec<u64>,

    /// CHRM incidence counters.
    pub num_chrm_incident: Vec<u64>,
    pub num_chrm_prevalent: Vec<u64>,

    /// Deaths by cause label.
    pub deaths_by_cause: BTreeMap<String, u64>,
    pub num_deaths: u64,
    pub num_deaths_hiv_positive: u64,

    /// ART.
    pub num_art_starts: Vec<u64>,
    pub num_art_stops_by_type: BTreeMap<String, u64>,
    pub num_observed_failures: Vec<u64>,
    pub num_toxicity_events: u64,

    /// Prophylaxis.
    pub num_proph_starts: Vec<u64>,
    pub num_proph_major_tox: u64,
    pub num_proph_minor_tox: u64,

    /// LTFU.
    pub num_ltfu_events: u64,
    pub num_rtc_events: u64,

    /// TB.
    pub num_tb_infections: u64,
    pub num_tb_activations: u64,
    pub num_tb_relapses: u64,
    pub num_tb_self_cures: u64,
    pub num_tb_diagnoses: u64,
    pub num_tb_treatment_starts: u64,
    pub num_tb_treatment_completions: u64,
    pub num_tb_treatment_defaults: u64,
    pub num_tb_proph_starts: u64,

    /// PrEP.
    pub num_prep_starts: u64,
    pub num_prep_dropouts: u64,

    /// Longitudinal per-month records, indexed by month.
    pub time_summaries: Vec<TimeSummary>,
}

impl RunStats {
    pub fn new(sim: &SimContext) -> Self {
        let oi_count = sim.oi_count();
        let chrm_count = sim.chrm_count();
        let art_lines = sim.art_line_count();
        Self {
            run_set_name: sim.run_specs.run_set_name.clone(),
            run_name: sim.run_specs.run_name.clone(),
            num_patients: 0,
            num_hiv_positive: 0,
            total_costs: 0.0,
            total_lms: 0.0,
            total_qalms: 0.0,
            total_costs_hiv_positive: 0.0,
            total_lms_hiv_positive: 0.0,
            total_qalms_hiv_positive: 0.0,
            total_clinic_visits: 0,
            num_detected: 0,
            num_linked: 0,
            num_tests_performed: 0,
            sum_months_infection_to_detection: 0.0,
            num_incident_detections: 0,
            sum_months_to_detection_prevalent: 0.0,
            num_prevalent_detections: 0,
            sum_cd4_at_detection_incident: 0.0,
            sum_cd4_at_detection_prevalent: 0.0,
            survival: SurvivalAccumulator::default(),
            survival_truncated: vec![SurvivalAccumulator::default(); SURVIVAL_TRUNCATIONS.len()],
            survival_hiv_positive: SurvivalAccumulator::default(),
            initial_age: SurvivalAccumulator::default(),
            initial_cd4: SurvivalAccumulator::default(),
            num_by_gender: [0; Gender::COUNT],
            num_by_initial_hiv_state: [0; HivState::COUNT],
            num_primary_ois: vec![0; oi_count],
            num_secondary_ois: vec![0; oi_count],
            num_detected_ois: vec![0; oi_count],
            num_chrm_incident: vec![0; chrm_count],
            num_chrm_prevalent: vec![0; chrm_count],
            deaths_by_cause: BTreeMap::new(),
            num_deaths: 0,
            num_deaths_hiv_positive: 0,
            num_art_starts: vec![0; art_lines],
            num_art_stops_by_type: BTreeMap::new(),
            num_observed_failures: vec![0; art_lines],
            num_toxicity_events: 0,
            num_proph_starts: vec![0; oi_count],
            num_proph_major_tox: 0,
            num_proph_minor_tox: 0,
            num_ltfu_events: 0,
            num_rtc_events: 0,
            num_tb_infections: 0,
            num_tb_activations: 0,
            num_tb_relapses: 0,
            num_tb_self_cures: 0,
            num_tb_diagnoses: 0,
            num_tb_treatment_starts: 0,
            num_tb_treatment_completions: 0,
            num_tb_treatment_defaults: 0,
            num_tb_proph_starts: 0,
            num_prep_starts: 0,
            num_prep_dropouts: 0,
            time_summaries: Vec::new(),
        }
    }

    /// The time-summary slot for a month, growing the series as needed.
    pub fn time_summary_mut(&mut self, month: u32) -> &mut TimeSummary {
        let idx = month as usize;
        if idx >= self.time_summaries.len() {
            self.time_summaries.resize(idx + 1, TimeSummary::default());
        }
        &mut self.time_summaries[idx]
    }

    /// Record a death cause.
    pub fn record_death(&mut self, cause: DeathCause, hiv_positive: bool) {
        *self.deaths_by_cause.entry(cause.label()).or_insert(0) += 1;
        self.num_deaths += 1;
        if hiv_positive {
            self.num_deaths_hiv_positive += 1;
        }
    }

    /// Record an ART stop by its typed reason.
    pub fn record_art_stop(&mut self, stop: ArtStopType) {
        *self
            .num_art_stops_by_type
            .entry(stop.label().to_string())
            .or_insert(0) += 1;
    }

    /// Fold a finished patient's lifetime totals into the aggregates.
    pub fn finalize_patient(
        &mut self,
        lms: f64,
        qalms: f64,
        costs: f64,
        lms_undiscounted: f64,
        ever_hiv_positive: bool,
    ) {
        self.num_patients += 1;
        self.total_costs += costs;
        self.total_lms += lms;
        self.total_qalms += qalms;
        self.survival.add(lms_undiscounted);
        for (i, cap) in SURVIVAL_TRUNCATIONS.iter().enumerate() {
            self.survival_truncated[i].add(lms_undiscounted.min(*cap as f64));
        }
        if ever_hiv_positive {
            self.num_hiv_positive += 1;
            self.total_costs_hiv_positive += costs;
            self.total_lms_hiv_positive += lms;
            self.total_qalms_hiv_positive += qalms;
            self.survival_hiv_positive.add(lms_undiscounted);
        }
    }

    /// Merge a per-thread aggregate into this one.
    pub fn merge(&mut self, other: &RunStats) {
        self.num_patients += other.num_patients;
        self.num_hiv_positive += other.num_hiv_positive;
        self.total_costs += other.total_costs;
        self.total_lms += other.total_lms;
        self.total_qalms += other.total_qalms;
        self.total_costs_hiv_positive += other.total_costs_hiv_positive;
        self.total_lms_hiv_positive += other.total_lms_hiv_positive;
        self.total_qalms_hiv_positive += other.total_qalms_hiv_positive;
        self.total_clinic_visits += other.total_clinic_visits;
        self.num_detected += other.num_detected;
        self.num_linked += other.num_linked;
        self.num_tests_performed += other.num_tests_performed;
        self.sum_months_infection_to_detection += other.sum_months_infection_to_detection;
        self.num_incident_detections += other.num_incident_detections;
        self.sum_months_to_detection_prevalent += other.sum_months_to_detection_prevalent;
        self.num_prevalent_detections += other.num_prevalent_detections;
        self.sum_cd4_at_detection_incident += other.sum_cd4_at_detection_incident;
        self.sum_cd4_at_detection_prevalent += other.sum_cd4_at_detection_prevalent;
        self.survival.merge(&other.survival);
        for (mine, theirs) in self
            .survival_truncated
            .iter_mut()
            .zip(other.survival_truncated.iter())
        {
            mine.merge(theirs);
        }
        self.survival_hiv_positive.merge(&other.survival_hiv_positive);
        self.initial_age.merge(&other.initial_age);
        self.initial_cd4.merge(&other.initial_cd4);
        for i in 0..self.num_by_gender.len() {
            self.num_by_gender[i] += other.num_by_gender[i];
        }
        for i in 0..self.num_by_initial_hiv_state.len() {
            self.num_by_initial_hiv_state[i] += other.num_by_initial_hiv_state[i];
        }
        merge_vec(&mut self.num_primary_ois, &other.num_primary_ois);
        merge_vec(&mut self.num_secondary_ois, &other.num_secondary_ois);
        merge_vec(&mut self.num_detected_ois, &other.num_detected_ois);
        merge_vec(&mut self.num_chrm_incident, &other.num_chrm_incident);
        merge_vec(&mut self.num_chrm_prevalent, &other.num_chrm_prevalent);
        for (cause, n) in &other.deaths_by_cause {
            *self.deaths_by_cause.entry(cause.clone()).or_insert(0) += n;
        }
        self.num_deaths += other.num_deaths;
        self.num_deaths_hiv_positive += other.num_deaths_hiv_positive;
        merge_vec(&mut self.num_art_starts, &other.num_art_starts);
        for (stop, n) in &other.num_art_stops_by_type {
            *self.num_art_stops_by_type.entry(stop.clone()).or_insert(0) += n;
        }
        merge_vec(&mut self.num_observed_failures, &other.num_observed_failures);
        self.num_toxicity_events += other.num_toxicity_events;
        merge_vec(&mut self.num_proph_starts, &other.num_proph_starts);
        self.num_proph_major_tox += other.num_proph_major_tox;
        self.num_proph_minor_tox += other.num_proph_minor_tox;
        self.num_ltfu_events += other.num_ltfu_events;
        self.num_rtc_events += other.num_rtc_events;
        self.num_tb_infections += other.num_tb_infections;
        self.num_tb_activations += other.num_tb_activations;
        self.num_tb_relapses += other.num_tb_relapses;
        self.num_tb_self_cures += other.num_tb_self_cures;
        self.num_tb_diagnoses += other.num_tb_diagnoses;
        self.num_tb_treatment_starts += other.num_tb_treatment_starts;
        self.num_tb_treatment_completions += other.num_tb_treatment_completions;
        self.num_tb_treatment_defaults += other.num_tb_treatment_defaults;
        self.num_tb_proph_starts += other.num_tb_proph_starts;
        self.num_prep_starts += other.num_prep_starts;
        self.num_prep_dropouts += other.num_prep_dropouts;
        for (m, theirs) in other.time_summaries.iter().enumerate() {
            let mine = self.time_summary_mut(m as u32);
            mine.num_alive += theirs.num_alive;
            mine.num_hiv_positive += theirs.num_hiv_positive;
            mine.num_on_art += theirs.num_on_art;
            mine.num_in_care += theirs.num_in_care;
            mine.num_hiv_negative_at_start += theirs.num_hiv_negative_at_start;
            mine.num_incident_infections += theirs.num_incident_infections;
            mine.num_deaths += theirs.num_deaths;
            mine.num_on_prep += theirs.num_on_prep;
            mine.num_active_tb += theirs.num_active_tb;
        }
    }
}

fn merge_vec(mine: &mut [u64], theirs: &[u64]) {
    for (m, t) in mine.iter_mut().zip(theirs.iter()) {
        *m += t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survival_accumulator_moments() {
        let mut acc = SurvivalAccumulator::default();
        for v in [10.0, 20.0, 30.0] {
            acc.add(v);
        }
        assert_eq!(acc.mean(), 20.0);
        assert_eq!(acc.min, Some(10.0));
        assert_eq!(acc.max, Some(30.0));
        assert!((acc.std_dev() - (200.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_finalize_patient_truncations() {
        let sim = SimContext::default();
        let mut stats = RunStats::new(&sim);
        stats.finalize_patient(100.0, 90.0, 0.0, 100.0, false);
        assert_eq!(stats.survival_truncated[0].sum, 12.0);
        assert_eq!(stats.survival_truncated[1].sum, 60.0);
        assert_eq!(stats.survival.sum, 100.0);
    }

    #[test]
    fn test_merge_combines_counters() {
        let sim = SimContext::default();
        let mut a = RunStats::new(&sim);
        let mut b = RunStats::new(&sim);
        a.record_death(DeathCause::Hiv, true);
        b.record_death(DeathCause::Hiv, true);
        b.record_death(DeathCause::Background, false);
        a.merge(&b);
        assert_eq!(a.num_deaths, 3);
        assert_eq!(a.deaths_by_cause["HIV"], 2);
    }

    #[test]
    fn test_time_summary_grows() {
        let sim = SimContext::default();
        let mut stats = RunStats::new(&sim);
        stats.time_summary_mut(5).num_alive = 7;
        assert_eq!(stats.time_summaries.len(), 6);
        assert_eq!(stats.time_summaries[5].num_alive, 7);
    }
}
