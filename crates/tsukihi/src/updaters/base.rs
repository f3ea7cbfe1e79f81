//! The shared updater context: the only mutation path into patient
//! state. Setters that multiple updaters need live here, together with
//! the cost/QOL/mortality-risk accumulation and tracing side effects.

use tsukihi_core::mortality::MortalityRisk;
use tsukihi_core::strata::HvlStrata;

use crate::inputs::SimContext;
use crate::state::Patient;
use crate::stats::{CostStats, RunStats};
use crate::trace::Tracer;
use crate::types::{
    ArtEfficacy, ArtStopType, CareState, CostCategory, DeathCause, EmergencyKind, HetOutcome,
    HivState, LtfuState, RespType, TbCareState,
};

/// Borrowed view over one patient-month update.
pub(crate) struct UpdaterCtx<'a> {
    pub patient: &'a mut Patient,
    pub sim: &'a SimContext,
    pub stats: &'a mut RunStats,
    pub costs: &'a mut CostStats,
    pub tracer: &'a mut Tracer,
}

impl<'a> UpdaterCtx<'a> {
    pub fn new(
        patient: &'a mut Patient,
        sim: &'a SimContext,
        stats: &'a mut RunStats,
        costs: &'a mut CostStats,
        tracer: &'a mut Tracer,
    ) -> Self {
        Self {
            patient,
            sim,
            stats,
            costs,
            tracer,
        }
    }

    /// The current month number.
    pub fn month(&self) -> u32 {
        self.patient.general.month
    }

    pub fn patient_alive(&self) -> bool {
        self.patient.disease.alive
    }

    /// Emit a trace event line for traced patients.
    pub fn trace(&mut self, text: impl AsRef<str>) {
        if self.patient.general.tracing_enabled {
            self.tracer.event(self.patient.general.month, text);
        }
    }

    /// Emit an indented trace continuation line.
    pub fn trace_detail(&mut self, text: impl AsRef<str>) {
        if self.patient.general.tracing_enabled {
            self.tracer.detail(self.patient.general.month, text);
        }
    }

    // ----- cost and QOL accumulation -----

    /// Book a cost event in a category.
    ///
    /// Applies the primary discount by months since entry, records the
    /// patient accumulators, the cohort category/subgroup totals, and
    /// the alternative-rate parallels.
    pub fn add_cost(&mut self, amount: f64, category: CostCategory) {
        if amount == 0.0 {
            return;
        }
        let general = &mut self.patient.general;
        let m = general.month - general.initial_month;
        let discounted = self.sim.discount.discounted(amount, m);
        general.costs_discounted += discounted;
        general.costs_undiscounted += amount;
        for (i, factor) in self.sim.multi_discount.cost.iter().enumerate() {
            general.multi_disc_costs[i] += factor.discounted(amount, m);
        }
        self.costs
            .add_cost(category, discounted, amount, &general.cost_subgroups);
        let alt: Vec<f64> = self
            .sim
            .multi_discount
            .cost
            .iter()
            .map(|f| f.discounted(amount, m))
            .collect();
        self.costs.add_multi_discount(&alt);
    }

    /// Book a direct-medical cost (the common case).
    pub fn add_medical_cost(&mut self, amount: f64) {
        self.add_cost(amount, CostCategory::DirectMedical);
    }

    /// Multiply a modifier into the month's QOL accumulator.
    pub fn accumulate_qol(&mut self, modifier: f64) {
        self.patient.general.qol_month = (self.patient.general.qol_month * modifier).max(0.0);
    }

    // ----- mortality risks -----

    /// Append a mortality risk for this month.
    pub fn add_mortality_risk(&mut self, cause: DeathCause, death_rate_ratio: f64) {
        self.patient
            .disease
            .mortality_risks
            .push(MortalityRisk::new(cause, death_rate_ratio));
    }

    /// Append a mortality risk carrying a death cost.
    pub fn add_mortality_risk_with_cost(
        &mut self,
        cause: DeathCause,
        death_rate_ratio: f64,
        cost: f64,
    ) {
        self.patient
            .disease
            .mortality_risks
            .push(MortalityRisk::with_cost(cause, death_rate_ratio, cost));
    }

    // ----- clinic visit scheduling -----

    /// Schedule (or clear) the next regular clinic visit.
    pub fn schedule_regular_visit(&mut self, month: Option<u32>) {
        match month {
            Some(m) => {
                self.patient.monitoring.has_regular_visit = true;
                self.patient.monitoring.month_of_regular_visit = m;
            }
            None => {
                self.patient.monitoring.has_regular_visit = false;
            }
        }
    }

    /// Schedule an emergency clinic visit, keeping the earliest one.
    pub fn schedule_emergency_visit(&mut self, kind: EmergencyKind, month: u32) {
        match self.patient.monitoring.emergency_visit {
            Some((_, existing)) if existing <= month => {}
            _ => self.patient.monitoring.emergency_visit = Some((kind, month)),
        }
    }

    pub fn clear_emergency_visit(&mut self) {
        self.patient.monitoring.emergency_visit = None;
    }

    // ----- care cascade -----

    /// Derive and store the care cascade state from the current flags.
    pub fn refresh_care_state(&mut self) {
        let m = &self.patient.monitoring;
        let state = if self.patient.disease.hiv_state == HivState::Negative
            && !self.patient.peds.is_false_positive
        {
            CareState::HivNegative
        } else if !m.detected {
            CareState::Undetected
        } else if !m.linked {
            CareState::DetectedUnlinked
        } else {
            match m.ltfu_state {
                LtfuState::Lost => CareState::Ltfu,
                LtfuState::Returned => CareState::ReturnedToCare,
                LtfuState::Never => CareState::InCare,
            }
        };
        self.patient.monitoring.care_state = state;
    }

    /// Mark the patient detected HIV-positive.
    pub fn set_detected(&mut self, month: u32) {
        if self.patient.monitoring.detected {
            return;
        }
        self.patient.monitoring.detected = true;
        self.patient.monitoring.month_of_detection = Some(month);
        self.stats.num_detected += 1;
        let disease = &self.patient.disease;
        if disease.prevalent_case {
            self.stats.num_prevalent_detections += 1;
            self.stats.sum_months_to_detection_prevalent += month as f64;
            self.stats.sum_cd4_at_detection_prevalent += disease.true_cd4;
        } else if let Some(infected) = disease.month_of_infection {
            self.stats.num_incident_detections += 1;
            self.stats.sum_months_infection_to_detection += (month - infected) as f64;
            self.stats.sum_cd4_at_detection_incident += disease.true_cd4;
        }
        self.refresh_care_state();
    }

    /// Link a detected patient into care.
    pub fn set_linked(&mut self, month: u32) {
        if self.patient.monitoring.linked {
            return;
        }
        self.patient.monitoring.linked = true;
        self.patient.monitoring.month_of_linkage = Some(month);
        self.stats.num_linked += 1;
        self.refresh_care_state();
        // First contact with care: an initial clinic visit this month.
        self.schedule_emergency_visit(EmergencyKind::Testing, month);
    }

    /// Change the LTFU state and record the transition month.
    pub fn set_ltfu_state(&mut self, state: LtfuState) {
        let month = self.month();
        let monitoring = &mut self.patient.monitoring;
        match state {
            LtfuState::Lost => {
                monitoring.had_prev_ltfu = true;
                monitoring.was_on_art_when_lost = self.patient.art.on_art;
                self.stats.num_ltfu_events += 1;
            }
            LtfuState::Returned => {
                monitoring.had_prev_rtc = true;
                self.stats.num_rtc_events += 1;
            }
            LtfuState::Never => {}
        }
        monitoring.ltfu_state = state;
        monitoring.month_of_ltfu_change = Some(month);
        self.refresh_care_state();
    }

    // ----- ART -----

    /// Resolve the ART response factors and outcome values for the
    /// current regimen from a response logit.
    pub fn set_curr_art_response(&mut self, logit: f64) {
        let line = &self.sim.art.lines[self.patient.art.curr_line];
        let propensity = tsukihi_core::prob::logit_to_prob(logit);
        let art = &mut self.patient.art;
        art.response_logit = logit;
        let curves = [
            &line.het.suppression,
            &line.het.late_failure,
            &line.het.art_effect_oi,
            &line.het.art_effect_chrm,
            &line.het.art_effect_mortality,
            &line.het.resistance,
            &line.het.toxicity,
            &line.het.cost,
            &line.het.restart,
            &line.het.resuppression,
        ];
        for (i, curve) in curves.iter().enumerate() {
            let fraction = curve.fraction(propensity);
            art.response_factors[i] = fraction;
            art.response_values[i] = curve.factor(propensity);
            art.response_types[i] = if fraction >= 1.0 {
                RespType::Full
            } else if fraction > 0.0 {
                RespType::Partial
            } else {
                RespType::Non
            };
        }
        art.prob_initial_efficacy = line.het.suppression.factor(propensity);
        art.prob_late_fail = line.het.late_failure.factor(propensity);
        art.prob_resuppression = line.het.resuppression.factor(propensity);
        art.prob_restart_after_fail = line.het.restart.factor(propensity);
        art.cost_factor = line.het.cost.factor(propensity);
        art.apply_art_effect =
            art.response_types[HetOutcome::ArtEffectMortality.index()] != RespType::Non;
    }

    /// Set the regimen efficacy and stamp the change month.
    pub fn set_art_efficacy(&mut self, efficacy: ArtEfficacy) {
        let month = self.month();
        let art = &mut self.patient.art;
        art.efficacy = efficacy;
        art.month_of_efficacy_change = month;
        if efficacy == ArtEfficacy::Success {
            if !art.had_success_on_regimen {
                art.had_success_on_regimen = true;
                art.month_of_initial_success = Some(month);
            }
            art.failed_resuppressions = 0;
        }
    }

    pub fn set_target_hvl(&mut self, target: HvlStrata) {
        self.patient.disease.target_hvl = target;
    }

    /// Stop the current ART regimen with a typed reason.
    pub fn stop_curr_art(&mut self, stop_type: ArtStopType) {
        let month = self.month();
        let art = &mut self.patient.art;
        if !art.on_art {
            return;
        }
        art.on_art = false;
        art.on_resuppression = false;
        art.prev_line = Some(art.curr_line);
        art.month_of_prev_stop = Some(month);
        art.stop_type = stop_type;
        art.has_severe_toxicity = false;
        art.has_chronic_tox_switch = false;
        self.stats.record_art_stop(stop_type);
        let prev = art.curr_line;
        self.trace(format!(
            "TAKEN OFF ART {} by {}",
            prev + 1,
            stop_type.label()
        ));
    }

    /// Point the ART module at the next regimen, if any.
    pub fn set_next_art_regimen(&mut self, next: Option<usize>, is_resuppression: bool) {
        self.patient.art.next_line = next;
        self.patient.art.next_is_resuppression = is_resuppression;
    }

    // ----- prophylaxis -----

    /// Stop the current prophylaxis for one OI.
    pub fn stop_curr_proph(&mut self, oi: usize) {
        let proph = &mut self.patient.proph;
        if !proph.on_proph[oi] {
            return;
        }
        proph.on_proph[oi] = false;
        proph.month_started[oi] = None;
        proph.total_on = proph.total_on.saturating_sub(1);
    }

    // ----- TB -----

    pub fn set_tb_care_state(&mut self, state: TbCareState) {
        self.patient.tb.care_state = state;
    }

    /// Move the patient to TB LTFU.
    pub fn set_tb_ltfu(&mut self) {
        let month = self.month();
        self.patient.tb.care_state = TbCareState::Ltfu;
        self.patient.tb.month_of_tb_ltfu = Some(month);
    }

    /// Return the patient to TB care.
    pub fn set_tb_rtc(&mut self) {
        self.patient.tb.care_state = TbCareState::ReturnedToCare;
        self.patient.tb.month_of_tb_ltfu = None;
    }

    /// Stop the current TB prophylaxis line.
    pub fn stop_curr_tb_proph(&mut self) {
        let month = self.month();
        let tb = &mut self.patient.tb;
        if !tb.on_proph {
            return;
        }
        tb.on_proph = false;
        tb.month_of_proph_stop = Some(month);
    }

    /// Select the next TB prophylaxis line pointer.
    pub fn set_next_tb_proph(&mut self, next: Option<usize>) {
        self.patient.tb.next_proph_line = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SimRng;

    fn with_ctx(test: impl FnOnce(&mut UpdaterCtx)) {
        let sim = SimContext::default();
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::new();
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.general.tracing_enabled = true;
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        test(&mut ctx);
    }

    #[test]
    fn test_add_cost_discounts_and_books() {
        let mut input = crate::inputs::InputFile::default();
        input.run_specs.discount_annual = 0.0;
        let sim = SimContext::from_input(input);
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::disabled();
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        ctx.add_medical_cost(100.0);
        assert_eq!(ctx.patient.general.costs_discounted, 100.0);
        assert_eq!(ctx.patient.general.costs_undiscounted, 100.0);
        assert_eq!(ctx.costs.total_discounted(), 100.0);
    }

    #[test]
    fn test_qol_floors_at_zero() {
        with_ctx(|ctx| {
            ctx.patient.general.qol_month = 0.4;
            ctx.accumulate_qol(-2.0);
            assert_eq!(ctx.patient.general.qol_month, 0.0);
        });
    }

    #[test]
    fn test_emergency_visit_keeps_earliest() {
        with_ctx(|ctx| {
            ctx.schedule_emergency_visit(EmergencyKind::Art, 5);
            ctx.schedule_emergency_visit(EmergencyKind::AcuteOi, 8);
            assert_eq!(
                ctx.patient.monitoring.emergency_visit,
                Some((EmergencyKind::Art, 5))
            );
            ctx.schedule_emergency_visit(EmergencyKind::AcuteOi, 2);
            assert_eq!(
                ctx.patient.monitoring.emergency_visit,
                Some((EmergencyKind::AcuteOi, 2))
            );
        });
    }

    #[test]
    fn test_care_state_derivation() {
        with_ctx(|ctx| {
            ctx.refresh_care_state();
            assert_eq!(ctx.patient.monitoring.care_state, CareState::HivNegative);
            ctx.patient.disease.hiv_state = HivState::AsymptomaticChronic;
            ctx.refresh_care_state();
            assert_eq!(ctx.patient.monitoring.care_state, CareState::Undetected);
            ctx.set_detected(0);
            assert_eq!(
                ctx.patient.monitoring.care_state,
                CareState::DetectedUnlinked
            );
            ctx.set_linked(0);
            assert_eq!(ctx.patient.monitoring.care_state, CareState::InCare);
            ctx.set_ltfu_state(LtfuState::Lost);
            assert_eq!(ctx.patient.monitoring.care_state, CareState::Ltfu);
        });
    }

    #[test]
    fn test_detection_stats_split_incident_prevalent() {
        with_ctx(|ctx| {
            ctx.patient.disease.hiv_state = HivState::AsymptomaticChronic;
            ctx.patient.disease.prevalent_case = false;
            ctx.patient.disease.month_of_infection = Some(3);
            ctx.patient.disease.true_cd4 = 250.0;
            ctx.patient.general.month = 10;
            ctx.set_detected(10);
            assert_eq!(ctx.stats.num_incident_detections, 1);
            assert_eq!(ctx.stats.sum_months_infection_to_detection, 7.0);
        });
    }

    #[test]
    fn test_stop_art_records_reason() {
        with_ctx(|ctx| {
            ctx.patient.art.on_art = true;
            ctx.patient.art.curr_line = 0;
            ctx.stop_curr_art(ArtStopType::Ltfu);
            assert!(!ctx.patient.art.on_art);
            assert_eq!(ctx.patient.art.stop_type, ArtStopType::Ltfu);
            assert_eq!(ctx.stats.num_art_stops_by_type["LTFU"], 1);
        });
    }
}
