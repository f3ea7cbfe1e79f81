//! Step 10: adherence interventions, loss to follow-up, return to care.

use tsukihi_core::prob::logit_to_prob;

use crate::types::{
    ArtEfficacy, ArtStopType, CostCategory, LogitDistribution, LtfuState, PedsAgeCat, StiState,
    TbCareState,
};

use super::UpdaterCtx;

pub(crate) fn initial(ctx: &mut UpdaterCtx) {
    if ctx.sim.ltfu.use_ltfu {
        let params = ctx.sim.ltfu.pre_art_logit;
        ctx.patient.general.pre_art_logit_base =
            ctx.patient.rng.gaussian(params.mean, params.std_dev);
    }
    ctx.patient.general.next_intervention = ctx.sim.heterogeneity.next_intervention(0);
}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    update_intervention_end(ctx);
    update_intervention_start(ctx);
    apply_intervention_monthly_cost(ctx);
    update_regimen_increment_expiry(ctx);

    if !ctx.sim.ltfu.use_ltfu {
        return;
    }
    if ctx.patient.monitoring.ltfu_state == LtfuState::Lost {
        roll_return_to_care(ctx);
    } else {
        roll_ltfu(ctx);
    }
}

/// The on-ART response logit that applies right now, honoring the
/// regimen increment duration but excluding intervention effects.
fn current_regimen_logit(ctx: &UpdaterCtx) -> f64 {
    let art = &ctx.patient.art;
    match art.month_increment_ends {
        Some(end) if ctx.month() > end => art.response_logit_pre_increment,
        _ => art.response_logit_base,
    }
}

fn update_intervention_end(ctx: &mut UpdaterCtx) {
    if !ctx.patient.general.on_intervention {
        return;
    }
    if ctx.patient.general.month_intervention_ends > ctx.month() {
        return;
    }
    end_intervention(ctx);
}

fn end_intervention(ctx: &mut UpdaterCtx) {
    ctx.patient.general.on_intervention = false;
    ctx.patient.general.curr_intervention = None;
    ctx.patient.general.intervention_logit_increment = 0.0;
    if ctx.patient.art.on_art {
        let logit = current_regimen_logit(ctx);
        ctx.set_curr_art_response(logit);
    }
    ctx.trace("STOPPED ADHERENCE INTERVENTION");
}

fn update_intervention_start(ctx: &mut UpdaterCtx) {
    if ctx.patient.general.on_intervention {
        return;
    }
    let index = match ctx.patient.general.next_intervention {
        Some(i) => i,
        None => return,
    };
    let month = ctx.month();
    let period = ctx.sim.heterogeneity.interventions[index].clone();

    let duration = (ctx
        .patient
        .rng
        .gaussian(period.duration.mean, period.duration.std_dev)
        + 0.5)
        .max(0.0) as u32;
    let adjustment = match period.adjustment_distribution {
        LogitDistribution::Normal => ctx
            .patient
            .rng
            .gaussian(period.adjustment.mean, period.adjustment.std_dev),
        LogitDistribution::TruncatedNormal => ctx
            .patient
            .rng
            .gaussian_non_negative(period.adjustment.mean, period.adjustment.std_dev),
        LogitDistribution::SquaredNormal => {
            let v = ctx
                .patient
                .rng
                .gaussian_non_negative(period.adjustment.mean, period.adjustment.std_dev);
            v * v
        }
    };

    let general = &mut ctx.patient.general;
    general.on_intervention = true;
    general.curr_intervention = Some(index);
    general.month_intervention_started = month;
    general.month_intervention_ends = month + duration;
    general.intervention_logit_increment = adjustment;
    general.next_intervention = ctx.sim.heterogeneity.next_intervention(index + 1);

    if ctx.patient.art.on_art {
        let logit = current_regimen_logit(ctx) + adjustment;
        ctx.set_curr_art_response(logit);
    }
    ctx.add_cost(period.cost_at_start, CostCategory::DirectNonMedical);
    ctx.trace(format!(
        "STARTED ADHERENCE INTERVENTION PERIOD {}",
        index + 1
    ));
}

fn apply_intervention_monthly_cost(ctx: &mut UpdaterCtx) {
    let index = match (ctx.patient.general.on_intervention, ctx.patient.general.curr_intervention)
    {
        (true, Some(i)) => i,
        _ => return,
    };
    let scale =
        ctx.sim.ltfu.intervention_cost_scale[ctx.patient.monitoring.care_state.index()];
    let cost = ctx.sim.heterogeneity.interventions[index].cost_monthly * scale;
    ctx.add_cost(cost, CostCategory::DirectNonMedical);
}

/// The regimen-specific increment may expire mid-regimen.
fn update_regimen_increment_expiry(ctx: &mut UpdaterCtx) {
    if !ctx.patient.art.on_art {
        return;
    }
    if ctx.patient.art.month_increment_ends != Some(ctx.month()) {
        return;
    }
    let mut logit = ctx.patient.art.response_logit_pre_increment;
    if ctx.patient.general.on_intervention {
        logit += ctx.patient.general.intervention_logit_increment;
    }
    ctx.set_curr_art_response(logit);
}

/// LTFU propensity: the current regimen logit on ART, covariates off it.
fn ltfu_logit(ctx: &UpdaterCtx) -> f64 {
    if ctx.patient.art.on_art {
        return ctx.patient.art.response_logit;
    }
    let het = &ctx.sim.heterogeneity;
    let general = &ctx.patient.general;
    let mut logit = general.baseline_logit;
    match ctx.patient.peds.age_category {
        PedsAgeCat::EarlyChildhood => logit += het.age_coefficient_early_childhood,
        PedsAgeCat::LateChildhood => {
            logit += het.age_coefficient_late_childhood;
            logit += het.cd4_coefficient[ctx.patient.disease.cd4_strata().index()];
        }
        _ => {
            logit +=
                het.age_coefficient[crate::inputs::heterogeneity::het_age_category(general.age_months)];
            logit += het.cd4_coefficient[ctx.patient.disease.cd4_strata().index()];
        }
    }
    if general.gender == crate::types::Gender::Female {
        logit += het.female_coefficient;
    }
    if ctx.patient.disease.has_oi_history() {
        logit += het.oi_history_coefficient;
    }
    if ctx.patient.art.had_prev_toxicity {
        logit += het.prior_toxicity_coefficient;
    }
    for (i, has) in general.risk_factors.iter().enumerate() {
        if *has {
            logit += het.risk_factor_coefficient.get(i).copied().unwrap_or(0.0);
        }
    }
    logit += general.pre_art_logit_base;
    if general.on_intervention {
        logit += general.intervention_logit_increment;
    }
    logit
}

fn roll_ltfu(ctx: &mut UpdaterCtx) {
    // LTFU only applies once the patient has engaged with care.
    if !ctx.patient.monitoring.had_prev_visit {
        return;
    }
    let propensity = logit_to_prob(ltfu_logit(ctx));
    let intervention = ctx
        .patient
        .general
        .on_intervention
        .then_some(ctx.patient.general.curr_intervention)
        .flatten();
    let prob = ctx
        .sim
        .ltfu
        .active_ltfu_curve(intervention)
        .factor(propensity);
    if !ctx.patient.rng.event(prob) {
        return;
    }
    become_lost(ctx);
}

fn become_lost(ctx: &mut UpdaterCtx) {
    ctx.set_ltfu_state(LtfuState::Lost);

    // Integrated HIV/TB clinic: HIV loss drives TB loss.
    if ctx.sim.tb.enable && ctx.sim.tb.ltfu.use_tb_ltfu && ctx.sim.tb.integrated_clinic {
        if ctx.patient.tb.care_state == TbCareState::InCare {
            ctx.set_tb_ltfu();
        }
        if ctx.patient.tb.on_proph {
            if ctx.patient.rng.event(ctx.sim.tb.proph.prob_stop_at_hiv_ltfu) {
                ctx.stop_curr_tb_proph();
                select_tb_proph_after_stop(ctx);
            }
        } else if let Some((_, start_month)) = ctx.patient.tb.scheduled_proph {
            if !ctx.sim.tb.proph.allow_start_while_hiv_ltfu && ctx.month() <= start_month {
                ctx.patient.tb.scheduled_proph = None;
            }
        }
    }

    // Stop ART and decide the regimen at return.
    if ctx.patient.art.on_art {
        if ctx.patient.art.sti_state != StiState::None {
            ctx.patient.art.sti_state = StiState::None;
        }
        let failed = ctx.patient.art.efficacy == ArtEfficacy::Failure;
        let has_next = ctx.patient.art.next_line.is_some();
        let prev_line = ctx.patient.art.curr_line;
        ctx.stop_curr_art(ArtStopType::Ltfu);
        ctx.set_target_hvl(ctx.patient.disease.setpoint_hvl);

        let restart = if failed && has_next {
            if ctx.patient.art.observed_failure {
                let months_fail = ctx
                    .patient
                    .art
                    .month_of_observed_failure
                    .map(|m| ctx.month() - m)
                    .unwrap_or(u32::MAX);
                months_fail < ctx.sim.ltfu.max_months_after_observed_failure_to_restart
            } else {
                ctx.patient
                    .rng
                    .event(ctx.sim.ltfu.prob_restart_without_observed_failure)
            }
        } else {
            true
        };
        if restart {
            ctx.set_next_art_regimen(Some(prev_line), false);
        }
    }

    // Roll once for staying on the OI prophs.
    if !ctx
        .patient
        .rng
        .event(ctx.sim.ltfu.prob_remain_on_oi_proph)
    {
        for oi in 0..ctx.sim.oi_count() {
            if ctx.patient.proph.on_proph[oi] {
                ctx.stop_curr_proph(oi);
            }
        }
    }

    ctx.schedule_regular_visit(None);
    ctx.clear_emergency_visit();
    ctx.trace("PATIENT LOST TO FOLLOW UP");
}

/// After stopping TB proph at HIV loss, decide what line (if any) can
/// resume at return.
fn select_tb_proph_after_stop(ctx: &mut UpdaterCtx) {
    let tb = &ctx.patient.tb;
    let proph = &ctx.sim.tb.proph;
    if tb.proph_major_toxicity && !proph.move_to_next_after_toxicity {
        ctx.set_next_tb_proph(None);
        return;
    }
    let current = tb.proph_line;
    if !tb.proph_major_toxicity {
        let starts = tb.proph_starts_by_line.get(current).copied().unwrap_or(0);
        let max = proph
            .lines
            .get(current)
            .map(|l| l.max_restarts)
            .unwrap_or(0);
        if starts <= max {
            ctx.set_next_tb_proph(Some(current));
            return;
        }
    }
    let next = proph
        .order
        .iter()
        .copied()
        .filter(|i| *i > current)
        .find(|i| {
            let starts = tb.proph_starts_by_line.get(*i).copied().unwrap_or(0);
            let max = proph.lines.get(*i).map(|l| l.max_restarts).unwrap_or(0);
            starts <= max
        });
    ctx.set_next_tb_proph(next);
}

fn roll_return_to_care(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let months_lost = ctx
        .patient
        .monitoring
        .month_of_ltfu_change
        .map(|m| month - m)
        .unwrap_or(0);
    let has_acute_oi = ctx.patient.disease.current_oi.is_some();
    if months_lost < ctx.sim.ltfu.min_months_remain_lost && !has_acute_oi {
        return;
    }

    let rtc = &ctx.sim.ltfu.rtc;
    let mut logit = rtc.background;
    if ctx.patient.peds.age_category != PedsAgeCat::EarlyChildhood
        && ctx.patient.disease.true_cd4 < rtc.cd4_threshold
    {
        logit += rtc.cd4_below_threshold;
    }
    if let Some(oi) = ctx.patient.disease.current_oi {
        if ctx.sim.nat_hist.ois[oi].severity == crate::types::OiSeverity::Severe {
            logit += rtc.acute_severe_oi;
        } else {
            logit += rtc.acute_mild_oi;
        }
    }
    if let Some(diag) = ctx.patient.tb.month_of_positive_diagnosis {
        if month == diag + 1 {
            logit += rtc.tb_positive_diagnosis;
        }
    }
    if !ctx.patient.rng.event(logit_to_prob(logit)) {
        return;
    }

    ctx.set_ltfu_state(LtfuState::Returned);
    if ctx.patient.tb.care_state == TbCareState::Ltfu && ctx.sim.tb.integrated_clinic {
        ctx.set_tb_rtc();
    }
    ctx.schedule_regular_visit(Some(month));
    ctx.trace("PATIENT RETURNED TO CARE");

    if ctx.patient.general.on_intervention {
        if ctx
            .patient
            .rng
            .event(ctx.sim.ltfu.prob_resume_intervention_rtc)
        {
            let cost = ctx.sim.ltfu.cost_resume_intervention_rtc;
            ctx.add_cost(cost, CostCategory::DirectNonMedical);
            ctx.trace("RESUMED ADHERENCE INTERVENTION");
        } else {
            end_intervention(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::heterogeneity::InterventionPeriod;
    use crate::inputs::nat_hist::NormalParams;
    use crate::inputs::{InputFile, SimContext};
    use crate::rng::SimRng;
    use crate::state::Patient;
    use crate::stats::{CostStats, RunStats};
    use crate::trace::Tracer;
    use tsukihi_core::response::ResponseCurve;

    fn step(sim: &SimContext, patient: &mut Patient) {
        let mut stats = RunStats::new(sim);
        let mut costs = CostStats::new(sim);
        let mut tracer = Tracer::disabled();
        let mut ctx = UpdaterCtx::new(patient, sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
    }

    #[test]
    fn test_intervention_starts_and_expires() {
        let mut input = InputFile::default();
        input.heterogeneity.interventions = vec![InterventionPeriod {
            enable: true,
            duration: NormalParams::new(3.0, 0.0),
            adjustment: NormalParams::new(0.7, 0.0),
            cost_at_start: 25.0,
            ..Default::default()
        }];
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.general.next_intervention = Some(0);
        step(&sim, &mut patient);
        assert!(patient.general.on_intervention);
        assert_eq!(patient.general.month_intervention_ends, 3);
        assert!((patient.general.intervention_logit_increment - 0.7).abs() < 1e-9);
        assert_eq!(patient.general.costs_undiscounted, 25.0);
        assert_eq!(patient.general.next_intervention, None);
        patient.general.month = 3;
        step(&sim, &mut patient);
        assert!(!patient.general.on_intervention);
    }

    #[test]
    fn test_squared_normal_adjustment_is_non_negative() {
        let mut input = InputFile::default();
        input.heterogeneity.interventions = vec![InterventionPeriod {
            enable: true,
            adjustment: NormalParams::new(0.5, 2.0),
            adjustment_distribution: LogitDistribution::SquaredNormal,
            ..Default::default()
        }];
        let sim = SimContext::from_input(input);
        for seed in 0..20 {
            let mut patient = Patient::new(seed, &sim, SimRng::new(seed));
            patient.general.next_intervention = Some(0);
            step(&sim, &mut patient);
            assert!(patient.general.intervention_logit_increment >= 0.0);
        }
    }

    #[test]
    fn test_certain_ltfu_stops_art_and_visits() {
        let mut input = InputFile::default();
        input.ltfu.use_ltfu = true;
        input.ltfu.ltfu_curve = ResponseCurve::flat(1.0);
        input.art.lines = vec![crate::inputs::art::ArtLineInputs::default()];
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.monitoring.had_prev_visit = true;
        patient.monitoring.detected = true;
        patient.monitoring.linked = true;
        patient.disease.hiv_state = crate::types::HivState::AsymptomaticChronic;
        patient.art.on_art = true;
        patient.art.curr_line = 0;
        patient.monitoring.has_regular_visit = true;
        step(&sim, &mut patient);
        assert_eq!(patient.monitoring.ltfu_state, LtfuState::Lost);
        assert!(!patient.art.on_art);
        assert_eq!(patient.art.stop_type, ArtStopType::Ltfu);
        assert!(!patient.monitoring.has_regular_visit);
        // Suppressed regimen stopped by LTFU restarts at return.
        assert_eq!(patient.art.next_line, Some(0));
    }

    #[test]
    fn test_rtc_waits_out_minimum_months() {
        let mut input = InputFile::default();
        input.ltfu.use_ltfu = true;
        input.ltfu.min_months_remain_lost = 6;
        input.ltfu.rtc.background = 100.0;
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.monitoring.ltfu_state = LtfuState::Lost;
        patient.monitoring.month_of_ltfu_change = Some(0);
        patient.general.month = 3;
        step(&sim, &mut patient);
        assert_eq!(patient.monitoring.ltfu_state, LtfuState::Lost);
        patient.general.month = 6;
        step(&sim, &mut patient);
        assert_eq!(patient.monitoring.ltfu_state, LtfuState::Returned);
        assert!(patient.monitoring.has_regular_visit);
        assert_eq!(patient.monitoring.month_of_regular_visit, 6);
    }

    #[test]
    fn test_never_visited_patients_are_not_lost() {
        let mut input = InputFile::default();
        input.ltfu.use_ltfu = true;
        input.ltfu.ltfu_curve = ResponseCurve::flat(1.0);
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        step(&sim, &mut patient);
        assert_eq!(patient.monitoring.ltfu_state, LtfuState::Never);
    }
}
