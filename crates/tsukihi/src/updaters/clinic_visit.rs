//! Step 13: clinic visits - ART start/stop/switch policy, observed
//! failure diagnosis, prophylaxis policy, visit costing.

use tsukihi_core::strata::HvlStrata;

use crate::inputs::art::ArtLineInputs;
use crate::state::ToxicityEffect;
use crate::types::{
    ArtEfficacy, ArtFailType, ArtStopType, EmergencyKind, HetOutcome, HivState, LogitDistribution,
    LtfuState, OiSeverity, ProphToxKind, ProphType, StiState,
};

use super::UpdaterCtx;

pub(crate) fn initial(_ctx: &mut UpdaterCtx) {}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    update_sti_restart(ctx);
    if !ctx.patient.monitoring.linked || ctx.patient.monitoring.ltfu_state == LtfuState::Lost {
        return;
    }
    if !ctx.patient.monitoring.has_visit_this_month(month) {
        return;
    }
    perform_visit_bookkeeping(ctx);
    if ctx.patient.disease.hiv_state == HivState::Negative {
        // False-positive pediatric patients attend but receive no ART.
        return;
    }
    diagnose_observed_failure(ctx);
    evaluate_art_stop(ctx);
    evaluate_sub_regimen_switch(ctx);
    evaluate_art_start(ctx);
    evaluate_proph_policies(ctx);
}

fn perform_visit_bookkeeping(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    ctx.patient.monitoring.had_prev_visit = true;
    ctx.stats.total_clinic_visits += 1;
    let cost = ctx.sim.cost.clinic_visit_cost;
    ctx.add_medical_cost(cost);
    for count in ctx.patient.monitoring.observed_ois_since_visit.iter_mut() {
        *count = 0;
    }
    for count in ctx.patient.disease.ois_since_last_visit.iter_mut() {
        *count = 0;
    }
    ctx.clear_emergency_visit();
    let interval = ctx.sim.treatment.clinic_visit_interval.max(1);
    ctx.schedule_regular_visit(Some(month + interval));
}

/// Confirm an observed ART failure from the accumulated counters.
fn diagnose_observed_failure(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let art = &ctx.patient.art;
    if !art.on_art || art.observed_failure {
        return;
    }
    let policy = ctx.sim.treatment.failure_policy(art.curr_line);
    let fail_type = if policy
        .hvl_tests_to_fail
        .is_some_and(|n| art.failed_hvl_tests >= n)
    {
        Some(ArtFailType::Virologic)
    } else if policy
        .cd4_tests_to_fail
        .is_some_and(|n| art.failed_cd4_tests >= n)
    {
        Some(ArtFailType::Immunologic)
    } else if policy.ois_to_fail.is_some_and(|n| art.failed_oi_events >= n) {
        Some(ArtFailType::Clinical)
    } else {
        None
    };
    if let Some(fail_type) = fail_type {
        let art = &mut ctx.patient.art;
        art.observed_failure = true;
        art.observed_failure_type = Some(fail_type);
        art.month_of_observed_failure = Some(month);
        art.num_observed_failures += 1;
        let line = art.curr_line;
        ctx.stats.num_observed_failures[line] += 1;
        ctx.trace(format!("OBSERVED ART FAILURE {}", fail_type.label()));
    }
}

/// Stop policy evaluation. A chronic-toxicity switch outranks an
/// observed-failure switch arriving the same month.
fn evaluate_art_stop(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let art = &ctx.patient.art;
    if !art.on_art {
        return;
    }
    let line_idx = art.curr_line;
    let policy = ctx.sim.treatment.stop_policy(line_idx);
    let months_on = art.months_on_regimen(month);

    let mut stop: Option<ArtStopType> = None;
    if art.has_major_toxicity && policy.on_major_toxicity {
        stop = Some(ArtStopType::MajorToxicity);
    } else if art.has_chronic_tox_switch {
        stop = Some(ArtStopType::ChronicToxicity);
    } else if policy.max_months.is_some_and(|m| months_on >= m) {
        stop = Some(ArtStopType::MaxMonths);
    } else if art.observed_failure && policy.on_observed_failure {
        let observed_cd4 = ctx.patient.monitoring.observed_cd4;
        if let Some(bound) = policy.fail_requires_cd4_below {
            if observed_cd4.is_some_and(|cd4| cd4 < bound) {
                stop = Some(ArtStopType::FailAndCd4);
            }
        } else if policy.fail_requires_severe_oi {
            let severe_now = ctx
                .patient
                .disease
                .current_oi
                .map(|oi| ctx.sim.nat_hist.ois[oi].severity == OiSeverity::Severe)
                .unwrap_or(false);
            if severe_now {
                stop = Some(ArtStopType::FailAndSevereOi);
            }
        } else if let Some(wait) = policy.months_from_observed_failure {
            let since = art
                .month_of_observed_failure
                .map(|m| month - m)
                .unwrap_or(0);
            if since >= wait {
                stop = Some(ArtStopType::ObservedFailure);
            }
        } else {
            stop = Some(ArtStopType::ObservedFailure);
        }
    } else if should_sti_interrupt(ctx, months_on) {
        stop = Some(ArtStopType::Sti);
    }

    let stop = match stop {
        Some(s) => s,
        None => return,
    };
    let was_failed = ctx.patient.art.efficacy == ArtEfficacy::Failure;
    ctx.stop_curr_art(stop);
    ctx.set_target_hvl(ctx.patient.disease.setpoint_hvl);

    if stop == ArtStopType::Sti {
        ctx.patient.art.sti_state = StiState::Interrupted;
        ctx.patient.art.month_of_sti_change = Some(month);
        ctx.patient.art.sti_interruptions_on_regimen += 1;
        ctx.set_next_art_regimen(Some(line_idx), false);
        return;
    }

    // Next regimen selection: a failed responder may resuppress on the
    // same line; otherwise advance to the next line.
    let restart_prob = ctx.patient.art.prob_restart_after_fail;
    let can_resupp = was_failed
        && ctx.patient.art.failed_resuppressions < ctx.sim.art.max_failed_resuppressions
        && ctx.patient.art.prob_resuppression > 0.0;
    if can_resupp && ctx.patient.rng.event(restart_prob) {
        ctx.set_next_art_regimen(Some(line_idx), true);
    } else {
        let next = line_idx + 1;
        if next < ctx.sim.art_line_count() {
            ctx.set_next_art_regimen(Some(next), false);
        } else {
            ctx.set_next_art_regimen(None, false);
        }
    }
}

fn should_sti_interrupt(ctx: &UpdaterCtx, months_on: u32) -> bool {
    let sti = &ctx.sim.treatment.sti;
    sti.enable
        && months_on >= sti.months_before_interruption
        && ctx.patient.art.sti_interruptions_on_regimen < sti.max_interruptions
        && ctx.patient.art.sti_state != StiState::Interrupted
}

/// Restart after a structured interruption runs on the clock, not the
/// clinic visit.
fn update_sti_restart(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    if ctx.patient.art.sti_state != StiState::Interrupted || ctx.patient.art.on_art {
        return;
    }
    let sti = &ctx.sim.treatment.sti;
    let since = ctx
        .patient
        .art
        .month_of_sti_change
        .map(|m| month - m)
        .unwrap_or(0);
    if since >= sti.interruption_months {
        if let Some(line) = ctx.patient.art.next_line {
            let interruptions = ctx.patient.art.sti_interruptions_on_regimen;
            start_art_regimen(ctx, line, false);
            ctx.patient.art.sti_interruptions_on_regimen = interruptions;
            ctx.patient.art.sti_state = StiState::Restarted;
            ctx.patient.art.month_of_sti_change = Some(month);
        }
    }
}

/// Severe (non-stopping) toxicity or a scheduled switch moves the
/// patient to the next sub-regimen.
fn evaluate_sub_regimen_switch(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let art = &ctx.patient.art;
    if !art.on_art {
        return;
    }
    let line = &ctx.sim.art.lines[art.curr_line];
    let sub = art.curr_sub_regimen;
    let months_on_sub = month.saturating_sub(art.month_of_sub_regimen_start);
    let scheduled = line.sub_regimens[sub]
        .months_to_switch
        .is_some_and(|m| months_on_sub >= m);
    if !scheduled && !art.has_severe_toxicity {
        return;
    }
    if sub + 1 < line.sub_regimens.len() {
        let art = &mut ctx.patient.art;
        art.curr_sub_regimen += 1;
        art.month_of_sub_regimen_start = month;
        art.has_severe_toxicity = false;
        let new_sub = art.curr_sub_regimen;
        let line_idx = art.curr_line;
        roll_toxicity_templates(ctx, line_idx, new_sub);
        ctx.trace(format!("ART SUBREGIMEN SWITCH to {}", new_sub));
    } else {
        ctx.patient.art.has_severe_toxicity = false;
    }
}

/// ART start policy, evaluated for the next available regimen.
fn evaluate_art_start(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let art = &ctx.patient.art;
    if art.on_art || !art.may_receive {
        return;
    }
    if art.sti_state == StiState::Interrupted {
        return;
    }
    let line_idx = match art.next_line {
        Some(l) => l,
        None => return,
    };
    let policy = ctx.sim.treatment.start_policy(line_idx);
    let monitoring = &ctx.patient.monitoring;

    if month < policy.min_month {
        return;
    }
    if policy.max_month.is_some_and(|m| month > m) {
        return;
    }
    if let Some(cooldown) = policy.months_since_prev_stop {
        let since = art.month_of_prev_stop.map(|m| month - m).unwrap_or(u32::MAX);
        if since < cooldown {
            return;
        }
    }
    if let Some(max) = policy.max_cd4 {
        match monitoring.observed_cd4 {
            Some(cd4) if cd4 <= max => {}
            _ => return,
        }
    }
    if let Some(min) = policy.min_cd4 {
        match monitoring.observed_cd4 {
            Some(cd4) if cd4 >= min => {}
            _ => return,
        }
    }
    if let Some(min_hvl) = policy.min_hvl {
        match monitoring.observed_hvl {
            Some(hvl) if hvl >= min_hvl => {}
            _ => return,
        }
    }
    if let Some(min_ois) = policy.min_observed_ois {
        let total: u32 = monitoring.observed_ois_total.iter().sum();
        if total < min_ois {
            return;
        }
    }
    if policy.require_severe_oi_history {
        let any_severe = (0..ctx.sim.oi_count()).any(|oi| {
            ctx.sim.nat_hist.ois[oi].severity == OiSeverity::Severe
                && monitoring.observed_ois_total[oi] > 0
        });
        if !any_severe {
            return;
        }
    }
    let resupp = ctx.patient.art.next_is_resuppression;
    start_art_regimen(ctx, line_idx, resupp);
}

/// Initiate a regimen: response draw, efficacy roll, slopes, envelopes,
/// toxicity template rolls.
pub(crate) fn start_art_regimen(ctx: &mut UpdaterCtx, line_idx: usize, resuppression: bool) {
    let month = ctx.month();
    let line: ArtLineInputs = ctx.sim.art.lines[line_idx].clone();

    {
        let art = &mut ctx.patient.art;
        art.on_art = true;
        art.on_resuppression = resuppression;
        art.curr_line = line_idx;
        art.curr_sub_regimen = 0;
        art.month_of_regimen_start = month;
        art.month_of_sub_regimen_start = month;
        art.has_taken_art = true;
        art.taken_by_line[line_idx] = true;
        if art.month_first_art.is_none() {
            art.month_first_art = Some(month);
        }
        art.next_line = None;
        art.next_is_resuppression = false;
        art.had_success_on_regimen = false;
        art.month_of_initial_success = None;
        art.observed_failure = false;
        art.observed_failure_type = None;
        art.failed_cd4_tests = 0;
        art.failed_hvl_tests = 0;
        art.failed_oi_events = 0;
        art.has_major_toxicity = false;
        art.has_chronic_tox_switch = false;
        art.has_severe_toxicity = false;
        art.observed_hvl_at_start = ctx.patient.monitoring.observed_hvl;
        art.max_observed_cd4_on_art = ctx.patient.monitoring.observed_cd4.unwrap_or(0.0);
        art.max_observed_cd4_percentage_on_art =
            ctx.patient.monitoring.observed_cd4_percentage.unwrap_or(0.0);
        art.min_observed_hvl_on_art = None;
        for count in art.observed_ois_since_fail_or_stop.iter_mut() {
            *count = 0;
        }
        art.sti_interruptions_on_regimen = 0;
    }

    // Patient-regimen response logit.
    let base = match line.response_logit_distribution {
        LogitDistribution::Normal => ctx
            .patient
            .rng
            .gaussian(line.response_logit.mean, line.response_logit.std_dev),
        LogitDistribution::TruncatedNormal => ctx
            .patient
            .rng
            .gaussian_non_negative(line.response_logit.mean, line.response_logit.std_dev),
        LogitDistribution::SquaredNormal => {
            let v = ctx
                .patient
                .rng
                .gaussian_non_negative(line.response_logit.mean, line.response_logit.std_dev);
            v * v
        }
    };
    let pre_increment = ctx.patient.general.baseline_logit + base;
    let with_increment = pre_increment + line.response_logit_increment;
    {
        let art = &mut ctx.patient.art;
        art.response_logit_pre_increment = pre_increment;
        art.response_logit_base = with_increment;
        art.month_increment_ends = line
            .response_increment_duration
            .map(|d| month + d);
    }
    let mut logit = with_increment;
    if ctx.patient.general.on_intervention {
        logit += ctx.patient.general.intervention_logit_increment;
    }
    ctx.set_curr_art_response(logit);

    // Initial efficacy.
    let prob_success = if resuppression {
        ctx.patient.art.prob_resuppression
    } else {
        ctx.patient.art.prob_initial_efficacy
    };
    if ctx.patient.rng.event(prob_success) {
        ctx.set_art_efficacy(ArtEfficacy::Success);
        ctx.set_target_hvl(HvlStrata::VeryLow);
        install_slopes_and_envelopes(ctx, line_idx);
    } else {
        if resuppression {
            ctx.patient.art.failed_resuppressions += 1;
        }
        ctx.set_art_efficacy(ArtEfficacy::Failure);
        ctx.set_target_hvl(ctx.patient.disease.setpoint_hvl);
    }

    roll_toxicity_templates(ctx, line_idx, 0);
    ctx.stats.num_art_starts[line_idx] += 1;
    ctx.trace(format!(
        "ART {} START ({})",
        line_idx + 1,
        ctx.patient.art.efficacy.label()
    ));
}

/// Stage-0 slopes and envelope activation on a successful start.
fn install_slopes_and_envelopes(ctx: &mut UpdaterCtx, line_idx: usize) {
    let month = ctx.month();
    let early_childhood = ctx.sim.peds.enable
        && ctx
            .patient
            .peds
            .age_category
            .uses_cd4_percentage();
    if early_childhood {
        let slope = super::drug_efficacy::draw_cd4_percentage_slope(ctx, line_idx, 0);
        ctx.patient.art.cd4_percentage_slope = slope;
        let value = ctx.patient.disease.true_cd4_percentage;
        let art = &mut ctx.patient.art;
        if !art.overall_percentage_envelope.active {
            art.overall_percentage_envelope
                .activate(line_idx, month, value, slope);
        }
        art.indiv_percentage_envelope
            .activate(line_idx, month, value, slope);
    } else {
        let slope = super::drug_efficacy::draw_cd4_slope(ctx, line_idx, 0);
        ctx.patient.art.cd4_slope = slope;
        let value = ctx.patient.disease.true_cd4;
        let art = &mut ctx.patient.art;
        if !art.overall_envelope.active {
            art.overall_envelope.activate(line_idx, month, value, slope);
        }
        art.indiv_envelope.activate(line_idx, month, value, slope);
    }
}

/// Roll the sub-regimen's toxicity templates, scheduling onsets.
fn roll_toxicity_templates(ctx: &mut UpdaterCtx, line_idx: usize, sub: usize) {
    let month = ctx.month();
    let templates = ctx.sim.art.lines[line_idx].sub_regimens[sub].toxicities.clone();
    let tox_factor = ctx.patient.art.response_value(HetOutcome::Toxicity);
    for (i, template) in templates.iter().enumerate() {
        let prob = template.probability * tox_factor;
        if !ctx.patient.rng.event(prob) {
            continue;
        }
        let offset = ctx
            .patient
            .rng
            .gaussian(template.time_to_onset.mean, template.time_to_onset.std_dev)
            .max(0.0) as u32;
        ctx.patient.art.active_toxicities.push(ToxicityEffect {
            line: line_idx,
            sub_regimen: sub,
            severity: template.severity,
            tox_index: i,
            month_of_start: month + offset,
        });
    }
}

/// Prophylaxis start/stop policy per OI.
fn evaluate_proph_policies(ctx: &mut UpdaterCtx) {
    if !ctx.sim.proph.enable || !ctx.patient.proph.may_receive {
        return;
    }
    for oi in 0..ctx.sim.oi_count() {
        let config = match ctx.sim.proph.config(oi) {
            Some(c) => c.clone(),
            None => continue,
        };
        if ctx.patient.proph.on_proph[oi] {
            if proph_policy_met(ctx, oi, &config.stop, true) || toxicity_forces_switch(ctx, oi) {
                stop_and_advance_proph(ctx, oi);
            }
        } else if proph_policy_met(ctx, oi, &config.start, false) {
            start_next_proph(ctx, oi);
        }
    }
}

fn toxicity_forces_switch(ctx: &UpdaterCtx, oi: usize) -> bool {
    let config = match ctx.sim.proph.config(oi) {
        Some(c) => c,
        None => return false,
    };
    let lines = match ctx.patient.proph.proph_type[oi] {
        ProphType::Primary => &config.primary_lines,
        ProphType::Secondary => &config.secondary_lines,
    };
    let line = match lines.get(ctx.patient.proph.proph_line[oi]) {
        Some(l) => l,
        None => return false,
    };
    match ctx.patient.proph.toxicity[oi] {
        ProphToxKind::Major => line.switch_on_major_toxicity,
        ProphToxKind::Minor => line.switch_on_minor_toxicity,
        ProphToxKind::None => false,
    }
}

/// OR/AND evaluation of a prophylaxis policy's configured conditions.
fn proph_policy_met(
    ctx: &UpdaterCtx,
    oi: usize,
    policy: &crate::inputs::proph::ProphPolicy,
    stopping: bool,
) -> bool {
    let month = ctx.month();
    let monitoring = &ctx.patient.monitoring;
    let mut conditions: Vec<bool> = Vec::new();
    if let Some(bound) = policy.current_cd4 {
        let met = monitoring.observed_cd4.map_or(false, |cd4| {
            if stopping {
                cd4 >= bound
            } else {
                cd4 < bound
            }
        });
        conditions.push(met);
    }
    if let Some(bound) = policy.min_cd4 {
        let met = if monitoring.min_observed_cd4 == f64::MAX {
            false
        } else if stopping {
            monitoring.min_observed_cd4 >= bound
        } else {
            monitoring.min_observed_cd4 < bound
        };
        conditions.push(met);
    }
    if let Some(required) = policy.oi_history {
        let has = monitoring.observed_ois_total[oi] > 0;
        conditions.push(has == required);
    }
    if let Some(min_month) = policy.min_month {
        conditions.push(month >= min_month);
    }
    if let Some(max_month) = policy.max_month {
        conditions.push(month <= max_month);
    }
    if stopping {
        if let Some(max_on) = policy.months_on_proph {
            conditions.push(ctx.patient.proph.months_on(oi, month) >= max_on);
        }
    }
    if conditions.is_empty() {
        return false;
    }
    if policy.use_or {
        conditions.into_iter().any(|c| c)
    } else {
        conditions.into_iter().all(|c| c)
    }
}

fn start_next_proph(ctx: &mut UpdaterCtx, oi: usize) {
    let month = ctx.month();
    let (proph_type, line) = match ctx.patient.proph.next_line[oi] {
        Some(n) => n,
        None => return,
    };
    // Secondary prophylaxis applies once the OI has been observed.
    let config = ctx.sim.proph.config(oi).unwrap();
    let effective_type = if ctx.patient.monitoring.observed_ois_total[oi] > 0
        && !config.secondary_lines.is_empty()
    {
        ProphType::Secondary
    } else {
        proph_type
    };
    let lines = match effective_type {
        ProphType::Primary => &config.primary_lines,
        ProphType::Secondary => &config.secondary_lines,
    };
    if lines.get(line).is_none() {
        return;
    }
    let proph = &mut ctx.patient.proph;
    proph.on_proph[oi] = true;
    proph.proph_type[oi] = effective_type;
    proph.proph_line[oi] = line;
    proph.month_started[oi] = Some(month);
    proph.ever_taken[oi][effective_type.index()] = true;
    proph.total_on += 1;
    ctx.stats.num_proph_starts[oi] += 1;
    let name = ctx.sim.nat_hist.ois[oi].name.clone();
    ctx.trace(format!(
        "START {} PROPH {} for OI {}",
        effective_type.label(),
        line + 1,
        name
    ));
}

fn stop_and_advance_proph(ctx: &mut UpdaterCtx, oi: usize) {
    let proph_type = ctx.patient.proph.proph_type[oi];
    let line = ctx.patient.proph.proph_line[oi];
    ctx.stop_curr_proph(oi);
    let config = ctx.sim.proph.config(oi).unwrap();
    let lines = match proph_type {
        ProphType::Primary => &config.primary_lines,
        ProphType::Secondary => &config.secondary_lines,
    };
    ctx.patient.proph.next_line[oi] = if line + 1 < lines.len() {
        Some((proph_type, line + 1))
    } else {
        None
    };
    let name = ctx.sim.nat_hist.ois[oi].name.clone();
    ctx.trace(format!("STOP PROPH for OI {}", name));
}
