//! Step 14: TB care - diagnostic test chains, treatment lifecycle,
//! TB-specific LTFU/RTC, prophylaxis program, treatment costs.

use tsukihi_core::sampling::categorical_index;

use crate::inputs::tb::{hiv_class, TbProphPolicy};
use crate::state::tb::{PendingDstResult, PendingTbResult};
use crate::types::{HivState, TbCareState, TbDiagResult, TbState, TbStrain, TbTracker};

use super::UpdaterCtx;

pub(crate) fn initial(ctx: &mut UpdaterCtx) {
    if !ctx.sim.tb.enable {
        return;
    }
    ctx.patient.tb.care_state = TbCareState::Unlinked;
    ctx.patient.tb.next_chain_slot = Some(0);

    // First available prophylaxis line.
    let next = ctx.sim.tb.proph.order.first().copied();
    ctx.set_next_tb_proph(next);

    // Interval-testing eligibility is rolled once.
    let eligible = ctx
        .patient
        .rng
        .event(ctx.sim.tb.diagnostics.eligibility.interval_eligibility_prob);
    ctx.patient.tb.interval_testing_eligible = eligible;

    // Some patients enter the model already in TB treatment.
    let state = ctx.patient.tb.state;
    let prob = if ctx.patient.disease.hiv_state == HivState::Negative {
        ctx.sim.tb.diagnostics.init_in_treatment_hiv_neg[state.index()]
    } else {
        ctx.sim.tb.diagnostics.init_in_treatment_hiv_pos[state.index()]
    };
    if ctx.sim.tb.diagnostics.enable && ctx.patient.rng.event(prob) {
        let strain = if state == TbState::Uninfected {
            TbStrain::Ds
        } else {
            ctx.patient.tb.strain
        };
        ctx.patient.tb.observed_strain = Some(strain);
        perform_tb_diagnosis(ctx);
        start_scheduled_treatment(ctx);
    }
}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    if !ctx.sim.tb.enable {
        return;
    }
    if ctx.sim.tb.diagnostics.allow_multiple_tests_per_month {
        while perform_testing_updates(ctx) {}
    } else {
        perform_testing_updates(ctx);
    }
    perform_treatment_updates(ctx);
    perform_ltfu_updates(ctx);
    check_treatment_default(ctx);
    perform_proph_program_updates(ctx);
    perform_treatment_costs(ctx);
}

fn patient_hiv_class(ctx: &UpdaterCtx) -> usize {
    hiv_class(
        ctx.patient.disease.hiv_state != HivState::Negative,
        ctx.patient.disease.cd4_strata(),
    )
}

// ----- diagnostics -----

/// Run the diagnostic machinery for the month. Returns true when chained
/// testing may continue within the same month (a returned result moved
/// the chain, or a performed test returns immediately).
fn perform_testing_updates(ctx: &mut UpdaterCtx) -> bool {
    if !ctx.sim.tb.diagnostics.enable {
        return false;
    }
    let month = ctx.month();
    collect_dst_result(ctx);
    let mut may_continue = collect_pending_result(ctx);

    if ctx.patient.tb.care_state == TbCareState::Unlinked
        || ctx.patient.tb.care_state == TbCareState::ReturnedToCare
    {
        if ctx.patient.tb.chain_slot.is_none()
            && ctx.patient.tb.next_chain_slot.is_some()
            && ctx.patient.tb.month_of_chain_end != Some(month)
            && evaluate_start_diagnostics(ctx)
        {
            let tb = &mut ctx.patient.tb;
            tb.chain_slot = tb.next_chain_slot;
            tb.treated_at_chain_start = tb.ever_on_treatment;
        }
        if ctx.patient.tb.pending_result.is_none() {
            if let Some(slot) = ctx.patient.tb.chain_slot {
                perform_test_at_slot(ctx, slot);
                if ctx
                    .patient
                    .tb
                    .pending_result
                    .is_some_and(|p| p.month_due <= month)
                {
                    may_continue = true;
                }
            }
        }
    }
    may_continue
}

/// Eligibility gates for starting a chain; symptoms override the
/// post-treatment cooldown.
fn evaluate_start_diagnostics(ctx: &UpdaterCtx) -> bool {
    let month = ctx.month();
    let gates = &ctx.sim.tb.diagnostics.eligibility;
    if month < gates.min_month {
        return false;
    }
    let symptomatic = gates.on_symptoms && ctx.patient.tb.tracker(TbTracker::Symptoms);
    if let Some(stop) = ctx.patient.tb.months_since_treatment_stop(month) {
        if stop < gates.min_months_post_treatment && !symptomatic {
            return false;
        }
    }
    if symptomatic {
        return true;
    }
    if gates.on_hiv_diagnosis && ctx.patient.monitoring.month_of_detection == Some(month) {
        return true;
    }
    if gates.on_acute_oi && ctx.patient.disease.current_oi.is_some() {
        return true;
    }
    if let Some(bound) = gates.observed_cd4_below {
        if ctx
            .patient
            .monitoring
            .observed_cd4
            .is_some_and(|cd4| cd4 < bound)
        {
            return true;
        }
    }
    if let Some(interval) = gates.interval_months {
        if ctx.patient.tb.interval_testing_eligible
            && interval > 0
            && month >= gates.min_month
            && (month - gates.min_month) % interval == 0
        {
            return true;
        }
    }
    false
}

/// Offer, accept and perform the test at a chain slot.
fn perform_test_at_slot(ctx: &mut UpdaterCtx, slot: usize) {
    let month = ctx.month();
    let diag = &ctx.sim.tb.diagnostics;
    let test_idx = match diag.chain.get(slot).copied().flatten() {
        Some(t) => t,
        None => {
            reset_chain(ctx);
            return;
        }
    };
    let test = diag.tests[test_idx].clone();
    if !ctx.patient.rng.event(test.accept_prob) {
        reset_chain(ctx);
        return;
    }
    ctx.add_medical_cost(test.cost);
    let class = patient_hiv_class(ctx);
    let state = ctx.patient.tb.state;
    let positive = ctx
        .patient
        .rng
        .event(test.prob_positive[state.index()][class]);
    let will_pickup = ctx.patient.rng.event(test.pickup_prob);
    ctx.patient.tb.pending_result = Some(PendingTbResult {
        test: test_idx,
        slot,
        month_due: month + test.result_return_months,
        result: if positive {
            TbDiagResult::Positive
        } else {
            TbDiagResult::Negative
        },
        will_pickup,
        reset_chain_on_no_pickup: test.reset_chain_on_no_pickup,
    });
    ctx.trace(format!("TB TEST {} at slot {}", test.name, slot + 1));

    if ctx.sim.tb.diagnostics.dst_at_slot == Some(slot) {
        let accurate = ctx.patient.rng.event(ctx.sim.tb.diagnostics.dst_accuracy);
        let strain = if accurate && state != TbState::Uninfected {
            ctx.patient.tb.strain
        } else {
            TbStrain::Ds
        };
        let dst_cost = ctx.sim.tb.diagnostics.dst_cost;
        ctx.add_medical_cost(dst_cost);
        ctx.patient.tb.pending_dst = Some(PendingDstResult {
            month_due: month + ctx.sim.tb.diagnostics.dst_return_months,
            strain,
        });
    }
}

/// Interpret a returned result; returns true if the chain continues to
/// another slot this month.
fn collect_pending_result(ctx: &mut UpdaterCtx) -> bool {
    let month = ctx.month();
    let pending = match ctx.patient.tb.pending_result {
        Some(p) if p.month_due <= month => p,
        _ => return false,
    };
    ctx.patient.tb.pending_result = None;

    if !pending.will_pickup {
        if pending.reset_chain_on_no_pickup {
            reset_chain(ctx);
        }
        return false;
    }
    let diag = &ctx.sim.tb.diagnostics;
    let test = diag.tests[pending.test].clone();
    let next_on_positive = diag.next_on_positive.get(pending.slot).copied().flatten();
    let next_on_negative = diag.next_on_negative.get(pending.slot).copied().flatten();
    match pending.result {
        TbDiagResult::Positive => {
            // Empiric therapy may start alongside the official chain.
            if !ctx.patient.tb.on_treatment
                && !ctx.patient.tb.on_empiric_treatment
                && ctx.patient.rng.event(test.empiric_start_on_positive)
            {
                start_empiric_treatment(ctx);
            }
            match next_on_positive {
                Some(next_slot) => {
                    ctx.patient.tb.chain_slot = Some(next_slot);
                    true
                }
                None => {
                    conclude_positive_chain(ctx);
                    false
                }
            }
        }
        TbDiagResult::Negative => {
            if ctx.patient.tb.on_empiric_treatment
                && ctx.patient.rng.event(test.empiric_stop_on_negative)
            {
                stop_empiric_treatment(ctx);
            }
            match next_on_negative {
                Some(next_slot) => {
                    ctx.patient.tb.chain_slot = Some(next_slot);
                    true
                }
                None => {
                    reset_chain(ctx);
                    false
                }
            }
        }
    }
}

fn collect_dst_result(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    if let Some(dst) = ctx.patient.tb.pending_dst {
        if dst.month_due <= month {
            ctx.patient.tb.pending_dst = None;
            let tb = &mut ctx.patient.tb;
            tb.observed_strain_history = tb.observed_strain;
            tb.observed_strain = Some(dst.strain);
            ctx.trace(format!("TB DST returns {}", dst.strain.label()));
        }
    }
}

fn reset_chain(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    ctx.patient.tb.chain_slot = None;
    ctx.patient.tb.next_chain_slot = Some(0);
    ctx.patient.tb.month_of_chain_end = Some(month);
}

/// A concluded positive chain diagnoses TB and links to TB care.
fn conclude_positive_chain(ctx: &mut UpdaterCtx) {
    if ctx.patient.tb.observed_strain.is_none() {
        // No DST in the chain: treat as drug-susceptible.
        ctx.patient.tb.observed_strain = Some(TbStrain::Ds);
    }
    perform_tb_diagnosis(ctx);
    start_scheduled_treatment(ctx);
    reset_chain(ctx);
}

fn perform_tb_diagnosis(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    ctx.patient.tb.month_of_positive_diagnosis = Some(month);
    ctx.set_tb_care_state(TbCareState::InCare);
    ctx.stats.num_tb_diagnoses += 1;
    ctx.trace("TB DIAGNOSIS");
}

// ----- treatment -----

/// Select the initial treatment line from the configured weights.
fn select_treatment_line(ctx: &mut UpdaterCtx) -> Option<usize> {
    let strain = ctx.patient.tb.observed_strain.unwrap_or(TbStrain::Ds);
    let weights = ctx
        .sim
        .tb
        .initial_line_weights_for(strain, ctx.patient.tb.ever_on_treatment);
    let u = ctx.patient.rng.uniform();
    categorical_index(&weights, u)
}

fn start_scheduled_treatment(ctx: &mut UpdaterCtx) {
    if ctx.patient.tb.on_treatment {
        return;
    }
    let line = match ctx
        .patient
        .tb
        .next_treatment_line
        .or_else(|| select_treatment_line(ctx))
    {
        Some(l) => l,
        None => return,
    };
    start_treatment_on_line(ctx, line, false);
}

fn start_treatment_on_line(ctx: &mut UpdaterCtx, line: usize, is_repeat: bool) {
    let month = ctx.month();
    let treat = match ctx.sim.tb.treatments.get(line) {
        Some(t) => t.clone(),
        None => return,
    };
    // Empiric therapy converts into the official course.
    if ctx.patient.tb.on_empiric_treatment {
        ctx.patient.tb.on_empiric_treatment = false;
    }
    let class = patient_hiv_class(ctx);
    let covers = treat.covers_strain[ctx.patient.tb.strain.index()];
    let success = covers && ctx.patient.rng.event(treat.prob_success[class]);
    let tb = &mut ctx.patient.tb;
    tb.on_treatment = true;
    tb.treatment_line = line;
    tb.month_of_treatment_start = Some(month);
    tb.previous_treatment_months = 0;
    tb.treatment_will_succeed = success;
    tb.ever_on_treatment = true;
    tb.next_treatment_line = None;
    if !is_repeat {
        tb.repeats_of_current_line = 0;
    }
    ctx.stats.num_tb_treatment_starts += 1;
    ctx.trace(format!("TB TREAT {} START", line + 1));
}

pub(crate) fn start_empiric_treatment(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let line = match select_treatment_line(ctx) {
        Some(l) => l,
        None => return,
    };
    let tb = &mut ctx.patient.tb;
    tb.on_empiric_treatment = true;
    tb.treatment_line = line;
    tb.month_of_treatment_start = Some(month);
    tb.previous_treatment_months = 0;
    let class = patient_hiv_class(ctx);
    let treat = &ctx.sim.tb.treatments[line];
    let covers = treat.covers_strain[ctx.patient.tb.strain.index()];
    let prob = treat.prob_success[class];
    ctx.patient.tb.treatment_will_succeed = covers && ctx.patient.rng.event(prob);
    ctx.trace(format!("TB EMPIRIC TREAT {} START", line + 1));
}

pub(crate) fn stop_empiric_treatment(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let tb = &mut ctx.patient.tb;
    if !tb.on_empiric_treatment {
        return;
    }
    tb.on_empiric_treatment = false;
    tb.month_of_treatment_stop = Some(month);
    ctx.trace("TB EMPIRIC TREAT STOP");
}

fn perform_treatment_updates(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let tb = &ctx.patient.tb;
    if !tb.on_treatment && !tb.on_empiric_treatment {
        // A diagnosed patient in care starts (or restarts) treatment.
        if tb.care_state == TbCareState::InCare
            && tb.month_of_positive_diagnosis.is_some()
            && tb.next_treatment_line.is_some()
        {
            let line = tb.next_treatment_line.unwrap();
            let repeat = tb.repeats_of_current_line > 0 && line == tb.treatment_line;
            start_treatment_on_line(ctx, line, repeat);
        }
        return;
    }
    let line = tb.treatment_line;
    let treat = ctx.sim.tb.treatments[line].clone();
    let months_on = tb.months_on_treatment(month);

    // Early observed failure check.
    if let Some(check) = treat.observed_failure_month {
        if months_on == check && !tb.treatment_will_succeed {
            ctx.add_medical_cost(treat.observed_failure_confirm_cost);
            if treat.switch_on_observed_failure {
                fail_current_treatment(ctx, &treat);
                return;
            }
        }
    }

    if months_on >= treat.duration_months {
        complete_treatment(ctx, &treat);
    }
}

/// Completion: cure or failure with resistance escalation and
/// repeat/next-line selection.
fn complete_treatment(ctx: &mut UpdaterCtx, treat: &crate::inputs::tb::TbTreatmentDef) {
    let month = ctx.month();
    let success = ctx.patient.tb.treatment_will_succeed;
    let was_latent = ctx.patient.tb.state == TbState::Latent;
    let tb = &mut ctx.patient.tb;
    tb.on_treatment = false;
    tb.on_empiric_treatment = false;
    tb.month_of_treatment_stop = Some(month);
    if tb.month_of_initial_treatment_stop.is_none() {
        tb.month_of_initial_treatment_stop = Some(month);
    }
    tb.ever_completed_treatment = true;

    if success {
        tb.state = if was_latent {
            TbState::Uninfected
        } else {
            TbState::PreviouslyTreated
        };
        tb.month_of_state_change = Some(month);
        tb.set_tracker(TbTracker::Symptoms, false);
        tb.set_tracker(TbTracker::SputumHigh, false);
        tb.next_treatment_line = None;
        ctx.stats.num_tb_treatment_completions += 1;
        ctx.trace("TB TREAT COMPLETE cured");
    } else {
        ctx.stats.num_tb_treatment_completions += 1;
        fail_current_treatment(ctx, treat);
    }
}

/// Treatment failure: probabilistic resistance escalation, repeat or
/// advance the line.
fn fail_current_treatment(ctx: &mut UpdaterCtx, treat: &crate::inputs::tb::TbTreatmentDef) {
    let month = ctx.month();
    let escalate = ctx.patient.rng.event(treat.prob_resistance_on_failure);
    let tb = &mut ctx.patient.tb;
    tb.on_treatment = false;
    tb.on_empiric_treatment = false;
    tb.month_of_treatment_stop = Some(month);
    tb.unfavorable[1] = true;
    if escalate {
        tb.strain = tb.strain.escalate();
    }
    let line = tb.treatment_line;
    if tb.repeats_of_current_line < treat.max_repeats {
        tb.repeats_of_current_line += 1;
        tb.next_treatment_line = Some(line);
    } else if line + 1 < ctx.sim.tb.treatments.len() {
        tb.repeats_of_current_line = 0;
        tb.next_treatment_line = Some(line + 1);
    } else {
        tb.next_treatment_line = None;
    }
    ctx.trace("TB TREAT FAILED");
}

// ----- TB LTFU / default -----

fn perform_ltfu_updates(ctx: &mut UpdaterCtx) {
    let ltfu = &ctx.sim.tb.ltfu;
    if !ltfu.use_tb_ltfu || ctx.sim.tb.integrated_clinic {
        // The integrated clinic drives TB loss from HIV loss.
        return;
    }
    let month = ctx.month();
    match ctx.patient.tb.care_state {
        TbCareState::InCare | TbCareState::ReturnedToCare => {
            if !ctx.patient.tb.on_treatment {
                return;
            }
            let line = ctx.patient.tb.treatment_line;
            let treat = &ctx.sim.tb.treatments[line];
            let months_on = ctx.patient.tb.months_on_treatment(month);
            let stage = if months_on <= treat.stage1_months { 0 } else { 1 };
            if ctx.patient.rng.event(ltfu.prob_ltfu_by_stage[stage]) {
                interrupt_treatment_for_ltfu(ctx);
            }
        }
        TbCareState::Ltfu => {
            let lost = ctx
                .patient
                .tb
                .month_of_tb_ltfu
                .map(|m| month - m)
                .unwrap_or(0);
            let hiv_positive = ctx.patient.disease.hiv_state != HivState::Negative;
            let prob = ltfu.prob_rtc[hiv_positive as usize];
            let forced = ltfu.max_months_ltfu > 0 && lost >= ltfu.max_months_ltfu;
            if forced || ctx.patient.rng.event(prob) {
                ctx.set_tb_rtc();
                // Resume an interrupted course where it left off.
                if let Some(line) = ctx.patient.tb.incomplete_treatment_line {
                    let served = ctx.patient.tb.previous_treatment_months;
                    start_treatment_on_line(ctx, line, true);
                    ctx.patient.tb.previous_treatment_months = served;
                    ctx.patient.tb.incomplete_treatment_line = None;
                }
                ctx.trace("TB RTC");
            }
        }
        TbCareState::Unlinked => {}
    }
}

fn interrupt_treatment_for_ltfu(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let served = ctx.patient.tb.months_on_treatment(month);
    let tb = &mut ctx.patient.tb;
    tb.on_treatment = false;
    tb.incomplete_treatment_line = Some(tb.treatment_line);
    tb.previous_treatment_months = served;
    tb.will_default_on_ltfu = true;
    tb.month_of_treatment_stop = Some(month);
    ctx.set_tb_ltfu();
    ctx.trace("TB LTFU");
}

/// A patient lost long enough mid-treatment defaults.
fn check_treatment_default(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let tb = &ctx.patient.tb;
    if tb.care_state != TbCareState::Ltfu || tb.incomplete_treatment_line.is_none() {
        return;
    }
    let lost = tb.month_of_tb_ltfu.map(|m| month - m).unwrap_or(0);
    if lost < ctx.sim.tb.ltfu.months_to_default {
        return;
    }
    let escalate = ctx
        .patient
        .rng
        .event(ctx.sim.tb.ltfu.prob_resistance_on_default);
    let tb = &mut ctx.patient.tb;
    if tb.state.is_active() {
        tb.state = TbState::TreatmentDefault;
        tb.month_of_state_change = Some(month);
    }
    if escalate {
        tb.strain = tb.strain.escalate();
    }
    tb.incomplete_treatment_line = None;
    tb.unfavorable[2] = true;
    ctx.stats.num_tb_treatment_defaults += 1;
    ctx.trace("TB TREATMENT DEFAULT");
}

// ----- prophylaxis program -----

fn active_proph_policy<'a>(ctx: &'a UpdaterCtx, stopping: bool) -> &'a TbProphPolicy {
    let known_positive = ctx.patient.monitoring.detected;
    let proph = &ctx.sim.tb.proph;
    match (known_positive, stopping) {
        (true, false) => &proph.start_known_hiv_pos,
        (false, false) => &proph.start_not_known_hiv_pos,
        (true, true) => &proph.stop_known_hiv_pos,
        (false, true) => &proph.stop_not_known_hiv_pos,
    }
}

fn tb_proph_policy_met(ctx: &UpdaterCtx, policy: &TbProphPolicy, stopping: bool) -> bool {
    let month = ctx.month();
    let mut conditions: Vec<bool> = Vec::new();
    if let Some(bound) = policy.observed_cd4_below {
        let met = ctx
            .patient
            .monitoring
            .observed_cd4
            .map_or(false, |cd4| if stopping { cd4 >= bound } else { cd4 < bound });
        conditions.push(met);
    }
    if let Some(on_art) = policy.on_art {
        conditions.push(ctx.patient.art.on_art == on_art);
    }
    if let Some(history) = policy.tb_diagnosis_history {
        conditions.push(ctx.patient.tb.month_of_positive_diagnosis.is_some() == history);
    }
    if let Some(history) = policy.treatment_history {
        conditions.push(ctx.patient.tb.ever_on_treatment == history);
    }
    if let Some(reactive) = policy.immune_reactive {
        conditions.push(ctx.patient.tb.tracker(TbTracker::ImmuneReactive) == reactive);
    }
    if stopping {
        if let Some(max_on) = policy.months_on_proph {
            let on = ctx
                .patient
                .tb
                .month_of_proph_start
                .map(|m| month - m)
                .unwrap_or(0);
            conditions.push(on >= max_on);
        }
    }
    if policy.after_tb_diagnosis {
        conditions.push(ctx.patient.tb.month_of_positive_diagnosis.is_some());
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

fn perform_proph_program_updates(ctx: &mut UpdaterCtx) {
    let program = &ctx.sim.tb.proph;
    if !program.enable {
        return;
    }
    let month = ctx.month();

    if ctx.patient.tb.on_proph {
        let line = ctx.sim.tb.proph.lines.get(ctx.patient.tb.proph_line).cloned();
        let completed = line
            .as_ref()
            .map(|l| {
                ctx.patient
                    .tb
                    .month_of_proph_start
                    .map(|m| month - m >= l.duration_months)
                    .unwrap_or(false)
            })
            .unwrap_or(true);
        let policy = active_proph_policy(ctx, true).clone();
        if completed || tb_proph_policy_met(ctx, &policy, true) {
            ctx.stop_curr_tb_proph();
            advance_tb_proph_line(ctx);
            ctx.trace("TB PROPH STOP");
        } else if let Some(l) = line {
            ctx.add_medical_cost(l.monthly_cost);
        }
        return;
    }

    // Not on proph: evaluate the start policy.
    if !ctx.patient.tb.proph_eligible {
        return;
    }
    if ctx.patient.tb.on_treatment || ctx.patient.tb.on_empiric_treatment {
        return;
    }
    if ctx.sim.tb.integrated_clinic
        && ctx.patient.monitoring.ltfu_state == crate::types::LtfuState::Lost
        && !program.allow_start_while_hiv_ltfu
    {
        return;
    }
    let next = match ctx.patient.tb.next_proph_line {
        Some(n) => n,
        None => return,
    };
    let policy = active_proph_policy(ctx, false).clone();
    if !tb_proph_policy_met(ctx, &policy, false) {
        return;
    }
    let starts = ctx
        .patient
        .tb
        .proph_starts_by_line
        .get(next)
        .copied()
        .unwrap_or(0);
    let max = program.lines.get(next).map(|l| l.max_restarts).unwrap_or(0);
    if starts > max {
        advance_tb_proph_line(ctx);
        return;
    }
    let tb = &mut ctx.patient.tb;
    tb.on_proph = true;
    tb.ever_proph = true;
    tb.proph_line = next;
    tb.month_of_proph_start = Some(month);
    tb.month_of_proph_stop = None;
    if let Some(count) = tb.proph_starts_by_line.get_mut(next) {
        *count += 1;
    }
    ctx.stats.num_tb_proph_starts += 1;
    ctx.trace(format!("TB PROPH {} START", next + 1));
}

fn advance_tb_proph_line(ctx: &mut UpdaterCtx) {
    let current = ctx.patient.tb.proph_line;
    let next = ctx
        .sim
        .tb
        .proph
        .order
        .iter()
        .copied()
        .find(|i| *i > current);
    ctx.set_next_tb_proph(next);
}

// ----- costs -----

fn perform_treatment_costs(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let tb = &ctx.patient.tb;
    if !tb.on_treatment && !tb.on_empiric_treatment {
        return;
    }
    let treat = match ctx.sim.tb.treatments.get(tb.treatment_line) {
        Some(t) => t,
        None => return,
    };
    // The stage boundary excludes the threshold month for costs.
    let stage = if tb.months_on_treatment(month) < treat.stage1_months {
        0
    } else {
        1
    };
    let cost = treat.monthly_cost[stage];
    ctx.add_medical_cost(cost);
}
