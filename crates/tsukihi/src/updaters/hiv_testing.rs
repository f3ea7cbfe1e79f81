//! Step 9: HIV test offers, detection and linkage, PrEP lifecycle, and
//! the pediatric EID test schedule.

use tsukihi_core::sampling::categorical_index;

use crate::types::{HivState, PedsAgeCat, PedsHivState};

use super::UpdaterCtx;

pub(crate) fn initial(ctx: &mut UpdaterCtx) {
    // Prevalent detection at entry.
    let state = ctx.patient.disease.hiv_state;
    if state.is_infected() {
        let p = ctx.sim.testing.prob_detected_at_entry[state.index()];
        if ctx.patient.rng.event(p) {
            ctx.set_detected(0);
            if ctx
                .patient
                .rng
                .event(ctx.sim.testing.prob_linked_at_entry)
            {
                ctx.set_linked(0);
            }
        }
    }

    // Acceptance bucket and offer interval for the user test program.
    let program = &ctx.sim.testing.program;
    let u = ctx.patient.rng.uniform();
    ctx.patient.monitoring.accept_bucket =
        categorical_index(&program.accept_bucket_weights, u).unwrap_or(0);
    let weights: Vec<f64> = program.interval_dist.iter().map(|i| i.weight).collect();
    let u = ctx.patient.rng.uniform();
    let interval = categorical_index(&weights, u)
        .map(|i| program.interval_dist[i].months)
        .unwrap_or(12);
    ctx.patient.monitoring.test_interval_months = interval;
    if program.enable {
        let start = program.start_age_months.saturating_sub(ctx.patient.general.age_months);
        ctx.patient.monitoring.next_hiv_test_month = Some(start);
    }
}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    if ctx.sim.peds.enable
        && ctx.patient.peds.age_category == PedsAgeCat::EarlyChildhood
        && ctx.patient.peds.in_eid_system
    {
        perform_eid_updates(ctx);
    }
    if !ctx.patient.monitoring.detected {
        perform_oi_detection(ctx);
    }
    if !ctx.patient.monitoring.detected {
        perform_test_program(ctx);
        perform_background_testing(ctx);
    }
    perform_prep_updates(ctx);
}

/// An acute OI can reveal undetected HIV.
fn perform_oi_detection(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    if !ctx.patient.disease.hiv_state.is_infected() {
        return;
    }
    let oi = match ctx.patient.disease.current_oi {
        Some(oi) => oi,
        None => return,
    };
    let def = &ctx.sim.nat_hist.ois[oi];
    let detection = def.detection_prob;
    let linkage = def.linkage_prob;
    if !ctx.patient.rng.event(detection) {
        return;
    }
    let name = def.name.clone();
    ctx.set_detected(month);
    ctx.stats.num_detected_ois[oi] += 1;
    ctx.trace(format!("HIV DETECTED by OI {}", name));
    if ctx.patient.rng.event(linkage) {
        ctx.set_linked(month);
    }
}

/// The user-defined test program: offer, accept, return, result.
fn perform_test_program(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let program = ctx.sim.testing.program.clone();
    if !program.enable {
        return;
    }
    if ctx.patient.general.age_months < program.start_age_months {
        return;
    }
    match ctx.patient.monitoring.next_hiv_test_month {
        Some(m) if m <= month => {}
        Some(_) => return,
        None => {
            ctx.patient.monitoring.next_hiv_test_month = Some(month);
            return;
        }
    }
    let interval = ctx.patient.monitoring.test_interval_months.max(1);
    ctx.patient.monitoring.next_hiv_test_month = Some(month + interval);

    ctx.add_medical_cost(program.cost_offer);
    let state = ctx.patient.disease.hiv_state;
    let bucket = ctx.patient.monitoring.accept_bucket;
    if !ctx.patient.rng.event(program.accept_prob[bucket][state.index()]) {
        return;
    }
    ctx.add_medical_cost(program.cost_test);
    ctx.stats.num_tests_performed += 1;
    if !ctx.patient.rng.event(program.return_prob) {
        return;
    }
    ctx.add_medical_cost(program.cost_return);
    let positive = ctx
        .patient
        .rng
        .event(program.result_positive_prob[state.index()]);
    if positive && state.is_infected() {
        ctx.set_detected(month);
        ctx.trace("HIV DETECTED by test program");
        if ctx.patient.rng.event(ctx.sim.testing.linkage_prob) {
            ctx.set_linked(month);
        }
    }
}

/// The parallel background testing program.
fn perform_background_testing(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let bg = ctx.sim.testing.background;
    if !bg.enable || ctx.patient.monitoring.detected {
        return;
    }
    if ctx.patient.general.age_months < bg.start_age_months {
        return;
    }
    let state = ctx.patient.disease.hiv_state;
    if !ctx.patient.rng.event(bg.accept_prob[state.index()]) {
        return;
    }
    ctx.add_medical_cost(bg.cost_test);
    ctx.stats.num_tests_performed += 1;
    if !ctx.patient.rng.event(bg.return_prob) {
        return;
    }
    let positive = ctx.patient.rng.event(bg.result_positive_prob[state.index()]);
    if positive && state.is_infected() {
        ctx.set_detected(month);
        ctx.trace("HIV DETECTED by background testing");
        if ctx.patient.rng.event(ctx.sim.testing.linkage_prob) {
            ctx.set_linked(month);
        }
    }
}

/// PrEP uptake, recurring cost/QOL, and the two-regime dropout.
fn perform_prep_updates(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let prep = ctx.sim.testing.prep.clone();
    if !prep.enable {
        return;
    }
    // PrEP is for undetected HIV-negative patients only; infection or
    // detection ends it.
    if ctx.patient.disease.hiv_state.is_infected() && ctx.patient.monitoring.on_prep {
        if ctx.patient.monitoring.detected {
            ctx.patient.monitoring.on_prep = false;
        }
    }
    if ctx.patient.disease.hiv_state.is_infected() && ctx.patient.monitoring.detected {
        return;
    }

    if ctx.patient.monitoring.on_prep {
        let months_on = ctx.patient.monitoring.months_on_prep(month);
        let dropout = if months_on < prep.dropout_threshold_months {
            prep.dropout_pre_threshold
        } else {
            prep.dropout_post_threshold
        };
        if ctx.patient.rng.event(dropout) {
            ctx.patient.monitoring.on_prep = false;
            ctx.patient.monitoring.prep_dropout = true;
            ctx.stats.num_prep_dropouts += 1;
            ctx.trace("PREP DROPOUT");
            return;
        }
        ctx.add_medical_cost(prep.monthly_cost);
        ctx.accumulate_qol(prep.qol_modifier);
        return;
    }

    // Uptake: dropouts only re-enter when re-uptake is allowed, and
    // only once the rollout has completed.
    if ctx.patient.monitoring.prep_dropout
        && !(prep.allow_reuptake && month >= prep.rollout_duration_months)
    {
        return;
    }
    let uptake = prep.uptake_prob_at(month, ctx.patient.general.transm_risk);
    if uptake <= 0.0 || !ctx.patient.rng.event(uptake) {
        return;
    }
    if !ctx.patient.rng.event(prep.coverage) {
        return;
    }
    let monitoring = &mut ctx.patient.monitoring;
    monitoring.on_prep = true;
    monitoring.ever_prep = true;
    monitoring.prep_dropout = false;
    monitoring.month_of_prep_start = Some(month);
    monitoring.prep_dropout_threshold_month = month + prep.dropout_threshold_months;
    ctx.stats.num_prep_starts += 1;
    ctx.add_medical_cost(prep.monthly_cost);
    ctx.accumulate_qol(prep.qol_modifier);
    ctx.trace("PREP START");
}

/// Early-infant-diagnosis visits, pending results, infant prophylaxis.
fn perform_eid_updates(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let age = ctx.patient.general.age_months;
    let eid = ctx.sim.peds.eid.clone();

    // Returned results ready for pickup this month.
    let due: Vec<_> = ctx
        .patient
        .peds
        .pending_eid_results
        .iter()
        .copied()
        .filter(|r| r.month_due <= month)
        .collect();
    ctx.patient
        .peds
        .pending_eid_results
        .retain(|r| r.month_due > month);
    for result in due {
        let assay = &eid.assays[result.assay];
        if !ctx.patient.rng.event(assay.pickup_prob) {
            ctx.patient.peds.missed_eid_visits += 1;
            continue;
        }
        if result.positive {
            match assay.confirmatory {
                Some(next) if !result.confirmatory => {
                    schedule_eid_test(ctx, &eid, next, true);
                }
                _ => conclude_positive_eid(ctx, month),
            }
        } else {
            ctx.patient.peds.month_of_last_negative_eid = Some(month);
        }
    }

    // Scheduled visit assays at their offer ages.
    for (i, assay) in eid.assays.iter().enumerate() {
        if assay.offer_age_months == age && ctx.patient.rng.event(assay.offer_prob) {
            schedule_eid_test(ctx, &eid, i, false);
        }
    }

    // Infant prophylaxis doses at their scheduled ages.
    for (i, proph) in eid.infant_prophs.iter().enumerate() {
        if ctx.patient.peds.infant_proph_given[i] || age < proph.dose_age_months {
            continue;
        }
        if age > proph.max_age_months {
            continue;
        }
        if proph.requires_negative_eid && ctx.patient.peds.month_of_last_negative_eid.is_none() {
            continue;
        }
        ctx.patient.peds.infant_proph_given[i] = true;
        ctx.add_medical_cost(proph.cost);
        if ctx.patient.rng.event(proph.prob_effective) {
            ctx.patient.peds.infant_proph_effective[i] = true;
            ctx.patient.peds.infant_proph_effect_ends[i] = Some(month + proph.effect_months);
        }
        ctx.trace(format!("INFANT PROPH {}", proph.name));
    }
}

fn schedule_eid_test(
    ctx: &mut UpdaterCtx,
    eid: &crate::inputs::peds::EidInputs,
    assay_idx: usize,
    confirmatory: bool,
) {
    let month = ctx.month();
    let assay = &eid.assays[assay_idx];
    ctx.add_medical_cost(assay.cost);
    let peds_state = if ctx.patient.disease.hiv_state.is_infected() {
        ctx.patient.disease.peds_hiv_state
    } else {
        PedsHivState::Negative
    };
    let positive = ctx.patient.rng.event(assay.prob_positive(peds_state));
    ctx.patient
        .peds
        .pending_eid_results
        .push(crate::state::PendingEidResult {
            assay: assay_idx,
            month_due: month + assay.result_return_months,
            positive,
            confirmatory,
        });
}

/// A confirmed positive EID chain: detection and linkage, or a false
/// positive entering care erroneously.
fn conclude_positive_eid(ctx: &mut UpdaterCtx, month: u32) {
    if ctx.patient.disease.hiv_state.is_infected() {
        ctx.set_detected(month);
        ctx.trace("HIV DETECTED by EID");
        if ctx.patient.rng.event(ctx.sim.peds.eid.linkage_prob) {
            ctx.set_linked(month);
        }
    } else {
        ctx.patient.peds.is_false_positive = true;
        if ctx
            .patient
            .rng
            .event(ctx.sim.peds.eid.false_positive_link_prob)
        {
            ctx.patient.peds.false_positive_linked = true;
        }
        ctx.trace("EID FALSE POSITIVE");
    }
}
