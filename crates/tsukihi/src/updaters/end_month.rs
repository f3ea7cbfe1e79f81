//! Step 15: routine cost and QOL accrual, life-month accumulation,
//! subgroup evaluation, month advance.

use crate::types::{CostSubgroup, HivState, LtfuState};

use super::UpdaterCtx;

pub(crate) fn initial(ctx: &mut UpdaterCtx) {
    evaluate_cost_subgroups(ctx);
}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    accrue_recurring_costs(ctx);
    accrue_qol_modifiers(ctx);
    accrue_life_months(ctx);
    evaluate_cost_subgroups(ctx);
    // An acute OI lasts exactly one month.
    ctx.patient.disease.current_oi = None;
    let general = &mut ctx.patient.general;
    general.month += 1;
    general.age_months += 1;
}

/// ART, prophylaxis and routine care monthly costs.
fn accrue_recurring_costs(ctx: &mut UpdaterCtx) {
    if ctx.patient.art.on_art {
        let line = &ctx.sim.art.lines[ctx.patient.art.curr_line];
        let cost = line.monthly_cost * ctx.patient.art.cost_factor;
        ctx.add_medical_cost(cost);
    }
    for oi in 0..ctx.sim.oi_count() {
        if !ctx.patient.proph.on_proph[oi] {
            continue;
        }
        let config = match ctx.sim.proph.config(oi) {
            Some(c) => c,
            None => continue,
        };
        let lines = match ctx.patient.proph.proph_type[oi] {
            crate::types::ProphType::Primary => &config.primary_lines,
            crate::types::ProphType::Secondary => &config.secondary_lines,
        };
        if let Some(line) = lines.get(ctx.patient.proph.proph_line[oi]) {
            let cost = line.monthly_cost;
            ctx.add_medical_cost(cost);
        }
    }
    let age = ctx.patient.general.age_months;
    let multiplier = ctx.sim.cost.routine_multiplier(age);
    let routine = if ctx.patient.disease.hiv_state == HivState::Negative {
        ctx.sim.cost.routine_hiv_negative
    } else {
        let strata = ctx.patient.disease.cd4_strata().index();
        if ctx.patient.monitoring.care_state.is_engaged() {
            ctx.sim.cost.routine_in_care[strata]
        } else {
            ctx.sim.cost.routine_out_of_care[strata]
        }
    };
    ctx.add_medical_cost(routine * multiplier);
}

fn accrue_qol_modifiers(ctx: &mut UpdaterCtx) {
    if ctx.patient.disease.hiv_state != HivState::Negative {
        let strata = ctx.patient.disease.cd4_strata().index();
        ctx.accumulate_qol(ctx.sim.cost.qol_cd4_modifier[strata]);
    }
}

/// Life months and quality-adjusted life months, with discounting.
fn accrue_life_months(ctx: &mut UpdaterCtx) {
    let general = &mut ctx.patient.general;
    let m = general.month - general.initial_month;
    let qol = general.qol_month.max(0.0);
    general.lms_undiscounted += 1.0;
    let discounted = ctx.sim.discount.discounted(1.0, m);
    general.lms_discounted += discounted;
    general.qalms_discounted += qol * discounted;
    for (i, factor) in ctx.sim.multi_discount.benefit.iter().enumerate() {
        let alt = factor.discounted(1.0, m);
        general.multi_disc_lms[i] += alt;
        general.multi_disc_qalms[i] += qol * alt;
    }
}

/// Cost-subgroup membership, re-evaluated once per month.
fn evaluate_cost_subgroups(ctx: &mut UpdaterCtx) {
    let disease = &ctx.patient.disease;
    let monitoring = &ctx.patient.monitoring;
    let art = &ctx.patient.art;
    let month = ctx.patient.general.month;

    let mut member = [false; CostSubgroup::COUNT];
    let infected = disease.hiv_state.is_infected();
    member[CostSubgroup::HivNegative.index()] = !infected;
    member[CostSubgroup::PreLinkage.index()] = infected && !monitoring.linked;
    member[CostSubgroup::PreArtInCare.index()] =
        infected && monitoring.linked && !art.has_taken_art && monitoring.ltfu_state != LtfuState::Lost;
    member[CostSubgroup::OnArt.index()] = art.on_art;
    member[CostSubgroup::LtfuAfterArt.index()] =
        monitoring.ltfu_state == LtfuState::Lost && monitoring.was_on_art_when_lost;
    member[CostSubgroup::LtfuNeverArt.index()] =
        monitoring.ltfu_state == LtfuState::Lost && !art.has_taken_art;
    member[CostSubgroup::ReturnedToCare.index()] = monitoring.ltfu_state == LtfuState::Returned;
    member[CostSubgroup::OnArtNeverLost.index()] = art.on_art && !monitoring.had_prev_ltfu;
    member[CostSubgroup::OnArtFirstSixMonths.index()] = art.on_art
        && art
            .month_first_art
            .map(|start| month.saturating_sub(start) < 6)
            .unwrap_or(false);
    member[CostSubgroup::OnFirstLineArt.index()] = art.on_art && art.curr_line == 0;
    member[CostSubgroup::OnLaterLineArt.index()] = art.on_art && art.curr_line > 0;
    ctx.patient.general.cost_subgroups = member;
}
