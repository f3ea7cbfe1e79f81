//! Step 6: at most one acute opportunistic infection per month.

use tsukihi_core::prob::prob_rate_multiply;

use crate::types::{DeathCause, EmergencyKind, HetOutcome, HivState, OiHistoryExtent, OiSeverity,
    RespType};

use super::UpdaterCtx;

pub(crate) fn initial(_ctx: &mut UpdaterCtx) {}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    if ctx.patient.disease.hiv_state == HivState::Negative {
        apply_history_risks(ctx);
        return;
    }
    if let Some(oi) = determine_acute_oi(ctx) {
        apply_acute_oi(ctx, oi);
    }
    apply_history_risks(ctx);
}

/// Single uniform draw walked over the OI list in fixed order.
fn determine_acute_oi(ctx: &mut UpdaterCtx) -> Option<usize> {
    let oi_count = ctx.sim.oi_count();
    if oi_count == 0 {
        return None;
    }
    let draw = ctx.patient.rng.uniform();
    let mut cumulative = 0.0;
    let cd4 = ctx.patient.disease.cd4_strata().index();
    for oi in 0..oi_count {
        let def = &ctx.sim.nat_hist.ois[oi];
        let base = if ctx.patient.disease.oi_history[oi] {
            def.prob_secondary[cd4]
        } else {
            def.prob_primary[cd4]
        };
        let mut prob = base;
        let art = &ctx.patient.art;
        if art.on_art && art.response_types[HetOutcome::ArtEffectOi.index()] != RespType::Non {
            prob = prob_rate_multiply(base, def.on_art_multiplier);
        }
        // Prophylaxis efficacy, degraded by resistance.
        if ctx.patient.proph.on_proph[oi] {
            let mut eff = proph_efficacy_multiplier(ctx, oi);
            if ctx.patient.proph.resistant[oi] {
                eff *= proph_resistance_penalty(ctx, oi);
            }
            prob = prob_rate_multiply(prob, eff);
        }
        cumulative += prob;
        if draw < cumulative {
            return Some(oi);
        }
    }
    None
}

fn proph_efficacy_multiplier(ctx: &UpdaterCtx, oi: usize) -> f64 {
    line_field(ctx, oi, |l| l.efficacy_multiplier)
}

fn proph_resistance_penalty(ctx: &UpdaterCtx, oi: usize) -> f64 {
    line_field(ctx, oi, |l| l.resistance_efficacy_penalty)
}

fn line_field(
    ctx: &UpdaterCtx,
    oi: usize,
    f: impl Fn(&crate::inputs::proph::ProphLineDef) -> f64,
) -> f64 {
    let config = match ctx.sim.proph.config(oi) {
        Some(c) => c,
        None => return 1.0,
    };
    let lines = match ctx.patient.proph.proph_type[oi] {
        crate::types::ProphType::Primary => &config.primary_lines,
        crate::types::ProphType::Secondary => &config.secondary_lines,
    };
    lines
        .get(ctx.patient.proph.proph_line[oi])
        .map(&f)
        .unwrap_or(1.0)
}

fn apply_acute_oi(ctx: &mut UpdaterCtx, oi: usize) {
    let month = ctx.month();
    let def = ctx.sim.nat_hist.ois[oi].clone();
    let had_history = ctx.patient.disease.oi_history[oi];
    ctx.patient.disease.current_oi = Some(oi);
    ctx.patient.disease.ois_since_last_visit[oi] += 1;
    if had_history {
        ctx.stats.num_secondary_ois[oi] += 1;
    } else {
        ctx.stats.num_primary_ois[oi] += 1;
    }
    ctx.add_medical_cost(def.acute_cost);
    ctx.accumulate_qol(def.acute_qol_modifier);
    ctx.trace(format!("ACUTE OI {}", def.name));

    if def.severity == OiSeverity::Severe {
        ctx.patient.disease.last_severe_oi_month[oi] = Some(month);
        if def.acute_death_rate_ratio > 1.0 {
            ctx.add_mortality_risk(DeathCause::AcuteOi(oi as u8), def.acute_death_rate_ratio);
        }
    }
    if history_gates_pass(ctx, oi) {
        let disease = &mut ctx.patient.disease;
        disease.oi_history[oi] = true;
        if disease.first_oi.is_none() {
            disease.first_oi = Some((month, oi));
        }
        let extent = match def.severity {
            OiSeverity::Severe => OiHistoryExtent::Severe,
            OiSeverity::Mild => OiHistoryExtent::Mild,
        };
        if extent == OiHistoryExtent::Severe || disease.oi_history_extent == OiHistoryExtent::None {
            disease.oi_history_extent = extent;
        }
    }
    // An OI in care is observed: counted, and an emergency visit follows.
    if ctx.patient.monitoring.care_state.is_engaged() {
        ctx.patient.monitoring.observed_ois_total[oi] += 1;
        ctx.patient.monitoring.observed_ois_since_visit[oi] += 1;
        let on_art = ctx.patient.art.on_art;
        if on_art {
            let policy = ctx.sim.treatment.failure_policy(ctx.patient.art.curr_line);
            ctx.patient.art.observed_ois_since_fail_or_stop[oi] += 1;
            if def.severity == OiSeverity::Severe || !policy.severe_ois_only {
                ctx.patient.art.failed_oi_events += 1;
            }
        }
        ctx.schedule_emergency_visit(EmergencyKind::AcuteOi, month);
    }
}

/// Gating conditions for logging this OI into the history.
fn history_gates_pass(ctx: &UpdaterCtx, oi: usize) -> bool {
    let gates = &ctx.sim.nat_hist.ois[oi].history_gates;
    if gates.excluded {
        return false;
    }
    let disease = &ctx.patient.disease;
    if let Some(min) = gates.min_cd4 {
        if disease.true_cd4 < min {
            return false;
        }
    }
    if let Some(max) = gates.max_cd4 {
        if disease.true_cd4 >= max {
            return false;
        }
    }
    if let Some(min) = gates.min_hvl {
        if disease.hvl < min {
            return false;
        }
    }
    if let Some(max) = gates.max_hvl {
        if disease.hvl > max {
            return false;
        }
    }
    if let Some(max_failures) = gates.max_art_failures {
        if ctx.patient.art.num_observed_failures > max_failures {
            return false;
        }
    }
    true
}

/// Residual death-rate ratios from recent severe OI history, plus the
/// TB-as-OI slot when the TB module is disabled.
fn apply_history_risks(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    for oi in 0..ctx.sim.oi_count() {
        // The acute month itself already carries the acute ratio.
        let last = match ctx.patient.disease.last_severe_oi_month[oi] {
            Some(m) if m != month => m,
            _ => continue,
        };
        let def = &ctx.sim.nat_hist.ois[oi];
        if def.history_duration_months > 0
            && month - last <= def.history_duration_months
            && def.history_death_rate_ratio > 1.0
        {
            let ratio = def.history_death_rate_ratio;
            ctx.add_mortality_risk(DeathCause::AcuteOi(oi as u8), ratio);
        }
    }
    if !ctx.sim.tb.enable {
        if let Some(slot) = ctx.sim.nat_hist.tb_as_oi_when_disabled {
            if ctx.patient.disease.current_oi == Some(slot) {
                // The generic slot stands in for TB; attribute to TB.
                let ratio = ctx.sim.nat_hist.ois[slot].acute_death_rate_ratio;
                if ratio > 1.0 {
                    ctx.add_mortality_risk(DeathCause::Tb, ratio);
                }
            }
        }
    }
}
