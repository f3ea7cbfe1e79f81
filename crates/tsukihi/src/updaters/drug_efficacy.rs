//! Step 11: ART efficacy transitions, envelope slope upkeep, and
//! prophylaxis resistance.

use crate::types::{ArtEfficacy, EmergencyKind, HetOutcome, PedsAgeCat, RespType};

use super::UpdaterCtx;

pub(crate) fn initial(_ctx: &mut UpdaterCtx) {}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    if ctx.patient.art.on_art {
        perform_art_efficacy_updates(ctx);
    }
    if ctx.patient.art.overall_envelope.active
        || ctx.patient.art.overall_percentage_envelope.active
    {
        perform_envelope_updates(ctx);
    }
    if ctx.patient.proph.total_on > 0 {
        perform_proph_resistance_updates(ctx);
    }
}

/// Draw a CD4 slope for a line and stage given the patient's response
/// type (absolute metric).
pub(crate) fn draw_cd4_slope(ctx: &mut UpdaterCtx, line: usize, stage: usize) -> f64 {
    let resp = ctx.patient.art.cd4_response_type.index();
    let params = ctx.sim.art.lines[line].cd4_slope[resp][stage];
    ctx.patient.rng.gaussian(params.mean, params.std_dev)
}

/// Percentage-metric slope keyed by the pediatric age category at the
/// start of the suppression, not the current one.
pub(crate) fn draw_cd4_percentage_slope(ctx: &mut UpdaterCtx, line: usize, stage: usize) -> f64 {
    let months_eff = ctx
        .patient
        .art
        .months_since_efficacy_change(ctx.month());
    let age_at_start = ctx.patient.general.age_months.saturating_sub(months_eff);
    let cat = PedsAgeCat::from_age_months(age_at_start).index();
    let params = ctx.sim.art.lines[line].cd4_percentage_slope[cat][stage];
    ctx.patient.rng.gaussian(params.mean, params.std_dev)
}

fn perform_art_efficacy_updates(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let line_idx = ctx.patient.art.curr_line;
    let line = ctx.sim.art.lines[line_idx].clone();
    let efficacy = ctx.patient.art.efficacy;
    let early_childhood = ctx.sim.peds.enable
        && ctx.patient.peds.age_category == PedsAgeCat::EarlyChildhood;

    // Unsuccessful months count toward resistance for responders only.
    if efficacy != ArtEfficacy::Success
        && ctx.patient.art.response_types[HetOutcome::Resistance.index()] != RespType::Non
    {
        ctx.patient.art.months_unsuccessful_by_line[line_idx] += 1;
        ctx.patient.art.months_unsuccessful_by_hvl[ctx.patient.disease.hvl.index()] += 1;
    }

    // Stage-boundary crossings redraw the suppressed slope.
    if efficacy == ArtEfficacy::Success {
        let months_eff = ctx.patient.art.months_since_efficacy_change(month);
        if early_childhood {
            if months_eff == line.stage_bounds_percentage[0] {
                ctx.patient.art.cd4_percentage_slope = draw_cd4_percentage_slope(ctx, line_idx, 1);
            } else if months_eff == line.stage_bounds_percentage[1] {
                ctx.patient.art.cd4_percentage_slope = draw_cd4_percentage_slope(ctx, line_idx, 2);
            }
        } else if let Some(stage) = line.stage_boundary_crossed(months_eff) {
            ctx.patient.art.cd4_slope = draw_cd4_slope(ctx, line_idx, stage);
        }
    }

    // Max-months and sub-regimen switch points go through the clinic.
    let months_on = ctx.patient.art.months_on_regimen(month);
    let stop = ctx.sim.treatment.stop_policy(line_idx);
    if let Some(max) = stop.max_months {
        if months_on >= max {
            ctx.schedule_emergency_visit(EmergencyKind::Art, month);
        }
    }
    let sub = ctx.patient.art.curr_sub_regimen;
    if let Some(switch) = line.sub_regimens[sub].months_to_switch {
        let months_on_sub = month.saturating_sub(ctx.patient.art.month_of_sub_regimen_start);
        if months_on_sub >= switch {
            ctx.schedule_emergency_visit(EmergencyKind::Art, month);
        }
    }

    // Forced failure month.
    if efficacy != ArtEfficacy::Failure {
        if let Some(force) = line.force_fail_month {
            if months_on >= force {
                ctx.set_art_efficacy(ArtEfficacy::Failure);
                ctx.set_target_hvl(ctx.patient.disease.setpoint_hvl);
                ctx.trace("ART LATE FAIL");
                return;
            }
        }
    }

    // The efficacy time horizon protects initial and resuppression
    // success from late-fail rolls.
    let horizon = if ctx.patient.art.on_resuppression {
        line.efficacy_horizon_resuppression
    } else {
        line.efficacy_horizon
    };
    if ctx.patient.art.within_efficacy_horizon(month, horizon) {
        return;
    }

    if efficacy == ArtEfficacy::Success {
        let prob_fail = ctx.patient.art.prob_late_fail;
        if prob_fail > 0.0 && ctx.patient.rng.event(prob_fail) {
            ctx.set_art_efficacy(ArtEfficacy::Failure);
            ctx.set_target_hvl(ctx.patient.disease.setpoint_hvl);
            ctx.trace("ART LATE FAIL");
        }
    }
}

/// Envelope slope upkeep at the envelope's own stage boundaries: adopt
/// the live slope while still suppressed on the regimen that set the
/// envelope, redraw from that regimen's distribution otherwise.
fn perform_envelope_updates(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let early_childhood = ctx.sim.peds.enable
        && ctx.patient.peds.age_category == PedsAgeCat::EarlyChildhood;

    if early_childhood {
        update_percentage_envelope_pair(ctx, month);
    } else {
        update_absolute_envelope_pair(ctx, month);
    }
}

fn update_absolute_envelope_pair(ctx: &mut UpdaterCtx, month: u32) {
    let overall = ctx.patient.art.overall_envelope;
    if overall.active {
        let line = &ctx.sim.art.lines[overall.line];
        let since = month.saturating_sub(overall.month_of_start);
        if let Some(stage) = line.stage_boundary_crossed(since) {
            let slope = if still_suppressed_on(ctx, overall.line, overall.month_of_start) {
                ctx.patient.art.cd4_slope
            } else {
                draw_cd4_slope(ctx, overall.line, stage)
            };
            ctx.patient.art.overall_envelope.slope = slope;
            let indiv = ctx.patient.art.indiv_envelope;
            if indiv.active && indiv.line == overall.line {
                ctx.patient.art.indiv_envelope.slope = slope;
            }
        }
    }
    let indiv = ctx.patient.art.indiv_envelope;
    if indiv.active && indiv.line != ctx.patient.art.overall_envelope.line {
        let line = &ctx.sim.art.lines[indiv.line];
        let since = month.saturating_sub(indiv.month_of_start);
        if let Some(stage) = line.stage_boundary_crossed(since) {
            let slope = if still_suppressed_on(ctx, indiv.line, indiv.month_of_start) {
                ctx.patient.art.cd4_slope
            } else {
                draw_cd4_slope(ctx, indiv.line, stage)
            };
            ctx.patient.art.indiv_envelope.slope = slope;
        }
    }
}

fn update_percentage_envelope_pair(ctx: &mut UpdaterCtx, month: u32) {
    let overall = ctx.patient.art.overall_percentage_envelope;
    if overall.active {
        let line = &ctx.sim.art.lines[overall.line];
        let since = month.saturating_sub(overall.month_of_start);
        let bounds = line.stage_bounds_percentage;
        let stage = if since == bounds[0] {
            Some(1)
        } else if since == bounds[1] {
            Some(2)
        } else {
            None
        };
        if let Some(stage) = stage {
            let slope = if still_suppressed_on(ctx, overall.line, overall.month_of_start) {
                ctx.patient.art.cd4_percentage_slope
            } else {
                draw_cd4_percentage_slope(ctx, overall.line, stage)
            };
            ctx.patient.art.overall_percentage_envelope.slope = slope;
            let indiv = ctx.patient.art.indiv_percentage_envelope;
            if indiv.active && indiv.line == overall.line {
                ctx.patient.art.indiv_percentage_envelope.slope = slope;
            }
        }
    }
}

/// True while the patient is still suppressed on the same regimen start
/// that set an envelope.
fn still_suppressed_on(ctx: &UpdaterCtx, line: usize, month_of_start: u32) -> bool {
    let art = &ctx.patient.art;
    art.on_art
        && art.efficacy == ArtEfficacy::Success
        && art.curr_line == line
        && art.month_of_regimen_start <= month_of_start
}

/// Prophylaxis: scheduled-stop emergencies and resistance onset.
fn perform_proph_resistance_updates(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
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
        let line = match lines.get(ctx.patient.proph.proph_line[oi]) {
            Some(l) => l.clone(),
            None => continue,
        };
        let months_on = ctx.patient.proph.months_on(oi, month);

        let stop = config.stop.clone();
        if let Some(min_month) = stop.min_month {
            if month >= min_month {
                ctx.schedule_emergency_visit(EmergencyKind::Proph, month);
            }
        }
        if let Some(max_on) = stop.months_on_proph {
            if months_on >= max_on {
                ctx.schedule_emergency_visit(EmergencyKind::Proph, month);
            }
        }
        if let Some(switch) = line.months_to_switch {
            if months_on >= switch {
                ctx.schedule_emergency_visit(EmergencyKind::Proph, month);
            }
        }

        if !ctx.patient.proph.resistant[oi] {
            let mut onset = line.time_of_resistance as f64;
            if ctx.patient.proph.non_compliant {
                onset /= 1.0 - ctx.sim.proph.non_compliance_degree;
            }
            if (months_on as f64) > onset
                && ctx.patient.rng.event(line.monthly_prob_resistance)
            {
                ctx.patient.proph.resistant[oi] = true;
                let name = ctx.sim.nat_hist.ois[oi].name.clone();
                ctx.trace(format!("PROPH RESISTANCE for OI {}", name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::art::ArtLineInputs;
    use crate::inputs::nat_hist::NormalParams;
    use crate::inputs::{InputFile, SimContext};
    use crate::rng::SimRng;
    use crate::state::Patient;
    use crate::stats::{CostStats, RunStats};
    use crate::trace::Tracer;

    fn step(sim: &SimContext, patient: &mut Patient) {
        let mut stats = RunStats::new(sim);
        let mut costs = CostStats::new(sim);
        let mut tracer = Tracer::disabled();
        let mut ctx = UpdaterCtx::new(patient, sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
    }

    fn suppressed_patient(sim: &SimContext) -> Patient {
        let mut p = Patient::new(0, sim, SimRng::new(0));
        p.disease.hiv_state = crate::types::HivState::AsymptomaticChronic;
        p.art.on_art = true;
        p.art.has_taken_art = true;
        p.art.curr_line = 0;
        p.art.efficacy = ArtEfficacy::Success;
        p.art.had_success_on_regimen = true;
        p.art.month_of_regimen_start = 0;
        p.art.month_of_efficacy_change = 0;
        p.art.month_of_initial_success = Some(0);
        p
    }

    #[test]
    fn test_no_late_fail_inside_horizon() {
        let mut input = InputFile::default();
        input.art.lines = vec![ArtLineInputs {
            efficacy_horizon: 24,
            ..Default::default()
        }];
        let sim = SimContext::from_input(input);
        let mut patient = suppressed_patient(&sim);
        patient.art.prob_late_fail = 1.0;
        for month in 1..=24 {
            patient.general.month = month;
            step(&sim, &mut patient);
            assert_eq!(patient.art.efficacy, ArtEfficacy::Success);
        }
        // Past the horizon the certain late-fail lands.
        patient.general.month = 25;
        step(&sim, &mut patient);
        assert_eq!(patient.art.efficacy, ArtEfficacy::Failure);
    }

    #[test]
    fn test_force_fail_month() {
        let mut input = InputFile::default();
        input.art.lines = vec![ArtLineInputs {
            force_fail_month: Some(6),
            efficacy_horizon: 100,
            ..Default::default()
        }];
        let sim = SimContext::from_input(input);
        let mut patient = suppressed_patient(&sim);
        patient.general.month = 6;
        step(&sim, &mut patient);
        assert_eq!(patient.art.efficacy, ArtEfficacy::Failure);
    }

    #[test]
    fn test_stage_boundary_redraws_slope() {
        let mut input = InputFile::default();
        let mut line = ArtLineInputs::default();
        line.stage_bounds = [6, 48];
        for resp in line.cd4_slope.iter_mut() {
            resp[1] = NormalParams::new(3.5, 0.0);
        }
        input.art.lines = vec![line];
        let sim = SimContext::from_input(input);
        let mut patient = suppressed_patient(&sim);
        patient.art.cd4_slope = 10.0;
        patient.general.month = 6;
        step(&sim, &mut patient);
        assert_eq!(patient.art.cd4_slope, 3.5);
    }

    #[test]
    fn test_unsuccessful_months_counted_for_responders() {
        let mut input = InputFile::default();
        input.art.lines = vec![ArtLineInputs::default()];
        let sim = SimContext::from_input(input);
        let mut patient = suppressed_patient(&sim);
        patient.art.efficacy = ArtEfficacy::Failure;
        step(&sim, &mut patient);
        assert_eq!(patient.art.months_unsuccessful_by_line[0], 1);
        patient.art.response_types[HetOutcome::Resistance.index()] = RespType::Non;
        step(&sim, &mut patient);
        assert_eq!(patient.art.months_unsuccessful_by_line[0], 1);
    }

    #[test]
    fn test_proph_resistance_after_onset() {
        let mut input = InputFile::default();
        input.nat_hist.ois = vec![crate::inputs::nat_hist::OiDef::default()];
        input.proph.enable = true;
        input.proph.per_oi = vec![crate::inputs::proph::OiProphConfig {
            primary_lines: vec![crate::inputs::proph::ProphLineDef {
                time_of_resistance: 6,
                monthly_prob_resistance: 1.0,
                ..Default::default()
            }],
            ..Default::default()
        }];
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.proph.on_proph[0] = true;
        patient.proph.total_on = 1;
        patient.proph.month_started[0] = Some(0);
        patient.general.month = 6;
        step(&sim, &mut patient);
        assert!(!patient.proph.resistant[0]);
        patient.general.month = 7;
        step(&sim, &mut patient);
        assert!(patient.proph.resistant[0]);
    }
}
