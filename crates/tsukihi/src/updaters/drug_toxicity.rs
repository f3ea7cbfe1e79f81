//! Step 4: drug toxicities - ART toxicity effects, OI prophylaxis,
//! TB prophylaxis and TB treatment.

use crate::inputs::art::ToxicityDef;
use crate::state::ToxicityEffect;
use crate::types::{
    DeathCause, EmergencyKind, HetOutcome, HivState, ProphToxKind, ToxDuration, ToxSeverity,
};

use super::UpdaterCtx;

pub(crate) fn initial(ctx: &mut UpdaterCtx) {
    ctx.patient.tb.had_treatment_major_tox = false;
}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    if ctx.patient.disease.hiv_state != HivState::Negative {
        if ctx.patient.art.has_taken_art {
            perform_art_toxicity(ctx);
        }
        if ctx.patient.proph.total_on > 0 {
            perform_proph_toxicity(ctx);
        }
    }
    if ctx.sim.tb.enable {
        if ctx.patient.tb.on_proph {
            perform_tb_proph_toxicity(ctx);
        }
        perform_tb_treatment_toxicity(ctx);
    }
}

fn template(ctx: &UpdaterCtx, effect: &ToxicityEffect) -> ToxicityDef {
    ctx.sim.art.lines[effect.line].sub_regimens[effect.sub_regimen].toxicities[effect.tox_index]
        .clone()
}

/// Walk the active ART toxicity-effect list.
fn perform_art_toxicity(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let effects: Vec<ToxicityEffect> = ctx.patient.art.active_toxicities.clone();
    let mut retained: Vec<ToxicityEffect> = Vec::with_capacity(effects.len());

    for effect in effects {
        // Not yet started: keep untouched.
        if month < effect.month_of_start {
            retained.push(effect);
            continue;
        }
        let tox = template(ctx, &effect);

        if month == effect.month_of_start {
            // Drop the effect if the causative sub-regimen is gone.
            let art = &ctx.patient.art;
            if !art.on_art
                || art.curr_line != effect.line
                || art.curr_sub_regimen != effect.sub_regimen
            {
                continue;
            }
            ctx.stats.num_toxicity_events += 1;
            ctx.trace(format!(
                "{} TOX({}): ART {}.{}",
                tox.name,
                effect.severity.label(),
                effect.line + 1,
                effect.sub_regimen
            ));
            ctx.patient.art.had_prev_toxicity = true;
            if effect.severity == ToxSeverity::Major {
                ctx.patient.art.has_major_toxicity = true;
            }
            if effect.severity == ToxSeverity::Chronic && tox.switch_sub_regimen_on_onset {
                ctx.patient.art.has_chronic_tox_switch = true;
            }
            let severe = effect.severity == ToxSeverity::Major || tox.switch_sub_regimen_on_onset;
            if severe {
                ctx.patient.art.has_severe_toxicity = true;
                ctx.schedule_emergency_visit(EmergencyKind::Art, month);
            }
            if effect.severity == ToxSeverity::Major && tox.acute_major_death_rate_ratio > 1.0 {
                ctx.add_mortality_risk_with_cost(
                    DeathCause::ArtToxicity,
                    tox.acute_major_death_rate_ratio,
                    tox.acute_major_death_cost,
                );
            }
        }

        let use_qol = duration_in_scope(ctx, &effect, tox.qol_duration);
        if use_qol {
            ctx.accumulate_qol(tox.qol_modifier);
        }
        let use_cost = duration_in_scope(ctx, &effect, tox.cost_duration);
        if use_cost {
            ctx.add_medical_cost(tox.cost);
        }
        let mut use_chronic_death = false;
        if effect.severity == ToxSeverity::Chronic {
            use_chronic_death = duration_in_scope(ctx, &effect, tox.chronic_death_duration);
            if use_chronic_death
                && month >= effect.month_of_start + tox.months_to_chronic_death_impact
                && tox.chronic_death_rate_ratio > 1.0
            {
                ctx.add_mortality_risk(DeathCause::ArtToxicity, tox.chronic_death_rate_ratio);
            }
        }

        if use_qol || use_cost || use_chronic_death {
            ctx.trace_detail(format!(
                "TOX EFFECT {} ({}) {}{}{}",
                tox.name,
                effect.severity.label(),
                if use_qol { "useQOL " } else { "" },
                if use_cost { "useCost " } else { "" },
                if use_chronic_death { "useChronicDeath" } else { "" },
            ));
            retained.push(effect);
        }
    }
    ctx.patient.art.active_toxicities = retained;
}

/// Whether a toxicity component is still in scope for its duration kind.
fn duration_in_scope(ctx: &UpdaterCtx, effect: &ToxicityEffect, duration: ToxDuration) -> bool {
    let art = &ctx.patient.art;
    match duration {
        ToxDuration::ThisMonth => ctx.month() == effect.month_of_start,
        ToxDuration::SubRegimen => {
            art.on_art
                && art.curr_line == effect.line
                && art.curr_sub_regimen == effect.sub_regimen
        }
        ToxDuration::Regimen => art.on_art && art.curr_line == effect.line,
        ToxDuration::UntilDeath => true,
    }
}

/// Joint major/minor toxicity normalization shared by the proph and TB
/// toxicity rolls: returns the severity drawn this month, if any.
fn roll_major_minor(
    ctx: &mut UpdaterCtx,
    prob_major: f64,
    prob_minor: f64,
) -> Option<ToxSeverity> {
    let prob_no_tox = (1.0 - prob_major) * (1.0 - prob_minor);
    if ctx.patient.rng.event(prob_no_tox) {
        return None;
    }
    let only_major = prob_major * (1.0 - prob_minor);
    let only_minor = prob_minor * (1.0 - prob_major);
    let dist_major = if only_major + only_minor > 0.0 {
        only_major / (only_major + only_minor)
    } else {
        1.0
    };
    if ctx.patient.rng.event(dist_major) {
        Some(ToxSeverity::Major)
    } else {
        Some(ToxSeverity::Minor)
    }
}

/// OI prophylaxis toxicity, rolled once at the configured month on each
/// active line.
fn perform_proph_toxicity(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    for oi in 0..ctx.sim.oi_count() {
        if !ctx.patient.proph.on_proph[oi] {
            continue;
        }
        let proph_type = ctx.patient.proph.proph_type[oi];
        let line_idx = ctx.patient.proph.proph_line[oi];
        let config = match ctx.sim.proph.config(oi) {
            Some(c) => c,
            None => continue,
        };
        let lines = match proph_type {
            crate::types::ProphType::Primary => &config.primary_lines,
            crate::types::ProphType::Secondary => &config.secondary_lines,
        };
        let line = match lines.get(line_idx) {
            Some(l) => l.clone(),
            None => continue,
        };
        if ctx.patient.proph.resistant[oi] && line.resistance_death_rate_ratio > 1.0 {
            ctx.add_mortality_risk(DeathCause::ProphToxicity, line.resistance_death_rate_ratio);
        }
        if ctx.patient.proph.months_on(oi, month) != line.months_to_toxicity {
            continue;
        }
        match roll_major_minor(ctx, line.prob_major_toxicity, line.prob_minor_toxicity) {
            Some(ToxSeverity::Major) => {
                ctx.patient.proph.toxicity[oi] = ProphToxKind::Major;
                ctx.stats.num_proph_major_tox += 1;
                ctx.accumulate_qol(line.qol_major_toxicity);
                ctx.add_medical_cost(line.cost_major_toxicity);
                ctx.trace(format!(
                    "MAJ TOX: OI {} {} PROPH {}",
                    ctx.sim.nat_hist.ois[oi].name,
                    proph_type.label(),
                    line_idx + 1
                ));
                if line.major_toxicity_death_rate_ratio > 1.0 {
                    ctx.add_mortality_risk(
                        DeathCause::ProphToxicity,
                        line.major_toxicity_death_rate_ratio,
                    );
                }
                if line.switch_on_major_toxicity {
                    ctx.schedule_emergency_visit(EmergencyKind::Proph, month);
                }
            }
            Some(_) => {
                ctx.patient.proph.toxicity[oi] = ProphToxKind::Minor;
                ctx.stats.num_proph_minor_tox += 1;
                ctx.accumulate_qol(line.qol_minor_toxicity);
                ctx.add_medical_cost(line.cost_minor_toxicity);
                ctx.trace(format!(
                    "MIN TOX: OI {} {} PROPH {}",
                    ctx.sim.nat_hist.ois[oi].name,
                    proph_type.label(),
                    line_idx + 1
                ));
                if line.switch_on_minor_toxicity {
                    ctx.schedule_emergency_visit(EmergencyKind::Proph, month);
                }
            }
            None => {}
        }
    }
}

fn perform_tb_proph_toxicity(ctx: &mut UpdaterCtx) {
    let line_idx = ctx.patient.tb.proph_line;
    let line = match ctx.sim.tb.proph.lines.get(line_idx) {
        Some(l) => l.clone(),
        None => return,
    };

    // Dropout is rolled before toxicity.
    if ctx.patient.rng.event(ctx.sim.tb.proph.prob_dropoff) {
        ctx.stop_curr_tb_proph();
        ctx.patient.tb.proph_eligible = false;
        ctx.trace(format!("TB PROPH {} DROPOUT", line_idx + 1));
        return;
    }

    let hiv_negative = ctx.patient.disease.hiv_state == HivState::Negative;
    let (prob_major, prob_minor) = if hiv_negative {
        (line.prob_major_tox_hiv_neg, line.prob_minor_tox_hiv_neg)
    } else if ctx.patient.art.on_art {
        let f = ctx.patient.art.response_factor(HetOutcome::Toxicity);
        (
            line.prob_major_tox_off_art * (1.0 - f) + line.prob_major_tox_on_art * f,
            line.prob_minor_tox_off_art * (1.0 - f) + line.prob_minor_tox_on_art * f,
        )
    } else {
        (line.prob_major_tox_off_art, line.prob_minor_tox_off_art)
    };

    match roll_major_minor(ctx, prob_major, prob_minor) {
        Some(ToxSeverity::Major) => {
            ctx.patient.tb.proph_major_toxicity = true;
            ctx.accumulate_qol(line.qol_major_tox);
            ctx.add_medical_cost(line.cost_major_tox);
            ctx.trace(format!("MAJ TOX: TB PROPH {}", line_idx + 1));
            if line.major_tox_death_rate_ratio > 1.0 {
                ctx.add_mortality_risk(
                    DeathCause::TbProphToxicity,
                    line.major_tox_death_rate_ratio,
                );
            }
        }
        Some(_) => {
            ctx.accumulate_qol(line.qol_minor_tox);
            ctx.add_medical_cost(line.cost_minor_tox);
            ctx.trace(format!("MIN TOX: TB PROPH {}", line_idx + 1));
        }
        None => {}
    }
}

fn perform_tb_treatment_toxicity(ctx: &mut UpdaterCtx) {
    let tb = &ctx.patient.tb;
    if !tb.on_treatment && !tb.on_empiric_treatment {
        return;
    }
    let treat_idx = tb.treatment_line;
    let treat = match ctx.sim.tb.treatments.get(treat_idx) {
        Some(t) => t.clone(),
        None => return,
    };
    // The start month itself counts toward stage 1 for toxicity.
    let stage = if ctx.patient.tb.months_on_treatment(ctx.month()) <= treat.stage1_months {
        0
    } else {
        1
    };

    let hiv_negative = ctx.patient.disease.hiv_state == HivState::Negative;
    let (prob_major, prob_minor) = if hiv_negative {
        (
            treat.prob_major_tox_hiv_neg[stage],
            treat.prob_minor_tox_hiv_neg[stage],
        )
    } else if ctx.patient.art.on_art {
        let f = ctx.patient.art.response_factor(HetOutcome::Toxicity);
        (
            treat.prob_major_tox_off_art[stage] * (1.0 - f)
                + treat.prob_major_tox_on_art[stage] * f,
            treat.prob_minor_tox_off_art[stage] * (1.0 - f)
                + treat.prob_minor_tox_on_art[stage] * f,
        )
    } else {
        (
            treat.prob_major_tox_off_art[stage],
            treat.prob_minor_tox_off_art[stage],
        )
    };

    match roll_major_minor(ctx, prob_major, prob_minor) {
        Some(ToxSeverity::Major) => {
            ctx.patient.tb.had_treatment_major_tox = true;
            ctx.accumulate_qol(treat.qol_major_tox);
            ctx.add_medical_cost(treat.cost_major_tox);
            ctx.trace("MAJ TOX: TB TREAT");
            if treat.major_tox_death_rate_ratio > 1.0 {
                ctx.add_mortality_risk(
                    DeathCause::TbTreatmentToxicity,
                    treat.major_tox_death_rate_ratio,
                );
            }
            if ctx.patient.tb.on_empiric_treatment {
                super::tb_clinical::stop_empiric_treatment(ctx);
            }
        }
        Some(_) => {
            ctx.accumulate_qol(treat.qol_minor_tox);
            ctx.add_medical_cost(treat.cost_minor_tox);
            ctx.trace("MIN TOX: TB TREAT");
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::art::{ArtLineInputs, SubRegimenDef, ToxicityDef};
    use crate::inputs::{InputFile, SimContext};
    use crate::rng::SimRng;
    use crate::state::Patient;
    use crate::stats::{CostStats, RunStats};
    use crate::trace::Tracer;

    fn art_input_with_tox(tox: ToxicityDef) -> InputFile {
        let mut input = InputFile::default();
        input.art.lines = vec![ArtLineInputs {
            sub_regimens: vec![SubRegimenDef {
                months_to_switch: None,
                toxicities: vec![tox],
            }],
            ..Default::default()
        }];
        input
    }

    fn on_art_patient(sim: &SimContext) -> Patient {
        let mut patient = Patient::new(0, sim, SimRng::new(0));
        patient.disease.hiv_state = HivState::AsymptomaticChronic;
        patient.art.has_taken_art = true;
        patient.art.on_art = true;
        patient.art.curr_line = 0;
        patient.art.curr_sub_regimen = 0;
        patient
    }

    #[test]
    fn test_future_toxicity_is_kept_untouched() {
        let sim = SimContext::from_input(art_input_with_tox(ToxicityDef::default()));
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::disabled();
        let mut patient = on_art_patient(&sim);
        patient.art.active_toxicities.push(ToxicityEffect {
            line: 0,
            sub_regimen: 0,
            severity: ToxSeverity::Minor,
            tox_index: 0,
            month_of_start: 5,
        });
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        assert_eq!(ctx.patient.art.active_toxicities.len(), 1);
        assert_eq!(ctx.stats.num_toxicity_events, 0);
    }

    #[test]
    fn test_onset_requires_same_sub_regimen() {
        let sim = SimContext::from_input(art_input_with_tox(ToxicityDef::default()));
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::disabled();
        let mut patient = on_art_patient(&sim);
        patient.art.on_art = false;
        patient.art.active_toxicities.push(ToxicityEffect {
            line: 0,
            sub_regimen: 0,
            severity: ToxSeverity::Minor,
            tox_index: 0,
            month_of_start: 0,
        });
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        assert!(ctx.patient.art.active_toxicities.is_empty());
        assert_eq!(ctx.stats.num_toxicity_events, 0);
    }

    #[test]
    fn test_major_onset_adds_risk_and_emergency() {
        let tox = ToxicityDef {
            severity: ToxSeverity::Major,
            acute_major_death_rate_ratio: 5.0,
            acute_major_death_cost: 200.0,
            ..Default::default()
        };
        let sim = SimContext::from_input(art_input_with_tox(tox));
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::disabled();
        let mut patient = on_art_patient(&sim);
        patient.art.active_toxicities.push(ToxicityEffect {
            line: 0,
            sub_regimen: 0,
            severity: ToxSeverity::Major,
            tox_index: 0,
            month_of_start: 0,
        });
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        assert!(ctx.patient.art.has_major_toxicity);
        assert!(ctx.patient.art.has_severe_toxicity);
        assert_eq!(ctx.patient.disease.mortality_risks.len(), 1);
        assert_eq!(
            ctx.patient.disease.mortality_risks[0].cost,
            Some(200.0)
        );
        assert!(ctx.patient.monitoring.emergency_visit.is_some());
    }

    #[test]
    fn test_this_month_effect_expires() {
        let tox = ToxicityDef {
            severity: ToxSeverity::Minor,
            qol_duration: ToxDuration::ThisMonth,
            cost_duration: ToxDuration::ThisMonth,
            cost: 30.0,
            ..Default::default()
        };
        let sim = SimContext::from_input(art_input_with_tox(tox));
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::disabled();
        let mut patient = on_art_patient(&sim);
        patient.art.active_toxicities.push(ToxicityEffect {
            line: 0,
            sub_regimen: 0,
            severity: ToxSeverity::Minor,
            tox_index: 0,
            month_of_start: 0,
        });
        {
            let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
            monthly(&mut ctx);
        }
        // Still in scope during its onset month.
        assert_eq!(patient.art.active_toxicities.len(), 1);
        assert_eq!(patient.general.costs_undiscounted, 30.0);
        patient.general.month = 1;
        {
            let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
            monthly(&mut ctx);
        }
        // All components out of scope: removed, no further cost.
        assert!(patient.art.active_toxicities.is_empty());
        assert_eq!(patient.general.costs_undiscounted, 30.0);
    }

    #[test]
    fn test_chronic_death_waits_for_impact() {
        let tox = ToxicityDef {
            severity: ToxSeverity::Chronic,
            chronic_death_duration: ToxDuration::UntilDeath,
            months_to_chronic_death_impact: 6,
            chronic_death_rate_ratio: 4.0,
            qol_duration: ToxDuration::ThisMonth,
            cost_duration: ToxDuration::ThisMonth,
            ..Default::default()
        };
        let sim = SimContext::from_input(art_input_with_tox(tox));
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::disabled();
        let mut patient = on_art_patient(&sim);
        patient.art.active_toxicities.push(ToxicityEffect {
            line: 0,
            sub_regimen: 0,
            severity: ToxSeverity::Chronic,
            tox_index: 0,
            month_of_start: 0,
        });
        {
            let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
            monthly(&mut ctx);
        }
        assert!(patient.disease.mortality_risks.is_empty());
        patient.general.month = 6;
        patient.disease.mortality_risks.clear();
        {
            let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
            monthly(&mut ctx);
        }
        assert_eq!(patient.disease.mortality_risks.len(), 1);
    }
}
