//! Step 7: mortality-risk composition and the death draw.
//!
//! Every risk accumulated this month contributes `ratio x background`
//! as a rate; the rates sum into the monthly death probability. A month
//! with no accumulated risks rolls the plain background probability.
//! Death short-circuits the rest of the pipeline.

use tsukihi_core::mortality::RiskComposition;
use tsukihi_core::prob::rate_to_prob;

use crate::inputs::cost::DeathCostClass;
use crate::types::{DeathCause, HetOutcome, HivState, PedsAgeCat};

use super::UpdaterCtx;

pub(crate) fn initial(_ctx: &mut UpdaterCtx) {}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    add_hiv_mortality_risk(ctx);
    add_risk_factor_risks(ctx);

    let background = background_rate(ctx);
    let risks = ctx.patient.disease.mortality_risks.clone();
    let composition = RiskComposition::compose(background, &risks);

    let (died, cause, risk_cost) = if composition.is_empty() {
        let prob = rate_to_prob(background);
        if prob > 0.0 && ctx.patient.rng.event(prob) {
            (true, DeathCause::Background, None)
        } else {
            (false, DeathCause::Background, None)
        }
    } else {
        let prob = composition.death_probability();
        if ctx.patient.rng.event(prob) {
            let u = ctx.patient.rng.uniform();
            let (cause, cost) = composition.select_cause(u).unwrap();
            (true, cause, cost)
        } else {
            (false, DeathCause::Background, None)
        }
    };

    if died {
        commit_death(ctx, cause, risk_cost);
    }
}

/// The monthly background mortality rate, with pediatric HEU handling.
fn background_rate(ctx: &UpdaterCtx) -> f64 {
    let general = &ctx.patient.general;
    let mut rate = ctx
        .sim
        .nat_hist
        .background_rate(general.age_months, general.gender);
    if ctx.sim.peds.enable
        && ctx.patient.peds.hiv_exposed
        && ctx.patient.disease.hiv_state == HivState::Negative
        && general.age_months < ctx.sim.peds.heu_mortality_months
    {
        rate *= ctx.sim.peds.heu_mortality_multiplier;
    }
    rate
}

/// The HIV death-rate ratio, modulated by the ART effect.
fn add_hiv_mortality_risk(ctx: &mut UpdaterCtx) {
    if ctx.patient.disease.hiv_state == HivState::Negative {
        return;
    }
    let disease = &ctx.patient.disease;
    let mut drr = if ctx.patient.peds.age_category == PedsAgeCat::EarlyChildhood {
        let below = disease.true_cd4_percentage < ctx.sim.nat_hist.peds_cd4_percentage_threshold;
        ctx.sim.nat_hist.hiv_death_rate_ratio_peds[if below { 0 } else { 1 }]
    } else {
        ctx.sim.nat_hist.hiv_death_rate_ratio[disease.cd4_strata().index()]
    };
    let art = &ctx.patient.art;
    if art.on_art && art.apply_art_effect {
        drr = (drr * art.response_value(HetOutcome::ArtEffectMortality)).max(1.0);
    }
    if drr > 1.0 {
        ctx.add_mortality_risk(DeathCause::Hiv, drr);
    }
}

fn add_risk_factor_risks(ctx: &mut UpdaterCtx) {
    for (i, def) in ctx.sim.cohort.risk_factors.iter().enumerate() {
        if ctx.patient.general.risk_factors[i] && def.death_rate_ratio > 1.0 {
            ctx.patient.disease.mortality_risks.push(
                tsukihi_core::mortality::MortalityRisk::new(
                    DeathCause::RiskFactor(i as u8),
                    def.death_rate_ratio,
                ),
            );
        }
    }
}

/// Mark the patient dead, record the cause and the cost of death.
fn commit_death(ctx: &mut UpdaterCtx, cause: DeathCause, risk_cost: Option<f64>) {
    let month = ctx.month();
    if let Some(cost) = risk_cost {
        ctx.add_medical_cost(cost);
    }
    let class = death_cost_class(cause);
    let on_art = ctx.patient.art.on_art;
    let death_cost = ctx.sim.cost.death_cost(class, on_art);
    ctx.add_medical_cost(death_cost);
    ctx.accumulate_qol(ctx.sim.cost.qol_death_month_modifier);

    ctx.patient.disease.alive = false;
    ctx.patient.disease.cause_of_death = Some(cause);
    ctx.patient.disease.month_of_death = Some(month);
    let hiv_positive = ctx.patient.disease.hiv_state.is_infected();
    ctx.stats.record_death(cause, hiv_positive);
    ctx.stats.time_summary_mut(month).num_deaths += 1;
    ctx.trace(format!("DEATH cause {}", cause.label()));
}

fn death_cost_class(cause: DeathCause) -> DeathCostClass {
    match cause {
        DeathCause::Background | DeathCause::RiskFactor(_) => DeathCostClass::Background,
        DeathCause::Hiv => DeathCostClass::Hiv,
        DeathCause::AcuteOi(_) => DeathCostClass::Oi,
        DeathCause::Chrm(_) => DeathCostClass::Chrm,
        DeathCause::ArtToxicity
        | DeathCause::ProphToxicity
        | DeathCause::TbProphToxicity
        | DeathCause::TbTreatmentToxicity => DeathCostClass::Toxicity,
        DeathCause::Tb => DeathCostClass::Tb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::{InputFile, SimContext};
    use crate::rng::SimRng;
    use crate::state::Patient;
    use crate::stats::{CostStats, RunStats};
    use crate::trace::Tracer;
    use crate::types::Gender;

    fn step(sim: &SimContext, patient: &mut Patient) -> RunStats {
        let mut stats = RunStats::new(sim);
        let mut costs = CostStats::new(sim);
        let mut tracer = Tracer::disabled();
        let mut ctx = UpdaterCtx::new(patient, sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        stats
    }

    #[test]
    fn test_no_risk_no_background_never_dies() {
        let sim = SimContext::default();
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        for _ in 0..100 {
            step(&sim, &mut patient);
        }
        assert!(patient.is_alive());
    }

    #[test]
    fn test_certain_background_death() {
        let mut input = InputFile::default();
        input.nat_hist.background_mortality = vec![[1_000.0, 1_000.0]];
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        let stats = step(&sim, &mut patient);
        assert!(!patient.is_alive());
        assert_eq!(
            patient.disease.cause_of_death,
            Some(DeathCause::Background)
        );
        assert_eq!(stats.num_deaths, 1);
    }

    #[test]
    fn test_hiv_drr_dominates_cause() {
        // With an HIV risk present, the composed hazard is the ratio
        // times background and the recorded cause is HIV.
        let mut input = InputFile::default();
        input.nat_hist.background_mortality = vec![[10.0, 10.0]];
        input.nat_hist.hiv_death_rate_ratio = [2.0; 6];
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.general.gender = Gender::Male;
        patient.disease.hiv_state = HivState::AsymptomaticChronic;
        patient.disease.true_cd4 = 200.0;
        let _ = step(&sim, &mut patient);
        assert!(!patient.is_alive());
        assert_eq!(patient.disease.cause_of_death, Some(DeathCause::Hiv));
    }

    #[test]
    fn test_death_books_cost_of_death() {
        let mut input = InputFile::default();
        input.nat_hist.background_mortality = vec![[1_000.0, 1_000.0]];
        input.cost.death_cost_off_art[DeathCostClass::Background.index()] = 500.0;
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        step(&sim, &mut patient);
        assert_eq!(patient.general.costs_undiscounted, 500.0);
    }

    #[test]
    fn test_dead_month_recorded_in_time_series() {
        let mut input = InputFile::default();
        input.nat_hist.background_mortality = vec![[1_000.0, 1_000.0]];
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.general.month = 7;
        let stats = step(&sim, &mut patient);
        assert_eq!(stats.time_summaries[7].num_deaths, 1);
        assert_eq!(patient.disease.month_of_death, Some(7));
    }
}
