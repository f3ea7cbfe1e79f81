//! Step 3: chronic condition incidence and ongoing effects.

use tsukihi_core::prob::prob_rate_multiply;

use crate::types::{DeathCause, HetOutcome, HivState, RespType};

use super::UpdaterCtx;

/// Prevalent chronic conditions at entry.
pub(crate) fn initial(ctx: &mut UpdaterCtx) {
    if !ctx.sim.chrms.enable {
        return;
    }
    if ctx.patient.disease.hiv_state == HivState::Negative {
        return;
    }
    for i in 0..ctx.sim.chrms.chrms.len() {
        let prevalence = ctx.sim.chrms.chrms[i].prevalence_at_entry;
        if ctx.patient.rng.event(prevalence) {
            ctx.patient.disease.chrms[i] = true;
            ctx.patient.disease.chrm_start_month[i] = Some(0);
            ctx.stats.num_chrm_prevalent[i] += 1;
        }
    }
}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    if !ctx.sim.chrms.enable {
        return;
    }
    let month = ctx.month();
    for i in 0..ctx.sim.chrms.chrms.len() {
        if ctx.patient.disease.chrms[i] {
            apply_ongoing_effects(ctx, i, month);
        } else {
            roll_incidence(ctx, i, month);
        }
    }
}

fn roll_incidence(ctx: &mut UpdaterCtx, chrm: usize, month: u32) {
    let def = &ctx.sim.chrms.chrms[chrm];
    let disease = &ctx.patient.disease;
    let base = if disease.hiv_state == HivState::Negative {
        def.incidence_hiv_negative
    } else {
        def.incidence[disease.cd4_strata().index()]
    };
    if base <= 0.0 {
        return;
    }
    let mut mult = 1.0;
    for (r, has) in ctx.patient.general.risk_factors.iter().enumerate() {
        if *has {
            mult *= def.risk_factor_multipliers.get(r).copied().unwrap_or(1.0);
        }
    }
    let art = &ctx.patient.art;
    if art.on_art
        && art.response_types[HetOutcome::ArtEffectChrm.index()] != RespType::Non
    {
        mult *= def.on_art_multiplier;
    }
    let prob = prob_rate_multiply(base, mult);
    if ctx.patient.rng.event(prob) {
        ctx.patient.disease.chrms[chrm] = true;
        ctx.patient.disease.chrm_start_month[chrm] = Some(month);
        ctx.stats.num_chrm_incident[chrm] += 1;
        let name = ctx.sim.chrms.chrms[chrm].name.clone();
        ctx.trace(format!("CHRM {}", name));
    }
}

fn apply_ongoing_effects(ctx: &mut UpdaterCtx, chrm: usize, month: u32) {
    let start = match ctx.patient.disease.chrm_start_month[chrm] {
        Some(m) => m,
        None => return,
    };
    let def = &ctx.sim.chrms.chrms[chrm];
    let stage = def.stage_for(month - start);
    let cost = def.stage_cost[stage];
    let qol = def.stage_qol_modifier[stage];
    let drr = def.stage_death_rate_ratio[stage];
    ctx.add_medical_cost(cost);
    ctx.accumulate_qol(qol);
    if drr > 1.0 {
        ctx.add_mortality_risk(DeathCause::Chrm(chrm as u8), drr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::chrms::ChrmDef;
    use crate::inputs::{InputFile, SimContext};
    use crate::rng::SimRng;
    use crate::state::Patient;
    use crate::stats::{CostStats, RunStats};
    use crate::trace::Tracer;

    fn chrm_input(def: ChrmDef) -> InputFile {
        let mut input = InputFile::default();
        input.chrms.enable = true;
        input.chrms.chrms = vec![def];
        input
    }

    #[test]
    fn test_certain_incidence_fires_once() {
        let mut def = ChrmDef::default();
        def.incidence = [1.0; 6];
        let sim = SimContext::from_input(chrm_input(def));
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::disabled();
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.disease.hiv_state = HivState::AsymptomaticChronic;
        patient.disease.true_cd4 = 200.0;
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        assert!(ctx.patient.disease.chrms[0]);
        assert_eq!(ctx.stats.num_chrm_incident[0], 1);
    }

    #[test]
    fn test_staged_effects_add_cost_and_risk() {
        let mut def = ChrmDef::default();
        def.stage_months = [6, 12];
        def.stage_cost = [50.0, 20.0, 10.0];
        def.stage_death_rate_ratio = [3.0, 2.0, 1.5];
        let sim = SimContext::from_input(chrm_input(def));
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::disabled();
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.disease.hiv_state = HivState::AsymptomaticChronic;
        patient.disease.chrms[0] = true;
        patient.disease.chrm_start_month[0] = Some(0);
        patient.general.month = 8;
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        // Month 8 is stage 1.
        assert_eq!(ctx.patient.general.costs_undiscounted, 20.0);
        assert_eq!(ctx.patient.disease.mortality_risks.len(), 1);
        assert_eq!(ctx.patient.disease.mortality_risks[0].death_rate_ratio, 2.0);
    }

    #[test]
    fn test_disabled_module_is_inert() {
        let sim = SimContext::default();
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::disabled();
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        assert!(ctx.patient.disease.mortality_risks.is_empty());
    }
}
