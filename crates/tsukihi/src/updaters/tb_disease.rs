//! Step 5: TB natural history - infection, activation, relapse,
//! self-cure, active-disease mortality, tracker upkeep.

use tsukihi_core::prob::prob_rate_multiply;
use tsukihi_core::sampling::categorical_index;

use crate::inputs::tb::hiv_class;
use crate::types::{DeathCause, HivState, TbState, TbStrain, TbTracker};

use super::UpdaterCtx;

/// Entry TB state, strain and trackers.
pub(crate) fn initial(ctx: &mut UpdaterCtx) {
    if !ctx.sim.tb.enable {
        return;
    }
    let u = ctx.patient.rng.uniform();
    let state_idx = categorical_index(&ctx.sim.tb.initial_state_dist, u).unwrap_or(0);
    let state = [
        TbState::Uninfected,
        TbState::Latent,
        TbState::ActivePulmonary,
        TbState::ActiveExtrapulmonary,
        TbState::PreviouslyTreated,
        TbState::TreatmentDefault,
    ][state_idx];
    ctx.patient.tb.state = state;
    if state != TbState::Uninfected {
        let u = ctx.patient.rng.uniform();
        let strain_idx = categorical_index(&ctx.sim.tb.initial_strain_dist, u).unwrap_or(0);
        ctx.patient.tb.strain = [TbStrain::Ds, TbStrain::Mdr, TbStrain::Xdr][strain_idx];
        ctx.patient.tb.month_of_infection = Some(0);
    }
    match state {
        TbState::Latent => {
            let reactive = ctx.patient.rng.event(ctx.sim.tb.prob_immune_reactive);
            ctx.patient.tb.set_tracker(TbTracker::ImmuneReactive, reactive);
        }
        TbState::ActivePulmonary | TbState::ActiveExtrapulmonary => {
            ctx.patient.tb.ever_had_tb = true;
            set_active_trackers(ctx, state);
            ctx.patient.tb.month_of_state_change = Some(0);
        }
        TbState::PreviouslyTreated | TbState::TreatmentDefault => {
            // Entrants with a treatment history are assumed one course in.
            ctx.patient.tb.ever_had_tb = true;
            ctx.patient.tb.ever_on_treatment = true;
            ctx.patient.tb.month_of_treatment_stop = Some(0);
            ctx.patient.tb.month_of_initial_treatment_stop = Some(0);
        }
        _ => {}
    }
}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    if !ctx.sim.tb.enable {
        return;
    }
    match ctx.patient.tb.state {
        TbState::Uninfected => roll_infection(ctx, false),
        TbState::Latent => {
            if !roll_activation(ctx) {
                roll_infection(ctx, true);
            }
        }
        TbState::ActivePulmonary | TbState::ActiveExtrapulmonary => {
            apply_active_disease(ctx);
        }
        TbState::PreviouslyTreated | TbState::TreatmentDefault => {
            if !roll_relapse(ctx) {
                roll_infection(ctx, true);
            }
        }
    }
}

fn patient_hiv_class(ctx: &UpdaterCtx) -> usize {
    hiv_class(
        ctx.patient.disease.hiv_state != HivState::Negative,
        ctx.patient.disease.cd4_strata(),
    )
}

/// Combined anti-infection multiplier from proph and recent treatment.
fn infection_protection(ctx: &UpdaterCtx) -> f64 {
    let month = ctx.month();
    let tb = &ctx.patient.tb;
    let mut mult = 1.0;
    if tb.on_proph {
        if let Some(line) = ctx.sim.tb.proph.lines.get(tb.proph_line) {
            mult *= line.infection_multiplier;
        }
    } else if let Some(stop) = tb.month_of_proph_stop {
        if let Some(line) = ctx.sim.tb.proph.lines.get(tb.proph_line) {
            if month < stop + line.decay_horizon_months {
                mult *= line.post_infection_multiplier;
            }
        }
    }
    if let Some(stop) = tb.month_of_treatment_stop {
        if let Some(treat) = ctx.sim.tb.treatments.get(tb.treatment_line) {
            if month < stop + treat.efficacy_horizon {
                mult *= treat.anti_infection_multiplier;
            }
        }
    }
    mult
}

/// Infection (or reinfection from latent/history states).
fn roll_infection(ctx: &mut UpdaterCtx, reinfection: bool) {
    let month = ctx.month();
    let class = patient_hiv_class(ctx);
    let base = ctx
        .sim
        .tb
        .infection_prob(ctx.patient.general.age_months, class);
    if base <= 0.0 {
        return;
    }
    let mut mult = ctx.sim.tb.calendar_multiplier(month) * infection_protection(ctx);
    if reinfection {
        mult *= ctx.sim.tb.reinfection_multiplier;
        if ctx.patient.tb.on_proph {
            if let Some(line) = ctx.sim.tb.proph.lines.get(ctx.patient.tb.proph_line) {
                mult *= line.reinfection_multiplier[ctx.patient.tb.strain.index()];
            }
        }
    }
    let prob = prob_rate_multiply(base, mult);
    if !ctx.patient.rng.event(prob) {
        return;
    }
    let u = ctx.patient.rng.uniform();
    let strain_idx = categorical_index(&ctx.sim.tb.infection_strain_dist, u).unwrap_or(0);
    let tb = &mut ctx.patient.tb;
    tb.strain = [TbStrain::Ds, TbStrain::Mdr, TbStrain::Xdr][strain_idx];
    if tb.state == TbState::Uninfected {
        tb.state = TbState::Latent;
        tb.month_of_state_change = Some(month);
    }
    tb.month_of_infection = Some(month);
    let reactive = ctx.patient.rng.event(ctx.sim.tb.prob_immune_reactive);
    ctx.patient.tb.set_tracker(TbTracker::ImmuneReactive, reactive);
    ctx.stats.num_tb_infections += 1;
    ctx.trace(if reinfection {
        "TB REINFECTION"
    } else {
        "TB INFECTION"
    });
}

/// Latent disease may activate; two-stage by time since infection.
fn roll_activation(ctx: &mut UpdaterCtx) -> bool {
    let month = ctx.month();
    let infected = match ctx.patient.tb.month_of_infection {
        Some(m) => m,
        None => return false,
    };
    let class = patient_hiv_class(ctx);
    let base = if month - infected < ctx.sim.tb.early_activation_months {
        ctx.sim.tb.prob_activation_early[class]
    } else {
        ctx.sim.tb.prob_activation_late[class]
    };
    if base <= 0.0 {
        return false;
    }
    let mut mult = ctx.sim.tb.calendar_multiplier(month);
    let tb = &ctx.patient.tb;
    if tb.on_proph {
        if let Some(line) = ctx.sim.tb.proph.lines.get(tb.proph_line) {
            mult *= line.activation_multiplier[tb.strain.index()];
        }
    } else if let Some(stop) = tb.month_of_proph_stop {
        if let Some(line) = ctx.sim.tb.proph.lines.get(tb.proph_line) {
            if month < stop + line.decay_horizon_months {
                mult *= line.post_activation_multiplier[tb.strain.index()];
            }
        }
    }
    if let Some(stop) = tb.month_of_treatment_stop {
        if let Some(treat) = ctx.sim.tb.treatments.get(tb.treatment_line) {
            if month < stop + treat.efficacy_horizon {
                mult *= treat.anti_activation_multiplier;
            }
        }
    }
    let prob = prob_rate_multiply(base, mult);
    if !ctx.patient.rng.event(prob) {
        return false;
    }
    activate_disease(ctx);
    false
}

/// Pulmonary/extrapulmonary split and tracker draws on activation.
fn activate_disease(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let pulmonary = ctx.patient.rng.event(ctx.sim.tb.pulmonary_fraction);
    let state = if pulmonary {
        TbState::ActivePulmonary
    } else {
        TbState::ActiveExtrapulmonary
    };
    ctx.patient.tb.state = state;
    ctx.patient.tb.month_of_state_change = Some(month);
    ctx.patient.tb.ever_had_tb = true;
    set_active_trackers(ctx, state);
    ctx.stats.num_tb_activations += 1;
    ctx.trace(format!("TB ACTIVATION {}", state.label()));
}

fn set_active_trackers(ctx: &mut UpdaterCtx, state: TbState) {
    if state == TbState::ActivePulmonary {
        let class = patient_hiv_class(ctx);
        let high = ctx.patient.rng.event(ctx.sim.tb.prob_sputum_high[class]);
        ctx.patient.tb.set_tracker(TbTracker::SputumHigh, high);
    }
    let symptoms = ctx
        .patient
        .rng
        .event(ctx.sim.tb.prob_symptoms_on_activation);
    ctx.patient.tb.set_tracker(TbTracker::Symptoms, symptoms);
}

/// Active disease: self-cure and the monthly mortality contribution.
fn apply_active_disease(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let started = ctx.patient.tb.month_of_state_change.unwrap_or(0);
    if ctx.sim.tb.enable_self_cure
        && ctx.sim.tb.months_to_self_cure > 0
        && month.saturating_sub(started) >= ctx.sim.tb.months_to_self_cure
        && !ctx.patient.tb.on_treatment
        && !ctx.patient.tb.on_empiric_treatment
    {
        let tb = &mut ctx.patient.tb;
        tb.state = TbState::PreviouslyTreated;
        tb.self_cured = true;
        tb.month_of_state_change = Some(month);
        tb.month_of_treatment_stop = Some(month);
        tb.set_tracker(TbTracker::Symptoms, false);
        tb.set_tracker(TbTracker::SputumHigh, false);
        ctx.stats.num_tb_self_cures += 1;
        ctx.trace("TB SELF CURE");
        return;
    }
    let class = patient_hiv_class(ctx);
    let mut drr = match ctx.patient.tb.state {
        TbState::ActivePulmonary => ctx.sim.tb.active_pulm_death_rate_ratio[class],
        _ => ctx.sim.tb.active_extrapulm_death_rate_ratio[class],
    };
    if ctx.patient.tb.on_treatment || ctx.patient.tb.on_empiric_treatment {
        drr *= ctx.sim.tb.treatment_mortality_multiplier;
    }
    if drr > 1.0 {
        ctx.add_mortality_risk(DeathCause::Tb, drr);
    }
}

/// Relapse from the previously-treated and default states.
fn roll_relapse(ctx: &mut UpdaterCtx) -> bool {
    let month = ctx.month();
    let relapse = &ctx.sim.tb.relapse;
    let stopped = match ctx.patient.tb.month_of_treatment_stop {
        Some(m) => m,
        None => return false,
    };
    let since = month.saturating_sub(stopped);
    if since < relapse.threshold_months {
        return false;
    }
    let mut rate = relapse.base_rate * (since.max(1) as f64).powf(relapse.exponent);
    rate *= relapse.hiv_class_multiplier[patient_hiv_class(ctx)];
    if ctx.patient.tb.state == TbState::TreatmentDefault {
        rate *= relapse.default_multiplier;
    }
    if since < relapse.efficacy_horizon {
        if let Some(treat) = ctx.sim.tb.treatments.get(ctx.patient.tb.treatment_line) {
            rate *= treat.anti_relapse_multiplier;
        }
    }
    let prob = tsukihi_core::prob::rate_to_prob(rate * ctx.sim.tb.calendar_multiplier(month));
    if !ctx.patient.rng.event(prob) {
        return false;
    }
    activate_disease(ctx);
    ctx.stats.num_tb_relapses += 1;
    ctx.trace("TB RELAPSE");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::tb::{TbInfectionBin, HIV_CLASSES};
    use crate::inputs::{InputFile, SimContext};
    use crate::rng::SimRng;
    use crate::state::Patient;
    use crate::stats::{CostStats, RunStats};
    use crate::trace::Tracer;

    fn tb_input() -> InputFile {
        let mut input = InputFile::default();
        input.tb.enable = true;
        input
    }

    fn run_monthly(sim: &SimContext, patient: &mut Patient) -> RunStats {
        let mut stats = RunStats::new(sim);
        let mut costs = CostStats::new(sim);
        let mut tracer = Tracer::disabled();
        let mut ctx = UpdaterCtx::new(patient, sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        stats
    }

    #[test]
    fn test_certain_infection_goes_latent() {
        let mut input = tb_input();
        input.tb.infection = vec![TbInfectionBin {
            max_age_months: 10_000,
            prob: [1.0; HIV_CLASSES],
        }];
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        let stats = run_monthly(&sim, &mut patient);
        assert_eq!(patient.tb.state, TbState::Latent);
        assert_eq!(stats.num_tb_infections, 1);
    }

    #[test]
    fn test_certain_activation_splits_pulmonary() {
        let mut input = tb_input();
        input.tb.prob_activation_early = [1.0; HIV_CLASSES];
        input.tb.pulmonary_fraction = 1.0;
        input.tb.prob_sputum_high = [1.0; HIV_CLASSES];
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.tb.state = TbState::Latent;
        patient.tb.month_of_infection = Some(0);
        let stats = run_monthly(&sim, &mut patient);
        assert_eq!(patient.tb.state, TbState::ActivePulmonary);
        assert!(patient.tb.tracker(TbTracker::SputumHigh));
        assert_eq!(stats.num_tb_activations, 1);
    }

    #[test]
    fn test_active_tb_adds_mortality_risk() {
        let mut input = tb_input();
        input.tb.active_pulm_death_rate_ratio = [3.0; HIV_CLASSES];
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.tb.state = TbState::ActivePulmonary;
        patient.tb.month_of_state_change = Some(0);
        run_monthly(&sim, &mut patient);
        assert_eq!(patient.disease.mortality_risks.len(), 1);
        assert!(matches!(
            patient.disease.mortality_risks[0].cause,
            DeathCause::Tb
        ));
    }

    #[test]
    fn test_self_cure_moves_to_previously_treated() {
        let mut input = tb_input();
        input.tb.enable_self_cure = true;
        input.tb.months_to_self_cure = 6;
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.tb.state = TbState::ActivePulmonary;
        patient.tb.month_of_state_change = Some(0);
        patient.tb.set_tracker(TbTracker::Symptoms, true);
        patient.general.month = 6;
        let stats = run_monthly(&sim, &mut patient);
        assert_eq!(patient.tb.state, TbState::PreviouslyTreated);
        assert!(patient.tb.self_cured);
        assert!(!patient.tb.tracker(TbTracker::Symptoms));
        assert_eq!(stats.num_tb_self_cures, 1);
    }

    #[test]
    fn test_relapse_respects_threshold() {
        let mut input = tb_input();
        input.tb.relapse.base_rate = 100.0;
        input.tb.relapse.exponent = 0.0;
        input.tb.relapse.threshold_months = 12;
        let sim = SimContext::from_input(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.tb.state = TbState::PreviouslyTreated;
        patient.tb.month_of_treatment_stop = Some(0);
        patient.general.month = 6;
        run_monthly(&sim, &mut patient);
        assert_eq!(patient.tb.state, TbState::PreviouslyTreated);
        patient.general.month = 12;
        let stats = run_monthly(&sim, &mut patient);
        assert!(patient.tb.state.is_active());
        assert_eq!(stats.num_tb_relapses, 1);
    }
}
