//! Step 2: HIV infection, acute-to-chronic transition, pediatric and
//! maternal updates, age-category transitions.

use tsukihi_core::prob::prob_rate_multiply;
use tsukihi_core::sampling::{categorical_index, clamp_range};
use tsukihi_core::strata::HvlStrata;

use crate::types::{HivState, PedsAgeCat, PedsHivState};

use super::UpdaterCtx;

pub(crate) fn initial(_ctx: &mut UpdaterCtx) {}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    if ctx.sim.peds.enable {
        perform_maternal_updates(ctx);
    }
    match ctx.patient.disease.hiv_state {
        HivState::Negative => perform_negative_updates(ctx),
        HivState::AcuteSyndrome => perform_acute_to_chronic(ctx),
        _ => {}
    }
    if ctx.sim.peds.enable {
        perform_age_transitions(ctx);
    }
}

/// Roll for incident infection of an HIV-negative patient.
fn perform_negative_updates(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let general = &ctx.patient.general;
    let monitoring = &ctx.patient.monitoring;

    let prob = if let Some(effective) = ctx.patient.effective_incidence {
        // Dynamic transmission supplies the month's effective incidence.
        effective
    } else if ctx.sim.peds.enable && ctx.patient.peds.is_breastfeeding(general.age_months) {
        breastfeeding_transmission_prob(ctx)
    } else {
        let base = ctx.sim.cohort.incidence_prob(
            general.gender,
            general.age_months,
            general.transm_risk,
        );
        let mut mult = ctx.sim.cohort.incidence_multiplier(month);
        if !monitoring.high_risk {
            mult *= ctx.sim.cohort.low_risk_incidence_multiplier;
        }
        if monitoring.on_prep {
            mult *= ctx.sim.testing.prep.incidence_multiplier;
        }
        prob_rate_multiply(base, mult)
    };

    if prob > 0.0 && ctx.patient.rng.event(prob) {
        perform_new_infection(ctx);
    }
}

/// Monthly mother-to-child transmission probability while breastfeeding.
fn breastfeeding_transmission_prob(ctx: &UpdaterCtx) -> f64 {
    let peds = &ctx.patient.peds;
    if !peds.maternal_status.is_positive() || !peds.mother_alive {
        return 0.0;
    }
    let inputs = &ctx.sim.peds;
    let base = inputs.prob_mtct_pp_monthly[peds.maternal_status.index()];
    let mut mult = 1.0;
    if peds.mother_on_art {
        mult *= inputs.mother_on_art_multiplier;
    }
    if peds.mother_suppressed {
        mult *= inputs.mother_suppressed_multiplier;
    }
    let proph_mults: Vec<f64> = inputs
        .eid
        .infant_prophs
        .iter()
        .map(|p| p.transmission_multiplier)
        .collect();
    mult *= peds.infant_proph_multiplier(ctx.month(), &proph_mults);
    prob_rate_multiply(base, mult)
}

/// Transition an HIV-negative patient to acute infection.
pub(crate) fn perform_new_infection(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    ctx.patient.disease.hiv_state = HivState::AcuteSyndrome;
    ctx.patient.disease.prevalent_case = false;
    ctx.patient.disease.month_of_infection = Some(month);
    if ctx.sim.peds.enable && ctx.patient.peds.age_category == PedsAgeCat::EarlyChildhood {
        ctx.patient.disease.peds_hiv_state = PedsHivState::PostPartum;
        let perc = &ctx.sim.peds.initial_cd4_percentage;
        ctx.patient.disease.true_cd4_percentage = ctx
            .patient
            .rng
            .gaussian_clamped(perc.mean, perc.std_dev, 0.0, 100.0);
    }
    let cohort = &ctx.sim.cohort;
    let cd4 = if cohort.initial_cd4_sqrt_scale {
        let root = ctx
            .patient
            .rng
            .gaussian(cohort.initial_cd4_mean.sqrt(), cohort.initial_cd4_std_dev);
        root.max(0.0).powi(2)
    } else {
        ctx.patient
            .rng
            .gaussian(cohort.initial_cd4_mean, cohort.initial_cd4_std_dev)
    };
    ctx.patient.disease.true_cd4 = clamp_range(cd4, 0.0, cohort.max_cd4);
    ctx.patient.disease.track_cd4_minimum();
    let strata = ctx.patient.disease.cd4_strata();
    let u = ctx.patient.rng.uniform();
    let hvl_idx =
        categorical_index(&cohort.setpoint_hvl_given_cd4[strata.index()], u).unwrap_or(3);
    let hvl = HvlStrata::from_index(hvl_idx);
    ctx.patient.disease.setpoint_hvl = hvl;
    ctx.patient.disease.hvl = hvl;
    ctx.patient.disease.target_hvl = hvl;
    ctx.stats.time_summary_mut(month).num_incident_infections += 1;
    ctx.refresh_care_state();
    ctx.trace("HIV INFECTION");
}

/// Acute syndrome resolves into chronic infection after the configured
/// duration.
fn perform_acute_to_chronic(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let infected = match ctx.patient.disease.month_of_infection {
        Some(m) => m,
        None => return,
    };
    if month - infected >= ctx.sim.cohort.acute_duration_months {
        ctx.patient.disease.hiv_state = HivState::AsymptomaticChronic;
        ctx.patient.disease.month_of_chronic_transition = Some(month);
        ctx.trace("ACUTE TO CHRONIC HIV");
    }
}

/// Maternal status evolution for pediatric patients.
fn perform_maternal_updates(ctx: &mut UpdaterCtx) {
    if ctx.patient.peds.age_category != PedsAgeCat::EarlyChildhood {
        return;
    }
    let month = ctx.month();
    let age = ctx.patient.general.age_months;
    let inputs = &ctx.sim.peds;

    if ctx.patient.peds.mother_alive && ctx.patient.rng.event(inputs.prob_maternal_death) {
        let peds = &mut ctx.patient.peds;
        peds.mother_alive = false;
        peds.month_of_maternal_death = Some(month);
        // Orphaned infants switch to replacement feeding.
        peds.breastfeeding = crate::types::Breastfeeding::Replacement;
        ctx.trace("MATERNAL DEATH");
        return;
    }

    // An HIV-negative breastfeeding mother may seroconvert.
    let peds = &ctx.patient.peds;
    if peds.mother_alive
        && !peds.maternal_status.is_positive()
        && peds.is_breastfeeding(age)
        && ctx
            .patient
            .rng
            .event(inputs.prob_maternal_incident_infection)
    {
        ctx.patient.peds.maternal_status = crate::types::MaternalStatus::Acute;
        ctx.patient.peds.hiv_exposed = true;
        ctx.patient.peds.never_exposed = false;
        ctx.trace("MATERNAL HIV INFECTION");
    }
}

/// Pediatric age-category transitions.
fn perform_age_transitions(ctx: &mut UpdaterCtx) {
    let current = ctx.patient.peds.age_category;
    let next = PedsAgeCat::from_age_months(ctx.patient.general.age_months);
    if next == current {
        return;
    }
    if current == PedsAgeCat::EarlyChildhood && ctx.patient.disease.hiv_state.is_infected() {
        convert_percentage_to_absolute(ctx);
    }
    ctx.patient.peds.age_category = next;
    ctx.trace(format!("PEDS AGE TRANSITION to {:?}", next));
}

/// At the early-to-late childhood boundary the CD4 metric changes from
/// percentage to absolute; the envelopes carry over through the
/// configured conversion factor.
fn convert_percentage_to_absolute(ctx: &mut UpdaterCtx) {
    let factor = ctx.sim.peds.percentage_to_absolute_factor;
    let disease = &mut ctx.patient.disease;
    disease.true_cd4 = disease.true_cd4_percentage * factor;
    disease.min_true_cd4 = disease.min_true_cd4.min(disease.true_cd4);
    let art = &mut ctx.patient.art;
    if art.overall_percentage_envelope.active {
        let env = art.overall_percentage_envelope;
        art.overall_envelope.activate(
            env.line,
            env.month_of_start,
            env.value * factor,
            env.slope * factor,
        );
    }
    if art.indiv_percentage_envelope.active {
        let env = art.indiv_percentage_envelope;
        art.indiv_envelope.activate(
            env.line,
            env.month_of_start,
            env.value * factor,
            env.slope * factor,
        );
    }
    art.cd4_slope = art.cd4_percentage_slope * factor;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::cohort::IncidenceBin;
    use crate::inputs::{InputFile, SimContext};
    use crate::rng::SimRng;
    use crate::state::Patient;
    use crate::stats::{CostStats, RunStats};
    use crate::trace::Tracer;
    use crate::types::Gender;

    fn harness(input: InputFile) -> (SimContext, RunStats, CostStats, Tracer) {
        let sim = SimContext::from_input(input);
        let stats = RunStats::new(&sim);
        let costs = CostStats::new(&sim);
        (sim, stats, costs, Tracer::disabled())
    }

    #[test]
    fn test_certain_incidence_infects() {
        let mut input = InputFile::default();
        input.cohort.incidence = vec![IncidenceBin {
            max_age_months: 10_000,
            prob: [[1.0; 3]; 2],
        }];
        let (sim, mut stats, mut costs, mut tracer) = harness(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.general.gender = Gender::Male;
        patient.general.age_months = 360;
        patient.monitoring.high_risk = true;
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        assert_eq!(patient.disease().hiv_state, HivState::AcuteSyndrome);
        assert_eq!(patient.disease().month_of_infection, Some(0));
        assert_eq!(stats.time_summaries[0].num_incident_infections, 1);
    }

    #[test]
    fn test_zero_incidence_never_infects() {
        let (sim, mut stats, mut costs, mut tracer) = harness(InputFile::default());
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.general.age_months = 360;
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        for _ in 0..100 {
            monthly(&mut ctx);
        }
        assert_eq!(ctx.patient.disease.hiv_state, HivState::Negative);
    }

    #[test]
    fn test_effective_incidence_overrides_table() {
        let (sim, mut stats, mut costs, mut tracer) = harness(InputFile::default());
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.general.age_months = 360;
        patient.effective_incidence = Some(1.0);
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        assert!(ctx.patient.disease.hiv_state.is_infected());
    }

    #[test]
    fn test_acute_resolves_to_chronic() {
        let mut input = InputFile::default();
        input.cohort.acute_duration_months = 2;
        let (sim, mut stats, mut costs, mut tracer) = harness(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.disease.hiv_state = HivState::AcuteSyndrome;
        patient.disease.month_of_infection = Some(0);
        patient.general.month = 1;
        {
            let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
            monthly(&mut ctx);
        }
        assert_eq!(patient.disease.hiv_state, HivState::AcuteSyndrome);
        patient.general.month = 2;
        {
            let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
            monthly(&mut ctx);
        }
        assert_eq!(patient.disease.hiv_state, HivState::AsymptomaticChronic);
        assert_eq!(patient.disease.month_of_chronic_transition, Some(2));
    }

    #[test]
    fn test_percentage_conversion_at_age_transition() {
        let mut input = InputFile::default();
        input.peds.enable = true;
        input.peds.percentage_to_absolute_factor = 20.0;
        let (sim, mut stats, mut costs, mut tracer) = harness(input);
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.peds.age_category = PedsAgeCat::EarlyChildhood;
        patient.disease.hiv_state = HivState::AsymptomaticChronic;
        patient.disease.true_cd4_percentage = 25.0;
        patient.general.age_months = 60;
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        assert_eq!(ctx.patient.peds.age_category, PedsAgeCat::LateChildhood);
        assert_eq!(ctx.patient.disease.true_cd4, 500.0);
    }
}
