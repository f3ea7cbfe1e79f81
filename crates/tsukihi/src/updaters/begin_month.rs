//! Step 1: month-start resets and the one-shot entry sampling.

use tsukihi_core::sampling::{categorical_index, clamp_range, uniform_in_range};

use crate::inputs::cohort::AgeDistribution;
use crate::types::{
    Breastfeeding, Cd4ResponseType, Gender, HivState, MaternalStatus, PedsAgeCat, PedsHivState,
    TransmRisk,
};

use super::UpdaterCtx;

/// Entry sampling: age, gender, risk, HIV state, CD4/HVL, maternal state.
pub(crate) fn initial(ctx: &mut UpdaterCtx) {
    sample_demographics(ctx);
    sample_hiv_state(ctx);
    if ctx.sim.peds.enable {
        sample_pediatric_entry(ctx);
    }
    record_entry_stats(ctx);
    ctx.refresh_care_state();
    let age = ctx.patient.general.age_months;
    let gender = ctx.patient.general.gender;
    ctx.patient.general.qol_month = ctx.sim.cost.background_qol(age, gender);
    if ctx.patient.general.tracing_enabled {
        ctx.tracer.begin_patient(ctx.patient.general.patient_id);
        let text = format!(
            "ENTER age {} {} {} CD4 {:.0}",
            ctx.patient.general.age_months,
            ctx.patient.general.gender.label(),
            ctx.patient.disease.hiv_state.label(),
            ctx.patient.disease.true_cd4
        );
        ctx.trace(text);
    }
}

/// Month-start scratch resets and start-of-month census.
pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    ctx.patient.disease.mortality_risks.clear();
    let age = ctx.patient.general.age_months;
    let gender = ctx.patient.general.gender;
    ctx.patient.general.qol_month = ctx.sim.cost.background_qol(age, gender);

    let summary = ctx.stats.time_summary_mut(month);
    summary.num_alive += 1;
    if ctx.patient.disease.hiv_state == HivState::Negative {
        summary.num_hiv_negative_at_start += 1;
    } else {
        summary.num_hiv_positive += 1;
    }
    if ctx.patient.art.on_art {
        summary.num_on_art += 1;
    }
    if ctx.patient.monitoring.care_state.is_engaged() {
        summary.num_in_care += 1;
    }
    if ctx.patient.monitoring.on_prep {
        summary.num_on_prep += 1;
    }
    if ctx.patient.tb.state.is_active() {
        summary.num_active_tb += 1;
    }
}

fn sample_demographics(ctx: &mut UpdaterCtx) {
    let age_months = match &ctx.sim.cohort.age {
        AgeDistribution::Normal { mean, std_dev } => {
            ctx.patient.rng.gaussian(*mean, *std_dev).max(0.0) as u32
        }
        AgeDistribution::Custom(strata) => {
            let weights: Vec<f64> = strata.iter().map(|s| s.weight).collect();
            let u = ctx.patient.rng.uniform();
            match categorical_index(&weights, u) {
                Some(i) => {
                    let s = &strata[i];
                    let u2 = ctx.patient.rng.uniform();
                    uniform_in_range(s.min_months as f64, s.max_months as f64, u2) as u32
                }
                None => 0,
            }
        }
    };
    ctx.patient.general.age_months = age_months;
    ctx.patient.general.gender = if ctx.patient.rng.event(ctx.sim.cohort.male_fraction) {
        Gender::Male
    } else {
        Gender::Female
    };
    let u = ctx.patient.rng.uniform();
    let risk_idx = categorical_index(&ctx.sim.cohort.transm_risk_dist, u).unwrap_or(2);
    ctx.patient.general.transm_risk = TransmRisk::ALL[risk_idx];
    for (i, def) in ctx.sim.cohort.risk_factors.iter().enumerate() {
        ctx.patient.general.risk_factors[i] = ctx.patient.rng.event(def.prevalence);
    }
    ctx.patient.monitoring.high_risk = ctx.patient.rng.event(ctx.sim.cohort.high_risk_fraction);
    let het = &ctx.sim.heterogeneity;
    ctx.patient.general.baseline_logit = ctx
        .patient
        .rng
        .gaussian(het.baseline_logit.mean, het.baseline_logit.std_dev);
    let u = ctx.patient.rng.uniform();
    let resp = categorical_index(&ctx.sim.cohort.cd4_response_type_dist, u).unwrap_or(0);
    ctx.patient.art.cd4_response_type = Cd4ResponseType::ALL[resp];
    ctx.patient.peds.age_category = if ctx.sim.peds.enable {
        PedsAgeCat::from_age_months(age_months)
    } else {
        PedsAgeCat::Adult
    };
}

fn sample_hiv_state(ctx: &mut UpdaterCtx) {
    let u = ctx.patient.rng.uniform();
    let idx = categorical_index(&ctx.sim.cohort.initial_hiv_state, u).unwrap_or(0);
    let state = match idx {
        1 => HivState::AcuteSyndrome,
        2 => HivState::AsymptomaticChronic,
        3 => HivState::SymptomaticChronic,
        _ => HivState::Negative,
    };
    ctx.patient.disease.hiv_state = state;
    if state == HivState::Negative {
        return;
    }
    ctx.patient.disease.prevalent_case = true;
    ctx.patient.disease.month_of_infection = Some(0);
    if state != HivState::AcuteSyndrome {
        ctx.patient.disease.month_of_chronic_transition = Some(0);
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
        categorical_index(&cohort.initial_hvl_given_cd4[strata.index()], u).unwrap_or(3);
    let hvl = tsukihi_core::strata::HvlStrata::from_index(hvl_idx);
    ctx.patient.disease.hvl = hvl;
    ctx.patient.disease.setpoint_hvl = hvl;
    ctx.patient.disease.target_hvl = hvl;
}

fn sample_pediatric_entry(ctx: &mut UpdaterCtx) {
    let peds_inputs = &ctx.sim.peds;
    if ctx.patient.peds.age_category != PedsAgeCat::EarlyChildhood {
        return;
    }
    let u = ctx.patient.rng.uniform();
    let status_idx = categorical_index(&peds_inputs.maternal_status_dist, u).unwrap_or(0);
    let status = match status_idx {
        1 => MaternalStatus::ChronicHighCd4,
        2 => MaternalStatus::ChronicLowCd4,
        3 => MaternalStatus::Acute,
        _ => MaternalStatus::Negative,
    };
    let peds = &mut ctx.patient.peds;
    peds.maternal_status = status;
    peds.hiv_exposed = status.is_positive();
    peds.never_exposed = !status.is_positive();
    peds.maternal_status_known = ctx.patient.rng.event(peds_inputs.prob_maternal_status_known);
    if status.is_positive() {
        peds.mother_on_art = ctx.patient.rng.event(peds_inputs.prob_mother_on_art);
        if peds.mother_on_art {
            peds.mother_suppressed = ctx.patient.rng.event(peds_inputs.prob_mother_suppressed);
            peds.mother_on_art_known = peds.maternal_status_known;
            peds.mother_suppressed_known =
                ctx.patient.rng.event(peds_inputs.prob_suppression_known);
        }
    }
    let u = ctx.patient.rng.uniform();
    let bf_idx = categorical_index(&peds_inputs.breastfeeding_dist, u).unwrap_or(3);
    peds.breastfeeding = match bf_idx {
        0 => Breastfeeding::Exclusive,
        1 => Breastfeeding::Mixed,
        2 => Breastfeeding::Complementary,
        _ => Breastfeeding::Replacement,
    };
    peds.breastfeeding_stop_age_months = ctx
        .patient
        .rng
        .gaussian(
            peds_inputs.breastfeeding_stop_age.mean,
            peds_inputs.breastfeeding_stop_age.std_dev,
        )
        .max(0.0) as u32;
    peds.in_eid_system =
        peds_inputs.eid.enable && ctx.patient.rng.event(peds_inputs.eid.prob_enrolled);

    // Perinatal transmission resolved at entry for infected entrants.
    if ctx.patient.disease.hiv_state.is_infected() {
        ctx.patient.disease.peds_hiv_state = PedsHivState::IntraUterine;
        let perc = &peds_inputs.initial_cd4_percentage;
        ctx.patient.disease.true_cd4_percentage = ctx
            .patient
            .rng
            .gaussian_clamped(perc.mean, perc.std_dev, 0.0, 100.0);
        ctx.patient.disease.track_cd4_minimum();
    } else if peds.hiv_exposed {
        ctx.patient.disease.peds_hiv_state = PedsHivState::Negative;
    }
}

fn record_entry_stats(ctx: &mut UpdaterCtx) {
    let general = &ctx.patient.general;
    let disease = &ctx.patient.disease;
    ctx.stats.initial_age.add(general.age_months as f64);
    ctx.stats.num_by_gender[general.gender.index()] += 1;
    ctx.stats.num_by_initial_hiv_state[disease.hiv_state.index()] += 1;
    if disease.hiv_state.is_infected() {
        ctx.stats.initial_cd4.add(disease.true_cd4);
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

    fn run_initial(input: InputFile, seed: u64) -> (Patient, RunStats) {
        let sim = SimContext::from_input(input);
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::disabled();
        let mut patient = Patient::new(seed, &sim, SimRng::new(seed));
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        initial(&mut ctx);
        (patient, stats)
    }

    #[test]
    fn test_negative_cohort_stays_negative() {
        let (patient, stats) = run_initial(InputFile::default(), 1);
        assert_eq!(patient.disease().hiv_state, HivState::Negative);
        assert_eq!(stats.num_by_initial_hiv_state[0], 1);
    }

    #[test]
    fn test_infected_entrant_gets_cd4_and_hvl() {
        let mut input = InputFile::default();
        input.cohort.initial_hiv_state = [0.0, 0.0, 1.0, 0.0];
        let (patient, stats) = run_initial(input, 2);
        assert_eq!(
            patient.disease().hiv_state,
            HivState::AsymptomaticChronic
        );
        assert!(patient.disease().true_cd4 > 0.0);
        assert!(patient.disease().prevalent_case);
        assert_eq!(stats.initial_cd4.count, 1);
    }

    #[test]
    fn test_cd4_clamped_to_max() {
        let mut input = InputFile::default();
        input.cohort.initial_hiv_state = [0.0, 0.0, 1.0, 0.0];
        input.cohort.initial_cd4_mean = 5_000.0;
        input.cohort.initial_cd4_std_dev = 0.0;
        input.cohort.max_cd4 = 2_000.0;
        let (patient, _) = run_initial(input, 3);
        assert_eq!(patient.disease().true_cd4, 2_000.0);
    }

    #[test]
    fn test_custom_age_distribution_respects_bounds() {
        let mut input = InputFile::default();
        input.cohort.age = AgeDistribution::Custom(vec![crate::inputs::cohort::AgeStratum {
            min_months: 240,
            max_months: 300,
            weight: 1.0,
        }]);
        for seed in 0..20 {
            let (patient, _) = run_initial(input.clone(), seed);
            let age = patient.general().age_months;
            assert!((240..=300).contains(&age));
        }
    }

    #[test]
    fn test_monthly_reset_clears_risks() {
        let sim = SimContext::default();
        let mut stats = RunStats::new(&sim);
        let mut costs = CostStats::new(&sim);
        let mut tracer = Tracer::disabled();
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient
            .disease
            .mortality_risks
            .push(tsukihi_core::mortality::MortalityRisk::new(
                crate::types::DeathCause::Hiv,
                2.0,
            ));
        let mut ctx = UpdaterCtx::new(&mut patient, &sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
        assert!(ctx.patient.disease.mortality_risks.is_empty());
        assert_eq!(ctx.stats.time_summaries[0].num_alive, 1);
    }
}
