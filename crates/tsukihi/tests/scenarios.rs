//! End-to-end scenarios driving the full monthly pipeline.

use tsukihi::inputs::cohort::IncidenceBin;
use tsukihi::inputs::cost::AgeBand;
use tsukihi::inputs::tb::{TbTestDef, TbTreatmentDef, HIV_CLASSES};
use tsukihi::inputs::treatment::{ArtStartPolicy, ArtStopPolicy};
use tsukihi::inputs::{InputFile, SimContext};
use tsukihi::rng::SimRng;
use tsukihi::runner::run_cohort;
use tsukihi::stats::{CostStats, RunStats};
use tsukihi::trace::Tracer;
use tsukihi::types::{ArtEfficacy, HivState, TbState};
use tsukihi::Patient;

fn base_input(name: &str, patients: u64, months: u32) -> InputFile {
    let mut input = InputFile::default();
    input.run_specs.run_name = name.into();
    input.run_specs.run_set_name = "scenarios".into();
    input.run_specs.num_cohorts = patients;
    input.run_specs.max_patient_months = months;
    input.run_specs.discount_annual = 0.0;
    input
}

/// A single healthy patient with no hazards accrues exactly the
/// calendar and the background QOL.
#[test]
fn healthy_patient_accrues_plain_life_months() {
    let mut input = base_input("healthy", 1, 12);
    input.cohort.age = tsukihi::inputs::cohort::AgeDistribution::Normal {
        mean: 360.0,
        std_dev: 0.0,
    };
    input.cohort.male_fraction = 1.0;
    input.cost.background_qol_male = vec![AgeBand {
        max_age_years: 200,
        value: 0.9,
    }];
    let sim = SimContext::from_input(input);
    let output = run_cohort(&sim).unwrap();
    assert_eq!(output.stats.num_patients, 1);
    assert_eq!(output.stats.survival.sum, 12.0);
    assert_eq!(output.stats.total_costs, 0.0);
    assert!((output.stats.total_qalms - 12.0 * 0.9).abs() < 1e-9);
    assert_eq!(output.stats.num_deaths, 0);
}

/// An HIV death-rate ratio of 2 over background rate mu yields a
/// monthly death probability of 1 - exp(-2 mu), attributed to HIV.
#[test]
fn hiv_mortality_composes_rate_ratio() {
    let mu: f64 = 0.01;
    let patients = 4_000u64;
    let mut input = base_input("hiv-mortality", patients, 1);
    input.cohort.initial_hiv_state = [0.0, 0.0, 1.0, 0.0];
    input.cohort.initial_cd4_mean = 200.0;
    input.cohort.initial_cd4_std_dev = 0.0;
    input.nat_hist.background_mortality = vec![[mu, mu]];
    input.nat_hist.hiv_death_rate_ratio = [2.0; 6];
    let sim = SimContext::from_input(input);
    let output = run_cohort(&sim).unwrap();
    let expected = 1.0 - (-2.0 * mu).exp();
    let observed = output.stats.num_deaths as f64 / patients as f64;
    assert!(
        (observed - expected).abs() < 0.01,
        "observed {} expected {}",
        observed,
        expected
    );
    // Every recorded death is an HIV death.
    assert_eq!(
        output.stats.deaths_by_cause.get("HIV").copied().unwrap_or(0),
        output.stats.num_deaths
    );
}

fn drive_patient(sim: &SimContext, months: u32) -> Patient {
    let mut stats = RunStats::new(sim);
    let mut costs = CostStats::new(sim);
    let mut tracer = Tracer::disabled();
    let mut patient = Patient::new(0, sim, SimRng::new(0));
    patient.perform_initial_updates(sim, &mut stats, &mut costs, &mut tracer);
    for _ in 0..months {
        if !patient.is_alive() {
            break;
        }
        patient.simulate_month(sim, &mut stats, &mut costs, &mut tracer);
    }
    patient
}

/// Inside the efficacy horizon a suppressed regimen never late-fails,
/// even with a certain monthly late-fail probability.
#[test]
fn efficacy_horizon_protects_suppression() {
    let mut input = base_input("horizon", 1, 0);
    input.cohort.initial_hiv_state = [0.0, 0.0, 1.0, 0.0];
    input.testing.prob_detected_at_entry = [0.0, 1.0, 1.0, 1.0];
    input.testing.prob_linked_at_entry = 1.0;
    let mut line = tsukihi::inputs::art::ArtLineInputs::default();
    line.efficacy_horizon = 24;
    line.het.suppression = tsukihi_core::response::ResponseCurve::flat(1.0);
    line.het.late_failure = tsukihi_core::response::ResponseCurve::flat(1.0);
    input.art.lines = vec![line];
    input.treatment.art_start = vec![ArtStartPolicy::default()];
    input.treatment.art_stop = vec![ArtStopPolicy {
        on_observed_failure: false,
        ..Default::default()
    }];
    let sim = SimContext::from_input(input);

    let patient = drive_patient(&sim, 24);
    assert!(patient.art().on_art, "patient should have started ART");
    // Still suppressed at month 24: the horizon covered every roll.
    assert_eq!(patient.art().efficacy, ArtEfficacy::Success);

    let patient = drive_patient(&sim, 30);
    // Past the horizon the certain late-fail has landed.
    assert_eq!(patient.art().efficacy, ArtEfficacy::Failure);
}

/// A two-test chain (smear then confirmatory) diagnoses roughly
/// smear-sensitivity x confirmatory-sensitivity of active cases in the
/// first month.
#[test]
fn tb_two_test_chain_diagnoses_expected_fraction() {
    let patients = 4_000u64;
    let mut input = base_input("tb-chain", patients, 1);
    input.tb.enable = true;
    input.tb.initial_state_dist = [0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
    input.tb.prob_symptoms_on_activation = 1.0;
    input.tb.diagnostics.enable = true;
    input.tb.diagnostics.allow_multiple_tests_per_month = true;
    let mut smear = TbTestDef::default();
    smear.name = "smear".into();
    smear.prob_positive[TbState::ActivePulmonary.index()] = [0.5; HIV_CLASSES];
    let mut confirm = TbTestDef::default();
    confirm.name = "confirm".into();
    confirm.prob_positive[TbState::ActivePulmonary.index()] = [0.99; HIV_CLASSES];
    input.tb.diagnostics.tests = vec![smear, confirm];
    input.tb.diagnostics.chain = [Some(0), Some(1), None, None];
    input.tb.diagnostics.next_on_positive = [Some(1), None, None, None];
    input.tb.diagnostics.next_on_negative = [None, None, None, None];
    input.tb.treatments = vec![TbTreatmentDef::default()];
    // Entry sets symptoms via the initial tracker draws on active state.
    let sim = SimContext::from_input(input);
    let output = run_cohort(&sim).unwrap();
    let fraction = output.stats.num_tb_diagnoses as f64 / patients as f64;
    assert!(
        fraction >= 0.45 && fraction <= 0.55,
        "diagnosed fraction {}",
        fraction
    );
}

/// PrEP with a 0.5 incidence multiplier halves the incident infection
/// rate relative to the same cohort without PrEP.
#[test]
fn prep_halves_incidence() {
    fn incidence_input(prep: bool) -> InputFile {
        let mut input = base_input(if prep { "prep" } else { "no-prep" }, 2_000, 60);
        input.cohort.incidence = vec![IncidenceBin {
            max_age_months: 100_000,
            prob: [[0.02; 3]; 2],
        }];
        if prep {
            input.testing.prep.enable = true;
            input.testing.prep.uptake_prob = [1.0; 3];
            input.testing.prep.coverage = 1.0;
            input.testing.prep.incidence_multiplier = 0.5;
            input.testing.prep.dropout_threshold_months = 1_000;
        }
        input
    }
    let without = run_cohort(&SimContext::from_input(incidence_input(false))).unwrap();
    let with = run_cohort(&SimContext::from_input(incidence_input(true))).unwrap();
    // Incidence per susceptible person-month.
    let rate = |stats: &RunStats| -> f64 {
        let incident: u64 = stats
            .time_summaries
            .iter()
            .map(|t| t.num_incident_infections)
            .sum();
        let susceptible: u64 = stats
            .time_summaries
            .iter()
            .map(|t| t.num_hiv_negative_at_start)
            .sum();
        incident as f64 / susceptible as f64
    };
    let ratio = rate(&with.stats) / rate(&without.stats);
    assert!(
        ratio > 0.4 && ratio < 0.62,
        "incidence ratio with PrEP {}",
        ratio
    );
}

/// Fixed-seed runs of the same input are identical.
#[test]
fn fixed_seed_runs_reproduce() {
    let mut input = base_input("repro", 100, 24);
    input.cohort.initial_hiv_state = [0.5, 0.1, 0.4, 0.0];
    input.nat_hist.background_mortality = vec![[0.002, 0.002]];
    input.nat_hist.hiv_death_rate_ratio = [3.0; 6];
    let sim = SimContext::from_input(input);
    let a = run_cohort(&sim).unwrap();
    let b = run_cohort(&sim).unwrap();
    assert_eq!(
        serde_json::to_string(&a.stats).unwrap(),
        serde_json::to_string(&b.stats).unwrap()
    );
    assert_eq!(a.trace_lines, b.trace_lines);
}

/// Age 0 with pediatrics disabled runs as an adult without panicking.
#[test]
fn newborn_without_pediatrics_is_treated_as_adult() {
    let mut input = base_input("newborn", 5, 24);
    input.cohort.age = tsukihi::inputs::cohort::AgeDistribution::Normal {
        mean: 0.0,
        std_dev: 0.0,
    };
    input.cohort.initial_hiv_state = [0.0, 0.0, 1.0, 0.0];
    let sim = SimContext::from_input(input);
    let output = run_cohort(&sim).unwrap();
    assert_eq!(output.stats.num_patients, 5);
}

/// With no ART lines configured, nobody initiates ART and the stop
/// reason stays at its default.
#[test]
fn no_art_lines_means_no_initiation() {
    let mut input = base_input("no-art", 1, 24);
    input.cohort.initial_hiv_state = [0.0, 0.0, 1.0, 0.0];
    input.testing.prob_detected_at_entry = [0.0, 1.0, 1.0, 1.0];
    input.testing.prob_linked_at_entry = 1.0;
    let sim = SimContext::from_input(input);
    let patient = drive_patient(&sim, 24);
    assert!(!patient.art().has_taken_art);
    assert_eq!(
        patient.art().stop_type,
        tsukihi::types::ArtStopType::NotStopped
    );
}

/// Discounting invariants over a run with events.
#[test]
fn discounting_invariants_hold() {
    let mut input = base_input("discount", 50, 120);
    input.run_specs.discount_annual = 0.03;
    input.cohort.initial_hiv_state = [0.0, 0.0, 1.0, 0.0];
    input.nat_hist.background_mortality = vec![[0.001, 0.001]];
    input.nat_hist.hiv_death_rate_ratio = [2.0; 6];
    input.cost.routine_out_of_care = [10.0; 6];
    let sim = SimContext::from_input(input);
    let output = run_cohort(&sim).unwrap();
    // Discounted life months never exceed undiscounted survival.
    assert!(output.stats.total_lms <= output.stats.survival.sum + 1e-9);
    // QALMs never exceed discounted life months.
    assert!(output.stats.total_qalms <= output.stats.total_lms + 1e-9);
    assert!(output.stats.total_costs > 0.0);
}

/// Incident infections seed acute HIV and later resolve to chronic.
#[test]
fn incident_infection_lifecycle() {
    let mut input = base_input("incidence", 1, 12);
    input.cohort.incidence = vec![IncidenceBin {
        max_age_months: 100_000,
        prob: [[1.0; 3]; 2],
    }];
    input.cohort.acute_duration_months = 2;
    input.cohort.male_fraction = 1.0;
    let sim = SimContext::from_input(input);
    let patient = drive_patient(&sim, 6);
    assert_eq!(patient.disease().hiv_state, HivState::AsymptomaticChronic);
    assert_eq!(patient.disease().month_of_infection, Some(0));
    assert!(!patient.disease().prevalent_case);
}
