//! The cohort runner: iterate patients to death (or the month cap),
//! collect stats, and merge parallel shards.

use rayon::prelude::*;

use crate::error::Result;
use crate::inputs::SimContext;
use crate::rng::{SeedMode, SimRng};
use crate::state::Patient;
use crate::stats::{CostStats, RunStats};
use crate::trace::Tracer;
use crate::transmission::{CommunitySnapshot, TransmissionModel};
use crate::types::HivState;

/// Everything a finished run produces.
pub struct RunOutput {
    pub stats: RunStats,
    pub costs: CostStats,
    pub trace_lines: Vec<String>,
}

/// Run a full cohort for one simulation context.
pub fn run_cohort(sim: &SimContext) -> Result<RunOutput> {
    let seed_mode = sim.run_specs.seed_policy.to_mode();
    let run_seed = match seed_mode {
        SeedMode::Fixed => 0,
        SeedMode::Time => SimRng::from_entropy().seed(),
    };
    if sim.transmission.enable {
        return run_cohort_dynamic(sim, seed_mode, run_seed);
    }
    if sim.run_specs.parallel {
        run_cohort_parallel(sim, seed_mode, run_seed)
    } else {
        run_cohort_sequential(sim, seed_mode, run_seed)
    }
}

/// Simulate one patient from entry to death or the month cap.
fn simulate_patient(
    patient_id: u64,
    sim: &SimContext,
    seed_mode: SeedMode,
    run_seed: u64,
    stats: &mut RunStats,
    costs: &mut CostStats,
    tracer: &mut Tracer,
) {
    let rng = SimRng::for_patient(seed_mode, run_seed, patient_id);
    let mut patient = Patient::new(patient_id, sim, rng);
    patient.perform_initial_updates(sim, stats, costs, tracer);
    let mut months = 0;
    while patient.is_alive() && months < sim.run_specs.max_patient_months {
        patient.simulate_month(sim, stats, costs, tracer);
        months += 1;
    }
    finalize_patient(&patient, stats);
}

fn finalize_patient(patient: &Patient, stats: &mut RunStats) {
    let general = patient.general();
    stats.finalize_patient(
        general.lms_discounted,
        general.qalms_discounted,
        general.costs_discounted,
        general.lms_undiscounted,
        patient.disease().month_of_infection.is_some(),
    );
}

fn run_cohort_sequential(
    sim: &SimContext,
    seed_mode: SeedMode,
    run_seed: u64,
) -> Result<RunOutput> {
    let mut stats = RunStats::new(sim);
    let mut costs = CostStats::new(sim);
    let mut trace_lines = Vec::new();
    for patient_id in 0..sim.run_specs.num_cohorts {
        let mut tracer = if patient_id < sim.run_specs.trace_count {
            Tracer::new()
        } else {
            Tracer::disabled()
        };
        simulate_patient(
            patient_id, sim, seed_mode, run_seed, &mut stats, &mut costs, &mut tracer,
        );
        trace_lines.extend(tracer.take_lines());
    }
    Ok(RunOutput {
        stats,
        costs,
        trace_lines,
    })
}

/// Parallel execution: each patient owns a private RNG stream; the
/// per-shard stats merge at the end, in patient order for the trace.
fn run_cohort_parallel(sim: &SimContext, seed_mode: SeedMode, run_seed: u64) -> Result<RunOutput> {
    let shards: Vec<(RunStats, CostStats, Vec<String>)> = (0..sim.run_specs.num_cohorts)
        .into_par_iter()
        .map(|patient_id| {
            let mut stats = RunStats::new(sim);
            let mut costs = CostStats::new(sim);
            let mut tracer = if patient_id < sim.run_specs.trace_count {
                Tracer::new()
            } else {
                Tracer::disabled()
            };
            simulate_patient(
                patient_id, sim, seed_mode, run_seed, &mut stats, &mut costs, &mut tracer,
            );
            (stats, costs, tracer.take_lines())
        })
        .collect();

    let mut stats = RunStats::new(sim);
    let mut costs = CostStats::new(sim);
    let mut trace_lines = Vec::new();
    for (shard_stats, shard_costs, shard_trace) in &shards {
        stats.merge(shard_stats);
        costs.merge(shard_costs);
        trace_lines.extend(shard_trace.iter().cloned());
    }
    Ok(RunOutput {
        stats,
        costs,
        trace_lines,
    })
}

/// Dynamic transmission: a warmup cohort freezes the incidence series,
/// then the main run advances all patients month-synchronously so each
/// month's effective incidence reflects the living cohort's community
/// viral load.
fn run_cohort_dynamic(sim: &SimContext, seed_mode: SeedMode, run_seed: u64) -> Result<RunOutput> {
    // Warmup: table incidence, separate id space, stats kept only for
    // the frozen series.
    let mut warmup_stats = RunStats::new(sim);
    let mut warmup_costs = CostStats::new(sim);
    let mut warmup_tracer = Tracer::disabled();
    let warmup_size = sim.transmission.warmup_cohort_size.max(1);
    for patient_id in 0..warmup_size {
        let rng = SimRng::for_patient(seed_mode, run_seed ^ 0x5741_524Du64, patient_id);
        let mut patient = Patient::new(patient_id, sim, rng);
        patient.perform_initial_updates(sim, &mut warmup_stats, &mut warmup_costs, &mut warmup_tracer);
        let mut months = 0;
        let cap = sim.transmission.warmup_months.min(sim.run_specs.max_patient_months);
        while patient.is_alive() && months < cap {
            patient.simulate_month(sim, &mut warmup_stats, &mut warmup_costs, &mut warmup_tracer);
            months += 1;
        }
    }
    let model = TransmissionModel::freeze(&sim.transmission, &warmup_stats);

    // Main run, month-synchronous.
    let mut stats = RunStats::new(sim);
    let mut costs = CostStats::new(sim);
    let mut trace_lines = Vec::new();
    let mut patients: Vec<(Patient, Tracer)> = (0..sim.run_specs.num_cohorts)
        .map(|patient_id| {
            let rng = SimRng::for_patient(seed_mode, run_seed, patient_id);
            let mut patient = Patient::new(patient_id, sim, rng);
            let mut tracer = if patient_id < sim.run_specs.trace_count {
                Tracer::new()
            } else {
                Tracer::disabled()
            };
            patient.perform_initial_updates(sim, &mut stats, &mut costs, &mut tracer);
            (patient, tracer)
        })
        .collect();

    for month in 0..sim.run_specs.max_patient_months {
        let mut community = CommunitySnapshot::default();
        for (patient, _) in patients.iter().filter(|(p, _)| p.is_alive()) {
            let disease = patient.disease();
            if disease.hiv_state == HivState::Negative {
                community.num_negative += 1;
            } else {
                community.add_infected(
                    &sim.transmission,
                    disease.hiv_state.is_acute(),
                    disease.cd4_strata(),
                    disease.hvl,
                );
            }
        }
        let incidence = model.effective_incidence(month, &community);
        let mut any_alive = false;
        for (patient, tracer) in patients.iter_mut() {
            if !patient.is_alive() {
                continue;
            }
            any_alive = true;
            patient.set_effective_incidence(Some(incidence));
            patient.simulate_month(sim, &mut stats, &mut costs, tracer);
        }
        if !any_alive {
            break;
        }
    }
    for (patient, tracer) in patients.iter_mut() {
        finalize_patient(patient, &mut stats);
        trace_lines.extend(tracer.take_lines());
    }
    Ok(RunOutput {
        stats,
        costs,
        trace_lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::{InputFile, SimContext};

    fn small_input() -> InputFile {
        let mut input = InputFile::default();
        input.run_specs.run_name = "test".into();
        input.run_specs.num_cohorts = 20;
        input.run_specs.max_patient_months = 24;
        input
    }

    #[test]
    fn test_sequential_run_counts_all_patients() {
        let sim = SimContext::from_input(small_input());
        let output = run_cohort(&sim).unwrap();
        assert_eq!(output.stats.num_patients, 20);
        // No mortality configured: everyone lives out the cap.
        assert_eq!(output.stats.survival.sum, 20.0 * 24.0);
    }

    #[test]
    fn test_fixed_seed_runs_are_identical() {
        let sim = SimContext::from_input(small_input());
        let a = run_cohort(&sim).unwrap();
        let b = run_cohort(&sim).unwrap();
        assert_eq!(
            serde_json::to_string(&a.stats).unwrap(),
            serde_json::to_string(&b.stats).unwrap()
        );
    }

    #[test]
    fn test_parallel_matches_patient_count() {
        let mut input = small_input();
        input.run_specs.parallel = true;
        let sim = SimContext::from_input(input);
        let output = run_cohort(&sim).unwrap();
        assert_eq!(output.stats.num_patients, 20);
    }

    #[test]
    fn test_tracing_covers_leading_patients() {
        let mut input = small_input();
        input.run_specs.trace_count = 2;
        let sim = SimContext::from_input(input);
        let output = run_cohort(&sim).unwrap();
        let headers: Vec<&String> = output
            .trace_lines
            .iter()
            .filter(|l| l.starts_with("PATIENT"))
            .collect();
        assert_eq!(headers.len(), 2);
    }
}
