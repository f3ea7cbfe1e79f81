//! Run-level specification: cohort size, seeding, discounting, tracing.

use serde::{Deserialize, Serialize};

use crate::rng::SeedMode;

/// Hard input-format version; a mismatch aborts the run.
pub const INPUT_VERSION: &str = "tsukihi-1";

/// Seed policy as written in input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedPolicy {
    /// Seed once from wall-clock entropy.
    Time,
    /// Seed each patient from its id.
    Fixed,
}

impl Default for SeedPolicy {
    fn default() -> Self {
        SeedPolicy::Fixed
    }
}

impl SeedPolicy {
    pub fn to_mode(self) -> SeedMode {
        match self {
            SeedPolicy::Time => SeedMode::Time,
            SeedPolicy::Fixed => SeedMode::Fixed,
        }
    }
}

/// Top-of-file run specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSpecsInputs {
    /// Name of the run set this run belongs to (groups popstats rows).
    pub run_set_name: String,
    /// Name of this run; also names the output files.
    pub run_name: String,
    /// Number of patients simulated.
    pub num_cohorts: u64,
    /// Hard cap on simulated months per patient.
    pub max_patient_months: u32,
    /// Seed policy.
    pub seed_policy: SeedPolicy,
    /// Primary annual discount rate applied to costs and benefits.
    pub discount_annual: f64,
    /// Alternative (cost, benefit) annual rate pairs tracked in parallel.
    pub alt_discount_rates: Vec<(f64, f64)>,
    /// Number of leading patients written to the trace file.
    pub trace_count: u64,
    /// Run patients across threads; stats merge at the end.
    pub parallel: bool,
    /// Emit the per-month longitudinal section in the stats file.
    pub longitudinal_output: bool,
}

impl Default for RunSpecsInputs {
    fn default() -> Self {
        Self {
            run_set_name: String::new(),
            run_name: String::new(),
            num_cohorts: 1_000,
            max_patient_months: 1_200,
            seed_policy: SeedPolicy::Fixed,
            discount_annual: 0.03,
            alt_discount_rates: Vec::new(),
            trace_count: 0,
            parallel: false,
            longitudinal_output: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let specs = RunSpecsInputs::default();
        assert_eq!(specs.seed_policy, SeedPolicy::Fixed);
        assert!(specs.alt_discount_rates.is_empty());
        assert_eq!(specs.max_patient_months, 1_200);
    }

    #[test]
    fn test_seed_policy_maps_to_mode() {
        assert_eq!(SeedPolicy::Fixed.to_mode(), SeedMode::Fixed);
        assert_eq!(SeedPolicy::Time.to_mode(), SeedMode::Time);
    }
}
