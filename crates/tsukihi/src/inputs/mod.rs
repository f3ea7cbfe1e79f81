//! Run inputs: the immutable simulation context.
//!
//! A [`SimContext`] owns every parameter table for a run, grouped by
//! subsystem. It is read-only during simulation and may be shared
//! across patient threads.

pub mod art;
pub mod chrms;
pub mod cohort;
pub mod cost;
pub mod heterogeneity;
pub mod loader;
pub mod ltfu;
pub mod nat_hist;
pub mod peds;
pub mod proph;
pub mod run_specs;
pub mod tb;
pub mod testing;
pub mod transmission;
pub mod treatment;

use serde::{Deserialize, Serialize};
use tsukihi_core::discount::{DiscountFactor, MultiDiscount};

pub use art::ArtInputs;
pub use chrms::ChrmsInputs;
pub use cohort::CohortInputs;
pub use cost::CostInputs;
pub use heterogeneity::HeterogeneityInputs;
pub use ltfu::LtfuInputs;
pub use nat_hist::NatHistInputs;
pub use peds::PedsInputs;
pub use proph::ProphInputs;
pub use run_specs::{RunSpecsInputs, INPUT_VERSION};
pub use tb::TbInputs;
pub use testing::TestingInputs;
pub use transmission::TransmissionInputs;
pub use treatment::TreatmentInputs;

/// The on-disk input file: a version gate plus the subsystem groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFile {
    pub input_version: String,
    pub run_specs: RunSpecsInputs,
    pub cohort: CohortInputs,
    pub nat_hist: NatHistInputs,
    pub chrms: ChrmsInputs,
    pub art: ArtInputs,
    pub treatment: TreatmentInputs,
    pub proph: ProphInputs,
    pub testing: TestingInputs,
    pub ltfu: LtfuInputs,
    pub heterogeneity: HeterogeneityInputs,
    pub tb: TbInputs,
    pub peds: PedsInputs,
    pub cost: CostInputs,
    pub transmission: TransmissionInputs,
}

/// All parameters for one run, plus the derived discount factors.
///
/// Lifetime is the run; updaters receive it by shared reference.
#[derive(Debug, Clone)]
pub struct SimContext {
    pub run_specs: RunSpecsInputs,
    pub cohort: CohortInputs,
    pub nat_hist: NatHistInputs,
    pub chrms: ChrmsInputs,
    pub art: ArtInputs,
    pub treatment: TreatmentInputs,
    pub proph: ProphInputs,
    pub testing: TestingInputs,
    pub ltfu: LtfuInputs,
    pub heterogeneity: HeterogeneityInputs,
    pub tb: TbInputs,
    pub peds: PedsInputs,
    pub cost: CostInputs,
    pub transmission: TransmissionInputs,
    /// Primary monthly discount factor derived from the run specs.
    pub discount: DiscountFactor,
    /// Alternative-rate factors, parallel cost/benefit streams.
    pub multi_discount: MultiDiscount,
}

impl SimContext {
    /// Build a context from a parsed input file.
    pub fn from_input(input: InputFile) -> Self {
        let discount = DiscountFactor::from_annual_rate(input.run_specs.discount_annual);
        let multi_discount = MultiDiscount::from_annual_rates(&input.run_specs.alt_discount_rates);
        Self {
            run_specs: input.run_specs,
            cohort: input.cohort,
            nat_hist: input.nat_hist,
            chrms: input.chrms,
            art: input.art,
            treatment: input.treatment,
            proph: input.proph,
            testing: input.testing,
            ltfu: input.ltfu,
            heterogeneity: input.heterogeneity,
            tb: input.tb,
            peds: input.peds,
            cost: input.cost,
            transmission: input.transmission,
            discount,
            multi_discount,
        }
    }

    /// Number of configured OI types.
    pub fn oi_count(&self) -> usize {
        self.nat_hist.oi_count()
    }

    /// Number of configured chronic conditions.
    pub fn chrm_count(&self) -> usize {
        self.chrms.chrm_count()
    }

    /// Number of configured ART lines.
    pub fn art_line_count(&self) -> usize {
        self.art.line_count()
    }

    /// Number of entry risk factors.
    pub fn risk_factor_count(&self) -> usize {
        self.cohort.risk_factors.len()
    }
}

impl Default for SimContext {
    fn default() -> Self {
        Self::from_input(InputFile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_derives_discount() {
        let mut input = InputFile::default();
        input.run_specs.discount_annual = 0.03;
        let ctx = SimContext::from_input(input);
        assert!((ctx.discount.monthly_factor().powi(12) - 1.03).abs() < 1e-12);
    }

    #[test]
    fn test_default_context_is_empty_cohort() {
        let ctx = SimContext::default();
        assert_eq!(ctx.oi_count(), 0);
        assert_eq!(ctx.art_line_count(), 0);
        assert!(!ctx.tb.enable);
    }
}
