//! The patient aggregate and the monthly update pipeline.

use crate::inputs::SimContext;
use crate::rng::SimRng;
use crate::stats::{CostStats, RunStats};
use crate::trace::Tracer;
use crate::updaters::{self, UpdaterCtx};

use super::{
    ArtState, DiseaseState, GeneralState, MonitoringState, PedsState, ProphState, TbPatientState,
};

/// One simulated patient.
///
/// Owns the eight state groups and a private random stream. The state is
/// readable through the accessor methods; mutation happens inside the
/// updater pipeline, which runs in a fixed order every month.
pub struct Patient {
    pub(crate) general: GeneralState,
    pub(crate) peds: PedsState,
    pub(crate) disease: DiseaseState,
    pub(crate) monitoring: MonitoringState,
    pub(crate) proph: ProphState,
    pub(crate) art: ArtState,
    pub(crate) tb: TbPatientState,
    pub(crate) rng: SimRng,
    /// Effective HIV incidence injected by the dynamic-transmission
    /// model for the current month, replacing the table lookup.
    pub(crate) effective_incidence: Option<f64>,
}

impl Patient {
    /// Create a patient with state sized to the run's configuration.
    pub fn new(patient_id: u64, sim: &SimContext, rng: SimRng) -> Self {
        let oi_count = sim.oi_count();
        let alt_rates = sim.multi_discount.len();
        let mut general = GeneralState::new(patient_id, sim.risk_factor_count(), alt_rates);
        general.tracing_enabled = patient_id < sim.run_specs.trace_count;
        Self {
            general,
            peds: PedsState::new(sim.peds.eid.infant_prophs.len()),
            disease: DiseaseState::new(oi_count, sim.chrm_count()),
            monitoring: MonitoringState::new(oi_count),
            proph: ProphState::new(oi_count),
            art: ArtState::new(sim.art_line_count(), oi_count),
            tb: TbPatientState::new(sim.tb.proph.lines.len()),
            rng,
            effective_incidence: None,
        }
    }

    /// Read access to the state groups.
    pub fn general(&self) -> &GeneralState {
        &self.general
    }

    pub fn peds(&self) -> &PedsState {
        &self.peds
    }

    pub fn disease(&self) -> &DiseaseState {
        &self.disease
    }

    pub fn monitoring(&self) -> &MonitoringState {
        &self.monitoring
    }

    pub fn proph(&self) -> &ProphState {
        &self.proph
    }

    pub fn art(&self) -> &ArtState {
        &self.art
    }

    pub fn tb(&self) -> &TbPatientState {
        &self.tb
    }

    /// True if the patient is alive.
    pub fn is_alive(&self) -> bool {
        self.disease.alive
    }

    /// Inject the dynamic-transmission effective incidence for the
    /// coming month; `None` restores the table lookup.
    pub fn set_effective_incidence(&mut self, incidence: Option<f64>) {
        self.effective_incidence = incidence;
    }

    /// Run every updater's one-shot initializer, in pipeline order.
    pub fn perform_initial_updates(
        &mut self,
        sim: &SimContext,
        stats: &mut RunStats,
        costs: &mut CostStats,
        tracer: &mut Tracer,
    ) {
        let mut ctx = UpdaterCtx::new(self, sim, stats, costs, tracer);
        updaters::begin_month::initial(&mut ctx);
        updaters::hiv_infection::initial(&mut ctx);
        updaters::chrms::initial(&mut ctx);
        updaters::drug_toxicity::initial(&mut ctx);
        updaters::tb_disease::initial(&mut ctx);
        updaters::acute_oi::initial(&mut ctx);
        updaters::mortality::initial(&mut ctx);
        updaters::cd4_hvl::initial(&mut ctx);
        updaters::hiv_testing::initial(&mut ctx);
        updaters::behavior::initial(&mut ctx);
        updaters::drug_efficacy::initial(&mut ctx);
        updaters::lab_tests::initial(&mut ctx);
        updaters::clinic_visit::initial(&mut ctx);
        updaters::tb_clinical::initial(&mut ctx);
        updaters::end_month::initial(&mut ctx);
    }

    /// Run one simulated month.
    ///
    /// The fifteen updaters run in their fixed order; after the
    /// mortality step a dead patient short-circuits the rest of the
    /// pipeline. Calling this on a dead patient is a no-op.
    pub fn simulate_month(
        &mut self,
        sim: &SimContext,
        stats: &mut RunStats,
        costs: &mut CostStats,
        tracer: &mut Tracer,
    ) {
        if !self.is_alive() {
            return;
        }
        let mut ctx = UpdaterCtx::new(self, sim, stats, costs, tracer);
        updaters::begin_month::monthly(&mut ctx);
        updaters::hiv_infection::monthly(&mut ctx);
        updaters::chrms::monthly(&mut ctx);
        updaters::drug_toxicity::monthly(&mut ctx);
        updaters::tb_disease::monthly(&mut ctx);
        updaters::acute_oi::monthly(&mut ctx);
        updaters::mortality::monthly(&mut ctx);
        if !ctx.patient_alive() {
            return;
        }
        updaters::cd4_hvl::monthly(&mut ctx);
        updaters::hiv_testing::monthly(&mut ctx);
        updaters::behavior::monthly(&mut ctx);
        updaters::drug_efficacy::monthly(&mut ctx);
        updaters::lab_tests::monthly(&mut ctx);
        updaters::clinic_visit::monthly(&mut ctx);
        updaters::tb_clinical::monthly(&mut ctx);
        updaters::end_month::monthly(&mut ctx);
    }
}
