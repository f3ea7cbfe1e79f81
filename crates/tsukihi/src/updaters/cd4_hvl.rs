//! Step 8: true CD4 (or CD4-percentage) and HVL evolution.

use tsukihi_core::sampling::clamp_range;

use crate::types::{ArtEfficacy, HivState, PedsAgeCat};

use super::UpdaterCtx;

pub(crate) fn initial(ctx: &mut UpdaterCtx) {
    // The between-subject CD4 decline increment is drawn once per patient.
    let sd = ctx.sim.nat_hist.cd4_decline_between_subject_sd;
    if sd > 0.0 {
        ctx.patient.disease.cd4_decline_increment = ctx.patient.rng.gaussian(0.0, sd);
    }
}

pub(crate) fn monthly(ctx: &mut UpdaterCtx) {
    if ctx.patient.disease.hiv_state == HivState::Negative {
        return;
    }
    evolve_hvl(ctx);
    if ctx.sim.peds.enable && ctx.patient.peds.age_category == PedsAgeCat::EarlyChildhood {
        evolve_cd4_percentage(ctx);
    } else {
        evolve_cd4_absolute(ctx);
    }
    ctx.patient.disease.track_cd4_minimum();
}

/// HVL steps one stratum per month toward its target.
fn evolve_hvl(ctx: &mut UpdaterCtx) {
    let disease = &ctx.patient.disease;
    if disease.hvl == disease.target_hvl {
        return;
    }
    if !ctx.patient.rng.event(ctx.sim.nat_hist.hvl_drift_prob) {
        return;
    }
    let disease = &mut ctx.patient.disease;
    disease.hvl = if disease.hvl < disease.target_hvl {
        disease.hvl.step_up()
    } else {
        disease.hvl.step_down()
    };
}

/// Monthly off-ART CD4 decline, keyed by (CD4 stratum, HVL stratum).
fn draw_natural_decline(ctx: &mut UpdaterCtx) -> f64 {
    let cd4 = ctx.patient.disease.cd4_strata().index();
    let hvl = ctx.patient.disease.hvl.index();
    let params = ctx.sim.nat_hist.cd4_decline[cd4][hvl];
    let mean = params.mean + ctx.patient.disease.cd4_decline_increment;
    ctx.patient.rng.gaussian(mean, params.std_dev)
}

fn evolve_cd4_absolute(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let art = &ctx.patient.art;
    let delta = if art.on_art && art.efficacy == ArtEfficacy::Success {
        art.cd4_slope
    } else if art.on_art {
        let line = &ctx.sim.art.lines[art.curr_line];
        let months_failed = art.months_since_efficacy_change(month);
        let mult = line.fail_multiplier(months_failed);
        -draw_natural_decline(ctx) * mult
    } else {
        -draw_natural_decline(ctx)
    };
    let disease = &mut ctx.patient.disease;
    disease.true_cd4 = clamp_range(disease.true_cd4 + delta, 0.0, ctx.sim.cohort.max_cd4);
    apply_envelopes(ctx);
}

/// Early childhood uses the CD4-percentage metric with the same regime
/// structure.
fn evolve_cd4_percentage(ctx: &mut UpdaterCtx) {
    let month = ctx.month();
    let art = &ctx.patient.art;
    let delta = if art.on_art && art.efficacy == ArtEfficacy::Success {
        art.cd4_percentage_slope
    } else {
        let params = ctx.sim.nat_hist.cd4_percentage_decline;
        let mut decline = ctx.patient.rng.gaussian(params.mean, params.std_dev);
        if art.on_art {
            let line = &ctx.sim.art.lines[art.curr_line];
            decline *= line.fail_multiplier(art.months_since_efficacy_change(month));
        }
        -decline
    };
    let disease = &mut ctx.patient.disease;
    disease.true_cd4_percentage = clamp_range(disease.true_cd4_percentage + delta, 0.0, 100.0);

    let art = &mut ctx.patient.art;
    art.overall_percentage_envelope.grow();
    art.indiv_percentage_envelope.grow();
    if art.overall_percentage_envelope.active {
        disease.true_cd4_percentage = disease
            .true_cd4_percentage
            .min(art.overall_percentage_envelope.value);
    }
    if art.indiv_percentage_envelope.active && art.on_art {
        disease.true_cd4_percentage = disease
            .true_cd4_percentage
            .min(art.indiv_percentage_envelope.value);
    }
}

/// Grow the active envelopes and cap CD4 at their bound.
fn apply_envelopes(ctx: &mut UpdaterCtx) {
    let art = &mut ctx.patient.art;
    let disease = &mut ctx.patient.disease;
    art.overall_envelope.grow();
    art.indiv_envelope.grow();
    if art.overall_envelope.active {
        disease.true_cd4 = disease.true_cd4.min(art.overall_envelope.value);
    }
    if art.indiv_envelope.active && art.on_art && art.curr_line == art.indiv_envelope.line {
        disease.true_cd4 = disease.true_cd4.min(art.indiv_envelope.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::art::ArtLineInputs;
    use crate::inputs::nat_hist::NormalParams;
    use crate::inputs::{InputFile, SimContext};
    use crate::rng::SimRng;
    use crate::state::Patient;
    use crate::stats::{CostStats, RunStats};
    use crate::trace::Tracer;
    use tsukihi_core::strata::HvlStrata;

    fn step(sim: &SimContext, patient: &mut Patient) {
        let mut stats = RunStats::new(sim);
        let mut costs = CostStats::new(sim);
        let mut tracer = Tracer::disabled();
        let mut ctx = UpdaterCtx::new(patient, sim, &mut stats, &mut costs, &mut tracer);
        monthly(&mut ctx);
    }

    fn infected(sim: &SimContext, cd4: f64) -> Patient {
        let mut p = Patient::new(0, sim, SimRng::new(0));
        p.disease.hiv_state = HivState::AsymptomaticChronic;
        p.disease.true_cd4 = cd4;
        p
    }

    #[test]
    fn test_off_art_decline() {
        let mut input = InputFile::default();
        for row in input.nat_hist.cd4_decline.iter_mut() {
            for cell in row.iter_mut() {
                *cell = NormalParams::new(5.0, 0.0);
            }
        }
        let sim = SimContext::from_input(input);
        let mut patient = infected(&sim, 300.0);
        step(&sim, &mut patient);
        assert_eq!(patient.disease.true_cd4, 295.0);
        assert_eq!(patient.disease.min_true_cd4, 295.0);
    }

    #[test]
    fn test_on_art_success_climbs_slope() {
        let mut input = InputFile::default();
        input.art.lines = vec![ArtLineInputs::default()];
        let sim = SimContext::from_input(input);
        let mut patient = infected(&sim, 300.0);
        patient.art.on_art = true;
        patient.art.curr_line = 0;
        patient.art.efficacy = ArtEfficacy::Success;
        patient.art.cd4_slope = 8.0;
        step(&sim, &mut patient);
        assert_eq!(patient.disease.true_cd4, 308.0);
    }

    #[test]
    fn test_failed_art_uses_fail_multiplier() {
        let mut input = InputFile::default();
        for row in input.nat_hist.cd4_decline.iter_mut() {
            for cell in row.iter_mut() {
                *cell = NormalParams::new(10.0, 0.0);
            }
        }
        input.art.lines = vec![ArtLineInputs {
            cd4_multiplier_fail_early: 0.5,
            cd4_multiplier_fail_late: 0.5,
            ..Default::default()
        }];
        let sim = SimContext::from_input(input);
        let mut patient = infected(&sim, 300.0);
        patient.art.on_art = true;
        patient.art.curr_line = 0;
        patient.art.efficacy = ArtEfficacy::Failure;
        step(&sim, &mut patient);
        assert_eq!(patient.disease.true_cd4, 295.0);
    }

    #[test]
    fn test_envelope_caps_cd4() {
        let mut input = InputFile::default();
        input.art.lines = vec![ArtLineInputs::default()];
        let sim = SimContext::from_input(input);
        let mut patient = infected(&sim, 300.0);
        patient.art.on_art = true;
        patient.art.curr_line = 0;
        patient.art.efficacy = ArtEfficacy::Success;
        patient.art.cd4_slope = 50.0;
        patient.art.overall_envelope.activate(0, 0, 310.0, 0.0);
        step(&sim, &mut patient);
        // 300 + 50 would exceed the envelope bound of 310.
        assert_eq!(patient.disease.true_cd4, 310.0);
    }

    #[test]
    fn test_hvl_drifts_toward_target() {
        let mut input = InputFile::default();
        input.nat_hist.hvl_drift_prob = 1.0;
        let sim = SimContext::from_input(input);
        let mut patient = infected(&sim, 300.0);
        patient.disease.hvl = HvlStrata::VeryLow;
        patient.disease.target_hvl = HvlStrata::Medium;
        step(&sim, &mut patient);
        assert_eq!(patient.disease.hvl, HvlStrata::Low);
        step(&sim, &mut patient);
        step(&sim, &mut patient);
        assert_eq!(patient.disease.hvl, HvlStrata::Medium);
        step(&sim, &mut patient);
        assert_eq!(patient.disease.hvl, HvlStrata::Medium);
    }

    #[test]
    fn test_negative_patient_untouched() {
        let sim = SimContext::default();
        let mut patient = Patient::new(0, &sim, SimRng::new(0));
        patient.disease.true_cd4 = 0.0;
        step(&sim, &mut patient);
        assert_eq!(patient.disease.true_cd4, 0.0);
    }
}
