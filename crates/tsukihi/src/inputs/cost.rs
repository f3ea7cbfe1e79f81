//! Costs and quality-of-life inputs.

use serde::{Deserialize, Serialize};
use tsukihi_core::strata::Cd4Strata;

use crate::types::Gender;

/// Cost-of-death class resolved from the recorded cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeathCostClass {
    Background,
    Hiv,
    Oi,
    Chrm,
    Toxicity,
    Tb,
}

impl DeathCostClass {
    pub const COUNT: usize = 6;

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// One age band of a banded table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeBand {
    /// Upper age bound (exclusive), in years.
    pub max_age_years: u32,
    pub value: f64,
}

/// Banded lookup helper. The last band covers all older ages.
pub fn banded_value(bands: &[AgeBand], age_months: u32, default: f64) -> f64 {
    let age_years = age_months / 12;
    for band in bands {
        if age_years < band.max_age_years {
            return band.value;
        }
    }
    bands.last().map(|b| b.value).unwrap_or(default)
}

/// Cost and QOL inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostInputs {
    /// Monthly routine care cost by CD4 stratum while engaged in care.
    pub routine_in_care: [f64; Cd4Strata::COUNT],
    /// Monthly routine cost by CD4 stratum while HIV+ out of care.
    pub routine_out_of_care: [f64; Cd4Strata::COUNT],
    /// Monthly general-medicine cost for HIV-negative patients.
    pub routine_hiv_negative: f64,
    /// Age multiplier bands applied to routine costs.
    pub routine_age_multiplier: Vec<AgeBand>,
    /// Clinic visit and lab test costs.
    pub clinic_visit_cost: f64,
    pub cd4_test_cost: f64,
    pub hvl_test_cost: f64,
    /// Cost of death by class, for patients on / off ART.
    pub death_cost_on_art: [f64; DeathCostClass::COUNT],
    pub death_cost_off_art: [f64; DeathCostClass::COUNT],
    /// Background QOL by gender over age bands.
    pub background_qol_male: Vec<AgeBand>,
    pub background_qol_female: Vec<AgeBand>,
    /// Multiplicative QOL modifier per CD4 stratum.
    pub qol_cd4_modifier: [f64; Cd4Strata::COUNT],
    /// QOL modifier applied in the month of death.
    pub qol_death_month_modifier: f64,
}

impl Default for CostInputs {
    fn default() -> Self {
        Self {
            routine_in_care: [0.0; Cd4Strata::COUNT],
            routine_out_of_care: [0.0; Cd4Strata::COUNT],
            routine_hiv_negative: 0.0,
            routine_age_multiplier: Vec::new(),
            clinic_visit_cost: 0.0,
            cd4_test_cost: 0.0,
            hvl_test_cost: 0.0,
            death_cost_on_art: [0.0; DeathCostClass::COUNT],
            death_cost_off_art: [0.0; DeathCostClass::COUNT],
            background_qol_male: Vec::new(),
            background_qol_female: Vec::new(),
            qol_cd4_modifier: [1.0; Cd4Strata::COUNT],
            qol_death_month_modifier: 1.0,
        }
    }
}

impl CostInputs {
    /// Background QOL for an age and gender; 1.0 if unconfigured.
    pub fn background_qol(&self, age_months: u32, gender: Gender) -> f64 {
        let bands = match gender {
            Gender::Male => &self.background_qol_male,
            Gender::Female => &self.background_qol_female,
        };
        banded_value(bands, age_months, 1.0)
    }

    /// Age multiplier on routine costs; 1.0 if unconfigured.
    pub fn routine_multiplier(&self, age_months: u32) -> f64 {
        banded_value(&self.routine_age_multiplier, age_months, 1.0)
    }

    /// Cost of death for a class and ART status.
    pub fn death_cost(&self, class: DeathCostClass, on_art: bool) -> f64 {
        if on_art {
            self.death_cost_on_art[class.index()]
        } else {
            self.death_cost_off_art[class.index()]
        }
    }
}
