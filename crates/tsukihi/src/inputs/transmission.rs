//! Dynamic-transmission inputs: community viral-load transmission rates
//! and the warmup configuration.

use serde::{Deserialize, Serialize};
use tsukihi_core::strata::{Cd4Strata, HvlStrata};

/// One calendar segment of the transmission-rate multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransmissionPeriod {
    pub start_month: u32,
    pub multiplier: f64,
}

/// Dynamic-transmission inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionInputs {
    pub enable: bool,
    /// Patients simulated in the warmup cohort.
    pub warmup_cohort_size: u64,
    /// Months the warmup runs before freezing.
    pub warmup_months: u32,
    /// Monthly transmission rate per (CD4 stratum, HVL stratum) of an
    /// infected person.
    pub rate: [[f64; HvlStrata::COUNT]; Cd4Strata::COUNT],
    /// Override rate applied while in the acute syndrome.
    pub acute_rate: f64,
    /// Piecewise calendar multipliers on the transmission rate.
    pub periods: Vec<TransmissionPeriod>,
    /// Share of transmissions attributable to the modeled high-risk
    /// group, used for the self-transmission multiplier.
    pub attributable_fraction: f64,
}

impl Default for TransmissionInputs {
    fn default() -> Self {
        Self {
            enable: false,
            warmup_cohort_size: 0,
            warmup_months: 0,
            rate: [[0.0; HvlStrata::COUNT]; Cd4Strata::COUNT],
            acute_rate: 0.0,
            periods: Vec::new(),
            attributable_fraction: 1.0,
        }
    }
}

impl TransmissionInputs {
    /// Transmission rate contributed by one infected person.
    pub fn rate_for(&self, acute: bool, cd4: Cd4Strata, hvl: HvlStrata) -> f64 {
        if acute {
            self.acute_rate
        } else {
            self.rate[cd4.index()][hvl.index()]
        }
    }

    /// Calendar multiplier for a month.
    pub fn period_multiplier(&self, month: u32) -> f64 {
        let mut mult = 1.0;
        for p in &self.periods {
            if month >= p.start_month {
                mult = p.multiplier;
            }
        }
        mult
    }
}
