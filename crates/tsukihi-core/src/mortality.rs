//! Composition of competing monthly mortality risks.
//!
//! During a month every subsystem may append a risk: a cause, a death
//! rate ratio relative to background mortality, and an optional cost
//! booked if that cause ends up selected. At the mortality step the
//! risks are composed by converting each `ratio x base-rate` product to
//! a rate, summing the rates, and converting the sum back to a
//! probability. If death occurs, the cause is selected in proportion to
//! each risk's rate contribution.
//!
//! Background mortality that no risk has scaled is rolled separately at
//! the end of the month, so a month with an empty risk list still
//! carries the plain background probability.

use serde::{Deserialize, Serialize};

use crate::prob::rate_to_prob;

/// A single mortality risk accumulated within one month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MortalityRisk<C> {
    /// Cause recorded if this risk is selected at death.
    pub cause: C,
    /// Death rate ratio applied to the background mortality rate.
    pub death_rate_ratio: f64,
    /// Cost booked when death is attributed to this risk.
    pub cost: Option<f64>,
}

impl<C> MortalityRisk<C> {
    /// Build a risk without an attached death cost.
    pub fn new(cause: C, death_rate_ratio: f64) -> Self {
        Self {
            cause,
            death_rate_ratio,
            cost: None,
        }
    }

    /// Build a risk with a cost booked on death.
    pub fn with_cost(cause: C, death_rate_ratio: f64, cost: f64) -> Self {
        Self {
            cause,
            death_rate_ratio,
            cost: Some(cost),
        }
    }
}

/// The composed monthly death hazard for one patient-month.
///
/// # Examples
///
/// ```
/// use tsukihi_core::mortality::{MortalityRisk, RiskComposition};
///
/// let risks = vec![MortalityRisk::new("hiv", 2.0)];
/// let comp = RiskComposition::compose(0.001, &risks);
/// let expected = 1.0 - (-0.002f64).exp();
/// assert!((comp.death_probability() - expected).abs() < 1e-12);
/// assert_eq!(comp.select_cause(0.5).unwrap().0, "hiv");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RiskComposition<C> {
    contributions: Vec<(C, f64, Option<f64>)>,
    total_rate: f64,
}

impl<C: Copy> RiskComposition<C> {
    /// Compose the month's risks against the background rate.
    pub fn compose(base_rate: f64, risks: &[MortalityRisk<C>]) -> Self {
        let mut contributions = Vec::with_capacity(risks.len());
        let mut total_rate = 0.0;
        for risk in risks {
            let rate = base_rate * risk.death_rate_ratio;
            if rate > 0.0 {
                total_rate += rate;
                contributions.push((risk.cause, rate, risk.cost));
            }
        }
        Self {
            contributions,
            total_rate,
        }
    }

    /// True if no risk contributed a positive rate.
    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    /// Combined monthly death probability, `1 - exp(-sum of rates)`.
    pub fn death_probability(&self) -> f64 {
        rate_to_prob(self.total_rate)
    }

    /// Select the recorded cause given a uniform draw in `[0, 1)`.
    ///
    /// Walks the contributions in insertion order and returns the first
    /// whose cumulative rate share exceeds the draw, together with its
    /// death cost. Returns `None` on an empty composition.
    pub fn select_cause(&self, uniform: f64) -> Option<(C, Option<f64>)> {
        if self.contributions.is_empty() {
            return None;
        }
        let target = uniform * self.total_rate;
        let mut cumulative = 0.0;
        for (cause, rate, cost) in &self.contributions {
            cumulative += rate;
            if target < cumulative {
                return Some((*cause, *cost));
            }
        }
        // Floating-point slack on the final bucket.
        let (cause, _, cost) = self.contributions.last().unwrap();
        Some((*cause, *cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prob::prob_to_rate;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Cause {
        Hiv,
        OiSevere,
        Toxicity,
    }

    #[test]
    fn test_empty_composition() {
        let comp: RiskComposition<Cause> = RiskComposition::compose(0.01, &[]);
        assert!(comp.is_empty());
        assert_eq!(comp.death_probability(), 0.0);
        assert!(comp.select_cause(0.3).is_none());
    }

    #[test]
    fn test_single_risk_probability() {
        let risks = vec![MortalityRisk::new(Cause::Hiv, 2.0)];
        let comp = RiskComposition::compose(0.005, &risks);
        assert!((comp.death_probability() - rate_to_prob(0.01)).abs() < 1e-12);
    }

    #[test]
    fn test_rates_sum_across_risks() {
        let risks = vec![
            MortalityRisk::new(Cause::Hiv, 2.0),
            MortalityRisk::new(Cause::OiSevere, 5.0),
        ];
        let comp = RiskComposition::compose(0.001, &risks);
        let expected_rate = 0.001 * 2.0 + 0.001 * 5.0;
        assert!((prob_to_rate(comp.death_probability()) - expected_rate).abs() < 1e-12);
    }

    #[test]
    fn test_cause_selection_proportional() {
        let risks = vec![
            MortalityRisk::new(Cause::Hiv, 1.0),
            MortalityRisk::new(Cause::OiSevere, 3.0),
        ];
        let comp = RiskComposition::compose(0.01, &risks);
        // HIV owns the first quarter of the rate mass.
        assert_eq!(comp.select_cause(0.0).unwrap().0, Cause::Hiv);
        assert_eq!(comp.select_cause(0.24).unwrap().0, Cause::Hiv);
        assert_eq!(comp.select_cause(0.26).unwrap().0, Cause::OiSevere);
        assert_eq!(comp.select_cause(0.999).unwrap().0, Cause::OiSevere);
    }

    #[test]
    fn test_death_cost_travels_with_cause() {
        let risks = vec![MortalityRisk::with_cost(Cause::Toxicity, 4.0, 150.0)];
        let comp = RiskComposition::compose(0.002, &risks);
        assert_eq!(comp.select_cause(0.9).unwrap().1, Some(150.0));
    }

    #[test]
    fn test_zero_ratio_risks_are_skipped() {
        let risks = vec![
            MortalityRisk::new(Cause::Hiv, 0.0),
            MortalityRisk::new(Cause::OiSevere, 1.0),
        ];
        let comp = RiskComposition::compose(0.01, &risks);
        assert_eq!(comp.select_cause(0.0).unwrap().0, Cause::OiSevere);
    }
}
