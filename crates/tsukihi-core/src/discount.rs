//! Monthly discounting of costs and benefits.
//!
//! A run discounts at a primary annual rate and, optionally, at up to
//! [`MAX_ALT_RATES`] alternative rate pairs that are accumulated in
//! parallel, independently for costs and for benefits.

use serde::{Deserialize, Serialize};

/// Maximum number of alternative discount-rate pairs tracked per run.
pub const MAX_ALT_RATES: usize = 4;

/// A monthly discount factor derived from an annual rate.
///
/// Costs and life months accrued in month `m` since simulation start are
/// divided by `factor^m` before being added to a discounted total.
///
/// # Examples
///
/// ```
/// use tsukihi_core::discount::DiscountFactor;
///
/// let d = DiscountFactor::from_annual_rate(0.03);
/// // A zero rate leaves values untouched.
/// let none = DiscountFactor::from_annual_rate(0.0);
/// assert_eq!(none.discounted(100.0, 24), 100.0);
/// // A positive rate shrinks later values more.
/// assert!(d.discounted(100.0, 24) < d.discounted(100.0, 12));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountFactor {
    factor: f64,
}

impl DiscountFactor {
    /// Build the monthly factor `(1 + annual)^(1/12)`.
    pub fn from_annual_rate(annual: f64) -> Self {
        Self {
            factor: (1.0 + annual).powf(1.0 / 12.0),
        }
    }

    /// The raw monthly factor.
    pub fn monthly_factor(&self) -> f64 {
        self.factor
    }

    /// Discount `amount` accrued `months_since_start` months into the run.
    pub fn discounted(&self, amount: f64, months_since_start: u32) -> f64 {
        amount / self.factor.powi(months_since_start as i32)
    }

    /// True if this factor leaves values unchanged.
    pub fn is_unity(&self) -> bool {
        self.factor == 1.0
    }
}

impl Default for DiscountFactor {
    fn default() -> Self {
        Self::from_annual_rate(0.0)
    }
}

/// Parallel cost/benefit discount factors for the alternative rates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiDiscount {
    /// Factor applied to costs, one per configured alternative rate.
    pub cost: Vec<DiscountFactor>,
    /// Factor applied to benefits (life months, QALMs), parallel to `cost`.
    pub benefit: Vec<DiscountFactor>,
}

impl MultiDiscount {
    /// Build from paired annual rates, truncating past [`MAX_ALT_RATES`].
    pub fn from_annual_rates(rates: &[(f64, f64)]) -> Self {
        let rates = &rates[..rates.len().min(MAX_ALT_RATES)];
        Self {
            cost: rates
                .iter()
                .map(|(c, _)| DiscountFactor::from_annual_rate(*c))
                .collect(),
            benefit: rates
                .iter()
                .map(|(_, b)| DiscountFactor::from_annual_rate(*b))
                .collect(),
        }
    }

    /// Number of configured alternative rates.
    pub fn len(&self) -> usize {
        self.cost.len()
    }

    /// True if no alternative rates are configured.
    pub fn is_empty(&self) -> bool {
        self.cost.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_is_identity() {
        let d = DiscountFactor::from_annual_rate(0.0);
        assert!(d.is_unity());
        assert_eq!(d.discounted(250.0, 120), 250.0);
    }

    #[test]
    fn test_annual_factor_compounds_to_rate() {
        let d = DiscountFactor::from_annual_rate(0.03);
        let yearly = d.monthly_factor().powi(12);
        assert!((yearly - 1.03).abs() < 1e-12);
    }

    #[test]
    fn test_discounted_never_exceeds_undiscounted() {
        let d = DiscountFactor::from_annual_rate(0.05);
        for m in 0..240 {
            assert!(d.discounted(1.0, m) <= 1.0);
        }
    }

    #[test]
    fn test_discounted_month_zero_is_undiscounted() {
        let d = DiscountFactor::from_annual_rate(0.05);
        assert_eq!(d.discounted(42.0, 0), 42.0);
    }

    #[test]
    fn test_multi_discount_truncates() {
        let rates = vec![(0.0, 0.0); MAX_ALT_RATES + 3];
        let multi = MultiDiscount::from_annual_rates(&rates);
        assert_eq!(multi.len(), MAX_ALT_RATES);
    }

    #[test]
    fn test_multi_discount_separates_cost_and_benefit() {
        let multi = MultiDiscount::from_annual_rates(&[(0.03, 0.05)]);
        assert!(multi.cost[0].monthly_factor() < multi.benefit[0].monthly_factor());
    }
}
