//! Probability, rate and logit algebra.
//!
//! Monthly event probabilities are combined by converting to rates,
//! scaling, and converting back. Heterogeneity adjustments are combined
//! additively on the logit scale.

/// Convert a monthly probability to the equivalent rate.
///
/// `rate = -ln(1 - prob)`
///
/// # Examples
///
/// ```
/// use tsukihi_core::prob::prob_to_rate;
///
/// assert_eq!(prob_to_rate(0.0), 0.0);
/// assert!((prob_to_rate(0.5) - std::f64::consts::LN_2).abs() < 1e-12);
/// ```
pub fn prob_to_rate(prob: f64) -> f64 {
    -(1.0 - prob).ln()
}

/// Convert a rate to the equivalent monthly probability.
///
/// `prob = 1 - e^(-rate)`
///
/// # Examples
///
/// ```
/// use tsukihi_core::prob::{prob_to_rate, rate_to_prob};
///
/// let p = 0.125;
/// assert!((rate_to_prob(prob_to_rate(p)) - p).abs() < 1e-12);
/// ```
pub fn rate_to_prob(rate: f64) -> f64 {
    1.0 - (-rate).exp()
}

/// Scale a probability by a rate multiplier.
///
/// `p' = 1 - (1 - p)^m`, derived from converting to a rate, multiplying,
/// and converting back. The degenerate multipliers short-circuit so a
/// zero multiplier yields exactly zero and a unit multiplier returns the
/// input unchanged.
///
/// # Examples
///
/// ```
/// use tsukihi_core::prob::prob_rate_multiply;
///
/// assert_eq!(prob_rate_multiply(0.3, 0.0), 0.0);
/// assert_eq!(prob_rate_multiply(0.3, 1.0), 0.3);
/// assert!((prob_rate_multiply(0.19, 2.0) - (1.0 - 0.81f64.powi(2))).abs() < 1e-12);
/// ```
pub fn prob_rate_multiply(prob: f64, rate_mult: f64) -> f64 {
    if rate_mult == 0.0 {
        return 0.0;
    }
    if rate_mult == 1.0 {
        return prob;
    }
    1.0 - (1.0 - prob).powf(rate_mult)
}

/// Convert a probability to its log-odds.
///
/// The caller is responsible for keeping `prob` strictly inside `(0, 1)`;
/// the boundary values produce infinities.
pub fn prob_to_logit(prob: f64) -> f64 {
    (prob / (1.0 - prob)).ln()
}

/// Convert a log-odds value back to a probability.
pub fn logit_to_prob(logit: f64) -> f64 {
    1.0 / (1.0 + (-logit).exp())
}

/// Adjust a probability by adding on the logit scale.
///
/// # Examples
///
/// ```
/// use tsukihi_core::prob::prob_logit_adjustment;
///
/// // A zero adjustment is the identity.
/// assert!((prob_logit_adjustment(0.42, 0.0) - 0.42).abs() < 1e-12);
/// // A positive adjustment increases the probability.
/// assert!(prob_logit_adjustment(0.42, 1.0) > 0.42);
/// ```
pub fn prob_logit_adjustment(prob: f64, logit_adjust: f64) -> f64 {
    logit_to_prob(prob_to_logit(prob) + logit_adjust)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_prob_round_trip() {
        for p in [0.0, 0.001, 0.1, 0.5, 0.9, 0.999] {
            let rate = prob_to_rate(p);
            assert!(rate >= 0.0);
            assert!((rate_to_prob(rate) - p).abs() < 1e-12);
        }
    }

    #[test]
    fn test_prob_to_rate_round_trip_on_rates() {
        for r in [0.0, 0.01, 0.3, 1.0, 4.0] {
            assert!((prob_to_rate(rate_to_prob(r)) - r).abs() < 1e-9);
        }
    }

    #[test]
    fn test_prob_rate_multiply_degenerate() {
        assert_eq!(prob_rate_multiply(0.7, 0.0), 0.0);
        assert_eq!(prob_rate_multiply(0.7, 1.0), 0.7);
    }

    #[test]
    fn test_prob_rate_multiply_doubles_rate() {
        let p = 0.2;
        let doubled = prob_rate_multiply(p, 2.0);
        assert!((prob_to_rate(doubled) - 2.0 * prob_to_rate(p)).abs() < 1e-12);
    }

    #[test]
    fn test_logit_round_trip() {
        for p in [0.01, 0.25, 0.5, 0.75, 0.99] {
            assert!((logit_to_prob(prob_to_logit(p)) - p).abs() < 1e-12);
        }
    }

    #[test]
    fn test_logit_adjustment_identity() {
        for p in [0.1, 0.5, 0.9] {
            assert!((prob_logit_adjustment(p, 0.0) - p).abs() < 1e-12);
        }
    }

    #[test]
    fn test_logit_adjustment_monotone() {
        assert!(prob_logit_adjustment(0.3, 0.5) > 0.3);
        assert!(prob_logit_adjustment(0.3, -0.5) < 0.3);
    }
}
