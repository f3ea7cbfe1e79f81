//! The two-threshold piecewise-linear response curve.
//!
//! A patient's propensity to respond (a probability obtained from a
//! logit) is mapped to a per-outcome response factor: below the lower
//! threshold the factor is the configured lower value, above the upper
//! threshold the upper value, and in between it interpolates linearly.
//! An optional exponent bends the interpolation.

use serde::{Deserialize, Serialize};

/// Piecewise-linear map from a response propensity to a response factor.
///
/// # Examples
///
/// ```
/// use tsukihi_core::response::ResponseCurve;
///
/// let curve = ResponseCurve {
///     lower_threshold: 0.2,
///     upper_threshold: 0.8,
///     lower_value: 0.0,
///     upper_value: 1.0,
///     exponent: None,
/// };
/// assert_eq!(curve.factor(0.1), 0.0);
/// assert_eq!(curve.factor(0.9), 1.0);
/// assert!((curve.factor(0.5) - 0.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseCurve {
    /// Propensities at or below this map to `lower_value`.
    pub lower_threshold: f64,
    /// Propensities above this map to `upper_value`.
    pub upper_threshold: f64,
    /// Factor returned below the lower threshold.
    pub lower_value: f64,
    /// Factor returned above the upper threshold.
    pub upper_value: f64,
    /// Optional exponent applied to the interpolation fraction.
    pub exponent: Option<f64>,
}

impl ResponseCurve {
    /// A curve that returns `value` for every propensity.
    pub fn flat(value: f64) -> Self {
        Self {
            lower_threshold: 0.0,
            upper_threshold: 0.0,
            lower_value: value,
            upper_value: value,
            exponent: None,
        }
    }

    /// The interpolation fraction in `[0, 1]` for a propensity.
    pub fn fraction(&self, propensity: f64) -> f64 {
        if propensity > self.upper_threshold {
            1.0
        } else if propensity > self.lower_threshold {
            let raw =
                (propensity - self.lower_threshold) / (self.upper_threshold - self.lower_threshold);
            match self.exponent {
                Some(e) => raw.powf(e),
                None => raw,
            }
        } else {
            0.0
        }
    }

    /// Map a propensity to its response factor.
    pub fn factor(&self, propensity: f64) -> f64 {
        self.lower_value + self.fraction(propensity) * (self.upper_value - self.lower_value)
    }
}

impl Default for ResponseCurve {
    fn default() -> Self {
        Self::flat(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> ResponseCurve {
        ResponseCurve {
            lower_threshold: 0.25,
            upper_threshold: 0.75,
            lower_value: 0.1,
            upper_value: 0.9,
            exponent: None,
        }
    }

    #[test]
    fn test_below_lower_threshold() {
        assert_eq!(curve().factor(0.0), 0.1);
        assert_eq!(curve().factor(0.25), 0.1);
    }

    #[test]
    fn test_above_upper_threshold() {
        assert_eq!(curve().factor(0.76), 0.9);
        assert_eq!(curve().factor(1.0), 0.9);
    }

    #[test]
    fn test_midpoint_interpolates() {
        let f = curve().factor(0.5);
        assert!((f - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_exponent_bends_interpolation() {
        let mut c = curve();
        c.exponent = Some(2.0);
        // At the midpoint the fraction becomes 0.25 instead of 0.5.
        assert!((c.fraction(0.5) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_flat_curve() {
        let c = ResponseCurve::flat(0.7);
        for p in [0.0, 0.3, 1.0] {
            assert_eq!(c.factor(p), 0.7);
        }
    }

    #[test]
    fn test_inverted_values_supported() {
        // Some outcomes (late failure) decrease with better response.
        let c = ResponseCurve {
            lower_value: 1.0,
            upper_value: 0.2,
            ..curve()
        };
        assert!(c.factor(0.9) < c.factor(0.1));
    }
}
