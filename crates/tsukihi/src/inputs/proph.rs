//! Prophylaxis (non-TB) line definitions and start/stop policies.

use serde::{Deserialize, Serialize};

/// One prophylaxis line against a specific OI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProphLineDef {
    pub name: String,
    pub monthly_cost: f64,
    /// Rate multiplier on the OI probability while on this line.
    pub efficacy_multiplier: f64,
    /// Toxicity rolled once, at `months_to_toxicity` on the line.
    pub months_to_toxicity: u32,
    pub prob_minor_toxicity: f64,
    pub prob_major_toxicity: f64,
    pub cost_minor_toxicity: f64,
    pub cost_major_toxicity: f64,
    pub qol_minor_toxicity: f64,
    pub qol_major_toxicity: f64,
    /// Death-rate ratio added on a major toxicity.
    pub major_toxicity_death_rate_ratio: f64,
    pub switch_on_minor_toxicity: bool,
    pub switch_on_major_toxicity: bool,
    /// Months on the line before resistance may begin.
    pub time_of_resistance: u32,
    /// Monthly resistance probability once past the onset time.
    pub monthly_prob_resistance: f64,
    /// Rate multiplier degrading efficacy once resistant.
    pub resistance_efficacy_penalty: f64,
    /// Death-rate ratio added each month while resistant.
    pub resistance_death_rate_ratio: f64,
    /// Scheduled switch to the next line, if any.
    pub months_to_switch: Option<u32>,
}

impl Default for ProphLineDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            monthly_cost: 0.0,
            efficacy_multiplier: 1.0,
            months_to_toxicity: 0,
            prob_minor_toxicity: 0.0,
            prob_major_toxicity: 0.0,
            cost_minor_toxicity: 0.0,
            cost_major_toxicity: 0.0,
            qol_minor_toxicity: 1.0,
            qol_major_toxicity: 1.0,
            major_toxicity_death_rate_ratio: 1.0,
            switch_on_minor_toxicity: false,
            switch_on_major_toxicity: true,
            time_of_resistance: 0,
            monthly_prob_resistance: 0.0,
            resistance_efficacy_penalty: 1.0,
            resistance_death_rate_ratio: 1.0,
            months_to_switch: None,
        }
    }
}

/// Start/stop policy for prophylaxis against one OI.
///
/// `use_or` selects whether the configured conditions combine with OR
/// (any suffices) or AND (all must hold).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProphPolicy {
    pub use_or: bool,
    /// Current observed CD4 bound (below for start, above for stop).
    pub current_cd4: Option<f64>,
    /// Minimum-ever observed CD4 bound.
    pub min_cd4: Option<f64>,
    /// Require (start) or forbid (stop) an observed history of the OI.
    pub oi_history: Option<bool>,
    /// Month-number window.
    pub min_month: Option<u32>,
    pub max_month: Option<u32>,
    /// Months on prophylaxis (stop policies only).
    pub months_on_proph: Option<u32>,
}

impl Default for ProphPolicy {
    fn default() -> Self {
        Self {
            use_or: true,
            current_cd4: None,
            min_cd4: None,
            oi_history: None,
            min_month: None,
            max_month: None,
            months_on_proph: None,
        }
    }
}

/// Prophylaxis configuration for one OI: primary and secondary line
/// stacks plus the policies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OiProphConfig {
    pub primary_lines: Vec<ProphLineDef>,
    pub secondary_lines: Vec<ProphLineDef>,
    pub start: ProphPolicy,
    pub stop: ProphPolicy,
}

/// Prophylaxis inputs; indexed parallel to the OI catalogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProphInputs {
    pub enable: bool,
    /// Probability a patient may ever receive prophylaxis.
    pub prob_eligible: f64,
    /// Probability an eligible patient is non-compliant.
    pub prob_non_compliant: f64,
    /// Degree to which non-compliance degrades efficacy and hastens
    /// resistance, in [0, 1).
    pub non_compliance_degree: f64,
    /// Per-OI configuration, parallel to `NatHistInputs::ois`.
    pub per_oi: Vec<OiProphConfig>,
}

impl ProphInputs {
    pub fn config(&self, oi: usize) -> Option<&OiProphConfig> {
        self.per_oi.get(oi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disabled() {
        let inputs = ProphInputs::default();
        assert!(!inputs.enable);
        assert!(inputs.config(0).is_none());
    }

    #[test]
    fn test_default_line_is_inert() {
        let line = ProphLineDef::default();
        assert_eq!(line.efficacy_multiplier, 1.0);
        assert_eq!(line.monthly_prob_resistance, 0.0);
    }
}
