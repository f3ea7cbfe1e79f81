//! Cross-run popstats roll-up and the cost-effectiveness frontier.
//!
//! Runs are grouped into run sets. Within a set, runs are sorted by
//! average cost; strongly dominated runs (no effect gain for the extra
//! cost) are labelled, then incremental ratios are recomputed until no
//! extended dominance remains.

use serde::{Deserialize, Serialize};

use super::run_stats::RunStats;

/// A run's position on the cost-effectiveness frontier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Dominance {
    /// Not yet computed.
    Pending,
    /// The cheapest run in the set; no comparator.
    Baseline,
    /// Incremental ratio versus the previous frontier run.
    Ratio(f64),
    /// Strongly dominated: more costly, no more effective.
    Dominated,
    /// Removed by extended dominance.
    ExtendedDominated,
}

impl Dominance {
    /// Render the popstats field.
    pub fn to_field(&self) -> String {
        match self {
            Dominance::Pending => String::new(),
            Dominance::Baseline => "baseline".to_string(),
            Dominance::Ratio(r) => format!("{:.0}", r),
            Dominance::Dominated => "strongly dominated".to_string(),
            Dominance::ExtendedDominated => "dominated".to_string(),
        }
    }

    /// Parse a popstats field back; round-trips `to_field`.
    pub fn from_field(field: &str) -> Self {
        match field {
            "" => Dominance::Pending,
            "baseline" => Dominance::Baseline,
            "strongly dominated" => Dominance::Dominated,
            "dominated" => Dominance::ExtendedDominated,
            other => other
                .parse::<f64>()
                .map(Dominance::Ratio)
                .unwrap_or(Dominance::Pending),
        }
    }
}

/// One row of the popstats file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_set_name: String,
    pub run_name: String,
    pub run_date: String,
    pub run_time: String,
    pub num_cohorts: u64,
    pub costs_average: f64,
    pub lms_average: f64,
    pub qalms_average: f64,
    pub cost_effectiveness_lms: Dominance,
    pub cost_effectiveness_qalms: Dominance,
}

impl RunSummary {
    /// Build a summary row from a finished run.
    pub fn from_run_stats(stats: &RunStats, run_date: String, run_time: String) -> Self {
        let n = stats.num_patients.max(1) as f64;
        Self {
            run_set_name: stats.run_set_name.clone(),
            run_name: stats.run_name.clone(),
            run_date,
            run_time,
            num_cohorts: stats.num_patients,
            costs_average: stats.total_costs / n,
            lms_average: stats.total_lms / n,
            qalms_average: stats.total_qalms / n,
            cost_effectiveness_lms: Dominance::Pending,
            cost_effectiveness_qalms: Dominance::Pending,
        }
    }
}

/// The popstats accumulator: summaries grouped by run set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    run_sets: Vec<Vec<RunSummary>>,
}

impl SummaryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a run's summary to its run set.
    pub fn add(&mut self, summary: RunSummary) {
        for set in &mut self.run_sets {
            if set[0].run_set_name == summary.run_set_name {
                set.push(summary);
                return;
            }
        }
        self.run_sets.push(vec![summary]);
    }

    pub fn run_sets(&self) -> &[Vec<RunSummary>] {
        &self.run_sets
    }

    /// Compute the cost-effectiveness frontier for every run set.
    pub fn finalize(&mut self) {
        for set in &mut self.run_sets {
            set.sort_by(|a, b| a.costs_average.total_cmp(&b.costs_average));
            let lms: Vec<f64> = set.iter().map(|s| s.lms_average).collect();
            let qalms: Vec<f64> = set.iter().map(|s| s.qalms_average).collect();
            let costs: Vec<f64> = set.iter().map(|s| s.costs_average).collect();
            let lms_labels = frontier(&costs, &lms);
            let qalm_labels = frontier(&costs, &qalms);
            for (i, s) in set.iter_mut().enumerate() {
                s.cost_effectiveness_lms = lms_labels[i];
                s.cost_effectiveness_qalms = qalm_labels[i];
            }
        }
    }
}

/// Frontier labelling over runs already sorted by cost.
fn frontier(costs: &[f64], effects: &[f64]) -> Vec<Dominance> {
    let n = costs.len();
    let mut labels = vec![Dominance::Pending; n];
    if n == 0 {
        return labels;
    }
    labels[0] = Dominance::Baseline;

    // Strong dominance: walking up in cost, any run that does not
    // strictly improve the effect is dominated.
    let mut best_effect = effects[0];
    for i in 1..n {
        if effects[i] <= best_effect {
            labels[i] = Dominance::Dominated;
        } else {
            best_effect = effects[i];
        }
    }

    // Extended dominance: recompute incremental ratios against the
    // previous surviving run; a run whose successor has a lower ratio
    // is removed, and the ratios recomputed until stable.
    loop {
        let survivors: Vec<usize> = (0..n)
            .filter(|i| !matches!(labels[*i], Dominance::Dominated | Dominance::ExtendedDominated))
            .collect();
        let mut changed = false;
        for w in 1..survivors.len() {
            let prev = survivors[w - 1];
            let curr = survivors[w];
            let ratio =
                (costs[curr] - costs[prev]) / (effects[curr] - effects[prev]);
            labels[curr] = Dominance::Ratio(ratio);
        }
        // Scan for a surviving run with a higher ratio than its successor.
        for w in 1..survivors.len().saturating_sub(1) {
            let curr = survivors[w];
            let next = survivors[w + 1];
            if let (Dominance::Ratio(rc), Dominance::Ratio(rn)) = (labels[curr], labels[next]) {
                if rn < rc {
                    labels[curr] = Dominance::ExtendedDominated;
                    changed = true;
                    break;
                }
            }
        }
        if !changed {
            break;
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(set: &str, name: &str, cost: f64, lms: f64) -> RunSummary {
        RunSummary {
            run_set_name: set.to_string(),
            run_name: name.to_string(),
            run_date: String::new(),
            run_time: String::new(),
            num_cohorts: 100,
            costs_average: cost,
            lms_average: lms,
            qalms_average: lms,
            cost_effectiveness_lms: Dominance::Pending,
            cost_effectiveness_qalms: Dominance::Pending,
        }
    }

    #[test]
    fn test_frontier_simple_ratio() {
        let mut stats = SummaryStats::new();
        stats.add(summary("s", "a", 1000.0, 100.0));
        stats.add(summary("s", "b", 2000.0, 110.0));
        stats.finalize();
        let set = &stats.run_sets()[0];
        assert_eq!(set[0].cost_effectiveness_lms, Dominance::Baseline);
        assert_eq!(set[1].cost_effectiveness_lms, Dominance::Ratio(100.0));
    }

    #[test]
    fn test_strong_dominance() {
        let mut stats = SummaryStats::new();
        stats.add(summary("s", "a", 1000.0, 100.0));
        stats.add(summary("s", "b", 2000.0, 95.0));
        stats.finalize();
        let set = &stats.run_sets()[0];
        assert_eq!(set[1].cost_effectiveness_lms, Dominance::Dominated);
    }

    #[test]
    fn test_extended_dominance() {
        // b's ratio (100/5=20 per LM... scaled) exceeds c's, so b is
        // removed by extended dominance and c re-prices against a.
        let mut stats = SummaryStats::new();
        stats.add(summary("s", "a", 0.0, 0.0));
        stats.add(summary("s", "b", 1000.0, 1.0));
        stats.add(summary("s", "c", 1100.0, 10.0));
        stats.finalize();
        let set = &stats.run_sets()[0];
        assert_eq!(set[1].cost_effectiveness_lms, Dominance::ExtendedDominated);
        assert_eq!(set[2].cost_effectiveness_lms, Dominance::Ratio(110.0));
    }

    #[test]
    fn test_run_sets_are_separate() {
        let mut stats = SummaryStats::new();
        stats.add(summary("s1", "a", 1000.0, 100.0));
        stats.add(summary("s2", "b", 500.0, 90.0));
        stats.finalize();
        assert_eq!(stats.run_sets().len(), 2);
        assert_eq!(
            stats.run_sets()[1][0].cost_effectiveness_lms,
            Dominance::Baseline
        );
    }

    #[test]
    fn test_dominance_field_round_trip() {
        for d in [
            Dominance::Baseline,
            Dominance::Ratio(1234.0),
            Dominance::Dominated,
            Dominance::ExtendedDominated,
        ] {
            assert_eq!(Dominance::from_field(&d.to_field()), d);
        }
    }
}
