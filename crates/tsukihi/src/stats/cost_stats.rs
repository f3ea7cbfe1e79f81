//! Cost accounting: categories, subgroups, multi-discount parallels.

use serde::{Deserialize, Serialize};

use crate::inputs::SimContext;
use crate::types::{CostCategory, CostSubgroup};

/// Cohort-level cost totals.
///
/// Every cost-emitting event routes through [`CostStats::add_cost`]
/// (via the updater context), which books the discounted and
/// undiscounted totals by category and the discounted totals per cost
/// subgroup the patient belongs to this month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostStats {
    /// Discounted and undiscounted totals by category.
    pub discounted_by_category: [f64; CostCategory::COUNT],
    pub undiscounted_by_category: [f64; CostCategory::COUNT],
    /// Discounted totals per subgroup.
    pub discounted_by_subgroup: [f64; CostSubgroup::COUNT],
    /// Per alternative rate, total discounted costs.
    pub multi_discount_totals: Vec<f64>,
}

impl CostStats {
    pub fn new(sim: &SimContext) -> Self {
        Self {
            discounted_by_category: [0.0; CostCategory::COUNT],
            undiscounted_by_category: [0.0; CostCategory::COUNT],
            discounted_by_subgroup: [0.0; CostSubgroup::COUNT],
            multi_discount_totals: vec![0.0; sim.multi_discount.len()],
        }
    }

    /// Book one cost event.
    pub fn add_cost(
        &mut self,
        category: CostCategory,
        discounted: f64,
        undiscounted: f64,
        subgroups: &[bool; CostSubgroup::COUNT],
    ) {
        self.discounted_by_category[category.index()] += discounted;
        self.undiscounted_by_category[category.index()] += undiscounted;
        for (i, member) in subgroups.iter().enumerate() {
            if *member {
                self.discounted_by_subgroup[i] += discounted;
            }
        }
    }

    /// Book the alternative-rate discounted amounts, one per rate.
    pub fn add_multi_discount(&mut self, amounts: &[f64]) {
        for (total, amount) in self.multi_discount_totals.iter_mut().zip(amounts.iter()) {
            *total += amount;
        }
    }

    /// Total discounted costs across categories.
    pub fn total_discounted(&self) -> f64 {
        self.discounted_by_category.iter().sum()
    }

    /// Merge a per-thread aggregate into this one.
    pub fn merge(&mut self, other: &CostStats) {
        for i in 0..CostCategory::COUNT {
            self.discounted_by_category[i] += other.discounted_by_category[i];
            self.undiscounted_by_category[i] += other.undiscounted_by_category[i];
        }
        for i in 0..CostSubgroup::COUNT {
            self.discounted_by_subgroup[i] += other.discounted_by_subgroup[i];
        }
        for (mine, theirs) in self
            .multi_discount_totals
            .iter_mut()
            .zip(other.multi_discount_totals.iter())
        {
            *mine += theirs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_cost_books_categories_and_subgroups() {
        let sim = SimContext::default();
        let mut costs = CostStats::new(&sim);
        let mut subgroups = [false; CostSubgroup::COUNT];
        subgroups[CostSubgroup::OnArt.index()] = true;
        costs.add_cost(CostCategory::DirectMedical, 95.0, 100.0, &subgroups);
        assert_eq!(
            costs.discounted_by_category[CostCategory::DirectMedical.index()],
            95.0
        );
        assert_eq!(
            costs.undiscounted_by_category[CostCategory::DirectMedical.index()],
            100.0
        );
        assert_eq!(
            costs.discounted_by_subgroup[CostSubgroup::OnArt.index()],
            95.0
        );
        assert_eq!(
            costs.discounted_by_subgroup[CostSubgroup::HivNegative.index()],
            0.0
        );
        assert_eq!(costs.total_discounted(), 95.0);
    }

    #[test]
    fn test_merge() {
        let sim = SimContext::default();
        let mut a = CostStats::new(&sim);
        let mut b = CostStats::new(&sim);
        let none = [false; CostSubgroup::COUNT];
        a.add_cost(CostCategory::Time, 1.0, 1.0, &none);
        b.add_cost(CostCategory::Time, 2.0, 2.0, &none);
        a.merge(&b);
        assert_eq!(a.discounted_by_category[CostCategory::Time.index()], 3.0);
    }
}
