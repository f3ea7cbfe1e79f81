//! Run statistics: per-run aggregates, cost accounting, and the
//! cross-run popstats summary.

pub mod cost_stats;
pub mod run_stats;
pub mod summary;

pub use cost_stats::CostStats;
pub use run_stats::{RunStats, SurvivalAccumulator, TimeSummary};
pub use summary::{Dominance, RunSummary, SummaryStats};
