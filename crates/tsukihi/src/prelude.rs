//! Convenience re-exports for downstream crates and tests.

pub use crate::error::{Result, SimError};
pub use crate::inputs::{InputFile, SimContext, INPUT_VERSION};
pub use crate::output::{append_popstats, write_cost_file, write_stats_file, write_trace_file};
pub use crate::rng::{SeedMode, SimRng};
pub use crate::runner::{run_cohort, RunOutput};
pub use crate::state::Patient;
pub use crate::stats::{CostStats, Dominance, RunStats, RunSummary, SummaryStats};
pub use crate::trace::Tracer;
pub use crate::transmission::{CommunitySnapshot, TransmissionModel};
pub use crate::types::*;
