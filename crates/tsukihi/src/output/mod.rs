//! Output files: the per-run stats file, the cost file, the trace file
//! and the cross-run popstats roll-up.

pub mod writer;

pub use writer::{
    append_popstats, read_popstats, write_cost_file, write_stats_file, write_trace_file,
};
