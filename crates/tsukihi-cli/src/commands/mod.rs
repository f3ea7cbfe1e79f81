//! CLI subcommands

mod run;

pub use run::RunCommand;
