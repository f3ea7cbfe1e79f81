//! The `run` subcommand: discover inputs, run cohorts, write outputs.

use std::path::{Path, PathBuf};

use chrono::Local;
use clap::Args;
use tsukihi::inputs::loader;
use tsukihi::output;
use tsukihi::stats::{RunSummary, SummaryStats};

use crate::config::Config;
use crate::error::{CliError, Result};

/// Run every input file found in the inputs directory.
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Skip writing the detailed cost files
    #[arg(long)]
    pub no_cost_files: bool,

    /// File name of the cross-run roll-up in the results directory
    #[arg(long, default_value = "popstats.tsv")]
    pub popstats: String,
}

impl RunCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let input_files = discover_inputs(config.inputs_dir())?;
        if input_files.is_empty() {
            return Err(CliError::NoInputs(
                config.inputs_dir().display().to_string(),
            ));
        }
        std::fs::create_dir_all(config.results_dir())?;

        let mut summaries = SummaryStats::new();
        let mut failures = 0usize;
        for path in &input_files {
            match self.run_one(path, config) {
                Ok(summary) => summaries.add(summary),
                Err(err) => {
                    // A bad input aborts that run only.
                    eprintln!("tsukihi: {}: {}", path.display(), err);
                    failures += 1;
                }
            }
        }
        if failures == input_files.len() {
            return Err(CliError::AllRunsFailed(failures));
        }

        summaries.finalize();
        let popstats_path = config.results_dir().join(&self.popstats);
        output::append_popstats(&popstats_path, &summaries)?;
        println!(
            "tsukihi: {} run(s) complete, {} failed; popstats at {}",
            input_files.len() - failures,
            failures,
            popstats_path.display()
        );
        Ok(())
    }

    fn run_one(&self, path: &Path, config: &Config) -> Result<RunSummary> {
        let sim = loader::load_context(path)?;
        let run_name = sim.run_specs.run_name.clone();
        println!(
            "tsukihi: running {} ({} patients)",
            run_name, sim.run_specs.num_cohorts
        );
        let output_set = tsukihi::run_cohort(&sim)?;

        let now = Local::now();
        let run_date = now.format("%Y-%m-%d").to_string();
        let run_time = now.format("%H:%M:%S").to_string();

        let stats_path = config.results_dir().join(format!("{}.out", run_name));
        output::write_stats_file(&stats_path, &output_set.stats, &sim, &run_date, &run_time)?;
        if !self.no_cost_files {
            let cost_path = config.results_dir().join(format!("{}.cost.tsv", run_name));
            output::write_cost_file(&cost_path, &output_set.costs)?;
        }
        if !output_set.trace_lines.is_empty() {
            let trace_path = config.results_dir().join(format!("{}.trace", run_name));
            output::write_trace_file(&trace_path, &output_set.trace_lines)?;
        }
        Ok(RunSummary::from_run_stats(
            &output_set.stats,
            run_date,
            run_time,
        ))
    }
}

/// All `*.ron` files in the inputs directory, sorted by name.
fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("ron") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsukihi::inputs::INPUT_VERSION;

    fn write_input(dir: &Path, name: &str, run_name: &str) {
        let text = format!(
            "(input_version: \"{}\", run_specs: (run_name: \"{}\", run_set_name: \"set\", num_cohorts: 5, max_patient_months: 6))",
            INPUT_VERSION, run_name
        );
        std::fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn test_discover_inputs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write_input(dir.path(), "b.ron", "b");
        write_input(dir.path(), "a.ron", "a");
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();
        let files = discover_inputs(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.ron"));
    }

    #[test]
    fn test_run_writes_output_set() {
        let inputs = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        write_input(inputs.path(), "base.ron", "base");
        let config = Config::new()
            .with_inputs_dir(inputs.path().to_str().unwrap())
            .with_results_dir(results.path().to_str().unwrap());
        let cmd = RunCommand {
            no_cost_files: false,
            popstats: "popstats.tsv".into(),
        };
        cmd.execute(&config).unwrap();
        assert!(results.path().join("base.out").exists());
        assert!(results.path().join("base.cost.tsv").exists());
        assert!(results.path().join("popstats.tsv").exists());
    }

    #[test]
    fn test_bad_version_continues_to_next_input() {
        let inputs = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        std::fs::write(
            inputs.path().join("bad.ron"),
            "(input_version: \"wrong\", run_specs: (run_name: \"bad\"))",
        )
        .unwrap();
        write_input(inputs.path(), "good.ron", "good");
        let config = Config::new()
            .with_inputs_dir(inputs.path().to_str().unwrap())
            .with_results_dir(results.path().to_str().unwrap());
        let cmd = RunCommand {
            no_cost_files: true,
            popstats: "popstats.tsv".into(),
        };
        cmd.execute(&config).unwrap();
        assert!(results.path().join("good.out").exists());
        assert!(!results.path().join("bad.out").exists());
    }

    #[test]
    fn test_empty_inputs_directory_is_fatal() {
        let inputs = tempfile::tempdir().unwrap();
        let config = Config::new().with_inputs_dir(inputs.path().to_str().unwrap());
        let cmd = RunCommand {
            no_cost_files: true,
            popstats: "popstats.tsv".into(),
        };
        assert!(matches!(
            cmd.execute(&config),
            Err(CliError::NoInputs(_))
        ));
    }
}
