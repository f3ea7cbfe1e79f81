//! Tab-separated section writers with fixed-precision numeric fields.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use crate::error::{Result, SimError};
use crate::inputs::SimContext;
use crate::stats::summary::Dominance;
use crate::stats::{CostStats, RunStats, SummaryStats};
use crate::types::{CostCategory, CostSubgroup, Gender};

/// Render the per-run stats file.
pub fn render_stats(stats: &RunStats, sim: &SimContext, run_date: &str, run_time: &str) -> String {
    let mut out = String::new();
    let n = stats.num_patients.max(1) as f64;

    writeln!(out, "POPULATION SUMMARY").unwrap();
    writeln!(out, "Run Set\t{}", stats.run_set_name).unwrap();
    writeln!(out, "Run Name\t{}", stats.run_name).unwrap();
    writeln!(out, "Run Date\t{}", run_date).unwrap();
    writeln!(out, "Run Time\t{}", run_time).unwrap();
    writeln!(out, "Cohort Size\t{}", stats.num_patients).unwrap();
    writeln!(out, "HIV+ Patients\t{}", stats.num_hiv_positive).unwrap();
    writeln!(out, "Mean Costs\t{:.2}", stats.total_costs / n).unwrap();
    writeln!(out, "Mean LMs\t{:.4}", stats.total_lms / n).unwrap();
    writeln!(out, "Mean QALMs\t{:.4}", stats.total_qalms / n).unwrap();
    writeln!(out, "Clinic Visits\t{}", stats.total_clinic_visits).unwrap();

    writeln!(out, "\nHIV SCREENING").unwrap();
    writeln!(out, "Detected\t{}", stats.num_detected).unwrap();
    writeln!(out, "Linked\t{}", stats.num_linked).unwrap();
    writeln!(out, "Tests Performed\t{}", stats.num_tests_performed).unwrap();
    if stats.num_incident_detections > 0 {
        writeln!(
            out,
            "Mean Months Infection To Detection\t{:.2}",
            stats.sum_months_infection_to_detection / stats.num_incident_detections as f64
        )
        .unwrap();
        writeln!(
            out,
            "Mean CD4 At Detection (Incident)\t{:.1}",
            stats.sum_cd4_at_detection_incident / stats.num_incident_detections as f64
        )
        .unwrap();
    }
    if stats.num_prevalent_detections > 0 {
        writeln!(
            out,
            "Mean Months To Detection (Prevalent)\t{:.2}",
            stats.sum_months_to_detection_prevalent / stats.num_prevalent_detections as f64
        )
        .unwrap();
        writeln!(
            out,
            "Mean CD4 At Detection (Prevalent)\t{:.1}",
            stats.sum_cd4_at_detection_prevalent / stats.num_prevalent_detections as f64
        )
        .unwrap();
    }

    writeln!(out, "\nSURVIVAL (LIFE MONTHS)").unwrap();
    writeln!(
        out,
        "Overall\tmean\t{:.4}\tsd\t{:.4}\tmin\t{:.1}\tmax\t{:.1}",
        stats.survival.mean(),
        stats.survival.std_dev(),
        stats.survival.min.unwrap_or(0.0),
        stats.survival.max.unwrap_or(0.0)
    )
    .unwrap();
    for (i, cap) in crate::stats::run_stats::SURVIVAL_TRUNCATIONS.iter().enumerate() {
        let acc = &stats.survival_truncated[i];
        writeln!(
            out,
            "Truncated {} months\tmean\t{:.4}\tsd\t{:.4}",
            cap,
            acc.mean(),
            acc.std_dev()
        )
        .unwrap();
    }
    writeln!(
        out,
        "HIV+\tmean\t{:.4}\tsd\t{:.4}",
        stats.survival_hiv_positive.mean(),
        stats.survival_hiv_positive.std_dev()
    )
    .unwrap();

    writeln!(out, "\nINITIAL DISTRIBUTIONS").unwrap();
    writeln!(
        out,
        "Age (months)\tmean\t{:.1}\tsd\t{:.1}",
        stats.initial_age.mean(),
        stats.initial_age.std_dev()
    )
    .unwrap();
    writeln!(
        out,
        "Initial CD4\tmean\t{:.1}\tsd\t{:.1}",
        stats.initial_cd4.mean(),
        stats.initial_cd4.std_dev()
    )
    .unwrap();
    writeln!(
        out,
        "Gender\tmale\t{}\tfemale\t{}",
        stats.num_by_gender[Gender::Male.index()],
        stats.num_by_gender[Gender::Female.index()]
    )
    .unwrap();

    if !stats.num_primary_ois.is_empty() {
        writeln!(out, "\nOPPORTUNISTIC INFECTIONS").unwrap();
        writeln!(out, "OI\tprimary\tsecondary\tdetected").unwrap();
        for (i, oi) in sim.nat_hist.ois.iter().enumerate() {
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                oi.name,
                stats.num_primary_ois[i],
                stats.num_secondary_ois[i],
                stats.num_detected_ois[i]
            )
            .unwrap();
        }
    }

    if !stats.num_chrm_incident.is_empty() {
        writeln!(out, "\nCHRONIC CONDITIONS").unwrap();
        writeln!(out, "CHRM\tprevalent\tincident").unwrap();
        for (i, chrm) in sim.chrms.chrms.iter().enumerate() {
            writeln!(
                out,
                "{}\t{}\t{}",
                chrm.name, stats.num_chrm_prevalent[i], stats.num_chrm_incident[i]
            )
            .unwrap();
        }
    }

    writeln!(out, "\nDEATHS").unwrap();
    writeln!(out, "Total\t{}", stats.num_deaths).unwrap();
    writeln!(out, "HIV+\t{}", stats.num_deaths_hiv_positive).unwrap();
    for (cause, count) in &stats.deaths_by_cause {
        writeln!(out, "{}\t{}", cause, count).unwrap();
    }

    writeln!(out, "\nART").unwrap();
    for (i, count) in stats.num_art_starts.iter().enumerate() {
        writeln!(
            out,
            "Line {} starts\t{}\tobserved failures\t{}",
            i + 1,
            count,
            stats.num_observed_failures[i]
        )
        .unwrap();
    }
    writeln!(out, "Toxicity events\t{}", stats.num_toxicity_events).unwrap();
    for (stop, count) in &stats.num_art_stops_by_type {
        writeln!(out, "Stop: {}\t{}", stop, count).unwrap();
    }

    writeln!(out, "\nPROPHYLAXIS").unwrap();
    for (i, count) in stats.num_proph_starts.iter().enumerate() {
        if *count > 0 {
            writeln!(out, "OI {} starts\t{}", i + 1, count).unwrap();
        }
    }
    writeln!(
        out,
        "Toxicity\tmajor\t{}\tminor\t{}",
        stats.num_proph_major_tox, stats.num_proph_minor_tox
    )
    .unwrap();

    writeln!(out, "\nLTFU").unwrap();
    writeln!(out, "Lost\t{}", stats.num_ltfu_events).unwrap();
    writeln!(out, "Returned\t{}", stats.num_rtc_events).unwrap();

    if sim.tb.enable {
        writeln!(out, "\nTB").unwrap();
        writeln!(out, "Infections\t{}", stats.num_tb_infections).unwrap();
        writeln!(out, "Activations\t{}", stats.num_tb_activations).unwrap();
        writeln!(out, "Relapses\t{}", stats.num_tb_relapses).unwrap();
        writeln!(out, "Self cures\t{}", stats.num_tb_self_cures).unwrap();
        writeln!(out, "Diagnoses\t{}", stats.num_tb_diagnoses).unwrap();
        writeln!(out, "Treatment starts\t{}", stats.num_tb_treatment_starts).unwrap();
        writeln!(
            out,
            "Treatment completions\t{}",
            stats.num_tb_treatment_completions
        )
        .unwrap();
        writeln!(out, "Treatment defaults\t{}", stats.num_tb_treatment_defaults).unwrap();
        writeln!(out, "Proph starts\t{}", stats.num_tb_proph_starts).unwrap();
    }

    if sim.run_specs.longitudinal_output {
        writeln!(out, "\nTIME SUMMARIES").unwrap();
        writeln!(
            out,
            "month\talive\thiv+\tonART\tinCare\tnegAtStart\tincident\tdeaths\tonPrEP\tactiveTB"
        )
        .unwrap();
        for (month, t) in stats.time_summaries.iter().enumerate() {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                month,
                t.num_alive,
                t.num_hiv_positive,
                t.num_on_art,
                t.num_in_care,
                t.num_hiv_negative_at_start,
                t.num_incident_infections,
                t.num_deaths,
                t.num_on_prep,
                t.num_active_tb
            )
            .unwrap();
        }
    }
    out
}

/// Write the per-run stats file.
pub fn write_stats_file(
    path: &Path,
    stats: &RunStats,
    sim: &SimContext,
    run_date: &str,
    run_time: &str,
) -> Result<()> {
    std::fs::write(path, render_stats(stats, sim, run_date, run_time))?;
    Ok(())
}

/// Write the optional detailed cost file.
pub fn write_cost_file(path: &Path, costs: &CostStats) -> Result<()> {
    let mut out = String::new();
    writeln!(out, "COST CATEGORIES").unwrap();
    writeln!(out, "category\tdiscounted\tundiscounted").unwrap();
    for category in CostCategory::ALL {
        writeln!(
            out,
            "{}\t{:.2}\t{:.2}",
            category.label(),
            costs.discounted_by_category[category.index()],
            costs.undiscounted_by_category[category.index()]
        )
        .unwrap();
    }
    writeln!(out, "\nCOST SUBGROUPS").unwrap();
    writeln!(out, "subgroup\tdiscounted").unwrap();
    for subgroup in CostSubgroup::ALL {
        writeln!(
            out,
            "{}\t{:.2}",
            subgroup.label(),
            costs.discounted_by_subgroup[subgroup.index()]
        )
        .unwrap();
    }
    if !costs.multi_discount_totals.is_empty() {
        writeln!(out, "\nALTERNATIVE DISCOUNT RATES").unwrap();
        for (i, total) in costs.multi_discount_totals.iter().enumerate() {
            writeln!(out, "rate {}\t{:.2}", i + 1, total).unwrap();
        }
    }
    std::fs::write(path, out)?;
    Ok(())
}

/// Write a run's trace narrative.
pub fn write_trace_file(path: &Path, lines: &[String]) -> Result<()> {
    let mut text = lines.join("\n");
    text.push('\n');
    std::fs::write(path, text)?;
    Ok(())
}

const POPSTATS_HEADER: &str =
    "runSet\trunName\trunDate\trunTime\tcohorts\tmeanCost\tmeanLMs\tmeanQALMs\tCE/LY\tCE/QALY";

/// Append finalized run summaries to the popstats roll-up.
pub fn append_popstats(path: &Path, summaries: &SummaryStats) -> Result<()> {
    let mut out = String::new();
    if !path.exists() {
        writeln!(out, "{}", POPSTATS_HEADER).unwrap();
    }
    for set in summaries.run_sets() {
        for s in set {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.4}\t{:.4}\t{}\t{}",
                s.run_set_name,
                s.run_name,
                s.run_date,
                s.run_time,
                s.num_cohorts,
                s.costs_average,
                s.lms_average,
                s.qalms_average,
                s.cost_effectiveness_lms.to_field(),
                s.cost_effectiveness_qalms.to_field()
            )
            .unwrap();
        }
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(out.as_bytes())?;
    Ok(())
}

/// Read popstats rows back: (run name, CE/LY, CE/QALY) triples.
pub fn read_popstats(path: &Path) -> Result<Vec<(String, Dominance, Dominance)>> {
    let text = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for line in text.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 10 {
            return Err(SimError::Output(format!(
                "malformed popstats row: {}",
                line
            )));
        }
        rows.push((
            fields[1].to_string(),
            Dominance::from_field(fields[8]),
            Dominance::from_field(fields[9]),
        ));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::summary::RunSummary;

    fn sample_stats() -> (RunStats, SimContext) {
        let mut input = crate::inputs::InputFile::default();
        input.run_specs.run_name = "base".into();
        input.run_specs.run_set_name = "set".into();
        let sim = SimContext::from_input(input);
        let mut stats = RunStats::new(&sim);
        stats.finalize_patient(120.0, 110.0, 5_000.0, 120.0, true);
        (stats, sim)
    }

    #[test]
    fn test_stats_render_has_sections() {
        let (stats, sim) = sample_stats();
        let text = render_stats(&stats, &sim, "2026-08-01", "12:00:00");
        assert!(text.contains("POPULATION SUMMARY"));
        assert!(text.contains("SURVIVAL (LIFE MONTHS)"));
        assert!(text.contains("Mean Costs\t5000.00"));
        assert!(text.contains("DEATHS"));
    }

    #[test]
    fn test_popstats_round_trip_preserves_dominance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("popstats.tsv");
        let mut summaries = SummaryStats::new();
        for (name, cost, lms) in [("a", 0.0, 0.0), ("b", 1_000.0, 1.0), ("c", 1_100.0, 10.0)] {
            summaries.add(RunSummary {
                run_set_name: "set".into(),
                run_name: name.into(),
                run_date: "2026-08-01".into(),
                run_time: "12:00:00".into(),
                num_cohorts: 10,
                costs_average: cost,
                lms_average: lms,
                qalms_average: lms,
                cost_effectiveness_lms: Dominance::Pending,
                cost_effectiveness_qalms: Dominance::Pending,
            });
        }
        summaries.finalize();
        append_popstats(&path, &summaries).unwrap();
        let rows = read_popstats(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].1, Dominance::Baseline);
        assert_eq!(rows[1].1, Dominance::ExtendedDominated);
        assert_eq!(rows[2].1, Dominance::Ratio(110.0));
    }

    #[test]
    fn test_popstats_appends_without_duplicate_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("popstats.tsv");
        let mut summaries = SummaryStats::new();
        summaries.add(RunSummary {
            run_set_name: "s".into(),
            run_name: "only".into(),
            run_date: String::new(),
            run_time: String::new(),
            num_cohorts: 1,
            costs_average: 1.0,
            lms_average: 1.0,
            qalms_average: 1.0,
            cost_effectiveness_lms: Dominance::Baseline,
            cost_effectiveness_qalms: Dominance::Baseline,
        });
        append_popstats(&path, &summaries).unwrap();
        append_popstats(&path, &summaries).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("runSet").count(), 1);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_cost_file_writes_categories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.cost.tsv");
        let sim = SimContext::default();
        let costs = CostStats::new(&sim);
        write_cost_file(&path, &costs).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Direct Medical"));
        assert!(text.contains("COST SUBGROUPS"));
    }
}
