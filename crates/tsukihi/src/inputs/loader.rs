//! Input file loading and the version gate.

use std::path::Path;

use crate::error::{Result, SimError};
use crate::inputs::{InputFile, SimContext, INPUT_VERSION};

/// Load a run input file and build the simulation context.
///
/// The file is RON; optional sections default. A missing or mismatched
/// `input_version` is a fatal-config error for this input.
pub fn load_context(path: &Path) -> Result<SimContext> {
    let text = std::fs::read_to_string(path)?;
    let input = parse_input(&text, &path.display().to_string())?;
    Ok(SimContext::from_input(input))
}

/// Parse input text, checking the version gate.
pub fn parse_input(text: &str, file: &str) -> Result<InputFile> {
    let input: InputFile = ron::from_str(text).map_err(|e| SimError::Parse {
        file: file.to_string(),
        message: e.to_string(),
    })?;
    if input.input_version != INPUT_VERSION {
        return Err(SimError::InputVersion {
            found: input.input_version,
            expected: INPUT_VERSION.to_string(),
        });
    }
    validate(&input)?;
    Ok(input)
}

/// Structural checks beyond what serde enforces.
fn validate(input: &InputFile) -> Result<()> {
    if input.run_specs.run_name.is_empty() {
        return Err(SimError::InvalidInput("run_specs.run_name is empty".into()));
    }
    if input.run_specs.num_cohorts == 0 {
        return Err(SimError::InvalidInput("run_specs.num_cohorts is zero".into()));
    }
    for (i, line) in input.art.lines.iter().enumerate() {
        if line.sub_regimens.is_empty() {
            return Err(SimError::InvalidInput(format!(
                "art line {} has no sub-regimens",
                i + 1
            )));
        }
    }
    if input.proph.enable && input.proph.per_oi.len() > input.nat_hist.ois.len() {
        return Err(SimError::InvalidInput(
            "proph.per_oi has more entries than the OI catalogue".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_input() -> String {
        format!(
            "(input_version: \"{}\", run_specs: (run_name: \"test\"))",
            INPUT_VERSION
        )
    }

    #[test]
    fn test_minimal_input_parses() {
        let input = parse_input(&minimal_input(), "test.ron").unwrap();
        assert_eq!(input.run_specs.run_name, "test");
        assert_eq!(input.run_specs.num_cohorts, 1_000);
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let text = "(input_version: \"other-9\", run_specs: (run_name: \"x\"))";
        match parse_input(text, "test.ron") {
            Err(SimError::InputVersion { found, expected }) => {
                assert_eq!(found, "other-9");
                assert_eq!(expected, INPUT_VERSION);
            }
            other => panic!("expected version error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(
            parse_input("not ron at all {", "bad.ron"),
            Err(SimError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_run_name_rejected() {
        let text = format!("(input_version: \"{}\")", INPUT_VERSION);
        assert!(matches!(
            parse_input(&text, "x.ron"),
            Err(SimError::InvalidInput(_))
        ));
    }
}
