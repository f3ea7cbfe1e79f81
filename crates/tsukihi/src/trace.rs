//! Per-patient narrative tracing.
//!
//! Traced patients get a newline-delimited narrative: event lines of the
//! form `**<month> <EVENT> <payload>` with two-space indented
//! continuation lines. The tracer buffers lines; the runner writes them
//! out per patient.

use std::path::Path;

/// Event-line tracer for one patient run.
pub struct Tracer {
    lines: Vec<String>,
    enabled: bool,
}

impl Tracer {
    /// Create an enabled tracer.
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            enabled: true,
        }
    }

    /// Create a tracer that drops everything.
    pub fn disabled() -> Self {
        Self {
            lines: Vec::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an event line: `**<month> <text>`.
    pub fn event(&mut self, month: u32, text: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        self.lines.push(format!("**{} {};", month, text.as_ref()));
    }

    /// Record an indented continuation line under the last event.
    pub fn detail(&mut self, month: u32, text: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        self.lines.push(format!("  {} {}", month, text.as_ref()));
    }

    /// Start a new patient section.
    pub fn begin_patient(&mut self, patient_id: u64) {
        if !self.enabled {
            return;
        }
        self.lines.push(format!("PATIENT {}", patient_id));
    }

    /// All recorded lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Drain the buffer, returning the recorded lines.
    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    /// Write the buffered narrative to a file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut text = self.lines.join("\n");
        text.push('\n');
        std::fs::write(path, text)
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}
