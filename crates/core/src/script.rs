//! Script loading.
//!
//! A script is plain text with one shell command per line. Lines starting
//! with [`COMMENT_PREFIX`] and blank lines are kept in the script but are not
//! steps: they never start a process.

use std::path::Path;

/// Marker that starts a comment line.
pub const COMMENT_PREFIX: &str = "::";

/// An ordered list of script lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    lines: Vec<String>,
}

impl Script {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Split script text into lines, dropping line terminators.
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines().map(str::to_string).collect())
    }

    /// Read a script resource from disk.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// The executable steps, in order, with surrounding whitespace removed.
    pub fn steps(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|line| is_step(line))
            .map(|line| line.trim().to_string())
            .collect()
    }
}

/// Whether a line is an executable step.
pub fn is_step(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !line.starts_with(COMMENT_PREFIX)
}
