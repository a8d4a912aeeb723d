//! Validation report types.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Severity level of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks submission.
    Error,
    /// Submission proceeds; the user should look at it.
    Warning,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// A single coded finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    /// `E…` for errors, `W…` for warnings.
    pub code: &'static str,
    pub message: String,
    /// File the record came from, when linting files.
    #[serde(
        serialize_with = "serialize_source",
        skip_serializing_if = "Option::is_none"
    )]
    pub source: Option<PathBuf>,
    /// Field path inside the record, e.g. `locations[1].backend`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

fn serialize_source<S>(source: &Option<PathBuf>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match source {
        Some(path) => serializer.serialize_str(&path.to_string_lossy()),
        None => serializer.serialize_none(),
    }
}

impl Issue {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            source: None,
            location: None,
            suggestion: None,
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn with_source(mut self, source: &Path) -> Self {
        self.source = Some(source.to_path_buf());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity.label(), self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " (at {location})")?;
        }
        Ok(())
    }
}

/// Everything found while validating one or more configurations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
    pub configs_checked: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
        }
        self.issues.push(issue);
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings > 0
    }

    /// No errors. Warnings do not block submission.
    pub fn is_valid(&self) -> bool {
        self.errors == 0
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
        self.configs_checked += other.configs_checked;
        self.errors += other.errors;
        self.warnings += other.warnings;
    }

    /// Attach `source` to every issue that has none yet.
    pub fn with_source(mut self, source: &Path) -> Self {
        for issue in &mut self.issues {
            if issue.source.is_none() {
                issue.source = Some(source.to_path_buf());
            }
        }
        self
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.issues.iter().map(|i| i.code).collect()
    }

    pub fn errors_only(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn summary(&self) -> String {
        match (self.errors, self.warnings) {
            (0, 0) => "Valid".to_string(),
            (e, 0) => format!("{e} error{}", plural(e)),
            (0, w) => format!("{w} warning{}", plural(w)),
            (e, w) => format!("{e} error{}, {w} warning{}", plural(e), plural(w)),
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Knobs for validation.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Report unpaired certificate/key material as a warning instead of an
    /// error, leaving the decision to the server.
    pub defer_ssl_pairing: bool,
}
