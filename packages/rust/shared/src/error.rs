//! Error types for coursebuild.
//!
//! Library crates use [`CourseBuildError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::{Finding, Severity};

/// Top-level error type for all coursebuild operations.
#[derive(Debug, thiserror::Error)]
pub enum CourseBuildError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A source record failed shape/type/range checks.
    #[error("schema error in {record} ({path:?}): {}", .issues.join("; "))]
    Schema {
        /// Record kind and ID, e.g. `atom 'limits-intro'`.
        record: String,
        path: PathBuf,
        /// One entry per failing field.
        issues: Vec<String>,
    },

    /// The validator produced at least one error-severity finding.
    #[error("integrity check failed with {} error(s):{}", error_count(.findings), render_errors(.findings))]
    Integrity { findings: Vec<Finding> },

    /// An atom body could not be compiled.
    #[error("failed to compile atom '{atom}': {message}")]
    Compile { atom: String, message: String },

    /// Malformed markup inside a body (raised by the markup compiler, then
    /// attributed to an atom by the compile stage).
    #[error("markup error: {message}")]
    Markup { message: String },

    /// JSON serialization of an output record failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CourseBuildError>;

impl CourseBuildError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a schema error for one record.
    pub fn schema(record: impl Into<String>, path: impl Into<PathBuf>, issues: Vec<String>) -> Self {
        Self::Schema {
            record: record.into(),
            path: path.into(),
            issues,
        }
    }

    /// Create a markup error from any displayable message.
    pub fn markup(msg: impl Into<String>) -> Self {
        Self::Markup {
            message: msg.into(),
        }
    }

    /// Attribute a failure to a specific atom.
    pub fn compile(atom: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Compile {
            atom: atom.into(),
            message: msg.into(),
        }
    }
}

fn error_count(findings: &[Finding]) -> usize {
    findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .count()
}

fn render_errors(findings: &[Finding]) -> String {
    findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .map(|f| format!("\n  - {f}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CourseBuildError::config("concurrency must be at least 1");
        assert_eq!(err.to_string(), "config error: concurrency must be at least 1");

        let err = CourseBuildError::compile("limits-intro", "unclosed <Theorem>");
        assert!(err.to_string().contains("limits-intro"));
        assert!(err.to_string().contains("unclosed <Theorem>"));
    }

    #[test]
    fn schema_error_names_record_and_fields() {
        let err = CourseBuildError::schema(
            "atom 'ex-1'",
            "content/programmes/p/m/ex-1.md",
            vec![
                "category: required when type is exercise".into(),
                "difficulty: must be between 0 and 3 (got 7)".into(),
            ],
        );
        let msg = err.to_string();
        assert!(msg.contains("atom 'ex-1'"));
        assert!(msg.contains("category"));
        assert!(msg.contains("difficulty"));
    }

    #[test]
    fn integrity_error_lists_only_errors() {
        let err = CourseBuildError::Integrity {
            findings: vec![
                Finding::error("atom:dup", "duplicate atom ID 'dup'"),
                Finding::warning("cours:c1", "step references unknown atom 'x'"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("integrity check failed with 1 error(s)"));
        assert!(msg.contains("duplicate atom ID 'dup'"));
        assert!(!msg.contains("unknown atom 'x'"));
    }
}
