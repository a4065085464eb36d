//! Source model for a content corpus: atoms, steps, molecules, programmes.
//!
//! These records are produced by the readers in `coursebuild-content` and
//! stay immutable for the rest of a pipeline run.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Atoms
// ---------------------------------------------------------------------------

/// Kind of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomKind {
    Lesson,
    Exercise,
    Qcm,
}

impl AtomKind {
    /// Stable string form used in logs and output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lesson => "lesson",
            Self::Exercise => "exercise",
            Self::Qcm => "qcm",
        }
    }

    /// Whether atoms of this kind compile to a single HTML fragment.
    pub fn is_prose(self) -> bool {
        !matches!(self, Self::Qcm)
    }
}

impl fmt::Display for AtomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of an exercise atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseCategory {
    Application,
    Methode,
    Probleme,
    Synthese,
}

/// The smallest content unit: one lesson, exercise, or quiz question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Atom {
    /// Globally unique ID (the source file stem).
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AtomKind,
    pub title: String,
    /// 0 to 3.
    pub difficulty: u8,
    pub time_minutes: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ExerciseCategory>,
    /// Zero-based index of the correct option. Qcm atoms only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<u32>,
    /// Raw markup body (front-matter stripped).
    pub body: String,
    /// Programme directory the atom was read from.
    pub programme: String,
    /// Module directory the atom was read from.
    pub module: String,
    #[serde(skip)]
    pub source: PathBuf,
}

// ---------------------------------------------------------------------------
// Steps & molecules
// ---------------------------------------------------------------------------

/// One entry in a molecule's ordered activity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Step {
    /// A single atom.
    Atom { id: String },
    /// Quiz atoms presented together as one activity.
    QuizGroup { ids: Vec<String> },
}

impl Step {
    pub fn atom(id: impl Into<String>) -> Self {
        Self::Atom { id: id.into() }
    }

    pub fn quiz_group<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::QuizGroup {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Every atom ID this step references, in order.
    pub fn atom_ids(&self) -> &[String] {
        match self {
            Self::Atom { id } => std::slice::from_ref(id),
            Self::QuizGroup { ids } => ids,
        }
    }
}

/// A labelled group of steps inside a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub label: String,
    pub steps: Vec<Step>,
}

/// A structured lesson plan ("cours").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// File stem of the definition file.
    pub slug: String,
    pub title: String,
    pub description: String,
    /// Owning programme ID.
    pub programme: String,
    pub trimester: String,
    pub order: u32,
    pub estimated_minutes: u32,
    pub objectives: Vec<String>,
    pub sections: Vec<Section>,
    pub visible: bool,
    #[serde(skip)]
    pub source: PathBuf,
}

impl Course {
    /// All steps across all sections, in order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.sections.iter().flat_map(|s| s.steps.iter())
    }
}

/// Type tag of a practice series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesType {
    #[default]
    SingleModule,
    CrossModule,
    Test,
    Exam,
}

/// A cross-cutting practice set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub difficulty: u8,
    pub estimated_minutes: u32,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub series_type: SeriesType,
    /// 1, 2 or 3.
    pub trimestre: u8,
    /// Related course slugs.
    pub modules: Vec<String>,
    pub priority: i32,
    /// Percentage, 0 to 100.
    pub success_threshold: u8,
    pub steps: Vec<Step>,
    pub visible: bool,
    #[serde(skip)]
    pub source: PathBuf,
}

/// Top-level learner-facing track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Programme {
    /// Programme directory name.
    pub id: String,
    pub label: String,
    pub level_slug: String,
    pub section_slug: String,
    pub order: u32,
    pub color: String,
    pub icon: String,
    pub visible: bool,
    /// Course slugs.
    pub cours: Vec<String>,
    /// Series slugs.
    pub series: Vec<String>,
    #[serde(skip)]
    pub source: PathBuf,
}

/// Everything the readers produced for one run.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub atoms: Vec<Atom>,
    pub courses: Vec<Course>,
    pub series: Vec<Series>,
    pub programmes: Vec<Programme>,
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One result of the integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// What the finding is about, e.g. `atom:limits-intro` or `cours:limits`.
    pub source: String,
    pub message: String,
    pub severity: Severity,
}

impl Finding {
    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "[{level}] {}: {}", self.source, self.message)
    }
}
