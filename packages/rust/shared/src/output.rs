//! Records written to the generated-content tree.
//!
//! Everything here serializes with camelCase keys, which is the shape the
//! web layer reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AtomKind, SeriesType};

/// Current schema version for `manifest.json`.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Compiled atoms
// ---------------------------------------------------------------------------

/// A compiled quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledQuiz {
    pub id: String,
    pub title: String,
    pub compiled_question_html: String,
    pub compiled_option_html_list: Vec<String>,
    /// Taken from the atom's `correctOption` metadata.
    pub correct_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiled_explanation_html: Option<String>,
    pub time_minutes: u32,
}

/// The derived artifact of one atom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum CompiledAtom {
    /// Lesson or exercise rendered to one HTML fragment.
    Html { id: String, html: String },
    Quiz(CompiledQuiz),
}

impl CompiledAtom {
    pub fn id(&self) -> &str {
        match self {
            Self::Html { id, .. } => id,
            Self::Quiz(quiz) => &quiz.id,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved molecules
// ---------------------------------------------------------------------------

/// A step after dereferencing against the atom corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedActivity {
    pub id: String,
    pub kind: AtomKind,
    pub title: String,
    pub time_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    /// Member atoms of a quiz group, in presentation order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_atom_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSection {
    pub id: String,
    pub label: String,
    pub activities: Vec<ResolvedActivity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCourse {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub programme: String,
    pub trimester: String,
    pub order: u32,
    pub estimated_minutes: u32,
    pub objectives: Vec<String>,
    pub visible: bool,
    pub sections: Vec<ResolvedSection>,
    pub total_activities: usize,
}

impl ResolvedCourse {
    /// All activities across sections, in order.
    pub fn activities(&self) -> impl Iterator<Item = &ResolvedActivity> {
        self.sections.iter().flat_map(|s| s.activities.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSeries {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub difficulty: u8,
    pub estimated_minutes: u32,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub series_type: SeriesType,
    pub trimestre: u8,
    pub modules: Vec<String>,
    pub priority: i32,
    pub success_threshold: u8,
    pub visible: bool,
    pub activities: Vec<ResolvedActivity>,
    pub total_activities: usize,
}

// ---------------------------------------------------------------------------
// Catalogues & routing
// ---------------------------------------------------------------------------

/// List-view projection of one course inside a catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueModule {
    pub slug: String,
    pub title: String,
    pub trimester: String,
    pub order: u32,
    pub total_activities: usize,
    pub estimated_minutes: u32,
    pub activity_ids: Vec<String>,
    pub visible: bool,
}

/// List-view projection of one series inside a catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueSeries {
    pub slug: String,
    pub title: String,
    #[serde(rename = "type")]
    pub series_type: SeriesType,
    pub trimestre: u8,
    pub priority: i32,
    pub modules: Vec<String>,
    pub total_activities: usize,
    pub estimated_minutes: u32,
    pub activity_ids: Vec<String>,
    pub visible: bool,
}

/// The assembled view of one programme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalogue {
    pub programme: String,
    pub label: String,
    pub modules: Vec<CatalogueModule>,
    pub series: Vec<CatalogueSeries>,
}

/// One row of `parcours.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcoursEntry {
    pub slug: String,
    pub label: String,
    pub level_slug: String,
    pub section_slug: String,
    pub order: u32,
    pub visible: bool,
    /// At least one of the programme's courses is present and visible.
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCounts {
    pub atoms: usize,
    pub html_atoms: usize,
    pub qcm_atoms: usize,
    pub courses: usize,
    pub series: usize,
    pub programmes: usize,
    pub catalogues: usize,
}

/// The `manifest.json` written at the root of the output tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub tool_version: String,
    pub counts: ManifestCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_quiz_field_names() {
        let quiz = CompiledQuiz {
            id: "qcm-b".into(),
            title: "Limite en l'infini".into(),
            compiled_question_html: "<p>Q</p>\n".into(),
            compiled_option_html_list: vec!["<p>A</p>\n".into(), "<p>B</p>\n".into()],
            correct_index: 1,
            compiled_explanation_html: None,
            time_minutes: 2,
        };
        let json = serde_json::to_value(&quiz).expect("serialize");
        assert_eq!(json["compiledOptionHtmlList"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["correctIndex"], 1);
        assert!(json.get("compiledExplanationHtml").is_none());
    }

    #[test]
    fn activity_omits_absent_optionals() {
        let activity = ResolvedActivity {
            id: "lesson-a".into(),
            kind: AtomKind::Lesson,
            title: "Intro".into(),
            time_minutes: 5,
            section_id: None,
            quiz_atom_ids: None,
        };
        let json = serde_json::to_string(&activity).expect("serialize");
        assert_eq!(
            json,
            r#"{"id":"lesson-a","kind":"lesson","title":"Intro","timeMinutes":5}"#
        );
    }

    #[test]
    fn compiled_atom_tagged_by_format() {
        let atom = CompiledAtom::Html {
            id: "l1".into(),
            html: "<p>x</p>".into(),
        };
        let json = serde_json::to_value(&atom).expect("serialize");
        assert_eq!(json["format"], "html");
        let back: CompiledAtom = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.id(), "l1");
    }
}
