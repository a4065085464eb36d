//! Schemas for atom front-matter and molecule/programme YAML documents.
//!
//! Each document is first deserialized into a permissive `Raw*` struct (every
//! field optional, unknown fields rejected), then checked field by field so a
//! single schema error can name every failing field of the record.

use std::fmt::Display;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use tracing::debug;

use coursebuild_shared::{
    Atom, AtomKind, Course, CourseBuildError, ExerciseCategory, Programme, Result, Section,
    Series, SeriesType, Step,
};

use crate::frontmatter::split_front_matter;

const DEFAULT_DIFFICULTY: i64 = 1;
const DEFAULT_TIME_MINUTES: i64 = 5;
const DEFAULT_SUCCESS_THRESHOLD: i64 = 70;
const MIN_SERIES_STEPS: usize = 2;

// ---------------------------------------------------------------------------
// Raw documents
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawAtom {
    #[serde(rename = "type")]
    kind: Option<AtomKind>,
    title: Option<String>,
    difficulty: Option<i64>,
    time_minutes: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
    category: Option<ExerciseCategory>,
    correct_option: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawCourse {
    title: Option<String>,
    description: Option<String>,
    programme: Option<String>,
    trimester: Option<Value>,
    order: Option<i64>,
    estimated_minutes: Option<i64>,
    objectives: Option<Vec<String>>,
    sections: Option<Vec<RawSection>>,
    visible: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSection {
    label: Option<String>,
    steps: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawSeries {
    title: Option<String>,
    description: Option<String>,
    difficulty: Option<i64>,
    estimated_minutes: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(rename = "type")]
    series_type: Option<SeriesType>,
    trimestre: Option<i64>,
    #[serde(default)]
    modules: Vec<String>,
    priority: Option<i64>,
    success_threshold: Option<i64>,
    steps: Option<Vec<Value>>,
    visible: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawProgramme {
    label: Option<String>,
    level_slug: Option<String>,
    section_slug: Option<String>,
    order: Option<i64>,
    color: Option<String>,
    icon: Option<String>,
    visible: Option<bool>,
    cours: Option<Vec<String>>,
    #[serde(default)]
    series: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public parsers
// ---------------------------------------------------------------------------

/// Parse and validate one atom file.
///
/// `id`, `programme` and `module` come from the file's location in the tree.
pub fn parse_atom(
    id: &str,
    programme: &str,
    module: &str,
    path: &Path,
    text: &str,
) -> Result<Atom> {
    let record = format!("atom '{id}'");

    let Some((yaml, body)) = split_front_matter(text) else {
        return Err(CourseBuildError::schema(
            record,
            path,
            vec!["front-matter: missing or unterminated `---` block".into()],
        ));
    };

    let raw: RawAtom = from_yaml(yaml, &record, path)?;
    let mut issues = Issues::default();

    let kind = issues.required("type", raw.kind);
    let title = issues.non_empty("title", raw.title);
    let difficulty: u8 = issues.int_in("difficulty", raw.difficulty, Some(DEFAULT_DIFFICULTY), 0, 3);
    let time_minutes: u32 =
        issues.int_in("timeMinutes", raw.time_minutes, Some(DEFAULT_TIME_MINUTES), 1, i64::from(u32::MAX));
    let correct_option: Option<u32> = raw
        .correct_option
        .map(|v| issues.int_in("correctOption", Some(v), None, 0, i64::from(u32::MAX)));

    match kind {
        Some(AtomKind::Exercise) if raw.category.is_none() => {
            issues.push("category", "required when type is exercise");
        }
        Some(AtomKind::Qcm) if correct_option.is_none() => {
            issues.push("correctOption", "required when type is qcm");
        }
        _ => {}
    }
    if body.trim().is_empty() {
        issues.push("body", "must not be empty");
    }

    issues.finish(&record, path)?;

    debug!(id, kind = ?kind, "parsed atom");

    Ok(Atom {
        id: id.to_string(),
        kind: kind.unwrap_or(AtomKind::Lesson),
        title,
        difficulty,
        time_minutes,
        tags: raw.tags,
        category: raw.category,
        correct_option,
        body: body.to_string(),
        programme: programme.to_string(),
        module: module.to_string(),
        source: path.to_path_buf(),
    })
}

/// Parse and validate one course definition.
pub fn parse_course(slug: &str, path: &Path, text: &str) -> Result<Course> {
    let record = format!("cours '{slug}'");
    let raw: RawCourse = from_yaml(text, &record, path)?;
    let mut issues = Issues::default();

    let title = issues.non_empty("title", raw.title);
    let description = issues.non_empty("description", raw.description);
    let programme = issues.non_empty("programme", raw.programme);
    let trimester = issues.scalar_label("trimester", raw.trimester);
    let order: u32 = issues.int_in("order", raw.order, None, 0, i64::from(u32::MAX));
    let estimated_minutes: u32 =
        issues.int_in("estimatedMinutes", raw.estimated_minutes, None, 1, i64::from(u32::MAX));
    let objectives = issues.non_empty_list("objectives", raw.objectives);

    let raw_sections = issues.non_empty_list("sections", raw.sections);
    let mut sections = Vec::with_capacity(raw_sections.len());
    for (i, raw_section) in raw_sections.into_iter().enumerate() {
        let label = issues.non_empty(&format!("sections[{i}].label"), raw_section.label);
        let field = format!("sections[{i}].steps");
        let steps = issues.steps(&field, raw_section.steps, 1);
        sections.push(Section { label, steps });
    }

    issues.finish(&record, path)?;

    debug!(slug, sections = sections.len(), "parsed course");

    Ok(Course {
        slug: slug.to_string(),
        title,
        description,
        programme,
        trimester,
        order,
        estimated_minutes,
        objectives,
        sections,
        visible: raw.visible.unwrap_or(true),
        source: path.to_path_buf(),
    })
}

/// Parse and validate one series definition.
pub fn parse_series(slug: &str, path: &Path, text: &str) -> Result<Series> {
    let record = format!("series '{slug}'");
    let raw: RawSeries = from_yaml(text, &record, path)?;
    let mut issues = Issues::default();

    let title = issues.non_empty("title", raw.title);
    let description = issues.non_empty("description", raw.description);
    let difficulty: u8 = issues.int_in("difficulty", raw.difficulty, Some(DEFAULT_DIFFICULTY), 0, 3);
    let estimated_minutes: u32 =
        issues.int_in("estimatedMinutes", raw.estimated_minutes, None, 1, i64::from(u32::MAX));
    let trimestre: u8 = issues.int_in("trimestre", raw.trimestre, None, 1, 3);
    let priority: i32 = issues.int_in(
        "priority",
        raw.priority,
        Some(0),
        i64::from(i32::MIN),
        i64::from(i32::MAX),
    );
    let success_threshold: u8 = issues.int_in(
        "successThreshold",
        raw.success_threshold,
        Some(DEFAULT_SUCCESS_THRESHOLD),
        0,
        100,
    );
    let steps = issues.steps("steps", raw.steps, MIN_SERIES_STEPS);

    issues.finish(&record, path)?;

    debug!(slug, steps = steps.len(), "parsed series");

    Ok(Series {
        slug: slug.to_string(),
        title,
        description,
        difficulty,
        estimated_minutes,
        tags: raw.tags,
        series_type: raw.series_type.unwrap_or_default(),
        trimestre,
        modules: raw.modules,
        priority,
        success_threshold,
        steps,
        visible: raw.visible.unwrap_or(true),
        source: path.to_path_buf(),
    })
}

/// Parse and validate one programme definition.
pub fn parse_programme(id: &str, path: &Path, text: &str) -> Result<Programme> {
    let record = format!("programme '{id}'");
    let raw: RawProgramme = from_yaml(text, &record, path)?;
    let mut issues = Issues::default();

    let label = issues.non_empty("label", raw.label);
    let level_slug = issues.non_empty("levelSlug", raw.level_slug);
    let section_slug = issues.non_empty("sectionSlug", raw.section_slug);
    let order: u32 = issues.int_in("order", raw.order, None, 0, i64::from(u32::MAX));
    let color = issues.non_empty("color", raw.color);
    let icon = issues.non_empty("icon", raw.icon);
    let cours = issues.required("cours", raw.cours).unwrap_or_default();

    issues.finish(&record, path)?;

    debug!(id, cours = cours.len(), series = raw.series.len(), "parsed programme");

    Ok(Programme {
        id: id.to_string(),
        label,
        level_slug,
        section_slug,
        order,
        color,
        icon,
        visible: raw.visible.unwrap_or(true),
        cours,
        series: raw.series,
        source: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Deserialize a YAML document, treating an empty document as an empty mapping.
fn from_yaml<T: DeserializeOwned>(yaml: &str, record: &str, path: &Path) -> Result<T> {
    let yaml = if yaml.trim().is_empty() { "{}" } else { yaml };
    serde_yaml::from_str(yaml)
        .map_err(|e| CourseBuildError::schema(record, path, vec![e.to_string()]))
}

/// Field-level problems collected for one record.
#[derive(Debug, Default)]
struct Issues {
    list: Vec<String>,
}

impl Issues {
    fn push(&mut self, field: &str, message: impl Display) {
        self.list.push(format!("{field}: {message}"));
    }

    fn required<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.push(field, "is required");
        }
        value
    }

    fn non_empty(&mut self, field: &str, value: Option<String>) -> String {
        match value {
            Some(v) if !v.trim().is_empty() => v,
            Some(_) => {
                self.push(field, "must not be empty");
                String::new()
            }
            None => {
                self.push(field, "is required");
                String::new()
            }
        }
    }

    fn non_empty_list<T>(&mut self, field: &str, value: Option<Vec<T>>) -> Vec<T> {
        match value {
            Some(v) if !v.is_empty() => v,
            Some(_) => {
                self.push(field, "must contain at least one entry");
                Vec::new()
            }
            None => {
                self.push(field, "is required");
                Vec::new()
            }
        }
    }

    /// Check an integer field against `min..=max`, applying `default` when absent.
    fn int_in<T>(&mut self, field: &str, value: Option<i64>, default: Option<i64>, min: i64, max: i64) -> T
    where
        T: TryFrom<i64> + Default,
    {
        let Some(v) = value.or(default) else {
            self.push(field, "is required");
            return T::default();
        };
        if v < min || v > max {
            if max == i64::from(u32::MAX) {
                self.push(field, format!("must be at least {min} (got {v})"));
            } else {
                self.push(field, format!("must be between {min} and {max} (got {v})"));
            }
            return T::default();
        }
        T::try_from(v).unwrap_or_default()
    }

    /// A short label that authors may write as a string or a number.
    fn scalar_label(&mut self, field: &str, value: Option<Value>) -> String {
        match value {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => {
                self.push(field, "must be a non-empty string or number");
                String::new()
            }
            None => {
                self.push(field, "is required");
                String::new()
            }
        }
    }

    /// Convert a raw step list, requiring at least `min` entries.
    fn steps(&mut self, field: &str, value: Option<Vec<Value>>, min: usize) -> Vec<Step> {
        let Some(raw) = value else {
            self.push(field, "is required");
            return Vec::new();
        };
        if raw.len() < min {
            let noun = if min == 1 { "entry" } else { "entries" };
            self.push(field, format!("must contain at least {min} {noun} (got {})", raw.len()));
        }
        raw.iter()
            .enumerate()
            .filter_map(|(i, v)| self.step(&format!("{field}[{i}]"), v))
            .collect()
    }

    fn step(&mut self, field: &str, value: &Value) -> Option<Step> {
        match value {
            Value::String(id) if !id.trim().is_empty() => Some(Step::atom(id.trim())),
            Value::Mapping(map) => {
                let group = match map.get("quiz") {
                    Some(Value::Sequence(items)) if map.len() == 1 => items,
                    _ => {
                        self.push(field, "a step mapping must have exactly one key, `quiz`, holding a list");
                        return None;
                    }
                };
                if group.is_empty() {
                    self.push(field, "quiz group must contain at least one atom ID");
                    return None;
                }
                let mut ids = Vec::with_capacity(group.len());
                for (j, item) in group.iter().enumerate() {
                    match item {
                        Value::String(id) if !id.trim().is_empty() => ids.push(id.trim().to_string()),
                        _ => self.push(&format!("{field}.quiz[{j}]"), "must be a non-empty atom ID"),
                    }
                }
                (ids.len() == group.len()).then(|| Step::quiz_group(ids))
            }
            _ => {
                self.push(field, "expected an atom ID or a `{quiz: [...]}` group");
                None
            }
        }
    }

    fn finish(self, record: &str, path: &Path) -> Result<()> {
        if self.list.is_empty() {
            Ok(())
        } else {
            Err(CourseBuildError::schema(record, path, self.list))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn issues_of(err: CourseBuildError) -> Vec<String> {
        match err {
            CourseBuildError::Schema { issues, .. } => issues,
            other => panic!("expected schema error, got {other}"),
        }
    }

    #[test]
    fn atom_defaults_applied() {
        let text = "---\ntype: lesson\ntitle: Limites\n---\nUne limite...\n";
        let atom = parse_atom("lim-intro", "terminale", "limites", Path::new("x.md"), text).unwrap();
        assert_eq!(atom.kind, AtomKind::Lesson);
        assert_eq!(atom.difficulty, 1);
        assert_eq!(atom.time_minutes, 5);
        assert!(atom.tags.is_empty());
        assert_eq!(atom.programme, "terminale");
        assert_eq!(atom.module, "limites");
        assert_eq!(atom.body, "Une limite...\n");
    }

    #[test]
    fn exercise_without_category_fails() {
        let text = "---\ntype: exercise\ntitle: Ex 1\n---\nCalculer...\n";
        let err = parse_atom("ex-1", "p", "m", Path::new("ex-1.md"), text).unwrap_err();
        assert!(err.to_string().contains("atom 'ex-1'"));
        let issues = issues_of(err);
        assert_eq!(issues, vec!["category: required when type is exercise".to_string()]);
    }

    #[test]
    fn qcm_without_correct_option_fails_even_with_marker() {
        let text = "---\ntype: qcm\ntitle: Q\n---\n<Question>?</Question>\n<Option correct>a</Option>\n<Option>b</Option>\n";
        let err = parse_atom("q-1", "p", "m", Path::new("q-1.md"), text).unwrap_err();
        assert!(issues_of(err).iter().any(|i| i.starts_with("correctOption")));
    }

    #[test]
    fn atom_reports_every_failing_field() {
        let text = "---\ntype: lesson\ntitle: \"\"\ndifficulty: 7\ntimeMinutes: 0\n---\n   \n";
        let issues = issues_of(parse_atom("bad", "p", "m", Path::new("bad.md"), text).unwrap_err());
        assert_eq!(issues.len(), 4, "{issues:?}");
        assert!(issues.iter().any(|i| i.starts_with("title")));
        assert!(issues.iter().any(|i| i.contains("difficulty: must be between 0 and 3 (got 7)")));
        assert!(issues.iter().any(|i| i.starts_with("timeMinutes")));
        assert!(issues.iter().any(|i| i.starts_with("body")));
    }

    #[test]
    fn atom_unknown_field_and_bad_enum_rejected() {
        let text = "---\ntype: lesson\ntitle: A\ncolour: red\n---\nx\n";
        assert!(parse_atom("a", "p", "m", Path::new("a.md"), text).is_err());

        let text = "---\ntype: video\ntitle: A\n---\nx\n";
        let err = parse_atom("a", "p", "m", Path::new("a.md"), text).unwrap_err();
        assert!(err.to_string().contains("atom 'a'"));
    }

    #[test]
    fn atom_without_front_matter_fails() {
        let err = parse_atom("a", "p", "m", Path::new("a.md"), "# Just markdown\n").unwrap_err();
        assert!(err.to_string().contains("front-matter"));
    }

    const COURSE: &str = r#"
title: Limites de fonctions
description: Comportement asymptotique
programme: terminale-spe
trimester: 1
order: 2
estimatedMinutes: 90
objectives:
  - Calculer une limite
sections:
  - label: Découvrir
    steps:
      - lesson-a
      - quiz: [qcm-b, qcm-c]
"#;

    #[test]
    fn course_parses_steps_as_tagged_variants() {
        let course = parse_course("limites", Path::new("limites.yaml"), COURSE).unwrap();
        assert_eq!(course.trimester, "1");
        assert_eq!(course.sections.len(), 1);
        assert_eq!(
            course.sections[0].steps,
            vec![Step::atom("lesson-a"), Step::quiz_group(["qcm-b", "qcm-c"])]
        );
        assert!(course.visible);
    }

    #[test]
    fn course_empty_section_steps_rejected() {
        let text = COURSE.replace(
            "    steps:\n      - lesson-a\n      - quiz: [qcm-b, qcm-c]\n",
            "    steps: []\n",
        );
        let issues = issues_of(parse_course("limites", Path::new("l.yaml"), &text).unwrap_err());
        assert_eq!(issues, vec!["sections[0].steps: must contain at least 1 entry (got 0)".to_string()]);
    }

    #[test]
    fn malformed_step_shapes_rejected() {
        let text = COURSE.replace("- quiz: [qcm-b, qcm-c]", "- {quiz: [], extra: 1}");
        let issues = issues_of(parse_course("limites", Path::new("l.yaml"), &text).unwrap_err());
        assert!(issues[0].starts_with("sections[0].steps[1]"));

        let text = COURSE.replace("- quiz: [qcm-b, qcm-c]", "- quiz: []");
        let issues = issues_of(parse_course("limites", Path::new("l.yaml"), &text).unwrap_err());
        assert!(issues[0].contains("at least one atom ID"));
    }

    #[test]
    fn series_defaults_and_minimum_steps() {
        let text = r#"
title: Entraînement limites
description: Série courte
estimatedMinutes: 20
trimestre: 2
steps:
  - qcm-b
  - qcm-c
"#;
        let series = parse_series("entr-lim", Path::new("s.yaml"), text).unwrap();
        assert_eq!(series.series_type, SeriesType::SingleModule);
        assert_eq!(series.success_threshold, 70);
        assert_eq!(series.priority, 0);
        assert_eq!(series.difficulty, 1);

        let short = text.replace("  - qcm-c\n", "");
        let issues = issues_of(parse_series("entr-lim", Path::new("s.yaml"), &short).unwrap_err());
        assert_eq!(issues, vec!["steps: must contain at least 2 entries (got 1)".to_string()]);
    }

    #[test]
    fn series_range_checks() {
        let text = r#"
title: T
description: D
estimatedMinutes: 20
trimestre: 4
successThreshold: 120
type: exam
steps: [a, b]
"#;
        let issues = issues_of(parse_series("s", Path::new("s.yaml"), text).unwrap_err());
        assert_eq!(issues.len(), 2);
        assert!(issues[0].starts_with("trimestre"));
        assert!(issues[1].starts_with("successThreshold"));
    }

    #[test]
    fn programme_parses_with_defaults() {
        let text = r##"
label: Terminale spécialité
levelSlug: terminale
sectionSlug: spe
order: 1
color: "#1d4ed8"
icon: sigma
cours: [limites]
"##;
        let programme = parse_programme("terminale-spe", Path::new("programme.yaml"), text).unwrap();
        assert!(programme.visible);
        assert!(programme.series.is_empty());
        assert_eq!(programme.cours, vec!["limites".to_string()]);

        let missing = text.replace("cours: [limites]\n", "");
        let issues = issues_of(parse_programme("t", Path::new("p.yaml"), &missing).unwrap_err());
        assert_eq!(issues, vec!["cours: is required".to_string()]);
    }
}
