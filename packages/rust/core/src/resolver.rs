//! Step resolution: molecule step lists to ordered activity sequences.
//!
//! Dangling references are tolerated here. The validator has already
//! reported them, so a missing atom just produces no activity.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, instrument};

use coursebuild_shared::{
    Atom, AtomKind, Course, ResolvedActivity, ResolvedCourse, ResolvedSection, ResolvedSeries,
    Series, Step,
};

/// Duration counted for a quiz group member that cannot be found.
const MISSING_MEMBER_MINUTES: u32 = 1;

/// Atoms by ID, borrowed from the corpus.
pub type AtomIndex<'a> = HashMap<&'a str, &'a Atom>;

/// Index atoms by ID. The first occurrence of a duplicated ID wins.
pub fn index_atoms(atoms: &[Atom]) -> AtomIndex<'_> {
    let mut index = AtomIndex::with_capacity(atoms.len());
    for atom in atoms {
        index.entry(atom.id.as_str()).or_insert(atom);
    }
    index
}

/// Resolve every course, keyed by slug.
#[instrument(skip_all, fields(courses = courses.len()))]
pub fn resolve_courses(courses: &[Course], atoms: &AtomIndex<'_>) -> BTreeMap<String, ResolvedCourse> {
    courses
        .iter()
        .map(|c| (c.slug.clone(), resolve_course(c, atoms)))
        .collect()
}

/// Resolve every series, keyed by slug.
#[instrument(skip_all, fields(series = series.len()))]
pub fn resolve_all_series(series: &[Series], atoms: &AtomIndex<'_>) -> BTreeMap<String, ResolvedSeries> {
    series
        .iter()
        .map(|s| (s.slug.clone(), resolve_series(s, atoms)))
        .collect()
}

pub fn resolve_course(course: &Course, atoms: &AtomIndex<'_>) -> ResolvedCourse {
    let labels: Vec<&str> = course.sections.iter().map(|s| s.label.as_str()).collect();
    let sections: Vec<ResolvedSection> = course
        .sections
        .iter()
        .zip(section_ids(&labels))
        .map(|(section, id)| ResolvedSection {
            activities: section
                .steps
                .iter()
                .filter_map(|step| resolve_step(step, atoms, Some(id.as_str())))
                .collect(),
            label: section.label.clone(),
            id,
        })
        .collect();

    let total_activities = sections.iter().map(|s| s.activities.len()).sum();

    ResolvedCourse {
        slug: course.slug.clone(),
        title: course.title.clone(),
        description: course.description.clone(),
        programme: course.programme.clone(),
        trimester: course.trimester.clone(),
        order: course.order,
        estimated_minutes: course.estimated_minutes,
        objectives: course.objectives.clone(),
        visible: course.visible,
        sections,
        total_activities,
    }
}

pub fn resolve_series(series: &Series, atoms: &AtomIndex<'_>) -> ResolvedSeries {
    let activities: Vec<ResolvedActivity> = series
        .steps
        .iter()
        .filter_map(|step| resolve_step(step, atoms, None))
        .collect();

    ResolvedSeries {
        slug: series.slug.clone(),
        title: series.title.clone(),
        description: series.description.clone(),
        difficulty: series.difficulty,
        estimated_minutes: series.estimated_minutes,
        tags: series.tags.clone(),
        series_type: series.series_type,
        trimestre: series.trimestre,
        modules: series.modules.clone(),
        priority: series.priority,
        success_threshold: series.success_threshold,
        visible: series.visible,
        total_activities: activities.len(),
        activities,
    }
}

/// Resolve one step. `None` when nothing it references exists.
pub fn resolve_step(
    step: &Step,
    atoms: &AtomIndex<'_>,
    section_id: Option<&str>,
) -> Option<ResolvedActivity> {
    match step {
        Step::Atom { id } => {
            let atom = atoms.get(id.as_str())?;
            Some(ResolvedActivity {
                id: atom.id.clone(),
                kind: atom.kind,
                title: atom.title.clone(),
                time_minutes: atom.time_minutes,
                section_id: section_id.map(str::to_string),
                quiz_atom_ids: None,
            })
        }
        Step::QuizGroup { ids } => {
            let first = ids.first()?;
            if !ids.iter().any(|id| atoms.contains_key(id.as_str())) {
                return None;
            }

            let time_minutes = ids
                .iter()
                .map(|id| match atoms.get(id.as_str()) {
                    Some(atom) => atom.time_minutes,
                    None => {
                        debug!(atom = %id, "quiz group member missing, counting {MISSING_MEMBER_MINUTES} minute");
                        MISSING_MEMBER_MINUTES
                    }
                })
                .fold(0u32, u32::saturating_add);

            Some(ResolvedActivity {
                id: first.clone(),
                kind: AtomKind::Qcm,
                title: quiz_group_title(ids.len()),
                time_minutes,
                section_id: section_id.map(str::to_string),
                quiz_atom_ids: Some(ids.clone()),
            })
        }
    }
}

fn quiz_group_title(n: usize) -> String {
    if n == 1 {
        "Quiz (1 question)".to_string()
    } else {
        format!("Quiz ({n} questions)")
    }
}

// ---------------------------------------------------------------------------
// Section IDs
// ---------------------------------------------------------------------------

/// Stable section IDs: the slug of each label, suffixed `-2`, `-3`, ... when
/// an earlier section already took it.
pub fn section_ids(labels: &[&str]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    labels
        .iter()
        .map(|label| {
            let base = slugify(label);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{base}-{count}")
            }
        })
        .collect()
}

/// Lowercase ASCII slug. Common Latin accents are folded; anything else
/// that is not alphanumeric becomes a single `-`.
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for c in label.chars().flat_map(char::to_lowercase) {
        match fold_accent(c) {
            Some(folded) => slug.push_str(folded),
            None if c.is_ascii_alphanumeric() => slug.push(c),
            None => {
                if !slug.is_empty() && !slug.ends_with('-') {
                    slug.push('-');
                }
            }
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("section");
    }
    slug
}

fn fold_accent(c: char) -> Option<&'static str> {
    Some(match c {
        'à' | 'â' | 'ä' | 'á' | 'ã' => "a",
        'é' | 'è' | 'ê' | 'ë' => "e",
        'î' | 'ï' | 'í' | 'ì' => "i",
        'ô' | 'ö' | 'ó' | 'ò' | 'õ' => "o",
        'ù' | 'û' | 'ü' | 'ú' => "u",
        'ÿ' => "y",
        'ç' => "c",
        'ñ' => "n",
        'œ' => "oe",
        'æ' => "ae",
        _ => return None,
    })
}
