//! Corpus-wide integrity checks.
//!
//! Runs after every record has passed its schema and before anything is
//! compiled. Produces findings only; the corpus is never modified.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, instrument};

use coursebuild_markdown::parse_quiz;
use coursebuild_shared::{
    Atom, AtomKind, Corpus, CourseBuildError, Finding, Result, Severity, Step,
};

/// Findings of one validation pass, in a stable order.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        self.findings.iter().filter(|f| f.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(Finding::is_error)
    }

    /// `Err(Integrity)` carrying every finding if any of them is an error.
    pub fn into_result(self) -> Result<Vec<Finding>> {
        if self.has_errors() {
            Err(CourseBuildError::Integrity {
                findings: self.findings,
            })
        } else {
            Ok(self.findings)
        }
    }
}

/// Cross-check references across the whole corpus.
///
/// `orphan_preview` caps how many unreferenced atom IDs are listed in the
/// aggregated orphan warning.
#[instrument(skip_all, fields(atoms = corpus.atoms.len(), courses = corpus.courses.len(), series = corpus.series.len()))]
pub fn validate(corpus: &Corpus, orphan_preview: usize) -> ValidationReport {
    let mut findings = Vec::new();

    let atoms: HashMap<&str, &Atom> = corpus
        .atoms
        .iter()
        .map(|a| (a.id.as_str(), a))
        .collect();

    check_duplicate_atoms(corpus, &mut findings);
    check_atom_metadata(corpus, &mut findings);
    check_programmes(corpus, &mut findings);
    check_course_steps(corpus, &atoms, &mut findings);
    check_series_steps(corpus, &atoms, &mut findings);
    check_orphans(corpus, orphan_preview, &mut findings);

    let report = ValidationReport { findings };
    debug!(
        errors = report.error_count(),
        warnings = report.warning_count(),
        "validation finished"
    );
    report
}

// ---------------------------------------------------------------------------
// Atoms
// ---------------------------------------------------------------------------

fn check_duplicate_atoms(corpus: &Corpus, findings: &mut Vec<Finding>) {
    let mut by_id: BTreeMap<&str, Vec<&Atom>> = BTreeMap::new();
    for atom in &corpus.atoms {
        by_id.entry(&atom.id).or_default().push(atom);
    }

    for (id, holders) in by_id.into_iter().filter(|(_, h)| h.len() > 1) {
        let paths: Vec<String> = holders
            .iter()
            .map(|a| a.source.display().to_string())
            .collect();
        findings.push(Finding::error(
            format!("atom:{id}"),
            format!(
                "duplicate atom ID '{id}' defined in {} files: {}",
                paths.len(),
                paths.join(", ")
            ),
        ));
    }
}

fn check_atom_metadata(corpus: &Corpus, findings: &mut Vec<Finding>) {
    for atom in &corpus.atoms {
        let source = format!("atom:{}", atom.id);
        match atom.kind {
            AtomKind::Qcm => match atom.correct_option {
                None => findings.push(Finding::error(
                    source,
                    "qcm atom has no correctOption",
                )),
                Some(index) => check_quiz_markers(atom, index, source, findings),
            },
            AtomKind::Exercise if atom.category.is_none() => {
                findings.push(Finding::error(source, "exercise atom has no category"));
            }
            _ => {}
        }
    }
}

/// The `correct` markers in a qcm body, when present, must agree with
/// `correctOption`, and the index must point at an existing option.
fn check_quiz_markers(atom: &Atom, index: u32, source: String, findings: &mut Vec<Finding>) {
    let quiz = match parse_quiz(&atom.body) {
        Ok(quiz) => quiz,
        Err(e) => {
            // Reported with the atom ID by the compile stage.
            debug!(atom = %atom.id, error = %e, "quiz body not parseable, skipping marker check");
            return;
        }
    };

    let index = index as usize;
    if index >= quiz.options.len() {
        findings.push(Finding::error(
            source,
            format!(
                "correctOption is {index} but the body has only {} options",
                quiz.options.len()
            ),
        ));
        return;
    }

    let marked = quiz.marked_correct();
    if !marked.is_empty() && marked != [index] {
        let marked: Vec<String> = marked.iter().map(ToString::to_string).collect();
        findings.push(Finding::error(
            source,
            format!(
                "correctOption is {index} but the body marks option(s) {} as correct",
                marked.join(", ")
            ),
        ));
    }
}

// ---------------------------------------------------------------------------
// Programmes
// ---------------------------------------------------------------------------

fn check_programmes(corpus: &Corpus, findings: &mut Vec<Finding>) {
    let courses: BTreeSet<&str> = corpus.courses.iter().map(|c| c.slug.as_str()).collect();
    let series: BTreeSet<&str> = corpus.series.iter().map(|s| s.slug.as_str()).collect();
    let mut tracks: BTreeMap<(&str, &str), &str> = BTreeMap::new();

    for programme in &corpus.programmes {
        let source = format!("programme:{}", programme.id);

        for slug in programme.cours.iter().filter(|s| !courses.contains(s.as_str())) {
            findings.push(Finding::error(
                source.clone(),
                format!("references unknown cours '{slug}'"),
            ));
        }
        for slug in programme.series.iter().filter(|s| !series.contains(s.as_str())) {
            findings.push(Finding::error(
                source.clone(),
                format!("references unknown series '{slug}'"),
            ));
        }

        let track = (programme.level_slug.as_str(), programme.section_slug.as_str());
        if let Some(first) = tracks.insert(track, &programme.id) {
            findings.push(Finding::error(
                source,
                format!(
                    "track {}/{} is already used by programme '{first}'",
                    track.0, track.1
                ),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Molecule steps
// ---------------------------------------------------------------------------

fn check_course_steps(corpus: &Corpus, atoms: &HashMap<&str, &Atom>, findings: &mut Vec<Finding>) {
    let programmes: BTreeSet<&str> = corpus.programmes.iter().map(|p| p.id.as_str()).collect();

    for course in &corpus.courses {
        let source = format!("cours:{}", course.slug);

        if !programmes.contains(course.programme.as_str()) {
            findings.push(Finding::warning(
                source.clone(),
                format!("programme '{}' does not exist", course.programme),
            ));
        }

        for section in &course.sections {
            for step in &section.steps {
                check_step(step, atoms, &source, &format!("section '{}'", section.label), findings);
            }
        }
    }
}

fn check_series_steps(corpus: &Corpus, atoms: &HashMap<&str, &Atom>, findings: &mut Vec<Finding>) {
    let courses: BTreeSet<&str> = corpus.courses.iter().map(|c| c.slug.as_str()).collect();

    for series in &corpus.series {
        let source = format!("series:{}", series.slug);

        for module in series.modules.iter().filter(|m| !courses.contains(m.as_str())) {
            findings.push(Finding::warning(
                source.clone(),
                format!("module '{module}' is not a known cours"),
            ));
        }

        for step in &series.steps {
            check_step(step, atoms, &source, "step", findings);
        }
    }
}

fn check_step(
    step: &Step,
    atoms: &HashMap<&str, &Atom>,
    source: &str,
    context: &str,
    findings: &mut Vec<Finding>,
) {
    for id in step.atom_ids() {
        match atoms.get(id.as_str()) {
            None => findings.push(Finding::warning(
                source,
                format!("{context} references unknown atom '{id}'"),
            )),
            Some(atom) if matches!(step, Step::QuizGroup { .. }) && atom.kind != AtomKind::Qcm => {
                findings.push(Finding::warning(
                    source,
                    format!("{context} quiz group contains '{id}', which is a {} atom", atom.kind),
                ));
            }
            Some(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Orphans
// ---------------------------------------------------------------------------

fn check_orphans(corpus: &Corpus, preview: usize, findings: &mut Vec<Finding>) {
    let referenced: BTreeSet<&str> = corpus
        .courses
        .iter()
        .flat_map(|c| c.steps())
        .chain(corpus.series.iter().flat_map(|s| s.steps.iter()))
        .flat_map(|step| step.atom_ids().iter().map(String::as_str))
        .collect();

    let orphans: BTreeSet<&str> = corpus
        .atoms
        .iter()
        .map(|a| a.id.as_str())
        .filter(|id| !referenced.contains(id))
        .collect();

    if orphans.is_empty() {
        return;
    }

    let shown: Vec<&str> = orphans.iter().copied().take(preview).collect();
    let mut message = format!(
        "{} atom(s) not referenced by any cours or series: {}",
        orphans.len(),
        shown.join(", ")
    );
    if orphans.len() > shown.len() {
        message.push_str(&format!(" (+{} more)", orphans.len() - shown.len()));
    }
    findings.push(Finding::warning("atoms", message));
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use coursebuild_shared::{Course, ExerciseCategory, Programme, Section, Series, SeriesType};

    use super::*;

    fn atom(id: &str, kind: AtomKind) -> Atom {
        Atom {
            id: id.into(),
            kind,
            title: id.to_uppercase(),
            difficulty: 1,
            time_minutes: 5,
            tags: vec![],
            category: (kind == AtomKind::Exercise).then_some(ExerciseCategory::Application),
            correct_option: (kind == AtomKind::Qcm).then_some(0),
            body: match kind {
                AtomKind::Qcm => "<Question>Q</Question>\n<Option>a</Option>\n<Option>b</Option>\n".into(),
                _ => "Corps\n".into(),
            },
            programme: "premiere".into(),
            module: "suites".into(),
            source: PathBuf::from(format!("content/programmes/premiere/suites/{id}.md")),
        }
    }

    fn course(slug: &str, steps: Vec<Step>) -> Course {
        Course {
            slug: slug.into(),
            title: slug.into(),
            description: String::new(),
            programme: "premiere".into(),
            trimester: "T1".into(),
            order: 0,
            estimated_minutes: 30,
            objectives: vec!["o".into()],
            sections: vec![Section {
                label: "Cours".into(),
                steps,
            }],
            visible: true,
            source: PathBuf::new(),
        }
    }

    fn series(slug: &str, steps: Vec<Step>) -> Series {
        Series {
            slug: slug.into(),
            title: slug.into(),
            description: String::new(),
            difficulty: 1,
            estimated_minutes: 10,
            tags: vec![],
            series_type: SeriesType::SingleModule,
            trimestre: 1,
            modules: vec![],
            priority: 0,
            success_threshold: 70,
            steps,
            visible: true,
            source: PathBuf::new(),
        }
    }

    fn programme(id: &str, cours: &[&str]) -> Programme {
        Programme {
            id: id.into(),
            label: id.into(),
            level_slug: "premiere".into(),
            section_slug: id.into(),
            order: 0,
            color: "blue".into(),
            icon: "sigma".into(),
            visible: true,
            cours: cours.iter().map(|s| s.to_string()).collect(),
            series: vec![],
            source: PathBuf::new(),
        }
    }

    fn messages(report: &ValidationReport, severity: Severity) -> Vec<String> {
        report
            .findings
            .iter()
            .filter(|f| f.severity == severity)
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn clean_corpus_has_no_findings() {
        let corpus = Corpus {
            atoms: vec![atom("a", AtomKind::Lesson), atom("q", AtomKind::Qcm)],
            courses: vec![course("suites", vec![Step::atom("a"), Step::quiz_group(["q"])])],
            series: vec![],
            programmes: vec![programme("premiere", &["suites"])],
        };
        let report = validate(&corpus, 10);
        assert!(report.findings.is_empty(), "{:?}", report.findings);
    }

    #[test]
    fn duplicate_atom_names_every_path() {
        let mut second = atom("dup", AtomKind::Lesson);
        second.source = PathBuf::from("content/programmes/terminale/limites/dup.md");
        let corpus = Corpus {
            atoms: vec![atom("dup", AtomKind::Lesson), second],
            courses: vec![course("c", vec![Step::atom("dup")])],
            ..Corpus::default()
        };

        let report = validate(&corpus, 10);
        let errors = messages(&report, Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("content/programmes/premiere/suites/dup.md"));
        assert!(errors[0].contains("content/programmes/terminale/limites/dup.md"));
        assert!(report.into_result().is_err());
    }

    #[test]
    fn missing_per_kind_fields_are_errors() {
        let mut q = atom("q", AtomKind::Qcm);
        q.correct_option = None;
        let mut ex = atom("ex", AtomKind::Exercise);
        ex.category = None;
        let corpus = Corpus {
            atoms: vec![q, ex],
            courses: vec![course("c", vec![Step::atom("q"), Step::atom("ex")])],
            ..Corpus::default()
        };

        let errors = messages(&validate(&corpus, 10), Severity::Error);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("atom:q") && e.contains("correctOption")));
        assert!(errors.iter().any(|e| e.contains("atom:ex") && e.contains("category")));
    }

    #[test]
    fn programme_with_unknown_course_is_error() {
        let corpus = Corpus {
            programmes: vec![programme("premiere", &["nope"])],
            ..Corpus::default()
        };
        let report = validate(&corpus, 10);
        let errors = messages(&report, Severity::Error);
        assert_eq!(
            errors,
            vec!["[error] programme:premiere: references unknown cours 'nope'"]
        );
        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("integrity check failed with 1 error(s)"));
    }

    #[test]
    fn duplicate_track_identity_is_error() {
        let mut other = programme("premiere-bis", &[]);
        other.section_slug = "premiere".into();
        let corpus = Corpus {
            programmes: vec![programme("premiere", &[]), other],
            ..Corpus::default()
        };
        let errors = messages(&validate(&corpus, 10), Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("already used by programme 'premiere'"));
    }

    #[test]
    fn dangling_steps_are_warnings_only() {
        let corpus = Corpus {
            atoms: vec![atom("a", AtomKind::Lesson)],
            courses: vec![course("c", vec![Step::atom("a"), Step::atom("ghost")])],
            series: vec![series("s", vec![Step::atom("a"), Step::quiz_group(["a", "ghost-q"])])],
            programmes: vec![programme("premiere", &["c"])],
        };
        let report = validate(&corpus, 10);
        assert!(!report.has_errors());
        let warnings = messages(&report, Severity::Warning);
        assert!(warnings.contains(&"[warning] cours:c: section 'Cours' references unknown atom 'ghost'".to_string()));
        assert!(warnings.iter().any(|w| w.contains("series:s") && w.contains("'ghost-q'")));
        assert!(warnings.iter().any(|w| w.contains("'a', which is a lesson atom")));
    }

    #[test]
    fn unknown_course_programme_and_series_module_warn() {
        let mut c = course("c", vec![Step::atom("a")]);
        c.programme = "ailleurs".into();
        let mut s = series("s", vec![Step::atom("a"), Step::atom("a")]);
        s.modules = vec!["c".into(), "inconnu".into()];
        let corpus = Corpus {
            atoms: vec![atom("a", AtomKind::Lesson)],
            courses: vec![c],
            series: vec![s],
            programmes: vec![],
        };
        let warnings = messages(&validate(&corpus, 10), Severity::Warning);
        assert_eq!(warnings.len(), 2, "{warnings:?}");
        assert!(warnings[0].contains("programme 'ailleurs' does not exist"));
        assert!(warnings[1].contains("module 'inconnu'"));
    }

    #[test]
    fn orphans_aggregated_with_preview() {
        let corpus = Corpus {
            atoms: ["o1", "o2", "o3", "used"]
                .iter()
                .map(|id| atom(id, AtomKind::Lesson))
                .collect(),
            courses: vec![course("c", vec![Step::atom("used")])],
            programmes: vec![programme("premiere", &["c"])],
            ..Corpus::default()
        };
        let report = validate(&corpus, 2);
        let warnings = messages(&report, Severity::Warning);
        assert_eq!(
            warnings,
            vec!["[warning] atoms: 3 atom(s) not referenced by any cours or series: o1, o2 (+1 more)"]
        );
    }

    #[test]
    fn quiz_marker_disagreement_is_error() {
        let mut q = atom("q", AtomKind::Qcm);
        q.body = "<Question>Q</Question>\n<Option>a</Option>\n<Option correct>b</Option>\n".into();
        q.correct_option = Some(0);
        let mut far = atom("far", AtomKind::Qcm);
        far.correct_option = Some(4);
        let mut agree = atom("agree", AtomKind::Qcm);
        agree.body = q.body.clone();
        agree.correct_option = Some(1);

        let corpus = Corpus {
            atoms: vec![q, far, agree],
            courses: vec![course(
                "c",
                vec![Step::quiz_group(["q", "far", "agree"])],
            )],
            ..Corpus::default()
        };
        let errors = messages(&validate(&corpus, 10), Severity::Error);
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].contains("atom:q") && errors[0].contains("marks option(s) 1"));
        assert!(errors[1].contains("atom:far") && errors[1].contains("only 2 options"));
    }
}
