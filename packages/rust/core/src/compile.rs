//! Compile stage: atom bodies to HTML fragments and quiz records.
//!
//! Atoms are compiled in fixed-width batches. Every task in a batch runs on
//! the blocking pool, the batch is awaited as a whole, and its results are
//! merged into the stage output before the next batch starts.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use coursebuild_markdown::{compile_markup, compile_quiz};
use coursebuild_shared::{Atom, AtomKind, CompiledAtom, CompiledQuiz, CourseBuildError, Result};

use crate::cache::{CompileCache, content_hash};
use crate::pipeline::ProgressReporter;

/// Output of the compile stage.
#[derive(Debug, Default)]
pub struct CompileOutput {
    /// Compiled atoms keyed by atom ID.
    pub atoms: BTreeMap<String, CompiledAtom>,
    /// Atoms served from the cache.
    pub cache_hits: usize,
    /// Atoms actually compiled this run.
    pub compiled: usize,
}

/// Compile every atom, `batch_size` at a time.
///
/// The first failing atom aborts the stage once its batch has settled.
#[instrument(skip_all, fields(atoms = atoms.len(), batch_size = batch_size))]
pub async fn compile_atoms(
    atoms: &[Atom],
    batch_size: usize,
    mut cache: Option<&mut CompileCache>,
    progress: &dyn ProgressReporter,
) -> Result<CompileOutput> {
    let batch_size = batch_size.max(1);
    let total = atoms.len();
    let mut output = CompileOutput::default();

    for (batch_no, batch) in atoms.chunks(batch_size).enumerate() {
        let mut handles = Vec::new();
        let mut ready: Vec<CompiledAtom> = Vec::new();

        for atom in batch {
            let hash = content_hash(atom);
            if let Some(hit) = cache.as_deref_mut().and_then(|c| c.get(&atom.id, &hash)) {
                ready.push(hit);
                continue;
            }

            let owned = atom.clone();
            handles.push((
                atom.id.clone(),
                hash,
                tokio::task::spawn_blocking(move || compile_atom(&owned)),
            ));
        }

        let mut first_error = None;
        let mut fresh = Vec::new();
        for (id, hash, handle) in handles {
            match handle.await {
                Ok(Ok(compiled)) => fresh.push((hash, compiled)),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(CourseBuildError::compile(id, format!("task failed: {e}")));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        output.cache_hits += ready.len();
        output.compiled += fresh.len();
        for compiled in ready {
            output.atoms.insert(compiled.id().to_string(), compiled);
        }
        for (hash, compiled) in fresh {
            if let Some(cache) = cache.as_deref_mut() {
                cache.insert(compiled.id(), hash, compiled.clone());
            }
            output.atoms.insert(compiled.id().to_string(), compiled);
        }

        debug!(batch = batch_no + 1, done = output.atoms.len(), total, "batch compiled");
        progress.atoms_compiled(output.atoms.len(), total);
    }

    info!(
        total = output.atoms.len(),
        compiled = output.compiled,
        cache_hits = output.cache_hits,
        "compile stage complete"
    );

    Ok(output)
}

/// Compile one atom. Failures are attributed to the atom ID.
pub fn compile_atom(atom: &Atom) -> Result<CompiledAtom> {
    match atom.kind {
        AtomKind::Lesson | AtomKind::Exercise => {
            let html = compile_markup(&atom.body).map_err(|e| attribute(atom, e))?;
            Ok(CompiledAtom::Html {
                id: atom.id.clone(),
                html,
            })
        }
        AtomKind::Qcm => {
            let Some(correct_index) = atom.correct_option else {
                return Err(CourseBuildError::compile(&atom.id, "qcm atom has no correctOption"));
            };
            let quiz = compile_quiz(&atom.body).map_err(|e| attribute(atom, e))?;
            Ok(CompiledAtom::Quiz(CompiledQuiz {
                id: atom.id.clone(),
                title: atom.title.clone(),
                compiled_question_html: quiz.question_html,
                compiled_option_html_list: quiz.option_html,
                correct_index,
                compiled_explanation_html: quiz.explanation_html,
                time_minutes: atom.time_minutes,
            }))
        }
    }
}

fn attribute(atom: &Atom, err: CourseBuildError) -> CourseBuildError {
    let message = match err {
        CourseBuildError::Markup { message } => message,
        other => other.to_string(),
    };
    CourseBuildError::compile(&atom.id, format!("{message} ({})", atom.source.display()))
}
