//! Content source tree scanning.
//!
//! Layout:
//!
//! ```text
//! <content>/
//! ├── programmes/<programme-id>/programme.yaml
//! ├── programmes/<programme-id>/<module>/<atom-id>.md
//! ├── cours/<slug>.yaml
//! └── series/<slug>.yaml
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use coursebuild_shared::{Corpus, CourseBuildError, Result};

use crate::schema::{parse_atom, parse_course, parse_programme, parse_series};

/// Directory holding one subdirectory per programme.
pub const PROGRAMMES_DIR: &str = "programmes";
/// Directory holding course definitions.
pub const COURS_DIR: &str = "cours";
/// Directory holding series definitions.
pub const SERIES_DIR: &str = "series";
/// File that marks a directory as a programme.
pub const PROGRAMME_FILE: &str = "programme.yaml";

const ATOM_EXTENSIONS: &[&str] = &["md", "mdx"];
const YAML_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Read and schema-validate every record under `content_dir`.
///
/// Files are visited in sorted path order, so the returned lists are
/// deterministic. The first malformed record aborts the scan.
#[instrument(skip_all, fields(content_dir = %content_dir.display()))]
pub fn read_corpus(content_dir: &Path) -> Result<Corpus> {
    if !content_dir.is_dir() {
        return Err(CourseBuildError::io(
            content_dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "content directory not found"),
        ));
    }

    let mut corpus = Corpus::default();

    read_programmes(&content_dir.join(PROGRAMMES_DIR), &mut corpus)?;

    for (slug, path) in yaml_files(&content_dir.join(COURS_DIR))? {
        let text = read_text(&path)?;
        corpus.courses.push(parse_course(&slug, &path, &text)?);
    }

    for (slug, path) in yaml_files(&content_dir.join(SERIES_DIR))? {
        let text = read_text(&path)?;
        corpus.series.push(parse_series(&slug, &path, &text)?);
    }

    info!(
        atoms = corpus.atoms.len(),
        courses = corpus.courses.len(),
        series = corpus.series.len(),
        programmes = corpus.programmes.len(),
        "content read"
    );

    Ok(corpus)
}

/// Read programme definitions and the atoms under each programme directory.
fn read_programmes(dir: &Path, corpus: &mut Corpus) -> Result<()> {
    if !dir.is_dir() {
        debug!(path = %dir.display(), "no programmes directory");
        return Ok(());
    }

    for programme_dir in sorted_subdirs(dir)? {
        let Some(programme_id) = file_name(&programme_dir) else {
            continue;
        };

        let definition = programme_dir.join(PROGRAMME_FILE);
        if !definition.is_file() {
            warn!(path = %programme_dir.display(), "directory has no {PROGRAMME_FILE}, skipping");
            continue;
        }

        let text = read_text(&definition)?;
        corpus
            .programmes
            .push(parse_programme(&programme_id, &definition, &text)?);

        // min_depth(1) so hidden module directories are pruned too.
        let walker = WalkDir::new(&programme_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = entry.map_err(|e| walk_error(&programme_dir, e))?;
            if !entry.file_type().is_file() || !has_extension(entry.path(), ATOM_EXTENSIONS) {
                continue;
            }
            if entry.depth() < 2 {
                warn!(path = %entry.path().display(), "atom outside a module directory, skipping");
                continue;
            }

            let path = entry.path();
            let Some(id) = file_stem(path) else { continue };
            let module = path
                .strip_prefix(&programme_dir)
                .ok()
                .and_then(|rel| rel.components().next())
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .unwrap_or_default();

            let text = read_text(path)?;
            corpus
                .atoms
                .push(parse_atom(&id, &programme_id, &module, path, &text)?);
        }
    }

    Ok(())
}

/// `(stem, path)` for every YAML file directly inside `dir`, sorted by name.
fn yaml_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        debug!(path = %dir.display(), "definition directory missing, treating as empty");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        let path = entry.path();
        if entry.file_type().is_file() && has_extension(path, YAML_EXTENSIONS) {
            if let Some(stem) = file_stem(path) {
                files.push((stem, path.to_path_buf()));
            }
        }
    }
    Ok(files)
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

fn read_text(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "reading");
    std::fs::read_to_string(path).map_err(|e| CourseBuildError::io(path, e))
}

fn walk_error(root: &Path, err: walkdir::Error) -> CourseBuildError {
    let path = err.path().unwrap_or(root).to_path_buf();
    CourseBuildError::io(path, err.into())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|s| s.to_string_lossy().into_owned())
}
