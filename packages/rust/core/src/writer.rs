//! Output tree writer.
//!
//! Creates the following layout:
//! ```text
//! <output_dir>/
//! ├── manifest.json
//! ├── programmes.json
//! ├── parcours.json
//! ├── catalogues/<programme-id>.json
//! ├── cours/<slug>.json
//! ├── series/<slug>.json
//! ├── atoms/<atom-id>.html
//! └── qcm/<atom-id>.json
//! ```
//!
//! The tree is written into a sibling staging directory and swapped in with
//! a rename once complete, so readers never see a half-written tree and no
//! file from a previous build survives.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use coursebuild_shared::{
    BuildManifest, CompiledAtom, CourseBuildError, MANIFEST_SCHEMA_VERSION, ManifestCounts,
    ResolvedCourse, ResolvedSeries, Result,
};

use crate::assembler::Assembly;

/// Everything that ends up in the output tree.
#[derive(Debug, Clone, Copy)]
pub struct BuildOutput<'a> {
    pub compiled: &'a BTreeMap<String, CompiledAtom>,
    pub courses: &'a BTreeMap<String, ResolvedCourse>,
    pub series: &'a BTreeMap<String, ResolvedSeries>,
    pub assembly: &'a Assembly,
}

impl BuildOutput<'_> {
    pub fn counts(&self) -> ManifestCounts {
        let html_atoms = self
            .compiled
            .values()
            .filter(|c| matches!(c, CompiledAtom::Html { .. }))
            .count();
        ManifestCounts {
            atoms: self.compiled.len(),
            html_atoms,
            qcm_atoms: self.compiled.len() - html_atoms,
            courses: self.courses.len(),
            series: self.series.len(),
            programmes: self.assembly.programmes.len(),
            catalogues: self.assembly.catalogues.len(),
        }
    }
}

/// Write the full tree to `output_dir`, replacing whatever was there.
#[instrument(skip_all, fields(output_dir = %output_dir.display()))]
pub fn write_output(
    output_dir: &Path,
    output: &BuildOutput<'_>,
    tool_version: &str,
) -> Result<BuildManifest> {
    let staging = sibling(output_dir, "staging")?;
    info!(staging = %staging.display(), "writing output tree");

    let manifest = BuildManifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        generated_at: Utc::now(),
        tool_version: tool_version.to_string(),
        counts: output.counts(),
    };

    let written = write_tree(&staging, output, &manifest).and_then(|()| swap_in(&staging, output_dir));
    if let Err(e) = written {
        if staging.exists() {
            if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), error = %cleanup, "could not remove staging directory");
            }
        }
        return Err(e);
    }

    info!(
        path = %output_dir.display(),
        atoms = manifest.counts.atoms,
        courses = manifest.counts.courses,
        series = manifest.counts.series,
        catalogues = manifest.counts.catalogues,
        "output tree written"
    );

    Ok(manifest)
}

fn write_tree(root: &Path, output: &BuildOutput<'_>, manifest: &BuildManifest) -> Result<()> {
    for dir in ["catalogues", "cours", "series", "atoms", "qcm"] {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).map_err(|e| CourseBuildError::io(&path, e))?;
    }

    for compiled in output.compiled.values() {
        match compiled {
            CompiledAtom::Html { id, html } => {
                write_file(&root.join("atoms").join(format!("{id}.html")), html)?;
            }
            CompiledAtom::Quiz(quiz) => {
                write_json(&root.join("qcm").join(format!("{}.json", quiz.id)), quiz)?;
            }
        }
    }

    for (slug, course) in output.courses {
        write_json(&root.join("cours").join(format!("{slug}.json")), course)?;
    }
    for (slug, series) in output.series {
        write_json(&root.join("series").join(format!("{slug}.json")), series)?;
    }
    for (id, catalogue) in &output.assembly.catalogues {
        write_json(&root.join("catalogues").join(format!("{id}.json")), catalogue)?;
    }

    write_json(&root.join("programmes.json"), &output.assembly.programmes)?;
    write_json(&root.join("parcours.json"), &output.assembly.parcours)?;
    write_json(&root.join("manifest.json"), manifest)?;

    Ok(())
}

/// Replace `target` with `staging`. The previous tree is moved aside first
/// and put back if the final rename fails.
fn swap_in(staging: &Path, target: &Path) -> Result<()> {
    let previous = if target.exists() {
        let aside = sibling(target, "previous")?;
        std::fs::rename(target, &aside).map_err(|e| CourseBuildError::io(target, e))?;
        Some(aside)
    } else {
        None
    };

    if let Err(e) = std::fs::rename(staging, target) {
        if let Some(aside) = &previous {
            if let Err(restore) = std::fs::rename(aside, target) {
                warn!(path = %aside.display(), error = %restore, "could not restore previous output");
            }
        }
        return Err(CourseBuildError::io(target, e));
    }

    if let Some(aside) = previous {
        std::fs::remove_dir_all(&aside).map_err(|e| CourseBuildError::io(&aside, e))?;
        debug!(path = %aside.display(), "previous output removed");
    }
    Ok(())
}

/// `<parent>/.<name>.<purpose>-<uuid>` next to `dir`.
fn sibling(dir: &Path, purpose: &str) -> Result<PathBuf> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            CourseBuildError::config(format!("output path {} has no directory name", dir.display()))
        })?;
    let parent = dir.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| CourseBuildError::io(parent, e))?;
    Ok(parent.join(format!(".{name}.{purpose}-{}", uuid::Uuid::now_v7())))
}

/// Pretty JSON with a trailing newline.
fn write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(data).map_err(|e| {
        CourseBuildError::Serialization(format!("{}: {e}", path.display()))
    })?;
    json.push('\n');
    write_file(path, &json)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| CourseBuildError::io(path, e))?;
    debug!(path = %path.display(), bytes = content.len(), "wrote file");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
