//! End-to-end build pipeline: read → validate → compile → resolve → assemble → write.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use coursebuild_shared::{BuildManifest, Corpus, Finding, PipelineConfig, Result};

use crate::assembler;
use crate::cache::CompileCache;
use crate::compile;
use crate::resolver;
use crate::validator;
use crate::writer::{self, BuildOutput};

/// Result of a full build.
#[derive(Debug)]
pub struct BuildResult {
    /// Directory the tree was written to.
    pub output_dir: PathBuf,
    /// The manifest written at the root of the tree.
    pub manifest: BuildManifest,
    /// Every validation finding (warnings only, on success).
    pub findings: Vec<Finding>,
    /// Atoms served from the compile cache.
    pub cache_hits: usize,
    /// Atoms compiled this run.
    pub compiled: usize,
    pub elapsed: Duration,
}

/// Result of a read + validate run.
#[derive(Debug)]
pub struct CheckResult {
    pub atoms: usize,
    pub courses: usize,
    pub series: usize,
    pub programmes: usize,
    pub findings: Vec<Finding>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once with every validation finding, before errors abort the run.
    fn findings(&self, findings: &[Finding]);
    /// Called after each compile batch.
    fn atoms_compiled(&self, done: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn findings(&self, _findings: &[Finding]) {}
    fn atoms_compiled(&self, _done: usize, _total: usize) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Run the full build.
///
/// 1. Read and schema-check the content tree
/// 2. Validate references (errors stop here)
/// 3. Compile atoms in batches, through the cache when configured
/// 4. Resolve courses and series
/// 5. Assemble catalogues and the routing list
/// 6. Write the output tree
#[instrument(skip_all, fields(content = %config.content_dir.display(), out = %config.output_dir.display()))]
pub async fn run_build(
    config: &PipelineConfig,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let start = Instant::now();
    info!("starting build");

    // --- Phase 1 & 2: Read + validate ---
    let (corpus, findings) = read_and_validate(config, progress)?;

    // --- Phase 3: Compile ---
    progress.phase("Compiling atoms");
    let mut cache = config.cache_file.as_deref().map(CompileCache::load);
    let compiled = compile::compile_atoms(
        &corpus.atoms,
        config.concurrency,
        cache.as_mut(),
        progress,
    )
    .await?;

    // --- Phase 4: Resolve ---
    progress.phase("Resolving courses and series");
    let atoms = resolver::index_atoms(&corpus.atoms);
    let courses = resolver::resolve_courses(&corpus.courses, &atoms);
    let series = resolver::resolve_all_series(&corpus.series, &atoms);

    // --- Phase 5: Assemble ---
    progress.phase("Assembling catalogues");
    let assembly = assembler::assemble(&corpus.programmes, &courses, &series);

    // --- Phase 6: Write ---
    progress.phase("Writing output");
    let output = BuildOutput {
        compiled: &compiled.atoms,
        courses: &courses,
        series: &series,
        assembly: &assembly,
    };
    let manifest = writer::write_output(&config.output_dir, &output, &config.tool_version)?;

    // The tree is already in place, so a cache that cannot be saved only
    // costs the next run a full compile.
    if let Some(cache) = cache.as_mut() {
        if let Err(e) = cache.save() {
            warn!(error = %e, "failed to save compile cache");
        }
    }

    let result = BuildResult {
        output_dir: config.output_dir.clone(),
        manifest,
        findings,
        cache_hits: compiled.cache_hits,
        compiled: compiled.compiled,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        atoms = result.manifest.counts.atoms,
        courses = result.manifest.counts.courses,
        series = result.manifest.counts.series,
        warnings = result.findings.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "build complete"
    );

    Ok(result)
}

/// Read and validate without compiling or writing anything.
#[instrument(skip_all, fields(content = %config.content_dir.display()))]
pub fn run_check(config: &PipelineConfig, progress: &dyn ProgressReporter) -> Result<CheckResult> {
    let (corpus, findings) = read_and_validate(config, progress)?;
    Ok(CheckResult {
        atoms: corpus.atoms.len(),
        courses: corpus.courses.len(),
        series: corpus.series.len(),
        programmes: corpus.programmes.len(),
        findings,
    })
}

fn read_and_validate(
    config: &PipelineConfig,
    progress: &dyn ProgressReporter,
) -> Result<(Corpus, Vec<Finding>)> {
    progress.phase("Reading content");
    let corpus = coursebuild_content::read_corpus(&config.content_dir)?;

    progress.phase("Validating references");
    let report = validator::validate(&corpus, config.orphan_preview);
    for finding in &report.findings {
        debug!(source = %finding.source, severity = ?finding.severity, "{}", finding.message);
    }
    if report.has_errors() {
        error!(
            errors = report.error_count(),
            warnings = report.warning_count(),
            "validation failed"
        );
    } else if !report.findings.is_empty() {
        warn!(warnings = report.warning_count(), "validation passed with warnings");
    }
    progress.findings(&report.findings);

    let findings = report.into_result()?;
    Ok((corpus, findings))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
