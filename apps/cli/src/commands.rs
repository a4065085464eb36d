//! CLI flag definitions, config resolution, tracing setup and reporting.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use coursebuild_core::{BuildResult, ProgressReporter, run_build, run_check};
use coursebuild_shared::{
    CourseBuildError, Finding, PipelineConfig, Severity, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// coursebuild: compile course content into the generated tree.
#[derive(Parser)]
#[command(
    name = "coursebuild",
    version,
    about = "Validate and compile course content into the tree served by the web app.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Content source directory (overrides `paths.content_dir`).
    #[arg(long, env = "COURSEBUILD_CONTENT")]
    pub content: Option<PathBuf>,

    /// Output directory (overrides `paths.output_dir`).
    #[arg(long, env = "COURSEBUILD_OUT")]
    pub out: Option<PathBuf>,

    /// Config file (defaults to ./coursebuild.toml when present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Atoms compiled per batch.
    #[arg(long)]
    pub concurrency: Option<NonZeroUsize>,

    /// Compile every atom, ignoring and not updating the compile cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Read and validate only; write nothing.
    #[arg(long)]
    pub check: bool,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. `RUST_LOG` wins when set.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "coursebuild=info",
        1 => "coursebuild=debug",
        _ => "coursebuild=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

/// Flags > config file > defaults.
fn resolve_config(cli: &Cli, cwd: &Path) -> Result<PipelineConfig> {
    let app = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config(cwd)?,
    };

    let mut config = PipelineConfig::from(&app);
    if let Some(content) = &cli.content {
        config.content_dir = content.clone();
    }
    if let Some(out) = &cli.out {
        config.output_dir = out.clone();
    }
    if let Some(n) = cli.concurrency {
        config.concurrency = n.get();
    }
    if cli.no_cache {
        config.cache_file = None;
    }
    config.tool_version = env!("CARGO_PKG_VERSION").to_string();

    Ok(config)
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the build (or the check) and print a summary.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().map_err(|e| eyre!("cannot determine working directory: {e}"))?;
    let config = resolve_config(&cli, &cwd)?;

    info!(
        content = %config.content_dir.display(),
        out = %config.output_dir.display(),
        concurrency = config.concurrency,
        cache = config.cache_file.is_some(),
        check = cli.check,
        "coursebuild starting"
    );

    let reporter = CliProgress::new();

    if cli.check {
        let result = run_check(&config, &reporter);
        reporter.finish();
        let check = result.map_err(summarize)?;

        println!();
        println!("  Content is valid.");
        println!("  Atoms:      {}", check.atoms);
        println!("  Cours:      {}", check.courses);
        println!("  Series:     {}", check.series);
        println!("  Programmes: {}", check.programmes);
        println!("  Warnings:   {}", check.findings.len());
        println!();
        return Ok(());
    }

    let result = run_build(&config, &reporter).await;
    reporter.finish();
    let result = result.map_err(summarize)?;

    let counts = &result.manifest.counts;
    println!();
    println!("  Build complete.");
    println!(
        "  Atoms:      {} ({} html, {} qcm)",
        counts.atoms, counts.html_atoms, counts.qcm_atoms
    );
    println!("  Compiled:   {} ({} from cache)", result.compiled, result.cache_hits);
    println!("  Cours:      {}", counts.courses);
    println!("  Series:     {}", counts.series);
    println!("  Catalogues: {}", counts.catalogues);
    println!("  Warnings:   {}", result.findings.len());
    println!("  Output:     {}", result.output_dir.display());
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// Findings were already printed; keep the final error to one line.
fn summarize(err: CourseBuildError) -> color_eyre::Report {
    match err {
        CourseBuildError::Integrity { findings } => {
            let errors = findings.iter().filter(|f| f.is_error()).count();
            eyre!("validation failed with {errors} error(s); nothing was compiled or written")
        }
        other => other.into(),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn findings(&self, findings: &[Finding]) {
        if findings.is_empty() {
            return;
        }
        self.spinner.suspend(|| {
            for finding in findings {
                eprintln!("  {}", format_finding(finding));
            }
        });
    }

    fn atoms_compiled(&self, done: usize, total: usize) {
        self.spinner.set_message(format!("Compiling atoms [{done}/{total}]"));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}

fn format_finding(finding: &Finding) -> String {
    let level = match finding.severity {
        Severity::Error => "error",
        Severity::Warning => "warn ",
    };
    format!("{level} {}: {}", finding.source, finding.message)
}
