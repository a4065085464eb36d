//! Shared types, error model, and configuration for coursebuild.
//!
//! This crate is the foundation depended on by all other coursebuild crates.
//! It provides:
//! - [`CourseBuildError`]: the unified error type
//! - Source model types ([`Atom`], [`Step`], [`Course`], [`Series`], [`Programme`])
//! - Output records ([`ResolvedCourse`], [`Catalogue`], [`BuildManifest`], ...)
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod output;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, CompileConfig, PathsConfig, PipelineConfig, ValidateConfig,
    load_config, load_config_from,
};
pub use error::{CourseBuildError, Result};
pub use output::{
    BuildManifest, Catalogue, CatalogueModule, CatalogueSeries, CompiledAtom, CompiledQuiz,
    MANIFEST_SCHEMA_VERSION, ManifestCounts, ParcoursEntry, ResolvedActivity, ResolvedCourse,
    ResolvedSection, ResolvedSeries,
};
pub use types::{
    Atom, AtomKind, Corpus, Course, ExerciseCategory, Finding, Programme, Section, Series,
    SeriesType, Severity, Step,
};
