//! Core pipeline orchestration and domain logic for coursebuild.
//!
//! This crate ties together reading, integrity validation, batched
//! compilation, step resolution, catalogue assembly and output writing into
//! one build (`run_build`) and one read-only check (`run_check`).

pub mod assembler;
pub mod cache;
pub mod compile;
pub mod pipeline;
pub mod resolver;
pub mod validator;
pub mod writer;

pub use pipeline::{BuildResult, CheckResult, ProgressReporter, SilentProgress, run_build, run_check};
