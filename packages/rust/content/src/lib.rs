//! Readers for the content source tree.
//!
//! This crate provides:
//! - [`read_corpus`]: scan a content directory into a [`Corpus`](coursebuild_shared::Corpus)
//! - [`parse_atom`], [`parse_course`], [`parse_series`], [`parse_programme`]: per-file
//!   parsing and schema validation
//! - [`split_front_matter`]: the `---` front-matter splitter used for atom files
//!
//! Every reader fails fast: the first malformed record aborts the scan with a
//! schema error naming the record and each failing field.

mod frontmatter;
mod scan;
mod schema;

pub use frontmatter::split_front_matter;
pub use scan::{COURS_DIR, PROGRAMME_FILE, PROGRAMMES_DIR, SERIES_DIR, read_corpus};
pub use schema::{parse_atom, parse_course, parse_programme, parse_series};
