//! Markup-to-HTML compilation for atom bodies.
//!
//! Atom bodies are Markdown with math (`$…$`, `$$…$$`) and a small set of
//! block components. This crate:
//! 1. Normalizes the fragment (line endings, indentation, blank edges)
//! 2. Tokenizes top-level components
//! 3. Renders Markdown runs with `pulldown-cmark` and callout components as
//!    `<aside>` blocks whose content is compiled recursively
//!
//! Quiz bodies go through [`compile_quiz`], which extracts the `<Question>`,
//! `<Option>` and `<Explanation>` blocks and compiles each one on its own.

mod components;
mod normalize;
mod quiz;

use std::collections::HashMap;

use pulldown_cmark::{BrokenLink, CowStr, Options, Parser};
use tracing::trace;

use coursebuild_shared::{CourseBuildError, Result};

use crate::components::{Component, Node};

pub use quiz::{QuizHtml, QuizOptionSource, QuizSource, compile_quiz, parse_quiz};

/// Bumped whenever the HTML produced for the same input changes.
/// Part of every compile-cache key.
pub const COMPILER_REVISION: u32 = 2;

/// Callout components: tag name and CSS modifier.
const CALLOUTS: &[(&str, &str)] = &[
    ("Definition", "definition"),
    ("Theorem", "theorem"),
    ("Property", "property"),
    ("Example", "example"),
    ("Remark", "remark"),
    ("Method", "method"),
    ("Warning", "warning"),
    ("Callout", "note"),
];

/// Components that only make sense at the top level of a qcm body.
const QUIZ_COMPONENTS: &[&str] = &["Question", "Option", "Explanation"];

/// Link reference definitions of one fragment: normalized label to
/// `(destination, title)`.
type LinkRefs = HashMap<String, (String, String)>;

/// Compile a prose fragment (lesson, exercise, or one quiz block) to HTML.
///
/// Link reference definitions apply to the whole fragment, including
/// Markdown inside and around callouts.
pub fn compile_markup(src: &str) -> Result<String> {
    let src = normalize::run_pipeline(src);

    let mut refs = LinkRefs::new();
    collect_link_refs(&src, &mut refs);

    let html = render_fragment(&src, &refs)?;
    trace!(input_len = src.len(), output_len = html.len(), "fragment compiled");
    Ok(html)
}

fn render_fragment(src: &str, refs: &LinkRefs) -> Result<String> {
    let nodes = components::parse(src)?;

    let mut html = String::new();
    for node in &nodes {
        match node {
            Node::Text { text, .. } => html.push_str(&markdown_to_html(text, refs)),
            Node::Component(component) => render_component(component, refs, &mut html)?,
        }
    }
    Ok(html)
}

/// First definition of a label wins, in document order. Malformed
/// components are left for `render_fragment` to report.
fn collect_link_refs(src: &str, refs: &mut LinkRefs) {
    let Ok(nodes) = components::parse(src) else {
        return;
    };

    for node in nodes {
        match node {
            Node::Text { text, .. } => {
                let parser = Parser::new_ext(text, markdown_options());
                for (label, def) in parser.reference_definitions().iter() {
                    refs.entry(link_label_key(label)).or_insert_with(|| {
                        (def.dest.to_string(), def.title.as_deref().unwrap_or("").to_string())
                    });
                }
            }
            Node::Component(component) => {
                collect_link_refs(&normalize::run_pipeline(component.inner), refs);
            }
        }
    }
}

fn link_label_key(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn render_component(component: &Component<'_>, refs: &LinkRefs, out: &mut String) -> Result<()> {
    let name = component.name;

    if QUIZ_COMPONENTS.contains(&name) {
        return Err(CourseBuildError::markup(format!(
            "line {}: <{name}> is only allowed at the top level of a qcm atom",
            component.line
        )));
    }

    let Some(&(_, modifier)) = CALLOUTS.iter().find(|(tag, _)| *tag == name) else {
        return Err(CourseBuildError::markup(format!(
            "line {}: unknown component <{name}>",
            component.line
        )));
    };

    let modifier = if name == "Callout" {
        component.check_attrs(&["title", "type"])?;
        match component.attr("type") {
            Some(Some(kind)) if is_css_token(kind) => kind,
            Some(_) => {
                return Err(CourseBuildError::markup(format!(
                    "line {}: <Callout> `type` must be a lowercase word",
                    component.line
                )));
            }
            None => modifier,
        }
    } else {
        component.check_attrs(&["title"])?;
        modifier
    };

    let inner = render_fragment(&normalize::run_pipeline(component.inner), refs).map_err(|e| {
        CourseBuildError::markup(format!(
            "inside <{name}> opened on line {}: {}",
            component.line,
            strip_markup_prefix(&e)
        ))
    })?;

    out.push_str(&format!("<aside class=\"callout callout-{modifier}\">\n"));
    if let Some(Some(title)) = component.attr("title") {
        out.push_str(&format!(
            "<p class=\"callout-title\">{}</p>\n",
            escape_html(title)
        ));
    }
    out.push_str(&inner);
    out.push_str("</aside>\n");
    Ok(())
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_MATH);
    options
}

/// Render plain Markdown (with math, tables, strikethrough, task lists).
/// References not defined in `md` itself are looked up in `refs`.
fn markdown_to_html(md: &str, refs: &LinkRefs) -> String {
    let parser = Parser::new_with_broken_link_callback(
        md,
        markdown_options(),
        Some(|link: BrokenLink<'_>| {
            refs.get(&link_label_key(&link.reference))
                .map(|(dest, title)| (CowStr::from(dest.clone()), CowStr::from(title.clone())))
        }),
    );
    let mut html = String::with_capacity(md.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, parser);
    html
}

fn is_css_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Message of a nested markup error without the `markup error: ` prefix.
fn strip_markup_prefix(err: &CourseBuildError) -> String {
    match err {
        CourseBuildError::Markup { message } => message.clone(),
        other => other.to_string(),
    }
}
