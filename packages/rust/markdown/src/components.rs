//! Block component tokenizer.
//!
//! Components are capitalized, JSX-like tags that wrap Markdown:
//! `<Theorem title="Gendarmes">...</Theorem>`, `<Option correct>...</Option>`.
//! Lowercase tags are left alone and reach Markdown as raw HTML. Tags inside
//! fenced or inline code are ignored.
//!
//! Only top-level components are returned; their `inner` markup is compiled
//! recursively by the caller, which re-tokenizes it.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use coursebuild_shared::{CourseBuildError, Result};

/// Matches `<Name attr="v" flag>`, `</Name>` and `<Name />`.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(/?)([A-Z][A-Za-z0-9]*)((?:\s+[A-Za-z][\w-]*(?:\s*=\s*"[^"]*")?)*)\s*(/?)>"#)
        .expect("tag regex")
});

/// Matches one attribute inside a tag.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z][\w-]*)(?:\s*=\s*"([^"]*)")?"#).expect("attr regex")
});

/// Matches a single-line inline code span.
static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`\n]+`").expect("inline code regex"));

/// A parsed top-level piece of a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node<'a> {
    /// Plain Markdown between components.
    Text { text: &'a str, line: usize },
    Component(Component<'a>),
}

/// A top-level component and its raw inner markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Component<'a> {
    pub name: &'a str,
    pub attrs: Vec<(&'a str, Option<&'a str>)>,
    pub inner: &'a str,
    /// 1-based line of the opening tag.
    pub line: usize,
}

impl Component<'_> {
    pub fn attr(&self, key: &str) -> Option<Option<&str>> {
        self.attrs.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    /// Fail on any attribute not listed in `allowed`.
    pub fn check_attrs(&self, allowed: &[&str]) -> Result<()> {
        match self.attrs.iter().find(|(k, _)| !allowed.contains(k)) {
            Some((key, _)) => Err(CourseBuildError::markup(format!(
                "line {}: unsupported attribute `{key}` on <{}>",
                self.line, self.name
            ))),
            None => Ok(()),
        }
    }
}

struct Frame<'a> {
    name: &'a str,
    attrs: Vec<(&'a str, Option<&'a str>)>,
    line: usize,
    inner_start: usize,
}

/// Split a fragment into top-level text and component nodes.
pub(crate) fn parse(src: &str) -> Result<Vec<Node<'_>>> {
    let masked = mask_code(src);
    check_display_math(src, &masked)?;

    let mut nodes = Vec::new();
    let mut stack: Vec<Frame<'_>> = Vec::new();
    let mut cursor = 0;

    for caps in TAG_RE.captures_iter(&masked) {
        let (Some(tag), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let name = &src[name.range()];
        let line = line_of(src, tag.start());
        let closing = caps.get(1).is_some_and(|m| !m.is_empty());
        let self_closing = caps.get(4).is_some_and(|m| !m.is_empty());

        if stack.is_empty() && tag.start() > cursor {
            push_text(&mut nodes, src, cursor, tag.start());
        }

        if closing {
            let Some(frame) = stack.pop() else {
                return Err(CourseBuildError::markup(format!(
                    "line {line}: closing </{name}> without a matching opening tag"
                )));
            };
            if frame.name != name {
                return Err(CourseBuildError::markup(format!(
                    "line {line}: expected </{}> (opened on line {}) but found </{name}>",
                    frame.name, frame.line
                )));
            }
            if stack.is_empty() {
                nodes.push(Node::Component(Component {
                    name: frame.name,
                    attrs: frame.attrs,
                    inner: &src[frame.inner_start..tag.start()],
                    line: frame.line,
                }));
            }
        } else {
            let attrs = parse_attrs(src, &caps);
            if self_closing {
                if stack.is_empty() {
                    nodes.push(Node::Component(Component {
                        name,
                        attrs,
                        inner: "",
                        line,
                    }));
                }
            } else {
                stack.push(Frame {
                    name,
                    attrs,
                    line,
                    inner_start: tag.end(),
                });
            }
        }

        if stack.is_empty() {
            cursor = tag.end();
        }
    }

    if let Some(frame) = stack.last() {
        return Err(CourseBuildError::markup(format!(
            "line {}: <{}> is never closed",
            frame.line, frame.name
        )));
    }

    if cursor < src.len() {
        push_text(&mut nodes, src, cursor, src.len());
    }

    Ok(nodes)
}

/// 1-based line number of a byte offset.
pub(crate) fn line_of(src: &str, offset: usize) -> usize {
    src[..offset].matches('\n').count() + 1
}

fn push_text<'a>(nodes: &mut Vec<Node<'a>>, src: &'a str, start: usize, end: usize) {
    let text = &src[start..end];
    if !text.trim().is_empty() {
        nodes.push(Node::Text {
            text,
            line: line_of(src, start),
        });
    }
}

fn parse_attrs<'a>(src: &'a str, caps: &Captures<'_>) -> Vec<(&'a str, Option<&'a str>)> {
    let Some(group) = caps.get(3) else {
        return Vec::new();
    };
    let raw = &src[group.range()];
    ATTR_RE
        .captures_iter(raw)
        .filter_map(|a| {
            let key = a.get(1)?;
            let value = a.get(2).map(|v| &raw[v.range()]);
            Some((&raw[key.range()], value))
        })
        .collect()
}

/// `$$` must appear an even number of times outside code.
fn check_display_math(src: &str, masked: &str) -> Result<()> {
    let positions: Vec<usize> = masked.match_indices("$$").map(|(i, _)| i).collect();
    if positions.len() % 2 == 1 {
        let last = positions[positions.len() - 1];
        return Err(CourseBuildError::markup(format!(
            "line {}: unterminated display math (`$$`)",
            line_of(src, last)
        )));
    }
    Ok(())
}

/// Replace code (fenced blocks and inline spans) with spaces, keeping byte
/// offsets and newlines intact.
fn mask_code(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut fence: Option<&str> = None;

    for line in src.split_inclusive('\n') {
        let trimmed = line.trim_start();
        match fence {
            Some(marker) => {
                out.push_str(&blank(line));
                if trimmed.starts_with(marker) {
                    fence = None;
                }
            }
            None if trimmed.starts_with("```") || trimmed.starts_with("~~~") => {
                fence = Some(&trimmed[..3]);
                out.push_str(&blank(line));
            }
            None => {
                out.push_str(&INLINE_CODE_RE.replace_all(line, |c: &Captures<'_>| blank(&c[0])));
            }
        }
    }

    out
}

fn blank(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\n' { "\n".to_string() } else { " ".repeat(c.len_utf8()) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components<'a>(nodes: &'a [Node<'a>]) -> Vec<&'a Component<'a>> {
        nodes
            .iter()
            .filter_map(|n| match n {
                Node::Component(c) => Some(c),
                Node::Text { .. } => None,
            })
            .collect()
    }

    #[test]
    fn splits_text_and_components() {
        let src = "Intro\n\n<Theorem title=\"Gendarmes\">\nSi $u_n \\le v_n$...\n</Theorem>\n\nSuite\n";
        let nodes = parse(src).unwrap();
        assert_eq!(nodes.len(), 3);
        let comps = components(&nodes);
        assert_eq!(comps[0].name, "Theorem");
        assert_eq!(comps[0].attr("title"), Some(Some("Gendarmes")));
        assert_eq!(comps[0].inner, "\nSi $u_n \\le v_n$...\n");
        assert_eq!(comps[0].line, 3);
        assert!(matches!(nodes[2], Node::Text { line: 5, .. }));
    }

    #[test]
    fn nested_components_stay_inside_parent() {
        let src = "<Example>\n<Remark>r</Remark>\n</Example>\n";
        let nodes = parse(src).unwrap();
        assert_eq!(nodes.len(), 1);
        let comps = components(&nodes);
        assert_eq!(comps[0].inner, "\n<Remark>r</Remark>\n");
    }

    #[test]
    fn flag_attributes_and_self_closing() {
        let nodes = parse("<Option correct>a</Option>\n<Callout type=\"info\" />\n").unwrap();
        let comps = components(&nodes);
        assert_eq!(comps[0].attr("correct"), Some(None));
        assert_eq!(comps[1].name, "Callout");
        assert_eq!(comps[1].inner, "");
    }

    #[test]
    fn tags_in_code_are_ignored() {
        let src = "```\n<Theorem>\n```\n\nUse `<Option>` tags.\n";
        let nodes = parse(src).unwrap();
        assert!(components(&nodes).is_empty());
    }

    #[test]
    fn unclosed_and_mismatched_tags_fail() {
        let err = parse("a\n<Theorem>\nbody\n").unwrap_err();
        assert!(err.to_string().contains("line 2: <Theorem> is never closed"));

        let err = parse("<Theorem>\n</Example>\n").unwrap_err();
        assert!(err.to_string().contains("expected </Theorem>"));

        let err = parse("text</Remark>\n").unwrap_err();
        assert!(err.to_string().contains("without a matching opening tag"));
    }

    #[test]
    fn unbalanced_display_math_fails() {
        let err = parse("$$\nx^2\n").unwrap_err();
        assert!(err.to_string().contains("line 1: unterminated display math"));
        assert!(parse("$$x$$ and `$$`\n").is_ok());
    }

    #[test]
    fn unsupported_attribute_reported() {
        let nodes = parse("<Definition color=\"red\">x</Definition>\n").unwrap();
        let comps = components(&nodes);
        let err = comps[0].check_attrs(&["title"]).unwrap_err();
        assert!(err.to_string().contains("unsupported attribute `color`"));
    }
}
