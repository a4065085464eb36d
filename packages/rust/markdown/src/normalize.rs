//! Pre-compilation normalization passes for markup fragments.
//!
//! Each pass is a function `&str -> String` applied in sequence. Fragments
//! extracted from inside components are usually indented by the author, so
//! dedenting is required before Markdown sees them (four spaces would
//! otherwise turn prose into a code block).

use std::sync::LazyLock;

use regex::Regex;

/// Run the full normalization pipeline on a markup fragment.
pub(crate) fn run_pipeline(src: &str) -> String {
    let mut result = normalize_line_endings(src);

    result = dedent(&result);
    result = trim_blank_edges(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings
// ---------------------------------------------------------------------------

fn normalize_line_endings(src: &str) -> String {
    static CR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n?").expect("valid regex"));

    CR_RE.replace_all(src, "\n").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 2: Dedent
// ---------------------------------------------------------------------------

/// Remove the indentation shared by every non-blank line.
fn dedent(src: &str) -> String {
    let common = src
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    if common == 0 {
        return src.to_string();
    }

    src.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.trim_start_matches([' ', '\t'])
            } else {
                &line[common..]
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 3: Blank edges
// ---------------------------------------------------------------------------

/// Drop blank lines at the start and end of the fragment.
fn trim_blank_edges(src: &str) -> String {
    let start = src
        .split_inclusive('\n')
        .take_while(|line| line.trim().is_empty())
        .map(str::len)
        .sum::<usize>();

    src[start..].trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Trailing newline
// ---------------------------------------------------------------------------

fn ensure_trailing_newline(src: &str) -> String {
    if src.is_empty() || src.ends_with('\n') {
        src.to_string()
    } else {
        format!("{src}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_crlf() {
        assert_eq!(normalize_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn dedent_removes_common_indent() {
        let src = "    Soit $f$.\n\n      - item\n    Fin\n";
        assert_eq!(dedent(src), "Soit $f$.\n\n  - item\nFin\n");
    }

    #[test]
    fn dedent_keeps_unindented_text() {
        let src = "Titre\n    code\n";
        assert_eq!(dedent(src), src);
    }

    #[test]
    fn pipeline_trims_and_terminates() {
        assert_eq!(run_pipeline("\n\n   Texte  \n\n"), "Texte\n");
        assert_eq!(run_pipeline("  \n"), "");
    }
}
