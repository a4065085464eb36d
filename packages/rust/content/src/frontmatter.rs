//! Front-matter splitting for atom files.
//!
//! An atom file looks like:
//!
//! ```text
//! ---
//! type: lesson
//! title: Limites
//! ---
//! Body markup...
//! ```

/// Split `text` into its YAML front-matter and body.
///
/// Returns `None` when the text does not open with a `---` line or the block
/// is never closed. The body has its leading blank lines removed.
pub fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let first_end = text.find('\n')?;
    if text[..first_end].trim_end() != "---" {
        return None;
    }

    let yaml_start = first_end + 1;
    let mut offset = yaml_start;
    for line in text[yaml_start..].split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &text[yaml_start..offset];
            let body = text[offset + line.len()..].trim_start_matches(['\n', '\r']);
            return Some((yaml, body));
        }
        offset += line.len();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_yaml_and_body() {
        let (yaml, body) =
            split_front_matter("---\ntype: lesson\ntitle: A\n---\n\n# Heading\n").unwrap();
        assert_eq!(yaml, "type: lesson\ntitle: A\n");
        assert_eq!(body, "# Heading\n");
    }

    #[test]
    fn handles_crlf_and_bom() {
        let (yaml, body) = split_front_matter("\u{feff}---\r\ntitle: A\r\n---\r\nBody").unwrap();
        assert_eq!(yaml, "title: A\r\n");
        assert_eq!(body, "Body");
    }

    #[test]
    fn empty_front_matter() {
        let (yaml, body) = split_front_matter("---\n---\nBody\n").unwrap();
        assert_eq!(yaml, "");
        assert_eq!(body, "Body\n");
    }

    #[test]
    fn missing_or_unterminated() {
        assert!(split_front_matter("# No front matter\n").is_none());
        assert!(split_front_matter("---\ntitle: A\nBody\n").is_none());
        assert!(split_front_matter("").is_none());
    }

    #[test]
    fn closing_fence_at_end_of_file() {
        let (yaml, body) = split_front_matter("---\ntitle: A\n---").unwrap();
        assert_eq!(yaml, "title: A\n");
        assert_eq!(body, "");
    }
}
