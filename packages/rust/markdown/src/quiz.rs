//! Quiz body extraction.
//!
//! A qcm body is made of top-level blocks only:
//!
//! ```text
//! <Question>Quelle est la limite de $1/x$ en $+\infty$ ?</Question>
//! <Option>$+\infty$</Option>
//! <Option correct>$0$</Option>
//! <Explanation>Le dénominateur tend vers l'infini.</Explanation>
//! ```

use coursebuild_shared::{CourseBuildError, Result};

use crate::components::{self, Node};
use crate::{compile_markup, normalize};

const MIN_OPTIONS: usize = 2;

/// Raw markup of each quiz block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSource {
    pub question: String,
    pub options: Vec<QuizOptionSource>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOptionSource {
    pub markup: String,
    /// Whether the source carries a `correct` attribute.
    pub marked_correct: bool,
}

impl QuizSource {
    /// Indices of options carrying a `correct` marker, in order.
    pub fn marked_correct(&self) -> Vec<usize> {
        self.options
            .iter()
            .enumerate()
            .filter(|(_, o)| o.marked_correct)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Each quiz block compiled to HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizHtml {
    pub question_html: String,
    pub option_html: Vec<String>,
    pub explanation_html: Option<String>,
}

/// Extract the quiz blocks of a qcm body without compiling them.
pub fn parse_quiz(src: &str) -> Result<QuizSource> {
    let src = normalize::run_pipeline(src);
    let nodes = components::parse(&src)?;

    let mut question: Option<String> = None;
    let mut options = Vec::new();
    let mut explanation: Option<String> = None;

    for node in &nodes {
        let component = match node {
            Node::Text { line, .. } => {
                return Err(CourseBuildError::markup(format!(
                    "line {line}: text outside <Question>, <Option> and <Explanation> blocks"
                )));
            }
            Node::Component(component) => component,
        };

        let line = component.line;
        let inner = component.inner.to_string();
        if inner.trim().is_empty() {
            return Err(CourseBuildError::markup(format!(
                "line {line}: <{}> must not be empty",
                component.name
            )));
        }

        match component.name {
            "Question" => {
                component.check_attrs(&[])?;
                if question.replace(inner).is_some() {
                    return Err(CourseBuildError::markup(format!(
                        "line {line}: a qcm atom has exactly one <Question>"
                    )));
                }
            }
            "Option" => {
                component.check_attrs(&["correct"])?;
                let marked_correct = match component.attr("correct") {
                    None => false,
                    Some(None) | Some(Some("true")) => true,
                    Some(Some("false")) => false,
                    Some(Some(other)) => {
                        return Err(CourseBuildError::markup(format!(
                            "line {line}: `correct` must be a flag or \"true\"/\"false\", got \"{other}\""
                        )));
                    }
                };
                options.push(QuizOptionSource {
                    markup: inner,
                    marked_correct,
                });
            }
            "Explanation" => {
                component.check_attrs(&[])?;
                if explanation.replace(inner).is_some() {
                    return Err(CourseBuildError::markup(format!(
                        "line {line}: a qcm atom has at most one <Explanation>"
                    )));
                }
            }
            other => {
                return Err(CourseBuildError::markup(format!(
                    "line {line}: <{other}> is not allowed at the top level of a qcm atom"
                )));
            }
        }
    }

    let Some(question) = question else {
        return Err(CourseBuildError::markup("missing <Question> block"));
    };
    if options.len() < MIN_OPTIONS {
        return Err(CourseBuildError::markup(format!(
            "a qcm atom needs at least {MIN_OPTIONS} <Option> blocks, found {}",
            options.len()
        )));
    }

    Ok(QuizSource {
        question,
        options,
        explanation,
    })
}

/// Extract the quiz blocks and compile each one independently.
pub fn compile_quiz(src: &str) -> Result<QuizHtml> {
    let source = parse_quiz(src)?;

    let question_html = compile_markup(&source.question)?;
    let option_html = source
        .options
        .iter()
        .map(|o| compile_markup(&o.markup))
        .collect::<Result<Vec<_>>>()?;
    let explanation_html = source
        .explanation
        .as_deref()
        .map(compile_markup)
        .transpose()?;

    Ok(QuizHtml {
        question_html,
        option_html,
        explanation_html,
    })
}
