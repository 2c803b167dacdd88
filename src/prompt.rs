#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use crate::{config::EvaluatorConfig, error::EvalError, source::read_text_file};

/// Heading placed before the rubric text.
pub const RUBRIC_HEADING: &str = "Rubric:";
/// Heading placed before the paper text.
pub const PAPER_HEADING: &str = "Student Paper:";
/// Heading placed before grader A's evaluation in moderator prompts.
pub const GRADER_A_HEADING: &str = "Evaluation from Grader A:";
/// Heading placed before grader B's evaluation in moderator prompts.
pub const GRADER_B_HEADING: &str = "Evaluation from Grader B:";

/// Separator between prompt sections.
const SECTION_SEPARATOR: &str = "\n\n";

/// Role templates for the two kinds of service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    /// Instructions for an independent grader.
    grader:    String,
    /// Instructions for the moderator.
    moderator: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self::load()
    }
}

impl Prompts {
    /// Loads the templates embedded in the binary.
    pub fn load() -> Self {
        Self {
            grader:    include_str!("prompts/grader.md").trim_end().to_string(),
            moderator: include_str!("prompts/moderator.md").trim_end().to_string(),
        }
    }

    /// Builds templates from explicit text.
    pub fn new(grader: impl Into<String>, moderator: impl Into<String>) -> Self {
        Self {
            grader:    grader.into(),
            moderator: moderator.into(),
        }
    }

    /// Loads the embedded templates, replacing each one whose override path
    /// is set in `config`.
    pub fn from_config(config: &EvaluatorConfig) -> Result<Self, EvalError> {
        let mut prompts = Self::load();
        if let Some(path) = config.grader_prompt_path() {
            prompts.grader = read_template(path)?;
        }
        if let Some(path) = config.moderator_prompt_path() {
            prompts.moderator = read_template(path)?;
        }
        Ok(prompts)
    }

    /// Returns the grader template.
    pub fn grader(&self) -> &str {
        &self.grader
    }

    /// Returns the moderator template.
    pub fn moderator(&self) -> &str {
        &self.moderator
    }
}

/// Reads a template override, trimming trailing whitespace.
fn read_template(path: &Path) -> Result<String, EvalError> {
    Ok(read_text_file(path)?.trim_end().to_string())
}

/// Which template a prompt is built from, with the extra inputs that role
/// needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole<'a> {
    /// An independent grader.
    Grader,
    /// The moderator, given both completed grader evaluations.
    Moderator {
        /// Grader A's evaluation.
        grader_a: &'a str,
        /// Grader B's evaluation.
        grader_b: &'a str,
    },
}

/// Assembles the full instruction string for one service call.
///
/// Sections appear in this order, separated by a blank line: the calibration
/// directive (when given), the role template, the rubric, the paper, and for
/// the moderator both grader evaluations. Inputs are inserted unchanged,
/// empty strings included.
pub fn build_prompt(
    prompts: &Prompts,
    role: PromptRole<'_>,
    rubric: &str,
    paper: &str,
    calibration: Option<&str>,
) -> String {
    let template = match role {
        PromptRole::Grader => prompts.grader(),
        PromptRole::Moderator { .. } => prompts.moderator(),
    };

    let mut sections: Vec<String> = Vec::with_capacity(7);
    if let Some(directive) = calibration {
        sections.push(directive.to_string());
    }
    sections.push(template.to_string());
    sections.push(format!("{RUBRIC_HEADING}\n{rubric}"));
    sections.push(format!("{PAPER_HEADING}\n{paper}"));

    if let PromptRole::Moderator { grader_a, grader_b } = role {
        sections.push(format!("{GRADER_A_HEADING}\n{grader_a}"));
        sections.push(format!("{GRADER_B_HEADING}\n{grader_b}"));
    }

    sections.join(SECTION_SEPARATOR)
}
