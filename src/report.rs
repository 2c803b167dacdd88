#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Report files written in batch mode.

use std::path::{Path, PathBuf};

use crate::{error::EvalError, pipeline::Evaluation};

/// Extension of rendered report files.
pub const REPORT_EXTENSION: &str = "md";

/// Where the report for `paper` goes inside `output_dir`: same file stem,
/// report extension.
pub fn report_path(output_dir: &Path, paper: &Path) -> PathBuf {
    let stem = paper
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    output_dir.join(format!("{stem}.{REPORT_EXTENSION}"))
}

/// Renders the final evaluation of one paper as a Markdown document.
///
/// Text is kept as-is; any Unicode in the evaluation survives.
pub fn render_report(paper_name: &str, evaluation: &Evaluation) -> String {
    format!(
        "# Evaluation Report: {paper_name}\n\n{}\n",
        evaluation.final_evaluation.trim_end()
    )
}

/// Writes a rendered report to `path`.
pub fn write_report(path: &Path, contents: &str) -> Result<(), EvalError> {
    std::fs::write(path, contents).map_err(|e| EvalError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(text: &str) -> Evaluation {
        Evaluation {
            grader_a:         "a".into(),
            grader_b:         "b".into(),
            final_evaluation: text.into(),
        }
    }

    #[test]
    fn report_keeps_the_stem() {
        let path = report_path(Path::new("/out"), Path::new("/in/essay 1.pdf"));
        assert_eq!(path, Path::new("/out/essay 1.md"));
    }

    #[test]
    fn render_keeps_unicode_and_only_final_text() {
        let out = render_report("José.pdf", &evaluation("Score: 9/10 — très bien ✓\n\n"));
        assert_eq!(out, "# Evaluation Report: José.pdf\n\nScore: 9/10 — très bien ✓\n");
        assert!(!out.contains("Grader"));
    }
}
