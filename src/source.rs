#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Turns rubric and paper files into plain text.

use std::{
    io,
    panic::{AssertUnwindSafe, catch_unwind},
    path::Path,
};

use serde_json::Value;

use crate::error::EvalError;

/// Field read from a structured rubric file.
pub const RUBRIC_FIELD: &str = "rubric";

/// Extracts plain text from input documents.
pub trait TextSource: Send + Sync + 'static {
    /// Returns the text of every page of a PDF, concatenated with no
    /// separator.
    fn extract_pdf_text(&self, path: &Path) -> Result<String, EvalError>;

    /// Returns the `rubric` field of a JSON rubric file, or an empty string
    /// when the field is absent.
    fn extract_structured_rubric(&self, path: &Path) -> Result<String, EvalError>;
}

/// Supported rubric file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubricFormat {
    /// A PDF document.
    Pdf,
    /// A JSON document with a `rubric` field.
    Json,
}

impl RubricFormat {
    /// Picks the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self, EvalError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pdf") => Ok(RubricFormat::Pdf),
            Some("json") => Ok(RubricFormat::Json),
            _ => Err(EvalError::value("Unsupported rubric file format")),
        }
    }
}

/// Loads rubric text, routing on the file extension.
///
/// An unsupported extension fails before `source` is touched.
pub fn load_rubric<T: TextSource + ?Sized>(source: &T, path: &Path) -> Result<String, EvalError> {
    match RubricFormat::from_path(path)? {
        RubricFormat::Pdf => source.extract_pdf_text(path),
        RubricFormat::Json => source.extract_structured_rubric(path),
    }
}

/// Reads a whole UTF-8 file, distinguishing a missing file from other
/// failures.
pub fn read_text_file(path: &Path) -> Result<String, EvalError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => EvalError::NotFound(path.to_path_buf()),
        _ => EvalError::io(path, e),
    })
}

/// Pulls the rubric text out of a parsed JSON document.
fn rubric_from_json(path: &Path, raw: &str) -> Result<String, EvalError> {
    let doc: Value = serde_json::from_str(raw).map_err(|e| {
        EvalError::value(format!("Could not parse rubric file '{}' as JSON: {e}", path.display()))
    })?;

    match doc.get(RUBRIC_FIELD) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(EvalError::value(format!(
            "Field `{RUBRIC_FIELD}` in '{}' must be a string, found {other}",
            path.display()
        ))),
    }
}

/// Reads documents from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTextSource;

impl TextSource for FsTextSource {
    fn extract_pdf_text(&self, path: &Path) -> Result<String, EvalError> {
        if !path.exists() {
            return Err(EvalError::NotFound(path.to_path_buf()));
        }

        // pdf-extract can panic on malformed documents.
        let pages = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path)))
            .map_err(|_| EvalError::io(path, "PDF parser panicked on malformed document"))?
            .map_err(|e| EvalError::io(path, e))?;

        Ok(pages.concat())
    }

    fn extract_structured_rubric(&self, path: &Path) -> Result<String, EvalError> {
        let raw = read_text_file(path)?;
        rubric_from_json(path, &raw)
    }
}
