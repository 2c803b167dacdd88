#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use glob::{MatchOptions, glob_with};

use crate::error::EvalError;

/// Lists files directly inside `dir` whose extension is `extension`, ignoring
/// case, sorted by path.
pub fn find_files(extension: &str, dir: &Path) -> Result<Vec<PathBuf>, EvalError> {
    let root = dir
        .to_str()
        .ok_or_else(|| EvalError::value(format!("Path {} is not valid UTF-8", dir.display())))?;
    let pattern = Path::new(&glob::Pattern::escape(root)).join(format!("*.{extension}"));
    let pattern = pattern.to_string_lossy();

    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut files: Vec<PathBuf> = glob_with(&pattern, options)
        .map_err(|e| EvalError::value(format!("Could not create glob: {e}")))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_only_matching_files() {
        let dir = std::env::temp_dir().join(format!("paper-grader-util-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("nested.pdf")).unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let found: Vec<String> = find_files("pdf", &dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(found, vec!["a.PDF".to_string(), "b.pdf".to_string()]);

        let _ = std::fs::remove_dir_all(dir);
    }
}
