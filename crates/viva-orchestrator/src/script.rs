//! Exam script loading for the Viva orchestrator.
//!
//! An exam script is a JSON file listing the ordered questions derived
//! offline for one document. Scripts are the input of the reference
//! [`crate::adapters::ScriptedQuestionSource`]; any other question source can
//! replace them entirely.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VivaError};
use crate::session::Question;

/// Maximum allowed exam script file size in bytes (100KB).
pub const MAX_SCRIPT_SIZE: u64 = 100 * 1024;

/// In-memory representation of a loaded exam script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamScript {
    /// Human-readable title of the examination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Ordered, non-empty question set.
    pub questions: Vec<Question>,
}

impl ExamScript {
    /// Loads and validates an exam script from disk.
    ///
    /// # Errors
    ///
    /// Every failure maps to `DocumentUnprocessable` with the script path as
    /// the document: missing file, oversized file, non-UTF-8 content,
    /// malformed JSON, an empty question list, or a question with zero
    /// maximum points.
    pub fn load(path: &Path) -> Result<Self> {
        let document = path.display().to_string();

        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VivaError::document_unprocessable(&document, "exam script not found")
            } else {
                VivaError::document_unprocessable(&document, format!("cannot stat script: {e}"))
            }
        })?;
        if metadata.len() > MAX_SCRIPT_SIZE {
            return Err(VivaError::document_unprocessable(
                &document,
                format!(
                    "exam script exceeds the size limit ({}KB > {}KB)",
                    metadata.len() / 1024,
                    MAX_SCRIPT_SIZE / 1024
                ),
            ));
        }

        let contents = std::fs::read(path)
            .map_err(|e| VivaError::document_unprocessable(&document, format!("read failed: {e}")))?;
        let contents = String::from_utf8(contents).map_err(|_| {
            VivaError::document_unprocessable(&document, "exam script is not valid UTF-8")
        })?;

        let script: Self = serde_json::from_str(&contents).map_err(|e| {
            VivaError::document_unprocessable(&document, format!("invalid JSON: {e}"))
        })?;
        script.validate(&document)?;
        Ok(script)
    }

    /// Validates the question set.
    fn validate(&self, document: &str) -> Result<()> {
        if self.questions.is_empty() {
            return Err(VivaError::document_unprocessable(
                document,
                "exam script contains no questions",
            ));
        }
        for (index, question) in self.questions.iter().enumerate() {
            if question.text.trim().is_empty() {
                return Err(VivaError::document_unprocessable(
                    document,
                    format!("question {} has empty text", index + 1),
                ));
            }
            if question.max_points == 0 {
                return Err(VivaError::document_unprocessable(
                    document,
                    format!("question {} has zero maximum points", index + 1),
                ));
            }
        }
        Ok(())
    }
}

/// Resolves a document reference to the script file that examines it.
///
/// The document's extension is replaced by `.json`, so `attention.pdf` maps
/// to `<root>/attention.json`. References containing path separators or
/// parent components are rejected to keep lookups inside the script root.
pub fn script_path_for(root: &Path, document_ref: &str) -> Result<PathBuf> {
    let trimmed = document_ref.trim();
    if trimmed.is_empty() {
        return Err(VivaError::document_unprocessable(
            document_ref,
            "document reference is empty",
        ));
    }
    if trimmed.contains(['/', '\\']) || trimmed.contains("..") {
        return Err(VivaError::document_unprocessable(
            document_ref,
            "document reference must be a bare file name",
        ));
    }
    let stem = Path::new(trimmed)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(trimmed);
    Ok(root.join(format!("{stem}.json")))
}
