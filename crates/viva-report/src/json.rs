//! JSON report generation for finished examinations.
//!
//! This module provides [`JsonGenerator`] for serializing verdict reports to
//! JSON. Reports can be generated as compact single-line JSON or
//! pretty-printed for human readability.
//!
//! # Example
//!
//! ```rust
//! use viva_report::{QuestionOutcome, Report};
//! use viva_report::json::JsonGenerator;
//!
//! let report = Report::builder()
//!     .document_name("attention.pdf")
//!     .outcome(QuestionOutcome::new("What is self-attention?", "easy", 9, 10, "Excellent."))
//!     .build();
//!
//! let generator = JsonGenerator::new(&report);
//!
//! // Generate compact JSON
//! let compact = generator.generate().unwrap();
//! assert!(!compact.contains('\n'));
//!
//! // Generate pretty-printed JSON
//! let pretty = generator.generate_pretty().unwrap();
//! assert!(pretty.contains('\n'));
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::{Report, ReportError, Result};

/// JSON report generator.
///
/// Wraps a [`Report`] reference and provides methods for serializing it to
/// JSON in various formats.
pub struct JsonGenerator<'a> {
    report: &'a Report,
}

impl<'a> JsonGenerator<'a> {
    /// Creates a new JSON generator for the given report.
    #[must_use]
    pub const fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Generates compact JSON output (single line, no extra whitespace).
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.report).map_err(ReportError::from)
    }

    /// Generates pretty-printed JSON output with indentation.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.report).map_err(ReportError::from)
    }

    /// Writes the JSON report directly to a file.
    ///
    /// This method creates or overwrites the file at the specified path.
    /// Parent directories must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if serialization fails, or
    /// [`ReportError::Io`] if the file cannot be written.
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
