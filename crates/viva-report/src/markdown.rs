//! Markdown report generation for finished examinations.
//!
//! This module provides the [`MarkdownGenerator`] struct for converting a
//! [`Report`] into a human-readable Markdown document. The generated report
//! includes:
//!
//! - The verdict card with letter grade and pass/fail status
//! - A per-question outcome table
//! - The competency breakdown
//! - Logical gaps organized by severity
//!
//! # Example
//!
//! ```rust
//! use viva_report::{MarkdownGenerator, QuestionOutcome, Report};
//!
//! let report = Report::builder()
//!     .document_name("attention.pdf")
//!     .outcome(QuestionOutcome::new("What is self-attention?", "easy", 9, 10, "Excellent."))
//!     .build();
//!
//! let generator = MarkdownGenerator::new(&report);
//! let markdown = generator.generate();
//! assert!(markdown.contains("# Viva Examination Report"));
//! ```

use std::fmt::Write;

use chrono::Utc;

use crate::{GapSeverity, LogicalGap, QuestionOutcome, Report, SubjectRating};

/// Generates Markdown reports from finished examinations.
///
/// The generator takes a reference to a [`Report`] and produces a formatted
/// Markdown string suitable for human review.
pub struct MarkdownGenerator<'a> {
    report: &'a Report,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_verdict(&mut output);
        self.write_outcomes(&mut output);
        self.write_breakdown(&mut output);
        self.write_gaps(&mut output);
        Self::write_footer(&mut output);

        output
    }

    /// Writes the report title.
    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# Viva Examination Report: {}\n",
            escape_markdown(&self.report.document_name)
        );
    }

    /// Writes the verdict card as a metrics table.
    fn write_verdict(&self, output: &mut String) {
        let summary = &self.report.summary;
        let verdict = summary.verdict;

        let _ = writeln!(output, "## Final Verdict\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(
            output,
            "| Result | {} |",
            if verdict.passed { "PASSED" } else { "FAILED" }
        );
        let _ = writeln!(
            output,
            "| Grade | {} ({}) |",
            verdict.grade.letter(),
            verdict.grade.label()
        );
        let _ = writeln!(
            output,
            "| Score | {} / {} ({}%) |",
            summary.final_score, summary.max_score, verdict.percentage
        );
        let _ = writeln!(
            output,
            "| Questions | {} of {} evaluated |",
            summary.questions_answered, summary.total_questions
        );
        let _ = writeln!(output);
    }

    /// Writes the per-question outcome table.
    fn write_outcomes(&self, output: &mut String) {
        let _ = writeln!(output, "## Question Outcomes\n");

        if self.report.outcomes.is_empty() {
            let _ = writeln!(output, "*No questions were evaluated.*\n");
            return;
        }

        let _ = writeln!(output, "| # | Question | Difficulty | Score | Result |");
        let _ = writeln!(output, "|---|----------|------------|-------|--------|");
        for (index, outcome) in self.report.outcomes.iter().enumerate() {
            Self::write_outcome_row(output, index + 1, outcome);
        }
        let _ = writeln!(output);
    }

    /// Writes one outcome table row.
    fn write_outcome_row(output: &mut String, number: usize, outcome: &QuestionOutcome) {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {}/{} | {} |",
            number,
            escape_markdown(&outcome.question),
            escape_markdown(&outcome.difficulty),
            outcome.score,
            outcome.max_points,
            if outcome.passed { "pass" } else { "below threshold" }
        );
    }

    /// Writes the competency breakdown table.
    fn write_breakdown(&self, output: &mut String) {
        let _ = writeln!(output, "## Competency Breakdown\n");

        if self.report.breakdown.is_empty() {
            let _ = writeln!(output, "*No competency breakdown available.*\n");
            return;
        }

        let _ = writeln!(output, "| Subject | Score |");
        let _ = writeln!(output, "|---------|-------|");
        for rating in &self.report.breakdown {
            Self::write_breakdown_row(output, rating);
        }
        let _ = writeln!(output);
    }

    /// Writes one breakdown table row.
    fn write_breakdown_row(output: &mut String, rating: &SubjectRating) {
        let _ = writeln!(
            output,
            "| {} | {}/{} |",
            escape_markdown(&rating.subject),
            rating.score,
            rating.full_mark
        );
    }

    /// Writes the logical gaps grouped by severity.
    fn write_gaps(&self, output: &mut String) {
        let _ = writeln!(output, "## Logical Gaps\n");

        if self.report.gaps.is_empty() {
            let _ = writeln!(output, "*No logical gaps detected.*\n");
            return;
        }

        let high: Vec<&LogicalGap> = self.gaps_with(GapSeverity::High);
        let medium: Vec<&LogicalGap> = self.gaps_with(GapSeverity::Medium);
        let low: Vec<&LogicalGap> = self.gaps_with(GapSeverity::Low);

        Self::write_gap_section(output, "High", &high);
        Self::write_gap_section(output, "Medium", &medium);
        Self::write_gap_section(output, "Low", &low);
    }

    /// Collects gaps of one severity.
    fn gaps_with(&self, severity: GapSeverity) -> Vec<&LogicalGap> {
        self.report
            .gaps
            .iter()
            .filter(|g| g.severity == severity)
            .collect()
    }

    /// Writes one severity section, if it has gaps.
    fn write_gap_section(output: &mut String, title: &str, gaps: &[&LogicalGap]) {
        if gaps.is_empty() {
            return;
        }
        let _ = writeln!(output, "### {title} ({})\n", gaps.len());
        for gap in gaps {
            let _ = writeln!(
                output,
                "- **{}** — {}",
                escape_markdown(&gap.question),
                escape_markdown(&gap.description)
            );
        }
        let _ = writeln!(output);
    }

    /// Writes the footer with generation timestamp.
    fn write_footer(output: &mut String) {
        let _ = writeln!(output, "---\n");
        let _ = writeln!(
            output,
            "*Generated by Viva on {}*",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
}

/// Escapes Markdown table-breaking characters in user-provided text.
fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

// ============================================================================
// Tests
// ============================================================================
