/*
 * renders diagnostics against the source they were reported on
 */

use super::{Diagnostic, DiagnosticKind};
use crate::text::SourceText;
use std::cmp;
use termion::{color::{Fg, Blue, Red, Yellow, Reset},
    style::{Bold, Reset as StyleReset}
};


const CONTEXT_LENGTH: usize = 8;

pub struct DiagnosticsPrinter<'a> {
    text: &'a SourceText,
    diagnostics: &'a [Diagnostic],
}

/// The slice of a source line shown around a diagnostic
struct Excerpt<'a> {
    line_number: usize,
    column: usize,
    before: &'a str,
    marked: &'a str,
    after: &'a str,
}

impl <'a> DiagnosticsPrinter<'a> {
    pub fn new(text: &'a SourceText, diagnostics: &'a [Diagnostic]) -> Self {
        Self { text, diagnostics }
    }

    /// Formats an error as
    ///
    /// ```shell
    /// error: <brief>
    ///   |
    /// 3 | let y = <red>x<reset> + 1;
    ///   |         ^
    ///   |         +-- <full message> (3:9)
    /// ```
    pub fn error_to_str(&self, diagnostic: &Diagnostic) -> String {
        let excerpt = self.excerpt(diagnostic);
        let gutter = Self::gutter(excerpt.line_number);
        let indent = excerpt.before.len();
        let width = cmp::max(1, excerpt.marked.chars().count());

        format!(
            "{}{}error{}: {}{}\n{}\n{}{}{}{}{}{}\n{}{:indent$}{}\n{}{:indent$}+-- {} ({}:{})\n",
            Bold, Fg(Red), Fg(Reset), diagnostic.message_brief, StyleReset,
            gutter,
            Self::line_label(excerpt.line_number), excerpt.before,
            Fg(Red), excerpt.marked, Fg(Reset), excerpt.after,
            gutter, "", "^".repeat(width),
            gutter, "", diagnostic.message_full, excerpt.line_number, excerpt.column + 1,
            indent = indent
        )
    }

    /// Formats a warning as
    ///
    /// ```shell
    /// warning: <full message>
    ///   |
    /// 4 | print(x);
    ///   | ~~~~~~~~
    /// ```
    pub fn warning_to_str(&self, diagnostic: &Diagnostic) -> String {
        let excerpt = self.excerpt(diagnostic);
        let gutter = Self::gutter(excerpt.line_number);
        let indent = excerpt.before.len();
        let width = cmp::max(1, excerpt.marked.chars().count());

        format!(
            "{}{}warning{}: {}{}\n{}\n{}{}{}{}\n{}{:indent$}{}{}{}\n",
            Bold, Fg(Yellow), Fg(Reset), diagnostic.message_full, StyleReset,
            gutter,
            Self::line_label(excerpt.line_number), excerpt.before, excerpt.marked, excerpt.after,
            gutter, "", Fg(Yellow), "~".repeat(width), Fg(Reset),
            indent = indent
        )
    }

    pub fn print_errors(&self) {
        for diagnostic in self.diagnostics.iter().filter(|d| d.kind == DiagnosticKind::Error) {
            eprintln!("{}", self.error_to_str(diagnostic));
        }
    }

    pub fn print_warnings(&self) {
        for diagnostic in self.diagnostics.iter().filter(|d| d.kind == DiagnosticKind::Warning) {
            eprintln!("{}", self.warning_to_str(diagnostic));
        }
    }

    fn excerpt(&self, diagnostic: &Diagnostic) -> Excerpt<'a> {
        let line_index = self.text.line_index(diagnostic.span.start);
        let line = self.text.fetch_line(line_index);
        let line_start = self.text.line_start(line_index);

        let column = cmp::min(diagnostic.span.start.saturating_sub(line_start), line.len());
        let marked_end = cmp::min(column + diagnostic.span.length(), line.len());
        let before_start = column.saturating_sub(CONTEXT_LENGTH);
        let after_end = cmp::min(marked_end + CONTEXT_LENGTH, line.len());

        let slice = |from: usize, to: usize| line.get(from..to).unwrap_or("");

        Excerpt {
            line_number: line_index + 1,
            column,
            before: slice(before_start, column),
            marked: slice(column, marked_end),
            after: slice(marked_end, after_end),
        }
    }

    fn gutter(line_number: usize) -> String {
        let padding = " ".repeat(line_number.to_string().len() + 1);
        format!("{}{}{}|{}{} ", padding, Fg(Blue), Bold, StyleReset, Fg(Reset))
    }

    fn line_label(line_number: usize) -> String {
        format!("{}{}{} |{}{} ", Fg(Blue), Bold, line_number, StyleReset, Fg(Reset))
    }
}
