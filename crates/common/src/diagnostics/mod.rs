/*
 * diagnostics gathered while compiling a single source file
 *  errors stop the pipeline before any backend runs, warnings never do
 */
pub mod printer;

use crate::text::span::TextSpan;
use crate::token::{Token, TokenKind};
use crate::typings::Type;
use std::cell::RefCell;
use std::rc::Rc;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    Error,
    Warning,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub message_brief: String,
    pub message_full: String,
    pub span: TextSpan,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(message_brief: String, message_full: String, span: TextSpan, kind: DiagnosticKind) -> Self {
        Diagnostic { message_brief, message_full, span, kind }
    }
}

pub type DiagnosticsReportCell = Rc<RefCell<DiagnosticsReport>>;

#[derive(Debug, Default)]
pub struct DiagnosticsReport {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl DiagnosticsReport {
    pub fn new() -> Self {
        DiagnosticsReport { errors: vec![], warnings: vec![] }
    }

    pub fn new_cell() -> DiagnosticsReportCell {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn report_error(&mut self, message_brief: String, message_full: String, span: TextSpan) {
        let error = Diagnostic::new(message_brief, message_full, span, DiagnosticKind::Error);
        self.errors.push(error);
    }

    pub fn report_warning(&mut self, message_brief: String, message_full: String, span: TextSpan) {
        let warning = Diagnostic::new(message_brief, message_full, span, DiagnosticKind::Warning);
        self.warnings.push(warning);
    }

    // Errors
    pub fn report_unexpected_token(&mut self, expected: &TokenKind, token: &Token) {
        self.report_error(
            format!("unexpected token"),
            format!("Expected token <{}>, found <{}>", expected, token.kind),
            token.span.clone(),
        );
    }

    pub fn report_expected_expression(&mut self, token: &Token) {
        self.report_error(
            format!("expected expression"),
            format!("Expected expression, found <{}>", token.kind),
            token.span.clone(),
        );
    }

    pub fn report_bad_character(&mut self, token: &Token) {
        self.report_error(
            format!("unknown character"),
            format!("Unknown character `{}`", token.span.literal),
            token.span.clone(),
        );
    }

    pub fn report_undeclared_variable(&mut self, var: &str, span: &TextSpan) {
        self.report_error(
            format!("undeclared variable"),
            format!("Undeclared variable `{}`", var),
            span.clone(),
        );
    }

    pub fn report_undeclared_function(&mut self, name: &str, span: &TextSpan) {
        self.report_error(
            format!("undeclared function"),
            format!("Undeclared function `{}`", name),
            span.clone(),
        );
    }

    pub fn report_function_already_declared(&mut self, token: &Token) {
        self.report_error(
            format!("multiple function declarations"),
            format!("Function `{}` already declared", token.span.literal),
            token.span.clone(),
        );
    }

    pub fn report_invalid_arg_count(&mut self, callee_span: &TextSpan, expected: usize, actual: usize) {
        self.report_error(
            format!("invalid argument count"),
            format!("Function `{}` expects {} {}, but{} {} {} found",
                callee_span.literal,
                expected, if expected == 1 { "argument" } else { "arguments" },
                if actual < expected { " only" } else { "" },
                actual, if actual == 1 { "was" } else { "were" }),
            callee_span.clone(),
        );
    }

    pub fn report_type_mismatch(&mut self, expected: &Type, actual: &Type, span: &TextSpan) {
        self.report_error(
            format!("mismatched types"),
            format!("Expected type `{}`, found `{}`", expected, actual),
            span.clone(),
        );
    }

    pub fn report_undeclared_type(&mut self, token: &Token) {
        self.report_error(
            format!("undeclared type"),
            format!("Undeclared type `{}`", token.span.literal),
            token.span.clone(),
        );
    }

    pub fn report_return_outside_function(&mut self, token: &Token) {
        self.report_error(
            format!("return outside function"),
            format!("Cannot use `return` outside of a function"),
            token.span.clone(),
        );
    }

    pub fn report_nested_function(&mut self, token: &Token) {
        self.report_error(
            format!("nested function"),
            format!("Function `{}` must be declared at the top level", token.span.literal),
            token.span.clone(),
        );
    }

    pub fn report_invalid_assignment_target(&mut self, span: &TextSpan) {
        self.report_error(
            format!("invalid left-hand side in assignment"),
            format!("Cannot assign to `{}`", span.literal),
            span.clone(),
        );
    }

    pub fn report_void_value(&mut self, span: &TextSpan) {
        self.report_error(
            format!("expression has no value"),
            format!("`{}` produces no value and cannot be used here", span.literal),
            span.clone(),
        );
    }

    pub fn report_division_by_zero(&mut self, operator: &str, span: &TextSpan) {
        self.report_error(
            format!("division by zero"),
            format!("Division by zero in `{}` operation", operator),
            span.clone(),
        );
    }

    pub fn report_division_overflow(&mut self, operator: &str, span: &TextSpan) {
        self.report_error(
            format!("integer overflow"),
            format!("Integer overflow in `{}` operation", operator),
            span.clone(),
        );
    }

    pub fn report_integer_out_of_range(&mut self, token: &Token) {
        self.report_error(
            format!("integer literal out of range"),
            format!("Integer literal `{}` does not fit in 64 bits", token.span.literal),
            token.span.clone(),
        );
    }

    pub fn report_unsupported_in_backend(&mut self, construct: &str, span: &TextSpan) {
        self.report_error(
            format!("unsupported in this backend"),
            format!("{} is unsupported in this backend", construct),
            span.clone(),
        );
    }

    // Warnings
    pub fn warn_unreachable_code(&mut self, span: &TextSpan) {
        self.report_warning(
            format!("unreachable statement"),
            format!("unreachable statement after `return`"),
            span.clone(),
        );
    }
}
