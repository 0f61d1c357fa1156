#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use ember_common::diagnostics::{Diagnostic, DiagnosticKind};
    use ember_common::text::span::TextSpan;
    use ember_front::compilation_unit::CompilationUnit;
    use ember_middle::ir::lir::builder::LIRBuilder;


    #[derive(Clone, Copy, PartialEq)]
    enum Stage {
        Frontend,
        Backend,
    }

    struct DiagnosticsVerifier {
        expected: Vec<Diagnostic>,
        actual: Vec<Diagnostic>,
    }

    impl DiagnosticsVerifier {
        pub fn new(input: &str, messages: Vec<&str>, kind: DiagnosticKind, stage: Stage) -> Self {
            let msg_len = messages.len();
            let expected = Self::parse_input(input, messages, kind);
            assert_eq!(expected.len(), msg_len, "every message needs a «marked» span");
            let actual = Self::compile(input, stage)
                .into_iter()
                .filter(|diagnostic| diagnostic.kind == kind)
                .collect();

            Self { expected, actual }
        }

        fn compile(input: &str, stage: Stage) -> Vec<Diagnostic> {
            let raw_text = Self::get_raw_text(input);

            match CompilationUnit::compile(&raw_text) {
                Ok(mut unit) => {
                    if stage == Stage::Backend {
                        let builder = LIRBuilder::new(&unit.global_scope, Rc::clone(&unit.diagnostics_report));
                        let _ = builder.build(&mut unit.ast);
                    }
                    let report = unit.diagnostics_report.borrow();
                    report.errors.iter().chain(report.warnings.iter()).cloned().collect()
                }
                Err(report) => {
                    let report = report.borrow();
                    report.errors.iter().chain(report.warnings.iter()).cloned().collect()
                }
            }
        }

        fn get_raw_text(input: &str) -> String {
            input.replace("«", "").replace("»", "")
        }

        fn parse_input(input: &str, messages: Vec<&str>, kind: DiagnosticKind) -> Vec<Diagnostic> {
            let raw_text = Self::get_raw_text(input);
            let mut start_index_stack = vec![];
            let mut current_position = 0;
            let mut diagnostics = vec![];

            for c in input.chars() {
                match c {
                    '«' => {
                        start_index_stack.push(current_position);
                    }
                    '»' => {
                        let start_index = start_index_stack.pop().unwrap();
                        let end_index = current_position;
                        let literal = &raw_text[start_index..end_index];
                        let span = TextSpan::new(start_index, end_index, literal.to_string());
                        let message = messages[diagnostics.len()].to_string();
                        diagnostics.push(Diagnostic::new(String::new(), message, span, kind));
                    }
                    _ => {
                        current_position += c.len_utf8();
                    }
                };
            }
            diagnostics
        }

        fn verify(&self) {
            assert_eq!(self.actual.len(), self.expected.len(), "Expected {} diagnostics, found {}: {:?}", self.expected.len(), self.actual.len(), self.actual);

            for (actual, expected) in self.actual.iter().zip(self.expected.iter()) {
                assert_eq!(actual.message_full, expected.message_full, "Expected message '{}', found '{}'", expected.message_full, actual.message_full);
                assert_eq!(actual.span.start, expected.span.start, "Expected start index {}, found {}", expected.span.start, actual.span.start);
                assert_eq!(actual.span.end, expected.span.end, "Expected end index {}, found {}", expected.span.end, actual.span.end);
                assert_eq!(actual.span.literal, expected.span.literal, "Expected literal {:?}, found {:?}", expected.span.literal, actual.span.literal);
            }
        }
    }

    fn assert_diagnostics(input: &str, expected: Vec<&str>) {
        DiagnosticsVerifier::new(input, expected, DiagnosticKind::Error, Stage::Frontend).verify();
    }

    fn assert_warnings(input: &str, expected: Vec<&str>) {
        DiagnosticsVerifier::new(input, expected, DiagnosticKind::Warning, Stage::Frontend).verify();
    }

    fn assert_backend_diagnostics(input: &str, expected: Vec<&str>) {
        DiagnosticsVerifier::new(input, expected, DiagnosticKind::Error, Stage::Backend).verify();
    }

    #[test]
    fn test_undeclared_variable() {
        let input = "let a = «b»";
        let expected = vec![
            "Undeclared variable `b`"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_expected_expression() {
        let input = "let a = «+»";
        let expected = vec![
            "Expected expression, found <+>"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_bad_token() {
        let input = "let a = 8 «@» 6";
        let expected = vec![
            "Unknown character `@`"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_integer_literal_out_of_range() {
        let input = "let a = «99999999999999999999»";
        let expected = vec![
            "Integer literal `99999999999999999999` does not fit in 64 bits"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_too_many_arguments() {
        let input = "\
fx f(a: int) -> int { return a }
let x = «f»(1, 2)";
        let expected = vec![
            "Function `f` expects 1 argument, but 2 were found"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_too_few_arguments() {
        let input = "\
fx g(a: int, b: int) -> int { return a }
let y = «g»(1)";
        let expected = vec![
            "Function `g` expects 2 arguments, but only 1 was found"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_builtin_argument_count() {
        let input = "let t = «tick»(1)";
        let expected = vec![
            "Function `tick` expects 0 arguments, but 1 was found"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_annotated_type_mismatch() {
        let input = "let x: int = «true»";
        let expected = vec![
            "Expected type `int`, found `bool`"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_adding_a_string_to_an_int() {
        let input = "let a = 1 + «\"x\"»";
        let expected = vec![
            "Expected type `int`, found `string`"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_wrong_return_type() {
        let input = "fx f() -> bool { return «3» }";
        let expected = vec![
            "Expected type `bool`, found `int`"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_return_outside_function() {
        let input = "«return» 1";
        let expected = vec![
            "Cannot use `return` outside of a function"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_undeclared_function() {
        let input = "«g»(1)";
        let expected = vec![
            "Undeclared function `g`"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_function_declared_twice() {
        let input = "\
fx a() {}
fx «a»() {}";
        let expected = vec![
            "Function `a` already declared"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_builtin_cannot_be_redeclared() {
        let input = "fx «print»(a: int) {}";
        let expected = vec![
            "Function `print` already declared"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_nested_function() {
        let input = "\
fx outer() {
    fx «inner»() {}
}";
        let expected = vec![
            "Function `inner` must be declared at the top level"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_undeclared_type() {
        let input = "let x: «float» = 1";
        let expected = vec![
            "Undeclared type `float`"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_void_call_used_as_value() {
        let input = "\
fx f() {}
let x = «f()»";
        let expected = vec![
            "`f()` produces no value and cannot be used here"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_top_level_variables_are_not_visible_in_functions() {
        let input = "\
let a = 1
fx f() -> int { return «a» }";
        let expected = vec![
            "Undeclared variable `a`"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_block_scoped_variable_is_gone_after_the_block() {
        let input = "\
let a = 1
if a == 1 {
    let b = 2
}
print(«b»)";
        let expected = vec![
            "Undeclared variable `b`"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_invalid_assignment_target() {
        let input = "let a = 0\n«(a)» = 1";
        let expected = vec![
            "Cannot assign to `(a)`"
        ];

        assert_diagnostics(input, expected);
    }

    #[test]
    fn test_unreachable_statement_warning() {
        let input = "\
fx f() -> int {
    return 1
    «print(2)»
}
print(f())";
        let expected = vec![
            "unreachable statement after `return`"
        ];

        assert_warnings(input, expected);
        assert!(CompilationUnit::compile(&DiagnosticsVerifier::get_raw_text(input)).is_ok());
    }

    #[test]
    fn test_comparison_is_unsupported_natively() {
        let input = "let b = «1 < 2»";
        let expected = vec![
            "comparison `<` is unsupported in this backend"
        ];

        assert_backend_diagnostics(input, expected);
    }

    #[test]
    fn test_string_concatenation_is_unsupported_natively() {
        let input = "let s = «\"a\" + \"b\"»";
        let expected = vec![
            "string concatenation is unsupported in this backend"
        ];

        assert_backend_diagnostics(input, expected);
    }

    #[test]
    fn test_loops_are_unsupported_natively() {
        let input = "let a = 0\nwhile a < 3 { a = a + 1 }";
        let mut unit = CompilationUnit::compile(input).unwrap();

        let result = LIRBuilder::new(&unit.global_scope, Rc::clone(&unit.diagnostics_report)).build(&mut unit.ast);

        assert!(result.is_err());
        let report = unit.diagnostics_report.borrow();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].message_full, "`while` loop is unsupported in this backend");
        assert_eq!(report.errors[0].span.start, input.find("while").unwrap());
    }
}
