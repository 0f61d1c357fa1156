#[cfg(test)]
mod tests {
    use ember_front::ast::eval::Value;

    use crate::common::compile;


    fn run(input: &str) -> (Value, String) {
        let mut unit = compile(input);
        let mut output = Vec::new();
        let value = unit.run_evaluator(&mut output)
            .unwrap_or_else(|report| panic!("evaluation failed: {:?}", report.borrow().errors));

        (value, String::from_utf8(output).unwrap())
    }

    fn assert_output(input: &str, expected: &str) {
        let (value, output) = run(input);
        assert_eq!(value, Value::Number(0));
        assert_eq!(output, expected);
    }

    #[test]
    fn prints_every_value_kind() {
        assert_output(r#"
        print(42)
        print(true)
        print("hi")
        print(to_string(-7) + "!")
        "#, "42\ntrue\nhi\n-7!\n");
    }

    #[test]
    fn arithmetic_follows_precedence_and_truncates() {
        assert_output("
        let a = 2 + 3 * 4
        let b = (2 + 3) * 4
        print(a)
        print(b)
        print(-7 / 2)
        print(-7 % 2)
        ", "14\n20\n-3\n-1\n");
    }

    #[test]
    fn functions_see_their_own_arguments() {
        assert_output("
        fx sum8(a: int, b: int, c: int, d: int, e: int, f: int, g: int, h: int) -> int {
            return a + b + c + d + e + f + g + h
        }
        print(sum8(1, 2, 3, 4, 5, 6, 7, 8))
        ", "36\n");
    }

    #[test]
    fn recursion_and_loops() {
        assert_output("
        fx fact(n: int) -> int {
            if n <= 1 {
                return 1
            }
            return n * fact(n - 1)
        }

        let i = 0
        let total = 0
        while i < 4 {
            total = total + fact(i)
            i = i + 1
        }
        print(total)
        ", "10\n");
    }

    #[test]
    fn arguments_are_evaluated_left_to_right() {
        assert_output("
        fx show(n: int) -> int {
            print(n)
            return n
        }
        fx pair(a: int, b: int) -> int { return a - b }
        print(pair(show(1), show(2)))
        ", "1\n2\n-1\n");
    }

    #[test]
    fn assignment_is_an_expression() {
        assert_output("
        let a = 1
        let b = a = 5
        print(a + b)
        ", "10\n");
    }

    #[test]
    fn left_operand_is_read_before_the_right_assigns() {
        assert_output("
        let r = 5
        print(r + (r = 10))
        print(r)
        ", "15\n10\n");
    }

    #[test]
    fn argument_is_read_before_a_later_argument_assigns() {
        assert_output("
        fx two(x: int, y: int) -> int {
            return x * 10 + y
        }
        let r = 5
        print(two(r, r = 3))
        ", "53\n");
    }

    #[test]
    fn falling_off_a_typed_function_returns_its_zero() {
        assert_output(r#"
        fx f(x: int) -> int {
            let y = x
        }
        fx g() -> bool {
            let unused = 1
        }
        fx h() -> string {
            let unused = 1
        }
        print(f(3))
        print(g())
        print(h() + "|")
        "#, "0\nfalse\n|\n");
    }

    #[test]
    fn tick_moves_forward() {
        assert_output("
        let start = tick()
        let end = tick()
        print(end >= start)
        ", "true\n");
    }

    #[test]
    fn division_by_zero_halts_the_program() {
        let mut unit = compile("
        print(1)
        let zero = 0
        print(10 / zero)
        print(2)
        ");
        let mut output = Vec::new();

        let report = unit.run_evaluator(&mut output).unwrap_err();

        let report = report.borrow();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].message_full, "Division by zero in `/` operation");
        assert_eq!(report.errors[0].span.literal, "10 / zero");
        assert_eq!(String::from_utf8(output).unwrap(), "1\n");
    }

    #[test]
    fn dividing_the_smallest_int_by_minus_one_halts() {
        let mut unit = compile("
        let smallest = -9223372036854775807 - 1
        print(smallest % 2)
        print(smallest / -1)
        print(2)
        ");
        let mut output = Vec::new();

        let report = unit.run_evaluator(&mut output).unwrap_err();

        let report = report.borrow();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].message_full, "Integer overflow in `/` operation");
        assert_eq!(report.errors[0].span.literal, "smallest / -1");
        assert_eq!(String::from_utf8(output).unwrap(), "0\n");
    }
}
