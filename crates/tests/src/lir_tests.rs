#[cfg(test)]
mod tests {
    use iced_x86::Register;

    use ember_middle::analysis::cfg::ControlFlowGraph;
    use ember_middle::ir::lir::builder::{PRINT_BOOL_SYMBOL, PRINT_INT_SYMBOL, PRINT_STR_SYMBOL};
    use ember_middle::ir::lir::writer::LIRWriter;
    use ember_middle::ir::lir::{Instruction, Opcode, Operand, LIR};

    use crate::common::{build_lir, instructions_of, lower};


    fn main_instructions(lir: &LIR) -> Vec<Instruction> {
        instructions_of(lir, lir.function_by_name("main").unwrap())
    }

    fn called_symbols(instructions: &[Instruction]) -> Vec<String> {
        instructions.iter()
            .filter_map(|instruction| match instruction {
                Instruction::Unary(Opcode::Call, Operand::Function(callee)) => Some(callee.symbol.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(instructions: &[Instruction], opcode: Opcode) -> usize {
        instructions.iter().filter(|instruction| instruction.opcode() == opcode).count()
    }

    #[test]
    fn single_let_declares_once() {
        let lir = build_lir("let i = 1;");

        let instructions = main_instructions(&lir);
        assert_eq!(count(&instructions, Opcode::Declare), 1);
        assert_eq!(instructions[0], Instruction::Unary(Opcode::Declare, Operand::Slot(0)));
        assert_eq!(instructions[1], Instruction::Binary(Opcode::Mov, Operand::Slot(0), Operand::Immediate(1)));
        assert!(instructions.contains(&Instruction::Binary(Opcode::Mov, Operand::ReturnSlot, Operand::Immediate(0))));
        assert_eq!(instructions.last(), Some(&Instruction::Nullary(Opcode::Ret)));
    }

    #[test]
    fn single_let_needs_no_stack_adjustment() {
        let lowered = lower("let i = 1;");

        let instructions = lowered.instructions("main");
        let adjusts = instructions.iter().any(|instruction| matches!(
            instruction,
            Instruction::Binary(Opcode::Sub, Operand::Register(Register::RSP), _)
        ));
        assert!(!adjusts);
        assert!(!lowered.report("main").adjusts_stack);
    }

    #[test]
    fn sum_of_two_locals_uses_one_add_into_a_register() {
        let lowered = lower("let i = 1; let j = 2; let k = i + j;");

        let instructions = lowered.instructions("main");
        let adds: Vec<&Instruction> = instructions.iter()
            .filter(|instruction| instruction.opcode() == Opcode::Add)
            .collect();
        assert_eq!(adds.len(), 1);

        let i_home = Operand::Memory { base: Register::RBP, offset: -8 };
        let j_home = Operand::Memory { base: Register::RBP, offset: -16 };
        match adds[0] {
            Instruction::Binary(Opcode::Add, destination @ Operand::Register(_), source) => {
                assert_ne!(destination, &i_home);
                assert_ne!(destination, &j_home);
                assert_eq!(source, &j_home);
            }
            other => panic!("expected an add into a register, found {}", other),
        }
    }

    #[test]
    fn binary_on_a_temporary_reuses_it() {
        let lir = build_lir("let a = 1 + 2 + 3");

        let instructions = main_instructions(&lir);
        // one temporary for the whole chain, plus `a`
        assert_eq!(count(&instructions, Opcode::Declare), 2);
        assert_eq!(count(&instructions, Opcode::Add), 2);
    }

    #[test]
    fn calls_are_emitted_strictly_left_to_right() {
        let lir = build_lir("
        fx f(x: int) -> int { return x }
        print(f(1) + f(2))
        ");

        let instructions = main_instructions(&lir);
        assert_eq!(called_symbols(&instructions), vec!["f", "f", PRINT_INT_SYMBOL]);

        let first = instructions.iter().find_map(|instruction| match instruction {
            Instruction::Unary(Opcode::Call, Operand::Function(callee)) => Some(callee.arguments.clone()),
            _ => None,
        });
        assert_eq!(first, Some(vec![Operand::Immediate(1)]));
    }

    #[test]
    fn call_results_are_copied_out_of_the_return_slot() {
        let lir = build_lir("
        fx seven() -> int { return 7 }
        let s = seven()
        ");

        let instructions = main_instructions(&lir);
        let call_at = instructions.iter().position(|instruction| instruction.opcode() == Opcode::Call).unwrap();
        assert_eq!(instructions[call_at + 1].opcode(), Opcode::Declare);
        assert!(matches!(
            &instructions[call_at + 2],
            Instruction::Binary(Opcode::Mov, Operand::Slot(_), Operand::ReturnSlot)
        ));
    }

    #[test]
    fn print_picks_the_runtime_routine_by_type() {
        let lir = build_lir(r#"
        print(1)
        print(false)
        print("one")
        print("one")
        "#);

        let instructions = main_instructions(&lir);
        assert_eq!(called_symbols(&instructions), vec![PRINT_INT_SYMBOL, PRINT_BOOL_SYMBOL, PRINT_STR_SYMBOL, PRINT_STR_SYMBOL]);
        assert_eq!(lir.strings.len(), 1);
    }

    #[test]
    fn only_functions_without_calls_are_leaves() {
        let lir = build_lir("
        fx leaf(a: int) -> int { return a * 2 }
        fx caller() -> int { return leaf(4) }
        print(caller())
        ");

        assert!(lir.function_by_name("leaf").unwrap().is_leaf);
        assert!(!lir.function_by_name("caller").unwrap().is_leaf);
        assert!(!lir.function_by_name("main").unwrap().is_leaf);
    }

    #[test]
    fn nothing_is_generated_after_return() {
        let lir = build_lir("
        fx f() -> int {
            return 1
            let dead = 2
        }
        print(f())
        ");

        let function = lir.function_by_name("f").unwrap();
        let instructions = instructions_of(&lir, function);
        assert_eq!(count(&instructions, Opcode::Declare), 0);
        assert_eq!(instructions, vec![
            Instruction::Binary(Opcode::Mov, Operand::ReturnSlot, Operand::Immediate(1)),
            Instruction::Unary(Opcode::Jmp, Operand::Block(function.basic_blocks[1])),
            Instruction::Nullary(Opcode::Ret),
        ]);
    }

    #[test]
    fn left_operand_is_copied_before_the_right_side_runs() {
        let lir = build_lir("let r = 5\nprint(r + (r = 10))");

        let instructions = main_instructions(&lir);
        let temporary = lir.function_by_name("main").unwrap().declared_count;
        let copy = instructions.iter()
            .position(|instruction| instruction == &Instruction::Binary(Opcode::Mov, Operand::Slot(temporary), Operand::Slot(0)))
            .unwrap();
        let assign = instructions.iter()
            .position(|instruction| instruction == &Instruction::Binary(Opcode::Mov, Operand::Slot(0), Operand::Immediate(10)))
            .unwrap();
        assert!(copy < assign);
        assert!(instructions.contains(&Instruction::Binary(Opcode::Add, Operand::Slot(temporary), Operand::Slot(0))));
    }

    #[test]
    fn arguments_are_copied_when_a_later_argument_assigns() {
        let lir = build_lir("
        fx two(x: int, y: int) -> int {
            return x * 10 + y
        }
        let r = 5
        print(two(r, r = 3))
        print(two(r, 4))
        ");

        let instructions = main_instructions(&lir);
        let temporary = lir.function_by_name("main").unwrap().declared_count;
        let arguments: Vec<Vec<Operand>> = instructions.iter()
            .filter_map(|instruction| match instruction {
                Instruction::Unary(Opcode::Call, Operand::Function(callee)) if callee.symbol == "two" => Some(callee.arguments.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(arguments, vec![
            vec![Operand::Slot(temporary), Operand::Slot(0)],
            vec![Operand::Slot(0), Operand::Immediate(4)],
        ]);
    }

    #[test]
    fn typed_function_without_return_yields_a_default() {
        let lir = build_lir(r#"
        fx f(x: int) -> int {
            let y = x
        }
        fx h() -> string {
            let unused = 1
        }
        print(f(3))
        print(h())
        "#);

        let function = lir.function_by_name("f").unwrap();
        let instructions = instructions_of(&lir, function);
        assert_eq!(&instructions[instructions.len() - 3..], &[
            Instruction::Binary(Opcode::Mov, Operand::ReturnSlot, Operand::Immediate(0)),
            Instruction::Unary(Opcode::Jmp, Operand::Block(function.basic_blocks[1])),
            Instruction::Nullary(Opcode::Ret),
        ]);

        let function = lir.function_by_name("h").unwrap();
        let instructions = instructions_of(&lir, function);
        let empty = lir.strings.indexed_iter()
            .find(|(_, text)| text.is_empty())
            .map(|(idx, _)| idx)
            .unwrap();
        assert!(instructions.contains(&Instruction::Binary(Opcode::Mov, Operand::ReturnSlot, Operand::Str(empty))));
    }

    #[test]
    fn every_function_falls_into_its_exit_block() {
        let lir = build_lir("
        fx noop() {}
        noop()
        ");

        for function in lir.functions.iter() {
            let cfg = ControlFlowGraph::build(&lir, function).unwrap();
            assert_eq!(cfg.len(), 2);
            assert_eq!(cfg.successors[0], vec![1]);
            assert_eq!(cfg.predecessors[1], vec![0]);
            assert!(cfg.successors[1].is_empty());
        }
    }

    #[test]
    fn writer_lists_functions_and_strings() {
        let lir = build_lir(r#"
        fx greet() { print("hello") }
        greet()
        "#);
        let mut text = String::new();

        LIRWriter::write_txt(&mut text, &lir).unwrap();

        assert!(text.contains("fx main("));
        assert!(text.contains("fx greet(params: 0"));
        assert!(text.contains("call ember_print_str(str0)"));
        assert!(text.contains("str0 = \"hello\""));
    }
}
