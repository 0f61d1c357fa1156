#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use iced_x86::Register;

    use ember_codegen::backends::x86_64::allocator::Location;
    use ember_middle::ir::lir::{Instruction, Opcode, Operand};

    use crate::common::{lower, Lowered};


    const SUM8: &str = "
    fx sum8(a: int, b: int, c: int, d: int, e: int, f: int, g: int, h: int) -> int {
        return g + h
    }
    print(sum8(1, 2, 3, 4, 5, 6, 7, 8))
    ";

    fn rsp_adjustment(instructions: &[Instruction], opcode: Opcode) -> Option<i64> {
        instructions.iter().find_map(|instruction| match instruction {
            Instruction::Binary(candidate, Operand::Register(Register::RSP), Operand::Immediate(bytes)) if *candidate == opcode => Some(*bytes),
            _ => None,
        })
    }

    fn position_of(instructions: &[Instruction], wanted: &Instruction) -> usize {
        instructions.iter()
            .position(|instruction| instruction == wanted)
            .unwrap_or_else(|| panic!("`{}` was not emitted", wanted))
    }

    fn references(instructions: &[Instruction], operand: &Operand) -> bool {
        instructions.iter().any(|instruction| instruction.operands().contains(&operand))
    }

    fn all_instructions(lowered: &Lowered) -> Vec<Instruction> {
        lowered.lir.functions.iter()
            .flat_map(|function| lowered.instructions(&function.name))
            .collect()
    }

    #[test]
    fn seventh_and_eighth_arguments_are_pushed_in_reverse() {
        let lowered = lower(SUM8);

        let main = lowered.instructions("main");
        let push_eighth = position_of(&main, &Instruction::Unary(Opcode::Push, Operand::Immediate(8)));
        let push_seventh = position_of(&main, &Instruction::Unary(Opcode::Push, Operand::Immediate(7)));
        let call = main.iter()
            .position(|instruction| matches!(instruction, Instruction::Unary(Opcode::Call, Operand::Function(callee)) if callee.symbol == "sum8"))
            .unwrap();

        assert!(push_eighth < push_seventh);
        assert!(push_seventh < call);
        assert_eq!(main[call + 1], Instruction::Binary(Opcode::Add, Operand::Register(Register::RSP), Operand::Immediate(16)));
        assert!(main[..call].contains(&Instruction::Binary(Opcode::Mov, Operand::Register(Register::R9), Operand::Immediate(6))));
        assert_eq!(lowered.report("main").calls[0].stack_bytes, 16);
    }

    #[test]
    fn callee_reads_stack_arguments_above_its_frame() {
        let lowered = lower(SUM8);

        let sum8 = lowered.instructions("sum8");
        assert!(references(&sum8, &Operand::Memory { base: Register::RBP, offset: 16 }));
        assert!(references(&sum8, &Operand::Memory { base: Register::RBP, offset: 24 }));
        // the six register arguments are mirrored into the frame
        assert!(sum8.contains(&Instruction::Binary(Opcode::Mov, Operand::Memory { base: Register::RBP, offset: -48 }, Operand::Register(Register::R9))));
    }

    #[test]
    fn leaf_keeps_its_locals_in_the_red_zone() {
        let lowered = lower("
        fx add(a: int, b: int) -> int { return a + b }
        print(add(1, 2))
        ");

        let report = lowered.report("add");
        assert_eq!(report.frame_size, 16);
        assert!(!report.adjusts_stack);
        assert_eq!(rsp_adjustment(&lowered.instructions("add"), Opcode::Sub), None);
        assert!(!lowered.instructions("add").contains(&Instruction::Binary(Opcode::Mov, Operand::Register(Register::RSP), Operand::Register(Register::RBP))));
    }

    #[test]
    fn non_leaf_reserves_an_aligned_frame() {
        let lowered = lower("
        fx twice(n: int) -> int {
            let d = n * 2
            print(d)
            return d
        }
        print(twice(4))
        ");

        let twice = lowered.instructions("twice");
        let report = lowered.report("twice");
        assert!(report.adjusts_stack);
        assert_eq!(rsp_adjustment(&twice, Opcode::Sub), Some(report.frame_size as i64));
        assert_eq!(report.frame_size % 16, 0);

        let ret = position_of(&twice, &Instruction::Nullary(Opcode::Ret));
        assert_eq!(&twice[ret - 2..ret], &[
            Instruction::Binary(Opcode::Mov, Operand::Register(Register::RSP), Operand::Register(Register::RBP)),
            Instruction::Unary(Opcode::Pop, Operand::Register(Register::RBP)),
        ]);
    }

    #[test]
    fn frames_and_call_sites_stay_sixteen_byte_aligned() {
        let lowered = lower("
        fx nine(a: int, b: int, c: int, d: int, e: int, f: int, g: int, h: int, i: int) -> int {
            return a - i
        }
        fx wrap(x: int) -> int {
            let y = x + 1
            return nine(x, y, 3, 4, 5, 6, 7, 8, 9) + y
        }
        print(wrap(1))
        ");

        for report in lowered.reports.iter() {
            assert_eq!(report.frame_size % 16, 0, "frame of `{}`", report.name);
            for call in report.calls.iter() {
                assert_eq!(call.stack_bytes % 16, 0, "call to `{}` from `{}`", call.symbol, report.name);
            }
        }
        // three stack arguments plus one word of padding
        let wrap = lowered.instructions("wrap");
        assert_eq!(rsp_adjustment(&wrap, Opcode::Add), Some(32));
        assert_eq!(lowered.report("wrap").calls[0].stack_bytes, 32);
    }

    #[test]
    fn values_live_across_a_call_are_saved_and_restored() {
        let lowered = lower("
        fx one() -> int { return 1 }
        let x = (1 + 2) + one()
        print(x)
        ");

        let record = &lowered.report("main").calls[0];
        assert_eq!(record.symbol, "one");
        assert_eq!(record.saved.len(), 1);

        let saved: Vec<usize> = record.saved.iter().map(|(slot, _)| *slot).collect();
        let restored: Vec<usize> = record.restored.iter().map(|(slot, _)| *slot).collect();
        assert_eq!(saved, restored);
        assert_eq!(record.saved[0].1, Register::RAX);
        assert_eq!(record.restored[0].1, Location::Register(Register::RDI));

        let main = lowered.instructions("main");
        assert!(main.contains(&Instruction::Binary(Opcode::Add, Operand::Register(Register::RDI), Operand::Register(Register::RAX))));
    }

    #[test]
    fn pressure_spills_and_claims_callee_saved_registers() {
        let depth = 16;
        let mut expression = format!("({} + {})", depth, depth);
        for level in (1..depth).rev() {
            expression = format!("({} + {}) + ({})", level, level, expression);
        }
        let lowered = lower(&format!("let x = {}\nprint(x)", expression));

        let report = lowered.report("main");
        assert!(report.callee_saved.contains(&Register::RBX));
        assert!(report.callee_saved.contains(&Register::R15));

        let main = lowered.instructions("main");
        assert!(main.contains(&Instruction::Binary(Opcode::Mov, Operand::Memory { base: Register::RBP, offset: -16 }, Operand::Register(Register::RAX))));
        let saves_rbx = main.iter().any(|instruction| matches!(
            instruction,
            Instruction::Binary(Opcode::Mov, Operand::Memory { .. }, Operand::Register(Register::RBX))
        ));
        let restores_rbx = main.iter().any(|instruction| matches!(
            instruction,
            Instruction::Binary(Opcode::Mov, Operand::Register(Register::RBX), Operand::Memory { .. })
        ));
        assert!(saves_rbx && restores_rbx);
    }

    #[test]
    fn declared_variables_get_exclusive_homes() {
        let lowered = lower("
        let a = 1
        let b = 2
        let c = 3
        print(a + b + c)
        ");

        let homes: BTreeSet<i32> = lowered.instructions("main").iter()
            .filter_map(|instruction| match instruction {
                Instruction::Binary(Opcode::Mov, Operand::Memory { offset, .. }, Operand::Immediate(_)) => Some(*offset),
                _ => None,
            })
            .collect();
        assert_eq!(homes, BTreeSet::from([-8, -16, -24]));
    }

    #[test]
    fn lowering_leaves_no_dead_moves_or_virtual_operands() {
        let lowered = lower(r#"
        fx f(a: int, b: int) -> int {
            let c = a
            c = c
            return c / b + c % b
        }
        print(f(17, 5))
        print("done")
        "#);

        for instruction in all_instructions(&lowered) {
            assert!(!instruction.is_dead_move(), "dead move `{}`", instruction);
            assert!(instruction.operands().iter().all(|operand| !operand.is_virtual()), "virtual operand in `{}`", instruction);
            assert_ne!(instruction.opcode(), Opcode::Declare);
            assert_ne!(instruction.opcode(), Opcode::Irem);
        }
    }
}
