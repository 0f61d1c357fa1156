#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use ember_codegen::backends::x86_64::emitter::AsmEmitter;
    use ember_codegen::backends::x86_64::X86_64Codegen;
    use ember_middle::ir::lir::builder::LIRBuilder;

    use crate::common::{build_lir, compile, emit};


    const PROGRAM: &str = r#"
    fx sum8(a: int, b: int, c: int, d: int, e: int, f: int, g: int, h: int) -> int {
        return g + h
    }
    let total = sum8(1, 2, 3, 4, 5, 6, 7, 8)
    print(total)
    print(total > 0)
    print("hi")
    print(to_string(total))
    "#;

    const NATIVE_PROGRAM: &str = r#"
    fx sum8(a: int, b: int, c: int, d: int, e: int, f: int, g: int, h: int) -> int {
        return g + h
    }
    let total = sum8(1, 2, 3, 4, 5, 6, 7, 8)
    print(total)
    print(true)
    print("hi")
    print(to_string(total))
    let started = tick()
    "#;

    #[test]
    fn emitted_listing_declares_every_function() {
        let asm = emit(NATIVE_PROGRAM);

        assert!(asm.starts_with("    .intel_syntax noprefix\n"));
        assert!(asm.contains("    .globl main\n"));
        assert!(asm.contains("    .globl sum8\n"));
        assert!(asm.contains("sum8:\n    .cfi_startproc\n    push rbp\n    mov rbp, rsp\n"));
        assert!(asm.contains("    .size main, .-main\n"));
        assert!(asm.trim_end().ends_with(".section .note.GNU-stack,\"\",@progbits"));
    }

    #[test]
    fn runtime_routines_are_called_through_the_plt() {
        let asm = emit(NATIVE_PROGRAM);

        assert!(asm.contains("    call ember_print_int@PLT\n"));
        assert!(asm.contains("    call ember_print_bool@PLT\n"));
        assert!(asm.contains("    call ember_print_str@PLT\n"));
        assert!(asm.contains("    call ember_int_to_string@PLT\n"));
        assert!(asm.contains("    call ember_tick@PLT\n"));
        assert!(asm.contains("    call sum8\n"));
    }

    #[test]
    fn strings_are_read_only_data_addressed_relative_to_rip() {
        let asm = emit(NATIVE_PROGRAM);

        assert!(asm.contains("    .section .rodata\n.L.str.0:\n    .asciz \"hi\"\n"));
        assert!(asm.contains("    lea rdi, [rip + .L.str.0]\n"));
    }

    #[test]
    fn stack_arguments_render_above_the_frame_pointer() {
        let asm = emit(NATIVE_PROGRAM);

        assert!(asm.contains("qword ptr [rbp + 16]"));
        assert!(asm.contains("qword ptr [rbp + 24]"));
        assert!(asm.contains("    push 8\n    push 7\n"));
        assert!(asm.contains("    add rsp, 16\n"));
    }

    #[test]
    fn straight_line_functions_need_no_labels() {
        let asm = emit(NATIVE_PROGRAM);

        assert!(!asm.contains(".LBB"));
        assert!(!asm.contains("jmp"));
    }

    #[test]
    fn emitting_twice_gives_the_same_text() {
        let mut lir = build_lir(NATIVE_PROGRAM);
        X86_64Codegen::new().lower(&mut lir).unwrap();

        let first = AsmEmitter::new().emit(&lir).unwrap();
        let second = AsmEmitter::new().emit(&lir).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, emit(NATIVE_PROGRAM));
    }

    #[test]
    fn programs_the_backend_rejects_produce_no_listing() {
        let mut unit = compile(PROGRAM);
        let builder = LIRBuilder::new(&unit.global_scope, Rc::clone(&unit.diagnostics_report));

        assert!(builder.build(&mut unit.ast).is_err());
        assert_eq!(unit.diagnostics_report.borrow().errors.len(), 1);
    }
}
