use std::rc::Rc;

use ember_codegen::backends::x86_64::lowering::FunctionReport;
use ember_codegen::backends::x86_64::X86_64Codegen;
use ember_front::compilation_unit::CompilationUnit;
use ember_middle::ir::lir::{Function, Instruction, LIR};


pub fn compile(input: &str) -> CompilationUnit {
    match CompilationUnit::compile(input) {
        Ok(unit) => unit,
        Err(report) => {
            let messages: Vec<String> = report.borrow().errors.iter().map(|error| error.message_full.clone()).collect();
            panic!("failed to compile {:?}: {:?}", input, messages)
        }
    }
}

pub fn build_lir(input: &str) -> LIR {
    let mut unit = compile(input);
    let builder = ember_middle::ir::lir::builder::LIRBuilder::new(&unit.global_scope, Rc::clone(&unit.diagnostics_report));

    match builder.build(&mut unit.ast) {
        Ok(lir) => lir,
        Err(error) => {
            let messages: Vec<String> = unit.diagnostics_report.borrow().errors.iter().map(|error| error.message_full.clone()).collect();
            panic!("failed to build LIR for {:?}: {} {:?}", input, error, messages)
        }
    }
}

/// Every instruction of `function`, blocks in program order
pub fn instructions_of(lir: &LIR, function: &Function) -> Vec<Instruction> {
    lir.blocks_of(function)
        .flat_map(|(_, bb)| bb.instructions.iter().cloned())
        .collect()
}

/// A program after register allocation, before it is rendered
pub struct Lowered {
    pub lir: LIR,
    pub reports: Vec<FunctionReport>,
}

impl Lowered {
    pub fn instructions(&self, name: &str) -> Vec<Instruction> {
        let function = self.lir.function_by_name(name).unwrap_or_else(|| panic!("no function `{}`", name));
        instructions_of(&self.lir, function)
    }

    pub fn report(&self, name: &str) -> &FunctionReport {
        self.reports.iter()
            .find(|report| report.name == name)
            .unwrap_or_else(|| panic!("no report for `{}`", name))
    }
}

pub fn lower(input: &str) -> Lowered {
    let mut lir = build_lir(input);
    let mut codegen = X86_64Codegen::new();
    codegen.lower(&mut lir).unwrap_or_else(|error| panic!("failed to lower {:?}: {}", input, error));

    Lowered { lir, reports: codegen.reports().to_vec() }
}

pub fn emit(input: &str) -> String {
    let mut lir = build_lir(input);
    ember_codegen::compile_to_asm(&mut lir).unwrap_or_else(|error| panic!("failed to emit {:?}: {}", input, error))
}
