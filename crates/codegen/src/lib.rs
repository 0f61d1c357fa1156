pub mod backends;

use anyhow::Result;
use ember_middle::ir::lir::LIR;

use backends::x86_64::X86_64Codegen;


/// Lowers `lir` in place and returns the assembly listing for it
pub fn compile_to_asm(lir: &mut LIR) -> Result<String> {
    X86_64Codegen::new().generate(lir)
}
