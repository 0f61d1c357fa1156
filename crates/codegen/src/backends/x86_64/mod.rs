use anyhow::Result;
use iced_x86::Register;
use tracing::debug;

use ember_middle::analysis::cfg::ControlFlowGraph;
use ember_middle::analysis::liveness::Liveness;
use ember_middle::ir::lir::{self, BasicBlockIdx, FunctionIdx, Instruction, Opcode, Operand, LIR};

use self::emitter::AsmEmitter;
use self::lowering::{FunctionLowering, FunctionReport};

pub mod allocator;
pub mod emitter;
pub mod frame;
pub mod lowering;


/// System V AMD64 integer calling convention
pub struct CallingConvention;

impl CallingConvention {
    pub const WORD: i32 = 8;
    pub const STACK_ALIGNMENT: i32 = 16;
    pub const RED_ZONE: i32 = 128;

    pub const ARGUMENT_REGISTERS: [Register; 6] = [
        Register::RDI, Register::RSI, Register::RDX,
        Register::RCX, Register::R8, Register::R9,
    ];

    pub const RETURN_REGISTER: Register = Register::RAX;

    /// Never handed out to values; legalisation goes through it
    pub const SCRATCH_REGISTER: Register = Register::R11;

    /// Allocation order for temporaries
    pub const TEMPORARY_POOL: [Register; 13] = [
        Register::RAX, Register::RDI, Register::RSI, Register::RDX,
        Register::RCX, Register::R8, Register::R9, Register::R10,
        Register::RBX, Register::R12, Register::R13, Register::R14,
        Register::R15,
    ];

    /// Get register for integer/pointer argument by index (0-5)
    pub fn get_int_arg_register(arg_index: usize) -> Option<Register> {
        Self::ARGUMENT_REGISTERS.get(arg_index).copied()
    }

    /// `rbp`-relative home of a stack-passed argument
    pub fn stack_argument_offset(arg_index: usize) -> i32 {
        let stack_index = (arg_index - Self::ARGUMENT_REGISTERS.len()) as i32;
        2 * Self::WORD + stack_index * Self::WORD
    }

    pub fn is_caller_saved(register: Register) -> bool {
        matches!(
            register,
            Register::RAX | Register::RCX | Register::RDX | Register::RSI | Register::RDI
                | Register::R8 | Register::R9 | Register::R10 | Register::R11
        )
    }

    pub fn is_callee_saved(register: Register) -> bool {
        matches!(
            register,
            Register::RBX | Register::R12 | Register::R13 | Register::R14 | Register::R15
        )
    }
}

/// Lowers every function of a LIR program in place, then renders it
#[derive(Debug, Default)]
pub struct X86_64Codegen {
    reports: Vec<FunctionReport>,
}

impl X86_64Codegen {
    pub fn new() -> Self {
        Self { reports: Vec::new() }
    }

    pub fn generate(&mut self, lir: &mut LIR) -> Result<String> {
        self.lower(lir)?;
        AsmEmitter::new().emit(lir)
    }

    pub fn lower(&mut self, lir: &mut LIR) -> Result<()> {
        let function_indices: Vec<FunctionIdx> = lir.functions.indices().collect();
        for fx_idx in function_indices {
            self.lower_function(lir, fx_idx)?;
        }

        Ok(())
    }

    /// Frame and call-site facts recorded while lowering, one per function
    pub fn reports(&self) -> &[FunctionReport] {
        &self.reports
    }

    fn lower_function(&mut self, lir: &mut LIR, fx_idx: FunctionIdx) -> Result<()> {
        let function = lir.functions[fx_idx].clone();
        let cfg = ControlFlowGraph::build(lir, &function)?;
        let liveness = Liveness::compute(lir, &function, &cfg)?;

        let (blocks, report) = FunctionLowering::new(&function, &liveness).lower(lir, &cfg)?;
        for (bb_idx, instructions) in cfg.blocks.iter().zip(blocks) {
            lir.basic_blocks[*bb_idx].instructions = instructions;
        }

        finalize_blocks(lir, fx_idx)?;
        verify_physical(lir, &lir.functions[fx_idx])?;

        debug!(
            function = %function.name,
            frame_size = report.frame_size,
            adjusts_stack = report.adjusts_stack,
            blocks = lir.functions[fx_idx].basic_blocks.len(),
            "lowered function"
        );
        self.reports.push(report);

        Ok(())
    }
}

/// Drops self-moves, unconditional jumps to the next block and empty blocks
/// until nothing changes, then numbers the surviving blocks
pub fn finalize_blocks(lir: &mut LIR, fx_idx: FunctionIdx) -> Result<()> {
    for bb_idx in lir.functions[fx_idx].basic_blocks.clone() {
        lir.basic_blocks[bb_idx].instructions.retain(|instruction| !instruction.is_dead_move());
    }

    loop {
        let mut changed = false;
        let blocks = lir.functions[fx_idx].basic_blocks.clone();

        for pair in blocks.windows(2) {
            let instructions = &mut lir.basic_blocks[pair[0]].instructions;
            let jumps_to_next = matches!(
                instructions.last(),
                Some(Instruction::Unary(Opcode::Jmp, Operand::Block(target))) if *target == pair[1]
            );
            if jumps_to_next {
                instructions.pop();
                changed = true;
            }
        }

        let empty = blocks.iter().position(|bb_idx| lir.basic_blocks[*bb_idx].instructions.is_empty());
        if let Some(position) = empty {
            let removed = blocks[position];
            let replacement = blocks[position + 1..].iter()
                .copied()
                .find(|bb_idx| !lir.basic_blocks[*bb_idx].instructions.is_empty());

            if replacement.is_none() && is_referenced(lir, &blocks, removed) {
                anyhow::bail!("bb{} is empty but still targeted at the end of `{}`", removed.index, lir.functions[fx_idx].name);
            }
            if let Some(replacement) = replacement {
                retarget(lir, &blocks, removed, replacement);
            }
            lir.functions[fx_idx].basic_blocks.remove(position);
            changed = true;
        }

        if !changed {
            break;
        }
    }

    let blocks = lir.functions[fx_idx].basic_blocks.clone();
    for (position, bb_idx) in blocks.iter().enumerate() {
        let bb = &mut lir.basic_blocks[*bb_idx];
        bb.position = Some(position);
        bb.is_jump_target = false;
    }
    for bb_idx in blocks.iter() {
        let targets: Vec<BasicBlockIdx> = lir.basic_blocks[*bb_idx].instructions.iter()
            .filter_map(Instruction::jump_target)
            .collect();
        for target in targets {
            lir.basic_blocks[target].is_jump_target = true;
        }
    }

    Ok(())
}

fn is_referenced(lir: &LIR, blocks: &[BasicBlockIdx], target: BasicBlockIdx) -> bool {
    blocks.iter().any(|bb_idx| {
        lir.basic_blocks[*bb_idx].instructions.iter().any(|instruction| instruction.jump_target() == Some(target))
    })
}

fn retarget(lir: &mut LIR, blocks: &[BasicBlockIdx], from: BasicBlockIdx, to: BasicBlockIdx) {
    for bb_idx in blocks {
        for instruction in lir.basic_blocks[*bb_idx].instructions.iter_mut() {
            if let Instruction::Unary(Opcode::Jmp | Opcode::Jcc(_), Operand::Block(target)) = instruction {
                if *target == from {
                    *target = to;
                }
            }
        }
    }
}

fn verify_physical(lir: &LIR, function: &lir::Function) -> Result<()> {
    for (bb_idx, bb) in lir.blocks_of(function) {
        for instruction in bb.instructions.iter() {
            if instruction.opcode() == Opcode::Declare || instruction.operands().iter().any(|operand| operand.is_virtual()) {
                anyhow::bail!("`{}` in bb{} of `{}` was left unresolved", instruction, bb_idx.index, function.name);
            }
        }
    }

    Ok(())
}
