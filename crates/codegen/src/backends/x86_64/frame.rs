use iced_x86::Register;

use ember_middle::ir::lir::{Function, Instruction, Opcode, Operand};

use super::CallingConvention;


/// Bytes reserved below `rbp`, handed out one machine word at a time
#[derive(Debug, Default, Clone)]
pub struct StackFrame {
    size: i32,
}

impl StackFrame {
    /// Returns the `rbp`-relative offset of a fresh word
    pub fn allocate(&mut self) -> i32 {
        self.size += CallingConvention::WORD;
        -self.size
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn aligned_size(&self) -> i32 {
        let alignment = CallingConvention::STACK_ALIGNMENT;
        (self.size + alignment - 1) / alignment * alignment
    }
}

/// Fixed homes of parameters and locals, computed from counts alone
#[derive(Debug, Clone)]
pub struct FrameLayout {
    homes: Vec<i32>,
    parameter_count: usize,
}

impl FrameLayout {
    pub fn new(function: &Function, frame: &mut StackFrame) -> Self {
        let homes = (0..function.declared_count).map(|slot| {
            if slot < function.parameter_count && CallingConvention::get_int_arg_register(slot).is_none() {
                CallingConvention::stack_argument_offset(slot)
            } else {
                frame.allocate()
            }
        }).collect();

        Self { homes, parameter_count: function.parameter_count }
    }

    pub fn home(&self, slot: usize) -> Option<Operand> {
        self.homes.get(slot).map(|offset| Operand::Memory { base: Register::RBP, offset: *offset })
    }

    /// Register parameters paired with the stack slot mirroring them
    pub fn register_parameters(&self) -> Vec<(Register, i32)> {
        (0..self.parameter_count)
            .filter_map(|slot| CallingConvention::get_int_arg_register(slot).map(|register| (register, self.homes[slot])))
            .collect()
    }
}

pub fn needs_stack_adjustment(is_leaf: bool, frame_size: i32) -> bool {
    frame_size > 0 && !(is_leaf && frame_size <= CallingConvention::RED_ZONE)
}

fn memory(offset: i32) -> Operand {
    Operand::Memory { base: Register::RBP, offset }
}

pub fn prologue(layout: &FrameLayout, frame_size: i32, adjusts_stack: bool, callee_saved: &[(Register, i32)]) -> Vec<Instruction> {
    let mut instructions = vec![
        Instruction::Unary(Opcode::Push, Operand::Register(Register::RBP)),
        Instruction::Binary(Opcode::Mov, Operand::Register(Register::RBP), Operand::Register(Register::RSP)),
    ];

    if adjusts_stack {
        instructions.push(Instruction::Binary(Opcode::Sub, Operand::Register(Register::RSP), Operand::Immediate(frame_size as i64)));
    }

    for (register, offset) in callee_saved {
        instructions.push(Instruction::Binary(Opcode::Mov, memory(*offset), Operand::Register(*register)));
    }

    for (register, offset) in layout.register_parameters() {
        instructions.push(Instruction::Binary(Opcode::Mov, memory(offset), Operand::Register(register)));
    }

    instructions
}

pub fn epilogue(adjusts_stack: bool, callee_saved: &[(Register, i32)]) -> Vec<Instruction> {
    let mut instructions: Vec<Instruction> = callee_saved.iter().rev()
        .map(|(register, offset)| Instruction::Binary(Opcode::Mov, Operand::Register(*register), memory(*offset)))
        .collect();

    if adjusts_stack {
        instructions.push(Instruction::Binary(Opcode::Mov, Operand::Register(Register::RSP), Operand::Register(Register::RBP)));
    }
    instructions.push(Instruction::Unary(Opcode::Pop, Operand::Register(Register::RBP)));

    instructions
}
