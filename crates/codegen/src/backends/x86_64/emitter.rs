use std::fmt::Write;

use anyhow::Result;
use iced_x86::{Formatter, IntelFormatter, NumberBase, Register};

use ember_middle::ir::lir::{Function, FunctionIdx, Instruction, Opcode, Operand, LIR};


/// Renders fully lowered LIR as GNU assembler input in Intel syntax
pub struct AsmEmitter {
    formatter: IntelFormatter,
}

impl AsmEmitter {
    pub fn new() -> Self {
        let mut formatter = IntelFormatter::new();
        formatter.options_mut().set_number_base(NumberBase::Decimal);
        Self { formatter }
    }

    pub fn emit(&mut self, lir: &LIR) -> Result<String> {
        let mut output = String::new();
        writeln!(output, "    .intel_syntax noprefix")?;
        writeln!(output, "    .text")?;

        for (fx_idx, function) in lir.functions.indexed_iter() {
            self.emit_function(&mut output, lir, fx_idx, function)?;
        }

        if !lir.strings.is_empty() {
            writeln!(output, "    .section .rodata")?;
            for (idx, value) in lir.strings.indexed_iter() {
                writeln!(output, ".L.str.{}:", idx.index)?;
                writeln!(output, "    .asciz \"{}\"", escape(value))?;
            }
        }
        writeln!(output, "    .section .note.GNU-stack,\"\",@progbits")?;

        Ok(output)
    }

    fn emit_function(&mut self, output: &mut String, lir: &LIR, fx_idx: FunctionIdx, function: &Function) -> Result<()> {
        writeln!(output)?;
        writeln!(output, "    .globl {}", function.name)?;
        writeln!(output, "    .type {}, @function", function.name)?;
        writeln!(output, "{}:", function.name)?;
        writeln!(output, "    .cfi_startproc")?;

        for (bb_idx, bb) in lir.blocks_of(function) {
            let Some(position) = bb.position else {
                anyhow::bail!("bb{} of `{}` was never placed", bb_idx.index, function.name);
            };
            if bb.is_jump_target {
                writeln!(output, "{}:", block_label(fx_idx, position))?;
            }

            for instruction in bb.instructions.iter() {
                let line = self.render_instruction(lir, fx_idx, function, instruction)?;
                writeln!(output, "    {}", line)?;
            }
        }

        writeln!(output, "    .cfi_endproc")?;
        writeln!(output, "    .size {}, .-{}", function.name, function.name)?;

        Ok(())
    }

    fn render_instruction(&mut self, lir: &LIR, fx_idx: FunctionIdx, function: &Function, instruction: &Instruction) -> Result<String> {
        let opcode = instruction.opcode();
        if matches!(opcode, Opcode::Declare | Opcode::Irem) {
            anyhow::bail!("`{}` in `{}` has no machine form", instruction, function.name);
        }

        let mnemonic = opcode.mnemonic();
        let rendered = match instruction {
            Instruction::Nullary(_) => mnemonic,
            Instruction::Unary(_, operand) => {
                format!("{} {}", mnemonic, self.render_operand(lir, fx_idx, function, operand)?)
            }
            Instruction::Binary(_, first, second) => format!(
                "{} {}, {}",
                mnemonic,
                self.render_operand(lir, fx_idx, function, first)?,
                self.render_operand(lir, fx_idx, function, second)?,
            ),
        };

        Ok(rendered)
    }

    fn render_operand(&mut self, lir: &LIR, fx_idx: FunctionIdx, function: &Function, operand: &Operand) -> Result<String> {
        let rendered = match operand {
            Operand::Register(register) => self.register_name(*register),
            Operand::Memory { base, offset } => {
                let base = self.register_name(*base);
                match offset {
                    0 => format!("qword ptr [{}]", base),
                    offset if *offset < 0 => format!("qword ptr [{} - {}]", base, offset.unsigned_abs()),
                    offset => format!("qword ptr [{} + {}]", base, offset),
                }
            }
            Operand::Immediate(value) => value.to_string(),
            Operand::Str(idx) => format!("[rip + .L.str.{}]", idx.index),
            Operand::Block(target) => match lir.basic_blocks[*target].position {
                Some(position) => block_label(fx_idx, position),
                None => anyhow::bail!("jump in `{}` targets removed bb{}", function.name, target.index),
            },
            Operand::Function(callee) if callee.arguments.is_empty() => {
                if callee.is_external {
                    format!("{}@PLT", callee.symbol)
                } else {
                    callee.symbol.clone()
                }
            }
            Operand::Slot(_) | Operand::ReturnSlot | Operand::Flag(_) | Operand::Function(_) => {
                anyhow::bail!("unresolved operand `{}` reached the emitter in `{}`", operand, function.name)
            }
        };

        Ok(rendered)
    }

    fn register_name(&mut self, register: Register) -> String {
        self.formatter.format_register(register).to_string()
    }
}

impl Default for AsmEmitter {
    fn default() -> Self {
        Self::new()
    }
}

fn block_label(fx_idx: FunctionIdx, position: usize) -> String {
    format!(".LBB{}_{}", fx_idx.index, position)
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'"' => escaped.push_str("\\\""),
            b'\\' => escaped.push_str("\\\\"),
            b'\n' => escaped.push_str("\\n"),
            b'\t' => escaped.push_str("\\t"),
            0x20..=0x7e => escaped.push(byte as char),
            other => escaped.push_str(&format!("\\{:03o}", other)),
        }
    }
    escaped
}
