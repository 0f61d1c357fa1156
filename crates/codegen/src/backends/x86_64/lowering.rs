use std::collections::HashMap;

use anyhow::Result;
use iced_x86::Register;
use tracing::{debug, trace};

use ember_middle::analysis::cfg::ControlFlowGraph;
use ember_middle::analysis::liveness::{LiveSet, Liveness};
use ember_middle::ir::lir::{Function, FunctionRef, Instruction, Opcode, Operand, LIR};

use super::allocator::{Allocator, Location};
use super::frame::{self, FrameLayout, StackFrame};
use super::CallingConvention;


/// What happened to caller-saved values around one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub symbol: String,
    pub saved: Vec<(usize, Register)>,
    pub restored: Vec<(usize, Location)>,
    /// Bytes pushed for stack arguments, padding included
    pub stack_bytes: i32,
}

#[derive(Debug, Clone)]
pub struct FunctionReport {
    pub name: String,
    pub frame_size: i32,
    pub adjusts_stack: bool,
    pub callee_saved: Vec<Register>,
    pub calls: Vec<CallRecord>,
}

/// Rewrites the virtual operands of one function into registers and `rbp`-relative memory
pub struct FunctionLowering<'a> {
    function: &'a Function,
    liveness: &'a Liveness,
    layout: FrameLayout,
    allocator: Allocator,
    save_area: HashMap<Register, i32>,
    calls: Vec<CallRecord>,
    output: Vec<Instruction>,
}

fn memory(offset: i32) -> Operand {
    Operand::Memory { base: Register::RBP, offset }
}

fn fits_i32(value: i64) -> bool {
    i32::try_from(value).is_ok()
}

fn scratch() -> Operand {
    Operand::Register(CallingConvention::SCRATCH_REGISTER)
}

impl<'a> FunctionLowering<'a> {
    pub fn new(function: &'a Function, liveness: &'a Liveness) -> Self {
        let mut frame = StackFrame::default();
        let layout = FrameLayout::new(function, &mut frame);

        Self {
            function,
            liveness,
            layout,
            allocator: Allocator::new(frame),
            save_area: HashMap::new(),
            calls: Vec::new(),
            output: Vec::new(),
        }
    }

    /// Lowers every block of the function, returning them in `cfg` order
    pub fn lower(mut self, lir: &LIR, cfg: &ControlFlowGraph) -> Result<(Vec<Vec<Instruction>>, FunctionReport)> {
        let mut blocks = Vec::with_capacity(cfg.len());

        for (position, bb_idx) in cfg.blocks.iter().enumerate() {
            self.enter_block(position);

            let instructions = &lir.basic_blocks[*bb_idx].instructions;
            let mut index = 0;
            while index < instructions.len() {
                index += self.lower_instruction(instructions, position, index)?;
            }
            if lir.basic_blocks[*bb_idx].terminator().is_none() {
                self.spill_live_out(position);
            }

            blocks.push(std::mem::take(&mut self.output));
        }

        let used_callee_saved = self.allocator.used_callee_saved().to_vec();
        let callee_saved: Vec<(Register, i32)> = used_callee_saved.into_iter()
            .map(|register| (register, self.allocator.frame.allocate()))
            .collect();
        let frame_size = self.allocator.frame.aligned_size();
        let adjusts_stack = frame::needs_stack_adjustment(self.function.is_leaf, frame_size);

        if let Some(entry) = blocks.first_mut() {
            let mut prologue = frame::prologue(&self.layout, frame_size, adjusts_stack, &callee_saved);
            prologue.append(entry);
            *entry = prologue;
        }

        let epilogue = frame::epilogue(adjusts_stack, &callee_saved);
        for instructions in blocks.iter_mut() {
            let mut finished = Vec::with_capacity(instructions.len() + epilogue.len());
            for instruction in instructions.drain(..) {
                if instruction.opcode() == Opcode::Ret {
                    finished.extend(epilogue.iter().cloned());
                }
                finished.push(instruction);
            }
            *instructions = finished;
        }

        debug!(function = %self.function.name, frame_size, callee_saved = callee_saved.len(), "synthesised frame");
        let report = FunctionReport {
            name: self.function.name.clone(),
            frame_size,
            adjusts_stack,
            callee_saved: callee_saved.into_iter().map(|(register, _)| register).collect(),
            calls: self.calls,
        };

        Ok((blocks, report))
    }

    /// Values crossing a block boundary always sit in their spill slot
    fn enter_block(&mut self, position: usize) {
        self.allocator.clear_registers();

        let live_in: Vec<usize> = self.liveness.live_in[position].iter()
            .copied()
            .filter(|slot| self.function.is_temporary(*slot))
            .collect();
        for slot in live_in {
            let offset = self.allocator.spill_slot(slot);
            self.allocator.move_to_stack(slot, offset);
        }
    }

    fn spill_live_out(&mut self, position: usize) {
        let liveness = self.liveness;
        for (register, slot) in self.allocator.occupied() {
            if liveness.live_out[position].contains(&slot) {
                self.spill(register);
            }
        }
    }

    /// Returns how many source instructions were consumed
    fn lower_instruction(&mut self, instructions: &[Instruction], position: usize, index: usize) -> Result<usize> {
        let liveness = self.liveness;
        let live_after = liveness.live_after(position, index);
        let instruction = &instructions[index];
        trace!(%instruction, "lowering");

        match instruction {
            Instruction::Unary(Opcode::Declare, _) => {}
            Instruction::Binary(Opcode::Mov, destination, source) => self.lower_move(destination, source, live_after)?,
            Instruction::Binary(opcode @ (Opcode::Add | Opcode::Sub | Opcode::Imul | Opcode::Cmp), destination, source) => {
                self.lower_arithmetic(*opcode, destination, source)?
            }
            Instruction::Binary(opcode @ (Opcode::Idiv | Opcode::Irem), destination, source) => {
                self.lower_division(*opcode, destination, source, live_after)?
            }
            Instruction::Unary(Opcode::Neg, operand) => self.lower_negate(operand)?,
            Instruction::Unary(Opcode::Call, Operand::Function(callee)) => {
                return self.lower_call(callee, instructions, position, index);
            }
            Instruction::Unary(Opcode::Jmp | Opcode::Jcc(_), _) => {
                self.spill_live_out(position);
                self.emit(instruction.clone());
            }
            other => {
                if other.operands().iter().any(|operand| operand.is_virtual()) {
                    anyhow::bail!("cannot lower `{}` in `{}`", other, self.function.name);
                }
                self.emit(other.clone());
            }
        }

        self.allocator.release_dead(live_after);
        Ok(1)
    }

    fn emit(&mut self, instruction: Instruction) {
        self.output.push(instruction);
    }

    /// `mov` with the operand combinations x86-64 cannot encode routed through the scratch register
    fn emit_move(&mut self, destination: Operand, source: Operand) {
        if destination == source {
            return;
        }

        match (&destination, &source) {
            (Operand::Register(_), Operand::Str(_)) => {
                self.emit(Instruction::Binary(Opcode::Lea, destination, source));
            }
            (_, Operand::Str(_)) => {
                self.emit(Instruction::Binary(Opcode::Lea, scratch(), source));
                self.emit(Instruction::Binary(Opcode::Mov, destination, scratch()));
            }
            (Operand::Memory { .. }, Operand::Memory { .. }) => {
                self.emit(Instruction::Binary(Opcode::Mov, scratch(), source));
                self.emit(Instruction::Binary(Opcode::Mov, destination, scratch()));
            }
            (Operand::Memory { .. }, Operand::Immediate(value)) if !fits_i32(*value) => {
                self.emit(Instruction::Binary(Opcode::Mov, scratch(), source));
                self.emit(Instruction::Binary(Opcode::Mov, destination, scratch()));
            }
            _ => self.emit(Instruction::Binary(Opcode::Mov, destination, source)),
        }
    }

    /// Current physical form of a readable operand
    fn read(&self, operand: &Operand) -> Result<Operand> {
        match operand {
            Operand::Slot(slot) if !self.function.is_temporary(*slot) => match self.layout.home(*slot) {
                Some(home) => Ok(home),
                None => anyhow::bail!("%{} has no home in `{}`", slot, self.function.name),
            },
            Operand::Slot(slot) => match self.allocator.location(*slot) {
                Some(location) => Ok(location.operand()),
                None => anyhow::bail!("%{} is read before it holds a value in `{}`", slot, self.function.name),
            },
            Operand::ReturnSlot => Ok(Operand::Register(CallingConvention::RETURN_REGISTER)),
            Operand::Function(_) | Operand::Flag(_) | Operand::Block(_) => {
                anyhow::bail!("`{}` is not a value operand", operand)
            }
            other => Ok(other.clone()),
        }
    }

    fn register_of(&self, operand: &Operand) -> Option<Register> {
        match operand {
            Operand::Slot(slot) => match self.allocator.location(*slot) {
                Some(Location::Register(register)) => Some(register),
                _ => None,
            },
            Operand::ReturnSlot => Some(CallingConvention::RETURN_REGISTER),
            Operand::Register(register) => Some(*register),
            _ => None,
        }
    }

    fn spill(&mut self, register: Register) {
        if let Some(slot) = self.allocator.occupant(register) {
            let offset = self.allocator.spill_slot(slot);
            self.emit(Instruction::Binary(Opcode::Mov, memory(offset), Operand::Register(register)));
            self.allocator.move_to_stack(slot, offset);
            trace!(slot, ?register, offset, "spilled");
        }
    }

    fn take_register(&mut self, exclude: &[Register]) -> Result<Register> {
        if let Some(register) = self.allocator.find_free(exclude) {
            return Ok(register);
        }

        match self.allocator.choose_victim(exclude) {
            Some(victim) => {
                self.spill(victim);
                Ok(victim)
            }
            None => anyhow::bail!("every register is pinned while lowering `{}`", self.function.name),
        }
    }

    fn ensure_in_register(&mut self, slot: usize, exclude: &[Register]) -> Result<Register> {
        match self.allocator.location(slot) {
            Some(Location::Register(register)) => Ok(register),
            Some(Location::Stack(offset)) => {
                let register = self.take_register(exclude)?;
                self.emit(Instruction::Binary(Opcode::Mov, Operand::Register(register), memory(offset)));
                self.allocator.bind(slot, register);
                trace!(slot, ?register, offset, "reloaded");
                Ok(register)
            }
            None => anyhow::bail!("%{} is used before it holds a value in `{}`", slot, self.function.name),
        }
    }

    /// Moves the occupant of `register` out of the way, or forgets it when it is dead
    fn evict(&mut self, register: Register, exclude: &[Register], live: &LiveSet) {
        let Some(slot) = self.allocator.occupant(register) else {
            return;
        };

        if !live.contains(&slot) {
            self.allocator.release(register);
            return;
        }

        let mut pinned = exclude.to_vec();
        pinned.push(register);
        match self.allocator.find_free(&pinned) {
            Some(free) => {
                self.emit(Instruction::Binary(Opcode::Mov, Operand::Register(free), Operand::Register(register)));
                self.allocator.bind(slot, free);
            }
            None => self.spill(register),
        }
    }

    /// Puts operands that cannot appear as an ALU source into a transient register
    fn materialize(&mut self, value: Operand, exclude: &[Register]) -> Result<Operand> {
        match value {
            Operand::Str(_) => {
                let register = self.take_register(exclude)?;
                self.emit(Instruction::Binary(Opcode::Lea, Operand::Register(register), value));
                Ok(Operand::Register(register))
            }
            Operand::Immediate(constant) if !fits_i32(constant) => {
                let register = self.take_register(exclude)?;
                self.emit(Instruction::Binary(Opcode::Mov, Operand::Register(register), value));
                Ok(Operand::Register(register))
            }
            other => Ok(other),
        }
    }

    fn lower_move(&mut self, destination: &Operand, source: &Operand, live_after: &LiveSet) -> Result<()> {
        let value = self.read(source)?;

        match destination {
            Operand::Slot(slot) if self.function.is_temporary(*slot) => match self.allocator.location(*slot) {
                Some(location) => self.emit_move(location.operand(), value),
                None => {
                    let register = match value {
                        Operand::Register(register) if self.can_adopt(register, live_after) => {
                            self.allocator.release(register);
                            register
                        }
                        _ => {
                            let exclude: Vec<Register> = self.register_of(&value).into_iter().collect();
                            self.take_register(&exclude)?
                        }
                    };
                    self.allocator.bind(*slot, register);
                    self.emit_move(Operand::Register(register), value);
                }
            },
            Operand::Slot(_) => {
                let home = self.read(destination)?;
                self.emit_move(home, value);
            }
            Operand::ReturnSlot => {
                let register = CallingConvention::RETURN_REGISTER;
                if value != Operand::Register(register) {
                    let exclude: Vec<Register> = self.register_of(&value).into_iter().collect();
                    self.evict(register, &exclude, live_after);
                }
                self.emit_move(Operand::Register(register), value);
            }
            other if other.is_virtual() => anyhow::bail!("cannot write to `{}`", other),
            other => self.emit_move(other.clone(), value),
        }

        Ok(())
    }

    /// A register whose current value dies here can be taken over without a copy
    fn can_adopt(&self, register: Register, live_after: &LiveSet) -> bool {
        CallingConvention::TEMPORARY_POOL.contains(&register)
            && self.allocator.occupant(register).map_or(true, |slot| !live_after.contains(&slot))
    }

    fn lower_arithmetic(&mut self, opcode: Opcode, destination: &Operand, source: &Operand) -> Result<()> {
        let mut pinned: Vec<Register> = self.register_of(source).into_iter().collect();

        let (left, write_back) = match destination {
            Operand::Slot(slot) if self.function.is_temporary(*slot) => (self.ensure_in_register(*slot, &pinned)?, None),
            other => {
                let value = self.read(other)?;
                self.emit_move(scratch(), value.clone());
                let write_back = (opcode != Opcode::Cmp).then_some(value);
                (CallingConvention::SCRATCH_REGISTER, write_back)
            }
        };
        pinned.push(left);

        let value = self.read(source)?;
        let value = self.materialize(value, &pinned)?;
        self.emit(Instruction::Binary(opcode, Operand::Register(left), value));

        if let Some(home) = write_back {
            self.emit_move(home, Operand::Register(left));
        }

        Ok(())
    }

    fn lower_negate(&mut self, operand: &Operand) -> Result<()> {
        let target = match operand {
            Operand::Slot(slot) if self.function.is_temporary(*slot) => Operand::Register(self.ensure_in_register(*slot, &[])?),
            other => self.read(other)?,
        };
        self.emit(Instruction::Unary(Opcode::Neg, target));

        Ok(())
    }

    /// `idiv` takes its dividend in `rdx:rax`; the quotient lands in `rax`, the remainder in `rdx`
    fn lower_division(&mut self, opcode: Opcode, destination: &Operand, source: &Operand, live_after: &LiveSet) -> Result<()> {
        let rax = Register::RAX;
        let rdx = Register::RDX;

        let mut divisor = self.read(source)?;
        let needs_copy = match &divisor {
            Operand::Register(register) => *register == rax || *register == rdx,
            Operand::Memory { .. } => false,
            _ => true,
        };
        if needs_copy {
            self.emit_move(scratch(), divisor);
            divisor = scratch();
        }

        let dividend = destination.as_slot().filter(|slot| self.function.is_temporary(*slot));
        let mut pinned = vec![rax, rdx];
        if let Operand::Register(register) = divisor {
            pinned.push(register);
        }

        for fixed in [rax, rdx] {
            let occupant = self.allocator.occupant(fixed);
            if occupant.is_some() && occupant != dividend {
                self.evict(fixed, &pinned, live_after);
            }
        }

        match dividend {
            Some(slot) => match self.allocator.location(slot) {
                Some(location) => self.emit_move(Operand::Register(rax), location.operand()),
                None => anyhow::bail!("%{} is divided before it holds a value in `{}`", slot, self.function.name),
            },
            None => {
                let value = self.read(destination)?;
                self.emit_move(Operand::Register(rax), value);
            }
        }

        self.emit(Instruction::Nullary(Opcode::Cqo));
        self.emit(Instruction::Unary(Opcode::Idiv, divisor));

        let result = if opcode == Opcode::Idiv { rax } else { rdx };
        match dividend {
            Some(slot) => {
                if let Some(Location::Register(previous)) = self.allocator.location(slot) {
                    self.allocator.release(previous);
                }
                for fixed in [rax, rdx] {
                    self.allocator.release(fixed);
                }
                self.allocator.bind(slot, result);
            }
            None => {
                let home = self.read(destination)?;
                self.emit_move(home, Operand::Register(result));
            }
        }

        Ok(())
    }

    fn save_slot(&mut self, register: Register) -> i32 {
        if let Some(offset) = self.save_area.get(&register) {
            return *offset;
        }

        let offset = self.allocator.frame.allocate();
        self.save_area.insert(register, offset);
        offset
    }

    fn push_operand(&mut self, operand: Operand) {
        match operand {
            Operand::Immediate(value) if !fits_i32(value) => {
                self.emit(Instruction::Binary(Opcode::Mov, scratch(), operand));
                self.emit(Instruction::Unary(Opcode::Push, scratch()));
            }
            Operand::Str(_) => {
                self.emit(Instruction::Binary(Opcode::Lea, scratch(), operand));
                self.emit(Instruction::Unary(Opcode::Push, scratch()));
            }
            other => self.emit(Instruction::Unary(Opcode::Push, other)),
        }
    }

    fn lower_call(&mut self, callee: &FunctionRef, instructions: &[Instruction], position: usize, index: usize) -> Result<usize> {
        let liveness = self.liveness;
        let live_after = liveness.live_after(position, index);
        let word = CallingConvention::WORD;

        let mut saved = Vec::new();
        for (register, slot) in self.allocator.occupied_caller_saved() {
            if live_after.contains(&slot) {
                let offset = self.save_slot(register);
                self.emit(Instruction::Binary(Opcode::Mov, memory(offset), Operand::Register(register)));
                saved.push((slot, register, offset));
            }
        }

        let arguments = callee.arguments.iter()
            .map(|argument| self.read(argument))
            .collect::<Result<Vec<_>>>()?;
        let register_count = arguments.len().min(CallingConvention::ARGUMENT_REGISTERS.len());
        let (in_registers, on_stack) = arguments.split_at(register_count);

        let padding = on_stack.len() % 2 == 1;
        if padding {
            self.emit(Instruction::Binary(Opcode::Sub, Operand::Register(Register::RSP), Operand::Immediate(word as i64)));
        }
        for argument in on_stack.iter().rev() {
            self.push_operand(argument.clone());
        }

        let clobbers_source = in_registers.iter().enumerate().any(|(position, argument)| {
            matches!(argument, Operand::Register(register)
                if CallingConvention::ARGUMENT_REGISTERS.contains(register)
                    && *register != CallingConvention::ARGUMENT_REGISTERS[position])
        });
        if clobbers_source {
            for argument in in_registers {
                self.push_operand(argument.clone());
            }
            for position in (0..register_count).rev() {
                self.emit(Instruction::Unary(Opcode::Pop, Operand::Register(CallingConvention::ARGUMENT_REGISTERS[position])));
            }
        } else {
            for (position, argument) in in_registers.iter().enumerate() {
                self.emit_move(Operand::Register(CallingConvention::ARGUMENT_REGISTERS[position]), argument.clone());
            }
        }

        self.emit(Instruction::Unary(Opcode::Call, Operand::Function(FunctionRef {
            arguments: Vec::new(),
            ..callee.clone()
        })));

        let stack_bytes = (on_stack.len() + usize::from(padding)) as i32 * word;
        if stack_bytes > 0 {
            self.emit(Instruction::Binary(Opcode::Add, Operand::Register(Register::RSP), Operand::Immediate(stack_bytes as i64)));
        }

        for (register, _) in self.allocator.occupied_caller_saved() {
            self.allocator.release(register);
        }

        let mut last = index;
        if callee.return_type.has_value() {
            let next = (index + 1..instructions.len())
                .find(|candidate| !matches!(instructions[*candidate], Instruction::Unary(Opcode::Declare, _)));
            if let Some(candidate) = next {
                if let Instruction::Binary(Opcode::Mov, Operand::Slot(slot), Operand::ReturnSlot) = &instructions[candidate] {
                    if self.function.is_temporary(*slot) {
                        self.allocator.bind(*slot, CallingConvention::RETURN_REGISTER);
                        last = candidate;
                    }
                }
            }
        }

        let mut restored = Vec::with_capacity(saved.len());
        for (slot, _, offset) in saved.iter().copied() {
            match self.allocator.find_free(&[CallingConvention::RETURN_REGISTER]) {
                Some(register) => {
                    self.emit(Instruction::Binary(Opcode::Mov, Operand::Register(register), memory(offset)));
                    self.allocator.bind(slot, register);
                    restored.push((slot, Location::Register(register)));
                }
                None => {
                    let spill = self.allocator.spill_slot(slot);
                    self.emit_move(memory(spill), memory(offset));
                    self.allocator.move_to_stack(slot, spill);
                    restored.push((slot, Location::Stack(spill)));
                }
            }
        }

        trace!(symbol = %callee.symbol, saved = saved.len(), stack_bytes, "lowered call");
        self.calls.push(CallRecord {
            symbol: callee.symbol.clone(),
            saved: saved.into_iter().map(|(slot, register, _)| (slot, register)).collect(),
            restored,
            stack_bytes,
        });

        self.allocator.release_dead(liveness.live_after(position, last));
        Ok(last - index + 1)
    }
}
