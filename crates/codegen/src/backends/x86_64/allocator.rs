use std::collections::HashMap;

use iced_x86::Register;

use ember_middle::analysis::liveness::LiveSet;
use ember_middle::ir::lir::Operand;

use super::CallingConvention;
use super::frame::StackFrame;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Register(Register),
    /// `rbp`-relative offset
    Stack(i32),
}

impl Location {
    pub fn operand(&self) -> Operand {
        match self {
            Location::Register(register) => Operand::Register(*register),
            Location::Stack(offset) => Operand::Memory { base: Register::RBP, offset: *offset },
        }
    }
}

/// Register and spill-slot bookkeeping for the temporaries of one function
#[derive(Debug)]
pub struct Allocator {
    pub frame: StackFrame,
    locations: HashMap<usize, Location>,
    occupants: HashMap<Register, usize>,
    spill_slots: HashMap<usize, i32>,
    used_callee_saved: Vec<Register>,
}

impl Allocator {
    pub fn new(frame: StackFrame) -> Self {
        Self {
            frame,
            locations: HashMap::new(),
            occupants: HashMap::new(),
            spill_slots: HashMap::new(),
            used_callee_saved: Vec::new(),
        }
    }

    pub fn location(&self, slot: usize) -> Option<Location> {
        self.locations.get(&slot).copied()
    }

    pub fn occupant(&self, register: Register) -> Option<usize> {
        self.occupants.get(&register).copied()
    }

    pub fn bind(&mut self, slot: usize, register: Register) {
        if let Some(Location::Register(previous)) = self.location(slot) {
            self.occupants.remove(&previous);
        }
        self.occupants.insert(register, slot);
        self.locations.insert(slot, Location::Register(register));

        if CallingConvention::is_callee_saved(register) && !self.used_callee_saved.contains(&register) {
            self.used_callee_saved.push(register);
        }
    }

    /// Records that `slot` now lives in its spill slot, freeing its register
    pub fn move_to_stack(&mut self, slot: usize, offset: i32) {
        if let Some(Location::Register(register)) = self.location(slot) {
            self.occupants.remove(&register);
        }
        self.locations.insert(slot, Location::Stack(offset));
    }

    /// Forgets whatever `register` holds; the occupant loses its location
    pub fn release(&mut self, register: Register) -> Option<usize> {
        let slot = self.occupants.remove(&register)?;
        if self.location(slot) == Some(Location::Register(register)) {
            self.locations.remove(&slot);
        }

        Some(slot)
    }

    pub fn release_dead(&mut self, live: &LiveSet) {
        let dead: Vec<Register> = self.occupants.iter()
            .filter(|(_, slot)| !live.contains(slot))
            .map(|(register, _)| *register)
            .collect();

        for register in dead {
            self.release(register);
        }
    }

    pub fn is_free(&self, register: Register) -> bool {
        !self.occupants.contains_key(&register)
    }

    pub fn find_free(&self, exclude: &[Register]) -> Option<Register> {
        CallingConvention::TEMPORARY_POOL.iter()
            .copied()
            .find(|register| self.is_free(*register) && !exclude.contains(register))
    }

    /// First occupied register, in pool order, that the caller is willing to give up
    pub fn choose_victim(&self, exclude: &[Register]) -> Option<Register> {
        CallingConvention::TEMPORARY_POOL.iter()
            .copied()
            .find(|register| !self.is_free(*register) && !exclude.contains(register))
    }

    /// The spill slot of `slot`, assigned on first use and reused afterwards
    pub fn spill_slot(&mut self, slot: usize) -> i32 {
        if let Some(offset) = self.spill_slots.get(&slot) {
            return *offset;
        }

        let offset = self.frame.allocate();
        self.spill_slots.insert(slot, offset);
        offset
    }

    /// Occupied caller-saved registers in pool order
    pub fn occupied_caller_saved(&self) -> Vec<(Register, usize)> {
        CallingConvention::TEMPORARY_POOL.iter()
            .copied()
            .filter(|register| CallingConvention::is_caller_saved(*register))
            .filter_map(|register| self.occupant(register).map(|slot| (register, slot)))
            .collect()
    }

    pub fn occupied(&self) -> Vec<(Register, usize)> {
        CallingConvention::TEMPORARY_POOL.iter()
            .copied()
            .filter_map(|register| self.occupant(register).map(|slot| (register, slot)))
            .collect()
    }

    pub fn clear_registers(&mut self) {
        for register in self.occupied().into_iter().map(|(register, _)| register) {
            self.release(register);
        }
    }

    pub fn used_callee_saved(&self) -> &[Register] {
        &self.used_callee_saved
    }
}
