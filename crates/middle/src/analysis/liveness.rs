use std::collections::{BTreeSet, VecDeque};

use anyhow::Result;
use tracing::{debug, trace};

use crate::analysis::cfg::ControlFlowGraph;
use crate::ir::lir::{Function, Instruction, Opcode, Operand, LIR};


pub type LiveSet = BTreeSet<usize>;

/// Backward dataflow result for one function
///
/// Block-level vectors are indexed by position in the function's block list,
/// the same numbering the `ControlFlowGraph` uses.
#[derive(Debug, Clone)]
pub struct Liveness {
    /// Slots live right after each instruction of each block
    pub live_after: Vec<Vec<LiveSet>>,
    pub live_in: Vec<LiveSet>,
    pub live_out: Vec<LiveSet>,
    pub iterations: usize,
    /// Live-in of a block each time it was processed, in processing order
    pub history: Vec<(usize, LiveSet)>,
}

impl Liveness {
    pub fn compute(lir: &LIR, function: &Function, cfg: &ControlFlowGraph) -> Result<Self> {
        let block_count = cfg.len();
        let max_iterations = block_count * (function.variable_count + 1);

        let mut live_after: Vec<Vec<LiveSet>> = cfg.blocks.iter()
            .map(|bb_idx| vec![LiveSet::new(); lir.basic_blocks[*bb_idx].instructions.len()])
            .collect();
        let mut live_in = vec![LiveSet::new(); block_count];
        let mut live_out = vec![LiveSet::new(); block_count];
        let mut history = Vec::new();

        let mut worklist: VecDeque<usize> = (0..block_count).rev().collect();
        let mut queued = vec![true; block_count];
        let mut iterations = 0;

        while let Some(position) = worklist.pop_front() {
            queued[position] = false;
            iterations += 1;
            if iterations > max_iterations {
                anyhow::bail!(
                    "liveness of `{}` did not converge within {} iterations",
                    function.name, max_iterations
                );
            }

            let bb = &lir.basic_blocks[cfg.blocks[position]];
            let mut live = live_out[position].clone();

            for (index, instruction) in bb.instructions.iter().enumerate().rev() {
                live_after[position][index] = live.clone();
                Self::transfer(instruction, &mut live);
            }

            if !live_in[position].is_subset(&live) {
                anyhow::bail!("live-in of bb{} in `{}` shrank", cfg.blocks[position].index, function.name);
            }
            trace!(block = position, live_in = ?live, "processed block");
            history.push((position, live.clone()));

            for predecessor in cfg.predecessors[position].iter().copied() {
                if !live.is_subset(&live_out[predecessor]) {
                    live_out[predecessor].extend(live.iter().copied());
                    if !queued[predecessor] {
                        queued[predecessor] = true;
                        worklist.push_back(predecessor);
                    }
                }
            }
            live_in[position] = live;
        }

        debug!(function = %function.name, iterations, blocks = block_count, "liveness converged");
        Ok(Self { live_after, live_in, live_out, iterations, history })
    }

    /// A declaration kills its slot; any other reference keeps the slot alive above it
    fn transfer(instruction: &Instruction, live: &mut LiveSet) {
        match instruction {
            Instruction::Unary(Opcode::Declare, Operand::Slot(slot)) => {
                live.remove(slot);
            }
            _ => live.extend(instruction.slots()),
        }
    }

    pub fn live_after(&self, position: usize, index: usize) -> &LiveSet {
        &self.live_after[position][index]
    }
}
