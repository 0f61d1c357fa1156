use std::collections::HashMap;

use anyhow::Result;

use crate::ir::lir::{BasicBlockIdx, Function, Instruction, Opcode, LIR};


/// Control-flow graph over the blocks of a single function
///
/// Nodes are positions in the function's block list; edges follow each
/// block's terminator, falling through to the next block when there is none.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    pub blocks: Vec<BasicBlockIdx>,
    pub successors: Vec<Vec<usize>>,
    pub predecessors: Vec<Vec<usize>>,
}

impl ControlFlowGraph {
    pub fn build(lir: &LIR, function: &Function) -> Result<Self> {
        let blocks = function.basic_blocks.clone();
        let positions: HashMap<BasicBlockIdx, usize> = blocks.iter()
            .enumerate()
            .map(|(position, bb_idx)| (*bb_idx, position))
            .collect();

        let mut successors = vec![Vec::new(); blocks.len()];
        for (position, bb_idx) in blocks.iter().enumerate() {
            let fall_through = (position + 1 < blocks.len()).then_some(position + 1);
            let bb = &lir.basic_blocks[*bb_idx];

            let target = |instruction: &Instruction| -> Result<usize> {
                match instruction.jump_target() {
                    Some(target) => match positions.get(&target) {
                        Some(position) => Ok(*position),
                        None => anyhow::bail!("bb{} jumps to bb{} outside of `{}`", bb_idx.index, target.index, function.name),
                    },
                    None => anyhow::bail!("malformed jump `{}` in bb{}", instruction, bb_idx.index),
                }
            };

            successors[position] = match bb.terminator() {
                Some(instruction) => match instruction.opcode() {
                    Opcode::Jmp => vec![target(instruction)?],
                    Opcode::Jcc(_) => {
                        let taken = target(instruction)?;
                        let mut edges = vec![taken];
                        edges.extend(fall_through.filter(|next| *next != taken));
                        edges
                    }
                    _ => Vec::new(),
                },
                None => fall_through.into_iter().collect(),
            };
        }

        let mut predecessors = vec![Vec::new(); blocks.len()];
        for (position, edges) in successors.iter().enumerate() {
            for successor in edges {
                predecessors[*successor].push(position);
            }
        }

        Ok(Self { blocks, successors, predecessors })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn position_of(&self, bb_idx: BasicBlockIdx) -> Option<usize> {
        self.blocks.iter().position(|candidate| *candidate == bb_idx)
    }
}
