use std::fmt::Write;

use anyhow::Result;

use crate::ir::lir::{BasicBlock, BasicBlockIdx, Function, LIR};


/// Text dump of the LIR, before or after lowering
pub struct LIRWriter<W> {
    _phantom: std::marker::PhantomData<W>,
}

impl<W> LIRWriter<W> where W: Write {
    pub fn write_txt(writer: &mut W, lir: &LIR) -> Result<()> {
        for function in lir.functions.iter() {
            Self::write_function(writer, lir, function)?;
        }

        if !lir.strings.is_empty() {
            writeln!(writer, "strings:")?;
            for (idx, value) in lir.strings.indexed_iter() {
                writeln!(writer, "    str{} = {:?}", idx.index, value)?;
            }
        }

        Ok(())
    }

    fn write_function(writer: &mut W, lir: &LIR, function: &Function) -> Result<()> {
        writeln!(
            writer,
            "fx {}(params: {}, declared: {}, slots: {}){}:",
            function.name,
            function.parameter_count,
            function.declared_count,
            function.variable_count,
            if function.is_leaf { " leaf" } else { "" },
        )?;

        for (bb_idx, bb) in lir.blocks_of(function) {
            Self::write_basic_block(writer, bb_idx, bb)?;
        }

        Ok(())
    }

    fn write_basic_block(writer: &mut W, bb_idx: BasicBlockIdx, bb: &BasicBlock) -> Result<()> {
        let indent = "    ";

        write!(writer, "bb{}", bb_idx.index)?;
        if let Some(position) = bb.position {
            write!(writer, " @{}", position)?;
        }
        writeln!(writer, "{}:", if bb.is_jump_target { " (target)" } else { "" })?;

        for instruction in bb.instructions.iter() {
            writeln!(writer, "{}{}", indent, instruction)?;
        }

        Ok(())
    }
}
