#[cfg(test)]
pub mod common;

mod diagnostics_tests;
mod eval_tests;
mod lir_tests;
mod liveness_tests;
mod regalloc_tests;
mod emitter_tests;
