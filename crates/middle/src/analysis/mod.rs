/*
 * analyses over the LIR of a single function
 *  the CFG is rebuilt whenever the block list changes, liveness is recomputed from it
 */

pub mod cfg;
pub mod liveness;
