pub mod ast;
pub mod compilation_unit;
