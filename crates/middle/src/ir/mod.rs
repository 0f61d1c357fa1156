pub mod lir;
