pub mod analysis;
pub mod ir;
