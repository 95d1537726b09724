//! Phase E: liveness analysis, linear scan register allocation, and the
//! VaporM operand rewrite. State is per-function and discarded once the
//! function is emitted.

pub mod liveness;
pub mod lsra;
pub mod rewrite;
