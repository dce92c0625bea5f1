//! Intermediate representation for the cild decompiler: the instruction
//! record parsed from a listing, the label map used for branch resolution,
//! the control flow graph, and the tagged statement model the emitter
//! produces.

pub mod cfg;
pub mod instruction;
pub mod stmt;
