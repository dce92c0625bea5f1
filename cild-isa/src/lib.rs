//! Mnemonic-level knowledge about the CIL stack machine.
//!
//! This crate owns the fixed tables the decompiler dispatches on: the
//! [`OpKind`] classification of every recognized mnemonic, the control-flow
//! [`InsnFlags`] the CFG builder queries, and the operator/conversion
//! spellings used when instructions are turned back into expressions.
//! Anything not covered here classifies as [`OpKind::Unhandled`], which is
//! the single fallback arm for the whole pipeline.

pub mod flags;
pub mod kind;

pub use flags::{InsnFlags, flags};
pub use kind::{BinaryOp, CmpOp, Condition, OpKind, classify};
