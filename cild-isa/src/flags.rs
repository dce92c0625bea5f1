use bitflags::bitflags;

use crate::kind::{OpKind, classify};

bitflags! {
    /// Control-flow properties of a mnemonic, queried by the CFG builder.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InsnFlags: u8 {
        /// Transfers control to a labelled target.
        const JUMP = 1 << 0;
        /// Jump that may also fall through.
        const CONDITIONAL = 1 << 1;
        /// Ends a basic block with no fallthrough.
        const TERMINATOR = 1 << 2;
        /// Multi-way jump with a label list operand.
        const SWITCH = 1 << 3;
    }
}

/// Look up the control-flow flags for a normalized mnemonic.
pub fn flags(mnemonic: &str) -> InsnFlags {
    match classify(mnemonic) {
        OpKind::Br | OpKind::Leave => InsnFlags::JUMP | InsnFlags::TERMINATOR,
        OpKind::CondBr(_) => InsnFlags::JUMP | InsnFlags::CONDITIONAL,
        OpKind::Switch => InsnFlags::SWITCH,
        OpKind::Ret | OpKind::Throw | OpKind::Rethrow | OpKind::EndFinally => InsnFlags::TERMINATOR,
        _ => InsnFlags::empty(),
    }
}
