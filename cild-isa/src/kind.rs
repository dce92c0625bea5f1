/// Binary arithmetic/bitwise/shift operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

/// Comparison operators, shared by the `c*` compare opcodes and the
/// two-operand conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    /// The comparison that holds exactly when `self` does not.
    pub fn negated(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Lt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Le => CmpOp::Gt,
        }
    }

    /// True for the relational (ordering) comparisons, as opposed to
    /// equality tests. Loop classification only accepts these.
    pub fn is_relational(self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge)
    }
}

/// The condition tested by a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// `brtrue` family: branch when the single popped value is truthy.
    True,
    /// `brfalse` family: branch when the single popped value is falsy.
    False,
    /// Two-operand comparison branch (`beq`, `blt.un`, ...).
    Cmp { op: CmpOp, unsigned: bool },
}

/// Tagged classification of a mnemonic. `Option<…>` payloads are `Some`
/// when the value is encoded in the mnemonic itself (`ldc.i4.3`,
/// `ldloc.0`) and `None` when it comes from the instruction operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpKind {
    Nop,
    Dup,
    Pop,
    LdcI4(Option<i64>),
    LdcI8,
    LdcR4,
    LdcR8,
    LdStr,
    LdNull,
    LdLoc(Option<usize>),
    LdLocA,
    StLoc(Option<usize>),
    LdArg(Option<usize>),
    LdArgA,
    StArg,
    LdFld,
    LdsFld,
    StFld,
    StsFld,
    LdElem,
    StElem,
    LdLen,
    NewArr,
    Binary(BinaryOp),
    Neg,
    Not,
    Compare { op: CmpOp, unsigned: bool },
    /// Conversion opcode with the source-level cast it spells.
    Conv(&'static str),
    Call,
    CallVirt,
    NewObj,
    Box,
    Unbox,
    CastClass,
    IsInst,
    /// Unconditional branch.
    Br,
    CondBr(Condition),
    Switch,
    Leave,
    EndFinally,
    Ret,
    Throw,
    Rethrow,
    /// Everything the tables above do not cover.
    Unhandled,
}

/// Strip a short-form suffix (`blt.s` -> `blt`) if present.
fn strip_short(mnemonic: &str) -> &str {
    mnemonic.strip_suffix(".s").unwrap_or(mnemonic)
}

fn conv_target(suffix: &str) -> Option<&'static str> {
    // Overflow-checked conversions cast to the same source type.
    let s = suffix.strip_prefix("ovf.").unwrap_or(suffix);
    if s == "r.un" {
        return Some("float");
    }
    let s = s.strip_suffix(".un").unwrap_or(s);
    Some(match s {
        "i1" => "sbyte",
        "u1" => "byte",
        "i2" => "short",
        "u2" => "ushort",
        "i4" => "int",
        "u4" => "uint",
        "i8" => "long",
        "u8" => "ulong",
        "r4" => "float",
        "r8" => "double",
        "i" => "nint",
        "u" => "nuint",
        _ => return None,
    })
}

/// Classify a normalized (lowercase) mnemonic.
pub fn classify(mnemonic: &str) -> OpKind {
    // Mnemonics with an index baked into the name.
    if let Some(rest) = mnemonic.strip_prefix("ldc.i4.") {
        if rest == "m1" {
            return OpKind::LdcI4(Some(-1));
        }
        if rest == "s" {
            return OpKind::LdcI4(None);
        }
        if let Ok(n) = rest.parse::<i64>() {
            return OpKind::LdcI4(Some(n));
        }
        return OpKind::Unhandled;
    }
    if let Some(rest) = mnemonic.strip_prefix("ldloc.") {
        if rest == "s" {
            return OpKind::LdLoc(None);
        }
        if let Ok(n) = rest.parse::<usize>() {
            return OpKind::LdLoc(Some(n));
        }
    }
    if let Some(rest) = mnemonic.strip_prefix("stloc.") {
        if rest == "s" {
            return OpKind::StLoc(None);
        }
        if let Ok(n) = rest.parse::<usize>() {
            return OpKind::StLoc(Some(n));
        }
    }
    if let Some(rest) = mnemonic.strip_prefix("ldarg.") {
        if rest == "s" {
            return OpKind::LdArg(None);
        }
        if let Ok(n) = rest.parse::<usize>() {
            return OpKind::LdArg(Some(n));
        }
    }
    if let Some(suffix) = mnemonic.strip_prefix("conv.") {
        return match conv_target(suffix) {
            Some(ty) => OpKind::Conv(ty),
            None => OpKind::Unhandled,
        };
    }
    if mnemonic.starts_with("ldelem") {
        return OpKind::LdElem;
    }
    if mnemonic.starts_with("stelem") {
        return OpKind::StElem;
    }

    match strip_short(mnemonic) {
        "nop" => OpKind::Nop,
        "dup" => OpKind::Dup,
        "pop" => OpKind::Pop,
        "ldc.i4" => OpKind::LdcI4(None),
        "ldc.i8" => OpKind::LdcI8,
        "ldc.r4" => OpKind::LdcR4,
        "ldc.r8" => OpKind::LdcR8,
        "ldstr" => OpKind::LdStr,
        "ldnull" => OpKind::LdNull,
        "ldloc" => OpKind::LdLoc(None),
        "ldloca" => OpKind::LdLocA,
        "stloc" => OpKind::StLoc(None),
        "ldarg" => OpKind::LdArg(None),
        "ldarga" => OpKind::LdArgA,
        "starg" => OpKind::StArg,
        "ldfld" | "ldflda" => OpKind::LdFld,
        "ldsfld" | "ldsflda" => OpKind::LdsFld,
        "stfld" => OpKind::StFld,
        "stsfld" => OpKind::StsFld,
        "ldlen" => OpKind::LdLen,
        "newarr" => OpKind::NewArr,
        "add" | "add.ovf" | "add.ovf.un" => OpKind::Binary(BinaryOp::Add),
        "sub" | "sub.ovf" | "sub.ovf.un" => OpKind::Binary(BinaryOp::Sub),
        "mul" | "mul.ovf" | "mul.ovf.un" => OpKind::Binary(BinaryOp::Mul),
        "div" | "div.un" => OpKind::Binary(BinaryOp::Div),
        "rem" | "rem.un" => OpKind::Binary(BinaryOp::Rem),
        "and" => OpKind::Binary(BinaryOp::And),
        "or" => OpKind::Binary(BinaryOp::Or),
        "xor" => OpKind::Binary(BinaryOp::Xor),
        "shl" => OpKind::Binary(BinaryOp::Shl),
        "shr" | "shr.un" => OpKind::Binary(BinaryOp::Shr),
        "neg" => OpKind::Neg,
        "not" => OpKind::Not,
        "ceq" => OpKind::Compare {
            op: CmpOp::Eq,
            unsigned: false,
        },
        "clt" => OpKind::Compare {
            op: CmpOp::Lt,
            unsigned: false,
        },
        "clt.un" => OpKind::Compare {
            op: CmpOp::Lt,
            unsigned: true,
        },
        "cgt" => OpKind::Compare {
            op: CmpOp::Gt,
            unsigned: false,
        },
        "cgt.un" => OpKind::Compare {
            op: CmpOp::Gt,
            unsigned: true,
        },
        "call" => OpKind::Call,
        "callvirt" => OpKind::CallVirt,
        "newobj" => OpKind::NewObj,
        "box" => OpKind::Box,
        "unbox" | "unbox.any" => OpKind::Unbox,
        "castclass" => OpKind::CastClass,
        "isinst" => OpKind::IsInst,
        "br" => OpKind::Br,
        "brtrue" | "brinst" => OpKind::CondBr(Condition::True),
        "brfalse" | "brnull" | "brzero" => OpKind::CondBr(Condition::False),
        "beq" => OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Eq,
            unsigned: false,
        }),
        "bne.un" => OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Ne,
            unsigned: true,
        }),
        "blt" => OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Lt,
            unsigned: false,
        }),
        "blt.un" => OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Lt,
            unsigned: true,
        }),
        "ble" => OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Le,
            unsigned: false,
        }),
        "ble.un" => OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Le,
            unsigned: true,
        }),
        "bgt" => OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Gt,
            unsigned: false,
        }),
        "bgt.un" => OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Gt,
            unsigned: true,
        }),
        "bge" => OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Ge,
            unsigned: false,
        }),
        "bge.un" => OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Ge,
            unsigned: true,
        }),
        "switch" => OpKind::Switch,
        "leave" => OpKind::Leave,
        "endfinally" | "endfault" => OpKind::EndFinally,
        "ret" => OpKind::Ret,
        "throw" => OpKind::Throw,
        "rethrow" => OpKind::Rethrow,
        _ => OpKind::Unhandled,
    }
}
