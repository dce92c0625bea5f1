use cild_isa::*;

// --- encoded payloads ---

#[test]
fn short_constant_forms_carry_their_value() {
    assert_eq!(classify("ldc.i4.0"), OpKind::LdcI4(Some(0)));
    assert_eq!(classify("ldc.i4.8"), OpKind::LdcI4(Some(8)));
    assert_eq!(classify("ldc.i4.m1"), OpKind::LdcI4(Some(-1)));
    assert_eq!(classify("ldc.i4.s"), OpKind::LdcI4(None));
    assert_eq!(classify("ldc.i4"), OpKind::LdcI4(None));
}

#[test]
fn short_slot_forms_carry_their_index() {
    assert_eq!(classify("ldloc.2"), OpKind::LdLoc(Some(2)));
    assert_eq!(classify("stloc.0"), OpKind::StLoc(Some(0)));
    assert_eq!(classify("ldarg.3"), OpKind::LdArg(Some(3)));
    assert_eq!(classify("ldloc.s"), OpKind::LdLoc(None));
    assert_eq!(classify("ldarg.s"), OpKind::LdArg(None));
}

// --- branch families ---

#[test]
fn branch_short_forms_match_long_forms() {
    assert_eq!(classify("br.s"), classify("br"));
    assert_eq!(classify("blt.s"), classify("blt"));
    assert_eq!(classify("blt.un.s"), classify("blt.un"));
    assert_eq!(classify("leave.s"), classify("leave"));
    assert_eq!(classify("brtrue.s"), classify("brtrue"));
}

#[test]
fn comparison_branches() {
    assert_eq!(
        classify("blt"),
        OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Lt,
            unsigned: false
        })
    );
    assert_eq!(
        classify("bne.un"),
        OpKind::CondBr(Condition::Cmp {
            op: CmpOp::Ne,
            unsigned: true
        })
    );
    assert_eq!(classify("brfalse"), OpKind::CondBr(Condition::False));
}

#[test]
fn cmp_op_negation_is_involutive() {
    for op in [
        CmpOp::Eq,
        CmpOp::Ne,
        CmpOp::Lt,
        CmpOp::Le,
        CmpOp::Gt,
        CmpOp::Ge,
    ] {
        assert_eq!(op.negated().negated(), op);
    }
    assert_eq!(CmpOp::Lt.negated(), CmpOp::Ge);
    assert!(CmpOp::Lt.is_relational());
    assert!(!CmpOp::Eq.is_relational());
}

// --- conversions ---

#[test]
fn conversion_targets() {
    assert_eq!(classify("conv.i4"), OpKind::Conv("int"));
    assert_eq!(classify("conv.r8"), OpKind::Conv("double"));
    assert_eq!(classify("conv.ovf.i4"), OpKind::Conv("int"));
    assert_eq!(classify("conv.ovf.u1.un"), OpKind::Conv("byte"));
    assert_eq!(classify("conv.r.un"), OpKind::Conv("float"));
}

// --- flags ---

#[test]
fn flag_assignments() {
    assert_eq!(flags("br"), InsnFlags::JUMP | InsnFlags::TERMINATOR);
    assert_eq!(flags("leave.s"), InsnFlags::JUMP | InsnFlags::TERMINATOR);
    assert_eq!(flags("blt"), InsnFlags::JUMP | InsnFlags::CONDITIONAL);
    assert_eq!(flags("switch"), InsnFlags::SWITCH);
    assert_eq!(flags("ret"), InsnFlags::TERMINATOR);
    assert_eq!(flags("endfinally"), InsnFlags::TERMINATOR);
    assert_eq!(flags("add"), InsnFlags::empty());
    assert_eq!(flags("not-a-real-opcode"), InsnFlags::empty());
}

// --- calls ---

#[test]
fn call_forms() {
    assert_eq!(classify("call"), OpKind::Call);
    assert_eq!(classify("callvirt"), OpKind::CallVirt);
    // `tail.` is a standalone prefix instruction, not part of the call
    // mnemonic, so it falls through to the degradation path.
    assert_eq!(classify("tail."), OpKind::Unhandled);
}

// --- fallback ---

#[test]
fn unknown_mnemonics_are_unhandled() {
    assert_eq!(classify("foo"), OpKind::Unhandled);
    assert_eq!(classify("ldc.i4.banana"), OpKind::Unhandled);
    assert_eq!(classify("conv.q9"), OpKind::Unhandled);
}
