use cild_isa::{Condition, OpKind, classify};
use cild_ir::cfg::{BasicBlock, BlockId, Cfg, LoopKind, resolve_switch_targets, resolve_target};
use cild_ir::instruction::{Instruction, LabelMap};

/// Annotate the CFG with loop, switch, and try/finally structure.
///
/// All recognizers are best-effort pattern matches over canonical,
/// compiler-shaped control flow; shapes that do not match cleanly are left
/// unannotated and render flat.
pub fn analyze(cfg: &mut Cfg, instructions: &[Instruction], labels: &LabelMap) {
    detect_loops(cfg, instructions, labels);
    classify_loops(cfg, instructions);
    detect_switches(cfg, instructions, labels);
    detect_try_regions(cfg, instructions);
}

/// Mark back edges: a block whose terminating branch targets an index at or
/// before its own start is a loop end, and the target block its header.
/// This is a local test with no dominance computation, so only single-entry
/// loops are recognized.
fn detect_loops(cfg: &mut Cfg, instructions: &[Instruction], labels: &LabelMap) {
    for bi in 0..cfg.blocks.len() {
        let Some(last) = cfg.last_insn(instructions, bi) else {
            continue;
        };
        let is_branch = matches!(classify(&last.mnemonic), OpKind::Br | OpKind::CondBr(_));
        if !is_branch {
            continue;
        }
        let Some(target) = resolve_target(last, labels) else {
            continue;
        };
        if target > cfg.blocks[bi].first {
            continue;
        }
        let Some(header) = cfg.block_at_index(target) else {
            continue;
        };
        cfg.blocks[header].is_loop_header = true;
        cfg.blocks[bi].is_loop_end = true;
        cfg.blocks[bi].loop_header = Some(header);
    }
}

/// Decide how each detected loop should render.
///
/// Init shape: a constant load immediately followed by a store somewhere in
/// the header's program-order predecessor. Condition: a relational branch
/// terminating the header. `for` needs init and condition; condition alone
/// is `while`; a bottom-tested conditional with a plain header is
/// `do/while`; anything else renders flat.
fn classify_loops(cfg: &mut Cfg, instructions: &[Instruction]) {
    for bi in 0..cfg.blocks.len() {
        let Some(header) = cfg.blocks[bi].loop_header else {
            continue;
        };
        if cfg.blocks[header].loop_kind.is_some() {
            continue;
        }

        let has_init = header > 0 && has_init_shape(&cfg.blocks[header - 1], instructions);
        let has_cond = cfg
            .last_insn(instructions, header)
            .is_some_and(|i| is_relational_branch(&i.mnemonic));
        let end_conditional = cfg
            .last_insn(instructions, bi)
            .is_some_and(|i| matches!(classify(&i.mnemonic), OpKind::CondBr(_)));

        let kind = if has_cond && has_init {
            LoopKind::For
        } else if has_cond {
            LoopKind::While
        } else if end_conditional && header != bi {
            LoopKind::DoWhile
        } else {
            LoopKind::Unknown
        };
        cfg.blocks[header].loop_kind = Some(kind);
    }
}

/// Adjacent (constant load, store) pair anywhere in the block.
fn has_init_shape(block: &BasicBlock, instructions: &[Instruction]) -> bool {
    let insns = &instructions[block.first..block.last];
    insns.windows(2).any(|w| {
        let load = matches!(
            classify(&w[0].mnemonic),
            OpKind::LdcI4(_) | OpKind::LdcI8 | OpKind::LdcR4 | OpKind::LdcR8 | OpKind::LdStr
        );
        let store = matches!(classify(&w[1].mnemonic), OpKind::StLoc(_) | OpKind::StArg);
        load && store
    })
}

fn is_relational_branch(mnemonic: &str) -> bool {
    matches!(
        classify(mnemonic),
        OpKind::CondBr(Condition::Cmp { op, .. }) if op.is_relational()
    )
}

/// Flag switch blocks and capture their resolved targets in operand order;
/// the vector index is the case number and the trailing successor is the
/// default arm.
fn detect_switches(cfg: &mut Cfg, instructions: &[Instruction], labels: &LabelMap) {
    for bi in 0..cfg.blocks.len() {
        let Some(last) = cfg.last_insn(instructions, bi) else {
            continue;
        };
        if classify(&last.mnemonic) != OpKind::Switch {
            continue;
        }
        let targets = resolve_switch_targets(last, labels);
        cfg.blocks[bi].is_switch = true;
        cfg.blocks[bi].switch_targets = targets;
    }
}

/// Pair try regions with their finally blocks.
///
/// A `leave` flags its block as a try block and opens a region; an
/// `endfinally` flags its block as a finally block and closes the most
/// recently opened region still pending. The explicit stack keeps
/// sequential and nested regions paired correctly; a try with no matching
/// `endfinally` keeps `finally_block = None` and its leave renders as a
/// plain goto.
fn detect_try_regions(cfg: &mut Cfg, instructions: &[Instruction]) {
    let mut open: Vec<BlockId> = Vec::new();
    for bi in 0..cfg.blocks.len() {
        let Some(last) = cfg.last_insn(instructions, bi) else {
            continue;
        };
        match classify(&last.mnemonic) {
            OpKind::Leave => {
                cfg.blocks[bi].is_try_block = true;
                open.push(bi);
            }
            OpKind::EndFinally => {
                cfg.blocks[bi].is_finally_block = true;
                if let Some(try_block) = open.pop() {
                    cfg.blocks[try_block].finally_block = Some(bi);
                }
            }
            _ => {}
        }
    }
}
