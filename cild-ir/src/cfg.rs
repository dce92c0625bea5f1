use std::collections::{BTreeMap, BTreeSet};

use cild_isa::InsnFlags;

use crate::instruction::{Instruction, LabelMap, switch_target_labels};

/// Index of a basic block within the CFG.
pub type BlockId = usize;

/// How a recognized loop should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    For,
    While,
    DoWhile,
    /// Shape not recognized; the region is emitted flat, with the back
    /// edge rendered as a guarded goto.
    Unknown,
}

/// A basic block: a maximal straight-line run of instructions.
///
/// Blocks partition the instruction stream contiguously and disjointly;
/// every instruction index belongs to exactly one block. The structural
/// annotations (loop/switch/try flags) start out cleared and are filled in
/// by the structure analyzer.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Unique block index.
    pub id: BlockId,
    /// Index range into the instruction stream [first..last).
    pub first: usize,
    pub last: usize,
    /// Successor block IDs.
    pub succs: Vec<BlockId>,
    /// Predecessor block IDs.
    pub preds: Vec<BlockId>,
    pub is_loop_header: bool,
    pub is_loop_end: bool,
    /// On a loop-end block, the header its back edge targets.
    pub loop_header: Option<BlockId>,
    /// On a loop header, the classified rendering shape.
    pub loop_kind: Option<LoopKind>,
    pub is_switch: bool,
    /// Resolved instruction indices of the switch targets, in operand
    /// order (vector index == case number).
    pub switch_targets: Vec<usize>,
    pub is_try_block: bool,
    pub is_finally_block: bool,
    /// On a try block, the finally block its `leave` pairs with.
    pub finally_block: Option<BlockId>,
}

/// Control flow graph for a single method.
#[derive(Debug)]
pub struct Cfg {
    /// Basic blocks, indexed by BlockId, in ascending start order.
    pub blocks: Vec<BasicBlock>,
    /// Entry block ID (always 0).
    pub entry: BlockId,
    /// Map from instruction index to the block that starts there.
    index_to_block: BTreeMap<usize, BlockId>,
}

impl Cfg {
    /// Look up which block contains the given instruction index.
    pub fn block_at_index(&self, index: usize) -> Option<BlockId> {
        self.index_to_block
            .range(..=index)
            .next_back()
            .map(|(_, &id)| id)
    }

    /// The last instruction of a block, if the block is non-empty.
    pub fn last_insn<'a>(&self, instructions: &'a [Instruction], id: BlockId) -> Option<&'a Instruction> {
        let block = &self.blocks[id];
        if block.first >= block.last {
            return None;
        }
        instructions.get(block.last - 1)
    }

    /// Build a CFG from an instruction stream and its label map.
    pub fn build(instructions: &[Instruction], labels: &LabelMap) -> Self {
        if instructions.is_empty() {
            return Cfg {
                blocks: vec![],
                entry: 0,
                index_to_block: BTreeMap::new(),
            };
        }

        // Step 1: identify leaders (block start indices).
        let mut leaders = BTreeSet::new();
        leaders.insert(0usize);

        for (i, insn) in instructions.iter().enumerate() {
            let flags = cild_isa::flags(&insn.mnemonic);

            if flags.contains(InsnFlags::JUMP) {
                if let Some(target) = resolve_target(insn, labels) {
                    leaders.insert(target);
                }
                if flags.contains(InsnFlags::CONDITIONAL) && i + 1 < instructions.len() {
                    leaders.insert(i + 1);
                }
            }
            if flags.contains(InsnFlags::SWITCH) {
                for target in resolve_switch_targets(insn, labels) {
                    leaders.insert(target);
                }
                // The instruction after a switch starts the default arm.
                if i + 1 < instructions.len() {
                    leaders.insert(i + 1);
                }
            }
            if flags.contains(InsnFlags::TERMINATOR) && i + 1 < instructions.len() {
                leaders.insert(i + 1);
            }
        }

        // Step 2: split at leaders; each consecutive pair bounds one block,
        // the final block extending to the end of the stream.
        let leader_vec: Vec<usize> = leaders.iter().copied().collect();
        let mut index_to_block = BTreeMap::new();
        let mut blocks = Vec::new();

        for (bi, &first) in leader_vec.iter().enumerate() {
            let last = if bi + 1 < leader_vec.len() {
                leader_vec[bi + 1]
            } else {
                instructions.len()
            };
            index_to_block.insert(first, bi);
            blocks.push(BasicBlock {
                id: bi,
                first,
                last,
                succs: vec![],
                preds: vec![],
                is_loop_header: false,
                is_loop_end: false,
                loop_header: None,
                loop_kind: None,
                is_switch: false,
                switch_targets: vec![],
                is_try_block: false,
                is_finally_block: false,
                finally_block: None,
            });
        }

        // Step 3: edges from each block's last instruction.
        for bi in 0..blocks.len() {
            let block = &blocks[bi];
            if block.first >= block.last {
                continue;
            }
            let last_insn = &instructions[block.last - 1];
            let flags = cild_isa::flags(&last_insn.mnemonic);

            let mut succs = Vec::new();
            if flags.contains(InsnFlags::SWITCH) {
                for target in resolve_switch_targets(last_insn, labels) {
                    if let Some(&id) = index_to_block.get(&target) {
                        if !succs.contains(&id) {
                            succs.push(id);
                        }
                    }
                }
                // Trailing successor is the default arm.
                if bi + 1 < blocks.len() {
                    succs.push(bi + 1);
                }
            } else if flags.contains(InsnFlags::CONDITIONAL) {
                if bi + 1 < blocks.len() {
                    succs.push(bi + 1);
                }
                if let Some(target) = resolve_target(last_insn, labels) {
                    if let Some(&id) = index_to_block.get(&target) {
                        if !succs.contains(&id) {
                            succs.push(id);
                        }
                    }
                }
            } else if flags.contains(InsnFlags::JUMP) {
                // Unconditional branch or leave.
                if let Some(target) = resolve_target(last_insn, labels) {
                    if let Some(&id) = index_to_block.get(&target) {
                        succs.push(id);
                    }
                }
            } else if flags.contains(InsnFlags::TERMINATOR) {
                // ret / throw / rethrow / endfinally: no successors.
            } else if bi + 1 < blocks.len() {
                succs.push(bi + 1);
            }
            blocks[bi].succs = succs;
        }

        // Predecessor lists.
        for bi in 0..blocks.len() {
            let succs = blocks[bi].succs.clone();
            for &s in &succs {
                if !blocks[s].preds.contains(&bi) {
                    blocks[s].preds.push(bi);
                }
            }
        }

        Cfg {
            blocks,
            entry: 0,
            index_to_block,
        }
    }
}

/// Resolve a branch instruction's label operand to an instruction index.
pub fn resolve_target(insn: &Instruction, labels: &LabelMap) -> Option<usize> {
    insn.operand.as_deref().and_then(|op| labels.resolve(op))
}

/// Resolve every target of a `switch` operand, skipping unresolvable labels.
pub fn resolve_switch_targets(insn: &Instruction, labels: &LabelMap) -> Vec<usize> {
    let Some(op) = insn.operand.as_deref() else {
        return vec![];
    };
    switch_target_labels(op)
        .into_iter()
        .filter_map(|l| labels.resolve(l))
        .collect()
}
