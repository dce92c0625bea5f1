//! Best-effort decompiler from textual CIL instruction listings to
//! structured source text.
//!
//! The pipeline is a pure multi-pass transform: parse the listing, build a
//! control flow graph, annotate structural patterns (loops, switches,
//! try/finally), then drive a symbolic evaluation stack while emitting
//! indented source. Malformed lines and unrecognized opcodes degrade
//! instead of aborting; callers that care can read the diagnostics side
//! channel. Every call owns its own state, so concurrent decompilations
//! are independent.

pub mod diag;
pub mod emit;
pub mod eval;
pub mod parse;
pub mod structure;

pub use diag::Diagnostic;
pub use parse::parse_listing;

use cild_ir::cfg::Cfg;
use cild_ir::instruction::{Instruction, LabelMap};

/// Caller-supplied method metadata. Never mutated by the pipeline.
#[derive(Debug, Clone)]
pub struct MethodContext {
    pub name: String,
    pub return_type: String,
    pub param_types: Vec<String>,
    pub local_types: Vec<String>,
}

impl MethodContext {
    pub fn new(
        name: &str,
        return_type: &str,
        param_types: &[&str],
        local_types: &[&str],
    ) -> Self {
        MethodContext {
            name: name.to_owned(),
            return_type: return_type.to_owned(),
            param_types: param_types.iter().map(|s| (*s).to_owned()).collect(),
            local_types: local_types.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Decompiled source plus everything that degraded along the way.
#[derive(Debug)]
pub struct Decompilation {
    pub source: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Decompile a textual instruction listing.
pub fn decompile(listing: &str, ctx: &MethodContext) -> String {
    decompile_with_diagnostics(listing, ctx).source
}

/// Decompile a listing, returning the diagnostics side channel as well.
pub fn decompile_with_diagnostics(listing: &str, ctx: &MethodContext) -> Decompilation {
    let parsed = parse::parse_listing(listing);
    run(&parsed.instructions, &parsed.labels, parsed.diagnostics, ctx)
}

/// Decompile a pre-built instruction list, bypassing text parsing.
pub fn decompile_instructions(instructions: Vec<Instruction>, ctx: &MethodContext) -> String {
    let (instructions, labels) = parse::index_instructions(instructions);
    run(&instructions, &labels, Vec::new(), ctx).source
}

fn run(
    instructions: &[Instruction],
    labels: &LabelMap,
    mut diagnostics: Vec<Diagnostic>,
    ctx: &MethodContext,
) -> Decompilation {
    let mut cfg = Cfg::build(instructions, labels);
    structure::analyze(&mut cfg, instructions, labels);

    let evaluator = eval::StackEvaluator::new(ctx, labels);
    let emitter = emit::CodeEmitter::new(instructions, &cfg, ctx, evaluator);
    let (source, mut emitted) = emitter.emit();
    diagnostics.append(&mut emitted);

    Decompilation {
        source,
        diagnostics,
    }
}
