use cild_isa::{BinaryOp, OpKind, classify};
use cild_ir::cfg::{BlockId, Cfg, LoopKind};
use cild_ir::instruction::Instruction;
use cild_ir::stmt::{Stmt, StmtKind};

use crate::MethodContext;
use crate::diag::Diagnostic;
use crate::eval::{BlockEval, StackEvaluator, Terminator};

/// Renders annotated basic blocks as structured, indented source text.
///
/// Blocks are visited in ascending start order, skipping blocks a
/// structured renderer already consumed. Brace bookkeeping rides on the
/// tagged statement model plus an explicit region stack keyed on
/// instruction indices, so emitted text is never re-parsed.
pub struct CodeEmitter<'a> {
    instructions: &'a [Instruction],
    cfg: &'a Cfg,
    ctx: &'a MethodContext,
    eval: StackEvaluator<'a>,
    out: String,
    indent: usize,
    visited: Vec<bool>,
    /// Instruction indices at which an open `if` body closes.
    open_regions: Vec<usize>,
    /// Initializer withheld from the block preceding a `for` header.
    pending_init: Option<String>,
}

impl<'a> CodeEmitter<'a> {
    pub fn new(
        instructions: &'a [Instruction],
        cfg: &'a Cfg,
        ctx: &'a MethodContext,
        eval: StackEvaluator<'a>,
    ) -> Self {
        CodeEmitter {
            instructions,
            cfg,
            ctx,
            eval,
            out: String::new(),
            indent: 1,
            visited: vec![false; cfg.blocks.len()],
            open_regions: Vec::new(),
            pending_init: None,
        }
    }

    /// Render the whole method and hand back the evaluator's diagnostics.
    pub fn emit(mut self) -> (String, Vec<Diagnostic>) {
        let signature = self.signature();
        self.out.push_str(&signature);
        self.out.push('\n');

        self.walk(0, self.cfg.blocks.len());

        while !self.open_regions.is_empty() {
            self.open_regions.pop();
            self.close_brace();
        }
        self.out.push_str("}\n");

        let diagnostics = self.eval.take_diagnostics();
        (self.out, diagnostics)
    }

    fn signature(&self) -> String {
        let params: Vec<String> = self
            .ctx
            .param_types
            .iter()
            .enumerate()
            .map(|(i, ty)| format!("{ty} arg{i}"))
            .collect();
        format!(
            "{} {}({}) {{",
            self.ctx.return_type,
            self.ctx.name,
            params.join(", ")
        )
    }

    /// Emit every unvisited block with id in [from, to), closing open `if`
    /// regions as their target indices are reached.
    fn walk(&mut self, from: BlockId, to: BlockId) {
        let to = to.min(self.cfg.blocks.len());
        for id in from..to {
            self.close_regions_up_to(self.cfg.blocks[id].first);
            if !self.visited[id] {
                self.emit_block(id);
            }
        }
    }

    fn emit_block(&mut self, id: BlockId) {
        let block = &self.cfg.blocks[id];
        let loop_kind = block.loop_kind;
        if block.is_loop_header && matches!(loop_kind, Some(k) if k != LoopKind::Unknown) {
            self.emit_loop(id, loop_kind.unwrap_or(LoopKind::Unknown));
        } else if block.is_switch {
            self.emit_switch(id);
        } else if block.is_try_block && block.finally_block.is_some() {
            self.emit_try(id);
        } else {
            self.emit_plain(id);
        }
    }

    fn eval_range(&mut self, id: BlockId) -> BlockEval {
        let (first, last) = {
            let b = &self.cfg.blocks[id];
            (b.first, b.last)
        };
        self.eval.eval_block(&self.instructions[first..last])
    }

    fn emit_plain(&mut self, id: BlockId) {
        self.visited[id] = true;
        let mut be = self.eval_range(id);

        // A `for` header re-renders its initializer, so withhold the
        // trailing assignment of the block feeding into it.
        let next_is_for = id + 1 < self.cfg.blocks.len()
            && self.cfg.blocks[id + 1].is_loop_header
            && self.cfg.blocks[id + 1].loop_kind == Some(LoopKind::For);
        if next_is_for {
            let foldable = be
                .stmts
                .last()
                .is_some_and(|s| s.kind == StmtKind::Plain && s.text.contains(" = "));
            if foldable {
                let stmt = be.stmts.pop().unwrap_or_else(|| Stmt::plain(""));
                self.pending_init = Some(stmt.text.trim_end_matches(';').to_owned());
            }
        }

        self.write_stmts(&be.stmts);
        self.write_terminator(id, be.terminator);
    }

    fn write_terminator(&mut self, id: BlockId, terminator: Terminator) {
        match terminator {
            Terminator::None | Terminator::EndFinally | Terminator::Switch { .. } => {}
            Terminator::Goto { label, target } => {
                if !self.is_do_while_entry(id, target) {
                    self.line(&format!("goto {label};"));
                }
            }
            Terminator::Return(None) => self.line("return;"),
            Terminator::Return(Some(v)) => self.line(&format!("return {v};")),
            Terminator::Throw(Some(v)) => self.line(&format!("throw {v};")),
            Terminator::Throw(None) => self.line("throw;"),
            Terminator::Leave { label, .. } => {
                // Only reached when no finally block was paired.
                self.line(&format!("goto {label};"));
            }
            Terminator::Cond {
                taken,
                not_taken,
                label,
                target,
                ..
            } => match target {
                Some(t) if t > self.cfg.blocks[id].first => {
                    // Forward guard: the fallthrough region up to the
                    // target runs when the branch is not taken.
                    self.open_stmt(&Stmt::new(StmtKind::If, format!("if ({not_taken})")));
                    self.open_regions.push(t);
                }
                _ => {
                    self.line(&format!("if ({taken}) goto {label};"));
                }
            },
        }
    }

    /// A forward goto straight into the condition block of a bottom-tested
    /// loop is that loop's entry; the `do` rendering already implies it.
    fn is_do_while_entry(&self, id: BlockId, target: Option<usize>) -> bool {
        let Some(target) = target else {
            return false;
        };
        let Some(target_block) = self.cfg.block_at_index(target) else {
            return false;
        };
        let tb = &self.cfg.blocks[target_block];
        tb.is_loop_end
            && tb.loop_header == Some(id + 1)
            && self
                .cfg
                .blocks
                .get(id + 1)
                .and_then(|h| h.loop_kind)
                == Some(LoopKind::DoWhile)
    }

    fn emit_loop(&mut self, header: BlockId, kind: LoopKind) {
        let end = self
            .cfg
            .blocks
            .iter()
            .filter(|b| b.is_loop_end && b.loop_header == Some(header))
            .map(|b| b.id)
            .max()
            .unwrap_or(header);

        self.visited[header] = true;
        self.visited[end] = true;

        let he = self.eval_range(header);
        let self_loop = header == end;

        match kind {
            LoopKind::For | LoopKind::While => {
                let (cond, lhs) = match &he.terminator {
                    Terminator::Cond {
                        taken,
                        not_taken,
                        lhs,
                        ..
                    } => {
                        // A self-loop continues when its branch is taken; a
                        // top-tested header exits when taken.
                        let c = if self_loop { taken } else { not_taken };
                        (c.clone(), lhs.clone())
                    }
                    _ => ("true".to_owned(), String::new()),
                };

                if !self_loop {
                    self.write_stmts(&he.stmts);
                }
                let head = if kind == LoopKind::For {
                    let init = self.pending_init.take().unwrap_or_default();
                    let inc = self.increment_text(end, &lhs);
                    Stmt::new(StmtKind::For, format!("for ({init}; {cond}; {inc})"))
                } else {
                    Stmt::new(StmtKind::While, format!("while ({cond})"))
                };
                self.open_stmt(&head);
                if self_loop {
                    self.write_stmts(&he.stmts);
                } else {
                    self.walk(header + 1, end);
                    let ee = self.eval_range(end);
                    let mut tail = ee.stmts;
                    if kind == LoopKind::For {
                        // The increment renders in the header.
                        let is_inc = tail.last().is_some_and(|s| {
                            s.kind == StmtKind::Plain
                                && s.text.starts_with(&format!("{lhs} = {lhs}"))
                        });
                        if is_inc {
                            tail.pop();
                        }
                    }
                    self.write_stmts(&tail);
                }
                self.close_brace();
            }
            LoopKind::DoWhile => {
                self.open_stmt(&Stmt::new(StmtKind::Do, "do".to_owned()));
                self.write_stmts(&he.stmts);
                self.walk(header + 1, end);
                // Tail condition gets its own fresh stack pass.
                let ee = if self_loop { he } else { self.eval_range(end) };
                if !self_loop {
                    self.write_stmts(&ee.stmts);
                }
                let cond = match ee.terminator {
                    Terminator::Cond { taken, .. } => taken,
                    _ => "true".to_owned(),
                };
                if self.indent > 1 {
                    self.indent -= 1;
                }
                self.line(&format!("}} while ({cond});"));
            }
            LoopKind::Unknown => self.emit_plain(header),
        }
    }

    /// Synthesize the `for` increment from the end block's arithmetic.
    fn increment_text(&self, end: BlockId, lhs: &str) -> String {
        if lhs.is_empty() {
            return String::new();
        }
        let block = &self.cfg.blocks[end];
        let mut op = BinaryOp::Add;
        for insn in &self.instructions[block.first..block.last] {
            match classify(&insn.mnemonic) {
                OpKind::Binary(BinaryOp::Add) => {
                    op = BinaryOp::Add;
                    break;
                }
                OpKind::Binary(BinaryOp::Sub) => {
                    op = BinaryOp::Sub;
                    break;
                }
                _ => {}
            }
        }
        match op {
            BinaryOp::Sub => format!("{lhs}--"),
            _ => format!("{lhs}++"),
        }
    }

    fn emit_switch(&mut self, id: BlockId) {
        self.visited[id] = true;
        let be = self.eval_range(id);
        self.write_stmts(&be.stmts);
        let discriminant = match be.terminator {
            Terminator::Switch { discriminant } => discriminant,
            _ => "_".to_owned(),
        };
        let case_count = self.cfg.blocks[id].switch_targets.len();

        self.open_stmt(&Stmt::new(
            StmtKind::Switch,
            format!("switch ({discriminant})"),
        ));
        for case in 0..case_count {
            self.line(&format!("case {case}:"));
            self.indent += 1;
            self.line("break;");
            self.indent -= 1;
        }
        self.line("default:");
        self.indent += 1;
        self.line("break;");
        self.indent -= 1;
        self.close_brace();
    }

    fn emit_try(&mut self, id: BlockId) {
        self.visited[id] = true;
        let finally = self.cfg.blocks[id].finally_block;

        self.line("try {");
        self.indent += 1;
        let be = self.eval_range(id);
        // The trailing leave is implied by the structure.
        self.write_stmts(&be.stmts);
        if self.indent > 1 {
            self.indent -= 1;
        }

        if let Some(fin) = finally {
            self.visited[fin] = true;
            self.line("} finally {");
            self.indent += 1;
            let fe = self.eval_range(fin);
            self.write_stmts(&fe.stmts);
            if self.indent > 1 {
                self.indent -= 1;
            }
        }
        self.line("}");
    }

    fn write_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.line(&stmt.text);
        }
    }

    /// Write a block-opening statement and indent into its body.
    fn open_stmt(&mut self, stmt: &Stmt) {
        debug_assert!(stmt.opens_block());
        self.line(&format!("{} {{", stmt.text));
        self.indent += 1;
    }

    fn close_brace(&mut self) {
        if self.indent > 1 {
            self.indent -= 1;
        }
        self.line("}");
    }

    fn close_regions_up_to(&mut self, index: usize) {
        while let Some(&target) = self.open_regions.last() {
            if target > index {
                break;
            }
            self.open_regions.pop();
            self.close_brace();
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}
