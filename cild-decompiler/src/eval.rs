use cild_isa::{Condition, OpKind, classify};
use cild_ir::instruction::{Instruction, LabelMap};
use cild_ir::stmt::Stmt;

use crate::MethodContext;
use crate::diag::Diagnostic;

/// One value on the emulated evaluation stack.
#[derive(Debug, Clone)]
pub struct StackValue {
    /// Rendered expression text.
    pub text: String,
    /// Best-effort type name, when the producing opcode implies one.
    pub type_hint: Option<String>,
    /// Set by `ldloca`/`ldarga`; rendered `ref`-prefixed as a call argument.
    pub is_address_of: bool,
}

impl StackValue {
    fn new(text: impl Into<String>) -> Self {
        StackValue {
            text: text.into(),
            type_hint: None,
            is_address_of: false,
        }
    }

    fn typed(text: impl Into<String>, ty: impl Into<String>) -> Self {
        StackValue {
            text: text.into(),
            type_hint: Some(ty.into()),
            is_address_of: false,
        }
    }

    fn as_arg(&self) -> String {
        if self.is_address_of {
            format!("ref {}", self.text)
        } else {
            self.text.clone()
        }
    }
}

/// Synthetic names for local slots, derived from the declared types: the
/// first string-typed local becomes `str0`, the first int `num0`, and so
/// on. Built once per call, immutable afterwards.
#[derive(Debug)]
pub struct LocalBindings {
    names: Vec<String>,
    types: Vec<String>,
}

impl LocalBindings {
    pub fn from_types(types: &[String]) -> Self {
        let mut counters: std::collections::HashMap<String, usize> =
            std::collections::HashMap::new();
        let mut names = Vec::with_capacity(types.len());
        for ty in types {
            let prefix = type_prefix(ty);
            let n = counters.entry(prefix.clone()).or_insert(0);
            names.push(format!("{prefix}{n}"));
            *n += 1;
        }
        LocalBindings {
            names,
            types: types.to_vec(),
        }
    }

    pub fn name(&self, slot: usize) -> String {
        self.names
            .get(slot)
            .cloned()
            .unwrap_or_else(|| format!("local{slot}"))
    }

    pub fn declared_type(&self, slot: usize) -> String {
        self.types
            .get(slot)
            .map(|t| short_type(t).to_owned())
            .unwrap_or_else(|| "object".to_owned())
    }
}

fn type_prefix(ty: &str) -> String {
    let short = short_type(ty).to_ascii_lowercase();
    match short.as_str() {
        "string" => "str".to_owned(),
        "int32" | "int" | "int64" | "long" | "single" | "float" | "double" | "byte" | "sbyte"
        | "short" | "ushort" | "uint" | "ulong" => "num".to_owned(),
        "boolean" | "bool" => "flag".to_owned(),
        "object" => "obj".to_owned(),
        _ => {
            let cleaned: String = short
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            if cleaned.is_empty() || cleaned.starts_with(|c: char| c.is_ascii_digit()) {
                "local".to_owned()
            } else {
                cleaned
            }
        }
    }
}

/// Strip namespace/assembly qualification: `System.Text.StringBuilder` ->
/// `StringBuilder`, `Foo/Nested` -> `Nested`.
pub fn short_type(ty: &str) -> &str {
    ty.rsplit(['.', '/']).next().unwrap_or(ty).trim()
}

/// Callee names matched by substring to pick an argument count, in lieu of
/// real overload resolution.
const ARG_COUNTS: &[(&str, usize)] = &[
    ("get_", 0),
    ("set_", 1),
    ("ToString", 0),
    ("GetType", 0),
    ("GetHashCode", 0),
    ("Clear", 0),
    ("IsNullOrEmpty", 1),
    ("WriteLine", 1),
    ("Log", 1),
    ("Parse", 1),
    ("Concat", 2),
    ("Format", 2),
    ("Min", 2),
    ("Max", 2),
    ("Clamp", 3),
];

/// Types whose members are always called statically, so no receiver is
/// popped for them.
const KNOWN_STATIC_TYPES: &[&str] = &[
    "Math",
    "Mathf",
    "Debug",
    "Console",
    "String",
    "Convert",
    "Array",
    "Path",
    "File",
    "GUILayout",
    "GUI",
    "EditorGUILayout",
];

/// Callees treated as void-returning, so the call becomes a statement
/// instead of a pushed value.
const VOID_CALLEES: &[&str] = &[
    "WriteLine",
    "Log",
    "LogWarning",
    "LogError",
    "set_",
    "Add",
    "Clear",
    "RemoveAt",
    "CopyTo",
    "SetPixel",
    "Apply",
];

/// How a basic block hands control onward, as recovered by the evaluator.
#[derive(Debug, Clone)]
pub enum Terminator {
    /// Fallthrough.
    None,
    Goto {
        label: String,
        target: Option<usize>,
    },
    /// Conditional branch. `taken` is the condition under which the branch
    /// is followed, `not_taken` its negation; loops use the former and
    /// `if` guards the latter. `lhs` is the left operand text, used when a
    /// `for` header synthesizes its increment.
    Cond {
        taken: String,
        not_taken: String,
        lhs: String,
        label: String,
        target: Option<usize>,
    },
    Switch {
        discriminant: String,
    },
    Return(Option<String>),
    Throw(Option<String>),
    Leave {
        label: String,
        target: Option<usize>,
    },
    EndFinally,
}

/// Statements and terminator recovered from one basic block.
#[derive(Debug)]
pub struct BlockEval {
    pub stmts: Vec<Stmt>,
    pub terminator: Terminator,
}

/// The symbolic stack machine. One instance per decompilation call; the
/// stack is reset at every block, loop body, switch body, and do-while
/// tail evaluation rather than tracked across edges.
pub struct StackEvaluator<'a> {
    ctx: &'a MethodContext,
    labels: &'a LabelMap,
    locals: LocalBindings,
    stack: Vec<StackValue>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> StackEvaluator<'a> {
    pub fn new(ctx: &'a MethodContext, labels: &'a LabelMap) -> Self {
        StackEvaluator {
            ctx,
            labels,
            locals: LocalBindings::from_types(&ctx.local_types),
            stack: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn locals(&self) -> &LocalBindings {
        &self.locals
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Evaluate one basic block with a fresh stack.
    pub fn eval_block(&mut self, instructions: &[Instruction]) -> BlockEval {
        self.stack.clear();
        let mut out = BlockEval {
            stmts: Vec::new(),
            terminator: Terminator::None,
        };
        for insn in instructions {
            self.eval_insn(insn, &mut out);
        }
        out
    }

    fn push(&mut self, value: StackValue) {
        self.stack.push(value);
    }

    /// Pop never fails: underflow yields a placeholder so malformed input
    /// degrades instead of aborting.
    fn pop(&mut self) -> StackValue {
        self.stack.pop().unwrap_or_else(|| StackValue::new("_"))
    }

    fn arg_name(&self, index: usize) -> String {
        if index == 0 {
            "this".to_owned()
        } else {
            format!("arg{}", index - 1)
        }
    }

    fn slot(insn: &Instruction, encoded: Option<usize>) -> usize {
        encoded.or_else(|| operand_slot(insn.operand.as_deref())).unwrap_or(0)
    }

    fn resolve(&self, label: &str) -> Option<usize> {
        self.labels.resolve(label)
    }

    fn branch_operand(&mut self, insn: &Instruction) -> (String, Option<usize>) {
        let label = insn.operand.clone().unwrap_or_default();
        let target = self.resolve(&label);
        if target.is_none() {
            self.diagnostics.push(Diagnostic::UnresolvedLabel {
                index: insn.index,
                label: label.clone(),
            });
        }
        (label, target)
    }

    fn eval_insn(&mut self, insn: &Instruction, out: &mut BlockEval) {
        let operand = insn.operand.as_deref();
        match classify(&insn.mnemonic) {
            OpKind::Nop => {}
            OpKind::Dup => {
                let top = self
                    .stack
                    .last()
                    .cloned()
                    .unwrap_or_else(|| StackValue::new("_"));
                self.push(top);
            }
            OpKind::Pop => {
                let v = self.pop();
                out.stmts.push(Stmt::plain(format!("{};", v.text)));
            }
            OpKind::LdcI4(encoded) => {
                let text = match encoded {
                    Some(n) => n.to_string(),
                    None => operand.unwrap_or("0").to_owned(),
                };
                self.push(StackValue::typed(text, "int"));
            }
            OpKind::LdcI8 => {
                self.push(StackValue::typed(
                    format!("{}L", operand.unwrap_or("0")),
                    "long",
                ));
            }
            OpKind::LdcR4 => {
                self.push(StackValue::typed(
                    format!("{}f", operand.unwrap_or("0")),
                    "float",
                ));
            }
            OpKind::LdcR8 => {
                self.push(StackValue::typed(operand.unwrap_or("0"), "double"));
            }
            OpKind::LdStr => {
                let raw = operand.unwrap_or("\"\"");
                let text = if raw.starts_with('"') {
                    raw.to_owned()
                } else {
                    format!("\"{raw}\"")
                };
                self.push(StackValue::typed(text, "string"));
            }
            OpKind::LdNull => self.push(StackValue::new("null")),
            OpKind::LdLoc(encoded) => {
                let slot = Self::slot(insn, encoded);
                self.push(StackValue::typed(
                    self.locals.name(slot),
                    self.locals.declared_type(slot),
                ));
            }
            OpKind::LdLocA => {
                let slot = Self::slot(insn, None);
                let mut v =
                    StackValue::typed(self.locals.name(slot), self.locals.declared_type(slot));
                v.is_address_of = true;
                self.push(v);
            }
            OpKind::StLoc(encoded) => {
                let slot = Self::slot(insn, encoded);
                let v = self.pop();
                let name = self.locals.name(slot);
                // Constructor results render as typed declarations. This is
                // a textual heuristic, so a slot written twice from `newobj`
                // declares twice.
                let stmt = if v.text.starts_with("new ") {
                    format!("{} {name} = {};", self.locals.declared_type(slot), v.text)
                } else {
                    format!("{name} = {};", v.text)
                };
                out.stmts.push(Stmt::plain(stmt));
            }
            OpKind::LdArg(encoded) => {
                let index = Self::slot(insn, encoded);
                let ty = if index == 0 {
                    None
                } else {
                    self.ctx.param_types.get(index - 1).cloned()
                };
                let mut v = StackValue::new(self.arg_name(index));
                v.type_hint = ty;
                self.push(v);
            }
            OpKind::LdArgA => {
                let index = Self::slot(insn, None);
                let mut v = StackValue::new(self.arg_name(index));
                v.is_address_of = true;
                self.push(v);
            }
            OpKind::StArg => {
                let index = Self::slot(insn, None);
                let v = self.pop();
                out.stmts
                    .push(Stmt::plain(format!("{} = {};", self.arg_name(index), v.text)));
            }
            OpKind::LdFld => {
                let obj = self.pop();
                self.push(StackValue::new(format!(
                    "{}.{}",
                    obj.text,
                    member_name(operand)
                )));
            }
            OpKind::LdsFld => {
                self.push(StackValue::new(format!(
                    "{}.{}",
                    owner_type(operand),
                    member_name(operand)
                )));
            }
            OpKind::StFld => {
                let value = self.pop();
                let obj = self.pop();
                out.stmts.push(Stmt::plain(format!(
                    "{}.{} = {};",
                    obj.text,
                    member_name(operand),
                    value.text
                )));
            }
            OpKind::StsFld => {
                let value = self.pop();
                out.stmts.push(Stmt::plain(format!(
                    "{}.{} = {};",
                    owner_type(operand),
                    member_name(operand),
                    value.text
                )));
            }
            OpKind::LdElem => {
                let index = self.pop();
                let arr = self.pop();
                self.push(StackValue::new(format!("{}[{}]", arr.text, index.text)));
            }
            OpKind::StElem => {
                let value = self.pop();
                let index = self.pop();
                let arr = self.pop();
                out.stmts.push(Stmt::plain(format!(
                    "{}[{}] = {};",
                    arr.text, index.text, value.text
                )));
            }
            OpKind::LdLen => {
                let arr = self.pop();
                self.push(StackValue::typed(format!("{}.Length", arr.text), "int"));
            }
            OpKind::NewArr => {
                let len = self.pop();
                let ty = operand.map(short_type).unwrap_or("object");
                self.push(StackValue::new(format!("new {ty}[{}]", len.text)));
            }
            OpKind::Binary(op) => {
                let b = self.pop();
                let a = self.pop();
                self.push(StackValue::new(format!(
                    "{} {} {}",
                    a.text,
                    op.symbol(),
                    b.text
                )));
            }
            OpKind::Neg => {
                let a = self.pop();
                self.push(StackValue::new(format!("-{}", a.text)));
            }
            OpKind::Not => {
                let a = self.pop();
                self.push(StackValue::new(format!("~{}", a.text)));
            }
            OpKind::Compare { op, .. } => {
                let b = self.pop();
                let a = self.pop();
                // Boolean-as-integer, matching what the stack machine
                // actually leaves behind.
                self.push(StackValue::typed(
                    format!("({} {} {} ? 1 : 0)", a.text, op.symbol(), b.text),
                    "int",
                ));
            }
            OpKind::Conv(ty) => {
                let a = self.pop();
                self.push(StackValue::typed(format!("({ty}){}", a.text), ty));
            }
            OpKind::Box => {
                // Value unchanged at source level.
            }
            OpKind::Unbox | OpKind::CastClass => {
                let a = self.pop();
                let ty = operand.map(short_type).unwrap_or("object");
                self.push(StackValue::new(format!("({ty}){}", a.text)));
            }
            OpKind::IsInst => {
                let a = self.pop();
                let ty = operand.map(short_type).unwrap_or("object");
                self.push(StackValue::new(format!("({} as {ty})", a.text)));
            }
            OpKind::Call | OpKind::CallVirt => {
                self.eval_call(operand.unwrap_or(""), out);
            }
            OpKind::NewObj => {
                self.eval_newobj(operand.unwrap_or(""));
            }
            OpKind::Br => {
                let (label, target) = self.branch_operand(insn);
                out.terminator = Terminator::Goto { label, target };
            }
            OpKind::CondBr(cond) => {
                let (label, target) = self.branch_operand(insn);
                let (taken, not_taken, lhs) = self.eval_condition(cond);
                out.terminator = Terminator::Cond {
                    taken,
                    not_taken,
                    lhs,
                    label,
                    target,
                };
            }
            OpKind::Switch => {
                let discr = self.pop();
                out.terminator = Terminator::Switch {
                    discriminant: discr.text,
                };
            }
            OpKind::Leave => {
                let (label, target) = self.branch_operand(insn);
                out.terminator = Terminator::Leave { label, target };
            }
            OpKind::EndFinally => {
                out.terminator = Terminator::EndFinally;
            }
            OpKind::Ret => {
                let value = if self.returns_value() && !self.stack.is_empty() {
                    Some(self.pop().text)
                } else {
                    None
                };
                out.terminator = Terminator::Return(value);
            }
            OpKind::Throw => {
                let v = self.pop();
                out.terminator = Terminator::Throw(Some(v.text));
            }
            OpKind::Rethrow => {
                out.terminator = Terminator::Throw(None);
            }
            OpKind::Unhandled => {
                let text = match operand {
                    Some(op) => format!("// Unhandled: {} {op}", insn.mnemonic),
                    None => format!("// Unhandled: {}", insn.mnemonic),
                };
                log::warn!(
                    "unhandled opcode `{}` at instruction {}",
                    insn.mnemonic,
                    insn.index
                );
                self.diagnostics.push(Diagnostic::UnhandledOpcode {
                    index: insn.index,
                    mnemonic: insn.mnemonic.clone(),
                });
                out.stmts.push(Stmt::comment(text));
            }
        }
    }

    fn returns_value(&self) -> bool {
        let ret = short_type(&self.ctx.return_type);
        !ret.is_empty() && !ret.eq_ignore_ascii_case("void")
    }

    fn eval_condition(&mut self, cond: Condition) -> (String, String, String) {
        match cond {
            Condition::True => {
                let v = self.pop();
                let taken = v.text.clone();
                (taken.clone(), format!("!{}", guard(&taken)), taken)
            }
            Condition::False => {
                let v = self.pop();
                let text = v.text;
                (format!("!{}", guard(&text)), text.clone(), text)
            }
            Condition::Cmp { op, .. } => {
                let b = self.pop();
                let a = self.pop();
                let taken = format!("{} {} {}", a.text, op.symbol(), b.text);
                let not_taken = format!("{} {} {}", a.text, op.negated().symbol(), b.text);
                (taken, not_taken, a.text)
            }
        }
    }

    fn eval_call(&mut self, operand: &str, out: &mut BlockEval) {
        let callee = callee_name(operand);
        let method = member_name(Some(&callee));
        let owner = owner_type(Some(&callee));

        let argc = arg_count(operand, &callee);
        let mut args: Vec<String> = Vec::with_capacity(argc);
        for _ in 0..argc {
            args.push(self.pop().as_arg());
        }
        args.reverse();

        let is_static = KNOWN_STATIC_TYPES.contains(&owner.as_str());
        let receiver = if is_static { owner } else { self.pop().text };

        let expr = format!("{receiver}.{method}({})", args.join(", "));
        if is_void_call(operand, &callee) {
            out.stmts.push(Stmt::plain(format!("{expr};")));
        } else {
            self.push(StackValue::new(expr));
        }
    }

    fn eval_newobj(&mut self, operand: &str) {
        let callee = callee_name(operand);
        let owner = owner_type(Some(&callee));
        let argc = arg_count(operand, &callee);
        let mut args: Vec<String> = Vec::with_capacity(argc);
        for _ in 0..argc {
            args.push(self.pop().as_arg());
        }
        args.reverse();
        self.push(StackValue::new(format!("new {owner}({})", args.join(", "))));
    }
}

/// Wrap compound condition text in parens before negating it.
fn guard(text: &str) -> String {
    if text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
        text.to_owned()
    } else {
        format!("({text})")
    }
}

/// Extract the trailing digits of a slot operand (`V_2`, `2`).
fn operand_slot(operand: Option<&str>) -> Option<usize> {
    let op = operand?.trim();
    let digits: usize = op
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    op[op.len() - digits..].parse().ok()
}

/// Pull the `Owner::Name` token out of an operand that may carry a full
/// signature (`instance void Foo::Bar(string)`).
fn callee_name(operand: &str) -> String {
    let token = operand
        .split_whitespace()
        .find(|t| t.contains("::"))
        .unwrap_or(operand.trim());
    token.to_owned()
}

/// Member name after the last `::` (or `.` when unqualified), with any
/// parameter list stripped.
fn member_name(operand: Option<&str>) -> String {
    let Some(op) = operand else {
        return "member".to_owned();
    };
    let base = match op.rsplit_once("::") {
        Some((_, name)) => name,
        None => op.rsplit(['.', ' ']).next().unwrap_or(op),
    };
    let base = base.split('(').next().unwrap_or(base).trim();
    let base = base.strip_prefix('.').unwrap_or(base);
    if base.is_empty() {
        "member".to_owned()
    } else {
        base.to_owned()
    }
}

/// Declaring type before the `::`, namespace-stripped.
fn owner_type(operand: Option<&str>) -> String {
    let Some(op) = operand else {
        return "object".to_owned();
    };
    match op.split_once("::") {
        Some((qualifier, _)) => {
            let ty = qualifier.rsplit(' ').next().unwrap_or(qualifier);
            short_type(ty).to_owned()
        }
        None => "object".to_owned(),
    }
}

/// Argument count: prefer counting the textual parameter list when the
/// operand carries one, otherwise fall back to the substring table.
fn arg_count(operand: &str, callee: &str) -> usize {
    if let Some(open) = operand.find('(') {
        if let Some(close) = operand.rfind(')') {
            if close > open {
                let params = operand[open + 1..close].trim();
                if params.is_empty() {
                    return 0;
                }
                return params.split(',').count();
            }
        }
    }
    for (needle, count) in ARG_COUNTS {
        if callee.contains(needle) {
            return *count;
        }
    }
    1
}

fn is_void_call(operand: &str, callee: &str) -> bool {
    // A signature operand names its return type before the owner token.
    let before_owner = operand.split("::").next().unwrap_or("");
    if before_owner.split_whitespace().any(|t| t == "void") {
        return true;
    }
    VOID_CALLEES.iter().any(|needle| callee.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_names_derive_from_types() {
        let locals = LocalBindings::from_types(&[
            "System.String".to_owned(),
            "int".to_owned(),
            "string".to_owned(),
        ]);
        assert_eq!(locals.name(0), "str0");
        assert_eq!(locals.name(1), "num0");
        assert_eq!(locals.name(2), "str1");
        assert_eq!(locals.name(9), "local9");
        assert_eq!(locals.declared_type(0), "String");
    }

    #[test]
    fn callee_parsing() {
        assert_eq!(member_name(Some("instance void Foo::Bar(string)")), "Bar");
        assert_eq!(owner_type(Some("instance void Ns.Foo::Bar(string)")), "Foo");
        assert_eq!(member_name(Some("int Ns.Foo::get_Count()")), "get_Count");
        assert_eq!(member_name(Some("instance void Ns.Foo::.ctor(int)")), "ctor");
    }

    #[test]
    fn arg_count_prefers_signature_over_sniffing() {
        assert_eq!(arg_count("void Foo::Bar(int, int)", "Foo::Bar"), 2);
        assert_eq!(arg_count("void Foo::Bar()", "Foo::Bar"), 0);
        assert_eq!(arg_count("Foo::get_Count", "Foo::get_Count"), 0);
        assert_eq!(arg_count("Foo::Clamp", "Foo::Clamp"), 3);
        assert_eq!(arg_count("Foo::Mystery", "Foo::Mystery"), 1);
    }

    #[test]
    fn void_detection() {
        assert!(is_void_call("void Foo::Bar(int)", "Foo::Bar"));
        assert!(is_void_call("Debug::Log", "Debug::Log"));
        assert!(!is_void_call("int Foo::Baz()", "Foo::Baz"));
    }
}
