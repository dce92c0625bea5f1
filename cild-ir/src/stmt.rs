/// Statement tag carried alongside emitted text, so the emitter can track
/// structure without re-parsing its own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StmtKind {
    Plain,
    If,
    For,
    While,
    Do,
    Switch,
    Comment,
}

/// One emitted statement: a rendering tag plus the source text, without
/// indentation or braces (the emitter owns those).
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub text: String,
}

impl Stmt {
    pub fn new(kind: StmtKind, text: impl Into<String>) -> Self {
        Stmt {
            kind,
            text: text.into(),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Stmt::new(StmtKind::Plain, text)
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Stmt::new(StmtKind::Comment, text)
    }

    /// True for the statement kinds that open a braced body.
    pub fn opens_block(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::If | StmtKind::For | StmtKind::While | StmtKind::Switch | StmtKind::Do
        )
    }
}
