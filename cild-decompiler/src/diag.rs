use thiserror::Error;

/// A non-fatal condition observed during decompilation.
///
/// The pipeline never aborts on malformed input; these records are the
/// side channel for callers that want to know what was dropped or
/// degraded. Default output is unaffected by them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Diagnostic {
    #[error("line {line}: skipped unparseable input: {text:?}")]
    SkippedLine { line: usize, text: String },

    #[error("instruction {index}: unhandled opcode `{mnemonic}`")]
    UnhandledOpcode { index: usize, mnemonic: String },

    #[error("instruction {index}: branch label `{label}` does not resolve")]
    UnresolvedLabel { index: usize, label: String },
}
