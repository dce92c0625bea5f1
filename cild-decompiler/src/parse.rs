use cild_ir::instruction::{Instruction, LabelMap};

use crate::diag::Diagnostic;

/// Result of parsing a textual instruction listing.
pub struct Parsed {
    pub instructions: Vec<Instruction>,
    pub labels: LabelMap,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a listing of `<label>: <mnemonic> [operand]` lines.
///
/// Blank lines are ignored. Anything else that does not match the line
/// grammar is dropped from the instruction stream but recorded as a
/// [`Diagnostic::SkippedLine`] and logged, never an error.
pub fn parse_listing(text: &str) -> Parsed {
    let mut instructions = Vec::new();
    let mut diagnostics = Vec::new();

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(mut insn) => {
                insn.index = instructions.len();
                instructions.push(insn);
            }
            None => {
                log::warn!("skipping unparseable line {}: {line:?}", line_no + 1);
                diagnostics.push(Diagnostic::SkippedLine {
                    line: line_no + 1,
                    text: line.to_owned(),
                });
            }
        }
    }

    let labels = LabelMap::build(&instructions);
    Parsed {
        instructions,
        labels,
        diagnostics,
    }
}

/// Re-index a caller-built instruction list and derive its label map,
/// bypassing text parsing.
pub fn index_instructions(mut instructions: Vec<Instruction>) -> (Vec<Instruction>, LabelMap) {
    for (i, insn) in instructions.iter_mut().enumerate() {
        insn.index = i;
    }
    let labels = LabelMap::build(&instructions);
    (instructions, labels)
}

fn is_label(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_line(line: &str) -> Option<Instruction> {
    let (label, rest) = line.split_once(':')?;
    let label = label.trim();
    if !is_label(label) {
        return None;
    }
    let rest = rest.trim();
    let (mnemonic, operand) = match rest.split_once(char::is_whitespace) {
        Some((m, o)) => (m, Some(o.trim())),
        None => (rest, None),
    };
    if mnemonic.is_empty() {
        return None;
    }
    let operand = operand.filter(|o| !o.is_empty());
    Some(Instruction::new(Some(label), mnemonic, operand))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_label_mnemonic_operand() {
        let parsed = parse_listing("IL_0000: ldc.i4.5\nIL_0001: blt IL_0000\n");
        assert_eq!(parsed.instructions.len(), 2);
        assert!(parsed.diagnostics.is_empty());
        let blt = &parsed.instructions[1];
        assert_eq!(blt.index, 1);
        assert_eq!(blt.mnemonic, "blt");
        assert_eq!(blt.operand.as_deref(), Some("IL_0000"));
        assert_eq!(parsed.labels.resolve("IL_0000"), Some(0));
    }

    #[test]
    fn operand_keeps_interior_spaces() {
        let parsed = parse_listing("IL_0000: ldstr \"hello world\"\n");
        assert_eq!(
            parsed.instructions[0].operand.as_deref(),
            Some("\"hello world\"")
        );
    }

    #[test]
    fn mnemonic_is_normalized_lowercase() {
        let parsed = parse_listing("IL_0000: LDC.I4.1");
        assert_eq!(parsed.instructions[0].mnemonic, "ldc.i4.1");
    }

    #[test]
    fn malformed_lines_are_skipped_silently() {
        let parsed = parse_listing("garbage without colon\n\nIL_0000: ret\n12x: nope\n");
        assert_eq!(parsed.instructions.len(), 1);
        assert_eq!(parsed.instructions[0].mnemonic, "ret");
        assert_eq!(parsed.diagnostics.len(), 2);
        assert!(matches!(
            parsed.diagnostics[0],
            Diagnostic::SkippedLine { line: 1, .. }
        ));
    }

    #[test]
    fn blank_lines_produce_no_diagnostics() {
        let parsed = parse_listing("\n\n   \n");
        assert!(parsed.instructions.is_empty());
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn prebuilt_lists_are_reindexed() {
        let insns = vec![
            Instruction::with_offset(0, "nop", None),
            Instruction::with_offset(1, "ret", None),
        ];
        let (insns, labels) = index_instructions(insns);
        assert_eq!(insns[1].index, 1);
        assert_eq!(labels.resolve("IL_0001"), Some(1));
    }
}
