use std::collections::HashMap;

/// A single instruction from a textual bytecode listing.
///
/// Instructions retain source order; `index` is the ordering key for all
/// branch-target comparisons. `offset` is parsed from the label's trailing
/// hex digits and is bookkeeping only, never used for branch resolution.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Position in the instruction stream, assigned when the list is built.
    pub index: usize,
    /// Textual label prefix (`IL_0004`), if the line carried one.
    pub label: Option<String>,
    /// Normalized lowercase mnemonic.
    pub mnemonic: String,
    /// Raw operand text, which may contain spaces, quotes, or parens.
    pub operand: Option<String>,
    /// Numeric offset recovered from the label, if any.
    pub offset: Option<u32>,
}

impl Instruction {
    /// Build an instruction from its textual parts. The sequence index is
    /// assigned later, when the instruction joins a stream.
    pub fn new(label: Option<&str>, mnemonic: &str, operand: Option<&str>) -> Self {
        let label = label.map(str::to_owned);
        let offset = label.as_deref().and_then(parse_label_offset);
        Instruction {
            index: 0,
            label,
            mnemonic: mnemonic.to_ascii_lowercase(),
            operand: operand.map(str::to_owned),
            offset,
        }
    }

    /// Build an instruction from a numeric offset, synthesizing the
    /// conventional `IL_xxxx` label.
    pub fn with_offset(offset: u32, mnemonic: &str, operand: Option<&str>) -> Self {
        Instruction {
            index: 0,
            label: Some(format!("IL_{offset:04x}")),
            mnemonic: mnemonic.to_ascii_lowercase(),
            operand: operand.map(str::to_owned),
            offset: Some(offset),
        }
    }
}

/// Parse the trailing hexadecimal digits of a label (`IL_00a4` -> 0xa4).
pub fn parse_label_offset(label: &str) -> Option<u32> {
    let digits: usize = label
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_hexdigit())
        .count();
    if digits == 0 {
        return None;
    }
    u32::from_str_radix(&label[label.len() - digits..], 16).ok()
}

/// Split a `switch` operand like `(IL_0003, IL_0007, IL_000b)` into its
/// target labels, in order.
pub fn switch_target_labels(operand: &str) -> Vec<&str> {
    operand
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Label -> instruction index, built once per instruction stream so branch
/// resolution is a map lookup rather than a scan.
#[derive(Debug, Default)]
pub struct LabelMap {
    map: HashMap<String, usize>,
}

impl LabelMap {
    pub fn build(instructions: &[Instruction]) -> Self {
        let mut map = HashMap::new();
        for insn in instructions {
            if let Some(ref label) = insn.label {
                // First definition wins on duplicate labels.
                map.entry(label.clone()).or_insert(insn.index);
            }
        }
        LabelMap { map }
    }

    pub fn resolve(&self, label: &str) -> Option<usize> {
        self.map.get(label.trim()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_offset_parsing() {
        assert_eq!(parse_label_offset("IL_0004"), Some(4));
        assert_eq!(parse_label_offset("IL_00a4"), Some(0xa4));
        assert_eq!(parse_label_offset("loc_12"), Some(0x12));
        assert_eq!(parse_label_offset("start"), None);
    }

    #[test]
    fn with_offset_synthesizes_label() {
        let insn = Instruction::with_offset(0x1f, "NOP", None);
        assert_eq!(insn.label.as_deref(), Some("IL_001f"));
        assert_eq!(insn.mnemonic, "nop");
        assert_eq!(insn.offset, Some(0x1f));
    }

    #[test]
    fn label_map_resolves_in_index_order() {
        let mut insns = vec![
            Instruction::new(Some("IL_0000"), "nop", None),
            Instruction::new(Some("IL_0001"), "ret", None),
        ];
        for (i, insn) in insns.iter_mut().enumerate() {
            insn.index = i;
        }
        let labels = LabelMap::build(&insns);
        assert_eq!(labels.resolve("IL_0001"), Some(1));
        assert_eq!(labels.resolve("IL_0009"), None);
    }

    #[test]
    fn switch_labels_split() {
        assert_eq!(
            switch_target_labels("(IL_0003, IL_0007,IL_000b)"),
            vec!["IL_0003", "IL_0007", "IL_000b"]
        );
        assert_eq!(switch_target_labels("IL_0003"), vec!["IL_0003"]);
    }
}
