use derive_more::derive::Display;

/// First id handed out to for-loop labels. If-labels count up from 1.
pub const FOR_LABEL_BASE: u32 = 500;

/// Where the relocator looks for jumps that reference a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// Closes an `if`. Its jump is always emitted before the marker.
    If,
    /// Tops a `for`. Its back-edge is emitted after the marker.
    For,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("{id}")]
pub struct Label {
    pub kind: LabelKind,
    pub id: u32,
}

/// An instruction before relocation.
///
/// `Display` renders the textual forms used in `--steps` output: `00E0` for
/// a finished word, `1<3>` for a jump to label 3, `<!3!>` for the definition
/// of label 3 and `0` for the end of the program.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum MetaOpcode {
    #[display("{_0:04X}")]
    Word(u16),
    /// Text copied verbatim from a `raw` statement.
    #[display("{_0}")]
    Raw(String),
    #[display("1<{_0}>")]
    Jump(Label),
    #[display("<!{_0}!>")]
    Label(Label),
    #[display("0")]
    End,
}

impl MetaOpcode {
    /// Label definitions occupy no memory.
    pub fn is_marker(&self) -> bool {
        matches!(self, MetaOpcode::Label(_))
    }
}

/// Renders a sequence one opcode per line.
pub fn render(ops: &[MetaOpcode]) -> String {
    ops.iter().map(|op| format!("{}\n", op)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textual_forms() {
        let label = Label {
            kind: LabelKind::If,
            id: 3,
        };
        let ops = vec![
            MetaOpcode::Word(0x3001),
            MetaOpcode::Jump(label),
            MetaOpcode::Raw("00e0".to_owned()),
            MetaOpcode::Label(label),
            MetaOpcode::End,
        ];
        assert_eq!(render(&ops), "3001\n1<3>\n00e0\n<!3!>\n0\n");
        assert!(ops[3].is_marker());
        assert!(!ops[1].is_marker());
    }
}
