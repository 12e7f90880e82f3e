use std::path::Path;

use crate::meta::MetaOpcode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("At instruction {position}, {text:?} is not a 16-bit hexadecimal word")]
    Conversion { position: usize, text: String },
    #[error("At instruction {position}, {op} was never relocated")]
    Unresolved { position: usize, op: MetaOpcode },
}

/// Turns relocated meta-opcodes into instruction words.
pub fn finalize(meta: &[MetaOpcode]) -> Result<Vec<u16>, Error> {
    meta.iter()
        .enumerate()
        .map(|(position, op)| match op {
            MetaOpcode::Word(word) => Ok(*word),
            MetaOpcode::Raw(text) => parse_word(text).ok_or_else(|| Error::Conversion {
                position,
                text: text.clone(),
            }),
            MetaOpcode::End => Ok(0x0000),
            MetaOpcode::Jump(_) | MetaOpcode::Label(_) => Err(Error::Unresolved {
                position,
                op: op.clone(),
            }),
        })
        .collect()
}

fn parse_word(text: &str) -> Option<u16> {
    if text.is_empty() || text.len() > 4 || !text.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(text, 16).ok()
}

/// The ROM image: every word big-endian, no header.
pub fn rom_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Reads words back out of a ROM image. An odd trailing byte becomes the
/// high byte of a last word.
pub fn rom_words(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
        .collect()
}

pub fn write_rom(path: impl AsRef<Path>, words: &[u16]) -> std::io::Result<()> {
    std::fs::write(path, rom_bytes(words))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{Label, LabelKind};

    #[test]
    fn words_and_raw_text() {
        let meta = vec![
            MetaOpcode::Word(0x6006),
            MetaOpcode::Raw("00e0".to_owned()),
            MetaOpcode::Raw("A2F0".to_owned()),
            MetaOpcode::Raw("1".to_owned()),
        ];
        assert_eq!(finalize(&meta).unwrap(), vec![0x6006, 0x00E0, 0xA2F0, 0x0001]);
    }

    #[test]
    fn bad_raw_text() {
        for text in ["xyz", "12345", "+12", ""] {
            let meta = vec![MetaOpcode::Word(0x00E0), MetaOpcode::Raw(text.to_owned())];
            assert!(
                matches!(finalize(&meta), Err(Error::Conversion { position: 1, .. })),
                "{:?}",
                text
            );
        }
    }

    #[test]
    fn unrelocated_jump() {
        let meta = vec![MetaOpcode::Jump(Label {
            kind: LabelKind::For,
            id: 500,
        })];
        assert_eq!(
            finalize(&meta).unwrap_err().to_string(),
            "At instruction 0, 1<500> was never relocated"
        );
    }

    #[test]
    fn rom_is_big_endian() {
        assert_eq!(rom_bytes(&[0x6006, 0x00E0]), vec![0x60, 0x06, 0x00, 0xE0]);
        assert_eq!(rom_words(&[0x60, 0x06, 0x12]), vec![0x6006, 0x1200]);
    }
}
