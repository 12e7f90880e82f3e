use crate::meta::{Label, LabelKind, MetaOpcode};

/// Where a ROM is loaded in CHIP-8 memory.
pub const PROGRAM_START: usize = 0x200;
pub const INSTRUCTION_SIZE: usize = 2;
/// Highest address a `1NNN` jump can reach.
pub const MAX_ADDRESS: usize = 0xFFF;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("At instruction {position}, jump to label {label} has no definition")]
    DanglingLabel { position: usize, label: Label },
    #[error("At label {label}, address {address:#X} is out of range")]
    AddressOutOfRange { label: Label, address: usize },
}

/// Replaces every label reference with the absolute address of its
/// definition, then drops the definitions and the trailing end marker.
///
/// A jump to an if-label is only looked for before the label's definition;
/// a jump to a for-label may be anywhere. The first matching jump is patched.
pub fn resolve(mut meta: Vec<MetaOpcode>) -> Result<Vec<MetaOpcode>, Error> {
    if meta.last() == Some(&MetaOpcode::End) {
        meta.pop();
    }

    let mut real_distance = 0;
    for i in 0..meta.len() {
        let MetaOpcode::Label(label) = meta[i] else {
            real_distance += 1;
            continue;
        };

        let address = PROGRAM_START + real_distance * INSTRUCTION_SIZE;
        if address > MAX_ADDRESS {
            return Err(Error::AddressOutOfRange { label, address });
        }

        let search = match label.kind {
            LabelKind::If => &mut meta[..i],
            LabelKind::For => &mut meta[..],
        };
        match search
            .iter_mut()
            .find(|op| matches!(op, MetaOpcode::Jump(target) if *target == label))
        {
            Some(jump) => {
                *jump = MetaOpcode::Word(0x1000 | address as u16);
                log::debug!("label {} resolved to {:#05X}", label, address);
            }
            None => log::warn!("label {} is never jumped to", label),
        }
    }

    meta.retain(|op| !op.is_marker());

    if let Some((position, label)) = meta.iter().enumerate().find_map(|(i, op)| match op {
        MetaOpcode::Jump(label) => Some((i, *label)),
        _ => None,
    }) {
        return Err(Error::DanglingLabel { position, label });
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::render;

    fn if_label(id: u32) -> Label {
        Label {
            kind: LabelKind::If,
            id,
        }
    }

    fn for_label(id: u32) -> Label {
        Label {
            kind: LabelKind::For,
            id,
        }
    }

    #[test]
    fn forward_jump_past_an_if_body() {
        let l = if_label(1);
        let meta = vec![
            MetaOpcode::Word(0x6006),
            MetaOpcode::Word(0x3001),
            MetaOpcode::Jump(l),
            MetaOpcode::Word(0x700B),
            MetaOpcode::Label(l),
            MetaOpcode::End,
        ];
        assert_eq!(render(&resolve(meta).unwrap()), "6006\n3001\n1208\n700B\n");
    }

    #[test]
    fn backward_jump_to_a_loop_top() {
        let l = for_label(500);
        let meta = vec![
            MetaOpcode::Word(0x6000),
            MetaOpcode::Word(0x6104),
            MetaOpcode::Word(0x620A),
            MetaOpcode::Word(0x6302),
            MetaOpcode::Label(l),
            MetaOpcode::Word(0x7001),
            MetaOpcode::Word(0x8134),
            MetaOpcode::Word(0x5120),
            MetaOpcode::Jump(l),
            MetaOpcode::End,
        ];
        assert_eq!(
            render(&resolve(meta).unwrap()),
            "6000\n6104\n620A\n6302\n7001\n8134\n5120\n1208\n"
        );
    }

    #[test]
    fn markers_take_no_space() {
        let (outer, inner) = (if_label(1), if_label(2));
        let meta = vec![
            MetaOpcode::Jump(outer),
            MetaOpcode::Jump(inner),
            MetaOpcode::Word(0x00E0),
            MetaOpcode::Label(inner),
            MetaOpcode::Label(outer),
            MetaOpcode::Word(0x00E0),
        ];
        assert_eq!(
            render(&resolve(meta).unwrap()),
            "1206\n1206\n00E0\n00E0\n"
        );
    }

    #[test]
    fn if_labels_ignore_later_jumps() {
        let l = if_label(1);
        let meta = vec![MetaOpcode::Label(l), MetaOpcode::Jump(l)];
        assert!(matches!(
            resolve(meta),
            Err(Error::DanglingLabel { position: 0, .. })
        ));
    }

    #[test]
    fn dangling_jump() {
        let meta = vec![MetaOpcode::Word(0x00E0), MetaOpcode::Jump(if_label(7))];
        let err = resolve(meta).unwrap_err();
        assert_eq!(
            err.to_string(),
            "At instruction 1, jump to label 7 has no definition"
        );
    }

    #[test]
    fn only_a_trailing_end_is_dropped() {
        let meta = vec![MetaOpcode::End, MetaOpcode::Word(0x00E0), MetaOpcode::End];
        assert_eq!(
            resolve(meta).unwrap(),
            vec![MetaOpcode::End, MetaOpcode::Word(0x00E0)]
        );
    }

    #[test]
    fn empty_program() {
        assert_eq!(resolve(vec![MetaOpcode::End]).unwrap(), vec![]);
    }

    #[test]
    fn address_out_of_range() {
        let l = if_label(1);
        let mut meta = vec![MetaOpcode::Jump(l)];
        meta.extend(std::iter::repeat(MetaOpcode::Word(0x00E0)).take(2047));
        meta.push(MetaOpcode::Label(l));
        assert!(matches!(
            resolve(meta),
            Err(Error::AddressOutOfRange {
                address: 0x1200,
                ..
            })
        ));
    }
}
