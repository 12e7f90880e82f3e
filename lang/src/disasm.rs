use std::fmt;

use crate::linker::{INSTRUCTION_SIZE, PROGRAM_START};

/// A decoded CHIP-8 instruction. `x`/`y` are register numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Cls,
    Ret,
    Sys(u16),
    Jump(u16),
    Call(u16),
    SkipEqByte { x: u8, nn: u8 },
    SkipNeByte { x: u8, nn: u8 },
    SkipEqReg { x: u8, y: u8 },
    SetByte { x: u8, nn: u8 },
    AddByte { x: u8, nn: u8 },
    Copy { x: u8, y: u8 },
    Or { x: u8, y: u8 },
    And { x: u8, y: u8 },
    Xor { x: u8, y: u8 },
    Add { x: u8, y: u8 },
    Sub { x: u8, y: u8 },
    Shr { x: u8, y: u8 },
    SubFrom { x: u8, y: u8 },
    Shl { x: u8, y: u8 },
    SkipNeReg { x: u8, y: u8 },
    SetI(u16),
    JumpV0(u16),
    Rand { x: u8, nn: u8 },
    Draw { x: u8, y: u8, n: u8 },
    SkipKey { x: u8 },
    SkipNoKey { x: u8 },
    GetDelay { x: u8 },
    WaitKey { x: u8 },
    SetDelay { x: u8 },
    SetSound { x: u8 },
    AddI { x: u8 },
    Font { x: u8 },
    Bcd { x: u8 },
    Store { x: u8 },
    Load { x: u8 },
    Unknown(u16),
}

pub fn describe(word: u16) -> Instruction {
    use Instruction as I;

    let nnn = word & 0x0FFF;
    let nn = (word & 0xFF) as u8;
    let n = (word & 0xF) as u8;
    let x = ((word >> 8) & 0xF) as u8;
    let y = ((word >> 4) & 0xF) as u8;

    match (word >> 12, n) {
        (0x0, _) => match word {
            0x00E0 => I::Cls,
            0x00EE => I::Ret,
            _ => I::Sys(nnn),
        },
        (0x1, _) => I::Jump(nnn),
        (0x2, _) => I::Call(nnn),
        (0x3, _) => I::SkipEqByte { x, nn },
        (0x4, _) => I::SkipNeByte { x, nn },
        (0x5, 0x0) => I::SkipEqReg { x, y },
        (0x6, _) => I::SetByte { x, nn },
        (0x7, _) => I::AddByte { x, nn },
        (0x8, 0x0) => I::Copy { x, y },
        (0x8, 0x1) => I::Or { x, y },
        (0x8, 0x2) => I::And { x, y },
        (0x8, 0x3) => I::Xor { x, y },
        (0x8, 0x4) => I::Add { x, y },
        (0x8, 0x5) => I::Sub { x, y },
        (0x8, 0x6) => I::Shr { x, y },
        (0x8, 0x7) => I::SubFrom { x, y },
        (0x8, 0xE) => I::Shl { x, y },
        (0x9, 0x0) => I::SkipNeReg { x, y },
        (0xA, _) => I::SetI(nnn),
        (0xB, _) => I::JumpV0(nnn),
        (0xC, _) => I::Rand { x, nn },
        (0xD, _) => I::Draw { x, y, n },
        (0xE, _) => match nn {
            0x9E => I::SkipKey { x },
            0xA1 => I::SkipNoKey { x },
            _ => I::Unknown(word),
        },
        (0xF, _) => match nn {
            0x07 => I::GetDelay { x },
            0x0A => I::WaitKey { x },
            0x15 => I::SetDelay { x },
            0x18 => I::SetSound { x },
            0x1E => I::AddI { x },
            0x29 => I::Font { x },
            0x33 => I::Bcd { x },
            0x55 => I::Store { x },
            0x65 => I::Load { x },
            _ => I::Unknown(word),
        },
        _ => I::Unknown(word),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction as I;
        match *self {
            I::Cls => write!(f, "00E0 - Clear the screen"),
            I::Ret => write!(f, "00EE - Return from a subroutine"),
            I::Sys(nnn) => write!(f, "0NNN - Call machine routine at {:#05X}", nnn),
            I::Jump(nnn) => write!(f, "1NNN - Jump to {:#05X}", nnn),
            I::Call(nnn) => write!(f, "2NNN - Call subroutine at {:#05X}", nnn),
            I::SkipEqByte { x, nn } => {
                write!(f, "3XNN - Skip next instruction if V[{:X}] = {:#04X}", x, nn)
            }
            I::SkipNeByte { x, nn } => {
                write!(f, "4XNN - Skip next instruction if V[{:X}] != {:#04X}", x, nn)
            }
            I::SkipEqReg { x, y } => {
                write!(f, "5XY0 - Skip next instruction if V[{:X}] = V[{:X}]", x, y)
            }
            I::SetByte { x, nn } => write!(f, "6XNN - Set V[{:X}] = {:#04X}", x, nn),
            I::AddByte { x, nn } => write!(f, "7XNN - Set V[{:X}] += {:#04X}", x, nn),
            I::Copy { x, y } => write!(f, "8XY0 - Set V[{:X}] = V[{:X}]", x, y),
            I::Or { x, y } => write!(f, "8XY1 - Set V[{:X}] |= V[{:X}]", x, y),
            I::And { x, y } => write!(f, "8XY2 - Set V[{:X}] &= V[{:X}]", x, y),
            I::Xor { x, y } => write!(f, "8XY3 - Set V[{:X}] ^= V[{:X}]", x, y),
            I::Add { x, y } => write!(f, "8XY4 - Set V[{:X}] += V[{:X}], V[F] = carry", x, y),
            I::Sub { x, y } => {
                write!(f, "8XY5 - Set V[{:X}] -= V[{:X}], V[F] = not borrow", x, y)
            }
            I::Shr { x, .. } => write!(f, "8XY6 - Set V[{:X}] >>= 1", x),
            I::SubFrom { x, y } => write!(
                f,
                "8XY7 - Set V[{:X}] = V[{:X}] - V[{:X}], V[F] = not borrow",
                x, y, x
            ),
            I::Shl { x, .. } => write!(f, "8XYE - Set V[{:X}] <<= 1", x),
            I::SkipNeReg { x, y } => {
                write!(f, "9XY0 - Skip next instruction if V[{:X}] != V[{:X}]", x, y)
            }
            I::SetI(nnn) => write!(f, "ANNN - Set I = {:#05X}", nnn),
            I::JumpV0(nnn) => write!(f, "BNNN - Jump to {:#05X} + V[0]", nnn),
            I::Rand { x, nn } => write!(f, "CXNN - Set V[{:X}] = rand() & {:#04X}", x, nn),
            I::Draw { x, y, n } => write!(
                f,
                "DXYN - Draw {}-byte sprite from I at (V[{:X}], V[{:X}]), V[F] = collision",
                n, x, y
            ),
            I::SkipKey { x } => write!(f, "EX9E - Skip next instruction if key V[{:X}] is pressed", x),
            I::SkipNoKey { x } => {
                write!(f, "EXA1 - Skip next instruction if key V[{:X}] is not pressed", x)
            }
            I::GetDelay { x } => write!(f, "FX07 - Set V[{:X}] = delay timer", x),
            I::WaitKey { x } => write!(f, "FX0A - Wait for a key press, store it in V[{:X}]", x),
            I::SetDelay { x } => write!(f, "FX15 - Set delay timer = V[{:X}]", x),
            I::SetSound { x } => write!(f, "FX18 - Set sound timer = V[{:X}]", x),
            I::AddI { x } => write!(f, "FX1E - Set I += V[{:X}]", x),
            I::Font { x } => write!(f, "FX29 - Set I = sprite for digit V[{:X}]", x),
            I::Bcd { x } => write!(f, "FX33 - Store BCD of V[{:X}] at I, I+1, I+2", x),
            I::Store { x } => write!(f, "FX55 - Store V[0]..V[{:X}] starting at I", x),
            I::Load { x } => write!(f, "FX65 - Read V[0]..V[{:X}] starting at I", x),
            I::Unknown(word) => write!(f, "Unknown instruction {:04X}", word),
        }
    }
}

/// One line per word: address, raw word and what it does.
pub fn listing(words: &[u16]) -> String {
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            format!(
                "{:#05X}  {:04X}  {}\n",
                PROGRAM_START + i * INSTRUCTION_SIZE,
                word,
                describe(*word)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_compiled_instructions() {
        assert_eq!(describe(0x6006), Instruction::SetByte { x: 0, nn: 6 });
        assert_eq!(describe(0x8134), Instruction::Add { x: 1, y: 3 });
        assert_eq!(describe(0x5120), Instruction::SkipEqReg { x: 1, y: 2 });
        assert_eq!(describe(0x1208), Instruction::Jump(0x208));
        assert_eq!(describe(0x00E0), Instruction::Cls);
    }

    #[test]
    fn unknown_encodings() {
        assert_eq!(describe(0x5121), Instruction::Unknown(0x5121));
        assert_eq!(describe(0x8128), Instruction::Unknown(0x8128));
        assert_eq!(describe(0xE1FF), Instruction::Unknown(0xE1FF));
        assert_eq!(describe(0xF1FF), Instruction::Unknown(0xF1FF));
    }

    #[test]
    fn readable_behaviour() {
        assert_eq!(
            describe(0x3001).to_string(),
            "3XNN - Skip next instruction if V[0] = 0x01"
        );
    }

    #[test]
    fn listing_starts_at_program_start() {
        insta::assert_snapshot!(listing(&[0x6006, 0x3001, 0x1208, 0x700B]), @r###"
        0x200  6006  6XNN - Set V[0] = 0x06
        0x202  3001  3XNN - Skip next instruction if V[0] = 0x01
        0x204  1208  1NNN - Jump to 0x208
        0x206  700B  7XNN - Set V[0] += 0x0B
        "###);
    }
}
