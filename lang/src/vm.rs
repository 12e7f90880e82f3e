use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    disasm::{self, Instruction},
    linker::PROGRAM_START,
};

pub const MEMORY_SIZE: usize = 0x1000;
pub const REGISTERS: usize = 16;
pub const STACK_SIZE: usize = 16;
pub const KEYS: usize = 16;
pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
const FONT_GLYPH_SIZE: u16 = 5;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("ROM of {size} bytes does not fit in memory")]
    RomTooLarge { size: usize },
    #[error("At {pc:#05X}, unknown instruction {word:04X}")]
    UnknownInstruction { pc: u16, word: u16 },
    #[error("At {pc:#05X}, call stack overflow")]
    StackOverflow { pc: u16 },
    #[error("At {pc:#05X}, return with an empty call stack")]
    StackUnderflow { pc: u16 },
    #[error("At {pc:#05X}, memory access at {address:#X} is out of range")]
    OutOfBounds { pc: u16, address: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Reached a `0000` word. The program counter stays on it.
    ///
    /// Compiled ROMs don't end in one; they halt on the zeroed memory right
    /// after the last instruction.
    Halted,
    Continue,
}

/// A snapshot of the whole machine, for stepping backwards.
#[derive(Debug, Clone)]
pub struct VmState {
    memory: Vec<u8>,
    v: [u8; REGISTERS],
    i: u16,
    pc: u16,
    stack: Vec<u16>,
    delay_timer: u8,
    sound_timer: u8,
    display: Vec<bool>,
    rng: StdRng,
    cycles: usize,
}

#[derive(Debug)]
pub struct Vm {
    pub memory: Vec<u8>,
    pub v: [u8; REGISTERS],
    pub i: u16,
    pub pc: u16,
    pub stack: Vec<u16>,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub keypad: [bool; KEYS],
    pub display: Vec<bool>,
    pub cycles: usize,
    rng: StdRng,
}

impl Vm {
    /// A fresh machine with the font at `0x000` and `rom` at `0x200`.
    pub fn load(rom: &[u8]) -> Result<Self, EvalError> {
        if rom.len() > MEMORY_SIZE - PROGRAM_START {
            return Err(EvalError::RomTooLarge { size: rom.len() });
        }
        let mut memory = vec![0; MEMORY_SIZE];
        memory[..FONT.len()].copy_from_slice(&FONT);
        memory[PROGRAM_START..PROGRAM_START + rom.len()].copy_from_slice(rom);

        Ok(Vm {
            memory,
            v: [0; REGISTERS],
            i: 0,
            pc: PROGRAM_START as u16,
            stack: Vec::with_capacity(STACK_SIZE),
            delay_timer: 0,
            sound_timer: 0,
            keypad: [false; KEYS],
            display: vec![false; DISPLAY_WIDTH * DISPLAY_HEIGHT],
            cycles: 0,
            rng: StdRng::from_entropy(),
        })
    }

    /// Makes `CXNN` deterministic.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn save_state(&self) -> VmState {
        VmState {
            memory: self.memory.clone(),
            v: self.v,
            i: self.i,
            pc: self.pc,
            stack: self.stack.clone(),
            delay_timer: self.delay_timer,
            sound_timer: self.sound_timer,
            display: self.display.clone(),
            rng: self.rng.clone(),
            cycles: self.cycles,
        }
    }

    pub fn restore_state(&mut self, state: VmState) {
        self.memory = state.memory;
        self.v = state.v;
        self.i = state.i;
        self.pc = state.pc;
        self.stack = state.stack;
        self.delay_timer = state.delay_timer;
        self.sound_timer = state.sound_timer;
        self.display = state.display;
        self.rng = state.rng;
        self.cycles = state.cycles;
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.display[y * DISPLAY_WIDTH + x]
    }

    fn read(&self, address: usize) -> Result<u8, EvalError> {
        self.memory
            .get(address)
            .copied()
            .ok_or(EvalError::OutOfBounds {
                pc: self.pc,
                address,
            })
    }

    fn write(&mut self, address: usize, value: u8) -> Result<(), EvalError> {
        let pc = self.pc;
        let cell = self
            .memory
            .get_mut(address)
            .ok_or(EvalError::OutOfBounds { pc, address })?;
        *cell = value;
        Ok(())
    }

    pub fn fetch(&self) -> Result<u16, EvalError> {
        let pc = self.pc as usize;
        Ok(u16::from_be_bytes([self.read(pc)?, self.read(pc + 1)?]))
    }

    pub fn current_instruction(&self) -> Option<Instruction> {
        self.fetch().ok().map(disasm::describe)
    }

    pub fn run(&mut self, max_cycles: usize) -> Result<StepResult, EvalError> {
        for _ in 0..max_cycles {
            if self.step()? == StepResult::Halted {
                log::debug!("halted after {} cycles", self.cycles);
                return Ok(StepResult::Halted);
            }
        }
        Ok(StepResult::Continue)
    }

    /// One fetch-decode-execute cycle. Timers tick first.
    pub fn step(&mut self) -> Result<StepResult, EvalError> {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);

        let word = self.fetch()?;
        if word == 0x0000 {
            return Ok(StepResult::Halted);
        }
        let instruction = disasm::describe(word);
        log::trace!("{:#05X}  {:04X}  {}", self.pc, word, instruction);

        let next = self.pc.wrapping_add(2);
        let skip = self.pc.wrapping_add(4);
        self.pc = self.execute(instruction, word, next, skip)?;
        self.cycles += 1;
        Ok(StepResult::Continue)
    }

    // Returns the new program counter.
    fn execute(
        &mut self,
        instruction: Instruction,
        word: u16,
        next: u16,
        skip: u16,
    ) -> Result<u16, EvalError> {
        use Instruction as I;

        let skip_if = |cond: bool| if cond { skip } else { next };
        let pc = match instruction {
            I::Cls => {
                self.display.fill(false);
                next
            }
            I::Ret => self
                .stack
                .pop()
                .ok_or(EvalError::StackUnderflow { pc: self.pc })?,
            I::Sys(_) => next,
            I::Jump(nnn) => nnn,
            I::Call(nnn) => {
                if self.stack.len() == STACK_SIZE {
                    return Err(EvalError::StackOverflow { pc: self.pc });
                }
                self.stack.push(next);
                nnn
            }
            I::SkipEqByte { x, nn } => skip_if(self.v[x as usize] == nn),
            I::SkipNeByte { x, nn } => skip_if(self.v[x as usize] != nn),
            I::SkipEqReg { x, y } => skip_if(self.v[x as usize] == self.v[y as usize]),
            I::SkipNeReg { x, y } => skip_if(self.v[x as usize] != self.v[y as usize]),
            I::SetByte { x, nn } => {
                self.v[x as usize] = nn;
                next
            }
            I::AddByte { x, nn } => {
                self.v[x as usize] = self.v[x as usize].wrapping_add(nn);
                next
            }
            I::Copy { x, y } => self.alu(x, y, next, |_, b| (b, None)),
            I::Or { x, y } => self.alu(x, y, next, |a, b| (a | b, None)),
            I::And { x, y } => self.alu(x, y, next, |a, b| (a & b, None)),
            I::Xor { x, y } => self.alu(x, y, next, |a, b| (a ^ b, None)),
            I::Add { x, y } => self.alu(x, y, next, |a, b| {
                let (sum, carry) = a.overflowing_add(b);
                (sum, Some(carry as u8))
            }),
            I::Sub { x, y } => self.alu(x, y, next, |a, b| (a.wrapping_sub(b), Some((a >= b) as u8))),
            I::SubFrom { x, y } => {
                self.alu(x, y, next, |a, b| (b.wrapping_sub(a), Some((b >= a) as u8)))
            }
            I::Shr { x, y } => self.alu(x, y, next, |a, _| (a >> 1, Some(a & 0x1))),
            I::Shl { x, y } => self.alu(x, y, next, |a, _| (a << 1, Some(a >> 7))),
            I::SetI(nnn) => {
                self.i = nnn;
                next
            }
            I::JumpV0(nnn) => nnn.wrapping_add(self.v[0] as u16),
            I::Rand { x, nn } => {
                self.v[x as usize] = self.rng.gen::<u8>() & nn;
                next
            }
            I::Draw { x, y, n } => {
                self.draw(self.v[x as usize] as usize, self.v[y as usize] as usize, n)?;
                next
            }
            I::SkipKey { x } => skip_if(self.keypad[(self.v[x as usize] & 0xF) as usize]),
            I::SkipNoKey { x } => skip_if(!self.keypad[(self.v[x as usize] & 0xF) as usize]),
            I::GetDelay { x } => {
                self.v[x as usize] = self.delay_timer;
                next
            }
            I::WaitKey { x } => match self.keypad.iter().position(|pressed| *pressed) {
                Some(key) => {
                    self.v[x as usize] = key as u8;
                    next
                }
                None => self.pc,
            },
            I::SetDelay { x } => {
                self.delay_timer = self.v[x as usize];
                next
            }
            I::SetSound { x } => {
                self.sound_timer = self.v[x as usize];
                next
            }
            I::AddI { x } => {
                self.i = self.i.wrapping_add(self.v[x as usize] as u16);
                next
            }
            I::Font { x } => {
                self.i = (self.v[x as usize] & 0xF) as u16 * FONT_GLYPH_SIZE;
                next
            }
            I::Bcd { x } => {
                let value = self.v[x as usize];
                let base = self.i as usize;
                self.write(base, value / 100)?;
                self.write(base + 1, value / 10 % 10)?;
                self.write(base + 2, value % 10)?;
                next
            }
            I::Store { x } => {
                for r in 0..=x as usize {
                    self.write(self.i as usize + r, self.v[r])?;
                }
                next
            }
            I::Load { x } => {
                for r in 0..=x as usize {
                    self.v[r] = self.read(self.i as usize + r)?;
                }
                next
            }
            I::Unknown(_) => {
                return Err(EvalError::UnknownInstruction { pc: self.pc, word });
            }
        };
        Ok(pc)
    }

    // `Vx = f(Vx, Vy)`, then VF takes the flag if there is one.
    fn alu(&mut self, x: u8, y: u8, next: u16, f: impl Fn(u8, u8) -> (u8, Option<u8>)) -> u16 {
        let (result, flag) = f(self.v[x as usize], self.v[y as usize]);
        self.v[x as usize] = result;
        if let Some(flag) = flag {
            self.v[0xF] = flag;
        }
        next
    }

    // XORs an `n`-row sprite read from I onto the display, wrapping at the
    // edges. VF is set when any lit pixel goes dark.
    fn draw(&mut self, x: usize, y: usize, n: u8) -> Result<(), EvalError> {
        self.v[0xF] = 0;
        for row in 0..n as usize {
            let bits = self.read(self.i as usize + row)?;
            for col in 0..8 {
                if bits & (0x80 >> col) == 0 {
                    continue;
                }
                let px = (x + col) % DISPLAY_WIDTH;
                let py = (y + row) % DISPLAY_HEIGHT;
                let cell = &mut self.display[py * DISPLAY_WIDTH + px];
                if *cell {
                    self.v[0xF] = 1;
                }
                *cell ^= true;
            }
        }
        Ok(())
    }
}
