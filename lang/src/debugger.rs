use std::collections::VecDeque;

use itertools::Itertools;
use ratatui::{
    crossterm::event,
    layout::{Constraint, Layout},
    style::{Style, Stylize},
    text::{Line, Text},
    widgets::{Block, Paragraph, Row, Table, TableState},
    DefaultTerminal,
};

use crate::{
    disasm,
    linker::{INSTRUCTION_SIZE, PROGRAM_START},
    vm::{EvalError, StepResult, Vm, VmState, DISPLAY_HEIGHT, DISPLAY_WIDTH},
};

const HISTORY_WINDOW: usize = 500;
// `r` gives up after this many cycles so a loop that never ends can't hang
// the UI.
const RUN_LIMIT: usize = 100_000;

pub struct Debugger {
    words: Vec<u16>,
    vm: Vm,
    history: VecDeque<VmState>,

    listing_state: TableState,
    error: Option<EvalError>,
    halted: bool,
}

impl Debugger {
    pub fn new(words: Vec<u16>, vm: Vm) -> Self {
        let mut res = Self {
            words,
            vm,
            history: VecDeque::new(),
            listing_state: TableState::default(),
            error: None,
            halted: false,
        };
        res.update_listing();
        res
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn step(&mut self) {
        if self.error.is_some() || self.halted {
            return;
        }

        let before = self.vm.save_state();
        match self.vm.step() {
            Ok(StepResult::Continue) => {
                if HISTORY_WINDOW <= self.history.len() {
                    self.history.pop_front();
                }
                self.history.push_back(before);
            }
            Ok(StepResult::Halted) => self.halted = true,
            Err(err) => self.error = Some(err),
        }
        self.update_listing();
    }

    pub fn step_back(&mut self) {
        let Some(state) = self.history.pop_back() else {
            return;
        };
        self.vm.restore_state(state);
        self.error = None;
        self.halted = false;
        self.update_listing();
    }

    pub fn run_to_halt(&mut self) {
        for _ in 0..RUN_LIMIT {
            if self.error.is_some() || self.halted {
                return;
            }
            self.step();
        }
    }

    // Row of the listing the program counter points at, if it is inside the
    // program.
    fn current_row(&self) -> Option<usize> {
        let pc = self.vm.pc as usize;
        let row = pc.checked_sub(PROGRAM_START)? / INSTRUCTION_SIZE;
        (row < self.words.len()).then_some(row)
    }

    fn update_listing(&mut self) {
        self.listing_state.select(self.current_row());
    }

    fn listing(&self) -> Table<'static> {
        let rows = self.words.iter().enumerate().map(|(i, word)| {
            Row::new([
                format!("{:#05X}", PROGRAM_START + i * INSTRUCTION_SIZE),
                format!("{:04X}", word),
                disasm::describe(*word).to_string(),
            ])
        });
        Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Length(5),
                Constraint::Fill(1),
            ],
        )
        .block(Block::bordered().title("program"))
        .highlight_style(Style::new().black().on_green())
    }

    fn registers(&self) -> Table<'static> {
        let vm = &self.vm;
        let mut rows: Vec<Row> = vm
            .v
            .chunks(4)
            .enumerate()
            .map(|(c, regs)| {
                Row::new(
                    regs.iter()
                        .enumerate()
                        .map(|(k, value)| format!("V{:X} = {:#04X}", c * 4 + k, value))
                        .collect_vec(),
                )
            })
            .collect();
        rows.push(Row::new([
            format!("I  = {:#05X}", vm.i),
            format!("PC = {:#05X}", vm.pc),
            format!("SP = {}", vm.stack.len()),
            format!("cycles = {}", vm.cycles),
        ]));
        rows.push(Row::new([
            format!("DT = {}", vm.delay_timer),
            format!("ST = {}", vm.sound_timer),
            String::new(),
            String::new(),
        ]));
        Table::new(rows, [Constraint::Fill(1); 4]).block(Block::bordered().title("registers"))
    }

    fn screen(&self) -> Paragraph<'static> {
        let lines: Vec<Line> = (0..DISPLAY_HEIGHT)
            .map(|y| {
                (0..DISPLAY_WIDTH)
                    .map(|x| if self.vm.pixel(x, y) { '█' } else { ' ' })
                    .collect::<String>()
                    .into()
            })
            .collect();
        Paragraph::new(Text::from(lines)).block(Block::bordered().title("display"))
    }

    fn status_text(&self) -> Text<'static> {
        if let Some(err) = &self.error {
            return Text::raw(err.to_string()).red().on_dark_gray();
        }
        if self.halted {
            return Text::raw("halted").yellow();
        }
        match self.vm.current_instruction() {
            Some(instruction) => Text::raw(instruction.to_string()),
            None => Text::default(),
        }
    }

    fn render(&mut self, frame: &mut ratatui::Frame) {
        let layout = Layout::horizontal(Constraint::from_percentages([50, 50])).split(frame.area());
        let right = Layout::vertical([
            Constraint::Length(8),
            Constraint::Length(DISPLAY_HEIGHT as u16 + 2),
            Constraint::Min(1),
        ])
        .split(layout[1]);

        frame.render_stateful_widget(self.listing(), layout[0], &mut self.listing_state);
        frame.render_widget(self.registers(), right[0]);
        frame.render_widget(self.screen(), right[1]);
        frame.render_widget(self.status_text(), right[2]);
    }
}

pub fn run(mut terminal: DefaultTerminal, mut debugger: Debugger) -> std::io::Result<()> {
    loop {
        terminal.draw(|frame| debugger.render(frame))?;

        let event::Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != event::KeyEventKind::Press {
            continue;
        }
        match key.code {
            event::KeyCode::Char('q') => return Ok(()),
            event::KeyCode::Char('r') => debugger.run_to_halt(),
            event::KeyCode::Left => debugger.step_back(),
            event::KeyCode::Right => debugger.step(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::rom_bytes;

    fn debugger(words: &[u16]) -> Debugger {
        let vm = Vm::load(&rom_bytes(words)).unwrap().with_seed(1);
        Debugger::new(words.to_vec(), vm)
    }

    #[test]
    fn step_and_step_back() {
        let mut d = debugger(&[0x6005, 0x7001]);
        assert_eq!(d.listing_state.selected(), Some(0));

        d.step();
        d.step();
        assert_eq!(d.vm().v[0], 6);
        assert_eq!(d.listing_state.selected(), None);

        d.step_back();
        assert_eq!(d.vm().v[0], 5);
        assert_eq!(d.listing_state.selected(), Some(1));
    }

    #[test]
    fn step_back_past_the_start_does_nothing() {
        let mut d = debugger(&[0x6005]);
        d.step_back();
        assert_eq!(d.vm().pc, 0x200);
    }

    #[test]
    fn run_stops_at_halt() {
        let mut d = debugger(&[0x6005, 0x7001]);
        d.run_to_halt();
        assert!(d.is_halted());
        assert_eq!(d.vm().v[0], 6);

        d.step_back();
        assert!(!d.is_halted());
    }

    #[test]
    fn errors_stop_stepping() {
        let mut d = debugger(&[0x00EE, 0x6005]);
        d.step();
        assert!(d.error.is_some());
        d.step();
        assert_eq!(d.vm().pc, 0x200);
    }

    #[test]
    fn history_is_bounded() {
        let mut d = debugger(&[0x1200]);
        for _ in 0..HISTORY_WINDOW + 10 {
            d.step();
        }
        assert_eq!(d.history.len(), HISTORY_WINDOW);
    }
}
