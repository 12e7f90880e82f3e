use std::{
    path::{Path, PathBuf},
    process::exit,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use itertools::Itertools;

use c8s::{
    bytecode, compiler, debugger, disasm, meta,
    source::Loader,
    vm::{StepResult, Vm},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Log every stage of the pipeline.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a script to a CHIP-8 ROM.
    Build {
        file: PathBuf,
        /// Where to write the ROM. Defaults to the script path with a `ch8`
        /// extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print tokens, tree, meta-opcodes and the final listing.
        #[arg(long)]
        steps: bool,
        /// Print nothing but errors.
        #[arg(long)]
        silent: bool,
    },
    /// Compile a script and run it headless.
    Run {
        file: PathBuf,
        #[arg(long, default_value_t = 10_000)]
        cycles: usize,
    },
    /// Compile a script and step through it.
    Debug { file: PathBuf },
    /// List the instructions in a ROM.
    Disasm { rom: PathBuf },
}

fn compile_file(file: &Path, silent: bool) -> anyhow::Result<compiler::Artifacts> {
    let source = Loader::default().load(file)?;
    let options = compiler::CompileOptions { print_errors: true };
    match compiler::compile_with(&source.text, options) {
        Ok(artifacts) => {
            if !silent {
                eprint!("{}", artifacts.diagnostics);
            }
            Ok(artifacts)
        }
        Err(e) => {
            eprintln!("{} failed at the {} stage", file.display(), e.stage);
            exit(1);
        }
    }
}

fn build(file: PathBuf, output: Option<PathBuf>, steps: bool, silent: bool) -> anyhow::Result<()> {
    let artifacts = compile_file(&file, silent)?;

    if steps && !silent {
        println!("--[ tokens ]");
        for token in &artifacts.tokens {
            println!("{:>4}  {:<16} {}", token.line, token.kind.to_string(), token.text);
        }
        println!("\n--[ tree ]");
        print!("{}", artifacts.ast.dump());
        println!("\n--[ meta-opcodes ]");
        print!("{}", meta::render(&artifacts.meta));
        println!("\n--[ relocated ]");
        print!("{}", meta::render(&artifacts.relocated));
        println!("\n--[ listing ]");
        print!("{}", disasm::listing(&artifacts.words));
    }

    let output = output.unwrap_or_else(|| file.with_extension("ch8"));
    bytecode::write_rom(&output, &artifacts.words)
        .with_context(|| format!("writing {}", output.display()))?;
    if !silent {
        println!(
            "Wrote {} instructions to {}",
            artifacts.words.len(),
            output.display()
        );
    }
    Ok(())
}

fn run(file: PathBuf, cycles: usize) -> anyhow::Result<()> {
    let artifacts = compile_file(&file, false)?;
    let mut vm = Vm::load(&bytecode::rom_bytes(&artifacts.words))?;

    match vm.run(cycles)? {
        StepResult::Halted => println!("Halted after {} cycles", vm.cycles),
        StepResult::Continue => println!("Stopped after {} cycles", vm.cycles),
    }
    for regs in &vm.v.iter().enumerate().chunks(4) {
        println!(
            "{}",
            regs.map(|(r, value)| format!("V{:X} = {:#04X}", r, value))
                .join("  ")
        );
    }
    println!("I  = {:#05X}  PC = {:#05X}", vm.i, vm.pc);
    Ok(())
}

fn debug(file: PathBuf) -> anyhow::Result<()> {
    let artifacts = compile_file(&file, true)?;
    let vm = Vm::load(&bytecode::rom_bytes(&artifacts.words))?;
    let debugger = debugger::Debugger::new(artifacts.words, vm);

    let mut terminal = ratatui::init();
    terminal.clear()?;
    let app_result = debugger::run(terminal, debugger);
    ratatui::restore();
    app_result?;
    Ok(())
}

fn disassemble(rom: PathBuf) -> anyhow::Result<()> {
    let bytes = Loader::default().load_rom(&rom)?;
    print!("{}", disasm::listing(&bytecode::rom_words(&bytes)));
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match args.command {
        Commands::Build {
            file,
            output,
            steps,
            silent,
        } => build(file, output, steps, silent),
        Commands::Run { file, cycles } => run(file, cycles),
        Commands::Debug { file } => debug(file),
        Commands::Disasm { rom } => disassemble(rom),
    }
}
