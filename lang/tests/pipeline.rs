use c8s::{
    bytecode::rom_bytes,
    compile,
    compiler::Stage,
    disasm::{describe, listing, Instruction},
    vm::{StepResult, Vm},
};

fn run(source: &str) -> Vm {
    let words = compile(source).unwrap();
    let mut vm = Vm::load(&rom_bytes(&words)).unwrap().with_seed(0);
    assert_eq!(vm.run(10_000).unwrap(), StepResult::Halted);
    vm
}

#[test]
fn false_condition_skips_the_body() {
    let vm = run("VAR a = 6\nIF a == 1: A += 11 ENDIF");
    assert_eq!(vm.v[0], 6);
}

#[test]
fn true_condition_runs_the_body() {
    let vm = run("VAR a = 1\nIF a == 1: A += 11 ENDIF");
    assert_eq!(vm.v[0], 12);
}

#[test]
fn nested_ifs_jump_to_distinct_addresses() {
    let words = compile(
        "var a = 1\n\
         var b = 2\n\
         if a == 1:\n\
           if b == 3:\n\
             a += 10\n\
           endif\n\
           b += 1\n\
         endif",
    )
    .unwrap();
    insta::assert_snapshot!(listing(&words), @r###"
    0x200  6001  6XNN - Set V[0] = 0x01
    0x202  6102  6XNN - Set V[1] = 0x02
    0x204  3001  3XNN - Skip next instruction if V[0] = 0x01
    0x206  1210  1NNN - Jump to 0x210
    0x208  3103  3XNN - Skip next instruction if V[1] = 0x03
    0x20A  120E  1NNN - Jump to 0x20E
    0x20C  700A  7XNN - Set V[0] += 0x0A
    0x20E  7101  7XNN - Set V[1] += 0x01
    "###);

    let vm = run(
        "var a = 1\nvar b = 2\nif a == 1:\nif b == 3:\na += 10\nendif\nb += 1\nendif",
    );
    assert_eq!((vm.v[0], vm.v[1]), (1, 3));
}

#[test]
fn for_loop_layout() {
    let words = compile("var a = 0\nFOR i = 4 TO 10 STEP 2: a += 1 ENDFOR").unwrap();
    let decoded: Vec<Instruction> = words.iter().map(|w| describe(*w)).collect();
    assert_eq!(
        decoded,
        vec![
            Instruction::SetByte { x: 0, nn: 0 },
            Instruction::SetByte { x: 1, nn: 4 },
            Instruction::SetByte { x: 2, nn: 10 },
            Instruction::SetByte { x: 3, nn: 2 },
            Instruction::AddByte { x: 0, nn: 1 },
            Instruction::Add { x: 1, y: 3 },
            Instruction::SkipEqReg { x: 1, y: 2 },
            Instruction::Jump(0x208),
        ]
    );
}

#[test]
fn for_loop_runs_until_the_bound() {
    let vm = run("var a = 0\nfor i = 4 to 10 step 2:\na += 1\nendfor");
    assert_eq!(vm.v[0], 3);
    assert_eq!(vm.v[1], 10);
}

#[test]
fn loop_overshooting_its_bound_never_ends() {
    let words = compile("var a = 0\nfor i = 0 to 5 step 2:\na += 1\nendfor").unwrap();
    let mut vm = Vm::load(&rom_bytes(&words)).unwrap().with_seed(0);
    assert_eq!(vm.run(5_000).unwrap(), StepResult::Continue);
    assert_eq!(vm.cycles, 5_000);
}

#[test]
fn programs_halt_on_the_memory_after_them() {
    let words = compile("var a = 1\na += 2").unwrap();
    assert_eq!(words, vec![0x6001, 0x7002]);
    let vm = run("var a = 1\na += 2");
    assert_eq!(vm.pc as usize, 0x200 + 2 * words.len());
}

#[test]
fn nested_loops_multiply() {
    let vm = run(
        "var n = 0\n\
         for i = 0 to 3 step 1:\n\
           for j = 0 to 4 step 1:\n\
             n += 1\n\
           endfor\n\
         endfor",
    );
    assert_eq!(vm.v[0], 12);
}

#[test]
fn register_operators() {
    let vm = run(
        "var a = 12\nvar b = 10\nvar c = a\nc &= b\nvar d = a\nd |= b\nvar e = a\ne ^= b\nvar f = a\nf -= b",
    );
    assert_eq!(&vm.v[..6], &[12, 10, 8, 14, 6, 2]);
}

#[test]
fn undeclared_variable_yields_nothing() {
    let err = compile("var a = 1\nif a == 1:\nb += 1\nendif").unwrap_err();
    assert_eq!(err.stage, Stage::Semantic);
    let undeclared: Vec<&String> = err
        .diagnostics
        .read_errors()
        .iter()
        .filter(|e| e.contains("undeclared variable"))
        .collect();
    assert_eq!(undeclared.len(), 1);
    assert!(undeclared[0].contains(" b "));
}

#[test]
fn empty_program_is_empty_rom() {
    assert_eq!(compile("").unwrap(), Vec::<u16>::new());
    assert_eq!(compile("\n\n;\n").unwrap(), Vec::<u16>::new());
}

#[test]
fn compiling_twice_is_byte_identical() {
    let source = "var a = 3\nfor i = 0 to 5 step 1:\nif a != 7:\na += 1\nendif\nendfor\ncls()";
    let first = rom_bytes(&compile(source).unwrap());
    let second = rom_bytes(&compile(source).unwrap());
    assert_eq!(first, second);
}

#[test]
fn declaration_order_is_register_order() {
    let words = compile("var x = 1\nvar y = 2\nvar z = 3\nvar w = y").unwrap();
    assert_eq!(words, vec![0x6001, 0x6102, 0x6203, 0x8310]);
}

#[test]
fn raw_words_pass_through() {
    let words = compile("raw 00e0\nraw a2f0\nraw 6105").unwrap();
    assert_eq!(words, vec![0x00E0, 0xA2F0, 0x6105]);
    let vm = run("raw 6105");
    assert_eq!(vm.v[1], 5);
}
