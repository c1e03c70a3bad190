//! Pebble engine CLI
//!
//! Command-line interface for the Pebble scripting engine.

use clap::{Parser, Subcommand};
use pebble_common::{Config, FileId};
use pebble_common_core::instruction::Instruction;
use pebble_heap::{GcThresholds, Heap};
use pebble_syntax::{Lexer, TokenKind};
use pebble_vm::{Scheduler, SystemInterface, Vm};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

/// Config file consulted by `run` for heap size, GC thresholds, and the
/// event poll rate (spec §1 "Configuration"). Absent file -> defaults.
const CONFIG_FILE: &str = "pebble.toml";

#[derive(Parser)]
#[command(name = "pebble")]
#[command(author = "Pebble Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pebble embedded scripting engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a Pebble source file
    Run {
        /// Input source file (.pbl)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Display the token stream for a Pebble source file
    Tokens {
        /// Input source file (.pbl)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Also print each token's source span
        #[arg(short, long)]
        pretty: bool,
    },

    /// Compile a Pebble source file and print its bytecode
    Disasm {
        /// Input source file (.pbl)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Compile a Pebble source file and report errors, without running it
    Check {
        /// Input source file (.pbl)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file } => cmd_run(&file),
        Commands::Tokens { file, pretty } => cmd_tokens(&file, pretty),
        Commands::Disasm { file } => cmd_disasm(&file),
        Commands::Check { file } => cmd_check(&file),
        Commands::Version => println!("pebble {}", env!("CARGO_PKG_VERSION")),
    }
}

fn read_source(file: &PathBuf) -> String {
    fs::read_to_string(file).unwrap_or_else(|e| {
        eprintln!("error: could not read '{}': {}", file.display(), e);
        process::exit(1);
    })
}

fn cmd_tokens(file: &PathBuf, pretty: bool) {
    let source = read_source(file);
    println!("=== Tokens for {} ===\n", file.display());
    let mut lexer = Lexer::new(&source);
    let mut i = 0;
    loop {
        let tok = lexer.next_token();
        let done = tok.kind == TokenKind::Eof;
        if pretty {
            println!("{:4}: {:?} @ line {}", i, tok.kind, tok.span.line);
        } else {
            println!("{:?}", tok.kind);
        }
        i += 1;
        if done {
            break;
        }
    }
}

fn cmd_check(file: &PathBuf) {
    let source = read_source(file);
    match pebble_codegen::compile(&source, FileId::DUMMY) {
        Ok(program) => {
            println!(
                "\u{2713} {} compiled successfully ({} bytes of code, {} constants)",
                file.display(),
                program.root.code.len(),
                program.root.constants.len()
            );
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn cmd_disasm(file: &PathBuf) {
    let source = read_source(file);
    match pebble_codegen::compile(&source, FileId::DUMMY) {
        Ok(program) => {
            println!("=== Disassembly for {} ===\n", file.display());
            disasm_function("<root>", &program.root, 0);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn disasm_function(name: &str, func: &pebble_codegen::CompiledFunction, depth: usize) {
    let pad = "  ".repeat(depth);
    println!(
        "{}function {} (nparams={}, nlocals={}, max_registers={})",
        pad, name, func.nparams, func.nlocals, func.max_registers
    );
    for (pc, instr) in func.code.iter().enumerate() {
        let line = func.lines.get(pc).copied().unwrap_or(0);
        println!("{}  {:4}: {}  ; line {}", pad, pc, disasm_instr(*instr), line);
    }
    for (i, constant) in func.constants.iter().enumerate() {
        if let pebble_codegen::ConstantValue::Function(nested) = constant {
            disasm_function(&format!("<const {i}>"), nested, depth + 1);
        }
    }
    println!();
}

/// Renders one packed instruction using whichever field layout its opcode
/// uses (spec §4.6: `RRR`/`RN`/`CALL` share the same 32 bits).
fn disasm_instr(instr: Instruction) -> String {
    use pebble_common_core::instruction::Opcode::*;
    let op = instr.opcode();
    match op {
        Call | CallProp | New => format!(
            "{:?} rcall={} rthis={} nparams={}",
            op,
            instr.rcall(),
            instr.rthis(),
            instr.nparams()
        ),
        Jmp | Jf | Jt => format!("{:?} n={} imm={}", op, instr.n(), instr.imm17_signed()),
        Push | Pop | Ret | LoadLitA | LoadLitO | LoadUp | StoreUp | Closure => {
            format!("{:?} n={} imm={}", op, instr.n(), instr.imm17_unsigned())
        }
        _ => format!("{:?} a={} b={} c={}", op, instr.a(), instr.b(), instr.c()),
    }
}

/// A real stdout/clock-backed [`SystemInterface`] for the `run` subcommand.
struct HostSystem {
    started: Instant,
    device_name: String,
}

impl HostSystem {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            device_name: String::new(),
        }
    }
}

impl SystemInterface for HostSystem {
    fn printf(&mut self, s: &str) {
        print!("{s}");
    }

    fn current_microseconds(&self) -> u64 {
        self.started.elapsed().as_micros() as u64
    }

    fn set_device_name(&mut self, name: &str) {
        self.device_name = name.to_string();
    }
}

fn cmd_run(file: &PathBuf) {
    let source = read_source(file);
    let compiled = match pebble_codegen::compile(&source, FileId::DUMMY) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let config = Config::load_or_default(Path::new(CONFIG_FILE)).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(1);
    });

    let thresholds = GcThresholds {
        objects: config.gc_object_threshold,
        string_bytes: config.gc_string_byte_threshold,
    };
    let mut heap = Heap::with_thresholds(config.heap_bytes, thresholds);
    let program = pebble_vm::load_program(compiled, &mut heap);
    let mut vm = Vm::new(heap, program, HostSystem::new());
    if let Err(e) = pebble_stdlib::register(&mut vm) {
        eprintln!("error: failed to register natives: {e}");
        process::exit(1);
    }

    // A single script on an otherwise-empty scheduler: real time-keyed
    // delays, rather than busy-looping on every `MsDelay` yield.
    let mut scheduler: Scheduler<Vm<HostSystem>> = Scheduler::with_poll_rate_ms(config.event_poll_rate_ms);
    let start = Instant::now();
    let now_ms = || start.elapsed().as_millis() as u64;
    scheduler.yield_task(vm, now_ms(), 0);

    while !scheduler.is_empty() {
        match scheduler.execute_next(now_ms()) {
            Some(pebble_vm::TaskOutcome::Terminated) => break,
            Some(_) => {}
            None => std::thread::sleep(std::time::Duration::from_millis(1)),
        }
    }
}
