use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use log::info;

use dotmatrix_core::debugger::Breakpoint;
use dotmatrix_core::diagnostics;
use dotmatrix_core::machine::Machine;

#[derive(Parser)]
struct Args {
    /// Path to ROM file
    rom: Option<PathBuf>,

    /// Path to boot ROM file
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Break into the debug console at this address (hex)
    #[arg(long)]
    break_at: Option<String>,

    /// Break into the debug console before the first instruction
    #[arg(long)]
    step: bool,

    /// Log each executed instruction
    #[arg(long)]
    trace: bool,

    /// Feed the debug console from a command script instead of stdin
    #[arg(long)]
    script: Option<PathBuf>,

    /// Number of CPU cycles to run before exiting
    #[arg(long)]
    cycles: Option<u64>,
}

/// Forwards core diagnostics into the `log` facade.
struct StdLogSink;

impl diagnostics::LogSink for StdLogSink {
    fn log(&self, level: diagnostics::Level, target: &'static str, args: std::fmt::Arguments) {
        let level = match level {
            diagnostics::Level::Trace => log::Level::Trace,
            diagnostics::Level::Debug => log::Level::Debug,
            diagnostics::Level::Info => log::Level::Info,
            diagnostics::Level::Warn => log::Level::Warn,
        };
        log::log!(target: target, level, "{args}");
    }
}

fn parse_hex_addr(word: &str) -> Option<u16> {
    let digits = word
        .strip_prefix("0x")
        .or_else(|| word.strip_prefix("0X"))
        .unwrap_or(word);
    u32::from_str_radix(digits, 16)
        .ok()
        .map(|v| (v & 0xFFFF) as u16)
}

fn main() {
    env_logger::init();
    let _ = diagnostics::set_sink(Box::new(StdLogSink));
    let args = Args::parse();

    let rom_path = match args.rom {
        Some(p) => p,
        None => {
            eprintln!("No ROM supplied");
            return;
        }
    };

    let rom = match std::fs::read(&rom_path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to load ROM: {e}");
            return;
        }
    };

    let mut machine = Machine::new();
    machine.load_rom(rom);

    if let Some(path) = args.bootrom {
        match std::fs::read(&path) {
            Ok(data) => machine.load_boot_rom(data),
            Err(e) => eprintln!("Failed to load boot ROM: {e}"),
        }
    }

    if let Some(path) = args.script {
        match File::open(&path) {
            Ok(file) => machine
                .cpu
                .debug
                .set_console_input(Box::new(BufReader::new(file))),
            Err(e) => eprintln!("Failed to open console script: {e}"),
        }
    }

    if let Some(word) = args.break_at {
        match parse_hex_addr(&word) {
            Some(addr) => machine.cpu.debug.set_breakpoint(addr, Breakpoint::pause()),
            None => eprintln!("Invalid breakpoint address '{word}'"),
        }
    }

    if args.step {
        machine.cpu.debug.request_break();
    }
    machine.cpu.debug.verbose = args.trace;

    info!("starting emulation at pc 0x{:04x}", machine.cpu.regs.pc);

    while machine.is_running() {
        machine.simulate();
        if let Some(max) = args.cycles {
            if machine.cpu.cycles_total >= max {
                break;
            }
        }
    }

    println!("{}", machine.cpu.debug_state());
}
