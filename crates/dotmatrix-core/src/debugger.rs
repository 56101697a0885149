//! Breakpoints, the step counter and the interactive debug console.
//!
//! The console blocks on its input source by design: the whole emulator is
//! single-threaded and debugging is only active when the user asked for it.
//! Input normally comes from stdin, but any `BufRead` can be injected with
//! [`Debugger::set_console_input`] (command scripts, tests); EOF and empty
//! lines resume execution.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use crate::cpu::Cpu;
use crate::decoder;
use crate::mmu::Mmu;

// Software debug handler entry, by the `rst $08` convention.
const DEBUG_VECTOR: u16 = 0x0008;

pub type ActionId = usize;
pub type ActionFn = fn(&mut Cpu, &mut Mmu, u8);

/// What happens when a breakpoint is hit, besides adopting its step period
/// and verbose flag. Custom actions are registry indices rather than
/// closures so the breakpoint table stays plain copyable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakAction {
    None,
    /// Print the break banner and drop into the console.
    Print,
    Custom(ActionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    /// Step period adopted when the breakpoint is hit; 1 single-steps.
    pub break_on_steps: u32,
    pub verbose_instr: bool,
    pub action: BreakAction,
}

impl Breakpoint {
    /// The default pausepoint the console's `b` command installs: open the
    /// console on hit, leave periodic stepping disarmed.
    pub fn pause() -> Self {
        Self {
            break_on_steps: 0,
            verbose_instr: false,
            action: BreakAction::Print,
        }
    }
}

pub struct Debugger {
    breakpoints: HashMap<u16, Breakpoint>,
    actions: Vec<ActionFn>,
    step_period: u32,
    steps_remaining: u32,
    break_now: bool,
    /// Log each executed instruction (and flag changes) to stdout.
    pub verbose: bool,
    /// Number of console entries so far.
    pub breaks_taken: u64,
    console_input: Option<Box<dyn BufRead + Send>>,
}

impl Debugger {
    pub fn new() -> Self {
        Self {
            breakpoints: HashMap::new(),
            actions: Vec::new(),
            step_period: 0,
            steps_remaining: 0,
            break_now: false,
            verbose: false,
            breaks_taken: 0,
            console_input: None,
        }
    }

    pub fn set_breakpoint(&mut self, pc: u16, bp: Breakpoint) {
        core_debug!(target: "debugger", "breakpoint installed at 0x{pc:04x}");
        self.breakpoints.insert(pc, bp);
    }

    pub fn remove_breakpoint(&mut self, pc: u16) {
        self.breakpoints.remove(&pc);
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub fn breakpoint_at(&self, pc: u16) -> Option<Breakpoint> {
        self.breakpoints.get(&pc).copied()
    }

    pub fn breakpoints(&self) -> &HashMap<u16, Breakpoint> {
        &self.breakpoints
    }

    /// Register a custom break action; the returned id goes into
    /// [`BreakAction::Custom`].
    pub fn register_action(&mut self, action: ActionFn) -> ActionId {
        self.actions.push(action);
        self.actions.len() - 1
    }

    pub fn custom_action(&self, id: ActionId) -> Option<ActionFn> {
        self.actions.get(id).copied()
    }

    /// Arm a one-shot break before the next instruction.
    pub fn request_break(&mut self) {
        self.break_now = true;
    }

    /// Set the periodic step counter; 0 disables, 1 breaks on every
    /// instruction.
    pub fn break_on_steps(&mut self, steps: u32) {
        self.step_period = steps;
        self.steps_remaining = steps;
    }

    pub fn step_period(&self) -> u32 {
        self.step_period
    }

    pub fn stepping(&self) -> bool {
        self.break_now || self.step_period != 0
    }

    /// Break arming policy, consulted at the start of every step. Consumes
    /// the one-shot flag; otherwise counts the period down and refills it.
    pub fn break_time(&mut self) -> bool {
        if self.break_now {
            self.break_now = false;
            return true;
        }
        if self.step_period != 0 {
            self.steps_remaining = self.steps_remaining.saturating_sub(1);
            if self.steps_remaining == 0 {
                self.steps_remaining = self.step_period;
                return true;
            }
        }
        false
    }

    /// Feed console commands from a script or test fixture instead of stdin.
    pub fn set_console_input(&mut self, input: Box<dyn BufRead + Send>) {
        self.console_input = Some(input);
    }

    fn take_console_input(&mut self) -> Option<Box<dyn BufRead + Send>> {
        self.console_input.take()
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

/// Break banner plus console. Speculative (HL)/(SP) reads go through the
/// fallible bus accessors so a bad pointer prints a notice instead of
/// propagating.
pub fn print_and_pause(cpu: &mut Cpu, mmu: &mut Mmu, opcode: u8) {
    cpu.debug.breaks_taken += 1;

    let disasm = (decoder::decode_instruction(opcode).printer)(cpu, mmu, opcode);
    println!();
    println!(
        ">>> break at [pc 0x{:04x}] opcode 0x{:02x}: {}",
        cpu.regs.pc, opcode, disasm
    );
    println!("{}", cpu.debug_state());
    println!(
        "    IF = 0x{:02x}  IE = 0x{:02x}  IME {}",
        mmu.if_reg,
        mmu.ie_reg,
        u8::from(cpu.ime)
    );
    match (mmu.try_read8(cpu.regs.hl()), mmu.try_read16(cpu.regs.sp)) {
        (Ok(hl), Ok(sp)) => println!("    (HL) = 0x{hl:02x}  (SP) = 0x{sp:04x}"),
        _ => println!("    unable to read from (HL) or (SP)"),
    }

    if let Some(mut input) = cpu.debug.take_console_input() {
        run_console(cpu, mmu, &mut *input);
        cpu.debug.set_console_input(input);
    } else {
        let stdin = io::stdin();
        let mut lock = stdin.lock();
        run_console(cpu, mmu, &mut lock);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleAction {
    Resume,
    Stay,
}

struct Command {
    names: &'static [&'static str],
    usage: &'static str,
    help: &'static str,
    run: fn(&mut Cpu, &mut Mmu, &[&str]) -> ConsoleAction,
}

static COMMANDS: &[Command] = &[
    Command {
        names: &["?", "help"],
        usage: "?, help",
        help: "show this informational text",
        run: cmd_help,
    },
    Command {
        names: &["c", "continue"],
        usage: "c, continue",
        help: "continue execution, disable stepping",
        run: cmd_continue,
    },
    Command {
        names: &["s", "step"],
        usage: "s, step [steps=1]",
        help: "run [steps] instructions, then break",
        run: cmd_step,
    },
    Command {
        names: &["v", "verbose"],
        usage: "v, verbose",
        help: "toggle verbose instruction execution",
        run: cmd_verbose,
    },
    Command {
        names: &["b", "break"],
        usage: "b, break [addr]",
        help: "breakpoint on executing [addr]",
        run: cmd_break,
    },
    Command {
        names: &["clear"],
        usage: "clear",
        help: "clear all breakpoints",
        run: cmd_clear,
    },
    Command {
        names: &["r", "run"],
        usage: "r, run",
        help: "disable verbose and stepping, resume",
        run: cmd_run,
    },
    Command {
        names: &["q", "quit", "exit"],
        usage: "q, quit, exit",
        help: "stop the machine",
        run: cmd_quit,
    },
    Command {
        names: &["reset"],
        usage: "reset",
        help: "reset the machine",
        run: cmd_reset,
    },
    Command {
        names: &["ld", "read"],
        usage: "read [addr] (len=1)",
        help: "read (len) bytes from [addr] and print",
        run: cmd_read,
    },
    Command {
        names: &["write"],
        usage: "write [addr] [value]",
        help: "write [value] to memory location [addr]",
        run: cmd_write,
    },
    Command {
        names: &["vblank"],
        usage: "vblank",
        help: "render current screen and call vblank",
        run: cmd_vblank,
    },
    Command {
        names: &["debug"],
        usage: "debug",
        help: "trigger the debug interrupt handler",
        run: cmd_debug,
    },
];

/// Command loop. Returns when a command resumes execution; EOF and blank
/// lines resume as well.
pub fn run_console<R: BufRead + ?Sized>(cpu: &mut Cpu, mmu: &mut Mmu, input: &mut R) {
    loop {
        print!("dbg> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return;
        }
        if dispatch(cpu, mmu, &words) == ConsoleAction::Resume {
            return;
        }
    }
}

fn dispatch(cpu: &mut Cpu, mmu: &mut Mmu, words: &[&str]) -> ConsoleAction {
    for entry in COMMANDS {
        if entry.names.contains(&words[0]) {
            return (entry.run)(cpu, mmu, &words[1..]);
        }
    }
    println!(">>> unknown command '{}'", words[0]);
    print_help();
    ConsoleAction::Stay
}

fn print_help() {
    println!("usage: command [options]");
    for entry in COMMANDS {
        println!("  {:22}{}", entry.usage, entry.help);
    }
}

fn parse_hex(word: &str) -> Option<u16> {
    let digits = word
        .strip_prefix("0x")
        .or_else(|| word.strip_prefix("0X"))
        .unwrap_or(word);
    u32::from_str_radix(digits, 16)
        .ok()
        .map(|v| (v & 0xFFFF) as u16)
}

fn cmd_help(_cpu: &mut Cpu, _mmu: &mut Mmu, _args: &[&str]) -> ConsoleAction {
    print_help();
    ConsoleAction::Stay
}

fn cmd_continue(cpu: &mut Cpu, _mmu: &mut Mmu, _args: &[&str]) -> ConsoleAction {
    cpu.debug.break_on_steps(0);
    ConsoleAction::Resume
}

fn cmd_step(cpu: &mut Cpu, _mmu: &mut Mmu, args: &[&str]) -> ConsoleAction {
    let steps = args
        .first()
        .and_then(|word| word.parse::<u32>().ok())
        .unwrap_or(1);
    cpu.debug.verbose = true;
    cpu.debug.break_on_steps(steps);
    println!("breaking every {steps} instruction(s)");
    ConsoleAction::Resume
}

fn cmd_verbose(cpu: &mut Cpu, _mmu: &mut Mmu, _args: &[&str]) -> ConsoleAction {
    cpu.debug.verbose = !cpu.debug.verbose;
    println!(
        "verbose instructions are {}",
        if cpu.debug.verbose { "ON" } else { "OFF" }
    );
    ConsoleAction::Stay
}

fn cmd_break(cpu: &mut Cpu, _mmu: &mut Mmu, args: &[&str]) -> ConsoleAction {
    let Some(addr) = args.first().and_then(|word| parse_hex(word)) else {
        println!(">>> not enough parameters: break [addr]");
        return ConsoleAction::Stay;
    };
    cpu.debug.set_breakpoint(addr, Breakpoint::pause());
    println!("breakpoint installed at 0x{addr:04x}");
    ConsoleAction::Stay
}

fn cmd_clear(cpu: &mut Cpu, _mmu: &mut Mmu, _args: &[&str]) -> ConsoleAction {
    cpu.debug.clear_breakpoints();
    println!("breakpoints cleared");
    ConsoleAction::Stay
}

fn cmd_run(cpu: &mut Cpu, _mmu: &mut Mmu, _args: &[&str]) -> ConsoleAction {
    cpu.debug.verbose = false;
    cpu.debug.break_on_steps(0);
    ConsoleAction::Resume
}

fn cmd_quit(cpu: &mut Cpu, _mmu: &mut Mmu, _args: &[&str]) -> ConsoleAction {
    cpu.stop();
    ConsoleAction::Resume
}

fn cmd_reset(cpu: &mut Cpu, mmu: &mut Mmu, _args: &[&str]) -> ConsoleAction {
    mmu.reset();
    cpu.reset(mmu.boot_mapped());
    cpu.debug.request_break();
    println!("machine reset");
    ConsoleAction::Resume
}

fn cmd_read(_cpu: &mut Cpu, mmu: &mut Mmu, args: &[&str]) -> ConsoleAction {
    let Some(addr) = args.first().and_then(|word| parse_hex(word)) else {
        println!(">>> not enough parameters: read [addr] (len=1)");
        return ConsoleAction::Stay;
    };
    let len = args
        .get(1)
        .and_then(|word| word.parse::<u16>().ok())
        .unwrap_or(1);
    let mut col = 0;
    for i in 0..len {
        let at = addr.wrapping_add(i);
        match mmu.try_read8(at) {
            Ok(val) => {
                if col == 0 {
                    print!("0x{at:04x}:");
                }
                print!(" 0x{val:02x}");
                col += 1;
                if col == 4 {
                    println!();
                    col = 0;
                }
            }
            Err(fault) => {
                if col != 0 {
                    println!();
                    col = 0;
                }
                println!(">>> {fault}");
                break;
            }
        }
    }
    if col != 0 {
        println!();
    }
    ConsoleAction::Stay
}

fn cmd_write(_cpu: &mut Cpu, mmu: &mut Mmu, args: &[&str]) -> ConsoleAction {
    let addr = args.first().and_then(|word| parse_hex(word));
    let value = args.get(1).and_then(|word| word.parse::<u16>().ok());
    let (Some(addr), Some(value)) = (addr, value) else {
        println!(">>> not enough parameters: write [addr] [value]");
        return ConsoleAction::Stay;
    };
    let value = (value & 0xFF) as u8;
    match mmu.try_write8(addr, value) {
        Ok(()) => println!("0x{addr:04x} -> 0x{value:02x}"),
        Err(fault) => println!(">>> {fault}"),
    }
    ConsoleAction::Stay
}

fn cmd_vblank(_cpu: &mut Cpu, mmu: &mut Mmu, _args: &[&str]) -> ConsoleAction {
    mmu.render_and_vblank();
    ConsoleAction::Stay
}

fn cmd_debug(cpu: &mut Cpu, mmu: &mut Mmu, _args: &[&str]) -> ConsoleAction {
    let pushed = cpu.push_and_jump(mmu, DEBUG_VECTOR);
    cpu.incr_cycles(pushed);
    println!("entered debug handler at 0x{DEBUG_VECTOR:04x}");
    ConsoleAction::Stay
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fixture() -> (Cpu, Mmu) {
        let mut mmu = Mmu::new();
        mmu.load_rom(vec![0; 0x8000]);
        (Cpu::new(false), mmu)
    }

    #[test]
    fn break_now_is_one_shot() {
        let mut debug = Debugger::new();
        assert!(!debug.break_time());
        debug.request_break();
        assert!(debug.break_time());
        assert!(!debug.break_time());
    }

    #[test]
    fn step_period_refills_after_firing() {
        let mut debug = Debugger::new();
        debug.break_on_steps(3);
        assert!(!debug.break_time());
        assert!(!debug.break_time());
        assert!(debug.break_time());
        assert!(!debug.break_time());
        assert!(!debug.break_time());
        assert!(debug.break_time());
    }

    #[test]
    fn period_one_breaks_every_instruction() {
        let mut debug = Debugger::new();
        debug.break_on_steps(1);
        assert!(debug.break_time());
        assert!(debug.break_time());
    }

    #[test]
    fn quit_command_stops_the_machine() {
        let (mut cpu, mut mmu) = fixture();
        run_console(&mut cpu, &mut mmu, &mut Cursor::new(&b"q\n"[..]));
        assert!(!cpu.is_running());
    }

    #[test]
    fn break_command_installs_default_pausepoint() {
        let (mut cpu, mut mmu) = fixture();
        run_console(&mut cpu, &mut mmu, &mut Cursor::new(&b"b 0x0150\nc\n"[..]));
        assert_eq!(cpu.debug.breakpoint_at(0x0150), Some(Breakpoint::pause()));
        run_console(&mut cpu, &mut mmu, &mut Cursor::new(&b"clear\n\n"[..]));
        assert!(cpu.debug.breakpoints().is_empty());
    }

    #[test]
    fn step_command_arms_counter_and_verbose() {
        let (mut cpu, mut mmu) = fixture();
        run_console(&mut cpu, &mut mmu, &mut Cursor::new(&b"s 4\n"[..]));
        assert!(cpu.debug.verbose);
        assert_eq!(cpu.debug.step_period(), 4);
    }

    #[test]
    fn write_and_read_round_trip_through_the_bus() {
        let (mut cpu, mut mmu) = fixture();
        run_console(&mut cpu, &mut mmu, &mut Cursor::new(&b"write c000 171\nq\n"[..]));
        assert_eq!(mmu.read8(0xC000), 171);
    }

    #[test]
    fn write_to_rom_reports_a_fault() {
        let (mut cpu, mut mmu) = fixture();
        // Stays in the console after the fault notice, then quits.
        run_console(&mut cpu, &mut mmu, &mut Cursor::new(&b"write 0100 7\nq\n"[..]));
        assert_eq!(mmu.read8(0x0100), 0);
        assert!(!cpu.is_running());
    }

    #[test]
    fn reset_command_rearms_an_immediate_break() {
        let (mut cpu, mut mmu) = fixture();
        cpu.regs.pc = 0x1234;
        cpu.cycles_total = 999;
        run_console(&mut cpu, &mut mmu, &mut Cursor::new(&b"reset\n"[..]));
        assert_eq!(cpu.regs.pc, 0x0100);
        assert_eq!(cpu.cycles_total, 0);
        assert!(cpu.debug.break_time());
    }

    #[test]
    fn vblank_command_raises_the_interrupt() {
        let (mut cpu, mut mmu) = fixture();
        run_console(&mut cpu, &mut mmu, &mut Cursor::new(&b"vblank\nq\n"[..]));
        assert_eq!(mmu.if_reg & 0x01, 0x01);
    }

    #[test]
    fn debug_command_jumps_to_the_debug_vector() {
        let (mut cpu, mut mmu) = fixture();
        let sp = cpu.regs.sp;
        run_console(&mut cpu, &mut mmu, &mut Cursor::new(&b"debug\nq\n"[..]));
        assert_eq!(cpu.regs.pc, DEBUG_VECTOR);
        assert_eq!(cpu.regs.sp, sp.wrapping_sub(2));
    }
}
