mod common;

use std::io::Cursor;

use common::{machine_with_program, run_steps};
use dotmatrix_core::cpu::Cpu;
use dotmatrix_core::debugger::{BreakAction, Breakpoint};
use dotmatrix_core::mmu::Mmu;

fn script(text: &'static str) -> Box<Cursor<&'static [u8]>> {
    Box::new(Cursor::new(text.as_bytes()))
}

#[test]
fn armed_breakpoint_enters_the_console_exactly_once() {
    // Breakpoint at 0x0150 with a step period of 1: the console opens on
    // the step after the breakpoint instruction, then `c` disarms stepping.
    let mut m = machine_with_program(&[]);
    m.cpu.regs.pc = 0x014F;
    m.cpu.debug.set_breakpoint(
        0x0150,
        Breakpoint {
            break_on_steps: 1,
            verbose_instr: false,
            action: BreakAction::None,
        },
    );
    m.cpu.debug.set_console_input(script("c\n"));

    m.simulate(); // 0x014F: plain NOP
    assert_eq!(m.cpu.debug.breaks_taken, 0);

    m.simulate(); // 0x0150: breakpoint adopts period 1
    assert_eq!(m.cpu.debug.breaks_taken, 0);
    assert_eq!(m.cpu.debug.step_period(), 1);

    m.simulate(); // 0x0151: the armed step counter fires
    assert_eq!(m.cpu.debug.breaks_taken, 1);
    assert_eq!(m.cpu.cur_opcode, 0x00);

    run_steps(&mut m, 4);
    assert_eq!(m.cpu.debug.breaks_taken, 1, "continue disarmed stepping");
}

#[test]
fn pause_breakpoint_opens_the_console_at_its_address() {
    let mut m = machine_with_program(&[]);
    m.cpu.debug.set_breakpoint(0x0100, Breakpoint::pause());
    m.cpu.debug.set_console_input(script("r\n"));
    m.simulate();
    assert_eq!(m.cpu.debug.breaks_taken, 1);
    // `r` clears the verbose flag the breakpoint adopted and disarms
    // stepping.
    assert!(!m.cpu.debug.verbose);
    assert_eq!(m.cpu.debug.step_period(), 0);
}

#[test]
fn breakpoint_adopts_period_and_verbose_flag() {
    let mut m = machine_with_program(&[]);
    m.cpu.debug.set_breakpoint(
        0x0100,
        Breakpoint {
            break_on_steps: 16,
            verbose_instr: true,
            action: BreakAction::None,
        },
    );
    m.simulate();
    assert_eq!(m.cpu.debug.step_period(), 16);
    assert!(m.cpu.debug.verbose);
}

fn tag_bc(cpu: &mut Cpu, _mmu: &mut Mmu, _opcode: u8) {
    cpu.regs.set_bc(0xD00D);
}

#[test]
fn custom_break_action_runs_from_the_registry() {
    let mut m = machine_with_program(&[]);
    let id = m.cpu.debug.register_action(tag_bc);
    m.cpu.debug.set_breakpoint(
        0x0100,
        Breakpoint {
            break_on_steps: 0,
            verbose_instr: false,
            action: BreakAction::Custom(id),
        },
    );
    m.simulate();
    assert_eq!(m.cpu.regs.bc(), 0xD00D);
    assert_eq!(m.cpu.debug.breaks_taken, 0, "custom action is not a console");
}

#[test]
fn quit_from_the_console_stops_without_clock_side_effects() {
    let mut m = machine_with_program(&[]);
    m.cpu.debug.request_break();
    m.cpu.debug.set_console_input(script("q\n"));
    m.simulate();
    assert!(!m.cpu.is_running());
    assert_eq!(m.cpu.cycles_total, 0);
    assert_eq!(m.cpu.regs.pc, 0x0100);

    // Stopped is terminal: further steps are no-ops.
    m.simulate();
    assert_eq!(m.cpu.cycles_total, 0);
}

#[test]
fn exhausted_script_resumes_on_eof() {
    let mut m = machine_with_program(&[]);
    m.cpu.debug.break_on_steps(1);
    m.cpu.debug.set_console_input(script(""));
    run_steps(&mut m, 3);
    // Single-stepping with an empty script: every step breaks and resumes.
    assert_eq!(m.cpu.debug.breaks_taken, 3);
    assert_eq!(m.cpu.regs.pc, 0x0103);
}

#[test]
fn console_script_drives_breakpoints_and_memory() {
    // From the initial break: poke WRAM, install a breakpoint, continue.
    let mut m = machine_with_program(&[]);
    m.cpu.debug.request_break();
    m.cpu.debug.set_console_input(script(
        "write c000 66\nread c000 4\nb 0x0123\nc\n",
    ));
    m.simulate();
    assert_eq!(m.mmu.read8(0xC000), 66);
    assert_eq!(m.cpu.debug.breakpoint_at(0x0123), Some(Breakpoint::pause()));
    assert!(m.cpu.is_running());
}

#[test]
fn reset_from_the_console_breaks_again_immediately() {
    let mut m = machine_with_program(&[]);
    m.cpu.debug.request_break();
    m.cpu.debug.set_console_input(script("reset\nc\n"));
    m.simulate();
    // The reset rearmed a one-shot break, consumed on the next step.
    assert_eq!(m.cpu.debug.breaks_taken, 1);
    m.simulate();
    assert_eq!(m.cpu.debug.breaks_taken, 2);
}

#[test]
fn step_command_single_steps_with_verbose_trace() {
    let mut m = machine_with_program(&[]);
    m.cpu.debug.request_break();
    m.cpu.debug.set_console_input(script("s\n"));
    m.simulate();
    assert!(m.cpu.debug.verbose);
    assert_eq!(m.cpu.debug.step_period(), 1);
    m.simulate();
    assert_eq!(m.cpu.debug.breaks_taken, 2);
}
