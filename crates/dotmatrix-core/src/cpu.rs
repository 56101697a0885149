use crate::debugger::{self, BreakAction, Debugger};
use crate::decoder;
use crate::mmu::{InterruptSource, Mmu};
use crate::registers::Registers;

// One quiescent machine cycle while halted.
const QUIESCENT_CYCLES: u32 = 4;
// An accepted interrupt costs 20 T-states: 8 for the push-and-jump plus the
// internal delay cycles.
const PUSH_AND_JUMP_CYCLES: u32 = 8;
const INTERRUPT_DELAY_CYCLES: u32 = 12;
// EI/DI take effect after the *next* instruction retires; the countdown runs
// once at the end of the current step and once at the end of the following
// one.
const IME_TOGGLE_DELAY: i8 = 2;
// The post-HALT fetch anomaly repeats one byte; the counter starts at two
// because the dispatching step itself consumes one tick.
const HALT_BUG_FETCHES: u8 = 2;

/// Coarse machine state as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Running,
    /// HALT/STOP quiescence; wakes on interrupt dispatch.
    Halted,
    /// Terminal until reset; entered via the debug console's quit.
    Stopped,
    /// Running, but the step counter will break soon.
    Stepping,
}

/// The LR35902 core: register file, fetch/execute engine, interrupt client
/// and debug hooks. The memory bus is threaded through [`Cpu::simulate`]
/// rather than stored, so the CPU holds no back-reference to its machine.
pub struct Cpu {
    pub regs: Registers,
    /// Monotone T-state counter.
    pub cycles_total: u64,
    /// Last fetched opcode, for diagnostics only.
    pub cur_opcode: u8,
    pub running: bool,
    pub asleep: bool,
    /// Pending fetches during which PC must not advance (HALT bug).
    pub halt_bug_skip: u8,
    pub ime: bool,
    /// Signed IME countdown: positive enables, negative disables, zero idle.
    pub ime_pending: i8,
    last_flags: u8,
    pub debug: Debugger,
}

impl Cpu {
    pub fn new(boot_rom_mapped: bool) -> Self {
        let regs = if boot_rom_mapped {
            Registers::power_on()
        } else {
            Registers::post_boot()
        };
        Self {
            regs,
            cycles_total: 0,
            cur_opcode: 0,
            running: true,
            asleep: false,
            halt_bug_skip: 0,
            ime: false,
            ime_pending: 0,
            last_flags: regs.f(),
            debug: Debugger::new(),
        }
    }

    /// Return to the canonical boot state. Debug harness state (breakpoints,
    /// step counter) survives a reset.
    pub fn reset(&mut self, boot_rom_mapped: bool) {
        self.regs = if boot_rom_mapped {
            Registers::power_on()
        } else {
            Registers::post_boot()
        };
        self.cycles_total = 0;
        self.cur_opcode = 0;
        self.running = true;
        self.asleep = false;
        self.halt_bug_skip = 0;
        self.ime = false;
        self.ime_pending = 0;
        self.last_flags = self.regs.f();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_halting(&self) -> bool {
        self.asleep
    }

    pub fn power_state(&self) -> PowerState {
        if !self.running {
            PowerState::Stopped
        } else if self.asleep {
            PowerState::Halted
        } else if self.debug.stepping() {
            PowerState::Stepping
        } else {
            PowerState::Running
        }
    }

    /// Stop the machine (debug console quit). Terminal until `reset`.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Enter the HALT/STOP quiescent state.
    pub fn enter_halt(&mut self) {
        self.asleep = true;
    }

    pub(crate) fn arm_halt_bug(&mut self) {
        self.halt_bug_skip = HALT_BUG_FETCHES;
    }

    /// EI: enable IME after the next instruction retires.
    pub fn enable_interrupts(&mut self) {
        self.ime_pending = IME_TOGGLE_DELAY;
    }

    /// DI: disable IME after the next instruction retires. Overwrites a
    /// pending enable, which is what lets EI-then-DI collapse to a no-op.
    pub fn disable_interrupts(&mut self) {
        self.ime_pending = -IME_TOGGLE_DELAY;
    }

    pub fn incr_cycles(&mut self, count: u32) {
        self.cycles_total += count as u64;
    }

    /// Formatted CPU state string for debugging.
    pub fn debug_state(&self) -> String {
        format!("{} CY:{}", self.regs, self.cycles_total)
    }

    pub(crate) fn fetch8(&mut self, mmu: &Mmu) -> u8 {
        let val = mmu.read8(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    pub(crate) fn fetch16(&mut self, mmu: &Mmu) -> u16 {
        let lo = self.fetch8(mmu) as u16;
        let hi = self.fetch8(mmu) as u16;
        (hi << 8) | lo
    }

    pub(crate) fn push16(&mut self, mmu: &mut Mmu, val: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write8(self.regs.sp, (val >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write8(self.regs.sp, val as u8);
    }

    pub(crate) fn pop16(&mut self, mmu: &Mmu) -> u16 {
        let lo = mmu.read8(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = mmu.read8(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    /// Push PC and jump to an interrupt vector. Exposed for the I/O side of
    /// interrupt servicing; returns the T-states of the push itself.
    pub fn push_and_jump(&mut self, mmu: &mut Mmu, vector: u16) -> u32 {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        mmu.write16(self.regs.sp, self.regs.pc);
        self.regs.pc = vector;
        PUSH_AND_JUMP_CYCLES
    }

    /// One simulated step: fetch/dispatch/execute (or a quiescent tick while
    /// halted), then interrupt servicing.
    pub fn simulate(&mut self, mmu: &mut Mmu) {
        if !self.running {
            return;
        }

        if !self.asleep {
            let opcode = mmu.read8(self.regs.pc);
            self.cur_opcode = opcode;
            let cycles = self.execute(opcode, mmu);
            if !self.running {
                // User quit from the console: no side effects on the clock.
                return;
            }
            self.incr_cycles(cycles);
        } else {
            self.incr_cycles(QUIESCENT_CYCLES);
        }

        self.service_interrupts(mmu);
    }

    fn execute(&mut self, opcode: u8, mmu: &mut Mmu) -> u32 {
        if self.debug.break_time() {
            debugger::print_and_pause(self, mmu, opcode);
            if !self.running {
                return 0;
            }
        } else if let Some(bp) = self.debug.breakpoint_at(self.regs.pc) {
            match bp.action {
                BreakAction::None => {}
                BreakAction::Print => debugger::print_and_pause(self, mmu, opcode),
                BreakAction::Custom(id) => {
                    if let Some(action) = self.debug.custom_action(id) {
                        action(self, mmu, opcode);
                    }
                }
            }
            self.debug.break_on_steps(bp.break_on_steps);
            self.debug.verbose = bp.verbose_instr;
            if !self.running {
                return 0;
            }
        }

        let instr = decoder::decode_instruction(opcode);

        if self.debug.verbose {
            let text = (instr.printer)(self, mmu, opcode);
            println!(
                "{:9}: [pc 0x{:04x}] opcode 0x{:02x}: {}",
                self.cycles_total, self.regs.pc, opcode, text
            );
        }

        if self.halt_bug_skip > 0 {
            // The byte at PC runs again: suppress this increment once.
            self.halt_bug_skip -= 1;
        } else {
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }

        let cycles = (instr.handler)(self, mmu, opcode);

        if self.debug.verbose && self.regs.f() != self.last_flags {
            self.last_flags = self.regs.f();
            println!("* flags changed: [{}]", self.regs.flag_string());
        }

        cycles
    }

    fn service_interrupts(&mut self, mmu: &mut Mmu) {
        // Apply a pending EI/DI toggle; it lands after the instruction that
        // follows the toggle instruction.
        if self.ime_pending > 0 {
            self.ime_pending -= 1;
            if self.ime_pending == 0 {
                self.ime = true;
            }
        } else if self.ime_pending < 0 {
            self.ime_pending += 1;
            if self.ime_pending == 0 {
                self.ime = false;
            }
        }

        let imask = mmu.interrupt_mask();
        if self.ime && imask != 0 {
            self.asleep = false;
            self.ime = false;
            self.ime_pending = 0;
            match InterruptSource::highest_pending(imask) {
                Some(src) => {
                    mmu.acknowledge_interrupt(src);
                    core_trace!(
                        target: "cpu",
                        "servicing {:?} interrupt, vector 0x{:04x}",
                        src,
                        src.vector()
                    );
                    let pushed = self.push_and_jump(mmu, src.vector());
                    self.incr_cycles(pushed + INTERRUPT_DELAY_CYCLES);
                }
                None => {
                    // Unreachable with a correctly masked imask.
                    self.debug.request_break();
                }
            }
        }

        if !self.asleep {
            self.halt_bug_skip = self.halt_bug_skip.saturating_sub(1);
        }
    }
}
