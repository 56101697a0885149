//! Opcode-group handlers and disassembly printers.
//!
//! Handlers run with PC already advanced past the opcode byte; immediate
//! operands are fetched through [`Cpu::fetch8`]/[`Cpu::fetch16`], which
//! advance PC further. The returned cycle counts are T-states and include
//! the four implicit in the opcode fetch. Printers run *before* the PC
//! increment, so they read operands at `pc + 1`.

use crate::cpu::Cpu;
use crate::mmu::Mmu;
use crate::registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

pub type Handler = fn(&mut Cpu, &mut Mmu, u8) -> u32;
pub type Printer = fn(&Cpu, &Mmu, u8) -> String;

/// Executable instruction descriptor returned by the decoder.
pub struct Instruction {
    pub handler: Handler,
    pub printer: Printer,
}

pub static NOP: Instruction = Instruction { handler: nop, printer: print_nop };
pub static LD_IMM_SP: Instruction = Instruction { handler: ld_imm_sp, printer: print_ld_imm_sp };
pub static LD_REG_REG: Instruction = Instruction { handler: ld_reg_reg, printer: print_ld_reg_reg };
pub static HALT: Instruction = Instruction { handler: halt, printer: print_halt };
pub static LD_REG_PAIR_IMM: Instruction =
    Instruction { handler: ld_reg_pair_imm, printer: print_ld_reg_pair_imm };
pub static LD_INDIRECT_ACC: Instruction =
    Instruction { handler: ld_indirect_acc, printer: print_ld_indirect_acc };
pub static ADD_HL_PAIR: Instruction = Instruction { handler: add_hl_pair, printer: print_add_hl_pair };
pub static INC_DEC_PAIR: Instruction = Instruction { handler: inc_dec_pair, printer: print_inc_dec_pair };
pub static INC_DEC_REG: Instruction = Instruction { handler: inc_dec_reg, printer: print_inc_dec_reg };
pub static ROTATE_ACC: Instruction = Instruction { handler: rotate_acc, printer: print_rotate_acc };
pub static STOP: Instruction = Instruction { handler: stop, printer: print_stop };
pub static JR: Instruction = Instruction { handler: jr, printer: print_jr };
pub static LD_REG_IMM: Instruction = Instruction { handler: ld_reg_imm, printer: print_ld_reg_imm };
pub static LDI_LDD: Instruction = Instruction { handler: ldi_ldd, printer: print_ldi_ldd };
pub static DAA: Instruction = Instruction { handler: daa, printer: print_daa };
pub static CPL: Instruction = Instruction { handler: cpl, printer: print_cpl };
pub static SCF_CCF: Instruction = Instruction { handler: scf_ccf, printer: print_scf_ccf };
pub static ALU: Instruction = Instruction { handler: alu, printer: print_alu };
pub static PUSH_POP: Instruction = Instruction { handler: push_pop, printer: print_push_pop };
pub static RET: Instruction = Instruction { handler: ret, printer: print_ret };
pub static RST: Instruction = Instruction { handler: rst, printer: print_rst };
pub static JP: Instruction = Instruction { handler: jp, printer: print_jp };
pub static CALL: Instruction = Instruction { handler: call, printer: print_call };
pub static ADD_SP_IMM: Instruction = Instruction { handler: add_sp_imm, printer: print_add_sp_imm };
pub static LD_ABS_ACC: Instruction = Instruction { handler: ld_abs_acc, printer: print_ld_abs_acc };
pub static LD_HIGH_ACC: Instruction = Instruction { handler: ld_high_acc, printer: print_ld_high_acc };
pub static LD_HL_SP_IMM: Instruction =
    Instruction { handler: ld_hl_sp_imm, printer: print_ld_hl_sp_imm };
pub static JP_HL_LD_SP_HL: Instruction =
    Instruction { handler: jp_hl_ld_sp_hl, printer: print_jp_hl_ld_sp_hl };
pub static DI_EI: Instruction = Instruction { handler: di_ei, printer: print_di_ei };
pub static CB_PREFIX: Instruction = Instruction { handler: cb_prefix, printer: print_cb_prefix };
pub static UNUSED: Instruction = Instruction { handler: unused, printer: print_unused };
pub static MISSING: Instruction = Instruction { handler: missing, printer: print_missing };

const R_NAMES: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const RR_NAMES: [&str; 4] = ["BC", "DE", "HL", "SP"];
const STACK_PAIR_NAMES: [&str; 4] = ["BC", "DE", "HL", "AF"];
const COND_NAMES: [&str; 4] = ["NZ", "Z", "NC", "C"];
const ALU_NAMES: [&str; 8] = ["ADD A,", "ADC A,", "SUB", "SBC A,", "AND", "XOR", "OR", "CP"];
const CB_NAMES: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SWAP", "SRL"];

/// Read the 3-bit register operand: B,C,D,E,H,L,(HL),A.
fn read_r(cpu: &Cpu, mmu: &Mmu, idx: u8) -> u8 {
    match idx {
        0 => cpu.regs.b,
        1 => cpu.regs.c,
        2 => cpu.regs.d,
        3 => cpu.regs.e,
        4 => cpu.regs.h,
        5 => cpu.regs.l,
        6 => mmu.read8(cpu.regs.hl()),
        7 => cpu.regs.a,
        _ => unreachable!(),
    }
}

fn write_r(cpu: &mut Cpu, mmu: &mut Mmu, idx: u8, val: u8) {
    match idx {
        0 => cpu.regs.b = val,
        1 => cpu.regs.c = val,
        2 => cpu.regs.d = val,
        3 => cpu.regs.e = val,
        4 => cpu.regs.h = val,
        5 => cpu.regs.l = val,
        6 => mmu.write8(cpu.regs.hl(), val),
        7 => cpu.regs.a = val,
        _ => unreachable!(),
    }
}

/// Read the 2-bit register-pair operand: BC,DE,HL,SP.
fn read_rr(cpu: &Cpu, idx: u8) -> u16 {
    match idx {
        0 => cpu.regs.bc(),
        1 => cpu.regs.de(),
        2 => cpu.regs.hl(),
        3 => cpu.regs.sp,
        _ => unreachable!(),
    }
}

fn write_rr(cpu: &mut Cpu, idx: u8, val: u16) {
    match idx {
        0 => cpu.regs.set_bc(val),
        1 => cpu.regs.set_de(val),
        2 => cpu.regs.set_hl(val),
        3 => cpu.regs.sp = val,
        _ => unreachable!(),
    }
}

/// Evaluate the 2-bit branch condition: NZ,Z,NC,C.
fn condition(cpu: &Cpu, idx: u8) -> bool {
    match idx {
        0 => !cpu.regs.zero(),
        1 => cpu.regs.zero(),
        2 => !cpu.regs.carry(),
        3 => cpu.regs.carry(),
        _ => unreachable!(),
    }
}

// Printer-side operand peeks; the printer runs with PC still at the opcode.
fn imm8(cpu: &Cpu, mmu: &Mmu) -> u8 {
    mmu.read8(cpu.regs.pc.wrapping_add(1))
}

fn imm16(cpu: &Cpu, mmu: &Mmu) -> u16 {
    mmu.read16(cpu.regs.pc.wrapping_add(1))
}

fn nop(_cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> u32 {
    4
}

fn print_nop(_cpu: &Cpu, _mmu: &Mmu, _op: u8) -> String {
    "NOP".into()
}

fn ld_imm_sp(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> u32 {
    let addr = cpu.fetch16(mmu);
    mmu.write16(addr, cpu.regs.sp);
    20
}

fn print_ld_imm_sp(cpu: &Cpu, mmu: &Mmu, _op: u8) -> String {
    format!("LD (0x{:04x}), SP", imm16(cpu, mmu))
}

fn ld_reg_reg(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let dest = (op >> 3) & 0x07;
    let src = op & 0x07;
    let val = read_r(cpu, mmu, src);
    write_r(cpu, mmu, dest, val);
    if dest == 6 || src == 6 {
        8
    } else {
        4
    }
}

fn print_ld_reg_reg(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    format!(
        "LD {}, {}",
        R_NAMES[((op >> 3) & 0x07) as usize],
        R_NAMES[(op & 0x07) as usize]
    )
}

fn halt(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> u32 {
    cpu.enter_halt();
    // Entering HALT with IME cleared while an enabled interrupt is already
    // pending triggers the fetch anomaly: the next fetched byte runs twice.
    if !cpu.ime && mmu.interrupt_mask() != 0 {
        cpu.arm_halt_bug();
    }
    4
}

fn print_halt(_cpu: &Cpu, _mmu: &Mmu, _op: u8) -> String {
    "HALT".into()
}

fn ld_reg_pair_imm(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let val = cpu.fetch16(mmu);
    write_rr(cpu, (op >> 4) & 0x03, val);
    12
}

fn print_ld_reg_pair_imm(cpu: &Cpu, mmu: &Mmu, op: u8) -> String {
    format!(
        "LD {}, 0x{:04x}",
        RR_NAMES[((op >> 4) & 0x03) as usize],
        imm16(cpu, mmu)
    )
}

fn ld_indirect_acc(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let addr = if op & 0x10 == 0 {
        cpu.regs.bc()
    } else {
        cpu.regs.de()
    };
    if op & 0x08 == 0 {
        mmu.write8(addr, cpu.regs.a);
    } else {
        cpu.regs.a = mmu.read8(addr);
    }
    8
}

fn print_ld_indirect_acc(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    let pair = if op & 0x10 == 0 { "BC" } else { "DE" };
    if op & 0x08 == 0 {
        format!("LD ({pair}), A")
    } else {
        format!("LD A, ({pair})")
    }
}

fn add_hl_pair(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> u32 {
    let hl = cpu.regs.hl();
    let rhs = read_rr(cpu, (op >> 4) & 0x03);
    let res = hl.wrapping_add(rhs);
    let mut f = cpu.regs.f() & FLAG_Z;
    if ((hl & 0x0FFF) + (rhs & 0x0FFF)) & 0x1000 != 0 {
        f |= FLAG_H;
    }
    if (hl as u32) + (rhs as u32) > 0xFFFF {
        f |= FLAG_C;
    }
    cpu.regs.set_f(f);
    cpu.regs.set_hl(res);
    8
}

fn print_add_hl_pair(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    format!("ADD HL, {}", RR_NAMES[((op >> 4) & 0x03) as usize])
}

fn inc_dec_pair(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> u32 {
    let idx = (op >> 4) & 0x03;
    let old = read_rr(cpu, idx);
    let val = if op & 0x08 == 0 {
        old.wrapping_add(1)
    } else {
        old.wrapping_sub(1)
    };
    write_rr(cpu, idx, val);
    8
}

fn print_inc_dec_pair(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    let verb = if op & 0x08 == 0 { "INC" } else { "DEC" };
    format!("{verb} {}", RR_NAMES[((op >> 4) & 0x03) as usize])
}

fn inc_dec_reg(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let idx = (op >> 3) & 0x07;
    let old = read_r(cpu, mmu, idx);
    let mut f = cpu.regs.f() & FLAG_C;
    let res = if op & 0x01 == 0 {
        let res = old.wrapping_add(1);
        if (old & 0x0F) + 1 > 0x0F {
            f |= FLAG_H;
        }
        res
    } else {
        let res = old.wrapping_sub(1);
        f |= FLAG_N;
        if old & 0x0F == 0 {
            f |= FLAG_H;
        }
        res
    };
    if res == 0 {
        f |= FLAG_Z;
    }
    cpu.regs.set_f(f);
    write_r(cpu, mmu, idx, res);
    if idx == 6 {
        12
    } else {
        4
    }
}

fn print_inc_dec_reg(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    let verb = if op & 0x01 == 0 { "INC" } else { "DEC" };
    format!("{verb} {}", R_NAMES[((op >> 3) & 0x07) as usize])
}

fn rotate_acc(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> u32 {
    let a = cpu.regs.a;
    let carry_in = if cpu.regs.carry() { 1u8 } else { 0 };
    let (res, carry_out) = match (op >> 3) & 0x03 {
        0 => (a.rotate_left(1), a & 0x80 != 0),
        1 => (a.rotate_right(1), a & 0x01 != 0),
        2 => ((a << 1) | carry_in, a & 0x80 != 0),
        3 => ((a >> 1) | (carry_in << 7), a & 0x01 != 0),
        _ => unreachable!(),
    };
    cpu.regs.a = res;
    // Unlike the CB-prefixed forms, the accumulator rotates always clear Z.
    cpu.regs.set_f(if carry_out { FLAG_C } else { 0 });
    4
}

fn print_rotate_acc(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    ["RLCA", "RRCA", "RLA", "RRA"][((op >> 3) & 0x03) as usize].into()
}

fn stop(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> u32 {
    // STOP carries a padding byte.
    let _ = cpu.fetch8(mmu);
    core_info!(target: "cpu", "STOP executed at pc 0x{:04x}", cpu.regs.pc.wrapping_sub(2));
    // Full STOP (LCD off, speed switch) is a non-goal; quiesce like HALT.
    cpu.enter_halt();
    4
}

fn print_stop(_cpu: &Cpu, _mmu: &Mmu, _op: u8) -> String {
    "STOP".into()
}

fn jr(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let offset = cpu.fetch8(mmu) as i8;
    let taken = op == 0x18 || condition(cpu, (op >> 3) & 0x03);
    if taken {
        cpu.regs.pc = cpu.regs.pc.wrapping_add(offset as u16);
        12
    } else {
        8
    }
}

fn print_jr(cpu: &Cpu, mmu: &Mmu, op: u8) -> String {
    let offset = imm8(cpu, mmu) as i8;
    let target = cpu.regs.pc.wrapping_add(2).wrapping_add(offset as u16);
    if op == 0x18 {
        format!("JR 0x{target:04x}")
    } else {
        format!("JR {}, 0x{target:04x}", COND_NAMES[((op >> 3) & 0x03) as usize])
    }
}

fn ld_reg_imm(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let idx = (op >> 3) & 0x07;
    let val = cpu.fetch8(mmu);
    write_r(cpu, mmu, idx, val);
    if idx == 6 {
        12
    } else {
        8
    }
}

fn print_ld_reg_imm(cpu: &Cpu, mmu: &Mmu, op: u8) -> String {
    format!(
        "LD {}, 0x{:02x}",
        R_NAMES[((op >> 3) & 0x07) as usize],
        imm8(cpu, mmu)
    )
}

fn ldi_ldd(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let hl = cpu.regs.hl();
    if op & 0x08 == 0 {
        mmu.write8(hl, cpu.regs.a);
    } else {
        cpu.regs.a = mmu.read8(hl);
    }
    let hl = if op & 0x10 == 0 {
        hl.wrapping_add(1)
    } else {
        hl.wrapping_sub(1)
    };
    cpu.regs.set_hl(hl);
    8
}

fn print_ldi_ldd(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    let verb = if op & 0x10 == 0 { "LDI" } else { "LDD" };
    if op & 0x08 == 0 {
        format!("{verb} (HL), A")
    } else {
        format!("{verb} A, (HL)")
    }
}

fn daa(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> u32 {
    let mut correction = 0u8;
    let mut carry = false;
    let a = cpu.regs.a;
    if cpu.regs.half_carry() || (!cpu.regs.subtract() && (a & 0x0F) > 9) {
        correction |= 0x06;
    }
    if cpu.regs.carry() || (!cpu.regs.subtract() && a > 0x99) {
        correction |= 0x60;
        carry = true;
    }
    cpu.regs.a = if cpu.regs.subtract() {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let mut f = cpu.regs.f() & FLAG_N;
    if cpu.regs.a == 0 {
        f |= FLAG_Z;
    }
    if carry {
        f |= FLAG_C;
    }
    cpu.regs.set_f(f);
    4
}

fn print_daa(_cpu: &Cpu, _mmu: &Mmu, _op: u8) -> String {
    "DAA".into()
}

fn cpl(cpu: &mut Cpu, _mmu: &mut Mmu, _op: u8) -> u32 {
    cpu.regs.a ^= 0xFF;
    let f = (cpu.regs.f() & (FLAG_Z | FLAG_C)) | FLAG_N | FLAG_H;
    cpu.regs.set_f(f);
    4
}

fn print_cpl(_cpu: &Cpu, _mmu: &Mmu, _op: u8) -> String {
    "CPL".into()
}

fn scf_ccf(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> u32 {
    let f = if op == 0x37 {
        (cpu.regs.f() & FLAG_Z) | FLAG_C
    } else if cpu.regs.carry() {
        cpu.regs.f() & FLAG_Z
    } else {
        (cpu.regs.f() & FLAG_Z) | FLAG_C
    };
    cpu.regs.set_f(f);
    4
}

fn print_scf_ccf(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    if op == 0x37 { "SCF" } else { "CCF" }.into()
}

fn alu(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let (val, cycles) = if (op & 0xC0) == 0x80 {
        let src = op & 0x07;
        (read_r(cpu, mmu, src), if src == 6 { 8 } else { 4 })
    } else {
        (cpu.fetch8(mmu), 8)
    };
    alu_apply(cpu, (op >> 3) & 0x07, val);
    cycles
}

/// The eight accumulator operations: ADD,ADC,SUB,SBC,AND,XOR,OR,CP.
fn alu_apply(cpu: &mut Cpu, kind: u8, val: u8) {
    let a = cpu.regs.a;
    let carry_in = if cpu.regs.carry() { 1u8 } else { 0 };
    match kind {
        0 => {
            let (res, carry) = a.overflowing_add(val);
            let mut f = if carry { FLAG_C } else { 0 };
            if (a & 0x0F) + (val & 0x0F) > 0x0F {
                f |= FLAG_H;
            }
            if res == 0 {
                f |= FLAG_Z;
            }
            cpu.regs.a = res;
            cpu.regs.set_f(f);
        }
        1 => {
            let (res1, carry1) = a.overflowing_add(val);
            let (res2, carry2) = res1.overflowing_add(carry_in);
            let mut f = if carry1 || carry2 { FLAG_C } else { 0 };
            if (a & 0x0F) + (val & 0x0F) + carry_in > 0x0F {
                f |= FLAG_H;
            }
            if res2 == 0 {
                f |= FLAG_Z;
            }
            cpu.regs.a = res2;
            cpu.regs.set_f(f);
        }
        2 => {
            let (res, borrow) = a.overflowing_sub(val);
            let mut f = FLAG_N | if borrow { FLAG_C } else { 0 };
            if (a & 0x0F) < (val & 0x0F) {
                f |= FLAG_H;
            }
            if res == 0 {
                f |= FLAG_Z;
            }
            cpu.regs.a = res;
            cpu.regs.set_f(f);
        }
        3 => {
            let (res1, borrow1) = a.overflowing_sub(val);
            let (res2, borrow2) = res1.overflowing_sub(carry_in);
            let mut f = FLAG_N | if borrow1 || borrow2 { FLAG_C } else { 0 };
            if (a & 0x0F) < (val & 0x0F) + carry_in {
                f |= FLAG_H;
            }
            if res2 == 0 {
                f |= FLAG_Z;
            }
            cpu.regs.a = res2;
            cpu.regs.set_f(f);
        }
        4 => {
            cpu.regs.a &= val;
            let f = FLAG_H | if cpu.regs.a == 0 { FLAG_Z } else { 0 };
            cpu.regs.set_f(f);
        }
        5 => {
            cpu.regs.a ^= val;
            let f = if cpu.regs.a == 0 { FLAG_Z } else { 0 };
            cpu.regs.set_f(f);
        }
        6 => {
            cpu.regs.a |= val;
            let f = if cpu.regs.a == 0 { FLAG_Z } else { 0 };
            cpu.regs.set_f(f);
        }
        7 => {
            let res = a.wrapping_sub(val);
            let mut f = FLAG_N | if a < val { FLAG_C } else { 0 };
            if (a & 0x0F) < (val & 0x0F) {
                f |= FLAG_H;
            }
            if res == 0 {
                f |= FLAG_Z;
            }
            cpu.regs.set_f(f);
        }
        _ => unreachable!(),
    }
}

fn print_alu(cpu: &Cpu, mmu: &Mmu, op: u8) -> String {
    let name = ALU_NAMES[((op >> 3) & 0x07) as usize];
    if (op & 0xC0) == 0x80 {
        format!("{name} {}", R_NAMES[(op & 0x07) as usize])
    } else {
        format!("{name} 0x{:02x}", imm8(cpu, mmu))
    }
}

fn push_pop(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let idx = (op >> 4) & 0x03;
    if op & 0x04 != 0 {
        let val = match idx {
            0 => cpu.regs.bc(),
            1 => cpu.regs.de(),
            2 => cpu.regs.hl(),
            3 => cpu.regs.af(),
            _ => unreachable!(),
        };
        cpu.push16(mmu, val);
        16
    } else {
        let val = cpu.pop16(mmu);
        match idx {
            0 => cpu.regs.set_bc(val),
            1 => cpu.regs.set_de(val),
            2 => cpu.regs.set_hl(val),
            // POP AF masks the phantom low flag bits.
            3 => cpu.regs.set_af(val),
            _ => unreachable!(),
        }
        12
    }
}

fn print_push_pop(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    let verb = if op & 0x04 != 0 { "PUSH" } else { "POP" };
    format!("{verb} {}", STACK_PAIR_NAMES[((op >> 4) & 0x03) as usize])
}

fn ret(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    if (op & 0xEF) == 0xC9 {
        cpu.regs.pc = cpu.pop16(mmu);
        if op == 0xD9 {
            // RETI restores IME without the EI delay.
            cpu.ime = true;
        }
        16
    } else if condition(cpu, (op >> 3) & 0x03) {
        cpu.regs.pc = cpu.pop16(mmu);
        20
    } else {
        8
    }
}

fn print_ret(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    match op {
        0xC9 => "RET".into(),
        0xD9 => "RETI".into(),
        _ => format!("RET {}", COND_NAMES[((op >> 3) & 0x03) as usize]),
    }
}

fn rst(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let target = (op & 0x38) as u16;
    let pc = cpu.regs.pc;
    cpu.push16(mmu, pc);
    cpu.regs.pc = target;
    16
}

fn print_rst(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    format!("RST 0x{:02x}", op & 0x38)
}

fn jp(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let addr = cpu.fetch16(mmu);
    if op == 0xC3 || condition(cpu, (op >> 3) & 0x03) {
        cpu.regs.pc = addr;
        16
    } else {
        12
    }
}

fn print_jp(cpu: &Cpu, mmu: &Mmu, op: u8) -> String {
    let addr = imm16(cpu, mmu);
    if op == 0xC3 {
        format!("JP 0x{addr:04x}")
    } else {
        format!("JP {}, 0x{addr:04x}", COND_NAMES[((op >> 3) & 0x03) as usize])
    }
}

fn call(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let addr = cpu.fetch16(mmu);
    if op == 0xCD || condition(cpu, (op >> 3) & 0x03) {
        let pc = cpu.regs.pc;
        cpu.push16(mmu, pc);
        cpu.regs.pc = addr;
        24
    } else {
        12
    }
}

fn print_call(cpu: &Cpu, mmu: &Mmu, op: u8) -> String {
    let addr = imm16(cpu, mmu);
    if op == 0xCD {
        format!("CALL 0x{addr:04x}")
    } else {
        format!("CALL {}, 0x{addr:04x}", COND_NAMES[((op >> 3) & 0x03) as usize])
    }
}

/// H and C for the SP+n forms come from the low-byte addition.
fn sp_offset_flags(sp: u16, val: u16) -> u8 {
    let mut f = 0;
    if ((sp & 0x0F) + (val & 0x0F)) > 0x0F {
        f |= FLAG_H;
    }
    if ((sp & 0xFF) + (val & 0xFF)) > 0xFF {
        f |= FLAG_C;
    }
    f
}

fn add_sp_imm(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> u32 {
    let val = cpu.fetch8(mmu) as i8 as i16 as u16;
    let sp = cpu.regs.sp;
    cpu.regs.set_f(sp_offset_flags(sp, val));
    cpu.regs.sp = sp.wrapping_add(val);
    16
}

fn print_add_sp_imm(cpu: &Cpu, mmu: &Mmu, _op: u8) -> String {
    format!("ADD SP, {:+}", imm8(cpu, mmu) as i8)
}

fn ld_abs_acc(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let addr = cpu.fetch16(mmu);
    if op & 0x10 == 0 {
        mmu.write8(addr, cpu.regs.a);
    } else {
        cpu.regs.a = mmu.read8(addr);
    }
    16
}

fn print_ld_abs_acc(cpu: &Cpu, mmu: &Mmu, op: u8) -> String {
    let addr = imm16(cpu, mmu);
    if op & 0x10 == 0 {
        format!("LD (0x{addr:04x}), A")
    } else {
        format!("LD A, (0x{addr:04x})")
    }
}

fn ld_high_acc(cpu: &mut Cpu, mmu: &mut Mmu, op: u8) -> u32 {
    let (addr, cycles) = if op & 0x02 == 0 {
        (0xFF00 | cpu.fetch8(mmu) as u16, 12)
    } else {
        (0xFF00 | cpu.regs.c as u16, 8)
    };
    if op & 0x10 == 0 {
        mmu.write8(addr, cpu.regs.a);
    } else {
        cpu.regs.a = mmu.read8(addr);
    }
    cycles
}

fn print_ld_high_acc(cpu: &Cpu, mmu: &Mmu, op: u8) -> String {
    let operand = if op & 0x02 == 0 {
        format!("(0xff00+0x{:02x})", imm8(cpu, mmu))
    } else {
        "(0xff00+C)".into()
    };
    if op & 0x10 == 0 {
        format!("LD {operand}, A")
    } else {
        format!("LD A, {operand}")
    }
}

fn ld_hl_sp_imm(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> u32 {
    let val = cpu.fetch8(mmu) as i8 as i16 as u16;
    let sp = cpu.regs.sp;
    cpu.regs.set_f(sp_offset_flags(sp, val));
    cpu.regs.set_hl(sp.wrapping_add(val));
    12
}

fn print_ld_hl_sp_imm(cpu: &Cpu, mmu: &Mmu, _op: u8) -> String {
    format!("LD HL, SP{:+}", imm8(cpu, mmu) as i8)
}

fn jp_hl_ld_sp_hl(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> u32 {
    if op & 0x10 == 0 {
        cpu.regs.pc = cpu.regs.hl();
        4
    } else {
        cpu.regs.sp = cpu.regs.hl();
        8
    }
}

fn print_jp_hl_ld_sp_hl(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    if op & 0x10 == 0 { "JP (HL)" } else { "LD SP, HL" }.into()
}

fn di_ei(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> u32 {
    if op & 0x08 == 0 {
        cpu.disable_interrupts();
    } else {
        cpu.enable_interrupts();
    }
    4
}

fn print_di_ei(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    if op & 0x08 == 0 { "DI" } else { "EI" }.into()
}

fn cb_prefix(cpu: &mut Cpu, mmu: &mut Mmu, _op: u8) -> u32 {
    let sub = cpu.fetch8(mmu);
    execute_cb(cpu, mmu, sub)
}

/// The 256-entry 0xCB extension: rotates, shifts, SWAP, BIT/RES/SET.
fn execute_cb(cpu: &mut Cpu, mmu: &mut Mmu, sub: u8) -> u32 {
    let r = sub & 0x07;
    match sub {
        0x00..=0x3F => {
            let val = read_r(cpu, mmu, r);
            let carry_in = if cpu.regs.carry() { 1u8 } else { 0 };
            let (res, carry_out) = match sub >> 3 {
                0 => (val.rotate_left(1), val & 0x80 != 0),
                1 => (val.rotate_right(1), val & 0x01 != 0),
                2 => ((val << 1) | carry_in, val & 0x80 != 0),
                3 => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
                4 => (val << 1, val & 0x80 != 0),
                5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
                6 => (val.rotate_left(4), false),
                7 => (val >> 1, val & 0x01 != 0),
                _ => unreachable!(),
            };
            write_r(cpu, mmu, r, res);
            let mut f = if carry_out { FLAG_C } else { 0 };
            if res == 0 {
                f |= FLAG_Z;
            }
            cpu.regs.set_f(f);
            if r == 6 {
                16
            } else {
                8
            }
        }
        0x40..=0x7F => {
            let bit = (sub >> 3) & 0x07;
            let val = read_r(cpu, mmu, r);
            let mut f = (cpu.regs.f() & FLAG_C) | FLAG_H;
            if val & (1 << bit) == 0 {
                f |= FLAG_Z;
            }
            cpu.regs.set_f(f);
            // BIT (HL) only reads memory.
            if r == 6 {
                12
            } else {
                8
            }
        }
        0x80..=0xBF => {
            let bit = (sub >> 3) & 0x07;
            let val = read_r(cpu, mmu, r) & !(1 << bit);
            write_r(cpu, mmu, r, val);
            if r == 6 {
                16
            } else {
                8
            }
        }
        0xC0..=0xFF => {
            let bit = (sub >> 3) & 0x07;
            let val = read_r(cpu, mmu, r) | (1 << bit);
            write_r(cpu, mmu, r, val);
            if r == 6 {
                16
            } else {
                8
            }
        }
    }
}

fn print_cb_prefix(cpu: &Cpu, mmu: &Mmu, _op: u8) -> String {
    let sub = imm8(cpu, mmu);
    let r = R_NAMES[(sub & 0x07) as usize];
    match sub {
        0x00..=0x3F => format!("{} {r}", CB_NAMES[(sub >> 3) as usize]),
        0x40..=0x7F => format!("BIT {}, {r}", (sub >> 3) & 0x07),
        0x80..=0xBF => format!("RES {}, {r}", (sub >> 3) & 0x07),
        0xC0..=0xFF => format!("SET {}, {r}", (sub >> 3) & 0x07),
    }
}

fn unused(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> u32 {
    core_warn!(
        target: "cpu",
        "unused opcode 0x{:02x} at pc 0x{:04x}",
        op,
        cpu.regs.pc.wrapping_sub(1)
    );
    4
}

fn print_unused(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    format!("DB 0x{op:02x} (unused)")
}

fn missing(cpu: &mut Cpu, _mmu: &mut Mmu, op: u8) -> u32 {
    // A complete decoder table has no gaps; reaching this is a development
    // error and aborts so test suites surface it.
    panic!(
        "missing handler for opcode {op:02X} at PC={:04X}",
        cpu.regs.pc.wrapping_sub(1)
    );
}

fn print_missing(_cpu: &Cpu, _mmu: &Mmu, op: u8) -> String {
    format!("?? 0x{op:02x}")
}
