use crate::instructions::{self, Instruction};

/// Coarse instruction classification.
///
/// One variant per dispatch group; handlers discriminate further on the low
/// opcode bits. `Missing` is a development aid only — the table below is
/// total over the documented instruction set, and the eleven opcodes the
/// hardware never assigned decode to `Unused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpGroup {
    /// 0x00
    Nop,
    /// 0x08: LD (nn),SP
    LdImmSp,
    /// 0x40-0x7F except 0x76: LD r,r'
    LdRegReg,
    /// 0x76
    Halt,
    /// x1: LD rr,nn
    LdRegPairImm,
    /// x2/xA: LD (BC/DE),A and LD A,(BC/DE)
    LdIndirectAcc,
    /// x9: ADD HL,rr
    AddHlPair,
    /// x3/xB: INC/DEC rr
    IncDecPair,
    /// INC/DEC r
    IncDecReg,
    /// 0x07/0x0F/0x17/0x1F: RLCA/RRCA/RLA/RRA
    RotateAcc,
    /// 0x10
    Stop,
    /// 0x18 and 0x20/0x28/0x30/0x38: JR
    Jr,
    /// x6/xE: LD r,n
    LdRegImm,
    /// 0x22/0x2A/0x32/0x3A: LDI/LDD between (HL) and A
    LdiLdd,
    /// 0x27
    Daa,
    /// 0x2F
    Cpl,
    /// 0x37/0x3F
    ScfCcf,
    /// 0x80-0xBF and the xC6/xCE.. immediate forms
    Alu,
    /// PUSH rr / POP rr
    PushPop,
    /// RET, conditional RET, RETI
    Ret,
    /// RST n
    Rst,
    /// JP nn, conditional JP
    Jp,
    /// CALL nn, conditional CALL
    Call,
    /// 0xE8: ADD SP,n
    AddSpImm,
    /// 0xEA/0xFA: LD (nn),A and LD A,(nn)
    LdAbsAcc,
    /// 0xE0/0xF0/0xE2/0xF2: LD through 0xFF00+n / 0xFF00+C
    LdHighAcc,
    /// 0xF8: LD HL,SP+n
    LdHlSpImm,
    /// 0xE9: JP (HL); 0xF9: LD SP,HL
    JpHlLdSpHl,
    /// 0xF3/0xFB
    DiEi,
    /// 0xCB: extended rotate/shift/bit table
    CbPrefix,
    /// Documented holes in the opcode map; execute as 4-cycle no-ops.
    Unused,
    Missing,
}

/// Classify an opcode by first-match bit-pattern test.
///
/// Several patterns overlap, so the order is load-bearing: the LD r,r' block
/// must be probed before the rr-pair loads, RST before conditional CALL, and
/// the absolute LD forms before the 0xFF00-relative ones.
pub fn decode(op: u8) -> OpGroup {
    if op == 0x00 {
        OpGroup::Nop
    } else if op == 0x08 {
        OpGroup::LdImmSp
    } else if (op & 0xC0) == 0x40 {
        if op == 0x76 {
            OpGroup::Halt
        } else {
            OpGroup::LdRegReg
        }
    } else if (op & 0xCF) == 0x01 {
        OpGroup::LdRegPairImm
    } else if (op & 0xE7) == 0x02 {
        OpGroup::LdIndirectAcc
    } else if (op & 0xCF) == 0x09 {
        OpGroup::AddHlPair
    } else if (op & 0xC7) == 0x03 {
        OpGroup::IncDecPair
    } else if (op & 0xC6) == 0x04 {
        OpGroup::IncDecReg
    } else if (op & 0xE7) == 0x07 {
        OpGroup::RotateAcc
    } else if op == 0x10 {
        OpGroup::Stop
    } else if op == 0x18 || (op & 0xE7) == 0x20 {
        OpGroup::Jr
    } else if (op & 0xC7) == 0x06 {
        OpGroup::LdRegImm
    } else if (op & 0xE7) == 0x22 {
        OpGroup::LdiLdd
    } else if op == 0x27 {
        OpGroup::Daa
    } else if op == 0x2F {
        OpGroup::Cpl
    } else if (op & 0xF7) == 0x37 {
        OpGroup::ScfCcf
    } else if (op & 0xC7) == 0xC6 || (op & 0xC0) == 0x80 {
        OpGroup::Alu
    } else if (op & 0xCB) == 0xC1 {
        OpGroup::PushPop
    } else if (op & 0xE7) == 0xC0 || (op & 0xEF) == 0xC9 {
        OpGroup::Ret
    } else if (op & 0xC7) == 0xC7 {
        OpGroup::Rst
    } else if op == 0xC3 || (op & 0xE7) == 0xC2 {
        OpGroup::Jp
    } else if op == 0xCD || (op & 0xE7) == 0xC4 {
        OpGroup::Call
    } else if op == 0xE8 {
        OpGroup::AddSpImm
    } else if (op & 0xEF) == 0xEA {
        OpGroup::LdAbsAcc
    } else if (op & 0xEF) == 0xE0 || (op & 0xEF) == 0xE2 {
        OpGroup::LdHighAcc
    } else if op == 0xF8 {
        OpGroup::LdHlSpImm
    } else if (op & 0xEF) == 0xE9 {
        OpGroup::JpHlLdSpHl
    } else if (op & 0xF7) == 0xF3 {
        OpGroup::DiEi
    } else if op == 0xCB {
        OpGroup::CbPrefix
    } else if matches!(
        op,
        0xD3 | 0xDB | 0xDD | 0xE3 | 0xE4 | 0xEB | 0xEC | 0xED | 0xF4 | 0xFC | 0xFD
    ) {
        OpGroup::Unused
    } else {
        OpGroup::Missing
    }
}

/// Look up the process-wide descriptor for a group.
pub fn instruction(group: OpGroup) -> &'static Instruction {
    match group {
        OpGroup::Nop => &instructions::NOP,
        OpGroup::LdImmSp => &instructions::LD_IMM_SP,
        OpGroup::LdRegReg => &instructions::LD_REG_REG,
        OpGroup::Halt => &instructions::HALT,
        OpGroup::LdRegPairImm => &instructions::LD_REG_PAIR_IMM,
        OpGroup::LdIndirectAcc => &instructions::LD_INDIRECT_ACC,
        OpGroup::AddHlPair => &instructions::ADD_HL_PAIR,
        OpGroup::IncDecPair => &instructions::INC_DEC_PAIR,
        OpGroup::IncDecReg => &instructions::INC_DEC_REG,
        OpGroup::RotateAcc => &instructions::ROTATE_ACC,
        OpGroup::Stop => &instructions::STOP,
        OpGroup::Jr => &instructions::JR,
        OpGroup::LdRegImm => &instructions::LD_REG_IMM,
        OpGroup::LdiLdd => &instructions::LDI_LDD,
        OpGroup::Daa => &instructions::DAA,
        OpGroup::Cpl => &instructions::CPL,
        OpGroup::ScfCcf => &instructions::SCF_CCF,
        OpGroup::Alu => &instructions::ALU,
        OpGroup::PushPop => &instructions::PUSH_POP,
        OpGroup::Ret => &instructions::RET,
        OpGroup::Rst => &instructions::RST,
        OpGroup::Jp => &instructions::JP,
        OpGroup::Call => &instructions::CALL,
        OpGroup::AddSpImm => &instructions::ADD_SP_IMM,
        OpGroup::LdAbsAcc => &instructions::LD_ABS_ACC,
        OpGroup::LdHighAcc => &instructions::LD_HIGH_ACC,
        OpGroup::LdHlSpImm => &instructions::LD_HL_SP_IMM,
        OpGroup::JpHlLdSpHl => &instructions::JP_HL_LD_SP_HL,
        OpGroup::DiEi => &instructions::DI_EI,
        OpGroup::CbPrefix => &instructions::CB_PREFIX,
        OpGroup::Unused => &instructions::UNUSED,
        OpGroup::Missing => &instructions::MISSING,
    }
}

/// Decode straight to a descriptor.
pub fn decode_instruction(op: u8) -> &'static Instruction {
    instruction(decode(op))
}
