mod common;

use common::machine_with_program;
use dotmatrix_core::decoder::{decode, OpGroup};

// The eleven opcodes the hardware never assigned.
const UNUSED_OPS: [u8; 11] = [
    0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
];

#[test]
fn decoder_is_total() {
    for op in 0x00..=0xFFu8 {
        let group = decode(op);
        assert_ne!(group, OpGroup::Missing, "opcode {op:#04x} fell through");
        assert_eq!(
            group == OpGroup::Unused,
            UNUSED_OPS.contains(&op),
            "opcode {op:#04x} misclassified as {group:?}"
        );
    }
}

#[test]
fn ld_block_classification() {
    // All of 0x40-0x7F is LD r,r' except the HALT hole.
    for op in 0x40..=0x7Fu8 {
        let expected = if op == 0x76 {
            OpGroup::Halt
        } else {
            OpGroup::LdRegReg
        };
        assert_eq!(decode(op), expected, "opcode {op:#04x}");
    }
}

#[test]
fn group_spot_checks() {
    assert_eq!(decode(0x00), OpGroup::Nop);
    assert_eq!(decode(0x08), OpGroup::LdImmSp);
    assert_eq!(decode(0x47), OpGroup::LdRegReg);
    assert_eq!(decode(0x31), OpGroup::LdRegPairImm);
    assert_eq!(decode(0x1A), OpGroup::LdIndirectAcc);
    assert_eq!(decode(0x39), OpGroup::AddHlPair);
    assert_eq!(decode(0x33), OpGroup::IncDecPair);
    assert_eq!(decode(0x3B), OpGroup::IncDecPair);
    assert_eq!(decode(0x34), OpGroup::IncDecReg);
    assert_eq!(decode(0x1F), OpGroup::RotateAcc);
    assert_eq!(decode(0x10), OpGroup::Stop);
    assert_eq!(decode(0x18), OpGroup::Jr);
    assert_eq!(decode(0x38), OpGroup::Jr);
    assert_eq!(decode(0x36), OpGroup::LdRegImm);
    assert_eq!(decode(0x32), OpGroup::LdiLdd);
    assert_eq!(decode(0x27), OpGroup::Daa);
    assert_eq!(decode(0x2F), OpGroup::Cpl);
    assert_eq!(decode(0x37), OpGroup::ScfCcf);
    assert_eq!(decode(0x3F), OpGroup::ScfCcf);
    assert_eq!(decode(0x80), OpGroup::Alu);
    assert_eq!(decode(0xBF), OpGroup::Alu);
    assert_eq!(decode(0xFE), OpGroup::Alu);
    assert_eq!(decode(0xF5), OpGroup::PushPop);
    assert_eq!(decode(0xC1), OpGroup::PushPop);
    assert_eq!(decode(0xC0), OpGroup::Ret);
    assert_eq!(decode(0xC9), OpGroup::Ret);
    assert_eq!(decode(0xD9), OpGroup::Ret);
    assert_eq!(decode(0xFF), OpGroup::Rst);
    assert_eq!(decode(0xC3), OpGroup::Jp);
    assert_eq!(decode(0xDA), OpGroup::Jp);
    assert_eq!(decode(0xE8), OpGroup::AddSpImm);
    assert_eq!(decode(0xEA), OpGroup::LdAbsAcc);
    assert_eq!(decode(0xFA), OpGroup::LdAbsAcc);
    assert_eq!(decode(0xE0), OpGroup::LdHighAcc);
    assert_eq!(decode(0xF2), OpGroup::LdHighAcc);
    assert_eq!(decode(0xF8), OpGroup::LdHlSpImm);
    assert_eq!(decode(0xF3), OpGroup::DiEi);
    assert_eq!(decode(0xFB), OpGroup::DiEi);
    assert_eq!(decode(0xCB), OpGroup::CbPrefix);
}

#[test]
fn call_group_covers_all_conditional_forms() {
    for op in [0xCD, 0xC4, 0xCC, 0xD4, 0xDC] {
        assert_eq!(decode(op), OpGroup::Call, "opcode {op:#04x}");
    }
}

#[test]
fn jp_hl_shares_a_group_with_ld_sp_hl() {
    assert_eq!(decode(0xE9), OpGroup::JpHlLdSpHl);
    assert_eq!(decode(0xF9), OpGroup::JpHlLdSpHl);
}

#[test]
fn rst_wins_over_the_call_pattern() {
    // 0xCF..0xFF column: RST, never conditional CALL.
    for op in [0xCF, 0xDF, 0xEF, 0xFF] {
        assert_eq!(decode(op), OpGroup::Rst, "opcode {op:#04x}");
    }
}

#[test]
fn unused_opcode_executes_as_a_four_cycle_no_op() {
    let mut m = machine_with_program(&[0xD3]);
    let flags = m.cpu.regs.f();
    m.simulate();
    assert_eq!(m.cpu.regs.pc, 0x0101);
    assert_eq!(m.cpu.cycles_total, 4);
    assert_eq!(m.cpu.regs.f(), flags);
}
