// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Arithmetic and logical encoders.
//!
//! The two-operand ALU instructions share one shape: immediate into
//! register through the per-width register prefixes, register-to-register
//! with the source register folded into the prefix, and the compact memory
//! forms with a direction-dependent operation byte.

use crate::core::error::AsmError;
use crate::core::output::CodeSink;
use crate::tlcs900::handler::{
    emit_mem_operand, emit_mem_prefixed, fail, src_prefix_base, EncodeCtx, DST_PREFIX_BASE,
};
use crate::tlcs900::operand::{AddrMode, Operand};
use crate::tlcs900::registers::{
    reg16_code, reg32_code, reg8_code, reg8_pair_prefix, OperandSize,
};

type Encoded = Result<(), AsmError>;

/// Encoding constants for one two-operand ALU instruction.
struct AluSpec {
    name: &'static str,
    /// Second byte for `op reg, #imm` (byte form adds the register's low
    /// bit; word/long use it as-is).
    imm_op: u8,
    /// Whether the 32-bit immediate form exists.
    has_long_imm: bool,
    /// Second-byte base for byte `op reg, reg`.
    rr_byte: u8,
    /// Second-byte base for word/long `op reg, reg`.
    rr_wide: u8,
    /// Operation byte after a source memory prefix.
    mem_src: u8,
    /// Operation byte after a destination memory prefix.
    mem_dst: u8,
    /// `op (mem), #imm8` prefix and operation byte, when the form exists.
    mem_imm: Option<(u8, u8)>,
}

const ADD: AluSpec = AluSpec {
    name: "ADD",
    imm_op: 0xC8,
    has_long_imm: true,
    rr_byte: 0x80,
    rr_wide: 0x80,
    mem_src: 0x00,
    mem_dst: 0x08,
    mem_imm: None,
};
const ADC: AluSpec = AluSpec {
    name: "ADC",
    imm_op: 0xC0,
    has_long_imm: true,
    rr_byte: 0x88,
    rr_wide: 0x88,
    mem_src: 0x10,
    mem_dst: 0x18,
    mem_imm: None,
};
const SUB: AluSpec = AluSpec {
    name: "SUB",
    imm_op: 0xCA,
    has_long_imm: true,
    rr_byte: 0x90,
    rr_wide: 0x90,
    mem_src: 0x20,
    mem_dst: 0x28,
    mem_imm: None,
};
const SBC: AluSpec = AluSpec {
    name: "SBC",
    imm_op: 0xC2,
    has_long_imm: false,
    rr_byte: 0x98,
    rr_wide: 0x98,
    mem_src: 0x30,
    mem_dst: 0x38,
    mem_imm: None,
};
const CP: AluSpec = AluSpec {
    name: "CP",
    imm_op: 0xF8,
    has_long_imm: true,
    rr_byte: 0xB0,
    rr_wide: 0xB0,
    mem_src: 0x70,
    mem_dst: 0x78,
    mem_imm: Some((0x80, 0x38)),
};
const AND: AluSpec = AluSpec {
    name: "AND",
    imm_op: 0xCC,
    has_long_imm: true,
    rr_byte: 0xA0,
    rr_wide: 0xC0,
    mem_src: 0x40,
    mem_dst: 0x48,
    mem_imm: Some((0xB0, 0x2C)),
};
const OR: AluSpec = AluSpec {
    name: "OR",
    imm_op: 0xCE,
    has_long_imm: true,
    rr_byte: 0xA8,
    rr_wide: 0xC8,
    mem_src: 0x60,
    mem_dst: 0x68,
    mem_imm: Some((0xB0, 0x2E)),
};
const XOR: AluSpec = AluSpec {
    name: "XOR",
    imm_op: 0xD0,
    has_long_imm: true,
    rr_byte: 0xB8,
    rr_wide: 0xD0,
    mem_src: 0x80,
    mem_dst: 0x88,
    mem_imm: Some((0xB0, 0x30)),
};

pub(crate) fn encode_alu_instruction(
    mnemonic: &str,
    ops: &[Operand],
    ctx: &EncodeCtx,
    sink: &mut CodeSink,
) -> Option<Encoded> {
    let result = match mnemonic {
        "ADD" => encode_alu(&ADD, ops, ctx, sink),
        "ADC" => encode_alu(&ADC, ops, ctx, sink),
        "SUB" => encode_alu(&SUB, ops, ctx, sink),
        "SBC" => encode_alu(&SBC, ops, ctx, sink),
        "CP" => encode_alu(&CP, ops, ctx, sink),
        "AND" => encode_alu(&AND, ops, ctx, sink),
        "OR" => encode_alu(&OR, ops, ctx, sink),
        "XOR" => encode_alu(&XOR, ops, ctx, sink),
        "ADDW" => encode_word_mem_imm(ops, sink, 0x08, "ADDW"),
        "ANDW" => encode_word_mem_imm(ops, sink, 0x24, "ANDW"),
        "ORW" => encode_word_mem_imm(ops, sink, 0x2C, "ORW"),
        "XORW" => encode_word_mem_imm(ops, sink, 0x34, "XORW"),
        "CPW" => encode_word_mem_imm(ops, sink, 0x38, "CPW"),
        "INC" => encode_step(ops, sink, 0x60, "INC"),
        "DEC" => encode_step(ops, sink, 0x68, "DEC"),
        "INCW" => encode_step_word(ops, sink, 0x60, "INCW"),
        "DECW" => encode_step_word(ops, sink, 0x68, "DECW"),
        "NEG" => encode_unary_reg(ops, sink, 0x04, "NEG"),
        "CPL" => encode_unary_reg(ops, sink, 0x06, "CPL"),
        "DAA" => encode_daa(ops, sink),
        "MUL" => encode_mul(ops, sink),
        "MULS" => encode_muls(ops, sink),
        "DIV" => encode_div(ops, sink),
        "DIVS" => encode_divs(ops, sink),
        _ => return None,
    };
    Some(result)
}

fn unsupported(spec_name: &str) -> AsmError {
    fail(&format!("unsupported {spec_name} operand combination"))
}

fn encode_alu(spec: &AluSpec, ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail(&format!("{} requires two operands", spec.name)));
    }
    let dst = &ops[0];
    let src = &ops[1];

    // op reg, #imm
    if dst.mode == AddrMode::Register && src.mode == AddrMode::Immediate {
        match dst.size {
            OperandSize::Byte => {
                if let (Some(prefix), Some(code)) =
                    (dst.reg.and_then(reg8_pair_prefix), dst.reg.and_then(reg8_code))
                {
                    sink.emit_byte(prefix);
                    sink.emit_byte(spec.imm_op + (code & 1));
                    sink.emit_byte(src.value as u8);
                    return Ok(());
                }
            }
            OperandSize::Word => {
                if let Some(code) = dst.reg.and_then(reg16_code) {
                    sink.emit_byte(0xD8 + code);
                    sink.emit_byte(spec.imm_op);
                    sink.emit_word(src.value as u16);
                    return Ok(());
                }
            }
            OperandSize::Long if spec.has_long_imm => {
                if let Some(code) = dst.reg.and_then(reg32_code) {
                    sink.emit_byte(0xE8 + code);
                    sink.emit_byte(spec.imm_op);
                    sink.emit_long(src.value as u32);
                    return Ok(());
                }
            }
            _ => {}
        }
    }

    // op reg, reg
    if dst.mode == AddrMode::Register && src.mode == AddrMode::Register {
        if dst.size == OperandSize::Byte && src.size == OperandSize::Byte {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg8_code), src.reg.and_then(reg8_code))
            {
                sink.emit_byte(0xC8 + (scode >> 1));
                sink.emit_byte(
                    spec.rr_byte + ((scode & 1) << 3) + ((dcode >> 1) << 1) + (dcode & 1),
                );
                return Ok(());
            }
        }
        if dst.size == OperandSize::Word && src.size == OperandSize::Word {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg16_code), src.reg.and_then(reg16_code))
            {
                sink.emit_byte(0xD8 + scode);
                sink.emit_byte(spec.rr_wide + dcode);
                return Ok(());
            }
        }
        if dst.size == OperandSize::Long && src.size == OperandSize::Long {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg32_code), src.reg.and_then(reg32_code))
            {
                sink.emit_byte(0xE8 + scode);
                sink.emit_byte(spec.rr_wide + dcode);
                return Ok(());
            }
        }
    }

    // op reg, (mem)
    if dst.mode == AddrMode::Register && src.is_memory() {
        if let Some(code) = alu_reg_code(dst) {
            emit_mem_prefixed(sink, src_prefix_base(dst.size), src)?;
            sink.emit_byte(spec.mem_src + code);
            return Ok(());
        }
    }

    // op (mem), reg
    if dst.is_memory() && src.mode == AddrMode::Register {
        if let Some(code) = alu_reg_code(src) {
            emit_mem_prefixed(sink, DST_PREFIX_BASE, dst)?;
            sink.emit_byte(spec.mem_dst + code);
            return Ok(());
        }
    }

    // op (mem), #imm8
    if let Some((prefix, op)) = spec.mem_imm {
        if dst.is_memory() && src.mode == AddrMode::Immediate {
            sink.emit_byte(prefix);
            emit_mem_operand(sink, dst)?;
            sink.emit_byte(op);
            sink.emit_byte(src.value as u8);
            return Ok(());
        }
    }

    Err(unsupported(spec.name))
}

fn alu_reg_code(op: &Operand) -> Option<u8> {
    let reg = op.reg?;
    match op.size {
        OperandSize::Byte => reg8_code(reg),
        OperandSize::Word => reg16_code(reg),
        OperandSize::Long => reg32_code(reg),
        OperandSize::None => None,
    }
}

/// Word memory-with-immediate group (ADDW/ANDW/ORW/XORW/CPW).
fn encode_word_mem_imm(ops: &[Operand], sink: &mut CodeSink, op: u8, name: &str) -> Encoded {
    if ops.len() < 2 {
        return Err(fail(&format!("{name} requires two operands")));
    }
    let dst = &ops[0];
    let src = &ops[1];

    if dst.is_memory() && src.mode == AddrMode::Immediate {
        sink.emit_byte(0x90);
        emit_mem_operand(sink, dst)?;
        sink.emit_byte(op);
        sink.emit_word(src.value as u16);
        return Ok(());
    }

    Err(unsupported(name))
}

/// INC/DEC. Accepts `op r`, `op n, target`, and `op target, n`; the count
/// goes into the low three bits of the operation byte for the wide and
/// memory forms, and trails as its own byte for 8-bit registers.
fn encode_step(ops: &[Operand], sink: &mut CodeSink, op: u8, name: &str) -> Encoded {
    if ops.is_empty() {
        return Err(fail(&format!("{name} requires an operand")));
    }

    let mut amount: i64 = 1;
    let mut target = &ops[0];
    if ops.len() >= 2 {
        if ops[0].mode == AddrMode::Immediate {
            amount = ops[0].value;
            target = &ops[1];
        } else if ops[1].mode == AddrMode::Immediate {
            amount = ops[1].value;
        }
    }
    let amount = (amount & 7) as u8;

    if target.mode == AddrMode::Register {
        match target.size {
            OperandSize::Byte => {
                if let (Some(prefix), Some(code)) = (
                    target.reg.and_then(reg8_pair_prefix),
                    target.reg.and_then(reg8_code),
                ) {
                    sink.emit_byte(prefix);
                    sink.emit_byte(op + (code & 1));
                    sink.emit_byte(amount);
                    return Ok(());
                }
            }
            OperandSize::Word => {
                if let Some(code) = target.reg.and_then(reg16_code) {
                    sink.emit_byte(0xD8 + code);
                    sink.emit_byte(op | amount);
                    return Ok(());
                }
            }
            OperandSize::Long => {
                if let Some(code) = target.reg.and_then(reg32_code) {
                    sink.emit_byte(0xE8 + code);
                    sink.emit_byte(op | amount);
                    return Ok(());
                }
            }
            OperandSize::None => {}
        }
    }

    if target.is_memory() {
        sink.emit_byte(0x80);
        emit_mem_operand(sink, target)?;
        sink.emit_byte(op | amount);
        return Ok(());
    }

    Err(fail(&format!("unsupported {name} operand")))
}

fn encode_step_word(ops: &[Operand], sink: &mut CodeSink, op: u8, name: &str) -> Encoded {
    if ops.is_empty() {
        return Err(fail(&format!("{name} requires an operand")));
    }

    let mut amount: i64 = 1;
    let mut target = &ops[0];
    if ops.len() >= 2 && ops[0].mode == AddrMode::Immediate {
        amount = ops[0].value;
        target = &ops[1];
    }
    let amount = (amount & 7) as u8;

    if target.is_memory() {
        sink.emit_byte(0x90);
        emit_mem_operand(sink, target)?;
        sink.emit_byte(op | amount);
        return Ok(());
    }

    Err(fail(&format!("unsupported {name} operand")))
}

/// NEG/CPL over a register of any width.
fn encode_unary_reg(ops: &[Operand], sink: &mut CodeSink, op: u8, name: &str) -> Encoded {
    let target = ops
        .first()
        .ok_or_else(|| fail(&format!("{name} requires an operand")))?;

    if target.mode == AddrMode::Register {
        match target.size {
            OperandSize::Byte => {
                if let (Some(prefix), Some(code)) = (
                    target.reg.and_then(reg8_pair_prefix),
                    target.reg.and_then(reg8_code),
                ) {
                    sink.emit_byte(prefix);
                    sink.emit_byte(op + (code & 1));
                    return Ok(());
                }
            }
            OperandSize::Word => {
                if let Some(code) = target.reg.and_then(reg16_code) {
                    sink.emit_byte(0xD8 + code);
                    sink.emit_byte(op);
                    return Ok(());
                }
            }
            OperandSize::Long => {
                if let Some(code) = target.reg.and_then(reg32_code) {
                    sink.emit_byte(0xE8 + code);
                    sink.emit_byte(op);
                    return Ok(());
                }
            }
            OperandSize::None => {}
        }
    }

    Err(fail(&format!("unsupported {name} operand")))
}

fn encode_daa(ops: &[Operand], sink: &mut CodeSink) -> Encoded {
    let target = ops.first().ok_or_else(|| fail("DAA requires a register"))?;
    if target.mode != AddrMode::Register || target.size != OperandSize::Byte {
        return Err(fail("DAA requires 8-bit register"));
    }
    let code = target
        .reg
        .and_then(reg8_code)
        .ok_or_else(|| fail("invalid DAA register"))?;
    sink.emit_byte(0xC8 + (code >> 1));
    sink.emit_byte(0x10 + (code & 1));
    Ok(())
}

/// Prefix used by the 8-bit multiply/divide immediate forms; the odd
/// register of a pair selects the next prefix up.
fn muldiv_prefix8(code: u8) -> u8 {
    0xC8 + (code >> 1) + (code & 1)
}

fn encode_mul(ops: &[Operand], sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail("MUL requires two operands"));
    }
    let dst = &ops[0];
    let src = &ops[1];

    if dst.mode == AddrMode::Register && src.mode == AddrMode::Immediate {
        if dst.size == OperandSize::Byte {
            if let Some(code) = dst.reg.and_then(reg8_code) {
                sink.emit_byte(muldiv_prefix8(code));
                sink.emit_byte(0x08);
                sink.emit_byte(src.value as u8);
                return Ok(());
            }
        }
        if dst.size == OperandSize::Word {
            if let Some(code) = dst.reg.and_then(reg16_code) {
                sink.emit_byte(0xD8 + code);
                sink.emit_byte(0x08);
                sink.emit_word(src.value as u16);
                return Ok(());
            }
        }
    }

    if dst.mode == AddrMode::Register && src.mode == AddrMode::Register {
        // Word destination times byte source widens into the pair.
        if dst.size == OperandSize::Word && src.size == OperandSize::Byte {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg16_code), src.reg.and_then(reg8_code))
            {
                sink.emit_byte(0xC8 + (scode >> 1));
                sink.emit_byte(0x40 + ((scode & 1) << 3) + dcode);
                return Ok(());
            }
        }
        if dst.size == OperandSize::Word && src.size == OperandSize::Word {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg16_code), src.reg.and_then(reg16_code))
            {
                sink.emit_byte(0xD8 + scode);
                sink.emit_byte(0x40 + dcode);
                return Ok(());
            }
        }
        if dst.size == OperandSize::Long && src.size == OperandSize::Word {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg32_code), src.reg.and_then(reg16_code))
            {
                sink.emit_byte(0xD8 + scode);
                sink.emit_byte(0x48 + dcode);
                return Ok(());
            }
        }
    }

    Err(unsupported("MUL"))
}

fn encode_muls(ops: &[Operand], sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail("MULS requires two operands"));
    }
    let dst = &ops[0];
    let src = &ops[1];

    if dst.mode == AddrMode::Register && src.mode == AddrMode::Immediate {
        if dst.size == OperandSize::Byte {
            if let Some(code) = dst.reg.and_then(reg8_code) {
                sink.emit_byte(muldiv_prefix8(code));
                sink.emit_byte(0x09);
                sink.emit_byte(src.value as u8);
                return Ok(());
            }
        }
        if dst.size == OperandSize::Word {
            if let Some(code) = dst.reg.and_then(reg16_code) {
                sink.emit_byte(0xD8 + code);
                sink.emit_byte(0x09);
                sink.emit_word(src.value as u16);
                return Ok(());
            }
        }
    }

    if dst.mode == AddrMode::Register && src.mode == AddrMode::Register {
        if dst.size == OperandSize::Word && src.size == OperandSize::Word {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg16_code), src.reg.and_then(reg16_code))
            {
                sink.emit_byte(0xD8 + scode);
                sink.emit_byte(0x48 + dcode);
                return Ok(());
            }
        }
        if dst.size == OperandSize::Long && src.size == OperandSize::Word {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg32_code), src.reg.and_then(reg16_code))
            {
                sink.emit_byte(0xD8 + scode);
                sink.emit_byte(0x48 + dcode);
                return Ok(());
            }
        }
    }

    Err(unsupported("MULS"))
}

fn encode_div(ops: &[Operand], sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail("DIV requires two operands"));
    }
    let dst = &ops[0];
    let src = &ops[1];

    if dst.mode == AddrMode::Register && src.mode == AddrMode::Immediate {
        if dst.size == OperandSize::Byte {
            if let Some(code) = dst.reg.and_then(reg8_code) {
                sink.emit_byte(muldiv_prefix8(code));
                sink.emit_byte(0x0A);
                sink.emit_byte(src.value as u8);
                return Ok(());
            }
        }
        if dst.size == OperandSize::Word {
            if let Some(code) = dst.reg.and_then(reg16_code) {
                sink.emit_byte(0xD8 + code);
                sink.emit_byte(0x0A);
                sink.emit_word(src.value as u16);
                return Ok(());
            }
        }
    }

    if dst.mode == AddrMode::Register && src.mode == AddrMode::Register {
        if dst.size == OperandSize::Word && src.size == OperandSize::Word {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg16_code), src.reg.and_then(reg16_code))
            {
                sink.emit_byte(0xD8 + scode);
                sink.emit_byte(0x50 + dcode);
                return Ok(());
            }
        }
        if dst.size == OperandSize::Long && src.size == OperandSize::Word {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg32_code), src.reg.and_then(reg16_code))
            {
                sink.emit_byte(0xD8 + scode);
                sink.emit_byte(0x58 + dcode);
                return Ok(());
            }
        }
    }

    Err(unsupported("DIV"))
}

fn encode_divs(ops: &[Operand], sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail("DIVS requires two operands"));
    }
    let dst = &ops[0];
    let src = &ops[1];

    if dst.mode == AddrMode::Register
        && src.mode == AddrMode::Immediate
        && dst.size == OperandSize::Word
    {
        if let Some(code) = dst.reg.and_then(reg16_code) {
            sink.emit_byte(0xD8 + code);
            sink.emit_byte(0x0B);
            sink.emit_word(src.value as u16);
            return Ok(());
        }
    }

    if dst.mode == AddrMode::Register && src.mode == AddrMode::Register {
        if dst.size == OperandSize::Word && src.size == OperandSize::Word {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg16_code), src.reg.and_then(reg16_code))
            {
                sink.emit_byte(0xD8 + scode);
                sink.emit_byte(0x58 + dcode);
                return Ok(());
            }
        }
        if dst.size == OperandSize::Long && src.size == OperandSize::Word {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg32_code), src.reg.and_then(reg16_code))
            {
                sink.emit_byte(0xD8 + scode);
                sink.emit_byte(0x5C + dcode);
                return Ok(());
            }
        }
    }

    Err(unsupported("DIVS"))
}
