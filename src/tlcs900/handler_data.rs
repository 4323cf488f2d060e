// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Data movement encoders: LD and friends, exchanges, block transfers, and
//! the control-register loads.

use crate::core::error::AsmError;
use crate::core::output::CodeSink;
use crate::tlcs900::handler::{
    emit_direct_prefix, emit_mem_operand, emit_mem_prefixed, fail, src_prefix_base, EncodeCtx,
    DST_PREFIX_BASE,
};
use crate::tlcs900::operand::{AddrMode, Operand};
use crate::tlcs900::registers::{
    lookup_control_register, reg16_code, reg32_code, reg8_code, reg8_pair_prefix, OperandSize,
};

type Encoded = Result<(), AsmError>;

/// Dispatch for the data-movement group. `None` means the mnemonic is not
/// in this group.
pub(crate) fn encode_data_instruction(
    mnemonic: &str,
    ops: &[Operand],
    ctx: &EncodeCtx,
    sink: &mut CodeSink,
) -> Option<Encoded> {
    let result = match mnemonic {
        "LD" => encode_ld(ops, ctx, sink),
        "LDW" => encode_ldw(ops, ctx, sink),
        "LDA" => encode_lda(ops, ctx, sink),
        "LDC" => encode_ldc(ops, ctx, sink),
        "LDI" => encode_block(sink, 0x85, 0x10),
        "LDIR" => encode_block(sink, 0x85, 0x11),
        "LDDR" => encode_block(sink, 0x85, 0x13),
        "LDIW" => encode_block(sink, 0x95, 0x10),
        "LDIRW" => encode_block(sink, 0x95, 0x11),
        "LDDRW" => encode_block(sink, 0x95, 0x13),
        "EX" => encode_ex(ops, ctx, sink),
        _ => return None,
    };
    Some(result)
}

/// Operation byte for a register after a memory prefix: load direction.
const OP_LOAD: u8 = 0x20;
/// Store direction.
const OP_STORE: u8 = 0x48;
/// Exchange.
const OP_EXCHANGE: u8 = 0x30;

fn data_reg_code(op: &Operand) -> Option<u8> {
    let reg = op.reg?;
    match op.size {
        OperandSize::Byte => reg8_code(reg),
        OperandSize::Word => reg16_code(reg),
        OperandSize::Long => reg32_code(reg),
        OperandSize::None => None,
    }
}

/// Direct-store operation byte selecting data width and register.
fn direct_store_op(op: &Operand) -> Option<u8> {
    let code = data_reg_code(op)?;
    let base = match op.size {
        OperandSize::Byte => 0x40,
        OperandSize::Word => 0x50,
        OperandSize::Long => 0x60,
        OperandSize::None => return None,
    };
    Some(base + code)
}

fn encode_ld(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail("LD requires two operands"));
    }
    let dst = &ops[0];
    let src = &ops[1];

    // LD reg, #imm
    if dst.mode == AddrMode::Register && src.mode == AddrMode::Immediate {
        match dst.size {
            OperandSize::Byte => {
                if let Some(code) = dst.reg.and_then(reg8_code) {
                    if code < 8 {
                        // Short form for the current-bank registers.
                        sink.emit_byte(0x20 + code);
                        sink.emit_byte(src.value as u8);
                    } else {
                        let prefix = dst
                            .reg
                            .and_then(reg8_pair_prefix)
                            .ok_or_else(|| fail("unsupported LD operand combination"))?;
                        sink.emit_byte(prefix);
                        sink.emit_byte(0x30 + (code & 1));
                        sink.emit_byte(src.value as u8);
                    }
                    return Ok(());
                }
            }
            OperandSize::Word => {
                if let Some(code) = dst.reg.and_then(reg16_code) {
                    if code < 8 {
                        // Two-byte mini form for resolved constants 0..7;
                        // gated on `constant` so sizing never flips between
                        // the 2- and 3-byte encodings.
                        if src.value_known && src.constant && (0..=7).contains(&src.value) {
                            sink.emit_byte(0xD8 + code);
                            sink.emit_byte(0xA8 + src.value as u8);
                        } else {
                            sink.emit_byte(0x30 + code);
                            sink.emit_word(src.value as u16);
                        }
                    } else {
                        sink.emit_byte(0xD8 + code);
                        sink.emit_byte(0x30);
                        sink.emit_word(src.value as u16);
                    }
                    return Ok(());
                }
            }
            OperandSize::Long => {
                if let Some(code) = dst.reg.and_then(reg32_code) {
                    sink.emit_byte(0x40 + code);
                    sink.emit_long(src.value as u32);
                    return Ok(());
                }
            }
            OperandSize::None => {}
        }
    }

    // LD reg, reg
    if dst.mode == AddrMode::Register && src.mode == AddrMode::Register {
        if dst.size == OperandSize::Byte && src.size == OperandSize::Byte {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg8_code), src.reg.and_then(reg8_code))
            {
                sink.emit_byte(0xC8 + (scode >> 1));
                sink.emit_byte(0x20 + ((scode & 1) << 3) + ((dcode >> 1) << 1) + (dcode & 1));
                return Ok(());
            }
        }
        if dst.size == OperandSize::Word && src.size == OperandSize::Word {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg16_code), src.reg.and_then(reg16_code))
            {
                sink.emit_byte(0xD8 + scode);
                sink.emit_byte(0x28 + dcode);
                return Ok(());
            }
        }
        if dst.size == OperandSize::Long && src.size == OperandSize::Long {
            if let (Some(dcode), Some(scode)) =
                (dst.reg.and_then(reg32_code), src.reg.and_then(reg32_code))
            {
                sink.emit_byte(0xE8 + scode);
                sink.emit_byte(0x28 + dcode);
                return Ok(());
            }
        }
    }

    // LD reg, (mem)
    if dst.mode == AddrMode::Register && src.is_memory() {
        if let Some(code) = data_reg_code(dst) {
            emit_mem_prefixed(sink, src_prefix_base(dst.size), src)?;
            sink.emit_byte(OP_LOAD + code);
            return Ok(());
        }
    }

    // LD (mem), reg
    if dst.is_memory() && src.mode == AddrMode::Register {
        if let Some(op_byte) = direct_store_op(src) {
            if dst.mode == AddrMode::Direct {
                emit_direct_prefix(sink, dst)?;
                sink.emit_byte(op_byte);
                return Ok(());
            }
        }
        if let Some(code) = data_reg_code(src) {
            emit_mem_prefixed(sink, DST_PREFIX_BASE, dst)?;
            sink.emit_byte(OP_STORE + code);
            return Ok(());
        }
    }

    // LD (mem), #imm (byte)
    if dst.is_memory() && src.mode == AddrMode::Immediate {
        sink.emit_byte(0x80);
        emit_mem_operand(sink, dst)?;
        sink.emit_byte(0x00);
        sink.emit_byte(src.value as u8);
        return Ok(());
    }

    // Memory-to-memory transfers do not exist on this CPU.
    Err(fail("unsupported LD operand combination"))
}

fn encode_ldw(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail("LDW requires two operands"));
    }
    let dst = &ops[0];
    let src = &ops[1];

    // LDW (mem), #imm16
    if dst.is_memory() && src.mode == AddrMode::Immediate {
        sink.emit_byte(0x90);
        emit_mem_operand(sink, dst)?;
        sink.emit_byte(0x00);
        sink.emit_word(src.value as u16);
        return Ok(());
    }

    // LDW reg16, (mem)
    if dst.mode == AddrMode::Register && dst.size == OperandSize::Word && src.is_memory() {
        if let Some(code) = dst.reg.and_then(reg16_code) {
            emit_mem_prefixed(sink, 0x90, src)?;
            sink.emit_byte(OP_LOAD + code);
            return Ok(());
        }
    }

    // LDW (mem), reg16
    if dst.is_memory() && src.mode == AddrMode::Register && src.size == OperandSize::Word {
        if let Some(code) = src.reg.and_then(reg16_code) {
            if dst.mode == AddrMode::Direct {
                emit_direct_prefix(sink, dst)?;
                sink.emit_byte(0x50 + code);
                return Ok(());
            }
            emit_mem_prefixed(sink, DST_PREFIX_BASE, dst)?;
            sink.emit_byte(OP_STORE + code);
            return Ok(());
        }
    }

    Err(fail("unsupported LDW operand combination"))
}

fn encode_lda(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail("LDA requires two operands"));
    }
    let dst = &ops[0];
    let src = &ops[1];

    if dst.mode != AddrMode::Register || dst.size != OperandSize::Long {
        return Err(fail("LDA destination must be 32-bit register"));
    }
    let dcode = dst
        .reg
        .and_then(reg32_code)
        .ok_or_else(|| fail("invalid LDA destination register"))?;

    if src.is_memory() {
        sink.emit_byte(0xF5);
        emit_mem_operand(sink, src)?;
        sink.emit_byte(0x30 + dcode);
        return Ok(());
    }

    // LDA xrr, expr is the direct-address form without parentheses.
    if src.mode == AddrMode::Immediate {
        let mut direct = src.clone();
        direct.mode = AddrMode::Direct;
        sink.emit_byte(0xF5);
        emit_mem_operand(sink, &direct)?;
        sink.emit_byte(0x30 + dcode);
        return Ok(());
    }

    if src.mode == AddrMode::Register && src.size == OperandSize::Long {
        // With a trailing displacement operand, treat as indexed.
        let mut mem = src.clone();
        if let Some(offset) = ops.get(2).filter(|op| op.mode == AddrMode::Immediate) {
            mem.mode = AddrMode::Indexed;
            mem.value = offset.value;
            mem.value_known = offset.value_known;
            mem.constant = offset.constant;
        } else {
            mem.mode = AddrMode::RegIndirect;
        }
        sink.emit_byte(0xF5);
        emit_mem_operand(sink, &mem)?;
        sink.emit_byte(0x30 + dcode);
        return Ok(());
    }

    Err(fail("unsupported LDA operand combination"))
}

fn encode_ldc(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail("LDC requires two operands"));
    }

    let control_of = |op: &Operand| {
        op.symbol_name
            .as_deref()
            .and_then(lookup_control_register)
            .filter(|_| op.mode == AddrMode::Immediate)
    };

    // LDC cr, r stores to the control register; LDC r, cr loads from it.
    let (cr, reg_op, op_byte) = if let Some((cr, _)) = control_of(&ops[0]) {
        (cr, &ops[1], 0x2E)
    } else if let Some((cr, _)) = control_of(&ops[1]) {
        (cr, &ops[0], 0x2F)
    } else {
        return Err(fail("unsupported LDC operand combination"));
    };

    if reg_op.mode != AddrMode::Register {
        return Err(fail("unsupported LDC operand combination"));
    }
    let prefix = match reg_op.size {
        OperandSize::Byte => reg_op.reg.and_then(reg8_code).map(|c| 0xC8 + c),
        OperandSize::Word => reg_op.reg.and_then(reg16_code).map(|c| 0xD8 + c),
        OperandSize::Long => reg_op.reg.and_then(reg32_code).map(|c| 0xE8 + c),
        OperandSize::None => None,
    }
    .ok_or_else(|| fail("unsupported LDC operand combination"))?;

    sink.emit_byte(prefix);
    sink.emit_byte(op_byte);
    sink.emit_byte(cr);
    Ok(())
}

fn encode_block(sink: &mut CodeSink, prefix: u8, op: u8) -> Encoded {
    // Operand forms like (XDE+),(XHL+) are fixed by the instruction and
    // accepted without checking.
    sink.emit_byte(prefix);
    sink.emit_byte(op);
    Ok(())
}

fn encode_ex(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail("EX requires two operands"));
    }

    // EX (mem), reg
    if ops[0].is_memory() && ops[1].mode == AddrMode::Register {
        if let Some(code) = data_reg_code(&ops[1]) {
            sink.emit_byte(src_prefix_base(ops[1].size));
            emit_mem_operand(sink, &ops[0])?;
            sink.emit_byte(OP_EXCHANGE + code);
            return Ok(());
        }
    }

    // EX reg, reg
    if ops[0].mode == AddrMode::Register && ops[1].mode == AddrMode::Register {
        if ops[0].size == OperandSize::Byte && ops[1].size == OperandSize::Byte {
            if let (Some(code0), Some(code1)) = (
                ops[0].reg.and_then(reg8_code),
                ops[1].reg.and_then(reg8_code),
            ) {
                sink.emit_byte(0xC8 + (code1 >> 1));
                sink.emit_byte(0x38 + ((code1 & 1) << 3) + ((code0 >> 1) << 1) + (code0 & 1));
                return Ok(());
            }
        }
        if ops[0].size == OperandSize::Word && ops[1].size == OperandSize::Word {
            if let (Some(code0), Some(code1)) = (
                ops[0].reg.and_then(reg16_code),
                ops[1].reg.and_then(reg16_code),
            ) {
                sink.emit_byte(0xD8 + code1);
                sink.emit_byte(0x38 + code0);
                return Ok(());
            }
        }
    }

    // EX F,F' is left unencoded; the alternate-bank flag exchange is not
    // wired.
    Err(fail("unsupported EX operand combination"))
}
