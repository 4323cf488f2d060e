// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction encoder: dispatch plus the system, stack, and control-flow
//! groups. Data movement, arithmetic/logic, and shift/bit/extension live in
//! the sibling handler files.
//!
//! Memory operands are encoded one of two ways: a standalone mem-operand
//! byte following a generic width prefix (`0x80`/`0x90`/`0xA0` source,
//! `0xB0` destination), or the compact form that merges the addressing-mode
//! bits straight into that prefix, saving a byte for the common
//! register-based modes.

use crate::core::error::{AsmError, AsmErrorKind};
use crate::core::output::CodeSink;
use crate::tlcs900::conditions::{cc_code, Condition};
use crate::tlcs900::handler_alu::encode_alu_instruction;
use crate::tlcs900::handler_bits::encode_bits_instruction;
use crate::tlcs900::handler_data::encode_data_instruction;
use crate::tlcs900::operand::{AddrMode, Operand};
use crate::tlcs900::registers::{
    reg16_code, reg32_code, reg8_code, reg8_pair_prefix, OperandSize, Register,
};

/// Outcome of an encode attempt.
#[derive(Debug)]
pub enum EncodeResult {
    /// Bytes were emitted.
    Handled,
    /// Unknown mnemonic; the caller may try macro expansion.
    Unhandled,
    /// Known mnemonic with an unencodable operand shape.
    Failed(AsmError),
}

/// Per-instruction encode context.
#[derive(Debug, Clone, Copy)]
pub struct EncodeCtx {
    /// Program counter at the start of the instruction.
    pub pc: u32,
    /// True in the emit pass; branch-range errors are only raised then.
    pub emit_pass: bool,
}

pub(crate) fn fail(msg: &str) -> AsmError {
    AsmError::new(AsmErrorKind::Encode, msg, None)
}

/// Main encoder entry: case-insensitive mnemonic dispatch.
pub fn encode_instruction(
    mnemonic: &str,
    ops: &[Operand],
    ctx: &EncodeCtx,
    sink: &mut CodeSink,
) -> EncodeResult {
    let upper = mnemonic.to_ascii_uppercase();
    let result = match upper.as_str() {
        // System
        "NOP" => encode_nop(ops, ctx, sink),
        "EI" => encode_ei(ops, ctx, sink),
        "DI" => encode_di(ops, ctx, sink),
        "HALT" => encode_halt(ops, ctx, sink),
        "SCF" => encode_fixed(sink, 0x0D),
        "RCF" => encode_fixed(sink, 0x0C),
        "CCF" => encode_fixed(sink, 0x0E),
        "ZCF" => encode_fixed(sink, 0x0F),

        // Stack
        "PUSH" => encode_push(ops, ctx, sink),
        "PUSHW" => encode_pushw(ops, ctx, sink),
        "POP" => encode_pop(ops, ctx, sink),
        "LINK" => encode_link(ops, ctx, sink),
        "UNLK" => encode_unlk(ops, ctx, sink),

        // Control flow
        "RET" => encode_ret(ops, ctx, sink),
        "RETI" => encode_fixed(sink, 0x07),
        "RETD" => encode_retd(ops, ctx, sink),
        "SWI" => encode_swi(ops, ctx, sink),
        "JP" => encode_jp(ops, ctx, sink),
        "JR" => encode_jr(ops, ctx, sink),
        "JRL" => encode_jrl(ops, ctx, sink),
        "CALL" => encode_call(ops, ctx, sink),
        "CALR" => encode_calr(ops, ctx, sink),
        "DJNZ" => encode_djnz(ops, ctx, sink),

        _ => {
            if let Some(result) = encode_data_instruction(&upper, ops, ctx, sink) {
                result
            } else if let Some(result) = encode_alu_instruction(&upper, ops, ctx, sink) {
                result
            } else if let Some(result) = encode_bits_instruction(&upper, ops, ctx, sink) {
                result
            } else {
                return EncodeResult::Unhandled;
            }
        }
    };

    match result {
        Ok(()) => EncodeResult::Handled,
        Err(err) => EncodeResult::Failed(err),
    }
}

type Encoded = Result<(), AsmError>;

// ---- shared memory-operand emission -------------------------------------

/// Base register code for memory operands: 32-bit registers first, then the
/// 16-bit set.
pub(crate) fn mem_base_code(op: &Operand) -> Option<u8> {
    op.reg.and_then(|reg| reg32_code(reg).or_else(|| reg16_code(reg)))
}

/// Auto-selected direct address width.
///
/// The `constant` gate on the 8-bit form is what keeps sizing monotonic: a
/// bare label with a small value must not take the short form, because the
/// same label may later outgrow it and the relaxation loop would oscillate.
pub(crate) fn resolve_direct_width(op: &Operand) -> u8 {
    if op.addr_size != 0 {
        return op.addr_size;
    }
    if op.value_known && op.constant && op.value <= 0xFF {
        8
    } else if op.value <= 0xFFFF {
        16
    } else {
        24
    }
}

/// Indexed displacement width: an explicit `:8`/`:16` suffix wins,
/// otherwise the value decides.
pub(crate) fn indexed_disp_is_wide(op: &Operand) -> bool {
    match op.addr_size {
        8 => false,
        16 => true,
        _ => !(-128..=127).contains(&op.value),
    }
}

/// Standalone mem-operand byte(s), used after a plain width prefix.
pub(crate) fn emit_mem_operand(sink: &mut CodeSink, op: &Operand) -> Encoded {
    match op.mode {
        AddrMode::RegIndirect => {
            let code =
                mem_base_code(op).ok_or_else(|| fail("invalid register for indirect addressing"))?;
            sink.emit_byte(code);
            Ok(())
        }
        AddrMode::PostInc => {
            let code =
                mem_base_code(op).ok_or_else(|| fail("invalid register for post-increment"))?;
            sink.emit_byte(0x40 + code);
            Ok(())
        }
        AddrMode::PreDec => {
            let code =
                mem_base_code(op).ok_or_else(|| fail("invalid register for pre-decrement"))?;
            sink.emit_byte(0x48 + code);
            Ok(())
        }
        AddrMode::Indexed => {
            let code =
                mem_base_code(op).ok_or_else(|| fail("invalid register for indexed addressing"))?;
            if indexed_disp_is_wide(op) {
                sink.emit_byte(0x58 + code);
                sink.emit_word(op.value as u16);
            } else {
                sink.emit_byte(0x50 + code);
                sink.emit_byte(op.value as u8);
            }
            Ok(())
        }
        AddrMode::IndexedReg => {
            let code =
                mem_base_code(op).ok_or_else(|| fail("invalid register for indexed addressing"))?;
            let index = op
                .index_reg
                .and_then(reg8_code)
                .ok_or_else(|| fail("invalid index register"))?;
            sink.emit_byte(0x60 + code);
            sink.emit_byte(index);
            Ok(())
        }
        AddrMode::Direct => {
            match resolve_direct_width(op) {
                8 => {
                    sink.emit_byte(0x38);
                    sink.emit_byte(op.value as u8);
                }
                16 => {
                    sink.emit_byte(0x39);
                    sink.emit_word(op.value as u16);
                }
                _ => {
                    sink.emit_byte(0x3A);
                    sink.emit_word24(op.value as u32);
                }
            }
            Ok(())
        }
        _ => Err(fail("unsupported addressing mode for memory operand")),
    }
}

/// Width prefix with the addressing mode merged in where the compact form
/// applies; otherwise the plain prefix followed by the standalone bytes.
pub(crate) fn emit_mem_prefixed(sink: &mut CodeSink, base: u8, op: &Operand) -> Encoded {
    let compact = op.reg.and_then(reg32_code);
    match (op.mode, compact) {
        (AddrMode::RegIndirect, Some(code)) => {
            sink.emit_byte(base + code);
            Ok(())
        }
        (AddrMode::Indexed, Some(code)) => {
            if indexed_disp_is_wide(op) {
                sink.emit_byte(base + 0x10 + code);
                sink.emit_word(op.value as u16);
            } else {
                sink.emit_byte(base + 0x08 + code);
                sink.emit_byte(op.value as u8);
            }
            Ok(())
        }
        (AddrMode::PreDec, Some(code)) => {
            sink.emit_byte(base + 0x28 + code);
            Ok(())
        }
        (AddrMode::PostInc, Some(code)) => {
            sink.emit_byte(base + 0x30 + code);
            Ok(())
        }
        _ => {
            sink.emit_byte(base);
            emit_mem_operand(sink, op)
        }
    }
}

/// Source-side width prefix for the compact form.
pub(crate) fn src_prefix_base(size: OperandSize) -> u8 {
    match size {
        OperandSize::Word => 0x90,
        OperandSize::Long => 0xA0,
        _ => 0x80,
    }
}

/// Destination-side width prefix (shared across widths).
pub(crate) const DST_PREFIX_BASE: u8 = 0xB0;

/// `0xF0`/`0xF1`/`0xF2` direct-address prefix plus the address bytes.
pub(crate) fn emit_direct_prefix(sink: &mut CodeSink, op: &Operand) -> Encoded {
    match resolve_direct_width(op) {
        8 => {
            sink.emit_byte(0xF0);
            sink.emit_byte(op.value as u8);
        }
        16 => {
            sink.emit_byte(0xF1);
            sink.emit_word(op.value as u16);
        }
        _ => {
            sink.emit_byte(0xF2);
            sink.emit_word24(op.value as u32);
        }
    }
    Ok(())
}

/// Leading condition operand, if any, and the remaining operands.
pub(crate) fn split_condition(ops: &[Operand]) -> (Option<Condition>, &[Operand]) {
    match ops.first() {
        Some(first) if first.mode == AddrMode::Condition && ops.len() >= 2 => {
            (first.condition, &ops[1..])
        }
        _ => (None, ops),
    }
}

// ---- system --------------------------------------------------------------

fn encode_fixed(sink: &mut CodeSink, opcode: u8) -> Encoded {
    sink.emit_byte(opcode);
    Ok(())
}

fn encode_nop(_ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    sink.emit_byte(0x00);
    Ok(())
}

fn encode_ei(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    // Without an operand, enable at level 7.
    let mut level = 7;
    if let Some(op) = ops.first() {
        if op.mode == AddrMode::Immediate {
            level = (op.value & 7) as u8;
        }
    }
    sink.emit_byte(0x03);
    sink.emit_byte(level);
    Ok(())
}

fn encode_di(_ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    sink.emit_byte(0x06);
    Ok(())
}

fn encode_halt(_ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    sink.emit_byte(0x05);
    Ok(())
}

// ---- stack ---------------------------------------------------------------

fn encode_push(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    let op = ops.first().ok_or_else(|| fail("PUSH requires an operand"))?;

    if op.mode == AddrMode::Register {
        if let Some(reg) = op.reg {
            match op.size {
                OperandSize::Word => {
                    if let Some(code) = reg16_code(reg) {
                        sink.emit_byte(0x28 + code);
                        return Ok(());
                    }
                }
                OperandSize::Long => {
                    if let Some(code) = reg32_code(reg) {
                        sink.emit_byte(0x30 + code);
                        return Ok(());
                    }
                }
                OperandSize::Byte => {
                    if let Some(prefix) = reg8_pair_prefix(reg) {
                        sink.emit_byte(prefix);
                        sink.emit_byte(0x14 + (reg8_code(reg).unwrap_or(0) & 1));
                        return Ok(());
                    }
                }
                OperandSize::None => {}
            }
            if reg == Register::F {
                sink.emit_byte(0x18);
                return Ok(());
            }
            if reg == Register::Sr {
                sink.emit_byte(0x02);
                return Ok(());
            }
        }
    }

    if op.mode == AddrMode::Immediate {
        sink.emit_byte(0x09);
        sink.emit_word(op.value as u16);
        return Ok(());
    }

    Err(fail("invalid PUSH operand"))
}

fn encode_pushw(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    let op = ops.first().ok_or_else(|| fail("PUSHW requires an operand"))?;

    if op.mode == AddrMode::Immediate {
        sink.emit_byte(0x09);
        sink.emit_word(op.value as u16);
        return Ok(());
    }

    if op.is_memory() {
        sink.emit_byte(0x90);
        emit_mem_operand(sink, op)?;
        sink.emit_byte(0x04);
        return Ok(());
    }

    Err(fail("invalid PUSHW operand"))
}

fn encode_pop(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    let op = ops.first().ok_or_else(|| fail("POP requires an operand"))?;

    if op.mode == AddrMode::Register {
        if let Some(reg) = op.reg {
            match op.size {
                OperandSize::Word => {
                    if let Some(code) = reg16_code(reg) {
                        sink.emit_byte(0x58 + code);
                        return Ok(());
                    }
                }
                OperandSize::Long => {
                    if let Some(code) = reg32_code(reg) {
                        sink.emit_byte(0x38 + code);
                        return Ok(());
                    }
                }
                _ => {}
            }
            // POP F' is deliberately not wired.
            if reg == Register::F {
                sink.emit_byte(0x1A);
                return Ok(());
            }
            if reg == Register::A {
                sink.emit_byte(0x1B);
                return Ok(());
            }
            if reg == Register::Sr {
                sink.emit_byte(0x03);
                return Ok(());
            }
        }
    }

    Err(fail("invalid POP operand"))
}

fn encode_link(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail("LINK requires register and displacement"));
    }
    if ops[0].mode != AddrMode::Register || ops[0].size != OperandSize::Long {
        return Err(fail("LINK requires 32-bit register"));
    }
    let code = ops[0]
        .reg
        .and_then(reg32_code)
        .ok_or_else(|| fail("invalid LINK register"))?;
    sink.emit_byte(0xE8 + code);
    sink.emit_byte(0x0C);
    sink.emit_word(ops[1].value as u16);
    Ok(())
}

fn encode_unlk(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    let op = ops.first().ok_or_else(|| fail("UNLK requires a register"))?;
    if op.mode != AddrMode::Register || op.size != OperandSize::Long {
        return Err(fail("UNLK requires 32-bit register"));
    }
    let code = op
        .reg
        .and_then(reg32_code)
        .ok_or_else(|| fail("invalid UNLK register"))?;
    sink.emit_byte(0xE8 + code);
    sink.emit_byte(0x0D);
    Ok(())
}

// ---- control flow --------------------------------------------------------

fn encode_ret(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if let Some(op) = ops.first() {
        if op.mode == AddrMode::Condition {
            let cc = op.condition.unwrap_or(Condition::T);
            sink.emit_byte(0xB0 + cc_code(cc));
            return Ok(());
        }
    }
    sink.emit_byte(0x0E);
    Ok(())
}

fn encode_retd(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    let op = ops.first().ok_or_else(|| fail("RETD requires displacement"))?;
    sink.emit_byte(0x0F);
    sink.emit_word(op.value as u16);
    Ok(())
}

fn encode_swi(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    let op = ops
        .first()
        .ok_or_else(|| fail("SWI requires interrupt number"))?;
    sink.emit_byte(0xF8 + (op.value & 7) as u8);
    Ok(())
}

fn encode_jp(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.is_empty() {
        return Err(fail("JP requires an operand"));
    }
    let (cond, rest) = split_condition(ops);
    let target = &rest[0];

    if target.mode == AddrMode::Immediate {
        // Width tracks only the address magnitude so relaxed sizes stay
        // stable once label values settle.
        let short = target.value >= 0 && target.value <= 0xFFFF;
        match cond {
            Some(cc) => {
                if short {
                    sink.emit_byte(0xA0 + cc_code(cc));
                    sink.emit_word(target.value as u16);
                } else {
                    sink.emit_byte(0xB0 + cc_code(cc));
                    sink.emit_word24(target.value as u32);
                }
            }
            None => {
                if short {
                    sink.emit_byte(0x1A);
                    sink.emit_word(target.value as u16);
                } else {
                    sink.emit_byte(0x1B);
                    sink.emit_word24(target.value as u32);
                }
            }
        }
        return Ok(());
    }

    if target.is_memory() {
        let cc = cond.unwrap_or(Condition::T);
        sink.emit_byte(0xB4);
        emit_mem_operand(sink, target)?;
        sink.emit_byte(0xD0 + cc_code(cc));
        return Ok(());
    }

    Err(fail("invalid JP operand"))
}

fn encode_jr(ops: &[Operand], ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.is_empty() {
        return Err(fail("JR requires an operand"));
    }
    let (cond, rest) = split_condition(ops);
    let cc = cond.unwrap_or(Condition::T);
    let target = &rest[0];

    if target.mode != AddrMode::Immediate {
        return Err(fail("JR requires an immediate target"));
    }

    let offset = target.value - (ctx.pc as i64 + 2);

    // Sizing must always account two bytes so forward references cannot
    // perturb the relaxation fixed point; the range check waits for emit.
    if ctx.emit_pass && !(-128..=127).contains(&offset) {
        return Err(fail("JR offset out of range (use JRL for longer jumps)"));
    }
    sink.emit_byte(0x60 + cc_code(cc));
    sink.emit_byte(offset as u8);
    Ok(())
}

fn encode_jrl(ops: &[Operand], ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.is_empty() {
        return Err(fail("JRL requires an operand"));
    }
    let (cond, rest) = split_condition(ops);
    let cc = cond.unwrap_or(Condition::T);
    let target = &rest[0];

    if target.mode != AddrMode::Immediate {
        return Err(fail("JRL requires an immediate target"));
    }

    let offset = target.value - (ctx.pc as i64 + 3);
    sink.emit_byte(0x70 + cc_code(cc));
    sink.emit_word(offset as u16);
    Ok(())
}

fn encode_call(ops: &[Operand], _ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.is_empty() {
        return Err(fail("CALL requires an operand"));
    }
    let (cond, rest) = split_condition(ops);
    let cc = cond.unwrap_or(Condition::T);
    let target = &rest[0];

    if target.mode == AddrMode::Immediate {
        sink.emit_byte(0x9A + cc_code(cc));
        sink.emit_word24(target.value as u32);
        return Ok(());
    }

    if target.mode == AddrMode::Register && target.size == OperandSize::Long {
        if let Some(code) = target.reg.and_then(reg32_code) {
            sink.emit_byte(0xE8 + code);
            sink.emit_byte(0x90 + cc_code(cc));
            return Ok(());
        }
    }

    if target.is_memory() {
        sink.emit_byte(0xB4);
        emit_mem_operand(sink, target)?;
        sink.emit_byte(0xD1 + cc_code(cc));
        return Ok(());
    }

    Err(fail("invalid CALL operand"))
}

fn encode_calr(ops: &[Operand], ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    let op = ops.first().ok_or_else(|| fail("CALR requires an operand"))?;
    if op.mode != AddrMode::Immediate {
        return Err(fail("CALR requires an immediate target"));
    }
    let offset = op.value - (ctx.pc as i64 + 3);
    sink.emit_byte(0x1E);
    sink.emit_word(offset as u16);
    Ok(())
}

fn encode_djnz(ops: &[Operand], ctx: &EncodeCtx, sink: &mut CodeSink) -> Encoded {
    if ops.len() < 2 {
        return Err(fail("DJNZ requires register and target"));
    }
    if ops[0].mode != AddrMode::Register {
        return Err(fail("DJNZ first operand must be a register"));
    }

    let offset = ops[1].value - (ctx.pc as i64 + 3);

    match ops[0].size {
        OperandSize::Byte => {
            if let Some(code) = ops[0].reg.and_then(reg8_code) {
                sink.emit_byte(0xC8 + (code >> 1));
                sink.emit_byte(0x1C + (code & 1));
                sink.emit_byte(offset as u8);
                return Ok(());
            }
        }
        OperandSize::Word => {
            if let Some(code) = ops[0].reg.and_then(reg16_code) {
                sink.emit_byte(0xD8 + code);
                sink.emit_byte(0x1C);
                sink.emit_byte(offset as u8);
                return Ok(());
            }
        }
        _ => {}
    }

    Err(fail("invalid DJNZ register"))
}
