// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! End-to-end tests: whole programs through the sizing iterations and the
//! emit pass, asserting exact output bytes.

use super::engine::Assembler;
use super::passes::AssemblyResult;
use crate::core::symbol_table::SymbolKind;

fn assemble_with(src: &str) -> (AssemblyResult, Assembler) {
    let mut assembler = Assembler::new();
    let result = assembler.assemble_source("test.asm", src);
    (result, assembler)
}

fn assemble(src: &str) -> Vec<u8> {
    let (result, assembler) = assemble_with(src);
    assert!(
        result.success,
        "assembly failed: {:?}",
        assembler
            .diagnostics
            .iter()
            .map(|d| d.format())
            .collect::<Vec<_>>()
    );
    assembler.image.data().to_vec()
}

fn assemble_err(src: &str) -> Vec<String> {
    let (result, assembler) = assemble_with(src);
    assert!(!result.success, "assembly unexpectedly succeeded");
    assembler
        .diagnostics
        .iter()
        .map(|d| d.error.message().to_string())
        .collect()
}

/// Assemble a single instruction at ORG 0 and return its bytes.
fn encode(line: &str) -> Vec<u8> {
    assemble(&format!("\tORG 0\n\t{line}\n"))
}

fn encode_err(line: &str) -> Vec<String> {
    assemble_err(&format!("\tORG 0\n\t{line}\n"))
}

// ---- scenarios ----------------------------------------------------------

#[test]
fn nop_is_one_zero_byte() {
    assert_eq!(encode("NOP"), vec![0x00]);
}

#[test]
fn ld_byte_register_immediate_short_form() {
    // Reg code A=1 selects 0x20+1.
    let (result, assembler) = assemble_with("\tORG 100H\n\tLD A, #5\n");
    assert!(result.success);
    assert_eq!(assembler.image.base(), 0x100);
    assert_eq!(assembler.image.data(), &[0x21, 0x05]);
}

#[test]
fn ld_long_register_immediate() {
    assert_eq!(
        encode("LD XWA, #12345678H"),
        vec![0x40, 0x78, 0x56, 0x34, 0x12]
    );
}

#[test]
fn jr_backward() {
    // disp = target - (pc + 2) = 0 - 3.
    let bytes = assemble("\tORG 0\nLOOP: NOP\n\tJR LOOP\n");
    assert_eq!(bytes, vec![0x00, 0x68, 0xFD]);
}

#[test]
fn jr_forward_reference() {
    let bytes = assemble("\tORG 0\n\tJR FWD\n\tNOP\nFWD: NOP\n");
    assert_eq!(bytes, vec![0x68, 0x01, 0x00, 0x00]);
}

#[test]
fn db_with_strings() {
    let bytes = assemble("\tORG 0\n\tDB 1,2,\"AB\",3\n");
    assert_eq!(bytes, vec![0x01, 0x02, 0x41, 0x42, 0x03]);
}

#[test]
fn dw_with_equ_expression() {
    let bytes = assemble("\tORG 0\nX EQU 5\n\tDW X*2+1\n");
    assert_eq!(bytes, vec![0x0B, 0x00]);
}

#[test]
fn forward_equ_widens_direct_form_and_converges() {
    let src = "\tORG 0\n\tLD WA, (SYM)\n\tNOP\nSYM EQU 12000H\n";
    let (result, assembler) = assemble_with(src);
    assert!(result.success);
    // 24-bit direct form once SYM is known.
    assert_eq!(
        assembler.image.data(),
        &[0x90, 0x3A, 0x00, 0x20, 0x01, 0x20, 0x00]
    );
    assert!(
        result.sizing_iterations <= 3,
        "took {} iterations",
        result.sizing_iterations
    );
}

// ---- direct address width selection -------------------------------------

#[test]
fn constant_byte_address_takes_short_direct_form() {
    assert_eq!(encode("LD (0FFH), A"), vec![0xF0, 0xFF, 0x41]);
}

#[test]
fn label_address_never_takes_short_direct_form() {
    // L is 0 here, but labels are not constants; the 16-bit floor keeps
    // sizing monotonic.
    let bytes = assemble("\tORG 0\nL: LD (L), A\n");
    assert_eq!(bytes, vec![0xF1, 0x00, 0x00, 0x41]);
}

#[test]
fn wide_address_takes_24_bit_direct_form() {
    assert_eq!(encode("LD (10000H), A"), vec![0xF2, 0x00, 0x00, 0x01, 0x41]);
}

#[test]
fn explicit_addr_size_suffix_overrides_auto_selection() {
    assert_eq!(encode("LD (20H:16), A"), vec![0xF1, 0x20, 0x00, 0x41]);
}

// ---- LD family -----------------------------------------------------------

#[test]
fn ld_word_register_immediate() {
    assert_eq!(encode("LD WA, #1234H"), vec![0x30, 0x34, 0x12]);
}

#[test]
fn ld_word_register_small_constant_mini_form() {
    assert_eq!(encode("LD BC, #3"), vec![0xD9, 0xAB]);
}

#[test]
fn ld_word_register_label_avoids_mini_form() {
    // A small label value must not shrink the encoding: labels are not
    // constants, so the full immediate form stays in force.
    let bytes = assemble("\tORG 0\n\tLD BC, L\nL: NOP\n");
    assert_eq!(bytes, vec![0x31, 0x03, 0x00, 0x00]);
}

#[test]
fn ld_q_bank_byte_register_uses_pair_prefix() {
    assert_eq!(encode("LD QB, #5"), vec![0xD9, 0x30, 0x05]);
}

#[test]
fn ld_register_to_register() {
    assert_eq!(encode("LD A, B"), vec![0xC9, 0x21]);
    assert_eq!(encode("LD WA, BC"), vec![0xD9, 0x28]);
    assert_eq!(encode("LD XWA, XBC"), vec![0xE9, 0x28]);
}

#[test]
fn ld_register_from_memory_compact_forms() {
    assert_eq!(encode("LD A, (XHL)"), vec![0x83, 0x21]);
    assert_eq!(encode("LD WA, (XIX+4)"), vec![0x9C, 0x04, 0x20]);
    assert_eq!(encode("LD XWA, (XHL)"), vec![0xA3, 0x20]);
    // 16-bit displacement widens the mode bits.
    assert_eq!(encode("LD A, (XIX+200H)"), vec![0x94, 0x00, 0x02, 0x21]);
    assert_eq!(encode("LD A, (XHL+)"), vec![0xB3, 0x21]);
    assert_eq!(encode("LD A, (-XHL)"), vec![0xAB, 0x21]);
}

#[test]
fn ld_memory_store_compact_forms() {
    assert_eq!(encode("LD (XHL), A"), vec![0xB3, 0x49]);
    assert_eq!(encode("LD (XHL), WA"), vec![0xB3, 0x48]);
}

#[test]
fn ld_direct_store_prefix_forms() {
    assert_eq!(encode("LD (80H), A"), vec![0xF0, 0x80, 0x41]);
    assert_eq!(encode("LD (1234H), WA"), vec![0xF1, 0x34, 0x12, 0x50]);
    assert_eq!(encode("LD (1234H), XWA"), vec![0xF1, 0x34, 0x12, 0x60]);
}

#[test]
fn ld_register_from_direct_memory() {
    assert_eq!(encode("LD A, (80H)"), vec![0x80, 0x38, 0x80, 0x21]);
}

#[test]
fn ld_memory_immediate() {
    assert_eq!(encode("LD (XHL), #7"), vec![0x80, 0x03, 0x00, 0x07]);
}

#[test]
fn ld_indexed_by_register() {
    assert_eq!(encode("LD A, (XIX+B)"), vec![0x80, 0x64, 0x02, 0x21]);
}

#[test]
fn ld_memory_to_memory_is_unsupported() {
    let errors = encode_err("LD (100H), (200H)");
    assert!(errors
        .iter()
        .any(|m| m.contains("unsupported LD operand combination")));
}

#[test]
fn ldw_forms() {
    assert_eq!(encode("LDW (XHL), #1234H"), vec![0x90, 0x03, 0x00, 0x34, 0x12]);
    assert_eq!(encode("LDW WA, (XIX)"), vec![0x94, 0x20]);
    assert_eq!(encode("LDW (1000H), BC"), vec![0xF1, 0x00, 0x10, 0x51]);
}

#[test]
fn lda_forms() {
    assert_eq!(encode("LDA XHL, 1000H"), vec![0xF5, 0x39, 0x00, 0x10, 0x33]);
    assert_eq!(encode("LDA XIX, (XHL)"), vec![0xF5, 0x03, 0x34]);
    assert_eq!(encode("LDA XIX, XHL"), vec![0xF5, 0x03, 0x34]);
}

#[test]
fn ldc_control_register_forms() {
    assert_eq!(encode("LDC DMAM0, A"), vec![0xC9, 0x2E, 0x22]);
    assert_eq!(encode("LDC INTNEST, WA"), vec![0xD8, 0x2E, 0x3C]);
    assert_eq!(encode("LDC XWA, DMAS0"), vec![0xE8, 0x2F, 0x00]);
    assert_eq!(encode("LDC DMAC2, BC"), vec![0xD9, 0x2E, 0x28]);
}

#[test]
fn block_transfers() {
    assert_eq!(encode("LDI"), vec![0x85, 0x10]);
    assert_eq!(encode("LDIR"), vec![0x85, 0x11]);
    assert_eq!(encode("LDDR"), vec![0x85, 0x13]);
    assert_eq!(encode("LDIW"), vec![0x95, 0x10]);
    assert_eq!(encode("LDIRW"), vec![0x95, 0x11]);
    assert_eq!(encode("LDDRW"), vec![0x95, 0x13]);
}

#[test]
fn ex_forms() {
    assert_eq!(encode("EX A, B"), vec![0xC9, 0x39]);
    assert_eq!(encode("EX WA, BC"), vec![0xD9, 0x38]);
    assert_eq!(encode("EX (XHL), A"), vec![0x80, 0x03, 0x31]);
}

#[test]
fn ex_alternate_flags_is_not_wired() {
    let errors = encode_err("EX F, F'");
    assert!(errors
        .iter()
        .any(|m| m.contains("unsupported EX operand combination")));
}

// ---- arithmetic and logic ------------------------------------------------

#[test]
fn add_forms() {
    assert_eq!(encode("ADD A, #1"), vec![0xC8, 0xC9, 0x01]);
    assert_eq!(encode("ADD WA, #1234H"), vec![0xD8, 0xC8, 0x34, 0x12]);
    assert_eq!(
        encode("ADD XWA, #10H"),
        vec![0xE8, 0xC8, 0x10, 0x00, 0x00, 0x00]
    );
    assert_eq!(encode("ADD WA, BC"), vec![0xD9, 0x80]);
    assert_eq!(encode("ADD A, (XHL)"), vec![0x83, 0x01]);
    assert_eq!(encode("ADD (XHL), A"), vec![0xB3, 0x09]);
}

#[test]
fn sub_and_compare_forms() {
    assert_eq!(encode("SUB A, #2"), vec![0xC8, 0xCB, 0x02]);
    assert_eq!(encode("SUB WA, BC"), vec![0xD9, 0x90]);
    assert_eq!(encode("CP A, #5"), vec![0xC8, 0xF9, 0x05]);
    assert_eq!(encode("CP WA, BC"), vec![0xD9, 0xB0]);
    assert_eq!(encode("CP A, (XHL)"), vec![0x83, 0x71]);
    assert_eq!(encode("CP (XHL), #3"), vec![0x80, 0x03, 0x38, 0x03]);
}

#[test]
fn carry_arithmetic_forms() {
    assert_eq!(encode("ADC A, #1"), vec![0xC8, 0xC1, 0x01]);
    assert_eq!(encode("ADC WA, BC"), vec![0xD9, 0x88]);
    assert_eq!(encode("SBC A, #1"), vec![0xC8, 0xC3, 0x01]);
    assert_eq!(encode("SBC WA, BC"), vec![0xD9, 0x98]);
}

#[test]
fn logical_forms() {
    assert_eq!(encode("AND A, #0FH"), vec![0xC8, 0xCD, 0x0F]);
    assert_eq!(encode("AND WA, BC"), vec![0xD9, 0xC0]);
    assert_eq!(encode("OR A, #1"), vec![0xC8, 0xCF, 0x01]);
    assert_eq!(encode("XOR A, #0FFH"), vec![0xC8, 0xD1, 0xFF]);
    assert_eq!(encode("AND (XHL), #0F0H"), vec![0xB0, 0x03, 0x2C, 0xF0]);
    assert_eq!(encode("OR (XHL), #1"), vec![0xB0, 0x03, 0x2E, 0x01]);
    assert_eq!(encode("XOR (XHL), #1"), vec![0xB0, 0x03, 0x30, 0x01]);
}

#[test]
fn word_memory_immediate_group() {
    assert_eq!(encode("ADDW (XHL), #1"), vec![0x90, 0x03, 0x08, 0x01, 0x00]);
    assert_eq!(
        encode("ANDW (1000H), #0FFFFH"),
        vec![0x90, 0x39, 0x00, 0x10, 0x24, 0xFF, 0xFF]
    );
    assert_eq!(encode("ORW (XHL), #2"), vec![0x90, 0x03, 0x2C, 0x02, 0x00]);
    assert_eq!(
        encode("XORW (XHL), #0F0FH"),
        vec![0x90, 0x03, 0x34, 0x0F, 0x0F]
    );
    assert_eq!(encode("CPW (XIX), #2"), vec![0x90, 0x04, 0x38, 0x02, 0x00]);
}

#[test]
fn increment_and_decrement() {
    assert_eq!(encode("INC WA"), vec![0xD8, 0x61]);
    assert_eq!(encode("INC 2, WA"), vec![0xD8, 0x62]);
    assert_eq!(encode("INC B"), vec![0xC9, 0x60, 0x01]);
    assert_eq!(encode("DEC XSP"), vec![0xEF, 0x69]);
    assert_eq!(encode("INC (XHL)"), vec![0x80, 0x03, 0x61]);
    assert_eq!(encode("INCW (XHL)"), vec![0x90, 0x03, 0x61]);
    assert_eq!(encode("DECW 2, (XHL)"), vec![0x90, 0x03, 0x6A]);
}

#[test]
fn unary_arithmetic() {
    assert_eq!(encode("NEG WA"), vec![0xD8, 0x04]);
    assert_eq!(encode("CPL A"), vec![0xC8, 0x07]);
    assert_eq!(encode("DAA A"), vec![0xC8, 0x11]);
    assert_eq!(encode("EXTZ WA"), vec![0xD8, 0x12]);
    assert_eq!(encode("EXTS XBC"), vec![0xE9, 0x13]);
}

#[test]
fn multiply_and_divide() {
    assert_eq!(encode("MUL WA, #10"), vec![0xD8, 0x08, 0x0A, 0x00]);
    assert_eq!(encode("MUL WA, BC"), vec![0xD9, 0x40]);
    assert_eq!(encode("MUL XDE, BC"), vec![0xD9, 0x4A]);
    assert_eq!(encode("MULS WA, BC"), vec![0xD9, 0x48]);
    assert_eq!(encode("DIV WA, BC"), vec![0xD9, 0x50]);
    assert_eq!(encode("DIVS WA, BC"), vec![0xD9, 0x58]);
    assert_eq!(encode("DIVS XWA, BC"), vec![0xD9, 0x5C]);
}

// ---- shifts and bit operations -------------------------------------------

#[test]
fn shift_and_rotate() {
    assert_eq!(encode("RLC 3, A"), vec![0xC8, 0xE9, 0x03]);
    assert_eq!(encode("RRC W"), vec![0xC8, 0xE9, 0x01]);
    assert_eq!(encode("SLA XBC"), vec![0xE9, 0xEC, 0x01]);
    assert_eq!(encode("SRL 4, WA"), vec![0xD8, 0xEF, 0x04]);
}

#[test]
fn bit_operations_on_registers() {
    assert_eq!(encode("BIT 3, A"), vec![0xC8, 0x59, 0x03]);
    assert_eq!(encode("SET 2, A"), vec![0xC8, 0x71, 0x02]);
    assert_eq!(encode("SET 12, WA"), vec![0xE8, 0x30, 0x0C]);
    // RES takes the full register prefix.
    assert_eq!(encode("RES 4, A"), vec![0xC9, 0x30, 0x04]);
    assert_eq!(encode("RES 9, BC"), vec![0xE9, 0x38, 0x09]);
    assert_eq!(encode("TSET 1, A"), vec![0xC8, 0xA1, 0x01]);
    assert_eq!(encode("CHG 0, B"), vec![0xC9, 0xA8, 0x00]);
}

#[test]
fn bit_operations_on_memory() {
    assert_eq!(encode("BIT 5, (XIX)"), vec![0xB0, 0x04, 0xC5]);
    assert_eq!(encode("SET 1, (1000H)"), vec![0xF1, 0x00, 0x10, 0xB9]);
    assert_eq!(encode("RES 2, (0FF00H)"), vec![0xF1, 0x00, 0xFF, 0xB2]);
    assert_eq!(encode("BIT 7, (40H)"), vec![0xF0, 0x40, 0xCF]);
}

#[test]
fn carry_flag_bit_transfers() {
    assert_eq!(encode("STCF 3, A"), vec![0xC8, 0x31, 0x03]);
    assert_eq!(encode("STCF A, (XHL)"), vec![0xB0, 0x03, 0x34]);
    assert_eq!(encode("LDCF 2, A"), vec![0xC9, 0x23, 0x02]);
    assert_eq!(encode("XORCF 1, WA"), vec![0xD8, 0x22, 0x01]);
}

#[test]
fn bit_search() {
    assert_eq!(encode("BS1F A, BC"), vec![0xD9, 0x0E]);
    assert_eq!(encode("BS1B A, DE"), vec![0xDA, 0x0F]);
}

#[test]
fn set_on_condition() {
    assert_eq!(encode("SCC NZ, A"), vec![0xC8, 0x7E]);
    assert_eq!(encode("SCC GE, WA"), vec![0xE8, 0x79]);
    // C reads as the register before another register; SCC still means the
    // carry condition.
    assert_eq!(encode("SCC C, B"), vec![0xC9, 0x77]);
}

// ---- stack and system ----------------------------------------------------

#[test]
fn stack_operations() {
    assert_eq!(encode("PUSH WA"), vec![0x28]);
    assert_eq!(encode("PUSH XIY"), vec![0x35]);
    assert_eq!(encode("PUSH A"), vec![0xC8, 0x15]);
    assert_eq!(encode("PUSH F"), vec![0x18]);
    assert_eq!(encode("PUSH SR"), vec![0x02]);
    assert_eq!(encode("PUSH #1234H"), vec![0x09, 0x34, 0x12]);
    assert_eq!(encode("POP BC"), vec![0x59]);
    assert_eq!(encode("POP XIY"), vec![0x3D]);
    assert_eq!(encode("POP A"), vec![0x1B]);
    assert_eq!(encode("POP F"), vec![0x1A]);
    assert_eq!(encode("POP SR"), vec![0x03]);
    assert_eq!(encode("PUSHW #5"), vec![0x09, 0x05, 0x00]);
    assert_eq!(encode("PUSHW (XHL)"), vec![0x90, 0x03, 0x04]);
}

#[test]
fn pop_alternate_flags_is_not_wired() {
    let errors = encode_err("POP F'");
    assert!(errors.iter().any(|m| m.contains("invalid POP operand")));
}

#[test]
fn link_and_unlink() {
    assert_eq!(encode("LINK XIX, 8"), vec![0xEC, 0x0C, 0x08, 0x00]);
    assert_eq!(encode("UNLK XIX"), vec![0xEC, 0x0D]);
}

#[test]
fn system_instructions() {
    assert_eq!(encode("EI"), vec![0x03, 0x07]);
    assert_eq!(encode("EI 2"), vec![0x03, 0x02]);
    assert_eq!(encode("DI"), vec![0x06]);
    assert_eq!(encode("HALT"), vec![0x05]);
    assert_eq!(encode("SCF"), vec![0x0D]);
    assert_eq!(encode("RCF"), vec![0x0C]);
    assert_eq!(encode("CCF"), vec![0x0E]);
    assert_eq!(encode("ZCF"), vec![0x0F]);
    assert_eq!(encode("SWI 3"), vec![0xFB]);
}

// ---- control flow --------------------------------------------------------

#[test]
fn jumps() {
    assert_eq!(encode("JP 1000H"), vec![0x1A, 0x00, 0x10]);
    assert_eq!(encode("JP 123456H"), vec![0x1B, 0x56, 0x34, 0x12]);
    assert_eq!(encode("JP NZ, 1000H"), vec![0xAE, 0x00, 0x10]);
    assert_eq!(encode("JP NZ, 123456H"), vec![0xBE, 0x56, 0x34, 0x12]);
    assert_eq!(encode("JP (XHL)"), vec![0xB4, 0x03, 0xD8]);
    assert_eq!(encode("JP Z, (XHL)"), vec![0xB4, 0x03, 0xD6]);
}

#[test]
fn calls() {
    assert_eq!(encode("CALL 1000H"), vec![0xA2, 0x00, 0x10, 0x00]);
    assert_eq!(encode("CALL NZ, 8000H"), vec![0xA8, 0x00, 0x80, 0x00]);
    assert_eq!(encode("CALL XWA"), vec![0xE8, 0x98]);
    assert_eq!(encode("CALL (XIX)"), vec![0xB4, 0x04, 0xD9]);
}

#[test]
fn relative_calls() {
    // CALR to the next instruction encodes a zero displacement.
    let bytes = assemble("\tORG 0\n\tCALR NEXT\nNEXT: NOP\n");
    assert_eq!(bytes, vec![0x1E, 0x00, 0x00, 0x00]);
}

#[test]
fn long_relative_jump() {
    let bytes = assemble("\tORG 0\n\tJRL FWD\n\tNOP\nFWD: NOP\n");
    assert_eq!(bytes, vec![0x78, 0x01, 0x00, 0x00, 0x00]);
}

#[test]
fn djnz_forms() {
    let bytes = assemble("\tORG 0\nLOOP: NOP\n\tDJNZ B, LOOP\n");
    // disp = 0 - (1 + 3).
    assert_eq!(bytes, vec![0x00, 0xC9, 0x1C, 0xFC]);
    let bytes = assemble("\tORG 0\nLOOP: NOP\n\tDJNZ BC, LOOP\n");
    assert_eq!(bytes, vec![0x00, 0xD9, 0x1C, 0xFC]);
}

#[test]
fn returns() {
    assert_eq!(encode("RET"), vec![0x0E]);
    assert_eq!(encode("RET NZ"), vec![0xBE]);
    assert_eq!(encode("RETI"), vec![0x07]);
    assert_eq!(encode("RETD 4"), vec![0x0F, 0x04, 0x00]);
}

#[test]
fn jr_condition_with_ambiguous_name() {
    let bytes = assemble("\tORG 0\nLOOP: NOP\n\tJR C, LOOP\n");
    assert_eq!(bytes, vec![0x00, 0x67, 0xFD]);
}

#[test]
fn ld_with_ambiguous_c_register() {
    assert_eq!(encode("LD C, #1"), vec![0x23, 0x01]);
    assert_eq!(encode("LD C, (XHL)"), vec![0x83, 0x23]);
}

// ---- branch range --------------------------------------------------------

#[test]
fn jr_at_positive_range_limit() {
    let bytes = assemble("\tORG 0\n\tJR FWD\n\tDS 127\nFWD: NOP\n");
    assert_eq!(bytes[0], 0x68);
    assert_eq!(bytes[1], 0x7F);
}

#[test]
fn jr_beyond_range_is_reported_in_emit_pass() {
    let errors = assemble_err("\tORG 0\n\tJR FWD\n\tDS 128\nFWD: NOP\n");
    assert!(errors.iter().any(|m| m.contains("JR offset out of range")));
}

#[test]
fn jr_at_negative_range_limit() {
    let bytes = assemble("\tORG 0\nBACK: DS 126\n\tJR BACK\n");
    // disp = 0 - (126 + 2) = -128.
    assert_eq!(bytes[126], 0x68);
    assert_eq!(bytes[127], 0x80);
}

// ---- directives ----------------------------------------------------------

#[test]
fn org_zero_fills_holes() {
    let bytes = assemble("\tORG 0\n\tDB 1\n\tORG 4\n\tDB 5\n");
    assert_eq!(bytes, vec![1, 0, 0, 0, 5]);
}

#[test]
fn backward_org_overwrites() {
    let bytes = assemble("\tORG 0\n\tDB 1,2,3,4\n\tORG 1\n\tDB 9\n");
    assert_eq!(bytes, vec![1, 9, 3, 4]);
}

#[test]
fn first_org_sets_output_base() {
    let (result, assembler) = assemble_with("\tORG 8000H\n\tNOP\n");
    assert!(result.success);
    assert_eq!(assembler.image.base(), 0x8000);
    assert_eq!(assembler.image.len(), 1);
}

#[test]
fn align_pads_to_boundary() {
    let bytes = assemble("\tORG 0\n\tDB 1\n\tALIGN 4\n\tDB 2\n");
    assert_eq!(bytes, vec![1, 0, 0, 0, 2]);
}

#[test]
fn align_rejects_non_power_of_two() {
    let errors = assemble_err("\tORG 0\n\tALIGN 3\n");
    assert!(errors
        .iter()
        .any(|m| m.contains("ALIGN boundary must be a power of 2")));
}

#[test]
fn ds_reserves_with_fill() {
    assert_eq!(assemble("\tORG 0\n\tDS 3\n\tDB 1\n"), vec![0, 0, 0, 1]);
    assert_eq!(assemble("\tORG 0\n\tDS 3, 0AAH\n"), vec![0xAA, 0xAA, 0xAA]);
}

#[test]
fn data_directive_aliases() {
    assert_eq!(assemble("\tORG 0\n\tDC.B 1\n\t.BYTE 2\n\tFCB 3\n"), vec![1, 2, 3]);
    assert_eq!(
        assemble("\tORG 0\n\tDEFW 1234H\n\t.WORD 5678H\n"),
        vec![0x34, 0x12, 0x78, 0x56]
    );
    assert_eq!(
        assemble("\tORG 0\n\tDD 12345678H\n"),
        vec![0x78, 0x56, 0x34, 0x12]
    );
}

#[test]
fn set_symbol_is_reassignable() {
    let bytes = assemble("\tORG 0\nV SET 1\n\tDB V\nV SET 2\n\tDB V\n");
    assert_eq!(bytes, vec![1, 2]);
}

#[test]
fn set_instruction_still_encodes_without_label() {
    assert_eq!(encode("SET 2, A"), vec![0xC8, 0x71, 0x02]);
}

#[test]
fn res_directive_reserves_space_when_not_a_bit_op() {
    assert_eq!(assemble("\tORG 0\nBUF: RES 4\n\tDB 1\n"), vec![0, 0, 0, 0, 1]);
    assert_eq!(encode("RES 1, A"), vec![0xC9, 0x30, 0x01]);
}

#[test]
fn dollar_is_current_pc() {
    let bytes = assemble("\tORG 100H\n\tDW $\n");
    assert_eq!(bytes, vec![0x00, 0x01]);
}

#[test]
fn high_low_bank_functions() {
    let bytes = assemble("\tORG 0\n\tDB HIGH(1234H), LOW(1234H), BANK(123456H)\n");
    assert_eq!(bytes, vec![0x12, 0x34, 0x12]);
}

#[test]
fn char_literals() {
    assert_eq!(assemble("\tORG 0\n\tDB 'A'\n"), vec![0x41]);
    assert_eq!(encode("LD A, #'Z'"), vec![0x21, 0x5A]);
}

#[test]
fn cpu_and_maxmode_directives() {
    let bytes = assemble("\tCPU TMP94C241\n\tMAXMODE ON\n\tORG 0\n\tNOP\n");
    assert_eq!(bytes, vec![0x00]);

    let (result, assembler) = assemble_with("\tCPU Z80\n\tORG 0\n\tNOP\n");
    assert!(result.success);
    assert!(assembler
        .diagnostics
        .iter()
        .any(|d| d.error.message().contains("unknown CPU")));
}

#[test]
fn listing_directives_are_ignored() {
    let bytes = assemble("\tPAGE\n\tLISTING OFF\n\tORG 0\n\tNOP\n\tEND\n");
    assert_eq!(bytes, vec![0x00]);
}

// ---- labels and symbols --------------------------------------------------

#[test]
fn column_one_identifier_is_a_label() {
    let bytes = assemble("\tORG 0\nSTART\n\tJP START\n");
    assert_eq!(bytes, vec![0x1A, 0x00, 0x00]);
}

#[test]
fn label_redefinition_is_reported() {
    let errors = assemble_err("\tORG 0\nL: NOP\nL: NOP\n");
    assert!(errors.iter().any(|m| m.contains("already defined")));
}

#[test]
fn undefined_symbol_is_reported_in_emit_pass() {
    let errors = assemble_err("\tORG 0\n\tJP NOWHERE\n");
    assert!(errors
        .iter()
        .any(|m| m.contains("undefined symbol 'NOWHERE'")));
}

#[test]
fn division_by_zero_is_reported() {
    let errors = assemble_err("\tORG 0\n\tDB 1/0\n");
    assert!(errors.iter().any(|m| m.contains("division by zero")));
}

#[test]
fn label_values_match_emit_pass_addresses() {
    let src = "\tORG 100H\nA1: NOP\nA2: DB 1, 2\nA3: NOP\n";
    let (result, mut assembler) = assemble_with(src);
    assert!(result.success);
    assert_eq!(assembler.symbols.get_value("A1"), Some((0x100, SymbolKind::Label)));
    assert_eq!(assembler.symbols.get_value("A2"), Some((0x101, SymbolKind::Label)));
    assert_eq!(assembler.symbols.get_value("A3"), Some((0x103, SymbolKind::Label)));
}

// ---- macros --------------------------------------------------------------

#[test]
fn macro_definition_and_expansion() {
    let src = "\tORG 0\nSTORE MACRO dst, val\n\tLD A, #val\n\tLD (dst), A\nENDM\n\tSTORE 80H, 5\n";
    let bytes = assemble(src);
    assert_eq!(bytes, vec![0x21, 0x05, 0xF0, 0x80, 0x41]);
}

#[test]
fn macro_with_missing_arguments_expands_empty() {
    let src = "\tORG 0\nPAD MACRO n\n\tNOP\nENDM\n\tPAD\n";
    assert_eq!(assemble(src), vec![0x00]);
}

#[test]
fn macro_body_is_not_assembled_at_definition() {
    let src = "\tORG 0\nM1 MACRO\n\tDB 0FFH\nENDM\n\tNOP\n";
    assert_eq!(assemble(src), vec![0x00]);
}

#[test]
fn macro_sees_label_arguments_by_name() {
    let src = "\tORG 0\nJMP2 MACRO where\n\tJP where\nENDM\n\tJMP2 TARGET\nTARGET: NOP\n";
    let bytes = assemble(src);
    assert_eq!(bytes, vec![0x1A, 0x03, 0x00, 0x00]);
}

#[test]
fn recursive_macro_expansion_is_bounded() {
    let src = "\tORG 0\nREC MACRO\n\tREC\nENDM\n\tREC\n";
    let errors = assemble_err(src);
    assert!(errors.iter().any(|m| m.contains("macro expansion too deep")));
}

#[test]
fn endm_without_macro_is_reported() {
    let errors = assemble_err("\tORG 0\nENDM\n");
    assert!(errors.iter().any(|m| m.contains("ENDM without MACRO")));
}

#[test]
fn unterminated_macro_is_reported() {
    let errors = assemble_err("\tORG 0\nM MACRO\n\tNOP\n");
    assert!(errors.iter().any(|m| m.contains("unterminated macro")));
}

#[test]
fn unknown_mnemonic_reports_instruction_or_macro() {
    let errors = encode_err("FROB A");
    assert!(errors
        .iter()
        .any(|m| m.contains("unknown instruction or macro: FROB")));
}

// ---- includes ------------------------------------------------------------

#[test]
fn include_pulls_in_file_relative_to_parent() {
    let dir = std::env::temp_dir().join(format!("asm900-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let main_path = dir.join("main.asm");
    let inc_path = dir.join("inc.asm");
    std::fs::write(&main_path, "\tORG 0\n\tINCLUDE \"inc.asm\"\n\tNOP\n").expect("write main");
    std::fs::write(&inc_path, "\tDB 0AAH\n").expect("write inc");

    let mut assembler = Assembler::new();
    let result = assembler.assemble_file(&main_path.to_string_lossy());
    assert!(
        result.success,
        "include assembly failed: {:?}",
        assembler
            .diagnostics
            .iter()
            .map(|d| d.format())
            .collect::<Vec<_>>()
    );
    assert_eq!(assembler.image.data(), &[0xAA, 0x00]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_include_is_reported() {
    let errors = assemble_err("\tORG 0\n\tINCLUDE \"no-such-file.inc\"\n");
    assert!(errors.iter().any(|m| m.contains("cannot open file")));
}

// ---- pass behaviour ------------------------------------------------------

#[test]
fn reassembly_is_idempotent() {
    let src = "\tORG 0\nSTART: LD WA, (DATA)\n\tJR START\nDATA EQU 0FF00H\n";
    let first = assemble(src);
    let second = assemble(src);
    assert_eq!(first, second);
}

#[test]
fn sizing_errors_still_reach_emit_diagnostics() {
    // The bad line errors while sizing; emit still runs and reports its own
    // view of the program.
    let (result, assembler) = assemble_with("\tORG 0\n\tPOP W\n\tNOP\n");
    assert!(!result.success);
    assert!(!assembler.diagnostics.is_empty());
    // The NOP after the failed line was still assembled.
    assert_eq!(assembler.image.data(), &[0x00]);
}

#[test]
fn stable_program_converges_in_two_iterations() {
    let (result, _) = assemble_with("\tORG 0\n\tNOP\n\tNOP\n");
    assert!(result.success);
    assert_eq!(result.sizing_iterations, 2);
}

#[test]
fn explicit_displacement_size_overrides_value() {
    // A small displacement forced wide, in both the compact and the
    // standalone encodings.
    assert_eq!(encode("LD A, (XIX+4:16)"), vec![0x94, 0x04, 0x00, 0x21]);
    assert_eq!(
        encode("BIT 0, (XIX+4:16)"),
        vec![0xB0, 0x5C, 0x04, 0x00, 0xC0]
    );
}

#[test]
fn forward_word_data_reference() {
    let bytes = assemble("\tORG 0\n\tDW FWD\nFWD: DB 7\n");
    assert_eq!(bytes, vec![0x02, 0x00, 0x07]);
}

#[test]
fn multiple_org_segments_accumulate_in_pc_order() {
    let src = "\tORG 100H\n\tDB 1\n\tORG 104H\n\tDB 2\n\tDB 3\n";
    let (result, assembler) = assemble_with(src);
    assert!(result.success);
    assert_eq!(assembler.image.base(), 0x100);
    assert_eq!(assembler.image.data(), &[1, 0, 0, 0, 2, 3]);
}

#[test]
fn macro_arguments_keep_parenthesised_groups() {
    let src = "\tORG 0\nFETCH MACRO src\n\tLD A, src\nENDM\n\tFETCH (XIX+2)\n";
    let bytes = assemble(src);
    assert_eq!(bytes, vec![0x8C, 0x02, 0x21]);
}

#[test]
fn binclude_with_offset_and_length() {
    let dir = std::env::temp_dir().join(format!("asm900-bin-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let blob_path = dir.join("blob.bin");
    std::fs::write(&blob_path, [0x10, 0x20, 0x30, 0x40, 0x50]).expect("write blob");
    let main_path = dir.join("main.asm");
    std::fs::write(
        &main_path,
        "\tORG 0\n\tBINCLUDE \"blob.bin\", 1, 3\n\tDB 0FFH\n",
    )
    .expect("write main");

    let mut assembler = Assembler::new();
    let result = assembler.assemble_file(&main_path.to_string_lossy());
    assert!(
        result.success,
        "binclude assembly failed: {:?}",
        assembler
            .diagnostics
            .iter()
            .map(|d| d.format())
            .collect::<Vec<_>>()
    );
    assert_eq!(assembler.image.data(), &[0x20, 0x30, 0x40, 0xFF]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn binclude_offset_beyond_file_is_reported() {
    let dir = std::env::temp_dir().join(format!("asm900-binoff-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let blob_path = dir.join("blob.bin");
    std::fs::write(&blob_path, [0x10, 0x20]).expect("write blob");
    let main_path = dir.join("main.asm");
    std::fs::write(&main_path, "\tORG 0\n\tBINCLUDE \"blob.bin\", 9\n").expect("write main");

    let mut assembler = Assembler::new();
    let result = assembler.assemble_file(&main_path.to_string_lossy());
    assert!(!result.success);
    assert!(assembler
        .diagnostics
        .iter()
        .any(|d| d.error.message().contains("BINCLUDE offset beyond file size")));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn self_including_file_hits_the_depth_limit() {
    let dir = std::env::temp_dir().join(format!("asm900-inc-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let main_path = dir.join("loop.asm");
    std::fs::write(&main_path, "\tINCLUDE \"loop.asm\"\n").expect("write main");

    let mut assembler = Assembler::new();
    let result = assembler.assemble_file(&main_path.to_string_lossy());
    assert!(!result.success);
    assert!(assembler
        .diagnostics
        .iter()
        .any(|d| d.error.message().contains("include nesting too deep")));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn byte_length_sequence_matches_between_passes() {
    // Once sizes converge, the emit pass reproduces the sizing pass's
    // total length exactly.
    let src = "\tORG 0\n\tLD WA, (LATE)\n\tJR SKIP\nSKIP: NOP\nLATE EQU 0FFFFFH\n";
    let (result, assembler) = assemble_with(src);
    assert!(result.success);
    assert_eq!(assembler.image.len() as u32, assembler.pc);
}
