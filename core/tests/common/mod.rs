//! Hand-rolled RV32 instruction encoders shared by the scenario and
//! property tests. No assembler is in scope, so test programs are built
//! directly from these bit-field helpers.
#![allow(dead_code)]

use rv32_pipe_core::isa::{amo_funct5, csr, mem_funct3, opcode, sys_funct3, sys_imm};

pub fn r_type(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

pub fn i_type(imm: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (((imm as u32) & 0xfff) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

pub fn s_type(imm: i32, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = imm as u32;
    let hi = (imm >> 5) & 0x7f;
    let lo = imm & 0x1f;
    (hi << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (lo << 7) | opcode
}

/// `imm` is the branch displacement (even, signed 13-bit).
pub fn b_type(imm: i32, rs1: u32, rs2: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = imm as u32;
    let b12 = (imm >> 12) & 1;
    let b11 = (imm >> 11) & 1;
    let b10_5 = (imm >> 5) & 0x3f;
    let b4_1 = (imm >> 1) & 0xf;
    (b12 << 31) | (b10_5 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (b4_1 << 8) | (b11 << 7) | opcode
}

/// `imm20` is the raw 20-bit field occupying the instruction's `[31:12]`.
pub fn u_type(imm20: u32, rd: u32, opcode: u32) -> u32 {
    (imm20 << 12) | (rd << 7) | opcode
}

/// `imm` is the jump displacement (even, signed 21-bit).
pub fn j_type(imm: i32, rd: u32, opcode: u32) -> u32 {
    let imm = imm as u32;
    let b20 = (imm >> 20) & 1;
    let b19_12 = (imm >> 12) & 0xff;
    let b11 = (imm >> 11) & 1;
    let b10_1 = (imm >> 1) & 0x3ff;
    (b20 << 31) | (b10_1 << 21) | (b11 << 20) | (b19_12 << 12) | (rd << 7) | opcode
}

pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b000, rd, opcode::OP_IMM)
}

pub fn add(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0, rs2, rs1, 0b000, rd, opcode::OP)
}

pub fn lui(rd: u32, imm20: u32) -> u32 {
    u_type(imm20, rd, opcode::LUI)
}

pub fn sw(rs2: u32, rs1: u32, imm: i32) -> u32 {
    s_type(imm, rs2, rs1, mem_funct3::W, opcode::STORE)
}

pub fn lw(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, mem_funct3::W, rd, opcode::LOAD)
}

pub fn bne(rs1: u32, rs2: u32, imm: i32) -> u32 {
    const BNE_FUNCT3: u32 = 0b001;
    b_type(imm, rs1, rs2, BNE_FUNCT3, opcode::BRANCH)
}

pub fn jal(rd: u32, imm: i32) -> u32 {
    j_type(imm, rd, opcode::JAL)
}

pub fn csr_rw(rd: u32, csr_addr: u32, rs1: u32) -> u32 {
    i_type(csr_addr as i32, rs1, sys_funct3::CSRRW, rd, opcode::SYSTEM)
}

pub fn csr_rs(rd: u32, csr_addr: u32, rs1: u32) -> u32 {
    i_type(csr_addr as i32, rs1, sys_funct3::CSRRS, rd, opcode::SYSTEM)
}

pub fn ecall() -> u32 {
    i_type(sys_imm::ECALL as i32, 0, sys_funct3::PRIV, 0, opcode::SYSTEM)
}

pub fn mret() -> u32 {
    i_type(sys_imm::MRET as i32, 0, sys_funct3::PRIV, 0, opcode::SYSTEM)
}

pub fn sret() -> u32 {
    i_type(sys_imm::SRET as i32, 0, sys_funct3::PRIV, 0, opcode::SYSTEM)
}

pub fn lr_w(rd: u32, rs1: u32) -> u32 {
    r_type(amo_funct5::LR << 2, 0, rs1, mem_funct3::W, rd, opcode::AMO)
}

pub fn sc_w(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(amo_funct5::SC << 2, rs2, rs1, mem_funct3::W, rd, opcode::AMO)
}

pub fn amoadd_w(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(amo_funct5::ADD << 2, rs2, rs1, mem_funct3::W, rd, opcode::AMO)
}

pub const X0: u32 = 0;

// csr module re-exported so scenario tests don't need their own import.
pub use csr::{MEDELEG, MEPC, SATP, STVEC};
pub use csr::SEPC;
