//! Pipeline latches: IF/ID, ID/EX, EX/MEM, MEM/WB.
//! Each is a plain struct latched wholesale once per cycle by
//! [`cpu::Rv32`]'s sequential update; `Default` encodes the
//! architecturally valid bubble (NOP instruction, PC+4 = 4, every
//! control signal zero) that a flush or reset substitutes.

pub mod cpu;
pub mod mmu;

use crate::isa::decode::Control;
use crate::isa::{PrivMode, NOP_INSTRUCTION};

#[derive(Debug, Clone, Copy)]
pub struct IfId {
    pub pc: u32,
    pub inst: u32,
    /// Set when fetch's own Sv32 translation faulted; `inst` is then a
    /// harmless substitute NOP and the fault is carried down to EX,
    /// where instruction-page-fault traps are actually taken.
    pub fetch_fault: bool,
}

impl Default for IfId {
    fn default() -> Self {
        Self {
            pc: 0,
            inst: NOP_INSTRUCTION,
            fetch_fault: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdEx {
    pub pc: u32,
    pub inst: u32,
    pub rs1: u8,
    pub rs2: u8,
    pub rd: u8,
    pub imm: u32,
    pub funct3: u32,
    pub funct7: u32,
    pub ctrl: Control,
    pub rs1_val: u32,
    pub rs2_val: u32,
    pub fetch_fault: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExMem {
    pub pc: u32,
    pub inst: u32,
    pub rd: u8,
    pub funct3: u32,
    pub ctrl: Control,
    /// ALU result, translated physical address for memory ops, or the
    /// CSR read value for CSR instructions.
    pub ex_result: u32,
    /// Store/AMO data operand (forwarded rs2).
    pub store_data: u32,
    pub pc_plus4: u32,
    /// Trap was taken this cycle in EX; MEM/WB must not commit any
    /// architectural state for this instruction.
    pub trap_taken: bool,
    pub is_amo: bool,
    pub amo_funct5: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemWb {
    pub pc: u32,
    pub inst: u32,
    pub rd: u8,
    pub reg_write: bool,
    /// Pre-selected write-back data: `jump ? pc+4 : mem_to_reg ?
    /// mem_data : alu_result`, computed inside the latch's driving
    /// equation so WB itself is trivial.
    pub wb_data: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Latches {
    pub pc: u32,
    pub if_id: IfId,
    pub id_ex: IdEx,
    pub ex_mem: ExMem,
    pub mem_wb: MemWb,
    /// Current privilege mode, a genuine sequential register updated by
    /// trap entry and MRET/SRET, not by any pipeline stage's
    /// combinational logic.
    pub priv_mode: PrivMode,
}

impl Latches {
    pub fn reset(reset_vector: u32) -> Self {
        Self {
            pc: reset_vector,
            if_id: IfId {
                pc: reset_vector,
                inst: NOP_INSTRUCTION,
                fetch_fault: false,
            },
            priv_mode: PrivMode::Machine,
            ..Default::default()
        }
    }
}
