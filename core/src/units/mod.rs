//! The RV32 core's supporting functional units: register file, CSR file, ALU,
//! branch comparator, decoder/immediate-generator (in [`crate::isa`]),
//! atomic reservation register, Sv32 instruction/data TLBs, and the
//! hazard/forwarding combinational rules. These are plain structs/functions
//! rather than being re-derived through the `define_units!` declarative
//! macro: CSR's multi-port read/write surface and the TLB's fill/lookup
//! protocol don't fit the macro's single input/output struct shape
//! without extending it, so this crate hand-writes the unit bodies
//! directly and wires them into [`crate::pipeline::cpu`]'s `PropCircuit`
//! the same way generated `trigger()` functions are wired in elsewhere.

pub mod alu;
pub mod amo;
pub mod branch;
pub mod csr;
pub mod forward;
pub mod hazard;
pub mod regfile;
pub mod tlb;

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::CpuConfig;
use crate::framework::{HardwareUnits, MemData, MEM_SIZE};
use regfile::RegisterFile;

/// Word-oriented access to the shared instruction/data memory backing
/// both the fetch and mem stages.
#[derive(Debug, Clone)]
pub struct Memory {
    data: MemData,
}

impl Memory {
    pub fn new(data: MemData) -> Self {
        Self { data }
    }

    /// Copy out the full backing image, e.g. for a host-side memory diff.
    pub fn snapshot(&self) -> [u8; MEM_SIZE] {
        *self.data.read()
    }

    pub fn read_word(&self, addr: u32) -> u32 {
        let addr = addr as usize;
        if addr + 4 > MEM_SIZE {
            return 0;
        }
        let bytes = self.data.read();
        u32::from_le_bytes([bytes[addr], bytes[addr + 1], bytes[addr + 2], bytes[addr + 3]])
    }

    /// `funct3` selects byte/halfword/word width, matching `data_funct3`'s
    /// encoding; only the bytes actually written update memory.
    pub fn write(&self, addr: u32, value: u32, funct3: u32) {
        let addr = addr as usize;
        let width = match funct3 & 0b11 {
            0b00 => 1,
            0b01 => 2,
            _ => 4,
        };
        if addr + width > MEM_SIZE {
            return;
        }
        let bytes = value.to_le_bytes();
        let mut mem = self.data.write();
        mem[addr..addr + width].copy_from_slice(&bytes[..width]);
    }
}

/// All stateful (non-combinational) units of the core, owned outside the
/// propagation schedule — elaborated once, then mutated each cycle by
/// the closures registered in the pipeline's `PropCircuit`.
pub struct Units {
    pub memory: Memory,
    pub regfile: RegisterFile,
    /// Shared so combinational closures registered independently (CSR read
    /// in EX, CSR write in WB-equivalent, trap-entry CSR updates) can each
    /// hold their own handle onto the same file, each borrowing it the way
    /// a generated `trigger()` closure borrows `&mut Devices`.
    pub csr: Rc<RefCell<csr::CsrFile>>,
    pub itlb: Rc<RefCell<tlb::Sv32Tlb>>,
    pub dtlb: Rc<RefCell<tlb::Sv32Tlb>>,
    pub reservation: Rc<RefCell<amo::AtomicReservation>>,
    /// Elaboration-time configuration the pipeline's combinational
    /// equations are built against (reset vector, Sv32/M-extension
    /// gating) — read, never mutated, once the circuit is built.
    pub config: CpuConfig,
}

/// Default capacity for each of the I-TLB/D-TLB when a [`crate::config::CpuConfig`]
/// doesn't override it.
pub const DEFAULT_TLB_ENTRIES: usize = 16;

impl Units {
    pub fn new(memory: MemData, tlb_entries: usize) -> Self {
        Self::with_config(memory, CpuConfig::new().with_tlb_entries(tlb_entries))
    }

    pub fn with_config(memory: MemData, config: CpuConfig) -> Self {
        Self {
            memory: Memory::new(memory),
            regfile: RegisterFile::new(),
            csr: Rc::new(RefCell::new(csr::CsrFile::new())),
            itlb: Rc::new(RefCell::new(tlb::Sv32Tlb::new(config.tlb_entries))),
            dtlb: Rc::new(RefCell::new(tlb::Sv32Tlb::new(config.tlb_entries))),
            reservation: Rc::new(RefCell::new(amo::AtomicReservation::new())),
            config,
        }
    }
}

impl HardwareUnits for Units {
    fn init(memory: MemData) -> Self {
        Self::new(memory, DEFAULT_TLB_ENTRIES)
    }

    fn registers(&self) -> Vec<(u8, u64)> {
        self.regfile.snapshot()
    }
}
