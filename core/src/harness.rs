//! Minimal test-support harness: a flat memory image and a trivial
//! level-triggered interrupt source, standing in for a CLINT/PLIC-equipped
//! SoC so `tests/` and a CLI demo runner have something concrete to drive
//! the CPU's ports with. Not part of the simulator's own contract — a
//! real consumer owns its own memory system and interrupt controller and
//! drives [`crate::framework::PipeSim`] directly.

use crate::config::CpuConfig;
use crate::framework::{CpuSim, MemData, PipeSim, MEM_SIZE};
use crate::pipeline::cpu::Rv32;
use crate::units::Units;

/// A raw memory image loaded at address 0. No RV32 assembler or ELF
/// loader is in scope, so test programs are built from hand-encoded
/// instruction words.
pub struct Image {
    bytes: Vec<u8>,
}

impl Image {
    /// Wrap an already-encoded byte sequence, placed at address 0.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Convenience constructor from a slice of pre-encoded instruction/data words.
    pub fn flat(words: &[u32]) -> Self {
        let mut bytes = Vec::with_capacity(words.len() * 4);
        for w in words {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        Self { bytes }
    }

    fn into_mem_data(self) -> MemData {
        let mut image = [0u8; MEM_SIZE];
        let len = self.bytes.len().min(MEM_SIZE);
        image[..len].copy_from_slice(&self.bytes[..len]);
        MemData::init(image)
    }
}

/// Which level-triggered line a test is driving, standing in for CLINT
/// (`irq_software`/`irq_timer`) and PLIC (`irq_external`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqLine {
    Software,
    Timer,
    External,
}

/// A single contiguous byte array backing both instruction and data
/// fetches — page tables for Sv32 live in this same array, as in a real
/// system — wrapped around a ready-to-step [`PipeSim<Rv32>`].
pub struct FlatBus {
    sim: PipeSim<Rv32>,
}

impl FlatBus {
    /// Build a core over `image`, holding reset for one cycle so every
    /// pipeline latch and CSR starts from its architectural reset state.
    pub fn new(image: Image, config: CpuConfig) -> Self {
        let units = Units::with_config(image.into_mem_data(), config);
        let mut sim = PipeSim::from_units(units, false);
        sim.inputs_mut().rst = true;
        sim.step();
        sim.inputs_mut().rst = false;
        Self { sim }
    }

    pub fn sim(&self) -> &PipeSim<Rv32> {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut PipeSim<Rv32> {
        &mut self.sim
    }

    /// Raise or lower one of the three level-triggered interrupt lines.
    pub fn set_irq(&mut self, line: IrqLine, asserted: bool) {
        let input = self.sim.inputs_mut();
        match line {
            IrqLine::Software => input.irq_software = asserted,
            IrqLine::Timer => input.irq_timer = asserted,
            IrqLine::External => input.irq_external = asserted,
        }
    }

    pub fn step(&mut self) {
        self.sim.step();
    }

    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.sim.step();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_addi_sequence_retires_both_writes() {
        // addi x1, x0, 1 ; addi x2, x0, 2
        let image = Image::flat(&[0x00100093, 0x00200113]);
        let mut bus = FlatBus::new(image, CpuConfig::new().with_sv32(false));
        bus.run(8);
        assert_eq!(bus.sim().registers()[1].1, 1);
        assert_eq!(bus.sim().registers()[2].1, 2);
    }

    #[test]
    fn masked_timer_irq_does_not_redirect_fetch() {
        // a NOP image; mie/mstatus.MIE start at 0, so the pending timer
        // line must not divert the PC to mtvec.
        let image = Image::flat(&[crate::isa::NOP_INSTRUCTION; 4]);
        let mut bus = FlatBus::new(image, CpuConfig::new().with_sv32(false));
        bus.set_irq(IrqLine::Timer, true);
        bus.run(6);
        assert_eq!(bus.sim().units().csr.borrow().mcause, 0);
        assert_eq!(bus.sim().units().csr.borrow().mepc, 0);
    }
}
