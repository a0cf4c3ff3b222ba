//! Construction-time configuration for the simulator: reset vector, Sv32/TLB sizing, and whether the M
//! extension is wired in. None of this is mutable after elaboration —
//! a config change means building a new [`crate::framework::PipeSim`].

use crate::units::DEFAULT_TLB_ENTRIES;

#[derive(Debug, Clone)]
pub struct CpuConfig {
    /// Initial PC after reset.
    pub reset_vector: u32,
    /// Whether Sv32 translation is active; with this false, `inst_addr`
    /// and `data_addr` are always treated as physical and the TLBs/PTW
    /// logic is bypassed entirely.
    pub sv32_enabled: bool,
    /// Number of entries in each of the I-TLB and D-TLB.
    pub tlb_entries: usize,
    /// Whether RV32M (MUL/DIV/REM and variants) is decoded; when false,
    /// the M-extension encodings of OP are treated as illegal
    /// instructions, matching a real core built without the extension.
    pub m_extension_enabled: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            reset_vector: 0,
            sv32_enabled: true,
            tlb_entries: DEFAULT_TLB_ENTRIES,
            m_extension_enabled: true,
        }
    }
}

impl CpuConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reset_vector(mut self, addr: u32) -> Self {
        self.reset_vector = addr;
        self
    }

    pub fn with_sv32(mut self, enabled: bool) -> Self {
        self.sv32_enabled = enabled;
        self
    }

    pub fn with_tlb_entries(mut self, entries: usize) -> Self {
        self.tlb_entries = entries;
        self
    }

    pub fn with_m_extension(mut self, enabled: bool) -> Self {
        self.m_extension_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_apply() {
        let cfg = CpuConfig::new().with_reset_vector(0x8000_0000).with_sv32(false).with_tlb_entries(4);
        assert_eq!(cfg.reset_vector, 0x8000_0000);
        assert!(!cfg.sv32_enabled);
        assert_eq!(cfg.tlb_entries, 4);
    }
}
