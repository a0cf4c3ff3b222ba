//! Sv32 address translation: TLB lookup, falling back to a two-level
//! page-table walk over the same physical memory the core's harness
//! backs instruction/data accesses with. The walk reads page-table
//! entries directly through [`crate::units::Memory`] rather than
//! modeling a separate PTW port protocol, since both ends live in the
//! same process here.

use crate::isa::pte;
use crate::units::tlb::{classify_pte, Sv32Tlb, WalkResult};
use crate::units::Memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Fetch,
    Load,
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateError {
    InstructionPageFault,
    LoadPageFault,
    StoreAmoPageFault,
}

fn fault_for(kind: AccessKind) -> TranslateError {
    match kind {
        AccessKind::Fetch => TranslateError::InstructionPageFault,
        AccessKind::Load => TranslateError::LoadPageFault,
        AccessKind::Store => TranslateError::StoreAmoPageFault,
    }
}

/// Required permission bits for `kind`, checked against the leaf's PTE
/// perm byte. `U`-mode accesses additionally require the `U` bit; S-mode
/// accesses to a `U` page require `mstatus.SUM`. Not modeled here:
/// `MXR` (execute-as-read) — the core never attempts to read page
/// contents as instructions through a load.
fn required_bits(kind: AccessKind) -> u32 {
    match kind {
        AccessKind::Fetch => pte::X,
        AccessKind::Load => pte::R,
        AccessKind::Store => pte::W,
    }
}

/// Translate `vaddr` under `satp`'s root, consulting (and filling) `tlb`.
/// `user_mode`: whether the access is made from U; `sum`: `mstatus.SUM`,
/// allowing S-mode to touch `U` pages. Returns the physical address
/// alongside whether the translation was served from the TLB (`true`) or
/// required a fresh page-table walk and fill (`false`).
pub fn translate(
    tlb: &mut Sv32Tlb,
    memory: &Memory,
    satp_root_ppn: u32,
    vaddr: u32,
    kind: AccessKind,
    user_mode: bool,
    sum: bool,
) -> Result<(u32, bool), TranslateError> {
    let vpn1 = (vaddr >> 22) & 0x3ff;
    let vpn0 = (vaddr >> 12) & 0x3ff;
    let page_off = vaddr & 0xfff;

    let (translation, hit) = match tlb.lookup(satp_root_ppn, vpn1, vpn0) {
        Some(t) => (t, true),
        None => {
            let addr1 = (satp_root_ppn << 12) + vpn1 * 4;
            let pte1 = memory.read_word(addr1);
            let needs_l0 = pte::is_valid(pte1) && !pte::is_leaf(pte1);
            let pte0 = if needs_l0 {
                let addr0 = (pte::ppn(pte1) << 12) + vpn0 * 4;
                Some(memory.read_word(addr0))
            } else {
                None
            };
            match classify_pte(pte1, pte0, vpn0) {
                WalkResult::Fault => return Err(fault_for(kind)),
                WalkResult::Leaf { ppn, perms, mega } => {
                    tlb.fill(satp_root_ppn, vpn1, vpn0, ppn, perms, mega);
                    (crate::units::tlb::Translation { ppn, perms }, false)
                }
            }
        }
    };

    let required = required_bits(kind);
    if translation.perms & required == 0 {
        return Err(fault_for(kind));
    }
    if translation.perms & pte::U == 0 {
        if user_mode {
            return Err(fault_for(kind));
        }
    } else if !user_mode && !sum {
        return Err(fault_for(kind));
    }

    Ok(((translation.ppn << 12) | page_off, hit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{Memory, DEFAULT_TLB_ENTRIES};

    fn setup(root_ppn: u32, l1_idx: u32, perms: u32, target_ppn: u32) -> (Memory, Sv32Tlb) {
        let mem_data = crate::framework::MemData::init([0u8; crate::framework::MEM_SIZE]);
        let mem = Memory::new(mem_data);
        let l1_addr = (root_ppn << 12) + l1_idx * 4;
        let leaf_pte = pte::V | perms | (target_ppn << 10);
        mem.write(l1_addr, leaf_pte, 0b010);
        (mem, Sv32Tlb::new(DEFAULT_TLB_ENTRIES))
    }

    #[test]
    fn mega_page_translation_hits_after_fill() {
        let vaddr = 0x1000u32;
        let (mem, mut tlb) = setup(0, vaddr >> 22, pte::R | pte::W | pte::U, 0x8_0000 >> 12);
        let (first, first_hit) = translate(&mut tlb, &mem, 0, vaddr, AccessKind::Load, true, false).unwrap();
        let (second, second_hit) = translate(&mut tlb, &mem, 0, vaddr, AccessKind::Load, true, false).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, 0x8_0000);
        assert!(!first_hit, "first translation fills the TLB, it isn't already hit");
        assert!(second_hit, "second translation reuses the filled entry");
    }

    #[test]
    fn missing_permission_is_a_fault() {
        let vaddr = 0x1000u32;
        let (mem, mut tlb) = setup(0, vaddr >> 22, pte::R | pte::U, 0x8_0000 >> 12);
        let err = translate(&mut tlb, &mem, 0, vaddr, AccessKind::Store, true, false).unwrap_err();
        assert_eq!(err, TranslateError::StoreAmoPageFault);
    }

    #[test]
    fn user_page_denied_to_supervisor_without_sum() {
        let vaddr = 0x1000u32;
        let (mem, mut tlb) = setup(0, vaddr >> 22, pte::R | pte::W | pte::U, 0x8_0000 >> 12);
        let err = translate(&mut tlb, &mem, 0, vaddr, AccessKind::Load, false, false).unwrap_err();
        assert_eq!(err, TranslateError::LoadPageFault);
        assert!(translate(&mut tlb, &mem, 0, vaddr, AccessKind::Load, false, true).is_ok());
    }

    #[test]
    fn invalid_root_entry_faults() {
        let mem_data = crate::framework::MemData::init([0u8; crate::framework::MEM_SIZE]);
        let mem = Memory::new(mem_data);
        let mut tlb = Sv32Tlb::new(DEFAULT_TLB_ENTRIES);
        let err = translate(&mut tlb, &mem, 0, 0x1000, AccessKind::Fetch, true, false).unwrap_err();
        assert_eq!(err, TranslateError::InstructionPageFault);
    }
}
