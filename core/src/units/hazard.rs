//! Hazard unit: load-use stall and the flush conditions driven by
//! control transfers.

/// `stall` when EX holds a load whose destination is a nonzero source of
/// ID's current instruction — the one case forwarding cannot cover
/// because the loaded value isn't ready until MEM.
pub fn load_use_stall(ex_mem_read: bool, ex_rd: u8, id_rs1: u8, id_rs2: u8) -> bool {
    ex_mem_read && ex_rd != 0 && (ex_rd == id_rs1 || ex_rd == id_rs2)
}

/// Same hazard as `load_use_stall`, for AMOs: EX/MEM's `ex_result` holds
/// the translated address for an AMO, not its real result (the loaded
/// word for LR.W, the success code for SC.W, the old value for an RMW
/// op), which isn't computed until MEM. A nonzero-destination AMO in EX
/// must stall ID for the same one cycle a load would.
pub fn amo_use_stall(ex_is_amo: bool, ex_rd: u8, id_rs1: u8, id_rs2: u8) -> bool {
    ex_is_amo && ex_rd != 0 && (ex_rd == id_rs1 || ex_rd == id_rs2)
}

/// IF/ID is flushed on any control transfer that redirects fetch: a
/// taken branch, jump, trap, or xRET.
pub fn flush_if_id(control_transfer: bool) -> bool {
    control_transfer
}

/// ID/EX is flushed on the same control transfers, plus whenever a
/// load-use stall needs to insert a bubble into EX.
pub fn flush_id_ex(control_transfer: bool, stall: bool) -> bool {
    control_transfer || stall
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stalls_on_load_use() {
        assert!(load_use_stall(true, 3, 3, 5));
        assert!(load_use_stall(true, 3, 5, 3));
    }

    #[test]
    fn no_stall_without_load() {
        assert!(!load_use_stall(false, 3, 3, 5));
    }

    #[test]
    fn no_stall_on_x0_destination() {
        assert!(!load_use_stall(true, 0, 0, 0));
    }

    #[test]
    fn no_stall_when_dest_not_a_source() {
        assert!(!load_use_stall(true, 3, 4, 5));
    }

    #[test]
    fn amo_use_stalls_like_load_use() {
        assert!(amo_use_stall(true, 3, 3, 5));
        assert!(amo_use_stall(true, 3, 5, 3));
        assert!(!amo_use_stall(false, 3, 3, 5));
        assert!(!amo_use_stall(true, 0, 0, 0));
    }

    #[test]
    fn id_ex_flushes_on_stall_even_without_control_transfer() {
        assert!(flush_id_ex(false, true));
        assert!(!flush_id_ex(false, false));
    }
}
