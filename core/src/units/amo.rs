//! AtomicReservation: `(valid, addr)`, set by LR.W, compared
//! by SC.W, cleared by any SC, RMW AMO, or plain store. The clear
//! happens the same cycle the clearing access issues, which is what
//! [`AtomicReservation::notify_write`] implements — it is called for
//! every MEM-stage memory write, not just AMOs, and clears the
//! reservation unconditionally rather than only on an address match
//! (any store anywhere clears a live reservation — the conservative
//! choice real hardware makes, since the reservation is invalidated by
//! losing exclusive ownership of the line, not by address comparison).

use super::alu::lt_signed;

#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicReservation {
    valid: bool,
    addr: u32,
}

impl AtomicReservation {
    pub fn new() -> Self {
        Self::default()
    }

    /// LR.W: set the reservation to `addr`.
    pub fn load_reserved(&mut self, addr: u32) {
        self.valid = true;
        self.addr = addr;
    }

    /// SC.W: succeeds (returns `true`, result 0) iff the reservation is
    /// valid and matches `addr`; clears the reservation either way.
    pub fn store_conditional(&mut self, addr: u32) -> bool {
        let success = self.valid && self.addr == addr;
        self.valid = false;
        success
    }

    /// Any plain store or RMW AMO clears a live reservation, same cycle.
    pub fn notify_write(&mut self) {
        self.valid = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmwOp {
    Swap,
    Add,
    Xor,
    And,
    Or,
    Min,
    Max,
    Minu,
    Maxu,
}

/// Compute the new value an RMW AMO writes back, given the just-read
/// "old" memory word and the register operand.
pub fn rmw_new_value(op: RmwOp, old: u32, rs2: u32) -> u32 {
    match op {
        RmwOp::Swap => rs2,
        RmwOp::Add => old.wrapping_add(rs2),
        RmwOp::Xor => old ^ rs2,
        RmwOp::And => old & rs2,
        RmwOp::Or => old | rs2,
        RmwOp::Min => {
            if lt_signed(old, rs2) {
                old
            } else {
                rs2
            }
        }
        RmwOp::Max => {
            if lt_signed(old, rs2) {
                rs2
            } else {
                old
            }
        }
        RmwOp::Minu => old.min(rs2),
        RmwOp::Maxu => old.max(rs2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sc_succeeds_iff_reservation_matches() {
        let mut r = AtomicReservation::new();
        r.load_reserved(0xA0);
        assert!(r.store_conditional(0xA0));
    }

    #[test]
    fn sc_fails_when_store_intervenes() {
        let mut r = AtomicReservation::new();
        r.load_reserved(0xA0);
        r.notify_write();
        assert!(!r.store_conditional(0xA0));
    }

    #[test]
    fn sc_without_lr_fails() {
        let mut r = AtomicReservation::new();
        assert!(!r.store_conditional(0xA0));
    }

    #[test]
    fn sc_clears_reservation_on_either_outcome() {
        let mut r = AtomicReservation::new();
        r.load_reserved(0xA0);
        assert!(r.store_conditional(0xA0));
        assert!(!r.store_conditional(0xA0));
    }

    #[test]
    fn rmw_signed_min_max_use_sign_split() {
        let neg = (-1i32) as u32;
        assert_eq!(rmw_new_value(RmwOp::Min, neg, 1), neg);
        assert_eq!(rmw_new_value(RmwOp::Max, neg, 1), 1);
        assert_eq!(rmw_new_value(RmwOp::Minu, neg, 1), 1);
    }
}
