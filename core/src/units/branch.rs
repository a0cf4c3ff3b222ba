//! 6-way branch comparator, selected by funct3. Shares the
//! sign-split signed-compare trick with the ALU's SLT and MEM's signed
//! AMO MIN/MAX.

use crate::isa::branch_funct3;
use crate::units::alu::lt_signed;

/// Evaluate the branch condition for `funct3` over already-forwarded
/// operands `a` (rs1) and `b` (rs2). Must be called with the same
/// forwarded values the ALU sees so a
/// branch immediately after its producer doesn't read stale operands.
pub fn taken(funct3: u32, a: u32, b: u32) -> bool {
    match funct3 {
        branch_funct3::BEQ => a == b,
        branch_funct3::BNE => a != b,
        branch_funct3::BLT => lt_signed(a, b),
        branch_funct3::BGE => !lt_signed(a, b),
        branch_funct3::BLTU => a < b,
        branch_funct3::BGEU => a >= b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beq_bne() {
        assert!(taken(branch_funct3::BEQ, 5, 5));
        assert!(!taken(branch_funct3::BEQ, 5, 6));
        assert!(taken(branch_funct3::BNE, 5, 6));
    }

    #[test]
    fn signed_vs_unsigned_blt() {
        let neg = (-1i32) as u32;
        assert!(taken(branch_funct3::BLT, neg, 1));
        assert!(!taken(branch_funct3::BLTU, neg, 1));
    }

    #[test]
    fn bge_is_not_blt() {
        assert_eq!(taken(branch_funct3::BGE, 5, 5), !taken(branch_funct3::BLT, 5, 5));
    }
}
