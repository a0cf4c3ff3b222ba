//! Forwarding unit: for each of rs1/rs2 in EX, select among
//! `{register-file, EX/MEM result, MEM/WB write-back data}`, EX/MEM
//! taking priority. x0 never receives a forward (there's nothing to
//! forward that the register file wouldn't already report as zero, and
//! forwarding it anyway would risk masking a real bug in a producer that
//! incorrectly targets x0).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardSource {
    #[default]
    RegFile,
    ExMem,
    MemWb,
}

#[allow(clippy::too_many_arguments)]
pub fn select(
    rs: u8,
    ex_mem_reg_write: bool,
    ex_mem_rd: u8,
    mem_wb_reg_write: bool,
    mem_wb_rd: u8,
) -> ForwardSource {
    if rs == 0 {
        return ForwardSource::RegFile;
    }
    if ex_mem_reg_write && ex_mem_rd == rs {
        ForwardSource::ExMem
    } else if mem_wb_reg_write && mem_wb_rd == rs {
        ForwardSource::MemWb
    } else {
        ForwardSource::RegFile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ex_mem_takes_priority_over_mem_wb() {
        let src = select(3, true, 3, true, 3);
        assert_eq!(src, ForwardSource::ExMem);
    }

    #[test]
    fn falls_back_to_mem_wb() {
        let src = select(3, false, 0, true, 3);
        assert_eq!(src, ForwardSource::MemWb);
    }

    #[test]
    fn x0_never_forwarded() {
        let src = select(0, true, 0, true, 0);
        assert_eq!(src, ForwardSource::RegFile);
    }

    #[test]
    fn no_hazard_uses_regfile() {
        let src = select(3, true, 4, true, 5);
        assert_eq!(src, ForwardSource::RegFile);
    }
}
