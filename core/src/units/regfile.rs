//! Register file: three read ports (rs1, rs2, debug) and one
//! write port. x0 is hard-wired to zero on both read and write; a write
//! that lands on the same cycle as a read of the same address is
//! forwarded out the read port instead of waiting a cycle, matching the
//! teacher's `RegisterFile` unit (write-then-read ordering in one body).

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct RegisterFile {
    state: Rc<RefCell<[u32; 32]>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterFileIn {
    pub rs1: u8,
    pub rs2: u8,
    pub debug_addr: u8,
    pub write_enable: bool,
    pub write_addr: u8,
    pub write_data: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterFileOut {
    pub rs1_val: u32,
    pub rs2_val: u32,
    pub debug_val: u32,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new([0; 32])),
        }
    }

    /// Commit `input.write_addr <- input.write_data` (if enabled and not
    /// x0), then read `rs1`/`rs2`/`debug_addr`, returning the just-written
    /// value for any read address that matches the write this cycle.
    pub fn access(&self, input: &RegisterFileIn) -> RegisterFileOut {
        if input.write_enable && input.write_addr != 0 {
            self.state.borrow_mut()[input.write_addr as usize] = input.write_data;
        }
        let read = |addr: u8| -> u32 {
            if addr == 0 {
                0
            } else {
                self.state.borrow()[addr as usize]
            }
        };
        RegisterFileOut {
            rs1_val: read(input.rs1),
            rs2_val: read(input.rs2),
            debug_val: read(input.debug_addr),
        }
    }

    pub fn snapshot(&self) -> Vec<(u8, u64)> {
        self.state
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as u8, v as u64))
            .collect()
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x0_is_always_zero() {
        let rf = RegisterFile::new();
        let out = rf.access(&RegisterFileIn {
            write_enable: true,
            write_addr: 0,
            write_data: 0xdead_beef,
            ..Default::default()
        });
        assert_eq!(out.rs1_val, 0);
        let out = rf.access(&RegisterFileIn {
            rs1: 0,
            ..Default::default()
        });
        assert_eq!(out.rs1_val, 0);
    }

    #[test]
    fn write_then_read_same_cycle_forwards() {
        let rf = RegisterFile::new();
        let out = rf.access(&RegisterFileIn {
            rs1: 5,
            write_enable: true,
            write_addr: 5,
            write_data: 42,
            ..Default::default()
        });
        assert_eq!(out.rs1_val, 42);
    }

    #[test]
    fn debug_port_is_side_effect_free() {
        let rf = RegisterFile::new();
        rf.access(&RegisterFileIn {
            write_enable: true,
            write_addr: 3,
            write_data: 7,
            ..Default::default()
        });
        let out = rf.access(&RegisterFileIn {
            debug_addr: 3,
            ..Default::default()
        });
        assert_eq!(out.debug_val, 7);
        let out2 = rf.access(&RegisterFileIn {
            debug_addr: 3,
            ..Default::default()
        });
        assert_eq!(out2.debug_val, 7);
    }
}
