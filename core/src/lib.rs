pub mod bitvec;
pub mod config;
pub mod errors;
pub mod framework;
pub mod harness;
pub mod isa;
pub mod netlist;
pub mod pipeline;
pub mod trace;
pub mod units;
pub mod utils;

pub use config::CpuConfig;
pub use framework::{CpuSim, MemData, PipeSim};
pub use harness::{FlatBus, Image};
pub use trace::CycleTrace;

/// The one architecture this crate elaborates: a pipelined RV32IA +
/// Zicsr + Sv32 core.
pub type Rv32Sim = PipeSim<pipeline::cpu::Rv32>;
