//! Elaboration-time errors.
//!
//! These can only arise while building the netlist (wiring components,
//! resolving dependencies, computing the topological schedule) — never
//! during cycle-by-cycle simulation. A running core never returns `Err`;
//! an architectural condition (illegal instruction, page fault, misaligned
//! access) becomes trap state, not a Rust error. See the harness/CLI layer
//! for where `anyhow::Result` takes over instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElaborationError {
    #[error("wire `{0}` is driven by more than one combinational update")]
    MultiplyDrivenWire(String),

    #[error("wire `{0}` is read but never driven by any update or unit output")]
    UndrivenWire(String),

    #[error("width mismatch on wire `{wire}`: driver produces {driver_width} bits, consumer expects {expected_width} bits")]
    WidthMismatch {
        wire: String,
        driver_width: u8,
        expected_width: u8,
    },

    #[error("combinational dependency cycle detected, involving: {0:?}")]
    CombinationalCycle(Vec<String>),

    #[error("instance `{0}` referenced in the netlist was never elaborated")]
    UnresolvedInstance(String),
}
