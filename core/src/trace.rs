//! A typed, architecture-aware view over the raw [`TunnelEvent`]s fired
//! during one cycle's propagation. [`PipeSim::last_trace`] exposes the
//! untyped tunnel list; [`CycleTrace::from_tracer`] wraps it with RV32
//! semantics (privilege levels, cause codes) for a caller who wants to
//! inspect what a cycle actually did without re-deriving it from pipeline
//! state.

use crate::framework::{PipeSim, Tracer, TunnelEvent};
use crate::isa::PrivMode;
use crate::pipeline::cpu::Rv32;

/// One cycle's worth of control-flow tunnel events, typed.
#[derive(Debug, Default, Clone)]
pub struct CycleTrace {
    flushes: Vec<&'static str>,
    stalls: Vec<&'static str>,
    trap_entries: Vec<u64>,
    xrets: Vec<PrivMode>,
    tlb_fills: Vec<&'static str>,
    tlb_hits: Vec<&'static str>,
    sc_successes: u32,
    sc_fails: u32,
}

impl CycleTrace {
    pub fn from_tracer(tracer: &Tracer) -> Self {
        let mut trace = CycleTrace::default();
        for event in tracer.events() {
            match *event {
                TunnelEvent::Flush(stage) => trace.flushes.push(stage),
                TunnelEvent::Stall(stage) => trace.stalls.push(stage),
                TunnelEvent::TrapEntry(cause) => trace.trap_entries.push(cause as u64),
                TunnelEvent::XRet(mode) => trace.xrets.push(PrivMode::from_bits(mode)),
                TunnelEvent::TlbFill(which) => trace.tlb_fills.push(which),
                TunnelEvent::TlbHit(which) => trace.tlb_hits.push(which),
                TunnelEvent::ScSuccess => trace.sc_successes += 1,
                TunnelEvent::ScFail => trace.sc_fails += 1,
            }
        }
        trace
    }

    /// Latches flushed this cycle (by name, e.g. `"if_id"`, `"id_ex"`).
    pub fn flushed_stages(&self) -> &[&'static str] {
        &self.flushes
    }

    /// Latches held (bubble-stalled) this cycle.
    pub fn stalled_stages(&self) -> &[&'static str] {
        &self.stalls
    }

    /// Whether `stage` was flushed this cycle.
    pub fn flushed(&self, stage: &str) -> bool {
        self.flushes.iter().any(|&s| s == stage)
    }

    /// Whether `stage` was held this cycle.
    pub fn stalled(&self, stage: &str) -> bool {
        self.stalls.iter().any(|&s| s == stage)
    }

    /// Cause codes of traps entered this cycle (at most one, in practice).
    pub fn trap_entries(&self) -> &[u64] {
        &self.trap_entries
    }

    /// Privilege levels returned to by an MRET/SRET this cycle.
    pub fn xrets(&self) -> &[PrivMode] {
        &self.xrets
    }

    /// Which TLBs (`"instruction"`, `"data"`) were filled this cycle.
    pub fn tlb_fills(&self) -> &[&'static str] {
        &self.tlb_fills
    }

    /// Which TLBs were hit (served without a fill) this cycle.
    pub fn tlb_hits(&self) -> &[&'static str] {
        &self.tlb_hits
    }

    /// Number of successful SC.W completions this cycle (0 or 1).
    pub fn sc_successes(&self) -> u32 {
        self.sc_successes
    }

    /// Number of failed SC.W completions this cycle (0 or 1).
    pub fn sc_fails(&self) -> u32 {
        self.sc_fails
    }

    pub fn is_empty(&self) -> bool {
        self.flushes.is_empty()
            && self.stalls.is_empty()
            && self.trap_entries.is_empty()
            && self.xrets.is_empty()
            && self.tlb_fills.is_empty()
            && self.tlb_hits.is_empty()
            && self.sc_successes == 0
            && self.sc_fails == 0
    }
}

impl PipeSim<Rv32> {
    /// A typed view over the tunnel events fired by the most recently
    /// completed [`crate::framework::CpuSim::propagate_signals`] call.
    /// Zero-cost when the caller never calls this: [`PipeSim::last_trace`]
    /// always records into a `Vec`, but nothing downstream allocates or
    /// interprets it unless this method is invoked.
    pub fn cycle_trace(&self) -> CycleTrace {
        CycleTrace::from_tracer(self.last_trace())
    }
}
