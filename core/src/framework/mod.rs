//! The architecture-agnostic simulation substrate: a generic elaborated
//! pipeline driver ([`PipeSim`]) on top of the topological propagator in
//! [`propagate`]. A concrete architecture (this crate has exactly one:
//! [`crate::pipeline::cpu::Rv32`]) supplies the netlist (via [`CpuArch`])
//! and the functional units (via [`HardwareUnits`]); this module supplies
//! the two-phase cycle driver that is the same regardless of ISA.
mod propagate;

pub trait HardwareUnits {
    /// A set of hardware units should be initialized from a given memory.
    fn init(memory: MemData) -> Self;
    /// Return the registers and their values.
    ///
    /// (register_code, value)
    fn registers(&self) -> Vec<(u8, u64)>;
}

pub use propagate::{NameList, PropCircuit, PropOrder, PropOrderBuilder, PropUpdates, Propagator, Tracer, TunnelEvent};

/// Size of the memory backing instructions and data. Every architecture
/// needs somewhere to fetch from, regardless of ISA.
pub const MEM_SIZE: usize = 1 << 20;

pub struct MemData(std::rc::Rc<std::cell::RefCell<[u8; MEM_SIZE]>>);

impl Clone for MemData {
    fn clone(&self) -> Self {
        Self(std::rc::Rc::clone(&self.0))
    }
}

impl MemData {
    pub fn init(data: [u8; MEM_SIZE]) -> Self {
        Self(std::rc::Rc::new(std::cell::RefCell::new(data)))
    }

    pub fn read(&self) -> std::cell::Ref<'_, [u8; MEM_SIZE]> {
        self.0.borrow()
    }

    pub fn write(&self) -> std::cell::RefMut<'_, [u8; MEM_SIZE]> {
        self.0.borrow_mut()
    }
}

pub enum CpuStatus {
    CycleStart,
    CycleEnd,
}

/// During a CPU cycle, signals in memory devices (stage units) are propagated
/// through the combinational logic circuits. The signals are then latched into
/// the pipeline registers at the end of the cycle. Therefore we can use two
/// basic operations to simulate the pipeline.
pub trait CpuSim {
    /// Initiate the next cycle or the first cycle. This function should be
    /// called after calling [`CpuSim::propagate_signals`]. Otherwise the
    /// behavior is undefined.
    fn initiate_next_cycle(&mut self);

    /// Propagate signals through the combinational logic circuits (low
    /// phase A, rising edge, low phase B in one call). This function
    /// should be called after [`CpuSim::initiate_next_cycle`]. Otherwise
    /// the behavior is undefined. This function should update the
    /// terminal state of the simulator if the simulation is terminated.
    fn propagate_signals(&mut self);

    /// Get the current program counter
    fn program_counter(&self) -> u64;

    /// Whether the simulation is terminated
    fn is_terminate(&self) -> bool;

    fn cycle_count(&self) -> u64;
    /// Get the registers and their values
    fn registers(&self) -> Vec<(u8, u64)>;

    fn get_stage_info(&self) -> Vec<StageInfo>;

    /// Run one full cycle (`initiate_next_cycle` followed by `propagate_signals`).
    fn step(&mut self);
}

// here we use trait to collect the types
pub trait CpuCircuit {
    type UnitIn: Default;
    type UnitOut: Default + Clone;
    type Inter: Default;
    type StageState: Default;
}

pub trait CpuArch: CpuCircuit + Sized {
    type Units: HardwareUnits;
    /// Elaborate the netlist. Takes the already-constructed stateful
    /// units so combinational update closures can capture shared
    /// handles onto them (the register file, CSR file, TLBs, ...), each
    /// closure borrowing its handle the way a generated `trigger()`
    /// function closes over `&mut Devices` fields — see [`crate::units::Units`].
    fn build_circuit(units: &Self::Units) -> PropCircuit<Self>;
}

pub type Signals<A> = (
    <A as CpuCircuit>::UnitIn,
    <A as CpuCircuit>::UnitOut,
    <A as CpuCircuit>::Inter,
);

/// Pipeline simulator. A general CPU pipeline involves several pipeline
/// registers (flip-flops) and combinational logic circuits.
///
/// - Combinatorial logics: From `cur_state`, through `cur_unit_in`,
///   `cur_inter`, `cur_unit_out`, to `nex_state`.
/// - Clock tick: from `nex_state`, controlled by stage input signals, to
///   `cur_state`.
pub struct PipeSim<T: CpuArch> {
    pub(crate) circuit: PropCircuit<T>,
    pub(crate) cur_unit_in: T::UnitIn,
    pub(crate) cur_unit_out: T::UnitOut,
    pub(crate) cur_inter: T::Inter,
    pub(crate) cur_state: T::StageState,
    pub(crate) nex_state: T::StageState,
    pub(crate) units: T::Units,
    /// See [`CpuSim::is_terminate`].
    pub(crate) terminate: bool,
    /// Whether to print colorized per-cycle state to the terminal.
    pub(crate) tty_out: bool,
    pub(crate) cycle_count: u64,
    /// Tunnel events fired by the most recently completed
    /// [`CpuSim::propagate_signals`] call.
    pub(crate) last_trace: Tracer,
}

impl<T: CpuArch> PipeSim<T> {
    /// Initialize the simulator with given memory.
    ///
    /// `tty_out`: whether to print rich-text information.
    pub fn new(memory: MemData, tty_out: bool) -> Self {
        let units = T::Units::init(memory);
        let circuit = T::build_circuit(&units);
        Self {
            circuit,
            cur_inter: T::Inter::default(),
            cur_unit_in: T::UnitIn::default(),
            cur_unit_out: T::UnitOut::default(),
            cur_state: T::StageState::default(),
            nex_state: T::StageState::default(),
            units,
            terminate: false,
            tty_out,
            cycle_count: 0,
            last_trace: Tracer::default(),
        }
    }

    /// Initialize the simulator from an already-constructed set of units,
    /// e.g. one built via [`crate::config::CpuConfig`] rather than the
    /// bare-default [`HardwareUnits::init`].
    pub fn from_units(units: T::Units, tty_out: bool) -> Self {
        let circuit = T::build_circuit(&units);
        Self {
            circuit,
            cur_inter: T::Inter::default(),
            cur_unit_in: T::UnitIn::default(),
            cur_unit_out: T::UnitOut::default(),
            cur_state: T::StageState::default(),
            nex_state: T::StageState::default(),
            units,
            terminate: false,
            tty_out,
            cycle_count: 0,
            last_trace: Tracer::default(),
        }
    }

    /// Mutable access to the external input port signals (reset, interrupt
    /// lines, debug register-read address) for a host harness to drive.
    pub fn inputs_mut(&mut self) -> &mut T::UnitIn {
        &mut self.cur_unit_in
    }

    /// The external output port signals (debug taps) as of the last
    /// completed [`CpuSim::propagate_signals`] call.
    pub fn outputs(&self) -> &T::UnitOut {
        &self.cur_unit_out
    }

    /// The units backing this simulator (register file, CSR file, TLBs, memory).
    pub fn units(&self) -> &T::Units {
        &self.units
    }

    /// The raw tunnel events fired by the most recently completed
    /// [`CpuSim::propagate_signals`] call. Architecture-specific code (e.g.
    /// [`crate::trace::CycleTrace`]) wraps this into a typed view.
    pub fn last_trace(&self) -> &Tracer {
        &self.last_trace
    }
}

#[derive(Debug)]
pub struct StageInfo {
    /// name of the stage
    pub name: &'static str,
    /// (var name, formatted value)
    pub signals: Vec<(String, String)>,
}
