//! The elaborator's topological scheduler and the per-cycle combinational
//! propagator that walks the resulting schedule.
//!
//! `PropOrderBuilder` / `PropCircuit` / `Propagator` originated for a
//! textual HCL-like mux-chain language compiled by a procedural macro;
//! the algorithm here is unchanged — BFS-by-indegree topological sort
//! over a dependency graph, combinational nodes computed in that order,
//! stage/"unit" nodes run last within the
//! schedule — but every node is an interned [`NodeId`] rather than a
//! cloned `String`, per the "wires as owned vs. referenced" design note.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::framework::CpuCircuit;
use crate::netlist::{NodeArena, NodeId};

/// One entry of the elaborated schedule: whether the node is a "unit"
/// (functional/stage component) as opposed to a named combinational
/// update, and its interned id.
pub type NameList = Vec<(bool, NodeId)>;

#[derive(Debug)]
pub struct PropOrder {
    pub(crate) order: NameList,
    pub(crate) arena: std::rc::Rc<NodeArena>,
}

impl PropOrder {
    pub fn iter(&self) -> impl Iterator<Item = (bool, NodeId)> + '_ {
        self.order.iter().copied()
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }
}

/// Compute topological order of nodes using BFS (Kahn's algorithm),
/// additionally tracking each node's level (longest path from a source).
///
/// Panics if the graph is not a DAG: an undetected combinational cycle is
/// an elaboration bug, not a recoverable runtime condition.
pub fn topo(nodes: impl Iterator<Item = NodeId>, edges: &[(NodeId, NodeId)]) -> Vec<(NodeId, i32)> {
    let mut degree_level: HashMap<NodeId, (i32, i32)> = HashMap::default();
    let all_nodes: Vec<NodeId> = nodes.collect();
    for &n in &all_nodes {
        degree_level.entry(n).or_insert((0, 0));
    }
    for &(_, to) in edges {
        degree_level.entry(to).or_insert((0, 0)).0 += 1;
    }

    let mut que: VecDeque<NodeId> = VecDeque::new();
    let mut levels = Vec::new();
    for &node in &all_nodes {
        if degree_level[&node].0 == 0 {
            que.push_back(node);
        }
    }
    while let Some(head) = que.pop_front() {
        let level = degree_level.remove(&head).map(|o| o.1).unwrap_or(0);
        levels.push((head, level));
        for &(from, to) in edges {
            if from == head {
                if let Some(entry) = degree_level.get_mut(&to) {
                    entry.0 -= 1;
                    entry.1 = entry.1.max(level + 1);
                    if entry.0 == 0 {
                        que.push_back(to);
                    }
                }
            }
        }
    }

    if !degree_level.is_empty() {
        let cyclic: Vec<NodeId> = degree_level.keys().copied().collect();
        panic!("not a DAG, remaining nodes with nonzero degree: {cyclic:?}");
    }

    levels
}

/// Builds the elaborated dependency graph and computes its topological
/// schedule (the L3 Elaborator's combinational-ordering step).
pub struct PropOrderBuilder {
    arena: NodeArena,
    runnable_nodes: NameList,
    unit_nodes: Vec<NodeId>,
    nodes: HashSet<NodeId>,
    edges: Vec<(NodeId, NodeId)>,
    stage_units: HashSet<NodeId>,
    /// (name, body) — dependencies are whichever already-declared node
    /// names appear textually in `body`; `name` depends on them.
    deps: Vec<(NodeId, &'static str)>,
    /// (name, body) — reverse direction: whichever already-declared node
    /// names appear in `body` depend on `name` (used for destination-port
    /// "tunnel" equations, e.g. a pipeline latch's bubble/stall input).
    rev_deps: Vec<(NodeId, &'static str)>,
    output_prefix: &'static str,
    input_prefix: &'static str,
}

impl PropOrderBuilder {
    pub fn new(output_prefix: &'static str, input_prefix: &'static str) -> Self {
        Self {
            arena: NodeArena::new(),
            nodes: Default::default(),
            runnable_nodes: Default::default(),
            unit_nodes: Default::default(),
            deps: Default::default(),
            rev_deps: Default::default(),
            edges: Default::default(),
            stage_units: Default::default(),
            output_prefix,
            input_prefix,
        }
    }

    fn node(&mut self, name: &'static str) -> NodeId {
        let id = self.arena.intern(name);
        self.nodes.insert(id);
        id
    }

    fn add_edge(&mut self, from: &'static str, to: &'static str) {
        let from = self.node(from);
        let to = self.node(to);
        self.edges.push((from, to));
    }

    /// Unit `name` is the dependency of units whose names appear in `body`.
    pub fn add_rev_deps(&mut self, name: &'static str, body: &'static str) {
        let id = self.node(name);
        self.rev_deps.push((id, body));
    }

    pub fn add_unit_node(&mut self, unit_name: &'static str) {
        let id = self.node(unit_name);
        self.runnable_nodes.push((true, id));
        self.unit_nodes.push(id);
    }

    pub fn add_unit_input(&mut self, unit_name: &'static str, field_name: &'static str) {
        let full_name = leak(format!("{unit_name}.{field_name}"));
        self.add_edge(full_name, unit_name);
    }

    pub fn add_unit_output(&mut self, unit_name: &'static str, field_name: &'static str) {
        let full_name = leak(format!("{unit_name}.{field_name}"));
        self.add_edge(unit_name, full_name);
    }

    /// Stage units (pipeline latches) pass the current cycle's input to
    /// the next cycle; they are scheduled last so every combinational
    /// consumer sees this cycle's value before the latch captures the
    /// next one.
    pub fn add_unit_stage(&mut self, unit_name: &'static str, field_name: &'static str) {
        let out_name = leak(format!("{}.{unit_name}.{field_name}", self.output_prefix));
        let in_name = leak(format!("{}.{unit_name}.{field_name}", self.input_prefix));
        self.node(out_name);
        self.node(in_name);
        self.add_edge(in_name, unit_name);
        let unit_id = self.node(unit_name);
        self.stage_units.insert(unit_id);
    }

    /// Set unit `name` as runnable, which depends on other units named in `body`.
    pub fn add_update(&mut self, name: &'static str, body: &'static str) {
        let id = self.node(name);
        self.runnable_nodes.push((false, id));
        self.deps.push((id, body));
    }

    fn init_deps(&mut self) {
        let mut new_edges = Vec::new();
        for &(name, body) in &self.deps {
            for &node in &self.nodes {
                if node == name || self.unit_nodes.contains(&node) {
                    continue;
                }
                if body.contains(self.arena.name(node)) {
                    new_edges.push((node, name));
                }
            }
        }
        for &(name, body) in &self.rev_deps {
            for &node in &self.nodes {
                if node == name || self.unit_nodes.contains(&node) {
                    continue;
                }
                if body.contains(self.arena.name(node)) {
                    new_edges.push((name, node));
                }
            }
        }
        self.edges.extend(new_edges);
    }

    /// Compute topological order of nodes.
    pub fn build(mut self) -> PropOrder {
        self.init_deps();

        let levels = topo(self.nodes.iter().copied(), &self.edges);
        let order: NameList = levels
            .iter()
            .filter_map(|(node, _)| self.runnable_nodes.iter().find(|(_, p)| p == node).copied())
            .collect();

        let (mut last, mut order): (NameList, NameList) =
            order.into_iter().partition(|o| o.0 && self.stage_units.contains(&o.1));

        // put stage units at the end
        order.append(&mut last);

        PropOrder {
            order,
            arena: std::rc::Rc::new(self.arena),
        }
    }
}

fn leak(s: String) -> &'static str {
    Box::leak(s.into_boxed_str())
}

/// One control-flow event fired during a cycle's propagation. `Flush`/
/// `Stall` carry the latch's name (e.g. `"if_id"`, `"id_ex"`); `TlbFill`/
/// `TlbHit` carry which TLB (e.g. `"instruction"`, `"data"`); `TrapEntry`
/// carries the raw cause code; `XRet` carries the target privilege level's
/// 2-bit encoding. This crate's [`crate::trace::CycleTrace`] wraps a
/// cycle's worth of these into a typed, architecture-aware view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelEvent {
    Flush(&'static str),
    Stall(&'static str),
    TrapEntry(u32),
    XRet(u8),
    TlbFill(&'static str),
    TlbHit(&'static str),
    ScSuccess,
    ScFail,
}

/// A record of control-flow events fired during one cycle's propagation.
#[derive(Default, Debug)]
pub struct Tracer {
    pub(crate) events: Vec<TunnelEvent>,
}

impl Tracer {
    pub fn fire(&mut self, event: TunnelEvent) {
        tracing::trace!(?event, "control-flow tunnel fired");
        self.events.push(event);
    }

    pub fn events(&self) -> &[TunnelEvent] {
        &self.events
    }
}

// Update input and intermediate signals from output signals.
pub type Updater<UnitIn, UnitOut, Inter, StageState> =
    Box<dyn FnMut(&mut UnitIn, &mut Inter, &mut StageState, &mut Tracer, &UnitOut, &StageState)>;

pub struct PropUpdates<T: CpuCircuit> {
    pub(crate) updates: BTreeMap<NodeId, Updater<T::UnitIn, T::UnitOut, T::Inter, T::StageState>>,
}

impl<T: CpuCircuit> PropUpdates<T> {
    pub fn make_propagator<'a>(
        &'a mut self,
        unit_in: &'a mut T::UnitIn,
        unit_out: T::UnitOut,
        nex_state: &'a mut T::StageState,
        cur_state: &'a T::StageState,
        context: &'a mut T::Inter,
    ) -> Propagator<'a, T> {
        Propagator {
            unit_in,
            unit_out,
            nex_state,
            cur_state,
            context,
            updates: self,
            tracer: Default::default(),
        }
    }
}

/// Simulate the combinational logic circuits by update functions.
pub struct PropCircuit<T: CpuCircuit> {
    pub updates: PropUpdates<T>,
    pub order: PropOrder,
}

impl<T: CpuCircuit> PropCircuit<T> {
    pub fn new(order: PropOrder) -> Self {
        Self {
            updates: PropUpdates {
                updates: Default::default(),
            },
            order,
        }
    }

    /// Generally, a circuit update function accepts output signal from previous units,
    /// and then emits input signals of the next units or update intermediate signals.
    ///
    /// `name` must already be present in `order`'s arena (declared via
    /// [`PropOrderBuilder::add_update`] or [`PropOrderBuilder::add_rev_deps`]
    /// during elaboration).
    pub fn add_update(
        &mut self,
        name: &'static str,
        func: impl FnMut(&mut T::UnitIn, &mut T::Inter, &mut T::StageState, &mut Tracer, &T::UnitOut, &T::StageState)
            + 'static,
    ) {
        let id = self.order.arena.id(name);
        self.updates.updates.insert(id, Box::new(func));
    }
}

/// Propagator simulates the combinational logic circuits.
pub struct Propagator<'a, T: CpuCircuit> {
    unit_in: &'a mut T::UnitIn,
    unit_out: T::UnitOut,
    cur_state: &'a T::StageState,
    nex_state: &'a mut T::StageState,
    context: &'a mut T::Inter,
    updates: &'a mut PropUpdates<T>,
    tracer: Tracer,
}

impl<'a, T: CpuCircuit> Propagator<'a, T>
where
    T::UnitIn: Clone,
    T::UnitOut: Clone,
{
    /// Execute a combinatorial logic circuit. See [`PropCircuit::add_update`].
    pub fn run_combinatorial_logic(&mut self, id: NodeId) {
        if let Some(func) = self.updates.updates.get_mut(&id) {
            func(
                self.unit_in,
                self.context,
                self.nex_state,
                &mut self.tracer,
                &self.unit_out,
                self.cur_state,
            )
        } else {
            panic!("elaboration bug: scheduled node has no registered update")
        }
    }

    /// Execute a unit.
    pub fn run_unit(&mut self, unit_fn: impl FnOnce(&T::UnitIn, &mut T::UnitOut)) {
        unit_fn(self.unit_in, &mut self.unit_out)
    }

    /// Get current signals.
    pub fn signals(&self) -> (T::UnitIn, T::UnitOut) {
        (self.unit_in.clone(), self.unit_out.clone())
    }

    pub fn finalize(self) -> (T::UnitOut, Tracer) {
        (self.unit_out, self.tracer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topo_orders_by_dependency() {
        let mut arena = NodeArena::new();
        let a = arena.intern("a");
        let b = arena.intern("b");
        let c = arena.intern("c");
        let edges = vec![(a, b), (b, c)];
        let levels = topo([a, b, c].into_iter(), &edges);
        let order: Vec<NodeId> = levels.iter().map(|(n, _)| *n).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    #[should_panic(expected = "not a DAG")]
    fn topo_panics_on_cycle() {
        let mut arena = NodeArena::new();
        let a = arena.intern("a");
        let b = arena.intern("b");
        let edges = vec![(a, b), (b, a)];
        topo([a, b].into_iter(), &edges);
    }

    #[test]
    fn builder_orders_update_after_its_dependency() {
        let mut builder = PropOrderBuilder::new("nex", "cur");
        builder.add_update("f_pc", "reset_vector");
        builder.add_update("d_pc", "f_pc");
        let order = builder.build();
        let names: Vec<&str> = order.iter().map(|(_, id)| order.arena().name(id)).collect();
        let f_pos = names.iter().position(|n| *n == "f_pc").unwrap();
        let d_pos = names.iter().position(|n| *n == "d_pc").unwrap();
        assert!(f_pos < d_pos);
    }
}
