//! Component call graph and the lookback-need relation over it.

use std::collections::{BTreeMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::ir::{Component, OpKind, Registry};
use crate::span::Location;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    Construct,
    Back,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSite {
    pub caller: String,
    pub callee: String,
    pub kind: EdgeKind,
    pub loc: Location,
}

/// One node per component (plus one per unknown callee), one edge per
/// `construct` or `back` op.
pub struct CallGraph {
    graph: DiGraph<String, CallSite>,
    nodes: BTreeMap<String, NodeIndex>,
}

impl CallGraph {
    pub fn build(registry: &Registry) -> CallGraph {
        let mut cg = CallGraph {
            graph: DiGraph::new(),
            nodes: BTreeMap::new(),
        };
        for component in registry.iter() {
            cg.node(&component.name);
        }
        for component in registry.iter() {
            let from = cg.node(&component.name);
            for op in component.body.walk() {
                let op = component.body.op(op);
                let (callee, kind) = match &op.kind {
                    OpKind::Construct { callee } => (callee, EdgeKind::Construct),
                    OpKind::Back { callee, .. } => (callee, EdgeKind::Back),
                    _ => continue,
                };
                let to = cg.node(callee);
                cg.graph.add_edge(
                    from,
                    to,
                    CallSite {
                        caller: component.name.clone(),
                        callee: callee.clone(),
                        kind,
                        loc: op.loc.clone(),
                    },
                );
            }
        }
        cg
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    pub fn sites(&self) -> impl Iterator<Item = &CallSite> {
        self.graph.edge_weights()
    }

    /// Outgoing call sites of `caller`, in op order.
    pub fn calls_from(&self, caller: &str) -> Vec<&CallSite> {
        let Some(&idx) = self.nodes.get(caller) else {
            return Vec::new();
        };
        let mut out: Vec<(usize, &CallSite)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id().index(), e.weight()))
            .collect();
        out.sort_by_key(|(i, _)| *i);
        out.into_iter().map(|(_, site)| site).collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}

/// A component with no registers and at least one parameter has nothing
/// time-addressable; it never gets a lookback function.
pub fn needs_back(component: &Component) -> bool {
    component.layout.is_some() || component.params.is_empty()
}

/// Which components need a lookback function, and which call sites made
/// them need one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackNeeds {
    needed: BTreeMap<String, Vec<Location>>,
    /// Reached by the closure but excluded by `needs_back`.
    skipped: BTreeMap<String, Vec<Location>>,
}

impl BackNeeds {
    /// Seed from every `back` target, then close over sub-constructions of
    /// marked components.
    pub fn analyze(registry: &Registry) -> BackNeeds {
        let _span = tracing::debug_span!("back_needs").entered();
        let graph = CallGraph::build(registry);

        let mut marked: BTreeMap<String, Vec<Location>> = BTreeMap::new();
        let mut worklist = VecDeque::new();

        for site in graph.sites().filter(|s| s.kind == EdgeKind::Back) {
            let entry = marked.entry(site.callee.clone()).or_default();
            if entry.is_empty() {
                worklist.push_back(site.callee.clone());
            }
            entry.push(site.loc.clone());
        }

        while let Some(name) = worklist.pop_front() {
            for site in graph.calls_from(&name) {
                if site.kind != EdgeKind::Construct {
                    continue;
                }
                let entry = marked.entry(site.callee.clone()).or_default();
                if entry.is_empty() {
                    worklist.push_back(site.callee.clone());
                }
                entry.push(site.loc.clone());
            }
        }

        let (needed, skipped) = marked
            .into_iter()
            .partition(|(name, _)| registry.get(name).map_or(true, needs_back));
        let needs = BackNeeds { needed, skipped };
        tracing::debug!(
            needed = needs.needed.len(),
            skipped = needs.skipped.len(),
            "lookback needs"
        );
        needs
    }

    pub fn contains(&self, name: &str) -> bool {
        self.needed.contains_key(name)
    }

    pub fn required_by(&self, name: &str) -> &[Location] {
        self.needed
            .get(name)
            .or_else(|| self.skipped.get(name))
            .map_or(&[], |v| v.as_slice())
    }

    /// Names needing a lookback function, in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.needed.keys().map(|s| s.as_str())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.skipped.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.needed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.needed.is_empty()
    }
}
