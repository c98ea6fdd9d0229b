//! Whole-module and per-op analyses the generators consult.

pub mod callgraph;
pub mod purity;

pub use callgraph::{needs_back, BackNeeds, CallGraph, CallSite, EdgeKind};
pub use purity::{has_pending_rewrites, is_idempotent, is_pure_value, unravel_blocker};
