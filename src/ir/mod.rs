//! The typed operation graph every pass reads and rewrites.
//!
//! A function body is an arena (`Body`) of values, operations and blocks
//! addressed by stable ids. Blocks nest inside `if` and `switch` ops, so a
//! body is a tree of regions rooted at its entry block. Replacement
//! subgraphs are assembled detached, as a `Fragment`, and materialized in
//! one step.

pub mod body;
pub mod builder;
pub mod fragment;
pub mod module;
pub mod op;
pub mod print;
pub mod types;
pub mod verify;

pub use body::{Block, BlockId, Body, InsertPoint, OpId, Operation, ValueDef, ValueId};
pub use builder::Builder;
pub use fragment::{map_operand, Fragment, Materialized, Operand, Parent, ValueMap};
pub use module::{Component, EntryPoint, Func, FuncKind, Module, Registry, SourceFile};
pub use op::OpKind;
pub use types::{FieldType, LayoutMember, LayoutType, StructType, Type};
