//! Detached replacement subgraphs.
//!
//! A `Fragment` is built against a target body without touching it: its
//! operands name either values already in the target or results of earlier
//! fragment ops. Rewrite rules return fragments, and cloning a region from
//! any body (the same one or another) goes through one as well, so the
//! source is never mutated while it is read.

use std::collections::HashMap;

use super::body::{BlockId, Body, InsertPoint, OpId, ValueId};
use super::op::OpKind;
use super::types::Type;
use crate::error::Result;
use crate::span::Location;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Existing(ValueId),
    Local { op: usize, result: u32 },
}

/// Source value → value in the fragment under construction.
pub type ValueMap = HashMap<ValueId, Operand>;

/// Fragment op index and region index a new op is nested under; `None`
/// places it at the fragment's top level.
pub type Parent = Option<(usize, usize)>;

pub fn map_operand(map: &ValueMap, v: ValueId) -> Operand {
    map.get(&v).copied().unwrap_or(Operand::Existing(v))
}

#[derive(Clone, Debug)]
pub enum FragRegion {
    Ops(Vec<usize>),
    /// Take over an existing block of the target body.
    Adopt(BlockId),
}

#[derive(Clone, Debug)]
pub struct FragOp {
    pub kind: OpKind,
    pub operands: Vec<Operand>,
    pub result_types: Vec<Type>,
    pub regions: Vec<FragRegion>,
    pub loc: Location,
}

#[derive(Clone, Debug, Default)]
pub struct Fragment {
    ops: Vec<FragOp>,
    top: Vec<usize>,
}

/// Ids of the ops a fragment turned into.
#[derive(Clone, Debug)]
pub struct Materialized {
    ops: Vec<OpId>,
}

impl Materialized {
    pub fn op(&self, index: usize) -> OpId {
        self.ops[index]
    }

    pub fn resolve(&self, body: &Body, operand: Operand) -> ValueId {
        match operand {
            Operand::Existing(v) => v,
            Operand::Local { op, result } => body.op(self.ops[op]).results[result as usize],
        }
    }
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[FragOp] {
        &self.ops
    }

    fn attach(&mut self, parent: Parent, op: FragOp) -> usize {
        let index = self.ops.len();
        self.ops.push(op);
        match parent {
            None => self.top.push(index),
            Some((owner, region)) => match &mut self.ops[owner].regions[region] {
                FragRegion::Ops(children) => children.push(index),
                FragRegion::Adopt(_) => {
                    unreachable!("cannot nest fragment ops in an adopted block")
                }
            },
        }
        index
    }

    pub fn push(
        &mut self,
        parent: Parent,
        kind: OpKind,
        operands: Vec<Operand>,
        result_types: Vec<Type>,
        loc: Location,
    ) -> usize {
        self.push_with_regions(parent, kind, operands, result_types, 0, loc)
    }

    /// Push an op owning `regions` fresh, empty blocks.
    pub fn push_with_regions(
        &mut self,
        parent: Parent,
        kind: OpKind,
        operands: Vec<Operand>,
        result_types: Vec<Type>,
        regions: usize,
        loc: Location,
    ) -> usize {
        let op = FragOp {
            kind,
            operands,
            result_types,
            regions: (0..regions).map(|_| FragRegion::Ops(Vec::new())).collect(),
            loc,
        };
        self.attach(parent, op)
    }

    /// Push an op that takes over existing blocks of the target body.
    pub fn push_adopting(
        &mut self,
        parent: Parent,
        kind: OpKind,
        operands: Vec<Operand>,
        result_types: Vec<Type>,
        blocks: Vec<BlockId>,
        loc: Location,
    ) -> usize {
        let op = FragOp {
            kind,
            operands,
            result_types,
            regions: blocks.into_iter().map(FragRegion::Adopt).collect(),
            loc,
        };
        self.attach(parent, op)
    }

    pub fn set_kind(&mut self, op: usize, kind: OpKind) {
        self.ops[op].kind = kind;
    }

    /// First result of fragment op `op`.
    pub fn value(&self, op: usize) -> Operand {
        Operand::Local { op, result: 0 }
    }

    pub fn ty(&self, body: &Body, operand: Operand) -> Type {
        match operand {
            Operand::Existing(v) => body.value_type(v).clone(),
            Operand::Local { op, result } => self.ops[op].result_types[result as usize].clone(),
        }
    }

    // ─── Cloning ───────────────────────────────────────────────────

    /// Clone `op` (with its regions) out of `src`. Its results are recorded
    /// in `map`. With `inlined_at`, locations gain that call site.
    pub fn clone_op(
        &mut self,
        src: &Body,
        op: OpId,
        parent: Parent,
        map: &mut ValueMap,
        inlined_at: Option<&Location>,
    ) -> usize {
        let source = src.op(op);
        let operands = source.operands.iter().map(|&v| map_operand(map, v)).collect();
        let result_types = source.results.iter().map(|&v| src.value_type(v).clone()).collect();
        let loc = match inlined_at {
            Some(site) => source.loc.inlined_into(site),
            None => source.loc.clone(),
        };
        let index = self.push_with_regions(
            parent,
            source.kind.clone(),
            operands,
            result_types,
            source.regions.len(),
            loc,
        );
        for (i, &v) in source.results.iter().enumerate() {
            map.insert(
                v,
                Operand::Local {
                    op: index,
                    result: i as u32,
                },
            );
        }
        for (r, &region) in source.regions.iter().enumerate() {
            for &child in &src.block(region).ops {
                self.clone_op(src, child, Some((index, r)), map, inlined_at);
            }
        }
        index
    }

    /// Clone every non-terminator op of `block` and return the terminator's
    /// operands, mapped.
    pub fn clone_block_ops(
        &mut self,
        src: &Body,
        block: BlockId,
        parent: Parent,
        map: &mut ValueMap,
        inlined_at: Option<&Location>,
    ) -> Vec<Operand> {
        for &op in &src.block(block).ops {
            if src.op(op).kind.is_terminator() {
                continue;
            }
            self.clone_op(src, op, parent, map, inlined_at);
        }
        match src.terminator(block) {
            Some(term) => src
                .op(term)
                .operands
                .iter()
                .map(|&v| map_operand(map, v))
                .collect(),
            None => Vec::new(),
        }
    }

    // ─── Materialization ───────────────────────────────────────────

    /// Create every fragment op in `body`; top-level ops land at `at`, in
    /// order.
    pub fn materialize(self, body: &mut Body, at: InsertPoint) -> Result<Materialized> {
        let blocks: Vec<Vec<BlockId>> = self
            .ops
            .iter()
            .map(|op| {
                op.regions
                    .iter()
                    .map(|r| match r {
                        FragRegion::Ops(_) => body.add_block(),
                        FragRegion::Adopt(b) => *b,
                    })
                    .collect()
            })
            .collect();

        let mut created = Materialized {
            ops: Vec::with_capacity(self.ops.len()),
        };
        for (i, op) in self.ops.iter().enumerate() {
            let operands = op
                .operands
                .iter()
                .map(|&o| created.resolve(body, o))
                .collect();
            let id = body.create_op(
                op.kind.clone(),
                operands,
                op.result_types.clone(),
                blocks[i].clone(),
                op.loc.clone(),
            )?;
            created.ops.push(id);
        }

        for (i, op) in self.ops.iter().enumerate() {
            for (r, region) in op.regions.iter().enumerate() {
                if let FragRegion::Ops(children) = region {
                    for &child in children {
                        body.insert(created.ops[child], InsertPoint::End(blocks[i][r]));
                    }
                }
            }
        }

        // Inserting repeatedly at the start of a block would reverse the
        // order, so anchor on whatever is first right now.
        let at = match at {
            InsertPoint::Start(block) => match body.block(block).ops.first() {
                Some(&first) => InsertPoint::Before(first),
                None => InsertPoint::End(block),
            },
            other => other,
        };
        for &i in &self.top {
            body.insert(created.ops[i], at);
        }
        Ok(created)
    }
}
