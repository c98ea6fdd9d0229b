use serde::{Deserialize, Serialize};

use super::op::OpKind;
use super::types::Type;
use super::verify;
use crate::error::Result;
use crate::span::Location;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u32);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueDef {
    Result { op: OpId, index: u32 },
    Arg { block: BlockId, index: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueData {
    pub ty: Type,
    pub def: ValueDef,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OpKind,
    #[serde(default)]
    pub operands: Vec<ValueId>,
    #[serde(default)]
    pub results: Vec<ValueId>,
    #[serde(default)]
    pub regions: Vec<BlockId>,
    #[serde(default)]
    pub loc: Location,
    pub parent: Option<BlockId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub erased: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub args: Vec<ValueId>,
    pub ops: Vec<OpId>,
    pub parent: Option<OpId>,
}

/// Where a newly created operation goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertPoint {
    Start(BlockId),
    End(BlockId),
    Before(OpId),
}

/// An arena holding one function body.
///
/// Ids are indices into the arena and stay valid for the lifetime of the
/// body. Erasing an operation only unlinks it from its block and marks it;
/// the slot is never reused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    values: Vec<ValueData>,
    ops: Vec<Operation>,
    blocks: Vec<Block>,
    entry: BlockId,
}

impl Body {
    /// An empty body whose entry block takes `arg_types`.
    pub fn new(arg_types: Vec<Type>) -> Body {
        let mut body = Body {
            values: Vec::new(),
            ops: Vec::new(),
            blocks: vec![Block::default()],
            entry: BlockId(0),
        };
        for (index, ty) in arg_types.into_iter().enumerate() {
            let v = body.push_value(
                ty,
                ValueDef::Arg {
                    block: BlockId(0),
                    index: index as u32,
                },
            );
            body.blocks[0].args.push(v);
        }
        body
    }

    fn push_value(&mut self, ty: Type, def: ValueDef) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData { ty, def });
        id
    }

    // ─── Accessors ─────────────────────────────────────────────────

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn args(&self) -> &[ValueId] {
        &self.blocks[self.entry.0 as usize].args
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn op(&self, id: OpId) -> &Operation {
        &self.ops[id.0 as usize]
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.0 as usize]
    }

    pub fn value_type(&self, id: ValueId) -> &Type {
        &self.values[id.0 as usize].ty
    }

    pub fn defining_op(&self, id: ValueId) -> Option<OpId> {
        match self.value(id).def {
            ValueDef::Result { op, .. } => Some(op),
            ValueDef::Arg { .. } => None,
        }
    }

    /// The first result of `op`. Only call on ops with results.
    pub fn result(&self, op: OpId) -> ValueId {
        self.op(op).results[0]
    }

    /// The op whose region contains `op`.
    pub fn parent_op(&self, op: OpId) -> Option<OpId> {
        self.op(op).parent.and_then(|b| self.block(b).parent)
    }

    pub fn terminator(&self, block: BlockId) -> Option<OpId> {
        self.block(block)
            .ops
            .last()
            .copied()
            .filter(|&op| self.op(op).kind.is_terminator())
    }

    /// The execution context argument, when the body takes one.
    pub fn exec_context(&self) -> Option<ValueId> {
        self.args()
            .first()
            .copied()
            .filter(|&v| *self.value_type(v) == Type::Ctx)
    }

    pub fn op_count(&self) -> usize {
        self.ops.iter().filter(|op| !op.erased).count()
    }

    // ─── Construction ──────────────────────────────────────────────

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::default());
        id
    }

    /// Create a detached operation. Operand, result and region shapes are
    /// checked here; the op is not part of any block until `insert`.
    pub fn create_op(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_types: Vec<Type>,
        regions: Vec<BlockId>,
        loc: Location,
    ) -> Result<OpId> {
        let operand_types: Vec<Type> = operands.iter().map(|&v| self.value_type(v).clone()).collect();
        verify::check_op(&kind, &operand_types, &result_types, regions.len(), &loc)?;

        let id = OpId(self.ops.len() as u32);
        let results = result_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| {
                self.push_value(
                    ty,
                    ValueDef::Result {
                        op: id,
                        index: index as u32,
                    },
                )
            })
            .collect();
        for &region in &regions {
            self.blocks[region.0 as usize].parent = Some(id);
        }
        self.ops.push(Operation {
            kind,
            operands,
            results,
            regions,
            loc,
            parent: None,
            erased: false,
        });
        Ok(id)
    }

    pub fn insert(&mut self, op: OpId, at: InsertPoint) {
        let (block, pos) = match at {
            InsertPoint::Start(block) => (block, 0),
            InsertPoint::End(block) => (block, self.block(block).ops.len()),
            InsertPoint::Before(anchor) => {
                let block = self.op(anchor).parent.unwrap_or(self.entry);
                let pos = self
                    .block(block)
                    .ops
                    .iter()
                    .position(|&o| o == anchor)
                    .unwrap_or(self.block(block).ops.len());
                (block, pos)
            }
        };
        self.blocks[block.0 as usize].ops.insert(pos, op);
        self.ops[op.0 as usize].parent = Some(block);
    }

    /// Create and insert in one step.
    pub fn build(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_types: Vec<Type>,
        regions: Vec<BlockId>,
        loc: Location,
        at: InsertPoint,
    ) -> Result<OpId> {
        let op = self.create_op(kind, operands, result_types, regions, loc)?;
        self.insert(op, at);
        Ok(op)
    }

    // ─── Mutation ──────────────────────────────────────────────────

    pub fn set_operand(&mut self, op: OpId, index: usize, value: ValueId) {
        self.ops[op.0 as usize].operands[index] = value;
    }

    /// Redirect every use of `from` to `to`. Types are not checked here;
    /// callers that change types re-verify afterwards.
    pub fn replace_all_uses(&mut self, from: ValueId, to: ValueId) {
        for op in self.ops.iter_mut().filter(|op| !op.erased) {
            for operand in op.operands.iter_mut() {
                if *operand == from {
                    *operand = to;
                }
            }
        }
    }

    /// Unlink `op` from its block and erase everything in the regions it
    /// still owns.
    pub fn erase(&mut self, op: OpId) {
        if self.op(op).erased {
            return;
        }
        if let Some(block) = self.op(op).parent {
            self.blocks[block.0 as usize].ops.retain(|&o| o != op);
        }
        self.ops[op.0 as usize].erased = true;
        let regions = self.op(op).regions.clone();
        for region in regions {
            if self.block(region).parent != Some(op) {
                continue;
            }
            let children = self.block(region).ops.clone();
            for child in children {
                self.erase(child);
            }
        }
    }

    pub fn retype_values(&mut self, f: impl Fn(&Type) -> Type) {
        for value in self.values.iter_mut() {
            value.ty = f(&value.ty);
        }
    }

    // ─── Queries ───────────────────────────────────────────────────

    /// Every live op reachable from the entry block, in pre-order.
    pub fn walk(&self) -> Vec<OpId> {
        self.walk_block(self.entry)
    }

    pub fn walk_block(&self, block: BlockId) -> Vec<OpId> {
        let mut out = Vec::new();
        self.walk_into(block, &mut out);
        out
    }

    fn walk_into(&self, block: BlockId, out: &mut Vec<OpId>) {
        for &op in &self.block(block).ops {
            out.push(op);
            for &region in &self.op(op).regions {
                self.walk_into(region, out);
            }
        }
    }

    /// Entry block plus every region of a reachable op.
    pub fn live_blocks(&self) -> Vec<BlockId> {
        let mut blocks = vec![self.entry];
        for op in self.walk() {
            blocks.extend(self.op(op).regions.iter().copied());
        }
        blocks
    }

    /// Uses of `value` as (op, operand index).
    pub fn users(&self, value: ValueId) -> Vec<(OpId, usize)> {
        let mut out = Vec::new();
        for (i, op) in self.ops.iter().enumerate() {
            if op.erased {
                continue;
            }
            for (j, &operand) in op.operands.iter().enumerate() {
                if operand == value {
                    out.push((OpId(i as u32), j));
                }
            }
        }
        out
    }

    pub fn has_uses(&self, value: ValueId) -> bool {
        self.ops
            .iter()
            .any(|op| !op.erased && op.operands.contains(&value))
    }

    pub fn results_unused(&self, op: OpId) -> bool {
        self.op(op).results.iter().all(|&v| !self.has_uses(v))
    }

    /// Is `op` nested (at any depth) inside a region of `ancestor`?
    pub fn is_inside(&self, op: OpId, ancestor: OpId) -> bool {
        let mut cur = self.parent_op(op);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.parent_op(p);
        }
        false
    }

    pub fn verify(&self) -> Result<()> {
        verify::verify_body(self)
    }
}

#[cfg(test)]
mod tests;
