//! Tap discovery and the tap-indexed validity function.
//!
//! Every load left in the validity aggregate must name a fixed register
//! at a fixed distance. Those triples, deduplicated in first-seen order,
//! are the taps the opening protocol provides; `validity_taps` reads them
//! from an array argument instead of from trace storage.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LowerError, Result};
use crate::ir::{
    Body, Fragment, Func, FuncKind, InsertPoint, OpId, OpKind, Operand, Type, ValueMap,
};

use super::cse::eliminate_common_subexpressions;
use super::interp::Interpreter;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tap {
    pub buffer: String,
    pub offset: u32,
    pub back: u64,
}

impl fmt::Display for Tap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.buffer, self.offset, self.back)
    }
}

/// Distinct taps in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TapTable {
    taps: Vec<Tap>,
    #[serde(skip)]
    index: HashMap<Tap, usize>,
}

impl TapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `tap`, adding it if it is new.
    pub fn insert(&mut self, tap: Tap) -> usize {
        if let Some(&i) = self.index.get(&tap) {
            return i;
        }
        let i = self.taps.len();
        self.index.insert(tap.clone(), i);
        self.taps.push(tap);
        i
    }

    pub fn index_of(&self, tap: &Tap) -> Option<usize> {
        self.index.get(tap).copied()
    }

    pub fn get(&self, index: usize) -> Option<&Tap> {
        self.taps.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tap> {
        self.taps.iter()
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Hash of the ordered triples. Prover and verifier builds agree on
    /// tap order iff their fingerprints match.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for tap in &self.taps {
            hasher.update(&(tap.buffer.len() as u64).to_le_bytes());
            hasher.update(tap.buffer.as_bytes());
            hasher.update(&tap.offset.to_le_bytes());
            hasher.update(&tap.back.to_le_bytes());
        }
        hasher.finalize()
    }
}

impl fmt::Display for TapTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tap) in self.taps.iter().enumerate() {
            writeln!(f, "{}: {}", i, tap)?;
        }
        Ok(())
    }
}

fn tap_of_load(interp: &mut Interpreter<'_>, body: &Body, load: OpId) -> Result<Tap> {
    let o = body.op(load);
    let non_constant = |operand: &'static str| LowerError::NonConstantTapReference {
        operand,
        loc: o.loc.clone(),
    };
    let reference = interp
        .evaluate_layout(o.operands[0])
        .ok_or_else(|| non_constant("reference"))?;
    let back = interp
        .evaluate_index(o.operands[1])
        .ok_or_else(|| non_constant("distance"))?;
    Ok(Tap {
        buffer: reference.buffer,
        offset: reference.offset,
        back,
    })
}

fn loads(body: &Body) -> Vec<OpId> {
    body.walk()
        .into_iter()
        .filter(|&o| matches!(body.op(o).kind, OpKind::Load { .. }))
        .collect()
}

/// Collect the taps read by `regs`, in walk order.
pub fn discover_taps(regs: &Func) -> Result<TapTable> {
    let body = &regs.body;
    let mut interp = Interpreter::new(body);
    let mut table = TapTable::new();
    for load in loads(body) {
        let tap = tap_of_load(&mut interp, body, load)?;
        table.insert(tap);
    }
    tracing::debug!(taps = table.len(), "taps discovered");
    Ok(table)
}

/// Ops allowed in the tap-indexed validity function.
fn allowed_in_validity(kind: &OpKind) -> bool {
    matches!(
        kind,
        OpKind::Const { .. }
            | OpKind::IndexConst { .. }
            | OpKind::Add
            | OpKind::Sub
            | OpKind::Mul
            | OpKind::Neg
            | OpKind::AddIndex
            | OpKind::Pack
            | OpKind::Lookup { .. }
            | OpKind::Subscript
            | OpKind::Magic
            | OpKind::True
            | OpKind::AndEqz
            | OpKind::AndCond
            | OpKind::Return
    )
}

/// Build `validity_taps(ctx, taps: array<ext; N>) -> constraint` from
/// `validity_regs`, reading each load from `table`.
pub fn generate_validity_taps(regs: &Func, table: &TapTable) -> Result<Func> {
    let _span = tracing::debug_span!("validity_taps", taps = table.len()).entered();
    let taps_type = Type::Array {
        element: Box::new(Type::Ext),
        len: table.len() as u32,
    };
    let mut body = Body::new(vec![Type::Ctx, taps_type]);
    let (ctx, taps) = (body.args()[0], body.args()[1]);

    let src = &regs.body;
    let mut map = ValueMap::new();
    if let Some(src_ctx) = src.exec_context() {
        map.insert(src_ctx, Operand::Existing(ctx));
    }
    let mut frag = Fragment::new();
    for &op in &src.block(src.entry()).ops {
        frag.clone_op(src, op, None, &mut map, None);
    }
    let entry = body.entry();
    frag.materialize(&mut body, InsertPoint::End(entry))?;

    let mut indexed = Vec::new();
    {
        let mut interp = Interpreter::new(&body);
        for load in loads(&body) {
            let tap = tap_of_load(&mut interp, &body, load)?;
            let Some(i) = table.index_of(&tap) else {
                return Err(LowerError::UnsupportedOperationInValidity {
                    op: "load",
                    loc: body.op(load).loc.clone(),
                });
            };
            indexed.push((load, i));
        }
    }
    for (load, i) in indexed {
        let loc = body.op(load).loc.clone();
        let index = body.build(
            OpKind::IndexConst { value: i as u64 },
            vec![],
            vec![Type::Index],
            vec![],
            loc.clone(),
            InsertPoint::Before(load),
        )?;
        let index = body.result(index);
        let read = body.build(
            OpKind::Subscript,
            vec![taps, index],
            vec![Type::Ext],
            vec![],
            loc,
            InsertPoint::Before(load),
        )?;
        let read = body.result(read);
        let old = body.result(load);
        body.replace_all_uses(old, read);
        body.erase(load);
    }

    // Layout references die with the loads; drop them before re-checking
    // the widened types.
    body.retype_values(Type::widened);
    let removed = eliminate_common_subexpressions(&mut body);
    body.verify()?;

    for op in body.walk() {
        let o = body.op(op);
        if !allowed_in_validity(&o.kind) {
            return Err(LowerError::UnsupportedOperationInValidity {
                op: o.kind.name(),
                loc: o.loc.clone(),
            });
        }
    }
    tracing::debug!(removed, ops = body.op_count(), "tap-indexed validity ready");

    Ok(Func {
        name: "validity_taps".to_string(),
        kind: FuncKind::ValidityTaps,
        component: String::new(),
        result: Some(Type::Constraint),
        body,
        loc: regs.loc.clone(),
    })
}
