//! Convenience layer for building bodies in code: benches, tests and
//! front ends that assemble components programmatically.
//!
//! Type errors do not interrupt building. The first one is kept and
//! returned by `finish`; the offending op is replaced by `magic`
//! placeholders so later calls still get values of the intended types.

use super::body::{BlockId, Body, InsertPoint, ValueId};
use super::op::OpKind;
use super::types::{LayoutType, Type};
use crate::error::{LowerError, Result};
use crate::span::{Location, Span};

pub struct Builder {
    body: Body,
    block: BlockId,
    loc: Location,
    error: Option<LowerError>,
}

impl Builder {
    pub fn new(arg_types: Vec<Type>) -> Self {
        let body = Body::new(arg_types);
        let block = body.entry();
        Self {
            body,
            block,
            loc: Location::dummy(),
            error: None,
        }
    }

    pub fn arg(&self, index: usize) -> ValueId {
        self.body.args()[index]
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Attach `span` to every op built from here on.
    pub fn at(&mut self, span: Span) -> &mut Self {
        self.loc = Location::new(span);
        self
    }

    pub fn finish(self) -> Result<Body> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.body),
        }
    }

    fn emit(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_types: Vec<Type>,
        regions: Vec<BlockId>,
    ) -> Vec<ValueId> {
        let at = InsertPoint::End(self.block);
        match self
            .body
            .build(kind, operands, result_types.clone(), regions, self.loc.clone(), at)
        {
            Ok(op) => self.body.op(op).results.clone(),
            Err(err) => {
                self.error.get_or_insert(err);
                result_types
                    .into_iter()
                    .filter_map(|ty| {
                        self.body
                            .build(OpKind::Magic, vec![], vec![ty], vec![], self.loc.clone(), at)
                            .ok()
                            .map(|op| self.body.result(op))
                    })
                    .collect()
            }
        }
    }

    fn emit_one(&mut self, kind: OpKind, operands: Vec<ValueId>, ty: Type) -> ValueId {
        self.emit(kind, operands, vec![ty], vec![])[0]
    }

    fn ty(&self, v: ValueId) -> Type {
        self.body.value_type(v).clone()
    }

    fn derived(&mut self, op: &'static str, ty: Option<Type>, operand: ValueId) -> Type {
        match ty {
            Some(ty) => ty,
            None => {
                self.error.get_or_insert(LowerError::TypeMismatch {
                    op,
                    expected: "aggregate".to_string(),
                    found: self.body.value_type(operand).to_string(),
                    loc: self.loc.clone(),
                });
                Type::unit()
            }
        }
    }

    // ─── Values ────────────────────────────────────────────────────

    pub fn const_val(&mut self, value: u64) -> ValueId {
        self.emit_one(OpKind::Const { value }, vec![], Type::Val)
    }

    pub fn index(&mut self, value: u64) -> ValueId {
        self.emit_one(OpKind::IndexConst { value }, vec![], Type::Index)
    }

    pub fn add(&mut self, a: ValueId, b: ValueId) -> ValueId {
        let ty = self.ty(a);
        self.emit_one(OpKind::Add, vec![a, b], ty)
    }

    pub fn sub(&mut self, a: ValueId, b: ValueId) -> ValueId {
        let ty = self.ty(a);
        self.emit_one(OpKind::Sub, vec![a, b], ty)
    }

    pub fn mul(&mut self, a: ValueId, b: ValueId) -> ValueId {
        let ty = self.ty(a);
        self.emit_one(OpKind::Mul, vec![a, b], ty)
    }

    pub fn neg(&mut self, a: ValueId) -> ValueId {
        let ty = self.ty(a);
        self.emit_one(OpKind::Neg, vec![a], ty)
    }

    pub fn add_index(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.emit_one(OpKind::AddIndex, vec![a, b], Type::Index)
    }

    pub fn pack(&mut self, values: Vec<ValueId>, ty: Type) -> ValueId {
        self.emit_one(OpKind::Pack, values, ty)
    }

    pub fn lookup(&mut self, value: ValueId, member: &str) -> ValueId {
        let ty = self.ty(value).member(member);
        let ty = self.derived("lookup", ty, value);
        self.emit_one(
            OpKind::Lookup {
                member: member.to_string(),
            },
            vec![value],
            ty,
        )
    }

    pub fn subscript(&mut self, value: ValueId, index: ValueId) -> ValueId {
        let ty = self.ty(value).element();
        let ty = self.derived("subscript", ty, value);
        self.emit_one(OpKind::Subscript, vec![value, index], ty)
    }

    pub fn extern_call(&mut self, name: &str, operands: Vec<ValueId>, result_types: Vec<Type>) -> Vec<ValueId> {
        self.emit(
            OpKind::Extern {
                name: name.to_string(),
            },
            operands,
            result_types,
            vec![],
        )
    }

    pub fn magic(&mut self, ty: Type) -> ValueId {
        self.emit_one(OpKind::Magic, vec![], ty)
    }

    // ─── Trace storage ─────────────────────────────────────────────

    pub fn bind_layout(&mut self, buffer: &str, layout: LayoutType) -> ValueId {
        self.emit_one(
            OpKind::BindLayout {
                buffer: buffer.to_string(),
            },
            vec![],
            Type::Layout(layout),
        )
    }

    /// Load `reg` as it was `distance` steps ago.
    pub fn load(&mut self, reg: ValueId, distance: u64) -> ValueId {
        let d = self.index(distance);
        self.load_at(reg, d)
    }

    pub fn load_at(&mut self, reg: ValueId, distance: ValueId) -> ValueId {
        self.emit_one(OpKind::Load { unchecked: false }, vec![reg, distance], Type::Val)
    }

    pub fn store(&mut self, reg: ValueId, value: ValueId) {
        self.emit(OpKind::Store, vec![reg, value], vec![], vec![]);
    }

    pub fn alias_layout(&mut self, a: ValueId, b: ValueId) {
        self.emit(OpKind::AliasLayout, vec![a, b], vec![], vec![]);
    }

    // ─── Constraints ───────────────────────────────────────────────

    pub fn equal_zero(&mut self, value: ValueId) {
        self.emit(OpKind::EqualZero, vec![value], vec![], vec![]);
    }

    /// Constrain `a == b`.
    pub fn eq(&mut self, a: ValueId, b: ValueId) {
        let diff = self.sub(a, b);
        self.equal_zero(diff);
    }

    // ─── Components ────────────────────────────────────────────────

    pub fn construct(&mut self, callee: &str, operands: Vec<ValueId>, result: Type) -> ValueId {
        self.emit_one(
            OpKind::Construct {
                callee: callee.to_string(),
            },
            operands,
            result,
        )
    }

    pub fn back(&mut self, callee: &str, distance: u64, layout: Option<ValueId>, result: Type) -> ValueId {
        self.emit_one(
            OpKind::Back {
                callee: callee.to_string(),
                distance,
            },
            layout.into_iter().collect(),
            result,
        )
    }

    // ─── Control ───────────────────────────────────────────────────

    pub fn if_(&mut self, cond: ValueId, then: impl FnOnce(&mut Builder)) {
        let region = self.body.add_block();
        let outer = std::mem::replace(&mut self.block, region);
        then(self);
        self.emit(OpKind::Terminate, vec![], vec![], vec![]);
        self.block = outer;
        self.emit(OpKind::If, vec![cond], vec![], vec![region]);
    }

    /// One arm per selector; `arm` builds arm `i` and returns the value it
    /// yields.
    pub fn switch(
        &mut self,
        selectors: Vec<ValueId>,
        result: Type,
        mut arm: impl FnMut(&mut Builder, usize) -> ValueId,
    ) -> ValueId {
        let outer = self.block;
        let mut regions = Vec::with_capacity(selectors.len());
        for i in 0..selectors.len() {
            let region = self.body.add_block();
            self.block = region;
            let yielded = arm(self, i);
            self.emit(OpKind::Yield, vec![yielded], vec![], vec![]);
            regions.push(region);
        }
        self.block = outer;
        self.emit(OpKind::Switch, selectors, vec![result], regions)[0]
    }

    pub fn ret(&mut self, values: Vec<ValueId>) {
        self.emit(OpKind::Return, values, vec![], vec![]);
    }
}
