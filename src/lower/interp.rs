//! Constant interpreter.
//!
//! Evaluates the side-effect-free part of a body over BabyBear: literals,
//! field and index arithmetic, aggregates and layout references. Anything
//! that depends on trace data, an unbound argument or control flow does
//! not evaluate.

use std::collections::HashMap;
use std::fmt;

use crate::field::{BabyBear, PrimeField};
use crate::ir::{Body, LayoutType, OpKind, Type, ValueId};

/// A register range bound into a named buffer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BoundLayout {
    pub buffer: String,
    /// Register offset of the first register covered.
    pub offset: u32,
    pub layout: LayoutType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constant {
    Val(BabyBear),
    Index(u64),
    Layout(BoundLayout),
    Struct(Vec<(String, Constant)>),
    Array(Vec<Constant>),
}

impl Constant {
    pub fn val(v: u64) -> Constant {
        Constant::Val(BabyBear::from_u64(v))
    }

    pub fn as_val(&self) -> Option<BabyBear> {
        match self {
            Constant::Val(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<u64> {
        match self {
            Constant::Index(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Val(v) => write!(f, "{}", v),
            Constant::Index(i) => write!(f, "{}", i),
            Constant::Layout(l) => write!(f, "{}[{}]: {}", l.buffer, l.offset, l.layout),
            Constant::Struct(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
            Constant::Array(elements) => {
                write!(f, "[")?;
                for (i, value) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
        }
    }
}

pub struct Interpreter<'b> {
    body: &'b Body,
    bindings: HashMap<ValueId, Constant>,
    memo: HashMap<ValueId, Option<Constant>>,
}

impl<'b> Interpreter<'b> {
    pub fn new(body: &'b Body) -> Self {
        Self {
            body,
            bindings: HashMap::new(),
            memo: HashMap::new(),
        }
    }

    /// Give an argument (or any value) a fixed constant.
    pub fn bind(&mut self, value: ValueId, constant: Constant) {
        self.memo.clear();
        self.bindings.insert(value, constant);
    }

    pub fn evaluate(&mut self, value: ValueId) -> Option<Constant> {
        if let Some(bound) = self.bindings.get(&value) {
            return Some(bound.clone());
        }
        if let Some(known) = self.memo.get(&value) {
            return known.clone();
        }
        let result = self.compute(value);
        self.memo.insert(value, result.clone());
        result
    }

    pub fn evaluate_index(&mut self, value: ValueId) -> Option<u64> {
        match self.evaluate(value)? {
            Constant::Index(i) => Some(i),
            // Subscripts may be indexed by field elements.
            Constant::Val(v) => Some(v.to_u64()),
            _ => None,
        }
    }

    pub fn evaluate_layout(&mut self, value: ValueId) -> Option<BoundLayout> {
        match self.evaluate(value)? {
            Constant::Layout(l) => Some(l),
            _ => None,
        }
    }

    fn compute(&mut self, value: ValueId) -> Option<Constant> {
        let body = self.body;
        let op = body.defining_op(value)?;
        let o = body.op(op);
        if o.erased {
            return None;
        }
        let operands = &o.operands;
        match &o.kind {
            OpKind::Const { value } => Some(Constant::val(*value)),
            OpKind::IndexConst { value } => Some(Constant::Index(*value)),
            OpKind::Add | OpKind::Sub | OpKind::Mul => {
                let a = self.evaluate(operands[0])?.as_val()?;
                let b = self.evaluate(operands[1])?.as_val()?;
                Some(Constant::Val(match o.kind {
                    OpKind::Add => a.add(b),
                    OpKind::Sub => a.sub(b),
                    _ => a.mul(b),
                }))
            }
            OpKind::Neg => Some(Constant::Val(self.evaluate(operands[0])?.as_val()?.neg())),
            OpKind::AddIndex => {
                let a = self.evaluate(operands[0])?.as_index()?;
                let b = self.evaluate(operands[1])?.as_index()?;
                Some(Constant::Index(a.checked_add(b)?))
            }
            OpKind::BindLayout { buffer } => match body.value_type(value) {
                Type::Layout(layout) => Some(Constant::Layout(BoundLayout {
                    buffer: buffer.clone(),
                    offset: 0,
                    layout: layout.clone(),
                })),
                _ => None,
            },
            OpKind::Lookup { member } => match self.evaluate(operands[0])? {
                Constant::Layout(bound) => {
                    let (offset, layout) = bound.layout.member_offset(member)?;
                    Some(Constant::Layout(BoundLayout {
                        buffer: bound.buffer.clone(),
                        offset: bound.offset + offset,
                        layout: layout.clone(),
                    }))
                }
                Constant::Struct(fields) => fields
                    .into_iter()
                    .find(|(name, _)| name == member)
                    .map(|(_, v)| v),
                _ => None,
            },
            OpKind::Subscript => {
                let index = self.evaluate_index(operands[1])?;
                match self.evaluate(operands[0])? {
                    Constant::Layout(bound) => {
                        let (offset, layout) = bound.layout.element_offset(u32::try_from(index).ok()?)?;
                        Some(Constant::Layout(BoundLayout {
                            buffer: bound.buffer.clone(),
                            offset: bound.offset + offset,
                            layout: layout.clone(),
                        }))
                    }
                    Constant::Array(elements) => elements.into_iter().nth(index as usize),
                    _ => None,
                }
            }
            OpKind::Pack => {
                let values = operands
                    .iter()
                    .map(|&v| self.evaluate(v))
                    .collect::<Option<Vec<_>>>()?;
                match body.value_type(value) {
                    Type::Struct(st) => Some(Constant::Struct(
                        st.fields.iter().map(|f| f.name.clone()).zip(values).collect(),
                    )),
                    Type::Array { .. } => Some(Constant::Array(values)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}
