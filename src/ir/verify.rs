//! Structural and type rules for operations and bodies.

use super::body::{Body, BlockId};
use super::op::OpKind;
use super::types::{LayoutType, Type};
use crate::error::{LowerError, Result};
use crate::span::Location;

fn mismatch(op: &OpKind, expected: impl Into<String>, found: impl Into<String>, loc: &Location) -> LowerError {
    LowerError::TypeMismatch {
        op: op.name(),
        expected: expected.into(),
        found: found.into(),
        loc: loc.clone(),
    }
}

fn list(types: &[Type]) -> String {
    let parts: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    format!("({})", parts.join(", "))
}

fn expect_arity(kind: &OpKind, what: &str, got: usize, want: usize, loc: &Location) -> Result<()> {
    if got != want {
        return Err(mismatch(
            kind,
            format!("{} {}", want, what),
            format!("{} {}", got, what),
            loc,
        ));
    }
    Ok(())
}

fn expect_field(kind: &OpKind, ty: &Type, loc: &Location) -> Result<()> {
    if !ty.is_field() {
        return Err(mismatch(kind, "val or ext", ty.to_string(), loc));
    }
    Ok(())
}

fn expect_type(kind: &OpKind, ty: &Type, want: &Type, loc: &Location) -> Result<()> {
    if ty != want {
        return Err(mismatch(kind, want.to_string(), ty.to_string(), loc));
    }
    Ok(())
}

/// Check one operation's operand, result and region shape.
pub fn check_op(
    kind: &OpKind,
    operands: &[Type],
    results: &[Type],
    regions: usize,
    loc: &Location,
) -> Result<()> {
    let want_regions = match kind {
        OpKind::If => 1,
        OpKind::Switch => operands.len(),
        _ => 0,
    };
    expect_arity(kind, "regions", regions, want_regions, loc)?;

    match kind {
        OpKind::Const { .. } => {
            expect_arity(kind, "operands", operands.len(), 0, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            expect_field(kind, &results[0], loc)
        }
        OpKind::IndexConst { .. } => {
            expect_arity(kind, "operands", operands.len(), 0, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            expect_type(kind, &results[0], &Type::Index, loc)
        }
        OpKind::Add | OpKind::Sub | OpKind::Mul => {
            expect_arity(kind, "operands", operands.len(), 2, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            expect_field(kind, &operands[0], loc)?;
            expect_type(kind, &operands[1], &operands[0], loc)?;
            expect_type(kind, &results[0], &operands[0], loc)
        }
        OpKind::Neg => {
            expect_arity(kind, "operands", operands.len(), 1, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            expect_field(kind, &operands[0], loc)?;
            expect_type(kind, &results[0], &operands[0], loc)
        }
        OpKind::AddIndex => {
            expect_arity(kind, "operands", operands.len(), 2, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            for ty in operands.iter().chain(results) {
                expect_type(kind, ty, &Type::Index, loc)?;
            }
            Ok(())
        }
        OpKind::Pack => {
            expect_arity(kind, "results", results.len(), 1, loc)?;
            let expected: Vec<Type> = match &results[0] {
                Type::Struct(st) => st.fields.iter().map(|f| f.ty.clone()).collect(),
                Type::Array { element, len } => vec![(**element).clone(); *len as usize],
                other => return Err(mismatch(kind, "struct or array result", other.to_string(), loc)),
            };
            if expected.as_slice() != operands {
                return Err(mismatch(kind, list(&expected), list(operands), loc));
            }
            Ok(())
        }
        OpKind::Lookup { member } => {
            expect_arity(kind, "operands", operands.len(), 1, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            let Some(field) = operands[0].member(member) else {
                return Err(mismatch(
                    kind,
                    format!("aggregate with member `{}`", member),
                    operands[0].to_string(),
                    loc,
                ));
            };
            expect_type(kind, &results[0], &field, loc)
        }
        OpKind::Subscript => {
            expect_arity(kind, "operands", operands.len(), 2, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            if operands[1] != Type::Index && !operands[1].is_field() {
                return Err(mismatch(kind, "index", operands[1].to_string(), loc));
            }
            let Some(element) = operands[0].element() else {
                return Err(mismatch(kind, "array", operands[0].to_string(), loc));
            };
            expect_type(kind, &results[0], &element, loc)
        }
        OpKind::BindLayout { .. } => {
            expect_arity(kind, "operands", operands.len(), 0, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            if !results[0].is_layout() {
                return Err(mismatch(kind, "layout", results[0].to_string(), loc));
            }
            Ok(())
        }
        OpKind::Load { .. } => {
            expect_arity(kind, "operands", operands.len(), 2, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            expect_type(kind, &operands[0], &Type::Layout(LayoutType::Reg), loc)?;
            expect_type(kind, &operands[1], &Type::Index, loc)?;
            expect_type(kind, &results[0], &Type::Val, loc)
        }
        OpKind::Store => {
            expect_arity(kind, "operands", operands.len(), 2, loc)?;
            expect_arity(kind, "results", results.len(), 0, loc)?;
            expect_type(kind, &operands[0], &Type::Layout(LayoutType::Reg), loc)?;
            expect_type(kind, &operands[1], &Type::Val, loc)
        }
        OpKind::AliasLayout => {
            expect_arity(kind, "operands", operands.len(), 2, loc)?;
            expect_arity(kind, "results", results.len(), 0, loc)?;
            if !operands[0].is_layout() {
                return Err(mismatch(kind, "layout", operands[0].to_string(), loc));
            }
            expect_type(kind, &operands[1], &operands[0], loc)
        }
        OpKind::EqualZero => {
            expect_arity(kind, "operands", operands.len(), 1, loc)?;
            expect_arity(kind, "results", results.len(), 0, loc)?;
            expect_field(kind, &operands[0], loc)
        }
        OpKind::True => {
            expect_arity(kind, "operands", operands.len(), 0, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            expect_type(kind, &results[0], &Type::Constraint, loc)
        }
        OpKind::AndEqz => {
            expect_arity(kind, "operands", operands.len(), 2, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            expect_type(kind, &operands[0], &Type::Constraint, loc)?;
            expect_field(kind, &operands[1], loc)?;
            expect_type(kind, &results[0], &Type::Constraint, loc)
        }
        OpKind::AndCond => {
            expect_arity(kind, "operands", operands.len(), 3, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)?;
            expect_type(kind, &operands[0], &Type::Constraint, loc)?;
            expect_field(kind, &operands[1], loc)?;
            expect_type(kind, &operands[2], &Type::Constraint, loc)?;
            expect_type(kind, &results[0], &Type::Constraint, loc)
        }
        OpKind::If => {
            expect_arity(kind, "operands", operands.len(), 1, loc)?;
            expect_arity(kind, "results", results.len(), 0, loc)?;
            expect_field(kind, &operands[0], loc)
        }
        OpKind::Switch => {
            if operands.is_empty() {
                return Err(mismatch(kind, "at least one selector", "none", loc));
            }
            expect_arity(kind, "results", results.len(), 1, loc)?;
            for sel in operands {
                expect_field(kind, sel, loc)?;
            }
            Ok(())
        }
        OpKind::Yield => {
            expect_arity(kind, "operands", operands.len(), 1, loc)?;
            expect_arity(kind, "results", results.len(), 0, loc)
        }
        OpKind::Terminate => {
            expect_arity(kind, "operands", operands.len(), 0, loc)?;
            expect_arity(kind, "results", results.len(), 0, loc)
        }
        OpKind::Return => expect_arity(kind, "results", results.len(), 0, loc),
        OpKind::Construct { .. } => expect_arity(kind, "results", results.len(), 1, loc),
        OpKind::Back { .. } => {
            expect_arity(kind, "results", results.len(), 1, loc)?;
            match operands {
                [] => Ok(()),
                [layout] if layout.is_layout() => Ok(()),
                _ => Err(mismatch(kind, "(layout?)", list(operands), loc)),
            }
        }
        OpKind::ExecCall { .. } => {
            expect_arity(kind, "results", results.len(), 1, loc)?;
            match operands.first() {
                Some(Type::Ctx) => Ok(()),
                _ => Err(mismatch(kind, "(ctx, ...)", list(operands), loc)),
            }
        }
        OpKind::BackCall { .. } => {
            expect_arity(kind, "results", results.len(), 1, loc)?;
            match operands {
                [Type::Ctx, Type::Index] => Ok(()),
                [Type::Ctx, Type::Index, layout] if layout.is_layout() => Ok(()),
                _ => Err(mismatch(kind, "(ctx, index, layout?)", list(operands), loc)),
            }
        }
        OpKind::Extern { .. } => Ok(()),
        OpKind::Magic => {
            expect_arity(kind, "operands", operands.len(), 0, loc)?;
            expect_arity(kind, "results", results.len(), 1, loc)
        }
    }
}

fn expected_terminator(body: &Body, block: BlockId) -> Option<&'static str> {
    match body.block(block).parent {
        None => Some("return"),
        Some(owner) => match body.op(owner).kind {
            OpKind::If => Some("terminate"),
            OpKind::Switch => Some("yield"),
            _ => None,
        },
    }
}

/// Re-check every live op and every block's terminator.
pub fn verify_body(body: &Body) -> Result<()> {
    for op_id in body.walk() {
        let op = body.op(op_id);
        for &operand in &op.operands {
            if let Some(def) = body.defining_op(operand) {
                if body.op(def).erased {
                    return Err(mismatch(&op.kind, "live operand", "erased value", &op.loc));
                }
            }
        }
        let operand_types: Vec<Type> = op.operands.iter().map(|&v| body.value_type(v).clone()).collect();
        let result_types: Vec<Type> = op.results.iter().map(|&v| body.value_type(v).clone()).collect();
        check_op(&op.kind, &operand_types, &result_types, op.regions.len(), &op.loc)?;

        if op.kind == OpKind::Switch {
            for &region in &op.regions {
                if let Some(term) = body.terminator(region) {
                    let yielded = body.op(term);
                    if let Some(&v) = yielded.operands.first() {
                        expect_type(&yielded.kind, body.value_type(v), body.value_type(op.results[0]), &yielded.loc)?;
                    }
                }
            }
        }
    }

    for block in body.live_blocks() {
        let ops = &body.block(block).ops;
        let Some(want) = expected_terminator(body, block) else {
            continue;
        };
        let last = ops.last().map(|&o| body.op(o));
        match last {
            Some(op) if op.kind.name() == want => {}
            Some(op) => return Err(mismatch(&op.kind, format!("{} terminator", want), op.kind.name(), &op.loc)),
            None => {
                return Err(LowerError::TypeMismatch {
                    op: want,
                    expected: format!("{} terminator", want),
                    found: "empty block".to_string(),
                    loc: Location::dummy(),
                })
            }
        }
        for &o in &ops[..ops.len() - 1] {
            let op = body.op(o);
            if op.kind.is_terminator() {
                return Err(mismatch(&op.kind, "non-terminator", op.kind.name(), &op.loc));
            }
        }
    }
    Ok(())
}
