//! Rewrite rules shared by several generators.

use crate::analysis::is_pure_value;
use crate::error::{LowerError, Result};
use crate::ir::{Body, Fragment, OpId, OpKind, Operand, Type};
use crate::rewrite::{Rewrite, Rule};

use super::FormKind;

/// Whatever a generator knows about which lookback functions exist.
pub trait BackForms {
    fn has_back_form(&self, callee: &str) -> bool;
}

fn const_operand(body: &Body, op: OpId, index: usize) -> Option<&OpKind> {
    let v = *body.op(op).operands.get(index)?;
    body.defining_op(v).map(|def| &body.op(def).kind)
}

pub fn erase_store<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    Ok((body.op(op).kind == OpKind::Store).then(Rewrite::erase))
}

pub fn erase_equal_zero<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    Ok((body.op(op).kind == OpKind::EqualZero).then(Rewrite::erase))
}

pub fn erase_alias_layout<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    Ok((body.op(op).kind == OpKind::AliasLayout).then(Rewrite::erase))
}

/// Externs whose results nobody reads. Result-less externs (logging and
/// the like) count as unused.
pub fn erase_unused_extern<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    let unused = matches!(body.op(op).kind, OpKind::Extern { .. }) && body.results_unused(op);
    Ok(unused.then(Rewrite::erase))
}

pub fn erase_dead_pure<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    let o = body.op(op);
    let dead = is_pure_value(&o.kind) && o.regions.is_empty() && body.results_unused(op);
    Ok(dead.then(Rewrite::erase))
}

/// `equal_zero 0` holds trivially.
pub fn fold_zero_equal_zero<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    if body.op(op).kind != OpKind::EqualZero {
        return Ok(None);
    }
    let zero = matches!(const_operand(body, op, 0), Some(OpKind::Const { value: 0 }));
    Ok(zero.then(Rewrite::erase))
}

pub fn fold_add_index<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    if body.op(op).kind != OpKind::AddIndex {
        return Ok(None);
    }
    let operands = &body.op(op).operands;
    let lit = |i: usize| match const_operand(body, op, i) {
        Some(OpKind::IndexConst { value }) => Some(*value),
        _ => None,
    };
    let replacement = match (lit(0), lit(1)) {
        (Some(a), Some(b)) => {
            let mut frag = Fragment::new();
            let c = frag.push(
                None,
                OpKind::IndexConst { value: a + b },
                vec![],
                vec![Type::Index],
                body.op(op).loc.clone(),
            );
            let value = frag.value(c);
            Rewrite::replace_with(frag, vec![value])
        }
        (Some(0), None) => Rewrite::replace_with(Fragment::new(), vec![Operand::Existing(operands[1])]),
        (None, Some(0)) => Rewrite::replace_with(Fragment::new(), vec![Operand::Existing(operands[0])]),
        _ => return Ok(None),
    };
    Ok(Some(replacement))
}

/// `lookup .f (pack ...)` is the packed field.
pub fn fold_lookup_pack<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    let OpKind::Lookup { member } = &body.op(op).kind else {
        return Ok(None);
    };
    let aggregate = body.op(op).operands[0];
    let Some(def) = body.defining_op(aggregate) else {
        return Ok(None);
    };
    if body.op(def).kind != OpKind::Pack {
        return Ok(None);
    }
    let Type::Struct(st) = body.value_type(aggregate) else {
        return Ok(None);
    };
    let Some(pos) = st.fields.iter().position(|f| &f.name == member) else {
        return Ok(None);
    };
    let field = body.op(def).operands[pos];
    Ok(Some(Rewrite::replace_with(
        Fragment::new(),
        vec![Operand::Existing(field)],
    )))
}

/// `subscript (pack ...) k` with a literal `k` is the packed element.
pub fn fold_subscript_pack<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    if body.op(op).kind != OpKind::Subscript {
        return Ok(None);
    }
    let index = match const_operand(body, op, 1) {
        Some(OpKind::Const { value } | OpKind::IndexConst { value }) => *value,
        _ => return Ok(None),
    };
    let Some(def) = body.defining_op(body.op(op).operands[0]) else {
        return Ok(None);
    };
    if body.op(def).kind != OpKind::Pack {
        return Ok(None);
    }
    let Some(&element) = usize::try_from(index)
        .ok()
        .and_then(|i| body.op(def).operands.get(i))
    else {
        return Ok(None);
    };
    Ok(Some(Rewrite::replace_with(
        Fragment::new(),
        vec![Operand::Existing(element)],
    )))
}

/// Arms that became `if` regions end in `terminate`, not `yield`.
pub fn yield_to_terminate<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    if body.op(op).kind != OpKind::Yield {
        return Ok(None);
    }
    let Some(parent) = body.parent_op(op) else {
        return Ok(None);
    };
    if body.op(parent).kind != OpKind::If {
        return Ok(None);
    }
    let mut frag = Fragment::new();
    frag.push(None, OpKind::Terminate, vec![], vec![], body.op(op).loc.clone());
    Ok(Some(Rewrite {
        fragment: frag,
        replace: None,
        erase: true,
    }))
}

/// An `if` guarding nothing but pure values constrains nothing.
pub fn erase_pure_if<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    if body.op(op).kind != OpKind::If {
        return Ok(None);
    }
    let region = body.op(op).regions[0];
    let pure = body.walk_block(region).iter().all(|&o| {
        let kind = &body.op(o).kind;
        is_pure_value(kind) || *kind == OpKind::Terminate
    });
    Ok(pure.then(Rewrite::erase))
}

/// `back @C d (layout?)` → `back_call @C (ctx, d, layout?)`.
pub fn back_to_call<C: BackForms>(body: &Body, op: OpId, cx: &C) -> Result<Option<Rewrite>> {
    let OpKind::Back { callee, distance } = &body.op(op).kind else {
        return Ok(None);
    };
    let Some(ctx) = body.exec_context() else {
        return Ok(None);
    };
    let o = body.op(op);
    if !cx.has_back_form(callee) {
        return Err(LowerError::UnresolvedSymbol {
            callee: callee.clone(),
            form: FormKind::Back,
            loc: o.loc.clone(),
        });
    }
    let mut frag = Fragment::new();
    let d = frag.push(
        None,
        OpKind::IndexConst { value: *distance },
        vec![],
        vec![Type::Index],
        o.loc.clone(),
    );
    let mut operands = vec![Operand::Existing(ctx), frag.value(d)];
    operands.extend(o.operands.iter().map(|&v| Operand::Existing(v)));
    let call = frag.push(
        None,
        OpKind::BackCall {
            callee: callee.clone(),
        },
        operands,
        vec![body.value_type(o.results[0]).clone()],
        o.loc.clone(),
    );
    let value = frag.value(call);
    Ok(Some(Rewrite::replace_with(frag, vec![value])))
}

/// Folding and dead-code rules every generator runs.
pub fn canonicalization<C>() -> Vec<Rule<C>> {
    vec![
        Rule::new("erase_dead_pure", 0, erase_dead_pure::<C>),
        Rule::new("fold_zero_equal_zero", 0, fold_zero_equal_zero::<C>),
        Rule::new("fold_add_index", 0, fold_add_index::<C>),
        Rule::new("fold_lookup_pack", 0, fold_lookup_pack::<C>),
        Rule::new("fold_subscript_pack", 0, fold_subscript_pack::<C>),
    ]
}
