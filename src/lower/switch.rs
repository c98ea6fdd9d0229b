//! Switch elimination.
//!
//! A switch with an unused result is split into one `if` per arm. A used
//! result is rebuilt without the switch first (per field for structs, as a
//! selector-weighted sum for scalars) and the now unused switch is split on
//! the next sweep, so the arm constraints survive exactly once.

use std::collections::HashSet;

use crate::analysis::{has_pending_rewrites, is_pure_value, unravel_blocker};
use crate::config::LowerConfig;
use crate::error::Result;
use crate::ir::{
    map_operand, BlockId, Body, Fragment, OpId, OpKind, Operand, Parent, Type, ValueId, ValueMap,
};
use crate::rewrite::{Driver, Rewrite, RewriteStats, Rule};
use crate::span::Location;

use super::rules;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchStrategy {
    /// Result unused: one `if` per arm.
    Split,
    /// Struct result: one switch per field, packed back together.
    UnravelStruct,
    /// Scalar result: `sum(value_i * selector_i)` over the arms.
    UnravelScalar,
    /// Arms hold non-idempotent ops, but the ops each yield depends on do
    /// not; the weighted sum is built from those alone.
    SliceFallback,
    /// Nothing applies; the switch stays.
    Opaque,
    /// Arms still hold constructions, calls or nested switches.
    Deferred,
}

/// Pick how the switch `op` gets eliminated. `None` for other ops.
pub fn select_strategy(body: &Body, op: OpId) -> Option<SwitchStrategy> {
    let o = body.op(op);
    if o.kind != OpKind::Switch {
        return None;
    }
    if body.results_unused(op) {
        return Some(SwitchStrategy::Split);
    }
    if o.regions.iter().any(|&r| has_pending_rewrites(body, r)) {
        return Some(SwitchStrategy::Deferred);
    }
    let result = body.value_type(o.results[0]);
    let selectors: Vec<&Type> = o.operands.iter().map(|&s| body.value_type(s)).collect();

    match unravel_blocker(body, op) {
        None => match result {
            Type::Struct(_) => return Some(SwitchStrategy::UnravelStruct),
            Type::Val | Type::Ext if selectors.iter().all(|&s| s == result) => {
                return Some(SwitchStrategy::UnravelScalar)
            }
            _ => {}
        },
        Some(blocked) => {
            tracing::debug!(error = %blocked, "switch not unraveled, trying yield slices");
        }
    }

    let slices_pure = o.regions.iter().all(|&region| {
        yield_slice(body, region)
            .iter()
            .all(|&s| is_pure_value(&body.op(s).kind) && body.op(s).regions.is_empty())
    });
    if slices_pure && selectable(result, &selectors) {
        Some(SwitchStrategy::SliceFallback)
    } else {
        Some(SwitchStrategy::Opaque)
    }
}

fn selectable(ty: &Type, selectors: &[&Type]) -> bool {
    match ty {
        Type::Val | Type::Ext => selectors.iter().all(|&s| s == ty),
        Type::Struct(st) => st.fields.iter().all(|f| selectable(&f.ty, selectors)),
        Type::Array { element, .. } => selectable(element, selectors),
        _ => false,
    }
}

/// Top-level ops of an arm that its yielded value depends on, in order.
fn yield_slice(body: &Body, region: BlockId) -> Vec<OpId> {
    let Some(term) = body.terminator(region) else {
        return Vec::new();
    };
    let mut needed: HashSet<ValueId> = body.op(term).operands.iter().copied().collect();
    let mut slice = Vec::new();
    for &op in body.block(region).ops.iter().rev() {
        let o = body.op(op);
        if o.kind.is_terminator() || !o.results.iter().any(|v| needed.contains(v)) {
            continue;
        }
        needed.extend(o.operands.iter().copied());
        slice.push(op);
    }
    slice.reverse();
    slice
}

fn yielded(body: &Body, region: BlockId) -> Option<ValueId> {
    body.terminator(region)
        .and_then(|t| body.op(t).operands.first().copied())
}

/// Clone `ops` of an arm. Constraints and conditionals stay behind on the
/// original switch. Loads hoisted out of their arm run for every row, so
/// `unchecked_loads` marks them.
fn clone_arm_values(
    frag: &mut Fragment,
    body: &Body,
    ops: &[OpId],
    parent: Parent,
    map: &mut ValueMap,
    unchecked_loads: bool,
) {
    for &op in ops {
        let kind = &body.op(op).kind;
        if kind.is_terminator() || matches!(kind, OpKind::EqualZero | OpKind::If) {
            continue;
        }
        let index = frag.clone_op(body, op, parent, map, None);
        if unchecked_loads && matches!(kind, OpKind::Load { .. }) {
            frag.set_kind(index, OpKind::Load { unchecked: true });
        }
    }
}

/// `sum(value_i * selector_i)`, recursing through structs and arrays.
/// `None` when there are no arms.
fn weighted_sum(
    frag: &mut Fragment,
    ty: &Type,
    arms: &[(Operand, Operand)],
    loc: &Location,
) -> Option<Operand> {
    let parts = |frag: &mut Fragment, kind: OpKind, extra: Option<Operand>, part_ty: &Type| {
        arms.iter()
            .map(|&(value, sel)| {
                let mut operands = vec![value];
                operands.extend(extra);
                let part = frag.push(None, kind.clone(), operands, vec![part_ty.clone()], loc.clone());
                (frag.value(part), sel)
            })
            .collect::<Vec<_>>()
    };
    match ty {
        Type::Struct(st) => {
            let mut fields = Vec::with_capacity(st.fields.len());
            for field in &st.fields {
                let lookup = OpKind::Lookup {
                    member: field.name.clone(),
                };
                let split = parts(frag, lookup, None, &field.ty);
                fields.push(weighted_sum(frag, &field.ty, &split, loc)?);
            }
            let pack = frag.push(None, OpKind::Pack, fields, vec![ty.clone()], loc.clone());
            Some(frag.value(pack))
        }
        Type::Array { element, len } => {
            let mut elements = Vec::with_capacity(*len as usize);
            for i in 0..*len {
                let index = frag.push(
                    None,
                    OpKind::IndexConst { value: i as u64 },
                    vec![],
                    vec![Type::Index],
                    loc.clone(),
                );
                let index = frag.value(index);
                let split = parts(frag, OpKind::Subscript, Some(index), &**element);
                elements.push(weighted_sum(frag, &**element, &split, loc)?);
            }
            let pack = frag.push(None, OpKind::Pack, elements, vec![ty.clone()], loc.clone());
            Some(frag.value(pack))
        }
        _ => {
            let mut acc: Option<Operand> = None;
            for &(value, sel) in arms {
                let term = frag.push(None, OpKind::Mul, vec![value, sel], vec![ty.clone()], loc.clone());
                let term = frag.value(term);
                acc = Some(match acc {
                    None => term,
                    Some(prev) => {
                        let sum = frag.push(None, OpKind::Add, vec![prev, term], vec![ty.clone()], loc.clone());
                        frag.value(sum)
                    }
                });
            }
            acc
        }
    }
}

// ─── Rules ─────────────────────────────────────────────────────────

pub fn split_switch_arms<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    if select_strategy(body, op) != Some(SwitchStrategy::Split) {
        return Ok(None);
    }
    let o = body.op(op);
    let mut frag = Fragment::new();
    for (&sel, &region) in o.operands.iter().zip(&o.regions) {
        frag.push_adopting(
            None,
            OpKind::If,
            vec![Operand::Existing(sel)],
            vec![],
            vec![region],
            o.loc.clone(),
        );
    }
    Ok(Some(Rewrite {
        fragment: frag,
        replace: None,
        erase: true,
    }))
}

pub fn unravel_switch_pack<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    if select_strategy(body, op) != Some(SwitchStrategy::UnravelStruct) {
        return Ok(None);
    }
    let o = body.op(op);
    let Type::Struct(st) = body.value_type(o.results[0]) else {
        return Ok(None);
    };
    let selectors: Vec<Operand> = o.operands.iter().map(|&s| Operand::Existing(s)).collect();

    let mut frag = Fragment::new();
    let mut fields = Vec::with_capacity(st.fields.len());
    for field in &st.fields {
        let switch = frag.push_with_regions(
            None,
            OpKind::Switch,
            selectors.clone(),
            vec![field.ty.clone()],
            o.regions.len(),
            o.loc.clone(),
        );
        for (arm, &region) in o.regions.iter().enumerate() {
            let Some(value) = yielded(body, region) else {
                return Ok(None);
            };
            let parent = Some((switch, arm));
            let mut map = ValueMap::new();
            clone_arm_values(&mut frag, body, &body.block(region).ops, parent, &mut map, false);
            let whole = map_operand(&map, value);
            let part = frag.push(
                parent,
                OpKind::Lookup {
                    member: field.name.clone(),
                },
                vec![whole],
                vec![field.ty.clone()],
                o.loc.clone(),
            );
            let part = frag.value(part);
            frag.push(parent, OpKind::Yield, vec![part], vec![], o.loc.clone());
        }
        fields.push(frag.value(switch));
    }
    let pack = frag.push(
        None,
        OpKind::Pack,
        fields,
        vec![Type::Struct(st.clone())],
        o.loc.clone(),
    );
    let value = frag.value(pack);
    Ok(Some(Rewrite::redirect_uses(frag, vec![value])))
}

pub fn unravel_switch_val<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    if select_strategy(body, op) != Some(SwitchStrategy::UnravelScalar) {
        return Ok(None);
    }
    rebuild_from_arms(body, op, |region| body.block(region).ops.clone())
}

pub fn slice_fallback<C>(body: &Body, op: OpId, _: &C) -> Result<Option<Rewrite>> {
    if select_strategy(body, op) != Some(SwitchStrategy::SliceFallback) {
        return Ok(None);
    }
    rebuild_from_arms(body, op, |region| yield_slice(body, region))
}

fn rebuild_from_arms(
    body: &Body,
    op: OpId,
    ops_of: impl Fn(BlockId) -> Vec<OpId>,
) -> Result<Option<Rewrite>> {
    let o = body.op(op);
    let mut frag = Fragment::new();
    let mut arms = Vec::with_capacity(o.regions.len());
    for (&sel, &region) in o.operands.iter().zip(&o.regions) {
        let Some(value) = yielded(body, region) else {
            return Ok(None);
        };
        let mut map = ValueMap::new();
        clone_arm_values(&mut frag, body, &ops_of(region), None, &mut map, true);
        arms.push((map_operand(&map, value), Operand::Existing(sel)));
    }
    let ty = body.value_type(o.results[0]).clone();
    let Some(sum) = weighted_sum(&mut frag, &ty, &arms, &o.loc) else {
        return Ok(None);
    };
    Ok(Some(Rewrite::redirect_uses(frag, vec![sum])))
}

/// The elimination rules, for any generator context.
pub fn switch_rules<C>() -> Vec<Rule<C>> {
    vec![
        Rule::new("split_switch_arms", 1, split_switch_arms::<C>),
        Rule::new("unravel_switch_pack", 0, unravel_switch_pack::<C>),
        Rule::new("unravel_switch_val", 0, unravel_switch_val::<C>),
        Rule::new("slice_fallback", 0, slice_fallback::<C>),
    ]
}

/// Eliminate every switch of `body` that can be, with nothing else
/// inlined or erased beyond what elimination itself leaves dead.
pub fn eliminate_switches(body: &mut Body, config: &LowerConfig) -> Result<RewriteStats> {
    let mut set = switch_rules::<()>();
    set.push(Rule::new("yield_to_terminate", 0, rules::yield_to_terminate::<()>));
    set.push(Rule::new("erase_pure_if", 0, rules::erase_pure_if::<()>));
    set.extend(rules::canonicalization());
    let stats = Driver::new("eliminate_switches", set, config.max_rewrite_iterations)
        .run(body, &(), &Location::dummy())?;
    body.verify()?;
    Ok(stats)
}
