//! Lookback functions.
//!
//! `<Name>.back(ctx, distance, layout?)` recomputes what the component
//! produced `distance` steps ago. It writes and asserts nothing: stores and
//! constraints are dropped, parameters become `magic` placeholders, and
//! every load reads at the requested distance.

use std::collections::HashSet;

use crate::analysis::{needs_back, BackNeeds};
use crate::config::LowerConfig;
use crate::error::{LowerError, Result};
use crate::ir::{
    Body, Component, Fragment, Func, FuncKind, InsertPoint, OpId, OpKind, Operand, Registry, Type,
    ValueId, ValueMap,
};
use crate::rewrite::{Driver, Rewrite, Rule};

use super::rules::{self, BackForms};
use super::{resolve_callee, FormKind, FormState, FormTrail};

pub struct BackCx<'a> {
    pub registry: &'a Registry<'a>,
    pub needs: &'a BackNeeds,
}

impl BackForms for BackCx<'_> {
    fn has_back_form(&self, callee: &str) -> bool {
        self.needs.contains(callee) && self.registry.get(callee).is_some()
    }
}

fn distance_arg(body: &Body) -> ValueId {
    body.args()[1]
}

/// Unused sub-constructions vanish; used ones call the callee's lookback
/// function at the same distance, or are inlined when the callee has no
/// registers to look back into.
fn construct_to_back(body: &Body, op: OpId, cx: &BackCx<'_>) -> Result<Option<Rewrite>> {
    let OpKind::Construct { callee } = &body.op(op).kind else {
        return Ok(None);
    };
    if body.results_unused(op) {
        return Ok(Some(Rewrite::erase()));
    }
    let o = body.op(op);
    let arg_types: Vec<Type> = o.operands.iter().map(|&v| body.value_type(v).clone()).collect();
    let result = body.value_type(o.results[0]).clone();
    let component = resolve_callee(cx.registry, callee, &arg_types, &result, FormKind::Back, &o.loc)?;

    let mut frag = Fragment::new();
    if cx.has_back_form(callee) {
        let Some(ctx) = body.exec_context() else {
            return Ok(None);
        };
        let mut operands = vec![Operand::Existing(ctx), Operand::Existing(distance_arg(body))];
        if component.layout.is_some() {
            operands.extend(o.operands.last().map(|&v| Operand::Existing(v)));
        }
        let call = frag.push(
            None,
            OpKind::BackCall {
                callee: callee.clone(),
            },
            operands,
            vec![result],
            o.loc.clone(),
        );
        let value = frag.value(call);
        return Ok(Some(Rewrite::replace_with(frag, vec![value])));
    }

    if !needs_back(component) {
        let mut map = ValueMap::new();
        for (&param, &arg) in component.body.args().iter().zip(&o.operands) {
            map.insert(param, Operand::Existing(arg));
        }
        let returned = frag.clone_block_ops(
            &component.body,
            component.body.entry(),
            None,
            &mut map,
            Some(&o.loc),
        );
        return Ok(Some(Rewrite::replace_with(frag, returned)));
    }

    Err(LowerError::UnresolvedSymbol {
        callee: callee.clone(),
        form: FormKind::Back,
        loc: o.loc.clone(),
    })
}

/// A lookback inside a lookback function reaches further back by its own
/// distance.
fn back_back_to_call(body: &Body, op: OpId, cx: &BackCx<'_>) -> Result<Option<Rewrite>> {
    let OpKind::Back { callee, distance } = &body.op(op).kind else {
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
    let Some(ctx) = body.exec_context() else {
        return Ok(None);
    };
    let mut frag = Fragment::new();
    let local = frag.push(
        None,
        OpKind::IndexConst { value: *distance },
        vec![],
        vec![Type::Index],
        o.loc.clone(),
    );
    let local = frag.value(local);
    let total = frag.push(
        None,
        OpKind::AddIndex,
        vec![Operand::Existing(distance_arg(body)), local],
        vec![Type::Index],
        o.loc.clone(),
    );
    let mut operands = vec![Operand::Existing(ctx), frag.value(total)];
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

/// Every load reads `distance` further back than it did in the
/// component body. Loads already in `shifted` are left alone; returns how
/// many were shifted now.
fn add_load_distance(body: &mut Body, shifted: &mut HashSet<OpId>) -> Result<usize> {
    let distance = distance_arg(body);
    let loads: Vec<OpId> = body
        .walk()
        .into_iter()
        .filter(|&op| matches!(body.op(op).kind, OpKind::Load { .. }))
        .filter(|op| !shifted.contains(op))
        .collect();
    for &load in &loads {
        let local = body.op(load).operands[1];
        let loc = body.op(load).loc.clone();
        let total = body.build(
            OpKind::AddIndex,
            vec![local, distance],
            vec![Type::Index],
            vec![],
            loc,
            InsertPoint::Before(load),
        )?;
        let total = body.result(total);
        body.set_operand(load, 1, total);
        shifted.insert(load);
    }
    Ok(loads.len())
}

fn back_rules<'a>() -> Vec<Rule<BackCx<'a>>> {
    let mut rules = vec![
        Rule::new("erase_store", 1, rules::erase_store::<BackCx<'a>>),
        Rule::new("erase_equal_zero", 1, rules::erase_equal_zero::<BackCx<'a>>),
        Rule::new("erase_alias_layout", 1, rules::erase_alias_layout::<BackCx<'a>>),
        Rule::new("erase_unused_extern", 1, rules::erase_unused_extern::<BackCx<'a>>),
        Rule::new("construct_to_back", 0, construct_to_back),
        Rule::new("back_back_to_call", 0, back_back_to_call),
    ];
    rules.extend(rules::canonicalization());
    rules
}

/// Build the lookback function of `component`.
pub fn generate_back(
    component: &Component,
    cx: &BackCx<'_>,
    config: &LowerConfig,
    trail: &mut FormTrail,
) -> Result<Func> {
    let _span = tracing::debug_span!("generate_back", component = %component.name).entered();
    trail.advance(FormState::Cloning);

    let mut arg_types = vec![Type::Ctx, Type::Index];
    arg_types.extend(component.layout_type());
    let mut body = Body::new(arg_types);

    let src = &component.body;
    let mut frag = Fragment::new();
    let mut map = ValueMap::new();
    let n = component.params.len();
    for (i, ty) in component.params.iter().enumerate() {
        let magic = frag.push(None, OpKind::Magic, vec![], vec![ty.clone()], component.loc());
        map.insert(src.args()[i], frag.value(magic));
    }
    if component.layout.is_some() {
        map.insert(src.args()[n], Operand::Existing(body.args()[2]));
    }
    let returned = frag.clone_block_ops(src, src.entry(), None, &mut map, None);
    let ret_loc = src
        .terminator(src.entry())
        .map_or_else(|| component.loc(), |t| src.op(t).loc.clone());
    frag.push(None, OpKind::Return, returned, vec![], ret_loc);
    let entry = body.entry();
    frag.materialize(&mut body, InsertPoint::End(entry))?;
    let mut shifted = HashSet::new();
    add_load_distance(&mut body, &mut shifted)?;

    trail.advance(FormState::LocalRewrite);
    let driver = Driver::new("generate_back", back_rules(), config.max_rewrite_iterations);
    // Inlining register-less callees can bring in loads of registers
    // passed as parameters; shift those too and go again.
    let stats = loop {
        let stats = driver.run(&mut body, cx, &component.loc())?;
        if add_load_distance(&mut body, &mut shifted)? == 0 {
            break stats;
        }
    };
    body.verify()?;
    tracing::debug!(
        component = %component.name,
        iterations = stats.iterations,
        applied = stats.total(),
        "lookback function ready"
    );
    trail.advance(FormState::Done);

    Ok(Func {
        name: Func::back_name(&component.name),
        kind: FuncKind::Back,
        component: component.name.clone(),
        result: Some(component.result.clone()),
        body,
        loc: component.loc(),
    })
}

#[cfg(test)]
mod tests;
