//! The check function.
//!
//! One function for the whole circuit: every entry point is constructed on
//! a layout bound to its buffer, then constructions are inlined down to
//! the leaves and lookbacks are replaced by the body of the callee's
//! lookback function. What remains is arithmetic, loads and constraints,
//! with switches eliminated along the way.

use std::collections::BTreeMap;

use crate::config::LowerConfig;
use crate::error::{LowerError, Result};
use crate::ir::{
    Body, Fragment, Func, FuncKind, InsertPoint, Module, OpId, OpKind, Operand, Registry, Type,
    ValueMap,
};
use crate::rewrite::{Driver, Rewrite, Rule};
use crate::span::Location;

use super::rules::{self, BackForms};
use super::switch::switch_rules;
use super::{resolve_callee, FormKind, FormState, FormTrail};

pub struct CheckCx<'a> {
    pub registry: &'a Registry<'a>,
    /// Lookback functions by component name.
    pub backs: &'a BTreeMap<String, Func>,
}

impl BackForms for CheckCx<'_> {
    fn has_back_form(&self, callee: &str) -> bool {
        self.backs.contains_key(callee)
    }
}

/// Replace a construction by the callee's body.
fn inline_check_construct(body: &Body, op: OpId, cx: &CheckCx<'_>) -> Result<Option<Rewrite>> {
    let OpKind::Construct { callee } = &body.op(op).kind else {
        return Ok(None);
    };
    let o = body.op(op);
    let arg_types: Vec<Type> = o.operands.iter().map(|&v| body.value_type(v).clone()).collect();
    let result = body.value_type(o.results[0]).clone();
    let component = resolve_callee(cx.registry, callee, &arg_types, &result, FormKind::Check, &o.loc)?;

    let src = &component.body;
    let mut map = ValueMap::new();
    for (&param, &arg) in src.args().iter().zip(&o.operands) {
        map.insert(param, Operand::Existing(arg));
    }
    let mut frag = Fragment::new();
    let returned = frag.clone_block_ops(src, src.entry(), None, &mut map, Some(&o.loc));
    Ok(Some(Rewrite::replace_with(frag, returned)))
}

/// Replace a lookback call by the lookback function's body at the call's
/// distance.
fn inline_back_call(body: &Body, op: OpId, cx: &CheckCx<'_>) -> Result<Option<Rewrite>> {
    let OpKind::BackCall { callee } = &body.op(op).kind else {
        return Ok(None);
    };
    let o = body.op(op);
    let Some(back) = cx.backs.get(callee) else {
        return Err(LowerError::UnresolvedSymbol {
            callee: callee.clone(),
            form: FormKind::Back,
            loc: o.loc.clone(),
        });
    };
    let src = &back.body;
    if src.args().len() != o.operands.len() {
        return Err(LowerError::TypeMismatch {
            op: "back_call",
            expected: format!("{} operands", src.args().len()),
            found: format!("{} operands", o.operands.len()),
            loc: o.loc.clone(),
        });
    }
    let mut map = ValueMap::new();
    for (&param, &arg) in src.args().iter().zip(&o.operands) {
        map.insert(param, Operand::Existing(arg));
    }
    let mut frag = Fragment::new();
    let returned = frag.clone_block_ops(src, src.entry(), None, &mut map, Some(&o.loc));
    Ok(Some(Rewrite::replace_with(frag, returned)))
}

fn check_rules<'a>() -> Vec<Rule<CheckCx<'a>>> {
    let mut set = vec![
        Rule::new("erase_store", 1, rules::erase_store::<CheckCx<'a>>),
        Rule::new("erase_unused_extern", 1, rules::erase_unused_extern::<CheckCx<'a>>),
        Rule::new("erase_alias_layout", 1, rules::erase_alias_layout::<CheckCx<'a>>),
        Rule::new("inline_check_construct", 0, inline_check_construct),
        Rule::new("back_to_call", 0, rules::back_to_call::<CheckCx<'a>>),
        Rule::new("inline_back_call", 0, inline_back_call),
    ];
    set.extend(switch_rules());
    set.push(Rule::new("yield_to_terminate", 0, rules::yield_to_terminate::<CheckCx<'a>>));
    set.push(Rule::new("erase_pure_if", 0, rules::erase_pure_if::<CheckCx<'a>>));
    set.extend(rules::canonicalization());
    set
}

/// Build the check function of `module`.
pub fn generate_check(
    module: &Module,
    cx: &CheckCx<'_>,
    config: &LowerConfig,
    trail: &mut FormTrail,
) -> Result<Func> {
    let _span = tracing::debug_span!("generate_check").entered();
    trail.advance(FormState::Cloning);

    let mut body = Body::new(vec![Type::Ctx]);
    let mut frag = Fragment::new();
    let mut loc = Location::dummy();
    for entry in &module.entry_points {
        if entry.test && !config.include_test_entries {
            tracing::debug!(component = %entry.component, "skipping test entry point");
            continue;
        }
        let component = cx.registry.get(&entry.component).ok_or_else(|| LowerError::UnresolvedSymbol {
            callee: entry.component.clone(),
            form: FormKind::Check,
            loc: Location::dummy(),
        })?;
        let site = component.loc();
        if loc.span.is_dummy() {
            loc = site.clone();
        }
        let mut operands: Vec<Operand> = component
            .params
            .iter()
            .map(|ty| {
                let magic = frag.push(None, OpKind::Magic, vec![], vec![ty.clone()], site.clone());
                frag.value(magic)
            })
            .collect();
        if let Some(layout) = component.layout_type() {
            let bound = frag.push(
                None,
                OpKind::BindLayout {
                    buffer: entry.buffer.clone(),
                },
                vec![],
                vec![layout],
                site.clone(),
            );
            operands.push(frag.value(bound));
        }
        frag.push(
            None,
            OpKind::Construct {
                callee: component.name.clone(),
            },
            operands,
            vec![component.result.clone()],
            site,
        );
    }
    frag.push(None, OpKind::Return, vec![], vec![], loc.clone());
    let entry = body.entry();
    frag.materialize(&mut body, InsertPoint::End(entry))?;

    trail.advance(FormState::LocalRewrite);
    let stats = Driver::new("generate_check", check_rules(), config.max_rewrite_iterations)
        .run(&mut body, cx, &loc)?;
    body.verify()?;
    tracing::debug!(
        iterations = stats.iterations,
        inlined = stats.count("inline_check_construct"),
        lookbacks = stats.count("inline_back_call"),
        "check function ready"
    );
    trail.advance(FormState::Done);

    Ok(Func {
        name: "check".to_string(),
        kind: FuncKind::Check,
        component: String::new(),
        result: None,
        body,
        loc,
    })
}
