//! Execute functions: `<Name>.exec(ctx, params..., layout?)` computes the
//! witness forward. Sub-constructions call the callee's execute function
//! and lookbacks call its lookback function.

use crate::analysis::BackNeeds;
use crate::config::{ConstraintMode, LowerConfig};
use crate::error::Result;
use crate::ir::{
    Body, Component, Fragment, Func, FuncKind, InsertPoint, OpId, OpKind, Operand, Registry, Type,
    ValueMap,
};
use crate::rewrite::{Driver, Rewrite, Rule};

use super::rules::{self, BackForms};
use super::{resolve_callee, FormKind, FormState, FormTrail};

pub struct ExecCx<'a> {
    pub registry: &'a Registry<'a>,
    pub needs: &'a BackNeeds,
}

impl BackForms for ExecCx<'_> {
    fn has_back_form(&self, callee: &str) -> bool {
        self.needs.contains(callee) && self.registry.get(callee).is_some()
    }
}

fn construct_to_call(body: &Body, op: OpId, cx: &ExecCx<'_>) -> Result<Option<Rewrite>> {
    let OpKind::Construct { callee } = &body.op(op).kind else {
        return Ok(None);
    };
    let Some(ctx) = body.exec_context() else {
        return Ok(None);
    };
    let o = body.op(op);
    let arg_types: Vec<Type> = o.operands.iter().map(|&v| body.value_type(v).clone()).collect();
    let result = body.value_type(o.results[0]).clone();
    resolve_callee(cx.registry, callee, &arg_types, &result, FormKind::Exec, &o.loc)?;

    let mut operands = vec![Operand::Existing(ctx)];
    operands.extend(o.operands.iter().map(|&v| Operand::Existing(v)));
    let mut frag = Fragment::new();
    let call = frag.push(
        None,
        OpKind::ExecCall {
            callee: callee.clone(),
        },
        operands,
        vec![result],
        o.loc.clone(),
    );
    let value = frag.value(call);
    Ok(Some(Rewrite::replace_with(frag, vec![value])))
}

fn exec_rules<'a>(config: &LowerConfig) -> Vec<Rule<ExecCx<'a>>> {
    let mut rules = vec![
        Rule::new("construct_to_call", 0, construct_to_call),
        Rule::new("back_to_call", 0, rules::back_to_call::<ExecCx<'a>>),
    ];
    if config.constraints == ConstraintMode::Relaxed {
        rules.push(Rule::new("erase_equal_zero", 1, rules::erase_equal_zero::<ExecCx<'a>>));
    }
    rules.extend(rules::canonicalization());
    rules
}

/// Build the execute function of `component`.
pub fn generate_exec(
    component: &Component,
    cx: &ExecCx<'_>,
    config: &LowerConfig,
    trail: &mut FormTrail,
) -> Result<Func> {
    let _span = tracing::debug_span!("generate_exec", component = %component.name).entered();
    trail.advance(FormState::Cloning);

    let mut arg_types = vec![Type::Ctx];
    arg_types.extend(component.construct_signature());
    let mut body = Body::new(arg_types);

    let src = &component.body;
    let mut map = ValueMap::new();
    for (i, &arg) in src.args().iter().enumerate() {
        map.insert(arg, Operand::Existing(body.args()[i + 1]));
    }
    let mut frag = Fragment::new();
    for &op in &src.block(src.entry()).ops {
        frag.clone_op(src, op, None, &mut map, None);
    }
    let entry = body.entry();
    frag.materialize(&mut body, InsertPoint::End(entry))?;

    trail.advance(FormState::LocalRewrite);
    let stats = Driver::new("generate_exec", exec_rules(config), config.max_rewrite_iterations)
        .run(&mut body, cx, &component.loc())?;
    body.verify()?;
    tracing::debug!(
        component = %component.name,
        iterations = stats.iterations,
        applied = stats.total(),
        "execute function ready"
    );
    trail.advance(FormState::Done);

    Ok(Func {
        name: Func::exec_name(&component.name),
        kind: FuncKind::Exec,
        component: component.name.clone(),
        result: Some(component.result.clone()),
        body,
        loc: component.loc(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LowerError;
    use crate::lower::fixtures::{self, Circuit};
    use crate::span::Span;

    fn exec_of(circuit: &Circuit, name: &str, config: &LowerConfig) -> Result<Func> {
        let registry = circuit.registry();
        let needs = circuit.needs();
        let cx = ExecCx {
            registry: &registry,
            needs: &needs,
        };
        let mut trail = FormTrail::new(name, FormKind::Exec);
        generate_exec(registry.get(name).unwrap(), &cx, config, &mut trail)
    }

    fn kinds(body: &Body) -> Vec<&'static str> {
        body.walk().iter().map(|&o| body.op(o).kind.name()).collect()
    }

    #[test]
    fn test_calls_replace_constructions() {
        let circuit = Circuit::new(vec![fixtures::reg(), fixtures::double(), fixtures::top()]);
        let func = exec_of(&circuit, "Top", &LowerConfig::default()).unwrap();
        let body = &func.body;

        assert_eq!(func.name, "Top.exec");
        assert_eq!(body.value_type(body.args()[0]), &Type::Ctx);
        let calls: Vec<String> = body
            .walk()
            .iter()
            .filter_map(|&o| match &body.op(o).kind {
                OpKind::ExecCall { callee } => Some(format!("exec {}", callee)),
                OpKind::BackCall { callee } => Some(format!("back {}", callee)),
                _ => None,
            })
            .collect();
        assert_eq!(calls, vec!["exec Reg", "exec Double", "exec Reg", "back Reg"]);
        assert!(kinds(body).contains(&"equal_zero"));
    }

    #[test]
    fn test_relaxed_mode_drops_constraints() {
        let circuit = Circuit::new(vec![fixtures::reg(), fixtures::double(), fixtures::top()]);
        let config = LowerConfig {
            constraints: ConstraintMode::Relaxed,
            ..LowerConfig::default()
        };
        let func = exec_of(&circuit, "Top", &config).unwrap();
        assert!(!kinds(&func.body).contains(&"equal_zero"));
        assert!(!kinds(&func.body).contains(&"sub"));
    }

    #[test]
    fn test_stores_survive() {
        let circuit = Circuit::new(vec![fixtures::reg()]);
        let func = exec_of(&circuit, "Reg", &LowerConfig::default()).unwrap();
        assert_eq!(kinds(&func.body), vec!["store", "index_const", "load", "return"]);
    }

    #[test]
    fn test_unknown_callee_reports_call_site() {
        let lonely = Component::build("Lonely", vec![], None, Type::Val, |b| {
            b.at(Span::new(0, 3, 9));
            b.construct("Missing", vec![], Type::Val)
        })
        .unwrap();
        let circuit = Circuit::new(vec![lonely]);
        let err = exec_of(&circuit, "Lonely", &LowerConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            LowerError::UnresolvedSymbol { ref callee, form: FormKind::Exec, ref loc }
                if callee == "Missing" && loc.span == Span::new(0, 3, 9)
        ));
    }

    #[test]
    fn test_lookback_without_back_form() {
        // Looking back at a register-less component with parameters has no
        // lookback function to call.
        let user = Component::build("User", vec![], None, Type::Val, |b| {
            b.back("Double", 1, None, Type::Val)
        })
        .unwrap();
        let circuit = Circuit::new(vec![fixtures::double(), user]);
        let err = exec_of(&circuit, "User", &LowerConfig::default()).unwrap_err();
        assert!(matches!(err, LowerError::UnresolvedSymbol { form: FormKind::Back, .. }));
    }
}
