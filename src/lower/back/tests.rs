use super::*;
use crate::ir::LayoutType;
use crate::lower::fixtures::{self, Circuit};
use crate::lower::FormKind;
use crate::span::Span;

fn back_of(circuit: &Circuit, name: &str) -> Result<Func> {
    let registry = circuit.registry();
    let needs = circuit.needs();
    let cx = BackCx {
        registry: &registry,
        needs: &needs,
    };
    let component = registry.get(name).unwrap();
    let mut trail = FormTrail::new(name, FormKind::Back);
    generate_back(component, &cx, &LowerConfig::default(), &mut trail)
}

fn kinds(body: &Body) -> Vec<&'static str> {
    body.walk().iter().map(|&o| body.op(o).kind.name()).collect()
}

#[test]
fn test_register_reads_at_distance() {
    let circuit = Circuit::new(vec![fixtures::reg(), fixtures::double(), fixtures::top()]);
    let func = back_of(&circuit, "Reg").unwrap();
    let body = &func.body;

    assert_eq!(func.name, "Reg.back");
    let arg_types: Vec<String> = body.args().iter().map(|&v| body.value_type(v).to_string()).collect();
    assert_eq!(arg_types, vec!["ctx", "index", "layout<reg>"]);
    assert_eq!(kinds(body), vec!["load", "return"]);

    let load = body.walk()[0];
    assert_eq!(body.op(load).operands, vec![body.args()[2], body.args()[1]]);
}

#[test]
fn test_params_become_magic() {
    let counter = Component::build("Counter", vec![Type::Val], Some(LayoutType::Reg), Type::Val, |b| {
        let (step, l) = (b.arg(0), b.arg(1));
        let prev = b.load(l, 1);
        let next = b.add(prev, step);
        b.store(l, next);
        b.eq(next, prev);
        next
    })
    .unwrap();
    let user = Component::build("User", vec![], Some(LayoutType::Reg), Type::Val, |b| {
        let l = b.arg(0);
        b.back("Counter", 1, Some(l), Type::Val)
    })
    .unwrap();
    let circuit = Circuit::new(vec![counter, user]);
    let func = back_of(&circuit, "Counter").unwrap();

    assert_eq!(kinds(&func.body), vec!["magic", "index_const", "add_index", "load", "add", "return"]);
}

#[test]
fn test_nested_back_adds_distance() {
    let acc = Component::build("Acc", vec![], Some(LayoutType::Reg), Type::Val, |b| {
        let l = b.arg(0);
        b.back("Acc", 3, Some(l), Type::Val)
    })
    .unwrap();
    let circuit = Circuit::new(vec![acc]);
    let func = back_of(&circuit, "Acc").unwrap();
    let body = &func.body;

    assert_eq!(kinds(body), vec!["index_const", "add_index", "back_call", "return"]);
    let call = body.walk()[2];
    assert_eq!(
        body.op(call).kind,
        OpKind::BackCall {
            callee: "Acc".to_string()
        }
    );
    let sum = body.defining_op(body.op(call).operands[1]).unwrap();
    assert_eq!(body.op(sum).operands[0], body.args()[1]);
}

#[test]
fn test_sub_constructions() {
    // Mid is looked back at, so its sub-constructions are lowered against
    // their own lookback functions; Double is inlined.
    let mid_layout = fixtures::struct_layout("MidLayout", &[("r", LayoutType::Reg)]);
    let mid = Component::build("Mid", vec![], Some(mid_layout.clone()), Type::Val, |b| {
        let l = b.arg(0);
        let lr = b.lookup(l, "r");
        let one = b.const_val(1);
        let unused_layout = b.lookup(l, "r");
        b.construct("Reg", vec![one, unused_layout], Type::Val);
        let r = b.construct("Reg", vec![one, lr], Type::Val);
        b.construct("Double", vec![r], Type::Val)
    })
    .unwrap();
    let outer = Component::build("Outer", vec![], Some(mid_layout), Type::Val, |b| {
        let l = b.arg(0);
        b.back("Mid", 1, Some(l), Type::Val)
    })
    .unwrap();
    let circuit = Circuit::new(vec![fixtures::reg(), fixtures::double(), mid, outer]);
    let func = back_of(&circuit, "Mid").unwrap();
    let body = &func.body;

    assert_eq!(kinds(body), vec!["lookup", "back_call", "add", "return"]);
    let call = body.walk()[1];
    assert_eq!(
        body.op(call).operands,
        vec![body.args()[0], body.args()[1], body.result(body.walk()[0])]
    );
    let add = body.walk()[2];
    assert_eq!(body.op(add).loc.inlined_at.len(), 1);
}

#[test]
fn test_unknown_lookback_target() {
    let user = Component::build("User", vec![], Some(LayoutType::Reg), Type::Val, |b| {
        let l = b.arg(0);
        b.at(Span::new(0, 8, 16));
        b.back("Ghost", 1, Some(l), Type::Val)
    })
    .unwrap();
    let outer = Component::build("Outer", vec![], Some(LayoutType::Reg), Type::Val, |b| {
        let l = b.arg(0);
        b.back("User", 1, Some(l), Type::Val)
    })
    .unwrap();
    let circuit = Circuit::new(vec![user, outer]);
    let err = back_of(&circuit, "User").unwrap_err();
    match err {
        LowerError::UnresolvedSymbol { callee, form, loc } => {
            assert_eq!(callee, "Ghost");
            assert_eq!(form, FormKind::Back);
            assert_eq!(loc.span, Span::new(0, 8, 16));
        }
        other => panic!("expected UnresolvedSymbol, got {:?}", other),
    }
}

#[test]
fn test_trail_reaches_done() {
    let circuit = Circuit::new(vec![fixtures::reg(), fixtures::double(), fixtures::top()]);
    let registry = circuit.registry();
    let needs = circuit.needs();
    let cx = BackCx {
        registry: &registry,
        needs: &needs,
    };
    let mut trail = FormTrail::new("Reg", FormKind::Back);
    generate_back(registry.get("Reg").unwrap(), &cx, &LowerConfig::default(), &mut trail).unwrap();
    assert_eq!(trail.state(), FormState::Done);
    assert_eq!(trail.states.len(), 4);
}
