mod common;

use tapline::ir::{Builder, EntryPoint, Module, OpKind, Type};
use tapline::lower::{eliminate_switches, Constant, Interpreter};
use tapline::span::Span;
use tapline::{lower_module, LowerConfig, LowerError};

use common::count;

#[test]
fn register_read_two_steps_back() {
    let module = Module::new(
        vec![common::reg(), common::watch()],
        vec![EntryPoint::new("Watch", "data")],
    );
    let lowered = lower_module(&module, &LowerConfig::default()).unwrap();

    assert!(lowered.needs.contains("Reg"));
    assert!(!lowered.needs.contains("Watch"));
    let back = &lowered.back["Reg"];
    let args: Vec<String> = back
        .body
        .args()
        .iter()
        .map(|&v| back.body.value_type(v).to_string())
        .collect();
    assert_eq!(args, vec!["ctx", "index", "layout<reg>"]);

    // The write-then-read of the current row feeds nothing.
    assert_eq!(lowered.taps.len(), 1);
    assert_eq!(lowered.taps.to_string(), "0: data[0]@2\n");
}

#[test]
fn constant_arms_become_weighted_sum() {
    let mut b = Builder::new(vec![Type::Val, Type::Val, Type::Val]);
    let sels = vec![b.arg(0), b.arg(1), b.arg(2)];
    let out = b.switch(sels, Type::Val, |b, i| b.const_val([10, 20, 30][i]));
    b.ret(vec![out]);
    let mut body = b.finish().unwrap();

    eliminate_switches(&mut body, &LowerConfig::default()).unwrap();
    assert_eq!(count(&body, "switch"), 0);
    assert_eq!(count(&body, "mul"), 3);
    assert_eq!(count(&body, "add"), 2);

    let ret = body.terminator(body.entry()).unwrap();
    let result = body.op(ret).operands[0];
    let sum = body.defining_op(result).unwrap();
    assert_eq!(body.op(sum).kind, OpKind::Add);

    let s1 = body.args()[1];
    let mut interp = Interpreter::new(&body);
    for &sel in body.args() {
        interp.bind(sel, Constant::val(u64::from(sel == s1)));
    }
    assert_eq!(interp.evaluate(result), Some(Constant::val(20)));
}

#[test]
fn impure_arm_is_not_fatal() {
    let module = Module::new(
        vec![common::reg(), common::logged_mux()],
        vec![EntryPoint::new("Mux", "data")],
    );
    let lowered = lower_module(&module, &LowerConfig::default()).unwrap();

    let check = &lowered.check.body;
    assert_eq!(count(check, "switch"), 0);
    assert_eq!(count(check, "extern"), 0);
    assert_eq!(count(check, "equal_zero"), 1);
    // Execute functions keep the switch and its side effect.
    let exec = &lowered.exec["Mux"].body;
    assert_eq!(count(exec, "switch"), 1);
    assert_eq!(count(exec, "extern"), 1);

    assert_eq!(lowered.taps.len(), 3);
}

#[test]
fn impure_yield_names_the_arm() {
    let module = Module::new(
        vec![common::reg(), common::inverting_mux()],
        vec![EntryPoint::new("Mux", "data")],
    );
    let err = lower_module(&module, &LowerConfig::default()).unwrap_err();
    let LowerError::UnsupportedOperationInAggregation {
        op: "switch",
        blocker: Some(blocker),
        ..
    } = &err
    else {
        panic!("expected an aggregation error, got {:?}", err);
    };
    match &**blocker {
        LowerError::NonIdempotentUnravel { arm, op, loc } => {
            assert_eq!((*arm, *op), (1, "extern"));
            assert_eq!(loc.span, Span::new(0, 40, 45));
        }
        other => panic!("expected NonIdempotentUnravel, got {:?}", other),
    }
    let diag = err.to_diagnostic();
    assert!(diag
        .notes
        .iter()
        .any(|n| n.span == Some(Span::new(0, 40, 45)) && n.message.contains("arm 1")));
}

#[test]
fn runtime_cell_selection_is_rejected() {
    let module = Module::new(
        vec![common::indirect()],
        vec![EntryPoint::new("Indirect", "data")],
    );
    let err = lower_module(&module, &LowerConfig::default()).unwrap_err();
    match err {
        LowerError::NonConstantTapReference { operand, loc } => {
            assert_eq!(operand, "reference");
            assert_eq!(loc.span, Span::new(0, 60, 70));
        }
        other => panic!("expected NonConstantTapReference, got {:?}", other),
    }
}
