use super::*;
use crate::error::LowerError;
use crate::ir::{Builder, LayoutType};

fn reg() -> Type {
    Type::Layout(LayoutType::Reg)
}

#[test]
fn test_create_op_checks_types() {
    let mut body = Body::new(vec![reg(), Type::Val]);
    let (r, v) = (body.args()[0], body.args()[1]);
    let err = body
        .create_op(
            OpKind::Load { unchecked: false },
            vec![r, v],
            vec![Type::Val],
            vec![],
            Location::dummy(),
        )
        .unwrap_err();
    assert!(matches!(err, LowerError::TypeMismatch { op: "load", .. }));
}

#[test]
fn test_users_and_replace() {
    let mut b = Builder::new(vec![Type::Val]);
    let x = b.arg(0);
    let one = b.const_val(1);
    let sum = b.add(x, one);
    b.equal_zero(sum);
    b.ret(vec![sum]);
    let mut body = b.finish().unwrap();

    assert_eq!(body.users(sum).len(), 2);
    let add = body.defining_op(sum).unwrap();
    assert!(!body.results_unused(add));

    body.replace_all_uses(sum, x);
    assert!(body.results_unused(add));
    assert!(!body.has_uses(sum));
    body.erase(add);
    assert!(body.op(add).erased);
    assert!(body.verify().is_ok());
}

#[test]
fn test_erase_recurses_into_owned_regions() {
    let mut b = Builder::new(vec![Type::Val]);
    let c = b.arg(0);
    b.if_(c, |b| {
        let k = b.const_val(3);
        b.equal_zero(k);
    });
    b.ret(vec![]);
    let mut body = b.finish().unwrap();

    let if_op = body.walk()[0];
    assert_eq!(body.op(if_op).kind, OpKind::If);
    assert_eq!(body.walk().len(), 5);
    body.erase(if_op);
    assert_eq!(body.walk().len(), 1);
    assert_eq!(body.op_count(), 1);
}

#[test]
fn test_walk_is_preorder() {
    let mut b = Builder::new(vec![Type::Val, Type::Val]);
    let (s0, s1) = (b.arg(0), b.arg(1));
    let out = b.switch(vec![s0, s1], Type::Val, |b, i| b.const_val(i as u64));
    b.ret(vec![out]);
    let body = b.finish().unwrap();

    let names: Vec<&str> = body.walk().iter().map(|&o| body.op(o).kind.name()).collect();
    assert_eq!(names, vec!["switch", "const", "yield", "const", "yield", "return"]);
    let first_const = body.walk()[1];
    assert_eq!(body.parent_op(first_const), Some(body.walk()[0]));
    assert!(body.is_inside(first_const, body.walk()[0]));
}

#[test]
fn test_verify_catches_missing_terminator() {
    let mut body = Body::new(vec![]);
    body.build(
        OpKind::Const { value: 1 },
        vec![],
        vec![Type::Val],
        vec![],
        Location::dummy(),
        InsertPoint::End(body.entry()),
    )
    .unwrap();
    assert!(body.verify().is_err());
}

#[test]
fn test_verify_catches_mistyped_yield() {
    let mut b = Builder::new(vec![Type::Val]);
    let s = b.arg(0);
    let out = b.switch(vec![s], Type::Val, |b, _| b.index(4));
    b.ret(vec![out]);
    let body = b.finish().unwrap();
    assert!(matches!(
        body.verify(),
        Err(LowerError::TypeMismatch { op: "yield", .. })
    ));
}

#[test]
fn test_exec_context() {
    let body = Body::new(vec![Type::Ctx, Type::Index]);
    assert_eq!(body.exec_context(), Some(body.args()[0]));
    let body = Body::new(vec![Type::Index]);
    assert_eq!(body.exec_context(), None);
}

#[test]
fn test_json_round_trip_preserves_structure() {
    let mut b = Builder::new(vec![reg()]);
    let r = b.arg(0);
    let v = b.load(r, 0);
    b.equal_zero(v);
    b.ret(vec![v]);
    let body = b.finish().unwrap();

    let json = serde_json::to_string(&body).unwrap();
    let back: Body = serde_json::from_str(&json).unwrap();
    assert_eq!(back, body);
    assert!(back.verify().is_ok());
}
