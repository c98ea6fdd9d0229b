use super::*;
use crate::field::{BabyBear, PrimeField};
use crate::ir::{Builder, OpKind, Type};

fn const_of(body: &Body, op: OpId, operand: usize) -> Option<u64> {
    let v = body.op(op).operands[operand];
    let def = body.defining_op(v)?;
    match body.op(def).kind {
        OpKind::Const { value } => Some(value),
        _ => None,
    }
}

fn fold_add(body: &Body, op: OpId, _: &()) -> Result<Option<Rewrite>> {
    if body.op(op).kind != OpKind::Add {
        return Ok(None);
    }
    let (Some(a), Some(b)) = (const_of(body, op, 0), const_of(body, op, 1)) else {
        return Ok(None);
    };
    let sum = BabyBear::from_u64(a).add(BabyBear::from_u64(b)).to_u64();
    let mut frag = Fragment::new();
    let c = frag.push(
        None,
        OpKind::Const { value: sum },
        vec![],
        vec![Type::Val],
        body.op(op).loc.clone(),
    );
    let value = frag.value(c);
    Ok(Some(Rewrite::replace_with(frag, vec![value])))
}

fn erase_dead_const(body: &Body, op: OpId, _: &()) -> Result<Option<Rewrite>> {
    if matches!(body.op(op).kind, OpKind::Const { .. }) && body.results_unused(op) {
        return Ok(Some(Rewrite::erase()));
    }
    Ok(None)
}

fn always_grow(body: &Body, op: OpId, _: &()) -> Result<Option<Rewrite>> {
    if body.op(op).kind != OpKind::Return {
        return Ok(None);
    }
    let mut frag = Fragment::new();
    frag.push(None, OpKind::True, vec![], vec![Type::Constraint], Default::default());
    Ok(Some(Rewrite {
        fragment: frag,
        replace: None,
        erase: false,
    }))
}

fn retype_to_index(body: &Body, op: OpId, _: &()) -> Result<Option<Rewrite>> {
    if !matches!(body.op(op).kind, OpKind::Const { .. }) {
        return Ok(None);
    }
    let mut frag = Fragment::new();
    let i = frag.push(None, OpKind::IndexConst { value: 0 }, vec![], vec![Type::Index], Default::default());
    let value = frag.value(i);
    Ok(Some(Rewrite::replace_with(frag, vec![value])))
}

#[test]
fn test_folds_chain_to_fixed_point() {
    let mut b = Builder::new(vec![]);
    let one = b.const_val(1);
    let two = b.const_val(2);
    let three = b.add(one, two);
    let four = b.const_val(4);
    let seven = b.add(three, four);
    b.ret(vec![seven]);
    let mut body = b.finish().unwrap();

    let driver = Driver::new(
        "fold",
        vec![Rule::new("fold_add", 1, fold_add), Rule::new("erase_dead_const", 0, erase_dead_const)],
        100,
    );
    let stats = driver.run(&mut body, &(), &Location::dummy()).unwrap();

    assert_eq!(stats.count("fold_add"), 2);
    let live = body.walk();
    assert_eq!(live.len(), 2);
    assert_eq!(body.op(live[0]).kind, OpKind::Const { value: 7 });
    assert!(body.verify().is_ok());
}

#[test]
fn test_bound_is_enforced() {
    let mut b = Builder::new(vec![]);
    b.ret(vec![]);
    let mut body = b.finish().unwrap();

    let driver = Driver::new("grow", vec![Rule::new("always_grow", 0, always_grow)], 5);
    let err = driver.run(&mut body, &(), &Location::dummy()).unwrap_err();
    assert!(matches!(
        err,
        LowerError::NonTerminatingRewrite {
            pass: "grow",
            iterations: 5,
            ..
        }
    ));
}

#[test]
fn test_replacement_must_keep_type() {
    let mut b = Builder::new(vec![]);
    let c = b.const_val(1);
    b.ret(vec![c]);
    let mut body = b.finish().unwrap();

    let driver = Driver::new("retype", vec![Rule::new("retype_to_index", 0, retype_to_index)], 10);
    let err = driver.run(&mut body, &(), &Location::dummy()).unwrap_err();
    assert!(matches!(err, LowerError::TypeMismatch { op: "const", .. }));
}

#[test]
fn test_higher_benefit_wins() {
    let mut b = Builder::new(vec![]);
    let one = b.const_val(1);
    let two = b.const_val(2);
    let three = b.add(one, two);
    b.ret(vec![three]);
    let mut body = b.finish().unwrap();

    // Listed last but tried first.
    let driver = Driver::new(
        "order",
        vec![Rule::new("erase_dead_const", 0, erase_dead_const), Rule::new("fold_add", 5, fold_add)],
        100,
    );
    let stats = driver.run(&mut body, &(), &Location::dummy()).unwrap();
    assert_eq!(stats.count("fold_add"), 1);
    assert_eq!(stats.count("erase_dead_const"), 2);
}
