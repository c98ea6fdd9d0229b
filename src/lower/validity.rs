//! Validity aggregation: fold every constraint of the check function into
//! one `constraint` value that holds iff all of them do.

use crate::analysis::unravel_blocker;
use crate::error::{LowerError, Result};
use crate::ir::{
    map_operand, BlockId, Body, Fragment, Func, FuncKind, InsertPoint, OpKind, Operand, Type,
    ValueMap,
};
use crate::span::Location;

struct Aggregator<'a> {
    src: &'a Body,
    frag: Fragment,
    map: ValueMap,
}

impl Aggregator<'_> {
    fn fresh_true(&mut self, loc: &Location) -> Operand {
        let t = self.frag.push(None, OpKind::True, vec![], vec![Type::Constraint], loc.clone());
        self.frag.value(t)
    }

    fn run_on_block(&mut self, block: BlockId, mut state: Operand) -> Result<Operand> {
        let src = self.src;
        for &op in &src.block(block).ops {
            let o = src.op(op);
            match &o.kind {
                OpKind::EqualZero => {
                    let v = map_operand(&self.map, o.operands[0]);
                    let next = self.frag.push(
                        None,
                        OpKind::AndEqz,
                        vec![state, v],
                        vec![Type::Constraint],
                        o.loc.clone(),
                    );
                    state = self.frag.value(next);
                }
                OpKind::If => {
                    let cond = map_operand(&self.map, o.operands[0]);
                    let inner = self.fresh_true(&o.loc);
                    let inner = self.run_on_block(o.regions[0], inner)?;
                    let next = self.frag.push(
                        None,
                        OpKind::AndCond,
                        vec![state, cond, inner],
                        vec![Type::Constraint],
                        o.loc.clone(),
                    );
                    state = self.frag.value(next);
                }
                OpKind::Return | OpKind::Terminate | OpKind::Yield => {}
                OpKind::Const { .. }
                | OpKind::IndexConst { .. }
                | OpKind::Add
                | OpKind::Sub
                | OpKind::Mul
                | OpKind::Neg
                | OpKind::AddIndex
                | OpKind::Pack
                | OpKind::Lookup { .. }
                | OpKind::Subscript
                | OpKind::Load { .. }
                | OpKind::BindLayout { .. }
                | OpKind::Magic => {
                    self.frag.clone_op(src, op, None, &mut self.map, None);
                }
                // Constraints inside its arms would never reach the aggregate.
                OpKind::Switch => {
                    return Err(LowerError::UnsupportedOperationInAggregation {
                        op: o.kind.name(),
                        loc: o.loc.clone(),
                        blocker: unravel_blocker(src, op).map(Box::new),
                    });
                }
                OpKind::Store
                | OpKind::AliasLayout
                | OpKind::True
                | OpKind::AndEqz
                | OpKind::AndCond
                | OpKind::Construct { .. }
                | OpKind::Back { .. }
                | OpKind::ExecCall { .. }
                | OpKind::BackCall { .. }
                | OpKind::Extern { .. } => {
                    return Err(LowerError::UnsupportedOperationInAggregation {
                        op: o.kind.name(),
                        loc: o.loc.clone(),
                        blocker: None,
                    });
                }
            }
        }
        Ok(state)
    }
}

/// Build `validity_regs(ctx) -> constraint` from the check function.
pub fn generate_validity_regs(check: &Func) -> Result<Func> {
    let _span = tracing::debug_span!("validity_regs").entered();
    let src = &check.body;
    let mut body = Body::new(vec![Type::Ctx]);
    let mut map = ValueMap::new();
    if let Some(ctx) = src.exec_context() {
        map.insert(ctx, Operand::Existing(body.args()[0]));
    }

    let mut agg = Aggregator {
        src,
        frag: Fragment::new(),
        map,
    };
    let start = agg.fresh_true(&check.loc);
    let state = agg.run_on_block(src.entry(), start)?;
    agg.frag.push(None, OpKind::Return, vec![state], vec![], check.loc.clone());
    let entry = body.entry();
    agg.frag.materialize(&mut body, InsertPoint::End(entry))?;
    body.verify()?;

    tracing::debug!(ops = body.op_count(), "validity aggregate ready");
    Ok(Func {
        name: "validity_regs".to_string(),
        kind: FuncKind::ValidityRegs,
        component: String::new(),
        result: Some(Type::Constraint),
        body,
        loc: check.loc.clone(),
    })
}
