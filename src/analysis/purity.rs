//! Conservative idempotence classification.
//!
//! An op is idempotent when evaluating it twice (or on a path where it
//! was not evaluated before) cannot change what the circuit computes or
//! constrains. Switch unraveling duplicates arm computations, so it is
//! only allowed when every op it would duplicate passes this test.

use crate::error::LowerError;
use crate::ir::{BlockId, Body, OpId, OpKind};

/// Closed allow-list; everything not named here is treated as having
/// effects.
pub fn is_idempotent(kind: &OpKind) -> bool {
    match kind {
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
        | OpKind::BindLayout { .. }
        | OpKind::Load { .. }
        | OpKind::If
        | OpKind::Yield
        | OpKind::Terminate
        | OpKind::True
        | OpKind::AndEqz
        | OpKind::AndCond
        | OpKind::Magic => true,
        OpKind::Store
        | OpKind::AliasLayout
        | OpKind::EqualZero
        | OpKind::Switch
        | OpKind::Return
        | OpKind::Construct { .. }
        | OpKind::Back { .. }
        | OpKind::ExecCall { .. }
        | OpKind::BackCall { .. }
        | OpKind::Extern { .. } => false,
    }
}

/// Region-free ops whose only effect is their result; safe to erase
/// once unused and to merge when structurally equal.
pub fn is_pure_value(kind: &OpKind) -> bool {
    is_idempotent(kind) && !matches!(kind, OpKind::If | OpKind::Yield | OpKind::Terminate)
}

/// Ops that a later rewrite will replace; a switch arm holding one of these
/// is not ready to be classified yet.
pub fn is_pending(kind: &OpKind) -> bool {
    matches!(
        kind,
        OpKind::Construct { .. }
            | OpKind::Back { .. }
            | OpKind::ExecCall { .. }
            | OpKind::BackCall { .. }
            | OpKind::Switch
    )
}

pub fn has_pending_rewrites(body: &Body, block: BlockId) -> bool {
    body.walk_block(block)
        .iter()
        .any(|&op| is_pending(&body.op(op).kind))
}

/// First op in the switch arms that blocks unraveling. Constraints are
/// not duplicated by unraveling (they stay on the original switch), so
/// `equal_zero` does not block it.
pub fn unravel_blocker(body: &Body, switch: OpId) -> Option<LowerError> {
    for (arm, &region) in body.op(switch).regions.iter().enumerate() {
        for op in body.walk_block(region) {
            let kind = &body.op(op).kind;
            if is_idempotent(kind) || *kind == OpKind::EqualZero {
                continue;
            }
            return Some(LowerError::NonIdempotentUnravel {
                arm,
                op: kind.name(),
                loc: body.op(op).loc.clone(),
            });
        }
    }
    None
}
