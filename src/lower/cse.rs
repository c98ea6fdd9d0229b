//! Common-subexpression and dead-code elimination over pure ops.

use std::collections::HashMap;

use crate::analysis::is_pure_value;
use crate::ir::{BlockId, Body, OpKind, Type, ValueId};

type Key = (OpKind, Vec<ValueId>, Vec<Type>);

fn mergeable(kind: &OpKind) -> bool {
    // Every magic stands for a different unknown.
    is_pure_value(kind) && *kind != OpKind::Magic
}

/// Merge structurally equal pure ops. An op in a nested region may reuse
/// one from an enclosing block, never the other way around.
fn merge_block(body: &mut Body, block: BlockId, scope: &HashMap<Key, ValueId>) -> usize {
    let mut seen = scope.clone();
    let mut merged = 0;
    let ops = body.block(block).ops.clone();
    for op in ops {
        if body.op(op).erased {
            continue;
        }
        let regions = body.op(op).regions.clone();
        for region in regions {
            merged += merge_block(body, region, &seen);
        }
        let o = body.op(op);
        if !mergeable(&o.kind) || !o.regions.is_empty() || o.results.len() != 1 {
            continue;
        }
        let key: Key = (
            o.kind.clone(),
            o.operands.clone(),
            vec![body.value_type(o.results[0]).clone()],
        );
        let result = o.results[0];
        match seen.get(&key) {
            Some(&existing) => {
                body.replace_all_uses(result, existing);
                body.erase(op);
                merged += 1;
            }
            None => {
                seen.insert(key, result);
            }
        }
    }
    merged
}

fn erase_dead(body: &mut Body) -> usize {
    let mut erased = 0;
    // Reverse pre-order sees users before the values they use.
    for op in body.walk().into_iter().rev() {
        let o = body.op(op);
        if is_pure_value(&o.kind) && o.regions.is_empty() && body.results_unused(op) {
            body.erase(op);
            erased += 1;
        }
    }
    erased
}

/// Run both to a fixed point; returns how many ops went away.
pub fn eliminate_common_subexpressions(body: &mut Body) -> usize {
    let mut total = 0;
    loop {
        let entry = body.entry();
        let changed = merge_block(body, entry, &HashMap::new()) + erase_dead(body);
        if changed == 0 {
            break;
        }
        total += changed;
    }
    tracing::debug!(removed = total, "cse fixed point");
    total
}
