//! Worklist rewrite driver.
//!
//! A rule looks at one op and either declines or returns a `Rewrite`: a
//! fragment to materialize in front of the op, optional replacements for
//! the op's results and whether the op goes away. Rules never mutate the
//! body themselves; the driver applies what they return.
//!
//! Each sweep visits the live ops in pre-order, trying rules by descending
//! benefit; the first match wins. Ops created during a sweep are first
//! visited in the next one. The driver stops after a sweep that changes
//! nothing and fails once the sweep bound is exceeded.

use std::collections::BTreeMap;

use crate::error::{LowerError, Result};
use crate::ir::{Body, Fragment, InsertPoint, OpId, Operand};
use crate::span::Location;

pub struct Rewrite {
    pub fragment: Fragment,
    pub replace: Option<Vec<Operand>>,
    pub erase: bool,
}

impl Rewrite {
    pub fn erase() -> Self {
        Self {
            fragment: Fragment::new(),
            replace: None,
            erase: true,
        }
    }

    /// Replace the op's results with `values` and erase it.
    pub fn replace_with(fragment: Fragment, values: Vec<Operand>) -> Self {
        Self {
            fragment,
            replace: Some(values),
            erase: true,
        }
    }

    /// Point every use of the op's results at `values`, keeping the op.
    pub fn redirect_uses(fragment: Fragment, values: Vec<Operand>) -> Self {
        Self {
            fragment,
            replace: Some(values),
            erase: false,
        }
    }
}

pub type RuleFn<C> = fn(&Body, OpId, &C) -> Result<Option<Rewrite>>;

pub struct Rule<C> {
    pub name: &'static str,
    pub benefit: u16,
    pub apply: RuleFn<C>,
}

impl<C> Rule<C> {
    pub fn new(name: &'static str, benefit: u16, apply: RuleFn<C>) -> Self {
        Self {
            name,
            benefit,
            apply,
        }
    }
}

impl<C> Clone for Rule<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Rule<C> {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub iterations: usize,
    pub applied: BTreeMap<&'static str, usize>,
}

impl RewriteStats {
    pub fn count(&self, rule: &str) -> usize {
        self.applied.get(rule).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.applied.values().sum()
    }
}

pub struct Driver<C> {
    pass: &'static str,
    rules: Vec<Rule<C>>,
    max_iterations: usize,
}

impl<C> Driver<C> {
    pub fn new(pass: &'static str, mut rules: Vec<Rule<C>>, max_iterations: usize) -> Self {
        // Stable: equal-benefit rules keep their listed order.
        rules.sort_by(|a, b| b.benefit.cmp(&a.benefit));
        Self {
            pass,
            rules,
            max_iterations,
        }
    }

    /// Rewrite `body` to a fixed point. `loc` attributes a non-termination
    /// failure.
    pub fn run(&self, body: &mut Body, cx: &C, loc: &Location) -> Result<RewriteStats> {
        let mut stats = RewriteStats::default();
        loop {
            if stats.iterations >= self.max_iterations {
                return Err(LowerError::NonTerminatingRewrite {
                    pass: self.pass,
                    iterations: stats.iterations,
                    loc: loc.clone(),
                });
            }
            stats.iterations += 1;

            let mut changed = false;
            for op in body.walk() {
                if body.op(op).erased {
                    continue;
                }
                for rule in &self.rules {
                    if let Some(rewrite) = (rule.apply)(body, op, cx)? {
                        apply(body, op, rewrite)?;
                        *stats.applied.entry(rule.name).or_insert(0) += 1;
                        changed = true;
                        break;
                    }
                }
            }
            if !changed {
                tracing::debug!(
                    pass = self.pass,
                    iterations = stats.iterations,
                    applied = stats.total(),
                    "rewrite fixed point"
                );
                return Ok(stats);
            }
        }
    }
}

fn apply(body: &mut Body, op: OpId, rewrite: Rewrite) -> Result<()> {
    let created = rewrite.fragment.materialize(body, InsertPoint::Before(op))?;
    if let Some(values) = rewrite.replace {
        let old = body.op(op).results.clone();
        for (&from, operand) in old.iter().zip(values) {
            let to = created.resolve(body, operand);
            if body.value_type(from) != body.value_type(to) {
                return Err(LowerError::TypeMismatch {
                    op: body.op(op).kind.name(),
                    expected: body.value_type(from).to_string(),
                    found: body.value_type(to).to_string(),
                    loc: body.op(op).loc.clone(),
                });
            }
            body.replace_all_uses(from, to);
        }
    }
    if rewrite.erase {
        body.erase(op);
    }
    Ok(())
}

#[cfg(test)]
mod tests;
