//! Form generation: per-component execute and lookback functions, the
//! inlined check function, switch elimination, validity aggregation and
//! tap discovery.

pub mod back;
pub mod check;
pub mod cse;
pub mod exec;
pub mod interp;
pub mod rules;
pub mod switch;
pub mod taps;
pub mod validity;

#[cfg(test)]
pub(crate) mod fixtures;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LowerError;
use crate::ir::{Component, Registry, Type};
use crate::span::Location;

pub use back::{generate_back, BackCx};
pub use check::{generate_check, CheckCx};
pub use exec::{generate_exec, ExecCx};
pub use interp::{BoundLayout, Constant, Interpreter};
pub use switch::{eliminate_switches, select_strategy, SwitchStrategy};
pub use taps::{discover_taps, generate_validity_taps, Tap, TapTable};
pub use validity::generate_validity_regs;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    Exec,
    Back,
    Check,
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormKind::Exec => write!(f, "exec"),
            FormKind::Back => write!(f, "back"),
            FormKind::Check => write!(f, "check"),
        }
    }
}

/// Generation progress of one form. `Done` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormState {
    Pending,
    Cloning,
    LocalRewrite,
    Done,
    Failed,
}

impl FormState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FormState::Done | FormState::Failed)
    }

    fn can_advance_to(self, next: FormState) -> bool {
        use FormState::*;
        matches!(
            (self, next),
            (Pending, Cloning)
                | (Cloning, LocalRewrite)
                | (LocalRewrite, Done)
                | (Pending | Cloning | LocalRewrite, Failed)
        )
    }
}

/// States one form went through, recorded while it was generated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormTrail {
    pub component: String,
    pub form: FormKind,
    pub states: Vec<FormState>,
}

impl FormTrail {
    pub fn new(component: &str, form: FormKind) -> Self {
        Self {
            component: component.to_string(),
            form,
            states: vec![FormState::Pending],
        }
    }

    pub fn state(&self) -> FormState {
        self.states.last().copied().unwrap_or(FormState::Pending)
    }

    pub fn advance(&mut self, next: FormState) {
        let current = self.state();
        debug_assert!(
            current.can_advance_to(next),
            "illegal form transition {:?} -> {:?}",
            current,
            next
        );
        if current.is_terminal() {
            return;
        }
        tracing::debug!(
            component = %self.component,
            form = %self.form,
            from = ?current,
            to = ?next,
            "form state"
        );
        self.states.push(next);
    }
}

/// Final state of every form generated for a module.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormLedger {
    trails: BTreeMap<(String, FormKind), FormTrail>,
}

impl FormLedger {
    pub fn record(&mut self, trail: FormTrail) {
        self.trails
            .insert((trail.component.clone(), trail.form), trail);
    }

    pub fn state(&self, component: &str, form: FormKind) -> Option<FormState> {
        self.trails
            .get(&(component.to_string(), form))
            .map(|t| t.state())
    }

    pub fn trail(&self, component: &str, form: FormKind) -> Option<&FormTrail> {
        self.trails.get(&(component.to_string(), form))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormTrail> {
        self.trails.values()
    }

    pub fn all_done(&self) -> bool {
        self.trails.values().all(|t| t.state() == FormState::Done)
    }
}

/// Wrap a generation failure with the sites that required the form.
pub(crate) fn generation_failed(
    component: &str,
    form: FormKind,
    loc: Location,
    required_by: &[Location],
    cause: LowerError,
) -> LowerError {
    LowerError::FormGeneration {
        component: component.to_string(),
        form,
        loc,
        required_by: required_by.to_vec(),
        source: Box::new(cause),
    }
}

/// Look up `callee` and check a call's argument and result types against
/// its construction signature.
pub(crate) fn resolve_callee<'m>(
    registry: &Registry<'m>,
    callee: &str,
    args: &[Type],
    result: &Type,
    form: FormKind,
    loc: &Location,
) -> Result<&'m Component, LowerError> {
    let Some(component) = registry.get(callee) else {
        return Err(LowerError::UnresolvedSymbol {
            callee: callee.to_string(),
            form,
            loc: loc.clone(),
        });
    };
    let want = component.construct_signature();
    if args != want.as_slice() {
        return Err(LowerError::TypeMismatch {
            op: "construct",
            expected: type_list(&want),
            found: type_list(args),
            loc: loc.clone(),
        });
    }
    if *result != component.result {
        return Err(LowerError::TypeMismatch {
            op: "construct",
            expected: component.result.to_string(),
            found: result.to_string(),
            loc: loc.clone(),
        });
    }
    Ok(component)
}

fn type_list(types: &[Type]) -> String {
    let parts: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    format!("({})", parts.join(", "))
}
