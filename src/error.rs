use crate::diagnostic::Diagnostic;
use crate::lower::FormKind;
use crate::span::Location;

/// Every way lowering can fail.
///
/// `NonIdempotentUnravel` is produced by the switch strategy selection and
/// recovered locally. When the switch it blocked reaches validity
/// aggregation it rides along as the `blocker` of that error. The rest
/// abort the compilation unit.
#[derive(Clone, Debug, thiserror::Error)]
pub enum LowerError {
    #[error("type mismatch in `{op}`: expected {expected}, found {found}")]
    TypeMismatch {
        op: &'static str,
        expected: String,
        found: String,
        loc: Location,
    },

    #[error("`{callee}` has no {form} function")]
    UnresolvedSymbol {
        callee: String,
        form: FormKind,
        loc: Location,
    },

    #[error("cannot unravel switch: arm {arm} contains non-idempotent `{op}`")]
    NonIdempotentUnravel {
        arm: usize,
        op: &'static str,
        loc: Location,
    },

    #[error("invalid op `{op}` in validity aggregation")]
    UnsupportedOperationInAggregation {
        op: &'static str,
        loc: Location,
        #[source]
        blocker: Option<Box<LowerError>>,
    },

    #[error("unsupported op `{op}` left in validity function")]
    UnsupportedOperationInValidity { op: &'static str, loc: Location },

    #[error("couldn't evaluate {operand} of load to a constant")]
    NonConstantTapReference {
        operand: &'static str,
        loc: Location,
    },

    #[error("rewrite pass `{pass}` did not converge after {iterations} iterations")]
    NonTerminatingRewrite {
        pass: &'static str,
        iterations: usize,
        loc: Location,
    },

    #[error("unable to generate {form} function for `{component}`")]
    FormGeneration {
        component: String,
        form: FormKind,
        loc: Location,
        required_by: Vec<Location>,
        #[source]
        source: Box<LowerError>,
    },
}

impl LowerError {
    pub fn location(&self) -> &Location {
        match self {
            LowerError::TypeMismatch { loc, .. }
            | LowerError::UnresolvedSymbol { loc, .. }
            | LowerError::NonIdempotentUnravel { loc, .. }
            | LowerError::UnsupportedOperationInAggregation { loc, .. }
            | LowerError::UnsupportedOperationInValidity { loc, .. }
            | LowerError::NonConstantTapReference { loc, .. }
            | LowerError::NonTerminatingRewrite { loc, .. }
            | LowerError::FormGeneration { loc, .. } => loc,
        }
    }

    /// The innermost error, looking through `FormGeneration` wrappers.
    pub fn root_cause(&self) -> &LowerError {
        match self {
            LowerError::FormGeneration { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            LowerError::FormGeneration {
                component,
                form,
                required_by,
                source,
                ..
            } => {
                let mut diag = source.to_diagnostic().with_note(format!(
                    "unable to generate {} function for `{}`",
                    form, component
                ));
                for site in required_by {
                    diag = diag.with_note_at(site.span, "required here".to_string());
                }
                diag
            }
            other => {
                let loc = other.location();
                let mut diag = Diagnostic::error(other.to_string(), loc.span);
                for site in &loc.inlined_at {
                    diag = diag.with_note_at(*site, "inlined from here".to_string());
                }
                match other {
                    LowerError::UnsupportedOperationInAggregation {
                        blocker: Some(cause),
                        ..
                    } => diag.with_note_at(cause.location().span, cause.to_string()),
                    LowerError::NonConstantTapReference { .. } => diag.with_help(
                        "tap addresses and distances must be compile-time constants".to_string(),
                    ),
                    LowerError::NonTerminatingRewrite { .. } => diag.with_help(
                        "raise `max_rewrite_iterations` or look for self-recursive components"
                            .to_string(),
                    ),
                    _ => diag,
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, LowerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[test]
    fn form_generation_attributes_call_sites() {
        let cause = LowerError::UnresolvedSymbol {
            callee: "Reg".to_string(),
            form: FormKind::Back,
            loc: Location::new(Span::new(0, 30, 40)),
        };
        let err = LowerError::FormGeneration {
            component: "Top".to_string(),
            form: FormKind::Back,
            loc: Location::new(Span::new(0, 0, 50)),
            required_by: vec![Location::new(Span::new(0, 70, 80))],
            source: Box::new(cause),
        };
        assert!(matches!(err.root_cause(), LowerError::UnresolvedSymbol { .. }));

        let diag = err.to_diagnostic();
        assert_eq!(diag.message, "`Reg` has no back function");
        assert_eq!(diag.span, Span::new(0, 30, 40));
        assert_eq!(diag.notes.len(), 2);
        assert_eq!(diag.notes[1].span, Some(Span::new(0, 70, 80)));
    }

    #[test]
    fn inlining_chain_becomes_notes() {
        let loc = Location::new(Span::new(0, 5, 9)).inlined_into(&Location::new(Span::new(0, 20, 24)));
        let err = LowerError::NonConstantTapReference {
            operand: "distance",
            loc,
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.message, "couldn't evaluate distance of load to a constant");
        assert_eq!(diag.notes[0].message, "inlined from here");
        assert!(diag.help.is_some());
    }
}
