use serde::{Deserialize, Serialize};

/// A source location: file ID + byte offset range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub file_id: u16,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    pub fn dummy() -> Self {
        Self {
            file_id: 0,
            start: 0,
            end: 0,
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.start == 0 && self.end == 0
    }
}

/// Where an operation came from: its own span plus the call sites it was
/// inlined through, innermost first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub span: Span,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inlined_at: Vec<Span>,
}

impl Location {
    pub fn new(span: Span) -> Self {
        Self {
            span,
            inlined_at: Vec::new(),
        }
    }

    pub fn dummy() -> Self {
        Self::new(Span::dummy())
    }

    /// The same location, seen through one more level of inlining.
    pub fn inlined_into(&self, call_site: &Location) -> Location {
        let mut inlined_at = self.inlined_at.clone();
        inlined_at.push(call_site.span);
        inlined_at.extend(call_site.inlined_at.iter().copied());
        Location {
            span: self.span,
            inlined_at,
        }
    }
}

impl From<Span> for Location {
    fn from(span: Span) -> Self {
        Location::new(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inlining_chain_is_innermost_first() {
        let callee_op = Location::new(Span::new(0, 10, 12));
        let outer_site = Location::new(Span::new(0, 40, 45));
        let inner_site = Location::new(Span::new(0, 20, 25)).inlined_into(&outer_site);

        let loc = callee_op.inlined_into(&inner_site);
        assert_eq!(loc.span, Span::new(0, 10, 12));
        assert_eq!(
            loc.inlined_at,
            vec![Span::new(0, 20, 25), Span::new(0, 40, 45)]
        );
    }

    #[test]
    fn dummy_span() {
        assert!(Span::dummy().is_dummy());
        assert!(!Span::new(0, 3, 4).is_dummy());
    }
}
