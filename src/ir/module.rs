use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::body::Body;
use super::builder::Builder;
use super::body::ValueId;
use super::types::{LayoutType, Type};
use crate::error::{LowerError, Result};
use crate::span::{Location, Span};

/// A component as handed over by the front end. The body's entry block
/// takes the parameters followed by the layout, when there is one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Type>,
    #[serde(default)]
    pub layout: Option<LayoutType>,
    pub result: Type,
    pub body: Body,
    #[serde(default)]
    pub span: Span,
}

impl Component {
    /// Build a component body in code. `f` receives a builder whose
    /// arguments are the params then the layout, and returns the result.
    pub fn build(
        name: &str,
        params: Vec<Type>,
        layout: Option<LayoutType>,
        result: Type,
        f: impl FnOnce(&mut Builder) -> ValueId,
    ) -> Result<Component> {
        let mut arg_types = params.clone();
        arg_types.extend(layout.clone().map(Type::Layout));
        let mut b = Builder::new(arg_types);
        let value = f(&mut b);
        b.ret(vec![value]);
        Ok(Component {
            name: name.to_string(),
            params,
            layout,
            result,
            body: b.finish()?,
            span: Span::dummy(),
        })
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn loc(&self) -> Location {
        Location::new(self.span)
    }

    pub fn layout_type(&self) -> Option<Type> {
        self.layout.clone().map(Type::Layout)
    }

    /// Argument types of a `construct` of this component.
    pub fn construct_signature(&self) -> Vec<Type> {
        let mut sig = self.params.clone();
        sig.extend(self.layout_type());
        sig
    }

    fn verify(&self) -> Result<()> {
        let args: Vec<Type> = self
            .body
            .args()
            .iter()
            .map(|&v| self.body.value_type(v).clone())
            .collect();
        let want = self.construct_signature();
        if args != want {
            return Err(LowerError::TypeMismatch {
                op: "component",
                expected: format!("{:?}", want),
                found: format!("{:?}", args),
                loc: self.loc(),
            });
        }
        self.body.verify()?;
        if let Some(ret) = self.body.terminator(self.body.entry()) {
            let returned: Vec<Type> = self
                .body
                .op(ret)
                .operands
                .iter()
                .map(|&v| self.body.value_type(v).clone())
                .collect();
            if returned != [self.result.clone()] {
                return Err(LowerError::TypeMismatch {
                    op: "return",
                    expected: self.result.to_string(),
                    found: format!("{:?}", returned),
                    loc: self.body.op(ret).loc.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A top-level component whose layout is bound to a whole buffer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub component: String,
    #[serde(default = "default_buffer")]
    pub buffer: String,
    /// Test entries are left out of the check function by default.
    #[serde(default)]
    pub test: bool,
}

fn default_buffer() -> String {
    "data".to_string()
}

impl EntryPoint {
    pub fn new(component: &str, buffer: &str) -> Self {
        Self {
            component: component.to_string(),
            buffer: buffer.to_string(),
            test: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub components: Vec<Component>,
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
    /// Source text the spans point into, for rendering diagnostics.
    #[serde(default)]
    pub source: Option<SourceFile>,
}

impl Module {
    pub fn new(components: Vec<Component>, entry_points: Vec<EntryPoint>) -> Self {
        Self {
            components,
            entry_points,
            source: None,
        }
    }

    pub fn verify(&self) -> Result<()> {
        let mut seen = BTreeMap::new();
        for component in &self.components {
            if seen.insert(component.name.as_str(), ()).is_some() {
                return Err(LowerError::TypeMismatch {
                    op: "component",
                    expected: "unique component name".to_string(),
                    found: format!("duplicate `{}`", component.name),
                    loc: component.loc(),
                });
            }
            component.verify()?;
        }
        for entry in &self.entry_points {
            if !seen.contains_key(entry.component.as_str()) {
                return Err(LowerError::UnresolvedSymbol {
                    callee: entry.component.clone(),
                    form: crate::lower::FormKind::Check,
                    loc: Location::dummy(),
                });
            }
        }
        Ok(())
    }

    pub fn registry(&self) -> Registry<'_> {
        Registry::new(&self.components)
    }
}

/// Name → component table shared (read-only) by every pass.
#[derive(Clone, Debug, Default)]
pub struct Registry<'m> {
    components: BTreeMap<&'m str, &'m Component>,
}

impl<'m> Registry<'m> {
    pub fn new(components: &'m [Component]) -> Self {
        Self {
            components: components.iter().map(|c| (c.name.as_str(), c)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'m Component> {
        self.components.get(name).copied()
    }

    /// Components in name order.
    pub fn iter(&self) -> impl Iterator<Item = &'m Component> + '_ {
        self.components.values().copied()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuncKind {
    Exec,
    Back,
    Check,
    ValidityRegs,
    ValidityTaps,
}

/// A generated function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Func {
    pub name: String,
    pub kind: FuncKind,
    /// Component the function was derived from; empty for whole-circuit
    /// functions.
    pub component: String,
    pub result: Option<Type>,
    pub body: Body,
    pub loc: Location,
}

impl Func {
    pub fn exec_name(component: &str) -> String {
        format!("{}.exec", component)
    }

    pub fn back_name(component: &str) -> String {
        format!("{}.back", component)
    }
}

impl fmt::Display for FuncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FuncKind::Exec => "exec",
            FuncKind::Back => "back",
            FuncKind::Check => "check",
            FuncKind::ValidityRegs => "validity_regs",
            FuncKind::ValidityTaps => "validity_taps",
        };
        write!(f, "{}", s)
    }
}
