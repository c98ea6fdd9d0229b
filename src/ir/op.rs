use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of operation kinds.
///
/// Operand conventions (checked by `verify::check_op`):
/// - `Load`: `[ref: layout<reg>, distance: index]`
/// - `Construct`: `[params..., layout?]`
/// - `Back`: `[layout?]`, the distance is a literal attribute
/// - `ExecCall`: `[ctx, params..., layout?]`
/// - `BackCall`: `[ctx, distance: index, layout?]`
/// - `Switch`: one selector per region
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OpKind {
    // ── Constants ──
    Const { value: u64 },
    IndexConst { value: u64 },

    // ── Arithmetic ──
    Add,
    Sub,
    Mul,
    Neg,
    AddIndex,

    // ── Structure ──
    Pack,
    Lookup { member: String },
    Subscript,

    // ── Trace storage ──
    BindLayout { buffer: String },
    Load {
        #[serde(default)]
        unchecked: bool,
    },
    Store,
    AliasLayout,

    // ── Constraints ──
    EqualZero,
    True,
    AndEqz,
    AndCond,

    // ── Control ──
    If,
    Switch,
    Yield,
    Terminate,
    Return,

    // ── Components ──
    Construct { callee: String },
    Back { callee: String, distance: u64 },
    ExecCall { callee: String },
    BackCall { callee: String },
    Extern { name: String },
    Magic,
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Const { .. } => "const",
            OpKind::IndexConst { .. } => "index_const",
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Neg => "neg",
            OpKind::AddIndex => "add_index",
            OpKind::Pack => "pack",
            OpKind::Lookup { .. } => "lookup",
            OpKind::Subscript => "subscript",
            OpKind::BindLayout { .. } => "bind_layout",
            OpKind::Load { .. } => "load",
            OpKind::Store => "store",
            OpKind::AliasLayout => "alias_layout",
            OpKind::EqualZero => "equal_zero",
            OpKind::True => "true",
            OpKind::AndEqz => "and_eqz",
            OpKind::AndCond => "and_cond",
            OpKind::If => "if",
            OpKind::Switch => "switch",
            OpKind::Yield => "yield",
            OpKind::Terminate => "terminate",
            OpKind::Return => "return",
            OpKind::Construct { .. } => "construct",
            OpKind::Back { .. } => "back",
            OpKind::ExecCall { .. } => "exec_call",
            OpKind::BackCall { .. } => "back_call",
            OpKind::Extern { .. } => "extern",
            OpKind::Magic => "magic",
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, OpKind::Yield | OpKind::Terminate | OpKind::Return)
    }

    /// The component this op refers to by name, if any.
    pub fn callee(&self) -> Option<&str> {
        match self {
            OpKind::Construct { callee }
            | OpKind::Back { callee, .. }
            | OpKind::ExecCall { callee }
            | OpKind::BackCall { callee } => Some(callee),
            _ => None,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Const { value } | OpKind::IndexConst { value } => {
                write!(f, "{} {}", self.name(), value)
            }
            OpKind::Lookup { member } => write!(f, "lookup .{}", member),
            OpKind::BindLayout { buffer } => write!(f, "bind_layout @{}", buffer),
            OpKind::Load { unchecked: true } => write!(f, "load unchecked"),
            OpKind::Construct { callee }
            | OpKind::ExecCall { callee }
            | OpKind::BackCall { callee } => write!(f, "{} @{}", self.name(), callee),
            OpKind::Back { callee, distance } => write!(f, "back @{} {}", callee, distance),
            OpKind::Extern { name } => write!(f, "extern \"{}\"", name),
            _ => write!(f, "{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let kind: OpKind =
            serde_json::from_str(r#"{ "op": "back", "callee": "Reg", "distance": 2 }"#).unwrap();
        assert_eq!(
            kind,
            OpKind::Back {
                callee: "Reg".to_string(),
                distance: 2
            }
        );
        let load: OpKind = serde_json::from_str(r#"{ "op": "load" }"#).unwrap();
        assert_eq!(load, OpKind::Load { unchecked: false });
    }

    #[test]
    fn display() {
        assert_eq!(OpKind::Const { value: 7 }.to_string(), "const 7");
        assert_eq!(
            OpKind::Back {
                callee: "Reg".to_string(),
                distance: 2
            }
            .to_string(),
            "back @Reg 2"
        );
        assert_eq!(OpKind::Load { unchecked: true }.to_string(), "load unchecked");
    }
}
