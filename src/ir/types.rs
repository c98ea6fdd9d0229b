use std::fmt;

use serde::{Deserialize, Serialize};

/// Value types. Layout-typed values are references into trace storage; a
/// `layout<reg>` value names exactly one register.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Val,
    Ext,
    Index,
    Constraint,
    Ctx,
    Struct(StructType),
    Array { element: Box<Type>, len: u32 },
    Layout(LayoutType),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<FieldType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    pub ty: Type,
}

/// Shape of a component's persistent registers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutType {
    Reg,
    Struct {
        name: String,
        members: Vec<LayoutMember>,
    },
    Array {
        element: Box<LayoutType>,
        len: u32,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayoutMember {
    pub name: String,
    pub layout: LayoutType,
}

impl Type {
    /// The result type of a component that produces nothing.
    pub fn unit() -> Type {
        Type::Struct(StructType {
            name: "Component".to_string(),
            fields: Vec::new(),
        })
    }

    pub fn is_field(&self) -> bool {
        matches!(self, Type::Val | Type::Ext)
    }

    pub fn is_layout(&self) -> bool {
        matches!(self, Type::Layout(_))
    }

    /// Base-field values become extension-field values, recursively through
    /// aggregates. Layouts and the other opaque types are untouched.
    pub fn widened(&self) -> Type {
        match self {
            Type::Val => Type::Ext,
            Type::Struct(st) => Type::Struct(StructType {
                name: st.name.clone(),
                fields: st
                    .fields
                    .iter()
                    .map(|f| FieldType {
                        name: f.name.clone(),
                        ty: f.ty.widened(),
                    })
                    .collect(),
            }),
            Type::Array { element, len } => Type::Array {
                element: Box::new(element.widened()),
                len: *len,
            },
            other => other.clone(),
        }
    }

    /// Type of a named struct field or layout member.
    pub fn member(&self, name: &str) -> Option<Type> {
        match self {
            Type::Struct(st) => st.fields.iter().find(|f| f.name == name).map(|f| f.ty.clone()),
            Type::Layout(layout) => layout
                .member_offset(name)
                .map(|(_, member)| Type::Layout(member.clone())),
            _ => None,
        }
    }

    /// Element type of an array or array layout.
    pub fn element(&self) -> Option<Type> {
        match self {
            Type::Array { element, .. } => Some((**element).clone()),
            Type::Layout(LayoutType::Array { element, .. }) => {
                Some(Type::Layout((**element).clone()))
            }
            _ => None,
        }
    }
}

impl LayoutType {
    /// Number of registers covered.
    pub fn width(&self) -> u32 {
        match self {
            LayoutType::Reg => 1,
            LayoutType::Struct { members, .. } => members.iter().map(|m| m.layout.width()).sum(),
            LayoutType::Array { element, len } => element.width() * len,
        }
    }

    /// Register offset of a struct member relative to the start of this
    /// layout, together with the member's layout.
    pub fn member_offset(&self, name: &str) -> Option<(u32, &LayoutType)> {
        let LayoutType::Struct { members, .. } = self else {
            return None;
        };
        let mut offset = 0;
        for member in members {
            if member.name == name {
                return Some((offset, &member.layout));
            }
            offset += member.layout.width();
        }
        None
    }

    pub fn element_offset(&self, index: u32) -> Option<(u32, &LayoutType)> {
        match self {
            LayoutType::Array { element, len } if index < *len => {
                Some((element.width() * index, element))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Val => write!(f, "val"),
            Type::Ext => write!(f, "ext"),
            Type::Index => write!(f, "index"),
            Type::Constraint => write!(f, "constraint"),
            Type::Ctx => write!(f, "ctx"),
            Type::Struct(st) => write!(f, "{}", st.name),
            Type::Array { element, len } => write!(f, "array<{}; {}>", element, len),
            Type::Layout(layout) => write!(f, "layout<{}>", layout),
        }
    }
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutType::Reg => write!(f, "reg"),
            LayoutType::Struct { name, .. } => write!(f, "{}", name),
            LayoutType::Array { element, len } => write!(f, "[{}; {}]", element, len),
        }
    }
}
