//! Small circuits shared by the generator tests.

use crate::analysis::BackNeeds;
use crate::ir::{Component, LayoutMember, LayoutType, Registry, Type};
use crate::span::Span;

pub fn struct_layout(name: &str, members: &[(&str, LayoutType)]) -> LayoutType {
    LayoutType::Struct {
        name: name.to_string(),
        members: members
            .iter()
            .map(|(n, l)| LayoutMember {
                name: n.to_string(),
                layout: l.clone(),
            })
            .collect(),
    }
}

/// `Reg(x)`: store `x` in its register and read it back.
pub fn reg() -> Component {
    Component::build("Reg", vec![Type::Val], Some(LayoutType::Reg), Type::Val, |b| {
        let (x, l) = (b.arg(0), b.arg(1));
        b.at(Span::new(0, 1, 5));
        b.store(l, x);
        b.load(l, 0)
    })
    .unwrap()
}

/// `Double(x) = x + x`, no registers.
pub fn double() -> Component {
    Component::build("Double", vec![Type::Val], None, Type::Val, |b| {
        let x = b.arg(0);
        b.add(x, x)
    })
    .unwrap()
}

pub fn top_layout() -> LayoutType {
    struct_layout("TopLayout", &[("a", LayoutType::Reg), ("b", LayoutType::Reg)])
}

/// `Top`: `a := Reg(7)`, `b := Reg(Double(a))`, and `b == Reg@2 (a)`.
pub fn top() -> Component {
    Component::build("Top", vec![], Some(top_layout()), Type::unit(), |b| {
        let l = b.arg(0);
        let la = b.lookup(l, "a");
        let lb = b.lookup(l, "b");
        let seven = b.const_val(7);
        b.at(Span::new(0, 20, 30));
        let a = b.construct("Reg", vec![seven, la], Type::Val);
        let d = b.construct("Double", vec![a], Type::Val);
        let bv = b.construct("Reg", vec![d, lb], Type::Val);
        b.at(Span::new(0, 40, 50));
        let prev = b.back("Reg", 2, Some(la), Type::Val);
        b.eq(bv, prev);
        b.pack(vec![], Type::unit())
    })
    .unwrap()
}

pub struct Circuit {
    pub components: Vec<Component>,
}

impl Circuit {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn registry(&self) -> Registry<'_> {
        Registry::new(&self.components)
    }

    pub fn needs(&self) -> BackNeeds {
        BackNeeds::analyze(&self.registry())
    }
}
