#![allow(dead_code)]

use tapline::ir::{Body, Component, EntryPoint, LayoutMember, LayoutType, Module, Type};
use tapline::span::Span;

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

pub fn count(body: &Body, name: &str) -> usize {
    body.walk()
        .iter()
        .filter(|&&o| body.op(o).kind.name() == name)
        .count()
}

/// `Reg(x)`: store `x`, read it back.
pub fn reg() -> Component {
    Component::build("Reg", vec![Type::Val], Some(LayoutType::Reg), Type::Val, |b| {
        let (x, l) = (b.arg(0), b.arg(1));
        b.store(l, x);
        b.load(l, 0)
    })
    .unwrap()
}

pub fn double() -> Component {
    Component::build("Double", vec![Type::Val], None, Type::Val, |b| {
        let x = b.arg(0);
        b.add(x, x)
    })
    .unwrap()
}

/// `a := Reg(7)`, `b := Reg(Double(a))`, `b == Reg@2 (a)`.
pub fn top() -> Component {
    let layout = struct_layout("TopLayout", &[("a", LayoutType::Reg), ("b", LayoutType::Reg)]);
    Component::build("Top", vec![], Some(layout), Type::unit(), |b| {
        let l = b.arg(0);
        let (la, lb) = (b.lookup(l, "a"), b.lookup(l, "b"));
        let seven = b.const_val(7);
        let a = b.construct("Reg", vec![seven, la], Type::Val);
        let d = b.construct("Double", vec![a], Type::Val);
        let bv = b.construct("Reg", vec![d, lb], Type::Val);
        let prev = b.back("Reg", 2, Some(la), Type::Val);
        b.eq(bv, prev);
        b.pack(vec![], Type::unit())
    })
    .unwrap()
}

pub fn top_module() -> Module {
    Module::new(
        vec![reg(), double(), top()],
        vec![EntryPoint::new("Top", "data")],
    )
}

/// Writes its register, then constrains the value from two steps back.
pub fn watch() -> Component {
    Component::build("Watch", vec![], Some(LayoutType::Reg), Type::unit(), |b| {
        let l = b.arg(0);
        let five = b.const_val(5);
        b.construct("Reg", vec![five, l], Type::Val);
        b.at(Span::new(0, 10, 20));
        let prev = b.back("Reg", 2, Some(l), Type::Val);
        let expected = b.const_val(5);
        b.eq(prev, expected);
        b.pack(vec![], Type::unit())
    })
    .unwrap()
}

/// Two selectors; arm 1 also logs its value through an extern.
pub fn logged_mux() -> Component {
    let layout = struct_layout(
        "MuxLayout",
        &[("s0", LayoutType::Reg), ("s1", LayoutType::Reg), ("out", LayoutType::Reg)],
    );
    Component::build("Mux", vec![], Some(layout), Type::unit(), |b| {
        let l = b.arg(0);
        let (l0, l1, lout) = (b.lookup(l, "s0"), b.lookup(l, "s1"), b.lookup(l, "out"));
        let (s0, s1) = (b.load(l0, 0), b.load(l1, 0));
        let picked = b.switch(vec![s0, s1], Type::Val, |b, i| {
            let v = b.const_val(3 + i as u64);
            if i == 1 {
                b.extern_call("log", vec![v], vec![]);
            }
            v
        });
        let stored = b.construct("Reg", vec![picked, lout], Type::Val);
        b.eq(stored, picked);
        b.pack(vec![], Type::unit())
    })
    .unwrap()
}

/// Reads the cell selected by a value loaded from the trace.
pub fn indirect() -> Component {
    let cells = LayoutType::Array {
        element: Box::new(LayoutType::Reg),
        len: 4,
    };
    let layout = struct_layout("IndirectLayout", &[("sel", LayoutType::Reg), ("cells", cells)]);
    Component::build("Indirect", vec![], Some(layout), Type::unit(), |b| {
        let l = b.arg(0);
        let (lsel, lcells) = (b.lookup(l, "sel"), b.lookup(l, "cells"));
        let which = b.load(lsel, 0);
        let cell = b.subscript(lcells, which);
        b.at(Span::new(0, 60, 70));
        let v = b.load(cell, 0);
        let zero = b.const_val(0);
        b.eq(v, zero);
        b.pack(vec![], Type::unit())
    })
    .unwrap()
}

/// Like `logged_mux`, but arm 1 yields the extern's result.
pub fn inverting_mux() -> Component {
    let layout = struct_layout(
        "MuxLayout",
        &[("s0", LayoutType::Reg), ("s1", LayoutType::Reg), ("out", LayoutType::Reg)],
    );
    Component::build("Mux", vec![], Some(layout), Type::unit(), |b| {
        let l = b.arg(0);
        let (l0, l1, lout) = (b.lookup(l, "s0"), b.lookup(l, "s1"), b.lookup(l, "out"));
        let (s0, s1) = (b.load(l0, 0), b.load(l1, 0));
        let picked = b.switch(vec![s0, s1], Type::Val, |b, i| {
            if i == 0 {
                return b.const_val(3);
            }
            b.at(Span::new(0, 40, 45));
            let inv = b.extern_call("inv", vec![s1], vec![Type::Val])[0];
            b.at(Span::dummy());
            inv
        });
        let stored = b.construct("Reg", vec![picked, lout], Type::Val);
        b.eq(stored, picked);
        b.pack(vec![], Type::unit())
    })
    .unwrap()
}
