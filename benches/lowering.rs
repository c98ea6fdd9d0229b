//! Full-pipeline benchmark on synthetic modules.
//!
//! Each stage owns a row of registers: it writes every register, muxes two
//! of them through a switch and constrains each against its value a few
//! rows back. The top component instantiates `n` stages side by side.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tapline::ir::{Component, EntryPoint, LayoutMember, LayoutType, Module, Type};
use tapline::{lower_module, LowerConfig};

const WIDTH: usize = 4;

fn row_layout() -> LayoutType {
    LayoutType::Struct {
        name: "Row".to_string(),
        members: (0..WIDTH)
            .map(|j| LayoutMember {
                name: format!("r{}", j),
                layout: LayoutType::Reg,
            })
            .collect(),
    }
}

fn reg() -> Component {
    Component::build("Reg", vec![Type::Val], Some(LayoutType::Reg), Type::Val, |b| {
        let (x, l) = (b.arg(0), b.arg(1));
        b.store(l, x);
        b.load(l, 0)
    })
    .expect("Reg builds")
}

fn stage() -> Component {
    Component::build("Stage", vec![], Some(row_layout()), Type::unit(), |b| {
        let l = b.arg(0);
        let regs: Vec<_> = (0..WIDTH).map(|j| b.lookup(l, &format!("r{}", j))).collect();
        let mut values = Vec::new();
        for (j, &r) in regs.iter().enumerate() {
            let c = b.const_val(j as u64 + 1);
            values.push(b.construct("Reg", vec![c, r], Type::Val));
        }
        let picked = b.switch(vec![values[0], values[1]], Type::Val, |b, i| {
            let k = b.const_val(10 + i as u64);
            b.mul(values[2], k)
        });
        b.eq(values[3], picked);
        for (j, &r) in regs.iter().enumerate() {
            let prev = b.back("Reg", 1 + j as u64, Some(r), Type::Val);
            b.eq(values[j], prev);
        }
        b.pack(vec![], Type::unit())
    })
    .expect("Stage builds")
}

fn synthetic_module(n: usize) -> Module {
    let layout = LayoutType::Struct {
        name: "TopLayout".to_string(),
        members: (0..n)
            .map(|i| LayoutMember {
                name: format!("s{}", i),
                layout: row_layout(),
            })
            .collect(),
    };
    let top = Component::build("Top", vec![], Some(layout), Type::unit(), |b| {
        let l = b.arg(0);
        for i in 0..n {
            let row = b.lookup(l, &format!("s{}", i));
            b.construct("Stage", vec![row], Type::unit());
        }
        b.pack(vec![], Type::unit())
    })
    .expect("Top builds");
    Module::new(vec![reg(), stage(), top], vec![EntryPoint::new("Top", "data")])
}

fn bench_lower_module(c: &mut Criterion) {
    let mut group = c.benchmark_group("lower_module");
    for n in [1, 8, 32] {
        let module = synthetic_module(n);
        group.bench_with_input(BenchmarkId::new("parallel", n), &module, |b, m| {
            b.iter(|| lower_module(black_box(m), &LowerConfig::default()))
        });
        let serial = LowerConfig {
            parallel: false,
            ..LowerConfig::default()
        };
        group.bench_with_input(BenchmarkId::new("serial", n), &module, |b, m| {
            b.iter(|| lower_module(black_box(m), &serial))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lower_module);
criterion_main!(benches);
