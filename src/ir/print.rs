//! Human-readable rendering of bodies and functions.

use std::fmt::{self, Write};

use super::body::{BlockId, Body, ValueId};
use super::module::Func;
use super::op::OpKind;

fn value_list(values: &[ValueId]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("%{}", v.0)).collect();
    parts.join(", ")
}

fn write_block(body: &Body, block: BlockId, indent: usize, out: &mut String) -> fmt::Result {
    let pad = "  ".repeat(indent);
    for &op_id in &body.block(block).ops {
        let op = body.op(op_id);
        out.push_str(&pad);
        if !op.results.is_empty() {
            write!(out, "{} = ", value_list(&op.results))?;
        }
        write!(out, "{}", op.kind)?;
        if !op.operands.is_empty() {
            write!(out, " {}", value_list(&op.operands))?;
        }
        if let Some(&r) = op.results.first() {
            write!(out, " : {}", body.value_type(r))?;
        }
        if op.regions.is_empty() {
            out.push('\n');
            continue;
        }
        out.push_str(" {\n");
        let arms = op.kind == OpKind::Switch;
        for (i, &region) in op.regions.iter().enumerate() {
            if arms {
                writeln!(out, "{}  arm {} {{", pad, i)?;
                write_block(body, region, indent + 2, out)?;
                writeln!(out, "{}  }}", pad)?;
            } else {
                write_block(body, region, indent + 1, out)?;
            }
        }
        writeln!(out, "{}}}", pad)?;
    }
    Ok(())
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_block(self, self.entry(), 1, &mut out)?;
        f.write_str(&out)
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .body
            .args()
            .iter()
            .map(|&v| format!("%{}: {}", v.0, self.body.value_type(v)))
            .collect();
        write!(f, "func {}({})", self.name, args.join(", "))?;
        if let Some(result) = &self.result {
            write!(f, " -> {}", result)?;
        }
        writeln!(f, " {{")?;
        write!(f, "{}", self.body)?;
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{Builder, Type};

    #[test]
    fn prints_nested_regions() {
        let mut b = Builder::new(vec![Type::Val, Type::Val]);
        let (s0, s1) = (b.arg(0), b.arg(1));
        let out = b.switch(vec![s0, s1], Type::Val, |b, i| b.const_val(10 * (i as u64 + 1)));
        b.if_(s0, |b| b.equal_zero(out));
        b.ret(vec![out]);
        let body = b.finish().unwrap();

        let text = body.to_string();
        assert!(text.contains("switch %0, %1 : val {"));
        assert!(text.contains("    arm 1 {\n      %"));
        assert!(text.contains("if %0 {\n    equal_zero"));
        assert!(text.trim_end().ends_with("return %4"));
    }
}
