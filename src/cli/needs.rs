use std::path::PathBuf;

use clap::Args;

use super::{fail, load_module};

#[derive(Args)]
pub struct NeedsArgs {
    /// Input module (JSON)
    pub input: PathBuf,
}

pub fn cmd_needs(args: NeedsArgs) {
    let module = load_module(&args.input);
    let needs = match tapline::analyze_needs(&module) {
        Ok(needs) => needs,
        Err(err) => fail(&err, &module),
    };

    for name in needs.names() {
        println!("{}", name);
        for site in needs.required_by(name) {
            println!("  required at {}..{}", site.span.start, site.span.end);
        }
    }
    for name in needs.skipped() {
        println!("{} (no lookback: has parameters and no layout)", name);
    }
    eprintln!("{} component(s) need a lookback function", needs.len());
}
