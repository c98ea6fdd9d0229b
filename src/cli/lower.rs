use std::fmt::Write as _;
use std::path::PathBuf;
use std::process;

use clap::{Args, ValueEnum};
use serde::Serialize;

use tapline::ir::Func;
use tapline::lower::TapTable;
use tapline::Lowered;

use super::{fail, load_module, resolve_config, write_output, ConfigArgs};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Emit {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct LowerArgs {
    /// Input module (JSON)
    pub input: PathBuf,
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Output format
    #[arg(long, value_enum, default_value_t = Emit::Text)]
    pub emit: Emit,
    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct LoweredJson<'a> {
    functions: Vec<&'a Func>,
    taps: &'a TapTable,
    fingerprint: String,
}

fn render_text(lowered: &Lowered) -> String {
    let mut out = String::new();
    for func in lowered.functions() {
        let _ = writeln!(out, "{}", func);
    }
    let _ = writeln!(out, "// taps ({})", lowered.taps.fingerprint());
    let _ = write!(out, "{}", lowered.taps);
    out
}

fn render_json(lowered: &Lowered) -> String {
    let doc = LoweredJson {
        functions: lowered.functions().collect(),
        taps: &lowered.taps,
        fingerprint: lowered.taps.fingerprint().to_hex().to_string(),
    };
    match serde_json::to_string_pretty(&doc) {
        Ok(mut json) => {
            json.push('\n');
            json
        }
        Err(e) => {
            eprintln!("error: cannot serialize output: {}", e);
            process::exit(1);
        }
    }
}

pub fn cmd_lower(args: LowerArgs) {
    let module = load_module(&args.input);
    let config = resolve_config(&args.input, &args.config);
    let lowered = match tapline::lower_module(&module, &config) {
        Ok(lowered) => lowered,
        Err(err) => fail(&err, &module),
    };
    let text = match args.emit {
        Emit::Text => render_text(&lowered),
        Emit::Json => render_json(&lowered),
    };
    write_output(args.output.as_deref(), &text);
}
