pub mod lower;
pub mod needs;
pub mod taps;

use std::path::{Path, PathBuf};
use std::process;

use clap::Args;

use tapline::ir::Module;
use tapline::{ConstraintMode, LowerConfig, LowerError};

/// Flags shared by every command that runs the pipeline.
#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Config file (default: nearest tapline.json above the input)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Drop constraints from execute functions
    #[arg(long)]
    pub ndebug: bool,
    /// Bound on rewrite sweeps per pass
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,
    /// Generate per-component functions on one thread
    #[arg(long)]
    pub serial: bool,
    /// Also lower test entry points
    #[arg(long)]
    pub tests: bool,
}

/// Load the module or exit with its diagnostic.
pub fn load_module(input: &Path) -> Module {
    match tapline::load_module(input) {
        Ok(module) => module,
        Err(diag) => {
            eprintln!("{}", diag.render_plain());
            process::exit(1);
        }
    }
}

/// Resolve the config file, then apply command-line overrides.
pub fn resolve_config(input: &Path, args: &ConfigArgs) -> LowerConfig {
    let path = args.config.clone().or_else(|| {
        let dir = input.parent().unwrap_or(Path::new("."));
        LowerConfig::find(dir)
    });
    let mut config = match path {
        Some(path) => match LowerConfig::load(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "config loaded");
                config
            }
            Err(diag) => {
                eprintln!("{}", diag.render_plain());
                process::exit(1);
            }
        },
        None => LowerConfig::default(),
    };
    if args.ndebug {
        config.constraints = ConstraintMode::Relaxed;
    }
    if let Some(n) = args.max_iterations {
        if n == 0 {
            eprintln!("error: --max-iterations must be positive");
            process::exit(1);
        }
        config.max_rewrite_iterations = n;
    }
    if args.serial {
        config.parallel = false;
    }
    if args.tests {
        config.include_test_entries = true;
    }
    config
}

/// Report a lowering failure and exit.
pub fn fail(err: &LowerError, module: &Module) -> ! {
    tapline::report_error(err, module);
    process::exit(1);
}

/// Write `text` to `output`, or stdout when there is none.
pub fn write_output(output: Option<&Path>, text: &str) {
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                process::exit(1);
            }
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
}
