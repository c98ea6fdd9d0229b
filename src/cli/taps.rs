use std::path::PathBuf;

use clap::Args;

use super::{fail, load_module, resolve_config, ConfigArgs};

#[derive(Args)]
pub struct TapsArgs {
    /// Input module (JSON)
    pub input: PathBuf,
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Show the full 256-bit fingerprint instead of the short form
    #[arg(long)]
    pub full: bool,
}

pub fn cmd_taps(args: TapsArgs) {
    let module = load_module(&args.input);
    let config = resolve_config(&args.input, &args.config);
    let lowered = match tapline::lower_module(&module, &config) {
        Ok(lowered) => lowered,
        Err(err) => fail(&err, &module),
    };

    let hex = lowered.taps.fingerprint().to_hex();
    let fingerprint = if args.full { &hex[..] } else { &hex[..16] };
    eprintln!("Taps: {} {}", lowered.taps.len(), fingerprint);
    print!("{}", lowered.taps);
}
