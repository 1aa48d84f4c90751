use std::process;

use wizard_core::cli::{run_cli, CliOptions};

fn main() {
    let result = CliOptions::from_args(std::env::args().skip(1)).and_then(run_cli);
    if let Err(err) = result {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}
