//! `optimizer <module.ll>`: loads a textual IR module, runs the fixpoint
//! optimizer, and dumps the optimized module. Exit 0 on success; exit 1 if
//! the input module cannot be loaded.

use std::process::ExitCode;

use clap::Parser;

use minic::error;
use minic::ir::text;
use minic::optim;

#[derive(Parser)]
#[command(name = "optimizer", about = "Run the fixpoint optimizer over a textual IR module")]
struct Args {
    module: std::path::PathBuf,

    /// Raise the tracing filter level (does not affect exit codes).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let source = match std::fs::read_to_string(&args.module) {
        Ok(source) => source,
        Err(err) => {
            error::report(&error::Error::IRLoadFailure(format!(
                "cannot read {}: {err}",
                args.module.display()
            )));
            return ExitCode::FAILURE;
        }
    };

    let mut module = match text::parse(&source) {
        Ok(module) => module,
        Err(err) => {
            error::report(&err);
            return ExitCode::FAILURE;
        }
    };

    optim::optimize(&mut module);
    print!("{}", text::print(&module));
    ExitCode::SUCCESS
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}
