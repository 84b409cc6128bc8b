//! `minic_parser <source.c>`: parses and semantically checks a MiniC
//! source file. Exit 0 and an AST dump on success; exit 1 and a single-line
//! diagnostic on the error stream otherwise.

use std::process::ExitCode;

use clap::Parser;

use minic::error;
use minic::parser::parse_source;
use minic::sema;

#[derive(Parser)]
#[command(name = "minic_parser", about = "Parse and semantically check a MiniC source file")]
struct Args {
    source: std::path::PathBuf,

    /// Raise the tracing filter level (does not affect exit codes).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let source = match std::fs::read_to_string(&args.source) {
        Ok(source) => source,
        Err(err) => {
            error::report(&error::Error::ParseFailure(format!(
                "cannot read {}: {err}",
                args.source.display()
            )));
            return ExitCode::FAILURE;
        }
    };

    let ast = match parse_source(&source) {
        Ok(ast) => ast,
        Err(err) => {
            error::report(&err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = sema::analyze(&ast) {
        error::report(&err);
        return ExitCode::FAILURE;
    }

    print!("{}", ast.print_node());
    ExitCode::SUCCESS
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}
