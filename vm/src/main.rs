use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;

#[derive(ClapParser, Debug)]
#[command(name = "selv", version, about = "A Self interpreter", long_about = None)]
struct Cli {
    /// Print the parsed AST and exit
    #[arg(short = 'A', long)]
    dump_ast: bool,

    /// The Self script to execute
    path: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("SELV_LOG"))
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run() {
        eprintln!("{error:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let source = std::fs::read_to_string(&cli.path)
        .with_context(|| format!("reading {}", cli.path.display()))?;

    let script = parser::parse_source(&source).map_err(|error| anyhow!("parse error: {error}"))?;

    if cli.dump_ast {
        print!("{}", parser::dump(&script));
        return Ok(());
    }

    let mut machine = vm::VirtualMachine::new();
    machine
        .execute_entrypoint_script(&script)
        .map_err(|error| anyhow!("runtime error: {error}"))?;
    Ok(())
}
