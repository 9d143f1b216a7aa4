mod demo;
mod problem;

use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};

#[derive(Parser)]
#[command(version, name = "foreman")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an in-process cluster on the sample prime-counting problem.
    Demo,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Command::Demo => demo::run_demo(),
    }
}
