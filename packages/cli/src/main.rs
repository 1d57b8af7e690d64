mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{convert, replay, ConvertArgs, ReplayArgs};
use tracing_subscriber::EnvFilter;

/// Folio CLI - run documents through the editing engine
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding folio.config.json (defaults to current directory)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load an HTML file and print the model and data it becomes
    Convert(ConvertArgs),

    /// Load an HTML file, execute a command script and print the result
    Replay(ReplayArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("FOLIO_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => match std::env::current_dir() {
            Ok(dir) => dir.display().to_string(),
            Err(err) => fail(err.into()),
        },
    };

    let result = match cli.command {
        Command::Convert(args) => convert(args, &config_dir),
        Command::Replay(args) => replay(args, &config_dir),
    };

    if let Err(err) = result {
        fail(err);
    }
}

fn fail(err: anyhow::Error) -> ! {
    eprintln!();
    eprintln!("{} {:#}", "Error:".red().bold(), err);
    eprintln!();
    std::process::exit(1);
}
