use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mexec::{Config, Runner, WaitPolicy};

/// Execute the lines of FILE (or stdin) as a single pipeline.
#[derive(Parser, Debug)]
#[command(name = "mexec", version)]
struct Cli {
    /// Input file, one command per line
    file: Option<PathBuf>,

    /// Stop waiting at the first failing stage
    #[arg(long)]
    stop_early: bool,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            input: self.file.clone(),
            policy: if self.stop_early {
                WaitPolicy::StopEarly
            } else {
                WaitPolicy::WaitAll
            },
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !io::stderr().is_terminal() {
        colored::control::set_override(false);
    }

    match Runner::new(cli.config()).run() {
        Ok(result) => exit_code(result.exit_code()),
        Err(e) => {
            eprintln!("{}: {}", "mexec".red().bold(), e);
            exit_code(e.exit_code())
        }
    }
}
