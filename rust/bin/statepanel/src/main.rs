//! `statepanel`: drive a producer and its observer panel from the terminal.
//!
//! Usage:
//!   statepanel [-c <config.toml>] [--namespace <ns>] demo
//!   statepanel [-c <config.toml>] [--namespace <ns>] run '<cmd>' '<cmd>' ...
//!   statepanel [-c <config.toml>] [--namespace <ns>] repl
//!
//! Commands (for `run` and `repl`):
//!   set <json-object>   merge into the producer's state
//!   reset               press the panel's reset control
//!   mount | unmount     (re)mount or tear down the producer
//!   focus | blur        make the panel active or inactive
//!   show                print the panel

mod session;

use std::io::BufRead;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use statesync::{MemoryChannel, SyncConfig};
use tracing::info;

use session::Session;

/// Live state panel driver.
#[derive(Parser, Debug)]
#[command(name = "statepanel", about = "Mirror producer state into an observer panel")]
struct Cli {
    /// Path to config file.
    #[arg(short = 'c', long = "config", default_value = "statesync.toml")]
    config: PathBuf,

    /// Channel namespace (overrides the config file).
    #[arg(long = "namespace")]
    namespace: Option<String>,

    /// Initial producer state as a JSON object.
    #[arg(long = "initial", default_value = r#"{"count":0}"#)]
    initial: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the counter walkthrough: mount, increment, reset, unmount.
    Demo,

    /// Run the given commands in order.
    Run {
        /// Commands, one per argument.
        commands: Vec<String>,
    },

    /// Read commands from stdin.
    Repl,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = SyncConfig::load(&cli.config)?;
    if let Some(ns) = cli.namespace {
        config.namespace = ns;
    }
    let topics = config.topics()?;
    info!(namespace = topics.namespace(), "starting session");

    let initial = session::parse_object(&cli.initial)?;
    let mut session = Session::new(MemoryChannel::global(), &config, topics, initial);

    match cli.command {
        Commands::Demo => {
            for command in ["show", "set {\"count\":1}", "set {\"count\":2}", "reset", "unmount"] {
                run_one(&mut session, command)?;
            }
        }
        Commands::Run { commands } => {
            for command in &commands {
                run_one(&mut session, command)?;
            }
        }
        Commands::Repl => {
            for line in std::io::stdin().lock().lines() {
                let line = line?;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "quit" || line == "exit" {
                    break;
                }
                if let Err(e) = run_one(&mut session, line) {
                    eprintln!("error: {e}");
                }
            }
        }
    }
    Ok(())
}

fn run_one(session: &mut Session, command: &str) -> anyhow::Result<()> {
    println!("> {command}");
    session.execute(command)?;
    print!("{}", session.render());
    Ok(())
}
