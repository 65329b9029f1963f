//! Dark Chess: a Chinese Dark Chess (Banqi) engine.
//!
//! ## Usage
//!
//! - `dark-chess shell` - Interactive shell (the default)
//! - `dark-chess json [FILE]` - Answer one JSON request from a file or stdin
//! - `dark-chess selfplay` - Let the engine play both sides

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dark_chess::actions::GeneratePolicy;
use dark_chess::config::{DriverConfig, SearchConfig, SearchMode};
use dark_chess::driver::do_search;
use dark_chess::interface::{respond, RequestLog};
use dark_chess::shell::Shell;
use dark_chess::state::GameState;

/// Dark Chess: a Chinese Dark Chess MCTS engine
#[derive(Parser)]
#[command(name = "dark-chess")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Search iterations per decision
    #[arg(long, global = true, value_parser = parse_positive)]
    iterations: Option<usize>,
    /// Search time limit per decision, in milliseconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
    /// Node pool size
    #[arg(long, global = true)]
    nodes: Option<usize>,
    /// Seed for every random choice
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Decision mode
    #[arg(long, global = true, value_enum)]
    mode: Option<Mode>,
    /// Action generation policy
    #[arg(long, global = true, value_enum)]
    policy: Option<Policy>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Tree,
    Flat,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Default,
    Greedy,
    NoFlipping,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive shell
    Shell,
    /// Answer one JSON request
    Json {
        /// Request file; stdin when absent
        file: Option<PathBuf>,
        /// Append every request to a log in this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Append every rejected request to a log in this directory
        #[arg(long)]
        err_dir: Option<PathBuf>,
    },
    /// Let the engine play a game against itself
    Selfplay,
}

fn parse_positive(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(0) => Err("must be positive".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Cli {
    fn driver_config(&self) -> DriverConfig {
        let mut search = SearchConfig::default();
        if let Some(n) = self.iterations {
            search.max_iteration = n;
            search.timeout = Duration::MAX;
        }
        if let Some(ms) = self.timeout {
            search.timeout = Duration::from_millis(ms);
        }
        if let Some(n) = self.nodes {
            search.max_nodes = n;
        }
        search.seed = self.seed;
        DriverConfig {
            mode: match self.mode {
                Some(Mode::Flat) => SearchMode::Flat,
                Some(Mode::Tree) | None => SearchMode::Tree,
            },
            policy: match self.policy {
                Some(Policy::Greedy) => GeneratePolicy::Greedy,
                Some(Policy::NoFlipping) => GeneratePolicy::NoFlipping,
                Some(Policy::Default) | None => GeneratePolicy::Default,
            },
            search,
            ..DriverConfig::default()
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("dark_chess=info"))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    let config = cli.driver_config();

    match cli.command {
        Some(Commands::Json {
            file,
            log_dir,
            err_dir,
        }) => {
            let request = match &file {
                Some(path) => fs::read_to_string(path)
                    .with_context(|| format!("reading request {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("reading request from stdin")?;
                    buf
                }
            };
            let log = RequestLog {
                request_dir: log_dir,
                error_dir: err_dir,
            };
            println!("{}", respond(&request, &config, &log));
        }
        Some(Commands::Selfplay) => selfplay(&config),
        Some(Commands::Shell) | None => {
            let mut shell = Shell::new(config);
            shell
                .run(io::stdin().lock(), io::stdout().lock())
                .context("shell i/o")?;
        }
    }
    Ok(())
}

fn selfplay(config: &DriverConfig) {
    let mut state = GameState::new();
    let mut config = config.clone();
    let mut turn = 0u64;
    while !state.result().is_terminal() {
        // A fixed seed would replay the same rollouts every turn.
        config.search.seed = config.search.seed.map(|s| s.wrapping_add(turn));
        let action = do_search(&state, &config);
        state.to_next(&action);
        turn += 1;
        println!("{turn:4}: {action}");
    }
    info!(turn, result = %state.result(), "selfplay finished");
    println!("\n{state}");
    println!("result: {}", state.result());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(Cli::try_parse_from(["dark-chess", "--iterations", "0"]).is_err());
        let cli = Cli::try_parse_from(["dark-chess", "--iterations", "7", "selfplay"]).unwrap();
        assert_eq!(cli.driver_config().search.max_iteration, 7);
    }

    #[test]
    fn test_parse_positive() {
        assert_eq!(parse_positive("3"), Ok(3));
        assert!(parse_positive("0").is_err());
        assert!(parse_positive("x").is_err());
    }
}
