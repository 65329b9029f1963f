//! Line-based interactive shell for manual play and debugging.
//!
//! Every command answers `= message` on success and `? message` on failure.
//!
//! ## Commands
//!
//! - `show` - Print the board
//! - `actions` - List the legal actions with their indices and weights
//! - `apply <i>` - Play the action with index `i`
//! - `random` - Play a random legal action
//! - `search [n]` - Let the tree search play, optionally with `n` iterations
//! - `flat [n]` - Let flat Monte Carlo play, optionally with `n` rollouts
//! - `result` - Print the game result
//! - `reset` - Start a new game
//! - `help` - List the commands
//! - `quit` - Leave the shell

use std::io::{self, BufRead, Write};

use fastrand::Rng;
use tracing::debug;

use crate::actions::legal_actions;
use crate::config::{DriverConfig, SearchMode};
use crate::driver::do_search;
use crate::state::{Action, GameState};

const KNOWN_COMMANDS: &[&str] = &[
    "actions", "apply", "flat", "help", "quit", "random", "reset", "result", "search", "show",
];

/// Shell session: one game and the engine settings.
pub struct Shell {
    state: GameState,
    config: DriverConfig,
    rng: Rng,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new(DriverConfig::default())
    }
}

impl Shell {
    pub fn new(config: DriverConfig) -> Self {
        let rng = config.search.rng();
        Self {
            state: GameState::new(),
            config,
            rng,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Read commands from `input` until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            let command = parts[0].to_lowercase();
            let (success, message) = self.execute(&command, &parts[1..]);
            let prefix = if success { '=' } else { '?' };
            writeln!(output, "{prefix} {message}\n")?;
            output.flush()?;
            if command == "quit" {
                break;
            }
        }
        Ok(())
    }

    fn play(&mut self, action: Action) -> String {
        debug!(%action, "shell plays");
        self.state.to_next(&action);
        let result = self.state.result();
        if result.is_terminal() {
            format!("{action}\n{result}")
        } else {
            action.to_string()
        }
    }

    fn game_over(&self) -> Option<(bool, String)> {
        let result = self.state.result();
        result
            .is_terminal()
            .then(|| (false, format!("game over: {result}")))
    }

    fn parse_count(args: &[&str]) -> Result<Option<usize>, String> {
        match args.first() {
            None => Ok(None),
            Some(arg) => match arg.parse::<usize>() {
                Ok(0) => Err("count must be positive".to_string()),
                Ok(n) => Ok(Some(n)),
                Err(_) => Err(format!("invalid count: {arg}")),
            },
        }
    }

    /// Execute one command and return (success, response).
    pub fn execute(&mut self, command: &str, args: &[&str]) -> (bool, String) {
        match command {
            "help" => (true, KNOWN_COMMANDS.join(" ")),

            "quit" => (true, String::new()),

            "show" => (true, format!("\n{}", self.state)),

            "reset" => {
                self.state = GameState::new();
                (true, String::new())
            }

            "result" => (true, self.state.result().to_string()),

            "actions" => {
                if let Some(over) = self.game_over() {
                    return over;
                }
                let actions = legal_actions(&self.state, self.config.policy);
                let lines: Vec<String> = actions
                    .entries()
                    .iter()
                    .enumerate()
                    .map(|(i, (action, weight))| format!("{i}: {action} (weight {weight})"))
                    .collect();
                (true, lines.join("\n"))
            }

            "apply" => {
                if let Some(over) = self.game_over() {
                    return over;
                }
                let Some(arg) = args.first() else {
                    return (false, "missing argument".to_string());
                };
                let Ok(index) = arg.parse::<usize>() else {
                    return (false, format!("invalid index: {arg}"));
                };
                let actions = legal_actions(&self.state, self.config.policy);
                if index >= actions.len() {
                    return (
                        false,
                        format!("index {index} out of range ({} actions)", actions.len()),
                    );
                }
                let action = *actions.action(index);
                (true, self.play(action))
            }

            "random" => {
                if let Some(over) = self.game_over() {
                    return over;
                }
                let actions = legal_actions(&self.state, self.config.policy);
                let action = *actions.random_action(&mut self.rng);
                (true, self.play(action))
            }

            "search" | "flat" => {
                if let Some(over) = self.game_over() {
                    return over;
                }
                let count = match Self::parse_count(args) {
                    Ok(count) => count,
                    Err(e) => return (false, e),
                };
                let mut config = self.config.clone();
                config.search.seed = Some(self.rng.u64(..));
                if command == "search" {
                    config.mode = SearchMode::Tree;
                    if let Some(n) = count {
                        config.search.max_iteration = n;
                    }
                } else {
                    config.mode = SearchMode::Flat;
                    if let Some(n) = count {
                        config.flat_simulations = n;
                    }
                }
                let action = do_search(&self.state, &config);
                (true, self.play(action))
            }

            _ => (false, format!("unknown command: {command}")),
        }
    }
}
