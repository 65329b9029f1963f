//! Dark Chess: a Chinese Dark Chess (Banqi) engine.
//!
//! This crate provides a bitboard model of Banqi, where pieces start
//! face-down and are revealed during play, and a generic Monte Carlo Tree
//! Search that treats reveals as chance events.
//!
//! ## Modules
//!
//! - [`constants`] - Board geometry, piece counts and search defaults
//! - [`bitboard`] - 32-square bit sets
//! - [`piece`] - Players, ranks, piece types and squares
//! - [`hidden`] - Counter of identities still face-down
//! - [`state`] - Game state, actions and results
//! - [`actions`] - Legal action generation
//! - [`arena`] - Fixed-capacity node pool
//! - [`mcts`] - Game-agnostic Monte Carlo Tree Search
//! - [`playout`] - Random game simulation
//! - [`driver`] - Picks one action for a position
//! - [`config`] - Search and driver settings
//! - [`interface`] - JSON request/response layer
//! - [`shell`] - Interactive text shell
//!
//! ## Example
//!
//! ```
//! use dark_chess::config::{DriverConfig, SearchConfig};
//! use dark_chess::driver::do_search;
//! use dark_chess::state::GameState;
//!
//! let state = GameState::new();
//! let config = DriverConfig {
//!     search: SearchConfig {
//!         max_iteration: 200,
//!         seed: Some(1),
//!         ..SearchConfig::default()
//!     },
//!     ..DriverConfig::default()
//! };
//! let action = do_search(&state, &config);
//! println!("Best action: {action}");
//! let next = state.apply(&action);
//! assert!(next.exist_undecided_piece());
//! ```

pub mod actions;
pub mod arena;
pub mod bitboard;
pub mod config;
pub mod constants;
pub mod driver;
pub mod hidden;
pub mod interface;
pub mod mcts;
pub mod piece;
pub mod playout;
pub mod shell;
pub mod state;
