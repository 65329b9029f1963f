//! Monte Carlo playouts (random game simulation).
//!
//! A playout samples actions with the default policy until the game ends.
//! Pending flips are resolved by drawing from the hidden pieces, so a
//! playout never peeks at anything a player could not know.

use fastrand::Rng;
use tracing::debug;

use crate::actions::{legal_actions, GeneratePolicy};
use crate::mcts::SearchGame;
use crate::state::{GameResult, GameState};

/// Play `game` out from `state` with its default policy.
///
/// Returns `None` when the game is still running after `limit` actions.
pub fn rollout<G: SearchGame + ?Sized>(
    game: &G,
    state: &G::State,
    limit: usize,
    rng: &mut Rng,
) -> Option<G::Outcome> {
    let mut state = state.clone();
    let mut actions = Vec::new();
    for _ in 0..limit {
        if let Some(outcome) = game.outcome(&state) {
            return Some(outcome);
        }
        actions.clear();
        game.make_actions(&state, &mut actions);
        let i = game.default_policy(&actions, rng);
        state = game.next_state(&state, &actions[i].0);
    }
    if let Some(outcome) = game.outcome(&state) {
        return Some(outcome);
    }
    debug!(limit, "rollout exceeded its action limit, discarded");
    None
}

/// Random playout of a dark chess position.
///
/// Plays until the game is decided; an overlong game counts as a draw.
pub fn random_playout(
    state: &GameState,
    policy: GeneratePolicy,
    limit: usize,
    rng: &mut Rng,
) -> GameResult {
    let mut state = state.clone();
    for _ in 0..limit {
        let result = state.result();
        if result.is_terminal() {
            return result;
        }
        let actions = legal_actions(&state, policy);
        let action = *actions.random_action(rng);
        state.to_next(&action);
    }
    match state.result() {
        GameResult::Unfinished => {
            debug!(limit, "playout exceeded its action limit, scored as a draw");
            GameResult::Draw
        }
        result => result,
    }
}
