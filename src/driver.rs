//! Decision driver: picks one action for a dark chess position.
//!
//! [`DarkChess`] plugs the game into the generic search. [`do_search`] is
//! the entry point used by the shell and the JSON layer.

use fastrand::Rng;
use tracing::{debug, info};

use crate::actions::{legal_actions, ActionSet, GeneratePolicy};
use crate::config::{DriverConfig, SearchMode};
use crate::mcts::{MctsSearch, SearchGame};
use crate::playout::random_playout;
use crate::state::{Action, GameResult, GameState};

/// Dark chess as seen by the tree search.
#[derive(Debug, Clone, Copy, Default)]
pub struct DarkChess {
    pub policy: GeneratePolicy,
}

impl SearchGame for DarkChess {
    type State = GameState;
    type Action = Action;
    type Outcome = GameResult;

    fn next_state(&self, state: &GameState, action: &Action) -> GameState {
        state.apply(action)
    }

    fn make_actions(&self, state: &GameState, actions: &mut Vec<(Action, u32)>) {
        actions.extend(legal_actions(state, self.policy).into_entries());
    }

    fn outcome(&self, state: &GameState) -> Option<GameResult> {
        let result = state.result();
        result.is_terminal().then_some(result)
    }

    fn is_chance(&self, state: &GameState) -> bool {
        state.exist_undecided_piece()
    }

    fn is_win(&self, state: &GameState, outcome: &GameResult) -> bool {
        outcome.winner() == Some(state.last_mover())
    }
}

/// Choose an action for the side to move.
///
/// Panics if the game is already over.
pub fn do_search(state: &GameState, config: &DriverConfig) -> Action {
    assert!(
        !state.result().is_terminal(),
        "no decision to make in a finished game"
    );
    let actions = legal_actions(state, config.policy);
    let mut rng = config.search.rng();

    if actions.len() == 1 {
        let action = *actions.action(0);
        info!(%action, "only one legal action");
        return action;
    }

    if state.exist_undecided_piece() {
        let action = *actions.random_action(&mut rng);
        info!(%action, "pending flip resolved by sampling");
        return action;
    }

    match config.mode {
        SearchMode::Tree => {
            let game = DarkChess {
                policy: config.policy,
            };
            let mut search = MctsSearch::new(game, config.search.clone());
            let report = search.search(state.clone());
            info!(
                action = %report.action,
                iterations = report.iterations,
                nodes = report.nodes,
                winrate = report.winrate().unwrap_or(0.0),
                "tree search decision"
            );
            report.action
        }
        SearchMode::Flat => {
            let action = flat_monte_carlo(
                state,
                &actions,
                config.flat_simulations,
                config.policy,
                config.search.rollout_limit,
                &mut rng,
            );
            info!(%action, "flat monte carlo decision");
            action
        }
    }
}

/// Rollout each root action `1 + budget / actions.len()` times and keep the
/// one that won most often for the side to move.
pub fn flat_monte_carlo(
    state: &GameState,
    actions: &ActionSet,
    budget: usize,
    policy: GeneratePolicy,
    rollout_limit: usize,
    rng: &mut Rng,
) -> Action {
    assert!(!actions.is_empty(), "flat search over an empty action set");
    let player = state.next_player();
    let per_action = 1 + budget / actions.len();

    let mut best = *actions.action(0);
    let mut best_wins = 0;
    for action in actions.iter() {
        let next = state.apply(action);
        let wins = (0..per_action)
            .filter(|_| random_playout(&next, policy, rollout_limit, rng).winner() == Some(player))
            .count();
        debug!(%action, wins, rollouts = per_action, "flat rollouts");
        if wins > best_wins {
            best = *action;
            best_wins = wins;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::hidden::HiddenPieceCounter;
    use crate::piece::{Location, PieceType, Player};
    use std::time::Duration;

    fn quick_config(mode: SearchMode) -> DriverConfig {
        DriverConfig {
            mode,
            flat_simulations: 200,
            search: SearchConfig {
                max_iteration: 300,
                timeout: Duration::from_secs(30),
                max_nodes: 10_000,
                seed: Some(11),
                ..SearchConfig::default()
            },
            ..DriverConfig::default()
        }
    }

    #[test]
    fn test_single_action_needs_no_budget() {
        // The pawn cannot take the guard below it, so it can only slide right.
        let state = GameState::from_pieces(
            &[
                (Location::from_xy(0, 0), PieceType::RedPawn),
                (Location::from_xy(0, 1), PieceType::BlackGuard),
            ],
            HiddenPieceCounter::empty(),
            Player::Red,
        );
        let config = DriverConfig {
            search: SearchConfig {
                max_iteration: 0,
                ..SearchConfig::default()
            },
            ..DriverConfig::default()
        };
        assert_eq!(
            do_search(&state, &config),
            Action::moving(
                Location::from_xy(0, 0),
                Location::from_xy(1, 0),
                PieceType::RedPawn
            )
        );
    }

    #[test]
    fn test_tree_search_takes_last_piece() {
        // Taking the last black piece ends the game.
        let state = GameState::from_pieces(
            &[
                (Location::from_xy(0, 0), PieceType::RedKing),
                (Location::from_xy(1, 0), PieceType::BlackGuard),
            ],
            HiddenPieceCounter::empty(),
            Player::Red,
        );
        let action = do_search(&state, &quick_config(SearchMode::Tree));
        assert_eq!(
            action,
            Action::capture(
                Location::from_xy(0, 0),
                Location::from_xy(1, 0),
                PieceType::RedKing
            )
        );
    }

    #[test]
    fn test_flat_search_takes_winning_capture() {
        let state = GameState::from_pieces(
            &[
                (Location::from_xy(0, 0), PieceType::RedKing),
                (Location::from_xy(1, 0), PieceType::BlackGuard),
            ],
            HiddenPieceCounter::empty(),
            Player::Red,
        );
        let action = do_search(&state, &quick_config(SearchMode::Flat));
        assert_eq!(action.kind, crate::state::ActionKind::Capture);
    }

    #[test]
    fn test_pending_flip_sampled_from_hidden() {
        let mut state = GameState::new();
        state.to_next(&Action::flip_request(Location::new(5)));
        let action = do_search(&state, &quick_config(SearchMode::Tree));
        assert!(action.is_chance());
        assert_eq!(action.source, Location::new(5));
        assert!(state.hidden_pieces().count(action.piece) > 0);
    }

    #[test]
    fn test_flat_tie_keeps_first_action() {
        let state = GameState::new();
        let actions = legal_actions(&state, GeneratePolicy::Default);
        let mut rng = Rng::with_seed(2);
        // Zero wins everywhere when rollouts are cut off immediately.
        let action = flat_monte_carlo(&state, &actions, 64, GeneratePolicy::Default, 0, &mut rng);
        assert_eq!(action, *actions.action(0));
    }

    #[test]
    fn test_is_win_credits_last_mover() {
        let game = DarkChess::default();
        let state = GameState::from_pieces(
            &[(Location::new(0), PieceType::RedKing)],
            HiddenPieceCounter::empty(),
            Player::Black,
        );
        assert!(game.is_win(&state, &GameResult::RedWin));
        assert!(!game.is_win(&state, &GameResult::BlackWin));
        assert!(!game.is_win(&state, &GameResult::Draw));
    }
}
