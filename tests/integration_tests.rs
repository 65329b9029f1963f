//! Integration tests for dark-chess
//!
//! Positions are set up square by square, then checked against the rules
//! through the public API only.

use std::time::Duration;

use fastrand::Rng;

use dark_chess::actions::{legal_actions, ActionSet, GeneratePolicy};
use dark_chess::config::{DriverConfig, SearchConfig, SearchMode};
use dark_chess::driver::do_search;
use dark_chess::hidden::HiddenPieceCounter;
use dark_chess::interface::{parse_request, respond, state_to_json, RequestLog, NULL_RESPONSE};
use dark_chess::piece::{Location, PieceType, Player};
use dark_chess::state::{Action, ActionKind, GameResult, GameState};

// =============================================================================
// Helper functions for setting up test positions
// =============================================================================

/// Place pieces given as (coordinate, code) pairs, e.g. `("a1", 'K')`.
/// Every other square is empty and nothing is hidden.
fn setpos(pieces: &[(&str, char)], next: Player) -> GameState {
    setpos_hidden(pieces, HiddenPieceCounter::empty(), next)
}

fn setpos_hidden(pieces: &[(&str, char)], hidden: HiddenPieceCounter, next: Player) -> GameState {
    let placed: Vec<(Location, PieceType)> = pieces
        .iter()
        .map(|&(coord, code)| {
            (
                Location::parse(coord).unwrap(),
                PieceType::from_code(code).unwrap(),
            )
        })
        .collect();
    GameState::from_pieces(&placed, hidden, next)
}

fn loc(coord: &str) -> Location {
    Location::parse(coord).unwrap()
}

fn captures_from(set: &ActionSet, from: &str) -> Vec<Action> {
    set.iter()
        .filter(|a| a.kind == ActionKind::Capture && a.source == loc(from))
        .copied()
        .collect()
}

fn quick_config(iterations: usize) -> DriverConfig {
    DriverConfig {
        search: SearchConfig {
            max_iteration: iterations,
            timeout: Duration::from_secs(60),
            max_nodes: 20_000,
            seed: Some(3),
            ..SearchConfig::default()
        },
        ..DriverConfig::default()
    }
}

// =============================================================================
// Initial position
// =============================================================================

#[test]
fn test_initial_state() {
    let state = GameState::new();
    assert_eq!(state.piece_board(PieceType::Unknown).count(), 32);
    assert_eq!(state.hidden_pieces().total(), 32);
    assert_eq!(state.next_player(), Player::Red);
    assert_eq!(state.no_capture_count(), 0);
    assert!(state.is_consistent());

    let actions = legal_actions(&state, GeneratePolicy::Default);
    assert_eq!(actions.len(), 32);
    assert!(actions.iter().all(|a| a.kind == ActionKind::FlippingRequest));
    assert!(actions.entries().iter().all(|&(_, w)| w == 1));
    assert_eq!(actions.total_weight(), 32);
}

// =============================================================================
// Flips
// =============================================================================

#[test]
fn test_flip_outcomes_weighted_by_hidden_counts() {
    let mut state = GameState::new();
    state.to_next(&Action::flip_request(loc("c2")));
    let actions = legal_actions(&state, GeneratePolicy::Default);
    assert_eq!(actions.len(), 14);
    assert_eq!(actions.total_weight(), state.hidden_pieces().total());
    for &(action, weight) in actions.entries() {
        assert_eq!(action.kind, ActionKind::FlippedResult);
        assert_eq!(action.source, loc("c2"));
        assert_eq!(weight, state.hidden_pieces().count(action.piece) as u32);
    }
}

#[test]
fn test_flip_result_passes_turn() {
    let mut state = GameState::new();
    state.to_next(&Action::flip_request(loc("a1")));
    assert_eq!(state.next_player(), Player::Red);
    assert_eq!(state.last_mover(), Player::Red);

    state.to_next(&Action::flipped(loc("a1"), PieceType::RedPawn));
    assert_eq!(state.next_player(), Player::Black);
    assert_eq!(state.last_mover(), Player::Red);
    assert_eq!(state.hidden_pieces().count(PieceType::RedPawn), 4);
    assert_eq!(state.no_capture_count(), 1);
    assert!(state.is_consistent());
}

// =============================================================================
// Moves and captures
// =============================================================================

#[test]
fn test_lone_pawn_moves() {
    let state = setpos(&[("a1", 'P'), ("h4", 'k')], Player::Red);
    let actions = legal_actions(&state, GeneratePolicy::Default);
    assert!(actions.contains(&Action::moving(
        Location::new(0),
        Location::new(1),
        PieceType::RedPawn
    )));
    assert!(captures_from(&actions, "a1").is_empty());
    assert_eq!(actions.len(), 2);
}

#[test]
fn test_pawn_takes_king_not_the_reverse() {
    let state = setpos(&[("a1", 'P'), ("b1", 'k')], Player::Red);
    let actions = legal_actions(&state, GeneratePolicy::Default);
    assert_eq!(captures_from(&actions, "a1").len(), 1);

    let state = setpos(&[("a1", 'p'), ("b1", 'K')], Player::Red);
    let actions = legal_actions(&state, GeneratePolicy::Default);
    assert!(captures_from(&actions, "b1").is_empty());
}

#[test]
fn test_capture_counts_and_resets_no_capture() {
    let mut state = setpos(&[("a1", 'R'), ("b1", 'n'), ("h4", 'k')], Player::Red);
    state.set_no_capture_count(7);
    let before = state.piece_count();
    let capture = captures_from(&legal_actions(&state, GeneratePolicy::Default), "a1")[0];
    let next = state.apply(&capture);
    assert_eq!(next.piece_count(), before - 1);
    assert_eq!(next.no_capture_count(), 0);
    assert_eq!(next.piece_at(loc("b1")), PieceType::RedRook);
    assert_eq!(
        next.captured(PieceType::BlackKnight),
        state.captured(PieceType::BlackKnight) + 1
    );
    assert!(next.is_consistent());
}

#[test]
fn test_equal_ranks_remove_each_other() {
    let state = setpos(&[("a1", 'R'), ("b1", 'r'), ("h4", 'k'), ("h1", 'K')], Player::Red);
    let capture = captures_from(&legal_actions(&state, GeneratePolicy::Default), "a1")[0];
    assert_eq!(capture.piece, PieceType::Empty);
    let next = state.apply(&capture);
    assert_eq!(next.piece_count(), state.piece_count() - 2);
    assert_eq!(next.piece_at(loc("a1")), PieceType::Empty);
    assert_eq!(next.piece_at(loc("b1")), PieceType::Empty);
    assert!(next.is_consistent());
}

#[test]
fn test_cannon_needs_exactly_one_screen() {
    let screened = setpos(&[("a1", 'C'), ("b1", 'p'), ("d1", 'g')], Player::Red);
    let flies = captures_from(&legal_actions(&screened, GeneratePolicy::Default), "a1");
    assert_eq!(flies.len(), 1);
    assert_eq!(flies[0].dest, loc("d1"));

    let open = setpos(&[("a1", 'C'), ("d1", 'g')], Player::Red);
    assert!(captures_from(&legal_actions(&open, GeneratePolicy::Default), "a1").is_empty());

    let double = setpos(&[("a1", 'C'), ("b1", 'p'), ("c1", 'P'), ("d1", 'g')], Player::Red);
    assert!(captures_from(&legal_actions(&double, GeneratePolicy::Default), "a1").is_empty());
}

#[test]
fn test_cannon_never_captures_adjacent() {
    let state = setpos(&[("a1", 'C'), ("b1", 'p')], Player::Red);
    assert!(captures_from(&legal_actions(&state, GeneratePolicy::Default), "a1").is_empty());
}

// =============================================================================
// Generation policies
// =============================================================================

#[test]
fn test_greedy_keeps_only_captures() {
    let state = setpos(&[("a1", 'P'), ("b1", 'k'), ("h4", 'g')], Player::Red);
    let actions = legal_actions(&state, GeneratePolicy::Greedy);
    assert!(actions.iter().all(|a| a.kind == ActionKind::Capture));
    assert!(!actions.is_empty());
}

#[test]
fn test_no_flipping_falls_back_to_flips() {
    let state = GameState::new();
    let actions = legal_actions(&state, GeneratePolicy::NoFlipping);
    assert_eq!(actions.len(), 32);

    let mut hidden = HiddenPieceCounter::empty();
    hidden.add(PieceType::BlackPawn);
    let state = setpos_hidden(&[("a1", 'P'), ("h4", '?')], hidden, Player::Red);
    let actions = legal_actions(&state, GeneratePolicy::NoFlipping);
    assert!(actions.iter().all(|a| a.kind == ActionKind::Move));
}

// =============================================================================
// Results
// =============================================================================

#[test]
fn test_elimination_beats_no_capture_draw() {
    let mut state = setpos(&[("a1", 'K')], Player::Black);
    state.set_no_capture_count(50);
    assert_eq!(state.result(), GameResult::RedWin);
}

#[test]
fn test_no_capture_draw() {
    let mut state = setpos(&[("a1", 'K'), ("h4", 'k')], Player::Red);
    state.set_no_capture_count(20);
    assert_eq!(state.result(), GameResult::Unfinished);
    state.set_no_capture_count(21);
    assert_eq!(state.result(), GameResult::Draw);
}

#[test]
fn test_hidden_pieces_keep_side_alive() {
    let mut hidden = HiddenPieceCounter::empty();
    hidden.add(PieceType::BlackGuard);
    let state = setpos_hidden(&[("a1", 'K'), ("h4", '?')], hidden, Player::Black);
    assert_eq!(state.result(), GameResult::Unfinished);
}

// =============================================================================
// Reachable states
// =============================================================================

#[test]
fn test_random_games_stay_consistent() {
    let mut rng = Rng::with_seed(2024);
    for _ in 0..30 {
        let mut state = GameState::new();
        let mut steps = 0;
        while !state.result().is_terminal() {
            let actions = legal_actions(&state, GeneratePolicy::Default);
            assert!(!actions.is_empty());
            let action = *actions.random_action(&mut rng);
            state.to_next(&action);
            assert!(state.is_consistent(), "broken state after {action}:\n{state}");
            steps += 1;
            assert!(steps < 10_000);
        }
    }
}

// =============================================================================
// Decision driver
// =============================================================================

#[test]
fn test_single_action_returned_without_search() {
    let state = setpos(&[("a1", 'P'), ("a2", 'g')], Player::Red);
    let action = do_search(&state, &quick_config(0));
    assert_eq!(action, Action::moving(loc("a1"), loc("b1"), PieceType::RedPawn));
}

#[test]
fn test_search_from_opening_flips() {
    let action = do_search(&GameState::new(), &quick_config(300));
    assert_eq!(action.kind, ActionKind::FlippingRequest);
}

#[test]
fn test_both_modes_take_the_winning_capture() {
    let state = setpos(&[("a1", 'K'), ("b1", 'g')], Player::Red);
    for mode in [SearchMode::Tree, SearchMode::Flat] {
        let config = DriverConfig {
            mode,
            flat_simulations: 100,
            ..quick_config(300)
        };
        let action = do_search(&state, &config);
        assert_eq!(action, Action::capture(loc("a1"), loc("b1"), PieceType::RedKing));
    }
}

#[test]
fn test_search_survives_small_node_pool() {
    let config = DriverConfig {
        search: SearchConfig {
            max_nodes: 64,
            ..quick_config(2_000).search
        },
        ..DriverConfig::default()
    };
    let action = do_search(&GameState::new(), &config);
    assert_eq!(action.kind, ActionKind::FlippingRequest);
}

// =============================================================================
// JSON layer
// =============================================================================

#[test]
fn test_json_state_roundtrip() {
    let mut rng = Rng::with_seed(9);
    let mut state = GameState::new();
    for _ in 0..40 {
        if state.result().is_terminal() {
            break;
        }
        let action = *legal_actions(&state, GeneratePolicy::Default).random_action(&mut rng);
        state.to_next(&action);
        if state.exist_undecided_piece() || state.result().is_terminal() {
            continue;
        }
        let decoded = parse_request(&state_to_json(&state).to_string()).unwrap();
        assert_eq!(decoded.squares(), state.squares());
        assert_eq!(decoded.hidden_pieces(), state.hidden_pieces());
        assert_eq!(decoded.next_player(), state.next_player());
    }
}

#[test]
fn test_bad_request_answers_null() {
    let config = quick_config(10);
    assert_eq!(respond("", &config, &RequestLog::default()), NULL_RESPONSE);
    assert_eq!(
        respond(r#"{"data": 3, "next_player": "RED"}"#, &config, &RequestLog::default()),
        NULL_RESPONSE
    );
}
