//! Legal action generation.
//!
//! Captures come first, then slides into empty neighbors, then flip
//! requests. While a flip is pending the only actions are the possible
//! reveals, each weighted by how many such pieces are still hidden.

use fastrand::Rng;

use crate::constants::{ADJACENT, NO_SQUARE};
use crate::mcts::weighted_index;
use crate::piece::{Location, PieceType, Player, Rank};
use crate::state::{Action, GameState};

/// Which subsets of actions to generate.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GeneratePolicy {
    /// Captures, moves and flips.
    #[default]
    Default,
    /// Moves and flips only when no capture exists.
    Greedy,
    /// No flip requests, unless nothing else is legal.
    NoFlipping,
}

/// Ordered, weighted collection of actions.
#[derive(Clone, Debug, Default)]
pub struct ActionSet {
    entries: Vec<(Action, u32)>,
    total_weight: u32,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action, weight: u32) {
        debug_assert!(weight > 0);
        self.entries.push((action, weight));
        self.total_weight += weight;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Action at `index`. Panics if out of range.
    pub fn action(&self, index: usize) -> &Action {
        assert!(
            index < self.entries.len(),
            "action index {index} out of range ({} actions)",
            self.entries.len()
        );
        &self.entries[index].0
    }

    pub fn weight(&self, index: usize) -> u32 {
        self.entries[index].1
    }

    #[inline]
    pub fn total_weight(&self) -> u32 {
        self.total_weight
    }

    pub fn all_weight_equal(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].1 == w[1].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> + '_ {
        self.entries.iter().map(|(a, _)| a)
    }

    /// Actions paired with their weights.
    pub fn entries(&self) -> &[(Action, u32)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(Action, u32)> {
        self.entries
    }

    pub fn contains(&self, action: &Action) -> bool {
        self.iter().any(|a| a == action)
    }

    /// Index drawn with probability proportional to weight.
    pub fn random_index(&self, rng: &mut Rng) -> usize {
        assert!(!self.is_empty(), "random pick from an empty action set");
        if self.all_weight_equal() {
            return rng.usize(..self.entries.len());
        }
        weighted_index(self.entries.iter().map(|(_, w)| *w), self.total_weight, rng)
    }

    pub fn random_action(&self, rng: &mut Rng) -> &Action {
        let i = self.random_index(rng);
        &self.entries[i].0
    }
}

/// All legal actions for `state` under `policy`.
///
/// Panics if the set is empty while the game is not over.
pub fn legal_actions(state: &GameState, policy: GeneratePolicy) -> ActionSet {
    let mut set = ActionSet::new();

    if let Some(square) = state.undecided_square() {
        for (piece, count) in state.hidden_pieces().iter() {
            set.push(Action::flipped(square, piece), count as u32);
        }
        assert!(!set.is_empty(), "pending flip at {square} with nothing hidden");
        return set;
    }

    let player = state.next_player();
    let squares = state.squares();
    push_captures(state, &squares, player, &mut set);

    if !(policy == GeneratePolicy::Greedy && !set.is_empty()) {
        push_moves(state, &squares, player, &mut set);
        if policy != GeneratePolicy::NoFlipping || set.is_empty() {
            push_flips(state, &mut set);
        }
    }

    if set.is_empty() {
        assert!(
            state.result().is_terminal(),
            "no legal action in a non-terminal state:\n{state}"
        );
    }
    set
}

/// Whether the side to move has anything to do. Cheaper than generating.
pub fn has_legal_action(state: &GameState) -> bool {
    if state.exist_undecided_piece() {
        return !state.hidden_pieces().is_empty();
    }
    if state.piece_board(PieceType::Unknown).any() {
        return true;
    }
    let player = state.next_player();
    let empty = state.empty_board();
    let own = state.player_board(player);
    let can_slide = own.squares().any(|sq| {
        ADJACENT[sq]
            .iter()
            .any(|&n| n != NO_SQUARE && empty.get(n as usize))
    });
    if can_slide {
        return true;
    }
    let mut captures = ActionSet::new();
    push_captures(state, &state.squares(), player, &mut captures);
    !captures.is_empty()
}

fn push_captures(state: &GameState, squares: &[PieceType], player: Player, set: &mut ActionSet) {
    let opponent = player.opponent();
    for sq in state.player_board(player).squares() {
        let attacker = squares[sq];
        let Some(rank) = attacker.rank() else {
            continue;
        };
        if rank == Rank::Cannon {
            push_cannon_captures(squares, sq, attacker, opponent, set);
            continue;
        }
        for &n in &ADJACENT[sq] {
            if n == NO_SQUARE {
                continue;
            }
            let target = squares[n as usize];
            if target.player() != Some(opponent) {
                continue;
            }
            let Some(target_rank) = target.rank() else {
                continue;
            };
            if rank.captures_adjacent(target_rank) {
                let result = if rank == target_rank {
                    PieceType::Empty
                } else {
                    attacker
                };
                set.push(
                    Action::capture(Location::new(sq), Location::new(n as usize), result),
                    1,
                );
            }
        }
    }
}

/// A cannon takes the first piece beyond exactly one screen, in any of the
/// four directions, if it is an opponent's piece or still face-down.
fn push_cannon_captures(
    squares: &[PieceType],
    sq: usize,
    cannon: PieceType,
    opponent: Player,
    set: &mut ActionSet,
) {
    for dir in 0..4 {
        let mut cur = ADJACENT[sq][dir];
        let mut screened = false;
        while cur != NO_SQUARE {
            let piece = squares[cur as usize];
            if piece != PieceType::Empty {
                if !screened {
                    screened = true;
                } else {
                    if piece == PieceType::Unknown || piece.player() == Some(opponent) {
                        set.push(
                            Action::capture(Location::new(sq), Location::new(cur as usize), cannon),
                            1,
                        );
                    }
                    break;
                }
            }
            cur = ADJACENT[cur as usize][dir];
        }
    }
}

fn push_moves(state: &GameState, squares: &[PieceType], player: Player, set: &mut ActionSet) {
    let empty = state.empty_board();
    for sq in state.player_board(player).squares() {
        for &n in &ADJACENT[sq] {
            if n != NO_SQUARE && empty.get(n as usize) {
                set.push(
                    Action::moving(Location::new(sq), Location::new(n as usize), squares[sq]),
                    1,
                );
            }
        }
    }
}

fn push_flips(state: &GameState, set: &mut ActionSet) {
    for sq in state.piece_board(PieceType::Unknown).squares() {
        set.push(Action::flip_request(Location::new(sq)), 1);
    }
}
