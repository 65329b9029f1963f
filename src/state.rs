//! Game state, actions, and state transitions.
//!
//! The state is a set of 17 bitboards, one per [`PieceType`], that partition
//! the 32 squares, plus the counter of identities still face-down. Every
//! change goes through [`GameState::to_next`], which applies one [`Action`]
//! atomically.
//!
//! Revealing a piece takes two transitions: the player requests the flip
//! (the square becomes [`PieceType::Undecided`] and the turn stays open),
//! then the environment picks the identity (the square becomes the drawn
//! piece and the turn passes).

use std::fmt;

use crate::actions::has_legal_action;
use crate::bitboard::BitBoard;
use crate::constants::{
    BOARD_HEIGHT, BOARD_SIZE, BOARD_WIDTH, INITIAL_RANK_COUNTS, NO_CAPTURE_DRAW_LIMIT,
    PIECE_TYPE_COUNT,
};
use crate::hidden::HiddenPieceCounter;
use crate::piece::{Location, PieceType, Player};

/// The four kinds of transitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// A face-up piece slides to an empty neighbor.
    Move,
    /// A face-up piece takes the piece on `dest`.
    Capture,
    /// The player turns a face-down piece; its identity is still open.
    FlippingRequest,
    /// The environment decides what the turned piece is.
    FlippedResult,
}

/// One transition. `piece` is what ends up on `dest`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Action {
    pub kind: ActionKind,
    pub source: Location,
    pub dest: Location,
    pub piece: PieceType,
}

impl Action {
    pub fn moving(source: Location, dest: Location, piece: PieceType) -> Self {
        Self {
            kind: ActionKind::Move,
            source,
            dest,
            piece,
        }
    }

    /// A capture leaving `piece` on `dest` ([`PieceType::Empty`] when both
    /// pieces are removed).
    pub fn capture(source: Location, dest: Location, piece: PieceType) -> Self {
        Self {
            kind: ActionKind::Capture,
            source,
            dest,
            piece,
        }
    }

    pub fn flip_request(square: Location) -> Self {
        Self {
            kind: ActionKind::FlippingRequest,
            source: square,
            dest: square,
            piece: PieceType::Undecided,
        }
    }

    pub fn flipped(square: Location, piece: PieceType) -> Self {
        Self {
            kind: ActionKind::FlippedResult,
            source: square,
            dest: square,
            piece,
        }
    }

    /// True for the environment's half of a flip.
    #[inline]
    pub fn is_chance(&self) -> bool {
        self.kind == ActionKind::FlippedResult
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ActionKind::Move => write!(f, "{} move {} -> {}", self.piece, self.source, self.dest),
            ActionKind::Capture => {
                write!(f, "{} capture {} -> {}", self.piece, self.source, self.dest)
            }
            ActionKind::FlippingRequest => write!(f, "flip {}", self.source),
            ActionKind::FlippedResult => write!(f, "{} revealed at {}", self.piece, self.source),
        }
    }
}

/// Outcome of a state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GameResult {
    RedWin,
    BlackWin,
    Draw,
    Unfinished,
}

impl GameResult {
    pub fn winner(self) -> Option<Player> {
        match self {
            GameResult::RedWin => Some(Player::Red),
            GameResult::BlackWin => Some(Player::Black),
            _ => None,
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        self != GameResult::Unfinished
    }

    fn win_for(player: Player) -> GameResult {
        match player {
            Player::Red => GameResult::RedWin,
            Player::Black => GameResult::BlackWin,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameResult::RedWin => "red wins",
            GameResult::BlackWin => "black wins",
            GameResult::Draw => "draw",
            GameResult::Unfinished => "unfinished",
        };
        f.write_str(s)
    }
}

/// A Chinese Dark Chess position.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GameState {
    pieces: [BitBoard; PIECE_TYPE_COUNT],
    hidden: HiddenPieceCounter,
    /// Face-up pieces removed from play, by type.
    captured: [u8; PIECE_TYPE_COUNT],
    /// Face-down pieces removed by a cannon before anybody saw them.
    captured_unknown: u8,
    next_player: Player,
    no_capture_count: u32,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Opening position: every square face-down, red to move.
    pub fn new() -> Self {
        let mut pieces = [BitBoard::EMPTY; PIECE_TYPE_COUNT];
        pieces[PieceType::Unknown.index()] = BitBoard::FULL;
        Self {
            pieces,
            hidden: HiddenPieceCounter::full(),
            captured: [0; PIECE_TYPE_COUNT],
            captured_unknown: 0,
            next_player: Player::Red,
            no_capture_count: 0,
        }
    }

    /// Position from a square-by-square listing.
    ///
    /// Pieces absent from both the board and `hidden` are booked as captured;
    /// hidden identities in excess of the face-down squares are booked as
    /// face-down pieces captured earlier.
    pub fn from_squares(
        squares: &[PieceType; BOARD_SIZE],
        hidden: HiddenPieceCounter,
        next_player: Player,
    ) -> Self {
        let mut pieces = [BitBoard::EMPTY; PIECE_TYPE_COUNT];
        for (i, p) in squares.iter().enumerate() {
            pieces[p.index()].set(i);
        }
        let mut state = Self {
            pieces,
            hidden,
            captured: [0; PIECE_TYPE_COUNT],
            captured_unknown: 0,
            next_player,
            no_capture_count: 0,
        };
        for p in PieceType::colored() {
            let initial = INITIAL_RANK_COUNTS[p.rank().map_or(0, |r| r as usize)] as u32;
            let present = state.count_on_board(p) + hidden.count(p) as u32;
            state.captured[p.index()] = initial.saturating_sub(present) as u8;
        }
        let face_down = state.face_down_board().count();
        state.captured_unknown = hidden.total().saturating_sub(face_down) as u8;
        state
    }

    /// Position with the listed pieces and every other square empty.
    pub fn from_pieces(
        placed: &[(Location, PieceType)],
        hidden: HiddenPieceCounter,
        next_player: Player,
    ) -> Self {
        let mut squares = [PieceType::Empty; BOARD_SIZE];
        for &(loc, p) in placed {
            squares[loc.index()] = p;
        }
        Self::from_squares(&squares, hidden, next_player)
    }

    #[inline]
    pub fn piece_board(&self, piece: PieceType) -> BitBoard {
        self.pieces[piece.index()]
    }

    #[inline]
    pub fn hidden_pieces(&self) -> &HiddenPieceCounter {
        &self.hidden
    }

    #[inline]
    pub fn next_player(&self) -> Player {
        self.next_player
    }

    #[inline]
    pub fn no_capture_count(&self) -> u32 {
        self.no_capture_count
    }

    pub fn set_no_capture_count(&mut self, count: u32) {
        self.no_capture_count = count;
    }

    #[inline]
    pub fn captured(&self, piece: PieceType) -> u8 {
        self.captured[piece.index()]
    }

    #[inline]
    pub fn captured_unknown(&self) -> u8 {
        self.captured_unknown
    }

    #[inline]
    pub fn exchange_player(&mut self) {
        self.next_player = self.next_player.opponent();
    }

    /// Squares not holding [`PieceType::Empty`].
    #[inline]
    pub fn occupied_board(&self) -> BitBoard {
        !self.pieces[PieceType::Empty.index()]
    }

    #[inline]
    pub fn empty_board(&self) -> BitBoard {
        self.pieces[PieceType::Empty.index()]
    }

    /// Squares with a face-down piece, whether or not its flip is pending.
    #[inline]
    pub fn face_down_board(&self) -> BitBoard {
        self.pieces[PieceType::Unknown.index()] | self.pieces[PieceType::Undecided.index()]
    }

    /// Face-up pieces of `player`.
    pub fn player_board(&self, player: Player) -> BitBoard {
        PieceType::colored()
            .filter(|p| p.player() == Some(player))
            .fold(BitBoard::EMPTY, |acc, p| acc | self.piece_board(p))
    }

    #[inline]
    pub fn exist_undecided_piece(&self) -> bool {
        self.pieces[PieceType::Undecided.index()].any()
    }

    /// The square whose flip is being resolved, if any.
    pub fn undecided_square(&self) -> Option<Location> {
        self.pieces[PieceType::Undecided.index()]
            .squares()
            .next()
            .map(Location::new)
    }

    /// Whether `player` may still get a piece from a flip.
    pub fn exist_hidden_piece(&self, player: Player) -> bool {
        self.face_down_board().any() && self.hidden.total_for(player) > 0
    }

    pub fn piece_at(&self, loc: Location) -> PieceType {
        PieceType::ALL
            .iter()
            .copied()
            .find(|&p| self.pieces[p.index()].get(loc.index()))
            .unwrap_or(PieceType::Empty)
    }

    #[inline]
    pub fn count_on_board(&self, piece: PieceType) -> u32 {
        self.pieces[piece.index()].count()
    }

    /// Number of non-empty squares.
    #[inline]
    pub fn piece_count(&self) -> u32 {
        self.occupied_board().count()
    }

    /// Dense square-by-square view, rebuilt from the bitboards.
    pub fn squares(&self) -> [PieceType; BOARD_SIZE] {
        let mut out = [PieceType::Empty; BOARD_SIZE];
        for p in PieceType::ALL {
            for sq in self.pieces[p.index()].squares() {
                out[sq] = p;
            }
        }
        out
    }

    fn lift(&mut self, piece: PieceType, loc: Location) {
        self.pieces[piece.index()].reset(loc.index());
        self.pieces[PieceType::Empty.index()].set(loc.index());
    }

    fn put(&mut self, piece: PieceType, loc: Location) {
        self.pieces[PieceType::Empty.index()].reset(loc.index());
        self.pieces[piece.index()].set(loc.index());
    }

    /// Apply `action`. The action must be legal in this state.
    pub fn to_next(&mut self, action: &Action) {
        match action.kind {
            ActionKind::Move => {
                let mover = self.piece_at(action.source);
                assert!(mover.is_revealed(), "move from {} without a piece", action.source);
                assert!(
                    self.empty_board().get(action.dest.index()),
                    "move onto occupied square {}",
                    action.dest
                );
                self.lift(mover, action.source);
                self.put(mover, action.dest);
                self.no_capture_count += 1;
                self.exchange_player();
            }
            ActionKind::Capture => {
                let attacker = self.piece_at(action.source);
                let target = self.piece_at(action.dest);
                assert!(attacker.is_revealed(), "capture from {} without a piece", action.source);
                assert!(
                    target.is_revealed() || target == PieceType::Unknown,
                    "capture of {target:?} at {}",
                    action.dest
                );
                self.lift(attacker, action.source);
                self.lift(target, action.dest);
                if target == PieceType::Unknown {
                    self.captured_unknown += 1;
                } else {
                    self.captured[target.index()] += 1;
                }
                if action.piece == PieceType::Empty {
                    self.captured[attacker.index()] += 1;
                } else {
                    self.put(action.piece, action.dest);
                }
                self.no_capture_count = 0;
                self.exchange_player();
            }
            ActionKind::FlippingRequest => {
                assert_eq!(
                    self.piece_at(action.source),
                    PieceType::Unknown,
                    "flip request on a square that is not face-down"
                );
                self.pieces[PieceType::Unknown.index()].reset(action.source.index());
                self.pieces[PieceType::Undecided.index()].set(action.source.index());
            }
            ActionKind::FlippedResult => {
                assert_eq!(
                    self.piece_at(action.source),
                    PieceType::Undecided,
                    "flip result on a square without a pending flip"
                );
                self.hidden.remove(action.piece);
                self.pieces[PieceType::Undecided.index()].reset(action.source.index());
                self.pieces[action.piece.index()].set(action.source.index());
                self.no_capture_count += 1;
                self.exchange_player();
            }
        }
    }

    /// Copy of this state after `action`.
    pub fn apply(&self, action: &Action) -> GameState {
        let mut next = self.clone();
        next.to_next(action);
        next
    }

    fn eliminated(&self, player: Player) -> bool {
        self.player_board(player).none() && !self.exist_hidden_piece(player)
    }

    /// Outcome of this position.
    ///
    /// Elimination is decided before the no-capture draw. A side to move with
    /// no legal action loses.
    pub fn result(&self) -> GameResult {
        match (self.eliminated(Player::Red), self.eliminated(Player::Black)) {
            (true, true) => return GameResult::Draw,
            (true, false) => return GameResult::BlackWin,
            (false, true) => return GameResult::RedWin,
            (false, false) => {}
        }
        if self.no_capture_count > NO_CAPTURE_DRAW_LIMIT {
            return GameResult::Draw;
        }
        if !self.exist_undecided_piece() && !has_legal_action(self) {
            return GameResult::win_for(self.next_player.opponent());
        }
        GameResult::Unfinished
    }

    /// The player whose decision led into this state: the flipper while a
    /// flip is pending, otherwise the player not on move.
    pub fn last_mover(&self) -> Player {
        if self.exist_undecided_piece() {
            self.next_player
        } else {
            self.next_player.opponent()
        }
    }

    /// Check that the boards partition the squares and that every identity is
    /// accounted for. Used by tests and debug assertions.
    pub fn is_consistent(&self) -> bool {
        let mut seen = 0u32;
        for board in &self.pieces {
            if seen & board.bits() != 0 {
                return false;
            }
            seen |= board.bits();
        }
        if seen != u32::MAX {
            return false;
        }
        for p in PieceType::colored() {
            let initial = INITIAL_RANK_COUNTS[p.rank().map_or(0, |r| r as usize)] as u32;
            let total =
                self.count_on_board(p) + self.hidden.count(p) as u32 + self.captured(p) as u32;
            if total != initial {
                return false;
            }
        }
        self.hidden.total() == self.face_down_board().count() + self.captured_unknown as u32
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let squares = self.squares();
        write!(f, "   ")?;
        for x in 0..BOARD_WIDTH {
            write!(f, " {}", (b'a' + x as u8) as char)?;
        }
        writeln!(f)?;
        for y in 0..BOARD_HEIGHT {
            write!(f, "{:2} ", y + 1)?;
            for x in 0..BOARD_WIDTH {
                write!(f, " {}", squares[y * BOARD_WIDTH + x])?;
            }
            writeln!(f)?;
        }
        writeln!(
            f,
            "next: {}  hidden: {}  no-capture: {}",
            self.next_player,
            self.hidden.total(),
            self.no_capture_count
        )
    }
}
