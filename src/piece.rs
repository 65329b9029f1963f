//! Players, ranks, piece types and board locations.
//!
//! Every square holds exactly one [`PieceType`]: a face-down piece, a piece
//! whose flip is being resolved, one of the fourteen coloured ranks, or
//! nothing. Capture strength is a total order on [`Rank`] with two
//! exceptions for pawn and king.

use std::fmt;

use crate::constants::{BOARD_HEIGHT, BOARD_SIZE, BOARD_WIDTH, PIECE_TYPE_COUNT, RANK_COUNT};

/// The two sides.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Player {
    Red,
    Black,
}

impl Player {
    #[inline]
    pub fn opponent(self) -> Player {
        match self {
            Player::Red => Player::Black,
            Player::Black => Player::Red,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Player::Red => "RED",
            Player::Black => "BLACK",
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Piece ranks, weakest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Pawn = 0,
    Cannon = 1,
    Knight = 2,
    Rook = 3,
    Minister = 4,
    Guard = 5,
    King = 6,
}

impl Rank {
    pub const ALL: [Rank; RANK_COUNT] = [
        Rank::Pawn,
        Rank::Cannon,
        Rank::Knight,
        Rank::Rook,
        Rank::Minister,
        Rank::Guard,
        Rank::King,
    ];

    /// Whether a piece of this rank may take an adjacent piece of `target` rank.
    ///
    /// Cannons never capture by adjacency. A pawn takes a king, a king never
    /// takes a pawn; otherwise a rank takes any rank not above it.
    pub fn captures_adjacent(self, target: Rank) -> bool {
        match (self, target) {
            (Rank::Cannon, _) => false,
            (Rank::Pawn, Rank::King) => true,
            (Rank::King, Rank::Pawn) => false,
            (attacker, target) => attacker >= target,
        }
    }
}

/// Content of a square, and the index of its bitboard.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PieceType {
    Unknown = 0,
    Undecided = 1,
    RedPawn = 2,
    RedCannon = 3,
    RedKnight = 4,
    RedRook = 5,
    RedMinister = 6,
    RedGuard = 7,
    RedKing = 8,
    BlackPawn = 9,
    BlackCannon = 10,
    BlackKnight = 11,
    BlackRook = 12,
    BlackMinister = 13,
    BlackGuard = 14,
    BlackKing = 15,
    Empty = 16,
}

impl PieceType {
    pub const ALL: [PieceType; PIECE_TYPE_COUNT] = [
        PieceType::Unknown,
        PieceType::Undecided,
        PieceType::RedPawn,
        PieceType::RedCannon,
        PieceType::RedKnight,
        PieceType::RedRook,
        PieceType::RedMinister,
        PieceType::RedGuard,
        PieceType::RedKing,
        PieceType::BlackPawn,
        PieceType::BlackCannon,
        PieceType::BlackKnight,
        PieceType::BlackRook,
        PieceType::BlackMinister,
        PieceType::BlackGuard,
        PieceType::BlackKing,
        PieceType::Empty,
    ];

    /// The fourteen face-up pieces, red first.
    pub fn colored() -> impl Iterator<Item = PieceType> {
        Self::ALL[2..16].iter().copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Build the face-up piece of `player` with `rank`.
    #[inline]
    pub fn new(player: Player, rank: Rank) -> PieceType {
        let offset = match player {
            Player::Red => 2,
            Player::Black => 2 + RANK_COUNT,
        };
        Self::ALL[offset + rank as usize]
    }

    /// Owner of a face-up piece.
    #[inline]
    pub fn player(self) -> Option<Player> {
        match self as u8 {
            2..=8 => Some(Player::Red),
            9..=15 => Some(Player::Black),
            _ => None,
        }
    }

    /// Rank of a face-up piece.
    #[inline]
    pub fn rank(self) -> Option<Rank> {
        match self as u8 {
            i @ 2..=15 => Some(Rank::ALL[(i as usize - 2) % RANK_COUNT]),
            _ => None,
        }
    }

    /// True for the fourteen face-up pieces.
    #[inline]
    pub fn is_revealed(self) -> bool {
        self.player().is_some()
    }

    /// True for squares holding a face-down piece.
    #[inline]
    pub fn is_face_down(self) -> bool {
        matches!(self, PieceType::Unknown | PieceType::Undecided)
    }

    /// Single-character code used by the text and JSON interfaces.
    pub fn code(self) -> char {
        match self {
            PieceType::Unknown => '?',
            PieceType::Undecided => '!',
            PieceType::RedPawn => 'P',
            PieceType::RedCannon => 'C',
            PieceType::RedKnight => 'N',
            PieceType::RedRook => 'R',
            PieceType::RedMinister => 'M',
            PieceType::RedGuard => 'G',
            PieceType::RedKing => 'K',
            PieceType::BlackPawn => 'p',
            PieceType::BlackCannon => 'c',
            PieceType::BlackKnight => 'n',
            PieceType::BlackRook => 'r',
            PieceType::BlackMinister => 'm',
            PieceType::BlackGuard => 'g',
            PieceType::BlackKing => 'k',
            PieceType::Empty => ' ',
        }
    }

    /// Inverse of [`PieceType::code`]. The undecided marker is never accepted
    /// from outside.
    pub fn from_code(c: char) -> Option<PieceType> {
        Self::ALL
            .iter()
            .copied()
            .filter(|&p| p != PieceType::Undecided)
            .find(|p| p.code() == c)
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PieceType::Empty => f.write_str("."),
            p => write!(f, "{}", p.code()),
        }
    }
}

/// A checked square on the board.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location(u8);

impl Location {
    /// Location from a linear index. Panics if `index >= 32`.
    pub fn new(index: usize) -> Location {
        assert!(index < BOARD_SIZE, "square index {index} out of range");
        Location(index as u8)
    }

    /// Location from column and row. Panics if either is off the board.
    pub fn from_xy(x: usize, y: usize) -> Location {
        assert!(x < BOARD_WIDTH, "column {x} out of range");
        assert!(y < BOARD_HEIGHT, "row {y} out of range");
        Location((y * BOARD_WIDTH + x) as u8)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn x(self) -> usize {
        self.index() % BOARD_WIDTH
    }

    #[inline]
    pub fn y(self) -> usize {
        self.index() / BOARD_WIDTH
    }

    /// Parse a coordinate like `a1` (column letter, 1-based row).
    pub fn parse(s: &str) -> Option<Location> {
        let mut chars = s.trim().chars();
        let col = chars.next()?.to_ascii_lowercase();
        let row: usize = chars.as_str().parse().ok()?;
        if !col.is_ascii_lowercase() {
            return None;
        }
        let x = (col as u8 - b'a') as usize;
        if x >= BOARD_WIDTH || row == 0 || row > BOARD_HEIGHT {
            return None;
        }
        Some(Location::from_xy(x, row - 1))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.x() as u8) as char, self.y() + 1)
    }
}
