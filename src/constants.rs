//! Constants for board geometry, piece counts, and search parameters.
//!
//! The board is 8 columns by 4 rows, addressed by a linear square index
//! `y * 8 + x`. Neighbor lookups go through a precomputed adjacency table
//! with a sentinel for the board edge.

// =============================================================================
// Board Geometry
// =============================================================================

/// Number of columns.
pub const BOARD_WIDTH: usize = 8;

/// Number of rows.
pub const BOARD_HEIGHT: usize = 4;

/// Total number of squares.
pub const BOARD_SIZE: usize = BOARD_WIDTH * BOARD_HEIGHT;

/// Number of piece-type boards (unknown, undecided, 7 red, 7 black, empty).
pub const PIECE_TYPE_COUNT: usize = 17;

/// Number of ranks per side.
pub const RANK_COUNT: usize = 7;

// =============================================================================
// Adjacency
// =============================================================================

/// Sentinel in [`ADJACENT`] for a neighbor beyond the board edge.
pub const NO_SQUARE: u8 = u8::MAX;

/// Direction slots in [`ADJACENT`]. Order: left, right, up, down.
pub const DIR_LEFT: usize = 0;
pub const DIR_RIGHT: usize = 1;
pub const DIR_UP: usize = 2;
pub const DIR_DOWN: usize = 3;

const fn build_adjacency() -> [[u8; 4]; BOARD_SIZE] {
    let mut table = [[NO_SQUARE; 4]; BOARD_SIZE];
    let mut i = 0;
    while i < BOARD_SIZE {
        let x = i % BOARD_WIDTH;
        let y = i / BOARD_WIDTH;
        if x > 0 {
            table[i][DIR_LEFT] = (i - 1) as u8;
        }
        if x + 1 < BOARD_WIDTH {
            table[i][DIR_RIGHT] = (i + 1) as u8;
        }
        if y > 0 {
            table[i][DIR_UP] = (i - BOARD_WIDTH) as u8;
        }
        if y + 1 < BOARD_HEIGHT {
            table[i][DIR_DOWN] = (i + BOARD_WIDTH) as u8;
        }
        i += 1;
    }
    table
}

/// Orthogonal neighbors of each square, [`NO_SQUARE`] at the edges.
pub const ADJACENT: [[u8; 4]; BOARD_SIZE] = build_adjacency();

// =============================================================================
// Pieces
// =============================================================================

/// Initial number of pieces per rank for one side, indexed by rank
/// (pawn, cannon, knight, rook, minister, guard, king).
pub const INITIAL_RANK_COUNTS: [u8; RANK_COUNT] = [5, 2, 2, 2, 2, 2, 1];

/// Pieces per side.
pub const PIECES_PER_SIDE: usize = 16;

/// The game is drawn once this many consecutive turns pass without a capture.
pub const NO_CAPTURE_DRAW_LIMIT: u32 = 20;

// =============================================================================
// Search Parameters
// =============================================================================

/// Default number of search iterations per decision.
pub const N_ITERATIONS: usize = 10_000;

/// Default wall-clock budget per decision, in milliseconds.
pub const TIMEOUT_MS: u64 = 5_000;

/// Default arena capacity (number of search nodes).
pub const MAX_NODES: usize = 200_000;

/// Exploration constant for UCB1.
pub const UCB_C: f64 = 1.0;

/// Nodes visited fewer times than this may be garbage collected.
pub const GC_VISIT_THRESHOLD: u32 = 10;

/// A rollout longer than this many actions is aborted.
pub const ROLLOUT_LIMIT: usize = 1_000;

/// Default rollout budget for the flat Monte Carlo evaluator.
pub const FLAT_SIMULATIONS: usize = 10_000;
