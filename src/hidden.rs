//! Multiset of piece identities that have not been revealed yet.
//!
//! Face-down squares carry no identity on the board; what they may turn out
//! to be is tracked here as a count per coloured rank. A flip draws from this
//! counter with probability proportional to the counts.

use crate::constants::INITIAL_RANK_COUNTS;
use crate::piece::{PieceType, Player, Rank};

const SLOTS: usize = 14;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HiddenPieceCounter {
    counts: [u8; SLOTS],
}

#[inline]
fn slot(piece: PieceType) -> usize {
    assert!(piece.is_revealed(), "{piece:?} has no hidden identity");
    piece.index() - 2
}

impl Default for HiddenPieceCounter {
    fn default() -> Self {
        Self::full()
    }
}

impl HiddenPieceCounter {
    /// All 32 pieces still hidden.
    pub fn full() -> Self {
        let mut counts = [0u8; SLOTS];
        for player in [Player::Red, Player::Black] {
            for rank in Rank::ALL {
                counts[slot(PieceType::new(player, rank))] = INITIAL_RANK_COUNTS[rank as usize];
            }
        }
        Self { counts }
    }

    pub fn empty() -> Self {
        Self { counts: [0; SLOTS] }
    }

    /// Counter holding exactly the given pieces.
    pub fn from_pieces<I: IntoIterator<Item = PieceType>>(pieces: I) -> Self {
        let mut counter = Self::empty();
        for p in pieces {
            counter.add(p);
        }
        counter
    }

    #[inline]
    pub fn count(&self, piece: PieceType) -> u8 {
        self.counts[slot(piece)]
    }

    pub fn add(&mut self, piece: PieceType) {
        self.counts[slot(piece)] += 1;
    }

    /// Take one `piece` out. Panics if none is left.
    pub fn remove(&mut self, piece: PieceType) {
        let c = &mut self.counts[slot(piece)];
        assert!(*c > 0, "no hidden {piece:?} left to reveal");
        *c -= 1;
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().map(|&c| c as u32).sum()
    }

    pub fn total_for(&self, player: Player) -> u32 {
        self.iter()
            .filter(|(p, _)| p.player() == Some(player))
            .map(|(_, c)| c as u32)
            .sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Non-zero entries, red pawn first.
    pub fn iter(&self) -> impl Iterator<Item = (PieceType, u8)> + '_ {
        PieceType::colored()
            .zip(self.counts.iter().copied())
            .filter(|&(_, c)| c > 0)
    }
}
