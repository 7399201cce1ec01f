use thiserror::Error;

use crate::engine::{Board, Direction};

use super::Agent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a move sequence needs at least one direction")]
pub struct EmptySequence;

/// Cycles through a fixed list of moves.
///
/// An entry that would not move the board is skipped for the next one. When
/// no entry moves it, the first legal direction in [`Direction::ALL`] order
/// is played.
///
/// ```
/// use ai_2048::agent::Sequence;
/// use ai_2048::engine::{Board, Direction};
/// let mut seq = Sequence::new(vec![Direction::Left, Direction::Down]).unwrap();
/// // Left does nothing to a tile already on the left edge.
/// assert_eq!(seq.choose_move(Board::from_raw(0x1000_0000_0000_0000)), Some(Direction::Down));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    moves: Vec<Direction>,
    next: usize,
}

impl Sequence {
    pub fn new(moves: Vec<Direction>) -> Result<Self, EmptySequence> {
        if moves.is_empty() {
            return Err(EmptySequence);
        }
        Ok(Self { moves, next: 0 })
    }

    pub fn moves(&self) -> &[Direction] { &self.moves }

    pub fn choose_move(&mut self, board: Board) -> Option<Direction> {
        let len = self.moves.len();
        for offset in 0..len {
            let index = (self.next + offset) % len;
            let dir = self.moves[index];
            if board.shift(dir) != board {
                self.next = (index + 1) % len;
                return Some(dir);
            }
        }
        board.legal_moves().next()
    }
}

impl Agent for Sequence {
    fn choose_move(&mut self, board: Board) -> Option<Direction> { Sequence::choose_move(self, board) }

    fn name(&self) -> &'static str { "sequence" }
}
