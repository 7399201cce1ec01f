//! The single decision entry point for callers that hold a packed board.
//!
//! ```
//! use ai_2048::facade::{Decider, DecisionError};
//! let mut decider = Decider::default();
//! let code = decider.choose_move(0x1100_0000_0000_0000).unwrap();
//! assert!(code <= 3);
//! assert_eq!(decider.choose_move(0x1234_4321_1234_4321), Err(DecisionError::NoLegalMove));
//! ```

use log::warn;
use thiserror::Error;

use crate::agent::Agent;
use crate::engine::{Board, CELLS, MAX_EXPONENT};
use crate::expectimax::Expectimax;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("invalid board {raw:#018x}: cell {cell} holds exponent {exponent}, above {max}")]
    InvalidBoard { raw: u64, cell: usize, exponent: u8, max: u8 },
    #[error("no legal move")]
    NoLegalMove,
}

impl DecisionError {
    /// Integer sentinel used by [`Decider::choose_move_code`].
    pub fn code(&self) -> i32 {
        match self {
            DecisionError::NoLegalMove => -1,
            DecisionError::InvalidBoard { .. } => -2,
        }
    }
}

/// Unpack a board, rejecting any nibble above `max_exponent`.
pub fn decode(raw: u64, max_exponent: u8) -> Result<Board, DecisionError> {
    for cell in 0..CELLS {
        let exponent = ((raw >> (60 - 4 * cell)) & 0xf) as u8;
        if exponent > max_exponent {
            return Err(DecisionError::InvalidBoard { raw, cell, exponent, max: max_exponent });
        }
    }
    Ok(Board::from_raw(raw))
}

#[inline]
pub fn encode(board: Board) -> u64 { board.into_raw() }

/// Owns one agent and answers move queries on packed boards.
pub struct Decider {
    agent: Box<dyn Agent + Send>,
    max_exponent: u8,
}

impl Decider {
    pub fn new(agent: Box<dyn Agent + Send>) -> Self { Self { agent, max_exponent: MAX_EXPONENT } }

    /// Reject boards holding tiles above `2^max_exponent`, for callers whose
    /// game stops at a smaller goal tile.
    pub fn with_max_exponent(mut self, max_exponent: u8) -> Self {
        self.max_exponent = max_exponent.min(MAX_EXPONENT);
        self
    }

    pub fn agent_name(&self) -> &'static str { self.agent.name() }

    pub fn max_exponent(&self) -> u8 { self.max_exponent }

    /// Direction code (0=Up, 1=Right, 2=Down, 3=Left) for a packed board.
    pub fn choose_move(&mut self, raw: u64) -> Result<u8, DecisionError> {
        let board = decode(raw, self.max_exponent).map_err(|err| {
            warn!("rejected board: {err}");
            err
        })?;
        if board.is_terminal() {
            warn!("no legal move for {board:?}");
            return Err(DecisionError::NoLegalMove);
        }
        self.agent.choose_move(board).map(|dir| dir.code()).ok_or(DecisionError::NoLegalMove)
    }

    /// [`Decider::choose_move`] flattened to one integer: the direction code,
    /// `-1` for no legal move or `-2` for an invalid board.
    pub fn choose_move_code(&mut self, raw: u64) -> i32 {
        match self.choose_move(raw) {
            Ok(code) => i32::from(code),
            Err(err) => err.code(),
        }
    }
}

impl Default for Decider {
    /// Expectimax with the reference weights and depth policy.
    fn default() -> Self { Self::new(Box::new(Expectimax::new())) }
}
