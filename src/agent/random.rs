use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::engine::{Board, Direction};

use super::Agent;

/// Plays a uniformly random legal move. A baseline for the other agents.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(seed: u64) -> Self { Self { rng: StdRng::seed_from_u64(seed) } }

    pub fn choose_move(&mut self, board: Board) -> Option<Direction> {
        let legal: Vec<Direction> = board.legal_moves().collect();
        legal.choose(&mut self.rng).copied()
    }
}

impl Agent for RandomAgent {
    fn choose_move(&mut self, board: Board) -> Option<Direction> { RandomAgent::choose_move(self, board) }

    fn name(&self) -> &'static str { "random" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_legal_moves_and_seeded() {
        // A lone corner tile can only go right or down.
        let board = Board::from_raw(0x1000_0000_0000_0000);
        let mut a = RandomAgent::new(9);
        let mut b = RandomAgent::new(9);
        let picks: Vec<_> = (0..40).map(|_| a.choose_move(board)).collect();
        assert!(picks.iter().all(|dir| matches!(dir, Some(Direction::Right) | Some(Direction::Down))));
        assert!(picks.contains(&Some(Direction::Right)) && picks.contains(&Some(Direction::Down)));
        assert_eq!(picks, (0..40).map(|_| b.choose_move(board)).collect::<Vec<_>>());
        assert_eq!(a.choose_move(Board::from_raw(0x1234_4321_1234_4321)), None);
    }
}
