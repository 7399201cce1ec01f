use log::debug;

use crate::engine::{Board, Direction};
use crate::heuristic::{Evaluate, Heuristic, HeuristicWeights};

use super::Agent;

/// Greedy one-ply agent: plays the move whose resulting board scores best.
///
/// No chance layer is searched, so it costs at most four evaluations per
/// decision. Ties go to the earlier direction in [`Direction::ALL`].
///
/// ```
/// use ai_2048::agent::Snake;
/// use ai_2048::engine::{Board, Direction};
/// let mut snake = Snake::new();
/// // A lone corner tile can only go right or down.
/// let dir = snake.choose_move(Board::from_raw(0x1000_0000_0000_0000));
/// assert!(matches!(dir, Some(Direction::Right) | Some(Direction::Down)));
/// ```
#[derive(Debug, Clone)]
pub struct Snake<E = Heuristic> {
    evaluator: E,
}

impl Snake<Heuristic> {
    /// Snake with the corner-seeking weights.
    pub fn new() -> Self { Self::with_evaluator(Heuristic::new(HeuristicWeights::corner_seeking())) }
}

impl Default for Snake<Heuristic> {
    fn default() -> Self { Self::new() }
}

impl<E: Evaluate> Snake<E> {
    pub fn with_evaluator(evaluator: E) -> Self { Self { evaluator } }

    pub fn evaluator(&self) -> &E { &self.evaluator }

    /// Score of the board each direction leads to, `None` for blocked moves.
    /// Indexed in [`Direction::ALL`] order.
    pub fn branch_scores(&self, board: Board) -> [Option<f64>; 4] {
        Direction::ALL.map(|dir| {
            let next = board.shift(dir);
            (next != board).then(|| self.evaluator.evaluate(next))
        })
    }

    pub fn choose_move(&self, board: Board) -> Option<Direction> {
        let scores = self.branch_scores(board);
        let mut best: Option<(Direction, f64)> = None;
        for (dir, score) in Direction::ALL.into_iter().zip(scores) {
            let Some(score) = score else { continue };
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((dir, score));
            }
        }
        if let Some((dir, score)) = best {
            debug!("snake: {dir} score={score:.1}");
        }
        best.map(|(dir, _)| dir)
    }
}

impl<E: Evaluate> Agent for Snake<E> {
    fn choose_move(&mut self, board: Board) -> Option<Direction> { Snake::choose_move(self, board) }

    fn name(&self) -> &'static str { "snake" }
}
