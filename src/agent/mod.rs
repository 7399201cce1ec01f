//! Move-choosing policies behind one trait.
//!
//! Every agent maps a board to a direction, or `None` when the board is
//! terminal. [`crate::facade::Decider`] and [`crate::runner`] only see this
//! trait, so expectimax, the one-ply [`Snake`], the rule-based [`Strategy`]
//! and the baselines ([`RandomAgent`], [`Sequence`]) are interchangeable.

use crate::engine::{Board, Direction};
use crate::expectimax::{Expectimax, ExpectimaxParallel};
use crate::heuristic::Evaluate;

pub mod random;
pub mod sequence;
pub mod snake;
pub mod strategy;

pub use random::RandomAgent;
pub use sequence::{EmptySequence, Sequence};
pub use snake::Snake;
pub use strategy::{
    generate_all_variations, BanMove, Column, Corner, RedundantStrategy, Row, Rule, RuleOrder, Strategy,
    StrategySpec, TryMove,
};

/// A policy that picks a legal move for a board.
pub trait Agent {
    /// A legal direction for `board`, or `None` iff no direction moves it.
    fn choose_move(&mut self, board: Board) -> Option<Direction>;

    /// Short label for logs and reports.
    fn name(&self) -> &'static str;
}

impl<A: Agent + ?Sized> Agent for Box<A> {
    fn choose_move(&mut self, board: Board) -> Option<Direction> { (**self).choose_move(board) }

    fn name(&self) -> &'static str { (**self).name() }
}

impl<E: Evaluate> Agent for Expectimax<E> {
    fn choose_move(&mut self, board: Board) -> Option<Direction> { Expectimax::choose_move(self, board) }

    fn name(&self) -> &'static str { "expectimax" }
}

impl<E: Evaluate + Sync> Agent for ExpectimaxParallel<E> {
    fn choose_move(&mut self, board: Board) -> Option<Direction> { ExpectimaxParallel::choose_move(self, board) }

    fn name(&self) -> &'static str { "expectimax-parallel" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_legal(agent: &mut dyn Agent, board: Board) -> Option<Direction> { agent.choose_move(board) }

    #[test]
    fn agents_are_object_safe_and_legal() {
        let board = Board::from_raw(0x1100_0000_0000_2100);
        let mut agents: Vec<Box<dyn Agent>> = vec![
            Box::new(Expectimax::new()),
            Box::new(ExpectimaxParallel::new()),
            Box::new(Snake::new()),
            Box::new(Strategy::left_corner()),
            Box::new(RandomAgent::new(3)),
            Box::new(Sequence::new(vec![Direction::Left, Direction::Down]).unwrap()),
        ];
        for agent in agents.iter_mut() {
            let dir = first_legal(agent.as_mut(), board).expect("board has moves");
            assert!(board.legal_moves().any(|d| d == dir), "{} chose illegal {dir}", agent.name());
        }
    }

    #[test]
    fn agents_return_none_on_terminal_board() {
        let full = Board::from_raw(0x1234_4321_1234_4321);
        let mut agents: Vec<Box<dyn Agent>> = vec![
            Box::new(Expectimax::new()),
            Box::new(Snake::new()),
            Box::new(Strategy::left_corner()),
            Box::new(RandomAgent::new(3)),
            Box::new(Sequence::new(vec![Direction::Up]).unwrap()),
        ];
        for agent in agents.iter_mut() {
            assert_eq!(agent.choose_move(full), None, "{}", agent.name());
        }
    }
}
