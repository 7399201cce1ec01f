//! ai-2048: move-search agents for 2048 over a packed 64-bit board
//!
//! This crate provides:
//! - A compact `Board` type with table-driven moves (`engine` module)
//! - Board evaluators (`heuristic` module)
//! - An Expectimax AI (`expectimax` module) with single-threaded and parallel variants
//! - A one-ply greedy agent, a rule-based strategy agent with strategy search,
//!   and random and fixed-sequence baselines (`agent` module)
//! - A decision entry point over packed boards (`facade` module)
//! - TOML agent configuration (`config`) and a seeded game driver (`runner`)
//!
//! Quick start:
//! ```
//! use ai_2048::engine::{Board, Direction};
//! use ai_2048::facade::Decider;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic board initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//!
//! // Ask the default expectimax agent for a move on the packed board
//! let mut decider = Decider::default();
//! let code = decider.choose_move(b0.raw()).unwrap();
//! let dir = Direction::from_code(code).unwrap();
//! assert_ne!(b0.shift(dir), b0);
//! ```
//!
//! Packed layout: cell `i = 4*row + col` occupies bits `60-4i..=63-4i`, each
//! nibble holding the tile's base-2 exponent (0 = empty).

pub mod agent;
pub mod config;
pub mod engine;
pub mod expectimax;
pub mod facade;
pub mod heuristic;
pub mod runner;
