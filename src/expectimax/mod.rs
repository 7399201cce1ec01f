//! Expectimax search policy (single-threaded and parallel) for 2048.
//!
//! This module provides two policy implementations:
//! - [`Expectimax`]: single-threaded expectimax.
//! - [`ExpectimaxParallel`]: rayon-based parallel expectimax.
//!
//! Both variants share the same public surface and defaults. Max layers try
//! the legal directions in [`Direction::ALL`] order and keep the first
//! strictly greatest value; chance layers average over every empty cell with
//! a 2 (p = 0.9) or a 4 (p = 0.1). Depth counts player moves looked ahead,
//! so `search(board, 0)` is a one-ply evaluator lookahead.
//!
//! Notes
//! - Expectimax is deterministic; randomness only occurs when applying moves
//!   with `Board::make_move`.
//! - The transposition cache lives for one top-level call and is keyed by
//!   (board, remaining depth).
//! - A max node with no legal move scores [`DeadEnd::FLOOR`] by default, so
//!   the search only walks into a lost position when every move loses.
//!
//! Quick start
//! ```
//! use ai_2048::engine::Board;
//! use ai_2048::expectimax::{Expectimax, ExpectimaxParallel};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic board setup
//! let mut rng = StdRng::seed_from_u64(123);
//! let b0 = Board::EMPTY
//!     .with_random_tile(&mut rng)
//!     .with_random_tile(&mut rng);
//!
//! // Single-threaded expectimax
//! let mut ex = Expectimax::new();
//! let m = ex.choose_move(b0);
//! assert!(m.is_some());
//!
//! // Parallel expectimax
//! let mut ex_par = ExpectimaxParallel::new();
//! let mv = ex_par.choose_move(b0);
//! assert!(m.is_some() && mv.is_some());
//! ```

use serde::{Deserialize, Serialize};

use crate::engine::{self, Board, Direction};
use crate::heuristic::Evaluate;

mod cache;
mod search_par;
mod search_seq;

pub use search_par::ExpectimaxParallel;
pub use search_seq::Expectimax;

/// How deep to search for a given board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthPolicy {
    /// Always search this many moves ahead.
    Fixed(u64),
    /// `distinct_tiles - 2`, clamped to `min..=max`. Boards with many tile
    /// values need deeper lookahead to plan merges.
    DistinctTiles { min: u64, max: u64 },
}

impl DepthPolicy {
    /// Depth to use for `board`.
    ///
    /// ```
    /// use ai_2048::engine::Board;
    /// use ai_2048::expectimax::DepthPolicy;
    /// let policy = DepthPolicy::DistinctTiles { min: 3, max: 8 };
    /// assert_eq!(policy.depth_for(Board::EMPTY), 3);
    /// assert_eq!(policy.depth_for(Board::from_raw(0x1234_5678_9abc_0000)), 8);
    /// ```
    pub fn depth_for(&self, board: Board) -> u64 {
        match *self {
            DepthPolicy::Fixed(depth) => depth,
            DepthPolicy::DistinctTiles { min, max } => {
                let dyn_depth = (board.count_distinct() as u64).saturating_sub(2);
                dyn_depth.max(min).min(max.max(min))
            }
        }
    }

    /// Largest depth this policy can pick for any board.
    pub fn max_depth(&self) -> u64 {
        match *self {
            DepthPolicy::Fixed(depth) => depth,
            DepthPolicy::DistinctTiles { min, max } => max.max(min),
        }
    }
}

impl Default for DepthPolicy {
    fn default() -> Self { DepthPolicy::DistinctTiles { min: 3, max: 8 } }
}

/// Deepest search that still finishes in real time without probability
/// pruning.
pub const MAX_UNPRUNED_DEPTH: u64 = 4;

/// Value of an interior max node with no legal move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadEnd {
    /// [`DeadEnd::FLOOR`].
    #[default]
    Floor,
    /// Use the evaluator's score of the stuck board.
    Evaluate,
    /// Use a fixed value.
    Value(f64),
}

impl DeadEnd {
    /// Below any evaluation a live board can get, and small enough in
    /// magnitude that a chance node summing sixteen of them stays finite.
    pub const FLOOR: f64 = f64::MIN / 64.0;

    #[inline]
    fn score<E: Evaluate + ?Sized>(self, board: Board, evaluator: &E) -> f64 {
        match self {
            DeadEnd::Floor => DeadEnd::FLOOR,
            DeadEnd::Evaluate => evaluator.evaluate(board),
            DeadEnd::Value(value) => value,
        }
    }
}

/// Configurable knobs for Expectimax. Defaults are the reference policy.
///
/// - `prob_cutoff`: prune chance branches when cumulative probability falls below this value.
/// - `depth`: how many moves to look ahead per board.
/// - `cache_enabled`: enable/disable transposition table usage.
/// - `dead_end`: value of a lost position inside the tree.
/// - `par_thresholds`: thresholds used only by the parallel implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExpectimaxConfig {
    /// Probability cutoff for chance-node pruning.
    pub prob_cutoff: f32,
    pub depth: DepthPolicy,
    /// Enable/disable transposition caching.
    pub cache_enabled: bool,
    pub dead_end: DeadEnd,
    /// Thresholds used by the parallel implementation.
    pub par_thresholds: ParThresholds,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            prob_cutoff: 1e-4,
            depth: DepthPolicy::default(),
            cache_enabled: true,
            dead_end: DeadEnd::default(),
            par_thresholds: ParThresholds::default(),
        }
    }
}

impl ExpectimaxConfig {
    /// The search finishes in bounded time on every reachable board: either
    /// chance branches are pruned by a positive `prob_cutoff`, or the depth
    /// never exceeds [`MAX_UNPRUNED_DEPTH`].
    ///
    /// ```
    /// use ai_2048::expectimax::{DepthPolicy, ExpectimaxConfig};
    /// assert!(ExpectimaxConfig::default().is_bounded());
    /// let exhaustive = ExpectimaxConfig { prob_cutoff: 0.0, ..ExpectimaxConfig::default() };
    /// assert!(!exhaustive.is_bounded());
    /// assert!(ExpectimaxConfig { depth: DepthPolicy::Fixed(3), ..exhaustive }.is_bounded());
    /// ```
    pub fn is_bounded(&self) -> bool {
        let pruned = self.prob_cutoff.is_finite() && self.prob_cutoff > 0.0;
        pruned || self.depth.max_depth() <= MAX_UNPRUNED_DEPTH
    }
}

/// Thresholds used to balance parallel overheads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParThresholds {
    /// Fan out max layers at or above this remaining depth.
    pub max_par_depth: u64,
    /// Fan out chance layers at or above this remaining depth...
    pub par_depth: u64,
    /// ...when they have at least this many empty cells.
    pub par_slots: usize,
    /// Only cache chance nodes at or above this remaining depth.
    pub cache_min_depth: u64,
}

impl Default for ParThresholds {
    fn default() -> Self {
        Self { max_par_depth: 4, par_depth: 4, par_slots: 6, cache_min_depth: 3 }
    }
}

/// Per-branch expected value at the root (no normalization).
///
/// - `ev` is the expected value for taking `dir` from the current board.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Direction,
    pub ev: f64,
    pub legal: bool,
}

/// Basic search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Nodes expanded by the last call.
    pub nodes: u64,
    /// Chance nodes answered from the transposition table in the last call.
    pub cache_hits: u64,
    /// Largest `nodes` seen since the last reset.
    pub peak_nodes: u64,
    /// Depth used by the last call.
    pub depth: u64,
}

impl SearchStats {
    fn record(&mut self, nodes: u64, cache_hits: u64, depth: u64) {
        self.nodes = nodes;
        self.cache_hits = cache_hits;
        self.depth = depth;
        self.peak_nodes = self.peak_nodes.max(nodes);
    }
}

/// Root branches in [`Direction::ALL`] order, all marked illegal.
fn empty_branches() -> [BranchEval; 4] {
    Direction::ALL.map(|dir| BranchEval { dir, ev: 0.0, legal: false })
}

/// First legal branch with the strictly greatest value.
fn pick_best(branches: &[BranchEval; 4]) -> Option<(Direction, f64)> {
    branches.iter().filter(|branch| branch.legal).fold(None, |best, branch| match best {
        Some((_, ev)) if branch.ev <= ev => best,
        _ => Some((branch.dir, branch.ev)),
    })
}

/// Masks that place a 2 in each empty cell; shift left by one for a 4.
struct SpawnSlots {
    remaining: u64,
    tmp: u64,
    insert_tile: u64,
}

impl SpawnSlots {
    fn new(board: Board) -> Self {
        Self { remaining: board.count_empty(), tmp: board.raw(), insert_tile: 1 }
    }
}

impl Iterator for SpawnSlots {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.remaining == 0 {
            return None;
        }
        while (self.tmp & 0xf) != 0 {
            self.tmp >>= 4;
            self.insert_tile <<= 4;
        }
        let slot = self.insert_tile;
        self.tmp >>= 4;
        self.insert_tile <<= 4;
        self.remaining -= 1;
        Some(slot)
    }
}

/// Ensure engine tables exist before timing-sensitive work.
fn warm_engine() {
    engine::init();
}
