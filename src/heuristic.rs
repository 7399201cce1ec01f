//! Board evaluation functions used as search leaves and by the one-ply agent.
//!
//! [`Heuristic`] scores a board from per-line features (empty cells, merge
//! potential, monotonicity, smoothness, tile magnitude) looked up in a
//! precomputed 65,536-entry table for every row and column, plus an optional
//! whole-board bonus for keeping the largest tile in a corner.
//!
//! ```
//! use ai_2048::engine::Board;
//! use ai_2048::heuristic::{Evaluate, Heuristic};
//! let h = Heuristic::default();
//! let b = Board::from_raw(0x1234_0000_0000_0000);
//! assert_eq!(h.evaluate(b).to_bits(), h.evaluate(b).to_bits());
//! ```

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::engine::{self, Board};

/// A pure, total scoring function over boards. Higher is better for the player.
pub trait Evaluate {
    fn evaluate(&self, board: Board) -> f64;
}

impl<E: Evaluate + ?Sized> Evaluate for &E {
    #[inline]
    fn evaluate(&self, board: Board) -> f64 { (**self).evaluate(board) }
}

/// Feature coefficients for [`Heuristic`].
///
/// Defaults follow nneonneo's tuning; `smoothness` and `corner` are off unless
/// a preset or configuration turns them on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeuristicWeights {
    /// Constant added per line.
    pub baseline: f64,
    /// Reward per empty cell.
    pub empty: f64,
    /// Reward per potential merge (runs of equal adjacent tiles).
    pub merges: f64,
    /// Penalty on the weaker of the two monotonic directions.
    pub monotonicity: f64,
    pub monotonicity_power: f64,
    /// Penalty on tile magnitude.
    pub sum: f64,
    pub sum_power: f64,
    /// Penalty per exponent step between adjacent non-empty tiles.
    pub smoothness: f64,
    /// Bonus, scaled by the largest exponent, when that tile sits in a corner.
    pub corner: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            baseline: 200_000.0,
            empty: 270.0,
            merges: 700.0,
            monotonicity: 47.0,
            monotonicity_power: 4.0,
            sum: 11.0,
            sum_power: 3.5,
            smoothness: 0.0,
            corner: 0.0,
        }
    }
}

impl HeuristicWeights {
    /// Reference weights plus smoothness and corner terms, suited to the
    /// one-ply snake agent which cannot see merges coming.
    pub fn corner_seeking() -> Self {
        Self { smoothness: 30.0, corner: 1_000.0, ..Self::default() }
    }

    /// All coefficients are finite and the powers are non-negative.
    pub fn is_valid(&self) -> bool {
        let all = [
            self.baseline,
            self.empty,
            self.merges,
            self.monotonicity,
            self.monotonicity_power,
            self.sum,
            self.sum_power,
            self.smoothness,
            self.corner,
        ];
        all.iter().all(|w| w.is_finite()) && self.monotonicity_power >= 0.0 && self.sum_power >= 0.0
    }
}

/// Weighted feature evaluator backed by a per-line lookup table.
#[derive(Debug, Clone)]
pub struct Heuristic {
    weights: HeuristicWeights,
    line_scores: Arc<[f64]>,
}

static DEFAULT_LINE_SCORES: OnceLock<Arc<[f64]>> = OnceLock::new();

impl Heuristic {
    pub fn new(weights: HeuristicWeights) -> Self {
        let line_scores = if weights == HeuristicWeights::default() {
            DEFAULT_LINE_SCORES.get_or_init(|| build_line_scores(&weights)).clone()
        } else {
            build_line_scores(&weights)
        };
        Self { weights, line_scores }
    }

    pub fn weights(&self) -> &HeuristicWeights { &self.weights }

    #[inline]
    fn corner_bonus(&self, board: Board) -> f64 {
        if self.weights.corner == 0.0 {
            return 0.0;
        }
        let max = board.max_exponent();
        if max != 0 && [0, 3, 12, 15].iter().any(|&cell| board.exponent(cell) == max) {
            self.weights.corner * max as f64
        } else {
            0.0
        }
    }
}

impl Default for Heuristic {
    fn default() -> Self { Self::new(HeuristicWeights::default()) }
}

impl Evaluate for Heuristic {
    #[inline]
    fn evaluate(&self, board: Board) -> f64 {
        let transpose_board = engine::transpose(board.raw());
        let scores = &self.line_scores;
        let lines = (0..4).fold(0., |score, line_idx| {
            let row_val = engine::extract_line(board.raw(), line_idx);
            let col_val = engine::extract_line(transpose_board, line_idx);
            score + scores[row_val as usize] + scores[col_val as usize]
        });
        lines + self.corner_bonus(board)
    }
}

/// Evaluates a board by its accumulated game score.
///
/// Never decreases along a move or a spawn, which makes deeper expectimax
/// searches with it non-worsening.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameScore;

impl Evaluate for GameScore {
    #[inline]
    fn evaluate(&self, board: Board) -> f64 { board.score() as f64 }
}

fn build_line_scores(weights: &HeuristicWeights) -> Arc<[f64]> {
    (0..0x1_0000u64).map(|line| calc_line_score(weights, &engine::line_tiles(line))).collect()
}

// Credit to Nneonneo for heuristic structure
fn calc_line_score(w: &HeuristicWeights, tiles: &[u8; 4]) -> f64 {
    w.baseline + calc_empty(w, tiles) + calc_merges(w, tiles)
        - calc_monotonicity(w, tiles)
        - calc_sum(w, tiles)
        - calc_smoothness(w, tiles)
}

fn calc_sum(w: &HeuristicWeights, line: &[u8; 4]) -> f64 {
    line.iter().fold(0., |acc, &tile_val| acc + (tile_val as f64).powf(w.sum_power)) * w.sum
}

fn calc_empty(w: &HeuristicWeights, line: &[u8; 4]) -> f64 {
    line.iter().filter(|&&tile_val| tile_val == 0).count() as f64 * w.empty
}

fn calc_merges(w: &HeuristicWeights, line: &[u8; 4]) -> f64 {
    let mut prev = 0;
    let mut counter = 0.;
    let mut merges = 0.;
    for &tile_val in line {
        if prev == tile_val && tile_val != 0 {
            counter += 1.;
        } else if counter > 0. {
            merges += 1. + counter;
            counter = 0.;
        }
        prev = tile_val;
    }
    if counter > 0. {
        merges += 1. + counter;
    }
    merges * w.merges
}

fn calc_monotonicity(w: &HeuristicWeights, line: &[u8; 4]) -> f64 {
    let mut monotonicity_left = 0.;
    let mut monotonicity_right = 0.;
    for i in 1..4 {
        let tile1 = (line[i - 1] as f64).powf(w.monotonicity_power);
        let tile2 = (line[i] as f64).powf(w.monotonicity_power);
        if tile1 > tile2 {
            monotonicity_left += tile1 - tile2;
        } else {
            monotonicity_right += tile2 - tile1;
        }
    }
    f64::min(monotonicity_left, monotonicity_right) * w.monotonicity
}

fn calc_smoothness(w: &HeuristicWeights, line: &[u8; 4]) -> f64 {
    if w.smoothness == 0.0 {
        return 0.0;
    }
    line.windows(2)
        .filter(|pair| pair[0] != 0 && pair[1] != 0)
        .map(|pair| (pair[0] as f64 - pair[1] as f64).abs())
        .sum::<f64>()
        * w.smoothness
}
