use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace};
use rayon::prelude::*;

use crate::engine::{Board, Direction};
use crate::heuristic::{Evaluate, Heuristic};

use super::cache::SharedTranspositionTable;
use super::{
    empty_branches, pick_best, warm_engine, BranchEval, ExpectimaxConfig, ParThresholds, SearchStats, SpawnSlots,
};

/// Per-call state shared by every worker.
struct Run {
    map: SharedTranspositionTable,
    nodes: AtomicU64,
    cache_hits: AtomicU64,
}

impl Run {
    fn new() -> Self {
        Self { map: SharedTranspositionTable::new(), nodes: AtomicU64::new(0), cache_hits: AtomicU64::new(0) }
    }
}

/// Parallel Expectimax using rayon and a shared `DashMap` transposition table.
///
/// Same values and move choice as [`super::Expectimax`] up to floating-point
/// summation order, with or without the cache. Thresholds in
/// [`ParThresholds`] decide where to fan out.
pub struct ExpectimaxParallel<E = Heuristic> {
    cfg: ExpectimaxConfig,
    evaluator: E,
    stats: SearchStats,
}

impl ExpectimaxParallel<Heuristic> {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self { Self::with_evaluator(cfg, Heuristic::default()) }
}

impl Default for ExpectimaxParallel<Heuristic> {
    fn default() -> Self { Self::new() }
}

impl<E: Evaluate + Sync> ExpectimaxParallel<E> {
    pub fn with_evaluator(cfg: ExpectimaxConfig, evaluator: E) -> Self {
        warm_engine();
        Self { cfg, evaluator, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    #[inline]
    pub fn evaluator(&self) -> &E { &self.evaluator }

    /// Compute the best move using parallel expectimax.
    ///
    /// This is a convenience wrapper around `branch_evals` that just picks the best move.
    pub fn choose_move(&mut self, board: Board) -> Option<Direction> {
        let depth = self.cfg.depth.depth_for(board);
        let result = self.search(board, depth);
        match result {
            Some((dir, ev)) => debug!(
                "expectimax_par: {dir} ev={ev:.1} depth={depth} nodes={} cache_hits={}",
                self.stats.nodes, self.stats.cache_hits
            ),
            None => debug!("expectimax_par: no legal move for {board:?}"),
        }
        result.map(|(dir, _)| dir)
    }

    pub fn search(&mut self, board: Board, depth: u64) -> Option<(Direction, f64)> {
        pick_best(&self.branch_evals_at(board, depth))
    }

    /// Convenience function for batch runners: best move and all branch evaluations.
    pub fn choose_move_with_branches(&mut self, board: Board) -> (Option<Direction>, [BranchEval; 4]) {
        let branches = self.branch_evals(board);
        (pick_best(&branches).map(|(dir, _)| dir), branches)
    }

    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        let depth = self.cfg.depth.depth_for(board);
        self.branch_evals_at(board, depth)
    }

    /// Core function: compute EV for each direction (no normalization) in parallel.
    ///
    /// Returns a fixed array in [`Direction::ALL`] order and marks illegal
    /// moves as `legal=false`.
    pub fn branch_evals_at(&mut self, board: Board, depth: u64) -> [BranchEval; 4] {
        let run = Run::new();
        // Indexed collect keeps enumeration order regardless of completion order.
        let evs: Vec<Option<f64>> = Direction::ALL
            .par_iter()
            .map(|&dir| {
                let new_board = board.shift(dir);
                (new_board != board).then(|| self.evaluate_chance(new_board, depth, 1.0, &run))
            })
            .collect();
        let mut out = empty_branches();
        for ((slot, dir), ev) in out.iter_mut().zip(Direction::ALL).zip(evs) {
            if let Some(ev) = ev {
                trace!("expectimax_par: branch {dir} ev={ev:.1}");
                *slot = BranchEval { dir, ev, legal: true };
            }
        }
        self.stats.record(run.nodes.into_inner(), run.cache_hits.into_inner(), depth);
        out
    }

    /// EV at root (max node), equivalent to the best branch EV.
    pub fn state_value(&mut self, board: Board) -> f64 {
        match pick_best(&self.branch_evals(board)) {
            Some((_, ev)) => ev,
            None => self.dead_end(board),
        }
    }

    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    #[inline]
    fn dead_end(&self, board: Board) -> f64 { self.cfg.dead_end.score(board, &self.evaluator) }

    fn evaluate_max_parallel(&self, board: Board, move_depth: u64, cum_prob: f32, run: &Run) -> f64 {
        run.nodes.fetch_add(1, Ordering::Relaxed);
        let ParThresholds { max_par_depth, .. } = self.cfg.par_thresholds;
        let child = |dir: Direction| {
            let new_board = board.shift(dir);
            (new_board != board).then(|| self.evaluate_chance(new_board, move_depth, cum_prob, run))
        };
        let best = if move_depth >= max_par_depth {
            Direction::ALL.par_iter().filter_map(|&dir| child(dir)).reduce_with(f64::max)
        } else {
            Direction::ALL.iter().filter_map(|&dir| child(dir)).reduce(f64::max)
        };
        best.unwrap_or_else(|| self.dead_end(board))
    }

    fn evaluate_chance(&self, board: Board, move_depth: u64, cum_prob: f32, run: &Run) -> f64 {
        run.nodes.fetch_add(1, Ordering::Relaxed);
        if move_depth == 0 || cum_prob < self.cfg.prob_cutoff {
            return self.evaluator.evaluate(board);
        }
        if self.cfg.cache_enabled {
            if let Some(score) = run.map.get(board, move_depth) {
                run.cache_hits.fetch_add(1, Ordering::Relaxed);
                return score;
            }
        }
        let num_empty_tiles = board.count_empty() as usize;
        if num_empty_tiles == 0 {
            return self.evaluator.evaluate(board);
        }
        let base_prob = cum_prob / (num_empty_tiles as f32);
        let spawn = |ins: u64| {
            let new_board_2 = Board::from_raw(board.raw() | ins);
            let s2 = self.evaluate_max_parallel(new_board_2, move_depth - 1, base_prob * 0.9, run) * 0.9;
            let new_board_4 = Board::from_raw(board.raw() | (ins << 1));
            let s4 = self.evaluate_max_parallel(new_board_4, move_depth - 1, base_prob * 0.1, run) * 0.1;
            s2 + s4
        };
        let ParThresholds { par_depth, par_slots, cache_min_depth, .. } = self.cfg.par_thresholds;
        let sum: f64 = if move_depth >= par_depth && num_empty_tiles >= par_slots {
            let slots: Vec<u64> = SpawnSlots::new(board).collect();
            slots.into_par_iter().map(spawn).sum()
        } else {
            SpawnSlots::new(board).map(spawn).sum()
        };
        let score = sum / (num_empty_tiles as f64);
        if self.cfg.cache_enabled && move_depth >= cache_min_depth {
            run.map.insert(board, move_depth, score);
        }
        score
    }
}
