use log::{debug, trace};

use crate::engine::{Board, Direction};
use crate::heuristic::{Evaluate, Heuristic};

use super::cache::TranspositionTable;
use super::{empty_branches, pick_best, warm_engine, BranchEval, DeadEnd, ExpectimaxConfig, SearchStats, SpawnSlots};

/// Per-call search state: the transposition table and counters.
struct Run {
    map: TranspositionTable,
    nodes: u64,
    cache_hits: u64,
}

impl Run {
    fn new() -> Self { Self { map: TranspositionTable::new(), nodes: 0, cache_hits: 0 } }
}

/// Single-threaded Expectimax search.
///
/// Generic over the leaf evaluator; [`Heuristic`] with the reference
/// weights unless built with [`Expectimax::with_evaluator`].
pub struct Expectimax<E = Heuristic> {
    cfg: ExpectimaxConfig,
    evaluator: E,
    stats: SearchStats,
}

impl Expectimax<Heuristic> {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self { Self::with_evaluator(cfg, Heuristic::default()) }
}

impl Default for Expectimax<Heuristic> {
    fn default() -> Self { Self::new() }
}

impl<E: Evaluate> Expectimax<E> {
    /// Constructors warm the engine tables.
    pub fn with_evaluator(cfg: ExpectimaxConfig, evaluator: E) -> Self {
        warm_engine();
        Self { cfg, evaluator, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    #[inline]
    pub fn evaluator(&self) -> &E { &self.evaluator }

    /// Compute the best move at the depth chosen by the configured policy.
    ///
    /// Example
    /// ```
    /// use ai_2048::engine::Board;
    /// use ai_2048::expectimax::Expectimax;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// let mut ex = Expectimax::new();
    /// assert!(ex.choose_move(b).is_some());
    /// ```
    pub fn choose_move(&mut self, board: Board) -> Option<Direction> {
        let depth = self.cfg.depth.depth_for(board);
        let result = self.search(board, depth);
        match result {
            Some((dir, ev)) => debug!(
                "expectimax: {dir} ev={ev:.1} depth={depth} nodes={} cache_hits={}",
                self.stats.nodes, self.stats.cache_hits
            ),
            None => debug!("expectimax: no legal move for {board:?}"),
        }
        result.map(|(dir, _)| dir)
    }

    /// Best direction and its value searching `depth` moves ahead.
    ///
    /// `None` iff no direction moves the board.
    pub fn search(&mut self, board: Board, depth: u64) -> Option<(Direction, f64)> {
        pick_best(&self.branch_evals_at(board, depth))
    }

    /// Compute EV for each direction (no normalization).
    ///
    /// Returns a fixed array in [`Direction::ALL`] order and marks illegal
    /// moves as `legal=false`.
    ///
    /// Example
    /// ```
    /// use ai_2048::engine::Board;
    /// use ai_2048::expectimax::Expectimax;
    /// let b = Board::from_raw(0x1000_0000_0000_0000);
    /// let mut ex = Expectimax::new();
    /// let branches = ex.branch_evals(b);
    /// assert!(!branches[0].legal && branches[1].legal);
    /// ```
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        let depth = self.cfg.depth.depth_for(board);
        self.branch_evals_at(board, depth)
    }

    pub fn branch_evals_at(&mut self, board: Board, depth: u64) -> [BranchEval; 4] {
        let mut run = Run::new();
        let mut out = empty_branches();
        for (slot, dir) in out.iter_mut().zip(Direction::ALL) {
            let new_board = board.shift(dir);
            if new_board != board {
                let ev = self.evaluate_chance(new_board, depth, 1.0, &mut run);
                trace!("expectimax: branch {dir} ev={ev:.1}");
                *slot = BranchEval { dir, ev, legal: true };
            }
        }
        self.stats.record(run.nodes, run.cache_hits, depth);
        out
    }

    /// EV at root (max node), equivalent to the best branch EV.
    ///
    /// A terminal board is valued like an interior dead end.
    pub fn state_value(&mut self, board: Board) -> f64 {
        match pick_best(&self.branch_evals(board)) {
            Some((_, ev)) => ev,
            None => self.dead_end(board),
        }
    }

    /// Statistics collected from the last search call.
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    #[inline]
    fn dead_end(&self, board: Board) -> f64 { self.cfg.dead_end.score(board, &self.evaluator) }

    fn evaluate_max(&self, board: Board, move_depth: u64, cum_prob: f32, run: &mut Run) -> f64 {
        run.nodes += 1;
        let mut best_score: Option<f64> = None;
        for direction in Direction::ALL {
            let new_board = board.shift(direction);
            if new_board != board {
                let score = self.evaluate_chance(new_board, move_depth, cum_prob, run);
                if best_score.map_or(true, |best| score > best) {
                    best_score = Some(score);
                }
            }
        }
        best_score.unwrap_or_else(|| self.dead_end(board))
    }

    fn evaluate_chance(&self, board: Board, move_depth: u64, cum_prob: f32, run: &mut Run) -> f64 {
        run.nodes += 1;
        if move_depth == 0 || cum_prob < self.cfg.prob_cutoff {
            return self.evaluator.evaluate(board);
        }
        if self.cfg.cache_enabled {
            if let Some(score) = run.map.get(board, move_depth) {
                run.cache_hits += 1;
                return score;
            }
        }
        let num_empty_tiles = board.count_empty();
        if num_empty_tiles == 0 {
            return self.evaluator.evaluate(board);
        }
        let base_prob = cum_prob / num_empty_tiles as f32;
        let mut score = 0.0;
        for insert_tile in SpawnSlots::new(board) {
            let new_board2 = Board::from_raw(board.raw() | insert_tile);
            score += self.evaluate_max(new_board2, move_depth - 1, base_prob * 0.9, run) * 0.9;
            let new_board4 = Board::from_raw(board.raw() | (insert_tile << 1));
            score += self.evaluate_max(new_board4, move_depth - 1, base_prob * 0.1, run) * 0.1;
        }
        score /= num_empty_tiles as f64;
        if self.cfg.cache_enabled {
            run.map.insert(board, move_depth, score);
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectimax::tests::Flat;
    use crate::expectimax::DepthPolicy;
    use crate::heuristic::GameScore;

    fn exact(depth: u64) -> ExpectimaxConfig {
        ExpectimaxConfig {
            prob_cutoff: 0.0,
            depth: DepthPolicy::Fixed(depth),
            cache_enabled: false,
            dead_end: DeadEnd::Evaluate,
            ..ExpectimaxConfig::default()
        }
    }

    #[test]
    fn terminal_board_has_no_move() {
        let mut ex = Expectimax::new();
        let full = Board::from_raw(0x1234_4321_1234_4321);
        assert_eq!(ex.search(full, 3), None);
        assert_eq!(ex.choose_move(full), None);
        assert!(ex.branch_evals(full).iter().all(|b| !b.legal));
        assert_eq!(ex.state_value(full), DeadEnd::FLOOR);
    }

    #[test]
    fn never_walks_into_certain_loss() {
        // Up leaves one hole at cell 14, and either spawn there locks the
        // board. The other three moves stay alive but score far below zero.
        let board = Board::from_raw(0x3694_710f_d733_634e);
        let after_up = board.shift(Direction::Up);
        assert_eq!(after_up.available_cells(), vec![14]);
        for tile in [1, 2] {
            assert!(after_up.spawn(14, tile).expect("cell 14 is empty").is_terminal());
        }

        let cfg = ExpectimaxConfig { depth: DepthPolicy::Fixed(1), ..ExpectimaxConfig::default() };
        let mut ex = Expectimax::with_config(cfg);
        let branches = ex.branch_evals(board);
        assert!(branches.iter().all(|b| b.legal));
        assert!((branches[0].ev / DeadEnd::FLOOR - 1.0).abs() < 1e-12);
        for branch in &branches[1..] {
            assert!(branch.ev > branches[0].ev, "{}: {}", branch.dir, branch.ev);
        }
        let chosen = ex.choose_move(board);
        assert!(chosen.is_some());
        assert_ne!(chosen, Some(Direction::Up));
    }

    #[test]
    fn ties_break_in_enumeration_order() {
        let mut ex = Expectimax::with_evaluator(ExpectimaxConfig::default(), Flat);
        // Only Right and Down move a lone top-left tile.
        let corner = Board::from_raw(0x1000_0000_0000_0000);
        for depth in 0..3 {
            assert_eq!(ex.search(corner, depth), Some((Direction::Right, 0.0)));
        }
        // A lone tile in the middle can move every way.
        let middle = Board::from_raw(0x0000_0100_0000_0000);
        for _ in 0..3 {
            assert_eq!(ex.search(middle, 1), Some((Direction::Up, 0.0)));
        }
    }

    #[test]
    fn depth_zero_is_one_ply_lookahead() {
        let mut ex = Expectimax::with_evaluator(exact(0), GameScore);
        let board = Board::from_raw(0x1100_0000_0000_2200);
        let branches = ex.branch_evals_at(board, 0);
        for branch in branches.iter().filter(|b| b.legal) {
            assert_eq!(branch.ev, board.shift(branch.dir).score() as f64);
        }
        assert_eq!(ex.last_stats().nodes, branches.iter().filter(|b| b.legal).count() as u64);
    }

    #[test]
    fn deeper_search_never_worse_with_monotone_evaluator() {
        let mut ex = Expectimax::with_evaluator(exact(1), GameScore);
        let board = Board::from_raw(0x1234_2143_1200_0000);
        let mut prev = f64::NEG_INFINITY;
        for depth in 0..=3 {
            let (_, value) = ex.search(board, depth).expect("board has moves");
            assert!(value >= prev, "depth {depth}: {value} < {prev}");
            prev = value;
        }
    }

    #[test]
    fn cache_saves_work() {
        let board = Board::from_raw(0x1200_2100_0000_0000);
        let mut cached = Expectimax::with_evaluator(
            ExpectimaxConfig { cache_enabled: true, ..exact(3) },
            Heuristic::default(),
        );
        let mut plain = Expectimax::with_evaluator(exact(3), Heuristic::default());
        let a = cached.branch_evals_at(board, 3);
        let b = plain.branch_evals_at(board, 3);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.legal, y.legal);
            assert_eq!(x.ev, y.ev);
        }
        assert!(cached.last_stats().cache_hits > 0);
        assert!(cached.last_stats().nodes < plain.last_stats().nodes);
        assert_eq!(plain.last_stats().cache_hits, 0);
    }

    #[test]
    fn cached_values_match_uncached_on_random_boards() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(2048);
        let mut cached = Expectimax::with_config(ExpectimaxConfig { cache_enabled: true, ..exact(3) });
        let mut plain = Expectimax::with_config(exact(3));
        for _ in 0..8 {
            let mut board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
            // A random opening fills the board enough to keep the exhaustive search small.
            for _ in 0..rng.gen_range(20..40) {
                let legal: Vec<Direction> = board.legal_moves().collect();
                if legal.is_empty() {
                    break;
                }
                let dir = legal[rng.gen_range(0..legal.len())];
                board = board.shift(dir).with_random_tile(&mut rng);
            }
            let a = cached.branch_evals_at(board, 3);
            let b = plain.branch_evals_at(board, 3);
            for (x, y) in a.iter().zip(b.iter()) {
                assert_eq!(x.legal, y.legal);
                let tolerance = 1e-9 * y.ev.abs().max(1.0);
                assert!((x.ev - y.ev).abs() <= tolerance, "{board:?} {}: {} vs {}", x.dir, x.ev, y.ev);
            }
        }
    }

    #[test]
    fn dead_end_value_applies_inside_tree() {
        // Down leaves a single hole whose every spawn locks the board; Right stays live.
        let board = Board::from_raw(0x1234_4321_1234_4320);
        let cfg = ExpectimaxConfig { dead_end: DeadEnd::Value(-1e9), ..exact(1) };
        let mut ex = Expectimax::with_evaluator(cfg, Flat);
        let branches = ex.branch_evals_at(board, 1);
        assert!(!branches[0].legal && !branches[3].legal);
        assert_eq!(branches[1].ev, 0.0);
        assert_eq!(branches[2].ev, -1e9);
        assert_eq!(ex.search(board, 1), Some((Direction::Right, 0.0)));

        let mut evaluating = Expectimax::with_evaluator(exact(1), Flat);
        assert_eq!(evaluating.branch_evals_at(board, 1)[2].ev, 0.0);
    }

    #[test]
    fn stats_track_peak_and_reset() {
        let mut ex = Expectimax::new();
        let board = Board::from_raw(0x1200_0000_0000_0001);
        ex.search(board, 2);
        let deep = ex.last_stats();
        assert_eq!(deep.depth, 2);
        ex.search(board, 0);
        let shallow = ex.last_stats();
        assert!(shallow.nodes < deep.nodes);
        assert_eq!(shallow.peak_nodes, deep.nodes);
        ex.reset_stats();
        assert_eq!(ex.last_stats(), SearchStats::default());
    }
}
