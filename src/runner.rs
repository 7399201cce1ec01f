//! Game driver: plays whole games with any [`Agent`] and a seeded RNG, and
//! aggregates results over many games.
//!
//! ```
//! use ai_2048::agent::Snake;
//! use ai_2048::runner::{play_game, GameLimits};
//! use rand::{rngs::StdRng, SeedableRng};
//! let mut rng = StdRng::seed_from_u64(1);
//! let summary = play_game(&mut Snake::new(), &mut rng, GameLimits { max_moves: Some(50), ..GameLimits::default() });
//! assert!(summary.moves <= 50);
//! ```

use std::collections::BTreeMap;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::agent::Agent;
use crate::engine::{Board, Direction};

/// Optional early-stop conditions for a game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameLimits {
    /// Stop after this many moves.
    pub max_moves: Option<u64>,
    /// Stop once a tile of at least this value appears.
    pub stop_tile: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSummary {
    pub moves: u64,
    /// Sum of merge scores over the game, as a 2048 UI would display it.
    pub score: u64,
    pub highest_tile: u64,
    pub final_board: Board,
    /// True when the game ended because no move was left.
    pub game_over: bool,
}

/// A fresh game: two random tiles on an empty board.
pub fn initial_board<R: Rng + ?Sized>(rng: &mut R) -> Board {
    Board::EMPTY.with_random_tile(rng).with_random_tile(rng)
}

pub fn play_game<A, R>(agent: &mut A, rng: &mut R, limits: GameLimits) -> GameSummary
where
    A: Agent + ?Sized,
    R: Rng + ?Sized,
{
    play_game_with(agent, rng, limits, |_, _| {})
}

/// [`play_game`], calling `on_move` with each decision and the board after it.
pub fn play_game_with<A, R, F>(agent: &mut A, rng: &mut R, limits: GameLimits, mut on_move: F) -> GameSummary
where
    A: Agent + ?Sized,
    R: Rng + ?Sized,
    F: FnMut(Direction, Board),
{
    let mut board = initial_board(rng);
    let mut moves = 0u64;
    let mut score = 0u64;
    let game_over = loop {
        if limits.max_moves.is_some_and(|limit| moves >= limit)
            || limits.stop_tile.is_some_and(|tile| board.highest_tile() >= tile)
        {
            break false;
        }
        let Some(direction) = agent.choose_move(board) else { break true };
        let outcome = board.apply(direction);
        if !outcome.moved {
            // Agents only return legal moves; treat anything else as the end.
            warn!("{} chose blocked move {direction}", agent.name());
            break true;
        }
        score += outcome.merge_score;
        board = outcome.board.with_random_tile(rng);
        moves += 1;
        on_move(direction, board);
    };
    let summary = GameSummary { moves, score, highest_tile: board.highest_tile(), final_board: board, game_over };
    info!(
        "{}: game finished after {} moves, score {}, highest tile {}{}",
        agent.name(),
        summary.moves,
        summary.score,
        summary.highest_tile,
        if game_over { "" } else { " (stopped early)" }
    );
    summary
}

/// Play `games` games in parallel, game `i` seeded with `seed + i`.
///
/// Each game gets its own agent from `make_agent`. Results come back in game
/// order, so a fixed seed reproduces the same summaries.
pub fn run_games<A, E, F, G>(games: u64, seed: u64, limits: GameLimits, make_agent: F, on_game: G) -> Result<Vec<GameSummary>, E>
where
    A: Agent,
    E: Send,
    F: Fn() -> Result<A, E> + Sync,
    G: Fn(&GameSummary) + Sync,
{
    (0..games)
        .into_par_iter()
        .map(|i| {
            let mut agent = make_agent()?;
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i));
            let summary = play_game(&mut agent, &mut rng, limits);
            on_game(&summary);
            Ok(summary)
        })
        .collect()
}

/// Aggregate statistics over a batch of games.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub games: usize,
    pub mean_score: f64,
    pub median_score: u64,
    pub max_score: u64,
    pub mean_moves: f64,
    /// How many games ended with each highest tile.
    pub highest_tiles: BTreeMap<u64, usize>,
}

impl Evaluation {
    pub fn from_summaries(summaries: &[GameSummary]) -> Self {
        let games = summaries.len();
        let n = games.max(1) as f64;
        let mut scores: Vec<u64> = summaries.iter().map(|s| s.score).collect();
        scores.sort_unstable();
        let mut highest_tiles = BTreeMap::new();
        for summary in summaries {
            *highest_tiles.entry(summary.highest_tile).or_insert(0) += 1;
        }
        Evaluation {
            games,
            mean_score: scores.iter().sum::<u64>() as f64 / n,
            median_score: scores.get(games / 2).copied().unwrap_or(0),
            max_score: scores.last().copied().unwrap_or(0),
            mean_moves: summaries.iter().map(|s| s.moves).sum::<u64>() as f64 / n,
            highest_tiles,
        }
    }

    /// Fraction of games whose highest tile reached at least `tile`.
    pub fn reach_rate(&self, tile: u64) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        let reached: usize = self.highest_tiles.range(tile..).map(|(_, count)| count).sum();
        reached as f64 / self.games as f64
    }
}
