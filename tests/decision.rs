use ai_2048::agent::{Agent, Snake, Strategy};
use ai_2048::config::{AgentConfig, AgentKind};
use ai_2048::engine::{Board, Direction};
use ai_2048::expectimax::{DeadEnd, DepthPolicy, Expectimax, ExpectimaxConfig, ExpectimaxParallel};
use ai_2048::facade::{Decider, DecisionError};
use ai_2048::heuristic::{Evaluate, GameScore, Heuristic};
use ai_2048::runner::{run_games, GameLimits};
use std::convert::Infallible;

/// Every board is worth the same, so every live direction ties exactly.
struct Flat;

impl Evaluate for Flat {
    fn evaluate(&self, _board: Board) -> f64 { 0.0 }
}

#[test]
fn equal_values_resolve_in_enumeration_order() {
    // Mirror-symmetric about the main diagonal: Right and Down tie, Up and Left are blocked.
    let symmetric = Board::from_raw(0x1000_0000_0000_0000);
    let mut ex = Expectimax::with_evaluator(ExpectimaxConfig::default(), Flat);
    let mut par = ExpectimaxParallel::with_evaluator(ExpectimaxConfig::default(), Flat);
    let mut snake = Snake::with_evaluator(Flat);
    for _ in 0..5 {
        assert_eq!(ex.search(symmetric, 2).map(|(d, _)| d), Some(Direction::Right));
        assert_eq!(par.search(symmetric, 2).map(|(d, _)| d), Some(Direction::Right));
        assert_eq!(Agent::choose_move(&mut snake, symmetric), Some(Direction::Right));
    }
    let centre = Board::from_raw(0x0000_0110_0110_0000);
    assert_eq!(ex.search(centre, 1).map(|(d, _)| d), Some(Direction::Up));
}

#[test]
fn repeated_decisions_are_identical() {
    let board = Board::from_raw(0x1210_0321_0012_0001);
    let mut ex = Expectimax::new();
    let first = ex.branch_evals(board);
    for _ in 0..3 {
        let again = ex.branch_evals(board);
        for (a, b) in first.iter().zip(again.iter()) {
            assert_eq!(a.legal, b.legal);
            assert_eq!(a.ev.to_bits(), b.ev.to_bits());
        }
    }
}

#[test]
fn deeper_search_is_never_worse_for_score_evaluator() {
    for cache_enabled in [false, true] {
        let cfg = ExpectimaxConfig { prob_cutoff: 0.0, cache_enabled, dead_end: DeadEnd::Evaluate, ..ExpectimaxConfig::default() };
        let mut ex = Expectimax::with_evaluator(cfg, GameScore);
        for raw in [0x1234_2143_1200_0000u64, 0x2211_0300_0000_1000] {
            let board = Board::from_raw(raw);
            let values: Vec<f64> = (1..=3).map(|d| ex.search(board, d).expect("live board").1).collect();
            assert!(values.windows(2).all(|w| w[1] >= w[0]), "cache={cache_enabled} {board:?}: {values:?}");
        }
    }
}

#[test]
fn cache_never_changes_the_decision() {
    let exhaustive = ExpectimaxConfig { prob_cutoff: 0.0, depth: DepthPolicy::Fixed(2), ..ExpectimaxConfig::default() };
    let mut cached = Expectimax::with_config(exhaustive.clone());
    let mut plain = Expectimax::with_config(ExpectimaxConfig { cache_enabled: false, ..exhaustive });
    for raw in [0x1210_0321_0012_0001u64, 0x1234_2143_1200_0000, 0x5432_0000_0000_0001] {
        let board = Board::from_raw(raw);
        let (a, b) = (cached.branch_evals(board), plain.branch_evals(board));
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x.ev - y.ev).abs() <= 1e-9 * y.ev.abs().max(1.0), "{board:?} {x:?} vs {y:?}");
        }
        assert_eq!(cached.choose_move(board), plain.choose_move(board));
    }
}

#[test]
fn depth_zero_matches_one_ply_agent() {
    let h = Heuristic::default();
    let mut ex = Expectimax::with_evaluator(ExpectimaxConfig::default(), h.clone());
    let snake = Snake::with_evaluator(h);
    for raw in [0x1200_0340_0000_0001u64, 0x1111_2222_0000_0000, 0x5432_0000_0000_0001] {
        let board = Board::from_raw(raw);
        assert_eq!(ex.search(board, 0).map(|(d, _)| d), snake.choose_move(board), "{board:?}");
    }
}

#[test]
fn decider_contract() {
    for kind in AgentKind::ALL {
        let cfg = AgentConfig {
            agent: kind,
            search: ExpectimaxConfig { depth: DepthPolicy::Fixed(1), ..ExpectimaxConfig::default() },
            max_exponent: 11,
            ..AgentConfig::default()
        };
        let mut decider = cfg.decider().unwrap();
        let board = 0x1200_0340_0000_0001u64;
        let code = decider.choose_move(board).unwrap();
        let dir = Direction::from_code(code).unwrap();
        assert_ne!(Board::from_raw(board).shift(dir), Board::from_raw(board), "{kind}");
        assert_eq!(decider.choose_move(0x1234_4321_1234_4321), Err(DecisionError::NoLegalMove));
        assert!(matches!(decider.choose_move(0x00c0_0000_0000_0000), Err(DecisionError::InvalidBoard { cell: 2, .. })));
        assert_eq!(decider.choose_move_code(0x1234_4321_1234_4321), -1);
        assert_eq!(decider.choose_move_code(0x00c0_0000_0000_0000), -2);
    }
}

#[test]
fn default_decider_accepts_largest_nibble() {
    let mut decider = Decider::new(Box::new(Strategy::left_corner()));
    assert!(decider.choose_move(0xf000_0000_0000_0001).is_ok());
}

#[test]
fn seeded_batches_reproduce() {
    let limits = GameLimits { max_moves: Some(60), ..GameLimits::default() };
    let cfg = ExpectimaxConfig { depth: DepthPolicy::Fixed(1), ..ExpectimaxConfig::default() };
    let make = || Ok::<_, Infallible>(Expectimax::with_config(cfg.clone()));
    let a = run_games(3, 7, limits, make, |_| {}).unwrap();
    let b = run_games(3, 7, limits, make, |_| {}).unwrap();
    assert_eq!(a, b);
    assert!(a.iter().all(|s| s.moves <= 60));
}
