use ai_2048::agent::Snake;
use ai_2048::engine::{Board, Direction};
use ai_2048::heuristic::{Evaluate, Heuristic, HeuristicWeights};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(1337);
    let mut boards = Vec::new();
    boards.push(Board::EMPTY);
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    let seq = [Direction::Left, Direction::Up, Direction::Right, Direction::Down];
    for i in 0..24 {
        let dir = seq[i % seq.len()];
        let nb = b.shift(dir);
        if nb != b { b = nb.with_random_tile(&mut rng); }
        boards.push(b);
    }
    boards
}

fn bench_heuristic(c: &mut Criterion) {
    let boards = corpus();
    for (name, h) in [
        ("heuristic/default", Heuristic::default()),
        ("heuristic/corner_seeking", Heuristic::new(HeuristicWeights::corner_seeking())),
    ] {
        c.bench_function(name, |bch| {
            bch.iter(|| {
                let mut acc = 0f64;
                for &bd in &boards {
                    let v = h.evaluate(bd);
                    acc = acc.mul_add(1.000_000_1, v);
                }
                black_box(acc)
            })
        });
    }
    c.bench_function("heuristic/table_build", |bch| {
        let w = HeuristicWeights { empty: 271.0, ..HeuristicWeights::default() };
        bch.iter(|| black_box(Heuristic::new(w)))
    });
}

fn bench_snake(c: &mut Criterion) {
    let boards = corpus();
    let snake = Snake::new();
    c.bench_function("snake/choose_move", |bch| {
        bch.iter(|| {
            let mut acc = 0u32;
            for &bd in &boards {
                acc += snake.choose_move(bd).map_or(4, |d| d.code() as u32);
            }
            black_box(acc)
        })
    });
}

criterion_group!(heuristic, bench_heuristic, bench_snake);
criterion_main!(heuristic);
