use std::path::PathBuf;
use std::time::{Duration, Instant};

use ai_2048::agent::strategy::compare::Confidence;
use ai_2048::agent::strategy::search::{Duel, GreedySearch, LocalSearch, Priority};
use ai_2048::agent::{Strategy, StrategySpec};
use ai_2048::config::{AgentConfig, AgentKind};
use ai_2048::engine::{self as GameEngine, Direction};
use ai_2048::expectimax::DepthPolicy;
use ai_2048::facade::{decode, DecisionError};
use ai_2048::runner::{self, Evaluation, GameLimits};
use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Parser)]
#[command(name = "ai-2048", about = "2048 move-search agents: play, evaluate, decide, search strategies")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Play one game and print the board after every move
    Play {
        #[command(flatten)]
        agent: AgentArgs,
        #[command(flatten)]
        limits: LimitArgs,
        /// RNG seed for tile spawns
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Only print the final board
        #[arg(long)]
        quiet: bool,
    },
    /// Play many games in parallel and report aggregate results
    Evaluate {
        #[command(flatten)]
        agent: AgentArgs,
        #[command(flatten)]
        limits: LimitArgs,
        /// Number of games
        #[arg(long, default_value_t = 20)]
        games: u64,
        /// Seed of the first game; game i uses seed + i
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Suppress the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Choose a move for one packed board (hex, e.g. 0x1100000000000000)
    Decide {
        #[command(flatten)]
        agent: AgentArgs,
        board: String,
    },
    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        agent: AgentArgs,
    },
    /// Search for a rule-based strategy by duelling candidates over seeded games
    Search {
        #[arg(long, value_enum, default_value_t = SearchMethod::Greedy)]
        method: SearchMethod,
        /// Greedy only: which kind of rule to add first
        #[arg(long, value_enum, default_value_t = PriorityArg::Try)]
        priority: PriorityArg,
        #[arg(long, default_value_t = 2)]
        max_ban_rules: usize,
        #[arg(long, default_value_t = 4)]
        max_try_rules: usize,
        /// Local only: TOML strategy to improve; the left-corner strategy when absent
        #[arg(long)]
        start: Option<PathBuf>,
        /// Local only: upper bound on improvement passes
        #[arg(long, default_value_t = 100)]
        rounds: usize,
        /// Most games either side of a duel may play
        #[arg(long, default_value_t = 20_000)]
        max_games: u64,
        /// Seed of every strategy's first game
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[command(flatten)]
        limits: LimitArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SearchMethod {
    Greedy,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PriorityArg {
    Try,
    Ban,
    Best,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Try => Priority::Try,
            PriorityArg::Ban => Priority::Ban,
            PriorityArg::Best => Priority::Best,
        }
    }
}

#[derive(Debug, Args)]
struct AgentArgs {
    /// TOML agent configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the agent kind (expectimax, expectimax-parallel, snake, strategy, random, sequence)
    #[arg(long)]
    agent: Option<AgentKind>,
    /// Override the search with a fixed depth
    #[arg(long)]
    depth: Option<u64>,
}

impl AgentArgs {
    fn resolve(&self) -> anyhow::Result<AgentConfig> {
        let mut cfg = match &self.config {
            Some(path) => AgentConfig::load(path)?,
            None => AgentConfig::default(),
        };
        if let Some(kind) = self.agent {
            cfg.agent = kind;
        }
        if let Some(depth) = self.depth {
            cfg.search.depth = DepthPolicy::Fixed(depth);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Args)]
struct LimitArgs {
    /// Stop after this many moves
    #[arg(long)]
    steps: Option<u64>,
    /// Stop once highest tile >= this value
    #[arg(long)]
    stop_tile: Option<u64>,
}

impl From<&LimitArgs> for GameLimits {
    fn from(args: &LimitArgs) -> Self { GameLimits { max_moves: args.steps, stop_tile: args.stop_tile } }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new().filter_level(default_level).parse_default_env().init();
    GameEngine::init();

    match cli.cmd {
        Cmd::Play { agent, limits, seed, quiet } => play(&agent, &limits, seed, quiet),
        Cmd::Evaluate { agent, limits, games, seed, quiet } => evaluate(&agent, &limits, games, seed, quiet),
        Cmd::Decide { agent, board } => decide(&agent, &board),
        Cmd::Config { agent } => {
            print!("{}", agent.resolve()?.to_toml_string()?);
            Ok(())
        }
        Cmd::Search { method, priority, max_ban_rules, max_try_rules, start, rounds, max_games, seed, limits } => {
            let duel = Duel { max_games, seed, limits: (&limits).into(), confidence: Confidence::P01, ..Duel::default() };
            let found = match method {
                SearchMethod::Greedy => GreedySearch {
                    max_ban_rules,
                    max_try_rules,
                    priority: priority.into(),
                    duel,
                    ..GreedySearch::default()
                }
                .run(),
                SearchMethod::Local => {
                    let start = match start {
                        Some(path) => {
                            let text = std::fs::read_to_string(&path)
                                .with_context(|| format!("failed to read {}", path.display()))?;
                            Strategy::try_from(toml::from_str::<StrategySpec>(&text)?)?
                        }
                        None => Strategy::left_corner(),
                    };
                    LocalSearch { max_rounds: rounds, duel, ..LocalSearch::default() }.run(start)
                }
            };
            let eval = found.evaluation();
            println!("{}", found.strategy());
            println!("Games: {} | mean score {:.1} | median {}", eval.games, eval.mean_score, eval.median_score);
            print!("{}", toml::to_string_pretty(&StrategySpec::from(found.strategy()))?);
            Ok(())
        }
    }
}

fn play(agent_args: &AgentArgs, limits: &LimitArgs, seed: u64, quiet: bool) -> anyhow::Result<()> {
    let cfg = agent_args.resolve()?;
    let mut agent = cfg.build()?;
    let mut rng = StdRng::seed_from_u64(seed);
    let start = Instant::now();
    let summary = runner::play_game_with(agent.as_mut(), &mut rng, limits.into(), |dir, board| {
        if !quiet {
            println!("{dir}\n{board}");
        }
    });
    if quiet {
        println!("{}", summary.final_board);
    }
    let elapsed = start.elapsed().as_secs_f64().max(1e-6);
    println!(
        "Moves: {} | moves/sec: {:.1} | score: {} | highest tile: {}{}",
        summary.moves,
        summary.moves as f64 / elapsed,
        summary.score,
        summary.highest_tile,
        if summary.game_over { "" } else { " | stopped early" }
    );
    Ok(())
}

fn evaluate(agent_args: &AgentArgs, limits: &LimitArgs, games: u64, seed: u64, quiet: bool) -> anyhow::Result<()> {
    let cfg = agent_args.resolve()?;
    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(games);
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:30}] {pos}/{len} games | {msg}")?
                .progress_chars("=> "),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };
    let start = Instant::now();
    let summaries = runner::run_games(games, seed, limits.into(), || cfg.build(), |summary| {
        pb.inc(1);
        pb.set_message(format!("last score: {}", summary.score));
    })?;
    pb.finish_and_clear();

    let eval = Evaluation::from_summaries(&summaries);
    println!("Agent: {} | games: {} | elapsed: {:.1}s", cfg.agent, eval.games, start.elapsed().as_secs_f64());
    println!(
        "Score: mean {:.1} | median {} | max {} | mean moves {:.1}",
        eval.mean_score, eval.median_score, eval.max_score, eval.mean_moves
    );
    for (&tile, &count) in eval.highest_tiles.iter().rev() {
        println!("  highest {tile:>6}: {count:>4} games | reached by {:5.1}%", eval.reach_rate(tile) * 100.0);
    }
    Ok(())
}

fn decide(agent_args: &AgentArgs, board: &str) -> anyhow::Result<()> {
    let raw = parse_board(board)?;
    let cfg = agent_args.resolve()?;
    let mut decider = cfg.decider()?;
    let decoded = decode(raw, decider.max_exponent())?;
    println!("{decoded}");
    match decider.choose_move(raw) {
        Ok(code) => {
            let dir = Direction::from_code(code).context("decider returned an unknown code")?;
            println!("{dir} ({code})");
            Ok(())
        }
        Err(DecisionError::NoLegalMove) => {
            println!("no legal move ({})", DecisionError::NoLegalMove.code());
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_board(s: &str) -> anyhow::Result<u64> {
    let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X").replace('_', "");
    u64::from_str_radix(&digits, 16).with_context(|| format!("not a hex board: {s:?}"))
}
