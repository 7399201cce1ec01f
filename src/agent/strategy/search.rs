//! Looking for good strategies by playing them.
//!
//! Every candidate keeps the games it has already played. Game `i` of any
//! candidate is seeded `seed + i`, so a [`Duel`] compares two strategies
//! over the same sequence of seeds and only plays the games it still needs.
//!
//! ```no_run
//! use ai_2048::agent::strategy::search::{GreedySearch, Priority};
//! let search = GreedySearch { priority: Priority::Best, max_try_rules: 2, ..GreedySearch::default() };
//! let best = search.run();
//! println!("{} -> mean score {:.0}", best.strategy(), best.evaluation().mean_score);
//! ```

use std::cmp::Ordering;
use std::convert::Infallible;

use log::{debug, info};

use crate::engine::Direction;
use crate::runner::{run_games, Evaluation, GameLimits, GameSummary};

use super::compare::{mann_whitney, Confidence};
use super::{generate_all_variations, BanMove, Rule, RuleOrder, Strategy, TryMove};

/// A strategy and the games it has played so far.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyData {
    strategy: Strategy,
    games: Vec<GameSummary>,
}

impl StrategyData {
    pub fn new(strategy: Strategy) -> Self { Self { strategy, games: Vec::new() } }

    pub fn strategy(&self) -> &Strategy { &self.strategy }

    pub fn games(&self) -> &[GameSummary] { &self.games }

    pub fn scores(&self) -> Vec<u64> { self.games.iter().map(|game| game.score).collect() }

    pub fn evaluation(&self) -> Evaluation { Evaluation::from_summaries(&self.games) }

    /// Play until at least `games` games are recorded.
    pub fn play_to(&mut self, games: u64, seed: u64, limits: GameLimits) {
        let played = self.games.len() as u64;
        if played >= games {
            return;
        }
        let strategy = &self.strategy;
        let more = run_games(games - played, seed.wrapping_add(played), limits, || Ok::<_, Infallible>(strategy.clone()), |_| {})
            .unwrap_or_else(|never| match never {});
        self.games.extend(more);
    }

    fn first_scores(&self, games: usize) -> Vec<u64> { self.games.iter().take(games).map(|game| game.score).collect() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Champion,
    Challenger,
}

/// Settles which of two strategies is better, playing more games while the
/// scores are statistically tied.
///
/// Starts at `start_games` each and doubles until a winner is significant at
/// `confidence`. A tie that survives `max_games` goes to the champion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Duel {
    pub start_games: u64,
    pub max_games: u64,
    pub confidence: Confidence,
    pub seed: u64,
    pub limits: GameLimits,
}

impl Default for Duel {
    fn default() -> Self {
        Self {
            start_games: 10,
            max_games: 20_000,
            confidence: Confidence::P01,
            seed: 0,
            limits: GameLimits::default(),
        }
    }
}

impl Duel {
    pub fn run(&self, champion: &mut StrategyData, challenger: &mut StrategyData) -> Winner {
        let mut games = self.start_games.max(2);
        while games <= self.max_games {
            champion.play_to(games, self.seed, self.limits);
            challenger.play_to(games, self.seed, self.limits);
            let n = games as usize;
            match mann_whitney(&champion.first_scores(n), &challenger.first_scores(n), self.confidence) {
                Ordering::Less => {
                    debug!("duel: challenger wins after {games} games: {}", challenger.strategy);
                    return Winner::Challenger;
                }
                Ordering::Greater => return Winner::Champion,
                Ordering::Equal => match games.checked_mul(2) {
                    Some(more) => games = more,
                    None => break,
                },
            }
        }
        Winner::Champion
    }

    /// Whichever of the two wins, with its games.
    pub fn keep_winner(&self, mut champion: StrategyData, mut challenger: StrategyData) -> StrategyData {
        match self.run(&mut champion, &mut challenger) {
            Winner::Champion => champion,
            Winner::Challenger => challenger,
        }
    }
}

/// Fallback orders tried by [`best_fallback_order`]: every ordering of
/// left, down and up, with right last.
const FALLBACK_ORDERS: [[Direction; 4]; 6] = {
    use Direction::{Down, Left, Right, Up};
    [
        [Left, Down, Up, Right],
        [Left, Up, Down, Right],
        [Down, Left, Up, Right],
        [Down, Up, Left, Right],
        [Up, Left, Down, Right],
        [Up, Down, Left, Right],
    ]
};

/// Keep the rules of `current` and find the fallback order that plays best.
pub fn best_fallback_order(current: StrategyData, duel: &Duel) -> StrategyData {
    let mut best = current;
    for order in FALLBACK_ORDERS {
        if best.strategy.fallback() == order.as_slice() {
            continue;
        }
        let Ok(candidate) = best.strategy.with_fallback(order.to_vec()) else { continue };
        best = duel.keep_winner(best, StrategyData::new(candidate));
    }
    best
}

/// The candidates indistinguishable from the one with the best mean score.
///
/// Every candidate should already have played the same number of games.
pub fn compare_strategies(candidates: &[StrategyData], confidence: Confidence) -> Vec<&StrategyData> {
    let Some(best) = candidates
        .iter()
        .max_by(|a, b| a.evaluation().mean_score.total_cmp(&b.evaluation().mean_score))
    else {
        return Vec::new();
    };
    let best_scores = best.scores();
    candidates
        .iter()
        .filter(|candidate| mann_whitney(&candidate.scores(), &best_scores, confidence) != Ordering::Less)
        .collect()
}

/// What a greedy search adds when both kinds of rule could improve the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Add a try rule if any helps, otherwise a ban rule.
    #[default]
    Try,
    /// Add a ban rule if any helps, otherwise a try rule.
    Ban,
    /// Duel the best try extension against the best ban extension.
    Best,
}

/// Builds a strategy one rule at a time, always adding the rule that wins
/// its duels, until no rule helps or both rule lists are full.
#[derive(Debug, Clone)]
pub struct GreedySearch {
    pub ban_pool: Vec<BanMove>,
    pub try_pool: Vec<TryMove>,
    pub max_ban_rules: usize,
    pub max_try_rules: usize,
    pub priority: Priority,
    /// Pick the fallback order by duel before and after adding rules.
    pub optimise_fallback: bool,
    pub duel: Duel,
}

impl Default for GreedySearch {
    fn default() -> Self {
        let (ban_pool, try_pool) = generate_all_variations();
        Self {
            ban_pool,
            try_pool,
            max_ban_rules: 2,
            max_try_rules: 4,
            priority: Priority::default(),
            optimise_fallback: true,
            duel: Duel::default(),
        }
    }
}

impl GreedySearch {
    pub fn run(&self) -> StrategyData {
        let mut ban_pool = self.ban_pool.clone();
        let mut try_pool = self.try_pool.clone();
        let start = Strategy::with_fallback_only(FALLBACK_ORDERS[0].to_vec());
        let mut current = StrategyData::new(start);
        if self.optimise_fallback {
            current = best_fallback_order(current, &self.duel);
        }

        loop {
            let step = match self.priority {
                Priority::Try => {
                    self.best_try(&current, &try_pool).or_else(|| self.best_ban(&current, &ban_pool))
                }
                Priority::Ban => {
                    self.best_ban(&current, &ban_pool).or_else(|| self.best_try(&current, &try_pool))
                }
                Priority::Best => match (self.best_try(&current, &try_pool), self.best_ban(&current, &ban_pool)) {
                    (Some(tried), Some(banned)) => Some(self.pick(tried, banned)),
                    (tried, banned) => tried.or(banned),
                },
            };
            let Some((rule, next)) = step else { break };
            info!("greedy: added \"{rule}\", strategy is now {}", next.strategy);
            match rule {
                Rule::Ban(added) => ban_pool.retain(|&rule| rule != added),
                Rule::Try(added) => try_pool.retain(|&rule| rule != added),
            }
            current = next;
        }

        if self.optimise_fallback {
            current = best_fallback_order(current, &self.duel);
        }
        current
    }

    /// Best single rule from `candidates`, if any beats `current`.
    fn best_extension(
        &self,
        current: &StrategyData,
        candidates: impl IntoIterator<Item = (Rule, Strategy)>,
    ) -> Option<(Rule, StrategyData)> {
        let mut champion = current.clone();
        let mut added = None;
        for (rule, strategy) in candidates {
            let mut challenger = StrategyData::new(strategy);
            if self.duel.run(&mut champion, &mut challenger) == Winner::Challenger {
                champion = challenger;
                added = Some(rule);
            }
        }
        added.map(|rule| (rule, champion))
    }

    /// A try rule can go first (highest priority) or last; both are tried.
    fn best_try(&self, current: &StrategyData, pool: &[TryMove]) -> Option<(Rule, StrategyData)> {
        let strategy = &current.strategy;
        if strategy.try_rules().len() >= self.max_try_rules {
            return None;
        }
        let placed = move |at_front: bool| {
            pool.iter().filter_map(move |&rule| {
                let rule = Rule::Try(rule);
                strategy.with_rule_added(rule, at_front).ok().map(|next| (rule, next))
            })
        };
        let front = self.best_extension(current, placed(true));
        let back = if strategy.try_rules().is_empty() { None } else { self.best_extension(current, placed(false)) };
        match (front, back) {
            (Some(front), Some(back)) => Some(self.pick(front, back)),
            (front, back) => front.or(back),
        }
    }

    fn best_ban(&self, current: &StrategyData, pool: &[BanMove]) -> Option<(Rule, StrategyData)> {
        let strategy = &current.strategy;
        if strategy.ban_rules().len() >= self.max_ban_rules {
            return None;
        }
        let candidates = pool
            .iter()
            .filter(|&&rule| !strategy.ban_rules().contains(&rule))
            .map(|&rule| (Rule::Ban(rule), strategy.with_ban_rule(rule)));
        self.best_extension(current, candidates)
    }

    fn pick(&self, first: (Rule, StrategyData), second: (Rule, StrategyData)) -> (Rule, StrategyData) {
        let ((first_rule, mut first), (second_rule, mut second)) = (first, second);
        match self.duel.run(&mut first, &mut second) {
            Winner::Champion => (first_rule, first),
            Winner::Challenger => (second_rule, second),
        }
    }
}

/// When a local search starts its next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Restart {
    /// As soon as one swap is accepted.
    #[default]
    OnChange,
    /// After every rule has been offered its swaps.
    AfterFullPass,
}

/// Improves a strategy by swapping one rule at a time for a pool rule of the
/// same kind. The shape of the strategy (rule counts, fallback) never changes.
#[derive(Debug, Clone)]
pub struct LocalSearch {
    pub ban_pool: Vec<BanMove>,
    pub try_pool: Vec<TryMove>,
    pub order: RuleOrder,
    pub restart: Restart,
    /// Upper bound on passes; a pass without an accepted swap ends the search.
    pub max_rounds: usize,
    pub duel: Duel,
}

impl Default for LocalSearch {
    fn default() -> Self {
        let (ban_pool, try_pool) = generate_all_variations();
        Self {
            ban_pool,
            try_pool,
            order: RuleOrder::default(),
            restart: Restart::default(),
            max_rounds: 100,
            duel: Duel::default(),
        }
    }
}

impl LocalSearch {
    pub fn run(&self, start: Strategy) -> StrategyData {
        let mut current = StrategyData::new(start);
        for round in 1..=self.max_rounds {
            let (next, changed) = self.pass(current);
            current = next;
            if !changed {
                debug!("local: no improving swap in round {round}");
                break;
            }
        }
        current
    }

    fn pass(&self, mut current: StrategyData) -> (StrategyData, bool) {
        let mut changed = false;
        for rule in current.strategy.rules(self.order) {
            for alternative in self.alternatives(rule) {
                if current.strategy.contains(alternative) {
                    continue;
                }
                let Some(Ok(candidate)) = current.strategy.with_rule_swapped(rule, alternative) else { continue };
                let mut challenger = StrategyData::new(candidate);
                if self.duel.run(&mut current, &mut challenger) == Winner::Challenger {
                    info!("local: swapped \"{rule}\" for \"{alternative}\"");
                    current = challenger;
                    changed = true;
                    if self.restart == Restart::OnChange {
                        return (current, true);
                    }
                    break;
                }
            }
        }
        (current, changed)
    }

    fn alternatives(&self, rule: Rule) -> Vec<Rule> {
        match rule {
            Rule::Ban(_) => self.ban_pool.iter().copied().map(Rule::Ban).collect(),
            Rule::Try(_) => self.try_pool.iter().copied().map(Rule::Try).collect(),
        }
    }
}
