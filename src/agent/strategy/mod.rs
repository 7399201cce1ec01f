//! Rule-based agent: ban rules veto directions, try rules propose them in
//! order, and a fallback list decides when no proposal survives.
//!
//! Rules are plain data so whole strategies can be written in TOML:
//!
//! ```
//! use ai_2048::agent::{StrategySpec, Strategy};
//! let spec: StrategySpec = toml::from_str(r#"
//!     ban_rules = [{ if_column_not_locked = ["up", "left"] }]
//!     try_rules = [{ if_merge_possible = "left" }, { produces_merge = "down" }]
//!     fallback = ["left", "down", "right", "up"]
//! "#).unwrap();
//! let strategy = Strategy::try_from(spec).unwrap();
//! assert_eq!(strategy.fallback().len(), 4);
//! ```
//!
//! [`search`] looks for good strategies by playing seeded games, and
//! [`compare`] decides which of two score samples is better.

use std::fmt;

use log::trace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{Board, Direction};

use super::Agent;

pub mod compare;
mod rules;
pub mod search;

pub use rules::{generate_all_variations, BanMove, Column, Corner, Row, TryMove};

/// Either kind of rule, for code that walks a strategy's rules in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Ban(BanMove),
    Try(TryMove),
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Ban(rule) => fmt::Display::fmt(rule, f),
            Rule::Try(rule) => fmt::Display::fmt(rule, f),
        }
    }
}

/// Which kind of rule to visit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleOrder {
    #[default]
    TryFirst,
    BanFirst,
}

/// The last try rule proposes the same direction the fallback starts with,
/// so it can never change a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("last try rule and first fallback move are both {0}")]
pub struct RedundantStrategy(pub Direction);

/// Serialized form of a [`Strategy`]; validated by `Strategy::try_from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategySpec {
    pub ban_rules: Vec<BanMove>,
    pub try_rules: Vec<TryMove>,
    pub fallback: Vec<Direction>,
}

impl Default for StrategySpec {
    fn default() -> Self {
        StrategySpec {
            ban_rules: vec![BanMove::IfColumnNotLocked(Direction::Up, Column::Left)],
            try_rules: vec![TryMove::IfMergePossible(Direction::Left), TryMove::ProducesMerge(Direction::Down)],
            fallback: vec![Direction::Left, Direction::Down, Direction::Right, Direction::Up],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    ban_rules: Vec<BanMove>,
    try_rules: Vec<TryMove>,
    fallback: Vec<Direction>,
}

impl Strategy {
    pub fn new(
        ban_rules: Vec<BanMove>,
        try_rules: Vec<TryMove>,
        fallback: Vec<Direction>,
    ) -> Result<Self, RedundantStrategy> {
        if let (Some(last_try), Some(&first_fallback)) = (try_rules.last(), fallback.first()) {
            if last_try.direction() == first_fallback {
                return Err(RedundantStrategy(first_fallback));
            }
        }
        Ok(Strategy { ban_rules, try_rules, fallback })
    }

    /// No rules, only a fallback order. The starting point of a greedy search.
    pub fn with_fallback_only(fallback: Vec<Direction>) -> Self {
        Strategy { ban_rules: Vec::new(), try_rules: Vec::new(), fallback }
    }

    /// Keeps the largest tiles stacked in the left column, merging leftward
    /// and downward first.
    pub fn left_corner() -> Self {
        let StrategySpec { ban_rules, try_rules, fallback } = StrategySpec::default();
        Strategy { ban_rules, try_rules, fallback }
    }

    pub fn ban_rules(&self) -> &[BanMove] { &self.ban_rules }

    pub fn try_rules(&self) -> &[TryMove] { &self.try_rules }

    pub fn fallback(&self) -> &[Direction] { &self.fallback }

    pub fn contains(&self, rule: Rule) -> bool {
        match rule {
            Rule::Ban(ban) => self.ban_rules.contains(&ban),
            Rule::Try(attempt) => self.try_rules.contains(&attempt),
        }
    }

    /// Every rule, with the chosen kind first. Within a kind rules keep
    /// their strategy order.
    pub fn rules(&self, order: RuleOrder) -> Vec<Rule> {
        let bans = self.ban_rules.iter().copied().map(Rule::Ban);
        let tries = self.try_rules.iter().copied().map(Rule::Try);
        match order {
            RuleOrder::TryFirst => tries.chain(bans).collect(),
            RuleOrder::BanFirst => bans.chain(tries).collect(),
        }
    }

    /// Bans are collected before any try rule runs, so their order never
    /// matters and a new one is appended.
    pub fn with_ban_rule(&self, rule: BanMove) -> Self {
        let mut next = self.clone();
        next.ban_rules.push(rule);
        next
    }

    /// Insert a try rule at `index` (clamped to the end).
    pub fn with_try_rule_at(&self, index: usize, rule: TryMove) -> Result<Self, RedundantStrategy> {
        let mut try_rules = self.try_rules.clone();
        try_rules.insert(index.min(try_rules.len()), rule);
        Strategy::new(self.ban_rules.clone(), try_rules, self.fallback.clone())
    }

    pub fn with_rule_added(&self, rule: Rule, at_front: bool) -> Result<Self, RedundantStrategy> {
        match rule {
            Rule::Ban(ban) => Ok(self.with_ban_rule(ban)),
            Rule::Try(attempt) => self.with_try_rule_at(if at_front { 0 } else { self.try_rules.len() }, attempt),
        }
    }

    /// Replace `old` with `new` in place. `None` when `old` is not part of
    /// this strategy or the two rules are of different kinds.
    pub fn with_rule_swapped(&self, old: Rule, new: Rule) -> Option<Result<Self, RedundantStrategy>> {
        match (old, new) {
            (Rule::Ban(old), Rule::Ban(new)) => {
                let index = self.ban_rules.iter().position(|&rule| rule == old)?;
                let mut next = self.clone();
                next.ban_rules[index] = new;
                Some(Ok(next))
            }
            (Rule::Try(old), Rule::Try(new)) => {
                let index = self.try_rules.iter().position(|&rule| rule == old)?;
                let mut try_rules = self.try_rules.clone();
                try_rules[index] = new;
                Some(Strategy::new(self.ban_rules.clone(), try_rules, self.fallback.clone()))
            }
            _ => None,
        }
    }

    pub fn with_fallback(&self, fallback: Vec<Direction>) -> Result<Self, RedundantStrategy> {
        Strategy::new(self.ban_rules.clone(), self.try_rules.clone(), fallback)
    }

    pub fn choose_move(&self, board: Board) -> Option<Direction> {
        let is_legal = |dir: Direction| board.shift(dir) != board;
        let banned: Vec<Direction> = self.ban_rules.iter().filter_map(|rule| rule.execute(board)).collect();
        let allowed = |dir: Direction| !banned.contains(&dir) && is_legal(dir);

        if let Some((rule, dir)) =
            self.try_rules.iter().find_map(|rule| rule.execute(board).filter(|&dir| allowed(dir)).map(|dir| (rule, dir)))
        {
            trace!("strategy: {rule}");
            return Some(dir);
        }
        // Fallback honours bans first, then overrides them, then takes anything legal.
        self.fallback
            .iter()
            .copied()
            .find(|&dir| allowed(dir))
            .or_else(|| self.fallback.iter().copied().find(|&dir| is_legal(dir)))
            .or_else(|| Direction::ALL.into_iter().find(|&dir| is_legal(dir)))
    }
}

impl TryFrom<StrategySpec> for Strategy {
    type Error = RedundantStrategy;

    fn try_from(spec: StrategySpec) -> Result<Self, Self::Error> {
        Strategy::new(spec.ban_rules, spec.try_rules, spec.fallback)
    }
}

impl From<&Strategy> for StrategySpec {
    fn from(strategy: &Strategy) -> Self {
        StrategySpec {
            ban_rules: strategy.ban_rules.clone(),
            try_rules: strategy.try_rules.clone(),
            fallback: strategy.fallback.clone(),
        }
    }
}

impl Agent for Strategy {
    fn choose_move(&mut self, board: Board) -> Option<Direction> { Strategy::choose_move(self, board) }

    fn name(&self) -> &'static str { "strategy" }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(|item| item.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ban rules: [{}]; try rules: [{}]; fallback: [{}]",
            join(&self.ban_rules),
            join(&self.try_rules),
            join(&self.fallback)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Direction::{Down, Left, Right, Up};

    fn b(raw: u64) -> Board { Board::from_raw(raw) }

    #[test]
    fn try_rule_wins_unless_banned_or_blocked() {
        let merge_left = TryMove::IfMergePossible(Left);
        let strategy = Strategy::new(vec![], vec![merge_left], vec![Down, Left]).unwrap();
        assert_eq!(strategy.choose_move(b(0x1100_0000_0000_0000)), Some(Left));

        let banned = Strategy::new(vec![BanMove::Always(Left)], vec![merge_left], vec![Down]).unwrap();
        assert_eq!(banned.choose_move(b(0x1100_0000_0000_0000)), Some(Down));
    }

    #[test]
    fn fallback_overrides_bans_before_giving_up() {
        // Only Right and Down are legal; both banned, Right listed first.
        let board = b(0x1000_0000_0000_0000);
        let strategy =
            Strategy::new(vec![BanMove::Always(Right), BanMove::Always(Down)], vec![], vec![Up, Right, Down]).unwrap();
        assert_eq!(strategy.choose_move(board), Some(Right));

        // Fallback never names a legal move: any legal move is played.
        let partial = Strategy::new(vec![], vec![], vec![Up]).unwrap();
        assert_eq!(partial.choose_move(board), Some(Right));
        assert_eq!(partial.choose_move(b(0x1234_4321_1234_4321)), None);
    }

    #[test]
    fn redundant_strategy_is_rejected() {
        let err = Strategy::new(vec![], vec![TryMove::Always(Left)], vec![Left]).unwrap_err();
        assert_eq!(err, RedundantStrategy(Left));
        assert!(Strategy::try_from(StrategySpec::default()).is_ok());
    }

    #[test]
    fn rules_come_out_in_requested_order() {
        let strategy = Strategy::left_corner();
        let try_first = strategy.rules(RuleOrder::TryFirst);
        assert_eq!(try_first[0], Rule::Try(TryMove::IfMergePossible(Left)));
        assert_eq!(try_first[2], Rule::Ban(BanMove::IfColumnNotLocked(Up, Column::Left)));
        let ban_first = strategy.rules(RuleOrder::BanFirst);
        assert_eq!(ban_first[0], try_first[2]);
        assert_eq!(ban_first.len(), 3);
    }

    #[test]
    fn edits_keep_the_strategy_valid() {
        let base = Strategy::with_fallback_only(vec![Left, Down, Up, Right]);
        let front = base.with_rule_added(Rule::Try(TryMove::IfMergePossible(Down)), true).unwrap();
        let both = front.with_rule_added(Rule::Try(TryMove::ProducesMerge(Up)), true).unwrap();
        assert_eq!(both.try_rules(), &[TryMove::ProducesMerge(Up), TryMove::IfMergePossible(Down)]);
        // Appending a Left try in front of a Left-first fallback is redundant.
        assert!(base.with_rule_added(Rule::Try(TryMove::Always(Left)), false).is_err());

        let banned = both.with_ban_rule(BanMove::Always(Right));
        assert!(banned.contains(Rule::Ban(BanMove::Always(Right))));
        let swapped = banned
            .with_rule_swapped(Rule::Ban(BanMove::Always(Right)), Rule::Ban(BanMove::Always(Up)))
            .unwrap()
            .unwrap();
        assert_eq!(swapped.ban_rules(), &[BanMove::Always(Up)]);
        assert!(banned.with_rule_swapped(Rule::Ban(BanMove::Always(Down)), Rule::Ban(BanMove::Always(Up))).is_none());
        assert!(banned
            .with_rule_swapped(Rule::Ban(BanMove::Always(Right)), Rule::Try(TryMove::Always(Up)))
            .is_none());
        let redundant = both.with_rule_swapped(Rule::Try(TryMove::IfMergePossible(Down)), Rule::Try(TryMove::Always(Left)));
        assert_eq!(redundant, Some(Err(RedundantStrategy(Left))));

        assert!(both.with_fallback(vec![Left, Down]).is_ok());
        assert!(both.with_fallback(vec![Down]).is_err());
    }

    #[test]
    fn display_reads_as_words() {
        let rendered = Strategy::left_corner().to_string();
        assert!(rendered.starts_with("ban rules: [ban move up if left column not locked]"));
        assert!(rendered.ends_with("fallback: [left, down, right, up]"));
        assert_eq!(Rule::Try(TryMove::Always(Up)).to_string(), "always try move up");
    }
}
