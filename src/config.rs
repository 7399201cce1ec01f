//! Agent configuration: which policy to run, with which weights and search
//! knobs. Every field has a default, so an empty file is a valid config.
//!
//! ```
//! use ai_2048::config::{AgentConfig, AgentKind};
//! use ai_2048::expectimax::DepthPolicy;
//! let cfg = AgentConfig::from_toml_str(r#"
//!     agent = "expectimax"
//!     [search]
//!     depth = { fixed = 2 }
//!     cache_enabled = false
//! "#).unwrap();
//! assert_eq!(cfg.agent, AgentKind::Expectimax);
//! assert_eq!(cfg.search.depth, DepthPolicy::Fixed(2));
//! let mut decider = cfg.decider().unwrap();
//! assert!(decider.choose_move(0x1100_0000_0000_0000).is_ok());
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::{Agent, EmptySequence, RandomAgent, RedundantStrategy, Sequence, Snake, Strategy, StrategySpec};
use crate::engine::{Direction, MAX_EXPONENT};
use crate::expectimax::{Expectimax, ExpectimaxConfig, ExpectimaxParallel, MAX_UNPRUNED_DEPTH};
use crate::facade::Decider;
use crate::heuristic::{Heuristic, HeuristicWeights};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("redundant strategy: {0}")]
    RedundantStrategy(#[from] RedundantStrategy),
    #[error(transparent)]
    EmptySequence(#[from] EmptySequence),
    #[error("heuristic weights must be finite with non-negative powers")]
    InvalidWeights,
    #[error(
        "search depth up to {max_depth} needs a positive prob_cutoff (got {prob_cutoff}); \
         without pruning keep depth <= {limit}",
        limit = MAX_UNPRUNED_DEPTH
    )]
    UnboundedSearch { prob_cutoff: f32, max_depth: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    #[default]
    Expectimax,
    ExpectimaxParallel,
    Snake,
    Strategy,
    Random,
    Sequence,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Expectimax,
        AgentKind::ExpectimaxParallel,
        AgentKind::Snake,
        AgentKind::Strategy,
        AgentKind::Random,
        AgentKind::Sequence,
    ];

    fn as_str(self) -> &'static str {
        match self {
            AgentKind::Expectimax => "expectimax",
            AgentKind::ExpectimaxParallel => "expectimax_parallel",
            AgentKind::Snake => "snake",
            AgentKind::Strategy => "strategy",
            AgentKind::Random => "random",
            AgentKind::Sequence => "sequence",
        }
    }

    /// Whether this agent runs expectimax and reads `[search]`.
    pub fn searches(self) -> bool { matches!(self, AgentKind::Expectimax | AgentKind::ExpectimaxParallel) }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        AgentKind::ALL.into_iter().find(|kind| kind.as_str() == normalized).ok_or_else(|| {
            let names: Vec<&str> = AgentKind::ALL.iter().map(|kind| kind.as_str()).collect();
            format!("unknown agent {s:?}, expected one of: {}", names.join(", "))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub agent: AgentKind,
    /// Evaluator weights; when absent each agent uses its own default
    /// (reference weights for expectimax, corner-seeking for snake).
    pub weights: Option<HeuristicWeights>,
    pub search: ExpectimaxConfig,
    /// Rules for the strategy agent; the left-corner strategy when absent.
    pub strategy: Option<StrategySpec>,
    /// Largest exponent a decided board may hold.
    pub max_exponent: u8,
    /// Seed of the random agent.
    pub seed: u64,
    /// Moves the sequence agent cycles through.
    pub sequence: Vec<Direction>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent: AgentKind::default(),
            weights: None,
            search: ExpectimaxConfig::default(),
            strategy: None,
            max_exponent: MAX_EXPONENT,
            seed: 0,
            sequence: vec![Direction::Left, Direction::Down, Direction::Right, Direction::Down],
        }
    }
}

impl AgentConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> { Ok(toml::from_str(s)?) }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> { Ok(toml::to_string_pretty(self)?) }

    /// Weights the configured agent evaluates with.
    pub fn effective_weights(&self) -> HeuristicWeights {
        self.weights.unwrap_or_else(|| match self.agent {
            AgentKind::Snake => HeuristicWeights::corner_seeking(),
            _ => HeuristicWeights::default(),
        })
    }

    /// Check everything `build` would reject.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.effective_weights().is_valid() {
            return Err(ConfigError::InvalidWeights);
        }
        if let Some(spec) = &self.strategy {
            Strategy::try_from(spec.clone())?;
        }
        if self.agent == AgentKind::Sequence && self.sequence.is_empty() {
            return Err(EmptySequence.into());
        }
        if self.agent.searches() && !self.search.is_bounded() {
            return Err(ConfigError::UnboundedSearch {
                prob_cutoff: self.search.prob_cutoff,
                max_depth: self.search.depth.max_depth(),
            });
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Box<dyn Agent + Send>, ConfigError> {
        self.validate()?;
        let heuristic = || Heuristic::new(self.effective_weights());
        let agent: Box<dyn Agent + Send> = match self.agent {
            AgentKind::Expectimax => Box::new(Expectimax::with_evaluator(self.search.clone(), heuristic())),
            AgentKind::ExpectimaxParallel => {
                Box::new(ExpectimaxParallel::with_evaluator(self.search.clone(), heuristic()))
            }
            AgentKind::Snake => Box::new(Snake::with_evaluator(heuristic())),
            AgentKind::Strategy => match &self.strategy {
                Some(spec) => Box::new(Strategy::try_from(spec.clone())?),
                None => Box::new(Strategy::left_corner()),
            },
            AgentKind::Random => Box::new(RandomAgent::new(self.seed)),
            AgentKind::Sequence => Box::new(Sequence::new(self.sequence.clone())?),
        };
        Ok(agent)
    }

    pub fn decider(&self) -> Result<Decider, ConfigError> {
        Ok(Decider::new(self.build()?).with_max_exponent(self.max_exponent))
    }
}
