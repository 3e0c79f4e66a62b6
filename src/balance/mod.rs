//! Strategies that distribute topic partitions across consumer group members.
//!
//! The group leader runs exactly one strategy per rebalance: it receives every
//! member's subscription and the partitions that currently exist, and returns a
//! [`BalanceStrategyPlan`] mapping `member -> topic -> partitions`.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use crate::protocol::messages::{
    ConsumerGroupMemberAssignment, ConsumerGroupMemberMetadata, PartitionAssignment,
};

pub mod error;
mod range;
mod round_robin;
mod sticky;
#[cfg(test)]
mod test_utils;

pub use range::RangeBalanceStrategy;
pub use round_robin::RoundRobinBalanceStrategy;
pub use sticky::StickyBalanceStrategy;

use error::{Error, Result};

pub const BALANCE_STRATEGY_RANGE: &str = "range";
pub const BALANCE_STRATEGY_ROUNDROBIN: &str = "roundrobin";
pub const BALANCE_STRATEGY_STICKY: &str = "sticky";

/// Generation assumed for prior-assignment records that do not carry one.
pub const DEFAULT_GENERATION: i32 = -1;

/// Subscriptions of every group member, keyed by member id.
pub type Members = BTreeMap<String, ConsumerGroupMemberMetadata>;

/// The partitions that currently exist, keyed by topic.
pub type Topics = BTreeMap<String, Vec<i32>>;

/// BalanceStrategy is used to balance topics and partitions across members of
/// a consumer group.
pub trait BalanceStrategy: fmt::Debug + Send + Sync {
    /// Name advertised in the JoinGroup protocol list.
    fn name(&self) -> &'static str;

    /// Computes a distribution plan for `members` over `topics`.
    fn plan(&self, members: &Members, topics: &Topics) -> Result<BalanceStrategyPlan>;

    /// Serialized user data to hand to `member_id` along with its assignment.
    ///
    /// The member sends it back in its subscription on the next rebalance.
    fn assignment_data(
        &self,
        member_id: &str,
        topics: &BTreeMap<String, Vec<i32>>,
        generation_id: i32,
    ) -> Result<Vec<u8>>;
}

/// Result of a [`BalanceStrategy::plan`] call, `member -> topic -> partitions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceStrategyPlan(BTreeMap<String, BTreeMap<String, Vec<i32>>>);

impl BalanceStrategyPlan {
    /// Assigns partitions of `topic` to `member_id`; an empty list is a no-op.
    pub fn add(&mut self, member_id: &str, topic: &str, partitions: &[i32]) {
        if partitions.is_empty() {
            return;
        }

        self.0
            .entry(member_id.to_string())
            .or_default()
            .entry(topic.to_string())
            .or_default()
            .extend_from_slice(partitions);
    }

    /// Makes `member_id` part of the plan even if it receives nothing.
    pub(crate) fn add_member(&mut self, member_id: &str) {
        self.0.entry(member_id.to_string()).or_default();
    }

    /// Sorts the partition list of every topic ascending.
    pub(crate) fn sort_partitions(&mut self) {
        for partitions in self.0.values_mut().flat_map(|topics| topics.values_mut()) {
            partitions.sort_unstable();
        }
    }

    pub fn into_inner(self) -> BTreeMap<String, BTreeMap<String, Vec<i32>>> {
        self.0
    }

    /// Packages the plan as the per-member payloads of a SyncGroup request.
    ///
    /// Every member gets the user data `strategy` produces for its share, tagged
    /// with `generation_id`.
    pub fn member_assignments(
        &self,
        strategy: &dyn BalanceStrategy,
        generation_id: i32,
    ) -> Result<BTreeMap<String, ConsumerGroupMemberAssignment>> {
        self.0
            .iter()
            .map(|(member_id, topics)| {
                let user_data = strategy.assignment_data(member_id, topics, generation_id)?;
                let assignment = ConsumerGroupMemberAssignment {
                    version: 0,
                    topics: topics
                        .iter()
                        .map(|(topic, partitions)| PartitionAssignment {
                            topic: topic.clone(),
                            partitions: partitions.clone(),
                        })
                        .collect(),
                    user_data,
                };

                Ok((member_id.clone(), assignment))
            })
            .collect()
    }
}

impl Deref for BalanceStrategyPlan {
    type Target = BTreeMap<String, BTreeMap<String, Vec<i32>>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<BTreeMap<String, BTreeMap<String, Vec<i32>>>> for BalanceStrategyPlan {
    fn from(plan: BTreeMap<String, BTreeMap<String, Vec<i32>>>) -> Self {
        Self(plan)
    }
}

/// The strategies a group can agree on, selected by their advertised name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Contiguous ranges of each topic per member.
    Range,

    /// Partitions dealt to members in turn.
    RoundRobin,

    /// Balanced while keeping as many prior assignments as possible.
    Sticky,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Range => BALANCE_STRATEGY_RANGE,
            Self::RoundRobin => BALANCE_STRATEGY_ROUNDROBIN,
            Self::Sticky => BALANCE_STRATEGY_STICKY,
        }
    }

    pub fn strategy(&self) -> Box<dyn BalanceStrategy> {
        match self {
            Self::Range => Box::new(RangeBalanceStrategy),
            Self::RoundRobin => Box::new(RoundRobinBalanceStrategy),
            Self::Sticky => Box::new(StickyBalanceStrategy::default()),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            BALANCE_STRATEGY_RANGE => Ok(Self::Range),
            BALANCE_STRATEGY_ROUNDROBIN => Ok(Self::RoundRobin),
            BALANCE_STRATEGY_STICKY => Ok(Self::Sticky),
            _ => Err(Error::UnsupportedStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
