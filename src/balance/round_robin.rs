use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::error::Result;
use super::{
    BalanceStrategy, BalanceStrategyPlan, Members, Topics, BALANCE_STRATEGY_ROUNDROBIN,
};

/// Deals partitions to members in turn.
///
/// Topics and members are both walked in name order, and a member that does
/// not subscribe to the current topic loses its turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinBalanceStrategy;

impl BalanceStrategy for RoundRobinBalanceStrategy {
    fn name(&self) -> &'static str {
        BALANCE_STRATEGY_ROUNDROBIN
    }

    fn plan(&self, members: &Members, topics: &Topics) -> Result<BalanceStrategyPlan> {
        let mut plan = BalanceStrategyPlan::default();

        let members = members.iter().collect::<Vec<_>>();
        let n = members.len();
        let mut i = 0;

        for (topic, partitions) in topics {
            let subscribed = members
                .iter()
                .any(|(_, metadata)| metadata.topics.contains(topic));
            if !subscribed {
                debug!(
                    message = "no member subscribes to topic",
                    topic = topic.as_str(),
                );
                continue;
            }

            for partition in partitions.iter().collect::<BTreeSet<_>>() {
                let member = loop {
                    let (member_id, metadata) = members[i % n];
                    i += 1;

                    if metadata.topics.contains(topic) {
                        break member_id;
                    }
                };

                plan.add(member, topic, &[*partition]);
            }
        }

        Ok(plan)
    }

    fn assignment_data(
        &self,
        _member_id: &str,
        _topics: &BTreeMap<String, Vec<i32>>,
        _generation_id: i32,
    ) -> Result<Vec<u8>> {
        Ok(vec![])
    }
}
