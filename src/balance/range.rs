use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::error::Result;
use super::{BalanceStrategy, BalanceStrategyPlan, Members, Topics, BALANCE_STRATEGY_RANGE};

/// Assigns each member a contiguous range of every topic it subscribes to.
///
/// Members are ordered by id. When partitions do not divide evenly the first
/// members each take one extra, e.g. with 8 partitions and 3 members the
/// ranges are `[0..3) [3..6) [6..8)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeBalanceStrategy;

impl BalanceStrategy for RangeBalanceStrategy {
    fn name(&self) -> &'static str {
        BALANCE_STRATEGY_RANGE
    }

    fn plan(&self, members: &Members, topics: &Topics) -> Result<BalanceStrategyPlan> {
        let mut plan = BalanceStrategyPlan::default();

        // build members by topic map
        let mut mbt: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (member_id, metadata) in members {
            for topic in &metadata.topics {
                mbt.entry(topic.as_str())
                    .or_default()
                    .insert(member_id.as_str());
            }
        }

        // assemble plan
        for (topic, ids) in mbt {
            let Some(partitions) = topics.get(topic) else {
                debug!(message = "skipping subscribed topic without partitions", topic);
                continue;
            };

            let partitions = partitions
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect::<Vec<_>>();
            let partitions_per_consumer = partitions.len() / ids.len();
            let consumers_with_extra_partition = partitions.len() % ids.len();

            for (index, id) in ids.into_iter().enumerate() {
                let min = index * partitions_per_consumer
                    + std::cmp::min(consumers_with_extra_partition, index);
                let extra = usize::from(index < consumers_with_extra_partition);
                let max = min + partitions_per_consumer + extra;

                plan.add(id, topic, &partitions[min..max]);
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
