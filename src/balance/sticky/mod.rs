//! The sticky balance strategy.
//!
//! Members report the partitions they owned after the previous rebalance in
//! their subscription user data (see [`StickyAssignorUserData`]). The strategy
//! keeps as many of those in place as it can while driving the group towards
//! an even distribution: no member may end up with two or more partitions
//! fewer than another member that holds a partition it could have taken.
//!
//! A rebalance runs in three steps:
//!
//! 1. rebuild the current assignment from the prior-assignment records, the
//!    newest generation claiming a partition owns it and the runner-up is
//!    remembered as its previous owner
//! 2. hand every unowned partition to the least loaded member able to take it
//! 3. move partitions off overloaded members until no move improves balance,
//!    preferring to return a partition to its previous owner

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::error::{Error, Result};
use super::{
    BalanceStrategy, BalanceStrategyPlan, Members, Topics, BALANCE_STRATEGY_STICKY,
    DEFAULT_GENERATION,
};
use crate::protocol::messages::{StickyAssignorUserData, StickyAssignorUserDataV1};
use crate::topic::TopicPartition;

mod balancer;
mod movements;
mod sort;

use balancer::Balancer;
use movements::PartitionMovements;

/// Partitions per member id.
type Assignment = BTreeMap<String, Vec<TopicPartition>>;

/// The member that owned a partition before its current owner took it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConsumerGenerationPair {
    member_id: String,
    generation: i32,
}

/// Keeps partitions with their previous owners across rebalances.
///
/// The strategy holds no state between calls; everything it needs arrives with
/// the member subscriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct StickyBalanceStrategy;

impl BalanceStrategy for StickyBalanceStrategy {
    fn name(&self) -> &'static str {
        BALANCE_STRATEGY_STICKY
    }

    fn plan(&self, members: &Members, topics: &Topics) -> Result<BalanceStrategyPlan> {
        let (plan, _) = plan_with_movements(members, topics)?;
        Ok(plan)
    }

    fn assignment_data(
        &self,
        _member_id: &str,
        topics: &BTreeMap<String, Vec<i32>>,
        generation_id: i32,
    ) -> Result<Vec<u8>> {
        let user_data = StickyAssignorUserData::V1(StickyAssignorUserDataV1 {
            topics: topics.clone(),
            generation: generation_id,
        });

        Ok(user_data.encode()?)
    }
}

fn plan_with_movements(
    members: &Members,
    topics: &Topics,
) -> Result<(BalanceStrategyPlan, PartitionMovements)> {
    let (current_assignment, previous_assignment) = prepopulate_current_assignments(members)?;
    let is_fresh_assignment = current_assignment.is_empty();

    // every partition that exists, and who could consume it
    let mut partition2all_potential_consumers: BTreeMap<TopicPartition, Vec<String>> = topics
        .iter()
        .flat_map(|(topic, partitions)| {
            partitions
                .iter()
                .map(move |partition| (TopicPartition::new(topic.clone(), *partition), vec![]))
        })
        .collect();

    // every member, and what it could consume
    let mut consumer2all_potential_partitions: BTreeMap<String, Vec<TopicPartition>> =
        BTreeMap::new();
    for (member_id, metadata) in members {
        let potential = consumer2all_potential_partitions
            .entry(member_id.clone())
            .or_default();

        let subscribed = metadata
            .topics
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>();
        for topic in subscribed {
            let Some(partitions) = topics.get(topic) else {
                continue;
            };

            for partition in partitions.iter().copied().collect::<BTreeSet<_>>() {
                let partition = TopicPartition::new(topic, partition);
                if let Some(consumers) = partition2all_potential_consumers.get_mut(&partition) {
                    // members are visited in id order, so this stays sorted
                    consumers.push(member_id.clone());
                }
                potential.push(partition);
            }
        }
    }

    let is_potential_consumer = |member_id: &str, partition: &TopicPartition| {
        partition2all_potential_consumers
            .get(partition)
            .map_or(false, |consumers| {
                consumers
                    .binary_search_by(|consumer| consumer.as_str().cmp(member_id))
                    .is_ok()
            })
    };

    // drop what can no longer be kept, everything else still unowned is
    // assigned before balancing starts
    let mut unvisited = partition2all_potential_consumers
        .keys()
        .cloned()
        .collect::<BTreeSet<_>>();
    let mut unassigned_partitions = vec![];
    let mut current_partition_consumer = BTreeMap::new();
    let mut assignment = Assignment::new();

    for member_id in consumer2all_potential_partitions.keys() {
        let mut kept = vec![];

        let claimed = current_assignment.get(member_id).into_iter().flatten();
        for partition in claimed {
            if !unvisited.remove(partition) {
                debug!(
                    message = "dropping claim on partition that no longer exists",
                    member_id = member_id.as_str(),
                    topic = partition.topic.as_str(),
                    partition = partition.partition,
                );
                continue;
            }

            if !is_potential_consumer(member_id, partition) {
                unassigned_partitions.push(partition.clone());
                continue;
            }

            current_partition_consumer.insert(partition.clone(), member_id.clone());
            kept.push(partition.clone());
        }

        assignment.insert(member_id.clone(), kept);
    }
    unassigned_partitions.extend(unvisited);

    let sorted_partitions = sort::sort_partitions(
        &assignment,
        &previous_assignment,
        is_fresh_assignment,
        &partition2all_potential_consumers,
        &consumer2all_potential_partitions,
    );

    let mut balancer = Balancer {
        current_assignment: assignment,
        current_partition_consumer,
        previous_assignment: &previous_assignment,
        partition2all_potential_consumers: &partition2all_potential_consumers,
        consumer2all_potential_partitions: &consumer2all_potential_partitions,
        movements: PartitionMovements::default(),
    };
    balancer.balance(sorted_partitions, &unassigned_partitions, is_fresh_assignment);

    let sticky = balancer.movements.is_sticky();
    debug!(
        message = "sticky rebalance finished",
        members = members.len(),
        partitions = partition2all_potential_consumers.len(),
        moved = balancer.movements.len(),
        sticky,
    );

    let mut plan = BalanceStrategyPlan::default();
    for (member_id, partitions) in &balancer.current_assignment {
        plan.add_member(member_id);
        for partition in partitions {
            plan.add(member_id, &partition.topic, &[partition.partition]);
        }
    }
    plan.sort_partitions();

    Ok((plan, balancer.movements))
}

/// Rebuilds who owns what from the members' prior-assignment records.
///
/// Per partition the claim of the highest generation wins and the claim of the
/// next highest generation becomes its previous owner. Within one generation
/// the member with the smallest id keeps the claim.
fn prepopulate_current_assignments(
    members: &Members,
) -> Result<(Assignment, BTreeMap<TopicPartition, ConsumerGenerationPair>)> {
    let mut sorted_partition_consumers_by_generation: BTreeMap<
        TopicPartition,
        BTreeMap<i32, &str>,
    > = BTreeMap::new();

    for (member_id, metadata) in members {
        if metadata.user_data.is_empty() {
            continue;
        }

        let user_data =
            StickyAssignorUserData::decode(&metadata.user_data).map_err(|source| {
                Error::Decode {
                    member_id: member_id.clone(),
                    source,
                }
            })?;
        let generation = user_data.generation().unwrap_or(DEFAULT_GENERATION);

        for partition in user_data.partitions() {
            let consumers = sorted_partition_consumers_by_generation
                .entry(partition.clone())
                .or_default();

            match consumers.entry(generation) {
                Entry::Vacant(entry) => {
                    entry.insert(member_id.as_str());
                }
                Entry::Occupied(entry) if *entry.get() == member_id.as_str() => {}
                Entry::Occupied(entry) => {
                    warn!(
                        message = "partition is claimed by more than one member in the same generation",
                        topic = partition.topic.as_str(),
                        partition = partition.partition,
                        generation,
                        member_id = member_id.as_str(),
                        kept = *entry.get(),
                    );
                }
            }
        }
    }

    let mut current_assignment = Assignment::new();
    let mut previous_assignment = BTreeMap::new();
    for (partition, consumers) in sorted_partition_consumers_by_generation {
        let mut newest_first = consumers.into_iter().rev();

        if let Some((_, member_id)) = newest_first.next() {
            current_assignment
                .entry(member_id.to_string())
                .or_default()
                .push(partition.clone());
        }

        if let Some((generation, member_id)) = newest_first.next() {
            previous_assignment.insert(
                partition,
                ConsumerGenerationPair {
                    member_id: member_id.to_string(),
                    generation,
                },
            );
        }
    }

    Ok((current_assignment, previous_assignment))
}
