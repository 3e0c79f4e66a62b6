//! Orderings the sticky strategy relies on to stay deterministic.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use super::{Assignment, ConsumerGenerationPair};
use crate::topic::TopicPartition;

/// Member ids ordered by number of assigned partitions, then by id.
pub(super) fn sort_member_ids_by_partition_assignments(assignment: &Assignment) -> Vec<&str> {
    // keys are already in id order and the sort is stable
    let mut ids = assignment.keys().map(String::as_str).collect::<Vec<_>>();
    ids.sort_by_key(|id| assignment.get(*id).map_or(0, Vec::len));
    ids
}

/// The order in which the balancing loop visits partitions.
///
/// On the first rebalance of a group, or when members subscribe to different
/// topics, the partitions with the fewest potential consumers come first.
/// Otherwise partitions are taken from the most loaded members in turn so that
/// the loop drains overloaded members before it looks at anyone else.
pub(super) fn sort_partitions(
    current_assignment: &Assignment,
    previous_assignment: &BTreeMap<TopicPartition, ConsumerGenerationPair>,
    is_fresh_assignment: bool,
    partition2all_potential_consumers: &BTreeMap<TopicPartition, Vec<String>>,
    consumer2all_potential_partitions: &BTreeMap<String, Vec<TopicPartition>>,
) -> Vec<TopicPartition> {
    if !is_fresh_assignment
        && are_subscriptions_identical(
            partition2all_potential_consumers,
            consumer2all_potential_partitions,
        )
    {
        sort_partitions_by_member_load(
            current_assignment,
            previous_assignment,
            partition2all_potential_consumers.keys(),
        )
    } else {
        sort_partitions_by_potential_consumers(partition2all_potential_consumers)
    }
}

/// Partitions ordered by number of potential consumers, then by topic and id.
pub(super) fn sort_partitions_by_potential_consumers(
    partition2all_potential_consumers: &BTreeMap<TopicPartition, Vec<String>>,
) -> Vec<TopicPartition> {
    let mut partitions = partition2all_potential_consumers
        .iter()
        .collect::<Vec<_>>();
    partitions.sort_by_key(|(_, consumers)| consumers.len());
    partitions
        .into_iter()
        .map(|(partition, _)| partition.clone())
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
struct MemberLoad<'a> {
    member_id: &'a str,
    partitions: Vec<&'a TopicPartition>,
}

impl Ord for MemberLoad<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partitions
            .len()
            .cmp(&other.partitions.len())
            .then_with(|| self.member_id.cmp(other.member_id))
    }
}

impl PartialOrd for MemberLoad<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn sort_partitions_by_member_load<'a>(
    current_assignment: &Assignment,
    previous_assignment: &BTreeMap<TopicPartition, ConsumerGenerationPair>,
    all_partitions: impl Iterator<Item = &'a TopicPartition>,
) -> Vec<TopicPartition> {
    let mut heap = current_assignment
        .iter()
        .filter(|(_, partitions)| !partitions.is_empty())
        .map(|(member_id, partitions)| MemberLoad {
            member_id,
            partitions: partitions.iter().collect(),
        })
        .collect::<BinaryHeap<_>>();

    let mut sorted = Vec::new();
    let mut emitted = BTreeSet::new();
    while let Some(mut member) = heap.pop() {
        // prefer a partition that has already changed hands once
        let index = member
            .partitions
            .iter()
            .position(|partition| previous_assignment.contains_key(*partition))
            .unwrap_or(0);
        let partition = member.partitions.remove(index);

        if emitted.insert(partition) {
            sorted.push(partition.clone());
        }
        if !member.partitions.is_empty() {
            heap.push(member);
        }
    }

    sorted.extend(
        all_partitions
            .filter(|partition| !emitted.contains(partition))
            .cloned(),
    );
    sorted
}

/// True when every member could consume exactly the same partitions as every
/// other member, and every partition could go to exactly the same members.
pub(super) fn are_subscriptions_identical(
    partition2all_potential_consumers: &BTreeMap<TopicPartition, Vec<String>>,
    consumer2all_potential_partitions: &BTreeMap<String, Vec<TopicPartition>>,
) -> bool {
    all_equal_as_multisets(partition2all_potential_consumers.values())
        && all_equal_as_multisets(consumer2all_potential_partitions.values())
}

fn all_equal_as_multisets<'a, T>(lists: impl Iterator<Item = &'a Vec<T>>) -> bool
where
    T: Ord + 'a,
{
    let mut first: Option<BTreeMap<&T, usize>> = None;
    for list in lists {
        let mut counts = BTreeMap::new();
        for item in list {
            *counts.entry(item).or_insert(0) += 1;
        }

        match &first {
            None => first = Some(counts),
            Some(first) if *first != counts => return false,
            Some(_) => {}
        }
    }

    true
}

/// Sum of the pairwise differences in assignment size, zero when perfectly
/// even.
pub(super) fn balance_score(assignment: &Assignment) -> usize {
    let mut counts = assignment.values().map(Vec::len).collect::<Vec<_>>();
    counts.sort_unstable();

    // every count is at least as large as the ones before it
    let mut score = 0;
    let mut preceding = 0;
    for (index, count) in counts.into_iter().enumerate() {
        score += count * index - preceding;
        preceding += count;
    }
    score
}
