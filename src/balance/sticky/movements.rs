//! Bookkeeping of the partitions moved during a single rebalance.
//!
//! Every partition that ends up with a different member than the one it
//! started with is recorded once, as `origin -> current owner`. Per topic the
//! records form a directed graph over members; a cycle in that graph means
//! partitions were passed around in a circle where leaving them alone would
//! have given the same loads.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error};

use crate::topic::TopicPartition;

/// A directed edge of the movement graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(super) struct ConsumerPair {
    pub src: String,
    pub dst: String,
}

impl ConsumerPair {
    fn new(src: &str, dst: &str) -> Self {
        Self {
            src: src.to_string(),
            dst: dst.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct PartitionMovements {
    movements: BTreeMap<TopicPartition, ConsumerPair>,
    partition_movements_by_topic:
        BTreeMap<String, BTreeMap<ConsumerPair, BTreeSet<TopicPartition>>>,
}

impl PartitionMovements {
    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.movements.len()
    }

    /// The member `partition` started the rebalance with, if it moved.
    pub fn origin(&self, partition: &TopicPartition) -> Option<&str> {
        self.movements.get(partition).map(|pair| pair.src.as_str())
    }

    fn remove_movement_record(&mut self, partition: &TopicPartition) -> Option<ConsumerPair> {
        let pair = self.movements.remove(partition)?;

        if let Some(by_pair) = self.partition_movements_by_topic.get_mut(&partition.topic) {
            if let Some(partitions) = by_pair.get_mut(&pair) {
                partitions.remove(partition);
                if partitions.is_empty() {
                    by_pair.remove(&pair);
                }
            }
            if by_pair.is_empty() {
                self.partition_movements_by_topic.remove(&partition.topic);
            }
        }

        Some(pair)
    }

    fn add_movement_record(&mut self, partition: &TopicPartition, pair: ConsumerPair) {
        self.partition_movements_by_topic
            .entry(partition.topic.clone())
            .or_default()
            .entry(pair.clone())
            .or_default()
            .insert(partition.clone());
        self.movements.insert(partition.clone(), pair);
    }

    /// Records that `partition` moves from `old_consumer` to `new_consumer`.
    ///
    /// A partition that moved before keeps its original source, and one that
    /// returns to its original source has its record dropped.
    pub fn move_partition(
        &mut self,
        partition: &TopicPartition,
        old_consumer: &str,
        new_consumer: &str,
    ) {
        match self.remove_movement_record(partition) {
            Some(existing) => {
                if existing.dst != old_consumer {
                    error!(
                        message = "partition moved from a member that does not own it",
                        topic = partition.topic.as_str(),
                        partition = partition.partition,
                        recorded = existing.dst.as_str(),
                        old_consumer,
                    );
                }

                if existing.src != new_consumer {
                    let pair = ConsumerPair::new(&existing.src, new_consumer);
                    self.add_movement_record(partition, pair);
                }
            }
            None => {
                if old_consumer != new_consumer {
                    let pair = ConsumerPair::new(old_consumer, new_consumer);
                    self.add_movement_record(partition, pair);
                }
            }
        }
    }

    /// Picks the partition to actually move when `partition` should go from
    /// `old_consumer` to `new_consumer`.
    ///
    /// If some partition of the same topic already moved the opposite way it is
    /// sent back instead, leaving loads identical while undoing a move.
    pub fn get_the_actual_partition_to_be_moved(
        &self,
        partition: &TopicPartition,
        old_consumer: &str,
        new_consumer: &str,
    ) -> TopicPartition {
        let reverse = ConsumerPair::new(new_consumer, old_consumer);

        self.partition_movements_by_topic
            .get(&partition.topic)
            .and_then(|by_pair| by_pair.get(&reverse))
            .and_then(|partitions| partitions.iter().next())
            .unwrap_or(partition)
            .clone()
    }

    /// The partitions to send back to their origin to break one three member
    /// rotation within `topic`, one per edge of the rotation.
    pub fn rotation(&self, topic: &str) -> Option<Vec<TopicPartition>> {
        let by_pair = self.partition_movements_by_topic.get(topic)?;
        let cycle = self
            .cycles(topic, 3)
            .into_iter()
            .find(|cycle| cycle.len() == 3)?;

        cycle
            .iter()
            .zip(cycle.iter().cycle().skip(1))
            .map(|(src, dst)| {
                by_pair
                    .get(&ConsumerPair::new(src, dst))
                    .and_then(|partitions| partitions.iter().next())
                    .cloned()
            })
            .collect()
    }

    /// Simple cycles of at most `max_len` members in the movement graph of
    /// `topic`, each listed once starting from its smallest member id.
    pub fn cycles(&self, topic: &str, max_len: usize) -> Vec<Vec<&str>> {
        let Some(by_pair) = self.partition_movements_by_topic.get(topic) else {
            return vec![];
        };

        let mut graph: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for pair in by_pair.keys() {
            graph
                .entry(pair.src.as_str())
                .or_default()
                .insert(pair.dst.as_str());
        }

        let mut cycles = vec![];
        for start in graph.keys() {
            let mut path = vec![*start];
            find_cycles(&graph, &mut path, max_len, &mut cycles);
        }
        cycles
    }

    /// Checks that no topic has a rotation among three members.
    ///
    /// Every cycle is logged, only three member cycles count as a violation.
    pub fn is_sticky(&self) -> bool {
        let mut sticky = true;

        for topic in self.partition_movements_by_topic.keys() {
            let cycles = self.cycles(topic, usize::MAX);
            for cycle in &cycles {
                debug!(
                    message = "cycle in partition movements",
                    topic = topic.as_str(),
                    length = cycle.len(),
                    ?cycle,
                );
            }

            if let Some(cycle) = cycles.iter().find(|cycle| cycle.len() == 3) {
                error!(
                    message = "stickiness is violated, partitions rotate among three members",
                    topic = topic.as_str(),
                    ?cycle,
                );
                sticky = false;
            }
        }

        sticky
    }
}

fn find_cycles<'a>(
    graph: &BTreeMap<&'a str, BTreeSet<&'a str>>,
    path: &mut Vec<&'a str>,
    max_len: usize,
    cycles: &mut Vec<Vec<&'a str>>,
) {
    let (Some(start), Some(current)) = (path.first().copied(), path.last().copied()) else {
        return;
    };
    let Some(next) = graph.get(current) else {
        return;
    };

    for node in next {
        if *node == start {
            cycles.push(path.clone());
        } else if *node > start && !path.contains(node) && path.len() < max_len {
            path.push(*node);
            find_cycles(graph, path, max_len, cycles);
            path.pop();
        }
    }
}
