use std::collections::BTreeMap;

use tracing::{debug, error, trace};

use super::movements::PartitionMovements;
use super::sort::{balance_score, sort_member_ids_by_partition_assignments};
use super::{Assignment, ConsumerGenerationPair};
use crate::topic::TopicPartition;

/// Working state of one sticky rebalance.
#[derive(Debug)]
pub(super) struct Balancer<'a> {
    pub current_assignment: Assignment,
    pub current_partition_consumer: BTreeMap<TopicPartition, String>,
    pub previous_assignment: &'a BTreeMap<TopicPartition, ConsumerGenerationPair>,
    pub partition2all_potential_consumers: &'a BTreeMap<TopicPartition, Vec<String>>,
    pub consumer2all_potential_partitions: &'a BTreeMap<String, Vec<TopicPartition>>,
    pub movements: PartitionMovements,
}

impl Balancer<'_> {
    fn assigned(&self, member_id: &str) -> usize {
        self.current_assignment.get(member_id).map_or(0, Vec::len)
    }

    fn potential_partitions(&self, member_id: &str) -> &[TopicPartition] {
        self.consumer2all_potential_partitions
            .get(member_id)
            .map_or(&[][..], Vec::as_slice)
    }

    fn potential_consumers(&self, partition: &TopicPartition) -> &[String] {
        self.partition2all_potential_consumers
            .get(partition)
            .map_or(&[][..], Vec::as_slice)
    }

    fn is_potential_consumer(&self, member_id: &str, partition: &TopicPartition) -> bool {
        self.potential_consumers(partition)
            .binary_search_by(|consumer| consumer.as_str().cmp(member_id))
            .is_ok()
    }

    /// Hands out unowned partitions, then moves partitions until no move
    /// improves balance.
    ///
    /// If that leaves the group no better balanced than it started, the moves
    /// are undone.
    pub fn balance(
        &mut self,
        mut sorted_partitions: Vec<TopicPartition>,
        unassigned_partitions: &[TopicPartition],
        is_fresh_assignment: bool,
    ) {
        for partition in unassigned_partitions {
            if self.potential_consumers(partition).is_empty() {
                trace!(
                    message = "no member subscribes to partition",
                    topic = partition.topic.as_str(),
                    partition = partition.partition,
                );
                continue;
            }

            self.assign_partition(partition);
        }

        // a partition only one member can consume never moves
        sorted_partitions.retain(|partition| self.can_partition_participate(partition));

        // neither does a member that already has all it can get and nothing
        // anyone else wants
        let mut fixed_assignments = Assignment::new();
        let members = self.current_assignment.keys().cloned().collect::<Vec<_>>();
        for member_id in members {
            if !self.can_consumer_participate(&member_id) {
                if let Some(partitions) = self.current_assignment.remove(&member_id) {
                    fixed_assignments.insert(member_id, partitions);
                }
            }
        }

        let pre_balance_assignment = self.current_assignment.clone();
        let pre_balance_partition_consumers = self.current_partition_consumer.clone();

        let reassignment_performed = self.perform_reassignments(&sorted_partitions);

        let pre_balance_score = balance_score(&pre_balance_assignment);
        let score = balance_score(&self.current_assignment);
        if !is_fresh_assignment && reassignment_performed && score >= pre_balance_score {
            debug!(
                message = "reverting reassignments that did not improve balance",
                score,
                pre_balance_score,
            );
            self.current_assignment = pre_balance_assignment;
            self.current_partition_consumer = pre_balance_partition_consumers;
            self.movements = PartitionMovements::default();
        } else {
            debug!(
                message = "balanced assignment",
                score,
                pre_balance_score,
                fixed = fixed_assignments.len(),
            );
        }

        self.current_assignment.extend(fixed_assignments);
    }

    /// Gives `partition` to the least loaded member that can consume it.
    fn assign_partition(&mut self, partition: &TopicPartition) {
        let member_id = sort_member_ids_by_partition_assignments(&self.current_assignment)
            .into_iter()
            .find(|member_id| self.is_potential_consumer(member_id, partition))
            .map(str::to_string);

        if let Some(member_id) = member_id {
            self.current_partition_consumer
                .insert(partition.clone(), member_id.clone());
            self.current_assignment
                .entry(member_id)
                .or_default()
                .push(partition.clone());
        }
    }

    fn can_partition_participate(&self, partition: &TopicPartition) -> bool {
        self.potential_consumers(partition).len() >= 2
    }

    fn can_consumer_participate(&self, member_id: &str) -> bool {
        let assigned = self.assigned(member_id);
        let max_assignment_size = self.potential_partitions(member_id).len();

        if assigned > max_assignment_size {
            error!(
                message = "member is assigned more partitions than it can consume",
                member_id,
                assigned,
                max_assignment_size,
            );
        }
        if assigned < max_assignment_size {
            return true;
        }

        self.current_assignment
            .get(member_id)
            .into_iter()
            .flatten()
            .any(|partition| self.can_partition_participate(partition))
    }

    /// True when no member could take a partition from a member holding two or
    /// more partitions more than itself.
    fn is_balanced(&self) -> bool {
        let sorted_members = sort_member_ids_by_partition_assignments(&self.current_assignment);
        let (Some(least), Some(most)) = (sorted_members.first(), sorted_members.last()) else {
            return true;
        };
        if self.assigned(least) + 1 >= self.assigned(most) {
            return true;
        }

        let mut all_partitions: BTreeMap<&TopicPartition, &str> = BTreeMap::new();
        for (member_id, partitions) in &self.current_assignment {
            for partition in partitions {
                if let Some(other) = all_partitions.insert(partition, member_id) {
                    error!(
                        message = "partition is assigned to more than one member",
                        topic = partition.topic.as_str(),
                        partition = partition.partition,
                        member_id = member_id.as_str(),
                        other,
                    );
                }
            }
        }

        for member_id in &sorted_members {
            let assigned = self.assigned(member_id);
            let potential = self.potential_partitions(member_id);
            if assigned == potential.len() {
                continue;
            }

            for partition in potential {
                match all_partitions.get(partition) {
                    Some(owner) if owner != member_id => {
                        if self.assigned(owner) > assigned + 1 {
                            return false;
                        }
                    }
                    _ => {}
                }
            }
        }

        true
    }

    /// Repeats passes over `partitions` until one changes nothing, returns
    /// whether anything moved at all.
    fn perform_reassignments(&mut self, partitions: &[TopicPartition]) -> bool {
        let mut reassignment_performed = false;

        loop {
            let mut modified = false;

            for partition in partitions {
                if self.is_balanced() {
                    break;
                }

                let Some(consumer) = self.current_partition_consumer.get(partition).cloned() else {
                    error!(
                        message = "partition is not assigned to anyone",
                        topic = partition.topic.as_str(),
                        partition = partition.partition,
                    );
                    continue;
                };
                let assigned = self.assigned(&consumer);

                // hand it back to its previous owner if that evens things out
                if let Some(previous) = self.previous_assignment.get(partition).cloned() {
                    let ConsumerGenerationPair {
                        member_id: previous,
                        generation,
                    } = previous;

                    if previous != consumer
                        && self.current_assignment.contains_key(&previous)
                        && self.is_potential_consumer(&previous, partition)
                        && assigned > self.assigned(&previous) + 1
                    {
                        trace!(
                            message = "returning partition to previous owner",
                            topic = partition.topic.as_str(),
                            partition = partition.partition,
                            member_id = previous.as_str(),
                            generation,
                        );
                        self.reassign_partition(partition, &previous);
                        reassignment_performed = true;
                        modified = true;
                        continue;
                    }
                }

                // otherwise give it to the least loaded member that can take it
                let candidate = sort_member_ids_by_partition_assignments(&self.current_assignment)
                    .into_iter()
                    .find(|member_id| self.is_potential_consumer(member_id, partition))
                    .map(str::to_string);
                if let Some(other) = candidate {
                    if assigned > self.assigned(&other) + 1 {
                        self.reassign_partition(partition, &other);
                        reassignment_performed = true;
                        modified = true;
                    }
                }
            }

            if !modified {
                return reassignment_performed;
            }
        }
    }

    fn reassign_partition(&mut self, partition: &TopicPartition, new_consumer: &str) {
        let Some(consumer) = self.current_partition_consumer.get(partition).cloned() else {
            return;
        };

        // the partition may have already moved the other way, in which case
        // that move is undone instead
        let partition_to_be_moved =
            self.movements
                .get_the_actual_partition_to_be_moved(partition, &consumer, new_consumer);
        self.process_partition_movement(&partition_to_be_moved, new_consumer);

        self.cancel_rotations(&partition.topic);
    }

    /// Sends partitions rotating among three members back where they came
    /// from. Loads are unchanged by this.
    fn cancel_rotations(&mut self, topic: &str) {
        while let Some(partitions) = self.movements.rotation(topic) {
            debug!(
                message = "cancelling partition rotation",
                topic,
                ?partitions,
            );

            for partition in partitions {
                if let Some(origin) = self.movements.origin(&partition).map(str::to_string) {
                    self.process_partition_movement(&partition, &origin);
                }
            }
        }
    }

    fn process_partition_movement(&mut self, partition: &TopicPartition, new_consumer: &str) {
        let Some(old_consumer) = self.current_partition_consumer.get(partition).cloned() else {
            return;
        };

        trace!(
            message = "moving partition",
            topic = partition.topic.as_str(),
            partition = partition.partition,
            from = old_consumer.as_str(),
            to = new_consumer,
        );

        self.movements
            .move_partition(partition, &old_consumer, new_consumer);

        if let Some(partitions) = self.current_assignment.get_mut(&old_consumer) {
            partitions.retain(|p| p != partition);
        }
        self.current_assignment
            .entry(new_consumer.to_string())
            .or_default()
            .push(partition.clone());
        self.current_partition_consumer
            .insert(partition.clone(), new_consumer.to_string());
    }
}
