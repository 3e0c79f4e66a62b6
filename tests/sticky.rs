
use std::collections::BTreeMap;

use proptest::prelude::*;
use sticky_assignor::balance::{
    BalanceStrategy, BalanceStrategyPlan, Members, StickyBalanceStrategy, Topics,
};
use sticky_assignor::protocol::messages::{
    ConsumerGroupMemberMetadata, StickyAssignorUserData, StickyAssignorUserDataV1,
};
use sticky_assignor::topic::TopicPartition;

use crate::test_helpers::maybe_start_logging;

fn topics(topics: Vec<(&str, Vec<i32>)>) -> Topics {
    topics
        .into_iter()
        .map(|(topic, partitions)| (topic.to_string(), partitions))
        .collect()
}

fn plan(want: Vec<(&str, Vec<(&str, Vec<i32>)>)>) -> BalanceStrategyPlan {
    want.into_iter()
        .map(|(member_id, topics)| {
            let topics = topics
                .into_iter()
                .map(|(topic, partitions)| (topic.to_string(), partitions))
                .collect::<BTreeMap<_, _>>();

            (member_id.to_string(), topics)
        })
        .collect::<BTreeMap<_, _>>()
        .into()
}

/// Members that join with whatever `previous` gave them in `generation`.
fn rejoin(
    subscriptions: Vec<(&str, Vec<&str>)>,
    previous: &BalanceStrategyPlan,
    generation: i32,
) -> Members {
    subscriptions
        .into_iter()
        .map(|(member_id, topics)| {
            let user_data = match previous.get(member_id) {
                Some(owned) => StickyBalanceStrategy
                    .assignment_data(member_id, owned, generation)
                    .unwrap(),
                None => vec![],
            };

            (
                member_id.to_string(),
                ConsumerGroupMemberMetadata::new(topics, user_data),
            )
        })
        .collect()
}

fn claiming(
    topics: Vec<&str>,
    owned: Vec<(&str, Vec<i32>)>,
    generation: i32,
) -> ConsumerGroupMemberMetadata {
    let user_data = StickyAssignorUserData::V1(StickyAssignorUserDataV1 {
        topics: owned
            .into_iter()
            .map(|(topic, partitions)| (topic.to_string(), partitions))
            .collect(),
        generation,
    });

    ConsumerGroupMemberMetadata::new(topics, user_data.encode().unwrap())
}

fn owners(plan: &BalanceStrategyPlan) -> BTreeMap<TopicPartition, String> {
    plan.iter()
        .flat_map(|(member_id, topics)| {
            topics.iter().flat_map(move |(topic, partitions)| {
                partitions.iter().map(move |partition| {
                    (
                        TopicPartition::new(topic.clone(), *partition),
                        member_id.clone(),
                    )
                })
            })
        })
        .collect()
}

/// Partitions present in both plans that changed owner.
fn moved(before: &BalanceStrategyPlan, after: &BalanceStrategyPlan) -> usize {
    let before = owners(before);
    owners(after)
        .into_iter()
        .filter(|(partition, owner)| before.get(partition).map_or(false, |old| old != owner))
        .count()
}

fn loads(plan: &BalanceStrategyPlan) -> Vec<usize> {
    plan.values()
        .map(|topics| topics.values().map(Vec::len).sum())
        .collect()
}

#[test]
fn fresh_group_is_split_evenly() {
    maybe_start_logging();

    let members = rejoin(
        vec![("M1", vec!["T"]), ("M2", vec!["T"])],
        &BalanceStrategyPlan::default(),
        0,
    );
    let got = StickyBalanceStrategy
        .plan(&members, &topics(vec![("T", vec![0, 1, 2, 3, 4, 5])]))
        .unwrap();

    assert_eq!(loads(&got), vec![3, 3]);
    assert_eq!(owners(&got).len(), 6);
    assert_eq!(
        got,
        plan(vec![
            ("M1", vec![("T", vec![0, 2, 4])]),
            ("M2", vec![("T", vec![1, 3, 5])]),
        ])
    );
}

#[test]
fn joining_member_takes_only_what_it_needs() {
    maybe_start_logging();

    let topics = topics(vec![("T", vec![0, 1, 2, 3, 4, 5])]);
    let first = plan(vec![
        ("M1", vec![("T", vec![0, 2, 4])]),
        ("M2", vec![("T", vec![1, 3, 5])]),
    ]);

    let members = rejoin(
        vec![("M1", vec!["T"]), ("M2", vec!["T"]), ("M3", vec!["T"])],
        &first,
        1,
    );
    let second = StickyBalanceStrategy.plan(&members, &topics).unwrap();

    assert_eq!(loads(&second), vec![2, 2, 2]);
    assert!(moved(&first, &second) <= 2);
    assert_eq!(
        second,
        plan(vec![
            ("M1", vec![("T", vec![2, 4])]),
            ("M2", vec![("T", vec![3, 5])]),
            ("M3", vec![("T", vec![0, 1])]),
        ])
    );

    // and M3 leaves again
    let members = rejoin(vec![("M1", vec!["T"]), ("M2", vec!["T"])], &second, 2);
    let third = StickyBalanceStrategy.plan(&members, &topics).unwrap();

    assert_eq!(loads(&third), vec![3, 3]);
    // only what M3 held changes hands
    assert_eq!(moved(&second, &third), 2);
    assert_eq!(
        third,
        plan(vec![
            ("M1", vec![("T", vec![0, 2, 4])]),
            ("M2", vec![("T", vec![1, 3, 5])]),
        ])
    );
}

#[test]
fn joining_members_move_no_more_than_they_receive() {
    maybe_start_logging();

    let topics = topics(vec![("T", (0..10).collect())]);
    let subscriptions = |ids: &[&'static str]| {
        ids.iter()
            .map(|id| (*id, vec!["T"]))
            .collect::<Vec<_>>()
    };

    let first = StickyBalanceStrategy
        .plan(
            &rejoin(subscriptions(&["M1", "M2", "M3"]), &BalanceStrategyPlan::default(), 0),
            &topics,
        )
        .unwrap();
    assert_eq!(loads(&first), vec![4, 3, 3]);

    let second = StickyBalanceStrategy
        .plan(
            &rejoin(subscriptions(&["M1", "M2", "M3", "M4", "M5"]), &first, 1),
            &topics,
        )
        .unwrap();

    assert_eq!(loads(&second), vec![2, 2, 2, 2, 2]);
    assert_eq!(moved(&first, &second), 4);
    assert_eq!(
        second,
        plan(vec![
            ("M1", vec![("T", vec![6, 9])]),
            ("M2", vec![("T", vec![4, 7])]),
            ("M3", vec![("T", vec![5, 8])]),
            ("M4", vec![("T", vec![0, 1])]),
            ("M5", vec![("T", vec![2, 3])]),
        ])
    );
}

#[test]
fn non_overlapping_subscriptions() {
    maybe_start_logging();

    let members = rejoin(
        vec![("M1", vec!["A"]), ("M2", vec!["B"])],
        &BalanceStrategyPlan::default(),
        0,
    );
    let got = StickyBalanceStrategy
        .plan(&members, &topics(vec![("A", vec![0, 1]), ("B", vec![0, 1])]))
        .unwrap();

    assert_eq!(
        got,
        plan(vec![
            ("M1", vec![("A", vec![0, 1])]),
            ("M2", vec![("B", vec![0, 1])]),
        ])
    );
}

#[test]
fn newer_generation_wins_conflicting_claims() {
    maybe_start_logging();

    let members: Members = [
        ("M1".to_string(), claiming(vec!["T"], vec![("T", vec![0])], 5)),
        ("M2".to_string(), claiming(vec!["T"], vec![("T", vec![0])], 7)),
    ]
    .into_iter()
    .collect();
    let got = StickyBalanceStrategy
        .plan(&members, &topics(vec![("T", vec![0])]))
        .unwrap();

    assert_eq!(
        got,
        plan(vec![("M1", vec![]), ("M2", vec![("T", vec![0])])])
    );
}

#[test]
fn moved_partition_prefers_its_previous_owner() {
    maybe_start_logging();

    let members: Members = [
        ("M1".to_string(), claiming(vec!["T"], vec![("T", vec![0])], 5)),
        ("M2".to_string(), claiming(vec!["T"], vec![("T", vec![0, 1, 2])], 7)),
        ("M3".to_string(), ConsumerGroupMemberMetadata::new(["T"], vec![])),
    ]
    .into_iter()
    .collect();
    let got = StickyBalanceStrategy
        .plan(&members, &topics(vec![("T", vec![0, 1, 2])]))
        .unwrap();

    assert_eq!(
        got,
        plan(vec![
            ("M1", vec![("T", vec![0])]),
            ("M2", vec![("T", vec![2])]),
            ("M3", vec![("T", vec![1])]),
        ])
    );
}

#[test]
fn replanning_own_output_changes_nothing() {
    maybe_start_logging();

    let topics = topics(vec![("A", vec![0, 1, 2]), ("B", vec![0, 1, 2, 3]), ("C", vec![0])]);
    let subscriptions = || {
        vec![
            ("M1", vec!["A", "B"]),
            ("M2", vec!["B", "C"]),
            ("M3", vec!["A", "B", "C"]),
            ("M4", vec!["A"]),
        ]
    };

    // start from claims that cross each other
    let crossed = plan(vec![
        ("M1", vec![("B", vec![0, 1, 2, 3])]),
        ("M2", vec![("C", vec![0])]),
        ("M3", vec![("A", vec![0, 1, 2])]),
    ]);
    let first = StickyBalanceStrategy
        .plan(&rejoin(subscriptions(), &crossed, 1), &topics)
        .unwrap();
    let second = StickyBalanceStrategy
        .plan(&rejoin(subscriptions(), &first, 2), &topics)
        .unwrap();
    let third = StickyBalanceStrategy
        .plan(&rejoin(subscriptions(), &second, 3), &topics)
        .unwrap();

    assert_eq!(owners(&first).len(), 8);
    assert_eq!(first, second);
    assert_eq!(second, third);
}

fn arb_subscriptions() -> impl Strategy<Value = (BTreeMap<String, Vec<String>>, Topics)> {
    let topics = prop::collection::btree_map("t[0-3]", 1..8i32, 1..4).prop_map(|topics| {
        topics
            .into_iter()
            .map(|(topic, count)| (topic, (0..count).collect::<Vec<_>>()))
            .collect::<Topics>()
    });
    let members = prop::collection::btree_map(
        "m[0-9]",
        prop::collection::vec("t[0-4]", 0..4),
        1..8,
    );

    (members, topics)
}

fn fresh(subscriptions: &BTreeMap<String, Vec<String>>) -> Members {
    subscriptions
        .iter()
        .map(|(member_id, topics)| {
            (
                member_id.clone(),
                ConsumerGroupMemberMetadata::new(topics.clone(), vec![]),
            )
        })
        .collect()
}

fn with_user_data(
    subscriptions: &BTreeMap<String, Vec<String>>,
    previous: &BalanceStrategyPlan,
    generation: i32,
) -> Members {
    subscriptions
        .iter()
        .map(|(member_id, topics)| {
            let owned = previous.get(member_id).cloned().unwrap_or_default();
            let user_data = StickyBalanceStrategy
                .assignment_data(member_id, &owned, generation)
                .unwrap();

            (
                member_id.clone(),
                ConsumerGroupMemberMetadata::new(topics.clone(), user_data),
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig{fork: false, ..Default::default()})]

    #[test]
    fn assigned_partitions_are_valid_and_complete((subscriptions, topics) in arb_subscriptions()) {
        let got = StickyBalanceStrategy.plan(&fresh(&subscriptions), &topics).unwrap();

        for (member_id, assigned) in got.iter() {
            for (topic, partitions) in assigned {
                prop_assert!(subscriptions[member_id].contains(topic));
                for partition in partitions {
                    prop_assert!(topics[topic].contains(partition));
                }
            }
        }

        let owners = owners(&got);
        let assigned = loads(&got).into_iter().sum::<usize>();
        prop_assert_eq!(owners.len(), assigned);

        for (topic, partitions) in &topics {
            let subscribed = subscriptions.values().any(|topics| topics.contains(topic));
            for partition in partitions {
                let owned = owners.contains_key(&TopicPartition::new(topic.clone(), *partition));
                prop_assert_eq!(owned, subscribed);
            }
        }
    }

    #[test]
    fn identical_subscriptions_are_balanced(
        (subscriptions, topics) in arb_subscriptions(),
        subscribed in prop::collection::vec("t[0-4]", 1..4),
        generation in 0..10i32,
    ) {
        let subscriptions = subscriptions
            .into_keys()
            .map(|member_id| (member_id, subscribed.clone()))
            .collect::<BTreeMap<_, _>>();

        let first = StickyBalanceStrategy.plan(&fresh(&subscriptions), &topics).unwrap();
        let loads_first = loads(&first);
        prop_assert!(loads_first.iter().max().unwrap() - loads_first.iter().min().unwrap() <= 1);

        // drop one member and replan from the prior records
        let mut remaining = subscriptions.clone();
        if remaining.len() > 1 {
            remaining.pop_first();
        }
        let second = StickyBalanceStrategy
            .plan(&with_user_data(&remaining, &first, generation), &topics)
            .unwrap();
        let loads_second = loads(&second);
        prop_assert!(loads_second.iter().max().unwrap() - loads_second.iter().min().unwrap() <= 1);
    }

    #[test]
    fn plan_is_deterministic((subscriptions, topics) in arb_subscriptions(), generation in 0..10i32) {
        let first = StickyBalanceStrategy.plan(&fresh(&subscriptions), &topics).unwrap();
        prop_assert_eq!(&first, &StickyBalanceStrategy.plan(&fresh(&subscriptions), &topics).unwrap());

        let members = with_user_data(&subscriptions, &first, generation);
        let second = StickyBalanceStrategy.plan(&members, &topics).unwrap();
        prop_assert_eq!(second, StickyBalanceStrategy.plan(&members, &topics).unwrap());
    }

    #[test]
    fn plan_is_a_fixed_point((subscriptions, topics) in arb_subscriptions(), generation in 0..10i32) {
        let first = StickyBalanceStrategy.plan(&fresh(&subscriptions), &topics).unwrap();
        let second = StickyBalanceStrategy
            .plan(&with_user_data(&subscriptions, &first, generation), &topics)
            .unwrap();

        prop_assert_eq!(first, second);
    }

    #[test]
    fn assignment_data_roundtrip(
        owned in prop::collection::btree_map("[a-z]{1,8}", prop::collection::vec(0..100i32, 0..5), 0..4),
        generation: i32,
    ) {
        let data = StickyBalanceStrategy.assignment_data("m", &owned, generation).unwrap();
        let decoded = StickyAssignorUserData::decode(&data).unwrap();

        prop_assert_eq!(decoded.topics(), &owned);
        prop_assert_eq!(decoded.generation(), Some(generation));
    }
}
