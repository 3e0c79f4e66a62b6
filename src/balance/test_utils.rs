use std::collections::BTreeMap;

use super::{BalanceStrategyPlan, Members, Topics};
use crate::protocol::messages::ConsumerGroupMemberMetadata;

/// Members without prior-assignment user data.
pub(crate) fn members(subscriptions: Vec<(&str, Vec<&str>)>) -> Members {
    subscriptions
        .into_iter()
        .map(|(member_id, topics)| {
            (
                member_id.to_string(),
                ConsumerGroupMemberMetadata::new(topics, vec![]),
            )
        })
        .collect()
}

pub(crate) fn topics(topics: Vec<(&str, Vec<i32>)>) -> Topics {
    topics
        .into_iter()
        .map(|(topic, partitions)| (topic.to_string(), partitions))
        .collect()
}

pub(crate) fn plan(want: Vec<(&str, Vec<(&str, Vec<i32>)>)>) -> BalanceStrategyPlan {
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
