//! User data the sticky strategy attaches to every member's subscription.
//!
//! It records what the member owned after the previous rebalance so the next
//! leader can keep those partitions where they are. The layout matches the
//! `StickyAssignor` of the Java client:
//!
//! ```text
//! v0: [topic: STRING, partitions: [INT32]]
//! v1: [topic: STRING, partitions: [INT32]] generation: INT32
//! ```
//!
//! There is no version marker. Readers try v1 first and fall back to v0.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::protocol::primitives::{read_array_len, write_array_len};
use crate::protocol::traits::{
    read_exhaustive, write_to_vec, ReadError, ReadType, WriteError, WriteType,
};
use crate::topic::TopicPartition;

fn read_topics<R: Read>(reader: &mut R) -> Result<BTreeMap<String, Vec<i32>>, ReadError> {
    let len = read_array_len(reader)?;

    let mut topics: BTreeMap<String, Vec<i32>> = BTreeMap::new();
    for _ in 0..len {
        let topic = String::read(reader)?;
        let partitions = Vec::<i32>::read(reader)?;
        topics.entry(topic).or_default().extend(partitions);
    }

    Ok(topics)
}

fn write_topics<W: Write>(
    writer: &mut W,
    topics: &BTreeMap<String, Vec<i32>>,
) -> Result<(), WriteError> {
    write_array_len(writer, topics.len())?;
    for (topic, partitions) in topics {
        topic.write(writer)?;
        partitions.write(writer)?;
    }

    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct StickyAssignorUserDataV0 {
    pub topics: BTreeMap<String, Vec<i32>>,
}

impl<R: Read> ReadType<R> for StickyAssignorUserDataV0 {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let topics = read_topics(reader)?;
        Ok(Self { topics })
    }
}

impl<W: Write> WriteType<W> for StickyAssignorUserDataV0 {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        write_topics(writer, &self.topics)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct StickyAssignorUserDataV1 {
    pub topics: BTreeMap<String, Vec<i32>>,
    pub generation: i32,
}

impl<R: Read> ReadType<R> for StickyAssignorUserDataV1 {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let topics = read_topics(reader)?;
        let generation = i32::read(reader)?;
        Ok(Self { topics, generation })
    }
}

impl<W: Write> WriteType<W> for StickyAssignorUserDataV1 {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        write_topics(writer, &self.topics)?;
        self.generation.write(writer)
    }
}

/// A decoded prior-assignment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StickyAssignorUserData {
    V0(StickyAssignorUserDataV0),
    V1(StickyAssignorUserDataV1),
}

impl StickyAssignorUserData {
    /// Decode a record, trying v1 before v0.
    ///
    /// When neither layout matches the whole buffer the v0 error is returned.
    pub fn decode(buf: &[u8]) -> Result<Self, ReadError> {
        match read_exhaustive::<StickyAssignorUserDataV1>(buf) {
            Ok(v1) => Ok(Self::V1(v1)),
            Err(_) => read_exhaustive::<StickyAssignorUserDataV0>(buf).map(Self::V0),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WriteError> {
        match self {
            Self::V0(v0) => write_to_vec(v0),
            Self::V1(v1) => write_to_vec(v1),
        }
    }

    pub fn topics(&self) -> &BTreeMap<String, Vec<i32>> {
        match self {
            Self::V0(v0) => &v0.topics,
            Self::V1(v1) => &v1.topics,
        }
    }

    /// The generation the record was written in, v0 records carry none.
    pub fn generation(&self) -> Option<i32> {
        match self {
            Self::V0(_) => None,
            Self::V1(v1) => Some(v1.generation),
        }
    }

    /// Every claimed partition, in topic then record order.
    pub fn partitions(&self) -> Vec<TopicPartition> {
        self.topics()
            .iter()
            .flat_map(|(topic, partitions)| {
                partitions
                    .iter()
                    .map(move |partition| TopicPartition::new(topic.clone(), *partition))
            })
            .collect()
    }
}
