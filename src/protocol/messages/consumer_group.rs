use std::io::{Read, Write};

use crate::protocol::primitives::{read_array_len, write_array_len};
use crate::protocol::traits::{ReadError, ReadType, WriteError, WriteType};
use crate::protocol::vec_builder::VecBuilder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedPartition {
    pub topic: String,
    pub partitions: Vec<i32>,
}

impl<R> ReadType<R> for OwnedPartition
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let topic = String::read(reader)?;
        let partitions = Vec::<i32>::read(reader)?;

        Ok(Self { topic, partitions })
    }
}

impl<W> WriteType<W> for OwnedPartition
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        self.partitions.write(writer)
    }
}

// ConsumerGroupMemberMetadata holds the metadata for consumer group
// https://github.com/apache/kafka/blob/trunk/clients/src/main/resources/common/message/ConsumerProtocolSubscription.json
//
// For the balance strategies only `topics` (the subscription) and `user_data`
// (the strategy specific prior-assignment record) matter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerGroupMemberMetadata {
    pub version: i16,
    // Version >= 0
    pub topics: Vec<String>,
    // Version >= 0
    pub user_data: Vec<u8>,
    // Version >= 1
    pub owned_partitions: Vec<OwnedPartition>,
    // Version >= 2
    pub generation_id: i32,
    // Version >= 3
    pub rack_id: Option<String>,
}

impl ConsumerGroupMemberMetadata {
    /// Version 0 subscription to `topics` carrying `user_data`.
    pub fn new<I, S>(topics: I, user_data: Vec<u8>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            version: 0,
            topics: topics.into_iter().map(Into::into).collect(),
            user_data,
            owned_partitions: vec![],
            generation_id: 0,
            rack_id: None,
        }
    }
}

impl<R> ReadType<R> for ConsumerGroupMemberMetadata
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let version = i16::read(reader)?;
        let topics = Vec::<String>::read(reader)?;
        let user_data = ReadType::read(reader)?;

        let owned_partitions = if version >= 1 {
            let len = read_array_len(reader)?;
            let mut owned_partitions = VecBuilder::new(len);
            for _i in 0..len {
                owned_partitions.push(OwnedPartition::read(reader)?);
            }

            owned_partitions.into()
        } else {
            vec![]
        };

        let generation_id = if version >= 2 { i32::read(reader)? } else { 0 };

        let rack_id = if version >= 3 {
            Option::<String>::read(reader)?
        } else {
            None
        };

        Ok(Self {
            version,
            topics,
            user_data,
            owned_partitions,
            generation_id,
            rack_id,
        })
    }
}

impl<W: Write> WriteType<W> for ConsumerGroupMemberMetadata {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.version.write(writer)?;
        self.topics.write(writer)?;
        self.user_data.write(writer)?;

        if self.version >= 1 {
            write_array_len(writer, self.owned_partitions.len())?;
            for op in &self.owned_partitions {
                op.write(writer)?;
            }
        }

        if self.version >= 2 {
            self.generation_id.write(writer)?;
        }

        if self.version >= 3 {
            self.rack_id.write(writer)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionAssignment {
    /// The topic name
    pub topic: String,

    /// The partition array
    pub partitions: Vec<i32>,
}

impl<R> ReadType<R> for PartitionAssignment
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let topic = String::read(reader)?;
        let partitions = Vec::<i32>::read(reader)?;

        Ok(Self { topic, partitions })
    }
}

impl<W> WriteType<W> for PartitionAssignment
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        self.partitions.write(writer)
    }
}

// ConsumerGroupMemberAssignment holds the member assignment for a consume group
// https://github.com/apache/kafka/blob/trunk/clients/src/main/resources/common/message/ConsumerProtocolAssignment.json
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroupMemberAssignment {
    pub version: i16,
    pub topics: Vec<PartitionAssignment>,
    pub user_data: Vec<u8>,
}

impl<R> ReadType<R> for ConsumerGroupMemberAssignment
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let version = i16::read(reader)?;

        let len = read_array_len(reader)?;
        let mut topics = VecBuilder::new(len);
        for _i in 0..len {
            topics.push(PartitionAssignment::read(reader)?);
        }

        let user_data = ReadType::read(reader)?;

        Ok(Self {
            version,
            topics: topics.into(),
            user_data,
        })
    }
}

impl<W> WriteType<W> for ConsumerGroupMemberAssignment
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.version.write(writer)?;

        write_array_len(writer, self.topics.len())?;
        for topic in &self.topics {
            topic.write(writer)?;
        }

        self.user_data.write(writer)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn consumer_group_member_metadata_v0() {
        let metadata = ConsumerGroupMemberMetadata::new(["one", "two"], vec![0x01, 0x02, 0x03]);
        let data = [
            0, 0, // Version
            0, 0, 0, 2, // Topic array length
            0, 3, b'o', b'n', b'e', // Topic one
            0, 3, b't', b'w', b'o', // Topic two
            0, 0, 0, 3, 0x01, 0x02, 0x03, // Userdata
        ]
        .as_ref();

        let mut buf = vec![];
        metadata.write(&mut buf).unwrap();
        assert_eq!(buf, data);

        let new = ConsumerGroupMemberMetadata::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(new, metadata);
    }

    #[test]
    fn consumer_group_member_metadata_v1() {
        let v1 = [
            0, 1, // Version
            0, 0, 0, 2, // Topic array length
            0, 3, b'o', b'n', b'e', // Topic one
            0, 3, b't', b'w', b'o', // Topic two
            0, 0, 0, 3, 0x01, 0x02, 0x03, // Userdata
            0, 0, 0, 0, // OwnedPartitions KIP-429
        ];
        let v1_bad = [
            0, 1, // Version
            0, 0, 0, 2, // Topic array length
            0, 3, b'o', b'n', b'e', // Topic one
            0, 3, b't', b'w', b'o', // Topic two
            0, 0, 0, 3, 0x01, 0x02, 0x03, // Userdata
        ];

        let mut cursor = Cursor::new(v1);
        ConsumerGroupMemberMetadata::read(&mut cursor).unwrap();
        let mut cursor = Cursor::new(v1_bad);
        ConsumerGroupMemberMetadata::read(&mut cursor).expect_err("v1 bad");
    }

    #[test]
    fn consumer_group_member_metadata_v3() {
        let v3 = [
            0, 3, // Version
            0, 0, 0, 1, // Topic array length
            0, 3, b'o', b'n', b'e', // Topic one
            0, 0, 0, 3, 0x01, 0x02, 0x03, // Userdata
            0, 0, 0, 1, // OwnedPartitions KIP-429
            0, 3, b'o', b'n', b'e', // Owned topic one
            0, 0, 0, 1, 0, 0, 0, 4, // Owned partition 4
            0, 0, 0, 64, // GenerationID
            0, 4, b'r', b'a', b'c', b'k', // RackID
        ];
        let got = ConsumerGroupMemberMetadata::read(&mut Cursor::new(v3)).unwrap();
        assert_eq!(
            got.owned_partitions,
            vec![OwnedPartition {
                topic: "one".to_string(),
                partitions: vec![4],
            }]
        );
        assert_eq!(got.generation_id, 64);
        assert_eq!(got.rack_id.as_deref(), Some("rack"));

        let mut buf = vec![];
        got.write(&mut buf).unwrap();
        assert_eq!(buf, v3);
    }

    #[test]
    fn consumer_group_member_assignment() {
        let want = ConsumerGroupMemberAssignment {
            version: 0,
            topics: vec![PartitionAssignment {
                topic: "one".to_string(),
                partitions: vec![0, 2, 4],
            }],
            user_data: vec![0x01, 0x02, 0x03],
        };

        let data = [
            0, 0, // Version
            0, 0, 0, 1, // Topic array length
            0, 3, b'o', b'n', b'e', // Topic one
            0, 0, 0, 3, // Topic one, partition array length
            0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 4, // 0, 2, 4
            0, 0, 0, 3, 0x01, 0x02, 0x03, // Userdata
        ];
        let got = ConsumerGroupMemberAssignment::read(&mut Cursor::new(data)).unwrap();
        assert_eq!(got, want);

        let mut buf = vec![];
        want.write(&mut buf).unwrap();
        assert_eq!(buf, data);
    }
}
