//! Wire types exchanged through the consumer group protocol.
//!
//! # References
//! - <https://kafka.apache.org/protocol#The_Messages_JoinGroup>
//! - <https://cwiki.apache.org/confluence/display/KAFKA/A+Guide+To+The+Kafka+Protocol>

pub mod messages;
mod primitives;
pub mod traits;
mod vec_builder;
