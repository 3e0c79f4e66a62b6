//! Payloads carried inside JoinGroup / SyncGroup as opaque bytes.

mod consumer_group;
mod sticky_user_data;

pub use consumer_group::*;
pub use sticky_user_data::*;
