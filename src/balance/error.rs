use thiserror::Error;

use crate::protocol::traits::{ReadError, WriteError};

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Cannot decode prior assignment of member '{member_id}': {source}")]
    Decode {
        member_id: String,
        source: ReadError,
    },

    #[error("Cannot encode assignment data: {0}")]
    Encode(#[from] WriteError),

    #[error("Unsupported balance strategy: {0}")]
    UnsupportedStrategy(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
