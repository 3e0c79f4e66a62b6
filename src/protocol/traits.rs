use std::io::{Cursor, Read, Write};

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReadError {
    #[error("Cannot read data: {0}")]
    IO(#[from] std::io::Error),

    #[error("Overflow converting integer: {0}")]
    Overflow(#[from] std::num::TryFromIntError),

    #[error("Malformed data: {0}")]
    Malformed(#[from] Box<dyn std::error::Error + Send + Sync>),
}

pub trait ReadType<R>: Sized
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError>;
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WriteError {
    #[error("Cannot write data: {0}")]
    IO(#[from] std::io::Error),

    #[error("Overflow converting integer: {0}")]
    Overflow(#[from] std::num::TryFromIntError),

    #[error("Malformed data: {0}")]
    Malformed(#[from] Box<dyn std::error::Error + Send + Sync>),
}

pub trait WriteType<W>: Sized
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError>;
}

/// Decodes `T` from the whole of `buf`.
///
/// Opaque blobs such as consumer group user data carry no outer length and a
/// shorter layout can parse a prefix of a longer one, so leftover bytes are
/// malformed input.
pub fn read_exhaustive<T>(buf: &[u8]) -> Result<T, ReadError>
where
    T: for<'a> ReadType<Cursor<&'a [u8]>>,
{
    let mut cursor = Cursor::new(buf);
    let value = T::read(&mut cursor)?;

    let consumed = usize::try_from(cursor.position())?;
    if consumed != buf.len() {
        return Err(ReadError::Malformed(
            format!("{} trailing bytes after {} bytes", buf.len() - consumed, consumed).into(),
        ));
    }

    Ok(value)
}

/// Encodes `value` into a freshly allocated buffer.
pub fn write_to_vec<T>(value: &T) -> Result<Vec<u8>, WriteError>
where
    T: WriteType<Vec<u8>>,
{
    let mut buf = Vec::new();
    value.write(&mut buf)?;
    Ok(buf)
}
