//! Helper to build a vector from an untrusted length prefix w/o blowing up memory.
//!
//! A user data blob claiming `i32::MAX` partitions must fail with an IO error
//! once the input runs dry, not abort the process while pre-allocating.

use std::io::Read;

/// Elements allocated up front; the rest grows on demand.
const DEFAULT_BLOCK_SIZE: usize = 1024;

#[derive(Debug)]
pub struct VecBuilder<T> {
    expected: usize,
    block_size: usize,
    remaining: usize,
    inner: Vec<T>,
}

impl<T> VecBuilder<T> {
    pub fn new(expected: usize) -> Self {
        Self::new_with_block_size(expected, DEFAULT_BLOCK_SIZE)
    }

    fn new_with_block_size(expected: usize, block_size: usize) -> Self {
        let initial = expected.min(block_size);
        Self {
            expected,
            block_size,
            remaining: expected - initial,
            inner: Vec::with_capacity(initial),
        }
    }

    pub fn push(&mut self, v: T) {
        if self.inner.len() == self.inner.capacity() && self.remaining > 0 {
            let grow = self.remaining.min(self.block_size);
            self.inner.reserve_exact(grow);
            self.remaining -= grow;
        }

        self.inner.push(v);
    }
}

impl VecBuilder<u8> {
    /// Fill the builder with exactly the announced number of bytes.
    pub fn read_exact<R: Read>(mut self, reader: &mut R) -> Result<Self, std::io::Error> {
        let mut want = self.expected.saturating_sub(self.inner.len());
        let mut block = vec![0u8; want.min(self.block_size)];

        while want > 0 {
            let n = want.min(block.len());
            reader.read_exact(&mut block[..n])?;
            for b in &block[..n] {
                self.push(*b);
            }
            want -= n;
        }

        Ok(self)
    }
}

impl<T> From<VecBuilder<T>> for Vec<T> {
    fn from(builder: VecBuilder<T>) -> Self {
        builder.inner
    }
}
