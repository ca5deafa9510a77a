use std::collections::VecDeque;
use std::io;

use crate::net::chunk::Chunk;
use crate::net::chunkpool::ChunkPool;

/// A dynamically sized, pooled FIFO byte queue. Data is appended at the head
/// and read from the tail. Used by [`crate::net::framer::FrameReader`] to
/// accumulate inbound bytes across however many `read()` calls it takes for a
/// full frame to arrive.
pub struct Buffer {
    chunks: VecDeque<Chunk>,
    pool: ChunkPool,
    len: usize,
}

impl Buffer {
    #[inline]
    pub fn new() -> Buffer {
        let mut chunks = VecDeque::new();
        chunks.push_back(Chunk::new());
        Buffer {
            chunks,
            pool: ChunkPool::new(),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads once from `reader` into the buffer's tail chunk, growing the
    /// chunk list as needed. Returns the number of bytes read; `0` means EOF.
    pub fn ingress<R: io::Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        if self.chunks.back().unwrap().capacity() == 0 {
            self.chunks.push_back(self.pool.alloc());
        }
        let chunk = self.chunks.back_mut().unwrap();
        let count = reader.read(chunk.writeable_slice())?;
        chunk.expand(count);
        self.len += count;
        Ok(count)
    }

    /// Pulls out exactly `count` bytes if available, reclaiming any chunk
    /// fully drained in the process. Returns `None` without mutating the
    /// buffer when fewer than `count` bytes are buffered.
    pub fn take(&mut self, count: usize) -> Option<Vec<u8>> {
        if self.len < count {
            return None;
        }

        let mut out = Vec::with_capacity(count);
        let mut remaining = count;
        while remaining > 0 {
            let chunk = self.chunks.front_mut().unwrap();
            let take = remaining.min(chunk.remaining_data());
            out.extend_from_slice(&chunk.read(take)[..]);
            remaining -= take;

            if chunk.remaining_data() == 0 && self.chunks.len() > 1 {
                let drained = self.chunks.pop_front().unwrap();
                self.pool.reclaim(drained);
            }
        }
        self.len -= count;
        Some(out)
    }

    /// Writes `payload` out through `writer` in full, looping over short
    /// writes. Used for response frames, which are small enough not to
    /// warrant going through the chunk pool.
    pub fn egress_all<W: io::Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
        writer.write_all(payload)
    }
}

impl Default for Buffer {
    fn default() -> Buffer {
        Buffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn ingress_then_take_roundtrips_arbitrary_chunking() {
        let data: Vec<u8> = (0..20000u32).map(|i| i as u8).collect();
        let mut buffer = Buffer::new();

        // Feed the buffer in small, irregular reads to model TCP chunking.
        for slice in data.chunks(777) {
            let mut cursor = Cursor::new(slice.to_vec());
            buffer.ingress(&mut cursor).unwrap();
        }

        assert_eq!(buffer.len(), data.len());
        let out = buffer.take(data.len()).unwrap();
        assert_eq!(out, data);
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn take_returns_none_when_insufficient_data() {
        let mut buffer = Buffer::new();
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        buffer.ingress(&mut cursor).unwrap();

        assert!(buffer.take(10).is_none());
        assert_eq!(buffer.take(3).unwrap(), vec![1, 2, 3]);
    }
}
