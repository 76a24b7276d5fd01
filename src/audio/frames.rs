//! Captured audio storage
//!
//! Chunks move from the capture thread (single [`FrameWriter`]) to the
//! controlling thread ([`FrameLog`]) over a channel, with the count published
//! through an atomic. Neither side takes a lock per chunk. The log drains into
//! a [`FrameBuffer`] once the writer is done.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

/// Raw PCM chunks in capture order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    chunks: Vec<Vec<u8>>,
}

impl FrameBuffer {
    /// Wrap already captured chunks
    pub fn from_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self { chunks }
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total length of all chunks in bytes
    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    /// Interleaved little-endian i16 samples across all chunks.
    /// A trailing odd byte in a chunk is ignored.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.chunks.iter().flat_map(|chunk| {
            chunk
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        })
    }
}

/// Create a connected writer/log pair
pub(crate) fn frame_log() -> (FrameWriter, FrameLog) {
    let (tx, rx) = mpsc::channel();
    let published = Arc::new(AtomicUsize::new(0));
    (
        FrameWriter {
            tx,
            published: Arc::clone(&published),
        },
        FrameLog { rx, published },
    )
}

/// Capture-thread end of the log
#[derive(Debug)]
pub(crate) struct FrameWriter {
    tx: mpsc::Sender<Vec<u8>>,
    published: Arc<AtomicUsize>,
}

impl FrameWriter {
    /// Append one chunk and publish the new count.
    ///
    /// Chunks appended after the log was dropped are discarded.
    pub(crate) fn append(&self, chunk: Vec<u8>) {
        if self.tx.send(chunk).is_ok() {
            self.published.fetch_add(1, Ordering::Release);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.published.load(Ordering::Acquire)
    }
}

/// Controlling-thread end of the log
#[derive(Debug)]
pub(crate) struct FrameLog {
    rx: mpsc::Receiver<Vec<u8>>,
    published: Arc<AtomicUsize>,
}

impl FrameLog {
    /// Snapshot of the number of chunks appended so far
    pub(crate) fn len(&self) -> usize {
        self.published.load(Ordering::Acquire)
    }

    /// Drain every chunk appended so far, in order
    pub(crate) fn take(&self) -> FrameBuffer {
        FrameBuffer::from_chunks(self.rx.try_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_byte_len() {
        assert!(FrameBuffer::default().is_empty());
        let buffer = FrameBuffer::from_chunks(vec![vec![0u8; 4096], vec![0u8; 4096]]);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.byte_len(), 8192);
    }

    #[test]
    fn test_samples_little_endian_in_order() {
        let buffer = FrameBuffer::from_chunks(vec![
            vec![0x01, 0x00, 0xff, 0xff],
            vec![0x00, 0x80],
        ]);
        let samples: Vec<i16> = buffer.samples().collect();
        assert_eq!(samples, vec![1, -1, i16::MIN]);
    }

    #[test]
    fn test_log_len_tracks_appends() {
        let (writer, log) = frame_log();
        assert_eq!(log.len(), 0);
        writer.append(vec![1, 2]);
        writer.append(vec![3, 4]);
        assert_eq!(log.len(), 2);
        assert_eq!(writer.len(), 2);

        let buffer = log.take();
        assert_eq!(buffer.chunks(), &[vec![1, 2], vec![3, 4]]);
        assert!(log.take().is_empty());
    }

    #[test]
    fn test_take_while_writer_alive_returns_snapshot() {
        let (writer, log) = frame_log();
        writer.append(vec![1, 2]);
        assert_eq!(log.take().len(), 1);

        writer.append(vec![3, 4]);
        assert_eq!(log.take().chunks(), &[vec![3, 4]]);
    }

    #[test]
    fn test_append_after_log_dropped_is_discarded() {
        let (writer, log) = frame_log();
        drop(log);
        writer.append(vec![0, 0]);
        assert_eq!(writer.len(), 0);
    }

    #[test]
    fn test_log_concurrent_reader_sees_monotonic_len() {
        let (writer, log) = frame_log();

        let handle = std::thread::spawn(move || {
            for i in 0..500u16 {
                writer.append(i.to_le_bytes().to_vec());
            }
        });

        let mut last = 0;
        while last < 500 {
            let now = log.len();
            assert!(now >= last);
            last = now;
            std::thread::yield_now();
        }
        handle.join().unwrap();

        let samples: Vec<i16> = log.take().samples().collect();
        let expected: Vec<i16> = (0..500).collect();
        assert_eq!(samples, expected);
    }
}
