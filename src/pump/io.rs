//! Tokio adapters for the pump
//!
//! [`ReadGate`] and [`WriteQueue`] are the source and sink the [`Pump`](super::Pump)
//! driver hands to its session: plain flags and a byte queue, with the
//! actual socket or file I/O left to the driver loop. [`ReaderChunks`] and
//! [`BodyChunks`] turn an `AsyncRead` or an HTTP body into a [`ChunkSource`].

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use hyper::body::Body;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::stream::{ChunkSource, FlowControlledSink, FlowControlledSource};

/// Source control flags consulted by the driver before each read
#[derive(Debug, Default)]
pub struct ReadGate {
    flowing: bool,
    closed: bool,
}

impl ReadGate {
    /// Create a gate that is not yet flowing
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the driver should read
    pub fn is_flowing(&self) -> bool {
        self.flowing && !self.closed
    }

    /// Check if the source was released
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FlowControlledSource for ReadGate {
    fn pause(&mut self) {
        self.flowing = false;
    }

    fn resume(&mut self) {
        self.flowing = true;
    }

    fn close(&mut self) {
        self.closed = true;
        self.flowing = false;
    }
}

/// Bounded write queue in front of an `AsyncWrite`
///
/// Bytes count as queued until the driver acknowledges them as written,
/// including the chunk currently being written.
#[derive(Debug)]
pub struct WriteQueue {
    queue: VecDeque<Bytes>,
    queued_bytes: usize,
    high_water_mark: usize,
    saturated: bool,
    close_requested: bool,
    aborted: bool,
}

impl WriteQueue {
    /// Create a queue that reports full at `high_water_mark` bytes
    pub fn new(high_water_mark: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            queued_bytes: 0,
            high_water_mark: high_water_mark.max(1),
            saturated: false,
            close_requested: false,
            aborted: false,
        }
    }

    /// Take the next chunk to write
    pub fn pop_front(&mut self) -> Option<Bytes> {
        self.queue.pop_front()
    }

    /// Record `n` bytes as written
    ///
    /// Returns `true` when this clears a full queue, i.e. a drain.
    pub fn acknowledge(&mut self, n: usize) -> bool {
        self.queued_bytes = self.queued_bytes.saturating_sub(n);

        if self.saturated && self.queued_bytes < self.high_water_mark {
            self.saturated = false;
            true
        } else {
            false
        }
    }

    /// Bytes accepted but not yet written
    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes
    }

    /// Check if the queue reported full and has not drained since
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    /// Check if the session asked to close the sink
    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Check if the sink was aborted
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl FlowControlledSink for WriteQueue {
    fn write(&mut self, chunk: Bytes) -> io::Result<bool> {
        if self.aborted || self.close_requested {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write after close",
            ));
        }

        self.queued_bytes += chunk.len();
        self.queue.push_back(chunk);

        if self.queued_bytes >= self.high_water_mark {
            self.saturated = true;
        }
        Ok(!self.saturated)
    }

    fn close(&mut self) -> io::Result<()> {
        if self.aborted {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink aborted"));
        }
        self.close_requested = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
        self.queue.clear();
        self.queued_bytes = 0;
    }
}

/// Chunks read from an `AsyncRead`
#[derive(Debug)]
pub struct ReaderChunks<R> {
    reader: R,
    buf: BytesMut,
    chunk_size: usize,
}

impl<R> ReaderChunks<R> {
    /// Read up to `chunk_size` bytes at a time
    pub fn new(reader: R, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            reader,
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size,
        }
    }

    /// Get the underlying reader back
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R> ChunkSource for ReaderChunks<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        self.buf.reserve(self.chunk_size);

        // read_buf is cancel safe; a dropped read leaves buf untouched
        let n = self.reader.read_buf(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf.split().freeze()))
    }
}

/// Data frames of an HTTP body
///
/// Trailers are skipped.
pub struct BodyChunks<B> {
    body: Pin<Box<B>>,
}

impl<B> BodyChunks<B> {
    /// Wrap a request or response body
    pub fn new(body: B) -> Self {
        Self {
            body: Box::pin(body),
        }
    }
}

impl<B> ChunkSource for BodyChunks<B>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            match self.body.frame().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(io::Error::other(e)),
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        return Ok(Some(data));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::Full;
    use hyper::body::Frame;

    use super::*;

    #[test]
    fn test_gate() {
        let mut gate = ReadGate::new();
        assert!(!gate.is_flowing());

        gate.resume();
        assert!(gate.is_flowing());
        gate.pause();
        assert!(!gate.is_flowing());
        gate.resume();
        gate.close();
        assert!(!gate.is_flowing());
        assert!(gate.is_closed());
    }

    #[test]
    fn test_queue_saturation_and_drain() {
        let mut queue = WriteQueue::new(10);

        assert!(queue.write(Bytes::from_static(b"12345")).unwrap());
        assert!(!queue.write(Bytes::from_static(b"67890")).unwrap());
        assert!(queue.is_saturated());
        assert_eq!(queue.queued_bytes(), 10);

        let first = queue.pop_front().unwrap();
        assert_eq!(first, Bytes::from_static(b"12345"));
        // Partial write of the first chunk does not drain yet
        assert!(!queue.acknowledge(0));
        assert!(queue.acknowledge(3));
        assert!(!queue.is_saturated());
        assert!(!queue.acknowledge(2));
        assert_eq!(queue.queued_bytes(), 5);
    }

    #[test]
    fn test_queue_close_and_abort() {
        let mut queue = WriteQueue::new(10);
        queue.write(Bytes::from_static(b"abc")).unwrap();
        queue.close().unwrap();

        assert!(queue.close_requested());
        assert!(queue.write(Bytes::from_static(b"late")).is_err());

        queue.abort();
        assert!(queue.is_aborted());
        assert!(queue.pop_front().is_none());
        assert_eq!(queue.queued_bytes(), 0);
        assert!(queue.close().is_err());
    }

    #[tokio::test]
    async fn test_reader_chunks() {
        let data: &[u8] = b"hello world";
        let mut chunks = ReaderChunks::new(data, 4);
        let mut collected = Vec::new();

        while let Some(chunk) = chunks.next_chunk().await.unwrap() {
            assert!(chunk.len() <= 4);
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, b"hello world");
    }

    #[tokio::test]
    async fn test_reader_chunks_error() {
        let mock = tokio_test::io::Builder::new()
            .read(b"abc")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut chunks = ReaderChunks::new(mock, 16);

        assert_eq!(chunks.next_chunk().await.unwrap().unwrap(), Bytes::from_static(b"abc"));
        let err = chunks.next_chunk().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_body_chunks() {
        let mut chunks = BodyChunks::new(Full::new(Bytes::from_static(b"payload")));

        assert_eq!(
            chunks.next_chunk().await.unwrap().unwrap(),
            Bytes::from_static(b"payload")
        );
        assert!(chunks.next_chunk().await.unwrap().is_none());
    }

    /// Yields a fixed list of frames
    struct ScriptedBody {
        frames: VecDeque<Frame<Bytes>>,
    }

    impl Body for ScriptedBody {
        type Data = Bytes;
        type Error = io::Error;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<Result<Frame<Bytes>, io::Error>>> {
            std::task::Poll::Ready(self.frames.pop_front().map(Ok))
        }
    }

    #[tokio::test]
    async fn test_body_chunks_skips_trailers() {
        let body = ScriptedBody {
            frames: VecDeque::from(vec![
                Frame::data(Bytes::from_static(b"a")),
                Frame::trailers(Default::default()),
                Frame::data(Bytes::from_static(b"b")),
            ]),
        };
        let mut chunks = BodyChunks::new(body);

        assert_eq!(chunks.next_chunk().await.unwrap().unwrap(), Bytes::from_static(b"a"));
        assert_eq!(chunks.next_chunk().await.unwrap().unwrap(), Bytes::from_static(b"b"));
        assert!(chunks.next_chunk().await.unwrap().is_none());
    }
}
