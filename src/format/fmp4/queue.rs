use std::collections::VecDeque;

use bytes::Bytes;

/// FIFO of serialized segments waiting for a sink.
///
/// Producers push without ever blocking; the consumer pulls segments only
/// while its sink reports that it can take more.
#[derive(Debug, Default)]
pub struct SegmentQueue {
    segments: VecDeque<Bytes>,
}

impl SegmentQueue {
    pub fn new() -> Self {
        Self {
            segments: VecDeque::new(),
        }
    }

    pub fn push(&mut self, segment: Bytes) {
        self.segments.push_back(segment);
    }

    pub fn pop(&mut self) -> Option<Bytes> {
        self.segments.pop_front()
    }

    /// Removes segments in order for as long as `can_accept` returns true.
    pub fn drain_ready<F>(&mut self, mut can_accept: F) -> Vec<Bytes>
    where
        F: FnMut() -> bool,
    {
        let mut ready = Vec::new();
        while !self.segments.is_empty() && can_accept() {
            if let Some(segment) = self.segments.pop_front() {
                ready.push(segment);
            }
        }
        ready
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total bytes waiting.
    pub fn pending_bytes(&self) -> usize {
        self.segments.iter().map(Bytes::len).sum()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}
