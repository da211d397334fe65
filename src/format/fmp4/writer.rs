use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use super::queue::SegmentQueue;
use crate::error::Result;

/// Destination for serialized fMP4 segments.
#[async_trait]
pub trait SegmentSink: Send {
    /// Whether another segment may be written right now.
    fn can_accept(&self) -> bool {
        true
    }

    async fn write_segment(&mut self, segment: &[u8]) -> Result<()>;

    async fn flush(&mut self) -> Result<()>;
}

/// Writes segments back to back into any tokio writer, producing a playable
/// fragmented MP4 file when fed an init segment first.
pub struct Fmp4Writer<W: AsyncWrite + Unpin + Send> {
    writer: BufWriter<W>,
    segments_written: usize,
    bytes_written: u64,
}

impl<W: AsyncWrite + Unpin + Send> Fmp4Writer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            segments_written: 0,
            bytes_written: 0,
        }
    }

    pub fn segments_written(&self) -> usize {
        self.segments_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Returns the underlying writer. Call [`SegmentSink::flush`] first.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> SegmentSink for Fmp4Writer<W> {
    async fn write_segment(&mut self, segment: &[u8]) -> Result<()> {
        self.writer.write_all(segment).await?;
        self.segments_written += 1;
        self.bytes_written += segment.len() as u64;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Moves queued segments into `sink` while it accepts them. Returns the
/// number of segments written.
pub async fn drain_into<S>(queue: &mut SegmentQueue, sink: &mut S) -> Result<usize>
where
    S: SegmentSink + ?Sized,
{
    let mut written = 0;
    while sink.can_accept() {
        let Some(segment) = queue.pop() else {
            break;
        };
        sink.write_segment(&segment).await?;
        written += 1;
    }
    if written > 0 {
        sink.flush().await?;
    }
    Ok(written)
}
