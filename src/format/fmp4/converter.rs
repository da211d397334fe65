use bytes::Bytes;

use super::boxes;
use super::queue::SegmentQueue;
use super::remuxer::{Fragment, H264Remuxer};
use crate::codec::h264::NalFramer;
use crate::config::RemuxConfig;
use crate::error::Result;

/// Turns a raw Annex-B byte stream into a queue of fMP4 segments.
///
/// The first segment queued is always the init segment, followed by one
/// `styp`/`moof`/`mdat` segment per fragment. Segments wait in the queue
/// until the host drains them.
///
/// ```rust
/// use h264_fmp4::format::fmp4::VideoConverter;
/// use h264_fmp4::RemuxConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut converter = VideoConverter::new(RemuxConfig::new(30))?;
/// converter.append_raw_data(&[0x00, 0x00, 0x00, 0x01, 0x09, 0xf0]);
///
/// for segment in converter.drain_ready(|| true) {
///     println!("segment of {} bytes", segment.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct VideoConverter {
    config: RemuxConfig,
    framer: NalFramer,
    remuxer: H264Remuxer,
    queue: SegmentQueue,
}

impl VideoConverter {
    /// Content type to announce for the produced stream.
    pub const MIME_TYPE: &'static str = "video/mp4; codecs=\"avc1.42E01E\"";

    pub fn new(config: RemuxConfig) -> Result<Self> {
        Ok(Self {
            config,
            framer: NalFramer::new(),
            remuxer: H264Remuxer::new(config)?,
            queue: SegmentQueue::new(),
        })
    }

    pub fn config(&self) -> &RemuxConfig {
        &self.config
    }

    pub fn remuxer(&self) -> &H264Remuxer {
        &self.remuxer
    }

    /// Codec string derived from the most recent SPS.
    pub fn codec(&self) -> &str {
        &self.remuxer.track().codec
    }

    /// Frames `chunk` and returns every fragment it completes.
    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<Fragment> {
        self.framer
            .append(chunk)
            .into_iter()
            .filter_map(|nal| self.remuxer.remux(nal))
            .collect()
    }

    /// Init segment for the current parameter sets, once both are known.
    pub fn build_init_segment(&self) -> Option<Bytes> {
        self.remuxer.init_segment()
    }

    /// Frames `chunk` and queues the resulting segments. Returns how many
    /// segments were queued.
    pub fn append_raw_data(&mut self, chunk: &[u8]) -> usize {
        let fragments = self.push_bytes(chunk);
        self.enqueue(fragments)
    }

    /// Pushes the unit still held by the framer through the remuxer. Call
    /// once the input has ended.
    pub fn end_of_stream(&mut self) -> usize {
        let fragments: Vec<Fragment> = self
            .framer
            .flush()
            .and_then(|nal| self.remuxer.remux(nal))
            .into_iter()
            .collect();
        self.enqueue(fragments)
    }

    pub fn queue(&self) -> &SegmentQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut SegmentQueue {
        &mut self.queue
    }

    /// See [`SegmentQueue::drain_ready`].
    pub fn drain_ready<F>(&mut self, can_accept: F) -> Vec<Bytes>
    where
        F: FnMut() -> bool,
    {
        self.queue.drain_ready(can_accept)
    }

    /// Drops all buffered input and queued output and starts a new session
    /// on a fresh track.
    pub fn reset(&mut self) -> Result<()> {
        self.framer.clear();
        self.queue.clear();
        self.remuxer = H264Remuxer::new(self.config)?;
        log::debug!("Converter reset, new track {}", self.remuxer.track().id);
        Ok(())
    }

    fn enqueue(&mut self, fragments: Vec<Fragment>) -> usize {
        let before = self.queue.len();
        for fragment in fragments {
            if fragment.track.is_key_frame {
                self.queue
                    .push(boxes::init_segment(&fragment.track, self.config.timescale));
            }
            self.queue.push(fragment.to_segment());
        }
        self.queue.len() - before
    }
}
