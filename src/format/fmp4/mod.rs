//! # Fragmented MP4 Remuxing
//!
//! Packages H.264 NAL units into an init segment (`ftyp` + `moov`) followed
//! by media segments (`styp` + `moof` + `mdat`), the layout expected by
//! Media Source Extensions and DASH/CMAF players.
//!
//! - [`H264Remuxer`] groups NAL units into pictures and pictures into fragments
//! - [`boxes`] serializes the box trees
//! - [`VideoConverter`] ties framing, remuxing and queuing together
//! - [`SegmentSink`] / [`Fmp4Writer`] deliver queued segments asynchronously
//!
//! ## Example: Writing a Stream to a File
//!
//! ```rust,no_run
//! use h264_fmp4::format::fmp4::{drain_into, Fmp4Writer, VideoConverter};
//! use h264_fmp4::RemuxConfig;
//! use tokio::io::AsyncReadExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut input = tokio::fs::File::open("input.h264").await?;
//!     let output = tokio::fs::File::create("output.mp4").await?;
//!
//!     let mut converter = VideoConverter::new(RemuxConfig::new(30))?;
//!     let mut writer = Fmp4Writer::new(output);
//!
//!     let mut chunk = vec![0u8; 64 * 1024];
//!     loop {
//!         let n = input.read(&mut chunk).await?;
//!         if n == 0 {
//!             converter.end_of_stream();
//!             break;
//!         }
//!         converter.append_raw_data(&chunk[..n]);
//!         drain_into(converter.queue_mut(), &mut writer).await?;
//!     }
//!     drain_into(converter.queue_mut(), &mut writer).await?;
//!     Ok(())
//! }
//! ```

/// ISO-BMFF box writers
pub mod boxes;
/// Byte stream to segment queue facade
pub mod converter;
/// FIFO of pending segments
pub mod queue;
/// NAL unit to fragment state machine
pub mod remuxer;
/// Track state and sample table
pub mod track;
/// Async segment sinks
pub mod writer;

pub use boxes::{fragment_segment, init_segment};
pub use converter::VideoConverter;
pub use queue::SegmentQueue;
pub use remuxer::{Fragment, H264Remuxer};
pub use track::{display_size, Sample, Track, TrackIdAllocator};
pub use writer::{drain_into, Fmp4Writer, SegmentSink};
