#![doc(html_root_url = "https://docs.rs/h264-fmp4/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # h264-fmp4 - Annex-B H.264 to Fragmented MP4
//!
//! `h264-fmp4` repackages a raw H.264 elementary stream, as it arrives in
//! arbitrary chunks over a pipe or socket, into fragmented MP4 segments that
//! can be appended to a Media Source Extensions buffer or written to disk.
//! No decoding takes place: NAL units are framed, the parameter sets are
//! inspected for size and codec information, and coded pictures are copied
//! into `mdat` boxes unchanged.
//!
//! ## Features
//!
//! ### Elementary Stream
//! - Start-code framing that survives start codes split across chunks
//! - SPS decoding including cropping, VUI sample aspect ratio and timing
//! - SEI buffering-period detection for streams that delimit frames with SEI
//!
//! ### Container
//! - Init segment (`ftyp` + `moov`) with an `avcC` configuration record
//! - Media segments (`styp` + `moof` + `mdat`) every N coded pictures
//! - Segment queue with drain-on-ready delivery and async file output
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! h264-fmp4 = "0.1.0"
//! ```
//!
//! ### Converting Chunks
//!
//! ```rust
//! use h264_fmp4::{format::fmp4::VideoConverter, RemuxConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 30 fps input, one fragment per second
//! let mut converter = VideoConverter::new(RemuxConfig::new(30))?;
//!
//! # let chunks: Vec<Vec<u8>> = Vec::new();
//! for chunk in chunks {
//!     converter.append_raw_data(&chunk);
//!
//!     // Hand segments to the media buffer while it has room
//!     for segment in converter.drain_ready(|| true) {
//!         let _ = segment;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `codec`: H.264 elementary stream handling
//!   - NAL unit framing
//!   - SPS and SEI parsing
//!
//! - `format`: Container output
//!   - Fragment state machine and track bookkeeping
//!   - ISO-BMFF box serialization
//!   - Segment queue and async sinks
//!
//! - `config`: Remux timing parameters from code, environment or file
//!
//! - `error`: Error handling types and utilities
//!   - Custom error types for different failure scenarios
//!   - Result type alias for convenience
//!
//! - `utils`: Common utilities and helper functions
//!   - Bitstream reading with Exp-Golomb support
//!
/// Codec implementations
pub mod codec;

/// Error types and utilities
pub mod error;

/// Container format implementations
pub mod format;

/// Common utilities and helper functions
pub mod utils;

/// Configuration module
pub mod config;

pub use config::RemuxConfig;
pub use error::{Fmp4Error, Result};
