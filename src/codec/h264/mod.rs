//! # H.264/AVC Elementary Stream Handling
//!
//! This module covers the parts of H.264 needed to repackage an Annex-B
//! byte stream into fragmented MP4:
//!
//! - Re-framing arbitrarily chunked input into NAL units
//! - Sequence Parameter Set decoding (profile, level, cropping, VUI/SAR)
//! - SEI message scanning for buffering-period signalling
//!
//! Everything else in a NAL unit is passed through untouched.
//!
//! ## Example: Framing and Parsing an SPS
//!
//! ```rust
//! use h264_fmp4::codec::h264::{parse_sps, NalFramer, NALUnitType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = [
//!     0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0xc0, 0x1e, 0xf4, 0x0b, 0x06, 0x01, 0x20,
//!     0x00, 0x00, 0x00, 0x01,
//! ];
//!
//! let mut framer = NalFramer::new();
//! for nal in framer.append(&stream) {
//!     if nal.unit_type() == NALUnitType::SPS {
//!         let sps = parse_sps(nal.payload())?;
//!         assert_eq!(sps.profile_idc, 66);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Annex-B start code scanning
pub mod framer;
/// SPS and SEI syntax decoding
pub mod parser;
/// NAL unit and parameter set types
pub mod types;

#[doc(inline)]
pub use framer::{NalFramer, START_CODE};
#[doc(inline)]
pub use parser::{parse_sei, parse_sps, remove_emulation_prevention};
#[doc(inline)]
pub use types::*;
