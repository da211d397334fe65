/// H.264/AVC elementary stream handling
pub mod h264;

// Re-export common types and functions
pub use h264::{NALUnit, NALUnitType, NalFramer};
