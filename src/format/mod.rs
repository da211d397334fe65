/// Fragmented MP4 (ISO-BMFF) output
pub mod fmp4;
