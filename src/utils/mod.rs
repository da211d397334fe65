//! # Utility Functions and Types
//!
//! Bit-level helpers shared by the H.264 parameter-set and SEI parsers.
//!
//! ## Bit Operations
//!
//! ```rust
//! use h264_fmp4::utils::BitReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = vec![0b10110011u8];
//! let mut reader = BitReader::new(&data);
//!
//! // Read specific number of bits
//! let value = reader.read_bits(3)?; // Reads first 3 bits (101)
//! assert_eq!(value, 0b101);
//!
//! // Exp-Golomb: the remaining "10011" starts with ue(v) "1" == 0
//! assert_eq!(reader.read_unsigned_exp_golomb()?, 0);
//! # Ok(())
//! # }
//! ```

/// Bit manipulation and bitstream reading utilities
pub mod bits;

pub use bits::BitReader;
