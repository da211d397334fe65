use crate::error::{Fmp4Error, Result};

/// A bit-level cursor over a fixed byte buffer.
///
/// Implements the H.264 style reads needed by parameter-set and SEI parsing:
/// - Reading fixed-width big-endian fields of up to 32 bits
/// - Reading exponential Golomb codes (ue(v))
/// - Reading signed exponential Golomb codes (se(v))
///
/// Every read checks [`bits_available`](Self::bits_available) up front, so a
/// failed read leaves the cursor where it was.
///
/// Example:
/// ```
/// use h264_fmp4::utils::BitReader;
///
/// let data = [0b10110011];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bool().unwrap(), true);    // 1
/// assert_eq!(reader.read_bits(3).unwrap(), 0b011);  // 011
/// assert_eq!(reader.bits_available(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a new BitReader positioned at the first bit of `data`
    pub fn new(data: &'a [u8]) -> Self {
        BitReader { data, index: 0 }
    }

    /// Number of unread bits. Exact, never rounded to bytes.
    pub fn bits_available(&self) -> usize {
        self.data.len() * 8 - self.index
    }

    /// Current bit position from the start of the buffer.
    pub fn position(&self) -> usize {
        self.index
    }

    fn ensure(&self, requested: usize) -> Result<()> {
        let available = self.bits_available();
        if available < requested {
            return Err(Fmp4Error::OutOfBits {
                requested,
                available,
            });
        }
        Ok(())
    }

    fn bit_at(&self, index: usize) -> u32 {
        ((self.data[index / 8] >> (7 - (index % 8))) & 1) as u32
    }

    /// Reads `n` bits (n <= 32) as a big-endian unsigned number.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(Fmp4Error::TooManyBits(n));
        }
        self.ensure(n as usize)?;

        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | self.bit_at(self.index);
            self.index += 1;
        }
        Ok(value)
    }

    /// Skips `n` bits.
    pub fn skip_bits(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.index += n;
        Ok(())
    }

    /// Reads a single bit as a flag.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.read_bits(16)? as u16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bits(32)
    }

    /// Counts the zero bits before the next set bit and moves the cursor onto
    /// that set bit.
    ///
    /// If no set bit follows, the number of remaining bits is returned and the
    /// cursor stays put; the read that follows then fails with `OutOfBits`.
    pub fn skip_leading_zero_run(&mut self) -> u32 {
        let end = self.data.len() * 8;
        let mut zeros = 0usize;
        while self.index + zeros < end {
            if self.bit_at(self.index + zeros) != 0 {
                self.index += zeros;
                return zeros as u32;
            }
            zeros += 1;
        }
        zeros as u32
    }

    /// Reads an unsigned exponential Golomb code (ue(v)).
    ///
    /// Format:
    /// 1. M leading zeros followed by a 1
    /// 2. M more INFO bits
    /// 3. Value = 2^M + INFO - 1
    ///
    /// Example: "00110" (M=2, INFO=10) decodes to 4 + 2 - 1 = 5
    pub fn read_unsigned_exp_golomb(&mut self) -> Result<u32> {
        let start = self.index;
        let zeros = self.skip_leading_zero_run();
        if zeros > 31 {
            self.index = start;
            return Err(Fmp4Error::InvalidGolomb(zeros));
        }
        match self.read_bits(zeros + 1) {
            Ok(code) => Ok(code - 1),
            Err(e) => {
                self.index = start;
                Err(e)
            }
        }
    }

    /// Reads a signed exponential Golomb code (se(v)).
    ///
    /// The unsigned code `k` is decoded first, then mapped:
    /// odd `k` -> `+((k + 1) >> 1)`, even `k` -> `-(k >> 1)`.
    ///
    /// Codes whose magnitude does not fit in `i32` are rejected with
    /// `InvalidGolomb` and the cursor is left where it was.
    pub fn read_signed_exp_golomb(&mut self) -> Result<i32> {
        let start = self.index;
        let k = self.read_unsigned_exp_golomb()? as u64;
        let magnitude = (k + 1) >> 1;
        if magnitude > i32::MAX as u64 {
            self.index = start;
            return Err(Fmp4Error::InvalidGolomb((k + 1).ilog2()));
        }
        let magnitude = magnitude as i32;
        Ok(if k & 1 == 1 { magnitude } else { -magnitude })
    }

    pub fn skip_unsigned_exp_golomb(&mut self) -> Result<()> {
        self.read_unsigned_exp_golomb().map(|_| ())
    }

    pub fn skip_signed_exp_golomb(&mut self) -> Result<()> {
        self.read_signed_exp_golomb().map(|_| ())
    }

    /// Skips to the next byte boundary.
    pub fn byte_align(&mut self) -> Result<()> {
        self.skip_bits(self.bits_available() % 8)
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_read_bits() {
        let data = [0xaa];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.bits_available(), 8);
        assert_eq!(reader.read_bits(1).unwrap(), 1);
        assert_eq!(reader.read_bits(3).unwrap(), 2);
        assert_eq!(reader.bits_available(), 4);
        assert_eq!(reader.read_bits(3).unwrap(), 5);
        assert_eq!(reader.bits_available(), 1);
        reader.skip_bits(1).unwrap();
        assert_eq!(reader.bits_available(), 0);

        // Cross multiple byte boundaries
        let data = [0b10110011, 0b11001100, 0b10101010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(20).unwrap(), 0b10110011110011001010);

        // Reading zero bits is a no-op
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(0).unwrap(), 0);
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_fixed_width_reads() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 0x12);
        assert_eq!(reader.read_u16().unwrap(), 0x3456);
        assert_eq!(reader.read_u32().unwrap(), 0x789abcde);
        assert_eq!(reader.bits_available(), 8);
    }

    #[test]
    fn test_out_of_bits_does_not_advance() {
        let data = [0xff];
        let mut reader = BitReader::new(&data);
        reader.read_bits(5).unwrap();

        match reader.read_bits(4) {
            Err(Fmp4Error::OutOfBits {
                requested,
                available,
            }) => {
                assert_eq!(requested, 4);
                assert_eq!(available, 3);
            }
            other => panic!("expected OutOfBits, got {:?}", other),
        }
        assert_eq!(reader.bits_available(), 3);
        assert!(reader.skip_bits(4).is_err());
        assert_eq!(reader.bits_available(), 3);
        assert_eq!(reader.read_bits(3).unwrap(), 0b111);

        let mut reader = BitReader::new(&data);
        assert!(matches!(
            reader.read_bits(33),
            Err(Fmp4Error::TooManyBits(33))
        ));
    }

    #[test]
    fn test_read_unsigned_exp_golomb() {
        let test_cases = [
            ([0b10000000], 0, "1"),
            ([0b01000000], 1, "010"),
            ([0b01100000], 2, "011"),
            ([0b00100000], 3, "00100"),
            ([0b00101000], 4, "00101"),
            ([0b00110000], 5, "00110"),
            ([0b00111000], 6, "00111"),
            ([0b00010000], 7, "0001000"),
            ([0b00010010], 8, "0001001"),
        ];

        for (input, expected, pattern) in test_cases.iter() {
            let mut reader = BitReader::new(input);
            let result = reader.read_unsigned_exp_golomb().unwrap();
            assert_eq!(result, *expected, "Failed for pattern {}", pattern);

            let encoded = encode_golomb(*expected);
            assert_eq!(&encoded[..1], input, "Encoding {} gave wrong pattern", expected);
        }
    }

    #[test]
    fn test_read_signed_exp_golomb() {
        let test_cases = [
            ([0b10000000], 0),
            ([0b01000000], 1),
            ([0b01100000], -1),
            ([0b00100000], 2),
            ([0b00101000], -2),
            ([0b00110000], 3),
            ([0b00111000], -3),
            ([0b00010000], 4),
            ([0b00010010], -4),
        ];

        for (input, expected) in test_cases.iter() {
            let mut reader = BitReader::new(input);
            assert_eq!(reader.read_signed_exp_golomb().unwrap(), *expected);
        }
    }

    #[test]
    fn test_read_signed_exp_golomb_extremes() {
        // 31 leading zeros is the longest code accepted. Its largest odd and
        // even values map to the two ends of the symmetric i32 range.
        let mut w = BitWriter::new();
        w.write_se(i32::MAX).write_ue(u32::MAX - 1).write_bits(0x5, 3);
        let data = w.into_bytes();
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_signed_exp_golomb().unwrap(), i32::MAX);
        assert_eq!(reader.position(), 63);
        assert_eq!(reader.read_signed_exp_golomb().unwrap(), -i32::MAX);
        assert_eq!(reader.position(), 126);
        assert_eq!(reader.read_bits(3).unwrap(), 0x5);
    }

    #[test]
    fn test_exp_golomb_errors_restore_cursor() {
        // All zeros: the run reaches the end without a set bit
        let data = [0x00, 0x00];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.skip_leading_zero_run(), 16);
        assert_eq!(reader.position(), 0);
        assert!(matches!(
            reader.read_unsigned_exp_golomb(),
            Err(Fmp4Error::OutOfBits { .. })
        ));
        assert_eq!(reader.position(), 0);

        // Prefix present but suffix truncated
        let data = [0b00010000];
        let mut reader = BitReader::new(&data);
        reader.skip_bits(4).unwrap();
        assert!(reader.read_unsigned_exp_golomb().is_err());
        assert_eq!(reader.position(), 4);

        // More than 31 leading zeros cannot fit a 32-bit code
        let mut data = vec![0u8; 5];
        data.push(0x80);
        let mut reader = BitReader::new(&data);
        assert!(matches!(
            reader.read_unsigned_exp_golomb(),
            Err(Fmp4Error::InvalidGolomb(40))
        ));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_byte_align() {
        let data = [0xff, 0x5a];
        let mut reader = BitReader::new(&data);
        reader.read_bits(3).unwrap();
        reader.byte_align().unwrap();
        assert_eq!(reader.position(), 8);
        reader.byte_align().unwrap();
        assert_eq!(reader.read_u8().unwrap(), 0x5a);
    }

    #[quickcheck]
    fn prop_read_bits_matches_manual(data: Vec<u8>, n: u8) -> bool {
        let n = (n % 33) as u32;
        let mut reader = BitReader::new(&data);

        if (n as usize) > data.len() * 8 {
            return reader.read_bits(n).is_err() && reader.position() == 0;
        }

        let mut expected = 0u64;
        for i in 0..n as usize {
            let bit = (data[i / 8] >> (7 - (i % 8))) & 1;
            expected = (expected << 1) | bit as u64;
        }
        reader.read_bits(n).ok() == Some(expected as u32)
            && reader.bits_available() == data.len() * 8 - n as usize
    }

    #[quickcheck]
    fn prop_bits_available_tracks_consumption(data: Vec<u8>, reads: Vec<u8>) -> bool {
        let mut reader = BitReader::new(&data);
        let mut consumed = 0usize;
        for r in reads {
            let n = (r % 33) as u32;
            let before = reader.bits_available();
            match reader.read_bits(n) {
                Ok(_) => consumed += n as usize,
                Err(_) => {
                    if reader.bits_available() != before || before >= n as usize {
                        return false;
                    }
                }
            }
            if reader.bits_available() != data.len() * 8 - consumed {
                return false;
            }
        }
        true
    }

    #[quickcheck]
    fn prop_golomb_round_trip(values: Vec<u32>) -> bool {
        let values: Vec<u32> = values.into_iter().map(|v| v % (1 << 20)).collect();

        let mut writer = BitWriter::new();
        for &v in &values {
            writer.write_ue(v);
        }
        let total = writer.bit_len();
        let encoded = writer.into_bytes();
        let mut reader = BitReader::new(&encoded);

        for &expected in &values {
            match reader.read_unsigned_exp_golomb() {
                Ok(decoded) if decoded == expected => continue,
                _ => return false,
            }
        }
        reader.position() == total
    }

    #[quickcheck]
    fn prop_signed_golomb_round_trip(values: Vec<i16>) -> bool {
        let mut writer = BitWriter::new();
        for &v in &values {
            writer.write_se(v as i32);
        }
        let encoded = writer.into_bytes();
        let mut reader = BitReader::new(&encoded);
        values
            .iter()
            .all(|&v| reader.read_signed_exp_golomb().ok() == Some(v as i32))
    }
}
