use bytes::{Bytes, BytesMut};

use super::types::NALUnit;

/// Annex-B start code recognised by the framer.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Re-frames an arbitrarily chunked Annex-B byte stream into NAL units.
///
/// Bytes after the last seen start code are carried over to the next
/// [`append`](Self::append) call, so a unit is only handed out once the start
/// code that terminates it has arrived (or on [`flush`](Self::flush)).
///
/// ```rust
/// use h264_fmp4::codec::h264::NalFramer;
///
/// let mut framer = NalFramer::new();
/// assert!(framer.append(&[0, 0, 0, 1, 0x67, 0x42]).is_empty());
/// let units = framer.append(&[0x00, 0x1e, 0, 0, 0, 1, 0x68, 0xce]);
/// assert_eq!(units.len(), 1);
/// assert_eq!(units[0].nal_type, 7);
/// assert_eq!(&units[0].data[..], &[0x67, 0x42, 0x00, 0x1e]);
/// ```
#[derive(Debug, Default)]
pub struct NalFramer {
    buffer: BytesMut,
}

impl NalFramer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Drops any carried-over bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes waiting for a terminating start code.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feeds one chunk and returns every unit completed by it, in stream order.
    pub fn append(&mut self, chunk: &[u8]) -> Vec<NALUnit> {
        let mut units = Vec::new();

        // A chunk opening with a start code terminates whatever is carried.
        if !self.buffer.is_empty() && chunk.starts_with(&START_CODE) {
            let carried = self.buffer.split().freeze();
            Self::emit(carried, &mut units);
        }

        // Start codes wholly inside the carry were consumed on earlier calls.
        let resume = self.buffer.len().saturating_sub(3);
        self.buffer.extend_from_slice(chunk);

        let mut consumed = 0;
        for pos in find_start_codes(&self.buffer, resume) {
            let region = self.buffer.split_to(pos - consumed).freeze();
            consumed = pos;
            Self::emit(region, &mut units);
        }

        units
    }

    /// Finalizes the carried unit at end of stream.
    pub fn flush(&mut self) -> Option<NALUnit> {
        let mut units = Vec::with_capacity(1);
        let carried = self.buffer.split().freeze();
        Self::emit(carried, &mut units);
        units.pop()
    }

    fn emit(region: Bytes, units: &mut Vec<NALUnit>) {
        if region.starts_with(&START_CODE) {
            if let Some(unit) = NALUnit::new(region.slice(START_CODE.len()..)) {
                units.push(unit);
            }
        } else if !region.is_empty() {
            log::debug!(
                "Discarding {} bytes preceding the first start code",
                region.len()
            );
        }
    }
}

/// Positions of `00 00 00 01` markers at offset 1 or later, scanning from `from`.
fn find_start_codes(buf: &[u8], from: usize) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut zeros = 0usize;
    for (i, &byte) in buf.iter().enumerate().skip(from) {
        match byte {
            0 => zeros += 1,
            1 if zeros >= 3 && i >= 4 => {
                positions.push(i - 3);
                zeros = 0;
            }
            _ => zeros = 0,
        }
    }
    positions
}
