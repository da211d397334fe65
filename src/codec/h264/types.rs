use bytes::{BufMut, Bytes, BytesMut};

/// One H.264 NAL unit as cut out of an Annex-B stream.
///
/// `data` holds the complete unit starting with its one-byte header; the
/// start code is not included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NALUnit {
    pub nal_type: u8,
    pub nal_ref_idc: u8,
    pub data: Bytes,
}

impl NALUnit {
    /// Wraps a framed byte range. Returns `None` for an empty range.
    pub fn new(data: Bytes) -> Option<Self> {
        let header = *data.first()?;
        Some(Self {
            nal_type: header & 0x1f,
            nal_ref_idc: (header & 0x60) >> 5,
            data,
        })
    }

    pub fn unit_type(&self) -> NALUnitType {
        NALUnitType::from(self.nal_type)
    }

    /// Bytes following the header byte.
    pub fn payload(&self) -> &[u8] {
        &self.data[1..]
    }

    pub fn is_keyframe(&self) -> bool {
        self.nal_type == 5
    }

    /// Size once written length-prefixed into `mdat`.
    pub fn framed_size(&self) -> usize {
        4 + self.data.len()
    }

    /// Appends the unit with its 4-byte big-endian length prefix.
    pub fn write_avcc(&self, buf: &mut BytesMut) {
        buf.put_u32(self.data.len() as u32);
        buf.extend_from_slice(&self.data);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NALUnitType {
    Unspecified = 0,
    CodedSliceNonIDR = 1,
    CodedSliceDataPartitionA = 2,
    CodedSliceDataPartitionB = 3,
    CodedSliceDataPartitionC = 4,
    CodedSliceIDR = 5,
    SEI = 6,
    SPS = 7,
    PPS = 8,
    AccessUnitDelimiter = 9,
    EndOfSequence = 10,
    EndOfStream = 11,
    FillerData = 12,
}

impl NALUnitType {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            NALUnitType::CodedSliceNonIDR => "NDR",
            NALUnitType::CodedSliceIDR => "IDR",
            NALUnitType::SEI => "SEI",
            NALUnitType::SPS => "SPS",
            NALUnitType::PPS => "PPS",
            _ => "UNKNOWN",
        }
    }

    pub fn is_slice(&self) -> bool {
        matches!(
            self,
            NALUnitType::CodedSliceNonIDR | NALUnitType::CodedSliceIDR
        )
    }
}

impl From<u8> for NALUnitType {
    fn from(value: u8) -> Self {
        match value {
            1 => NALUnitType::CodedSliceNonIDR,
            2 => NALUnitType::CodedSliceDataPartitionA,
            3 => NALUnitType::CodedSliceDataPartitionB,
            4 => NALUnitType::CodedSliceDataPartitionC,
            5 => NALUnitType::CodedSliceIDR,
            6 => NALUnitType::SEI,
            7 => NALUnitType::SPS,
            8 => NALUnitType::PPS,
            9 => NALUnitType::AccessUnitDelimiter,
            10 => NALUnitType::EndOfSequence,
            11 => NALUnitType::EndOfStream,
            12 => NALUnitType::FillerData,
            _ => NALUnitType::Unspecified,
        }
    }
}

/// Sample aspect ratio from the VUI, 1:1 unless signalled otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub num: u32,
    pub den: u32,
}

impl AspectRatio {
    pub const SQUARE: AspectRatio = AspectRatio { num: 1, den: 1 };

    pub fn scale(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::SQUARE
    }
}

/// VUI timing block. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingInfo {
    pub num_units_in_tick: u32,
    pub time_scale: u32,
    pub fixed_frame_rate_flag: bool,
}

/// Fields extracted from a sequence parameter set.
///
/// Display dimensions are derived from these by the track, see
/// [`Track::update_sps`](crate::format::fmp4::Track::update_sps).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceParameterSet {
    pub profile_idc: u8,
    /// constraint_set0..5 flags plus the two reserved bits, verbatim.
    pub constraint_flags: u8,
    pub level_idc: u8,
    pub seq_parameter_set_id: u32,
    pub chroma_format_idc: u32,
    pub pic_order_cnt_type: u32,
    pub pic_width_in_mbs_minus1: u32,
    pub pic_height_in_map_units_minus1: u32,
    pub frame_mbs_only_flag: bool,
    pub frame_crop_left_offset: u32,
    pub frame_crop_right_offset: u32,
    pub frame_crop_top_offset: u32,
    pub frame_crop_bottom_offset: u32,
    pub sar: AspectRatio,
    pub timing: Option<TimingInfo>,
}

/// One message header found in an SEI NAL unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeiMessage {
    pub payload_type: u32,
    pub payload_size: u32,
}

impl SeiMessage {
    pub const BUFFERING_PERIOD: u32 = 0;
    pub const END_OF_BUFFERING: u32 = 5;
}
