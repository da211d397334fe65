use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;

use crate::codec::h264::SequenceParameterSet;

static TRACK_IDS: TrackIdAllocator = TrackIdAllocator::new();

/// Hands out track ids, starting at 1 and never reusing one.
///
/// [`TrackIdAllocator::global`] is the process-wide instance used by
/// [`Track::new`]; it is only ever reset by restarting the process. Sessions
/// that need isolated numbering (tests, multiplexing hosts) can own their own
/// allocator and pass it to [`Track::with_allocator`].
#[derive(Debug)]
pub struct TrackIdAllocator {
    next: AtomicU32,
}

impl TrackIdAllocator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    pub fn global() -> &'static TrackIdAllocator {
        &TRACK_IDS
    }

    pub fn next_id(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for TrackIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// One coded picture inside the fragment being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Length-prefixed byte size of every NAL unit in the picture.
    pub size: u32,
    /// Composition offset from the fragment start, in timescale units.
    pub cts: u32,
}

/// State of the single video track in a remux session.
///
/// The remuxer owns the live instance; segment writers only ever see a
/// borrowed or cloned copy of it.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: u32,
    /// RFC 6381 codec string, e.g. `avc1.64001f`.
    pub codec: String,
    /// Latest SPS NAL unit, header byte included.
    pub sps: Option<Bytes>,
    /// Latest PPS NAL unit, header byte included.
    pub pps: Option<Bytes>,
    pub samples: Vec<Sample>,
    /// Framed size of everything buffered for the open fragment.
    pub len: usize,
    /// Set once an SEI buffering-period message has been seen.
    pub sei_buffering: bool,
    pub width: u32,
    pub height: u32,
    pub timescale: u32,
    pub duration: u32,
    /// Per-frame decode step written into `trex`.
    pub default_sample_duration: u32,
    /// Whether the next fragment opens the stream and needs an init segment.
    pub is_key_frame: bool,
}

impl Track {
    pub fn new(timescale: u32, default_sample_duration: u32) -> Self {
        Self::with_allocator(TrackIdAllocator::global(), timescale, default_sample_duration)
    }

    pub fn with_allocator(
        ids: &TrackIdAllocator,
        timescale: u32,
        default_sample_duration: u32,
    ) -> Self {
        Self {
            id: ids.next_id(),
            codec: String::from("avc1"),
            sps: None,
            pps: None,
            samples: Vec::new(),
            len: 0,
            sei_buffering: false,
            width: 0,
            height: 0,
            timescale,
            duration: timescale,
            default_sample_duration,
            is_key_frame: true,
        }
    }

    /// Records a freshly parsed SPS, replacing any earlier one, and refreshes
    /// the codec string and display size derived from it.
    pub fn update_sps(&mut self, nal: Bytes, sps: &SequenceParameterSet) {
        let (width, height) = display_size(sps);
        self.width = width;
        self.height = height;
        self.codec = format!(
            "avc1.{:02x}{:02x}{:02x}",
            sps.profile_idc, sps.constraint_flags, sps.level_idc
        );
        self.sps = Some(nal);
    }

    pub fn update_pps(&mut self, nal: Bytes) {
        self.pps = Some(nal);
    }

    /// True once both parameter sets are known.
    pub fn has_parameter_sets(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }
}

/// Display size after cropping, with the sample aspect ratio applied to the
/// width.
pub fn display_size(sps: &SequenceParameterSet) -> (u32, u32) {
    let crop_x = 2 * (sps.frame_crop_left_offset as i64 + sps.frame_crop_right_offset as i64);
    let coded_width = (sps.pic_width_in_mbs_minus1 as i64 + 1) * 16 - crop_x;
    let width = (coded_width.max(0) as f64 * sps.sar.scale()).ceil() as u32;

    let (field_factor, crop_unit_y) = if sps.frame_mbs_only_flag { (1, 2) } else { (2, 4) };
    let crop_y = crop_unit_y
        * (sps.frame_crop_top_offset as i64 + sps.frame_crop_bottom_offset as i64);
    let height = field_factor * (sps.pic_height_in_map_units_minus1 as i64 + 1) * 16 - crop_y;

    (width, height.max(0) as u32)
}
