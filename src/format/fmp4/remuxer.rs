use bytes::{Bytes, BytesMut};

use super::boxes;
use super::track::{Sample, Track, TrackIdAllocator};
use crate::codec::h264::{parse_sei, parse_sps, NALUnit, NALUnitType, SeiMessage};
use crate::config::RemuxConfig;
use crate::error::{Fmp4Error, Result};

/// A finished run of `frames_per_fragment` pictures, ready for boxing.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub sequence_number: u32,
    pub base_decode_time: u32,
    /// Track state as it was when the fragment was cut.
    pub track: Track,
    /// Length-prefixed NAL units of every sample, in decode order.
    pub payload: Bytes,
}

impl Fragment {
    /// Serializes `styp` + `moof` + `mdat`.
    pub fn to_segment(&self) -> Bytes {
        boxes::fragment_segment(
            self.sequence_number,
            self.base_decode_time,
            &self.track,
            &self.payload,
        )
    }
}

/// Groups NAL units into pictures and pictures into fragments.
///
/// Each picture occupies one sample slot. A slot is closed when a slice
/// arrives, or, once the stream has announced an SEI buffering period, when
/// the next SEI arrives instead. Every `frames_per_fragment` closed pictures
/// the open slots are flattened into a [`Fragment`].
pub struct H264Remuxer {
    config: RemuxConfig,
    track: Track,
    ready: bool,
    total_dts: u32,
    step_dts: u32,
    frame_count: u32,
    seq: u32,
    unit_samples: Vec<Vec<NALUnit>>,
}

impl H264Remuxer {
    pub fn new(config: RemuxConfig) -> Result<Self> {
        Self::with_allocator(config, TrackIdAllocator::global())
    }

    pub fn with_allocator(config: RemuxConfig, ids: &TrackIdAllocator) -> Result<Self> {
        config.validate()?;
        let step_dts = config.step_dts();
        Ok(Self {
            config,
            track: Track::with_allocator(ids, config.timescale, step_dts),
            ready: false,
            total_dts: 0,
            step_dts,
            frame_count: 0,
            seq: 1,
            unit_samples: vec![Vec::new()],
        })
    }

    pub fn config(&self) -> &RemuxConfig {
        &self.config
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// True once both an SPS and a PPS have been seen.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Sequence number the next fragment will carry.
    pub fn seq_num(&self) -> u32 {
        self.seq
    }

    /// `ftyp` + `moov` for the current parameter sets, once ready.
    pub fn init_segment(&self) -> Option<Bytes> {
        if !self.ready {
            return None;
        }
        Some(boxes::init_segment(&self.track, self.config.timescale))
    }

    /// Feeds one NAL unit. Returns a fragment when this unit completes one.
    pub fn remux(&mut self, nal: NALUnit) -> Option<Fragment> {
        let unit_type = nal.unit_type();

        if self.track.sei_buffering && unit_type == NALUnitType::SEI {
            return self.create_next_frame();
        }

        let (keep, boundary) = match unit_type {
            NALUnitType::CodedSliceIDR | NALUnitType::CodedSliceNonIDR => {
                (true, !self.track.sei_buffering)
            }
            NALUnitType::SPS => {
                self.handle_sps(&nal);
                (false, false)
            }
            NALUnitType::PPS => {
                log::debug!("PPS received ({} bytes)", nal.data.len());
                self.track.update_pps(nal.data.clone());
                self.check_ready();
                (false, false)
            }
            NALUnitType::SEI => {
                let end_of_buffering = self.handle_sei(&nal);
                (end_of_buffering, end_of_buffering)
            }
            other => {
                log::debug!("Skipping NAL unit type {} ({})", nal.nal_type, other.name());
                (false, false)
            }
        };

        if keep {
            self.track.len += nal.framed_size();
            if let Some(slot) = self.unit_samples.last_mut() {
                slot.push(nal);
            }
        }

        if boundary {
            self.create_next_frame()
        } else {
            None
        }
    }

    /// Drops everything buffered for the open fragment and moves on to the
    /// next sequence number.
    pub fn flush(&mut self) {
        self.seq += 1;
        self.track.len = 0;
        self.track.samples.clear();
        self.track.is_key_frame = false;
        self.unit_samples = vec![Vec::new()];
    }

    fn handle_sps(&mut self, nal: &NALUnit) {
        match parse_sps(nal.payload()) {
            Ok(sps) => {
                self.track.update_sps(nal.data.clone(), &sps);
                log::debug!(
                    "SPS received: {} {}x{}",
                    self.track.codec,
                    self.track.width,
                    self.track.height
                );
                self.check_ready();
            }
            Err(e) => log::warn!("Dropping unparseable SPS: {}", e),
        }
    }

    /// Returns whether the unit ends a buffering period.
    fn handle_sei(&mut self, nal: &NALUnit) -> bool {
        let messages = match parse_sei(&nal.data) {
            Ok(messages) => messages,
            Err(e) => {
                log::warn!("Dropping unparseable SEI: {}", e);
                return false;
            }
        };

        for message in messages {
            match message.payload_type {
                SeiMessage::BUFFERING_PERIOD => {
                    if !self.track.sei_buffering {
                        log::debug!("SEI buffering period seen, SEI now marks frame boundaries");
                    }
                    self.track.sei_buffering = true;
                }
                SeiMessage::END_OF_BUFFERING => return true,
                _ => {}
            }
        }
        false
    }

    fn check_ready(&mut self) {
        if !self.ready && self.track.has_parameter_sets() {
            log::debug!("Track {} ready", self.track.id);
            self.ready = true;
        }
    }

    fn create_next_frame(&mut self) -> Option<Fragment> {
        if self.track.len == 0 {
            return None;
        }

        self.frame_count = self.frame_count.wrapping_add(1);
        if self.frame_count % self.config.frames_per_fragment == 0 {
            match self.take_payload() {
                Ok(payload) => {
                    let fragment = Fragment {
                        sequence_number: self.seq,
                        base_decode_time: self.total_dts,
                        track: self.track.clone(),
                        payload,
                    };
                    self.total_dts = self.step_dts.wrapping_mul(self.frame_count);
                    log::debug!(
                        "Fragment {} cut: {} samples, {} bytes, base dts {}",
                        fragment.sequence_number,
                        fragment.track.samples.len(),
                        fragment.payload.len(),
                        fragment.base_decode_time
                    );
                    self.flush();
                    return Some(fragment);
                }
                Err(e) => log::warn!("No fragment at frame {}: {}", self.frame_count, e),
            }
        }

        self.unit_samples.push(Vec::new());
        None
    }

    /// Flattens the open sample slots into one `mdat` payload and fills in
    /// the track's sample table.
    fn take_payload(&mut self) -> Result<Bytes> {
        if !self.ready {
            return Err(Fmp4Error::FragmentNotReady(
                "SPS and PPS not both seen".to_string(),
            ));
        }
        if self.unit_samples.iter().all(|slot| slot.is_empty()) {
            return Err(Fmp4Error::FragmentNotReady(
                "no buffered samples".to_string(),
            ));
        }

        let mut payload = BytesMut::with_capacity(self.track.len);
        let mut samples = Vec::with_capacity(self.unit_samples.len());
        for (index, slot) in self.unit_samples.iter().enumerate() {
            if slot.is_empty() {
                continue;
            }
            let mut size = 0;
            for nal in slot {
                nal.write_avcc(&mut payload);
                size += nal.framed_size();
            }
            samples.push(Sample {
                size: size as u32,
                cts: self.step_dts.wrapping_mul(index as u32),
            });
        }

        if payload.is_empty() {
            return Err(Fmp4Error::EmptyPayload);
        }
        self.track.samples = samples;
        Ok(payload.freeze())
    }
}
