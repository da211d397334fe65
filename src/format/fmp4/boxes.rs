//! ISO-BMFF box serialization for fragmented MP4.
//!
//! Every box is `size:u32 | fourcc | payload` with the size covering the
//! 8-byte header. Boxes are written straight into one [`BytesMut`]; the size
//! field is patched once the payload is complete.

use bytes::{BufMut, Bytes, BytesMut};

use super::track::Track;

const UNITY_MATRIX: [u32; 9] = [
    0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000,
];

const COMPRESSOR_NAME: &[u8] = b"h264-fmp4";

/// Header bytes ahead of the first `trun` sample size that do not depend on
/// the sample table: mfhd, tfhd, tfdt, the moof and traf headers and the
/// mdat header.
const FIXED_FRAGMENT_HEADER: u32 = 16 + 16 + 8 + 16 + 8 + 8;

const TRUN_DATA_OFFSET: u32 = 0x000001;
const TRUN_FIRST_SAMPLE_FLAGS: u32 = 0x000004;
const TRUN_SAMPLE_SIZE: u32 = 0x000200;

// ============================================================================
// Box helpers
// ============================================================================

fn write_box<F>(buf: &mut BytesMut, fourcc: &[u8; 4], body: F)
where
    F: FnOnce(&mut BytesMut),
{
    let start = buf.len();
    buf.put_u32(0);
    buf.put_slice(fourcc);
    body(buf);
    let size = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
}

fn write_full_box<F>(buf: &mut BytesMut, fourcc: &[u8; 4], version: u8, flags: u32, body: F)
where
    F: FnOnce(&mut BytesMut),
{
    write_box(buf, fourcc, |buf| {
        buf.put_u32(((version as u32) << 24) | (flags & 0x00ff_ffff));
        body(buf);
    });
}

fn write_brands(buf: &mut BytesMut, fourcc: &[u8; 4], major: &[u8; 4], minor: u32, compatible: &[&[u8; 4]]) {
    write_box(buf, fourcc, |buf| {
        buf.put_slice(major);
        buf.put_u32(minor);
        for brand in compatible {
            buf.put_slice(*brand);
        }
    });
}

// ============================================================================
// Initialization segment
// ============================================================================

/// `ftyp` + `moov` describing a single AVC video track.
pub fn init_segment(track: &Track, timescale: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(768);
    write_brands(&mut buf, b"ftyp", b"iso5", 1, &[b"avc1", b"iso5", b"dash"]);
    write_box(&mut buf, b"moov", |buf| {
        write_mvhd(buf, timescale, track.duration);
        write_mvex(buf, track);
        write_trak(buf, track);
    });
    buf.freeze()
}

fn write_mvhd(buf: &mut BytesMut, timescale: u32, duration: u32) {
    write_full_box(buf, b"mvhd", 0, 0, |buf| {
        buf.put_u32(1); // creation_time
        buf.put_u32(2); // modification_time
        buf.put_u32(timescale);
        buf.put_u32(duration);
        buf.put_u32(0x0001_0000); // rate 1.0
        buf.put_u16(0x0100); // volume 1.0
        buf.put_bytes(0, 10);
        for value in UNITY_MATRIX {
            buf.put_u32(value);
        }
        buf.put_bytes(0, 24); // pre_defined
        buf.put_u32(2); // next_track_ID
    });
}

fn write_mvex(buf: &mut BytesMut, track: &Track) {
    write_box(buf, b"mvex", |buf| {
        write_full_box(buf, b"trex", 0, 0, |buf| {
            buf.put_u32(track.id);
            buf.put_u32(1); // default_sample_description_index
            buf.put_u32(track.default_sample_duration);
            buf.put_u32(0); // default_sample_size
            buf.put_u32(0x0001_0000); // default_sample_flags: non-sync
        });
        write_full_box(buf, b"trep", 0, 0, |buf| {
            buf.put_u32(track.id);
        });
    });
}

fn write_trak(buf: &mut BytesMut, track: &Track) {
    write_box(buf, b"trak", |buf| {
        write_tkhd(buf, track);
        write_box(buf, b"mdia", |buf| {
            write_mdhd(buf, track.timescale);
            write_hdlr(buf);
            write_minf(buf, track);
        });
    });
}

fn write_tkhd(buf: &mut BytesMut, track: &Track) {
    // flags: track_enabled
    write_full_box(buf, b"tkhd", 0, 0x000001, |buf| {
        buf.put_u32(1); // creation_time
        buf.put_u32(2); // modification_time
        buf.put_u32(track.id);
        buf.put_u32(0); // reserved
        buf.put_u32(0); // duration
        buf.put_bytes(0, 8);
        buf.put_u16(0); // layer
        buf.put_u16(0); // alternate_group
        buf.put_u16(0); // volume
        buf.put_u16(0);
        for value in UNITY_MATRIX {
            buf.put_u32(value);
        }
        buf.put_u32(track.width << 16);
        buf.put_u32(track.height << 16);
    });
}

fn write_mdhd(buf: &mut BytesMut, timescale: u32) {
    write_full_box(buf, b"mdhd", 0, 0, |buf| {
        buf.put_u32(1); // creation_time
        buf.put_u32(2); // modification_time
        buf.put_u32(timescale);
        buf.put_u32(0); // duration
        buf.put_u16(0x55c4); // language: und
        buf.put_u16(0);
    });
}

fn write_hdlr(buf: &mut BytesMut) {
    write_full_box(buf, b"hdlr", 0, 0, |buf| {
        buf.put_u32(0); // pre_defined
        buf.put_slice(b"vide");
        buf.put_bytes(0, 12);
        buf.put_slice(b"VideoHandler\0");
    });
}

fn write_minf(buf: &mut BytesMut, track: &Track) {
    write_box(buf, b"minf", |buf| {
        write_full_box(buf, b"vmhd", 0, 0x000001, |buf| {
            buf.put_u16(0); // graphicsmode
            buf.put_bytes(0, 6); // opcolor
        });
        write_box(buf, b"dinf", |buf| {
            write_full_box(buf, b"dref", 0, 0, |buf| {
                buf.put_u32(1);
                // self-contained
                write_full_box(buf, b"url ", 0, 0x000001, |_| {});
            });
        });
        write_stbl(buf, track);
    });
}

fn write_stbl(buf: &mut BytesMut, track: &Track) {
    write_box(buf, b"stbl", |buf| {
        write_full_box(buf, b"stsd", 0, 0, |buf| {
            buf.put_u32(1);
            write_avc1(buf, track);
        });
        write_full_box(buf, b"stts", 0, 0, |buf| buf.put_u32(0));
        write_full_box(buf, b"stsc", 0, 0, |buf| buf.put_u32(0));
        write_full_box(buf, b"stsz", 0, 0, |buf| {
            buf.put_u32(0); // sample_size
            buf.put_u32(0); // sample_count
        });
        write_full_box(buf, b"stco", 0, 0, |buf| buf.put_u32(0));
    });
}

fn write_avc1(buf: &mut BytesMut, track: &Track) {
    write_box(buf, b"avc1", |buf| {
        buf.put_bytes(0, 6);
        buf.put_u16(1); // data_reference_index
        buf.put_u16(0); // pre_defined
        buf.put_u16(0);
        buf.put_bytes(0, 12);
        buf.put_u16(track.width as u16);
        buf.put_u16(track.height as u16);
        buf.put_u32(0x0048_0000); // 72 dpi
        buf.put_u32(0x0048_0000);
        buf.put_u32(0);
        buf.put_u16(1); // frame_count
        buf.put_u8(COMPRESSOR_NAME.len() as u8);
        buf.put_slice(COMPRESSOR_NAME);
        buf.put_bytes(0, 31 - COMPRESSOR_NAME.len());
        buf.put_u16(0x0018); // depth
        buf.put_i16(-1); // pre_defined
        write_avcc(buf, track);
        write_box(buf, b"btrt", |buf| {
            buf.put_u32(0); // bufferSizeDB
            buf.put_u32(3_000_000); // maxBitrate
            buf.put_u32(3_000_000); // avgBitrate
        });
    });
}

fn write_avcc(buf: &mut BytesMut, track: &Track) {
    let sps = track.sps.as_deref().unwrap_or_default();
    let pps = track.pps.as_deref().unwrap_or_default();
    let sps_byte = |i: usize| sps.get(i).copied().unwrap_or(0);

    write_box(buf, b"avcC", |buf| {
        buf.put_u8(1); // configurationVersion
        buf.put_u8(sps_byte(1)); // AVCProfileIndication
        buf.put_u8(sps_byte(2)); // profile_compatibility
        buf.put_u8(sps_byte(3)); // AVCLevelIndication
        buf.put_u8(0xfc | 3); // lengthSizeMinusOne
        buf.put_u8(0xe0 | 1); // numOfSequenceParameterSets
        buf.put_u16(sps.len() as u16);
        buf.put_slice(sps);
        buf.put_u8(1); // numOfPictureParameterSets
        buf.put_u16(pps.len() as u16);
        buf.put_slice(pps);
    });
}

// ============================================================================
// Media segment
// ============================================================================

/// `styp` + `moof` + `mdat` for one fragment.
///
/// `track` supplies the id, the sample sizes and whether the fragment opens
/// the stream; `payload` is the flattened length-prefixed NAL data.
pub fn fragment_segment(seq: u32, base_decode_time: u32, track: &Track, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(128 + 4 * track.samples.len() + payload.len());
    write_brands(&mut buf, b"styp", b"msdh", 0, &[b"msdh", b"msix"]);
    write_box(&mut buf, b"moof", |buf| {
        write_full_box(buf, b"mfhd", 0, 0, |buf| buf.put_u32(seq));
        write_box(buf, b"traf", |buf| {
            // flags: default-base-is-moof
            write_full_box(buf, b"tfhd", 0, 0x020000, |buf| buf.put_u32(track.id));
            write_full_box(buf, b"tfdt", 0, 0, |buf| buf.put_u32(base_decode_time));
            write_trun(buf, track);
        });
    });
    write_box(&mut buf, b"mdat", |buf| buf.put_slice(payload));
    buf.freeze()
}

fn write_trun(buf: &mut BytesMut, track: &Track) {
    let mut flags = TRUN_DATA_OFFSET | TRUN_SAMPLE_SIZE;
    let mut body_len = 12 + 4 * track.samples.len() as u32;
    if track.is_key_frame {
        flags |= TRUN_FIRST_SAMPLE_FLAGS;
        body_len += 4;
    }
    let data_offset = FIXED_FRAGMENT_HEADER + 8 + body_len;

    write_full_box(buf, b"trun", 0, flags, |buf| {
        buf.put_u32(track.samples.len() as u32);
        buf.put_u32(data_offset);
        if track.is_key_frame {
            buf.put_u32(0); // first_sample_flags
        }
        for sample in &track.samples {
            buf.put_u32(sample.size);
        }
    });
}
