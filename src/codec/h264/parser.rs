use crate::error::{Fmp4Error, Result};
use crate::utils::BitReader;

use super::types::{AspectRatio, SeiMessage, SequenceParameterSet, TimingInfo};

/// Profiles whose SPS carries the chroma format / bit depth / scaling matrix block.
const HIGH_PROFILES: [u8; 12] = [100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134];

/// Table E-1 sample aspect ratios for aspect_ratio_idc 1..=16.
const SAR_TABLE: [(u32, u32); 16] = [
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
    (4, 3),
    (3, 2),
    (2, 1),
];

const EXTENDED_SAR: u8 = 255;

/// Removes emulation prevention bytes (`00 00 03` -> `00 00`) so the bit
/// reader sees the raw RBSP.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x03 {
            out.push(0x00);
            out.push(0x00);
            i += 3;
            continue;
        }
        out.push(data[i]);
        i += 1;
    }

    out
}

/// Parses a sequence parameter set.
///
/// `data` starts at `profile_idc`, i.e. the NAL header byte has already been
/// stripped by the caller. Syntax elements are decoded in the order of the
/// H.264 `seq_parameter_set_data()` table; everything the remuxer has no use
/// for is skipped.
pub fn parse_sps(data: &[u8]) -> Result<SequenceParameterSet> {
    let rbsp = remove_emulation_prevention(data);
    let mut reader = BitReader::new(&rbsp);

    let mut sps = SequenceParameterSet {
        profile_idc: reader.read_u8()?,
        constraint_flags: reader.read_u8()?,
        level_idc: reader.read_u8()?,
        seq_parameter_set_id: reader.read_unsigned_exp_golomb()?,
        chroma_format_idc: 1,
        ..Default::default()
    };

    if HIGH_PROFILES.contains(&sps.profile_idc) {
        sps.chroma_format_idc = read_chroma_format_block(&mut reader)?;
    }

    reader.skip_unsigned_exp_golomb()?; // log2_max_frame_num_minus4
    sps.pic_order_cnt_type = skip_pic_order_cnt(&mut reader)?;

    reader.skip_unsigned_exp_golomb()?; // max_num_ref_frames
    reader.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    sps.pic_width_in_mbs_minus1 = reader.read_unsigned_exp_golomb()?;
    sps.pic_height_in_map_units_minus1 = reader.read_unsigned_exp_golomb()?;
    sps.frame_mbs_only_flag = reader.read_bool()?;
    if !sps.frame_mbs_only_flag {
        reader.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }
    reader.skip_bits(1)?; // direct_8x8_inference_flag

    if reader.read_bool()? {
        let crop = read_frame_cropping(&mut reader)?;
        sps.frame_crop_left_offset = crop[0];
        sps.frame_crop_right_offset = crop[1];
        sps.frame_crop_top_offset = crop[2];
        sps.frame_crop_bottom_offset = crop[3];
    }

    if reader.read_bool()? {
        // vui_parameters_present_flag
        if let Err(e) = parse_vui(&mut reader, &mut sps) {
            log::debug!("Truncated VUI ({}), keeping fields read so far", e);
        }
    }

    log::debug!(
        "SPS: profile_idc={} level_idc={} mbs={}x{} frame_mbs_only={}",
        sps.profile_idc,
        sps.level_idc,
        sps.pic_width_in_mbs_minus1 + 1,
        sps.pic_height_in_map_units_minus1 + 1,
        sps.frame_mbs_only_flag
    );

    Ok(sps)
}

/// High-profile block: chroma format, bit depths and the optional scaling matrix.
fn read_chroma_format_block(reader: &mut BitReader) -> Result<u32> {
    let chroma_format_idc = reader.read_unsigned_exp_golomb()?;
    if chroma_format_idc == 3 {
        reader.skip_bits(1)?; // separate_colour_plane_flag
    }
    reader.skip_unsigned_exp_golomb()?; // bit_depth_luma_minus8
    reader.skip_unsigned_exp_golomb()?; // bit_depth_chroma_minus8
    reader.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag

    if reader.read_bool()? {
        // seq_scaling_matrix_present_flag
        skip_scaling_matrix(reader, chroma_format_idc)?;
    }
    Ok(chroma_format_idc)
}

fn skip_scaling_matrix(reader: &mut BitReader, chroma_format_idc: u32) -> Result<()> {
    let count = if chroma_format_idc != 3 { 8 } else { 12 };
    for i in 0..count {
        if reader.read_bool()? {
            // seq_scaling_list_present_flag[i]
            skip_scaling_list(reader, if i < 6 { 16 } else { 64 })?;
        }
    }
    Ok(())
}

/// Advances past one scaling list of `size` delta-coded entries.
fn skip_scaling_list(reader: &mut BitReader, size: usize) -> Result<()> {
    let mut last_scale: i64 = 8;
    let mut next_scale: i64 = 8;

    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = reader.read_signed_exp_golomb()? as i64;
            next_scale = (last_scale + delta_scale).rem_euclid(256);
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }

    Ok(())
}

/// Skips the picture order count fields and returns `pic_order_cnt_type`.
fn skip_pic_order_cnt(reader: &mut BitReader) -> Result<u32> {
    let pic_order_cnt_type = reader.read_unsigned_exp_golomb()?;
    match pic_order_cnt_type {
        0 => reader.skip_unsigned_exp_golomb()?, // log2_max_pic_order_cnt_lsb_minus4
        1 => {
            reader.skip_bits(1)?; // delta_pic_order_always_zero_flag
            reader.skip_signed_exp_golomb()?; // offset_for_non_ref_pic
            reader.skip_signed_exp_golomb()?; // offset_for_top_to_bottom_field
            let cycle = reader.read_unsigned_exp_golomb()?;
            for _ in 0..cycle {
                reader.skip_signed_exp_golomb()?; // offset_for_ref_frame[i]
            }
        }
        _ => {}
    }
    Ok(pic_order_cnt_type)
}

/// Left, right, top, bottom crop offsets.
fn read_frame_cropping(reader: &mut BitReader) -> Result<[u32; 4]> {
    Ok([
        reader.read_unsigned_exp_golomb()?,
        reader.read_unsigned_exp_golomb()?,
        reader.read_unsigned_exp_golomb()?,
        reader.read_unsigned_exp_golomb()?,
    ])
}

/// Reads the VUI fields that precede the HRD parameters, filling `sps` as it goes.
fn parse_vui(reader: &mut BitReader, sps: &mut SequenceParameterSet) -> Result<()> {
    if reader.read_bool()? {
        // aspect_ratio_info_present_flag
        sps.sar = match read_aspect_ratio(reader) {
            Ok(sar) => sar,
            Err(Fmp4Error::UnrecognizedAspectRatioIndex(idc)) => {
                log::warn!("H264: unknown aspect_ratio_idc={}, assuming 1:1", idc);
                AspectRatio::SQUARE
            }
            Err(e) => return Err(e),
        };
    }
    skip_overscan_info(reader)?;
    skip_video_signal_type(reader)?;
    skip_chroma_loc_info(reader)?;
    sps.timing = read_timing_info(reader)?;
    Ok(())
}

fn read_aspect_ratio(reader: &mut BitReader) -> Result<AspectRatio> {
    let idc = reader.read_u8()?;
    match idc {
        1..=16 => {
            let (num, den) = SAR_TABLE[idc as usize - 1];
            Ok(AspectRatio { num, den })
        }
        EXTENDED_SAR => {
            let num = reader.read_u16()? as u32;
            let den = reader.read_u16()? as u32;
            if num == 0 || den == 0 {
                log::warn!("H264: degenerate extended SAR {}:{}, assuming 1:1", num, den);
                return Ok(AspectRatio::SQUARE);
            }
            Ok(AspectRatio { num, den })
        }
        _ => Err(Fmp4Error::UnrecognizedAspectRatioIndex(idc)),
    }
}

fn skip_overscan_info(reader: &mut BitReader) -> Result<()> {
    if reader.read_bool()? {
        reader.skip_bits(1)?; // overscan_appropriate_flag
    }
    Ok(())
}

fn skip_video_signal_type(reader: &mut BitReader) -> Result<()> {
    if reader.read_bool()? {
        reader.skip_bits(4)?; // video_format u(3) + video_full_range_flag
        if reader.read_bool()? {
            // colour_primaries, transfer_characteristics, matrix_coefficients
            reader.skip_bits(24)?;
        }
    }
    Ok(())
}

fn skip_chroma_loc_info(reader: &mut BitReader) -> Result<()> {
    if reader.read_bool()? {
        reader.skip_unsigned_exp_golomb()?; // chroma_sample_loc_type_top_field
        reader.skip_unsigned_exp_golomb()?; // chroma_sample_loc_type_bottom_field
    }
    Ok(())
}

fn read_timing_info(reader: &mut BitReader) -> Result<Option<TimingInfo>> {
    if !reader.read_bool()? {
        return Ok(None);
    }
    if reader.bits_available() < 65 {
        log::debug!("Truncated VUI timing info ({} bits left)", reader.bits_available());
        return Ok(None);
    }
    let timing = TimingInfo {
        num_units_in_tick: reader.read_u32()?,
        time_scale: reader.read_u32()?,
        fixed_frame_rate_flag: reader.read_bool()?,
    };
    if timing.num_units_in_tick > 0 {
        log::debug!(
            "VUI timing: time_scale={} num_units_in_tick={} fixed={} frame duration={}",
            timing.time_scale,
            timing.num_units_in_tick,
            timing.fixed_frame_rate_flag,
            timing.time_scale as f64 / (2.0 * timing.num_units_in_tick as f64)
        );
    }
    Ok(Some(timing))
}

/// Lists the message headers of an SEI NAL unit.
///
/// `data` is the whole unit including its header byte. Payload contents are
/// skipped, only `payload_type` and `payload_size` are reported.
pub fn parse_sei(data: &[u8]) -> Result<Vec<SeiMessage>> {
    let rbsp = remove_emulation_prevention(data);
    let mut reader = BitReader::new(&rbsp);
    reader.skip_bits(8)?;

    let mut messages = Vec::new();
    while reader.bits_available() >= 32 {
        let payload_type = read_sei_value(&mut reader)?;
        let payload_size = read_sei_value(&mut reader)?;
        reader.skip_bits(payload_size as usize * 8)?;
        reader.byte_align()?;
        messages.push(SeiMessage {
            payload_type,
            payload_size,
        });
    }
    Ok(messages)
}

/// ff-continued byte sum used for SEI payload type and size.
fn read_sei_value(reader: &mut BitReader) -> Result<u32> {
    let mut value = 0u32;
    loop {
        let byte = reader.read_u8()?;
        value += byte as u32;
        if byte != 0xff {
            return Ok(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bits::test_utils::BitWriter;
    use pretty_assertions::assert_eq;

    /// x264 1280x720 High profile SPS, level 3.1, SAR 1:1, 60 fps timing.
    const SPS_720P: [u8; 26] = [
        0x67, 0x64, 0x00, 0x1f, 0xac, 0xd9, 0x40, 0x50, 0x05, 0xbb, 0x01, 0x10, 0x00, 0x00,
        0x03, 0x00, 0x10, 0x00, 0x00, 0x03, 0x03, 0xc0, 0xf1, 0x83, 0x19, 0x60,
    ];

    /// x264 1920x1080 High profile SPS, level 4.0, cropped from 1088 lines.
    const SPS_1080P: [u8; 27] = [
        0x67, 0x64, 0x00, 0x28, 0xac, 0xd9, 0x40, 0x78, 0x02, 0x27, 0xe5, 0xc0, 0x44, 0x00,
        0x00, 0x03, 0x00, 0x04, 0x00, 0x00, 0x03, 0x00, 0xf0, 0x3c, 0x60, 0xc6, 0x58,
    ];

    /// Baseline SPS: poc type 2, no cropping, optional VUI with the given SAR idc.
    fn baseline_sps(width_mbs: u32, height_mbs: u32, sar_idc: Option<u8>) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(66, 8).write_bits(0xc0, 8).write_bits(30, 8);
        w.write_ue(0); // seq_parameter_set_id
        w.write_ue(0); // log2_max_frame_num_minus4
        w.write_ue(2); // pic_order_cnt_type
        w.write_ue(1); // max_num_ref_frames
        w.write_bool(false);
        w.write_ue(width_mbs - 1);
        w.write_ue(height_mbs - 1);
        w.write_bool(true); // frame_mbs_only_flag
        w.write_bool(true); // direct_8x8_inference_flag
        w.write_bool(false); // frame_cropping_flag
        match sar_idc {
            None => {
                w.write_bool(false);
            }
            Some(idc) => {
                w.write_bool(true); // vui_parameters_present_flag
                w.write_bool(true); // aspect_ratio_info_present_flag
                w.write_bits(idc as u32, 8);
                if idc == 255 {
                    w.write_bits(4, 16).write_bits(3, 16);
                }
                w.write_bool(false); // overscan
                w.write_bool(false); // video signal type
                w.write_bool(false); // chroma loc
                w.write_bool(false); // timing
                w.write_bool(false); // nal hrd
                w.write_bool(false); // vcl hrd
                w.write_bool(false); // pic_struct_present_flag
                w.write_bool(false); // bitstream_restriction_flag
            }
        }
        w.finish_rbsp()
    }

    #[test]
    fn test_parse_sps_720p() {
        let sps = parse_sps(&SPS_720P[1..]).unwrap();
        assert_eq!(sps.profile_idc, 100);
        assert_eq!(sps.constraint_flags, 0);
        assert_eq!(sps.level_idc, 31);
        assert_eq!(sps.seq_parameter_set_id, 0);
        assert_eq!(sps.chroma_format_idc, 1);
        assert_eq!(sps.pic_order_cnt_type, 0);
        assert_eq!(sps.pic_width_in_mbs_minus1, 79);
        assert_eq!(sps.pic_height_in_map_units_minus1, 44);
        assert!(sps.frame_mbs_only_flag);
        assert_eq!(sps.frame_crop_bottom_offset, 0);
        assert_eq!(sps.sar, AspectRatio::SQUARE);
        assert_eq!(
            sps.timing,
            Some(TimingInfo {
                num_units_in_tick: 1,
                time_scale: 60,
                fixed_frame_rate_flag: false,
            })
        );
    }

    #[test]
    fn test_parse_sps_1080p_cropping() {
        let sps = parse_sps(&SPS_1080P[1..]).unwrap();
        assert_eq!(sps.level_idc, 40);
        assert_eq!(sps.pic_width_in_mbs_minus1, 119);
        assert_eq!(sps.pic_height_in_map_units_minus1, 67);
        assert_eq!(sps.frame_crop_left_offset, 0);
        assert_eq!(sps.frame_crop_right_offset, 0);
        assert_eq!(sps.frame_crop_top_offset, 0);
        assert_eq!(sps.frame_crop_bottom_offset, 4);
    }

    #[test]
    fn test_parse_sps_baseline_without_vui() {
        let data = baseline_sps(20, 15, None);
        let sps = parse_sps(&data).unwrap();
        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.constraint_flags, 0xc0);
        assert_eq!(sps.pic_order_cnt_type, 2);
        assert_eq!(sps.pic_width_in_mbs_minus1, 19);
        assert_eq!(sps.pic_height_in_map_units_minus1, 14);
        assert_eq!(sps.sar, AspectRatio::SQUARE);
        assert_eq!(sps.timing, None);
    }

    #[test]
    fn test_parse_sps_aspect_ratio_table() {
        let sps = parse_sps(&baseline_sps(20, 15, Some(2))).unwrap();
        assert_eq!(sps.sar, AspectRatio { num: 12, den: 11 });

        let sps = parse_sps(&baseline_sps(20, 15, Some(16))).unwrap();
        assert_eq!(sps.sar, AspectRatio { num: 2, den: 1 });

        let sps = parse_sps(&baseline_sps(20, 15, Some(255))).unwrap();
        assert_eq!(sps.sar, AspectRatio { num: 4, den: 3 });
    }

    #[test]
    fn test_parse_sps_unknown_aspect_ratio_is_not_fatal() {
        let sps = parse_sps(&baseline_sps(20, 15, Some(42))).unwrap();
        assert_eq!(sps.sar, AspectRatio::SQUARE);
        assert_eq!(sps.pic_width_in_mbs_minus1, 19);

        let reader_data = [42u8, 0];
        let mut reader = BitReader::new(&reader_data);
        assert!(matches!(
            read_aspect_ratio(&mut reader),
            Err(Fmp4Error::UnrecognizedAspectRatioIndex(42))
        ));
    }

    #[test]
    fn test_parse_sps_high_profile_scaling_matrix_and_poc_type_1() {
        let mut w = BitWriter::new();
        w.write_bits(100, 8).write_bits(0, 8).write_bits(40, 8);
        w.write_ue(1); // seq_parameter_set_id
        w.write_ue(3); // chroma_format_idc 4:4:4
        w.write_bool(false); // separate_colour_plane_flag
        w.write_ue(0).write_ue(0);
        w.write_bool(false);
        w.write_bool(true); // seq_scaling_matrix_present_flag
        for i in 0..12 {
            let present = i == 0 || i == 7;
            w.write_bool(present);
            if present {
                // First delta drives next_scale to 0, ending the list early.
                w.write_se(-8);
            }
        }
        w.write_ue(0); // log2_max_frame_num_minus4
        w.write_ue(1); // pic_order_cnt_type
        w.write_bool(false);
        w.write_se(-1).write_se(2);
        w.write_ue(2);
        w.write_se(1).write_se(-1);
        w.write_ue(4); // max_num_ref_frames
        w.write_bool(false);
        w.write_ue(39).write_ue(22);
        w.write_bool(false); // frame_mbs_only_flag
        w.write_bool(true); // mb_adaptive_frame_field_flag
        w.write_bool(true);
        w.write_bool(true); // frame_cropping_flag
        w.write_ue(0).write_ue(0).write_ue(1).write_ue(2);
        w.write_bool(false);
        let data = w.finish_rbsp();

        let sps = parse_sps(&data).unwrap();
        assert_eq!(sps.seq_parameter_set_id, 1);
        assert_eq!(sps.chroma_format_idc, 3);
        assert_eq!(sps.pic_order_cnt_type, 1);
        assert_eq!(sps.pic_width_in_mbs_minus1, 39);
        assert_eq!(sps.pic_height_in_map_units_minus1, 22);
        assert!(!sps.frame_mbs_only_flag);
        assert_eq!(sps.frame_crop_top_offset, 1);
        assert_eq!(sps.frame_crop_bottom_offset, 2);
    }

    #[test]
    fn test_skip_scaling_list_full_length() {
        // 16 deltas of zero keep next_scale at 8 for every entry.
        let mut w = BitWriter::new();
        for _ in 0..16 {
            w.write_se(0);
        }
        w.write_bits(0xa5, 8);
        let data = w.into_bytes();
        let mut reader = BitReader::new(&data);
        skip_scaling_list(&mut reader, 16).unwrap();
        assert_eq!(reader.position(), 16);
        assert_eq!(reader.read_u8().unwrap(), 0xa5);
    }

    #[test]
    fn test_skip_scaling_list_extreme_deltas_wrap() {
        // 8 + i32::MAX is 7 mod 256 and 7 - i32::MAX is 8 mod 256, so the
        // list runs to full length.
        let mut w = BitWriter::new();
        w.write_se(i32::MAX).write_se(-i32::MAX);
        for _ in 0..14 {
            w.write_se(0);
        }
        w.write_bits(0xa5, 8);
        let data = w.into_bytes();
        let mut reader = BitReader::new(&data);
        skip_scaling_list(&mut reader, 16).unwrap();
        assert_eq!(reader.position(), 63 + 63 + 14);
        assert_eq!(reader.read_u8().unwrap(), 0xa5);
    }

    #[test]
    fn test_parse_sps_truncated() {
        assert!(matches!(
            parse_sps(&SPS_720P[1..5]),
            Err(Fmp4Error::OutOfBits { .. })
        ));
        assert!(parse_sps(&[]).is_err());
    }

    #[test]
    fn test_remove_emulation_prevention() {
        assert_eq!(remove_emulation_prevention(&[0x00, 0x00, 0x03, 0x01]), vec![0x00, 0x00, 0x01]);
        assert_eq!(
            remove_emulation_prevention(&[0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03, 0x02]),
            vec![0x00, 0x00, 0x01, 0x00, 0x00, 0x02]
        );
        let input = vec![0x00, 0x01, 0x02, 0x03];
        assert_eq!(remove_emulation_prevention(&input), input);
    }

    #[test]
    fn test_parse_sei_buffering_period() {
        // header, type 0, size 1, payload, rbsp trailing bits
        let sei = [0x06, 0x00, 0x01, 0xc0, 0x80];
        assert_eq!(
            parse_sei(&sei).unwrap(),
            vec![SeiMessage {
                payload_type: 0,
                payload_size: 1,
            }]
        );
    }

    #[test]
    fn test_parse_sei_multiple_messages_and_ff_continuation() {
        let mut sei = vec![0x06];
        // pic timing (type 1), 2 bytes
        sei.extend_from_slice(&[0x01, 0x02, 0xaa, 0xbb]);
        // type 0xff + 0x05 = 260, size 0xff + 0x01 = 256
        sei.extend_from_slice(&[0xff, 0x05, 0xff, 0x01]);
        sei.extend(std::iter::repeat(0x11).take(256));
        // user data unregistered (type 5), 16 byte uuid + 1
        sei.extend_from_slice(&[0x05, 0x11]);
        sei.extend(std::iter::repeat(0x22).take(17));
        sei.push(0x80);

        let messages = parse_sei(&sei).unwrap();
        let types: Vec<(u32, u32)> = messages
            .iter()
            .map(|m| (m.payload_type, m.payload_size))
            .collect();
        assert_eq!(types, vec![(1, 2), (260, 256), (5, 17)]);
    }

    #[test]
    fn test_parse_sei_short_tail_is_ignored() {
        assert!(parse_sei(&[0x06, 0x00, 0x01, 0xc0]).unwrap().is_empty());
        assert!(parse_sei(&[0x06]).unwrap().is_empty());
        assert!(parse_sei(&[]).is_err());
    }

    #[test]
    fn test_parse_sei_oversized_payload_fails() {
        let sei = [0x06, 0x00, 0x10, 0x00, 0x00, 0x80];
        assert!(matches!(
            parse_sei(&sei),
            Err(Fmp4Error::OutOfBits { .. })
        ));
    }
}
