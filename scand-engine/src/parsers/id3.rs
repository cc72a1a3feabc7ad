//! `mp3` plugin: ID3v1/v2 tags via the `id3` crate for text metadata, plus
//! a direct MPEG frame-header scan for sampling rate/channels/bitrate,
//! grounded on `original_source/src/plugins/id3/id3.c`'s `_parse_mpeg_header`
//! (sync-word search) and `_fill_mp3_header` (frame-header bit layout).

use super::{ParseContext, ParsedMedia, ParserPlugin};
use crate::dlna;
use crate::error::{Result, ScanError};
use crate::storage::AudioMeta;
use id3::TagLike;
use std::path::Path;

pub struct Id3Plugin;

impl ParserPlugin for Id3Plugin {
    fn name(&self) -> &'static str {
        "id3"
    }

    fn order(&self) -> i32 {
        0
    }

    fn categories(&self) -> &'static [&'static str] {
        &["audio"]
    }

    fn matches(&self, path: &Path) -> bool {
        super::extension_lower(path).as_deref() == Some("mp3")
    }

    fn parse(&self, ctx: &ParseContext) -> Result<ParsedMedia> {
        let tag = id3::Tag::read_from_path(ctx.path)
            .map_err(|e| ScanError::ParseFailed(format!("id3: {e}")))?;

        let decode = |raw: &str| ctx.charset.convert(raw.as_bytes());

        let title = tag.title().map(decode);
        let artist = tag.artist().map(decode);
        let album = tag.album().map(decode);
        let genre = tag.genre().map(decode);
        let trackno = tag.track().map(|t| t as i64);
        let duration_ms = tag.duration().map(|d| d as i64);

        let frame = std::fs::read(ctx.path).ok().and_then(|data| find_mpeg_frame(&data));
        let channels = frame.as_ref().map(|f| f.channels);
        let sampling_rate = frame.as_ref().map(|f| f.sampling_rate);
        let bitrate = frame.as_ref().and_then(|f| f.bitrate);

        let (profile, mime) = dlna::match_audio("mp3", "mp3", channels, sampling_rate, bitrate)
            .unwrap_or(("MP3", "audio/mpeg"));

        Ok(ParsedMedia::Audio(AudioMeta {
            title,
            artist,
            album,
            genre,
            trackno,
            length: duration_ms,
            container: Some("mp3".into()),
            codec: Some("mp3".into()),
            channels,
            sampling_rate,
            bitrate,
            dlna_profile: Some(profile.into()),
            dlna_mime: Some(mime.into()),
        }))
    }
}

struct MpegFrameInfo {
    sampling_rate: i64,
    channels: i64,
    bitrate: Option<i64>,
}

/// Scan for the first byte pair that looks like a frame sync (11 set bits)
/// and decode it, the way `_parse_mpeg_header` walks the file a byte at a
/// time looking for `0xFF` followed by a byte with its top three bits set.
fn find_mpeg_frame(data: &[u8]) -> Option<MpegFrameInfo> {
    let mut i = 0;
    while i + 4 <= data.len() {
        if data[i] == 0xFF && (data[i + 1] & 0xE0) == 0xE0 {
            if let Some(info) = decode_frame_header(&data[i..i + 4]) {
                return Some(info);
            }
        }
        i += 1;
    }
    None
}

/// Unpack a 4-byte MPEG audio frame header: version, layer, sampling rate
/// index, channel mode, and bitrate index.
fn decode_frame_header(b: &[u8]) -> Option<MpegFrameInfo> {
    let version_bits = (b[1] & 0x18) >> 3;
    let layer_bits = (b[1] & 0x06) >> 1;
    if version_bits == 0b01 || layer_bits == 0b00 {
        // 0b01 is a reserved version; layer 0b00 is reserved for MPEG
        // audio proper (ADTS/AAC framing isn't handled by this plugin).
        return None;
    }

    let sampling_rate_idx = (b[2] & 0x0C) >> 2;
    if sampling_rate_idx == 0b11 {
        return None;
    }
    let is_mpeg1 = version_bits == 0b11;
    let sampling_rate = match (version_bits, sampling_rate_idx) {
        (0b11, 0b00) => 44_100,
        (0b11, 0b01) => 48_000,
        (0b11, 0b10) => 32_000,
        (0b10, 0b00) => 22_050,
        (0b10, 0b01) => 24_000,
        (0b10, 0b10) => 16_000,
        (0b00, 0b00) => 11_025,
        (0b00, 0b01) => 12_000,
        (0b00, 0b10) => 8_000,
        _ => return None,
    };

    let channel_mode = (b[3] & 0xC0) >> 6;
    let channels = if channel_mode == 0b11 { 1 } else { 2 };

    let bitrate_idx = (b[2] & 0xF0) >> 4;
    let bitrate = mpeg_bitrate_bps(is_mpeg1, layer_bits, bitrate_idx);

    Some(MpegFrameInfo { sampling_rate, channels, bitrate })
}

/// Bitrate tables from the MPEG audio frame header spec
/// (http://www.mp3-tech.org/programmer/frame_header.html), indexed by the
/// 4-bit bitrate index straight out of the header (index 0 is "free" and
/// 15 is reserved, both mapped to `None`).
fn mpeg_bitrate_bps(is_mpeg1: bool, layer_bits: u8, idx: u8) -> Option<i64> {
    let table: [i64; 16] = match (is_mpeg1, layer_bits) {
        (true, 0b11) => [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0],
        (true, 0b10) => [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0],
        (true, 0b01) => [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0],
        (false, 0b11) => [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0],
        _ => [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
    };
    match table.get(idx as usize).copied() {
        Some(0) | None => None,
        Some(kbps) => Some(kbps * 1_000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A canonical MPEG1 Layer III, 128kbps, 44100Hz, stereo frame header.
    const MPEG1_L3_128K_44100_STEREO: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];

    #[test]
    fn decodes_mpeg1_layer3_frame_header() {
        let info = decode_frame_header(&MPEG1_L3_128K_44100_STEREO).unwrap();
        assert_eq!(info.sampling_rate, 44_100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.bitrate, Some(128_000));
    }

    #[test]
    fn finds_frame_header_after_leading_garbage() {
        let mut data = vec![0u8; 10];
        data.extend_from_slice(&MPEG1_L3_128K_44100_STEREO);
        let info = find_mpeg_frame(&data).unwrap();
        assert_eq!(info.sampling_rate, 44_100);
    }

    #[test]
    fn rejects_reserved_sampling_rate_index() {
        let header = [0xFF, 0xFB, 0x0C, 0x00];
        assert!(decode_frame_header(&header).is_none());
    }

    #[test]
    fn mono_channel_mode_reports_one_channel() {
        let header = [0xFF, 0xFB, 0x90, 0xC0];
        let info = decode_frame_header(&header).unwrap();
        assert_eq!(info.channels, 1);
    }
}
