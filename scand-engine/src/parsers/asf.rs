//! `wma`/`wmv` plugin: a minimal ASF header walk, grounded on
//! `original_source/src/plugins/asf/lightmediascanner_asf.c`. ASF stores
//! metadata as a flat sequence of GUID-tagged objects; we only need to
//! walk the top-level object list looking for the Content Description
//! and Header Extension objects, not implement a full demuxer.

use super::{ParseContext, ParsedMedia, ParserPlugin};
use crate::dlna;
use crate::error::{Result, ScanError};
use crate::storage::{AudioMeta, VideoMeta};
use std::io::Read;
use std::path::Path;

const ASF_HEADER_GUID: [u8; 16] = [
    0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
const CONTENT_DESC_GUID: [u8; 16] = [
    0x33, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
const STREAM_PROPERTIES_GUID: [u8; 16] = [
    0x91, 0x07, 0xDC, 0xB7, 0xB7, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const AUDIO_MEDIA_GUID: [u8; 16] = [
    0x40, 0x9E, 0x69, 0xF8, 0x4D, 0x5B, 0xCF, 0x11, 0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B,
];

pub struct AsfPlugin;

struct ContentDescription {
    title: String,
    artist: String,
}

fn read_le_u16(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}

fn read_le_u64(buf: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[..8]);
    u64::from_le_bytes(bytes)
}

/// Content Description object body: four u16 byte-lengths followed by
/// four UTF-16LE strings (title, author, copyright, description).
fn parse_content_description(body: &[u8]) -> Option<ContentDescription> {
    if body.len() < 10 {
        return None;
    }
    let title_len = read_le_u16(&body[0..2]) as usize;
    let author_len = read_le_u16(&body[2..4]) as usize;
    let mut offset = 10;
    let title_bytes = body.get(offset..offset + title_len)?;
    offset += title_len;
    let author_bytes = body.get(offset..offset + author_len)?;

    let title = decode_utf16le(title_bytes);
    let artist = decode_utf16le(author_bytes);
    Some(ContentDescription { title, artist })
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string()
}

/// Whether any Stream Properties object in the header carries the Audio
/// Media stream type GUID — if so this is audio-only, not video.
fn has_audio_stream(mut reader: impl Read) -> Result<(bool, Option<ContentDescription>)> {
    let mut buf = [0u8; 30];
    reader
        .read_exact(&mut buf)
        .map_err(|e| ScanError::ParseFailed(format!("asf header: {e}")))?;
    if buf[0..16] != ASF_HEADER_GUID {
        return Err(ScanError::ParseFailed("not an ASF file".into()));
    }
    let header_size = read_le_u64(&buf[16..24]);
    let object_count = u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]);

    let mut remaining = header_size.saturating_sub(30) as usize;
    let mut body = vec![0u8; remaining.min(4 * 1024 * 1024)];
    reader
        .read_exact(&mut body)
        .map_err(|e| ScanError::ParseFailed(format!("asf header body: {e}")))?;
    remaining = remaining.saturating_sub(body.len());
    let _ = remaining;

    let mut is_audio = false;
    let mut content_desc = None;
    let mut cursor = 0usize;
    for _ in 0..object_count {
        if cursor + 24 > body.len() {
            break;
        }
        let guid = &body[cursor..cursor + 16];
        let obj_size = read_le_u64(&body[cursor + 16..cursor + 24]) as usize;
        let obj_body_start = cursor + 24;
        let obj_body_end = (cursor + obj_size).min(body.len());

        if guid == CONTENT_DESC_GUID {
            content_desc = parse_content_description(&body[obj_body_start..obj_body_end]);
        } else if guid == STREAM_PROPERTIES_GUID {
            if let Some(stream_type) = body.get(obj_body_start..obj_body_start + 16) {
                if stream_type == AUDIO_MEDIA_GUID {
                    is_audio = true;
                }
            }
        }

        if obj_size == 0 {
            break;
        }
        cursor += obj_size;
    }

    Ok((is_audio, content_desc))
}

impl ParserPlugin for AsfPlugin {
    fn name(&self) -> &'static str {
        "asf"
    }

    fn order(&self) -> i32 {
        20
    }

    fn categories(&self) -> &'static [&'static str] {
        &["audio", "video"]
    }

    fn matches(&self, path: &Path) -> bool {
        matches!(
            super::extension_lower(path).as_deref(),
            Some("wma") | Some("wmv") | Some("asf")
        )
    }

    fn parse(&self, ctx: &ParseContext) -> Result<ParsedMedia> {
        let file = std::fs::File::open(ctx.path)
            .map_err(|e| ScanError::ParseFailed(format!("asf open: {e}")))?;
        let (is_audio, content_desc) = has_audio_stream(file)?;

        let title = content_desc.as_ref().map(|c| ctx.charset.convert(c.title.as_bytes()));
        let artist = content_desc.as_ref().map(|c| ctx.charset.convert(c.artist.as_bytes()));

        if is_audio {
            let (profile, mime) = dlna::match_audio("asf", "wma", None, None, None)
                .unwrap_or(("", ""));
            Ok(ParsedMedia::Audio(AudioMeta {
                title,
                artist,
                container: Some("asf".into()),
                codec: Some("wma".into()),
                dlna_profile: (!profile.is_empty()).then(|| profile.into()),
                dlna_mime: (!mime.is_empty()).then(|| mime.into()),
                ..Default::default()
            }))
        } else {
            let (profile, mime) = dlna::match_video("asf", "wmv", None, None, None, None, None, None)
                .unwrap_or(("", ""));
            Ok(ParsedMedia::Video(VideoMeta {
                title,
                artist,
                container: Some("asf".into()),
                dlna_profile: (!profile.is_empty()).then(|| profile.into()),
                dlna_mime: (!mime.is_empty()).then(|| mime.into()),
                ..Default::default()
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_empty_content_description() {
        let body = vec![0u8; 10];
        let desc = parse_content_description(&body).unwrap();
        assert_eq!(desc.title, "");
        assert_eq!(desc.artist, "");
    }

    #[test]
    fn decodes_utf16le_title() {
        let mut body = vec![4, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        body.extend_from_slice(&[b'h' as u8, 0, b'i' as u8, 0]);
        let desc = parse_content_description(&body).unwrap();
        assert_eq!(desc.title, "hi");
    }
}
