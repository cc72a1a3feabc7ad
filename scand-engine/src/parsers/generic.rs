//! Fallback plugin: probes anything no other plugin claimed via
//! `symphonia`'s format/codec registry, grounded on the original's
//! "unknown extension, sniff the content" fallback path in
//! `lightmediascanner_db.c`. Runs last (`order = i32::MAX`) and claims
//! every path, so the registry never reports "no plugin" for a file a
//! directory walk chose to visit as a media candidate.

use super::{ParseContext, ParsedMedia, ParserPlugin};
use crate::error::{Result, ScanError};
use crate::storage::AudioMeta;
use std::fs::File;
use std::path::Path;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;

pub struct GenericPlugin;

impl ParserPlugin for GenericPlugin {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn order(&self) -> i32 {
        i32::MAX
    }

    fn categories(&self) -> &'static [&'static str] {
        &["audio"]
    }

    fn matches(&self, _path: &Path) -> bool {
        true
    }

    fn parse(&self, ctx: &ParseContext) -> Result<ParsedMedia> {
        let file = File::open(ctx.path)
            .map_err(|e| ScanError::ParseFailed(format!("generic open: {e}")))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = super::extension_lower(ctx.path) {
            hint.with_extension(&ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| ScanError::ParseFailed(format!("generic probe: {e}")))?;

        let mut format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.sample_rate.is_some() || t.codec_params.channels.is_some());

        let sampling_rate = track.and_then(|t| t.codec_params.sample_rate).map(|r| r as i64);
        let channels = track
            .and_then(|t| t.codec_params.channels)
            .map(|c| c.count() as i64);
        let length = track.and_then(|t| {
            let frames = t.codec_params.n_frames?;
            let rate = t.codec_params.sample_rate? as i64;
            if rate == 0 {
                None
            } else {
                Some((frames as i64 * 1000) / rate)
            }
        });

        let mut title = None;
        let mut artist = None;
        let mut album = None;
        if let Some(rev) = format.metadata().current() {
            for tag in rev.tags() {
                match tag.std_key {
                    Some(StandardTagKey::TrackTitle) => title = Some(ctx.charset.convert(tag.value.to_string().as_bytes())),
                    Some(StandardTagKey::Artist) => artist = Some(ctx.charset.convert(tag.value.to_string().as_bytes())),
                    Some(StandardTagKey::Album) => album = Some(ctx.charset.convert(tag.value.to_string().as_bytes())),
                    _ => {}
                }
            }
        }

        Ok(ParsedMedia::Audio(AudioMeta {
            title,
            artist,
            album,
            length,
            channels,
            sampling_rate,
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_any_path() {
        let plugin = GenericPlugin;
        assert!(plugin.matches(Path::new("/x/mystery.bin")));
        assert!(plugin.matches(Path::new("/x/no_extension")));
    }

    #[test]
    fn order_is_maximal() {
        assert_eq!(GenericPlugin.order(), i32::MAX);
    }
}
