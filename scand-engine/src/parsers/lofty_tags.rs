//! `flac`/`ogg`/`mp4`/`wave` plugin: `lofty` natively covers all four
//! containers, so a single plugin replaces the four separate originals
//! (`lightmediascanner_flac.c`, `_ogg.c`, `_mp4.c`, `_wav.c`).

use super::{ParseContext, ParsedMedia, ParserPlugin};
use crate::dlna;
use crate::error::{Result, ScanError};
use crate::storage::AudioMeta;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use std::path::Path;

pub struct LoftyTagsPlugin;

const EXTENSIONS: &[&str] = &["flac", "ogg", "oga", "opus", "m4a", "mp4", "wav", "wave"];

fn container_for_extension(ext: &str) -> &'static str {
    match ext {
        "flac" => "flac",
        "ogg" | "oga" | "opus" => "ogg",
        "m4a" | "mp4" => "mp4",
        _ => "wav",
    }
}

impl ParserPlugin for LoftyTagsPlugin {
    fn name(&self) -> &'static str {
        "lofty_tags"
    }

    fn order(&self) -> i32 {
        10
    }

    fn categories(&self) -> &'static [&'static str] {
        &["audio"]
    }

    fn matches(&self, path: &Path) -> bool {
        super::extension_lower(path)
            .map(|ext| EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    fn parse(&self, ctx: &ParseContext) -> Result<ParsedMedia> {
        let ext = super::extension_lower(ctx.path).unwrap_or_default();
        let container = container_for_extension(&ext);

        let tagged_file = Probe::open(ctx.path)
            .map_err(|e| ScanError::ParseFailed(format!("lofty probe: {e}")))?
            .read()
            .map_err(|e| ScanError::ParseFailed(format!("lofty read: {e}")))?;

        let properties = tagged_file.properties();
        let channels = properties.channels().map(|c| c as i64);
        let sampling_rate = properties.sample_rate().map(|r| r as i64);
        let bitrate = properties.audio_bitrate().map(|b| b as i64);
        let length = Some(properties.duration().as_millis() as i64);

        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
        let (title, artist, album, genre, trackno) = match tag {
            Some(tag) => (
                tag.title().map(|s| s.to_string()),
                tag.artist().map(|s| s.to_string()),
                tag.album().map(|s| s.to_string()),
                tag.genre().map(|s| s.to_string()),
                tag.track().map(|t| t as i64),
            ),
            None => (None, None, None, None, None),
        };

        let codec = match container {
            "flac" => "flac",
            "ogg" => "vorbis",
            "mp4" => "aac",
            _ => "pcm",
        };
        let (profile, mime) = dlna::match_audio(container, codec, channels, sampling_rate, bitrate)
            .unwrap_or(("", ""));

        Ok(ParsedMedia::Audio(AudioMeta {
            title,
            artist,
            album,
            genre,
            trackno,
            length,
            container: Some(container.into()),
            codec: Some(codec.into()),
            channels,
            sampling_rate,
            bitrate,
            dlna_profile: (!profile.is_empty()).then(|| profile.into()),
            dlna_mime: (!mime.is_empty()).then(|| mime.into()),
        }))
    }
}
