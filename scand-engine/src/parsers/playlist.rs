//! `m3u`/`m3u8`/`pls` plugin: line-oriented formats, hand-rolled rather
//! than pulled from a crate, grounded on
//! `original_source/src/plugins/m3u/lightmediascanner_m3u.c` and
//! `_pls.c`. Only entry counting and an optional playlist title are
//! extracted — per-entry resolution is out of scope (Non-goal).

use super::{ParseContext, ParsedMedia, ParserPlugin};
use crate::error::{Result, ScanError};
use crate::storage::PlaylistMeta;
use std::path::Path;

pub struct PlaylistPlugin;

fn parse_m3u(contents: &str) -> PlaylistMeta {
    let mut title = None;
    let mut n_entries = 0i64;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("#EXTM3U") {
            let _ = rest;
            continue;
        }
        if let Some(rest) = line.strip_prefix("#PLAYLIST:") {
            title = Some(rest.trim().to_string());
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        n_entries += 1;
    }
    PlaylistMeta { title, n_entries }
}

fn parse_pls(contents: &str) -> PlaylistMeta {
    let mut title = None;
    let mut n_entries = 0i64;
    for line in contents.lines() {
        let line = line.trim();
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().to_ascii_lowercase();
            if key == "numberofentries" {
                n_entries = value.trim().parse().unwrap_or(0);
            } else if key.starts_with("title") && title.is_none() {
                title = Some(value.trim().to_string());
            }
        }
    }
    PlaylistMeta { title, n_entries }
}

impl ParserPlugin for PlaylistPlugin {
    fn name(&self) -> &'static str {
        "playlist"
    }

    fn order(&self) -> i32 {
        40
    }

    fn categories(&self) -> &'static [&'static str] {
        &["playlist"]
    }

    fn matches(&self, path: &Path) -> bool {
        matches!(
            super::extension_lower(path).as_deref(),
            Some("m3u") | Some("m3u8") | Some("pls")
        )
    }

    fn parse(&self, ctx: &ParseContext) -> Result<ParsedMedia> {
        let bytes = std::fs::read(ctx.path)
            .map_err(|e| ScanError::ParseFailed(format!("playlist read: {e}")))?;
        let contents = ctx.charset.convert(&bytes);

        let ext = super::extension_lower(ctx.path).unwrap_or_default();
        let mut meta = if ext == "pls" {
            parse_pls(&contents)
        } else {
            parse_m3u(&contents)
        };
        if meta.title.is_none() {
            meta.title = ctx
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned());
        }
        Ok(ParsedMedia::Playlist(meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_m3u_entries_and_skips_comments() {
        let contents = "#EXTM3U\n#EXTINF:123,Some Track\n/music/a.mp3\n\n/music/b.mp3\n";
        let meta = parse_m3u(contents);
        assert_eq!(meta.n_entries, 2);
    }

    #[test]
    fn reads_m3u_playlist_title_extension() {
        let contents = "#EXTM3U\n#PLAYLIST:Road Trip\n/music/a.mp3\n";
        let meta = parse_m3u(contents);
        assert_eq!(meta.title.as_deref(), Some("Road Trip"));
        assert_eq!(meta.n_entries, 1);
    }

    #[test]
    fn parses_pls_number_of_entries_and_title() {
        let contents = "[playlist]\nFile1=a.mp3\nTitle1=A\nNumberOfEntries=1\nVersion=2\n";
        let meta = parse_pls(contents);
        assert_eq!(meta.n_entries, 1);
        assert_eq!(meta.title.as_deref(), Some("A"));
    }
}
