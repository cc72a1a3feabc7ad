//! Parser plugin registry.
//!
//! Each plugin owns one `{match, setup, start, parse, finish, close}`
//! contract: `matches` decides by extension whether a plugin claims a
//! path, `parse` does the actual decode, and `setup`/`start`/`finish`/
//! `close` bracket a scan run for plugins that need to do one-time or
//! per-run preparation (most built-ins are stateless and no-op these).
//! Plugins are tried in ascending `order()`; every plugin that claims a
//! path is parsed, and a file counts as handled as soon as one claimant
//! produces a result. `generic` sits at `i32::MAX` so it only ever runs
//! as a fallback once the more specific claimants have had their turn.

mod asf;
mod generic;
mod id3;
mod image_meta;
mod lofty_tags;
mod playlist;

use crate::error::{Result, ScanError};
use crate::storage::{AudioMeta, ImageMeta, PlaylistMeta, VideoMeta};
use scand_common::charset::CharsetConverter;
use std::path::Path;

/// The concrete metadata a plugin extracted, tagged by category.
#[derive(Debug, Clone)]
pub enum ParsedMedia {
    Audio(AudioMeta),
    Image(ImageMeta),
    Video(VideoMeta),
    Playlist(PlaylistMeta),
}

impl ParsedMedia {
    pub fn category(&self) -> &'static str {
        match self {
            ParsedMedia::Audio(_) => "audio",
            ParsedMedia::Image(_) => "image",
            ParsedMedia::Video(_) => "video",
            ParsedMedia::Playlist(_) => "playlist",
        }
    }
}

/// Everything a plugin needs to decode one file.
pub struct ParseContext<'a> {
    pub path: &'a Path,
    pub charset: &'a CharsetConverter,
}

pub trait ParserPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn order(&self) -> i32;
    fn categories(&self) -> &'static [&'static str];

    /// Whether this plugin claims `path`, decided by extension alone —
    /// cheap enough to call on every candidate file.
    fn matches(&self, path: &Path) -> bool;

    /// Called once before the first `parse` of a scan run.
    fn setup(&self) {}
    /// Called once per scan run, after `setup`.
    fn start(&self) {}

    fn parse(&self, ctx: &ParseContext) -> Result<ParsedMedia>;

    /// Called once per scan run, before `close`.
    fn finish(&self) {}
    /// Called once after the last `parse` of a scan run.
    fn close(&self) {}
}

/// Ordered collection of registered plugins.
pub struct Registry {
    plugins: Vec<Box<dyn ParserPlugin>>,
}

impl Registry {
    /// The built-in plugin set, grounded on the original C plugins of the
    /// same name (see DESIGN.md). `rm` (RealMedia) is intentionally absent.
    pub fn built_in() -> Self {
        let mut plugins: Vec<Box<dyn ParserPlugin>> = vec![
            Box::new(id3::Id3Plugin),
            Box::new(lofty_tags::LoftyTagsPlugin),
            Box::new(asf::AsfPlugin),
            Box::new(image_meta::ImageMetaPlugin),
            Box::new(playlist::PlaylistPlugin),
            Box::new(generic::GenericPlugin),
        ];
        plugins.sort_by_key(|p| p.order());
        Self { plugins }
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Registered plugin names in match order, for `-P` listing.
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Each registered plugin's name and the categories it produces, for
    /// building the daemon's per-category status surface.
    pub fn plugin_categories(&self) -> Vec<(&'static str, &'static [&'static str])> {
        self.plugins.iter().map(|p| (p.name(), p.categories())).collect()
    }

    pub fn setup_all(&self) {
        for plugin in &self.plugins {
            plugin.setup();
        }
    }

    pub fn start_all(&self) {
        for plugin in &self.plugins {
            plugin.start();
        }
    }

    pub fn finish_all(&self) {
        for plugin in &self.plugins {
            plugin.finish();
        }
    }

    pub fn close_all(&self) {
        for plugin in &self.plugins {
            plugin.close();
        }
    }

    /// First plugin (in registration/order) claiming `path`. Used for the
    /// cheap "does anything claim this file at all" check.
    pub fn find(&self, path: &Path) -> Option<&dyn ParserPlugin> {
        self.plugins
            .iter()
            .find(|p| p.matches(path))
            .map(|p| p.as_ref())
    }

    /// Every plugin (in registration/order) claiming `path`.
    pub fn find_all(&self, path: &Path) -> Vec<&dyn ParserPlugin> {
        self.plugins
            .iter()
            .filter(|p| p.matches(path))
            .map(|p| p.as_ref())
            .collect()
    }

    /// Parse `path` with every claiming plugin, in order. The file is
    /// handled as soon as one claimant parses successfully; a claimant's
    /// parse error doesn't stop the rest from being tried (this is how a
    /// specific plugin failing on a malformed file still lets the
    /// `generic` fallback have a turn). Returns every successful result,
    /// for the caller to merge per category; errors only if every
    /// claimant failed.
    pub fn parse(&self, path: &Path, charset: &CharsetConverter) -> Result<Vec<ParsedMedia>> {
        let claimants = self.find_all(path);
        if claimants.is_empty() {
            return Err(ScanError::ParseFailed(format!("no plugin for {}", path.display())));
        }

        let ctx = ParseContext { path, charset };
        let mut results = Vec::new();
        let mut last_error = None;
        for plugin in claimants {
            match plugin.parse(&ctx) {
                Ok(parsed) => results.push(parsed),
                Err(error) => last_error = Some(error),
            }
        }

        if results.is_empty() {
            Err(last_error.unwrap())
        } else {
            Ok(results)
        }
    }
}

fn extension_lower(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_is_last_and_catches_everything() {
        let registry = Registry::built_in();
        assert_eq!(registry.plugins.last().unwrap().name(), "generic");
        assert!(registry.find(Path::new("/x/unknown.bin")).is_some());
    }

    #[test]
    fn id3_claims_mp3_before_generic() {
        let registry = Registry::built_in();
        let plugin = registry.find(Path::new("/x/song.mp3")).unwrap();
        assert_eq!(plugin.name(), "id3");
    }

    #[test]
    fn mp3_is_claimed_by_both_id3_and_the_generic_fallback() {
        let registry = Registry::built_in();
        let claimants = registry.find_all(Path::new("/x/song.mp3"));
        let names: Vec<_> = claimants.iter().map(|p| p.name()).collect();
        assert!(names.contains(&"id3"));
        assert!(names.contains(&"generic"));
        assert_eq!(names.first(), Some(&"id3"));
    }
}
