//! Scan-run configuration shared by the daemon's scanner task and the
//! single-shot `scand-scan` CLI. Fields and defaults per spec section 6's
//! CLI flag catalogue (`-c`, `-t`, `-C`, `-P`, `-D`).

use scand_common::charset::CharsetConverter;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of successful parses between commit transactions.
pub const DEFAULT_COMMIT_INTERVAL: u32 = 100;

/// Default per-file worker timeout, milliseconds.
pub const DEFAULT_SLAVE_TIMEOUT_MS: u64 = 60_000;

/// `"defaults"` directory placeholders expand to these category roots,
/// matching the original's `$HOME/Music`, `$HOME/Pictures`, `$HOME/Videos`
/// convention (adapted to this project's XDG user-dirs lookup).
fn default_category_roots() -> Vec<(String, PathBuf)> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    vec![
        ("audio".into(), dirs::audio_dir().unwrap_or_else(|| home.join("Music"))),
        ("image".into(), dirs::picture_dir().unwrap_or_else(|| home.join("Pictures"))),
        ("video".into(), dirs::video_dir().unwrap_or_else(|| home.join("Videos"))),
    ]
}

/// A single configured root, tagged with the category it feeds.
#[derive(Debug, Clone)]
pub struct DirectorySpec {
    pub category: String,
    pub path: PathBuf,
}

/// Which process model the scan engine runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    /// Driver and worker are separate OS processes (the default).
    Dual,
    /// Parsing happens in-process; used for debugging and for platforms
    /// where spawning a worker binary isn't available.
    Mono,
}

/// Everything a scan run needs besides the open database pool.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub commit_interval: u32,
    pub slave_timeout: Duration,
    pub process_mode: ProcessMode,
    pub charsets: Vec<String>,
    pub parsers: Vec<String>,
    pub directories: Vec<DirectorySpec>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            slave_timeout: Duration::from_millis(DEFAULT_SLAVE_TIMEOUT_MS),
            process_mode: ProcessMode::Dual,
            charsets: Vec::new(),
            parsers: vec!["all".to_string()],
            directories: Vec::new(),
        }
    }
}

impl ScanConfig {
    /// Resolve `directories`, expanding any `"defaults"` entries into the
    /// platform's per-category roots.
    pub fn resolve_directories(mut self, requested: &[String]) -> Self {
        let mut resolved = Vec::new();
        for entry in requested {
            if entry == "defaults" {
                resolved.extend(
                    default_category_roots()
                        .into_iter()
                        .map(|(category, path)| DirectorySpec { category, path }),
                );
                continue;
            }
            if let Some((category, path)) = entry.split_once(':') {
                resolved.push(DirectorySpec {
                    category: category.to_string(),
                    path: PathBuf::from(path),
                });
            }
        }
        self.directories = resolved;
        self
    }

    /// Build the charset converter this run's parsers will share, from
    /// the configured candidate label list.
    pub fn build_charset_converter(&self) -> CharsetConverter {
        self.charsets
            .iter()
            .fold(CharsetConverter::new(), |conv, label| conv.add(label))
    }

    /// Whether `name` (a plugin name or category) was requested, honoring
    /// the `all` / `all-<category>` wildcards.
    pub fn parser_enabled(&self, name: &str, categories: &[&str]) -> bool {
        if self.parsers.iter().any(|p| p == "all") {
            return true;
        }
        self.parsers.iter().any(|p| {
            p == name
                || categories
                    .iter()
                    .any(|c| p == &format!("all-{c}") || p == c)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ScanConfig::default();
        assert_eq!(cfg.commit_interval, 100);
        assert_eq!(cfg.slave_timeout, Duration::from_millis(60_000));
        assert_eq!(cfg.process_mode, ProcessMode::Dual);
    }

    #[test]
    fn defaults_placeholder_expands_to_three_categories() {
        let cfg = ScanConfig::default().resolve_directories(&["defaults".to_string()]);
        assert_eq!(cfg.directories.len(), 3);
    }

    #[test]
    fn explicit_category_path_parses() {
        let cfg = ScanConfig::default().resolve_directories(&["audio:/music".to_string()]);
        assert_eq!(cfg.directories.len(), 1);
        assert_eq!(cfg.directories[0].category, "audio");
        assert_eq!(cfg.directories[0].path, PathBuf::from("/music"));
    }

    #[test]
    fn all_wildcard_enables_every_parser() {
        let cfg = ScanConfig {
            parsers: vec!["all".to_string()],
            ..ScanConfig::default()
        };
        assert!(cfg.parser_enabled("id3", &["audio"]));
    }

    #[test]
    fn all_category_wildcard_is_scoped() {
        let cfg = ScanConfig {
            parsers: vec!["all-audio".to_string()],
            ..ScanConfig::default()
        };
        assert!(cfg.parser_enabled("id3", &["audio"]));
        assert!(!cfg.parser_enabled("image_meta", &["image"]));
    }
}
