//! Coordinator state: the idle/scanning state machine, the exclusive
//! write lock, and the pending-scan queue accumulated while a scan is
//! already running. Only the coordinator's main loop (see `coordinator.rs`)
//! mutates this — the scanner task signals back through a channel instead
//! of touching it directly, per section 5's single-writer rule.

use scand_engine::config::DirectorySpec;
use std::collections::{HashMap, HashSet};

/// A scan request, canonicalized: one root list per category, paths
/// de-duplicated and never nested under a sibling already in the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRequest {
    pub roots: HashMap<String, Vec<String>>,
}

impl ScanRequest {
    /// Canonicalize a raw request: drop duplicate/nested paths per
    /// category, and apply the "empty list means defaults" /
    /// "empty request means all categories with defaults" rules.
    pub fn canonicalize(mut raw: HashMap<String, Vec<String>>) -> Self {
        if raw.is_empty() {
            raw.insert("audio".into(), Vec::new());
            raw.insert("image".into(), Vec::new());
            raw.insert("video".into(), Vec::new());
        }

        let mut roots = HashMap::new();
        for (category, mut paths) in raw {
            if paths.is_empty() {
                paths.push("defaults".to_string());
            }
            paths.sort();
            paths.dedup();
            let deduped = dedup_nested(paths);
            roots.insert(category, deduped);
        }
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.values().all(|v| v.is_empty())
    }

    /// Merge another request into this one (used when accumulating the
    /// pending queue while a scan is already running).
    pub fn merge(&mut self, other: ScanRequest) {
        for (category, paths) in other.roots {
            let entry = self.roots.entry(category).or_default();
            entry.extend(paths);
            entry.sort();
            entry.dedup();
        }
    }

    /// Reject any explicit (non-`"defaults"`) path that doesn't fall under
    /// one of `defaults`'s configured roots for its category. Returns the
    /// first offending path on violation.
    pub fn validate_against_roots(&self, defaults: &[DirectorySpec]) -> std::result::Result<(), String> {
        for (category, paths) in &self.roots {
            for path in paths {
                if path == "defaults" {
                    continue;
                }
                let candidate = std::path::Path::new(path);
                let under_a_root = defaults
                    .iter()
                    .filter(|d| &d.category == category)
                    .any(|d| candidate.starts_with(&d.path));
                if !under_a_root {
                    return Err(format!("{path} is outside the configured {category} roots"));
                }
            }
        }
        Ok(())
    }

    pub fn into_directory_specs(self, defaults: &[DirectorySpec]) -> Vec<DirectorySpec> {
        self.roots
            .into_iter()
            .flat_map(|(category, paths)| {
                paths.into_iter().flat_map(move |path| {
                    if path == "defaults" {
                        defaults
                            .iter()
                            .filter(|d| d.category == category)
                            .cloned()
                            .collect::<Vec<_>>()
                    } else {
                        vec![DirectorySpec { category: category.clone(), path: path.into() }]
                    }
                })
            })
            .collect()
    }
}

/// Drop any path that is a strict prefix of another already-kept path in
/// the same category (containment de-duplication).
fn dedup_nested(mut paths: Vec<String>) -> Vec<String> {
    paths.sort_by_key(|p| p.len());
    let mut kept: Vec<String> = Vec::new();
    'outer: for path in paths.drain(..) {
        for existing in &kept {
            if path == *existing || path.starts_with(&format!("{existing}/")) {
                continue 'outer;
            }
        }
        kept.push(path);
    }
    kept
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Stopping,
}

/// Exclusive write lock, keyed by the caller-supplied `X-Client-Id` header.
#[derive(Debug, Default)]
pub struct WriteLock {
    holder: Option<String>,
}

impl WriteLock {
    pub fn try_acquire(&mut self, client_id: &str) -> bool {
        match &self.holder {
            None => {
                self.holder = Some(client_id.to_string());
                true
            }
            Some(existing) => existing == client_id,
        }
    }

    pub fn release(&mut self, client_id: &str) -> bool {
        match &self.holder {
            Some(existing) if existing == client_id => {
                self.holder = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    pub fn is_held_by(&self, client_id: &str) -> bool {
        self.holder.as_deref() == Some(client_id)
    }

    /// Release the lock if `client_id` holds it, used when a client
    /// disconnects without an explicit release.
    pub fn release_on_disconnect(&mut self, client_id: &str) {
        self.release(client_id);
    }
}

/// Mount points known at the last diff, used to debounce and to detect
/// which roots newly became reachable.
#[derive(Debug, Default, Clone)]
pub struct MountSnapshot {
    pub mounts: HashSet<std::path::PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_canonicalizes_to_three_default_categories() {
        let req = ScanRequest::canonicalize(HashMap::new());
        assert_eq!(req.roots.len(), 3);
        assert!(req.roots.values().all(|v| v == &vec!["defaults".to_string()]));
    }

    #[test]
    fn dedup_nested_drops_paths_under_a_sibling() {
        let paths = vec!["/music".to_string(), "/music/rock".to_string(), "/video".to_string()];
        let deduped = dedup_nested(paths);
        assert_eq!(deduped, vec!["/music".to_string(), "/video".to_string()]);
    }

    #[test]
    fn write_lock_second_holder_is_rejected() {
        let mut lock = WriteLock::default();
        assert!(lock.try_acquire("a"));
        assert!(!lock.try_acquire("b"));
        assert!(lock.is_held_by("a"));
    }

    #[test]
    fn write_lock_release_only_by_holder() {
        let mut lock = WriteLock::default();
        lock.try_acquire("a");
        assert!(!lock.release("b"));
        assert!(lock.release("a"));
        assert!(!lock.is_held());
    }

    #[test]
    fn validate_against_roots_rejects_path_outside_configured_roots() {
        let req = ScanRequest::canonicalize(
            [("audio".to_string(), vec!["/elsewhere".to_string()])].into_iter().collect(),
        );
        let defaults = [DirectorySpec { category: "audio".into(), path: "/music".into() }];
        assert!(req.validate_against_roots(&defaults).is_err());
    }

    #[test]
    fn validate_against_roots_accepts_path_under_a_configured_root() {
        let req = ScanRequest::canonicalize(
            [("audio".to_string(), vec!["/music/rock".to_string()])].into_iter().collect(),
        );
        let defaults = [DirectorySpec { category: "audio".into(), path: "/music".into() }];
        assert!(req.validate_against_roots(&defaults).is_ok());
    }

    #[test]
    fn merge_accumulates_pending_requests() {
        let mut req = ScanRequest::canonicalize(
            [("audio".to_string(), vec!["/a".to_string()])].into_iter().collect(),
        );
        let other = ScanRequest::canonicalize(
            [("audio".to_string(), vec!["/b".to_string()])].into_iter().collect(),
        );
        req.merge(other);
        assert_eq!(req.roots["audio"], vec!["/a".to_string(), "/b".to_string()]);
    }
}
