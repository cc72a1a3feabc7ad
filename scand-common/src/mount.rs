//! Mount-table change monitoring.
//!
//! The daemon rescans a root the instant a new filesystem is mounted under
//! it. On Linux this watches `/proc/self/mountinfo` for changes using the
//! well-known `poll(2)` trick: that file becomes "exceptional" (`POLLPRI`)
//! whenever the mount table changes, with no data ever actually readable.
//! Changes are debounced by 1s since mount/unmount often fires several
//! table updates in quick succession. On every other platform there is no
//! equivalent signal, so the watcher yields nothing.

use futures::stream::Stream;
use std::collections::HashSet;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

pub type MountSet = HashSet<PathBuf>;

/// Parse the mount-point column (field 5, whitespace-separated, octal-escaped)
/// out of a `/proc/self/mountinfo`-formatted string.
pub fn parse_mountinfo(contents: &str) -> MountSet {
    contents
        .lines()
        .filter_map(|line| line.split_whitespace().nth(4))
        .map(unescape_octal)
        .map(PathBuf::from)
        .collect()
}

/// `/proc/self/mountinfo` escapes space, tab, newline, and backslash as
/// `\ooo` octal sequences.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            if let Ok(value) = u8::from_str_radix(
                std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap_or_default(),
                8,
            ) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Stream of the full current mount-point set, emitted once at startup and
/// again after every debounced change. Callers diff successive items
/// themselves (the coordinator only cares which paths were *added*).
pub fn watch_mount_changes() -> Pin<Box<dyn Stream<Item = MountSet> + Send>> {
    imp::watch_mount_changes()
}

#[cfg(target_os = "linux")]
mod imp {
    use super::{parse_mountinfo, MountSet};
    use futures::stream::Stream;
    use std::pin::Pin;
    use std::time::Duration;
    use tokio::io::{unix::AsyncFd, Interest};
    use tracing::{debug, warn};

    pub fn watch_mount_changes() -> Pin<Box<dyn Stream<Item = MountSet> + Send>> {
        let stream = async_stream::stream! {
            let Ok(current) = read_mountinfo().await else {
                warn!("failed to read /proc/self/mountinfo; mount watching disabled");
                return;
            };
            yield current;

            let Ok(file) = std::fs::File::open("/proc/self/mountinfo") else {
                return;
            };
            let Ok(async_fd) = AsyncFd::with_interest(file, Interest::PRIORITY) else {
                return;
            };

            loop {
                let Ok(mut guard) = async_fd.ready(Interest::PRIORITY).await else {
                    break;
                };
                guard.clear_ready();

                // Debounce: mount/unmount typically triggers several rapid
                // mountinfo updates (propagation to bind mounts, etc).
                tokio::time::sleep(Duration::from_secs(1)).await;

                match read_mountinfo().await {
                    Ok(set) => {
                        debug!(count = set.len(), "mount table changed");
                        yield set;
                    }
                    Err(error) => {
                        warn!(%error, "failed to re-read /proc/self/mountinfo");
                    }
                }
            }
        };

        Box::pin(stream)
    }

    async fn read_mountinfo() -> std::io::Result<MountSet> {
        let contents = tokio::fs::read_to_string("/proc/self/mountinfo").await?;
        Ok(parse_mountinfo(&contents))
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use super::MountSet;
    use futures::stream::Stream;
    use std::pin::Pin;

    pub fn watch_mount_changes() -> Pin<Box<dyn Stream<Item = MountSet> + Send>> {
        Box::pin(futures::stream::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mount_points_from_sample_mountinfo() {
        let sample = "\
36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
36 35 98:0 / / rw,noatime master:1 - ext3 /dev/root rw,errors=continue
";
        let set = parse_mountinfo(sample);
        assert!(set.contains(&PathBuf::from("/mnt2")));
        assert!(set.contains(&PathBuf::from("/")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn unescapes_octal_space_in_mount_point() {
        let sample = "36 35 98:0 / /media/My\\040Drive rw - ext3 /dev/sdb1 rw\n";
        let set = parse_mountinfo(sample);
        assert!(set.contains(&PathBuf::from("/media/My Drive")));
    }
}
