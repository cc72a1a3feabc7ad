//! Daemon CLI flags, unchanged names/semantics from the original's
//! `lightmediascannerd` flag set.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "scand-daemon", about = "Media scan coordinator daemon")]
pub struct DaemonArgs {
    /// Database file path. Defaults to `${USER_CONFIG_DIR}/scand/db.sqlite3`.
    #[arg(short = 'p', long = "db-path")]
    pub db_path: Option<PathBuf>,

    /// HTTP bind address for the bus surface.
    #[arg(long = "listen", default_value = "127.0.0.1:7790")]
    pub listen: String,

    #[arg(short = 'c', long = "commit-interval", default_value_t = scand_engine::config::DEFAULT_COMMIT_INTERVAL)]
    pub commit_interval: u32,

    #[arg(short = 't', long = "slave-timeout", default_value_t = scand_engine::config::DEFAULT_SLAVE_TIMEOUT_MS)]
    pub slave_timeout_ms: u64,

    /// Days after which a tombstoned file is purged. Negative disables purge.
    #[arg(short = 'd', long = "delete-older-than", default_value_t = 30)]
    pub delete_older_than_days: i64,

    /// Run `VACUUM` after each scan.
    #[arg(short = 'V', long = "vacuum")]
    pub vacuum: bool,

    /// Scan the configured directories once at startup.
    #[arg(short = 'S', long = "startup-scan")]
    pub startup_scan: bool,

    /// Suppress `ScanProgress` events (property-change events still fire).
    #[arg(long = "omit-scan-progress")]
    pub omit_scan_progress: bool,

    /// Candidate charset, repeatable.
    #[arg(short = 'C', long = "charset")]
    pub charsets: Vec<String>,

    /// Parser name or `all`/`all-<category>`, repeatable.
    #[arg(short = 'P', long = "parser")]
    pub parsers: Vec<String>,

    /// `CATEGORY:PATH` root, `defaults`, repeatable.
    #[arg(short = 'D', long = "directory")]
    pub directories: Vec<String>,
}

impl DaemonArgs {
    pub fn resolve_db_path(&self) -> anyhow::Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(scand_common::config::default_db_path()?),
        }
    }

    pub fn scan_config(&self) -> scand_engine::config::ScanConfig {
        let directories = if self.directories.is_empty() {
            vec!["defaults".to_string()]
        } else {
            self.directories.clone()
        };
        scand_engine::config::ScanConfig {
            commit_interval: self.commit_interval,
            slave_timeout: std::time::Duration::from_millis(self.slave_timeout_ms),
            charsets: self.charsets.clone(),
            parsers: if self.parsers.is_empty() { vec!["all".to_string()] } else { self.parsers.clone() },
            ..scand_engine::config::ScanConfig::default()
        }
        .resolve_directories(&directories)
    }
}
