//! Database pool initialization and the generic per-table migration framework.

pub mod init;
pub mod migrations;
pub mod models;

pub use init::{init_read_only, init_read_write, vacuum};
pub use migrations::{get_update_id, run_migrations, set_update_id, TableMigration};
pub use models::{bytes_to_path, path_to_bytes, FileRow};
