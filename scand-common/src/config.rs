//! Root-folder / config-file resolution and the default database path

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Default database file name under the resolved config directory.
pub const DB_FILE_NAME: &str = "db.sqlite3";

/// Resolve a root folder (or file path) following the same priority order
/// across all `scand` binaries:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file key
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config_file_key: Option<&str>,
) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    if let Some(key) = config_file_key {
        if let Some(path) = read_config_file_key(key)? {
            return Ok(path);
        }
    }

    Ok(default_config_dir())
}

fn read_config_file_key(key: &str) -> Result<Option<PathBuf>> {
    let Some(config_path) = default_config_file_path() else {
        return Ok(None);
    };
    let Ok(toml_content) = std::fs::read_to_string(&config_path) else {
        return Ok(None);
    };
    let value: toml::Value = toml::from_str(&toml_content)
        .map_err(|e| Error::Config(format!("invalid config TOML: {e}")))?;
    Ok(value.get(key).and_then(|v| v.as_str()).map(PathBuf::from))
}

/// Path of the `scand` TOML config file, if the platform has a config dir.
pub fn default_config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scand").join("config.toml"))
}

/// `${USER_CONFIG_DIR}/scand` — parent of the default database file.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("scand"))
        .unwrap_or_else(|| PathBuf::from("./scand_data"))
}

/// Default database path: `${USER_CONFIG_DIR}/scand/db.sqlite3`.
///
/// Parent directories are created with mode 0755 if missing.
pub fn default_db_path() -> Result<PathBuf> {
    let dir = default_config_dir();
    ensure_dir(&dir)?;
    Ok(dir.join(DB_FILE_NAME))
}

/// Create `dir` (and parents) with mode 0755 if it doesn't already exist.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_arg_wins_over_everything() {
        let resolved =
            resolve_root_folder(Some("/explicit/path"), "SCAND_TEST_VAR_X", None).unwrap();
        assert_eq!(resolved, PathBuf::from("/explicit/path"));
    }

    #[test]
    fn env_var_wins_when_no_cli_arg() {
        std::env::set_var("SCAND_TEST_VAR_Y", "/from/env");
        let resolved = resolve_root_folder(None, "SCAND_TEST_VAR_Y", None).unwrap();
        std::env::remove_var("SCAND_TEST_VAR_Y");
        assert_eq!(resolved, PathBuf::from("/from/env"));
    }

    #[test]
    fn falls_back_to_default_when_nothing_set() {
        let resolved = resolve_root_folder(None, "SCAND_TEST_VAR_UNSET", None).unwrap();
        assert_eq!(resolved, default_config_dir());
    }
}
