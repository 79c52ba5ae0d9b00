use std::path::PathBuf;

use codexgate_common::sanitize_env_value;

pub(crate) const DATA_DIR_ENV: &str = "CODEXGATE_DATA_DIR";

/// CLI value, then `CODEXGATE_DATA_DIR`, then `./data`.
pub(crate) fn resolve_data_dir(cli_value: Option<&str>) -> PathBuf {
    if let Some(value) = sanitize_env_value(cli_value.map(str::to_string)) {
        return PathBuf::from(value);
    }
    if let Some(value) = sanitize_env_value(std::env::var(DATA_DIR_ENV).ok()) {
        return PathBuf::from(value);
    }
    PathBuf::from("./data")
}
