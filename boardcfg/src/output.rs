//! Persisting generated configurations.

use std::path::{Path, PathBuf};

use crate::core::Result;
use crate::schema::{self, FinalConfig};

/// Prefix of the companion text command.
pub const COMMAND_PREFIX: &str = "config set";

/// Paths written by [`save_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedConfig {
    pub json_path: PathBuf,
    pub command_path: PathBuf,
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<sku>_<batchDate>_<first 8 chars of the provisioning key>`.
pub fn file_stem(config: &FinalConfig) -> String {
    let key: String = config.provisioning_key.chars().take(8).collect();
    format!(
        "{}_{}_{}",
        sanitize(&config.sku),
        sanitize(&config.batch_date),
        sanitize(&key)
    )
}

/// Single-line console command that applies the configuration on a device.
pub fn companion_command(config: &FinalConfig) -> Result<String> {
    Ok(format!("{} {}", COMMAND_PREFIX, serde_json::to_string(config)?))
}

/// Re-validate `config`, then write the pretty JSON record and its
/// companion command next to each other under `dir`.
pub fn save_config(dir: &Path, config: &FinalConfig) -> Result<SavedConfig> {
    let value = serde_json::to_value(config)?;
    schema::validate::<FinalConfig>(&value)?;

    std::fs::create_dir_all(dir)?;
    let stem = file_stem(config);
    let json_path = dir.join(format!("{}.json", stem));
    let command_path = dir.join(format!("{}.txt", stem));

    std::fs::write(&json_path, format!("{}\n", serde_json::to_string_pretty(&value)?))?;
    std::fs::write(&command_path, format!("{}\n", companion_command(config)?))?;

    tracing::info!(path = %json_path.display(), "configuration written");
    Ok(SavedConfig {
        json_path,
        command_path,
    })
}
