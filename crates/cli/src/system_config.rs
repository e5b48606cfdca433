//! System-wide configuration
//!
//! Stored as TOML at `<config_dir>/dirwatch/config.toml`. A missing file means
//! defaults; command-line flags override whatever is loaded here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use watcher::{DirClassification, WatchOptions};

/// Smallest accepted read buffer
pub const MIN_BUFFER_SIZE: usize = 64;

/// Largest accepted read buffer
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub watch: WatchOptions,

    #[serde(default)]
    pub journal: JournalConfig,
}

/// Journal placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Journal file, relative to the working directory unless absolute
    #[serde(default = "default_journal_file")]
    pub file: PathBuf,

    /// Drop events about the journal file itself when it lives inside the
    /// watched tree
    #[serde(default = "default_true")]
    pub ignore_self: bool,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            file: default_journal_file(),
            ignore_self: true,
        }
    }
}

fn default_journal_file() -> PathBuf {
    PathBuf::from("log.txt")
}

fn default_true() -> bool {
    true
}

impl SystemConfig {
    /// Reject values the watcher cannot run with
    pub fn validate(&self) -> Result<()> {
        let watch = &self.watch;

        if watch.buffer_size < MIN_BUFFER_SIZE || watch.buffer_size > MAX_BUFFER_SIZE {
            anyhow::bail!(
                "watch.buffer_size must be between {} and {} bytes (got {})",
                MIN_BUFFER_SIZE,
                MAX_BUFFER_SIZE,
                watch.buffer_size
            );
        }
        if watch.backlog_bytes < watch.buffer_size {
            anyhow::bail!(
                "watch.backlog_bytes ({}) must be at least watch.buffer_size ({})",
                watch.backlog_bytes,
                watch.buffer_size
            );
        }
        if watch.retry.backoff_ms == 0 {
            anyhow::bail!("watch.retry.backoff_ms must be greater than 0");
        }
        if watch.retry.max_attempts == Some(0) {
            anyhow::bail!("watch.retry.max_attempts must be greater than 0");
        }
        if watch.wait_timeout_ms == Some(0) {
            anyhow::bail!("watch.wait_timeout_ms must be greater than 0");
        }
        if self.journal.file.as_os_str().is_empty() {
            anyhow::bail!("journal.file must not be empty");
        }

        Ok(())
    }

    /// Read one value by dotted key
    pub fn get(&self, key: &str) -> Result<String> {
        let watch = &self.watch;
        let value = match key {
            "watch.recursive" => watch.recursive.to_string(),
            "watch.buffer_size" => watch.buffer_size.to_string(),
            "watch.backlog_bytes" => watch.backlog_bytes.to_string(),
            "watch.wait_timeout_ms" => optional(watch.wait_timeout_ms),
            "watch.retry.backoff_ms" => watch.retry.backoff_ms.to_string(),
            "watch.retry.max_attempts" => optional(watch.retry.max_attempts),
            "watch.policy.emit_deleted" => watch.policy.emit_deleted.to_string(),
            "watch.policy.emit_modified" => watch.policy.emit_modified.to_string(),
            "watch.policy.suppress_directory_modified" => {
                watch.policy.suppress_directory_modified.to_string()
            }
            "watch.policy.classify" => classify_name(watch.policy.classify).to_string(),
            "journal.file" => self.journal.file.display().to_string(),
            "journal.ignore_self" => self.journal.ignore_self.to_string(),
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'dirwatch config --list' to see available keys.",
                key
            ),
        };
        Ok(value)
    }

    /// Update one value by dotted key. Does not validate.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let watch = &mut self.watch;
        match key {
            "watch.recursive" => watch.recursive = parse_bool(value)?,
            "watch.buffer_size" => watch.buffer_size = parse_num(value)?,
            "watch.backlog_bytes" => watch.backlog_bytes = parse_num(value)?,
            "watch.wait_timeout_ms" => watch.wait_timeout_ms = parse_optional(value)?,
            "watch.retry.backoff_ms" => watch.retry.backoff_ms = parse_num(value)?,
            "watch.retry.max_attempts" => watch.retry.max_attempts = Some(parse_num(value)?),
            "watch.policy.emit_deleted" => watch.policy.emit_deleted = parse_bool(value)?,
            "watch.policy.emit_modified" => watch.policy.emit_modified = parse_bool(value)?,
            "watch.policy.suppress_directory_modified" => {
                watch.policy.suppress_directory_modified = parse_bool(value)?
            }
            "watch.policy.classify" => {
                watch.policy.classify = match value {
                    "filesystem" => DirClassification::Filesystem,
                    "name" | "name_heuristic" => DirClassification::NameHeuristic,
                    _ => anyhow::bail!("Invalid value: must be 'filesystem' or 'name'"),
                }
            }
            "journal.file" => self.journal.file = PathBuf::from(value),
            "journal.ignore_self" => self.journal.ignore_self = parse_bool(value)?,
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'dirwatch config --list' to see available keys.",
                key
            ),
        }
        Ok(())
    }
}

/// Every key accepted by [`SystemConfig::get`] and [`SystemConfig::set`]
pub const KEYS: &[&str] = &[
    "watch.recursive",
    "watch.buffer_size",
    "watch.backlog_bytes",
    "watch.wait_timeout_ms",
    "watch.retry.backoff_ms",
    "watch.retry.max_attempts",
    "watch.policy.emit_deleted",
    "watch.policy.emit_modified",
    "watch.policy.suppress_directory_modified",
    "watch.policy.classify",
    "journal.file",
    "journal.ignore_self",
];

pub fn classify_name(classify: DirClassification) -> &'static str {
    match classify {
        DirClassification::Filesystem => "filesystem",
        DirClassification::NameHeuristic => "name",
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

fn parse_bool(value: &str) -> Result<bool> {
    value
        .parse()
        .context("Invalid value: must be 'true' or 'false'")
}

fn parse_num<T: std::str::FromStr>(value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .context("Invalid value: must be a non-negative integer")
}

fn parse_optional<T: std::str::FromStr>(value: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if value == "none" {
        Ok(None)
    } else {
        parse_num(value).map(Some)
    }
}

/// Path of the config file, if the platform has a config directory
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dirwatch").join("config.toml"))
}

/// Load the system config, falling back to defaults when there is no file
pub fn load() -> Result<SystemConfig> {
    match config_file_path() {
        Some(path) if path.exists() => load_from(&path),
        _ => Ok(SystemConfig::default()),
    }
}

/// Load and validate the config at `path`
pub fn load_from(path: &Path) -> Result<SystemConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SystemConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

/// Save to the system config path
pub fn save(config: &SystemConfig) -> Result<()> {
    let path = config_file_path().context("Could not determine config directory")?;
    save_to(config, &path)
}

/// Save to `path`, creating parent directories
pub fn save_to(config: &SystemConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}

/// Write the example config if no config file exists yet
pub fn init_if_missing() -> Result<PathBuf> {
    let path = config_file_path().context("Could not determine config directory")?;
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, example_config())
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
    }
    Ok(path)
}

/// Commented example config, equal to the defaults
pub fn example_config() -> &'static str {
    r#"# dirwatch configuration
# Command-line flags override these values.

[watch]
# Include subdirectories
recursive = true
# Change kinds to report
filter = "FILE_NAME | DIR_NAME | LAST_WRITE"
# Bytes per read (64 - 1048576)
buffer_size = 16384
# Bytes of undelivered changes kept before reporting an overflow
backlog_bytes = 65536
# Wake up periodically with nothing to report (milliseconds)
# wait_timeout_ms = 5000

[watch.retry]
# Pause between attempts after a transient error (milliseconds)
backoff_ms = 1000
# Consecutive failures before giving up
max_attempts = 10

[watch.policy]
emit_deleted = true
emit_modified = true
suppress_directory_modified = true
# "filesystem" checks the disk, "name_heuristic" treats names without a dot
# as folders
classify = "filesystem"

[journal]
# Relative paths are resolved against the working directory
file = "log.txt"
ignore_self = true
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_example_config_matches_defaults() {
        let parsed: SystemConfig = toml::from_str(example_config()).unwrap();
        assert_eq!(parsed, SystemConfig::default());
        parsed.validate().unwrap();
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let parsed: SystemConfig = toml::from_str("").unwrap();
        assert_eq!(parsed, SystemConfig::default());
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = SystemConfig::default();
        config.set("watch.buffer_size", "4096")?;
        config.set("watch.retry.max_attempts", "3")?;
        config.set("watch.wait_timeout_ms", "250")?;
        config.set("watch.policy.classify", "name")?;
        save_to(&config, &path)?;

        let loaded = load_from(&path)?;
        assert_eq!(loaded, config);
        assert_eq!(loaded.get("watch.retry.max_attempts")?, "3");
        assert_eq!(loaded.get("watch.wait_timeout_ms")?, "250");
        assert_eq!(loaded.get("watch.policy.classify")?, "name");
        Ok(())
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SystemConfig::default();
        config.watch.buffer_size = 16;
        assert!(config.validate().is_err());

        let mut config = SystemConfig::default();
        config.watch.buffer_size = 2 * MAX_BUFFER_SIZE;
        assert!(config.validate().is_err());

        let mut config = SystemConfig::default();
        config.watch.retry.backoff_ms = 0;
        assert!(config.validate().is_err());

        let mut config = SystemConfig::default();
        config.watch.retry.max_attempts = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[watch]\nbuffer_size = 8\n")?;
        assert!(load_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_every_key_round_trips_through_get() {
        let config = SystemConfig::default();
        for key in KEYS {
            assert!(config.get(key).is_ok(), "key {} not readable", key);
        }
        assert!(config.get("watch.nope").is_err());
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = SystemConfig::default();
        assert!(config.set("watch.recursive", "maybe").is_err());
        assert!(config.set("watch.buffer_size", "-1").is_err());
        assert!(config.set("watch.policy.classify", "guess").is_err());
    }
}
