pub mod resolve;
pub mod schema;

pub use resolve::{expand_env, ControllerConfig, ResolvedSink, ResolvedSource};
pub use schema::{
    AuthConfig, DisplayKind, Extract, PinBackend, Schedule, SinkConfig, SourceConfig,
    StirlingConfig,
};

use std::path::{Path, PathBuf};
use stirling_core::{Result, StirlingError};

/// Load configuration from a TOML file.
///
/// A missing file is an error: the active source URL has no sensible default.
pub fn load(path: impl AsRef<Path>) -> Result<StirlingConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(StirlingError::Config(format!(
            "config file not found at '{}'",
            path.display()
        )));
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| StirlingError::Config(format!("cannot read '{}': {e}", path.display())))?;

    tracing::debug!("Loaded config from '{}'", path.display());
    toml::from_str(&raw).map_err(|e| StirlingError::Config(format!("TOML parse error: {e}")))
}

/// Return the default config path, honouring `$XDG_CONFIG_HOME`.
pub fn default_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("stirling").join("stirling.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_config_error() {
        let err = load("/definitely/not/here/stirling.toml").unwrap_err();
        assert!(matches!(err, StirlingError::Config(_)));
    }

    #[test]
    fn loads_file_from_disk() {
        let path = std::env::temp_dir().join(format!("stirling-load-{}.toml", std::process::id()));
        std::fs::write(&path, "data_type = \"wind\"\nheater_pin = 23\n").unwrap();
        let cfg = load(&path).unwrap();
        assert_eq!(cfg.data_type.as_deref(), Some("wind"));
        assert_eq!(cfg.heater_pin, 23);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn default_path_ends_with_app_dir() {
        assert!(default_path().ends_with("stirling/stirling.toml"));
    }
}
