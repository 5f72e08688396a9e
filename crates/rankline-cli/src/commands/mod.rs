//! CLI command implementations.

pub mod check_config;
pub mod play;

use std::path::Path;

use anyhow::{Context, Result};
use rankline_core::Config;
use tracing::{info, warn};

/// Load the config file, falling back to defaults when it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    match Config::load(path) {
        Ok(config) => {
            info!("Loaded config from {:?}", path);
            Ok(config)
        }
        Err(e) if e.is_not_found() => {
            warn!("Config {:?} not found, using defaults", path);
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load config {:?}", path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/rankline.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_malformed_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[game\n").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_reads_game() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[game]\ngame_id = \"abc\"\n").unwrap();
        assert_eq!(load_config(file.path()).unwrap().game.game_id, "abc");
    }
}
