//! Print the resolved configuration with secrets masked.

use std::path::Path;

use anyhow::{Context, Result};
use rankline_core::Config;

use super::load_config;

pub fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    println!("{}", render(&config)?);

    if config.game.game_id.is_empty() {
        println!("warning: game_id is empty, init will be rejected by the service");
    }
    Ok(())
}

/// TOML text of `config` with the game secret masked
fn render(config: &Config) -> Result<String> {
    let mut config = config.clone();
    config.game = config.game.redacted();
    toml::to_string_pretty(&config).context("Failed to render config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_render_masks_secret_and_keeps_loopback() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[game]
game_id = "g"
game_secret = "hunter2"

[loopback]
login = "alice"
rivals = [900, 50]
latency_ms = 5

[loopback.stored_score]
result = 100
mode = 0
level = 3
minor_result = 2
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        let rendered = render(&config).unwrap();
        assert!(rendered.contains("********"));
        assert!(!rendered.contains("hunter2"));

        let reparsed = Config::parse(&rendered).unwrap();
        assert_eq!(reparsed.loopback, config.loopback);
        assert_eq!(reparsed.loopback.stored_score.unwrap().minor_result, 2);
        assert_eq!(reparsed.game.game_id, "g");
    }

    #[test]
    fn test_render_defaults() {
        let rendered = render(&Config::default()).unwrap();
        let reparsed = Config::parse(&rendered).unwrap();
        assert_eq!(reparsed, Config::default());
    }
}
