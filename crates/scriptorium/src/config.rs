use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Character threshold per chunk in the chapter chunk index.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before autosave fires.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    1500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Completion model identifier sent to the API.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7878".to_string()
}

impl Config {
    /// Minimal config for commands that never touch the database
    /// (e.g. `scrib chunk` and `scrib diff` on local files).
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/scriptorium.sqlite"),
            },
            chunking: ChunkingConfig::default(),
            autosave: AutosaveConfig::default(),
            model: ModelConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    if config.autosave.debounce_ms == 0 {
        anyhow::bail!("autosave.debounce_ms must be > 0");
    }

    if config.model.timeout_secs == 0 {
        anyhow::bail!("model.timeout_secs must be > 0");
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scriptorium.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let (_dir, path) = write_config("[db]\npath = \"/tmp/s.sqlite\"\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chunking.max_chars, 2000);
        assert_eq!(cfg.autosave.debounce_ms, 1500);
        assert_eq!(cfg.model.model, "gpt-4.1-mini");
        assert_eq!(cfg.server.bind, "127.0.0.1:7878");
    }

    #[test]
    fn zero_max_chars_is_rejected() {
        let (_dir, path) =
            write_config("[db]\npath = \"/tmp/s.sqlite\"\n\n[chunking]\nmax_chars = 0\n");
        let err = load_config(&path).unwrap_err().to_string();
        assert!(err.contains("max_chars"));
    }

    #[test]
    fn missing_db_section_is_rejected() {
        let (_dir, path) = write_config("[chunking]\nmax_chars = 100\n");
        assert!(load_config(&path).is_err());
    }
}
