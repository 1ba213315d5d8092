use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory under which each project gets its own files directory.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Upload bytes are written to disk in blocks of this size.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_content_types: default_allowed_content_types(),
            max_file_size_mb: default_max_file_size_mb(),
            block_size: default_block_size(),
        }
    }
}

fn default_allowed_content_types() -> Vec<String> {
    vec!["text/plain".to_string(), "application/pdf".to_string()]
}
fn default_max_file_size_mb() -> u64 {
    10
}
fn default_block_size() -> usize {
    512_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub default_chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub default_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            default_chunk_size: default_chunk_size(),
            default_overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate upload limits
    if config.upload.allowed_content_types.is_empty() {
        anyhow::bail!("upload.allowed_content_types must not be empty");
    }
    if config.upload.max_file_size_mb == 0 {
        anyhow::bail!("upload.max_file_size_mb must be > 0");
    }
    if config.upload.block_size == 0 {
        anyhow::bail!("upload.block_size must be > 0");
    }

    // Validate chunking
    if config.chunking.default_chunk_size == 0 {
        anyhow::bail!("chunking.default_chunk_size must be > 0");
    }
    if config.chunking.default_overlap >= config.chunking.default_chunk_size {
        anyhow::bail!(
            "chunking.default_overlap ({}) must be smaller than chunking.default_chunk_size ({})",
            config.chunking.default_overlap,
            config.chunking.default_chunk_size
        );
    }

    Ok(config)
}
