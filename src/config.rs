use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::helpers::EscapeMode;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub prerender: PrerenderConfig,

    #[serde(default = "default_escape")]
    pub escape: EscapeMode,

    #[serde(default)]
    pub compiler: CompilerConfig,

    #[serde(default)]
    pub documents: DocumentConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            prerender: PrerenderConfig::default(),
            escape: default_escape(),
            compiler: CompilerConfig::default(),
            documents: DocumentConfig::default(),
        }
    }
}

// Generated documents are LaTeX, so the tool escapes for LaTeX unless told otherwise.
fn default_escape() -> EscapeMode {
    EscapeMode::Latex
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_capacity() -> usize {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct PrerenderConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for PrerenderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompilerConfig {
    #[serde(default = "default_compiler_command")]
    pub command: String,
    #[serde(default = "default_compiler_args")]
    pub args: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: default_compiler_command(),
            args: default_compiler_args(),
            enabled: default_enabled(),
        }
    }
}

fn default_compiler_command() -> String {
    "pdflatex".to_string()
}

fn default_compiler_args() -> Vec<String> {
    vec![
        "-interaction=nonstopmode".to_string(),
        "-halt-on-error".to_string(),
    ]
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentConfig {
    /// minijinja template for new document titles.
    #[serde(default = "default_title_template")]
    pub title_template: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            title_template: default_title_template(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_title_template() -> String {
    "My {{ template.name }} Resume".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("documents")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}
