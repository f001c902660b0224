//! Configuration loading and parsing

use anyhow::{Context, Result};
use diag_log_decoder::RadioLayer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub decode: DecodeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    /// Dump files to decode, in order
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Read the live stream from stdin
    #[serde(default)]
    pub live_stdin: bool,
    /// Connect to a live TCP forwarder on this port
    #[serde(default)]
    pub live_tcp: Option<u16>,
    #[serde(default = "default_host")]
    pub live_host: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            live_stdin: false,
            live_tcp: None,
            live_host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    pub txt_file: Option<PathBuf>,
    pub json_file: Option<PathBuf>,
    pub pcap_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecodeConfig {
    /// Decode generic event reports
    #[serde(default = "default_true")]
    pub events: bool,
    /// Decode extended message types (QMI, APDU, phone state, policy)
    #[serde(default = "default_true")]
    pub msgs: bool,
    /// Only emit radio-layer messages from these layers
    #[serde(default)]
    pub layers: Option<Vec<RadioLayer>>,
    /// Reassembly buffer cap in bytes
    #[serde(default)]
    pub max_frame_buffer: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            events: true,
            msgs: true,
            layers: None,
            max_frame_buffer: None,
        }
    }
}

/// Load and parse a TOML configuration file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
