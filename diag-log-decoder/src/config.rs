//! Decoder configuration types
//!
//! Minimal configuration consumed by the pipeline. Argument parsing and
//! config-file handling live in the application layer (diag-log-cli);
//! this struct is the contract between the two.

use crate::types::RadioLayer;
use serde::{Deserialize, Serialize};

/// Configuration for the decoding pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Whether to decode generic event reports (0x60)
    #[serde(default = "default_true")]
    pub decode_events: bool,

    /// Whether to decode extended message types (service messaging,
    /// smart-card, phone state, policy stats)
    #[serde(default = "default_true")]
    pub decode_extended: bool,

    /// Optional: only emit radio-layer messages from these layers
    #[serde(default)]
    pub layer_filter: Option<Vec<RadioLayer>>,

    /// Cap on the reassembler's unresolved buffer in bytes
    #[serde(default = "default_max_buffer")]
    pub max_frame_buffer: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_buffer() -> usize {
    crate::framing::DEFAULT_MAX_BUFFER
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            decode_events: true,
            decode_extended: true,
            layer_filter: None,
            max_frame_buffer: default_max_buffer(),
        }
    }
}

impl DecoderConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable event decoding
    pub fn with_events(mut self, enabled: bool) -> Self {
        self.decode_events = enabled;
        self
    }

    /// Builder method: enable or disable extended message decoding
    pub fn with_extended(mut self, enabled: bool) -> Self {
        self.decode_extended = enabled;
        self
    }

    /// Builder method: restrict radio-layer output to the given layers
    pub fn with_layer_filter(mut self, layers: Vec<RadioLayer>) -> Self {
        self.layer_filter = Some(layers);
        self
    }

    /// Builder method: set the reassembler buffer cap
    pub fn with_max_frame_buffer(mut self, bytes: usize) -> Self {
        self.max_frame_buffer = bytes;
        self
    }

    /// Check if a radio layer passes the configured filter
    pub fn should_emit_layer(&self, layer: RadioLayer) -> bool {
        match &self.layer_filter {
            Some(layers) => layers.contains(&layer),
            None => true,
        }
    }
}
