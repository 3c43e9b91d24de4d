use crate::features::DEFAULT_TOKEN_CAP;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_STORAGE_KEY: &str = "pagerel.corpus";
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Single key the whole corpus is stored under.
    pub storage_key: String,
    /// Distinct tokens folded into each page vector.
    pub token_cap: usize,
    /// Results must score strictly above this.
    pub relevance_threshold: f32,
    pub max_results: usize,
    pub stored_text_chars: usize,
    pub snippet_chars: usize,
    /// Largest serialized corpus the store is asked to hold; `None` disables the check.
    pub max_payload_bytes: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            token_cap: DEFAULT_TOKEN_CAP,
            relevance_threshold: 0.3,
            max_results: 5,
            stored_text_chars: 1000,
            snippet_chars: 150,
            max_payload_bytes: Some(DEFAULT_MAX_PAYLOAD_BYTES),
        }
    }
}

impl EngineConfig {
    /// Read a JSON config; missing fields fall back to defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}
