use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::keyboard::Layer;

/// Key values per layer. Missing entries read as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    layers: BTreeMap<Layer, BTreeMap<String, String>>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, layer: Layer, code: &str) -> &str {
        self.layers
            .get(&layer)
            .and_then(|keys| keys.get(code))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set(&mut self, layer: Layer, code: impl Into<String>, value: impl Into<String>) {
        self.layers
            .entry(layer)
            .or_default()
            .insert(code.into(), value.into());
    }

    pub fn with(mut self, layer: Layer, code: &str, value: &str) -> Self {
        self.set(layer, code, value);
        self
    }

    /// Every assigned value on `layer`, keyed by code.
    pub fn layer(&self, layer: Layer) -> impl Iterator<Item = (&str, &str)> {
        self.layers
            .get(&layer)
            .into_iter()
            .flat_map(|keys| keys.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Number of assigned values across all layers.
    pub fn len(&self) -> usize {
        self.layers.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// TOML preload
// ---------------------------------------------------------------------------

/// One table per layer name, `code = "value"` entries:
///
/// ```toml
/// [default]
/// E01 = "1"
///
/// [shifted]
/// E01 = "!"
/// ```
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct KeymapFile {
    layers: BTreeMap<String, BTreeMap<String, String>>,
}

/// Parse a keymap from TOML text.
pub fn parse_keymap(content: &str) -> Result<KeyMap> {
    let file: KeymapFile = toml::from_str(content).context("Failed to parse keymap TOML")?;

    let mut keymap = KeyMap::new();
    for (name, keys) in file.layers {
        let layer: Layer = name
            .parse()
            .with_context(|| format!("Invalid layer table [{name}]"))?;
        for (code, value) in keys {
            keymap.set(layer, code.to_ascii_uppercase(), value);
        }
    }
    Ok(keymap)
}

/// Load and parse a keymap file.
pub fn load_keymap(path: &Path) -> Result<KeyMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read keymap file: {}", path.display()))?;
    parse_keymap(&content)
        .with_context(|| format!("Failed to load keymap file: {}", path.display()))
}
