use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use feedback_loop::config::parse_flag;
use feedback_loop::LoopConfig;
use tracing::info;

use crate::keyboard::Layout;
use crate::keymap::{load_keymap, KeyMap};

/// Editor configuration loaded from environment variables.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub layout: Layout,
    /// Optional TOML keymap loaded at startup.
    pub keymap_path: Option<PathBuf>,
    pub trace_events: bool,
}

impl Config {
    /// Load from `KBDEDIT_LAYOUT`, `KBDEDIT_KEYMAP` and `KBDEDIT_TRACE_EVENTS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let layout = match lookup("KBDEDIT_LAYOUT") {
            Some(value) => value.parse().context("Invalid KBDEDIT_LAYOUT")?,
            None => Layout::default(),
        };
        let trace_events = match lookup("KBDEDIT_TRACE_EVENTS") {
            Some(value) => parse_flag(&value)
                .with_context(|| format!("Invalid KBDEDIT_TRACE_EVENTS: {value}"))?,
            None => false,
        };

        Ok(Self {
            layout,
            keymap_path: lookup("KBDEDIT_KEYMAP")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            trace_events,
        })
    }

    /// Loop settings for the editor, on top of any `FEEDBACK_*` overrides.
    pub fn loop_config(&self) -> LoopConfig {
        let config = LoopConfig::from_env().with_name("kbdedit");
        let trace_events = config.trace_events || self.trace_events;
        config.with_trace_events(trace_events)
    }

    /// The keymap to start from: the configured file, or an empty map.
    pub fn initial_keymap(&self) -> Result<KeyMap> {
        match &self.keymap_path {
            Some(path) => load_keymap(path),
            None => Ok(KeyMap::new()),
        }
    }

    /// Log the effective configuration. Only the keymap's file name is
    /// shown, never its full path.
    pub fn log_redacted(&self) {
        let keymap = self
            .keymap_path
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "(none)".to_string());
        info!(
            layout = %self.layout,
            keymap = %keymap,
            trace_events = self.trace_events,
            "Configuration loaded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.layout, Layout::Iso);
        assert!(config.keymap_path.is_none());
        assert!(!config.trace_events);
        assert!(config.initial_keymap().unwrap().is_empty());
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            ("KBDEDIT_LAYOUT", "ansi"),
            ("KBDEDIT_KEYMAP", "/tmp/keys.toml"),
            ("KBDEDIT_TRACE_EVENTS", "yes"),
        ]))
        .unwrap();
        assert_eq!(config.layout, Layout::Ansi);
        assert_eq!(config.keymap_path, Some(PathBuf::from("/tmp/keys.toml")));
        assert!(config.trace_events);
    }

    #[test]
    fn rejects_unknown_layout() {
        let err = Config::from_lookup(lookup(&[("KBDEDIT_LAYOUT", "dvorak")])).unwrap_err();
        assert!(format!("{err:#}").contains("Unknown keyboard layout: dvorak"));
    }

    #[test]
    fn missing_keymap_file_is_an_error() {
        let config = Config {
            keymap_path: Some(PathBuf::from("/nonexistent/kbdedit/keys.toml")),
            ..Config::default()
        };
        let err = config.initial_keymap().unwrap_err();
        assert!(err.to_string().contains("Failed to read keymap file"));
    }
}
