use std::env;

/// Runtime knobs for a running loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Recorded on the loop's tracing span.
    pub name: String,
    /// Log every applied event at debug level.
    pub trace_events: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            name: "feedback".to_string(),
            trace_events: false,
        }
    }
}

impl LoopConfig {
    /// Load from `FEEDBACK_LOOP_NAME` and `FEEDBACK_TRACE_EVENTS`, falling
    /// back to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: env::var("FEEDBACK_LOOP_NAME").unwrap_or(defaults.name),
            trace_events: env::var("FEEDBACK_TRACE_EVENTS")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.trace_events),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_trace_events(mut self, trace_events: bool) -> Self {
        self.trace_events = trace_events;
        self
    }
}

/// Accepts the usual spellings of a boolean environment flag.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = LoopConfig::default()
            .with_name("keyboard")
            .with_trace_events(true);
        assert_eq!(config.name, "keyboard");
        assert!(config.trace_events);
    }

    #[test]
    fn flags_parse_common_spellings() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
