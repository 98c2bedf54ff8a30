//! Application configuration.
//!
//! Loaded from `$XDG_CONFIG_HOME/i3grp/config.json`.  Every field is
//! optional — a minimal `{}` file is valid and all sections fall back to
//! their compiled-in defaults.
//!
//! # Example
//!
//! ```json
//! {
//!   "renumber_workspaces": false,
//!   "icons": {
//!     "delimiter": " ",
//!     "default_icon": "?",
//!     "min_duplicates_count": 3,
//!     "rules": [
//!       { "match": "firefox", "icon": "F" },
//!       { "match": "terminal", "icon": ">" }
//!     ]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Compact every group into the lowest free workspace numbers when
    /// reorganizing, instead of keeping existing numbers where possible.
    #[serde(default)]
    pub renumber_workspaces: bool,

    /// Window-icon display settings for `list-workspaces`.
    #[serde(default)]
    pub icons: IconsConfig,
}

/// Settings for rendering the `window_icons` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IconsConfig {
    /// String placed between icons.
    pub delimiter: String,
    /// Icon used when no rule matches a window.
    pub default_icon: String,
    /// From this many windows with the same icon on, collapse them into a
    /// `Nx` count.
    pub min_duplicates_count: usize,
    /// First matching rule wins.
    pub rules: Vec<IconRule>,
}

/// A single icon rule: a case-insensitive substring matched against
/// window titles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconRule {
    #[serde(rename = "match")]
    pub matcher: String,
    pub icon: String,
}

impl Default for IconsConfig {
    fn default() -> Self {
        Self {
            delimiter: " ".to_string(),
            default_icon: "?".to_string(),
            min_duplicates_count: 3,
            rules: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_full_config() {
        let json = r#"{
            "renumber_workspaces": true,
            "icons": {
                "delimiter": " | ",
                "default_icon": "*",
                "min_duplicates_count": 2,
                "rules": [{ "match": "firefox", "icon": "F" }]
            }
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert!(cfg.renumber_workspaces);
        assert_eq!(cfg.icons.delimiter, " | ");
        assert_eq!(cfg.icons.default_icon, "*");
        assert_eq!(cfg.icons.min_duplicates_count, 2);
        assert_eq!(cfg.icons.rules.len(), 1);
        assert_eq!(cfg.icons.rules[0].matcher, "firefox");
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert!(!cfg.renumber_workspaces);
        let defaults = IconsConfig::default();
        assert_eq!(cfg.icons.delimiter, defaults.delimiter);
        assert_eq!(cfg.icons.default_icon, defaults.default_icon);
        assert_eq!(cfg.icons.min_duplicates_count, defaults.min_duplicates_count);
        assert!(cfg.icons.rules.is_empty());
    }

    #[test]
    fn deserialize_partial_icons() {
        let json = r#"{ "icons": { "default_icon": "+" } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.icons.default_icon, "+");
        assert_eq!(cfg.icons.delimiter, IconsConfig::default().delimiter);
    }

    #[test]
    fn unknown_top_level_keys_ignored() {
        let json = r#"{ "icons": {}, "future_section": { "key": 42 } }"#;
        // Should not fail — unknown keys are silently ignored.
        let _cfg: Config = serde_json::from_str(json).unwrap();
    }
}
