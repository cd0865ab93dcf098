#![forbid(unsafe_code)]

//! Viewer configuration as data.
//!
//! [`ViewerConfig`] gathers every tunable of the viewer into one flat struct
//! that loads from TOML or JSON. Missing fields take their defaults, so an
//! empty document is a valid configuration.
//!
//! ```toml
//! server_url = "ws://127.0.0.1:8764/ws"
//! click_threshold_px = 5.0
//! framing_policy = "reset_on_file_change"
//! ```
//!
//! ```rust,ignore
//! let config = ViewerConfig::from_toml_file("pumlview.toml")?;
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filename::{DEFAULT_PADDING_PX, ELLIPSIS};
use crate::panzoom::{CLICK_THRESHOLD_PX, DEFAULT_MAX_PAN_PX, DEFAULT_ZOOM_SCALE, PanZoomConfig};
use crate::retry::{BackoffStrategy, RetryPolicy};

/// What happens to zoom/pan when the viewer's context changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingPolicy {
    /// Keep the user's framing across new diagrams and reconnects.
    #[default]
    Preserve,
    /// Reset zoom and pan when a diagram for a different file is presented.
    ResetOnFileChange,
    /// Reset zoom and pan when the transport reconnects.
    ResetOnReconnect,
}

/// Top-level viewer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Websocket endpoint of the rendering server.
    pub server_url: String,
    pub click_threshold_px: f64,
    /// Horizontal allowance subtracted from the filename container width.
    pub filename_padding_px: f64,
    pub ellipsis: String,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub zoom_scale: f64,
    pub max_pan_px: f64,
    pub framing_policy: FramingPolicy,
    /// Offset east of UTC for the rendered-at label.
    pub timestamp_utc_offset_minutes: i32,
    /// Placeholder text before the first diagram arrives.
    pub placeholder_text: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8764/ws".to_owned(),
            click_threshold_px: CLICK_THRESHOLD_PX,
            filename_padding_px: DEFAULT_PADDING_PX,
            ellipsis: ELLIPSIS.to_owned(),
            retry_base_ms: 500,
            retry_max_ms: 10_000,
            zoom_scale: DEFAULT_ZOOM_SCALE,
            max_pan_px: DEFAULT_MAX_PAN_PX,
            framing_policy: FramingPolicy::Preserve,
            timestamp_utc_offset_minutes: 0,
            placeholder_text: "Waiting for diagram...".to_owned(),
        }
    }
}

/// Errors that can occur when loading a viewer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl ViewerConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            errors.push(format!(
                "server_url must use ws:// or wss://, got {:?}",
                self.server_url
            ));
        }
        if !self.click_threshold_px.is_finite() || self.click_threshold_px < 0.0 {
            errors.push(format!(
                "click_threshold_px must be finite and >= 0, got {}",
                self.click_threshold_px
            ));
        }
        if !self.filename_padding_px.is_finite() || self.filename_padding_px < 0.0 {
            errors.push(format!(
                "filename_padding_px must be finite and >= 0, got {}",
                self.filename_padding_px
            ));
        }
        if self.ellipsis.is_empty() {
            errors.push("ellipsis must not be empty".into());
        }
        if self.retry_base_ms == 0 {
            errors.push("retry_base_ms must be > 0".into());
        }
        if self.retry_max_ms < self.retry_base_ms {
            errors.push(format!(
                "retry_max_ms ({}) must be >= retry_base_ms ({})",
                self.retry_max_ms, self.retry_base_ms
            ));
        }
        if !self.zoom_scale.is_finite() || self.zoom_scale <= 0.0 {
            errors.push(format!("zoom_scale must be > 0, got {}", self.zoom_scale));
        }
        if !self.max_pan_px.is_finite() || self.max_pan_px <= 0.0 {
            errors.push(format!("max_pan_px must be > 0, got {}", self.max_pan_px));
        }
        // chrono accepts offsets strictly inside one day.
        if self.timestamp_utc_offset_minutes.abs() >= 24 * 60 {
            errors.push(format!(
                "timestamp_utc_offset_minutes must be within (-1440, 1440), got {}",
                self.timestamp_utc_offset_minutes
            ));
        }

        errors
    }

    /// Return `self` if valid, otherwise every validation error.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Reconnect policy: unbounded capped exponential backoff.
    #[must_use]
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::unbounded(BackoffStrategy::Exponential {
            base_ms: self.retry_base_ms,
            max_ms: self.retry_max_ms,
        })
    }

    #[must_use]
    pub fn to_panzoom_config(&self) -> PanZoomConfig {
        PanZoomConfig {
            click_threshold_px: self.click_threshold_px,
            zoom_scale: self.zoom_scale,
            max_pan_px: self.max_pan_px,
        }
    }

    /// One-line JSON summary for startup logs.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        serde_json::json!({
            "schema": "pumlview-config-v1",
            "server_url": self.server_url,
            "click_threshold_px": self.click_threshold_px,
            "filename_padding_px": self.filename_padding_px,
            "retry_base_ms": self.retry_base_ms,
            "retry_max_ms": self.retry_max_ms,
            "zoom_scale": self.zoom_scale,
            "framing_policy": self.framing_policy,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_are_valid() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
        assert_eq!(config.click_threshold_px, 5.0);
        assert_eq!(config.filename_padding_px, 20.0);
        assert_eq!(config.framing_policy, FramingPolicy::Preserve);
    }

    #[test]
    fn empty_documents_take_defaults() {
        assert_eq!(ViewerConfig::from_toml_str("").unwrap(), ViewerConfig::default());
        assert_eq!(ViewerConfig::from_json_str("{}").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = ViewerConfig::from_toml_str(
            r#"
            click_threshold_px = 8.0
            framing_policy = "reset_on_file_change"
            "#,
        )
        .unwrap();
        assert_eq!(config.click_threshold_px, 8.0);
        assert_eq!(config.framing_policy, FramingPolicy::ResetOnFileChange);
        assert_eq!(config.retry_max_ms, 10_000);
    }

    #[test]
    fn json_round_trips_policy() {
        let config =
            ViewerConfig::from_json_str(r#"{"framing_policy":"reset_on_reconnect"}"#).unwrap();
        assert_eq!(config.framing_policy, FramingPolicy::ResetOnReconnect);
    }

    #[test]
    fn parse_errors_are_typed() {
        assert!(matches!(
            ViewerConfig::from_toml_str("click_threshold_px = \"x\""),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            ViewerConfig::from_json_str("{"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            ViewerConfig::from_toml_file("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn validate_catches_bad_values() {
        let config = ViewerConfig {
            server_url: "http://x".into(),
            click_threshold_px: -1.0,
            retry_base_ms: 2_000,
            retry_max_ms: 1_000,
            zoom_scale: 0.0,
            timestamp_utc_offset_minutes: 1_440,
            ..ViewerConfig::default()
        };
        let errors = config.validate();
        for field in [
            "server_url",
            "click_threshold_px",
            "retry_max_ms",
            "zoom_scale",
            "timestamp_utc_offset_minutes",
        ] {
            assert!(errors.iter().any(|e| e.contains(field)), "missing {field}: {errors:?}");
        }
        assert!(matches!(config.validated(), Err(ConfigError::Validation(e)) if e.len() == 5));
    }

    #[test]
    fn loads_from_files() {
        let mut toml_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(toml_file, "max_pan_px = 500.0").unwrap();
        let config = ViewerConfig::from_toml_file(toml_file.path()).unwrap();
        assert_eq!(config.max_pan_px, 500.0);

        let mut json_file = tempfile::NamedTempFile::new().unwrap();
        write!(json_file, r#"{{"ellipsis":"…"}}"#).unwrap();
        let config = ViewerConfig::from_json_file(json_file.path()).unwrap();
        assert_eq!(config.ellipsis, "…");
    }

    #[test]
    fn derived_configs_follow_fields() {
        let config = ViewerConfig {
            retry_base_ms: 100,
            retry_max_ms: 400,
            ..ViewerConfig::default()
        };
        let policy = config.to_retry_policy();
        assert_eq!(policy.max_retries, None);
        assert_eq!(policy.delay(5).as_millis(), 400);
        assert_eq!(config.to_panzoom_config().click_threshold_px, 5.0);
    }

    #[test]
    fn to_jsonl_produces_valid_json() {
        let jsonl = ViewerConfig::default().to_jsonl();
        let value: serde_json::Value = serde_json::from_str(&jsonl).unwrap();
        assert_eq!(value["schema"], "pumlview-config-v1");
        assert_eq!(value["framing_policy"], "preserve");
        assert!(!jsonl.contains('\n'));
    }
}
