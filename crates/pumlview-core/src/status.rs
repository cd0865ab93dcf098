#![forbid(unsafe_code)]

//! Status pill projection.
//!
//! [`project_status`] is a pure function of the connection state and the
//! freshness flag. It is the only place that decides the pill's text, so the
//! `"Live"` rule lives in exactly one match arm.
//!
//! # Invariants
//!
//! 1. Text is `"Live"` iff connected and a diagram has loaded.
//! 2. Text is `"Connected"` iff connected and nothing has loaded yet.
//! 3. Exactly one of placeholder / image is visible.

use serde::Serialize;

use crate::connection::ConnectionState;

pub const TEXT_CONNECTING: &str = "Connecting...";
pub const TEXT_CONNECTED: &str = "Connected";
pub const TEXT_LIVE: &str = "Live";
pub const TEXT_RECONNECTING: &str = "Reconnecting...";

/// Visual style of the status pill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusStyle {
    Neutral,
    Ok,
    Warn,
    Error,
}

impl StatusStyle {
    /// CSS class carried by the pill (in addition to the base `status` class).
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Projected pill text, style, and stage visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub text: String,
    pub style: StatusStyle,
    pub placeholder_visible: bool,
    pub image_visible: bool,
}

impl StatusView {
    /// Full class attribute for the pill element, e.g. `"status ok"`.
    #[must_use]
    pub fn class_attr(&self) -> String {
        format!("status {}", self.style.css_class())
    }
}

/// Project `(connection, has_loaded_diagram)` into the displayed status.
#[must_use]
pub fn project_status(connection: &ConnectionState, has_loaded_diagram: bool) -> StatusView {
    let (text, style) = match connection {
        ConnectionState::Connecting => (TEXT_CONNECTING.to_owned(), StatusStyle::Neutral),
        ConnectionState::Connected if has_loaded_diagram => {
            (TEXT_LIVE.to_owned(), StatusStyle::Ok)
        }
        ConnectionState::Connected => (TEXT_CONNECTED.to_owned(), StatusStyle::Ok),
        ConnectionState::Reconnecting => (TEXT_RECONNECTING.to_owned(), StatusStyle::Warn),
        ConnectionState::Error(reason) => (reason.clone(), StatusStyle::Error),
    };
    StatusView {
        text,
        style,
        placeholder_visible: !has_loaded_diagram,
        image_visible: has_loaded_diagram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_states() -> Vec<ConnectionState> {
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Error("socket refused".into()),
        ]
    }

    #[test]
    fn table_matches_projection() {
        let cases = [
            (ConnectionState::Connecting, false, "Connecting...", StatusStyle::Neutral),
            (ConnectionState::Connecting, true, "Connecting...", StatusStyle::Neutral),
            (ConnectionState::Connected, false, "Connected", StatusStyle::Ok),
            (ConnectionState::Connected, true, "Live", StatusStyle::Ok),
            (ConnectionState::Reconnecting, false, "Reconnecting...", StatusStyle::Warn),
            (ConnectionState::Reconnecting, true, "Reconnecting...", StatusStyle::Warn),
            (ConnectionState::Error("boom".into()), true, "boom", StatusStyle::Error),
        ];
        for (state, loaded, text, style) in cases {
            let view = project_status(&state, loaded);
            assert_eq!(view.text, text, "{state:?} loaded={loaded}");
            assert_eq!(view.style, style, "{state:?} loaded={loaded}");
        }
    }

    #[test]
    fn live_only_when_connected_and_loaded() {
        for state in all_states() {
            for loaded in [false, true] {
                let view = project_status(&state, loaded);
                let expect_live = loaded && state == ConnectionState::Connected;
                assert_eq!(view.text == TEXT_LIVE, expect_live, "{state:?} {loaded}");
            }
        }
    }

    #[test]
    fn placeholder_and_image_are_exclusive() {
        for state in all_states() {
            for loaded in [false, true] {
                let view = project_status(&state, loaded);
                assert_ne!(view.placeholder_visible, view.image_visible);
                assert_eq!(view.image_visible, loaded);
            }
        }
    }

    #[test]
    fn class_attr_carries_style() {
        let view = project_status(&ConnectionState::Connected, false);
        assert_eq!(view.class_attr(), "status ok");
        assert!(view.class_attr().contains("ok"));
    }
}
