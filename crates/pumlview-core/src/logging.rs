#![forbid(unsafe_code)]

//! Logging setup.
//!
//! Every component emits `tracing` events with structured fields; this
//! module only installs a subscriber for native hosts. `init_logging` exists when
//! the `tracing-subscriber` feature is enabled. Without a subscriber the
//! events cost nothing.
//!
//! Targets worth filtering on:
//!
//! | target | events |
//! |---|---|
//! | `pumlview_core::connection` | lifecycle transitions, retries, dropped frames |
//! | `pumlview_core::stage` | presentations, load failures, render errors |
//! | `pumlview_core::filename` | immediate/deferred renders, coalescing |
//! | `pumlview_core::panzoom` | mode toggles, drag start/end |
//! | `pumlview_core::viewer` | host event spans |

/// Output format for [`init_logging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, one line per event.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parse `"json"` / `"compact"` (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "jsonl" => Some(Self::Json),
            "compact" | "text" | "" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Default filter when neither `RUST_LOG` nor an explicit filter is given.
pub const DEFAULT_FILTER: &str = "pumlview_core=info,pumlview_web=info";

/// Install a global subscriber writing to stderr.
///
/// `filter` uses `EnvFilter` syntax; `None` reads `RUST_LOG` and falls back
/// to [`DEFAULT_FILTER`]. Returns an error if a global subscriber is already
/// set or the filter does not parse.
#[cfg(feature = "tracing-subscriber")]
pub fn init_logging(
    filter: Option<&str>,
    format: LogFormat,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::EnvFilter;

    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" compact "), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse(""), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
