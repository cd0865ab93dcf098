#![forbid(unsafe_code)]

//! Image stage: placeholder/image swap and the "ever loaded" flag.
//!
//! Browser image decode is asynchronous, so presentation has two phases:
//! [`ImageStage::present`] validates a payload and hands out a
//! [`PresentTicket`], and the host reports the load result back through
//! [`ImageStage::complete`]. Only the newest ticket can change what is shown.
//!
//! A failed presentation never takes down the last good image and never
//! clears `has_loaded`; it only raises the error indicator, which is separate
//! from the connection status pill.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use thiserror::Error;

use crate::protocol::{DiagramPayload, ImageSource, data_url};

/// Label shown when no rendered-at timestamp is known.
pub const RENDERED_AT_UNKNOWN: &str = "--:--:--";

/// Bytes inspected when looking for an SVG root element.
const SVG_SNIFF_WINDOW: usize = 1024;

/// Image formats the stage accepts for inline payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Svg,
}

impl ImageFormat {
    /// Identify `bytes` by magic number.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(Self::Png);
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        let head = &bytes[..bytes.len().min(SVG_SNIFF_WINDOW)];
        let text = String::from_utf8_lossy(head);
        let text = text.trim_start_matches('\u{feff}').trim_start();
        if (text.starts_with("<svg") || text.starts_with("<?xml") || text.starts_with("<!--"))
            && text.contains("<svg")
        {
            return Some(Self::Svg);
        }
        None
    }

    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Svg => "image/svg+xml",
        }
    }
}

/// Why a payload could not be shown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("inline image is empty")]
    Empty,
    #[error("unrecognized image data ({len} bytes)")]
    UnknownFormat { len: usize },
    #[error("inline image is not valid base64: {0}")]
    InvalidEncoding(String),
    #[error("image failed to load: {0}")]
    LoadFailed(String),
}

/// Handle for one in-flight presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentTicket {
    pub generation: u64,
    /// Value to assign to the image element's `src`.
    pub src: String,
}

/// What a [`ImageStage::complete`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Presented,
    Failed(DecodeError),
    /// The completion belonged to a superseded ticket.
    Stale,
}

#[derive(Debug, Clone)]
struct Presentation {
    generation: u64,
    src: String,
    filename: String,
    rendered_at_ms: Option<i64>,
}

/// Owns the shown image, the pending load, and the error indicator.
#[derive(Debug, Clone)]
pub struct ImageStage {
    has_loaded: bool,
    next_generation: u64,
    pending: Option<Presentation>,
    shown: Option<Presentation>,
    error: Option<String>,
    utc_offset: FixedOffset,
    presented: u64,
    failures: u64,
}

impl Default for ImageStage {
    fn default() -> Self {
        Self::new(Utc.fix())
    }
}

impl ImageStage {
    /// Create a stage that formats rendered-at labels in `utc_offset`.
    #[must_use]
    pub fn new(utc_offset: FixedOffset) -> Self {
        Self {
            has_loaded: false,
            next_generation: 1,
            pending: None,
            shown: None,
            error: None,
            utc_offset,
            presented: 0,
            failures: 0,
        }
    }

    /// Offset in minutes east of UTC; out-of-range values fall back to UTC.
    #[must_use]
    pub fn with_offset_minutes(minutes: i32) -> Self {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self::new(offset)
    }

    /// Whether any presentation has ever succeeded in this session.
    #[inline]
    #[must_use]
    pub const fn has_loaded(&self) -> bool {
        self.has_loaded
    }

    /// Whether a load is waiting for [`ImageStage::complete`].
    #[must_use]
    pub const fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Generation of the pending load, if any.
    #[must_use]
    pub fn pending_generation(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.generation)
    }

    /// `src` of the image currently on screen.
    #[must_use]
    pub fn shown_src(&self) -> Option<&str> {
        self.shown.as_ref().map(|p| p.src.as_str())
    }

    /// Filename of the image currently on screen.
    #[must_use]
    pub fn shown_filename(&self) -> Option<&str> {
        self.shown.as_ref().map(|p| p.filename.as_str())
    }

    /// Error indicator text, distinct from the status pill.
    #[must_use]
    pub fn error_indicator(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub const fn presented(&self) -> u64 {
        self.presented
    }

    #[must_use]
    pub const fn failures(&self) -> u64 {
        self.failures
    }

    /// Validate `payload` and start loading it.
    ///
    /// A validation failure raises the error indicator immediately and keeps
    /// the current image.
    pub fn present(&mut self, payload: &DiagramPayload) -> Result<PresentTicket, DecodeError> {
        let src = match &payload.image {
            ImageSource::Url { url } => url.clone(),
            ImageSource::Inline { mime, bytes } => {
                if bytes.is_empty() {
                    return Err(self.fail(DecodeError::Empty));
                }
                // The sniffed type wins; a declared image type covers formats
                // without a known signature.
                let mime = match (ImageFormat::sniff(bytes), mime.as_deref()) {
                    (Some(format), _) => format.mime(),
                    (None, Some(declared)) if declared.starts_with("image/") => declared,
                    (None, _) => {
                        return Err(self.fail(DecodeError::UnknownFormat { len: bytes.len() }));
                    }
                };
                data_url(mime, bytes)
            }
            ImageSource::Undecodable { reason } => {
                return Err(self.fail(DecodeError::InvalidEncoding(reason.clone())));
            }
        };

        let generation = self.next_generation;
        self.next_generation += 1;
        if let Some(old) = self.pending.replace(Presentation {
            generation,
            src: src.clone(),
            filename: payload.filename.clone(),
            rendered_at_ms: payload.rendered_at_ms,
        }) {
            tracing::debug!(superseded = old.generation, generation, "pending load superseded");
        }
        tracing::debug!(generation, filename = %payload.filename, "image load started");
        Ok(PresentTicket { generation, src })
    }

    /// Report the host's load result for `generation`.
    pub fn complete(&mut self, generation: u64, result: Result<(), String>) -> StageOutcome {
        let Some(pending) = self.pending.take_if(|p| p.generation == generation) else {
            tracing::trace!(generation, "stale image completion ignored");
            return StageOutcome::Stale;
        };
        match result {
            Ok(()) => {
                tracing::info!(
                    generation,
                    filename = %pending.filename,
                    first = !self.has_loaded,
                    "diagram presented"
                );
                self.shown = Some(pending);
                self.has_loaded = true;
                self.error = None;
                self.presented += 1;
                StageOutcome::Presented
            }
            Err(reason) => StageOutcome::Failed(self.fail(DecodeError::LoadFailed(reason))),
        }
    }

    /// Raise the error indicator for a server-side render failure.
    pub fn show_render_error(&mut self, message: &str, filename: Option<&str>) {
        let text = match filename {
            Some(name) => format!("{name}: {message}"),
            None => message.to_owned(),
        };
        tracing::warn!(error = %text, "server render error");
        self.error = Some(text);
    }

    /// `HH:MM:SS` of the shown image's render time, or [`RENDERED_AT_UNKNOWN`].
    #[must_use]
    pub fn rendered_at_label(&self) -> String {
        self.shown
            .as_ref()
            .and_then(|p| p.rendered_at_ms)
            .and_then(DateTime::from_timestamp_millis)
            .map(|at| {
                at.with_timezone(&self.utc_offset)
                    .format("%H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| RENDERED_AT_UNKNOWN.to_owned())
    }

    /// Forget everything shown in this session.
    pub fn reset_session(&mut self) {
        self.has_loaded = false;
        self.pending = None;
        self.shown = None;
        self.error = None;
    }

    fn fail(&mut self, err: DecodeError) -> DecodeError {
        self.failures += 1;
        tracing::warn!(error = %err, has_loaded = self.has_loaded, "image presentation failed");
        self.error = Some(err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn url_payload(name: &str, ts: Option<i64>) -> DiagramPayload {
        DiagramPayload {
            filename: name.into(),
            image: ImageSource::Url {
                url: format!("/img/{name}.png"),
            },
            rendered_at_ms: ts,
        }
    }

    fn inline_payload(bytes: &[u8], mime: Option<&str>) -> DiagramPayload {
        DiagramPayload {
            filename: "inline.puml".into(),
            image: ImageSource::Inline {
                mime: mime.map(str::to_owned),
                bytes: bytes.to_vec(),
            },
            rendered_at_ms: None,
        }
    }

    #[test]
    fn sniffs_known_formats() {
        assert_eq!(ImageFormat::sniff(PNG), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::sniff(b"GIF89a...."), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageFormat::WebP));
        assert_eq!(
            ImageFormat::sniff(b"\xef\xbb\xbf  <?xml version=\"1.0\"?><svg xmlns=\"\">"),
            Some(ImageFormat::Svg)
        );
        assert_eq!(ImageFormat::sniff(b"<svg width=\"1\"/>"), Some(ImageFormat::Svg));
        assert_eq!(ImageFormat::sniff(b"hello world"), None);
        assert_eq!(ImageFormat::sniff(b"<html><body/>"), None);
    }

    #[test]
    fn success_sets_loaded_and_clears_error() {
        let mut stage = ImageStage::default();
        stage.show_render_error("syntax error", None);
        let ticket = stage.present(&url_payload("a", None)).unwrap();
        assert!(!stage.has_loaded());
        assert!(stage.in_flight());

        assert_eq!(stage.complete(ticket.generation, Ok(())), StageOutcome::Presented);
        assert!(stage.has_loaded());
        assert_eq!(stage.shown_src(), Some("/img/a.png"));
        assert_eq!(stage.error_indicator(), None);
    }

    #[test]
    fn failure_keeps_previous_image() {
        let mut stage = ImageStage::default();
        let t = stage.present(&url_payload("good", None)).unwrap();
        stage.complete(t.generation, Ok(()));

        let t = stage.present(&url_payload("bad", None)).unwrap();
        let outcome = stage.complete(t.generation, Err("decode error".into()));
        assert!(matches!(outcome, StageOutcome::Failed(DecodeError::LoadFailed(_))));
        assert!(stage.has_loaded());
        assert_eq!(stage.shown_filename(), Some("good"));
        assert!(stage.error_indicator().unwrap().contains("decode error"));
    }

    #[test]
    fn failure_before_first_load_leaves_flag_false() {
        let mut stage = ImageStage::default();
        let err = stage.present(&inline_payload(b"garbage", None)).unwrap_err();
        assert_eq!(err, DecodeError::UnknownFormat { len: 7 });
        assert!(!stage.has_loaded());
        assert!(stage.shown_src().is_none());
        assert!(stage.error_indicator().is_some());
        assert_eq!(stage.failures(), 1);

        assert_eq!(
            stage.present(&inline_payload(b"", None)).unwrap_err(),
            DecodeError::Empty
        );
    }

    #[test]
    fn inline_uses_sniffed_mime() {
        let mut stage = ImageStage::default();
        let ticket = stage.present(&inline_payload(PNG, Some("image/jpeg"))).unwrap();
        assert!(ticket.src.starts_with("data:image/png;base64,"), "{}", ticket.src);

        let ticket = stage.present(&inline_payload(PNG, None)).unwrap();
        assert!(ticket.src.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn declared_mime_covers_unsniffable_bytes() {
        let mut stage = ImageStage::default();
        let ticket = stage
            .present(&inline_payload(b"\0\0\0\x0cjP  ", Some("image/jp2")))
            .unwrap();
        assert!(ticket.src.starts_with("data:image/jp2;base64,"), "{}", ticket.src);

        let err = stage
            .present(&inline_payload(b"hello", Some("text/plain")))
            .unwrap_err();
        assert_eq!(err, DecodeError::UnknownFormat { len: 5 });
    }

    #[test]
    fn undecodable_inline_data_raises_indicator() {
        let mut stage = ImageStage::default();
        let payload = DiagramPayload {
            filename: "a.puml".into(),
            image: ImageSource::Undecodable {
                reason: "Invalid symbol 33, offset 0.".into(),
            },
            rendered_at_ms: None,
        };
        let err = stage.present(&payload).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEncoding(_)));
        assert!(!stage.in_flight());
        assert!(stage.error_indicator().unwrap().contains("base64"));
        assert_eq!(stage.failures(), 1);
    }

    #[test]
    fn stale_completions_are_ignored() {
        let mut stage = ImageStage::default();
        let first = stage.present(&url_payload("a", None)).unwrap();
        let second = stage.present(&url_payload("b", None)).unwrap();
        assert!(second.generation > first.generation);

        assert_eq!(stage.complete(first.generation, Ok(())), StageOutcome::Stale);
        assert!(!stage.has_loaded());
        assert_eq!(stage.complete(second.generation, Ok(())), StageOutcome::Presented);
        assert_eq!(stage.shown_filename(), Some("b"));
        assert_eq!(stage.complete(second.generation, Ok(())), StageOutcome::Stale);
    }

    #[test]
    fn rendered_at_label_uses_offset() {
        // 2024-05-29T16:26:40Z
        let ts = 1_717_000_000_000;
        let mut stage = ImageStage::default();
        assert_eq!(stage.rendered_at_label(), RENDERED_AT_UNKNOWN);
        let t = stage.present(&url_payload("a", Some(ts))).unwrap();
        stage.complete(t.generation, Ok(()));
        assert_eq!(stage.rendered_at_label(), "16:26:40");

        let mut stage = ImageStage::with_offset_minutes(120);
        let t = stage.present(&url_payload("a", Some(ts))).unwrap();
        stage.complete(t.generation, Ok(()));
        assert_eq!(stage.rendered_at_label(), "18:26:40");

        let t = stage.present(&url_payload("b", None)).unwrap();
        stage.complete(t.generation, Ok(()));
        assert_eq!(stage.rendered_at_label(), RENDERED_AT_UNKNOWN);
    }

    #[test]
    fn render_error_mentions_filename() {
        let mut stage = ImageStage::default();
        stage.show_render_error("line 3", Some("a.puml"));
        assert_eq!(stage.error_indicator(), Some("a.puml: line 3"));
    }

    #[test]
    fn reset_session_clears_flag() {
        let mut stage = ImageStage::default();
        let t = stage.present(&url_payload("a", None)).unwrap();
        stage.complete(t.generation, Ok(()));
        stage.reset_session();
        assert!(!stage.has_loaded());
        assert!(stage.shown_src().is_none());
    }
}
