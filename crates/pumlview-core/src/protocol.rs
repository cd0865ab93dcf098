#![forbid(unsafe_code)]

//! Inbound websocket frame codec.
//!
//! The rendering server pushes JSON text frames tagged by `type`:
//!
//! ```text
//! {"type":"update","filename":"/a/b.puml","url":"/img/b.png","timestamp":1717000000000}
//! {"type":"update","filename":"/a/b.puml","image":"<base64>","mime":"image/png"}
//! {"type":"status","message":"Starting Docker..."}
//! {"type":"error","message":"Syntax error on line 3","filename":"/a/b.puml"}
//! ```
//!
//! Decoding is total over arbitrary input: every malformed frame maps to a
//! [`ProtocolError`], never a panic. Callers log and drop errors; they never
//! affect connection state.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use thiserror::Error;

/// Maximum accepted text frame size (inline images are base64 in-frame).
pub const MAX_FRAME_BYTES: usize = 32 * 1024 * 1024;

/// Where the diagram image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A URL the host loads (served by the rendering server, or a `data:` URL).
    Url { url: String },
    /// Image bytes delivered inside the frame, with the server's declared
    /// MIME type if it sent one.
    Inline {
        mime: Option<String>,
        bytes: Vec<u8>,
    },
    /// Inline image data that could not be decoded. Presenting it fails.
    Undecodable { reason: String },
}

/// `data:<mime>;base64,<bytes>`.
#[must_use]
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// A diagram delivered by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramPayload {
    /// Source path of the diagram, as reported by the server.
    pub filename: String,
    pub image: ImageSource,
    /// Render time in epoch milliseconds, when the server provides one.
    pub rendered_at_ms: Option<i64>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Diagram(DiagramPayload),
    /// Transient server notice (e.g. container bootstrap progress).
    Notice { message: String },
    /// Server-side render failure.
    RenderError {
        message: String,
        filename: Option<String>,
    },
}

/// Errors produced while decoding an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame too large: {len} bytes (max {MAX_FRAME_BYTES})")]
    FrameTooLarge { len: usize },
    #[error("malformed frame: {0}")]
    Json(String),
    #[error("update frame has an empty filename")]
    EmptyFilename,
    #[error("update frame carries neither `url` nor `image`")]
    MissingImage,
    #[error("update frame carries both `url` and `image`")]
    AmbiguousImage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireFrame {
    Update {
        filename: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        image: Option<String>,
        #[serde(default)]
        mime: Option<String>,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Status {
        message: String,
    },
    Error {
        message: String,
        #[serde(default)]
        filename: Option<String>,
    },
}

/// Decode one text frame.
pub fn decode_frame(text: &str) -> Result<InboundFrame, ProtocolError> {
    if text.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge { len: text.len() });
    }
    let wire: WireFrame =
        serde_json::from_str(text).map_err(|e| ProtocolError::Json(e.to_string()))?;
    match wire {
        WireFrame::Update {
            filename,
            url,
            image,
            mime,
            timestamp,
        } => {
            if filename.trim().is_empty() {
                return Err(ProtocolError::EmptyFilename);
            }
            let image = match (url, image) {
                (Some(_), Some(_)) => return Err(ProtocolError::AmbiguousImage),
                (None, None) => return Err(ProtocolError::MissingImage),
                (Some(url), None) if url.trim().is_empty() => {
                    return Err(ProtocolError::MissingImage);
                }
                (Some(url), None) => ImageSource::Url { url },
                (None, Some(encoded)) => match STANDARD.decode(encoded.trim()) {
                    Ok(bytes) => ImageSource::Inline { mime, bytes },
                    // Still a diagram delivery; the stage reports the failure.
                    Err(err) => ImageSource::Undecodable {
                        reason: err.to_string(),
                    },
                },
            };
            Ok(InboundFrame::Diagram(DiagramPayload {
                filename,
                image,
                rendered_at_ms: timestamp,
            }))
        }
        WireFrame::Status { message } => Ok(InboundFrame::Notice { message }),
        WireFrame::Error { message, filename } => {
            Ok(InboundFrame::RenderError { message, filename })
        }
    }
}
