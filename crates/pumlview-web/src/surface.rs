#![forbid(unsafe_code)]

//! DOM patches for a [`SurfaceSnapshot`].
//!
//! The page is a fixed set of elements addressed by id. [`diff`] compares two
//! snapshots and emits the minimal list of [`DomPatch`] operations needed to
//! bring the page from `prev` to `next`. With no previous snapshot every
//! element is written once.

use pumlview_core::SurfaceSnapshot;
use serde::Serialize;

/// An element of the viewer page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomNode {
    StatusText,
    StatusPill,
    Placeholder,
    Image,
    Board,
    Filename,
    RenderedAt,
    ServerUrl,
    ErrorIndicator,
}

impl DomNode {
    /// Element id in the page markup.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::StatusText => "status-text",
            Self::StatusPill => "status",
            Self::Placeholder => "ph",
            Self::Image => "img",
            Self::Board => "board",
            Self::Filename => "file",
            Self::RenderedAt => "rendered-at",
            Self::ServerUrl => "server-url",
            Self::ErrorIndicator => "render-error",
        }
    }
}

/// One DOM mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DomPatch {
    SetText { node: DomNode, text: String },
    SetClass { node: DomNode, class: String },
    SetVisible { node: DomNode, visible: bool },
    SetImageSrc { src: String },
    /// `None` clears the inline transform.
    SetTransform { transform: Option<String> },
    SetCursor { cursor: String },
}

impl DomPatch {
    /// The element this patch writes to.
    #[must_use]
    pub const fn node(&self) -> DomNode {
        match self {
            Self::SetText { node, .. } | Self::SetClass { node, .. } | Self::SetVisible { node, .. } => {
                *node
            }
            Self::SetImageSrc { .. } => DomNode::Image,
            Self::SetTransform { .. } | Self::SetCursor { .. } => DomNode::Board,
        }
    }
}

/// Patches that turn `prev` into `next`.
#[must_use]
pub fn diff(prev: Option<&SurfaceSnapshot>, next: &SurfaceSnapshot) -> Vec<DomPatch> {
    let mut out = Vec::new();

    macro_rules! changed {
        ($field:ident) => {
            prev.is_none_or(|p| p.$field != next.$field)
        };
    }

    let text = |out: &mut Vec<DomPatch>, node, text: &str| {
        out.push(DomPatch::SetText {
            node,
            text: text.to_owned(),
        });
    };

    if changed!(status_text) {
        text(&mut out, DomNode::StatusText, &next.status_text);
    }
    if changed!(status_class) {
        out.push(DomPatch::SetClass {
            node: DomNode::StatusPill,
            class: next.status_class.clone(),
        });
    }
    if changed!(placeholder_text) {
        text(&mut out, DomNode::Placeholder, &next.placeholder_text);
    }
    if changed!(placeholder_visible) {
        out.push(DomPatch::SetVisible {
            node: DomNode::Placeholder,
            visible: next.placeholder_visible,
        });
    }
    // The source is written before the image is revealed.
    if changed!(image_src)
        && let Some(src) = &next.image_src
    {
        out.push(DomPatch::SetImageSrc { src: src.clone() });
    }
    if changed!(image_visible) {
        out.push(DomPatch::SetVisible {
            node: DomNode::Image,
            visible: next.image_visible,
        });
    }
    if changed!(filename_label) {
        text(&mut out, DomNode::Filename, &next.filename_label);
    }
    if changed!(rendered_at_label) {
        text(&mut out, DomNode::RenderedAt, &next.rendered_at_label);
    }
    if changed!(server_url_label) {
        text(&mut out, DomNode::ServerUrl, &next.server_url_label);
    }
    if changed!(board_class) {
        out.push(DomPatch::SetClass {
            node: DomNode::Board,
            class: next.board_class.clone(),
        });
    }
    if changed!(cursor) {
        out.push(DomPatch::SetCursor {
            cursor: next.cursor.clone(),
        });
    }
    if changed!(transform) {
        out.push(DomPatch::SetTransform {
            transform: next.transform.clone(),
        });
    }
    if changed!(error_indicator) {
        let message = next.error_indicator.clone().unwrap_or_default();
        text(&mut out, DomNode::ErrorIndicator, &message);
        out.push(DomPatch::SetVisible {
            node: DomNode::ErrorIndicator,
            visible: next.error_indicator.is_some(),
        });
    }

    out
}
