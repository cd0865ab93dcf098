#![forbid(unsafe_code)]

//! Width-bounded filename rendering with layout-timing-correct scheduling.
//!
//! [`truncate_filename`] keeps the *tail* of a path: when the full filename
//! does not fit, the result is the ellipsis followed by the longest suffix
//! that fits. The basename is the last thing to go.
//!
//! [`FilenameDisplay`] wraps the pure function with two entry points:
//!
//! - **immediate** ([`FilenameDisplay::render_immediate`]): uses whatever
//!   container width the host can query right now, which may be stale.
//! - **deferred** ([`FilenameDisplay::request_deferred`] followed by
//!   [`FilenameDisplay::on_animation_frame`]): waits for the next
//!   animation-frame callback, then recomputes from the filename and width
//!   current *at callback time*.
//!
//! # Invariants
//!
//! 1. The result is either the exact filename or `ellipsis + proper suffix`.
//! 2. A truncated result fits the available width (unless even the bare
//!    ellipsis does not fit, in which case the bare ellipsis is returned).
//! 3. Suffixes start on grapheme boundaries, so combining marks and emoji
//!    sequences are never split.
//! 4. At most one animation-frame request is outstanding; repeated triggers
//!    coalesce into it.
//! 5. Immediate and deferred modes call the same function, so they agree once
//!    the width is stable.
//!
//! # Failure Modes
//!
//! - Metrics unavailable (`measure` returns `None`): the unmodified filename
//!   is displayed.
//! - Container width unavailable, zero, or non-finite (not laid out yet): the
//!   unmodified filename is displayed until a deferred pass sees a real width.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Default ellipsis marker.
pub const ELLIPSIS: &str = "...";

/// Default horizontal padding allowance subtracted from the container width.
pub const DEFAULT_PADDING_PX: f64 = 20.0;

/// Font metrics used to measure rendered text width.
///
/// Implementations must use the same font as the filename label. The browser
/// host backs this with `CanvasRenderingContext2d::measureText`.
pub trait TextMeasure {
    /// Rendered width of `text` in CSS pixels, or `None` if metrics are
    /// unavailable.
    fn measure(&self, text: &str) -> Option<f64>;
}

impl<F> TextMeasure for F
where
    F: Fn(&str) -> Option<f64>,
{
    fn measure(&self, text: &str) -> Option<f64> {
        self(text)
    }
}

/// Source of the filename container's current width.
///
/// Queried at the moment a render runs, never cached across frames. `None`
/// means layout information is unavailable.
pub trait ContainerLayout {
    fn container_width(&self) -> Option<f64>;
}

impl ContainerLayout for Option<f64> {
    fn container_width(&self) -> Option<f64> {
        *self
    }
}

impl ContainerLayout for f64 {
    fn container_width(&self) -> Option<f64> {
        Some(*self)
    }
}

/// Monospace approximation: terminal cell width times a fixed advance.
///
/// Used by native hosts and tests; wide (CJK) glyphs count as two cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMeasure {
    pub advance_px: f64,
}

impl CellMeasure {
    #[must_use]
    pub const fn new(advance_px: f64) -> Self {
        Self { advance_px }
    }
}

impl TextMeasure for CellMeasure {
    fn measure(&self, text: &str) -> Option<f64> {
        if !self.advance_px.is_finite() || self.advance_px < 0.0 {
            return None;
        }
        Some(text.width() as f64 * self.advance_px)
    }
}

/// Render `filename` into at most `available_px` of width.
///
/// Returns `filename` unchanged if it fits (or if it cannot be measured),
/// otherwise `ellipsis` followed by the longest suffix that fits.
#[must_use]
pub fn truncate_filename(
    filename: &str,
    available_px: f64,
    ellipsis: &str,
    measure: &dyn TextMeasure,
) -> String {
    if available_px.is_nan() {
        return filename.to_owned();
    }
    let available = available_px.max(0.0);

    let Some(full) = measure.measure(filename).filter(|w| w.is_finite()) else {
        return filename.to_owned();
    };
    if full <= available {
        return filename.to_owned();
    }

    // Proper suffixes start at every grapheme boundary after the first.
    let starts: Vec<usize> = filename
        .grapheme_indices(true)
        .map(|(idx, _)| idx)
        .filter(|&idx| idx > 0)
        .collect();

    let mut candidate = String::with_capacity(ellipsis.len() + filename.len());
    let mut fits = |start: usize| -> Option<bool> {
        candidate.clear();
        candidate.push_str(ellipsis);
        candidate.push_str(&filename[start..]);
        measure
            .measure(&candidate)
            .filter(|w| w.is_finite())
            .map(|w| w <= available)
    };

    // Longer suffixes come first; under a monotone measure the fitting
    // candidates form a tail of `starts`.
    let mut lo = 0;
    let mut hi = starts.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match fits(starts[mid]) {
            Some(true) => hi = mid,
            Some(false) => lo = mid + 1,
            None => return filename.to_owned(),
        }
    }
    // Kerning can make the measure slightly non-monotone; walk forward until
    // the candidate really fits.
    for &start in &starts[lo..] {
        match fits(start) {
            Some(true) => return format!("{ellipsis}{}", &filename[start..]),
            Some(false) => {}
            None => return filename.to_owned(),
        }
    }
    ellipsis.to_owned()
}

/// Reactive filename label with immediate and deferred computation modes.
#[derive(Debug, Clone)]
pub struct FilenameDisplay {
    padding_px: f64,
    ellipsis: String,
    displayed: String,
    frame_pending: bool,
    deferred_runs: u64,
    coalesced_requests: u64,
}

impl Default for FilenameDisplay {
    fn default() -> Self {
        Self::new(DEFAULT_PADDING_PX, ELLIPSIS)
    }
}

impl FilenameDisplay {
    /// Create a display with a padding allowance and ellipsis marker.
    #[must_use]
    pub fn new(padding_px: f64, ellipsis: impl Into<String>) -> Self {
        Self {
            padding_px: if padding_px.is_finite() {
                padding_px.max(0.0)
            } else {
                DEFAULT_PADDING_PX
            },
            ellipsis: ellipsis.into(),
            displayed: String::new(),
            frame_pending: false,
            deferred_runs: 0,
            coalesced_requests: 0,
        }
    }

    /// The string currently shown in the label.
    #[must_use]
    pub fn displayed(&self) -> &str {
        &self.displayed
    }

    /// Whether a deferred recomputation is waiting for an animation frame.
    #[inline]
    #[must_use]
    pub const fn is_frame_pending(&self) -> bool {
        self.frame_pending
    }

    /// Number of deferred recomputations that have run.
    #[must_use]
    pub const fn deferred_runs(&self) -> u64 {
        self.deferred_runs
    }

    /// Number of deferred requests merged into an already pending frame.
    #[must_use]
    pub const fn coalesced_requests(&self) -> u64 {
        self.coalesced_requests
    }

    /// Pure render: the label text for `filename` in a container of
    /// `container_width_px`, after subtracting the padding allowance.
    #[must_use]
    pub fn render(
        &self,
        filename: &str,
        container_width_px: Option<f64>,
        measure: &dyn TextMeasure,
    ) -> String {
        match container_width_px.filter(|w| w.is_finite() && *w > 0.0) {
            Some(width) => {
                truncate_filename(filename, width - self.padding_px, &self.ellipsis, measure)
            }
            None => filename.to_owned(),
        }
    }

    /// Immediate mode: recompute now from a possibly stale width.
    pub fn render_immediate(
        &mut self,
        filename: &str,
        container_width_px: Option<f64>,
        measure: &dyn TextMeasure,
    ) -> &str {
        self.displayed = self.render(filename, container_width_px, measure);
        tracing::trace!(
            filename,
            width = ?container_width_px,
            displayed = %self.displayed,
            "filename immediate render"
        );
        &self.displayed
    }

    /// Deferred mode, first half: ask for the next animation frame.
    ///
    /// Returns `true` if the host must issue a new frame request, `false` if
    /// one is already outstanding (the trigger coalesces into it).
    pub fn request_deferred(&mut self) -> bool {
        if self.frame_pending {
            self.coalesced_requests += 1;
            tracing::trace!(
                coalesced = self.coalesced_requests,
                "filename deferred request coalesced"
            );
            return false;
        }
        self.frame_pending = true;
        true
    }

    /// Deferred mode, second half: the animation frame fired.
    ///
    /// Recomputes from the `filename` and width passed in *now*, which the
    /// caller reads from current state. Returns `None` for a frame nobody
    /// asked for.
    pub fn on_animation_frame(
        &mut self,
        filename: &str,
        container_width_px: Option<f64>,
        measure: &dyn TextMeasure,
    ) -> Option<&str> {
        if !self.frame_pending {
            return None;
        }
        self.frame_pending = false;
        self.deferred_runs += 1;
        self.displayed = self.render(filename, container_width_px, measure);
        tracing::debug!(
            filename,
            width = ?container_width_px,
            displayed = %self.displayed,
            "filename deferred render"
        );
        Some(&self.displayed)
    }
}
