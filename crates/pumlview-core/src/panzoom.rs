#![forbid(unsafe_code)]

//! Click-vs-drag discrimination driving zoom-pan mode.
//!
//! [`PanZoomController`] turns pointer lifecycle signals on the diagram board
//! into two effects: a click toggles zoom-pan mode, a drag translates the
//! image. The gesture is an explicit tagged state ([`GestureState`]) so the
//! threshold boundary is a single comparison.
//!
//! # Invariants
//!
//! 1. A pointer-down → pointer-up whose displacement never exceeded the click
//!    threshold toggles zoom exactly once; a gesture that crossed it never
//!    toggles.
//! 2. The threshold is inclusive: displacement equal to it is still a click.
//! 3. Pan components are always finite and clamped to `±max_pan_px`.
//! 4. Zoom is never active while the controller is disabled (no diagram has
//!    loaded).
//! 5. One active pointer at a time; capture is requested on pointer-down and
//!    released when the gesture ends.
//!
//! # Failure Modes
//!
//! - Non-finite pointer coordinates are ignored.
//! - `pointer_cancel` or lost capture ends a drag keeping its pan, and
//!   discards a pending click without toggling.

use serde::Serialize;
use thiserror::Error;

use crate::geometry::{Pan, PointerPosition};

/// Largest displacement, in CSS pixels, still classified as a click.
pub const CLICK_THRESHOLD_PX: f64 = 5.0;

/// Default per-axis pan bound in CSS pixels.
pub const DEFAULT_MAX_PAN_PX: f64 = 10_000.0;

/// Default scale applied while zoom-pan mode is active.
pub const DEFAULT_ZOOM_SCALE: f64 = 2.0;

/// Board class present iff zoom-pan mode is active.
pub const ZOOM_PAN_CLASS: &str = "zoom-pan-mode";

/// Invalid controller configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PanZoomError {
    #[error("click threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f64),
    #[error("zoom scale must be finite and positive, got {0}")]
    InvalidZoomScale(f64),
    #[error("max pan must be finite and positive, got {0}")]
    InvalidMaxPan(f64),
}

/// Pan/zoom tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanZoomConfig {
    pub click_threshold_px: f64,
    pub zoom_scale: f64,
    pub max_pan_px: f64,
}

impl Default for PanZoomConfig {
    fn default() -> Self {
        Self {
            click_threshold_px: CLICK_THRESHOLD_PX,
            zoom_scale: DEFAULT_ZOOM_SCALE,
            max_pan_px: DEFAULT_MAX_PAN_PX,
        }
    }
}

impl PanZoomConfig {
    /// Check every field.
    pub fn validate(&self) -> Result<(), PanZoomError> {
        if !self.click_threshold_px.is_finite() || self.click_threshold_px < 0.0 {
            return Err(PanZoomError::InvalidThreshold(self.click_threshold_px));
        }
        if !self.zoom_scale.is_finite() || self.zoom_scale <= 0.0 {
            return Err(PanZoomError::InvalidZoomScale(self.zoom_scale));
        }
        if !self.max_pan_px.is_finite() || self.max_pan_px <= 0.0 {
            return Err(PanZoomError::InvalidMaxPan(self.max_pan_px));
        }
        Ok(())
    }
}

/// Pointer button as reported by `PointerEvent.button`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
    Other(i16),
}

impl PointerButton {
    #[must_use]
    pub const fn from_dom(button: i16) -> Self {
        match button {
            0 => Self::Primary,
            1 => Self::Middle,
            2 => Self::Secondary,
            other => Self::Other(other),
        }
    }
}

/// Gesture tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    /// Button is down and displacement has not exceeded the threshold.
    PendingClick {
        pointer_id: i32,
        origin: PointerPosition,
        start_pan: Pan,
    },
    Dragging {
        pointer_id: i32,
        origin: PointerPosition,
        start_pan: Pan,
    },
}

impl GestureState {
    const fn pointer_id(&self) -> Option<i32> {
        match self {
            Self::Idle => None,
            Self::PendingClick { pointer_id, .. } | Self::Dragging { pointer_id, .. } => {
                Some(*pointer_id)
            }
        }
    }
}

/// Observable interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanZoomMode {
    /// No diagram has loaded; gestures are ignored.
    Disabled,
    Idle,
    ZoomPan,
    Dragging,
}

impl PanZoomMode {
    /// CSS cursor for the board.
    #[must_use]
    pub const fn cursor(self) -> &'static str {
        match self {
            Self::Disabled => "default",
            Self::Idle => "zoom-in",
            Self::ZoomPan => "grab",
            Self::Dragging => "grabbing",
        }
    }
}

/// Pointer-capture command for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Acquire { pointer_id: i32 },
    Release { pointer_id: i32 },
}

/// Why a pointer signal was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerIgnoredReason {
    NoDiagramLoaded,
    ButtonNotAllowed,
    NonFinitePosition,
    ActivePointerAlreadyInProgress,
    NoActivePointer,
    PointerMismatch,
}

/// Semantic result of one pointer signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    Pressed,
    /// Movement within the threshold.
    Tracking,
    DragStarted(Pan),
    Panned(Pan),
    DragEnded(Pan),
    ZoomToggled { active: bool },
    ClickDiscarded,
    Ignored(PointerIgnoredReason),
}

/// Result of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanZoomDispatch {
    pub outcome: GestureOutcome,
    pub capture: Option<CaptureCommand>,
}

impl PanZoomDispatch {
    const fn ignored(reason: PointerIgnoredReason) -> Self {
        Self {
            outcome: GestureOutcome::Ignored(reason),
            capture: None,
        }
    }

    const fn plain(outcome: GestureOutcome) -> Self {
        Self {
            outcome,
            capture: None,
        }
    }

    /// Whether the dispatch changed anything visible.
    #[must_use]
    pub const fn is_visible_change(&self) -> bool {
        matches!(
            self.outcome,
            GestureOutcome::DragStarted(_)
                | GestureOutcome::Panned(_)
                | GestureOutcome::DragEnded(_)
                | GestureOutcome::ZoomToggled { .. }
        )
    }
}

/// Pan/zoom gesture machine.
#[derive(Debug, Clone)]
pub struct PanZoomController {
    config: PanZoomConfig,
    enabled: bool,
    zoom_active: bool,
    pan: Pan,
    gesture: GestureState,
    toggles: u64,
}

impl Default for PanZoomController {
    fn default() -> Self {
        Self {
            config: PanZoomConfig::default(),
            enabled: false,
            zoom_active: false,
            pan: Pan::ZERO,
            gesture: GestureState::Idle,
            toggles: 0,
        }
    }
}

impl PanZoomController {
    /// Create a disabled controller with validated tuning.
    pub fn new(config: PanZoomConfig) -> Result<Self, PanZoomError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn config(&self) -> &PanZoomConfig {
        &self.config
    }

    #[must_use]
    pub const fn click_threshold(&self) -> f64 {
        self.config.click_threshold_px
    }

    #[inline]
    #[must_use]
    pub const fn zoom_active(&self) -> bool {
        self.zoom_active
    }

    #[must_use]
    pub const fn pan(&self) -> Pan {
        self.pan
    }

    #[must_use]
    pub const fn gesture(&self) -> GestureState {
        self.gesture
    }

    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        matches!(self.gesture, GestureState::Dragging { .. })
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn toggles(&self) -> u64 {
        self.toggles
    }

    #[must_use]
    pub const fn mode(&self) -> PanZoomMode {
        if !self.enabled {
            PanZoomMode::Disabled
        } else if self.is_dragging() {
            PanZoomMode::Dragging
        } else if self.zoom_active {
            PanZoomMode::ZoomPan
        } else {
            PanZoomMode::Idle
        }
    }

    /// `transform` style for the image, or `None` when zoom is off.
    #[must_use]
    pub fn transform(&self) -> Option<String> {
        self.zoom_active.then(|| {
            format!(
                "translate({}px, {}px) scale({})",
                self.pan.x, self.pan.y, self.config.zoom_scale
            )
        })
    }

    /// Enable once a diagram has loaded; disabling resets everything.
    ///
    /// Returns the capture release for a gesture cut short by disabling.
    pub fn set_enabled(&mut self, enabled: bool) -> Option<CaptureCommand> {
        if self.enabled == enabled {
            return None;
        }
        self.enabled = enabled;
        tracing::debug!(enabled, "pan/zoom enablement changed");
        if enabled { None } else { self.reset_framing() }
    }

    /// Drop zoom and pan back to the fitted view, abandoning any gesture.
    ///
    /// Returns the capture release for the abandoned gesture, if any.
    pub fn reset_framing(&mut self) -> Option<CaptureCommand> {
        self.zoom_active = false;
        self.pan = Pan::ZERO;
        let abandoned = std::mem::take(&mut self.gesture);
        abandoned
            .pointer_id()
            .map(|pointer_id| CaptureCommand::Release { pointer_id })
    }

    pub fn pointer_down(
        &mut self,
        pointer_id: i32,
        button: PointerButton,
        position: PointerPosition,
    ) -> PanZoomDispatch {
        if !self.enabled {
            return PanZoomDispatch::ignored(PointerIgnoredReason::NoDiagramLoaded);
        }
        if button != PointerButton::Primary {
            return PanZoomDispatch::ignored(PointerIgnoredReason::ButtonNotAllowed);
        }
        if !position.is_finite() {
            return PanZoomDispatch::ignored(PointerIgnoredReason::NonFinitePosition);
        }
        if self.gesture != GestureState::Idle {
            return PanZoomDispatch::ignored(PointerIgnoredReason::ActivePointerAlreadyInProgress);
        }
        self.gesture = GestureState::PendingClick {
            pointer_id,
            origin: position,
            start_pan: self.pan,
        };
        PanZoomDispatch {
            outcome: GestureOutcome::Pressed,
            capture: Some(CaptureCommand::Acquire { pointer_id }),
        }
    }

    pub fn pointer_move(&mut self, pointer_id: i32, position: PointerPosition) -> PanZoomDispatch {
        if let Err(reason) = self.check_active(pointer_id, position) {
            return PanZoomDispatch::ignored(reason);
        }
        match self.gesture {
            GestureState::Idle => PanZoomDispatch::ignored(PointerIgnoredReason::NoActivePointer),
            GestureState::PendingClick {
                pointer_id,
                origin,
                start_pan,
            } => {
                if position.distance(origin) <= self.config.click_threshold_px {
                    return PanZoomDispatch::plain(GestureOutcome::Tracking);
                }
                self.gesture = GestureState::Dragging {
                    pointer_id,
                    origin,
                    start_pan,
                };
                self.pan = self.drag_pan(origin, start_pan, position);
                tracing::debug!(pointer_id, pan_x = self.pan.x, pan_y = self.pan.y, "drag started");
                PanZoomDispatch::plain(GestureOutcome::DragStarted(self.pan))
            }
            GestureState::Dragging {
                origin, start_pan, ..
            } => {
                self.pan = self.drag_pan(origin, start_pan, position);
                PanZoomDispatch::plain(GestureOutcome::Panned(self.pan))
            }
        }
    }

    pub fn pointer_up(&mut self, pointer_id: i32, position: PointerPosition) -> PanZoomDispatch {
        let Some(active) = self.gesture.pointer_id() else {
            return PanZoomDispatch::ignored(PointerIgnoredReason::NoActivePointer);
        };
        if active != pointer_id {
            return PanZoomDispatch::ignored(PointerIgnoredReason::PointerMismatch);
        }
        let release = Some(CaptureCommand::Release { pointer_id });
        let outcome = match self.gesture {
            GestureState::PendingClick { origin, .. }
                if !position.is_finite()
                    || position.distance(origin) <= self.config.click_threshold_px =>
            {
                self.toggle_zoom()
            }
            GestureState::PendingClick {
                origin, start_pan, ..
            } => {
                // Moved past the threshold between the last move and the release.
                self.pan = self.drag_pan(origin, start_pan, position);
                GestureOutcome::DragEnded(self.pan)
            }
            GestureState::Dragging {
                origin, start_pan, ..
            } => {
                if position.is_finite() {
                    self.pan = self.drag_pan(origin, start_pan, position);
                }
                tracing::debug!(pan_x = self.pan.x, pan_y = self.pan.y, "drag ended");
                GestureOutcome::DragEnded(self.pan)
            }
            GestureState::Idle => GestureOutcome::Ignored(PointerIgnoredReason::NoActivePointer),
        };
        self.gesture = GestureState::Idle;
        PanZoomDispatch {
            outcome,
            capture: release,
        }
    }

    /// `pointercancel` or `lostpointercapture`.
    pub fn pointer_cancel(&mut self, pointer_id: i32) -> PanZoomDispatch {
        let Some(active) = self.gesture.pointer_id() else {
            return PanZoomDispatch::ignored(PointerIgnoredReason::NoActivePointer);
        };
        if active != pointer_id {
            return PanZoomDispatch::ignored(PointerIgnoredReason::PointerMismatch);
        }
        let outcome = match self.gesture {
            GestureState::Dragging { .. } => GestureOutcome::DragEnded(self.pan),
            _ => GestureOutcome::ClickDiscarded,
        };
        tracing::debug!(pointer_id, ?outcome, "pointer gesture cancelled");
        self.gesture = GestureState::Idle;
        PanZoomDispatch {
            outcome,
            capture: Some(CaptureCommand::Release { pointer_id }),
        }
    }

    fn check_active(
        &self,
        pointer_id: i32,
        position: PointerPosition,
    ) -> Result<(), PointerIgnoredReason> {
        match self.gesture.pointer_id() {
            None => Err(PointerIgnoredReason::NoActivePointer),
            Some(active) if active != pointer_id => Err(PointerIgnoredReason::PointerMismatch),
            Some(_) if !position.is_finite() => Err(PointerIgnoredReason::NonFinitePosition),
            Some(_) => Ok(()),
        }
    }

    fn drag_pan(&self, origin: PointerPosition, start_pan: Pan, position: PointerPosition) -> Pan {
        let (dx, dy) = position.delta_from(origin);
        start_pan.offset_clamped(dx, dy, self.config.max_pan_px)
    }

    fn toggle_zoom(&mut self) -> GestureOutcome {
        self.zoom_active = !self.zoom_active;
        // Both entering and leaving start from the fitted framing.
        self.pan = Pan::ZERO;
        self.toggles += 1;
        tracing::info!(active = self.zoom_active, "zoom-pan mode toggled");
        GestureOutcome::ZoomToggled {
            active: self.zoom_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> PanZoomController {
        let mut pz = PanZoomController::default();
        pz.set_enabled(true);
        pz
    }

    fn at(x: f64, y: f64) -> PointerPosition {
        PointerPosition::new(x, y)
    }

    fn click(pz: &mut PanZoomController, x: f64, y: f64) -> GestureOutcome {
        pz.pointer_down(1, PointerButton::Primary, at(x, y));
        pz.pointer_up(1, at(x, y)).outcome
    }

    #[test]
    fn disabled_ignores_everything() {
        let mut pz = PanZoomController::default();
        let d = pz.pointer_down(1, PointerButton::Primary, at(0.0, 0.0));
        assert_eq!(
            d.outcome,
            GestureOutcome::Ignored(PointerIgnoredReason::NoDiagramLoaded)
        );
        assert!(!pz.zoom_active());
        assert_eq!(pz.mode(), PanZoomMode::Disabled);
        assert_eq!(pz.mode().cursor(), "default");
    }

    #[test]
    fn click_toggles_and_resets_pan() {
        let mut pz = enabled();
        assert_eq!(pz.mode().cursor(), "zoom-in");
        assert_eq!(
            click(&mut pz, 10.0, 10.0),
            GestureOutcome::ZoomToggled { active: true }
        );
        assert_eq!(pz.mode(), PanZoomMode::ZoomPan);
        assert_eq!(pz.transform().as_deref(), Some("translate(0px, 0px) scale(2)"));

        pz.pointer_down(1, PointerButton::Primary, at(0.0, 0.0));
        pz.pointer_move(1, at(40.0, -30.0));
        pz.pointer_up(1, at(40.0, -30.0));
        assert_eq!(pz.pan(), Pan { x: 40.0, y: -30.0 });

        assert_eq!(
            click(&mut pz, 5.0, 5.0),
            GestureOutcome::ZoomToggled { active: false }
        );
        assert_eq!(pz.pan(), Pan::ZERO);
        assert_eq!(pz.transform(), None);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut pz = enabled();
        pz.pointer_down(1, PointerButton::Primary, at(0.0, 0.0));
        // 3-4-5 triangle: exactly at the threshold.
        assert_eq!(pz.pointer_move(1, at(3.0, 4.0)).outcome, GestureOutcome::Tracking);
        assert_eq!(
            pz.pointer_up(1, at(3.0, 4.0)).outcome,
            GestureOutcome::ZoomToggled { active: true }
        );

        pz.pointer_down(1, PointerButton::Primary, at(0.0, 0.0));
        assert!(matches!(
            pz.pointer_move(1, at(3.0, 4.01)).outcome,
            GestureOutcome::DragStarted(_)
        ));
        assert!(matches!(
            pz.pointer_up(1, at(3.0, 4.01)).outcome,
            GestureOutcome::DragEnded(_)
        ));
        assert!(pz.zoom_active());
    }

    #[test]
    fn drag_that_returns_home_is_not_a_click() {
        let mut pz = enabled();
        click(&mut pz, 0.0, 0.0);
        pz.pointer_down(1, PointerButton::Primary, at(100.0, 100.0));
        pz.pointer_move(1, at(150.0, 100.0));
        assert_eq!(pz.mode(), PanZoomMode::Dragging);
        assert_eq!(pz.mode().cursor(), "grabbing");
        pz.pointer_move(1, at(100.0, 100.0));
        let d = pz.pointer_up(1, at(100.0, 100.0));
        assert_eq!(d.outcome, GestureOutcome::DragEnded(Pan::ZERO));
        assert!(pz.zoom_active());
        assert_eq!(pz.toggles(), 1);
    }

    #[test]
    fn pan_accumulates_from_start_pan() {
        let mut pz = enabled();
        click(&mut pz, 0.0, 0.0);
        for _ in 0..3 {
            pz.pointer_down(1, PointerButton::Primary, at(0.0, 0.0));
            pz.pointer_move(1, at(10.0, 20.0));
            pz.pointer_up(1, at(10.0, 20.0));
        }
        assert_eq!(pz.pan(), Pan { x: 30.0, y: 60.0 });
    }

    #[test]
    fn huge_drags_stay_finite() {
        let mut pz = enabled();
        click(&mut pz, 0.0, 0.0);
        pz.pointer_down(1, PointerButton::Primary, at(0.0, 0.0));
        pz.pointer_move(1, at(1e308, -1e308));
        assert_eq!(pz.pan(), Pan { x: 10_000.0, y: -10_000.0 });
        let d = pz.pointer_move(1, at(f64::INFINITY, 0.0));
        assert_eq!(
            d.outcome,
            GestureOutcome::Ignored(PointerIgnoredReason::NonFinitePosition)
        );
        assert!(pz.pan().is_finite());
    }

    #[test]
    fn capture_is_acquired_and_released() {
        let mut pz = enabled();
        let d = pz.pointer_down(7, PointerButton::Primary, at(0.0, 0.0));
        assert_eq!(d.capture, Some(CaptureCommand::Acquire { pointer_id: 7 }));
        let d = pz.pointer_up(7, at(0.0, 0.0));
        assert_eq!(d.capture, Some(CaptureCommand::Release { pointer_id: 7 }));
    }

    #[test]
    fn one_pointer_at_a_time() {
        let mut pz = enabled();
        pz.pointer_down(1, PointerButton::Primary, at(0.0, 0.0));
        let d = pz.pointer_down(2, PointerButton::Primary, at(5.0, 5.0));
        assert_eq!(
            d.outcome,
            GestureOutcome::Ignored(PointerIgnoredReason::ActivePointerAlreadyInProgress)
        );
        let d = pz.pointer_up(2, at(5.0, 5.0));
        assert_eq!(
            d.outcome,
            GestureOutcome::Ignored(PointerIgnoredReason::PointerMismatch)
        );
    }

    #[test]
    fn secondary_button_ignored() {
        let mut pz = enabled();
        let d = pz.pointer_down(1, PointerButton::from_dom(2), at(0.0, 0.0));
        assert_eq!(
            d.outcome,
            GestureOutcome::Ignored(PointerIgnoredReason::ButtonNotAllowed)
        );
    }

    #[test]
    fn cancel_discards_click_and_keeps_drag_pan() {
        let mut pz = enabled();
        pz.pointer_down(1, PointerButton::Primary, at(0.0, 0.0));
        assert_eq!(pz.pointer_cancel(1).outcome, GestureOutcome::ClickDiscarded);
        assert!(!pz.zoom_active());

        click(&mut pz, 0.0, 0.0);
        pz.pointer_down(1, PointerButton::Primary, at(0.0, 0.0));
        pz.pointer_move(1, at(25.0, 0.0));
        assert_eq!(
            pz.pointer_cancel(1).outcome,
            GestureOutcome::DragEnded(Pan { x: 25.0, y: 0.0 })
        );
        assert_eq!(pz.gesture(), GestureState::Idle);
    }

    #[test]
    fn disabling_resets_mode() {
        let mut pz = enabled();
        click(&mut pz, 0.0, 0.0);
        assert!(pz.zoom_active());
        assert_eq!(pz.set_enabled(false), None);
        assert!(!pz.zoom_active());
        assert_eq!(pz.pan(), Pan::ZERO);
    }

    #[test]
    fn disabling_mid_drag_releases_capture() {
        let mut pz = enabled();
        pz.pointer_down(4, PointerButton::Primary, at(0.0, 0.0));
        pz.pointer_move(4, at(40.0, 0.0));
        assert!(pz.is_dragging());

        assert_eq!(
            pz.set_enabled(false),
            Some(CaptureCommand::Release { pointer_id: 4 })
        );
        assert_eq!(pz.gesture(), GestureState::Idle);
        // Nothing left to release the second time.
        assert_eq!(pz.reset_framing(), None);
    }

    #[test]
    fn reset_framing_releases_pending_click() {
        let mut pz = enabled();
        pz.pointer_down(2, PointerButton::Primary, at(5.0, 5.0));
        assert_eq!(
            pz.reset_framing(),
            Some(CaptureCommand::Release { pointer_id: 2 })
        );
        assert!(pz.is_enabled());
        assert!(!pz.zoom_active());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = PanZoomConfig {
            click_threshold_px: f64::NAN,
            ..PanZoomConfig::default()
        };
        assert!(matches!(
            PanZoomController::new(bad),
            Err(PanZoomError::InvalidThreshold(_))
        ));
        let bad = PanZoomConfig {
            zoom_scale: 0.0,
            ..PanZoomConfig::default()
        };
        assert_eq!(
            PanZoomController::new(bad).unwrap_err(),
            PanZoomError::InvalidZoomScale(0.0)
        );
    }
}
