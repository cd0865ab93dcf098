#![forbid(unsafe_code)]

//! Page controller: one [`ViewerState`], five components, host commands out.
//!
//! [`Viewer`] is the only writer of [`ViewerState`]. Each host event goes
//! through exactly one handler, which updates the components it concerns and
//! returns the [`HostCommand`]s the host must execute. Everything the page
//! shows is a pure projection of the state ([`Viewer::snapshot`]).
//!
//! # Event flow
//!
//! ```text
//! transport ──► ConnectionManager ──payload──► ImageStage ──loaded──► FilenameDisplay
//!                     │                              │                     (deferred)
//!                     └────── status ◄───────────────┘
//! pointer ────► PanZoomController (enabled once ImageStage has loaded)
//! ```
//!
//! A diagram payload is held in the connection mailbox while an image load is
//! in flight, so a burst of updates renders only the newest one.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, FramingPolicy, ViewerConfig};
use crate::connection::{
    ConnectionAction, ConnectionEvent, ConnectionManager, ConnectionState, ConnectionTransition,
    MessageOutcome,
};
use crate::filename::{ContainerLayout, FilenameDisplay, TextMeasure, truncate_filename};
use crate::geometry::{Pan, PointerPosition};
use crate::panzoom::{
    CaptureCommand, GestureOutcome, PanZoomController, PanZoomDispatch, PanZoomMode,
    PointerButton, ZOOM_PAN_CLASS,
};
use crate::stage::{ImageStage, StageOutcome};
use crate::status::project_status;

/// Side effects requested from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostCommand {
    OpenTransport { url: String },
    CloseTransport,
    /// Arm a one-shot timer; call `retry_timer_elapsed` when it fires.
    ScheduleRetry { delay_ms: u64, attempt: u32 },
    /// Call `animation_frame` on the next animation-frame callback.
    RequestAnimationFrame,
    /// Assign `src` to the image element and report the result for `generation`.
    LoadImage { generation: u64, src: String },
    SetPointerCapture { pointer_id: i32 },
    ReleasePointerCapture { pointer_id: i32 },
}

impl From<ConnectionAction> for HostCommand {
    fn from(action: ConnectionAction) -> Self {
        match action {
            ConnectionAction::OpenTransport { url } => Self::OpenTransport { url },
            ConnectionAction::CloseTransport => Self::CloseTransport,
            ConnectionAction::ScheduleRetry { delay, attempt } => Self::ScheduleRetry {
                delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt,
            },
        }
    }
}

impl From<CaptureCommand> for HostCommand {
    fn from(command: CaptureCommand) -> Self {
        match command {
            CaptureCommand::Acquire { pointer_id } => Self::SetPointerCapture { pointer_id },
            CaptureCommand::Release { pointer_id } => Self::ReleasePointerCapture { pointer_id },
        }
    }
}

/// Host events, for replay-style drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ViewerEvent {
    Start,
    TransportOpened,
    TransportMessage {
        text: String,
    },
    TransportClosed {
        #[serde(default)]
        code: u16,
        #[serde(default)]
        clean: bool,
        #[serde(default)]
        reason: String,
    },
    TransportError {
        reason: String,
    },
    RetryTimerElapsed,
    ImageLoaded {
        generation: u64,
    },
    ImageFailed {
        generation: u64,
        reason: String,
    },
    AnimationFrame {
        container_width: Option<f64>,
    },
    ContainerResized,
    PointerDown {
        pointer_id: i32,
        #[serde(default)]
        button: i16,
        x: f64,
        y: f64,
    },
    PointerMove {
        pointer_id: i32,
        x: f64,
        y: f64,
    },
    PointerUp {
        pointer_id: i32,
        x: f64,
        y: f64,
    },
    PointerCancel {
        pointer_id: i32,
    },
    StartNewSession,
}

/// The single process-wide viewer state.
///
/// Fields are private; read through accessors, mutate through [`Viewer`].
#[derive(Debug, Clone)]
pub struct ViewerState {
    connection: ConnectionManager,
    stage: ImageStage,
    filename: FilenameDisplay,
    panzoom: PanZoomController,
    current_filename: String,
    notice: Option<String>,
    ever_connected: bool,
}

impl ViewerState {
    #[must_use]
    pub fn connection(&self) -> &ConnectionState {
        self.connection.state()
    }

    #[must_use]
    pub const fn has_loaded_diagram(&self) -> bool {
        self.stage.has_loaded()
    }

    #[must_use]
    pub fn current_filename(&self) -> &str {
        &self.current_filename
    }

    #[must_use]
    pub const fn pan(&self) -> Pan {
        self.panzoom.pan()
    }

    #[must_use]
    pub const fn zoom_active(&self) -> bool {
        self.panzoom.zoom_active()
    }

    #[must_use]
    pub fn connection_manager(&self) -> &ConnectionManager {
        &self.connection
    }

    #[must_use]
    pub fn stage(&self) -> &ImageStage {
        &self.stage
    }

    #[must_use]
    pub fn filename_display(&self) -> &FilenameDisplay {
        &self.filename
    }

    #[must_use]
    pub fn panzoom(&self) -> &PanZoomController {
        &self.panzoom
    }

    /// Latest transient server notice, if any.
    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }
}

/// Everything the page renders, as plain values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceSnapshot {
    pub status_text: String,
    /// Full class attribute of the status pill, e.g. `"status ok"`.
    pub status_class: String,
    pub placeholder_visible: bool,
    pub placeholder_text: String,
    pub image_visible: bool,
    pub image_src: Option<String>,
    pub filename_label: String,
    pub rendered_at_label: String,
    pub server_url_label: String,
    /// Full class attribute of the board, e.g. `"board zoom-pan-mode"`.
    pub board_class: String,
    pub cursor: String,
    pub transform: Option<String>,
    pub error_indicator: Option<String>,
}

/// Externally checkable state for automation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Introspection {
    pub connected: bool,
    pub connection: ConnectionState,
    pub has_loaded_diagram: bool,
    pub zoom_pan_mode: bool,
    pub is_dragging: bool,
    pub pan_x: f64,
    pub pan_y: f64,
    pub click_threshold: f64,
    pub current_filename: String,
    pub displayed_filename: String,
    pub mode: PanZoomMode,
    pub frame_pending: bool,
    pub reconnect_attempt: u32,
    pub dropped_frames: u64,
    pub superseded_payloads: u64,
}

/// The viewer controller.
pub struct Viewer {
    config: ViewerConfig,
    state: ViewerState,
    measure: Box<dyn TextMeasure>,
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Viewer {
    /// Build a viewer from a validated configuration.
    pub fn new(config: ViewerConfig, measure: Box<dyn TextMeasure>) -> Result<Self, ConfigError> {
        let config = config.validated()?;
        let panzoom = PanZoomController::new(config.to_panzoom_config())
            .map_err(|e| ConfigError::Validation(vec![e.to_string()]))?;
        let state = ViewerState {
            connection: ConnectionManager::new(config.server_url.clone(), config.to_retry_policy()),
            stage: ImageStage::with_offset_minutes(config.timestamp_utc_offset_minutes),
            filename: FilenameDisplay::new(config.filename_padding_px, config.ellipsis.clone()),
            panzoom,
            current_filename: String::new(),
            notice: None,
            ever_connected: false,
        };
        tracing::info!(config = %config.to_jsonl(), "viewer created");
        Ok(Self {
            config,
            state,
            measure,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Read-only view of the state.
    #[must_use]
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Replace the font metrics (e.g. after a font change).
    pub fn set_measure(&mut self, measure: Box<dyn TextMeasure>) {
        self.measure = measure;
    }

    /// Route a [`ViewerEvent`] to its handler.
    pub fn dispatch(&mut self, now_ms: u64, event: ViewerEvent) -> Vec<HostCommand> {
        match event {
            ViewerEvent::Start => self.start(now_ms),
            ViewerEvent::TransportOpened => self.transport_opened(now_ms),
            ViewerEvent::TransportMessage { text } => self.transport_message(now_ms, &text),
            ViewerEvent::TransportClosed {
                code,
                clean,
                reason,
            } => self.transport_closed(now_ms, code, clean, &reason),
            ViewerEvent::TransportError { reason } => self.transport_error(now_ms, &reason),
            ViewerEvent::RetryTimerElapsed => self.retry_timer_elapsed(now_ms),
            ViewerEvent::ImageLoaded { generation } => self.image_loaded(generation),
            ViewerEvent::ImageFailed { generation, reason } => {
                self.image_failed(generation, &reason)
            }
            ViewerEvent::AnimationFrame { container_width } => {
                self.animation_frame(&container_width);
                Vec::new()
            }
            ViewerEvent::ContainerResized => self.container_resized(),
            ViewerEvent::PointerDown {
                pointer_id,
                button,
                x,
                y,
            } => self.pointer_down(pointer_id, PointerButton::from_dom(button), x, y),
            ViewerEvent::PointerMove { pointer_id, x, y } => self.pointer_move(pointer_id, x, y),
            ViewerEvent::PointerUp { pointer_id, x, y } => self.pointer_up(pointer_id, x, y),
            ViewerEvent::PointerCancel { pointer_id } => self.pointer_cancel(pointer_id),
            ViewerEvent::StartNewSession => self.start_new_session(),
        }
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Page start: open the transport.
    pub fn start(&mut self, now_ms: u64) -> Vec<HostCommand> {
        let _span = tracing::debug_span!("viewer.start").entered();
        self.connection_event(now_ms, ConnectionEvent::Connect)
    }

    pub fn transport_opened(&mut self, now_ms: u64) -> Vec<HostCommand> {
        let _span = tracing::debug_span!("viewer.transport_opened").entered();
        let mut commands = self.connection_event(now_ms, ConnectionEvent::TransportOpened);
        if self.state.connection.state().is_connected() {
            if self.state.ever_connected
                && self.config.framing_policy == FramingPolicy::ResetOnReconnect
            {
                commands.extend(self.state.panzoom.reset_framing().map(HostCommand::from));
                tracing::debug!("framing reset on reconnect");
            }
            self.state.ever_connected = true;
        }
        commands
    }

    pub fn transport_message(&mut self, now_ms: u64, text: &str) -> Vec<HostCommand> {
        let _span = tracing::debug_span!("viewer.transport_message", len = text.len()).entered();
        match self.state.connection.ingest_message(text) {
            MessageOutcome::PayloadQueued => self.pump_payload(),
            MessageOutcome::Notice(message) => {
                tracing::debug!(notice = %message, now_ms, "server notice");
                self.state.notice = Some(message);
                Vec::new()
            }
            MessageOutcome::RenderError { message, filename } => {
                self.state.stage.show_render_error(&message, filename.as_deref());
                Vec::new()
            }
            MessageOutcome::Dropped(_) => Vec::new(),
        }
    }

    pub fn transport_closed(
        &mut self,
        now_ms: u64,
        code: u16,
        clean: bool,
        reason: &str,
    ) -> Vec<HostCommand> {
        let _span = tracing::debug_span!("viewer.transport_closed", code, clean).entered();
        self.connection_event(
            now_ms,
            ConnectionEvent::TransportClosed {
                code,
                clean,
                reason: reason.to_owned(),
            },
        )
    }

    pub fn transport_error(&mut self, now_ms: u64, reason: &str) -> Vec<HostCommand> {
        let _span = tracing::debug_span!("viewer.transport_error").entered();
        self.connection_event(
            now_ms,
            ConnectionEvent::TransportError {
                reason: reason.to_owned(),
            },
        )
    }

    pub fn retry_timer_elapsed(&mut self, now_ms: u64) -> Vec<HostCommand> {
        let _span = tracing::debug_span!("viewer.retry_timer_elapsed").entered();
        self.connection_event(now_ms, ConnectionEvent::RetryTimerElapsed)
    }

    fn connection_event(&mut self, now_ms: u64, event: ConnectionEvent) -> Vec<HostCommand> {
        let ConnectionTransition { actions, .. } = self.state.connection.handle_event(now_ms, event);
        actions.into_iter().map(HostCommand::from).collect()
    }

    // ------------------------------------------------------------------
    // Image stage
    // ------------------------------------------------------------------

    /// The host finished loading the image for `generation`.
    pub fn image_loaded(&mut self, generation: u64) -> Vec<HostCommand> {
        self.image_result(generation, Ok(()))
    }

    /// The host failed to load the image for `generation`.
    pub fn image_failed(&mut self, generation: u64, reason: &str) -> Vec<HostCommand> {
        self.image_result(generation, Err(reason.to_owned()))
    }

    fn image_result(&mut self, generation: u64, result: Result<(), String>) -> Vec<HostCommand> {
        let _span = tracing::debug_span!("viewer.image_result", generation).entered();
        let mut commands = Vec::new();
        match self.state.stage.complete(generation, result) {
            StageOutcome::Presented => {
                self.state.panzoom.set_enabled(true);
                let filename = self.state.stage.shown_filename().unwrap_or_default().to_owned();
                if filename != self.state.current_filename {
                    if self.config.framing_policy == FramingPolicy::ResetOnFileChange
                        && !self.state.current_filename.is_empty()
                    {
                        commands.extend(self.state.panzoom.reset_framing().map(HostCommand::from));
                        tracing::debug!(filename = %filename, "framing reset on file change");
                    }
                    self.state.current_filename = filename;
                }
                commands.extend(self.request_filename_frame());
            }
            // A stale completion can still free the stage, e.g. after a
            // session reset dropped the load it belonged to.
            StageOutcome::Failed(_) | StageOutcome::Stale => {}
        }
        commands.extend(self.pump_payload());
        commands
    }

    fn pump_payload(&mut self) -> Vec<HostCommand> {
        if self.state.stage.in_flight() {
            return Vec::new();
        }
        let Some(payload) = self.state.connection.take_payload() else {
            return Vec::new();
        };
        match self.state.stage.present(&payload) {
            Ok(ticket) => vec![HostCommand::LoadImage {
                generation: ticket.generation,
                src: ticket.src,
            }],
            // The stage raised its error indicator; the previous image stays.
            Err(_) => Vec::new(),
        }
    }

    /// Forget the loaded diagram and start over as if the page had just
    /// loaded. The connection is left as it is.
    ///
    /// A payload still waiting in the mailbox starts loading right away.
    pub fn start_new_session(&mut self) -> Vec<HostCommand> {
        tracing::info!(had_loaded = self.state.stage.has_loaded(), "new viewer session");
        self.state.stage.reset_session();
        let mut commands: Vec<HostCommand> = self
            .state
            .panzoom
            .set_enabled(false)
            .map(HostCommand::from)
            .into_iter()
            .collect();
        self.state.current_filename.clear();
        self.state.notice = None;
        self.state.filename = FilenameDisplay::new(
            self.config.filename_padding_px,
            self.config.ellipsis.clone(),
        );
        commands.extend(self.pump_payload());
        commands
    }

    // ------------------------------------------------------------------
    // Filename
    // ------------------------------------------------------------------

    /// The filename container was resized.
    pub fn container_resized(&mut self) -> Vec<HostCommand> {
        self.request_filename_frame().into_iter().collect()
    }

    fn request_filename_frame(&mut self) -> Option<HostCommand> {
        self.state
            .filename
            .request_deferred()
            .then_some(HostCommand::RequestAnimationFrame)
    }

    /// Animation-frame callback: recompute the label from the filename and
    /// width current right now.
    pub fn animation_frame(&mut self, layout: &dyn ContainerLayout) -> Option<String> {
        let state = &mut self.state;
        state
            .filename
            .on_animation_frame(
                &state.current_filename,
                layout.container_width(),
                self.measure.as_ref(),
            )
            .map(str::to_owned)
    }

    /// Immediate mode: recompute now from whatever width the host reports.
    pub fn render_filename_immediate(&mut self, layout: &dyn ContainerLayout) -> String {
        let state = &mut self.state;
        state
            .filename
            .render_immediate(
                &state.current_filename,
                layout.container_width(),
                self.measure.as_ref(),
            )
            .to_owned()
    }

    /// Truncate an arbitrary filename to `max_width_px` with the viewer's
    /// metrics and ellipsis, without touching state.
    #[must_use]
    pub fn truncate(&self, filename: &str, max_width_px: f64) -> String {
        truncate_filename(
            filename,
            max_width_px,
            &self.config.ellipsis,
            self.measure.as_ref(),
        )
    }

    // ------------------------------------------------------------------
    // Pointer
    // ------------------------------------------------------------------

    pub fn pointer_down(
        &mut self,
        pointer_id: i32,
        button: PointerButton,
        x: f64,
        y: f64,
    ) -> Vec<HostCommand> {
        let dispatch =
            self.state
                .panzoom
                .pointer_down(pointer_id, button, PointerPosition::new(x, y));
        Self::pointer_commands(dispatch)
    }

    pub fn pointer_move(&mut self, pointer_id: i32, x: f64, y: f64) -> Vec<HostCommand> {
        let dispatch = self
            .state
            .panzoom
            .pointer_move(pointer_id, PointerPosition::new(x, y));
        Self::pointer_commands(dispatch)
    }

    pub fn pointer_up(&mut self, pointer_id: i32, x: f64, y: f64) -> Vec<HostCommand> {
        let dispatch = self
            .state
            .panzoom
            .pointer_up(pointer_id, PointerPosition::new(x, y));
        Self::pointer_commands(dispatch)
    }

    pub fn pointer_cancel(&mut self, pointer_id: i32) -> Vec<HostCommand> {
        let dispatch = self.state.panzoom.pointer_cancel(pointer_id);
        Self::pointer_commands(dispatch)
    }

    fn pointer_commands(dispatch: PanZoomDispatch) -> Vec<HostCommand> {
        if let GestureOutcome::Ignored(reason) = dispatch.outcome {
            tracing::trace!(?reason, "pointer signal ignored");
        } else if dispatch.is_visible_change() {
            tracing::trace!(outcome = ?dispatch.outcome, "pointer gesture");
        }
        dispatch.capture.map(HostCommand::from).into_iter().collect()
    }

    // ------------------------------------------------------------------
    // Projections
    // ------------------------------------------------------------------

    /// Project the state onto the rendering surface.
    #[must_use]
    pub fn snapshot(&self) -> SurfaceSnapshot {
        let state = &self.state;
        let status = project_status(state.connection.state(), state.stage.has_loaded());
        let mode = state.panzoom.mode();
        let board_class = if state.panzoom.zoom_active() {
            format!("board {ZOOM_PAN_CLASS}")
        } else {
            "board".to_owned()
        };
        SurfaceSnapshot {
            status_class: status.class_attr(),
            status_text: status.text,
            placeholder_visible: status.placeholder_visible,
            placeholder_text: state
                .notice
                .clone()
                .unwrap_or_else(|| self.config.placeholder_text.clone()),
            image_visible: status.image_visible,
            image_src: state.stage.shown_src().map(str::to_owned),
            filename_label: state.filename.displayed().to_owned(),
            rendered_at_label: state.stage.rendered_at_label(),
            server_url_label: self.config.server_url.clone(),
            board_class,
            cursor: mode.cursor().to_owned(),
            transform: state.panzoom.transform(),
            error_indicator: state.stage.error_indicator().map(str::to_owned),
        }
    }

    /// Flags and numbers for external verification.
    #[must_use]
    pub fn introspect(&self) -> Introspection {
        let state = &self.state;
        let pan = state.panzoom.pan();
        Introspection {
            connected: state.connection.state().is_connected(),
            connection: state.connection.state().clone(),
            has_loaded_diagram: state.stage.has_loaded(),
            zoom_pan_mode: state.panzoom.zoom_active(),
            is_dragging: state.panzoom.is_dragging(),
            pan_x: pan.x,
            pan_y: pan.y,
            click_threshold: state.panzoom.click_threshold(),
            current_filename: state.current_filename.clone(),
            displayed_filename: state.filename.displayed().to_owned(),
            mode: state.panzoom.mode(),
            frame_pending: state.filename.is_frame_pending(),
            reconnect_attempt: state.connection.attempt(),
            dropped_frames: state.connection.dropped_frames(),
            superseded_payloads: state.connection.mailbox().superseded(),
        }
    }
}
