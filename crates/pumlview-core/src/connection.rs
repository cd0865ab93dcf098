#![forbid(unsafe_code)]

//! Connection lifecycle for the rendering-server websocket.
//!
//! [`ConnectionManager`] is a sans-IO state machine: the host reports
//! transport events and carries out the returned [`ConnectionAction`]s
//! (open/close the socket, arm a retry timer). The manager never gives up;
//! every failure becomes a [`ConnectionState`] value plus a scheduled retry.
//!
//! ```text
//!   connect ──► Connecting ──opened──► Connected
//!                  │  ▲                   │
//!          closed  │  │ timer      closed │
//!                  ▼  │                   ▼
//!     Error(r) ◄── Reconnecting ◄─────────┘
//!        │ error             ▲
//!        └───── timer ───────┘ (to Connecting)
//! ```
//!
//! Diagram payloads decoded from inbound frames land in a single-slot
//! [`LatestPayload`] mailbox; an undelivered payload is replaced by a newer
//! one, never queued.

use serde::Serialize;
use web_time::Duration;

use crate::protocol::{DiagramPayload, InboundFrame, ProtocolError, decode_frame};
use crate::retry::RetryPolicy;

/// Transport lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Error(String),
}

impl ConnectionState {
    /// Stable label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error(_) => "error",
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Events reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Start (or restart) the lifecycle.
    Connect,
    TransportOpened,
    TransportClosed {
        code: u16,
        clean: bool,
        reason: String,
    },
    TransportError {
        reason: String,
    },
    RetryTimerElapsed,
}

/// Side effects the host must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    OpenTransport { url: String },
    CloseTransport,
    ScheduleRetry { delay: Duration, attempt: u32 },
}

/// Result of one [`ConnectionManager::handle_event`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub actions: Vec<ConnectionAction>,
    /// Set when the event did not apply to the current state.
    pub ignored: Option<&'static str>,
}

impl ConnectionTransition {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Single-slot, last-write-wins payload mailbox.
#[derive(Debug, Default, Clone)]
pub struct LatestPayload {
    slot: Option<DiagramPayload>,
    superseded: u64,
}

impl LatestPayload {
    /// Store `payload`, replacing any undelivered one.
    pub fn put(&mut self, payload: DiagramPayload) {
        if let Some(old) = self.slot.replace(payload) {
            self.superseded += 1;
            tracing::debug!(
                dropped = %old.filename,
                superseded = self.superseded,
                "payload superseded before delivery"
            );
        }
    }

    /// Take the most recent undelivered payload.
    pub fn take(&mut self) -> Option<DiagramPayload> {
        self.slot.take()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Total payloads replaced before delivery.
    #[must_use]
    pub const fn superseded(&self) -> u64 {
        self.superseded
    }
}

/// What an inbound text frame turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// A diagram payload was stored in the mailbox.
    PayloadQueued,
    Notice(String),
    RenderError {
        message: String,
        filename: Option<String>,
    },
    /// The frame was dropped (undecodable, or a payload while not connected).
    Dropped(String),
}

/// Sans-IO websocket lifecycle with unbounded capped-exponential retry.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    url: String,
    policy: RetryPolicy,
    state: ConnectionState,
    attempt: u32,
    retry_pending: bool,
    /// An open was requested and no close has been reported since.
    transport_live: bool,
    entered_at_ms: u64,
    transitions: u64,
    mailbox: LatestPayload,
    dropped_frames: u64,
}

impl ConnectionManager {
    /// Create a manager in the `Connecting` state. Nothing is opened until
    /// [`ConnectionEvent::Connect`] is handled.
    #[must_use]
    pub fn new(url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            url: url.into(),
            policy,
            state: ConnectionState::Connecting,
            attempt: 0,
            retry_pending: false,
            transport_live: false,
            entered_at_ms: 0,
            transitions: 0,
            mailbox: LatestPayload::default(),
            dropped_frames: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Consecutive failed attempts since the last successful open.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub const fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// Host time at which the current state was entered.
    #[must_use]
    pub const fn entered_at_ms(&self) -> u64 {
        self.entered_at_ms
    }

    #[must_use]
    pub const fn transitions(&self) -> u64 {
        self.transitions
    }

    #[must_use]
    pub const fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    #[must_use]
    pub fn mailbox(&self) -> &LatestPayload {
        &self.mailbox
    }

    /// Take the latest undelivered payload.
    pub fn take_payload(&mut self) -> Option<DiagramPayload> {
        self.mailbox.take()
    }

    /// Apply a host event.
    pub fn handle_event(&mut self, now_ms: u64, event: ConnectionEvent) -> ConnectionTransition {
        let from = self.state.clone();
        let mut actions = Vec::new();
        let mut ignored = None;

        match event {
            ConnectionEvent::Connect => {
                // Covers a socket still opening, not only an open one.
                if self.transport_live {
                    actions.push(ConnectionAction::CloseTransport);
                }
                self.attempt = 0;
                self.retry_pending = false;
                self.enter(now_ms, ConnectionState::Connecting);
                actions.push(self.open_action());
            }
            ConnectionEvent::TransportOpened => {
                if matches!(self.state, ConnectionState::Connecting) {
                    self.attempt = 0;
                    self.retry_pending = false;
                    self.enter(now_ms, ConnectionState::Connected);
                } else {
                    ignored = Some("opened_outside_connecting");
                }
            }
            ConnectionEvent::TransportClosed {
                code,
                clean,
                reason,
            } => {
                tracing::debug!(code, clean, reason = %reason, "transport closed");
                self.transport_live = false;
                if self.retry_pending {
                    // The error that preceded this close already armed a timer.
                    ignored = Some("retry_already_scheduled");
                } else {
                    self.enter(now_ms, ConnectionState::Reconnecting);
                    actions.extend(self.schedule_retry());
                }
            }
            ConnectionEvent::TransportError { reason } => {
                self.enter(now_ms, ConnectionState::Error(reason));
                if !self.retry_pending {
                    actions.extend(self.schedule_retry());
                }
            }
            ConnectionEvent::RetryTimerElapsed => match self.state {
                ConnectionState::Reconnecting | ConnectionState::Error(_) => {
                    self.retry_pending = false;
                    self.enter(now_ms, ConnectionState::Connecting);
                    actions.push(self.open_action());
                }
                _ => ignored = Some("stale_retry_timer"),
            },
        }

        let transition = ConnectionTransition {
            from,
            to: self.state.clone(),
            actions,
            ignored,
        };
        if let Some(reason) = transition.ignored {
            tracing::trace!(state = transition.to.label(), reason, "connection event ignored");
        } else if transition.changed() {
            tracing::info!(
                from = transition.from.label(),
                to = transition.to.label(),
                attempt = self.attempt,
                now_ms,
                "connection transition"
            );
        }
        transition
    }

    /// Decode an inbound text frame.
    ///
    /// Diagram payloads go into the mailbox; they are only accepted while
    /// connected. Decode failures are counted and dropped.
    pub fn ingest_message(&mut self, text: &str) -> MessageOutcome {
        match decode_frame(text) {
            Ok(InboundFrame::Diagram(payload)) => {
                if self.state.is_connected() {
                    self.mailbox.put(payload);
                    MessageOutcome::PayloadQueued
                } else {
                    self.dropped_frames += 1;
                    tracing::warn!(
                        state = self.state.label(),
                        filename = %payload.filename,
                        "payload received while not connected; dropped"
                    );
                    MessageOutcome::Dropped("not connected".to_owned())
                }
            }
            Ok(InboundFrame::Notice { message }) => MessageOutcome::Notice(message),
            Ok(InboundFrame::RenderError { message, filename }) => {
                MessageOutcome::RenderError { message, filename }
            }
            Err(err) => self.drop_frame(&err),
        }
    }

    fn drop_frame(&mut self, err: &ProtocolError) -> MessageOutcome {
        self.dropped_frames += 1;
        tracing::warn!(error = %err, dropped = self.dropped_frames, "inbound frame dropped");
        MessageOutcome::Dropped(err.to_string())
    }

    fn open_action(&mut self) -> ConnectionAction {
        self.transport_live = true;
        ConnectionAction::OpenTransport {
            url: self.url.clone(),
        }
    }

    fn schedule_retry(&mut self) -> Option<ConnectionAction> {
        if !self.policy.allows(self.attempt) {
            tracing::warn!(attempt = self.attempt, "retry budget exhausted");
            return None;
        }
        let attempt = self.attempt;
        let delay = self.policy.delay(attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.retry_pending = true;
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retry scheduled");
        Some(ConnectionAction::ScheduleRetry { delay, attempt })
    }

    fn enter(&mut self, now_ms: u64, next: ConnectionState) {
        if self.state != next {
            self.transitions += 1;
            self.entered_at_ms = now_ms;
        }
        self.state = next;
    }
}
