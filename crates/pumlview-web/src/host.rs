#![forbid(unsafe_code)]

//! Deterministic, native host for a [`Viewer`].
//!
//! [`WebViewerHost`] plays the browser's part: it executes [`HostCommand`]s
//! against an in-memory model of the page (transport, one retry timer, one
//! animation-frame slot, image loads) and records the [`DomPatch`]es each
//! step produces. Time only moves when the caller advances the
//! [`DeterministicClock`].

use std::collections::VecDeque;
use std::time::Duration;

use pumlview_core::{
    ConfigError, HostCommand, SurfaceSnapshot, TextMeasure, Viewer, ViewerConfig, ViewerEvent,
};

use crate::surface::{DomPatch, diff};

/// Monotonic clock controlled by the host.
#[derive(Debug, Default, Clone)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    pub fn set(&mut self, now: Duration) {
        self.now = now;
    }

    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.now.as_millis()).unwrap_or(u64::MAX)
    }
}

/// How the simulated browser answers image loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Every load succeeds as soon as it is requested.
    #[default]
    Succeed,
    /// Every load fails as soon as it is requested.
    Fail,
    /// Loads wait until [`WebViewerHost::complete_load`] is called.
    Manual,
}

/// Captured outputs for inspection.
#[derive(Debug, Default, Clone)]
pub struct WebOutputs {
    /// Every patch applied, in order.
    pub patches: Vec<DomPatch>,
    /// Every command the viewer issued, in order.
    pub commands: Vec<HostCommand>,
    /// Transport URLs opened.
    pub opened: Vec<String>,
    /// Last pointer capture state: `Some(id)` while captured.
    pub captured_pointer: Option<i32>,
}

/// Native stand-in for the browser page.
pub struct WebViewerHost {
    viewer: Viewer,
    clock: DeterministicClock,
    container_width: Option<f64>,
    load_policy: LoadPolicy,
    retry_due_ms: Option<u64>,
    frame_requested: bool,
    pending_loads: VecDeque<u64>,
    transport_open: bool,
    painted: Option<SurfaceSnapshot>,
    outputs: WebOutputs,
}

impl WebViewerHost {
    pub fn new(config: ViewerConfig, measure: Box<dyn TextMeasure>) -> Result<Self, ConfigError> {
        Ok(Self {
            viewer: Viewer::new(config, measure)?,
            clock: DeterministicClock::new(),
            container_width: None,
            load_policy: LoadPolicy::default(),
            retry_due_ms: None,
            frame_requested: false,
            pending_loads: VecDeque::new(),
            transport_open: false,
            painted: None,
            outputs: WebOutputs::default(),
        })
    }

    #[must_use]
    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    #[must_use]
    pub fn outputs(&self) -> &WebOutputs {
        &self.outputs
    }

    /// Drain the patches recorded so far.
    pub fn take_patches(&mut self) -> Vec<DomPatch> {
        std::mem::take(&mut self.outputs.patches)
    }

    #[must_use]
    pub fn clock(&self) -> &DeterministicClock {
        &self.clock
    }

    #[must_use]
    pub fn transport_open(&self) -> bool {
        self.transport_open
    }

    #[must_use]
    pub fn retry_due_ms(&self) -> Option<u64> {
        self.retry_due_ms
    }

    #[must_use]
    pub fn frame_requested(&self) -> bool {
        self.frame_requested
    }

    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.pending_loads.len()
    }

    pub fn set_load_policy(&mut self, policy: LoadPolicy) {
        self.load_policy = policy;
    }

    /// Width the filename container reports from now on.
    pub fn set_container_width(&mut self, width: Option<f64>) {
        self.container_width = width;
    }

    /// Resize the container and notify the viewer.
    pub fn resize(&mut self, width: Option<f64>) {
        self.container_width = width;
        self.send(ViewerEvent::ContainerResized);
    }

    /// Feed one host event and execute what it asks for.
    pub fn send(&mut self, event: ViewerEvent) {
        match &event {
            ViewerEvent::TransportOpened => self.transport_open = true,
            ViewerEvent::TransportClosed { .. } | ViewerEvent::TransportError { .. } => {
                self.transport_open = false;
            }
            _ => {}
        }
        let commands = self.viewer.dispatch(self.clock.now_ms(), event);
        self.execute(commands);
        self.paint();
    }

    /// Move time forward, firing the retry timer if it comes due.
    pub fn advance(&mut self, dt: Duration) {
        self.clock.advance(dt);
        if let Some(due) = self.retry_due_ms
            && due <= self.clock.now_ms()
        {
            self.retry_due_ms = None;
            self.send(ViewerEvent::RetryTimerElapsed);
        }
    }

    /// Run the pending animation frame. Returns whether one ran.
    pub fn run_frame(&mut self) -> bool {
        if !std::mem::take(&mut self.frame_requested) {
            return false;
        }
        let width = self.container_width;
        self.send(ViewerEvent::AnimationFrame {
            container_width: width,
        });
        true
    }

    /// Resolve the oldest manual load.
    pub fn complete_load(&mut self, ok: bool) -> bool {
        let Some(generation) = self.pending_loads.pop_front() else {
            return false;
        };
        self.send(Self::load_event(generation, ok));
        true
    }

    fn load_event(generation: u64, ok: bool) -> ViewerEvent {
        if ok {
            ViewerEvent::ImageLoaded { generation }
        } else {
            ViewerEvent::ImageFailed {
                generation,
                reason: "image failed to decode".to_owned(),
            }
        }
    }

    fn execute(&mut self, commands: Vec<HostCommand>) {
        for command in commands {
            self.outputs.commands.push(command.clone());
            match command {
                HostCommand::OpenTransport { url } => self.outputs.opened.push(url),
                HostCommand::CloseTransport => self.transport_open = false,
                HostCommand::ScheduleRetry { delay_ms, .. } => {
                    self.retry_due_ms = Some(self.clock.now_ms().saturating_add(delay_ms));
                }
                HostCommand::RequestAnimationFrame => self.frame_requested = true,
                HostCommand::LoadImage { generation, .. } => match self.load_policy {
                    LoadPolicy::Manual => self.pending_loads.push_back(generation),
                    policy => {
                        let event = Self::load_event(generation, policy == LoadPolicy::Succeed);
                        let next = self.viewer.dispatch(self.clock.now_ms(), event);
                        self.execute(next);
                    }
                },
                HostCommand::SetPointerCapture { pointer_id } => {
                    self.outputs.captured_pointer = Some(pointer_id);
                }
                HostCommand::ReleasePointerCapture { pointer_id } => {
                    if self.outputs.captured_pointer == Some(pointer_id) {
                        self.outputs.captured_pointer = None;
                    }
                }
            }
        }
    }

    fn paint(&mut self) {
        let next = self.viewer.snapshot();
        let patches = diff(self.painted.as_ref(), &next);
        if !patches.is_empty() {
            tracing::trace!(count = patches.len(), "dom patches");
        }
        self.outputs.patches.extend(patches);
        self.painted = Some(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumlview_core::CellMeasure;

    #[test]
    fn clock_advances_and_saturates() {
        let mut clock = DeterministicClock::new();
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now_ms(), 250);
        clock.set(Duration::MAX);
        clock.advance(Duration::from_millis(1));
        assert_eq!(clock.now_ms(), u64::MAX);
    }

    #[test]
    fn retry_timer_fires_only_when_due() {
        let mut host =
            WebViewerHost::new(ViewerConfig::default(), Box::new(CellMeasure::new(7.0))).unwrap();
        host.send(ViewerEvent::Start);
        host.send(ViewerEvent::TransportOpened);
        host.send(ViewerEvent::TransportClosed {
            code: 1006,
            clean: false,
            reason: String::new(),
        });
        assert_eq!(host.retry_due_ms(), Some(500));
        host.advance(Duration::from_millis(499));
        assert_eq!(host.outputs().opened.len(), 1);
        host.advance(Duration::from_millis(1));
        assert_eq!(host.outputs().opened.len(), 2);
        assert_eq!(host.retry_due_ms(), None);
    }
}
