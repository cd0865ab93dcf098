#![forbid(unsafe_code)]

//! Core: connection lifecycle, status projection, filename truncation, image
//! stage, and pan/zoom gestures for the pumlview live diagram viewer.
//!
//! # Role in pumlview
//! `pumlview-core` owns every piece of client-side state. It is host-agnostic:
//! no sockets, timers, or DOM access. The embedding host (the browser through
//! `pumlview-web`, or a test harness) pushes events in and executes the
//! [`HostCommand`](viewer::HostCommand)s that come back out.
//!
//! # Primary responsibilities
//! - **ConnectionManager**: websocket lifecycle with capped exponential backoff.
//! - **StatusIndicator**: pure projection of connection + freshness into text/style.
//! - **FilenameDisplay**: width-bounded, ellipsis-prefixed filename rendering
//!   with immediate and deferred (post-layout) modes.
//! - **ImageStage**: placeholder/image swap and the "ever loaded" flag.
//! - **PanZoomController**: click-vs-drag discrimination driving zoom and pan.
//!
//! # How it fits in the system
//! [`viewer::Viewer`] owns a single [`viewer::ViewerState`] and routes host
//! events to the five components. `pumlview-web` turns the viewer's
//! [`viewer::SurfaceSnapshot`] into DOM patches.

pub mod config;
pub mod connection;
pub mod filename;
pub mod geometry;
pub mod logging;
pub mod panzoom;
pub mod protocol;
pub mod retry;
pub mod stage;
pub mod status;
pub mod viewer;

pub use config::{ConfigError, FramingPolicy, ViewerConfig};
pub use connection::{ConnectionManager, ConnectionState};
pub use filename::{CellMeasure, ContainerLayout, FilenameDisplay, TextMeasure, truncate_filename};
pub use geometry::{Pan, PointerPosition};
pub use panzoom::{CLICK_THRESHOLD_PX, GestureState, PanZoomController, PanZoomMode, PointerButton};
pub use protocol::{DiagramPayload, ImageSource, InboundFrame};
pub use stage::{ImageStage, PresentTicket};
pub use status::{StatusStyle, StatusView, project_status};
pub use viewer::{
    HostCommand, Introspection, SurfaceSnapshot, Viewer, ViewerEvent, ViewerState,
};
