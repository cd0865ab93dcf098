#![forbid(unsafe_code)]

//! Browser frontend for the pumlview live diagram viewer.
//!
//! - [`surface`]: DOM patch diffing between two surface snapshots.
//! - [`host`]: a deterministic native host that plays the browser's part,
//!   used by tests and replay tooling.
//! - `wasm` (wasm32 only): `PumlViewerWeb`, the `wasm-bindgen` export the
//!   page script drives.

pub mod host;
pub mod surface;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::PumlViewerWeb;

pub use host::{DeterministicClock, LoadPolicy, WebOutputs, WebViewerHost};
pub use surface::{DomNode, DomPatch, diff};
