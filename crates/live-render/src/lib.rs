//! live-render — incremental UI diff-rendering engine.
//!
//! Reconstructs complete markup text from an initial full payload plus a
//! stream of small structured diff messages delivered in order over a
//! persistent connection, without ever receiving a full re-render.
//!
//! The engine is a library with no transport of its own: the embedder
//! feeds decoded JSON messages into a [`RenderSession`] one at a time and
//! receives the published document back. The same code drives both the
//! real client and load-testing harnesses that must reproduce the
//! client's rendering behavior exactly.

pub mod merge;
pub mod node;
pub mod registry;
pub mod render;
pub mod session;
pub mod shell;
pub mod templates;
pub mod wire;

pub use node::{DynKey, Dynamics, Node, Statics};
pub use registry::ComponentRegistry;
pub use session::RenderSession;
pub use shell::{ShellDoc, ShellError};
pub use wire::{DiffMessage, Event, WireError};

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
