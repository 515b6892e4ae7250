//! Event renderers: consumers of an [`crate::bus::EventReceiver`] that turn
//! the structured event stream into some human- or machine-facing output.
//! `kiln-core` depends on none of these -- a renderer is wired in by
//! whatever embeds the build (a CLI, a CI log uploader, a TUI) by
//! subscribing to the same [`crate::bus::EventBus`] the executor emits to.

mod cli;
mod json;

pub use cli::{CliRenderer, CliRendererConfig};
pub use json::JsonRenderer;
