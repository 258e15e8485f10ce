//! Concrete report sinks

pub mod console;
pub mod document;

pub use console::{color_enabled, ConsoleSink};
pub use document::DocumentSink;
