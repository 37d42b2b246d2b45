#![forbid(unsafe_code)]
//! Streaming primitives for wrapping an i3bar-protocol status producer.
//!
//! The crate provides:
//! - A chunk-fed reader for the two-line header + endless JSON array body.
//! - A single-slot mailbox that keeps only the most recent unread record.
//! - Field transformers keyed by `instance`/`name`, with generic wrappers for
//!   profiling, caching and injected latency.
//! - An emitter that re-frames transformed records, and the relay loop that
//!   ties all of it together.

mod config;
mod emitter;
mod error;
mod field;
mod mailbox;
mod reader;
mod relay;
mod space;
pub mod transform;

pub use config::{ReaderLimits, RelayOptions};
pub use emitter::{Emitter, RESTART_MARKER};
pub use error::{ProtocolError, RelayError, TransformError};
pub use field::{Field, Record};
pub use mailbox::Mailbox;
pub use reader::{ProtocolReader, ReaderPhase, StreamItem, HEADER_LINES};
pub use relay::{pump, Relay, RelayExit, RelayHandles};
pub use space::{format_space, SpaceUnits};
pub use transform::{FieldTransformer, TransformerRegistry};

/// Mailbox specialised to status records.
pub type RecordMailbox = Mailbox<Record>;
