//! Core domain types, errors, and events for `convoy`.
//!
//! This crate establishes the foundational building blocks used throughout
//! the workspace:
//!
//! - **`errors`**: the primary `Error` enum and `Result` type alias,
//!   centralizing all failure modes for predictable error handling.
//! - **`events`**: the progress event types and the broadcast-backed
//!   `EventBus` that carries them to reporting sinks.
//!
//! Note that execution failures (a process exiting non-zero) are *not*
//! errors here: they are data, surfaced as a task reaching its failed
//! status. The `Error` type covers construction and misuse failures only.

pub mod errors;
pub mod events;

pub use self::{
    errors::{Error, Result, ResultExt},
    events::{Event, EventBus, RunEvent, RunTally, TaskEvent},
};
