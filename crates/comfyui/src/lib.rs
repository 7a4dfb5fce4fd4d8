//! Job client for an image-generation engine reached through the relay.
//!
//! Submits sanitized job templates, polls the engine's history until an
//! output artifact appears, and downloads it. Every HTTP exchange can be
//! mirrored into a caller-supplied [`log::LogSink`] so failures are
//! diagnosable without access to the relay.

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod job;
pub mod log;
pub mod poll;
