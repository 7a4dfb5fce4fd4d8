//! Domain layer for the z-image generation client and relay.
//!
//! Holds the job-template graph model, the built-in SDXL-Turbo template,
//! the template sanitizer and the artifact addressing types shared by the
//! job client and the relay. Nothing in this crate performs I/O.

pub mod error;
pub mod request;
pub mod sanitizer;
pub mod template;
pub mod types;
