//! Z-Image relay server library.
//!
//! A stateless HTTP relay in front of one image-generation engine. It maps
//! a fixed set of routes onto the engine's endpoints, attaches permissive
//! cross-origin headers to every response and turns every fault into a
//! JSON error envelope.

pub mod config;
pub mod error;
pub mod router;
pub mod routes;
pub mod state;
