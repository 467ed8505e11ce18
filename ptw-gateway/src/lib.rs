//! Edge gateway for the PTW analysis frontend.
//!
//! Serves the built single-page application from a sandboxed static root
//! and tunnels everything under `/api/` to the backend analysis service, so
//! the browser only ever talks to one origin.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod proxy;
pub mod routes;
pub mod static_files;
