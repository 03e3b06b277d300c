//! Voltron: a small persistence library over pluggable backends.
//!
//! See [`db`] for the connection manager, adapters and models. The `cli`
//! feature adds a command-line front end for inspecting resources.

#[cfg(feature = "cli")]
pub mod cli;
pub mod db;
