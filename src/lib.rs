//! Pollcord client library.
//!
//! A polling-based sync and notification engine for chat channels behind
//! an HTTP relay, plus the pieces of a small terminal front end. This
//! module re-exports the core components for testing and extension.

pub mod backend;
pub mod buffer;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod grouping;
pub mod logging;
pub mod model;
pub mod notification;
pub mod protocol;
pub mod reconcile;
pub mod relay;
pub mod render;
pub mod session;
pub mod sorter;
pub mod state;
pub mod typing;
pub mod validation;

#[cfg(test)]
mod fake_relay;
