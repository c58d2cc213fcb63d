//! Self-hosted marathon training log.
//!
//! The binary serves the HTTP API (authentication plus per-user training
//! records); the [`client`] module provides the gateway traits, an HTTP
//! implementation of them, and the application-state controller a front-end
//! embeds.

pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod pace;
pub mod records;
pub mod state;
