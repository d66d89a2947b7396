//! # sprinkler-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a small **JSON API**: read-only views of zones, programs and the
//!   engine status, plus `POST /api/commands` accepting the controller's
//!   tagged [`Command`](sprinkler_app::commands::Command) enum
//! - Stream catalog snapshots from the update fan-out as **Server-Sent
//!   Events** on `/api/updates`
//! - Map [`SprinklerError`](sprinkler_domain::error::SprinklerError) into
//!   HTTP status codes with a structured JSON body
//!
//! ## Dependency rule
//! Depends on `sprinkler-app` (for the command handler and port traits) and
//! `sprinkler-domain` (for the error type). Never leaks axum types into the
//! domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
