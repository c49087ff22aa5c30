//! Server internals for `uidpool-server`.
//!
//! ## Structure
//!
//! - [`config`] - CLI/env configuration and validation.
//! - [`handler`] - HTTP routes over the shared pool.
//! - [`reports`] - Logs and metrics for background maintenance.
//! - [`source`] - Redis counter backed identifier source.
//! - [`telemetry`] - Console logging and optional OpenTelemetry export.

pub mod config;
pub mod handler;
pub mod reports;
pub mod source;
pub mod telemetry;
