//! blobcheck library -- blob service binding diagnostics.
//!
//! This crate resolves a platform-injected blob service binding, builds
//! an S3-compatible client for it, and serves two diagnostic endpoints:
//! `/info`, which describes the deployment, and `/ping`, which proves the
//! binding works with an upload/download/delete round trip.

pub mod binding;
pub mod checker;
pub mod config;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod sniff;
pub mod storage;

use crate::binding::ServiceDescriptor;
use crate::checker::RoundTripChecker;
use crate::config::Config;

/// Shared application state passed to all handlers via `axum::extract::State`.
///
/// Built once at startup and never mutated afterwards.
pub struct AppState {
    /// Service configuration.
    pub config: Config,
    /// What `/info` reports.
    pub descriptor: ServiceDescriptor,
    /// Round-trip checker holding the shared storage handle.
    pub checker: RoundTripChecker,
}
