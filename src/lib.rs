//! wayfind
//!
//! An HTTP service that turns a user-supplied location into a structured,
//! validated multiple-choice exploration instruction generated by a remote
//! chat-completion backend, tracked across short-lived sessions.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP API with boundary validation and rate
//!   limiting
//! - **Pipeline**: [`pipeline::ExplorationService`] orchestrating sessions
//!   and generation per endpoint
//! - **Session Store**: concurrent in-memory map with touch-on-access and
//!   periodic expiry sweeping
//! - **Generator**: single-shot chat-completion client with strict
//!   structural validation of the returned instruction
//!
//! # Modules
//!
//! - [`config`]: CLI/env configuration surface
//! - [`error`]: error taxonomy and HTTP mapping
//! - [`generator`]: instruction generation and validation
//! - [`limit`]: per-client sliding-window rate limiting
//! - [`pipeline`]: endpoint orchestration
//! - [`server`]: router and handlers
//! - [`session`]: session records and store

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod error;
pub mod generator;
pub mod limit;
pub mod pipeline;
pub mod server;
pub mod session;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::limit::RateLimiter;
use crate::pipeline::ExplorationService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Endpoint orchestration over the session store and generator.
    pub service: Arc<ExplorationService>,
    /// Per-client request admission.
    pub limiter: Arc<RateLimiter>,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish()
    }
}
