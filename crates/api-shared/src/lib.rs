//! # API Shared
//!
//! Shared utilities and definitions for the MediRx API.
//!
//! Contains:
//! - Request and response types with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - Bearer token parsing for authenticated routes
//!
//! Used by `api-rest`; kept free of core dependencies so clients can depend on the wire
//! types alone.

pub mod auth;
pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
