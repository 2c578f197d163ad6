//! # API Shared
//!
//! Request and response types shared by the HIP HTTP API and its clients.
//!
//! Contains:
//! - JSON wire types with OpenAPI schemas (`dto` module)
//! - Conversions between wire types and `hip-core` domain types
//! - Shared services like `HealthService`

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
