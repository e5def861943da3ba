//! Core library for a Kubernetes custom metrics adapter
//!
//! This crate provides:
//! - A regenerating resource ↔ kind mapping cache fed by API discovery
//! - Normalization of caller-spelled metric identities
//! - An in-memory metric store with selector-based resolution
//! - A static external metric index
//! - Metrics providers, health checks and observability

pub mod clock;
pub mod error;
pub mod external;
pub mod health;
pub mod identity;
pub mod labels;
pub mod mapper;
pub mod models;
pub mod observability;
pub mod provider;
pub mod store;

pub use error::{AdapterError, ErrorClass, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use identity::{IdentityNormalizer, NormalizedIdentity};
pub use labels::{LabelSet, Selector};
pub use models::*;
pub use observability::{AdapterMetrics, StructuredLogger};
