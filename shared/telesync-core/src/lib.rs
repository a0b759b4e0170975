//! Telesync Core - Shared domain types and service infrastructure
//!
//! This crate provides:
//! - Telemetry domain primitives (MetricId, Timestamp, SeriesPoint)
//! - Standard service trait all binaries implement
//! - Error handling utilities
//! - Configuration management

pub mod config;
pub mod domain;
pub mod error;
pub mod service;

pub use config::{env_or, ServiceConfig};
pub use domain::*;
pub use error::{CoreError, Result};
pub use service::{Liveness, Readiness, ReadinessCheck, ServiceRuntime, TelesyncService};
