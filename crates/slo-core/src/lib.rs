//! Core library for the Reliably SLO tooling
//!
//! This crate provides the core functionality for:
//! - Objective/Indicator entity model and manifest handling
//! - Metric providers (AWS CloudWatch, GCP Cloud Monitoring, Datadog)
//! - The periodic indicator agent
//! - The entity service HTTP client
//! - SLO reports and their renderings

pub mod agent;
pub mod client;
pub mod duration;
pub mod entities;
pub mod manifest;
pub mod observability;
pub mod providers;
pub mod report;
pub mod settings;

pub use duration::{DurationError, IsoDuration, MachineDuration};
pub use entities::{
    entity_id, Entity, Indicator, Labels, Metadata, NodeGraph, Objective, ObjectiveResult,
};
pub use manifest::Manifest;
pub use observability::{init_logging, AgentLogger, LogFormat};
pub use settings::Settings;

/// API version stamped on every entity pushed by this crate
pub const API_VERSION: &str = "reliably.com/v1";

/// Version of the tooling, used in user-agents and templates
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
