//! tfplug - Terraform Plugin Framework for Rust
//!
//! The provider-facing half of a Terraform plugin: async provider, resource
//! and data source traits, the dynamic value model, schema-driven validation
//! and planning, and an in-process host that drives the lifecycle.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod defaults;
pub mod import;
pub mod logging;
pub mod plan_modifier;
pub mod validator;

pub mod host;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceFactory, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use host::ProviderHost;
pub use import::import_state_passthrough_id;
pub use logging::{init_logging, init_logging_with_default, try_init_logging, LogLevel};
pub use provider::{Provider, ProviderMetadataRequest, ProviderMetadataResponse};
pub use resource::{Resource, ResourceFactory, ResourceWithConfigure, ResourceWithImportState};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
