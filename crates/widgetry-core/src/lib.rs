//! Widgetry Core - Engine for pluggable widget-list content
//!
//! This crate provides the core functionality:
//! - Fields: declarative field descriptors with validation and form specs
//! - Registry: name-keyed widget-class definitions, atomic reload
//! - Runtime: configuration validation and render pipelines
//! - Ordering: dense zero-based widget positioning within a list
//! - Store: SQLite-backed persistence for lists and widget instances
//! - Service: list-level operations composed for the external boundary
//! - Feed: bounded-timeout RSS/Atom client for the feed widget class

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A JSON object, used for configuration documents and render props.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Error types shared across the framework
pub mod error;

/// Field descriptors - validation, serialization and form specs
pub mod fields;

/// Widget class registry and built-in classes
pub mod registry;

/// Widget class runtime - validation and render pipelines
pub mod runtime;

/// List ordering engine - dense position management
pub mod ordering;

/// SQLite persistence
pub mod store;

/// Widget list service
pub mod service;

/// RSS/Atom feed client
pub mod feed;

/// Framework configuration
pub mod config;

/// Convenience re-export of the error types
pub use error::{FieldError, WidgetError, WidgetResult};

/// Convenience re-export of field descriptor types
pub use fields::{Choice, FieldBinding, FieldDescriptor, FieldKind, FormFieldSpec};

/// Convenience re-export of the registry
pub use registry::{Registry, SharedRegistry, WidgetClass};

/// Convenience re-export of runtime types
pub use runtime::{
    Rendered, RenderedWidget, RuntimeContext, StaticUserDirectory, UserDirectory, UserRecord,
};

/// Convenience re-export of the store
pub use store::{Store, WidgetRow};

/// Convenience re-export of the service
pub use service::{WidgetDetails, WidgetService};

/// Convenience re-export of feed types
pub use feed::{FeedEntry, FeedSource, HttpFeedSource, StaticFeedSource};

/// Convenience re-export of the configuration
pub use config::WidgetryConfig;
