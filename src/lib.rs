// Entity type registry
pub mod schema;

// Entity store and CRUD state transitions
pub mod store;

// Type/attribute filtering over the store
pub mod query;

// Request/response envelope and error taxonomy
pub mod protocol;

// Request routing for the primary and legacy management addresses
pub mod agent;

// HTTP binding of the management addresses
pub mod api;

// Daemon configuration
pub mod config;
