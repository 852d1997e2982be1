//! Builders to construct the tracker registry from configuration.

pub mod registry_builder;

pub use registry_builder::build_registry;
