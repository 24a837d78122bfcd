//! Error types shared by the model, geometry and spatial layers

use thiserror::Error;

/// Errors reported by model mutation, geometry and contact detection
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Cycle or double parenting attempted in the element tree
    #[error("Structural error: {0}")]
    Structural(String),

    /// Reference to an unregistered element or node, or a duplicate id on insert
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Degenerate or unsupported geometric input
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Caller supplied tolerance outside its valid range
    #[error("Tolerance error: {0}")]
    Tolerance(String),

    /// Serialized model data that cannot be reconstructed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result alias used throughout the crate
pub type ModelResult<T> = Result<T, ModelError>;
