//! # Errors
//!
//! Error taxonomy shared by the translator, the generator and the module
//! tooling.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while translating graphs or generating library modules
#[derive(Debug, Error)]
pub enum Error {
    /// A host node could not be classified into any known role
    #[error("unsupported MDL type: {message}")]
    UnsupportedMdlType {
        message: String,
        /// Definition id of the offending host node, when known
        node_id: Option<String>,
    },

    /// Overload lookup found no matching node definition, even after a reload
    #[error("missing MaterialX type: {0}")]
    MissingMaterialXType(String),

    /// The translation produced no material or output at all
    #[error("invalid graph type: {0}")]
    InvalidGraphType(String),

    /// Structural inconsistency in the host graph or the produced document
    #[error("MDL to MaterialX conversion failed: {0}")]
    MdlToMaterialX(String),

    /// Malformed qualified name or missing module source
    #[error("module error: {0}")]
    Module(String),

    /// Omission while generating MDL in strict mode, or an unrecoverable
    /// nodegraph compilation failure
    #[error("MDL generation failed: {0}")]
    MdlGeneration(String),

    /// No entry in the type table for the given type name
    #[error("no type mapping for '{0}'")]
    MissingTypeMapping(String),

    /// Malformed portable document
    #[error("document error: {0}")]
    Document(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::UnsupportedMdlType {
            message: message.into(),
            node_id: None,
        }
    }

    pub fn unsupported_node(message: impl Into<String>, node_id: impl Into<String>) -> Self {
        Error::UnsupportedMdlType {
            message: message.into(),
            node_id: Some(node_id.into()),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
