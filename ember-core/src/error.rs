//! Error types shared across the crate.
//!
//! Only construction-time failures surface as `Err` values. Failures inside a
//! running effect, a resource fetch or a reconciliation pass are contained at
//! that boundary and reported through `tracing` instead.

use thiserror::Error;

use crate::dom::NodeId;

/// Errors raised by the reactive runtime.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// A memo's derivation failed before it produced a first value.
    #[error("memo derivation failed during its initial run")]
    MemoInit,

    /// The runtime backing a handle has already been dropped.
    #[error("reactive runtime has been dropped")]
    RuntimeDropped,
}

/// Errors raised when mounting a view onto a document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MountError {
    /// The target node does not exist in the document.
    #[error("mount target {0:?} does not exist")]
    UnknownNode(NodeId),

    /// The target node is a text node.
    #[error("mount target {0:?} is not an element")]
    NotAnElement(NodeId),

    /// The target node is not attached to the document root.
    #[error("mount target {0:?} is not connected to the document")]
    Detached(NodeId),
}

/// Errors raised while parsing server-rendered markup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("invalid tag name at byte {0}")]
    InvalidTag(usize),

    #[error("closing tag </{found}> does not match open <{expected}>")]
    MismatchedClose { expected: String, found: String },

    #[error("closing tag </{0}> has no open element")]
    StrayClose(String),

    #[error("element <{0}> is never closed")]
    Unclosed(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown EMBER_ENV value `{0}`")]
    UnknownEnvironment(String),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
