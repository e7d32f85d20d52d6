//! Error types shared across the crate.

use crate::meta::ObjectHandle;
use thiserror::Error;

/// Failure reported by a metadata or connection provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("unknown object handle {0}")]
    UnknownHandle(ObjectHandle),
    #[error("{object} is not a {expected}")]
    WrongKind { object: String, expected: &'static str },
    #[error("cannot connect to '{name}': {reason}")]
    Connect { name: String, reason: String },
    #[error("{0}")]
    Lookup(String),
}

pub type MetaResult<T> = std::result::Result<T, MetadataError>;

/// Hard failures. Everything recoverable is recorded as a diagnostic instead.
#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("diagram document has no version attribute")]
    MissingVersion,
    #[error("unsupported diagram version '{0}'")]
    UnsupportedVersion(String),
    #[error("root element is <{0}>, expected <diagram>")]
    UnexpectedRoot(String),
    #[error("malformed diagram document: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("failed to write diagram document: {0}")]
    Write(#[from] quick_xml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("invalid catalog: {0}")]
    Catalog(String),
    #[error("node {0} is not part of the diagram")]
    MissingNode(crate::diagram::NodeId),
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, DiagramError>;
