//! Metadata collaborator interfaces.
//!
//! The diagram engine never owns database metadata. It talks to:
//! - a [`MetadataProvider`] that enumerates containers, entities, attributes and
//!   foreign-key associations,
//! - a [`ConnectionProvider`] that resolves persisted data-source ids and
//!   connects on demand.
//!
//! Every metadata object is addressed by an [`ObjectHandle`]. Equality and
//! hashing of handles is identity: two handles are equal only if they address
//! the same provider object, regardless of names.

mod filter;

pub use filter::{FilterSet, NameFilter};

use crate::error::{MetaResult, MetadataError};
use std::fmt;

/// Identity of a metadata object owned by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u32);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle({})", self.0)
    }
}

/// Classification of a metadata object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Root of a connection
    DataSource,
    /// Catalog or schema
    Container,
    Table,
    View,
    /// Synonym pointing at another object
    Alias,
    /// Column of a table or view
    Attribute,
    /// Foreign key constraint
    Constraint,
}

impl ObjectKind {
    /// Tables and views become diagram entities
    pub fn is_entity(self) -> bool {
        matches!(self, ObjectKind::Table | ObjectKind::View)
    }

    /// Objects whose children may be enumerated while flattening
    pub fn is_container(self) -> bool {
        matches!(self, ObjectKind::DataSource | ObjectKind::Container)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::DataSource => "data source",
            ObjectKind::Container => "container",
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
            ObjectKind::Alias => "alias",
            ObjectKind::Attribute => "attribute",
            ObjectKind::Constraint => "constraint",
        }
    }
}

/// Column description returned by [`MetadataProvider::attributes`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub handle: ObjectHandle,
    pub name: String,
    pub type_name: String,
    pub in_primary_key: bool,
    pub in_foreign_key: bool,
    pub nullable: bool,
}

/// Raw foreign-key association exposed by an entity.
///
/// `owner` is the referencing entity (foreign-key side), `referenced` the
/// entity holding the referenced key. `columns` are the referencing
/// attributes in constraint order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationInfo {
    pub constraint: ObjectHandle,
    pub name: String,
    pub owner: ObjectHandle,
    pub referenced: ObjectHandle,
    pub columns: Vec<ObjectHandle>,
}

/// Read access to database metadata.
pub trait MetadataProvider {
    fn kind(&self, handle: ObjectHandle) -> MetaResult<ObjectKind>;

    fn name(&self, handle: ObjectHandle) -> MetaResult<String>;

    /// Fully qualified name, e.g. `public.orders`
    fn full_name(&self, handle: ObjectHandle) -> MetaResult<String>;

    fn parent(&self, handle: ObjectHandle) -> MetaResult<Option<ObjectHandle>>;

    /// Direct children of a data source or container, in natural order
    fn children(&self, container: ObjectHandle) -> MetaResult<Vec<ObjectHandle>>;

    fn child_by_name(&self, container: ObjectHandle, name: &str)
        -> MetaResult<Option<ObjectHandle>>;

    fn alias_target(&self, alias: ObjectHandle) -> MetaResult<Option<ObjectHandle>>;

    /// Attributes of an entity in natural column order
    fn attributes(&self, entity: ObjectHandle) -> MetaResult<Vec<AttributeInfo>>;

    /// Foreign keys owned by an entity
    fn associations(&self, entity: ObjectHandle) -> MetaResult<Vec<AssociationInfo>>;

    /// Referenced attribute for a referencing attribute of `constraint`
    fn referenced_attribute(
        &self,
        constraint: ObjectHandle,
        attribute: ObjectHandle,
    ) -> MetaResult<Option<ObjectHandle>>;

    /// Data source owning `handle`, found by walking parents
    fn data_source(&self, handle: ObjectHandle) -> MetaResult<ObjectHandle> {
        let mut current = handle;
        loop {
            if self.kind(current)? == ObjectKind::DataSource {
                return Ok(current);
            }
            current = self
                .parent(current)?
                .ok_or_else(|| MetadataError::Lookup(format!("{} has no data source", current)))?;
        }
    }
}

/// Connection management for persisted data sources.
pub trait ConnectionProvider {
    /// Data source registered under a persistent id
    fn find_data_source(&self, id: &str) -> Option<ObjectHandle>;

    /// Persistent id of a data source
    fn data_source_id(&self, data_source: ObjectHandle) -> MetaResult<String>;

    fn is_connected(&self, data_source: ObjectHandle) -> bool;

    fn connect(&self, data_source: ObjectHandle) -> MetaResult<()>;

    /// Human-readable name used in diagnostics
    fn display_name(&self, data_source: ObjectHandle) -> String;
}
