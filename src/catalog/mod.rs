//! In-memory metadata catalog.
//!
//! This module provides:
//! - An arena of data sources, containers, tables, views, columns, foreign
//!   keys and aliases addressed by [`ObjectHandle`]
//! - [`MetadataProvider`] and [`ConnectionProvider`] implementations over it
//! - Loading from a YAML/JSON catalog file and from SQL DDL

mod ddl;
mod spec;

pub use ddl::{extract_create_table_name, split_statements, DdlImport};
pub use spec::{
    AliasSpec, CatalogSpec, ColumnSpec, ContainerSpec, ContentsSpec, DataSourceSpec,
    ForeignKeySpec, TableSpec,
};

use crate::error::{DiagramError, MetaResult, MetadataError, Result};
use crate::meta::{
    AssociationInfo, AttributeInfo, ConnectionProvider, MetadataProvider, ObjectHandle, ObjectKind,
};
use ahash::AHashSet;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug)]
enum Detail {
    None,
    DataSource {
        id: String,
        display: String,
        reachable: bool,
    },
    Entity {
        primary_key: Vec<ObjectHandle>,
        foreign_keys: Vec<ObjectHandle>,
    },
    Attribute {
        type_name: String,
        nullable: bool,
    },
    ForeignKey {
        owner: ObjectHandle,
        referenced: ObjectHandle,
        columns: Vec<(ObjectHandle, ObjectHandle)>,
    },
    Alias {
        target: ObjectHandle,
    },
}

#[derive(Debug)]
struct CatalogObject {
    kind: ObjectKind,
    name: String,
    parent: Option<ObjectHandle>,
    /// Containers: sub-containers, entities and aliases. Entities: columns.
    children: Vec<ObjectHandle>,
    detail: Detail,
}

/// Metadata arena doubling as a connection registry
#[derive(Debug, Default)]
pub struct Catalog {
    objects: Vec<CatalogObject>,
    data_sources: Vec<ObjectHandle>,
    connected: RwLock<AHashSet<ObjectHandle>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog file; `.json` files are read as JSON, anything else as YAML
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let spec: CatalogSpec = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => serde_json::from_str(&content)?,
            _ => serde_yaml_ng::from_str(&content)?,
        };
        Ok(Self::from_spec(&spec)?)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let spec: CatalogSpec = serde_yaml_ng::from_str(content)?;
        Ok(Self::from_spec(&spec)?)
    }

    fn object(&self, handle: ObjectHandle) -> MetaResult<&CatalogObject> {
        self.objects
            .get(handle.0 as usize)
            .ok_or(MetadataError::UnknownHandle(handle))
    }

    fn object_mut(&mut self, handle: ObjectHandle) -> Result<&mut CatalogObject> {
        self.objects
            .get_mut(handle.0 as usize)
            .ok_or(DiagramError::Metadata(MetadataError::UnknownHandle(handle)))
    }

    fn push(
        &mut self,
        kind: ObjectKind,
        name: &str,
        parent: Option<ObjectHandle>,
        detail: Detail,
    ) -> ObjectHandle {
        let handle = ObjectHandle(self.objects.len() as u32);
        self.objects.push(CatalogObject {
            kind,
            name: name.to_string(),
            parent,
            children: Vec::new(),
            detail,
        });
        if let Some(parent) = parent {
            self.objects[parent.0 as usize].children.push(handle);
        }
        handle
    }

    fn expect_kind(&self, handle: ObjectHandle, expected: &'static str, ok: bool) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(self.wrong_kind(handle, expected))
        }
    }

    fn wrong_kind(&self, handle: ObjectHandle, expected: &'static str) -> DiagramError {
        DiagramError::Metadata(MetadataError::WrongKind {
            object: self.describe(handle),
            expected,
        })
    }

    fn describe(&self, handle: ObjectHandle) -> String {
        self.full_name(handle).unwrap_or_else(|_| handle.to_string())
    }

    /// Register a data source under a persistent id
    pub fn add_data_source(&mut self, id: &str, display_name: &str) -> ObjectHandle {
        let handle = self.push(
            ObjectKind::DataSource,
            display_name,
            None,
            Detail::DataSource {
                id: id.to_string(),
                display: display_name.to_string(),
                reachable: true,
            },
        );
        self.data_sources.push(handle);
        handle
    }

    /// Unreachable data sources fail to connect
    pub fn set_reachable(&mut self, data_source: ObjectHandle, reachable: bool) -> Result<()> {
        if let Detail::DataSource { reachable: r, .. } = &mut self.object_mut(data_source)?.detail {
            *r = reachable;
        } else {
            return Err(self.wrong_kind(data_source, "data source"));
        }
        if !reachable {
            self.write_connected().remove(&data_source);
        }
        Ok(())
    }

    pub fn add_container(&mut self, parent: ObjectHandle, name: &str) -> Result<ObjectHandle> {
        self.expect_kind(parent, "container", self.object(parent)?.kind.is_container())?;
        Ok(self.push(ObjectKind::Container, name, Some(parent), Detail::None))
    }

    /// Add an empty table or view
    pub fn add_entity(
        &mut self,
        parent: ObjectHandle,
        name: &str,
        kind: ObjectKind,
    ) -> Result<ObjectHandle> {
        self.expect_kind(parent, "container", self.object(parent)?.kind.is_container())?;
        if !kind.is_entity() {
            return Err(DiagramError::Catalog(format!(
                "cannot add '{}' as an entity: {} is not a table or view",
                name,
                kind.as_str()
            )));
        }
        Ok(self.push(
            kind,
            name,
            Some(parent),
            Detail::Entity {
                primary_key: Vec::new(),
                foreign_keys: Vec::new(),
            },
        ))
    }

    pub fn add_column(
        &mut self,
        entity: ObjectHandle,
        name: &str,
        type_name: &str,
        nullable: bool,
    ) -> Result<ObjectHandle> {
        self.expect_kind(entity, "table or view", self.object(entity)?.kind.is_entity())?;
        Ok(self.push(
            ObjectKind::Attribute,
            name,
            Some(entity),
            Detail::Attribute {
                type_name: type_name.to_string(),
                nullable,
            },
        ))
    }

    /// Table with `int` columns and the given primary key
    pub fn add_table(
        &mut self,
        parent: ObjectHandle,
        name: &str,
        columns: &[&str],
        primary_key: &[&str],
    ) -> Result<ObjectHandle> {
        let table = self.add_entity(parent, name, ObjectKind::Table)?;
        for column in columns {
            let nullable = !primary_key.contains(column);
            self.add_column(table, column, "int", nullable)?;
        }
        self.set_primary_key(table, primary_key)?;
        Ok(table)
    }

    pub fn set_primary_key(&mut self, entity: ObjectHandle, columns: &[&str]) -> Result<()> {
        let resolved = self.columns_by_name(entity, columns)?;
        if let Detail::Entity { primary_key, .. } = &mut self.object_mut(entity)?.detail {
            *primary_key = resolved;
            Ok(())
        } else {
            Err(self.wrong_kind(entity, "table or view"))
        }
    }

    fn columns_by_name(&self, entity: ObjectHandle, names: &[&str]) -> Result<Vec<ObjectHandle>> {
        names
            .iter()
            .map(|name| {
                self.child_by_name(entity, name)?.ok_or_else(|| {
                    DiagramError::Catalog(format!(
                        "column '{}' not found in '{}'",
                        name,
                        self.describe(entity)
                    ))
                })
            })
            .collect()
    }

    /// Add a foreign key from `owner` to `referenced`.
    ///
    /// Without `referenced_columns` the referenced primary key is used.
    pub fn add_foreign_key(
        &mut self,
        owner: ObjectHandle,
        name: &str,
        columns: &[&str],
        referenced: ObjectHandle,
        referenced_columns: &[&str],
    ) -> Result<ObjectHandle> {
        let local = self.columns_by_name(owner, columns)?;
        let remote = if referenced_columns.is_empty() {
            match &self.object(referenced)?.detail {
                Detail::Entity { primary_key, .. } => primary_key.clone(),
                _ => return Err(self.wrong_kind(referenced, "table or view")),
            }
        } else {
            self.columns_by_name(referenced, referenced_columns)?
        };
        if local.len() != remote.len() {
            return Err(DiagramError::Catalog(format!(
                "foreign key '{}' has {} columns but references {}",
                name,
                local.len(),
                remote.len()
            )));
        }

        let fk = self.push(
            ObjectKind::Constraint,
            name,
            Some(owner),
            Detail::ForeignKey {
                owner,
                referenced,
                columns: local.into_iter().zip(remote).collect(),
            },
        );
        // Constraints are not listed among entity children
        self.objects[owner.0 as usize].children.retain(|&c| c != fk);
        if let Detail::Entity { foreign_keys, .. } = &mut self.object_mut(owner)?.detail {
            foreign_keys.push(fk);
        }
        Ok(fk)
    }

    pub fn add_alias(
        &mut self,
        parent: ObjectHandle,
        name: &str,
        target: ObjectHandle,
    ) -> Result<ObjectHandle> {
        self.expect_kind(parent, "container", self.object(parent)?.kind.is_container())?;
        self.object(target)?;
        Ok(self.push(ObjectKind::Alias, name, Some(parent), Detail::Alias { target }))
    }

    /// Resolve a dotted path (`public.orders`) below `root`
    pub fn resolve_path(&self, root: ObjectHandle, path: &str) -> Option<ObjectHandle> {
        let mut current = root;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = self.child_by_name(current, segment).ok()??;
        }
        Some(current)
    }

    /// Object at `path` inside the data source registered as `id`
    pub fn find(&self, id: &str, path: &str) -> Option<ObjectHandle> {
        let data_source = self.find_data_source(id)?;
        self.resolve_path(data_source, path)
    }

    pub fn data_sources(&self) -> &[ObjectHandle] {
        &self.data_sources
    }

    fn read_connected(&self) -> std::sync::RwLockReadGuard<'_, AHashSet<ObjectHandle>> {
        self.connected.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_connected(&self) -> std::sync::RwLockWriteGuard<'_, AHashSet<ObjectHandle>> {
        self.connected.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl MetadataProvider for Catalog {
    fn kind(&self, handle: ObjectHandle) -> MetaResult<ObjectKind> {
        Ok(self.object(handle)?.kind)
    }

    fn name(&self, handle: ObjectHandle) -> MetaResult<String> {
        Ok(self.object(handle)?.name.clone())
    }

    fn full_name(&self, handle: ObjectHandle) -> MetaResult<String> {
        let mut parts = Vec::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            let object = self.object(h)?;
            if object.kind == ObjectKind::DataSource {
                break;
            }
            parts.push(object.name.as_str());
            current = object.parent;
        }
        parts.reverse();
        Ok(parts.join("."))
    }

    fn parent(&self, handle: ObjectHandle) -> MetaResult<Option<ObjectHandle>> {
        Ok(self.object(handle)?.parent)
    }

    fn children(&self, container: ObjectHandle) -> MetaResult<Vec<ObjectHandle>> {
        let object = self.object(container)?;
        if !object.kind.is_container() {
            return Err(MetadataError::WrongKind {
                object: self.describe(container),
                expected: "container",
            });
        }
        Ok(object.children.clone())
    }

    fn child_by_name(
        &self,
        container: ObjectHandle,
        name: &str,
    ) -> MetaResult<Option<ObjectHandle>> {
        let object = self.object(container)?;
        let children = &object.children;
        // Exact match first, then case-insensitive
        let exact = children
            .iter()
            .copied()
            .find(|&c| self.objects[c.0 as usize].name == name);
        Ok(exact.or_else(|| {
            children
                .iter()
                .copied()
                .find(|&c| self.objects[c.0 as usize].name.eq_ignore_ascii_case(name))
        }))
    }

    fn alias_target(&self, alias: ObjectHandle) -> MetaResult<Option<ObjectHandle>> {
        match self.object(alias)?.detail {
            Detail::Alias { target } => Ok(Some(target)),
            _ => Ok(None),
        }
    }

    fn attributes(&self, entity: ObjectHandle) -> MetaResult<Vec<AttributeInfo>> {
        let object = self.object(entity)?;
        let (primary_key, foreign_keys) = match &object.detail {
            Detail::Entity {
                primary_key,
                foreign_keys,
            } => (primary_key, foreign_keys),
            _ => {
                return Err(MetadataError::WrongKind {
                    object: self.describe(entity),
                    expected: "table or view",
                })
            }
        };

        let fk_columns: AHashSet<ObjectHandle> = foreign_keys
            .iter()
            .filter_map(|&fk| match &self.objects[fk.0 as usize].detail {
                Detail::ForeignKey { columns, .. } => Some(columns.iter().map(|(c, _)| *c)),
                _ => None,
            })
            .flatten()
            .collect();

        object
            .children
            .iter()
            .map(|&column| {
                let col = self.object(column)?;
                let (type_name, nullable) = match &col.detail {
                    Detail::Attribute {
                        type_name,
                        nullable,
                    } => (type_name.clone(), *nullable),
                    _ => (String::new(), true),
                };
                Ok(AttributeInfo {
                    handle: column,
                    name: col.name.clone(),
                    type_name,
                    in_primary_key: primary_key.contains(&column),
                    in_foreign_key: fk_columns.contains(&column),
                    nullable,
                })
            })
            .collect()
    }

    fn associations(&self, entity: ObjectHandle) -> MetaResult<Vec<AssociationInfo>> {
        let foreign_keys = match &self.object(entity)?.detail {
            Detail::Entity { foreign_keys, .. } => foreign_keys,
            _ => {
                return Err(MetadataError::WrongKind {
                    object: self.describe(entity),
                    expected: "table or view",
                })
            }
        };

        foreign_keys
            .iter()
            .map(|&fk| {
                let object = self.object(fk)?;
                match &object.detail {
                    Detail::ForeignKey {
                        owner,
                        referenced,
                        columns,
                    } => Ok(AssociationInfo {
                        constraint: fk,
                        name: object.name.clone(),
                        owner: *owner,
                        referenced: *referenced,
                        columns: columns.iter().map(|(c, _)| *c).collect(),
                    }),
                    _ => Err(MetadataError::UnknownHandle(fk)),
                }
            })
            .collect()
    }

    fn referenced_attribute(
        &self,
        constraint: ObjectHandle,
        attribute: ObjectHandle,
    ) -> MetaResult<Option<ObjectHandle>> {
        match &self.object(constraint)?.detail {
            Detail::ForeignKey { columns, .. } => Ok(columns
                .iter()
                .find(|(local, _)| *local == attribute)
                .map(|(_, remote)| *remote)),
            _ => Err(MetadataError::WrongKind {
                object: self.describe(constraint),
                expected: "foreign key",
            }),
        }
    }
}

impl ConnectionProvider for Catalog {
    fn find_data_source(&self, id: &str) -> Option<ObjectHandle> {
        self.data_sources.iter().copied().find(|&ds| {
            matches!(&self.objects[ds.0 as usize].detail, Detail::DataSource { id: ds_id, .. } if ds_id == id)
        })
    }

    fn data_source_id(&self, data_source: ObjectHandle) -> MetaResult<String> {
        match &self.object(data_source)?.detail {
            Detail::DataSource { id, .. } => Ok(id.clone()),
            _ => Err(MetadataError::WrongKind {
                object: self.describe(data_source),
                expected: "data source",
            }),
        }
    }

    fn is_connected(&self, data_source: ObjectHandle) -> bool {
        self.read_connected().contains(&data_source)
    }

    fn connect(&self, data_source: ObjectHandle) -> MetaResult<()> {
        match &self.object(data_source)?.detail {
            Detail::DataSource {
                reachable: true, ..
            } => {
                self.write_connected().insert(data_source);
                Ok(())
            }
            Detail::DataSource { display, .. } => Err(MetadataError::Connect {
                name: display.clone(),
                reason: "data source is unreachable".to_string(),
            }),
            _ => Err(MetadataError::WrongKind {
                object: self.describe(data_source),
                expected: "data source",
            }),
        }
    }

    fn display_name(&self, data_source: ObjectHandle) -> String {
        match self.objects.get(data_source.0 as usize).map(|o| &o.detail) {
            Some(Detail::DataSource { display, .. }) => display.clone(),
            _ => data_source.to_string(),
        }
    }
}
