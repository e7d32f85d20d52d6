//! Catalog file format.
//!
//! ```yaml
//! data_sources:
//!   - id: shop
//!     name: Shop DB
//!     containers:
//!       - name: public
//!         tables:
//!           - name: customers
//!             columns: [id, name]
//!             primary_key: [id]
//!           - name: orders
//!             columns:
//!               - id
//!               - { name: customer_id, type: bigint }
//!             primary_key: [id]
//!             foreign_keys:
//!               - name: fk_orders_customer
//!                 columns: [customer_id]
//!                 references: public.customers
//! ```
//!
//! Foreign key and alias targets are dotted paths below the data source root.
//! A bare name is first looked up in the owning container.

use super::Catalog;
use crate::error::{DiagramError, Result};
use crate::meta::{MetadataProvider, ObjectHandle, ObjectKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSpec {
    pub data_sources: Vec<DataSourceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub reachable: bool,
    #[serde(flatten)]
    pub contents: ContentsSpec,
}

fn default_true() -> bool {
    true
}

/// Objects directly inside a data source or container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentsSpec {
    pub containers: Vec<ContainerSpec>,
    pub tables: Vec<TableSpec>,
    pub views: Vec<TableSpec>,
    pub aliases: Vec<AliasSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    #[serde(flatten)]
    pub contents: ContentsSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeySpec>,
}

/// Column given either as a bare name or with details
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Name(String),
    Full {
        name: String,
        #[serde(rename = "type", default)]
        type_name: Option<String>,
        #[serde(default)]
        nullable: Option<bool>,
    },
}

impl ColumnSpec {
    pub fn name(&self) -> &str {
        match self {
            ColumnSpec::Name(name) => name,
            ColumnSpec::Full { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForeignKeySpec {
    pub name: Option<String>,
    pub columns: Vec<String>,
    /// Dotted path of the referenced table
    pub references: String,
    /// Referenced columns; defaults to the referenced primary key
    pub referenced_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasSpec {
    pub name: String,
    pub target: String,
}

/// Foreign keys and aliases wait until every table exists
enum Deferred<'a> {
    ForeignKey {
        data_source: ObjectHandle,
        container: ObjectHandle,
        owner: ObjectHandle,
        spec: &'a ForeignKeySpec,
        ordinal: usize,
    },
    Alias {
        data_source: ObjectHandle,
        container: ObjectHandle,
        spec: &'a AliasSpec,
    },
}

impl Catalog {
    /// Build a catalog from its file representation
    pub fn from_spec(spec: &CatalogSpec) -> Result<Self> {
        let mut catalog = Catalog::new();
        let mut deferred = Vec::new();

        for ds_spec in &spec.data_sources {
            let display = ds_spec.name.as_deref().unwrap_or(&ds_spec.id);
            let ds = catalog.add_data_source(&ds_spec.id, display);
            catalog.set_reachable(ds, ds_spec.reachable)?;
            catalog.add_contents(ds, ds, &ds_spec.contents, &mut deferred)?;
        }

        for item in deferred {
            match item {
                Deferred::ForeignKey {
                    data_source,
                    container,
                    owner,
                    spec,
                    ordinal,
                } => {
                    let referenced = catalog
                        .resolve_reference(data_source, container, &spec.references)
                        .ok_or_else(|| {
                            DiagramError::Catalog(format!(
                                "foreign key on '{}' references unknown table '{}'",
                                catalog.describe(owner),
                                spec.references
                            ))
                        })?;
                    let name = spec.name.clone().unwrap_or_else(|| {
                        format!("fk_{}_{}", catalog.object_name(owner), ordinal + 1)
                    });
                    let columns: Vec<&str> = spec.columns.iter().map(String::as_str).collect();
                    let referenced_columns: Vec<&str> =
                        spec.referenced_columns.iter().map(String::as_str).collect();
                    catalog.add_foreign_key(owner, &name, &columns, referenced, &referenced_columns)?;
                }
                Deferred::Alias {
                    data_source,
                    container,
                    spec,
                } => {
                    let target = catalog
                        .resolve_reference(data_source, container, &spec.target)
                        .ok_or_else(|| {
                            DiagramError::Catalog(format!(
                                "alias '{}' points at unknown object '{}'",
                                spec.name, spec.target
                            ))
                        })?;
                    catalog.add_alias(container, &spec.name, target)?;
                }
            }
        }

        Ok(catalog)
    }

    fn add_contents<'a>(
        &mut self,
        data_source: ObjectHandle,
        container: ObjectHandle,
        contents: &'a ContentsSpec,
        deferred: &mut Vec<Deferred<'a>>,
    ) -> Result<()> {
        for child in &contents.containers {
            let handle = self.add_container(container, &child.name)?;
            self.add_contents(data_source, handle, &child.contents, deferred)?;
        }

        let entities = contents
            .tables
            .iter()
            .map(|t| (t, ObjectKind::Table))
            .chain(contents.views.iter().map(|v| (v, ObjectKind::View)));
        for (table_spec, kind) in entities {
            let table = self.add_entity(container, &table_spec.name, kind)?;
            for column in &table_spec.columns {
                let name = column.name();
                let in_pk = table_spec
                    .primary_key
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(name));
                let (type_name, nullable) = match column {
                    ColumnSpec::Name(_) => ("int", !in_pk),
                    ColumnSpec::Full {
                        type_name,
                        nullable,
                        ..
                    } => (
                        type_name.as_deref().unwrap_or("int"),
                        nullable.unwrap_or(!in_pk),
                    ),
                };
                self.add_column(table, name, type_name, nullable)?;
            }
            let primary_key: Vec<&str> = table_spec.primary_key.iter().map(String::as_str).collect();
            self.set_primary_key(table, &primary_key)?;

            for (ordinal, fk) in table_spec.foreign_keys.iter().enumerate() {
                deferred.push(Deferred::ForeignKey {
                    data_source,
                    container,
                    owner: table,
                    spec: fk,
                    ordinal,
                });
            }
        }

        for alias in &contents.aliases {
            deferred.push(Deferred::Alias {
                data_source,
                container,
                spec: alias,
            });
        }

        Ok(())
    }

    /// Bare names are tried in `container` first, then below the data source
    fn resolve_reference(
        &self,
        data_source: ObjectHandle,
        container: ObjectHandle,
        path: &str,
    ) -> Option<ObjectHandle> {
        if !path.contains('.') {
            if let Ok(Some(handle)) = self.child_by_name(container, path) {
                return Some(handle);
            }
        }
        self.resolve_path(data_source, path)
    }

    fn object_name(&self, handle: ObjectHandle) -> String {
        self.name(handle).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::ConnectionProvider;

    const CATALOG: &str = r#"
data_sources:
  - id: shop
    name: Shop DB
    containers:
      - name: public
        tables:
          - name: orders
            columns:
              - id
              - { name: customer_id, type: bigint }
            primary_key: [id]
            foreign_keys:
              - columns: [customer_id]
                references: customers
          - name: customers
            columns: [id, name]
            primary_key: [id]
        views:
          - name: order_totals
            columns: [order_id, total]
        aliases:
          - name: clients
            target: public.customers
  - id: archive
    reachable: false
"#;

    #[test]
    fn test_load_yaml_catalog() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        let orders = catalog.find("shop", "public.orders").unwrap();
        let customers = catalog.find("shop", "public.customers").unwrap();

        // Forward reference to a table declared later
        let associations = catalog.associations(orders).unwrap();
        assert_eq!(associations.len(), 1);
        assert_eq!(associations[0].referenced, customers);
        assert_eq!(associations[0].name, "fk_orders_1");

        let attributes = catalog.attributes(orders).unwrap();
        assert_eq!(attributes[1].type_name, "bigint");

        let view = catalog.find("shop", "public.order_totals").unwrap();
        assert_eq!(catalog.kind(view).unwrap(), ObjectKind::View);

        let alias = catalog.find("shop", "public.clients").unwrap();
        assert_eq!(catalog.alias_target(alias).unwrap(), Some(customers));
    }

    #[test]
    fn test_unreachable_data_source() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        let archive = catalog.find_data_source("archive").unwrap();
        assert_eq!(catalog.display_name(archive), "archive");
        assert!(catalog.connect(archive).is_err());
    }

    #[test]
    fn test_unknown_reference_is_an_error() {
        let yaml = r#"
data_sources:
  - id: shop
    tables:
      - name: orders
        columns: [id, customer_id]
        foreign_keys:
          - columns: [customer_id]
            references: customers
"#;
        let err = Catalog::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown table 'customers'"));
    }
}
