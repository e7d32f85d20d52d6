//! Catalog loading and root selection shared by the commands.

use anyhow::{bail, Context, Result};
use erd_diagram::meta::{ConnectionProvider, ObjectHandle};
use erd_diagram::Catalog;
use std::fs;
use std::path::PathBuf;

pub struct CatalogSource {
    pub path: PathBuf,
    /// Data source id for DDL scripts
    pub data_source: String,
    /// Schema receiving the tables of DDL scripts
    pub schema: String,
}

impl CatalogSource {
    fn is_ddl(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("sql"))
    }

    pub fn load(&self) -> Result<Catalog> {
        if !self.path.exists() {
            bail!("catalog file does not exist: {}", self.path.display());
        }
        if !self.is_ddl() {
            return Catalog::load(&self.path)
                .with_context(|| format!("failed to load catalog {}", self.path.display()));
        }

        let sql = fs::read_to_string(&self.path)?;
        let mut catalog = Catalog::new();
        let ds = catalog.add_data_source(&self.data_source, &self.data_source);
        let schema = catalog.add_container(ds, &self.schema)?;
        let report = catalog.import_ddl(schema, &sql)?;
        for skipped in &report.skipped {
            eprintln!("Skipped: {}", skipped);
        }
        if report.tables == 0 && report.views == 0 {
            bail!("no CREATE TABLE statements found in {}", self.path.display());
        }
        Ok(catalog)
    }
}

/// Resolve `DATA_SOURCE[:dotted.path]` to a catalog object
pub fn parse_root(catalog: &Catalog, spec: &str) -> Result<ObjectHandle> {
    let (id, path) = match spec.split_once(':') {
        Some((id, path)) => (id, path),
        None => (spec, ""),
    };
    let Some(ds) = catalog.find_data_source(id) else {
        bail!("unknown data source '{}'", id);
    };
    match catalog.resolve_path(ds, path) {
        Some(handle) => Ok(handle),
        None => bail!("'{}' not found in data source '{}'", path, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root() {
        let catalog = Catalog::from_yaml(
            r#"
data_sources:
  - id: shop
    containers:
      - name: public
        tables:
          - name: orders
            columns: [id]
"#,
        )
        .unwrap();
        let ds = catalog.find_data_source("shop").unwrap();
        assert_eq!(parse_root(&catalog, "shop").unwrap(), ds);
        assert_eq!(
            parse_root(&catalog, "shop:public.orders").unwrap(),
            catalog.find("shop", "public.orders").unwrap()
        );
        assert!(parse_root(&catalog, "shop:public.missing").is_err());
        assert!(parse_root(&catalog, "other").is_err());
    }
}
