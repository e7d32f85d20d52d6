//! YAML configuration for diagram building.
//!
//! ```yaml
//! attribute_visibility: keys
//! allow_duplicates: false
//! exclude_views: true
//! filters:
//!   default:
//!     exclude: ["tmp_*"]
//!   containers:
//!     public:
//!       include: ["order*", "customer*"]
//! ```

use crate::diagram::AttributeVisibility;
use crate::meta::FilterSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    /// Columns shown on newly added entities
    pub attribute_visibility: AttributeVisibility,
    /// Allow the same entity to appear more than once
    pub allow_duplicates: bool,
    /// Skip views while flattening containers
    pub exclude_views: bool,
    /// Name filters applied to container children
    pub filters: FilterSet,
}

impl DiagramConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let mut config: DiagramConfig = serde_yaml_ng::from_str(content)?;
        config.filters.compile();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
attribute_visibility: keys
exclude_views: true
filters:
  default:
    exclude: ["tmp_*"]
  containers:
    public:
      include: ["order*"]
"#;
        let config = DiagramConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.attribute_visibility, AttributeVisibility::Keys);
        assert!(config.exclude_views);
        assert!(!config.allow_duplicates);
        assert!(config.filters.admits("public", "orders"));
        assert!(!config.filters.admits("public", "customers"));
        assert!(!config.filters.admits("audit", "tmp_log"));
        assert!(config.filters.admits("audit", "log"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = DiagramConfig::from_yaml("{}").unwrap();
        assert_eq!(config.attribute_visibility, AttributeVisibility::All);
        assert!(config.filters.default.is_empty());
    }
}
