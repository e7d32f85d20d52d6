//! Allow/deny name filters applied while flattening containers.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Include/exclude glob patterns for object names.
///
/// An empty include list admits everything. Exclusions win over inclusions.
/// Matching is case-insensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NameFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    #[serde(skip)]
    compiled: Option<Compiled>,
}

#[derive(Debug, Clone, Default)]
struct Compiled {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl Compiled {
    fn matches(&self, lower: &str) -> bool {
        (self.include.is_empty() || self.include.iter().any(|p| p.matches(lower)))
            && !self.exclude.iter().any(|p| p.matches(lower))
    }
}

impl NameFilter {
    pub fn new<I, E, S>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self {
            include: include.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
            compiled: None,
        };
        filter.compile();
        filter
    }

    /// Compile patterns. Invalid patterns are dropped with a warning.
    pub fn compile(&mut self) {
        self.compiled = Some(Compiled {
            include: compile_patterns(&self.include),
            exclude: compile_patterns(&self.exclude),
        });
    }

    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        match &self.compiled {
            Some(c) => c.matches(&lower),
            // Deserialized filters that were never compiled
            None => Compiled {
                include: compile_patterns(&self.include),
                exclude: compile_patterns(&self.exclude),
            }
            .matches(&lower),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| match Pattern::new(&p.to_lowercase()) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(pattern = %p, error = %e, "ignoring invalid name pattern");
                None
            }
        })
        .collect()
}

/// Filters keyed by container full name, with a fallback for the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    /// Applied to every container without a dedicated filter
    pub default: NameFilter,
    /// Per-container filters, keyed by container full name
    pub containers: HashMap<String, NameFilter>,
}

impl FilterSet {
    pub fn compile(&mut self) {
        self.default.compile();
        for filter in self.containers.values_mut() {
            filter.compile();
        }
    }

    /// Filter governing the children of `container_name`
    pub fn for_container(&self, container_name: &str) -> &NameFilter {
        self.containers
            .get(container_name)
            .or_else(|| {
                let lower = container_name.to_lowercase();
                self.containers
                    .iter()
                    .find(|(k, _)| k.to_lowercase() == lower)
                    .map(|(_, v)| v)
            })
            .unwrap_or(&self.default)
    }

    pub fn admits(&self, container_name: &str, child_name: &str) -> bool {
        self.for_container(container_name).matches(child_name)
    }
}
