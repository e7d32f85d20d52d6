//! Turns metadata roots into diagram nodes.
//!
//! Building happens in two steps:
//! 1. Flatten the roots into an ordered, de-duplicated list of entities:
//!    aliases expand to their target, data sources and containers expand to
//!    their (filtered) children.
//! 2. Create one node per entity and add them to the container as a batch, so
//!    associations between entities of the batch resolve regardless of order.

use crate::cancel::CancellationToken;
use crate::config::DiagramConfig;
use crate::diagram::{AttributeVisibility, DiagramContainer, EntityNode, NodeId};
use crate::meta::{FilterSet, MetadataProvider, ObjectHandle, ObjectKind};
use ahash::AHashSet;
use indexmap::IndexSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings applied while flattening and creating nodes
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub filters: FilterSet,
    pub exclude_views: bool,
    /// Overrides the decorator's attribute visibility
    pub visibility: Option<AttributeVisibility>,
    /// Emit container events for the added nodes and edges
    pub notify: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            filters: FilterSet::default(),
            exclude_views: false,
            visibility: None,
            notify: true,
        }
    }
}

impl From<&DiagramConfig> for BuildOptions {
    fn from(config: &DiagramConfig) -> Self {
        Self {
            filters: config.filters.clone(),
            exclude_views: config.exclude_views,
            ..Self::default()
        }
    }
}

/// Entities found below a set of roots
#[derive(Debug, Default)]
pub struct Collected {
    /// First-seen order, no duplicates
    pub entities: IndexSet<ObjectHandle>,
    pub diagnostics: Vec<String>,
    pub cancelled: bool,
}

/// Outcome of [`EntityGraphBuilder::build`]
#[derive(Debug, Default, Clone)]
pub struct BuildReport {
    pub entities_added: usize,
    /// Entities already present and not added again
    pub duplicates: usize,
    pub edges_created: usize,
    /// Associations still waiting for their referenced entity
    pub pending: usize,
    pub diagnostics: Vec<String>,
    pub cancelled: bool,
}

/// Walks metadata and populates a [`DiagramContainer`]
pub struct EntityGraphBuilder {
    options: BuildOptions,
    progress_fn: Option<Arc<dyn Fn(u64, u64) + Send + Sync>>,
}

impl EntityGraphBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            progress_fn: None,
        }
    }

    /// Set a progress callback (receives entities processed, total entities)
    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.progress_fn = Some(Arc::new(f));
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Flatten `roots` into the entities they denote
    pub fn collect(
        &self,
        provider: &dyn MetadataProvider,
        roots: &[ObjectHandle],
        cancel: &CancellationToken,
    ) -> Collected {
        let mut walk = Walk {
            provider,
            options: &self.options,
            cancel,
            seen_containers: AHashSet::new(),
            seen_aliases: AHashSet::new(),
            out: Collected::default(),
        };
        for &root in roots {
            if cancel.is_cancelled() {
                walk.out.cancelled = true;
                break;
            }
            walk.visit(root, None);
        }
        walk.out
    }

    /// Add the entities below `roots` to `container`.
    ///
    /// Failures for individual entities become diagnostics, both in the
    /// report and on the container. On cancellation the entities collected
    /// so far are still added.
    pub fn build(
        &self,
        container: &mut DiagramContainer,
        roots: &[ObjectHandle],
        cancel: &CancellationToken,
    ) -> BuildReport {
        let mut report = BuildReport::default();
        let nodes = {
            let provider = container.provider();
            let decorator = container.decorator();
            let visibility = self.options.visibility.or(container.attribute_visibility());
            let collected = self.collect(provider, roots, cancel);
            report.diagnostics = collected.diagnostics;
            report.cancelled = collected.cancelled;

            let total = collected.entities.len() as u64;
            let mut nodes = Vec::with_capacity(collected.entities.len());
            for (done, &handle) in collected.entities.iter().enumerate() {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                if !decorator.allow_duplicates() && container.contains(handle) {
                    report.duplicates += 1;
                    continue;
                }
                match EntityNode::from_metadata(provider, decorator, handle, visibility) {
                    Ok(node) => nodes.push(node),
                    Err(e) => {
                        let name = provider.full_name(handle).unwrap_or_else(|_| handle.to_string());
                        warn!("skipping entity '{}': {}", name, e);
                        report
                            .diagnostics
                            .push(format!("cannot read entity '{}': {}", name, e));
                    }
                }
                if let Some(ref cb) = self.progress_fn {
                    cb(done as u64 + 1, total);
                }
            }
            nodes
        };

        let edges_before = container.edges().count();
        let ids = container.add_nodes(nodes, self.options.notify);
        report.entities_added = ids.iter().filter(|id| id.is_some()).count();
        report.duplicates += ids.len() - report.entities_added;
        report.edges_created = container.edges().count() - edges_before;

        if let Some(visibility) = self.options.visibility {
            if visibility != container.effective_attribute_visibility() {
                for id in ids.iter().flatten() {
                    keep_visibility(container, *id, visibility, self.options.notify);
                }
            }
        }
        report.pending = container.pending_count();

        for message in &report.diagnostics {
            container.add_error_message(message.clone());
        }
        info!(
            entities = report.entities_added,
            edges = report.edges_created,
            pending = report.pending,
            "diagram build finished"
        );
        report
    }
}

/// Record a per-entity visibility so it is written with the diagram
fn keep_visibility(
    container: &mut DiagramContainer,
    id: NodeId,
    visibility: AttributeVisibility,
    notify: bool,
) {
    let Some(handle) = container.node(id).map(|n| n.handle()) else {
        return;
    };
    let mut visual = container.entity_visual(handle).cloned().unwrap_or_default();
    visual.attribute_visibility = Some(visibility);
    container.set_entity_visual(handle, visual, notify);
}

struct Walk<'a> {
    provider: &'a dyn MetadataProvider,
    options: &'a BuildOptions,
    cancel: &'a CancellationToken,
    seen_containers: AHashSet<ObjectHandle>,
    seen_aliases: AHashSet<ObjectHandle>,
    out: Collected,
}

impl Walk<'_> {
    /// `parent` names the container whose filter admitted `handle`
    fn visit(&mut self, handle: ObjectHandle, parent: Option<&str>) {
        let kind = match self.provider.kind(handle) {
            Ok(kind) => kind,
            Err(e) => {
                self.diagnostic(handle, &e);
                return;
            }
        };

        match kind {
            ObjectKind::Table | ObjectKind::View => {
                if kind == ObjectKind::View && parent.is_some() && self.options.exclude_views {
                    return;
                }
                self.out.entities.insert(handle);
            }
            ObjectKind::Alias => {
                if !self.seen_aliases.insert(handle) {
                    debug!("alias cycle at {}", handle);
                    return;
                }
                match self.provider.alias_target(handle) {
                    Ok(Some(target)) => self.visit(target, parent),
                    Ok(None) => self.out.diagnostics.push(format!(
                        "alias '{}' has no target",
                        self.describe(handle)
                    )),
                    Err(e) => self.diagnostic(handle, &e),
                }
            }
            ObjectKind::DataSource | ObjectKind::Container => self.expand(handle),
            ObjectKind::Attribute | ObjectKind::Constraint => {
                self.out.diagnostics.push(format!(
                    "cannot add '{}' to a diagram: {} is not an entity",
                    self.describe(handle),
                    kind.as_str()
                ));
            }
        }
    }

    fn expand(&mut self, container: ObjectHandle) {
        if !self.seen_containers.insert(container) {
            return;
        }
        if self.cancel.is_cancelled() {
            self.out.cancelled = true;
            return;
        }

        // Filters are keyed by full name; data sources have an empty one
        let name = match self
            .provider
            .full_name(container)
            .and_then(|full| {
                if full.is_empty() {
                    self.provider.name(container)
                } else {
                    Ok(full)
                }
            }) {
            Ok(name) => name,
            Err(e) => {
                self.diagnostic(container, &e);
                return;
            }
        };
        let children = match self.provider.children(container) {
            Ok(children) => children,
            Err(e) => {
                self.diagnostic(container, &e);
                return;
            }
        };

        for child in children {
            if self.cancel.is_cancelled() {
                self.out.cancelled = true;
                return;
            }
            let kind = match self.provider.kind(child) {
                Ok(kind) => kind,
                Err(e) => {
                    self.diagnostic(child, &e);
                    continue;
                }
            };
            if !kind.is_container() {
                let child_name = match self.provider.name(child) {
                    Ok(child_name) => child_name,
                    Err(e) => {
                        self.diagnostic(child, &e);
                        continue;
                    }
                };
                if !self.options.filters.admits(&name, &child_name) {
                    debug!(container = %name, entity = %child_name, "filtered out");
                    continue;
                }
            }
            self.visit(child, Some(&name));
        }
    }

    fn describe(&self, handle: ObjectHandle) -> String {
        self.provider
            .full_name(handle)
            .unwrap_or_else(|_| handle.to_string())
    }

    fn diagnostic(&mut self, handle: ObjectHandle, error: &dyn std::fmt::Display) {
        warn!("metadata lookup failed for {}: {}", handle, error);
        self.out
            .diagnostics
            .push(format!("cannot read {}: {}", self.describe(handle), error));
    }
}
