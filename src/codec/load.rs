use super::{attr, parse_visual, tag, DiagramCodec, DIAGRAM_VERSION, LOGICAL_FK_TYPE};
use crate::cancel::CancellationToken;
use crate::diagram::{
    AttributePair, AttributeVisibility, BendKind, BendPoint, DiagramContainer, EntityNode,
    VisualInfo,
};
use crate::error::{DiagramError, Result};
use crate::meta::{MetadataProvider, ObjectHandle, ObjectKind};
use ahash::AHashMap;
use roxmltree::{Document, Node};
use smallvec::SmallVec;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of applying a diagram document to a container
#[derive(Debug, Default, Clone)]
pub struct LoadReport {
    /// Entities restored from the document
    pub entities: usize,
    /// Relations whose both endpoints were restored
    pub relations: usize,
    pub notes: usize,
    pub diagnostics: Vec<String>,
    /// Some entity or note has no stored position
    pub needs_layout: bool,
}

struct LoadedEntity {
    node: EntityNode,
    alias: Option<String>,
    primary: bool,
    visual: VisualInfo,
}

struct LoadedRelation {
    name: String,
    logical: bool,
    fk_entity: ObjectHandle,
    pk_entity: ObjectHandle,
    pairs: Vec<AttributePair>,
    bends: Vec<BendPoint>,
}

struct LoadedNote {
    text: String,
    visual: VisualInfo,
}

impl DiagramCodec<'_> {
    /// Read a diagram file into `container`
    pub fn load_file(
        &self,
        path: &Path,
        container: &mut DiagramContainer,
        cancel: &CancellationToken,
    ) -> Result<LoadReport> {
        let xml = fs::read_to_string(path)?;
        self.load(&xml, container, cancel)
    }

    /// Apply a diagram document to `container`.
    ///
    /// Version and XML errors fail before anything is applied. Unreachable
    /// data sources and unresolvable entities are reported as diagnostics
    /// (also recorded on the container) and skipped.
    pub fn load(
        &self,
        xml: &str,
        container: &mut DiagramContainer,
        cancel: &CancellationToken,
    ) -> Result<LoadReport> {
        let doc = Document::parse(xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != tag::DIAGRAM {
            return Err(DiagramError::UnexpectedRoot(root.tag_name().name().to_string()));
        }
        match root.attribute(attr::VERSION) {
            None => return Err(DiagramError::MissingVersion),
            Some(version) if version.trim() != DIAGRAM_VERSION => {
                return Err(DiagramError::UnsupportedVersion(version.to_string()))
            }
            Some(_) => {}
        }

        let visibility = match root.attribute(attr::ATTRIBUTES) {
            Some(value) => match value.parse::<AttributeVisibility>() {
                Ok(visibility) => Some(visibility),
                Err(e) => {
                    warn!("ignoring diagram attribute visibility: {}", e);
                    None
                }
            },
            None => None,
        };

        let mut report = LoadReport::default();
        let (entities, relations, notes) = {
            let provider = container.provider();
            let decorator = container.decorator();
            let mut pass = Pass {
                codec: self,
                provider,
                cancel,
                visibility: visibility.or(container.attribute_visibility()),
                by_id: AHashMap::new(),
                diagnostics: Vec::new(),
            };

            let mut entities = Vec::new();
            for block in children(root, tag::ENTITIES).flat_map(|e| children(e, tag::DATA_SOURCE)) {
                pass.read_data_source(block, decorator, &mut entities)?;
            }
            let mut relations = Vec::new();
            for element in children(root, tag::RELATIONS).flat_map(|e| children(e, tag::RELATION)) {
                if cancel.is_cancelled() {
                    return Err(DiagramError::Cancelled);
                }
                if let Some(relation) = pass.read_relation(element) {
                    relations.push(relation);
                }
            }
            let notes: Vec<LoadedNote> = children(root, tag::NOTES)
                .flat_map(|e| children(e, tag::NOTE))
                .map(|element| LoadedNote {
                    text: element.text().unwrap_or_default().to_string(),
                    visual: parse_visual(element),
                })
                .collect();

            report.diagnostics = pass.diagnostics;
            (entities, relations, notes)
        };
        if cancel.is_cancelled() {
            return Err(DiagramError::Cancelled);
        }

        // Everything below mutates the container
        if let Some(name) = root.attribute(attr::NAME) {
            container.set_name(Some(name.to_string()));
        }
        if visibility.is_some() {
            container.set_attribute_visibility(visibility);
        }
        self.apply(container, entities, relations, notes, &mut report);

        for message in &report.diagnostics {
            container.add_error_message(message.clone());
        }
        if report.needs_layout {
            container.set_needs_layout(true);
        }
        info!(
            entities = report.entities,
            relations = report.relations,
            diagnostics = report.diagnostics.len(),
            "diagram loaded"
        );
        Ok(report)
    }

    fn apply(
        &self,
        container: &mut DiagramContainer,
        entities: Vec<LoadedEntity>,
        relations: Vec<LoadedRelation>,
        notes: Vec<LoadedNote>,
        report: &mut LoadReport,
    ) {
        let mut details = Vec::with_capacity(entities.len());
        let mut nodes = Vec::with_capacity(entities.len());
        for entity in entities {
            details.push((entity.node.handle(), entity.alias, entity.primary, entity.visual));
            nodes.push(entity.node);
        }

        let ids = container.add_nodes(nodes, self.notify);
        for (id, (handle, alias, primary, visual)) in ids.into_iter().zip(details) {
            let Some(id) = id.or_else(|| container.node_by_handle(handle)) else {
                continue;
            };
            report.entities += 1;
            if let Some(node) = container.node_mut(id) {
                if alias.is_some() {
                    node.set_alias(alias);
                }
                if primary {
                    node.set_primary(true);
                }
            }
            report.needs_layout |= visual.needs_layout();
            container.set_entity_visual(handle, visual, self.notify);
        }

        for relation in relations {
            let (Some(source), Some(target)) = (
                container.node_by_handle(relation.fk_entity),
                container.node_by_handle(relation.pk_entity),
            ) else {
                continue;
            };

            let edge = if relation.logical {
                match container.create_logical_edge(
                    source,
                    target,
                    Some(relation.name.as_str()),
                    relation.pairs,
                    self.notify,
                ) {
                    Ok(edge) => Some(edge),
                    Err(e) => {
                        report
                            .diagnostics
                            .push(format!("cannot restore relation '{}': {}", relation.name, e));
                        None
                    }
                }
            } else {
                let edge = container.find_edge(source, target, &relation.name);
                if edge.is_none() {
                    debug!(relation = %relation.name, "no matching association in diagram");
                }
                edge
            };

            if let Some(edge) = edge {
                report.relations += 1;
                if !relation.bends.is_empty() {
                    if let Some(edge) = container.edge_mut(edge) {
                        edge.set_bends(relation.bends);
                    }
                }
            }
        }

        for note in notes {
            report.notes += 1;
            report.needs_layout |= note.visual.needs_layout();
            let id = container.add_note(note.text, self.notify);
            container.set_note_visual(id, note.visual, self.notify);
        }
    }
}

/// Read-only part of loading: resolves document ids to metadata
struct Pass<'a> {
    codec: &'a DiagramCodec<'a>,
    provider: &'a dyn MetadataProvider,
    cancel: &'a CancellationToken,
    /// Fallback for entities without their own visibility override
    visibility: Option<AttributeVisibility>,
    /// Document entity id to the (data source, entity) pairs using it
    by_id: AHashMap<u32, SmallVec<[(ObjectHandle, ObjectHandle); 1]>>,
    diagnostics: Vec<String>,
}

impl Pass<'_> {
    fn read_data_source(
        &mut self,
        block: Node<'_, '_>,
        decorator: &dyn crate::decorator::DiagramDecorator,
        entities: &mut Vec<LoadedEntity>,
    ) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(DiagramError::Cancelled);
        }
        let connections = self.codec.connections;
        let Some(ds_id) = block.attribute(attr::ID) else {
            self.diagnostics
                .push("data source element without id".to_string());
            return Ok(());
        };
        let Some(ds) = connections.find_data_source(ds_id) else {
            warn!(data_source = ds_id, "unknown data source");
            self.diagnostics
                .push(format!("data source '{}' not found", ds_id));
            return Ok(());
        };
        if !connections.is_connected(ds) {
            debug!(data_source = ds_id, "connecting");
            if let Err(e) = connections.connect(ds) {
                warn!(data_source = ds_id, "connect failed: {}", e);
                self.diagnostics.push(format!(
                    "cannot open data source '{}': {}",
                    connections.display_name(ds),
                    e
                ));
                return Ok(());
            }
        }

        for element in block.children().filter(|n| n.has_tag_name(tag::ENTITY)) {
            if self.cancel.is_cancelled() {
                return Err(DiagramError::Cancelled);
            }
            if let Some(entity) = self.read_entity(ds, element, decorator) {
                entities.push(entity);
            }
        }
        Ok(())
    }

    fn read_entity(
        &mut self,
        data_source: ObjectHandle,
        element: Node<'_, '_>,
        decorator: &dyn crate::decorator::DiagramDecorator,
    ) -> Option<LoadedEntity> {
        let name = element.attribute(attr::NAME).unwrap_or_default();
        let Some(id) = element.attribute(attr::ID).and_then(|v| v.parse::<u32>().ok()) else {
            self.diagnostics
                .push(format!("entity '{}' has no valid id", name));
            return None;
        };

        let mut current = data_source;
        for segment in children(element, tag::PATH) {
            let segment = segment.attribute(attr::NAME).unwrap_or_default();
            match self.provider.child_by_name(current, segment) {
                Ok(Some(child)) if self.is_kind(child, ObjectKind::is_container) => {
                    current = child;
                }
                Ok(Some(_)) => {
                    self.diagnostics.push(format!(
                        "cannot restore entity '{}': '{}' is not a container",
                        name, segment
                    ));
                    return None;
                }
                Ok(None) => {
                    self.diagnostics.push(format!(
                        "cannot restore entity '{}': container '{}' not found",
                        name, segment
                    ));
                    return None;
                }
                Err(e) => {
                    self.diagnostics
                        .push(format!("cannot restore entity '{}': {}", name, e));
                    return None;
                }
            }
        }

        let handle = match self.provider.child_by_name(current, name) {
            Ok(Some(handle)) if self.is_kind(handle, ObjectKind::is_entity) => handle,
            Ok(Some(_)) => {
                self.diagnostics.push(format!(
                    "cannot restore entity '{}': not a table or view",
                    name
                ));
                return None;
            }
            Ok(None) => {
                self.diagnostics
                    .push(format!("cannot restore entity '{}': not found", name));
                return None;
            }
            Err(e) => {
                self.diagnostics
                    .push(format!("cannot restore entity '{}': {}", name, e));
                return None;
            }
        };

        let visual = parse_visual(element);
        let node = match EntityNode::from_metadata(
            self.provider,
            decorator,
            handle,
            visual.attribute_visibility.or(self.visibility),
        ) {
            Ok(node) => node,
            Err(e) => {
                self.diagnostics
                    .push(format!("cannot restore entity '{}': {}", name, e));
                return None;
            }
        };

        let scope = self.by_id.entry(id).or_default();
        if scope.iter().any(|&(ds, _)| ds == data_source) {
            warn!(id, entity = name, "entity id repeated in data source");
            self.diagnostics.push(format!(
                "entity '{}' reuses id {} of its data source; relations keep the first",
                name, id
            ));
        } else {
            scope.push((data_source, handle));
        }
        Some(LoadedEntity {
            node,
            alias: element.attribute(attr::ALIAS).map(str::to_string),
            primary: element.attribute(attr::PRIMARY) == Some("true"),
            visual,
        })
    }

    fn scope(&self, id: Option<u32>) -> &[(ObjectHandle, ObjectHandle)] {
        id.and_then(|id| self.by_id.get(&id))
            .map(|scope| scope.as_slice())
            .unwrap_or_default()
    }

    /// Resolve `pk-ref` and `fk-ref` to entities.
    ///
    /// Both ends are looked up in the same data-source block first. A pair
    /// of ids found in one block each may span blocks.
    fn endpoints(
        &mut self,
        relation: &str,
        pk_id: Option<u32>,
        fk_id: Option<u32>,
    ) -> Option<(ObjectHandle, ObjectHandle)> {
        let pks = self.scope(pk_id);
        let fks = self.scope(fk_id);
        if pks.is_empty() || fks.is_empty() {
            return None;
        }
        let same_block: SmallVec<[(ObjectHandle, ObjectHandle); 1]> = fks
            .iter()
            .flat_map(move |&(ds, fk)| {
                pks.iter()
                    .filter(move |&&(pk_ds, _)| pk_ds == ds)
                    .map(move |&(_, pk)| (pk, fk))
            })
            .collect();
        let resolved = match (same_block.as_slice(), pks, fks) {
            ([found], _, _) => Some(*found),
            ([], [(_, pk)], [(_, fk)]) => Some((*pk, *fk)),
            _ => None,
        };
        if resolved.is_none() {
            warn!(relation, "relation endpoints are ambiguous");
            self.diagnostics.push(format!(
                "relation '{}' refers to entity ids used in several data sources",
                relation
            ));
        }
        resolved
    }

    fn read_relation(&mut self, element: Node<'_, '_>) -> Option<LoadedRelation> {
        let name = element.attribute(attr::NAME).unwrap_or_default();
        let id = |key: &str| element.attribute(key).and_then(|v| v.parse::<u32>().ok());
        let Some((pk_entity, fk_entity)) = self.endpoints(name, id(attr::PK_REF), id(attr::FK_REF))
        else {
            debug!(relation = name, "relation endpoint not restored, skipping");
            return None;
        };
        let logical = element.attribute(attr::TYPE) == Some(LOGICAL_FK_TYPE);

        let mut pairs = Vec::new();
        if logical {
            for column in children(element, tag::COLUMN) {
                let source = column
                    .attribute(attr::NAME)
                    .and_then(|n| self.provider.child_by_name(fk_entity, n).ok().flatten());
                let target = column
                    .attribute(attr::REF_NAME)
                    .and_then(|n| self.provider.child_by_name(pk_entity, n).ok().flatten());
                match (source, target) {
                    (Some(source), Some(target)) => pairs.push(AttributePair::new(source, target)),
                    _ => warn!(relation = name, "cannot resolve logical column pair, skipping"),
                }
            }
        }

        let mut bends = Vec::new();
        for bend in children(element, tag::BEND) {
            let kind = bend.attribute(attr::TYPE).and_then(|t| t.parse::<BendKind>().ok());
            let x = bend.attribute(attr::X).and_then(|v| v.parse::<i32>().ok());
            let y = bend.attribute(attr::Y).and_then(|v| v.parse::<i32>().ok());
            match (kind, x, y) {
                (Some(BendKind::Absolute), Some(x), Some(y)) => bends.push(BendPoint::absolute(x, y)),
                (Some(BendKind::Relative), _, _) => {
                    debug!(relation = name, "dropping relative bend");
                }
                _ => debug!(relation = name, "malformed bend, skipping"),
            }
        }

        Some(LoadedRelation {
            name: name.to_string(),
            logical,
            fk_entity,
            pk_entity,
            pairs,
            bends,
        })
    }

    fn is_kind(&self, handle: ObjectHandle, check: fn(ObjectKind) -> bool) -> bool {
        self.provider.kind(handle).is_ok_and(check)
    }
}

/// Child elements of `node` named `name`
fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |n| n.has_tag_name(name))
}
