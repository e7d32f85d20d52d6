use super::{attr, tag, visual_attributes, DiagramCodec, DIAGRAM_VERSION, LOGICAL_FK_TYPE, PHYSICAL_FK_TYPE};
use crate::diagram::{AssociationEdge, DiagramContainer, EdgeKind, EntityNode, NodeId};
use crate::error::{DiagramError, MetaResult, Result};
use crate::meta::{MetadataProvider, ObjectHandle, ObjectKind};
use ahash::AHashMap;
use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// A serialized diagram and the problems met while writing it
#[derive(Debug, Clone)]
pub struct Saved {
    pub xml: String,
    pub diagnostics: Vec<String>,
}

type XmlWriter = Writer<Vec<u8>>;

impl DiagramCodec<'_> {
    /// Serialize `container`, stamping the current time
    pub fn save(&self, container: &DiagramContainer) -> Result<Saved> {
        let time = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.save_with_time(container, &time)
    }

    /// Serialize `container` with an explicit `time` attribute
    pub fn save_with_time(&self, container: &DiagramContainer, time: &str) -> Result<Saved> {
        let mut diagnostics = Vec::new();
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new(tag::DIAGRAM);
        root.push_attribute((attr::VERSION, DIAGRAM_VERSION));
        if let Some(name) = container.name() {
            root.push_attribute((attr::NAME, name));
        }
        let visibility = container.effective_attribute_visibility().to_string();
        root.push_attribute((attr::ATTRIBUTES, visibility.as_str()));
        root.push_attribute((attr::TIME, time));
        writer.write_event(Event::Start(root))?;

        let groups = self.group_by_data_source(container, &mut diagnostics);
        let ids = self.write_entities(&mut writer, container, &groups, &mut diagnostics)?;
        write_relations(&mut writer, container, &groups, &ids, &mut diagnostics)?;
        write_notes(&mut writer, container)?;

        writer.write_event(Event::End(BytesEnd::new(tag::DIAGRAM)))?;
        let xml = String::from_utf8(writer.into_inner())
            .map_err(|e| DiagramError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        Ok(Saved { xml, diagnostics })
    }

    /// Save to a file, returning the diagnostics
    pub fn save_to_file(&self, container: &DiagramContainer, path: &Path) -> Result<Vec<String>> {
        let saved = self.save(container)?;
        fs::write(path, saved.xml)?;
        Ok(saved.diagnostics)
    }

    fn group_by_data_source<'c>(
        &self,
        container: &'c DiagramContainer,
        diagnostics: &mut Vec<String>,
    ) -> IndexMap<ObjectHandle, Vec<(NodeId, &'c EntityNode)>> {
        let provider = container.provider();
        let mut groups: IndexMap<ObjectHandle, Vec<(NodeId, &EntityNode)>> = IndexMap::new();
        for (id, node) in container.nodes() {
            match provider.data_source(node.handle()) {
                Ok(ds) => groups.entry(ds).or_default().push((id, node)),
                Err(e) => {
                    warn!("cannot save entity '{}': {}", node.name(), e);
                    diagnostics.push(format!(
                        "cannot determine data source of '{}': {}",
                        node.name(),
                        e
                    ));
                }
            }
        }
        groups
    }

    fn write_entities(
        &self,
        writer: &mut XmlWriter,
        container: &DiagramContainer,
        groups: &IndexMap<ObjectHandle, Vec<(NodeId, &EntityNode)>>,
        diagnostics: &mut Vec<String>,
    ) -> Result<AHashMap<NodeId, u32>> {
        let provider = container.provider();
        let mut ids = AHashMap::new();
        let mut next_id = 1u32;

        writer.write_event(Event::Start(BytesStart::new(tag::ENTITIES)))?;
        for (&ds, nodes) in groups {
            let ds_id = match self.connections.data_source_id(ds) {
                Ok(ds_id) => ds_id,
                Err(e) => {
                    diagnostics.push(format!(
                        "cannot save entities of '{}': {}",
                        self.connections.display_name(ds),
                        e
                    ));
                    continue;
                }
            };
            let mut block = BytesStart::new(tag::DATA_SOURCE);
            block.push_attribute((attr::ID, ds_id.as_str()));
            writer.write_event(Event::Start(block))?;

            for &(node_id, node) in nodes {
                let path = match container_path(provider, node.handle()) {
                    Ok(path) => path,
                    Err(e) => {
                        diagnostics.push(format!("cannot save entity '{}': {}", node.name(), e));
                        continue;
                    }
                };
                let id = next_id;
                next_id += 1;
                ids.insert(node_id, id);

                let id_text = id.to_string();
                let fq_name = provider.full_name(node.handle()).ok();
                let mut element = BytesStart::new(tag::ENTITY);
                element.push_attribute((attr::ID, id_text.as_str()));
                element.push_attribute((attr::NAME, node.name()));
                if let Some(fq_name) = fq_name.as_deref() {
                    element.push_attribute((attr::FQ_NAME, fq_name));
                }
                if let Some(alias) = node.alias() {
                    element.push_attribute((attr::ALIAS, alias));
                }
                if node.is_primary() {
                    element.push_attribute((attr::PRIMARY, "true"));
                }
                if let Some(info) = container.entity_visual(node.handle()) {
                    for (key, value) in visual_attributes(info) {
                        element.push_attribute((key, value.as_str()));
                    }
                }

                if path.is_empty() {
                    writer.write_event(Event::Empty(element))?;
                    continue;
                }
                writer.write_event(Event::Start(element))?;
                for segment in &path {
                    let mut path_element = BytesStart::new(tag::PATH);
                    path_element.push_attribute((attr::NAME, segment.as_str()));
                    writer.write_event(Event::Empty(path_element))?;
                }
                writer.write_event(Event::End(BytesEnd::new(tag::ENTITY)))?;
            }

            writer.write_event(Event::End(BytesEnd::new(tag::DATA_SOURCE)))?;
        }
        writer.write_event(Event::End(BytesEnd::new(tag::ENTITIES)))?;
        Ok(ids)
    }
}

/// Containers between the data source and `entity`, outermost first
fn container_path(provider: &dyn MetadataProvider, entity: ObjectHandle) -> MetaResult<Vec<String>> {
    let mut path = Vec::new();
    let mut current = provider.parent(entity)?;
    while let Some(handle) = current {
        if provider.kind(handle)? == ObjectKind::DataSource {
            break;
        }
        path.push(provider.name(handle)?);
        current = provider.parent(handle)?;
    }
    path.reverse();
    Ok(path)
}

fn write_relations(
    writer: &mut XmlWriter,
    container: &DiagramContainer,
    groups: &IndexMap<ObjectHandle, Vec<(NodeId, &EntityNode)>>,
    ids: &AHashMap<NodeId, u32>,
    diagnostics: &mut Vec<String>,
) -> Result<()> {
    let provider = container.provider();
    writer.write_event(Event::Start(BytesStart::new(tag::RELATIONS)))?;

    for &(node_id, node) in groups.values().flatten() {
        let Some(&pk_ref) = ids.get(&node_id) else {
            continue;
        };
        for &edge_id in node.incoming() {
            let Some(edge) = container.edge(edge_id) else {
                continue;
            };
            let Some(&fk_ref) = ids.get(&edge.source()) else {
                debug!(relation = edge.name(), "source entity not saved, skipping relation");
                continue;
            };

            let pk_text = pk_ref.to_string();
            let fk_text = fk_ref.to_string();
            let fq_name = edge.constraint().and_then(|c| provider.full_name(c).ok());
            let mut element = BytesStart::new(tag::RELATION);
            element.push_attribute((attr::NAME, edge.name()));
            if let Some(fq_name) = fq_name.as_deref() {
                element.push_attribute((attr::FQ_NAME, fq_name));
            }
            let relation_type = match edge.kind() {
                EdgeKind::Physical => PHYSICAL_FK_TYPE,
                EdgeKind::Logical => LOGICAL_FK_TYPE,
            };
            element.push_attribute((attr::TYPE, relation_type));
            element.push_attribute((attr::PK_REF, pk_text.as_str()));
            element.push_attribute((attr::FK_REF, fk_text.as_str()));

            let columns = match edge.kind() {
                EdgeKind::Logical => logical_columns(provider, edge, diagnostics),
                EdgeKind::Physical => Vec::new(),
            };
            if columns.is_empty() && edge.bends().is_empty() {
                writer.write_event(Event::Empty(element))?;
                continue;
            }

            writer.write_event(Event::Start(element))?;
            for (name, ref_name) in &columns {
                let mut column = BytesStart::new(tag::COLUMN);
                column.push_attribute((attr::NAME, name.as_str()));
                if let Some(ref_name) = ref_name {
                    column.push_attribute((attr::REF_NAME, ref_name.as_str()));
                }
                writer.write_event(Event::Empty(column))?;
            }
            for bend in edge.bends() {
                let (x, y) = (bend.x.to_string(), bend.y.to_string());
                let mut element = BytesStart::new(tag::BEND);
                element.push_attribute((attr::TYPE, bend.kind.as_str()));
                element.push_attribute((attr::X, x.as_str()));
                element.push_attribute((attr::Y, y.as_str()));
                writer.write_event(Event::Empty(element))?;
            }
            writer.write_event(Event::End(BytesEnd::new(tag::RELATION)))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new(tag::RELATIONS)))?;
    Ok(())
}

/// `(name, ref-name)` per attribute pair; unreadable columns are left out
fn logical_columns(
    provider: &dyn MetadataProvider,
    edge: &AssociationEdge,
    diagnostics: &mut Vec<String>,
) -> Vec<(String, Option<String>)> {
    let mut columns = Vec::new();
    for pair in edge.pairs() {
        let column = provider.name(pair.source).and_then(|name| {
            let referenced = edge.referenced_attribute(provider, pair.source)?;
            let ref_name = referenced.map(|r| provider.name(r)).transpose()?;
            Ok((name, ref_name))
        });
        match column {
            Ok(column) => columns.push(column),
            Err(e) => {
                warn!(relation = edge.name(), "cannot read column: {}", e);
                diagnostics.push(format!(
                    "cannot save column of relation '{}': {}",
                    edge.name(),
                    e
                ));
            }
        }
    }
    columns
}

fn write_notes(writer: &mut XmlWriter, container: &DiagramContainer) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag::NOTES)))?;
    for note in container.notes() {
        let mut element = BytesStart::new(tag::NOTE);
        if let Some(info) = container.note_visual(note.id) {
            for (key, value) in visual_attributes(info) {
                element.push_attribute((key, value.as_str()));
            }
        }
        writer.write_event(Event::Start(element))?;
        writer.write_event(Event::Text(BytesText::new(&note.text)))?;
        writer.write_event(Event::End(BytesEnd::new(tag::NOTE)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag::NOTES)))?;
    Ok(())
}
