//! Serializable snapshot of a diagram for reporting.

use super::edge::EdgeKind;
use super::DiagramContainer;
use crate::meta::ObjectHandle;
use serde::Serialize;

/// JSON representation of a diagram
#[derive(Debug, Serialize)]
pub struct DiagramSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub entities: Vec<EntitySummary>,
    pub relations: Vec<RelationSummary>,
    pub notes: usize,
    pub pending: usize,
    pub needs_layout: bool,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EntitySummary {
    pub name: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub attributes: usize,
    pub primary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<(i32, i32)>,
}

#[derive(Debug, Serialize)]
pub struct RelationSummary {
    pub name: String,
    pub kind: EdgeKind,
    pub from_table: String,
    pub to_table: String,
    pub columns: Vec<(String, String)>,
    pub dangling: bool,
}

impl DiagramSummary {
    pub fn from_container(container: &DiagramContainer) -> Self {
        let provider = container.provider();
        let attribute_name = |handle: ObjectHandle| {
            provider
                .name(handle)
                .unwrap_or_else(|_| handle.to_string())
        };
        let entity_name = |handle: ObjectHandle| {
            provider
                .full_name(handle)
                .unwrap_or_else(|_| handle.to_string())
        };

        let entities = container
            .nodes()
            .map(|(_, node)| EntitySummary {
                name: node.name().to_string(),
                full_name: entity_name(node.handle()),
                alias: node.alias().map(str::to_string),
                attributes: node.attributes().len(),
                primary: node.is_primary(),
                position: container
                    .entity_visual(node.handle())
                    .and_then(|v| v.bounds)
                    .map(|b| (b.x, b.y)),
            })
            .collect();

        let relations = container
            .edges()
            .map(|(id, edge)| RelationSummary {
                name: edge.name().to_string(),
                kind: edge.kind(),
                from_table: entity_name(edge.source_entity()),
                to_table: entity_name(edge.target_entity()),
                columns: edge
                    .pairs()
                    .iter()
                    .map(|p| (attribute_name(p.source), attribute_name(p.target)))
                    .collect(),
                dangling: container.is_dangling(id),
            })
            .collect();

        Self {
            name: container.name().map(str::to_string),
            entities,
            relations,
            notes: container.notes().len(),
            pending: container.pending_count(),
            needs_layout: container.needs_layout(),
            diagnostics: container.error_messages().to_vec(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
