//! Diagram graph model.
//!
//! This module provides:
//! - Entity nodes wrapping metadata handles, with their visible attributes
//! - Physical and logical associations between nodes
//! - The [`DiagramContainer`] graph store with deferred association resolution
//! - Layout metadata and typed change events

mod container;
mod edge;
mod event;
mod node;
pub mod resolve;
mod summary;
mod visual;

pub use container::{DiagramContainer, SharedDiagram};
pub use edge::{
    AssociationEdge, AttributePair, BendKind, BendPoint, EdgeKind, PseudoConstraint, PseudoKey,
};
pub use event::{DiagramEvent, VisualTarget};
pub use node::{AttributeRef, EntityNode};
pub use summary::{DiagramSummary, EntitySummary, RelationSummary};
pub use visual::{AttributeVisibility, Color, Rect, VisualInfo, DEFAULT_Z_ORDER};

use std::fmt;

/// Stable index of a node within its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Stable index of an edge within its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(pub u32);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NoteId({})", self.0)
    }
}

/// Free-text annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: NoteId,
    pub text: String,
}

/// Any object drawn on a diagram
#[derive(Debug, Clone, Copy)]
pub enum DiagramItem<'a> {
    Entity(NodeId, &'a EntityNode),
    Association(EdgeId, &'a AssociationEdge),
    Note(&'a Note),
}

impl DiagramItem<'_> {
    /// Display name of the item
    pub fn name(&self) -> &str {
        match self {
            DiagramItem::Entity(_, node) => node.display_name(),
            DiagramItem::Association(_, edge) => edge.name(),
            DiagramItem::Note(note) => &note.text,
        }
    }

    /// Metadata object wrapped by the item, if any
    pub fn handle(&self) -> Option<crate::meta::ObjectHandle> {
        match self {
            DiagramItem::Entity(_, node) => Some(node.handle()),
            DiagramItem::Association(_, edge) => edge.constraint(),
            DiagramItem::Note(_) => None,
        }
    }
}
