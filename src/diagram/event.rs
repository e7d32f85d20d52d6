//! Typed change records emitted by a container.

use super::{EdgeId, NodeId, NoteId};
use crate::meta::ObjectHandle;

/// Item whose visual info changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualTarget {
    Entity(ObjectHandle),
    Note(NoteId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramEvent {
    NodeAdded { node: NodeId, handle: ObjectHandle },
    NodeRemoved { node: NodeId, handle: ObjectHandle },
    EdgeResolved { edge: EdgeId, source: NodeId, target: NodeId },
    EdgeRemoved { edge: EdgeId },
    NoteAdded { note: NoteId },
    NoteRemoved { note: NoteId },
    VisualInfoChanged { target: VisualTarget },
}
