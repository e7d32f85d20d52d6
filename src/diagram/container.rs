//! Canonical mutable diagram graph.

use super::edge::{AssociationEdge, AttributePair};
use super::event::{DiagramEvent, VisualTarget};
use super::node::EntityNode;
use super::resolve::{self, EdgePlan, PendingAssociation};
use super::visual::{AttributeVisibility, VisualInfo, DEFAULT_Z_ORDER};
use super::{DiagramItem, EdgeId, Note, NodeId, NoteId};
use crate::decorator::DiagramDecorator;
use crate::error::{DiagramError, Result};
use crate::meta::{MetadataProvider, ObjectHandle};
use ahash::AHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Container shared with an observer; the lock is the single critical
/// section guarding node and note lists.
pub type SharedDiagram = Arc<RwLock<DiagramContainer>>;

/// Owns the entity/edge/note graph, layout metadata, pending associations and
/// diagnostics.
///
/// Nodes live in an arena addressed by [`NodeId`]; a side index maps each
/// metadata handle to the nodes wrapping it. Removing a node leaves edges that
/// name it in place; see [`DiagramContainer::dangling_edges`].
pub struct DiagramContainer {
    name: Option<String>,
    provider: Arc<dyn MetadataProvider + Send + Sync>,
    decorator: Arc<dyn DiagramDecorator + Send + Sync>,
    attribute_visibility: Option<AttributeVisibility>,
    nodes: Vec<Option<EntityNode>>,
    order: Vec<NodeId>,
    by_handle: AHashMap<ObjectHandle, SmallVec<[NodeId; 2]>>,
    edges: Vec<Option<AssociationEdge>>,
    notes: Vec<Note>,
    next_note: u32,
    entity_visuals: AHashMap<ObjectHandle, VisualInfo>,
    note_visuals: AHashMap<NoteId, VisualInfo>,
    messages: Vec<String>,
    needs_layout: bool,
    subscribers: Vec<Sender<DiagramEvent>>,
}

impl fmt::Debug for DiagramContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagramContainer")
            .field("name", &self.name)
            .field("nodes", &self.order.len())
            .field("edges", &self.edges.iter().flatten().count())
            .field("notes", &self.notes.len())
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

impl DiagramContainer {
    pub fn new(
        provider: Arc<dyn MetadataProvider + Send + Sync>,
        decorator: Arc<dyn DiagramDecorator + Send + Sync>,
    ) -> Self {
        Self {
            name: None,
            provider,
            decorator,
            attribute_visibility: None,
            nodes: Vec::new(),
            order: Vec::new(),
            by_handle: AHashMap::new(),
            edges: Vec::new(),
            notes: Vec::new(),
            next_note: 0,
            entity_visuals: AHashMap::new(),
            note_visuals: AHashMap::new(),
            messages: Vec::new(),
            needs_layout: false,
            subscribers: Vec::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn provider(&self) -> &dyn MetadataProvider {
        self.provider.as_ref()
    }

    pub fn decorator(&self) -> &dyn DiagramDecorator {
        self.decorator.as_ref()
    }

    /// Visibility restored from a document, overriding the decorator's
    pub fn attribute_visibility(&self) -> Option<AttributeVisibility> {
        self.attribute_visibility
    }

    pub fn set_attribute_visibility(&mut self, visibility: Option<AttributeVisibility>) {
        self.attribute_visibility = visibility;
    }

    /// Visibility applied to entities without their own override
    pub fn effective_attribute_visibility(&self) -> AttributeVisibility {
        self.attribute_visibility
            .unwrap_or_else(|| self.decorator.attribute_visibility())
    }

    /// Receive change events for mutations made with `notify = true`
    pub fn subscribe(&mut self) -> Receiver<DiagramEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, notify: bool, event: DiagramEvent) {
        if notify {
            self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    /// Add a node, then resolve pending associations across the whole diagram.
    ///
    /// Returns `None` when the handle is already wrapped and the decorator does
    /// not allow duplicates. `index` positions the node in the ordered list.
    pub fn add_node(
        &mut self,
        node: EntityNode,
        index: Option<usize>,
        notify: bool,
    ) -> Option<NodeId> {
        let id = self.insert_node(node, index, notify)?;
        self.resolve_pending(notify);
        Some(id)
    }

    /// Add a batch of nodes and resolve once all of them are present.
    ///
    /// The result is aligned with the input; rejected duplicates are `None`.
    pub fn add_nodes<I>(&mut self, nodes: I, notify: bool) -> Vec<Option<NodeId>>
    where
        I: IntoIterator<Item = EntityNode>,
    {
        let ids: Vec<Option<NodeId>> = nodes
            .into_iter()
            .map(|node| self.insert_node(node, None, notify))
            .collect();
        self.resolve_pending(notify);
        ids
    }

    fn insert_node(
        &mut self,
        node: EntityNode,
        index: Option<usize>,
        notify: bool,
    ) -> Option<NodeId> {
        let handle = node.handle();
        if !self.decorator.allow_duplicates() && self.contains(handle) {
            debug!(entity = node.name(), "entity already in diagram, not adding again");
            return None;
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        match index {
            Some(i) if i < self.order.len() => self.order.insert(i, id),
            _ => self.order.push(id),
        }
        self.by_handle.entry(handle).or_default().push(id);
        self.emit(notify, DiagramEvent::NodeAdded { node: id, handle });
        Some(id)
    }

    /// Remove a node from the list and the handle index.
    ///
    /// Edges naming the node are not removed; they become dangling and stay
    /// registered on their other endpoint. The node's own pending
    /// associations are dropped with it.
    pub fn remove_node(&mut self, id: NodeId, notify: bool) -> Option<EntityNode> {
        let node = self.nodes.get_mut(id.0 as usize)?.take()?;
        self.order.retain(|&n| n != id);
        if let Some(ids) = self.by_handle.get_mut(&node.handle()) {
            ids.retain(|n| *n != id);
            if ids.is_empty() {
                self.by_handle.remove(&node.handle());
            }
        }
        self.emit(
            notify,
            DiagramEvent::NodeRemoved {
                node: id,
                handle: node.handle(),
            },
        );
        Some(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&EntityNode> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut EntityNode> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// First node wrapping `handle`
    pub fn node_by_handle(&self, handle: ObjectHandle) -> Option<NodeId> {
        self.by_handle.get(&handle).and_then(|ids| ids.first().copied())
    }

    /// Every node wrapping `handle`, in insertion order
    pub fn nodes_for_handle(&self, handle: ObjectHandle) -> &[NodeId] {
        self.by_handle
            .get(&handle)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.by_handle.get(&handle).is_some_and(|ids| !ids.is_empty())
    }

    /// Node ids in list order
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes in list order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &EntityNode)> + '_ {
        self.order
            .iter()
            .filter_map(move |&id| self.node(id).map(|n| (id, n)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // ---------------------------------------------------------------------
    // Resolution
    // ---------------------------------------------------------------------

    /// Turn the pending associations of one node into edges where possible
    pub fn link_existing(&mut self, id: NodeId, notify: bool) -> usize {
        let pending = match self.node_mut(id) {
            Some(node) => std::mem::take(&mut node.pending),
            None => return 0,
        };
        let entries = pending.into_iter().map(|association| PendingAssociation {
            owner: id,
            association,
        });
        self.apply_resolution(entries.collect(), notify)
    }

    /// Retry every pending association in the diagram. Returns the number of
    /// edges created.
    pub fn resolve_pending(&mut self, notify: bool) -> usize {
        let mut entries = Vec::new();
        for &id in &self.order {
            if let Some(node) = self.nodes[id.0 as usize].as_mut() {
                entries.extend(node.pending.drain(..).map(|association| PendingAssociation {
                    owner: id,
                    association,
                }));
            }
        }
        self.apply_resolution(entries, notify)
    }

    fn apply_resolution(&mut self, entries: Vec<PendingAssociation>, notify: bool) -> usize {
        if entries.is_empty() {
            return 0;
        }
        let by_handle = &self.by_handle;
        let resolution = resolve::resolve(entries, |handle| {
            by_handle.get(&handle).and_then(|ids| ids.first().copied())
        });

        for entry in resolution.pending {
            if let Some(node) = self.node_mut(entry.owner) {
                node.pending.push(entry.association);
            }
        }

        let created = resolution.ready.len();
        for plan in resolution.ready {
            self.materialize(plan, notify);
        }
        created
    }

    fn materialize(&mut self, plan: EdgePlan, notify: bool) -> Option<EdgeId> {
        let (source, target) = match (self.node(plan.source), self.node(plan.target)) {
            (Some(s), Some(t)) => (s, t),
            _ => {
                warn!(association = %plan.association.name, "endpoint vanished before edge creation");
                return None;
            }
        };
        let pairs = resolve::resolve_pairs(self.provider.as_ref(), &plan.association, source, target);
        let edge =
            self.decorator
                .create_association(&plan.association, plan.source, plan.target, pairs);
        Some(self.register_edge(edge, notify))
    }

    fn register_edge(&mut self, edge: AssociationEdge, notify: bool) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        let (source, target) = (edge.source(), edge.target());

        if let Some(node) = self.node_mut(source) {
            for pair in edge.pairs() {
                node.mark_foreign_key(pair.source);
            }
            node.outgoing.push(id);
        }
        if let Some(node) = self.node_mut(target) {
            node.incoming.push(id);
        }
        self.edges.push(Some(edge));
        self.emit(notify, DiagramEvent::EdgeResolved { edge: id, source, target });
        id
    }

    /// Number of associations still waiting for their referenced entity
    pub fn pending_count(&self) -> usize {
        self.nodes().map(|(_, n)| n.pending.len()).sum()
    }

    // ---------------------------------------------------------------------
    // Edges
    // ---------------------------------------------------------------------

    /// Create a user-defined association between two present nodes.
    ///
    /// Pairs naming attributes not shown on their node are logged and
    /// skipped. Without a name one is derived from the endpoints.
    pub fn create_logical_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        name: Option<&str>,
        pairs: Vec<AttributePair>,
        notify: bool,
    ) -> Result<EdgeId> {
        let source_node = self.node(source).ok_or(DiagramError::MissingNode(source))?;
        let target_node = self.node(target).ok_or(DiagramError::MissingNode(target))?;

        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_{}_fk", source_node.name(), target_node.name()));
        let pairs: Vec<AttributePair> = pairs
            .into_iter()
            .filter(|pair| {
                let ok = source_node.attribute(pair.source).is_some()
                    && target_node.attribute(pair.target).is_some();
                if !ok {
                    warn!(association = %name, "logical pair names an attribute not on its entity, skipping");
                }
                ok
            })
            .collect();

        let edge = AssociationEdge::logical(
            name,
            (source, source_node.handle()),
            (target, target_node.handle()),
            pairs,
        );
        Ok(self.register_edge(edge, notify))
    }

    /// Remove an edge and unregister it from whichever endpoints still exist
    pub fn remove_edge(&mut self, id: EdgeId, notify: bool) -> Option<AssociationEdge> {
        let edge = self.edges.get_mut(id.0 as usize)?.take()?;
        if let Some(node) = self.node_mut(edge.source()) {
            node.outgoing.retain(|&e| e != id);
        }
        if let Some(node) = self.node_mut(edge.target()) {
            node.incoming.retain(|&e| e != id);
        }
        self.emit(notify, DiagramEvent::EdgeRemoved { edge: id });
        Some(edge)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&AssociationEdge> {
        self.edges.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut AssociationEdge> {
        self.edges.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Every edge, dangling ones included, in creation order
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &AssociationEdge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (EdgeId(i as u32), e)))
    }

    /// Outgoing edge of `source` pointing at `target` with the given name
    pub fn find_edge(&self, source: NodeId, target: NodeId, name: &str) -> Option<EdgeId> {
        let node = self.node(source)?;
        node.outgoing.iter().copied().find(|&id| {
            self.edge(id)
                .is_some_and(|e| e.target() == target && e.name() == name)
        })
    }

    /// Whether either endpoint of the edge has been removed
    pub fn is_dangling(&self, id: EdgeId) -> bool {
        match self.edge(id) {
            Some(edge) => self.node(edge.source()).is_none() || self.node(edge.target()).is_none(),
            None => false,
        }
    }

    pub fn dangling_edges(&self) -> Vec<EdgeId> {
        self.edges()
            .map(|(id, _)| id)
            .filter(|&id| self.is_dangling(id))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Notes
    // ---------------------------------------------------------------------

    pub fn add_note(&mut self, text: impl Into<String>, notify: bool) -> NoteId {
        let id = NoteId(self.next_note);
        self.next_note += 1;
        self.notes.push(Note {
            id,
            text: text.into(),
        });
        self.emit(notify, DiagramEvent::NoteAdded { note: id });
        id
    }

    pub fn remove_note(&mut self, id: NoteId, notify: bool) -> Option<Note> {
        let index = self.notes.iter().position(|n| n.id == id)?;
        let note = self.notes.remove(index);
        self.note_visuals.remove(&id);
        self.emit(notify, DiagramEvent::NoteRemoved { note: id });
        Some(note)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    // ---------------------------------------------------------------------
    // Visual info
    // ---------------------------------------------------------------------

    pub fn set_entity_visual(&mut self, handle: ObjectHandle, info: VisualInfo, notify: bool) {
        self.entity_visuals.insert(handle, info);
        self.emit(
            notify,
            DiagramEvent::VisualInfoChanged {
                target: VisualTarget::Entity(handle),
            },
        );
    }

    pub fn entity_visual(&self, handle: ObjectHandle) -> Option<&VisualInfo> {
        self.entity_visuals.get(&handle)
    }

    pub fn entity_visuals(&self) -> &AHashMap<ObjectHandle, VisualInfo> {
        &self.entity_visuals
    }

    pub fn set_note_visual(&mut self, id: NoteId, info: VisualInfo, notify: bool) {
        self.note_visuals.insert(id, info);
        self.emit(
            notify,
            DiagramEvent::VisualInfoChanged {
                target: VisualTarget::Note(id),
            },
        );
    }

    pub fn note_visual(&self, id: NoteId) -> Option<&VisualInfo> {
        self.note_visuals.get(&id)
    }

    pub fn note_visuals(&self) -> &AHashMap<NoteId, VisualInfo> {
        &self.note_visuals
    }

    /// Entities and notes ordered by z-order.
    ///
    /// The sort is stable: entities precede notes and insertion order is kept
    /// among equal z-orders. Items without visual info use
    /// [`DEFAULT_Z_ORDER`].
    pub fn contents(&self) -> Vec<DiagramItem<'_>> {
        let mut items: Vec<(i32, DiagramItem<'_>)> = self
            .nodes()
            .map(|(id, node)| {
                let z = self
                    .entity_visual(node.handle())
                    .map_or(DEFAULT_Z_ORDER, |v| v.z_order);
                (z, DiagramItem::Entity(id, node))
            })
            .chain(self.notes.iter().map(|note| {
                let z = self.note_visual(note.id).map_or(DEFAULT_Z_ORDER, |v| v.z_order);
                (z, DiagramItem::Note(note))
            }))
            .collect();
        items.sort_by_key(|(z, _)| *z);
        items.into_iter().map(|(_, item)| item).collect()
    }

    /// Every live edge as a diagram item, in creation order
    pub fn associations(&self) -> Vec<DiagramItem<'_>> {
        self.edges()
            .filter(|&(id, _)| !self.is_dangling(id))
            .map(|(id, edge)| DiagramItem::Association(id, edge))
            .collect()
    }

    pub fn needs_layout(&self) -> bool {
        self.needs_layout
    }

    pub fn set_needs_layout(&mut self, needs_layout: bool) {
        self.needs_layout = needs_layout;
    }

    // ---------------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------------

    pub fn add_error_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn error_messages(&self) -> &[String] {
        &self.messages
    }

    pub fn take_error_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }
}
