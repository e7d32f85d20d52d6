//! Entity nodes and their attribute references.

use super::visual::AttributeVisibility;
use super::EdgeId;
use crate::decorator::DiagramDecorator;
use crate::error::{MetaResult, MetadataError};
use crate::meta::{AssociationInfo, AttributeInfo, MetadataProvider, ObjectHandle};

/// A column shown on an entity.
///
/// Key flags are computed when the entity is populated. `in_foreign_key` is
/// also set when an edge is built through the attribute; neither flag is
/// cleared afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    pub handle: ObjectHandle,
    pub name: String,
    pub type_name: String,
    pub in_primary_key: bool,
    pub in_foreign_key: bool,
}

impl From<&AttributeInfo> for AttributeRef {
    fn from(info: &AttributeInfo) -> Self {
        Self {
            handle: info.handle,
            name: info.name.clone(),
            type_name: info.type_name.clone(),
            in_primary_key: info.in_primary_key,
            in_foreign_key: info.in_foreign_key,
        }
    }
}

/// Diagram node wrapping a table or view handle.
#[derive(Debug, Clone)]
pub struct EntityNode {
    handle: ObjectHandle,
    name: String,
    attributes: Vec<AttributeRef>,
    pub(crate) outgoing: Vec<EdgeId>,
    pub(crate) incoming: Vec<EdgeId>,
    alias: Option<String>,
    primary: bool,
    /// Associations whose referenced entity is not in the diagram yet
    pub(crate) pending: Vec<AssociationInfo>,
}

impl EntityNode {
    /// Bare node with no attributes and no known associations
    pub fn new(handle: ObjectHandle, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
            attributes: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            alias: None,
            primary: false,
            pending: Vec::new(),
        }
    }

    /// Build a node from provider metadata.
    ///
    /// Visible attributes are chosen by the decorator (or `visibility` when
    /// given). The entity's associations are queued as pending; they become
    /// edges once the node is added to a container.
    pub fn from_metadata(
        provider: &dyn MetadataProvider,
        decorator: &dyn DiagramDecorator,
        handle: ObjectHandle,
        visibility: Option<AttributeVisibility>,
    ) -> MetaResult<Self> {
        let kind = provider.kind(handle)?;
        if !kind.is_entity() {
            return Err(MetadataError::WrongKind {
                object: provider.full_name(handle)?,
                expected: "table or view",
            });
        }

        let mut node = EntityNode::new(handle, provider.name(handle)?);
        let attributes = provider.attributes(handle)?;
        let visibility = visibility.unwrap_or_else(|| decorator.attribute_visibility());
        for info in decorator.visible_attributes(handle, &attributes, visibility) {
            node.add_attribute(AttributeRef::from(&info));
        }
        node.pending = provider.associations(handle)?;
        Ok(node)
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias if set, otherwise the entity name
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn attributes(&self) -> &[AttributeRef] {
        &self.attributes
    }

    pub fn attribute(&self, handle: ObjectHandle) -> Option<&AttributeRef> {
        self.attributes.iter().find(|a| a.handle == handle)
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&AttributeRef> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Append an attribute.
    ///
    /// # Panics
    ///
    /// Panics if an attribute with the same handle is already present.
    pub fn add_attribute(&mut self, attribute: AttributeRef) {
        assert!(
            self.attribute(attribute.handle).is_none(),
            "attribute '{}' is already present on entity '{}'",
            attribute.name,
            self.name
        );
        self.attributes.push(attribute);
    }

    pub(crate) fn mark_foreign_key(&mut self, attribute: ObjectHandle) -> bool {
        match self.attributes.iter_mut().find(|a| a.handle == attribute) {
            Some(a) => {
                a.in_foreign_key = true;
                true
            }
            None => false,
        }
    }

    /// Edges where this entity is the foreign-key side
    pub fn outgoing(&self) -> &[EdgeId] {
        &self.outgoing
    }

    /// Edges where this entity is the primary-key side
    pub fn incoming(&self) -> &[EdgeId] {
        &self.incoming
    }

    pub fn pending(&self) -> &[AssociationInfo] {
        &self.pending
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn set_alias(&mut self, alias: Option<String>) {
        self.alias = alias;
    }

    /// The entity the diagram was opened from
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn set_primary(&mut self, primary: bool) {
        self.primary = primary;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(handle: u32, name: &str) -> AttributeRef {
        AttributeRef {
            handle: ObjectHandle(handle),
            name: name.to_string(),
            type_name: "int".to_string(),
            in_primary_key: false,
            in_foreign_key: false,
        }
    }

    #[test]
    fn test_attribute_lookup() {
        let mut node = EntityNode::new(ObjectHandle(1), "orders");
        node.add_attribute(attr(2, "id"));
        node.add_attribute(attr(3, "customer_id"));

        assert_eq!(node.attribute_by_name("CUSTOMER_ID").map(|a| a.handle), Some(ObjectHandle(3)));
        assert!(node.mark_foreign_key(ObjectHandle(3)));
        assert!(node.attribute(ObjectHandle(3)).unwrap().in_foreign_key);
        assert!(!node.mark_foreign_key(ObjectHandle(9)));
    }

    #[test]
    #[should_panic(expected = "already present")]
    fn test_duplicate_attribute_panics() {
        let mut node = EntityNode::new(ObjectHandle(1), "orders");
        node.add_attribute(attr(2, "id"));
        node.add_attribute(attr(2, "id"));
    }

    #[test]
    fn test_display_name_prefers_alias() {
        let mut node = EntityNode::new(ObjectHandle(1), "orders");
        assert_eq!(node.display_name(), "orders");
        node.set_alias(Some("o".to_string()));
        assert_eq!(node.display_name(), "o");
    }
}
