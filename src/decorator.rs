//! Policy hooks that shape how metadata becomes diagram objects.

use crate::config::DiagramConfig;
use crate::diagram::{AssociationEdge, AttributePair, AttributeVisibility, NodeId};
use crate::meta::{AssociationInfo, AttributeInfo, ObjectHandle};

/// Decides attribute visibility, duplicate handling and edge construction.
pub trait DiagramDecorator {
    /// Visibility used when an entity has no override
    fn attribute_visibility(&self) -> AttributeVisibility {
        AttributeVisibility::All
    }

    /// Attributes materialized on a new node, in natural order
    fn visible_attributes(
        &self,
        _entity: ObjectHandle,
        attributes: &[AttributeInfo],
        visibility: AttributeVisibility,
    ) -> Vec<AttributeInfo> {
        attributes
            .iter()
            .filter(|a| visibility.shows(a.in_primary_key, a.in_foreign_key))
            .cloned()
            .collect()
    }

    /// Whether the same entity may be wrapped by more than one node
    fn allow_duplicates(&self) -> bool {
        false
    }

    /// Edge object for a resolved foreign-key association
    fn create_association(
        &self,
        association: &AssociationInfo,
        source: NodeId,
        target: NodeId,
        pairs: Vec<AttributePair>,
    ) -> AssociationEdge {
        AssociationEdge::physical(association, source, target, pairs)
    }
}

/// Decorator driven by plain settings
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecorator {
    pub visibility: AttributeVisibility,
    pub allow_duplicates: bool,
}

impl DefaultDecorator {
    pub fn new(visibility: AttributeVisibility) -> Self {
        Self {
            visibility,
            allow_duplicates: false,
        }
    }
}

impl From<&DiagramConfig> for DefaultDecorator {
    fn from(config: &DiagramConfig) -> Self {
        Self {
            visibility: config.attribute_visibility,
            allow_duplicates: config.allow_duplicates,
        }
    }
}

impl DiagramDecorator for DefaultDecorator {
    fn attribute_visibility(&self) -> AttributeVisibility {
        self.visibility
    }

    fn allow_duplicates(&self) -> bool {
        self.allow_duplicates
    }
}
