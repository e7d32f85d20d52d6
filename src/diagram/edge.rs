//! Associations between entity nodes.

use super::NodeId;
use crate::error::MetaResult;
use crate::meta::{AssociationInfo, MetadataProvider, ObjectHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Origin of an association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Backed by a foreign key in the database
    Physical,
    /// Drawn by the user, backed by a pseudo constraint
    Logical,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Physical => write!(f, "physical"),
            EdgeKind::Logical => write!(f, "logical"),
        }
    }
}

/// Referencing attribute (source side) joined to the referenced attribute (target side)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributePair {
    pub source: ObjectHandle,
    pub target: ObjectHandle,
}

impl AttributePair {
    pub fn new(source: ObjectHandle, target: ObjectHandle) -> Self {
        Self { source, target }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BendKind {
    Absolute,
    /// Offset from the neighbouring points
    Relative,
}

impl BendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BendKind::Absolute => "abs",
            BendKind::Relative => "rel",
        }
    }
}

impl FromStr for BendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abs" => Ok(BendKind::Absolute),
            "rel" => Ok(BendKind::Relative),
            _ => Err(format!("unknown bend type '{}'", s)),
        }
    }
}

/// Routing waypoint of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BendPoint {
    pub kind: BendKind,
    pub x: i32,
    pub y: i32,
}

impl BendPoint {
    pub fn absolute(x: i32, y: i32) -> Self {
        Self {
            kind: BendKind::Absolute,
            x,
            y,
        }
    }

    pub fn relative(x: i32, y: i32) -> Self {
        Self {
            kind: BendKind::Relative,
            x,
            y,
        }
    }
}

/// Synthetic key on one side of a logical association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoKey {
    pub entity: ObjectHandle,
    pub attributes: Vec<ObjectHandle>,
}

/// Pseudo primary key / foreign key pair backing a logical association.
///
/// Never handed to a metadata provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoConstraint {
    pub name: String,
    pub primary_key: PseudoKey,
    pub foreign_key: PseudoKey,
}

impl PseudoConstraint {
    pub fn new(
        name: impl Into<String>,
        source_entity: ObjectHandle,
        target_entity: ObjectHandle,
        pairs: &[AttributePair],
    ) -> Self {
        Self {
            name: name.into(),
            primary_key: PseudoKey {
                entity: target_entity,
                attributes: pairs.iter().map(|p| p.target).collect(),
            },
            foreign_key: PseudoKey {
                entity: source_entity,
                attributes: pairs.iter().map(|p| p.source).collect(),
            },
        }
    }

    pub fn referenced_attribute(&self, attribute: ObjectHandle) -> Option<ObjectHandle> {
        let index = self
            .foreign_key
            .attributes
            .iter()
            .position(|&a| a == attribute)?;
        self.primary_key.attributes.get(index).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Backing {
    Constraint(ObjectHandle),
    Pseudo(PseudoConstraint),
}

/// Directed association from the foreign-key side (source) to the
/// primary-key side (target).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationEdge {
    name: String,
    source: NodeId,
    target: NodeId,
    source_entity: ObjectHandle,
    target_entity: ObjectHandle,
    backing: Backing,
    pairs: Vec<AttributePair>,
    bends: Vec<BendPoint>,
}

impl AssociationEdge {
    /// Edge for a foreign key reported by the metadata provider
    pub fn physical(
        association: &AssociationInfo,
        source: NodeId,
        target: NodeId,
        pairs: Vec<AttributePair>,
    ) -> Self {
        Self {
            name: association.name.clone(),
            source,
            target,
            source_entity: association.owner,
            target_entity: association.referenced,
            backing: Backing::Constraint(association.constraint),
            pairs,
            bends: Vec::new(),
        }
    }

    /// Edge synthesized from an explicit attribute pair list
    pub fn logical(
        name: impl Into<String>,
        source: (NodeId, ObjectHandle),
        target: (NodeId, ObjectHandle),
        pairs: Vec<AttributePair>,
    ) -> Self {
        let name = name.into();
        let pseudo = PseudoConstraint::new(name.clone(), source.1, target.1, &pairs);
        Self {
            name,
            source: source.0,
            target: target.0,
            source_entity: source.1,
            target_entity: target.1,
            backing: Backing::Pseudo(pseudo),
            pairs,
            bends: Vec::new(),
        }
    }

    pub fn kind(&self) -> EdgeKind {
        match self.backing {
            Backing::Constraint(_) => EdgeKind::Physical,
            Backing::Pseudo(_) => EdgeKind::Logical,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Foreign-key side
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Primary-key side
    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn source_entity(&self) -> ObjectHandle {
        self.source_entity
    }

    pub fn target_entity(&self) -> ObjectHandle {
        self.target_entity
    }

    pub fn is_self_reference(&self) -> bool {
        self.source == self.target
    }

    pub fn pairs(&self) -> &[AttributePair] {
        &self.pairs
    }

    pub fn bends(&self) -> &[BendPoint] {
        &self.bends
    }

    pub fn set_bends(&mut self, bends: Vec<BendPoint>) {
        self.bends = bends;
    }

    /// Database constraint behind a physical edge
    pub fn constraint(&self) -> Option<ObjectHandle> {
        match &self.backing {
            Backing::Constraint(handle) => Some(*handle),
            Backing::Pseudo(_) => None,
        }
    }

    pub fn pseudo_constraint(&self) -> Option<&PseudoConstraint> {
        match &self.backing {
            Backing::Constraint(_) => None,
            Backing::Pseudo(pseudo) => Some(pseudo),
        }
    }

    /// Attribute referenced by a source attribute, through whichever
    /// constraint backs this edge
    pub fn referenced_attribute(
        &self,
        provider: &dyn MetadataProvider,
        attribute: ObjectHandle,
    ) -> MetaResult<Option<ObjectHandle>> {
        match &self.backing {
            Backing::Constraint(constraint) => provider.referenced_attribute(*constraint, attribute),
            Backing::Pseudo(pseudo) => Ok(pseudo.referenced_attribute(attribute)),
        }
    }
}
