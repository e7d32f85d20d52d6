//! Deferred association resolution.
//!
//! Resolution is split in two phases so it can be exercised without a live
//! container:
//! - [`resolve`] partitions pending associations into edges that can be built
//!   now (both endpoints present) and those that must keep waiting,
//! - [`resolve_pairs`] maps the columns of one association onto attribute
//!   pairs of the two endpoint nodes.
//!
//! Running [`resolve`] after every insertion yields the same edge set
//! regardless of the order entities were added in.

use super::edge::AttributePair;
use super::node::EntityNode;
use super::NodeId;
use crate::meta::{AssociationInfo, MetadataProvider, ObjectHandle};
use ahash::AHashMap;
use tracing::{debug, warn};

/// Association waiting for its referenced entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAssociation {
    pub owner: NodeId,
    pub association: AssociationInfo,
}

/// Association whose endpoints are both present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgePlan {
    pub source: NodeId,
    pub target: NodeId,
    pub association: AssociationInfo,
}

/// Outcome of one resolution pass
#[derive(Debug, Default)]
pub struct Resolution {
    pub ready: Vec<EdgePlan>,
    pub pending: Vec<PendingAssociation>,
}

/// Split pending associations into buildable edges and the remainder.
///
/// `lookup` maps an entity handle to the node wrapping it, if any. Relative
/// order is preserved in both outputs.
pub fn resolve<I, F>(pending: I, lookup: F) -> Resolution
where
    I: IntoIterator<Item = PendingAssociation>,
    F: Fn(ObjectHandle) -> Option<NodeId>,
{
    let mut resolution = Resolution::default();
    for entry in pending {
        match lookup(entry.association.referenced) {
            Some(target) => resolution.ready.push(EdgePlan {
                source: entry.owner,
                target,
                association: entry.association,
            }),
            None => resolution.pending.push(entry),
        }
    }
    resolution
}

/// Resolve every association of a node list as if all nodes were present.
///
/// Node ids are positions in `nodes`. When several nodes wrap the same
/// handle the first one receives the edges.
pub fn resolve_nodes(nodes: &[EntityNode]) -> Resolution {
    let mut index: AHashMap<ObjectHandle, NodeId> = AHashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        index.entry(node.handle()).or_insert(NodeId(i as u32));
    }

    let pending = nodes.iter().enumerate().flat_map(|(i, node)| {
        node.pending().iter().map(move |association| PendingAssociation {
            owner: NodeId(i as u32),
            association: association.clone(),
        })
    });
    resolve(pending, |handle| index.get(&handle).copied())
}

/// Map each referencing column of `association` to an attribute pair.
///
/// Columns that cannot be matched to an attribute on either node are logged
/// and skipped; the remaining pairs are returned in constraint order.
pub fn resolve_pairs(
    provider: &dyn MetadataProvider,
    association: &AssociationInfo,
    source: &EntityNode,
    target: &EntityNode,
) -> Vec<AttributePair> {
    let mut pairs = Vec::with_capacity(association.columns.len());

    for &column in &association.columns {
        if source.attribute(column).is_none() {
            debug!(
                association = %association.name,
                entity = source.name(),
                "referencing column not shown on entity, skipping pair"
            );
            continue;
        }

        let referenced = match provider.referenced_attribute(association.constraint, column) {
            Ok(Some(referenced)) => referenced,
            Ok(None) => {
                warn!(
                    association = %association.name,
                    column = %column,
                    "no referenced column for association column"
                );
                continue;
            }
            Err(e) => {
                warn!(association = %association.name, error = %e, "referenced column lookup failed");
                continue;
            }
        };

        if target.attribute(referenced).is_none() {
            debug!(
                association = %association.name,
                entity = target.name(),
                "referenced column not shown on entity, skipping pair"
            );
            continue;
        }

        pairs.push(AttributePair::new(column, referenced));
    }

    pairs
}
