//! XML persistence for diagrams.
//!
//! Document layout:
//!
//! ```text
//! diagram(version, name?, attributes?, time)
//!   entities
//!     data-source(id)*
//!       entity(id, name, fq-name?, alias?, primary?, x?, y?, w?, h?,
//!              color-bg?, color-fg?, order?, attributes?)
//!         path(name)*
//!   relations
//!     relation(name, fq-name?, type, pk-ref, fk-ref)
//!       column(name, ref-name?)*
//!       bend(type, x, y)*
//!   notes
//!     note(x?, y?, w?, h?, color-bg?, color-fg?, order?)
//! ```
//!
//! Entity ids are allocated per save and only link relations to entities
//! within one document. An id is unique within its `data-source` block;
//! when several blocks reuse an id, a relation resolves to the block holding
//! both of its ends. `path` elements list the containers between the data
//! source and the entity, outermost first.
//!
//! `diagram/@attributes` is the visibility of entities without their own
//! `attributes` override.

mod load;
mod save;

pub use load::LoadReport;
pub use save::Saved;

use crate::diagram::{Color, Rect, VisualInfo, DEFAULT_Z_ORDER};
use crate::meta::ConnectionProvider;

/// Only document version understood by this codec
pub const DIAGRAM_VERSION: &str = "1";

/// `relation/@type` of foreign keys reported by the metadata provider
pub const PHYSICAL_FK_TYPE: &str = "fk";

/// `relation/@type` of user-defined associations
pub const LOGICAL_FK_TYPE: &str = "logical-fk";

pub(crate) mod tag {
    pub const DIAGRAM: &str = "diagram";
    pub const ENTITIES: &str = "entities";
    pub const DATA_SOURCE: &str = "data-source";
    pub const ENTITY: &str = "entity";
    pub const PATH: &str = "path";
    pub const RELATIONS: &str = "relations";
    pub const RELATION: &str = "relation";
    pub const COLUMN: &str = "column";
    pub const BEND: &str = "bend";
    pub const NOTES: &str = "notes";
    pub const NOTE: &str = "note";
}

pub(crate) mod attr {
    pub const VERSION: &str = "version";
    pub const NAME: &str = "name";
    pub const TIME: &str = "time";
    pub const ID: &str = "id";
    pub const FQ_NAME: &str = "fq-name";
    pub const ALIAS: &str = "alias";
    pub const PRIMARY: &str = "primary";
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const W: &str = "w";
    pub const H: &str = "h";
    pub const COLOR_BG: &str = "color-bg";
    pub const COLOR_FG: &str = "color-fg";
    pub const ORDER: &str = "order";
    pub const ATTRIBUTES: &str = "attributes";
    pub const TYPE: &str = "type";
    pub const PK_REF: &str = "pk-ref";
    pub const FK_REF: &str = "fk-ref";
    pub const REF_NAME: &str = "ref-name";
}

/// Reads and writes diagram documents.
///
/// Data sources are looked up by their persistent id and connected on demand
/// while loading.
pub struct DiagramCodec<'a> {
    connections: &'a dyn ConnectionProvider,
    notify: bool,
}

impl<'a> DiagramCodec<'a> {
    pub fn new(connections: &'a dyn ConnectionProvider) -> Self {
        Self {
            connections,
            notify: false,
        }
    }

    /// Emit container events while applying a loaded document
    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }
}

/// Layout attributes shared by entities and notes, as strings
fn visual_attributes(info: &VisualInfo) -> Vec<(&'static str, String)> {
    let mut attrs = Vec::new();
    if let Some(bounds) = info.bounds {
        attrs.push((attr::X, bounds.x.to_string()));
        attrs.push((attr::Y, bounds.y.to_string()));
        if bounds.has_size() {
            attrs.push((attr::W, bounds.width.to_string()));
            attrs.push((attr::H, bounds.height.to_string()));
        }
    }
    if let Some(color) = info.background {
        attrs.push((attr::COLOR_BG, color.to_string()));
    }
    if let Some(color) = info.foreground {
        attrs.push((attr::COLOR_FG, color.to_string()));
    }
    if info.z_order != DEFAULT_Z_ORDER {
        attrs.push((attr::ORDER, info.z_order.to_string()));
    }
    if let Some(visibility) = info.attribute_visibility {
        attrs.push((attr::ATTRIBUTES, visibility.to_string()));
    }
    attrs
}

/// Parse layout attributes; unparsable values are treated as absent.
///
/// Bounds exist only when both `x` and `y` are present.
fn parse_visual(node: roxmltree::Node<'_, '_>) -> VisualInfo {
    let int = |name: &str| node.attribute(name).and_then(|v| v.trim().parse::<i32>().ok());
    let color = |name: &str| node.attribute(name).and_then(|v| v.parse::<Color>().ok());

    let bounds = match (int(attr::X), int(attr::Y)) {
        (Some(x), Some(y)) => Some(Rect::new(
            x,
            y,
            int(attr::W).unwrap_or(0),
            int(attr::H).unwrap_or(0),
        )),
        _ => None,
    };
    VisualInfo {
        bounds,
        background: color(attr::COLOR_BG),
        foreground: color(attr::COLOR_FG),
        z_order: int(attr::ORDER).unwrap_or(DEFAULT_Z_ORDER),
        attribute_visibility: node.attribute(attr::ATTRIBUTES).and_then(|v| v.parse().ok()),
    }
}
