//! Entity-relationship diagram graph engine.
//!
//! Builds a graph of database entities and their foreign-key associations
//! from a [`meta::MetadataProvider`], resolves associations whose referenced
//! entity arrives later, and persists diagrams with [`codec::DiagramCodec`].

pub mod builder;
pub mod cancel;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod decorator;
pub mod diagram;
pub mod error;
pub mod meta;

pub use builder::{BuildOptions, BuildReport, EntityGraphBuilder};
pub use cancel::CancellationToken;
pub use catalog::Catalog;
pub use codec::{DiagramCodec, LoadReport, Saved};
pub use config::DiagramConfig;
pub use decorator::{DefaultDecorator, DiagramDecorator};
pub use diagram::DiagramContainer;
pub use error::{DiagramError, MetadataError, Result};
