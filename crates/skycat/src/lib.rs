//! Storage and query engine for flat-file astronomical star catalogs.
//!
//! Catalog names resolve to a [`registry::CatalogDescriptor`] through the
//! [`registry::CatalogRegistry`]. A [`query::CatalogQuery`] then opens the
//! matching format driver and answers region, identifier, and record-number
//! queries in any supported coordinate frame.

pub mod accumulator;
pub mod angle;
pub mod config;
pub mod coords;
pub mod driver;
pub mod endian;
pub mod entry;
pub mod error;
pub mod planner;
pub mod query;
pub mod range;
pub mod registry;
pub mod tokens;
pub mod transport;

pub use entry::{SourceEntry, NO_MAGNITUDE};
pub use error::{Error, Result};
