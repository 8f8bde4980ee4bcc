//! Registry coordinating copy elision between a graph-rewriting pass and the
//! runtime execution of accelerator-encapsulated subgraphs.
//!
//! The rewriting pass and the execution operator are written independently;
//! they agree on addressing by deriving [`NodeKey`]s through one codec and
//! share decisions through the [`Catalog`] tables: which graph inputs are
//! backed by mutable shared variables, which computed outputs may stay
//! resident in accelerator memory, and which variable assignments can be
//! elided because the accelerator already produced the value in place.

pub mod catalog;
pub mod error;
pub mod key;

pub use catalog::{AssignInfo, Catalog, CatalogHandle, CatalogSnapshot, DeviceTensorRef};
pub use error::{CatalogError, CatalogResult, TableKind};
pub use key::{GraphId, NodeKey};
