//! Partitioned on-disk store and query engine for FamDB.
//!
//! One logical database is a directory of container files named
//! `<export>.<partition>.h5`: a root file (partition 0) holding the full
//! taxonomy tree plus its own family slice, and zero or more leaf files
//! each owning the families of one contiguous taxonomy subtree. The
//! [`FileSet`] coordinator opens and validates the directory, the
//! [`TaxonomyIndex`] answers name and lineage queries, and the query
//! module collates family streams across files.

pub mod codec;
pub mod container;
pub mod fileset;
pub mod query;
pub mod schema;
pub mod taxonomy;

pub use container::{AttrValue, Container, ContainerError, Dataset, Mode};
pub use fileset::FileSet;
pub use query::{AppendOutcome, FamilyFilter};
pub use schema::{DbInfo, FamDBFile, FileInfo, HistoryEntry, PartitionInfo};
pub use taxonomy::{
    normalize_term, write_taxonomy_tree, write_value_edges, Lineage, Resolution, TaxonBuild,
    TaxonomyIndex,
};
