//! Core types and errors shared across all FamDB crates

pub mod accession;
pub mod error;
pub mod family;
pub mod taxon;

// Re-export commonly used types
pub use accession::{family_bin, is_curated, normalize_accession, split_version};
pub use error::{FamDBError, FamDBResult};
pub use family::{Citation, CodingSequence, Family, NameLookup, SpeciesThreshold};
pub use taxon::{sanitize_name, TaxonId, NAME_COMMON, NAME_SCIENTIFIC, NAME_SYNONYM};

/// The version of the FamDB file format produced and consumed by this crate.
/// Files whose major version differs are refused on open.
pub const FORMAT_VERSION: &str = "1.0";

/// Version information for the FamDB project
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str =
    "Dfam - A database of transposable element (TE) sequence alignments and HMMs.";
