//! Format emitters for FamDB families.
//!
//! Every emitter shares the same shape: it takes an owned [`Family`]
//! record, an optional taxonomy [`NameLookup`] for display names, and a
//! `std::io::Write` sink, and produces byte-identical output for the same
//! inputs on every run. Emitters return `Ok(false)` when the family lacks
//! the payload the format needs (e.g. FASTA without a consensus) so
//! callers can skip it silently, matching how RepeatMasker consumes these
//! streams.
//!
//! [`Family`]: famdb_core::Family
//! [`NameLookup`]: famdb_core::NameLookup

pub mod embl;
pub mod fasta;
pub mod hmm;
pub mod sequence;
pub mod summary;

pub use embl::{write_embl, EmblReader};
pub use fasta::{write_fasta, Buffer, FastaOptions};
pub use hmm::{write_hmm, HmmOptions};
pub use summary::write_summary;
