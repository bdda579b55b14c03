pub mod append;
pub mod families;
pub mod family;
pub mod info;
pub mod lineage;
pub mod names;
pub mod render;

use famdb_core::{FamDBError, FamDBResult, TaxonId};
use famdb_store::FileSet;

/// Output formats shared by the `family` and `families` commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum FamilyFormat {
    Summary,
    Hmm,
    #[value(name = "hmm_species")]
    HmmSpecies,
    #[value(name = "fasta_name")]
    FastaName,
    #[value(name = "fasta_acc")]
    FastaAcc,
    Embl,
    #[value(name = "embl_meta")]
    EmblMeta,
    #[value(name = "embl_seq")]
    EmblSeq,
}

impl FamilyFormat {
    pub fn is_hmm(&self) -> bool {
        matches!(self, FamilyFormat::Hmm | FamilyFormat::HmmSpecies)
    }
}

/// Resolves a search term that must identify exactly one taxon, printing
/// suggestions or the ambiguity candidates to stderr before failing.
pub fn resolve_target(set: &FileSet, term: &str) -> FamDBResult<TaxonId> {
    match set.taxonomy().resolve_one(term) {
        Ok(id) => Ok(id),
        Err(FamDBError::NoMatchingTaxon(term)) => {
            let suggestions = set.taxonomy().suggest(&term, 10);
            if !suggestions.is_empty() {
                eprintln!("No results were found for that name, but some names are similar:");
                for (id, name) in suggestions {
                    eprintln!("{} {}", id, name);
                }
            }
            Err(FamDBError::NoMatchingTaxon(term))
        }
        Err(FamDBError::AmbiguousTerm { term, count, exact }) => {
            let resolution = set.taxonomy().resolve(&term);
            eprintln!("Candidates for '{}':", term);
            for id in resolution.exact.iter().chain(resolution.partial.iter()) {
                eprintln!(
                    "{} {}",
                    id,
                    set.taxonomy().display_name(*id).unwrap_or("?")
                );
            }
            Err(FamDBError::AmbiguousTerm { term, count, exact })
        }
        Err(other) => Err(other),
    }
}

/// Joins the positional term words with single spaces, the way they were
/// typed.
pub fn join_term(words: &[String]) -> String {
    words.join(" ")
}
