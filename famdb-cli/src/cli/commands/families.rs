//! The `families` command: every family applicable to a clade, filtered
//! and streamed in a chosen format.

use std::io::Write;

use clap::Args;

use famdb_core::FamDBResult;
use famdb_store::{FamilyFilter, FileSet};

use super::render::{print_families, RenderOptions};
use super::{join_term, resolve_target, FamilyFormat};

#[derive(Args)]
pub struct FamiliesArgs {
    /// Include all ancestors of the given clade
    #[arg(short = 'a', long)]
    pub ancestors: bool,

    /// Include all descendants of the given clade
    #[arg(short = 'd', long)]
    pub descendants: bool,

    /// Include only families that should be searched in the given stage
    #[arg(long, value_name = "N")]
    pub stage: Option<u32>,

    /// Include only families with the specified repeat Type/SubType
    #[arg(long = "class", value_name = "STR")]
    pub repeat_class: Option<String>,

    /// Include only families whose name begins with this search term
    #[arg(long, value_name = "STR")]
    pub name: Option<String>,

    /// Include only 'curated' families (i.e. named DFXXXXXXXXX)
    #[arg(short = 'c', long)]
    pub curated: bool,

    /// Include only 'uncurated' families (i.e. named DRXXXXXXXXX)
    #[arg(short = 'u', long)]
    pub uncurated: bool,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "summary")]
    pub format: FamilyFormat,

    /// Include a reverse-complemented copy of each matching family; only
    /// supported for FASTA formats
    #[arg(long)]
    pub add_reverse_complement: bool,

    /// Include the RepeatMasker type/subtype after the name (e.g.
    /// HERV16#LTR/ERVL); only supported for HMM and FASTA formats
    #[arg(long)]
    pub include_class_in_name: bool,

    /// Skip families missing general thresholds (logging their
    /// accessions at the debug log level)
    #[arg(long)]
    pub require_general_threshold: bool,

    /// Search term: an NCBI taxonomy identifier or an unambiguous
    /// scientific or common name
    #[arg(required = true)]
    pub term: Vec<String>,
}

pub fn run(set: &FileSet, args: &FamiliesArgs, out: &mut dyn Write) -> FamDBResult<()> {
    let term = join_term(&args.term);
    let target = resolve_target(set, &term)?;

    let filter = FamilyFilter {
        curated_only: args.curated,
        uncurated_only: args.uncurated,
        stage: args.stage,
        class_prefix: args.repeat_class.clone(),
        name_prefix: args.name.clone(),
        require_general_threshold: args.require_general_threshold,
        for_hmm: args.format.is_hmm(),
    };
    let accessions = set.accessions_filtered(target, args.ancestors, args.descendants, &filter)?;

    let opts = RenderOptions {
        format: args.format,
        include_class_in_name: args.include_class_in_name,
        add_reverse_complement: args.add_reverse_complement,
        stage: args.stage,
        species: Some(target),
    };
    print_families(out, set, &accessions, !accessions.is_empty(), &opts)
}
