//! The `family` command: one family by accession or name.

use std::io::Write;

use clap::Args;

use famdb_core::{FamDBError, FamDBResult};
use famdb_store::FileSet;

use super::render::{print_family, RenderOptions};
use super::FamilyFormat;

#[derive(Args)]
pub struct FamilyArgs {
    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "summary")]
    pub format: FamilyFormat,

    /// The accession of the family to be retrieved
    pub accession: String,
}

pub fn run(set: &FileSet, args: &FamilyArgs, out: &mut dyn Write) -> FamDBResult<()> {
    let family = match set.family_by_accession(&args.accession)? {
        Some(family) => Some(family),
        None => set.family_by_name(&args.accession)?,
    };
    let Some(family) = family else {
        return Err(FamDBError::UnknownAccession(args.accession.clone()));
    };
    print_family(out, set, &family, &RenderOptions::new(args.format))
}
