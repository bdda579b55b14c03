//! The `append` command: ingest an EMBL file into an existing file set,
//! and the description-editing maintenance command.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use tracing::info;

use famdb_core::FamDBResult;
use famdb_store::FileSet;

#[derive(Args)]
pub struct AppendArgs {
    /// The EMBL file whose families should be appended
    pub infile: PathBuf,

    /// Optional file listing accessions (one per line) to skip
    pub exclusion_list: Option<PathBuf>,

    /// New name for the database (replaces the existing name)
    #[arg(long)]
    pub name: Option<String>,

    /// Additional database description (added to the existing
    /// description)
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct EditDescriptionArgs {
    /// The replacement description text
    pub new_description: String,
}

pub fn run(set: &mut FileSet, args: &AppendArgs) -> FamDBResult<()> {
    let exclusions: HashSet<String> = match &args.exclusion_list {
        Some(path) => fs::read_to_string(path)?
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect(),
        None => HashSet::new(),
    };

    let outcome = set.append_embl(
        &args.infile,
        &exclusions,
        args.name.as_deref(),
        args.description.as_deref(),
    )?;

    info!(
        "appended {}/{} families ({} duplicates, {} excluded)",
        outcome.added,
        outcome.total,
        outcome.duplicates.len(),
        outcome.excluded
    );
    for (partition, count) in &outcome.missing {
        info!(
            "partition file {} not found, {} entries were not appended",
            partition, count
        );
    }
    Ok(())
}
