//! The `names` command: all taxa whose names match a search term.

use std::io::Write;

use clap::Args;

use famdb_core::{FamDBResult, TaxonId};
use famdb_store::FileSet;

use super::join_term;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum NamesFormat {
    Pretty,
    Json,
}

#[derive(Args)]
pub struct NamesArgs {
    /// Output format; 'json' is more appropriate for scripts
    #[arg(short = 'f', long = "format", value_enum, default_value = "pretty")]
    pub format: NamesFormat,

    /// Search term: an NCBI taxonomy identifier or part of a scientific
    /// or common name
    #[arg(required = true)]
    pub term: Vec<String>,
}

pub fn run(set: &FileSet, args: &NamesArgs, out: &mut dyn Write) -> FamDBResult<()> {
    let term = join_term(&args.term);
    let resolution = set.taxonomy().resolve(&term);

    if resolution.is_empty() {
        let suggestions = set.taxonomy().suggest(&term, 10);
        if !suggestions.is_empty() {
            eprintln!("No results were found for that name, but some names are similar:");
            for (id, name) in suggestions {
                eprintln!("{} {}", id, name);
            }
        }
        return Ok(());
    }

    match args.format {
        NamesFormat::Pretty => {
            if !resolution.exact.is_empty() {
                writeln!(out, "Exact Matches")?;
                writeln!(out, "=============")?;
                for id in &resolution.exact {
                    print_entry(set, *id, out)?;
                }
            }
            if !resolution.partial.is_empty() {
                if !resolution.exact.is_empty() {
                    writeln!(out)?;
                }
                writeln!(out, "Non-exact Matches")?;
                writeln!(out, "=================")?;
                for id in &resolution.partial {
                    print_entry(set, *id, out)?;
                }
            }
        }
        NamesFormat::Json => {
            let mut entries = Vec::new();
            for id in resolution.exact.iter().chain(resolution.partial.iter()) {
                let names: Vec<serde_json::Value> = set
                    .taxonomy()
                    .names(*id)
                    .iter()
                    .map(|(kind, text)| serde_json::json!({ "kind": kind, "text": text }))
                    .collect();
                entries.push(serde_json::json!({
                    "id": id.value(),
                    "partition": set.taxonomy().partition_of(*id),
                    "names": names,
                }));
            }
            writeln!(out, "{}", serde_json::Value::Array(entries))?;
        }
    }
    Ok(())
}

fn print_entry(set: &FileSet, id: TaxonId, out: &mut dyn Write) -> FamDBResult<()> {
    let names: Vec<String> = set
        .taxonomy()
        .names(id)
        .iter()
        .map(|(kind, text)| format!("{} ({})", text, kind))
        .collect();
    writeln!(
        out,
        "Taxon: {}, Partition: {}, Names: {}",
        id,
        set.taxonomy().partition_of(id).unwrap_or_default(),
        names.join(", ")
    )?;
    Ok(())
}
