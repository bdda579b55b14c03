//! The `lineage` command: ancestors/descendants of a taxon with family
//! counts.

use std::collections::{BTreeSet, HashSet};
use std::io::Write;

use clap::Args;

use famdb_core::{FamDBResult, TaxonId};
use famdb_store::{FileSet, Lineage};

use super::{join_term, resolve_target};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LineageFormat {
    Pretty,
    Semicolon,
    Totals,
}

#[derive(Args)]
pub struct LineageArgs {
    /// Include all ancestors of the given clade
    #[arg(short = 'a', long)]
    pub ancestors: bool,

    /// Include all descendants of the given clade
    #[arg(short = 'd', long)]
    pub descendants: bool,

    /// Include taxa without families
    #[arg(short = 'k', long)]
    pub complete: bool,

    /// Only tabulate curated families ('DF' records)
    #[arg(short = 'c', long)]
    pub curated: bool,

    /// Only tabulate uncurated families ('DR' records)
    #[arg(short = 'u', long)]
    pub uncurated: bool,

    /// Output format; 'semicolon' is more appropriate for scripts,
    /// 'totals' displays the number of ancestral and lineage-specific
    /// families found
    #[arg(short = 'f', long = "format", value_enum, default_value = "pretty")]
    pub format: LineageFormat,

    /// Search term: an NCBI taxonomy identifier or an unambiguous
    /// scientific or common name
    #[arg(required = true)]
    pub term: Vec<String>,
}

pub fn run(set: &FileSet, args: &LineageArgs, out: &mut dyn Write) -> FamDBResult<()> {
    let term = join_term(&args.term);
    let target = resolve_target(set, &term)?;

    // The semicolon form always needs the full root-to-leaf path through
    // every intermediate node.
    let semicolon = args.format == LineageFormat::Semicolon;
    let Some(tree) = set.taxonomy().lineage(
        target,
        args.ancestors || semicolon,
        args.descendants,
        args.complete || semicolon,
    ) else {
        return Ok(());
    };

    match args.format {
        LineageFormat::Pretty => {
            print_tree(set, &tree, "", "", args.curated, args.uncurated, out)?;
        }
        LineageFormat::Semicolon => {
            print_semicolons(
                set,
                &tree,
                "",
                Some(target),
                args.curated,
                args.uncurated,
                out,
            )?;
        }
        LineageFormat::Totals => {
            let mut seen = HashSet::new();
            let mut present = BTreeSet::new();
            let mut missing = BTreeSet::new();
            let (ancestral, specific) = lineage_totals(
                set,
                &tree,
                Some(target),
                args.curated,
                args.uncurated,
                &mut seen,
                &mut present,
                &mut missing,
            );
            let present: Vec<String> = present.iter().map(|p| p.to_string()).collect();
            let missing_note = if missing.is_empty() {
                String::new()
            } else {
                let missing: Vec<String> = missing.iter().map(|p| p.to_string()).collect();
                format!(" absent related partitions: {}", missing.join(", "))
            };
            writeln!(
                out,
                "{} entries in ancestors; {} lineage-specific entries; found in partitions: {};{}",
                ancestral,
                specific,
                present.join(", "),
                missing_note
            )?;
        }
    }
    Ok(())
}

/// Pretty-prints a lineage tree with box drawing characters.
fn print_tree(
    set: &FileSet,
    tree: &Lineage,
    gutter_self: &str,
    gutter_children: &str,
    curated: bool,
    uncurated: bool,
    out: &mut dyn Write,
) -> FamDBResult<()> {
    let partition = set.taxonomy().partition_of(tree.id).unwrap_or_default();
    if let Some(name) = set.taxonomy().display_name(tree.id) {
        let count = match set.count_for_taxon(tree.id, curated, uncurated) {
            Some(count) => format!("[{}]", count),
            None => format!("[partition {} not installed]", partition),
        };
        writeln!(
            out,
            "{}{} {}({}) {}",
            gutter_self, tree.id, name, partition, count
        )?;
    }

    // All but the last child need a downward-pointing line that links up
    // to the next child.
    if let Some((last, rest)) = tree.children.split_last() {
        for child in rest {
            print_tree(
                set,
                child,
                &format!("{}├─", gutter_children),
                &format!("{}│ ", gutter_children),
                curated,
                uncurated,
                out,
            )?;
        }
        print_tree(
            set,
            last,
            &format!("{}└─", gutter_children),
            &format!("{}  ", gutter_children),
            curated,
            uncurated,
            out,
        )?;
    }
    Ok(())
}

/// Prints a lineage tree as flat semicolon-delimited root-to-node paths,
/// starting output at `starting_at`.
fn print_semicolons(
    set: &FileSet,
    tree: &Lineage,
    parent_path: &str,
    starting_at: Option<TaxonId>,
    curated: bool,
    uncurated: bool,
    out: &mut dyn Write,
) -> FamDBResult<()> {
    let Some(name) = set.taxonomy().display_name(tree.id) else {
        return Ok(());
    };
    let path = if parent_path.is_empty() {
        name.to_string()
    } else {
        format!("{};{}", parent_path, name)
    };
    let starting_at = if starting_at == Some(tree.id) {
        None
    } else {
        starting_at
    };

    if starting_at.is_none() {
        let partition = set.taxonomy().partition_of(tree.id).unwrap_or_default();
        let count = match set.count_for_taxon(tree.id, curated, uncurated) {
            Some(count) => format!("[{}]", count),
            None => format!("(Taxon in Partition {}, Partition File Not Found)", partition),
        };
        writeln!(out, "{}({}): {} {}", tree.id, partition, path, count)?;
    }

    for child in &tree.children {
        print_semicolons(set, child, &path, starting_at, curated, uncurated, out)?;
    }
    Ok(())
}

/// Counts families on ancestors vs. the target lineage, deduplicating
/// families that appear on multiple branches.
#[allow(clippy::too_many_arguments)]
fn lineage_totals(
    set: &FileSet,
    tree: &Lineage,
    target: Option<TaxonId>,
    curated: bool,
    uncurated: bool,
    seen: &mut HashSet<String>,
    present: &mut BTreeSet<u32>,
    missing: &mut BTreeSet<u32>,
) -> (usize, usize) {
    let partition = set.taxonomy().partition_of(tree.id).unwrap_or_default();
    let mut count_here = 0;
    match set.families_for_taxon(tree.id, curated, uncurated) {
        Some(accessions) => {
            for accession in accessions {
                if seen.insert(accession) {
                    count_here += 1;
                }
            }
            if count_here > 0 {
                present.insert(partition);
            }
        }
        None => {
            missing.insert(partition);
        }
    }

    let target = if target == Some(tree.id) { None } else { target };

    let mut totals = (0, 0);
    for child in &tree.children {
        let (ancestral, specific) = lineage_totals(
            set, child, target, curated, uncurated, seen, present, missing,
        );
        totals.0 += ancestral;
        totals.1 += specific;
    }
    if target.is_none() {
        totals.1 += count_here;
    } else {
        totals.0 += count_here;
    }
    totals
}
