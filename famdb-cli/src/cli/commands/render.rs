//! Shared family-stream renderer for the `family` and `families`
//! commands.

use std::io::Write;

use famdb_core::{FamDBResult, Family, NameLookup, TaxonId};
use famdb_format::{write_embl, write_fasta, write_hmm, write_summary, Buffer, FastaOptions, HmmOptions};
use famdb_store::FileSet;
use tracing::warn;

use super::FamilyFormat;

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub format: FamilyFormat,
    pub include_class_in_name: bool,
    pub add_reverse_complement: bool,
    /// Stage requested with `--stage`; buffer-stage slices are emitted
    /// for FASTA formats when it matches a bracketed buffer spec.
    pub stage: Option<u32>,
    /// Taxon whose per-species thresholds drive `hmm_species`.
    pub species: Option<TaxonId>,
}

impl RenderOptions {
    pub fn new(format: FamilyFormat) -> Self {
        RenderOptions {
            format,
            include_class_in_name: false,
            add_reverse_complement: false,
            stage: None,
            species: None,
        }
    }
}

/// Streams `accessions` to `out` one family at a time, optionally
/// preceded by the database copyright header in the format's comment
/// syntax.
pub fn print_families(
    out: &mut dyn Write,
    set: &FileSet,
    accessions: &[String],
    header: bool,
    opts: &RenderOptions,
) -> FamDBResult<()> {
    if header {
        if let Some(info) = set.db_info() {
            let prefix = match opts.format {
                FamilyFormat::Hmm | FamilyFormat::HmmSpecies => Some("#   "),
                FamilyFormat::Embl | FamilyFormat::EmblMeta | FamilyFormat::EmblSeq => {
                    Some("CC   ")
                }
                FamilyFormat::FastaName | FamilyFormat::FastaAcc => None,
                FamilyFormat::Summary => Some(""),
            };
            if let Some(prefix) = prefix {
                for line in info.copyright.lines() {
                    writeln!(out, "{}{}", prefix, line)?;
                }
            }
        }
    }

    for accession in accessions {
        let Some(family) = set.family_by_accession(accession)? else {
            continue;
        };
        print_family(out, set, &family, opts)?;
    }
    Ok(())
}

/// Renders one family in the requested format.
pub fn print_family(
    out: &mut dyn Write,
    set: &FileSet,
    family: &Family,
    opts: &RenderOptions,
) -> FamDBResult<()> {
    let lookup: Option<&dyn NameLookup> = Some(set);
    match opts.format {
        FamilyFormat::Summary => {
            write_summary(out, family, opts.include_class_in_name)?;
        }
        FamilyFormat::Hmm => {
            write_hmm(
                out,
                family,
                lookup,
                &HmmOptions {
                    include_class_in_name: opts.include_class_in_name,
                    species: None,
                },
            )?;
        }
        FamilyFormat::HmmSpecies => {
            write_hmm(
                out,
                family,
                lookup,
                &HmmOptions {
                    include_class_in_name: opts.include_class_in_name,
                    species: opts.species,
                },
            )?;
        }
        FamilyFormat::FastaName | FamilyFormat::FastaAcc => {
            let use_accession = opts.format == FamilyFormat::FastaAcc;
            for buffer in buffers_for(family, opts.stage) {
                let fasta_opts = FastaOptions {
                    use_accession,
                    include_class_in_name: opts.include_class_in_name,
                    reverse_complement: false,
                    buffer,
                };
                write_fasta(out, family, lookup, &fasta_opts)?;
                if opts.add_reverse_complement {
                    write_fasta(
                        out,
                        family,
                        lookup,
                        &FastaOptions {
                            reverse_complement: true,
                            ..fasta_opts
                        },
                    )?;
                }
            }
        }
        FamilyFormat::Embl => {
            write_embl(out, family, lookup, true, true)?;
        }
        FamilyFormat::EmblMeta => {
            write_embl(out, family, lookup, true, false)?;
        }
        FamilyFormat::EmblSeq => {
            write_embl(out, family, lookup, false, true)?;
        }
    }
    Ok(())
}

/// Buffer slices to emit for a family under `--stage`: each matching
/// `stage[start-end]` spec produces a sliced record, a bare matching
/// stage number produces a whole-sequence buffer record. Without a stage
/// (or without matches) the plain record is emitted.
fn buffers_for(family: &Family, stage: Option<u32>) -> Vec<Option<Buffer>> {
    let Some(stage) = stage else {
        return vec![None];
    };
    let Some(specs) = family.buffer_stages.as_deref() else {
        return vec![None];
    };

    let mut buffers = Vec::new();
    for spec in specs.split(',') {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        match parse_buffer_spec(spec) {
            Some((number, Some((start, end)))) => {
                if number == stage {
                    buffers.push(Some(Buffer::Range(start, end)));
                }
            }
            Some((number, None)) => {
                if number == stage {
                    buffers.push(Some(Buffer::Whole));
                }
            }
            None => warn!("ignored invalid buffer specification: '{}'", spec),
        }
    }
    if buffers.is_empty() {
        buffers.push(None);
    }
    buffers
}

fn parse_buffer_spec(spec: &str) -> Option<(u32, Option<(u64, u64)>)> {
    match spec.split_once('[') {
        None => Some((spec.parse().ok()?, None)),
        Some((number, range)) => {
            let number = number.trim().parse().ok()?;
            let range = range.strip_suffix(']')?;
            let (start, end) = range.split_once('-')?;
            Some((number, Some((start.parse().ok()?, end.parse().ok()?))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_buffer_spec() {
        assert_eq!(parse_buffer_spec("20"), Some((20, None)));
        assert_eq!(parse_buffer_spec("10[1-2]"), Some((10, Some((1, 2)))));
        assert_eq!(parse_buffer_spec("10[1-2"), None);
        assert_eq!(parse_buffer_spec("x[1-2]"), None);
    }

    #[test]
    fn test_buffers_for_matching_stage() {
        let family = Family {
            accession: "DF0000004".to_string(),
            buffer_stages: Some("10[1-2],10[5-8],20".to_string()),
            ..Default::default()
        };
        assert_eq!(
            buffers_for(&family, Some(10)),
            vec![Some(Buffer::Range(1, 2)), Some(Buffer::Range(5, 8))]
        );
        assert_eq!(buffers_for(&family, Some(20)), vec![Some(Buffer::Whole)]);
        assert_eq!(buffers_for(&family, Some(99)), vec![None]);
        assert_eq!(buffers_for(&family, None), vec![None]);
    }
}
