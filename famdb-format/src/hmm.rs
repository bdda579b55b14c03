//! HMM emission.
//!
//! The stored model text is copied through with `NAME`/`ACC`/`DESC`
//! rewritten from current metadata and a metadata block (thresholds,
//! classification, clades, RepeatMasker annotations) inserted ahead of the
//! first `STATS` line, where HMMER tolerates unknown record codes.

use std::io::{self, Write};

use famdb_core::{Family, NameLookup, SpeciesThreshold, TaxonId};

use crate::sequence::wrap_text;

#[derive(Debug, Clone, Copy, Default)]
pub struct HmmOptions {
    /// Append `#Type/SubType` to the `NAME` record.
    pub include_class_in_name: bool,
    /// Substitute this species' thresholds into `GA`/`TC`/`NC` and drop
    /// the per-species `TH` records.
    pub species: Option<TaxonId>,
}

/// Writes the Dfam-style HMM for `family`. Returns `Ok(false)` when the
/// family has no model.
pub fn write_hmm(
    out: &mut dyn Write,
    family: &Family,
    lookup: Option<&dyn NameLookup>,
    opts: &HmmOptions,
) -> io::Result<bool> {
    let Some(model) = family.model.as_deref() else {
        return Ok(false);
    };

    let thresholds = family.thresholds();
    let cutoffs = select_cutoffs(family, &thresholds, opts.species, lookup);

    let mut name = family
        .name
        .clone()
        .unwrap_or_else(|| family.accession.clone());
    if opts.include_class_in_name {
        if let Some(class) = family.rm_class() {
            name = format!("{}#{}", name, class);
        }
    }

    let mut block_done = false;
    for line in model.lines() {
        if line.starts_with("NAME ") {
            writeln!(out, "{:<6}{}", "NAME", name)?;
            writeln!(out, "{:<6}{}", "ACC", family.accession_with_version())?;
            if let Some(title) = family.title.as_deref() {
                writeln!(out, "{:<6}{}", "DESC", title)?;
            }
            continue;
        }
        if line.starts_with("ACC ") || line.starts_with("DESC ") {
            // Rewritten alongside NAME above.
            continue;
        }
        if line.starts_with("STATS") && !block_done {
            write_metadata_block(out, family, lookup, opts, &thresholds, cutoffs)?;
            block_done = true;
        }
        writeln!(out, "{}", line)?;
    }
    Ok(true)
}

/// The GA/TC/NC triple to write, if any: the nearest applicable
/// per-species threshold when a species was requested, else the general
/// cutoff.
fn select_cutoffs(
    family: &Family,
    thresholds: &[SpeciesThreshold],
    species: Option<TaxonId>,
    lookup: Option<&dyn NameLookup>,
) -> Option<(f64, f64, f64)> {
    if let Some(species) = species {
        if let Some(lookup) = lookup {
            let ancestry = lookup.ancestry(species);
            let best = thresholds
                .iter()
                .filter_map(|th| {
                    ancestry
                        .iter()
                        .position(|&id| id == th.tax_id)
                        .map(|depth| (depth, th))
                })
                .max_by_key(|(depth, _)| *depth)
                .map(|(_, th)| th);
            if let Some(th) = best {
                return Some((th.hit_ga, th.hit_tc, th.hit_nc));
            }
        }
    }
    family.general_cutoff.map(|cutoff| (cutoff, cutoff, cutoff))
}

fn write_metadata_block(
    out: &mut dyn Write,
    family: &Family,
    lookup: Option<&dyn NameLookup>,
    opts: &HmmOptions,
    thresholds: &[SpeciesThreshold],
    cutoffs: Option<(f64, f64, f64)>,
) -> io::Result<()> {
    if let Some((ga, tc, nc)) = cutoffs {
        writeln!(out, "{:<6}{:.2};", "GA", ga)?;
        writeln!(out, "{:<6}{:.2};", "TC", tc)?;
        writeln!(out, "{:<6}{:.2};", "NC", nc)?;
    }

    // A species-specific export collapses the thresholds into GA/TC/NC
    // above; the TH records are only kept on the generic export.
    if opts.species.is_none() {
        for th in thresholds {
            let tax_name = lookup
                .and_then(|l| l.scientific_name(th.tax_id))
                .unwrap_or_default();
            writeln!(
                out,
                "{:<6}TaxId:{}; TaxName:{}; GA:{:.2}; TC:{:.2}; NC:{:.2}; fdr:{};",
                "TH", th.tax_id, tax_name, th.hit_ga, th.hit_tc, th.hit_nc, th.fdr
            )?;
        }
    }

    if let Some(bm) = family.build_method.as_deref() {
        writeln!(out, "{:<6}{}", "BM", bm)?;
    }
    if let Some(sm) = family.search_method.as_deref() {
        writeln!(out, "{:<6}{}", "SM", sm)?;
    }

    if let Some(classification) = family.classification.as_deref() {
        let below_root = classification
            .strip_prefix("root;")
            .unwrap_or(classification);
        writeln!(out, "{:<6}{}", "CT", below_root)?;
    }

    let clade_names: Vec<String> = family
        .clades
        .iter()
        .filter_map(|clade| lookup.and_then(|l| l.sanitized_name(*clade)))
        .collect();
    for (clade, clade_name) in family.clades.iter().zip(clade_names.iter()) {
        writeln!(out, "{:<6}TaxId:{} TaxName:{}", "MS", clade, clade_name)?;
    }

    if let Some(description) = family.description.as_deref() {
        for line in wrap_text(description, 72) {
            writeln!(out, "{:<6}{}", "CC", line)?;
        }
    }
    writeln!(out, "{:<6}RepeatMasker Annotations:", "CC")?;
    writeln!(
        out,
        "{:<6}     Type: {}",
        "CC",
        family.repeat_type.as_deref().unwrap_or_default()
    )?;
    writeln!(
        out,
        "{:<6}     SubType: {}",
        "CC",
        family.repeat_subtype.as_deref().unwrap_or_default()
    )?;
    writeln!(out, "{:<6}     Species: {}", "CC", clade_names.join(", "))?;
    writeln!(
        out,
        "{:<6}     SearchStages: {}",
        "CC",
        family.search_stages.as_deref().unwrap_or_default()
    )?;
    writeln!(
        out,
        "{:<6}     BufferStages: {}",
        "CC",
        family.buffer_stages.as_deref().unwrap_or_default()
    )?;
    if family.refineable {
        writeln!(out, "{:<6}     Refineable", "CC")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockLookup;

    fn test_family() -> Family {
        Family {
            accession: "TEST0001".to_string(),
            title: Some("A Simple Test".to_string()),
            version: Some(1),
            clades: vec![TaxonId(5), TaxonId(3)],
            repeat_type: Some("Type".to_string()),
            repeat_subtype: Some("SubType".to_string()),
            classification: Some("root;Type;SubType".to_string()),
            model: Some(
                "\
HMMER3/f [3.1b2 | February 2015]
NAME  TEST0001#Type/SubType
LENG  100
CKSUM 765031794
STATS LOCAL MSV      -10.5531  0.70202
STATS LOCAL VITERBI  -11.4974  0.70202
HMM          A        C        G        T
<snip>
"
                .to_string(),
            ),
            ..Default::default()
        }
    }

    fn render(family: &Family, opts: &HmmOptions) -> String {
        let mut out = Vec::new();
        write_hmm(&mut out, family, Some(&MockLookup), opts).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_simple() {
        let fam = test_family();
        assert_eq!(
            render(&fam, &HmmOptions::default()),
            "\
HMMER3/f [3.1b2 | February 2015]
NAME  TEST0001
ACC   TEST0001.1
DESC  A Simple Test
LENG  100
CKSUM 765031794
CT    Type;SubType
MS    TaxId:5 TaxName:Species_1
MS    TaxId:3 TaxName:Another_Clade_3.
CC    RepeatMasker Annotations:
CC         Type: Type
CC         SubType: SubType
CC         Species: Species_1, Another_Clade_3.
CC         SearchStages: \n\
CC         BufferStages: \n\
STATS LOCAL MSV      -10.5531  0.70202
STATS LOCAL VITERBI  -11.4974  0.70202
HMM          A        C        G        T
<snip>
"
        );
    }

    #[test]
    fn test_special_metadata() {
        let mut fam = test_family();
        fam.refineable = true;
        fam.build_method = Some("Example Build Method".to_string());
        fam.search_method = Some("Example Search Method".to_string());
        fam.description = Some("Example Title/Description".to_string());
        fam.general_cutoff = Some(25.67);

        let rendered = render(&fam, &HmmOptions::default());
        assert!(rendered.contains("GA    25.67;\nTC    25.67;\nNC    25.67;\n"));
        assert!(rendered.contains("BM    Example Build Method\n"));
        assert!(rendered.contains("SM    Example Search Method\n"));
        assert!(rendered.contains("CC    Example Title/Description\n"));
        assert!(rendered.contains("CC         Refineable\n"));
    }

    #[test]
    fn test_no_model() {
        let mut fam = test_family();
        fam.model = None;
        let mut out = Vec::new();
        assert!(!write_hmm(&mut out, &fam, None, &HmmOptions::default()).unwrap());
    }

    #[test]
    fn test_generic_export_keeps_th_records() {
        let mut fam = test_family();
        fam.taxa_thresholds = Some("5,1.0,2.0,3.0,0.002\n3,1.0,2.0,3.0,0.002".to_string());

        let rendered = render(&fam, &HmmOptions::default());
        assert!(rendered.contains(
            "TH    TaxId:5; TaxName:Species 1; GA:1.00; TC:2.00; NC:3.00; fdr:0.002;\n"
        ));
        assert!(rendered.contains(
            "TH    TaxId:3; TaxName:Another Clade (3.); GA:1.00; TC:2.00; NC:3.00; fdr:0.002;\n"
        ));
    }

    #[test]
    fn test_species_thresholds_substituted() {
        let mut fam = test_family();
        fam.taxa_thresholds = Some("5,1.0,2.0,3.0,0.002\n2,4.0,5.0,6.0,0.002".to_string());

        // Taxon 5's ancestry is 1 -> 2 -> 5; the threshold at 5 is nearer
        // than the one at 2.
        let rendered = render(
            &fam,
            &HmmOptions {
                species: Some(TaxonId(5)),
                ..Default::default()
            },
        );
        assert!(rendered.contains("GA    1.00;\nTC    2.00;\nNC    3.00;\n"));
        assert!(!rendered.contains("TH    "));

        // Taxon 2 only has the threshold at 2 in its ancestry.
        let rendered = render(
            &fam,
            &HmmOptions {
                species: Some(TaxonId(2)),
                ..Default::default()
            },
        );
        assert!(rendered.contains("GA    4.00;\nTC    5.00;\nNC    6.00;\n"));
        assert!(!rendered.contains("TH    "));
    }

    #[test]
    fn test_class_in_name() {
        let fam = test_family();
        let rendered = render(
            &fam,
            &HmmOptions {
                include_class_in_name: true,
                ..Default::default()
            },
        );
        assert!(rendered.starts_with(
            "HMMER3/f [3.1b2 | February 2015]\nNAME  TEST0001#Type/SubType\nACC   TEST0001.1\n"
        ));
    }
}
