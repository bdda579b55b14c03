//! The in-memory family record.
//!
//! A family is one TE/repeat model: an optional consensus sequence, an
//! optional profile HMM, and the metadata RepeatMasker and the export
//! formats need. Records are plain owned values; the store decodes them
//! out of the container and nothing borrows from storage afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::accession;
use crate::taxon::TaxonId;

/// A literature citation attached to a family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub order_added: i64,
    pub authors: String,
    pub title: String,
    pub journal: String,
}

/// A coding sequence annotated on a family consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingSequence {
    pub cds_start: u64,
    pub cds_end: u64,
    pub exon_count: u64,
    pub product: String,
    pub description: String,
    pub translation: String,
}

/// A per-species score threshold carried inside an HMM ("TH" record).
///
/// The taxon name is not stored with the family; it is resolved from the
/// taxonomy at emission time.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesThreshold {
    pub tax_id: TaxonId,
    pub hit_ga: f64,
    pub hit_tc: f64,
    pub hit_nc: f64,
    /// False discovery rate, kept verbatim as stored.
    pub fdr: String,
}

/// Metadata and model of a TE family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Family {
    pub accession: String,
    pub version: Option<u32>,
    pub name: Option<String>,
    /// Short title, exported as the HMM `DESC` and EMBL `DE` line.
    pub title: Option<String>,
    /// Long-form description, exported into `CC` blocks.
    pub description: Option<String>,
    /// Semicolon-delimited classification path, beginning with `root`.
    pub classification: Option<String>,
    /// Clades (taxon ids) this family is assigned to.
    pub clades: Vec<TaxonId>,
    /// Consensus sequence (upper-case nucleotides), if any.
    pub consensus: Option<String>,
    /// Profile HMM text, if any.
    pub model: Option<String>,
    /// Newline-separated `Database:Identifier` alternate names.
    pub aliases: Option<String>,
    pub citations: Vec<Citation>,
    pub coding_sequences: Vec<CodingSequence>,
    /// General score threshold used for GA/TC/NC when no per-species
    /// threshold applies.
    pub general_cutoff: Option<f64>,
    /// Per-species thresholds, one `taxid,GA,TC,NC,fdr` line each.
    pub taxa_thresholds: Option<String>,
    pub build_method: Option<String>,
    pub search_method: Option<String>,
    pub date_created: Option<String>,
    pub date_modified: Option<String>,
    pub length: Option<u64>,
    pub repeat_type: Option<String>,
    pub repeat_subtype: Option<String>,
    /// Comma-separated RepeatMasker search stages, e.g. "30,45".
    pub search_stages: Option<String>,
    /// Comma-separated buffer stages, e.g. "10[1-2],10[5-8],20".
    pub buffer_stages: Option<String>,
    pub target_site_cons: Option<String>,
    pub refineable: bool,
    /// Attributes this build does not know about, preserved on round-trip.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Family {
    /// Curated families carry a `DF` accession, uncurated ones `DR`.
    pub fn is_curated(&self) -> bool {
        accession::is_curated(&self.accession)
    }

    /// `ACC.V` when a version is present, the bare accession otherwise.
    pub fn accession_with_version(&self) -> String {
        match self.version {
            Some(v) => format!("{}.{}", self.accession, v),
            None => self.accession.clone(),
        }
    }

    /// The RepeatMasker class, `Type/SubType` or just `Type`.
    pub fn rm_class(&self) -> Option<String> {
        let ty = self.repeat_type.as_deref()?;
        Some(match self.repeat_subtype.as_deref() {
            Some(sub) => format!("{}/{}", ty, sub),
            None => ty.to_string(),
        })
    }

    /// Search stage numbers parsed out of `search_stages`.
    pub fn search_stage_numbers(&self) -> Vec<u32> {
        parse_stage_list(self.search_stages.as_deref())
    }

    /// Buffer stage numbers, ignoring any `[start-end]` range suffix.
    pub fn buffer_stage_numbers(&self) -> Vec<u32> {
        parse_stage_list(self.buffer_stages.as_deref())
    }

    /// Per-species thresholds parsed out of `taxa_thresholds`.
    /// Malformed lines are skipped.
    pub fn thresholds(&self) -> Vec<SpeciesThreshold> {
        let mut out = Vec::new();
        let Some(raw) = self.taxa_thresholds.as_deref() else {
            return out;
        };
        for line in raw.lines() {
            let fields: Vec<&str> = line.trim().split(',').collect();
            if fields.len() != 5 {
                continue;
            }
            let (Ok(tax_id), Ok(ga), Ok(tc), Ok(nc)) = (
                fields[0].parse::<u32>(),
                fields[1].parse::<f64>(),
                fields[2].parse::<f64>(),
                fields[3].parse::<f64>(),
            ) else {
                continue;
            };
            out.push(SpeciesThreshold {
                tax_id: TaxonId(tax_id),
                hit_ga: ga,
                hit_tc: tc,
                hit_nc: nc,
                fdr: fields[4].to_string(),
            });
        }
        out
    }

    /// `(database, identifier)` pairs parsed out of `aliases`.
    pub fn alias_entries(&self) -> Vec<(String, String)> {
        self.aliases
            .as_deref()
            .unwrap_or_default()
            .lines()
            .filter_map(|line| {
                let (db, id) = line.split_once(':')?;
                let (db, id) = (db.trim(), id.trim());
                if db.is_empty() || id.is_empty() {
                    None
                } else {
                    Some((db.to_string(), id.to_string()))
                }
            })
            .collect()
    }

    /// Sequence length: the stored length if present, else the consensus
    /// length.
    pub fn sequence_length(&self) -> Option<u64> {
        self.length
            .or_else(|| self.consensus.as_ref().map(|c| c.len() as u64))
    }
}

impl fmt::Display for Family {
    /// One-line summary: `ACC.V 'NAME': <classification> len=<N>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}': {} len={}",
            self.accession_with_version(),
            self.name.as_deref().unwrap_or(&self.accession),
            self.classification.as_deref().unwrap_or("Unknown"),
            match self.sequence_length() {
                Some(len) => len.to_string(),
                None => "unknown".to_string(),
            },
        )
    }
}

fn parse_stage_list(raw: Option<&str>) -> Vec<u32> {
    let mut out = Vec::new();
    for spec in raw.unwrap_or_default().split(',') {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        let number = spec.split('[').next().unwrap_or(spec);
        if let Ok(n) = number.trim().parse::<u32>() {
            if !out.contains(&n) {
                out.push(n);
            }
        }
    }
    out
}

/// Taxonomy queries the format emitters need.
///
/// Implemented by the file set; tests substitute a fixed-answer mock.
pub trait NameLookup {
    /// First scientific name of the taxon, unmodified.
    fn scientific_name(&self, tax_id: TaxonId) -> Option<String>;

    /// Sanitized scientific name (underscores for separators, brackets
    /// stripped), as used in FASTA headers and HMM `MS` lines.
    fn sanitized_name(&self, tax_id: TaxonId) -> Option<String> {
        self.scientific_name(tax_id)
            .map(|name| crate::taxon::sanitize_name(&name))
    }

    /// Ancestor chain of the taxon, root first, ending with the taxon
    /// itself.
    fn ancestry(&self, tax_id: TaxonId) -> Vec<TaxonId>;

    /// Scientific names along the ancestor chain, excluding the `root`
    /// node and the taxon itself. Used for the EMBL `OC` lines.
    fn lineage_path(&self, tax_id: TaxonId) -> Vec<String>;
}
