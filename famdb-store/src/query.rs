//! Cross-file family queries and the append (EMBL ingest) operation.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::{debug, info};

use famdb_core::{is_curated, FamDBResult, Family, TaxonId};
use famdb_format::EmblReader;

use crate::fileset::FileSet;
use crate::taxonomy::write_value_edges;

/// Stage 95 stands for this fixed list of search stages.
const STAGE_95_EXPANSION: &[u32] = &[35, 50, 55, 60, 65, 70, 75];

/// Family filters, logically ANDed together.
#[derive(Debug, Clone, Default)]
pub struct FamilyFilter {
    pub curated_only: bool,
    pub uncurated_only: bool,
    /// RepeatMasker stage; 80 means "all stages" (no filtering) and 95
    /// expands to a fixed stage list.
    pub stage: Option<u32>,
    /// RepeatMasker class prefix, matched component by component.
    pub class_prefix: Option<String>,
    /// Family-name prefix, case-insensitive.
    pub name_prefix: Option<String>,
    /// Drop families lacking a general score threshold.
    pub require_general_threshold: bool,
    /// The output is an HMM format: a stage match must be a search stage,
    /// not merely a buffer stage.
    pub for_hmm: bool,
}

impl FamilyFilter {
    /// Concrete stages to filter on, or empty when no stage filtering
    /// applies.
    pub fn stages(&self) -> Vec<u32> {
        match self.stage {
            Some(80) | None => Vec::new(),
            Some(95) => STAGE_95_EXPANSION.to_vec(),
            Some(stage) => vec![stage],
        }
    }

    fn needs_record(&self) -> bool {
        self.class_prefix.is_some()
            || self.name_prefix.is_some()
            || self.require_general_threshold
            || (self.for_hmm && !self.stages().is_empty())
    }
}

/// True when `class` ("Type/SubType") begins with `prefix` on whole
/// component boundaries: "LTR" matches "LTR/ERVL" but not "LTRX".
fn class_matches(class: &str, prefix: &str) -> bool {
    let class_parts: Vec<&str> = class.split('/').collect();
    let prefix_parts: Vec<&str> = prefix.split('/').collect();
    if prefix_parts.len() > class_parts.len() {
        return false;
    }
    prefix_parts
        .iter()
        .zip(class_parts.iter())
        .all(|(p, c)| p.eq_ignore_ascii_case(c))
}

impl FileSet {
    /// Accessions matching `filter` in the lineage selected by `tax_id`
    /// and the ancestor/descendant flags, deduplicated (first file wins)
    /// and sorted lexicographically for deterministic output.
    pub fn accessions_filtered(
        &self,
        tax_id: TaxonId,
        ancestors: bool,
        descendants: bool,
        filter: &FamilyFilter,
    ) -> FamDBResult<Vec<String>> {
        let stages = filter.stages();

        let mut candidates: Vec<String> = Vec::new();
        let whole_database = tax_id.is_root() && descendants;
        if whole_database
            && !stages.is_empty()
            && filter.class_prefix.is_none()
            && filter.name_prefix.is_none()
        {
            // Whole-database stage queries are RepeatMasker's common
            // pattern; the stage index is much shorter than the family
            // namespace.
            for stage in &stages {
                for file in self.files.values() {
                    candidates.extend(file.accessions_for_stage(*stage));
                }
            }
        } else if whole_database {
            for file in self.files.values() {
                candidates.extend(file.family_accessions());
            }
        } else {
            let Some(tree) = self.taxonomy.lineage(tax_id, ancestors, descendants, false) else {
                return Ok(Vec::new());
            };
            for node in tree.ids() {
                if let Some(accessions) = self.families_for_taxon(node, false, false) {
                    candidates.extend(accessions);
                }
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut matched = Vec::new();
        for accession in candidates {
            if !seen.insert(accession.clone()) {
                continue;
            }
            if self.accession_matches(&accession, filter, &stages)? {
                matched.push(accession);
            }
        }
        matched.sort();
        Ok(matched)
    }

    /// Families directly attached to `taxon` that pass `filter`, or
    /// `None` when the owning partition is absent.
    pub fn count_families(&self, taxon: TaxonId, filter: &FamilyFilter) -> FamDBResult<Option<usize>> {
        let Some(accessions) = self.families_for_taxon(taxon, false, false) else {
            return Ok(None);
        };
        let stages = filter.stages();
        let mut count = 0;
        for accession in accessions {
            if self.accession_matches(&accession, filter, &stages)? {
                count += 1;
            }
        }
        Ok(Some(count))
    }

    fn accession_matches(
        &self,
        accession: &str,
        filter: &FamilyFilter,
        stages: &[u32],
    ) -> FamDBResult<bool> {
        if filter.curated_only && !is_curated(accession) {
            return Ok(false);
        }
        if filter.uncurated_only && is_curated(accession) {
            return Ok(false);
        }
        if !stages.is_empty() && !self.in_stages(accession, stages) {
            return Ok(false);
        }
        if filter.needs_record() {
            let Some(family) = self.family_by_accession(accession)? else {
                return Ok(false);
            };
            if !record_matches(&family, filter, stages) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn record_matches(family: &Family, filter: &FamilyFilter, stages: &[u32]) -> bool {
    if let Some(prefix) = filter.name_prefix.as_deref() {
        let matches = family
            .name
            .as_deref()
            .map(|name| name.to_lowercase().starts_with(&prefix.to_lowercase()))
            .unwrap_or(false);
        if !matches {
            return false;
        }
    }
    if let Some(prefix) = filter.class_prefix.as_deref() {
        let matches = family
            .rm_class()
            .map(|class| class_matches(&class, prefix))
            .unwrap_or(false);
        if !matches {
            return false;
        }
    }
    if filter.for_hmm && !stages.is_empty() {
        let search = family.search_stage_numbers();
        if !stages.iter().any(|stage| search.contains(stage)) {
            return false;
        }
    }
    if filter.require_general_threshold && family.general_cutoff.is_none() {
        debug!(
            "skipping {}: no general threshold",
            family.accession
        );
        return false;
    }
    true
}

/// Summary of one append run.
#[derive(Debug, Default)]
pub struct AppendOutcome {
    pub total: usize,
    pub added: usize,
    pub duplicates: Vec<String>,
    pub excluded: usize,
    /// Families per absent partition that could not be appended.
    pub missing: BTreeMap<u32, usize>,
}

impl FileSet {
    /// Appends families from the EMBL file at `embl_path` to the files
    /// that own their clades. `exclusions` lists accessions to skip.
    /// Families whose clades all live in absent partitions are counted in
    /// the outcome rather than failing the run.
    pub fn append_embl(
        &mut self,
        embl_path: &Path,
        exclusions: &HashSet<String>,
        new_name: Option<&str>,
        extra_description: Option<&str>,
    ) -> FamDBResult<AppendOutcome> {
        let file_name = embl_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| embl_path.display().to_string());
        let message = format!("Adding Families From {}", file_name);
        info!("{}", message);

        let lookup = self.taxonomy.sanitized_name_lookup();
        let mut reader = EmblReader::new(BufReader::new(File::open(embl_path)?), lookup);

        let mut tickets = BTreeMap::new();
        for (partition, file) in self.files.iter_mut() {
            tickets.insert(*partition, file.begin_change(&message)?);
        }

        let mut outcome = AppendOutcome::default();
        let mut file_counts: BTreeMap<u32, usize> = BTreeMap::new();
        let mut new_val_taxa: BTreeSet<TaxonId> = BTreeSet::new();

        for family in &mut reader {
            let family = family?;
            if exclusions.contains(&family.accession)
                || exclusions.contains(&family.accession_with_version())
            {
                outcome.excluded += 1;
                continue;
            }
            outcome.total += 1;

            // Partition files this family belongs in, and clades that are
            // gaining their first family.
            let mut add_partitions: BTreeSet<u32> = BTreeSet::new();
            let mut add_taxa: BTreeSet<TaxonId> = BTreeSet::new();
            for clade in &family.clades {
                let Some(partition) = self.taxonomy.partition_of(*clade) else {
                    continue;
                };
                match self.files.get(&partition) {
                    Some(file) if file.has_taxon(*clade) => {
                        add_partitions.insert(partition);
                        if file.families_for_taxon(*clade, false, false).is_empty() {
                            add_taxa.insert(*clade);
                        }
                    }
                    Some(_) => {}
                    None => {
                        self.warn_missing_partition(partition);
                        *outcome.missing.entry(partition).or_default() += 1;
                    }
                }
            }

            if add_partitions.is_empty() {
                debug!(
                    "{} not added, no local file owns its clades",
                    family.accession
                );
                continue;
            }

            let mut added = false;
            for partition in add_partitions {
                let file = self.files.get_mut(&partition).unwrap();
                match file.add_family(&family) {
                    Ok(()) => {
                        added = true;
                        *file_counts.entry(partition).or_default() += 1;
                    }
                    Err(e) => {
                        debug!("ignoring duplicate entry {}: {}", family.accession, e);
                        outcome.duplicates.push(family.accession.clone());
                    }
                }
            }
            if added {
                outcome.added += 1;
                new_val_taxa.extend(add_taxa);
            }
        }
        let header = reader.header().trim().to_string();

        for (partition, ticket) in tickets {
            let file = self.files.get_mut(&partition).unwrap();
            file.commit_change(ticket)?;
            let note = match file_counts.get(&partition) {
                Some(count) => format!(
                    "Added {} of {} Families From {}",
                    count, outcome.total, file_name
                ),
                None => format!("Found No Relevant Families From {}", file_name),
            };
            file.log_change(&note)?;
            if partition == 0 {
                file.log_change(&format!(
                    "Total Families {} of {} Added To Local Files From {}",
                    outcome.added, outcome.total, file_name
                ))?;
            }
        }

        // Fold the import metadata into the stored database info.
        if let Some(mut info) = self.db_info() {
            if let Some(name) = new_name {
                info.name = name.to_string();
            }
            if let Some(extra) = extra_description {
                info.description.push('\n');
                info.description.push_str(extra);
            }
            if !header.is_empty() {
                info.description.push_str("\n\n");
                info.description.push_str(&header);
            }
            self.set_db_info_all(&info)?;
        }

        // Clades that gained their first family invalidate the collapsed
        // value edges; rebuild them from the union of data-bearing taxa.
        if !new_val_taxa.is_empty() {
            info!("rebuilding sparse taxonomy edges");
            let mut has_families: HashSet<TaxonId> = HashSet::new();
            for file in self.files.values() {
                has_families.extend(file.taxa_with_families());
            }
            let root = self.files.get_mut(&0).unwrap();
            write_value_edges(root, &has_families)?;
        }

        info!("added {}/{} families", outcome.added, outcome.total);
        self.finalize_all()?;
        Ok(outcome)
    }

    /// Rewrites the stored database description (edit-description
    /// command).
    pub fn update_description(&mut self, description: &str) -> FamDBResult<()> {
        self.set_description_all(description)?;
        self.finalize_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_component_matching() {
        assert!(class_matches("LTR/ERVL", "LTR"));
        assert!(class_matches("LTR/ERVL", "ltr/ervl"));
        assert!(!class_matches("LTRX", "LTR"));
        assert!(!class_matches("LTR/ERVL", "LTR/ERV"));
        assert!(!class_matches("LTR", "LTR/ERVL"));
    }

    #[test]
    fn test_stage_expansion() {
        let filter = FamilyFilter {
            stage: Some(95),
            ..Default::default()
        };
        assert_eq!(filter.stages(), STAGE_95_EXPANSION.to_vec());
        let filter = FamilyFilter {
            stage: Some(80),
            ..Default::default()
        };
        assert!(filter.stages().is_empty());
        let filter = FamilyFilter {
            stage: Some(40),
            ..Default::default()
        };
        assert_eq!(filter.stages(), vec![40]);
    }
}
