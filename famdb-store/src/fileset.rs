//! Discovery and coordination of one export's partition files.
//!
//! A set owns its files for its whole lifetime: acquired on open,
//! released on drop. Reads route to the partition that owns the relevant
//! taxonomy subtree; partitions that are not installed degrade the result
//! and raise a warning instead of failing the query.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use famdb_core::{normalize_accession, FamDBError, FamDBResult, Family, NameLookup, TaxonId};

use crate::container::Mode;
use crate::schema::{DbInfo, FamDBFile, FileInfo, HistoryEntry};
use crate::taxonomy::TaxonomyIndex;

pub struct FileSet {
    pub(crate) dir: PathBuf,
    pub(crate) files: BTreeMap<u32, FamDBFile>,
    pub(crate) taxonomy: TaxonomyIndex,
    pub(crate) file_info: FileInfo,
    warned: RefCell<BTreeSet<u32>>,
}

impl FileSet {
    /// Opens the famdb file set in `dir`: every file named
    /// `<export>.<partition>.h5`, with exactly one export represented and
    /// its partition-0 (root) file present.
    pub fn open(dir: &Path, mode: Mode) -> FamDBResult<FileSet> {
        let mut partitions: BTreeMap<u32, PathBuf> = BTreeMap::new();
        let mut prefixes: BTreeSet<String> = BTreeSet::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".h5") {
                continue;
            }
            let Some((prefix, partition)) = parse_file_name(&name) else {
                return Err(FamDBError::InconsistentFileSet(format!(
                    "{} does not match the <export>.<partition>.h5 naming scheme",
                    name
                )));
            };
            prefixes.insert(prefix);
            if partitions.insert(partition, entry.path()).is_some() {
                return Err(FamDBError::InconsistentFileSet(format!(
                    "multiple files claim partition {}",
                    partition
                )));
            }
        }

        if partitions.is_empty() {
            return Err(FamDBError::NotFound(format!(
                "no famdb files found in {}",
                dir.display()
            )));
        }
        if prefixes.len() != 1 {
            return Err(FamDBError::InconsistentFileSet(format!(
                "only one export may be present in {}, found: {}",
                dir.display(),
                prefixes.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }
        if !partitions.contains_key(&0) {
            return Err(FamDBError::InconsistentFileSet(format!(
                "no root (partition 0) file present in {}",
                dir.display()
            )));
        }

        let mut files = BTreeMap::new();
        for (partition, path) in &partitions {
            let file = FamDBFile::open(path, mode)?;
            if file.partition_number() != *partition {
                return Err(FamDBError::InconsistentFileSet(format!(
                    "{} is named partition {} but records partition {}",
                    path.display(),
                    partition,
                    file.partition_number()
                )));
            }
            files.insert(*partition, file);
        }

        let root = &files[&0];
        let file_info = root.file_info()?;
        let schema_version = root.schema_version();
        for (partition, file) in &files {
            if file.file_info()? != file_info || file.schema_version() != schema_version {
                return Err(FamDBError::InconsistentFileSet(format!(
                    "partition {} belongs to a different export run",
                    partition
                )));
            }
        }

        let taxonomy = TaxonomyIndex::load(root)?;
        Ok(FileSet {
            dir: dir.to_path_buf(),
            files,
            taxonomy,
            file_info,
            warned: RefCell::new(BTreeSet::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn taxonomy(&self) -> &TaxonomyIndex {
        &self.taxonomy
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.file_info
    }

    pub fn root(&self) -> &FamDBFile {
        &self.files[&0]
    }

    pub fn partitions_present(&self) -> Vec<u32> {
        self.files.keys().copied().collect()
    }

    pub fn has_partition(&self, partition: u32) -> bool {
        self.files.contains_key(&partition)
    }

    pub fn file(&self, partition: u32) -> Option<&FamDBFile> {
        self.files.get(&partition)
    }

    pub fn db_info(&self) -> Option<DbInfo> {
        self.root().db_info()
    }

    /// Summed (consensus, hmm, files-present) counts.
    pub fn counts(&self) -> (u64, u64, usize) {
        let mut consensus = 0;
        let mut hmm = 0;
        for file in self.files.values() {
            let (c, h) = file.counts();
            consensus += c;
            hmm += h;
        }
        (consensus, hmm, self.files.len())
    }

    /// Merged change history, per partition.
    pub fn history(&self) -> BTreeMap<u32, Vec<HistoryEntry>> {
        self.files
            .iter()
            .map(|(partition, file)| (*partition, file.history()))
            .collect()
    }

    /// Records that `partition` was needed but is not installed; warns
    /// once per partition per set.
    pub(crate) fn warn_missing_partition(&self, partition: u32) {
        if self.warned.borrow_mut().insert(partition) {
            warn!("partition {} not installed", partition);
        }
    }

    /// Accessions directly attached to `taxon` in its owning partition,
    /// or `None` when that partition is not installed.
    pub fn families_for_taxon(
        &self,
        taxon: TaxonId,
        curated_only: bool,
        uncurated_only: bool,
    ) -> Option<Vec<String>> {
        let partition = self.taxonomy.partition_of(taxon)?;
        match self.files.get(&partition) {
            Some(file) => Some(file.families_for_taxon(taxon, curated_only, uncurated_only)),
            None => {
                self.warn_missing_partition(partition);
                None
            }
        }
    }

    /// Family count at `taxon`, or `None` when its partition is absent.
    pub fn count_for_taxon(
        &self,
        taxon: TaxonId,
        curated_only: bool,
        uncurated_only: bool,
    ) -> Option<usize> {
        self.families_for_taxon(taxon, curated_only, uncurated_only)
            .map(|accessions| accessions.len())
    }

    /// Loads a family by accession. Lookup is case-insensitive and
    /// accepts both versioned and unversioned spellings.
    pub fn family_by_accession(&self, accession: &str) -> FamDBResult<Option<Family>> {
        // Fast path: the accession as stored.
        for file in self.files.values() {
            if let Some(family) = file.family_by_accession(accession)? {
                return Ok(Some(family));
            }
        }
        let (base, _version) = normalize_accession(accession);
        for file in self.files.values() {
            if let Some(family) = file.family_by_accession(&base)? {
                return Ok(Some(family));
            }
        }
        // Slow path: case-insensitive scan.
        for file in self.files.values() {
            for stored in file.family_accessions() {
                if stored.eq_ignore_ascii_case(&base) {
                    return Ok(file.family_by_accession(&stored)?);
                }
            }
        }
        Ok(None)
    }

    /// Loads a family by its name link.
    pub fn family_by_name(&self, name: &str) -> FamDBResult<Option<Family>> {
        for file in self.files.values() {
            if let Some(family) = file.family_by_name(name)? {
                return Ok(Some(family));
            }
        }
        Ok(None)
    }

    /// True when `accession` is registered under any of `stages` in any
    /// present file.
    pub fn in_stages(&self, accession: &str, stages: &[u32]) -> bool {
        self.files
            .values()
            .any(|file| file.in_stages(accession, stages))
    }

    // Write-side helpers (append command) --------------------------------

    pub fn file_mut(&mut self, partition: u32) -> Option<&mut FamDBFile> {
        self.files.get_mut(&partition)
    }

    pub fn set_db_info_all(&mut self, info: &DbInfo) -> FamDBResult<()> {
        for file in self.files.values_mut() {
            let ticket = file.begin_change("Metadata Set")?;
            file.set_db_info(info)?;
            file.commit_change(ticket)?;
        }
        Ok(())
    }

    pub fn set_description_all(&mut self, description: &str) -> FamDBResult<()> {
        for file in self.files.values_mut() {
            let ticket = file.begin_change("File Description Updated")?;
            file.set_description(description)?;
            file.commit_change(ticket)?;
        }
        Ok(())
    }

    pub fn finalize_all(&mut self) -> FamDBResult<()> {
        for file in self.files.values_mut() {
            file.finalize()?;
        }
        Ok(())
    }
}

impl NameLookup for FileSet {
    fn scientific_name(&self, tax_id: TaxonId) -> Option<String> {
        self.taxonomy.scientific_name(tax_id)
    }

    fn ancestry(&self, tax_id: TaxonId) -> Vec<TaxonId> {
        self.taxonomy.ancestry(tax_id)
    }

    fn lineage_path(&self, tax_id: TaxonId) -> Vec<String> {
        self.taxonomy.lineage_path(tax_id)
    }
}

fn parse_file_name(name: &str) -> Option<(String, u32)> {
    let base = name.strip_suffix(".h5")?;
    let (prefix, partition) = base.rsplit_once('.')?;
    if prefix.is_empty() {
        return None;
    }
    Some((prefix.to_string(), partition.parse().ok()?))
}
