//! Group layout, file identity, and the change-history ledger.
//!
//! [`FamDBFile`] is the leaf-level capability: everything a single
//! partition file can answer on its own. Root-only structures (the
//! taxonomy tree, the names cache, RepeatPeps) are layered on top by the
//! taxonomy index and the file-set coordinator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use famdb_core::{FamDBError, FamDBResult, Family, TaxonId, FORMAT_VERSION};

use crate::codec;
use crate::container::{AttrValue, Container, Dataset, Mode};

// Group layout. All readers and writers go through these constants.
pub const GROUP_FAMILIES: &str = "Families";
pub const GROUP_BYNAME: &str = "Lookup/ByName";
pub const GROUP_BYSTAGE: &str = "Lookup/ByStage";
pub const GROUP_BYTAXON: &str = "Lookup/ByTaxon";
pub const GROUP_NODES: &str = "Taxonomy/Nodes";
pub const DATA_NAMES: &str = "Taxonomy/Names";
pub const GROUP_PARTITIONS: &str = "Partitions";
pub const DATA_REPEATPEPS: &str = "RepeatPeps";
pub const GROUP_HISTORY: &str = "FileHistory";

// Per-node datasets under Taxonomy/Nodes/<id>.
pub const DATA_PARENT: &str = "Parent";
pub const DATA_CHILDREN: &str = "Children";
pub const DATA_VAL_PARENT: &str = "ValParent";
pub const DATA_VAL_CHILDREN: &str = "ValChildren";
pub const DATA_PARTITION: &str = "Partition";
pub const DATA_TAXANAMES: &str = "TaxaNames";

// File identity and metadata attributes.
pub const ATTR_SCHEMA_VERSION: &str = "schema_version";
pub const ATTR_CREATED: &str = "created";
pub const ATTR_CREATOR: &str = "creator";
pub const ATTR_PARTITION: &str = "partition_number";
pub const ATTR_PARTITION_ROOT: &str = "partition_root_taxon";
pub const ATTR_FILE_INFO: &str = "file_info";
pub const ATTR_DB_NAME: &str = "db_name";
pub const ATTR_DB_VERSION: &str = "db_version";
pub const ATTR_DB_DATE: &str = "db_date";
pub const ATTR_DB_DESCRIPTION: &str = "db_description";
pub const ATTR_DB_COPYRIGHT: &str = "db_copyright";
pub const ATTR_COUNT_CONSENSUS: &str = "count_consensus";
pub const ATTR_COUNT_HMM: &str = "count_hmm";

/// Per-partition entry in the export's partition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Taxon at the root of this partition's subtree.
    pub root_taxon: TaxonId,
    /// Display name of the root taxon.
    pub name: String,
    /// Names of the data-bearing subtree roots in this partition.
    pub detail_names: Vec<String>,
    pub filename: String,
}

/// Shared identity of one export: every file of a set stores the same
/// copy, and a set only opens when they all agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub export_name: String,
    pub export_date: String,
    pub partitions: BTreeMap<u32, PartitionInfo>,
}

/// Database-level metadata, stored in every file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbInfo {
    pub name: String,
    pub version: String,
    pub date: String,
    pub description: String,
    pub copyright: String,
}

/// One entry of the append-only change ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub operation: String,
    pub completed: bool,
}

/// Receipt for an in-flight change; pass back to
/// [`FamDBFile::commit_change`] once the write has fully landed. Dropping
/// it without committing leaves the ledger entry open, which marks the
/// file corrupt for every subsequent open.
#[must_use = "an uncommitted change poisons the file"]
pub struct ChangeTicket {
    timestamp: String,
    operation: String,
}

/// A single partition file.
pub struct FamDBFile {
    container: Container,
    path: PathBuf,
    added_consensus: u64,
    added_hmm: u64,
}

impl FamDBFile {
    /// Creates a new partition file and stamps its identity. The initial
    /// ledger entry is committed as part of creation.
    pub fn create(
        path: &Path,
        partition: u32,
        partition_root: TaxonId,
        file_info: &FileInfo,
        db_info: &DbInfo,
    ) -> FamDBResult<FamDBFile> {
        let mut file = FamDBFile {
            container: Container::create(path),
            path: path.to_path_buf(),
            added_consensus: 0,
            added_hmm: 0,
        };
        let ticket = file.begin_change("File Initialized")?;
        file.set_root_attrs(&[
            (ATTR_SCHEMA_VERSION, AttrValue::from(FORMAT_VERSION)),
            (
                ATTR_CREATED,
                AttrValue::from(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            ),
            (
                ATTR_CREATOR,
                AttrValue::from(format!("famdb {}", famdb_core::VERSION)),
            ),
            (ATTR_PARTITION, AttrValue::Int(partition as i64)),
            (
                ATTR_PARTITION_ROOT,
                AttrValue::Int(partition_root.value() as i64),
            ),
            (
                ATTR_FILE_INFO,
                AttrValue::from(serde_json::to_string(file_info)?),
            ),
        ])?;
        file.set_db_info(db_info)?;
        if partition == 0 {
            // The root file also carries per-partition metadata groups.
            for (number, entry) in &file_info.partitions {
                let path = format!("{}/{}", GROUP_PARTITIONS, number);
                file.container
                    .set_attr(&path, "name", AttrValue::from(entry.name.clone()))?;
                file.container.set_attr(
                    &path,
                    "root_taxon",
                    AttrValue::Int(entry.root_taxon.value() as i64),
                )?;
                file.container
                    .set_attr(&path, "filename", AttrValue::from(entry.filename.clone()))?;
            }
        }
        file.commit_change(ticket)?;
        Ok(file)
    }

    /// Opens an existing partition file, validating its identity
    /// attributes and refusing files whose ledger has an open entry.
    pub fn open(path: &Path, mode: Mode) -> FamDBResult<FamDBFile> {
        let container = Container::open(path, mode)?;

        let version = container
            .root_attr(ATTR_SCHEMA_VERSION)
            .and_then(|a| a.as_str())
            .ok_or_else(|| {
                FamDBError::Corrupt(format!(
                    "{}: missing format version attribute",
                    path.display()
                ))
            })?
            .to_string();
        let file_major = version.split('.').next().unwrap_or_default();
        let our_major = FORMAT_VERSION.split('.').next().unwrap_or_default();
        if file_major != our_major {
            return Err(FamDBError::FormatMismatch {
                found: version,
                supported: FORMAT_VERSION.to_string(),
            });
        }

        let mut file = FamDBFile {
            container,
            path: path.to_path_buf(),
            added_consensus: 0,
            added_hmm: 0,
        };
        if file.has_open_changes() {
            return Err(FamDBError::Corrupt(format!(
                "{}: interrupted during edit (open change-history entry)",
                path.display()
            )));
        }
        let (consensus, hmm) = file.counts();
        file.added_consensus = consensus;
        file.added_hmm = hmm;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn container(&self) -> &Container {
        &self.container
    }

    pub(crate) fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    fn set_root_attrs(&mut self, attrs: &[(&str, AttrValue)]) -> FamDBResult<()> {
        for (name, value) in attrs {
            self.container.set_root_attr(name, value.clone())?;
        }
        Ok(())
    }

    fn root_attr_str(&self, name: &str) -> Option<String> {
        self.container
            .root_attr(name)
            .and_then(|a| a.as_str())
            .map(|s| s.to_string())
    }

    // Identity -----------------------------------------------------------

    pub fn partition_number(&self) -> u32 {
        self.container
            .root_attr(ATTR_PARTITION)
            .and_then(|a| a.as_i64())
            .unwrap_or(0) as u32
    }

    pub fn is_root(&self) -> bool {
        self.partition_number() == 0
    }

    pub fn partition_root_taxon(&self) -> TaxonId {
        TaxonId(
            self.container
                .root_attr(ATTR_PARTITION_ROOT)
                .and_then(|a| a.as_i64())
                .unwrap_or(1) as u32,
        )
    }

    pub fn schema_version(&self) -> String {
        self.root_attr_str(ATTR_SCHEMA_VERSION).unwrap_or_default()
    }

    pub fn created(&self) -> String {
        self.root_attr_str(ATTR_CREATED).unwrap_or_default()
    }

    pub fn file_info(&self) -> FamDBResult<FileInfo> {
        let raw = self.root_attr_str(ATTR_FILE_INFO).ok_or_else(|| {
            FamDBError::Corrupt(format!("{}: missing file info", self.path.display()))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn db_info(&self) -> Option<DbInfo> {
        Some(DbInfo {
            name: self.root_attr_str(ATTR_DB_NAME)?,
            version: self.root_attr_str(ATTR_DB_VERSION)?,
            date: self.root_attr_str(ATTR_DB_DATE)?,
            description: self.root_attr_str(ATTR_DB_DESCRIPTION)?,
            copyright: self.root_attr_str(ATTR_DB_COPYRIGHT)?,
        })
    }

    pub fn set_db_info(&mut self, info: &DbInfo) -> FamDBResult<()> {
        self.set_root_attrs(&[
            (ATTR_DB_NAME, AttrValue::from(info.name.clone())),
            (ATTR_DB_VERSION, AttrValue::from(info.version.clone())),
            (ATTR_DB_DATE, AttrValue::from(info.date.clone())),
            (ATTR_DB_DESCRIPTION, AttrValue::from(info.description.clone())),
            (ATTR_DB_COPYRIGHT, AttrValue::from(info.copyright.clone())),
        ])
    }

    pub fn set_description(&mut self, description: &str) -> FamDBResult<()> {
        self.container
            .set_root_attr(ATTR_DB_DESCRIPTION, AttrValue::from(description))?;
        Ok(())
    }

    // Change history -----------------------------------------------------

    /// Opens a ledger entry for `operation` and flushes it to disk so an
    /// interrupted write is visible to the next reader.
    pub fn begin_change(&mut self, operation: &str) -> FamDBResult<ChangeTicket> {
        let mut timestamp = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S%.6f")
            .to_string();
        // Ledger keys must be unique; disambiguate same-instant entries.
        let mut n = 1;
        while self
            .container
            .exists(&format!("{}/{}", GROUP_HISTORY, timestamp))
        {
            timestamp = format!("{}.{}", timestamp, n);
            n += 1;
        }
        let path = format!("{}/{}", GROUP_HISTORY, timestamp);
        self.container
            .write_dataset(&path, operation, Dataset::Bools(vec![false]))?;
        self.container.flush()?;
        Ok(ChangeTicket {
            timestamp,
            operation: operation.to_string(),
        })
    }

    /// Marks the ledger entry behind `ticket` completed. The flag reaches
    /// disk on the next flush (typically [`finalize`](Self::finalize)).
    pub fn commit_change(&mut self, ticket: ChangeTicket) -> FamDBResult<()> {
        let path = format!("{}/{}", GROUP_HISTORY, ticket.timestamp);
        self.container
            .write_dataset(&path, &ticket.operation, Dataset::Bools(vec![true]))?;
        Ok(())
    }

    /// Records an already-completed ledger entry (context notes after an
    /// append).
    pub fn log_change(&mut self, operation: &str) -> FamDBResult<()> {
        let ticket = self.begin_change(operation)?;
        self.commit_change(ticket)
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        let mut entries = Vec::new();
        for timestamp in self.container.child_names(GROUP_HISTORY) {
            let group_path = format!("{}/{}", GROUP_HISTORY, timestamp);
            for operation in self.container.child_names(&group_path) {
                let completed = matches!(
                    self.container
                        .dataset(&format!("{}/{}", group_path, operation)),
                    Ok(Dataset::Bools(flags)) if flags.first() == Some(&true)
                );
                entries.push(HistoryEntry {
                    timestamp: timestamp.clone(),
                    operation,
                    completed,
                });
            }
        }
        entries
    }

    pub fn has_open_changes(&self) -> bool {
        self.history().iter().any(|entry| !entry.completed)
    }

    // Counts -------------------------------------------------------------

    pub fn counts(&self) -> (u64, u64) {
        let read = |name: &str| {
            self.container
                .root_attr(name)
                .and_then(|a| a.as_i64())
                .unwrap_or(0) as u64
        };
        (read(ATTR_COUNT_CONSENSUS), read(ATTR_COUNT_HMM))
    }

    /// Writes collected counts and flushes everything to disk.
    pub fn finalize(&mut self) -> FamDBResult<()> {
        self.container.set_root_attr(
            ATTR_COUNT_CONSENSUS,
            AttrValue::Int(self.added_consensus as i64),
        )?;
        self.container
            .set_root_attr(ATTR_COUNT_HMM, AttrValue::Int(self.added_hmm as i64))?;
        self.container.flush()?;
        Ok(())
    }

    // Taxonomy slice -----------------------------------------------------

    /// Registers the taxa owned by this partition. Only registered taxa
    /// can have families attached.
    pub fn write_taxonomy(&mut self, taxa: &[TaxonId]) -> FamDBResult<()> {
        for taxon in taxa {
            self.container
                .ensure_group(&format!("{}/{}", GROUP_BYTAXON, taxon))?;
        }
        Ok(())
    }

    pub fn has_taxon(&self, taxon: TaxonId) -> bool {
        self.container
            .exists(&format!("{}/{}", GROUP_BYTAXON, taxon))
    }

    /// Taxa registered in this partition that hold at least one family.
    pub fn taxa_with_families(&self) -> Vec<TaxonId> {
        self.container
            .child_names(GROUP_BYTAXON)
            .into_iter()
            .filter_map(|key| key.parse::<u32>().ok().map(TaxonId))
            .filter(|taxon| {
                !self
                    .container
                    .child_names(&format!("{}/{}", GROUP_BYTAXON, taxon))
                    .is_empty()
            })
            .collect()
    }

    /// Accessions of the families directly associated with `taxon`,
    /// optionally restricted to curated (`DF`) or uncurated records.
    pub fn families_for_taxon(
        &self,
        taxon: TaxonId,
        curated_only: bool,
        uncurated_only: bool,
    ) -> Vec<String> {
        self.container
            .child_names(&format!("{}/{}", GROUP_BYTAXON, taxon))
            .into_iter()
            .filter(|acc| {
                if curated_only {
                    famdb_core::is_curated(acc)
                } else if uncurated_only {
                    !famdb_core::is_curated(acc)
                } else {
                    true
                }
            })
            .collect()
    }

    // Families -----------------------------------------------------------

    /// Adds `family` to this file, maintaining the lookup indices.
    pub fn add_family(&mut self, family: &Family) -> FamDBResult<()> {
        let accession = family.accession.as_str();
        let fam_path = codec::family_path(accession);
        if self.container.exists(&fam_path)
            || self
                .container
                .exists(&format!("{}/{}", GROUP_BYNAME, accession))
        {
            return Err(FamDBError::InvalidInput(format!(
                "family is not unique, already seen {}",
                accession
            )));
        }

        codec::encode_family(&mut self.container, family)?;

        if family.consensus.is_some() {
            self.added_consensus += 1;
        }
        if family.model.is_some() {
            self.added_hmm += 1;
        }

        let target = format!("/{}", fam_path);
        if let Some(name) = family.name.as_deref() {
            self.container.link_soft(GROUP_BYNAME, name, &target)?;
        }
        for clade in &family.clades {
            let taxon_path = format!("{}/{}", GROUP_BYTAXON, clade);
            if self.container.exists(&taxon_path) {
                self.container.link_soft(&taxon_path, accession, &target)?;
            }
        }
        for stage in family
            .search_stage_numbers()
            .into_iter()
            .chain(family.buffer_stage_numbers())
        {
            let stage_path = format!("{}/{}", GROUP_BYSTAGE, stage);
            if !self
                .container
                .exists(&format!("{}/{}", stage_path, accession))
            {
                self.container.link_soft(&stage_path, accession, &target)?;
            }
        }

        debug!(
            "added family {} ({})",
            family.name.as_deref().unwrap_or("-"),
            accession
        );
        Ok(())
    }

    /// Loads the family stored under exactly `accession`, if any.
    pub fn family_by_accession(&self, accession: &str) -> FamDBResult<Option<Family>> {
        let path = codec::family_path(accession);
        match self.container.group(&path) {
            Some(group) => Ok(Some(codec::decode_family(group)?)),
            None => Ok(None),
        }
    }

    /// Loads the family a name link points at, if any.
    pub fn family_by_name(&self, name: &str) -> FamDBResult<Option<Family>> {
        match self.container.group(&format!("{}/{}", GROUP_BYNAME, name)) {
            Some(group) => Ok(Some(codec::decode_family(group)?)),
            None => Ok(None),
        }
    }

    /// All family accessions stored in this file, bin by bin.
    pub fn family_accessions(&self) -> Vec<String> {
        let mut out = Vec::new();
        for bin in self.container.child_names(GROUP_FAMILIES) {
            out.extend(
                self.container
                    .child_names(&format!("{}/{}", GROUP_FAMILIES, bin)),
            );
        }
        out
    }

    /// Accessions registered under a search/buffer stage.
    pub fn accessions_for_stage(&self, stage: u32) -> Vec<String> {
        self.container
            .child_names(&format!("{}/{}", GROUP_BYSTAGE, stage))
    }

    /// True when `accession` is registered under any of `stages`.
    pub fn in_stages(&self, accession: &str, stages: &[u32]) -> bool {
        stages.iter().any(|stage| {
            self.container
                .exists(&format!("{}/{}/{}", GROUP_BYSTAGE, stage, accession))
        })
    }

    // Root-only payloads -------------------------------------------------

    pub fn write_repeatpeps(&mut self, fasta: &str) -> FamDBResult<()> {
        let ticket = self.begin_change("RepeatPeps Written")?;
        self.container.write_dataset(
            "",
            DATA_REPEATPEPS,
            Dataset::Text(fasta.to_string()),
        )?;
        self.commit_change(ticket)
    }

    pub fn repeatpeps(&self) -> Option<String> {
        match self.container.dataset(DATA_REPEATPEPS) {
            Ok(Dataset::Text(text)) => Some(text.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    pub(crate) fn test_file_info() -> FileInfo {
        let mut partitions = BTreeMap::new();
        partitions.insert(
            0,
            PartitionInfo {
                root_taxon: TaxonId::ROOT,
                name: "Root Node".to_string(),
                detail_names: vec![],
                filename: "unittest.0.h5".to_string(),
            },
        );
        FileInfo {
            export_name: "uuidXX".to_string(),
            export_date: "2020-07-15".to_string(),
            partitions,
        }
    }

    pub(crate) fn test_db_info() -> DbInfo {
        DbInfo {
            name: "Test Dfam".to_string(),
            version: "V1".to_string(),
            date: "2020-07-15".to_string(),
            description: "A test database".to_string(),
            copyright: "<copyright header>".to_string(),
        }
    }

    #[test]
    fn test_create_open_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unittest.0.h5");

        let mut file =
            FamDBFile::create(&path, 0, TaxonId::ROOT, &test_file_info(), &test_db_info())
                .unwrap();
        file.finalize().unwrap();

        let file = FamDBFile::open(&path, Mode::ReadOnly).unwrap();
        assert_eq!(file.partition_number(), 0);
        assert!(file.is_root());
        assert_eq!(file.schema_version(), FORMAT_VERSION);
        assert_eq!(file.db_info().unwrap().name, "Test Dfam");
        assert_eq!(file.file_info().unwrap(), test_file_info());
        let history = file.history();
        assert!(!history.is_empty());
        assert!(history.iter().all(|entry| entry.completed));
    }

    #[test]
    fn test_open_ledger_entry_poisons_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unittest.0.h5");

        let mut file =
            FamDBFile::create(&path, 0, TaxonId::ROOT, &test_file_info(), &test_db_info())
                .unwrap();
        file.finalize().unwrap();

        // Start a change and "crash" before committing: the open entry was
        // flushed, so the next open must refuse the file.
        let mut file = FamDBFile::open(&path, Mode::ReadWrite).unwrap();
        let ticket = file.begin_change("Family Added").unwrap();
        std::mem::forget(ticket);
        drop(file);

        match FamDBFile::open(&path, Mode::ReadOnly) {
            Err(FamDBError::Corrupt(_)) => {}
            other => panic!("expected corrupt-file error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_repeatpeps_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unittest.0.h5");
        let mut file =
            FamDBFile::create(&path, 0, TaxonId::ROOT, &test_file_info(), &test_db_info())
                .unwrap();
        file.write_repeatpeps(">pep1\nMKV\n").unwrap();
        file.finalize().unwrap();

        let file = FamDBFile::open(&path, Mode::ReadOnly).unwrap();
        assert_eq!(file.repeatpeps().as_deref(), Some(">pep1\nMKV\n"));
    }

    #[test]
    fn test_family_storage_and_indices() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unittest.0.h5");
        let mut file =
            FamDBFile::create(&path, 0, TaxonId::ROOT, &test_file_info(), &test_db_info())
                .unwrap();
        file.write_taxonomy(&[TaxonId(1), TaxonId(2)]).unwrap();

        let fam = Family {
            accession: "TEST0001".to_string(),
            version: Some(1),
            name: Some("Test family TEST0001".to_string()),
            clades: vec![TaxonId(2)],
            consensus: Some("ACGT".to_string()),
            model: Some("<model1>".to_string()),
            search_stages: Some("30,40".to_string()),
            buffer_stages: Some("10[1-2],20".to_string()),
            ..Default::default()
        };
        let ticket = file.begin_change("Family Added").unwrap();
        file.add_family(&fam).unwrap();
        file.commit_change(ticket).unwrap();
        file.finalize().unwrap();

        // Duplicate accessions are rejected.
        assert!(file.add_family(&fam).is_err());

        let file = FamDBFile::open(&path, Mode::ReadOnly).unwrap();
        assert_eq!(file.counts(), (1, 1));
        let loaded = file.family_by_accession("TEST0001").unwrap().unwrap();
        assert_eq!(loaded, fam);
        let by_name = file
            .family_by_name("Test family TEST0001")
            .unwrap()
            .unwrap();
        assert_eq!(by_name.accession, "TEST0001");
        assert_eq!(
            file.families_for_taxon(TaxonId(2), false, false),
            vec!["TEST0001".to_string()]
        );
        assert!(file.families_for_taxon(TaxonId(1), false, false).is_empty());
        assert!(file.in_stages("TEST0001", &[40]));
        assert!(file.in_stages("TEST0001", &[10]));
        assert!(!file.in_stages("TEST0001", &[99]));
        assert_eq!(file.family_accessions(), vec!["TEST0001".to_string()]);
    }
}
