//! Thin adapter over the hierarchical container files FamDB stores data in.
//!
//! A container is a tree of groups carrying typed attributes, with datasets
//! and soft links at the leaves, addressed by `/`-separated paths. On disk
//! a container is a single file: magic bytes followed by a gzip-compressed
//! MessagePack document. The whole tree is held in memory; reads never
//! lock the file, and writes are staged and committed atomically via a
//! temporary file and rename.
//!
//! Nothing above this module knows about the encoding, and nothing in this
//! module knows what the groups mean.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magic bytes identifying a FamDB container file.
pub const FAMDB_MAGIC: &[u8] = b"FamDB\x01";

/// Maximum soft-link indirections followed before giving up.
const MAX_LINK_DEPTH: usize = 8;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("wrong type at {0}")]
    WrongType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("container is read-only: {0}")]
    Locked(String),

    #[error("not a FamDB container: {0}")]
    BadMagic(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

pub type ContainerResult<T> = Result<T, ContainerError>;

impl From<ContainerError> for famdb_core::FamDBError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::Io(e) => famdb_core::FamDBError::Io(e),
            ContainerError::BadMagic(msg) | ContainerError::Encoding(msg) => {
                famdb_core::FamDBError::Corrupt(msg)
            }
            other => famdb_core::FamDBError::Storage(other.to_string()),
        }
    }
}

/// A scalar (or small vector) attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    IntList(Vec<i64>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            AttrValue::IntList(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

/// An array payload stored at a leaf of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dataset {
    Bytes(Vec<u8>),
    Text(String),
    Ints(Vec<i64>),
    Bools(Vec<bool>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Group(Group),
    Dataset(Dataset),
    SoftLink(String),
}

/// An interior node: attributes plus named children. `BTreeMap` keeps
/// iteration order deterministic, which the query layer relies on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    pub attrs: BTreeMap<String, AttrValue>,
    pub children: BTreeMap<String, Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ReadOnly,
    ReadWrite,
}

/// An open container file.
pub struct Container {
    path: PathBuf,
    root: Group,
    mode: Mode,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl Container {
    /// Creates a new, empty container at `path` (read-write). The file is
    /// not written until the first [`flush`](Container::flush).
    pub fn create(path: &Path) -> Container {
        Container {
            path: path.to_path_buf(),
            root: Group::default(),
            mode: Mode::ReadWrite,
        }
    }

    /// Opens an existing container file. Opening for read never locks the
    /// file; writers rely on the caller for exclusivity.
    pub fn open(path: &Path, mode: Mode) -> ContainerResult<Container> {
        let data = fs::read(path)?;
        if !data.starts_with(FAMDB_MAGIC) {
            return Err(ContainerError::BadMagic(path.display().to_string()));
        }
        let mut decoder = GzDecoder::new(&data[FAMDB_MAGIC.len()..]);
        let mut payload = Vec::new();
        decoder.read_to_end(&mut payload)?;
        let root: Group = rmp_serde::from_slice(&payload)
            .map_err(|e| ContainerError::Encoding(format!("{}: {}", path.display(), e)))?;
        Ok(Container {
            path: path.to_path_buf(),
            root,
            mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Writes the tree back to disk atomically.
    pub fn flush(&self) -> ContainerResult<()> {
        if self.mode != Mode::ReadWrite {
            return Err(ContainerError::Locked(self.path.display().to_string()));
        }
        let payload = rmp_serde::to_vec(&self.root)
            .map_err(|e| ContainerError::Encoding(e.to_string()))?;
        let mut encoded = Vec::with_capacity(FAMDB_MAGIC.len() + payload.len() / 2);
        encoded.extend_from_slice(FAMDB_MAGIC);
        let mut encoder = GzEncoder::new(&mut encoded, Compression::default());
        encoder.write_all(&payload)?;
        encoder.finish()?;

        let tmp = self.path.with_extension("h5.tmp");
        fs::write(&tmp, &encoded)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Resolves `path` to a node, following soft links.
    fn resolve(&self, path: &str) -> ContainerResult<&Node> {
        self.resolve_depth(path, 0)
    }

    fn resolve_depth(&self, path: &str, depth: usize) -> ContainerResult<&Node> {
        if depth > MAX_LINK_DEPTH {
            return Err(ContainerError::NotFound(format!("{} (link cycle)", path)));
        }
        let mut segs = segments(path);
        let first = segs
            .next()
            .ok_or_else(|| ContainerError::NotFound("/".to_string()))?;
        let mut node = self
            .root
            .children
            .get(first)
            .ok_or_else(|| ContainerError::NotFound(path.to_string()))?;
        while let Some(seg) = segs.next() {
            match node {
                Node::Group(g) => {
                    node = g
                        .children
                        .get(seg)
                        .ok_or_else(|| ContainerError::NotFound(path.to_string()))?;
                }
                Node::SoftLink(target) => {
                    // Re-anchor the remaining path segments under the link
                    // target.
                    let mut full = target.clone();
                    full.push('/');
                    full.push_str(seg);
                    for rest in segs.by_ref() {
                        full.push('/');
                        full.push_str(rest);
                    }
                    return self.resolve_depth(&full, depth + 1);
                }
                Node::Dataset(_) => return Err(ContainerError::WrongType(path.to_string())),
            }
        }
        if let Node::SoftLink(target) = node {
            return self.resolve_depth(target, depth + 1);
        }
        Ok(node)
    }

    /// Returns the group at `path`, or `None` when absent.
    pub fn group(&self, path: &str) -> Option<&Group> {
        match self.resolve(path) {
            Ok(Node::Group(g)) => Some(g),
            _ => None,
        }
    }

    /// True when `path` resolves to any node.
    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    /// Child names of the group at `path`, in deterministic order.
    /// Missing groups yield an empty list.
    pub fn child_names(&self, path: &str) -> Vec<String> {
        match self.group(path) {
            Some(g) => g.children.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Creates the group at `path` (and any missing ancestors), returning
    /// a mutable handle.
    pub fn ensure_group(&mut self, path: &str) -> ContainerResult<&mut Group> {
        if self.mode != Mode::ReadWrite {
            return Err(ContainerError::Locked(self.path.display().to_string()));
        }
        let mut current = &mut self.root;
        for seg in segments(path) {
            let entry = current
                .children
                .entry(seg.to_string())
                .or_insert_with(|| Node::Group(Group::default()));
            current = match entry {
                Node::Group(g) => g,
                _ => return Err(ContainerError::WrongType(path.to_string())),
            };
        }
        Ok(current)
    }

    /// Reads an attribute from the group at `path`.
    pub fn attr(&self, path: &str, name: &str) -> Option<&AttrValue> {
        self.group(path).and_then(|g| g.attrs.get(name))
    }

    /// Reads an attribute from the file root.
    pub fn root_attr(&self, name: &str) -> Option<&AttrValue> {
        self.root.attrs.get(name)
    }

    pub fn set_root_attr(&mut self, name: &str, value: AttrValue) -> ContainerResult<()> {
        if self.mode != Mode::ReadWrite {
            return Err(ContainerError::Locked(self.path.display().to_string()));
        }
        self.root.attrs.insert(name.to_string(), value);
        Ok(())
    }

    pub fn set_attr(&mut self, path: &str, name: &str, value: AttrValue) -> ContainerResult<()> {
        let group = self.ensure_group(path)?;
        group.attrs.insert(name.to_string(), value);
        Ok(())
    }

    /// Reads the dataset at `path`.
    pub fn dataset(&self, path: &str) -> ContainerResult<&Dataset> {
        match self.resolve(path)? {
            Node::Dataset(ds) => Ok(ds),
            _ => Err(ContainerError::WrongType(path.to_string())),
        }
    }

    /// Writes (or replaces) the dataset named `name` under the group at
    /// `path`.
    pub fn write_dataset(&mut self, path: &str, name: &str, ds: Dataset) -> ContainerResult<()> {
        let group = self.ensure_group(path)?;
        group.children.insert(name.to_string(), Node::Dataset(ds));
        Ok(())
    }

    /// Creates a soft link `name` under the group at `path`, pointing at
    /// the absolute path `target`.
    pub fn link_soft(&mut self, path: &str, name: &str, target: &str) -> ContainerResult<()> {
        let group = self.ensure_group(path)?;
        group
            .children
            .insert(name.to_string(), Node::SoftLink(target.to_string()));
        Ok(())
    }

    /// Removes the node at `path`. Missing nodes are ignored.
    pub fn remove(&mut self, path: &str) -> ContainerResult<()> {
        if self.mode != Mode::ReadWrite {
            return Err(ContainerError::Locked(self.path.display().to_string()));
        }
        let segs: Vec<&str> = segments(path).collect();
        let Some((last, parents)) = segs.split_last() else {
            return Ok(());
        };
        let mut current = &mut self.root;
        for seg in parents {
            match current.children.get_mut(*seg) {
                Some(Node::Group(g)) => current = g,
                _ => return Ok(()),
            }
        }
        current.children.remove(*last);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.0.h5");

        let mut c = Container::create(&path);
        c.set_root_attr("export_name", "unittest".into()).unwrap();
        c.set_attr("Families/DF", "note", AttrValue::Int(7)).unwrap();
        c.write_dataset(
            "Families/DF/DF000000001",
            "consensus",
            Dataset::Text("ACGT".to_string()),
        )
        .unwrap();
        c.link_soft("Lookup/ByName", "MIR", "/Families/DF/DF000000001")
            .unwrap();
        c.flush().unwrap();

        let c = Container::open(&path, Mode::ReadOnly).unwrap();
        assert_eq!(c.root_attr("export_name").and_then(|a| a.as_str()), Some("unittest"));
        assert_eq!(c.attr("Families/DF", "note").and_then(|a| a.as_i64()), Some(7));
        assert_eq!(
            c.dataset("Families/DF/DF000000001/consensus").unwrap(),
            &Dataset::Text("ACGT".to_string())
        );
        // The soft link resolves into the family group.
        assert_eq!(
            c.dataset("Lookup/ByName/MIR/consensus").unwrap(),
            &Dataset::Text("ACGT".to_string())
        );
        assert!(c.exists("Lookup/ByName/MIR"));
        assert_eq!(c.child_names("Families"), vec!["DF".to_string()]);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.0.h5");
        Container::create(&path).flush().unwrap();

        let mut c = Container::open(&path, Mode::ReadOnly).unwrap();
        assert!(matches!(
            c.ensure_group("Families"),
            Err(ContainerError::Locked(_))
        ));
        assert!(matches!(c.flush(), Err(ContainerError::Locked(_))));
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.0.h5");
        fs::write(&path, b"not a container").unwrap();
        assert!(matches!(
            Container::open(&path, Mode::ReadOnly),
            Err(ContainerError::BadMagic(_))
        ));
    }

    #[test]
    fn test_missing_paths() {
        let c = Container::create(Path::new("/tmp/unused.h5"));
        assert!(c.group("Nope").is_none());
        assert!(!c.exists("Nope/Deeper"));
        assert!(c.child_names("Nope").is_empty());
        assert!(matches!(
            c.dataset("Nope"),
            Err(ContainerError::NotFound(_))
        ));
    }
}
