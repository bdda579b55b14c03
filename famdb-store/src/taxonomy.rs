//! The in-memory taxonomy index.
//!
//! Built once from the root file when a set is opened and immutable
//! afterwards. Nodes live in an arena keyed by taxon id; parent, child,
//! and the collapsed value-parent/value-children edges are stored as ids,
//! so there is no cyclic ownership. The names map is loaded eagerly (it
//! is small and hot); family records are not cached here at all.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use famdb_core::{sanitize_name, FamDBError, FamDBResult, NameLookup, TaxonId, NAME_COMMON, NAME_SCIENTIFIC, NAME_SYNONYM};

use crate::container::Dataset;
use crate::schema::{
    FamDBFile, DATA_CHILDREN, DATA_NAMES, DATA_PARENT, DATA_PARTITION, DATA_TAXANAMES,
    DATA_VAL_CHILDREN, DATA_VAL_PARENT, GROUP_NODES,
};

/// One NCBI taxonomy node.
#[derive(Debug, Clone, Default)]
pub struct TaxonNode {
    pub id: TaxonId,
    pub parent: Option<TaxonId>,
    pub children: Vec<TaxonId>,
    /// Nearest ancestor holding at least one family anywhere in the set.
    pub val_parent: Option<TaxonId>,
    /// Nearest data-bearing descendants, skipping empty nodes.
    pub val_children: Vec<TaxonId>,
    /// The partition whose file owns this node's families.
    pub partition: u32,
    pub names: Vec<(String, String)>,
}

/// Input record for writing a taxonomy tree into a root file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonBuild {
    pub id: TaxonId,
    pub parent: Option<TaxonId>,
    pub partition: u32,
    pub names: Vec<(String, String)>,
}

/// Outcome of resolving a search term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub exact: Vec<TaxonId>,
    pub partial: Vec<TaxonId>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.partial.is_empty()
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.partial.len()
    }
}

/// An ordered lineage tree: one node plus its (possibly collapsed)
/// descendants, children in ascending id order.
#[derive(Debug, Clone, PartialEq)]
pub struct Lineage {
    pub id: TaxonId,
    pub children: Vec<Lineage>,
}

impl Lineage {
    /// All ids in the tree, pre-order.
    pub fn ids(&self) -> Vec<TaxonId> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids(&self, out: &mut Vec<TaxonId>) {
        out.push(self.id);
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

pub struct TaxonomyIndex {
    nodes: HashMap<TaxonId, TaxonNode>,
}

impl TaxonomyIndex {
    /// Loads the full tree and names cache from an open root file.
    pub fn load(root: &FamDBFile) -> FamDBResult<TaxonomyIndex> {
        let container = root.container();
        let names: HashMap<String, Vec<(String, String)>> = match container.dataset(DATA_NAMES) {
            Ok(Dataset::Text(raw)) => serde_json::from_str(raw)?,
            _ => HashMap::new(),
        };

        let mut nodes = HashMap::new();
        for key in container.child_names(GROUP_NODES) {
            let Ok(id) = key.parse::<u32>() else {
                continue;
            };
            let id = TaxonId(id);
            let base = format!("{}/{}", GROUP_NODES, key);
            let ints = |name: &str| -> Vec<i64> {
                match container.dataset(&format!("{}/{}", base, name)) {
                    Ok(Dataset::Ints(v)) => v.clone(),
                    _ => Vec::new(),
                }
            };
            let mut children: Vec<TaxonId> =
                ints(DATA_CHILDREN).iter().map(|v| TaxonId(*v as u32)).collect();
            children.sort();
            let mut val_children: Vec<TaxonId> = ints(DATA_VAL_CHILDREN)
                .iter()
                .map(|v| TaxonId(*v as u32))
                .collect();
            val_children.sort();
            nodes.insert(
                id,
                TaxonNode {
                    id,
                    parent: ints(DATA_PARENT).first().map(|v| TaxonId(*v as u32)),
                    children,
                    val_parent: ints(DATA_VAL_PARENT).first().map(|v| TaxonId(*v as u32)),
                    val_children,
                    partition: ints(DATA_PARTITION).first().copied().unwrap_or(0) as u32,
                    names: names.get(&key).cloned().unwrap_or_default(),
                },
            );
        }
        info!("loaded {} taxonomy nodes", nodes.len());
        Ok(TaxonomyIndex { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: TaxonId) -> Option<&TaxonNode> {
        self.nodes.get(&id)
    }

    pub fn has_node(&self, id: TaxonId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn partition_of(&self, id: TaxonId) -> Option<u32> {
        self.nodes.get(&id).map(|n| n.partition)
    }

    pub fn names(&self, id: TaxonId) -> &[(String, String)] {
        self.nodes
            .get(&id)
            .map(|n| n.names.as_slice())
            .unwrap_or_default()
    }

    fn first_name_of_kind(&self, id: TaxonId, kind: &str) -> Option<&str> {
        self.names(id)
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, text)| text.as_str())
    }

    /// First scientific name, falling back to the first common name.
    pub fn display_name(&self, id: TaxonId) -> Option<&str> {
        self.first_name_of_kind(id, NAME_SCIENTIFIC)
            .or_else(|| self.first_name_of_kind(id, NAME_COMMON))
    }

    // Term resolution ----------------------------------------------------

    /// Resolves a user-supplied term: numeric terms match by id, string
    /// terms by normalized name comparison against every name variant.
    pub fn resolve(&self, term: &str) -> Resolution {
        let norm = normalize_term(term);
        if let Ok(id) = norm.parse::<u32>() {
            let id = TaxonId(id);
            return if self.has_node(id) {
                Resolution {
                    exact: vec![id],
                    partial: vec![],
                }
            } else {
                Resolution::default()
            };
        }

        let mut resolution = Resolution::default();
        let mut ids: Vec<&TaxonId> = self.nodes.keys().collect();
        ids.sort();
        for id in ids {
            let node = &self.nodes[id];
            let mut matched = false;
            let mut exact = false;
            for (_, text) in &node.names {
                let lower = text.to_lowercase();
                if norm == lower
                    || lower.starts_with(&format!("{} <", norm))
                    || norm == sanitize_name(&lower)
                {
                    matched = true;
                    exact = true;
                } else if lower.contains(&norm) {
                    matched = true;
                }
            }
            if exact {
                resolution.exact.push(*id);
            } else if matched {
                resolution.partial.push(*id);
            }
        }
        resolution
    }

    /// Resolves a term that must identify exactly one taxon: a single
    /// exact match wins, else a single overall match; anything else is an
    /// error.
    pub fn resolve_one(&self, term: &str) -> FamDBResult<TaxonId> {
        let resolution = self.resolve(term);
        if resolution.exact.len() == 1 {
            return Ok(resolution.exact[0]);
        }
        match resolution.len() {
            0 => Err(FamDBError::NoMatchingTaxon(term.to_string())),
            1 => Ok(*resolution
                .exact
                .first()
                .or_else(|| resolution.partial.first())
                .unwrap()),
            count => Err(FamDBError::AmbiguousTerm {
                term: term.to_string(),
                count,
                exact: resolution.exact.len(),
            }),
        }
    }

    /// Similarly-spelled taxon names for an unmatched term: edit distance
    /// at most ceil(len/4), at most `limit` entries, ties broken by
    /// distance, then name length, then lexicographically.
    pub fn suggest(&self, term: &str, limit: usize) -> Vec<(TaxonId, String)> {
        let norm = normalize_term(term);
        let threshold = norm.chars().count().div_ceil(4);
        let mut candidates: Vec<(usize, usize, String, TaxonId)> = Vec::new();
        let mut ids: Vec<&TaxonId> = self.nodes.keys().collect();
        ids.sort();
        for id in ids {
            for (_, text) in &self.nodes[id].names {
                let lower = text.to_lowercase();
                let distance = levenshtein(&norm, &lower);
                if distance <= threshold {
                    candidates.push((distance, lower.chars().count(), text.clone(), *id));
                }
            }
        }
        candidates.sort_by(|a, b| (a.0, a.1, &a.2).cmp(&(b.0, b.1, &b.2)));
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|(_, _, _, id)| seen.insert(*id))
            .take(limit)
            .map(|(_, _, text, id)| (id, text))
            .collect()
    }

    // Lineage ------------------------------------------------------------

    /// Ancestor chain of `id` over the raw parent edges, root first,
    /// ending with `id` itself.
    pub fn ancestry_of(&self, id: TaxonId) -> Vec<TaxonId> {
        let mut chain = vec![id];
        let mut current = id;
        let mut steps = 0;
        while let Some(parent) = self.nodes.get(&current).and_then(|n| n.parent) {
            chain.push(parent);
            current = parent;
            steps += 1;
            if steps > self.nodes.len() {
                break;
            }
        }
        chain.reverse();
        chain
    }

    /// Builds the ordered lineage tree for `id`.
    ///
    /// With `complete` the raw parent/children edges are used (every
    /// intermediate taxon appears); without it the collapsed value edges
    /// skip taxa that hold no families anywhere in the set.
    pub fn lineage(
        &self,
        id: TaxonId,
        ancestors: bool,
        descendants: bool,
        complete: bool,
    ) -> Option<Lineage> {
        if !self.has_node(id) {
            return None;
        }
        let mut tree = if descendants {
            self.subtree(id, complete)
        } else {
            Lineage {
                id,
                children: Vec::new(),
            }
        };
        if ancestors {
            let mut current = id;
            let mut steps = 0;
            loop {
                let node = self.nodes.get(&current)?;
                let parent = if complete { node.parent } else { node.val_parent };
                match parent {
                    Some(parent) => {
                        tree = Lineage {
                            id: parent,
                            children: vec![tree],
                        };
                        current = parent;
                    }
                    None => break,
                }
                steps += 1;
                if steps > self.nodes.len() {
                    break;
                }
            }
        }
        Some(tree)
    }

    fn subtree(&self, id: TaxonId, complete: bool) -> Lineage {
        let children = match self.nodes.get(&id) {
            Some(node) => {
                if complete {
                    &node.children
                } else {
                    &node.val_children
                }
            }
            None => return Lineage { id, children: Vec::new() },
        };
        Lineage {
            id,
            children: children
                .iter()
                .map(|child| self.subtree(*child, complete))
                .collect(),
        }
    }

    /// Lower-cased (and sanitized) scientific names and synonyms, mapped
    /// to their taxa. Used to resolve species names in EMBL imports.
    pub fn sanitized_name_lookup(&self) -> HashMap<String, TaxonId> {
        let mut out = HashMap::new();
        let mut ids: Vec<&TaxonId> = self.nodes.keys().collect();
        ids.sort();
        // Insert in descending id order so lower ids win collisions.
        for id in ids.iter().rev() {
            for (kind, text) in &self.nodes[*id].names {
                if kind == NAME_SCIENTIFIC || kind == NAME_SYNONYM {
                    out.insert(text.to_lowercase(), **id);
                    out.insert(sanitize_name(text).to_lowercase(), **id);
                }
            }
        }
        out
    }
}

impl NameLookup for TaxonomyIndex {
    fn scientific_name(&self, tax_id: TaxonId) -> Option<String> {
        self.first_name_of_kind(tax_id, NAME_SCIENTIFIC)
            .map(|s| s.to_string())
    }

    fn ancestry(&self, tax_id: TaxonId) -> Vec<TaxonId> {
        self.ancestry_of(tax_id)
    }

    fn lineage_path(&self, tax_id: TaxonId) -> Vec<String> {
        self.ancestry_of(tax_id)
            .into_iter()
            .filter(|id| !id.is_root() && *id != tax_id)
            .filter_map(|id| self.scientific_name(id))
            .collect()
    }
}

/// Normalizes a search term: surrounding quotes stripped, lower-cased,
/// internal whitespace collapsed to single spaces.
pub fn normalize_term(term: &str) -> String {
    let trimmed = term.trim();
    let trimmed = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| {
            trimmed
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
        })
        .unwrap_or(trimmed);
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Plain dynamic-programming edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}

// Writing ----------------------------------------------------------------

/// Writes the full taxonomy tree (nodes, edges, partition assignments,
/// names cache) into a root file.
pub fn write_taxonomy_tree(file: &mut FamDBFile, taxa: &[TaxonBuild]) -> FamDBResult<()> {
    let ticket = file.begin_change("Taxonomy Nodes Written")?;

    let mut children: BTreeMap<TaxonId, Vec<TaxonId>> = BTreeMap::new();
    for taxon in taxa {
        children.entry(taxon.id).or_default();
        if let Some(parent) = taxon.parent {
            children.entry(parent).or_default().push(taxon.id);
        }
    }
    for ids in children.values_mut() {
        ids.sort();
    }

    let mut names_cache: BTreeMap<String, &Vec<(String, String)>> = BTreeMap::new();
    for taxon in taxa {
        let base = format!("{}/{}", GROUP_NODES, taxon.id);
        let container = file.container_mut();
        if let Some(parent) = taxon.parent {
            container.write_dataset(
                &base,
                DATA_PARENT,
                Dataset::Ints(vec![parent.value() as i64]),
            )?;
        }
        container.write_dataset(
            &base,
            DATA_CHILDREN,
            Dataset::Ints(
                children[&taxon.id]
                    .iter()
                    .map(|id| id.value() as i64)
                    .collect(),
            ),
        )?;
        container.write_dataset(
            &base,
            DATA_PARTITION,
            Dataset::Ints(vec![taxon.partition as i64]),
        )?;
        container.write_dataset(
            &base,
            DATA_TAXANAMES,
            Dataset::Text(serde_json::to_string(&taxon.names)?),
        )?;
        names_cache.insert(taxon.id.to_string(), &taxon.names);
    }
    file.container_mut().write_dataset(
        "Taxonomy",
        "Names",
        Dataset::Text(serde_json::to_string(&names_cache)?),
    )?;

    file.commit_change(ticket)?;
    Ok(())
}

/// Recomputes and writes the collapsed value edges from the raw tree and
/// the set of taxa that hold at least one family in any partition.
pub fn write_value_edges(file: &mut FamDBFile, has_families: &HashSet<TaxonId>) -> FamDBResult<()> {
    let ticket = file.begin_change("Pruned Tree Updated")?;

    // Raw edges, read back from the file.
    let mut parents: HashMap<TaxonId, Option<TaxonId>> = HashMap::new();
    for key in file.container().child_names(GROUP_NODES) {
        let Ok(id) = key.parse::<u32>() else { continue };
        let id = TaxonId(id);
        let parent = match file
            .container()
            .dataset(&format!("{}/{}/{}", GROUP_NODES, key, DATA_PARENT))
        {
            Ok(Dataset::Ints(v)) => v.first().map(|p| TaxonId(*p as u32)),
            _ => None,
        };
        parents.insert(id, parent);
    }

    let mut val_parents: HashMap<TaxonId, TaxonId> = HashMap::new();
    let mut val_children: HashMap<TaxonId, Vec<TaxonId>> = HashMap::new();

    for id in parents.keys() {
        // Nearest data-bearing strict ancestor.
        let mut current = parents.get(id).copied().flatten();
        while let Some(ancestor) = current {
            if has_families.contains(&ancestor) {
                val_parents.insert(*id, ancestor);
                break;
            }
            current = parents.get(&ancestor).copied().flatten();
        }
    }

    let mut data_bearing: Vec<&TaxonId> = parents
        .keys()
        .filter(|id| has_families.contains(*id))
        .collect();
    data_bearing.sort();
    for id in data_bearing {
        // Attach to every ancestor up to and including the first
        // data-bearing one, so empty intermediates can still enumerate
        // their data-bearing descendants.
        let mut current = parents.get(id).copied().flatten();
        while let Some(ancestor) = current {
            val_children.entry(ancestor).or_default().push(*id);
            if has_families.contains(&ancestor) {
                break;
            }
            current = parents.get(&ancestor).copied().flatten();
        }
    }

    for id in parents.keys() {
        let base = format!("{}/{}", GROUP_NODES, id);
        let mut children: Vec<i64> = val_children
            .get(id)
            .map(|ids| ids.iter().map(|c| c.value() as i64).collect())
            .unwrap_or_default();
        children.sort_unstable();
        file.container_mut()
            .write_dataset(&base, DATA_VAL_CHILDREN, Dataset::Ints(children))?;
        match val_parents.get(id) {
            Some(parent) => file.container_mut().write_dataset(
                &base,
                DATA_VAL_PARENT,
                Dataset::Ints(vec![parent.value() as i64]),
            )?,
            None => file
                .container_mut()
                .write_dataset(&base, DATA_VAL_PARENT, Dataset::Ints(vec![]))?,
        }
    }

    file.commit_change(ticket)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Mode;
    use crate::schema::{DbInfo, FileInfo, PartitionInfo};
    use tempfile::tempdir;

    /// The seven-node test taxonomy:
    ///
    /// ```text
    ///         1
    ///       /   \
    ///  (0) 2     3
    /// --------------
    /// (1)/ |  (2)\
    ///   4  |     5
    ///  /   |      \
    /// 6    |       7
    /// ```
    pub(crate) fn test_taxa() -> Vec<TaxonBuild> {
        let names = |sci: &str, common: &str| {
            vec![
                (NAME_SCIENTIFIC.to_string(), sci.to_string()),
                (NAME_COMMON.to_string(), common.to_string()),
            ]
        };
        vec![
            TaxonBuild { id: TaxonId(1), parent: None, partition: 0, names: names("root", "Root Dummy 1") },
            TaxonBuild { id: TaxonId(2), parent: Some(TaxonId(1)), partition: 0, names: names("Order", "Root Dummy 2") },
            TaxonBuild { id: TaxonId(3), parent: Some(TaxonId(1)), partition: 0, names: names("Other Order", "Root Dummy 3") },
            TaxonBuild { id: TaxonId(4), parent: Some(TaxonId(2)), partition: 1, names: names("Genus", "Leaf Dummy 4") },
            TaxonBuild { id: TaxonId(5), parent: Some(TaxonId(2)), partition: 2, names: names("Other Genus", "Leaf Dummy 5") },
            TaxonBuild { id: TaxonId(6), parent: Some(TaxonId(4)), partition: 1, names: names("Species", "Leaf Dummy 6") },
            TaxonBuild { id: TaxonId(7), parent: Some(TaxonId(5)), partition: 2, names: names("Other Species", "Leaf Dummy 7") },
        ]
    }

    fn build_index(has_families: &[u32]) -> TaxonomyIndex {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unittest.0.h5");
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
        let file_info = FileInfo {
            export_name: "uuidXX".to_string(),
            export_date: "2020-07-15".to_string(),
            partitions,
        };
        let db_info = DbInfo {
            name: "Test".to_string(),
            version: "V1".to_string(),
            date: "2020-07-15".to_string(),
            description: String::new(),
            copyright: String::new(),
        };
        let mut file = FamDBFile::create(&path, 0, TaxonId::ROOT, &file_info, &db_info).unwrap();
        write_taxonomy_tree(&mut file, &test_taxa()).unwrap();
        let has: HashSet<TaxonId> = has_families.iter().map(|id| TaxonId(*id)).collect();
        write_value_edges(&mut file, &has).unwrap();
        file.finalize().unwrap();

        let file = FamDBFile::open(&path, Mode::ReadOnly).unwrap();
        TaxonomyIndex::load(&file).unwrap()
    }

    #[test]
    fn test_parent_chain_terminates_at_root() {
        let index = build_index(&[1, 3, 4]);
        for id in [1u32, 2, 3, 4, 5, 6, 7] {
            let chain = index.ancestry_of(TaxonId(id));
            assert_eq!(chain.first(), Some(&TaxonId(1)), "chain for {}", id);
            assert_eq!(chain.last(), Some(&TaxonId(id)));
        }
    }

    #[test]
    fn test_resolution() {
        let index = build_index(&[]);
        // Numeric terms resolve by id.
        assert_eq!(index.resolve("4").exact, vec![TaxonId(4)]);
        assert!(index.resolve("99").is_empty());
        // Exact name match, case-insensitive, quotes stripped.
        assert_eq!(index.resolve("\"other genus\"").exact, vec![TaxonId(5)]);
        // Sanitized spelling counts as exact.
        assert_eq!(index.resolve("other_genus").exact, vec![TaxonId(5)]);
        // Substring matches are partial.
        let res = index.resolve("order");
        assert_eq!(res.exact, vec![TaxonId(2)]);
        assert_eq!(res.partial, vec![TaxonId(3)]);
        // "genus" matches Genus exactly and Other Genus partially.
        let res = index.resolve("genus");
        assert_eq!(res.exact, vec![TaxonId(4)]);
        assert_eq!(res.partial, vec![TaxonId(5)]);
    }

    #[test]
    fn test_resolve_one_policies() {
        let index = build_index(&[]);
        assert_eq!(index.resolve_one("genus").unwrap(), TaxonId(4));
        assert_eq!(index.resolve_one("other species").unwrap(), TaxonId(7));
        match index.resolve_one("dummy") {
            Err(FamDBError::AmbiguousTerm { count, exact, .. }) => {
                assert_eq!(count, 7);
                assert_eq!(exact, 0);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
        assert!(matches!(
            index.resolve_one("nothing matches this"),
            Err(FamDBError::NoMatchingTaxon(_))
        ));
    }

    #[test]
    fn test_value_edges_skip_empty_nodes() {
        // Families at 1, 4 and 7: node 2 and 5 are empty pass-throughs.
        let index = build_index(&[1, 4, 7]);
        let node = index.node(TaxonId(4)).unwrap();
        assert_eq!(node.val_parent, Some(TaxonId(1)));
        assert!(node.val_children.is_empty());

        // 7's nearest data-bearing ancestor is 1 (2 and 5 are empty).
        assert_eq!(index.node(TaxonId(7)).unwrap().val_parent, Some(TaxonId(1)));

        // The root sees the nearest data-bearing descendants only.
        assert_eq!(
            index.node(TaxonId(1)).unwrap().val_children,
            vec![TaxonId(4), TaxonId(7)]
        );
        // Empty intermediates still enumerate their data-bearing
        // descendants so descending walks can pass through them.
        assert_eq!(
            index.node(TaxonId(2)).unwrap().val_children,
            vec![TaxonId(4), TaxonId(7)]
        );
        assert_eq!(
            index.node(TaxonId(5)).unwrap().val_children,
            vec![TaxonId(7)]
        );
    }

    #[test]
    fn test_lineage_trees() {
        let index = build_index(&[1, 4, 7]);

        // Complete descendants of 2.
        let tree = index.lineage(TaxonId(2), false, true, true).unwrap();
        assert_eq!(tree.ids(), vec![TaxonId(2), TaxonId(4), TaxonId(6), TaxonId(5), TaxonId(7)]);

        // Collapsed descendants of 2 skip the empty node 5.
        let tree = index.lineage(TaxonId(2), false, true, false).unwrap();
        assert_eq!(tree.ids(), vec![TaxonId(2), TaxonId(4), TaxonId(7)]);

        // Ancestors (collapsed) of 7 climb straight to the root.
        let tree = index.lineage(TaxonId(7), true, false, false).unwrap();
        assert_eq!(tree.id, TaxonId(1));
        assert_eq!(tree.children[0].id, TaxonId(7));

        // Ancestors (complete) of 7 pass through every node.
        let tree = index.lineage(TaxonId(7), true, false, true).unwrap();
        assert_eq!(tree.id, TaxonId(1));
        assert_eq!(tree.children[0].id, TaxonId(2));
        assert_eq!(tree.children[0].children[0].id, TaxonId(5));
    }

    #[test]
    fn test_suggestions() {
        let index = build_index(&[]);
        // "genu" is distance 1 from "genus" (threshold ceil(4/4)=1).
        let suggestions = index.suggest("genu", 10);
        assert_eq!(suggestions.first().map(|(id, _)| *id), Some(TaxonId(4)));
        // Nothing within distance of a long nonsense term's threshold.
        assert!(index.suggest("zzzzzzzz", 10).is_empty());
        // Cap at the requested limit.
        assert!(index.suggest("dummy 1", 2).len() <= 2);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_name_lookup_trait() {
        let index = build_index(&[]);
        assert_eq!(index.scientific_name(TaxonId(5)).as_deref(), Some("Other Genus"));
        assert_eq!(index.sanitized_name(TaxonId(5)).as_deref(), Some("Other_Genus"));
        assert_eq!(
            index.ancestry(TaxonId(7)),
            vec![TaxonId(1), TaxonId(2), TaxonId(5), TaxonId(7)]
        );
        // Lineage path excludes root and the taxon itself.
        assert_eq!(
            index.lineage_path(TaxonId(7)),
            vec!["Order".to_string(), "Other Genus".to_string()]
        );
        let lookup = index.sanitized_name_lookup();
        assert_eq!(lookup.get("other_genus"), Some(&TaxonId(5)));
        assert_eq!(lookup.get("other genus"), Some(&TaxonId(5)));
    }
}
