//! Shared fixture: a three-partition export over a seven-node taxonomy.
//!
//! ```text
//!         1
//!       /   \
//!  (0) 2     3
//! --------------
//! (1)/ |  (2)\
//!   4  |     5
//!  /   |      \
//! 6    |       7
//! ```
//!
//! Partition 0 (root) owns taxa 1-3, partition 1 owns 4 and 6, partition
//! 2 owns 5 and 7. Node 5 starts out with no families.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use famdb_core::{Family, TaxonId, NAME_COMMON, NAME_SCIENTIFIC};
use famdb_store::{
    write_taxonomy_tree, write_value_edges, DbInfo, FamDBFile, FileInfo, PartitionInfo, TaxonBuild,
};

pub const EXPORT: &str = "unittest";

pub fn file_info() -> FileInfo {
    let mut partitions = BTreeMap::new();
    partitions.insert(
        0,
        PartitionInfo {
            root_taxon: TaxonId(1),
            name: "Root Node".to_string(),
            detail_names: vec![],
            filename: format!("{}.0.h5", EXPORT),
        },
    );
    partitions.insert(
        1,
        PartitionInfo {
            root_taxon: TaxonId(4),
            name: "Search Node".to_string(),
            detail_names: vec![],
            filename: format!("{}.1.h5", EXPORT),
        },
    );
    partitions.insert(
        2,
        PartitionInfo {
            root_taxon: TaxonId(5),
            name: "Other Node".to_string(),
            detail_names: vec!["Other Node".to_string()],
            filename: format!("{}.2.h5", EXPORT),
        },
    );
    FileInfo {
        export_name: "uuidXX".to_string(),
        export_date: "2020-07-15".to_string(),
        partitions,
    }
}

pub fn db_info() -> DbInfo {
    DbInfo {
        name: "Test Dfam".to_string(),
        version: "V1".to_string(),
        date: "2020-07-15".to_string(),
        description: "A test database".to_string(),
        copyright: "<copyright header>".to_string(),
    }
}

pub fn taxa() -> Vec<TaxonBuild> {
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

pub fn make_family(acc: &str, clades: &[u32], consensus: Option<&str>, model: Option<&str>) -> Family {
    Family {
        accession: acc.to_string(),
        name: Some(format!("Test family {}", acc)),
        version: Some(1),
        clades: clades.iter().map(|id| TaxonId(*id)).collect(),
        consensus: consensus.map(|s| s.to_string()),
        model: model.map(|s| s.to_string()),
        ..Default::default()
    }
}

pub fn families() -> Vec<Family> {
    let mut families = vec![
        make_family("DF0000001", &[1], Some("ACGT"), Some("<model1>")),
        make_family("DF0000002", &[2, 3], None, Some("<model2>")),
        make_family("DF0000003", &[3], Some("GGTC"), Some("<model3>")),
        make_family("DF0000004", &[4], Some("CCCCTTTT"), None),
        make_family("DR0000001", &[7], Some("GCATATCG"), None),
        make_family("DR0000002", &[6], Some("CGACTAT"), None),
    ];
    families[1].name = None;
    families[2].search_stages = Some("30,40".to_string());
    families[3].search_stages = Some("35".to_string());
    families[3].buffer_stages = Some("10[1-2],10[5-8],20".to_string());
    families[3].repeat_type = Some("SINE".to_string());
    families
}

/// Writes the full three-file export into `dir`.
pub fn init_db_files(dir: &Path) {
    let info = file_info();
    let db = db_info();
    let families = families();

    let mut root = FamDBFile::create(
        &dir.join(format!("{}.0.h5", EXPORT)),
        0,
        TaxonId(1),
        &info,
        &db,
    )
    .unwrap();
    write_taxonomy_tree(&mut root, &taxa()).unwrap();
    root.write_taxonomy(&[TaxonId(1), TaxonId(2), TaxonId(3)])
        .unwrap();
    for family in &families[0..3] {
        let ticket = root.begin_change("Family Added").unwrap();
        root.add_family(family).unwrap();
        root.commit_change(ticket).unwrap();
    }
    let has_families: HashSet<TaxonId> =
        [1u32, 2, 3, 4, 6, 7].iter().map(|id| TaxonId(*id)).collect();
    write_value_edges(&mut root, &has_families).unwrap();
    root.finalize().unwrap();

    let mut leaf1 = FamDBFile::create(
        &dir.join(format!("{}.1.h5", EXPORT)),
        1,
        TaxonId(4),
        &info,
        &db,
    )
    .unwrap();
    leaf1.write_taxonomy(&[TaxonId(4), TaxonId(6)]).unwrap();
    for family in [&families[3], &families[5]] {
        let ticket = leaf1.begin_change("Family Added").unwrap();
        leaf1.add_family(family).unwrap();
        leaf1.commit_change(ticket).unwrap();
    }
    leaf1.finalize().unwrap();

    let mut leaf2 = FamDBFile::create(
        &dir.join(format!("{}.2.h5", EXPORT)),
        2,
        TaxonId(5),
        &info,
        &db,
    )
    .unwrap();
    leaf2.write_taxonomy(&[TaxonId(5), TaxonId(7)]).unwrap();
    let ticket = leaf2.begin_change("Family Added").unwrap();
    leaf2.add_family(&families[4]).unwrap();
    leaf2.commit_change(ticket).unwrap();
    leaf2.finalize().unwrap();
}
