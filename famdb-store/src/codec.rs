//! Translation between [`Family`] records and their container groups.
//!
//! Each family lives at `/Families/<AA>/<ACCESSION>`: scalar metadata as
//! group attributes, the consensus and HMM payloads as datasets.
//! Attributes this build does not recognize are carried through decode and
//! encode untouched, so newer files survive a round-trip through an older
//! tool.

use famdb_core::{family_bin, FamDBError, FamDBResult, Family, TaxonId};

use crate::container::{AttrValue, Container, Dataset, Group};
use crate::schema::GROUP_FAMILIES;

// Attribute keys. `ATTR_KEYS` must list every known key so decode can
// separate unknown attributes into `Family::extra`.
const ATTR_ACCESSION: &str = "accession";
const ATTR_VERSION: &str = "version";
const ATTR_NAME: &str = "name";
const ATTR_TITLE: &str = "title";
const ATTR_DESCRIPTION: &str = "description";
const ATTR_CLASSIFICATION: &str = "classification";
const ATTR_CLADES: &str = "clades";
const ATTR_ALIASES: &str = "aliases";
const ATTR_CITATIONS: &str = "citations";
const ATTR_CODING_SEQUENCES: &str = "coding_sequences";
const ATTR_GENERAL_CUTOFF: &str = "general_cutoff";
const ATTR_TAXA_THRESHOLDS: &str = "taxa_thresholds";
const ATTR_BUILD_METHOD: &str = "build_method";
const ATTR_SEARCH_METHOD: &str = "search_method";
const ATTR_DATE_CREATED: &str = "date_created";
const ATTR_DATE_MODIFIED: &str = "date_modified";
const ATTR_LENGTH: &str = "length";
const ATTR_REPEAT_TYPE: &str = "repeat_type";
const ATTR_REPEAT_SUBTYPE: &str = "repeat_subtype";
const ATTR_SEARCH_STAGES: &str = "search_stages";
const ATTR_BUFFER_STAGES: &str = "buffer_stages";
const ATTR_TARGET_SITE_CONS: &str = "target_site_cons";
const ATTR_REFINEABLE: &str = "refineable";

const ATTR_KEYS: &[&str] = &[
    ATTR_ACCESSION,
    ATTR_VERSION,
    ATTR_NAME,
    ATTR_TITLE,
    ATTR_DESCRIPTION,
    ATTR_CLASSIFICATION,
    ATTR_CLADES,
    ATTR_ALIASES,
    ATTR_CITATIONS,
    ATTR_CODING_SEQUENCES,
    ATTR_GENERAL_CUTOFF,
    ATTR_TAXA_THRESHOLDS,
    ATTR_BUILD_METHOD,
    ATTR_SEARCH_METHOD,
    ATTR_DATE_CREATED,
    ATTR_DATE_MODIFIED,
    ATTR_LENGTH,
    ATTR_REPEAT_TYPE,
    ATTR_REPEAT_SUBTYPE,
    ATTR_SEARCH_STAGES,
    ATTR_BUFFER_STAGES,
    ATTR_TARGET_SITE_CONS,
    ATTR_REFINEABLE,
];

const DATASET_CONSENSUS: &str = "consensus";
const DATASET_HMM: &str = "hmm";

/// Path of the group a family is stored under.
pub fn family_path(accession: &str) -> String {
    format!("{}/{}/{}", GROUP_FAMILIES, family_bin(accession), accession)
}

fn set_str(group: &mut Group, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        if !value.is_empty() {
            group
                .attrs
                .insert(key.to_string(), AttrValue::Str(value.to_string()));
        }
    }
}

/// Writes `family` to its group in `container`. Lookup-index links are the
/// caller's concern.
pub fn encode_family(container: &mut Container, family: &Family) -> FamDBResult<()> {
    let path = family_path(&family.accession);
    let citations_json = if family.citations.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&family.citations)?)
    };
    let cds_json = if family.coding_sequences.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&family.coding_sequences)?)
    };

    let group = container.ensure_group(&path).map_err(FamDBError::from)?;

    group.attrs.insert(
        ATTR_ACCESSION.to_string(),
        AttrValue::Str(family.accession.clone()),
    );
    if let Some(version) = family.version {
        group
            .attrs
            .insert(ATTR_VERSION.to_string(), AttrValue::Int(version as i64));
    }
    set_str(group, ATTR_NAME, family.name.as_deref());
    set_str(group, ATTR_TITLE, family.title.as_deref());
    set_str(group, ATTR_DESCRIPTION, family.description.as_deref());
    set_str(group, ATTR_CLASSIFICATION, family.classification.as_deref());
    if !family.clades.is_empty() {
        group.attrs.insert(
            ATTR_CLADES.to_string(),
            AttrValue::IntList(family.clades.iter().map(|c| c.value() as i64).collect()),
        );
    }
    set_str(group, ATTR_ALIASES, family.aliases.as_deref());
    set_str(group, ATTR_CITATIONS, citations_json.as_deref());
    set_str(group, ATTR_CODING_SEQUENCES, cds_json.as_deref());
    if let Some(cutoff) = family.general_cutoff {
        group
            .attrs
            .insert(ATTR_GENERAL_CUTOFF.to_string(), AttrValue::Float(cutoff));
    }
    set_str(group, ATTR_TAXA_THRESHOLDS, family.taxa_thresholds.as_deref());
    set_str(group, ATTR_BUILD_METHOD, family.build_method.as_deref());
    set_str(group, ATTR_SEARCH_METHOD, family.search_method.as_deref());
    set_str(group, ATTR_DATE_CREATED, family.date_created.as_deref());
    set_str(group, ATTR_DATE_MODIFIED, family.date_modified.as_deref());
    if let Some(length) = family.length {
        group
            .attrs
            .insert(ATTR_LENGTH.to_string(), AttrValue::Int(length as i64));
    }
    set_str(group, ATTR_REPEAT_TYPE, family.repeat_type.as_deref());
    set_str(group, ATTR_REPEAT_SUBTYPE, family.repeat_subtype.as_deref());
    set_str(group, ATTR_SEARCH_STAGES, family.search_stages.as_deref());
    set_str(group, ATTR_BUFFER_STAGES, family.buffer_stages.as_deref());
    set_str(group, ATTR_TARGET_SITE_CONS, family.target_site_cons.as_deref());
    if family.refineable {
        group
            .attrs
            .insert(ATTR_REFINEABLE.to_string(), AttrValue::Bool(true));
    }
    for (key, value) in &family.extra {
        group.attrs.insert(key.clone(), json_to_attr(value));
    }

    if let Some(consensus) = family.consensus.as_deref() {
        group.children.insert(
            DATASET_CONSENSUS.to_string(),
            crate::container::Node::Dataset(Dataset::Text(consensus.to_uppercase())),
        );
    }
    if let Some(model) = family.model.as_deref() {
        group.children.insert(
            DATASET_HMM.to_string(),
            crate::container::Node::Dataset(Dataset::Bytes(model.as_bytes().to_vec())),
        );
    }
    Ok(())
}

/// Reads a family back out of its group.
pub fn decode_family(group: &Group) -> FamDBResult<Family> {
    let mut family = Family::default();

    let get_str = |key: &str| {
        group
            .attrs
            .get(key)
            .and_then(|a| a.as_str())
            .map(|s| s.to_string())
    };

    family.accession = get_str(ATTR_ACCESSION)
        .ok_or_else(|| FamDBError::Corrupt("family group without accession".to_string()))?;
    family.version = group
        .attrs
        .get(ATTR_VERSION)
        .and_then(|a| a.as_i64())
        .map(|v| v as u32);
    family.name = get_str(ATTR_NAME);
    family.title = get_str(ATTR_TITLE);
    family.description = get_str(ATTR_DESCRIPTION);
    family.classification = get_str(ATTR_CLASSIFICATION);
    family.clades = group
        .attrs
        .get(ATTR_CLADES)
        .and_then(|a| a.as_int_list())
        .map(|ids| ids.iter().map(|id| TaxonId(*id as u32)).collect())
        .unwrap_or_default();
    family.aliases = get_str(ATTR_ALIASES);
    if let Some(raw) = get_str(ATTR_CITATIONS) {
        family.citations = serde_json::from_str(&raw)?;
    }
    if let Some(raw) = get_str(ATTR_CODING_SEQUENCES) {
        family.coding_sequences = serde_json::from_str(&raw)?;
    }
    family.general_cutoff = group.attrs.get(ATTR_GENERAL_CUTOFF).and_then(|a| a.as_f64());
    family.taxa_thresholds = get_str(ATTR_TAXA_THRESHOLDS);
    family.build_method = get_str(ATTR_BUILD_METHOD);
    family.search_method = get_str(ATTR_SEARCH_METHOD);
    family.date_created = get_str(ATTR_DATE_CREATED);
    family.date_modified = get_str(ATTR_DATE_MODIFIED);
    family.length = group
        .attrs
        .get(ATTR_LENGTH)
        .and_then(|a| a.as_i64())
        .map(|v| v as u64);
    family.repeat_type = get_str(ATTR_REPEAT_TYPE);
    family.repeat_subtype = get_str(ATTR_REPEAT_SUBTYPE);
    family.search_stages = get_str(ATTR_SEARCH_STAGES);
    family.buffer_stages = get_str(ATTR_BUFFER_STAGES);
    family.target_site_cons = get_str(ATTR_TARGET_SITE_CONS);
    family.refineable = group
        .attrs
        .get(ATTR_REFINEABLE)
        .and_then(|a| a.as_bool())
        .unwrap_or(false);

    for (key, value) in &group.attrs {
        if !ATTR_KEYS.contains(&key.as_str()) {
            family.extra.insert(key.clone(), attr_to_json(value));
        }
    }

    if let Some(Dataset::Text(consensus)) = dataset(group, DATASET_CONSENSUS) {
        family.consensus = Some(consensus.clone());
    }
    if let Some(ds) = dataset(group, DATASET_HMM) {
        family.model = match ds {
            Dataset::Bytes(bytes) => String::from_utf8(bytes.clone()).ok(),
            Dataset::Text(text) => Some(text.clone()),
            _ => None,
        };
    }
    Ok(family)
}

fn dataset<'a>(group: &'a Group, name: &str) -> Option<&'a Dataset> {
    match group.children.get(name) {
        Some(crate::container::Node::Dataset(ds)) => Some(ds),
        _ => None,
    }
}

fn attr_to_json(value: &AttrValue) -> serde_json::Value {
    match value {
        AttrValue::Str(s) => serde_json::Value::String(s.clone()),
        AttrValue::Int(v) => serde_json::Value::from(*v),
        AttrValue::Float(v) => serde_json::Value::from(*v),
        AttrValue::Bool(v) => serde_json::Value::Bool(*v),
        AttrValue::IntList(v) => serde_json::Value::from(v.clone()),
    }
}

fn json_to_attr(value: &serde_json::Value) -> AttrValue {
    match value {
        serde_json::Value::Bool(v) => AttrValue::Bool(*v),
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                AttrValue::Int(v)
            } else {
                AttrValue::Float(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::Array(items) => AttrValue::IntList(
            items.iter().filter_map(|item| item.as_i64()).collect(),
        ),
        other => AttrValue::Str(
            other
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use famdb_core::Citation;

    fn rich_family() -> Family {
        Family {
            accession: "DF000000001".to_string(),
            version: Some(4),
            name: Some("MIR".to_string()),
            title: Some("MIR (Mammalian-wide Interspersed Repeat)".to_string()),
            description: Some("A pan-mammalian SINE".to_string()),
            classification: Some("root;Interspersed_Repeat;SINE;MIR".to_string()),
            clades: vec![TaxonId(40674)],
            consensus: Some("ACGTACGT".to_string()),
            model: Some("HMMER3/f [3.1b2]\nNAME  MIR\n//\n".to_string()),
            aliases: Some("Repbase:MIR\n".to_string()),
            citations: vec![Citation {
                order_added: 1,
                authors: "Smit AF".to_string(),
                title: "MIRs are classic".to_string(),
                journal: "PNAS 92, 1995.".to_string(),
            }],
            general_cutoff: Some(25.0),
            taxa_thresholds: Some("9606,1.0,2.0,3.0,0.002".to_string()),
            length: Some(262),
            repeat_type: Some("SINE".to_string()),
            repeat_subtype: Some("MIR".to_string()),
            search_stages: Some("40,60,65".to_string()),
            buffer_stages: Some("40[1-50]".to_string()),
            refineable: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut container = Container::create(std::path::Path::new("/tmp/unused.h5"));
        let family = rich_family();
        encode_family(&mut container, &family).unwrap();

        let group = container.group(&family_path("DF000000001")).unwrap();
        let decoded = decode_family(group).unwrap();
        assert_eq!(decoded, family);
    }

    #[test]
    fn test_consensus_canonicalized_to_uppercase() {
        let mut container = Container::create(std::path::Path::new("/tmp/unused.h5"));
        let mut family = rich_family();
        family.consensus = Some("acgtacgt".to_string());
        encode_family(&mut container, &family).unwrap();

        let group = container.group(&family_path("DF000000001")).unwrap();
        let decoded = decode_family(group).unwrap();
        assert_eq!(decoded.consensus.as_deref(), Some("ACGTACGT"));
    }

    #[test]
    fn test_unknown_attributes_survive_roundtrip() {
        let mut container = Container::create(std::path::Path::new("/tmp/unused.h5"));
        let mut family = rich_family();
        family
            .extra
            .insert("future_field".to_string(), serde_json::json!("kept"));
        family
            .extra
            .insert("future_count".to_string(), serde_json::json!(12));
        encode_family(&mut container, &family).unwrap();

        let group = container.group(&family_path("DF000000001")).unwrap();
        let decoded = decode_family(group).unwrap();
        assert_eq!(decoded.extra, family.extra);
    }

    #[test]
    fn test_families_are_binned_by_accession_prefix() {
        assert_eq!(family_path("DF000000001"), "Families/DF/DF000000001");
        assert_eq!(family_path("DR000000001"), "Families/DR/DR000000001");
    }
}
