//! Family accession parsing and binning.
//!
//! Accessions look like `DF000000001` (curated) or `DR000000001`
//! (uncurated), optionally carrying a `.N` version suffix. Imported
//! libraries may use other prefixes; only `DF` marks a family as curated.

/// Returns true when the accession denotes a curated family (`DF` prefix).
pub fn is_curated(accession: &str) -> bool {
    accession.starts_with("DF")
}

/// Splits an optional `.N` version suffix off an accession.
///
/// Returns the bare accession and the parsed version, if any. A dotted
/// suffix that is not a number is left attached to the accession.
pub fn split_version(accession: &str) -> (&str, Option<u32>) {
    if let Some((base, suffix)) = accession.rsplit_once('.') {
        if let Ok(version) = suffix.parse::<u32>() {
            return (base, Some(version));
        }
    }
    (accession, None)
}

/// Canonical lookup form of a user-supplied accession: upper-cased, with
/// any version suffix split off. Lookups are case-insensitive and both the
/// versioned and unversioned forms resolve to the stored family.
pub fn normalize_accession(accession: &str) -> (String, Option<u32>) {
    let upper = accession.trim().to_uppercase();
    let (base, version) = split_version(&upper);
    (base.to_string(), version)
}

/// The two-character bin a family accession is stored under.
///
/// The container's per-group insertion cost grows with group size, so the
/// families namespace is split by the first two accession characters,
/// capping group fan-out. Every reader and writer must compute the same
/// bin.
pub fn family_bin(accession: &str) -> &str {
    if accession.len() >= 2 {
        &accession[..2]
    } else {
        accession
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curated_prefix() {
        assert!(is_curated("DF000000001"));
        assert!(!is_curated("DR000000001"));
        assert!(!is_curated("TEST0001"));
    }

    #[test]
    fn test_split_version() {
        assert_eq!(split_version("DF000000001.4"), ("DF000000001", Some(4)));
        assert_eq!(split_version("DF000000001"), ("DF000000001", None));
        assert_eq!(split_version("DR_Repeat1.x"), ("DR_Repeat1.x", None));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize_accession("df000000001.2"),
            ("DF000000001".to_string(), Some(2))
        );
        assert_eq!(
            normalize_accession(" test0001 "),
            ("TEST0001".to_string(), None)
        );
    }

    #[test]
    fn test_family_bin() {
        assert_eq!(family_bin("DF000000001"), "DF");
        assert_eq!(family_bin("DR000000001"), "DR");
        assert_eq!(family_bin("X"), "X");
    }
}
