//! Taxonomy identifier type and name-class constants
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// NCBI taxonomy identifier - newtype pattern for type safety
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct TaxonId(pub u32);

impl TaxonId {
    /// Create a new TaxonId
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Check if this is the root taxon (1)
    pub fn is_root(&self) -> bool {
        self.0 == 1
    }
}

// Common taxonomy constants
impl TaxonId {
    pub const ROOT: Self = Self(1);
    pub const EUKARYOTA: Self = Self(2759);
    pub const HUMAN: Self = Self(9606);
    pub const MOUSE: Self = Self(10090);
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TaxonId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<TaxonId> for u32 {
    fn from(taxon: TaxonId) -> Self {
        taxon.0
    }
}

impl FromStr for TaxonId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(Self)
    }
}

/// Name classes as they appear in the NCBI names dump.
pub const NAME_SCIENTIFIC: &str = "scientific name";
pub const NAME_COMMON: &str = "common name";
pub const NAME_SYNONYM: &str = "synonym";

/// Returns the "sanitized" version of the given 'name'.
/// This must be kept in sync with Dfam's algorithm.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        match ch {
            c if c.is_whitespace() => {
                if !last_was_sep {
                    out.push('_');
                    last_was_sep = true;
                }
            }
            ',' | '_' => {
                if !last_was_sep {
                    out.push('_');
                    last_was_sep = true;
                }
            }
            '(' | ')' | '<' | '>' | '\'' => {}
            c => {
                out.push(c);
                last_was_sep = false;
            }
        }
    }
    out
}
