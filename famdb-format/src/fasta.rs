//! FASTA emission.

use std::io::{self, Write};

use famdb_core::{Family, NameLookup};

use crate::sequence::{chunks, reverse_complement};

/// Restriction of the emitted sequence to a buffer region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Buffer {
    /// The whole consensus participates in the buffer stage.
    Whole,
    /// A 1-based inclusive sub-range of the consensus.
    Range(u64, u64),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FastaOptions {
    /// Identify records by accession (`ACC.V`) instead of name.
    pub use_accession: bool,
    /// Append `#Type/SubType` to the identifier.
    pub include_class_in_name: bool,
    /// Emit the reverse complement, marking the identifier with `_RC`.
    pub reverse_complement: bool,
    /// Buffer-stage slice, if any.
    pub buffer: Option<Buffer>,
}

/// Writes one FASTA record for `family`. Returns `Ok(false)` when the
/// family has no consensus sequence.
pub fn write_fasta(
    out: &mut dyn Write,
    family: &Family,
    lookup: Option<&dyn NameLookup>,
    opts: &FastaOptions,
) -> io::Result<bool> {
    let Some(consensus) = family.consensus.as_deref() else {
        return Ok(false);
    };
    let mut sequence = consensus.to_uppercase();

    let mut id = if opts.use_accession {
        family.accession_with_version()
    } else {
        family
            .name
            .clone()
            .unwrap_or_else(|| family.accession.clone())
    };

    if let Some(Buffer::Range(start, end)) = opts.buffer {
        let from = start.max(1) as usize - 1;
        let to = (end as usize).min(sequence.len());
        if from >= to {
            return Ok(false);
        }
        sequence = sequence[from..to].to_string();
        id.push_str(&format!("_{}_{}", start, end));
    }

    if opts.reverse_complement {
        sequence = reverse_complement(&sequence);
        id.push_str("_RC");
    }

    if opts.buffer.is_some() {
        id.push_str("#buffer");
    } else if opts.include_class_in_name {
        if let Some(class) = family.rm_class() {
            id.push('#');
            id.push_str(&class);
        }
    }

    let mut header = format!(">{}", id);
    if opts.use_accession {
        if let Some(name) = family.name.as_deref() {
            header.push_str(&format!(" name={}", name));
        }
    }
    if let Some(lookup) = lookup {
        for clade in &family.clades {
            if let Some(clade_name) = lookup.sanitized_name(*clade) {
                header.push_str(&format!(" @{}", clade_name));
            }
        }
    }
    if let Some(stages) = family.search_stages.as_deref() {
        if !stages.is_empty() {
            header.push_str(&format!(" [S:{}]", stages));
        }
    }

    writeln!(out, "{}", header)?;
    for line in chunks(&sequence, 60) {
        writeln!(out, "{}", line)?;
    }
    Ok(true)
}
