//! EMBL emission and ingest.
//!
//! The emitter produces the record layout RepeatMasker's library tooling
//! expects; the reader accepts that same layout back (the `append`
//! command), resolving species names to taxon ids through a caller-supplied
//! lookup of sanitized names.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use tracing::{debug, warn};

use famdb_core::{Family, FamDBError, FamDBResult, NameLookup, TaxonId};

use crate::sequence::{chunks, wrap_text};

/// Writes one EMBL record for `family`. `include_meta` controls the
/// metadata sections, `include_seq` the `SQ` block; the identifier block
/// is always present. Returns `Ok(false)` when the family has no
/// consensus.
pub fn write_embl(
    out: &mut dyn Write,
    family: &Family,
    lookup: Option<&dyn NameLookup>,
    include_meta: bool,
    include_seq: bool,
) -> io::Result<bool> {
    let Some(consensus) = family.consensus.as_deref() else {
        return Ok(false);
    };
    let length = consensus.len();

    match family.version {
        Some(v) => writeln!(
            out,
            "ID   {}; SV {}; linear; DNA; STD; UNC; {} BP.",
            family.accession, v, length
        )?,
        None => writeln!(
            out,
            "ID   {}; linear; DNA; STD; UNC; {} BP.",
            family.accession, length
        )?,
    }
    if let Some(name) = family.name.as_deref() {
        writeln!(out, "NM   {}", name)?;
    }
    writeln!(out, "XX")?;
    writeln!(out, "AC   {};", family.accession)?;
    writeln!(out, "XX")?;
    if let Some(title) = family.title.as_deref() {
        for line in wrap_text(title, 72) {
            writeln!(out, "DE   {}", line)?;
        }
    }
    writeln!(out, "XX")?;

    if include_meta {
        write_meta(out, family, lookup, length)?;
    }

    if include_seq {
        write_sq(out, consensus)?;
    }
    writeln!(out, "//")?;
    Ok(true)
}

fn write_meta(
    out: &mut dyn Write,
    family: &Family,
    lookup: Option<&dyn NameLookup>,
    length: usize,
) -> io::Result<()> {
    let mut wrote_dr = false;
    for (db, id) in family.alias_entries() {
        if db == "Repbase" {
            writeln!(out, "DR   Repbase; {}.", id)?;
            wrote_dr = true;
        }
    }
    if wrote_dr {
        writeln!(out, "XX")?;
    }

    let display_name = family
        .name
        .as_deref()
        .unwrap_or(family.accession.as_str());
    let keywords = match family.repeat_type.as_deref() {
        Some("LTR") => Some(format!(
            "Long terminal repeat of retrovirus-like element; {}",
            display_name
        )),
        Some(_) => family.rm_class(),
        None => None,
    };
    if let Some(kw) = keywords {
        writeln!(out, "KW   {}.", kw)?;
        writeln!(out, "XX")?;
    }

    let clade_names: Vec<String> = family
        .clades
        .iter()
        .map(|clade| {
            lookup
                .and_then(|l| l.scientific_name(*clade))
                .unwrap_or_else(|| clade.to_string())
        })
        .collect();
    for (clade, clade_name) in family.clades.iter().zip(clade_names.iter()) {
        writeln!(out, "OS   {}", clade_name)?;
        let path = lookup
            .map(|l| l.lineage_path(*clade))
            .unwrap_or_default()
            .join("; ");
        if path.is_empty() {
            writeln!(out, "OC   .")?;
        } else {
            let mut lines = wrap_text(&path, 75);
            if let Some(last) = lines.last_mut() {
                last.push('.');
            }
            for line in lines {
                writeln!(out, "OC   {}", line)?;
            }
        }
    }
    writeln!(out, "XX")?;

    let mut citations = family.citations.clone();
    citations.sort_by_key(|c| c.order_added);
    for citation in &citations {
        writeln!(
            out,
            "RN   [{}] (bases 1 to {})",
            citation.order_added,
            family.length.unwrap_or(length as u64)
        )?;
        writeln!(out, "RA   {}", citation.authors)?;
        writeln!(out, "RT   {}", citation.title)?;
        writeln!(out, "RL   {}", citation.journal)?;
        writeln!(out, "XX")?;
    }

    writeln!(out, "CC")?;
    if let Some(description) = family.description.as_deref() {
        for line in wrap_text(description, 72) {
            writeln!(out, "CC   {}", line)?;
        }
    }
    let sanitized_clades: Vec<String> = family
        .clades
        .iter()
        .filter_map(|clade| lookup.and_then(|l| l.sanitized_name(*clade)))
        .collect();
    writeln!(out, "CC   RepeatMasker Annotations:")?;
    writeln!(
        out,
        "CC        Type: {}",
        family.repeat_type.as_deref().unwrap_or_default()
    )?;
    writeln!(
        out,
        "CC        SubType: {}",
        family.repeat_subtype.as_deref().unwrap_or_default()
    )?;
    writeln!(out, "CC        Species: {}", sanitized_clades.join(", "))?;
    writeln!(
        out,
        "CC        SearchStages: {}",
        family.search_stages.as_deref().unwrap_or_default()
    )?;
    writeln!(
        out,
        "CC        BufferStages: {}",
        family.buffer_stages.as_deref().unwrap_or_default()
    )?;
    if family.refineable {
        writeln!(out, "CC        Refineable")?;
    }
    writeln!(out, "XX")?;

    if !family.coding_sequences.is_empty() {
        writeln!(out, "FH   Key             Location/Qualifiers")?;
        writeln!(out, "FH")?;
        for cds in &family.coding_sequences {
            writeln!(out, "FT   {:<16}{}..{}", "CDS", cds.cds_start, cds.cds_end)?;
            writeln!(out, "FT   {:<16}/product=\"{}\"", "", cds.product)?;
            writeln!(out, "FT   {:<16}/number={}", "", cds.exon_count)?;
            writeln!(out, "FT   {:<16}/note=\"{}\"", "", cds.description)?;
            writeln!(out, "FT   {:<16}/translation=\"{}\"", "", cds.translation)?;
        }
        writeln!(out, "XX")?;
    }
    Ok(())
}

fn write_sq(out: &mut dyn Write, consensus: &str) -> io::Result<()> {
    let sequence = consensus.to_lowercase();
    let (mut a, mut c, mut g, mut t) = (0usize, 0usize, 0usize, 0usize);
    for ch in sequence.chars() {
        match ch {
            'a' => a += 1,
            'c' => c += 1,
            'g' => g += 1,
            't' => t += 1,
            _ => {}
        }
    }
    let other = sequence.len() - a - c - g - t;
    writeln!(
        out,
        "SQ   Sequence {} BP; {} A; {} C; {} G; {} T; {} other;",
        sequence.len(),
        a,
        c,
        g,
        t,
        other
    )?;

    let mut position = 0usize;
    for row in chunks(&sequence, 60) {
        position += row.len();
        let mut grouped = String::with_capacity(66);
        for group in chunks(row, 10) {
            grouped.push_str(group);
            grouped.push(' ');
        }
        writeln!(out, "     {:<66} {}", grouped, position)?;
    }
    Ok(())
}

/// Pull iterator over `Family` records in an EMBL file, as produced by
/// [`write_embl`].
///
/// `lookup` maps lower-cased sanitized species names to taxon ids; records
/// whose species resolve to no known taxon are skipped with a warning.
/// The free-form text above the first record is collected and available
/// from [`EmblReader::header`] once iteration has passed it.
pub struct EmblReader<R: BufRead> {
    lines: io::Lines<R>,
    lookup: HashMap<String, TaxonId>,
    header: String,
    in_header: bool,
}

impl<R: BufRead> EmblReader<R> {
    pub fn new(reader: R, lookup: HashMap<String, TaxonId>) -> Self {
        Self {
            lines: reader.lines(),
            lookup,
            header: String::new(),
            in_header: true,
        }
    }

    /// The comment header preceding the first record.
    pub fn header(&self) -> &str {
        &self.header
    }

    fn resolve_clade(&self, raw: &str) -> Option<TaxonId> {
        let name = raw.trim();
        if name.is_empty() {
            return None;
        }
        if let Some(id) = self.lookup.get(&name.to_lowercase()) {
            return Some(*id);
        }
        let stripped = name.replace(['[', ']'], "");
        self.lookup.get(&stripped.to_lowercase()).copied()
    }

    fn apply_code(&self, family: &mut Family, code: &str, value: &str) {
        match code {
            "ID" => {
                let token = value.split_whitespace().next().unwrap_or_default();
                family.accession = token.trim_end_matches(';').to_string();
                if let Some(sv) = value.split("SV ").nth(1) {
                    let digits: String =
                        sv.chars().take_while(|ch| ch.is_ascii_digit()).collect();
                    family.version = digits.parse().ok();
                }
            }
            "NM" => family.name = Some(value.to_string()),
            "DE" => {
                // DE lines may wrap; re-join with single spaces.
                match &mut family.title {
                    Some(title) => {
                        title.push(' ');
                        title.push_str(value);
                    }
                    None => family.title = Some(value.to_string()),
                }
            }
            "CC" => self.apply_comment(family, value),
            _ => {}
        }
    }

    fn apply_comment(&self, family: &mut Family, value: &str) {
        let trimmed = value.trim();
        if let Some(rest) = trimmed.strip_prefix("Type:") {
            if let Some(word) = rest.split_whitespace().next() {
                family.repeat_type = Some(word.to_string());
            }
        } else if let Some(rest) = trimmed.strip_prefix("SubType:") {
            if let Some(word) = rest.split_whitespace().next() {
                family.repeat_subtype = Some(word.to_string());
            }
        } else if let Some(rest) = trimmed.strip_prefix("Species:") {
            for spec in rest.split(',') {
                let name = spec.trim();
                if name.is_empty() {
                    continue;
                }
                match self.resolve_clade(name) {
                    Some(id) => family.clades.push(id),
                    None => warn!(
                        "could not find taxon for '{}' (accession {})",
                        name, family.accession
                    ),
                }
            }
        } else if let Some(rest) = trimmed.strip_prefix("SearchStages:") {
            let stages = rest.trim();
            if !stages.is_empty() {
                family.search_stages = Some(stages.to_string());
            }
        } else if let Some(rest) = trimmed.strip_prefix("BufferStages:") {
            let stages = rest.trim();
            if !stages.is_empty() {
                family.buffer_stages = Some(stages.to_string());
            }
        } else if trimmed.contains("Refineable") {
            family.refineable = true;
        }
    }
}

impl<R: BufRead> Iterator for EmblReader<R> {
    type Item = FamDBResult<Family>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut family: Option<Family> = None;
        let mut in_metadata = false;

        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(FamDBError::Io(e))),
                None => return None,
            };

            if family.is_none() {
                if line.starts_with("ID") {
                    self.in_header = false;
                    let mut fam = Family::default();
                    if let Some((code, value)) = split_code(&line) {
                        self.apply_code(&mut fam, code, value);
                    }
                    family = Some(fam);
                    in_metadata = true;
                } else if self.in_header {
                    if line.starts_with("XX") {
                        self.in_header = false;
                    } else {
                        let text = line.strip_prefix("CC").unwrap_or(&line);
                        self.header
                            .push_str(text.trim().trim_end_matches('*').trim());
                        self.header.push('\n');
                    }
                }
                continue;
            }

            if line.starts_with("//") {
                in_metadata = false;
                let mut fam = family.take().unwrap();
                fam.length = fam.consensus.as_ref().map(|c| c.len() as u64);
                if fam.clades.is_empty() {
                    debug!("skipping {}: no recognized species", fam.accession);
                    // keep scanning for the next record
                } else {
                    return Some(Ok(fam));
                }
            } else if in_metadata {
                let fam = family.as_mut().unwrap();
                if line.starts_with("SQ") {
                    in_metadata = false;
                    fam.consensus = Some(String::new());
                } else if let Some((code, value)) = split_code(&line) {
                    self.apply_code(fam, code, value);
                }
            } else if let Some(consensus) = family.as_mut().unwrap().consensus.as_mut() {
                consensus.extend(line.chars().filter(|ch| ch.is_ascii_alphabetic()));
            }
        }
    }
}

fn split_code(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let code = parts.next()?.trim();
    let value = parts.next().unwrap_or_default().trim();
    if code.is_empty() || value.is_empty() {
        return None;
    }
    Some((code, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockLookup;
    use famdb_core::Citation;

    fn render(family: &Family, include_meta: bool, include_seq: bool) -> String {
        let mut out = Vec::new();
        write_embl(&mut out, family, Some(&MockLookup), include_meta, include_seq).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn family(name: &str, acc: &str, version: u32, consensus: &str) -> Family {
        Family {
            accession: acc.to_string(),
            version: Some(version),
            name: Some(name.to_string()),
            consensus: Some(consensus.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_simple() {
        let mut fam = family("Test1", "TEST0001", 1, "ACGTAAAA");
        fam.clades = vec![TaxonId(2)];
        fam.repeat_type = Some("Type".to_string());
        fam.repeat_subtype = Some("SubType".to_string());

        assert_eq!(
            render(&fam, true, true),
            "\
ID   TEST0001; SV 1; linear; DNA; STD; UNC; 8 BP.
NM   Test1
XX
AC   TEST0001;
XX
XX
KW   Type/SubType.
XX
OS   A Clade
OC   .
XX
CC
CC   RepeatMasker Annotations:
CC        Type: Type
CC        SubType: SubType
CC        Species: A_Clade
CC        SearchStages: \n\
CC        BufferStages: \n\
XX
SQ   Sequence 8 BP; 5 A; 1 C; 1 G; 1 T; 0 other;
     acgtaaaa                                                           8
//
"
        );
    }

    #[test]
    fn test_multiline_sequence() {
        let mut fam = family("Test2", "TEST0002", 2, &"ACGTTGCA".repeat(20));
        fam.clades = vec![TaxonId(3)];
        fam.repeat_type = Some("Test".to_string());
        fam.repeat_subtype = Some("Multiline".to_string());

        let rendered = render(&fam, true, true);
        assert!(rendered.contains(
            "SQ   Sequence 160 BP; 40 A; 40 C; 40 G; 40 T; 0 other;\n\
     acgttgcaac gttgcaacgt tgcaacgttg caacgttgca acgttgcaac gttgcaacgt  60\n\
     tgcaacgttg caacgttgca acgttgcaac gttgcaacgt tgcaacgttg caacgttgca  120\n\
     acgttgcaac gttgcaacgt tgcaacgttg caacgttgca                        160\n\
//\n"
        ));
    }

    #[test]
    fn test_meta_only_and_seq_only() {
        let mut fam = family("Test3", "TEST0003", 3, "ACGTTGCA");
        fam.clades = vec![TaxonId(3)];
        fam.repeat_type = Some("Test".to_string());

        let meta = render(&fam, true, false);
        assert!(!meta.contains("SQ   "));
        assert!(meta.ends_with("XX\n//\n"));

        let seq = render(&fam, false, true);
        assert_eq!(
            seq,
            "\
ID   TEST0003; SV 3; linear; DNA; STD; UNC; 8 BP.
NM   Test3
XX
AC   TEST0003;
XX
XX
SQ   Sequence 8 BP; 2 A; 2 C; 2 G; 2 T; 0 other;
     acgttgca                                                           8
//
"
        );
    }

    #[test]
    fn test_special_metadata() {
        let mut fam = family("Test5", "TEST0005", 5, "ACGTTGCAGAGAKWCTCT");
        fam.clades = vec![TaxonId(3), TaxonId(2)];
        fam.repeat_type = Some("LTR".to_string());
        fam.repeat_subtype = Some("BigTest".to_string());
        fam.aliases = Some("Repbase:MyLTR1\nOtherDB:MyLTR\n".to_string());
        fam.refineable = true;

        let rendered = render(&fam, true, true);
        assert!(rendered.contains("DR   Repbase; MyLTR1.\nXX\n"));
        assert!(!rendered.contains("OtherDB"));
        assert!(rendered
            .contains("KW   Long terminal repeat of retrovirus-like element; Test5.\nXX\n"));
        assert!(rendered.contains("CC        Refineable\n"));
        assert!(rendered.contains("SQ   Sequence 18 BP; 4 A; 4 C; 4 G; 4 T; 2 other;\n"));
    }

    #[test]
    fn test_citations() {
        let mut fam = family("Test7", "TEST0007", 7, "ACGTTGCAGAGACTCT");
        fam.clades = vec![TaxonId(2)];
        fam.length = Some(16);
        fam.citations = vec![
            Citation {
                order_added: 2,
                authors: "Jane Doe".to_string(),
                title: "Testing Citation Export Formatting".to_string(),
                journal: "Unit Tests 7(2), 2020.".to_string(),
            },
            Citation {
                order_added: 1,
                authors: "John Doe".to_string(),
                title: "Testing Citation Export Formatting".to_string(),
                journal: "Unit Tests 7(2), 2020.".to_string(),
            },
        ];

        let rendered = render(&fam, true, false);
        assert!(rendered.contains(
            "RN   [1] (bases 1 to 16)\n\
RA   John Doe\n\
RT   Testing Citation Export Formatting\n\
RL   Unit Tests 7(2), 2020.\n\
XX\n\
RN   [2] (bases 1 to 16)\n\
RA   Jane Doe\n"
        ));
    }

    #[test]
    fn test_coding_sequences() {
        let mut fam = family("Test8", "TEST0008", 8, "ACGTTGCAGAGACTCT");
        fam.clades = vec![TaxonId(2)];
        fam.coding_sequences = vec![famdb_core::CodingSequence {
            cds_start: 1,
            cds_end: 6,
            exon_count: 1,
            product: "FAKE".to_string(),
            description: "Example coding sequence".to_string(),
            translation: "TL".to_string(),
        }];

        let rendered = render(&fam, true, false);
        assert!(rendered.contains(
            "FH   Key             Location/Qualifiers\n\
FH\n\
FT   CDS             1..6\n\
FT                   /product=\"FAKE\"\n\
FT                   /number=1\n\
FT                   /note=\"Example coding sequence\"\n\
FT                   /translation=\"TL\"\n\
XX\n"
        ));
    }

    #[test]
    fn test_no_consensus_skipped() {
        let mut fam = family("Test9", "TEST0009", 9, "");
        fam.consensus = None;
        let mut out = Vec::new();
        assert!(!write_embl(&mut out, &fam, None, true, true).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn test_roundtrip_through_reader() {
        let mut fam = family("Test1", "TEST0001", 1, "ACGTAAAA");
        fam.clades = vec![TaxonId(2)];
        fam.repeat_type = Some("Type".to_string());
        fam.repeat_subtype = Some("SubType".to_string());
        fam.search_stages = Some("30,45".to_string());
        let rendered = render(&fam, true, true);

        let mut lookup = HashMap::new();
        lookup.insert("a_clade".to_string(), TaxonId(2));
        let mut reader = EmblReader::new(rendered.as_bytes(), lookup);
        let parsed = reader.next().unwrap().unwrap();
        assert!(reader.next().is_none());

        assert_eq!(parsed.accession, "TEST0001");
        assert_eq!(parsed.version, Some(1));
        assert_eq!(parsed.name.as_deref(), Some("Test1"));
        assert_eq!(parsed.clades, vec![TaxonId(2)]);
        assert_eq!(parsed.repeat_type.as_deref(), Some("Type"));
        assert_eq!(parsed.repeat_subtype.as_deref(), Some("SubType"));
        assert_eq!(parsed.search_stages.as_deref(), Some("30,45"));
        assert_eq!(parsed.consensus.as_deref(), Some("acgtaaaa"));
        assert_eq!(parsed.length, Some(8));
    }

    #[test]
    fn test_reader_header_and_unknown_species() {
        let input = "\
Test library
CC   curated by hand *
XX
ID   TEST0001; SV 1; linear; DNA; STD; UNC; 4 BP.
NM   Test1
XX
CC        Species: Nobody_Knows
SQ   Sequence 4 BP; 4 A; 0 C; 0 G; 0 T; 0 other;
     aaaa                                                               4
//
";
        let mut reader = EmblReader::new(input.as_bytes(), HashMap::new());
        // The only record has no resolvable species, so iteration ends.
        assert!(reader.next().is_none());
        assert_eq!(reader.header(), "Test library\ncurated by hand\n");
    }
}
