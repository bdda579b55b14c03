//! Nucleotide sequence helpers shared by the emitters.

/// Complement lookup kept in sync with Dfam's export table, covering the
/// IUPAC ambiguity codes. Characters outside the table pass through
/// unchanged.
const FORWARD: &[u8] = b"ACGTRYWSKMNXBDHV";
const REVERSE: &[u8] = b"TGCAYRSWMKNXVHDB";

fn complement(ch: char) -> char {
    let upper = ch.to_ascii_uppercase();
    match FORWARD.iter().position(|&b| b as char == upper) {
        Some(idx) => {
            let mapped = REVERSE[idx] as char;
            if ch.is_ascii_lowercase() {
                mapped.to_ascii_lowercase()
            } else {
                mapped
            }
        }
        None => ch,
    }
}

/// Reverse complement of `seq`, preserving case.
pub fn reverse_complement(seq: &str) -> String {
    seq.chars().rev().map(complement).collect()
}

/// Splits `seq` into chunks of at most `width` characters.
pub fn chunks(seq: &str, width: usize) -> Vec<&str> {
    let bytes = seq.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / width + 1);
    let mut i = 0;
    while i < bytes.len() {
        let end = (i + width).min(bytes.len());
        out.push(&seq[i..end]);
        i = end;
    }
    out
}

/// Greedy word wrap used for description and lineage lines.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
