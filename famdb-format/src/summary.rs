//! One-line human summary of a family.

use std::io::{self, Write};

use famdb_core::Family;

/// Writes the summary line for `family`. With `include_class_in_name` the
/// RepeatMasker class is appended to the display name, the way library
/// exports name their records.
pub fn write_summary(
    out: &mut dyn Write,
    family: &Family,
    include_class_in_name: bool,
) -> io::Result<bool> {
    if include_class_in_name {
        if let Some(class) = family.rm_class() {
            let mut renamed = family.clone();
            let base = family
                .name
                .clone()
                .unwrap_or_else(|| family.accession.clone());
            renamed.name = Some(format!("{}#{}", base, class));
            writeln!(out, "{}", renamed)?;
            return Ok(true);
        }
    }
    writeln!(out, "{}", family)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_with_class() {
        let fam = Family {
            accession: "DF000000001".to_string(),
            version: Some(4),
            name: Some("MIR".to_string()),
            classification: Some("root;SINE;MIR".to_string()),
            repeat_type: Some("SINE".to_string()),
            repeat_subtype: Some("MIR".to_string()),
            consensus: Some("ACGT".to_string()),
            ..Default::default()
        };

        let mut out = Vec::new();
        write_summary(&mut out, &fam, true).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "DF000000001.4 'MIR#SINE/MIR': root;SINE;MIR len=4\n"
        );
    }
}
