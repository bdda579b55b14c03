//! The `info` command: stored metadata, partition presence, counts.

use std::io::Write;

use clap::Args;

use famdb_core::FamDBResult;
use famdb_store::FileSet;

#[derive(Args)]
pub struct InfoArgs {
    /// List the file changelog in addition to general information
    #[arg(long)]
    pub history: bool,
}

pub fn run(set: &FileSet, args: &InfoArgs, out: &mut dyn Write) -> FamDBResult<()> {
    let (consensus, hmm, files_present) = set.counts();
    let info = set.db_info();

    writeln!(out)?;
    writeln!(
        out,
        "FamDB Directory     : {}",
        set.dir()
            .canonicalize()
            .unwrap_or_else(|_| set.dir().to_path_buf())
            .display()
    )?;
    writeln!(out, "FamDB Format Version: {}", set.root().schema_version())?;
    writeln!(out, "FamDB Creation Date : {}", set.root().created())?;
    writeln!(out)?;
    if let Some(info) = &info {
        writeln!(out, "Database: {}", info.name)?;
        writeln!(out, "Version : {}", info.version)?;
        writeln!(out, "Date    : {}", info.date)?;
        writeln!(out)?;
        writeln!(out, "{}", info.description)?;
        writeln!(out)?;
    }
    writeln!(out, "{} Partitions Present", files_present)?;
    writeln!(out, "Total consensus sequences present: {}", consensus)?;
    writeln!(out, "Total HMMs present               : {}", hmm)?;
    writeln!(out)?;

    writeln!(out, "Partition Details")?;
    writeln!(out, "-----------------")?;
    for (partition, entry) in &set.file_info().partitions {
        let detail = if entry.detail_names.is_empty() {
            String::new()
        } else {
            format!(" - {}", entry.detail_names.join(", "))
        };
        if let Some(file) = set.file(*partition) {
            writeln!(
                out,
                " Partition {} [{}]: {}{}",
                partition, entry.filename, entry.name, detail
            )?;
            let (consensus, hmm) = file.counts();
            writeln!(out, "     Consensi: {}, HMMs: {}", consensus, hmm)?;
        } else {
            writeln!(
                out,
                " Partition {} [ Absent ]: {}{}",
                partition, entry.name, detail
            )?;
        }
        writeln!(out)?;
    }

    if args.history {
        writeln!(out, "File History")?;
        writeln!(out, "-----------------")?;
        for (partition, entries) in set.history() {
            writeln!(out)?;
            writeln!(out, " File {}", partition)?;
            for entry in entries {
                writeln!(out, "{} - {}", entry.timestamp, entry.operation)?;
            }
        }
    }
    Ok(())
}
