use clap::Parser;
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;

use famdb_cli::cli;
use famdb_cli::cli::{Cli, Commands};
use famdb_core::FamDBError;
use famdb_store::{FileSet, Mode};

fn main() {
    let cli = Cli::parse();

    // Logging goes to stderr so query output on stdout stays clean.
    // FAMDB_LOG / RUST_LOG override the -l flag.
    let env_filter = if let Ok(spec) = std::env::var("RUST_LOG") {
        EnvFilter::new(spec)
    } else if let Ok(spec) = std::env::var("FAMDB_LOG") {
        EnvFilter::new(spec)
    } else {
        EnvFilter::new(&cli.log_level)
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        // A closed stdout (head, broken pager) ends the query cleanly.
        let broken_pipe = e
            .downcast_ref::<FamDBError>()
            .map(|fe| fe.is_broken_pipe())
            .unwrap_or(false)
            || e.downcast_ref::<std::io::Error>()
                .map(|ioe| ioe.kind() == std::io::ErrorKind::BrokenPipe)
                .unwrap_or(false);
        if broken_pipe {
            process::exit(0);
        }

        eprintln!("{} {}", "Error:".red().bold(), e);
        let exit_code = e
            .downcast_ref::<FamDBError>()
            .map(|fe| fe.exit_code())
            .unwrap_or(1);
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let dir = cli.db_dir.clone().ok_or_else(|| {
        FamDBError::InvalidInput(
            "specify a directory containing FamDB files with the -i/--db-dir option".to_string(),
        )
    })?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Info(args) => {
            let set = FileSet::open(&dir, Mode::ReadOnly)?;
            cli::commands::info::run(&set, &args, &mut out)?;
        }
        Commands::Names(args) => {
            let set = FileSet::open(&dir, Mode::ReadOnly)?;
            cli::commands::names::run(&set, &args, &mut out)?;
        }
        Commands::Lineage(args) => {
            let set = FileSet::open(&dir, Mode::ReadOnly)?;
            cli::commands::lineage::run(&set, &args, &mut out)?;
        }
        Commands::Family(args) => {
            let set = FileSet::open(&dir, Mode::ReadOnly)?;
            cli::commands::family::run(&set, &args, &mut out)?;
        }
        Commands::Families(args) => {
            let set = FileSet::open(&dir, Mode::ReadOnly)?;
            cli::commands::families::run(&set, &args, &mut out)?;
        }
        Commands::Append(args) => {
            let mut set = FileSet::open(&dir, Mode::ReadWrite)?;
            cli::commands::append::run(&mut set, &args)?;
        }
        Commands::RepeatPeps => {
            let set = FileSet::open(&dir, Mode::ReadOnly)?;
            match set.root().repeatpeps() {
                Some(fasta) => {
                    use std::io::Write;
                    out.write_all(fasta.as_bytes()).map_err(FamDBError::Io)?;
                }
                None => {
                    return Err(
                        FamDBError::NotFound("no RepeatPeps stored in this export".to_string())
                            .into(),
                    )
                }
            }
        }
        Commands::EditDescription(args) => {
            let mut set = FileSet::open(&dir, Mode::ReadWrite)?;
            set.update_description(&args.new_description)?;
        }
    }
    Ok(())
}
