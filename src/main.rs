use clap::{Parser, Subcommand};
use mk4::io_stream::{records, Collect, RecordSet};
use mk4::record::Record;
use mk4::recode::{recode, recode_auto};
use mk4::summary::FringeSummary;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mk4", about = "Read and rewrite Mk4 correlator files")]
struct Cli {
    /// More log output (-v info, -vv debug); RUST_LOG applies otherwise
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print records as JSON
    Dump {
        /// Only the first record of each type (faster)
        #[arg(short = '1', long)]
        one: bool,
        /// Record type ids and file paths, `-` for stdin
        #[arg(required = true, num_args = 1..)]
        source: Vec<String>,
    },
    /// Move files to a new root code
    Recode {
        rootcode: String,
        #[arg(required = true, num_args = 1..)]
        source: Vec<PathBuf>,
    },
    /// Resolve root code collisions between session directories
    Fix {
        #[arg(required = true, num_args = 1..)]
        source: Vec<PathBuf>,
    },
    /// Extract the PostScript fringe plot
    Ps {
        source: PathBuf,
        /// Output path (default stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the control file used for fringing
    Cf {
        /// Stored text only, without a trailing newline
        #[arg(long)]
        verbatim: bool,
        /// Fringe file paths, `-` for stdin
        #[arg(default_value = "-")]
        source: Vec<String>,
    },
    /// Summarise fringe files as JSON
    Stat {
        #[arg(required = true, num_args = 1..)]
        source: Vec<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        _ => EnvFilter::new(level),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { one, source } => {
            let (ids, paths): (Vec<String>, Vec<String>) =
                source.into_iter().partition(|s| s.parse::<u16>().is_ok());
            let ids: Vec<u16> = ids.iter().filter_map(|s| s.parse().ok()).collect();
            let filter = if ids.is_empty() { None } else { Some(&ids[..]) };
            let collect = if one { Collect::First } else { Collect::Auto };
            let paths = if paths.is_empty() { vec!["-".to_owned()] } else { paths };

            let mut out: BTreeMap<String, RecordSet> = BTreeMap::new();
            for path in paths {
                let set = records(open_source(&path)?, filter, collect, false)?;
                out.insert(path, set);
            }
            let stdout = io::stdout();
            serde_json::to_writer_pretty(stdout.lock(), &out)?;
            println!();
        }

        // ── Recode ───────────────────────────────────────────────────────────
        Commands::Recode { rootcode, source } => {
            for path in &source {
                let new_path = recode(path, &rootcode)?;
                println!("{} -> {}", path.display(), new_path.display());
            }
        }

        // ── Fix ──────────────────────────────────────────────────────────────
        Commands::Fix { source } => {
            for r in recode_auto(&source)? {
                println!("{} -> {}", r.from.display(), r.to.display());
            }
        }

        // ── Ps ───────────────────────────────────────────────────────────────
        Commands::Ps { source, output } => {
            let set = records(BufReader::new(File::open(&source)?), Some(&[221][..]), Collect::First, true)?;
            let ps = match set.first(221) {
                Some(Record::Type221(r)) => r.plot()?,
                _                        => return Err(format!("{}: no plot record", source.display()).into()),
            };
            match output {
                Some(path) => std::fs::write(&path, &ps)?,
                None       => io::stdout().lock().write_all(&ps)?,
            }
        }

        // ── Cf ───────────────────────────────────────────────────────────────
        Commands::Cf { verbatim, source } => {
            let mut stdout = io::stdout().lock();
            for path in &source {
                let set = records(open_source(path)?, Some(&[222][..]), Collect::First, false)?;
                let Some(Record::Type222(r)) = set.first(222) else {
                    eprintln!("no cf record: {path}");
                    continue;
                };
                let cf = r.control_file();
                if verbatim || cf.ends_with('\n') {
                    stdout.write_all(cf.as_bytes())?;
                } else {
                    writeln!(stdout, "{cf}")?;
                }
            }
        }

        // ── Stat ─────────────────────────────────────────────────────────────
        Commands::Stat { source } => {
            let mut out = BTreeMap::new();
            for path in &source {
                let summary = FringeSummary::read(BufReader::new(File::open(path)?))?;
                out.insert(path.display().to_string(), summary);
            }
            serde_json::to_writer_pretty(io::stdout().lock(), &out)?;
            println!();
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// A file, or all of stdin for `-`.
fn open_source(path: &str) -> io::Result<Box<dyn Read>> {
    if path == "-" {
        let mut buf = Vec::new();
        io::stdin().lock().read_to_end(&mut buf)?;
        return Ok(Box::new(Cursor::new(buf)));
    }
    Ok(Box::new(BufReader::new(File::open(path)?)))
}
