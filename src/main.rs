use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keysort::analyzer::{self, AnalysisSettings};
use keysort::key::KeyMethod;
use keysort::organizer::{ConflictPolicy, OrganizeOptions};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keysort", version, about = "Sort a music library into folders by musical key")]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the key of every audio file and copy it into DEST/<key>/
    Organize {
        /// Music library to read (prompted for if omitted and not in config)
        source: Option<PathBuf>,

        /// Directory to create key folders in (prompted for if omitted and not in config)
        dest: Option<PathBuf>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Key estimation method (defaults to config, then "reference")
        #[arg(long, value_enum)]
        method: Option<KeyMethod>,

        /// Leave files that already exist in the destination untouched
        #[arg(long)]
        skip_existing: bool,

        /// Detect keys and show where files would go without copying
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the detected key of individual files
    Detect {
        /// Audio files to analyze
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Key estimation method (defaults to config, then "reference")
        #[arg(long, value_enum)]
        method: Option<KeyMethod>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = keysort::config::AppConfig::load();

    match cli.command {
        Commands::Organize {
            source,
            dest,
            jobs,
            method,
            skip_existing,
            dry_run,
        } => {
            // Resolve paths: CLI args > config > interactive prompt
            let source = match source.or_else(|| config.source_dir.clone()) {
                Some(p) => p,
                None => prompt_path("Enter the path to your music library: ")?,
            };
            let dest = match dest.or_else(|| config.dest_dir.clone()) {
                Some(p) => p,
                None => prompt_path("Enter the path where you want to store the sorted music: ")?,
            };

            if !source.exists() {
                anyhow::bail!(
                    "The specified music library path does not exist: {}",
                    source.display()
                );
            }
            if !source.is_dir() {
                anyhow::bail!(
                    "The specified music library path is not a directory: {}",
                    source.display()
                );
            }
            if !dest.exists() && !dry_run {
                println!(
                    "The specified sorted directory does not exist. Creating it now: {}",
                    dest.display()
                );
            }
            if dry_run {
                println!("DRY RUN — no files will be copied");
            }

            let options = OrganizeOptions {
                settings: AnalysisSettings {
                    method: method.unwrap_or(config.method),
                    chroma: config.chroma.clone(),
                },
                workers: if jobs > 0 { jobs } else { config.resolve_workers() },
                on_conflict: if skip_existing {
                    ConflictPolicy::Skip
                } else {
                    config.on_conflict
                },
                dry_run,
                show_progress: true,
            };

            let report = keysort::organizer::organize(&source, &dest, &options)
                .context("Organize failed")?;

            println!(
                "Organize complete: {} found, {} copied, {} already present, {} no key, {} failed",
                report.found,
                report.copied,
                report.skipped_existing,
                report.no_key,
                report.copy_failed
            );
            if !report.per_key.is_empty() {
                println!();
                println!("{:<4} {:>6}", "Key", "Files");
                for (key, count) in &report.per_key {
                    println!("{:<4} {:>6}", key.label(), count);
                }
            }
            if dry_run && report.copied > 0 {
                println!("(dry run — re-run without --dry-run to copy)");
            }
            if report.is_total_failure() {
                anyhow::bail!("None of the {} audio files could be organized", report.found);
            }
        }

        Commands::Detect { files, method } => {
            let settings = AnalysisSettings {
                method: method.unwrap_or(config.method),
                chroma: config.chroma.clone(),
            };

            let mut failed = 0usize;
            for path in &files {
                match analyzer::analyze_file(path, &settings) {
                    Ok(track) => println!(
                        "{}\t{}\t-> {}",
                        path.display(),
                        track.detected,
                        track.label
                    ),
                    Err(e) => {
                        eprintln!("{}\terror: {}", path.display(), e);
                        failed += 1;
                    }
                }
            }
            if failed == files.len() {
                anyhow::bail!("No key could be determined for any of the {} files", files.len());
            }
        }
    }

    Ok(())
}

/// Ask for a path on stdin; surrounding whitespace is trimmed.
fn prompt_path(message: &str) -> Result<PathBuf> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    let trimmed = line.trim();
    if read == 0 || trimmed.is_empty() {
        anyhow::bail!("No path entered");
    }
    Ok(PathBuf::from(trimmed))
}
