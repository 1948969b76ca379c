use crate::SUPPORTED_EXTENSIONS;
use crate::analyzer::{self, AnalysisSettings};
use crate::key::PitchClass;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum OrganizeError {
    #[error("The specified music library path does not exist: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("The specified music library path is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    #[error("Cannot create destination {path:?}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// What to do when the destination file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Replace the existing file.
    #[default]
    Overwrite,
    /// Leave the existing file alone and count the source as skipped.
    Skip,
}

#[derive(Debug, Clone)]
pub struct OrganizeOptions {
    pub settings: AnalysisSettings,
    /// Detection workers; values below 1 are treated as 1.
    pub workers: usize,
    pub on_conflict: ConflictPolicy,
    /// Detect keys and report destinations without writing anything.
    pub dry_run: bool,
    pub show_progress: bool,
}

impl Default for OrganizeOptions {
    fn default() -> Self {
        Self {
            settings: AnalysisSettings::default(),
            workers: 1,
            on_conflict: ConflictPolicy::default(),
            dry_run: false,
            show_progress: false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct OrganizeReport {
    /// Audio files found under the source root.
    pub found: u64,
    /// Files copied (or, in a dry run, that would be copied).
    pub copied: u64,
    /// Files left alone because the destination already existed.
    pub skipped_existing: u64,
    /// Files for which no key could be determined.
    pub no_key: u64,
    /// Files whose key folder or copy could not be written.
    pub copy_failed: u64,
    /// Copied files per key folder.
    pub per_key: BTreeMap<PitchClass, u64>,
}

impl OrganizeReport {
    /// Files were found but not a single one ended up organized.
    pub fn is_total_failure(&self) -> bool {
        self.found > 0 && self.copied + self.skipped_existing == 0
    }
}

enum Placement {
    Copied(PathBuf),
    Planned(PathBuf),
    Exists(PathBuf),
}

/// True if the file's final extension is one of the supported audio types.
pub fn is_supported_audio(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Recursively collect supported audio files under `root`, sorted by path.
///
/// `exclude` (typically the destination root) is not descended into. It is
/// matched after resolving `..`, relative spellings and symlinks, so a
/// destination nested inside the library is skipped however it was typed.
pub fn collect_audio_files(root: &Path, exclude: Option<&Path>) -> Vec<PathBuf> {
    let exclude = exclude.and_then(|x| fs::canonicalize(x).ok());
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || exclude.as_deref().is_none_or(|x| !resolves_to(e.path(), x))
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_supported_audio(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Sort every audio file under `source` into `dest/<key>/`.
pub fn organize(
    source: &Path,
    dest: &Path,
    options: &OrganizeOptions,
) -> Result<OrganizeReport, OrganizeError> {
    let settings = &options.settings;
    organize_with(source, dest, options, |path| {
        analyzer::canonical_key(path, settings)
    })
}

/// Like [`organize`], with the key detector supplied by the caller.
///
/// `detect` returns `None` when no key could be determined; such files are
/// skipped. Detection runs in parallel chunks; copies within a chunk happen in
/// enumeration order.
pub fn organize_with<F>(
    source: &Path,
    dest: &Path,
    options: &OrganizeOptions,
    detect: F,
) -> Result<OrganizeReport, OrganizeError>
where
    F: Fn(&Path) -> Option<PitchClass> + Sync,
{
    if !source.exists() {
        return Err(OrganizeError::SourceMissing(source.to_path_buf()));
    }
    if !source.is_dir() {
        return Err(OrganizeError::SourceNotDirectory(source.to_path_buf()));
    }

    if !options.dry_run && !dest.exists() {
        log::info!("Creating destination directory {}", dest.display());
        fs::create_dir_all(dest).map_err(|e| OrganizeError::Destination {
            path: dest.to_path_buf(),
            source: e,
        })?;
    }

    let files = collect_audio_files(source, Some(dest));
    let mut report = OrganizeReport {
        found: files.len() as u64,
        ..OrganizeReport::default()
    };

    if files.is_empty() {
        log::info!("No audio files found under {}", source.display());
        return Ok(report);
    }

    let workers = options.workers.max(1);
    log::info!("Organizing {} files with {} workers", files.len(), workers);

    let pb = progress_bar(report.found, options.show_progress);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;

    // Detect a chunk in parallel, then copy it; keeps collisions deterministic.
    for chunk in files.chunks(workers * 2) {
        let keys: Vec<Option<PitchClass>> = pool.install(|| {
            chunk
                .par_iter()
                .map(|path| {
                    let key = detect(path.as_path());
                    pb.inc(1);
                    key
                })
                .collect()
        });

        for (path, key) in chunk.iter().zip(keys) {
            let Some(label) = key else {
                log::warn!("No key found for {}, skipping.", path.display());
                report.no_key += 1;
                continue;
            };

            match place_file(path, dest, label, options) {
                Ok(Placement::Copied(target)) => {
                    log::info!("Copied: {} to {}", path.display(), target.display());
                    report.copied += 1;
                    *report.per_key.entry(label).or_default() += 1;
                }
                Ok(Placement::Planned(target)) => {
                    log::info!("Would copy: {} to {}", path.display(), target.display());
                    report.copied += 1;
                    *report.per_key.entry(label).or_default() += 1;
                }
                Ok(Placement::Exists(target)) => {
                    log::info!("Skipping {}: {} already exists", path.display(), target.display());
                    report.skipped_existing += 1;
                }
                Err(e) => {
                    log::error!("Failed to copy {} into {}: {}", path.display(), label, e);
                    report.copy_failed += 1;
                }
            }
        }

        pb.set_message(format!(
            "{} copied, {} no key, {} failed",
            report.copied, report.no_key, report.copy_failed
        ));
    }

    pb.finish_with_message(format!(
        "Done: {} copied, {} existing, {} no key, {} failed",
        report.copied, report.skipped_existing, report.no_key, report.copy_failed
    ));

    Ok(report)
}

fn place_file(
    source: &Path,
    dest_root: &Path,
    label: PitchClass,
    options: &OrganizeOptions,
) -> io::Result<Placement> {
    let file_name = source
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let key_dir = dest_root.join(label.label());
    let target = key_dir.join(file_name);

    if options.on_conflict == ConflictPolicy::Skip && target.exists() {
        return Ok(Placement::Exists(target));
    }
    if options.dry_run {
        return Ok(Placement::Planned(target));
    }
    // fs::copy truncates the target before reading the source
    if target.exists() && resolves_to(source, &fs::canonicalize(&target)?) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is already in place", source.display()),
        ));
    }

    fs::create_dir_all(&key_dir)?;
    copy_preserving(source, &target)?;
    Ok(Placement::Copied(target))
}

/// True if `path` resolves to the already-canonical `target`.
fn resolves_to(path: &Path, target: &Path) -> bool {
    fs::canonicalize(path).is_ok_and(|p| p == target)
}

/// Copy a file, keeping its permissions and access/modification times.
pub fn copy_preserving(source: &Path, target: &Path) -> io::Result<u64> {
    // Taken before the copy, which may bump the source's access time
    let meta = fs::metadata(source)?;
    // fs::copy already carries the permission bits over
    let bytes = fs::copy(source, target)?;

    let mut times = FileTimes::new().set_modified(meta.modified()?);
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }

    // Read-only copies can still have their times set through a read handle on unix
    let file = match File::options().write(true).open(target) {
        Ok(f) => f,
        Err(_) => File::open(target)?,
    };
    file.set_times(times)?;
    Ok(bytes)
}

fn progress_bar(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    pb.set_message("Processing files...");
    pb
}
