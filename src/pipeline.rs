use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::downloader::{FetchError, Fetcher};
use crate::output::{project_name, Project};
use crate::parser::{self, Parsed};
use crate::settings::Settings;

pub const URL_LIST: &str = "urls.txt";
const FALLBACK_NAME: &str = "output";

/// Counts returned after a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

impl RunStats {
    fn record<T>(&mut self, label: &str, result: &Result<T>) {
        self.total += 1;
        match result {
            Ok(_) => self.ok += 1,
            Err(e) => {
                self.errors += 1;
                warn!("Failed to process {}: {:#}", label, e);
            }
        }
    }

    fn merge(self, other: RunStats) -> RunStats {
        RunStats {
            total: self.total + other.total,
            ok: self.ok + other.ok,
            errors: self.errors + other.errors,
        }
    }
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

/// URLs from a list file: one per line, blanks and `#` comments skipped.
pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// `*.md` files directly inside `dir`, sorted by name.
pub fn list_markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Convert one Markdown file and move it into its project directory.
pub fn process_file(path: &Path, processed_dir: &Path) -> Result<PathBuf> {
    let parsed = parser::parse_file(path)?;
    write_file(path, &parsed, processed_dir)
}

fn file_project_name(path: &Path, parsed: &Parsed) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());
    project_name(parsed, &stem)
}

fn write_file(path: &Path, parsed: &Parsed, processed_dir: &Path) -> Result<PathBuf> {
    let project = Project::create(processed_dir, file_project_name(path, parsed))?;
    project.write(parsed)?;
    project.adopt_source(path)?;

    info!("Processed file: {} -> {}", path.display(), project.dir.display());
    Ok(project.dir)
}

fn write_page(url: &str, parsed: &Parsed, processed_dir: &Path) -> Result<PathBuf> {
    let project = Project::create(processed_dir, project_name(parsed, FALLBACK_NAME))?;
    project.write(parsed)?;

    info!("Processed URL: {} -> {}", url, project.dir.display());
    Ok(project.dir)
}

/// Convert already-fetched page HTML.
pub fn convert_page(url: &str, html: &str, processed_dir: &Path) -> Result<PathBuf> {
    write_page(url, &parser::parse_html(html, url), processed_dir)
}

pub async fn process_url(fetcher: &Fetcher, url: &str, processed_dir: &Path) -> Result<PathBuf> {
    let parsed = fetcher.parse_url(url).await?;
    write_page(url, &parsed, processed_dir)
}

/// Convert Markdown files in parallel; failures are logged and counted.
///
/// Files that map to the same project are written one after another in
/// list order, so the last of them wins.
pub fn process_files(files: &[PathBuf], processed_dir: &Path) -> Result<RunStats> {
    let pb = progress_bar(files.len())?;
    pb.set_message("files");

    let parsed: Vec<_> = files
        .par_iter()
        .map(|path| (path, parser::parse_file(path)))
        .collect();

    let mut results: Vec<(&PathBuf, Result<PathBuf>)> = Vec::with_capacity(files.len());
    let mut projects: BTreeMap<String, Vec<(&PathBuf, Parsed)>> = BTreeMap::new();
    for (path, parsed) in parsed {
        match parsed {
            Ok(parsed) => projects
                .entry(file_project_name(path, &parsed))
                .or_default()
                .push((path, parsed)),
            Err(e) => {
                pb.inc(1);
                results.push((path, Err(e.into())));
            }
        }
    }

    let written: Vec<Vec<_>> = projects
        .into_par_iter()
        .map(|(_, group)| {
            group
                .into_iter()
                .map(|(path, parsed)| {
                    let result = write_file(path, &parsed, processed_dir);
                    pb.inc(1);
                    (path, result)
                })
                .collect()
        })
        .collect();
    pb.finish_and_clear();
    results.extend(written.into_iter().flatten());

    let mut stats = RunStats::default();
    for (path, result) in &results {
        stats.record(&path.display().to_string(), result);
    }
    Ok(stats)
}

/// Fetch pages concurrently and convert each one as it arrives.
pub async fn process_urls(
    fetcher: Arc<Fetcher>,
    urls: Vec<String>,
    processed_dir: &Path,
    concurrency: usize,
) -> Result<RunStats> {
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let pb = progress_bar(urls.len())?;
    pb.set_message("pages");

    // Workers fetch, this loop parses and writes.
    let (tx, mut rx) =
        tokio::sync::mpsc::channel::<(String, Result<String, FetchError>)>(concurrency * 2);

    for url in urls {
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let fetched = fetcher.fetch(&url).await;
            let _ = tx.send((url, fetched)).await;
        });
    }
    drop(tx);

    let mut stats = RunStats::default();
    while let Some((url, fetched)) = rx.recv().await {
        let result = fetched
            .map_err(anyhow::Error::from)
            .and_then(|html| convert_page(&url, &html, processed_dir));
        stats.record(&url, &result);
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(stats)
}

/// Batch over an input directory: `urls.txt` first, then every `*.md`.
pub async fn process_dir(settings: &Settings) -> Result<RunStats> {
    let input_dir = &settings.input_dir;
    if !input_dir.is_dir() {
        bail!("Input directory {} does not exist.", input_dir.display());
    }
    std::fs::create_dir_all(&settings.processed_dir)
        .with_context(|| format!("Failed to create {}", settings.processed_dir.display()))?;

    let mut stats = RunStats::default();

    let url_list = input_dir.join(URL_LIST);
    if url_list.is_file() {
        let urls = read_url_list(&url_list)?;
        info!("Processing {} ({} URLs)", URL_LIST, urls.len());
        let fetcher = Arc::new(Fetcher::new(settings)?);
        let url_stats =
            process_urls(fetcher, urls, &settings.processed_dir, settings.concurrency).await?;
        stats = stats.merge(url_stats);
    }

    let files = list_markdown_files(input_dir)?;
    info!("Processing {} Markdown files", files.len());
    stats = stats.merge(process_files(&files, &settings.processed_dir)?);

    Ok(stats)
}
