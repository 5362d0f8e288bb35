use crate::document::{empty_extraction, load_layout, process_entry, render_layout_png};
use crate::llm::{HeuristicSource, OllamaSource};
use crate::prelude::{eprintln, println, *};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use pdfse_core::heuristics::{
    partition_entries, plan_heuristic_tasks, Entry, Extraction, Heuristic, HeuristicTask,
    Heuristics,
};
use pdfse_core::prompt::{HeuristicRequest, LayoutSample};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, clap::Parser)]
pub struct ExtractOptions {
    /// Path to the dataset JSON file
    #[clap(long, short = 'd')]
    pub dataset: PathBuf,

    /// Path to save the results as JSON
    #[clap(long, short = 'o')]
    pub output: PathBuf,

    /// Number of sample PDFs sent to the model per label
    #[clap(long, short = 's', default_value = "3", value_parser = clap::value_parser!(u32).range(1..))]
    pub samples: u32,

    /// Ollama base URL
    #[clap(long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    /// Model name for heuristic generation
    #[clap(long, env = "PDFSE_MODEL", default_value = "qwen2.5-coder")]
    pub model: String,

    /// Documents extracted in parallel
    #[clap(long, env = "PDFSE_WORKERS", default_value = "4")]
    pub workers: usize,

    /// Send samples to the model as PNG renderings instead of text layouts
    #[clap(long, env = "PDFSE_IMAGE_MODE")]
    pub image_mode: bool,
}

/// One line of the output file.
#[derive(Debug, Serialize)]
pub struct ExtractionResult {
    pub label: String,
    pub pdf_path: String,
    pub extraction: Extraction,
}

/// Knobs of one extraction batch.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub samples: usize,
    pub workers: usize,
    /// Show samples to the source as rendered images.
    pub image_mode: bool,
    /// Where generated heuristics are persisted. `None` keeps them in memory.
    pub cache_path: Option<PathBuf>,
}

pub async fn run(options: ExtractOptions, global: crate::Global) -> Result<()> {
    let entries = crate::dataset::load_dataset(&options.dataset)?;
    println!(
        "{} Loaded {} entries from dataset",
        done_mark(),
        entries.len()
    );

    let cache_path = crate::cache::resolve_path(&global)?;
    let heuristics = crate::cache::load(&cache_path);

    if global.verbose {
        eprintln!("Cache: {}", cache_path.display());
        eprintln!("Ollama URL: {}", options.ollama_url);
        eprintln!("Model: {}", options.model);
        eprintln!("Image mode: {}", options.image_mode);
    }

    let source = OllamaSource::new(&options.ollama_url, &options.model)?;
    let settings = BatchSettings {
        samples: options.samples as usize,
        workers: options.workers,
        image_mode: options.image_mode,
        cache_path: Some(cache_path),
    };

    let (extractions, _) = run_batch(&entries, heuristics, &source, &settings).await;

    let base = crate::dataset::dataset_dir(&options.dataset);
    let results: Vec<ExtractionResult> = entries
        .iter()
        .zip(extractions)
        .map(|(entry, extraction)| ExtractionResult {
            label: entry.label.clone(),
            pdf_path: crate::dataset::relative_pdf_path(&entry.pdf_path, base),
            extraction,
        })
        .collect();

    let content = serde_json::to_string_pretty(&results)?;
    std::fs::write(&options.output, content)
        .with_context(|| f!("Failed to write results to {}", options.output.display()))?;

    println!(
        "{} Extraction complete. Results saved to {}",
        done_mark(),
        options.output.display()
    );

    Ok(())
}

/// Extract every entry, generating the heuristics the cache lacks.
///
/// Cached entries are extracted while the missing heuristics are fetched.
/// Fetched heuristics are merged into the cache (and persisted when anything
/// changed) before the remaining entries are extracted. Returns one
/// extraction per entry in dataset order, plus the updated cache.
pub async fn run_batch<S: HeuristicSource + ?Sized>(
    entries: &[Entry],
    mut heuristics: Heuristics,
    source: &S,
    settings: &BatchSettings,
) -> (Vec<Extraction>, Heuristics) {
    let (cached, pending) = partition_entries(entries, &heuristics);
    if pending.is_empty() {
        println!("{} All heuristics needed are cached!", done_mark());
    } else {
        println!("‧ Need heuristics for {} entries", pending.len());
    }

    let tasks = plan_heuristic_tasks(
        &pending,
        &heuristics,
        settings.samples,
        &mut rand::thread_rng(),
    );
    for task in &tasks {
        println!(
            "→ Label '{}': queuing {} fields for heuristic generation using {} PDF(s).",
            task.label,
            task.schema_to_fetch.len(),
            task.pdf_paths.len()
        );
    }

    let workers = Arc::new(Semaphore::new(settings.workers.max(1)));
    let mut results: Vec<Option<Extraction>> = vec![None; entries.len()];

    let (fetched, cached_results) = tokio::join!(
        fetch_missing_heuristics(source, tasks, settings.image_mode),
        process_entries(&cached, &heuristics, &workers, " (cache)"),
    );
    store(&mut results, cached_results);

    let mut changed = false;
    for (label, heuristic) in fetched {
        changed |= heuristics.merge(&label, heuristic);
    }
    if changed {
        if let Some(path) = &settings.cache_path {
            if crate::cache::save(path, &heuristics) {
                println!("{} Heuristic cache updated.", done_mark());
            }
        }
    }

    let pending_results = process_entries(&pending, &heuristics, &workers, "").await;
    store(&mut results, pending_results);

    let extractions = entries
        .iter()
        .zip(results)
        .map(|(entry, result)| {
            result.unwrap_or_else(|| empty_extraction(&entry.extraction_schema))
        })
        .collect();

    (extractions, heuristics)
}

fn store(results: &mut [Option<Extraction>], batch: Vec<(usize, Extraction)>) {
    for (id, extraction) in batch {
        match id.checked_sub(1).and_then(|index| results.get_mut(index)) {
            Some(slot) => *slot = Some(extraction),
            None => warn!("dropping extraction for unknown entry #{}", id),
        }
    }
}

/// Extract `entries` on the blocking pool, at most `workers` at a time.
async fn process_entries(
    entries: &[&Entry],
    heuristics: &Heuristics,
    workers: &Arc<Semaphore>,
    note: &str,
) -> Vec<(usize, Extraction)> {
    let jobs = entries.iter().map(|entry| {
        let entry = (*entry).clone();
        let heuristic = heuristics.get(&entry.label).cloned().unwrap_or_default();
        let workers = Arc::clone(workers);

        async move {
            let _permit = workers.acquire_owned().await.ok();
            let id = entry.id;
            let schema = entry.extraction_schema.clone();

            let extraction =
                match tokio::task::spawn_blocking(move || process_entry(&entry, &heuristic)).await
                {
                    Ok(extraction) => {
                        println!("{} Entry #{} executed{}", done_mark(), id, note);
                        extraction
                    }
                    Err(e) => {
                        eprintln!("{} Entry #{} failed: {}", fail_mark(), id, e);
                        empty_extraction(&schema)
                    }
                };

            (id, extraction)
        }
    });

    join_all(jobs).await
}

/// Fetch every planned heuristic concurrently. A failing label gets an empty
/// heuristic.
async fn fetch_missing_heuristics<S: HeuristicSource + ?Sized>(
    source: &S,
    tasks: Vec<HeuristicTask>,
    image_mode: bool,
) -> Vec<(String, Heuristic)> {
    if tasks.is_empty() {
        return Vec::new();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner.set_message(f!("Fetching {} new heuristics from LLM...", tasks.len()));

    let fetched = join_all(
        tasks
            .into_iter()
            .map(|task| fetch_for_task(source, task, image_mode)),
    )
    .await;

    spinner.finish_and_clear();
    fetched
}

async fn fetch_for_task<S: HeuristicSource + ?Sized>(
    source: &S,
    task: HeuristicTask,
    image_mode: bool,
) -> (String, Heuristic) {
    let HeuristicTask {
        label,
        schema_to_fetch,
        pdf_paths,
    } = task;

    let result = match load_samples(&pdf_paths, image_mode).await {
        Ok(samples) => {
            source
                .fetch(HeuristicRequest {
                    schema: schema_to_fetch,
                    samples,
                })
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(heuristic) => {
            info!("label {}: {} new trees", label, heuristic.len());
            (label, heuristic)
        }
        Err(e) => {
            eprintln!(
                "{} Error fetching heuristic for label {}: {}",
                fail_mark(),
                label,
                e
            );
            (label, Heuristic::new())
        }
    }
}

/// Read the sample documents off the async runtime, as text layouts or as
/// rendered PNGs.
async fn load_samples(paths: &[PathBuf], image_mode: bool) -> Result<Vec<LayoutSample>> {
    let jobs = paths.iter().cloned().map(|path| async move {
        let job = tokio::task::spawn_blocking(move || -> Result<LayoutSample> {
            let name = sample_name(&path);
            let layout = load_layout(&path)?;
            debug!("sample {}: {} words", name, layout.words.len());

            if image_mode {
                let png = render_layout_png(&path, &layout)?;
                Ok(LayoutSample::image(name, png))
            } else {
                Ok(LayoutSample::text(name, layout))
            }
        });

        match job.await {
            Ok(sample) => sample,
            Err(e) => Err(eyre!("sample task failed: {}", e)),
        }
    });

    join_all(jobs).await.into_iter().collect()
}

fn sample_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockSource;
    use crate::testing::write_pdf;
    use pdfse_core::heuristics::{heuristic_from_value, ExtractionSchema};
    use pdfse_core::prompt::SampleContent;
    use serde_json::json;
    use tempfile::TempDir;

    const TOTAL_TREE: &str = r#"{"total": [
        {"type": "command", "name": "anchor_to_text", "args": {"text": "total:"}},
        {"type": "command", "name": "move_right"},
        {"type": "command", "name": "collect"}
    ]}"#;

    const DATE_TREE: &str = r#"{"date": [
        {"type": "command", "name": "anchor_to_text", "args": {"text": "date:"}},
        {"type": "command", "name": "move_right"},
        {"type": "command", "name": "collect"}
    ]}"#;

    fn schema(fields: &[&str]) -> ExtractionSchema {
        fields
            .iter()
            .map(|f| (f.to_string(), f.to_string()))
            .collect()
    }

    fn entry(id: usize, label: &str, path: &Path, fields: &[&str]) -> Entry {
        Entry {
            id,
            label: label.into(),
            pdf_path: path.to_path_buf(),
            extraction_schema: schema(fields),
        }
    }

    fn settings(dir: &TempDir) -> BatchSettings {
        BatchSettings {
            samples: 3,
            workers: 2,
            image_mode: false,
            cache_path: Some(dir.path().join("cache.json")),
        }
    }

    fn value(extraction: &Extraction, field: &str) -> Option<String> {
        extraction.get(field).cloned().flatten()
    }

    #[tokio::test]
    async fn test_batch_uses_cache_without_fetching() {
        let dir = TempDir::new().unwrap();
        let pdf = write_pdf(dir.path(), "a.pdf", &[(50, 700, "Total: 10.00")]);
        let entries = vec![entry(1, "invoice", &pdf, &["total"])];

        let mut cache = Heuristics::new();
        cache.merge("invoice", heuristic_from_value(&serde_json::from_str(TOTAL_TREE).unwrap()));

        let source = MockSource::default();
        let settings = settings(&dir);
        let (extractions, updated) = run_batch(&entries, cache.clone(), &source, &settings).await;

        assert_eq!(value(&extractions[0], "total").as_deref(), Some("10.00"));
        assert!(source.requests.lock().unwrap().is_empty());
        assert_eq!(updated, cache);
        // Nothing new, nothing written.
        assert!(!dir.path().join("cache.json").exists());
    }

    #[tokio::test]
    async fn test_batch_fetches_missing_fields_and_persists() {
        let dir = TempDir::new().unwrap();
        let a = write_pdf(
            dir.path(),
            "a.pdf",
            &[(50, 700, "Total: 10.00"), (50, 650, "Date: 2024-01-02")],
        );
        let b = write_pdf(
            dir.path(),
            "b.pdf",
            &[(50, 700, "Total: 20.00"), (50, 650, "Date: 2024-03-04")],
        );

        let entries = vec![
            entry(1, "invoice", &a, &["total", "date"]),
            entry(2, "invoice", &b, &["total", "date"]),
            entry(3, "invoice", &a, &["total"]),
        ];

        // `total` is cached; only `date` is missing for the label.
        let mut cache = Heuristics::new();
        cache.merge("invoice", heuristic_from_value(&serde_json::from_str(TOTAL_TREE).unwrap()));

        let source = MockSource::default().respond("date", DATE_TREE);
        let settings = settings(&dir);
        let (extractions, updated) = run_batch(&entries, cache, &source, &settings).await;

        let requests = source.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].schema, schema(&["date"]));
        assert_eq!(requests[0].samples.len(), 2);

        assert_eq!(value(&extractions[0], "date").as_deref(), Some("2024-01-02"));
        assert_eq!(value(&extractions[1], "total").as_deref(), Some("20.00"));
        assert_eq!(value(&extractions[1], "date").as_deref(), Some("2024-03-04"));
        assert_eq!(extractions[2].len(), 1);
        assert_eq!(value(&extractions[2], "total").as_deref(), Some("10.00"));

        let invoice = updated.get("invoice").unwrap();
        assert!(invoice.contains_key("total") && invoice.contains_key("date"));
        assert_eq!(crate::cache::load(&dir.path().join("cache.json")), updated);
    }

    #[tokio::test]
    async fn test_fetch_for_task_text_mode() {
        let dir = TempDir::new().unwrap();
        let pdf = write_pdf(dir.path(), "a.pdf", &[(50, 700, "Total: 10.00")]);
        let task = HeuristicTask {
            label: "invoice".into(),
            schema_to_fetch: schema(&["total"]),
            pdf_paths: vec![pdf],
        };

        let source = MockSource::default().respond("total", TOTAL_TREE);
        let (label, heuristic) = fetch_for_task(&source, task, false).await;

        assert_eq!(label, "invoice");
        assert!(heuristic.contains_key("total"));
        let requests = source.requests.lock().unwrap();
        assert_eq!(requests[0].schema, schema(&["total"]));
        assert_eq!(requests[0].samples[0].name, "a.pdf");
        match &requests[0].samples[0].content {
            SampleContent::Layout(layout) => {
                let words: Vec<&str> = layout.words.iter().map(|w| w.text.as_str()).collect();
                assert_eq!(words, vec!["Total:", "10.00"]);
            }
            other => panic!("expected a text layout, got {:?}", other),
        }
        assert!(requests[0].images().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_for_task_image_mode() {
        let dir = TempDir::new().unwrap();
        let pdf = write_pdf(dir.path(), "a.pdf", &[(50, 700, "Total: 10.00")]);
        let task = HeuristicTask {
            label: "invoice".into(),
            schema_to_fetch: schema(&["total"]),
            pdf_paths: vec![pdf],
        };

        let source = MockSource::default().respond("total", TOTAL_TREE);
        let (label, heuristic) = fetch_for_task(&source, task, true).await;

        assert_eq!(label, "invoice");
        assert!(heuristic.contains_key("total"));
        let requests = source.requests.lock().unwrap();
        let images = requests[0].images();
        assert_eq!(images.len(), 1);
        assert!(images[0].starts_with(&[0x89, b'P', b'N', b'G']));
        assert!(matches!(requests[0].samples[0].content, SampleContent::Image(_)));
    }

    #[tokio::test]
    async fn test_fetch_for_task_failure_yields_empty_heuristic() {
        let dir = TempDir::new().unwrap();
        let task = HeuristicTask {
            label: "invoice".into(),
            schema_to_fetch: schema(&["total"]),
            pdf_paths: vec![dir.path().join("missing.pdf")],
        };

        let source = MockSource::default().respond("total", TOTAL_TREE);
        let (label, heuristic) = fetch_for_task(&source, task, true).await;

        assert_eq!(label, "invoice");
        assert!(heuristic.is_empty());
        assert!(source.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_is_isolated_to_its_label() {
        let dir = TempDir::new().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", &[(50, 700, "Total: 10.00")]);
        let b = write_pdf(dir.path(), "b.pdf", &[(50, 700, "Date: 2024-01-02")]);

        let entries = vec![
            entry(1, "invoice", &a, &["total"]),
            entry(2, "receipt", &b, &["date"]),
        ];

        let source = MockSource::default()
            .fail("total", "model offline")
            .respond("date", DATE_TREE);
        let settings = settings(&dir);
        let (extractions, updated) =
            run_batch(&entries, Heuristics::new(), &source, &settings).await;

        assert_eq!(value(&extractions[0], "total"), None);
        assert_eq!(extractions[0].len(), 1);
        assert_eq!(value(&extractions[1], "date").as_deref(), Some("2024-01-02"));
        assert!(updated.get("invoice").is_none());
        assert!(updated.get("receipt").is_some());
    }

    #[tokio::test]
    async fn test_unreadable_sample_fails_only_its_label() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.pdf");
        let entries = vec![entry(1, "invoice", &missing, &["total"])];

        let source = MockSource::default().respond("total", TOTAL_TREE);
        let settings = settings(&dir);
        let (extractions, updated) =
            run_batch(&entries, Heuristics::new(), &source, &settings).await;

        assert!(source.requests.lock().unwrap().is_empty());
        assert_eq!(extractions, vec![empty_extraction(&schema(&["total"]))]);
        assert!(updated.is_empty());
    }

    #[tokio::test]
    async fn test_results_follow_dataset_order() {
        let dir = TempDir::new().unwrap();
        let cached = write_pdf(dir.path(), "cached.pdf", &[(50, 700, "Total: 1.00")]);
        let fresh = write_pdf(dir.path(), "fresh.pdf", &[(50, 700, "Date: 2020-01-01")]);

        // The uncached entry comes first but is extracted last.
        let entries = vec![
            entry(1, "receipt", &fresh, &["date"]),
            entry(2, "invoice", &cached, &["total"]),
        ];

        let mut cache = Heuristics::new();
        cache.merge("invoice", heuristic_from_value(&serde_json::from_str(TOTAL_TREE).unwrap()));

        let source = MockSource::default().respond("date", DATE_TREE);
        let settings = BatchSettings {
            cache_path: None,
            ..settings(&dir)
        };
        let (extractions, _) = run_batch(&entries, cache, &source, &settings).await;

        assert_eq!(value(&extractions[0], "date").as_deref(), Some("2020-01-01"));
        assert_eq!(value(&extractions[1], "total").as_deref(), Some("1.00"));
        assert!(!dir.path().join("cache.json").exists());
    }

    #[test]
    fn test_extraction_result_shape() {
        let result = ExtractionResult {
            label: "invoice".into(),
            pdf_path: "files/a.pdf".into(),
            extraction: [("total".to_string(), None)].into_iter().collect(),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"label": "invoice", "pdf_path": "files/a.pdf", "extraction": {"total": null}})
        );
    }
}
