use std::path::Path;
use std::time::{Duration, Instant};

use ffindex_core::{DiskIndex, Index, IndexConfig, Mode, StorageDtype};

use crate::bench_utils::{
    bench_root, cleanup, corpus_entries, read_usize_env_with_min, summarize_ms,
};

const DEFAULT_DIMENSION: usize = 128;
const DEFAULT_DOCUMENTS: usize = 2_000;
const DEFAULT_PASSAGES_PER_DOC: usize = 8;
const DEFAULT_APPEND_BATCH: usize = 512;
const DEFAULT_INITIAL_CAPACITY: usize = 1_024;
const DEFAULT_RESIZE_INCREMENT: usize = 1_024;
const DEFAULT_LOOKUP_IDS: usize = 64;
const DEFAULT_WARMUP_RUNS: usize = 1;
const DEFAULT_MEASURED_RUNS: usize = 5;

#[derive(Clone, Copy)]
struct StoreBenchConfig {
    dimension: usize,
    documents: usize,
    passages_per_doc: usize,
    append_batch: usize,
    initial_capacity: usize,
    resize_increment: usize,
    lookup_ids: usize,
    half_precision: bool,
    warmup_runs: usize,
    measured_runs: usize,
}

impl StoreBenchConfig {
    fn vectors(&self) -> usize {
        self.documents * self.passages_per_doc
    }

    fn dtype(&self) -> StorageDtype {
        if self.half_precision {
            StorageDtype::F16
        } else {
            StorageDtype::F32
        }
    }
}

fn load_config() -> StoreBenchConfig {
    StoreBenchConfig {
        dimension: read_usize_env_with_min("FFINDEX_BENCH_DIMENSION", DEFAULT_DIMENSION, 1),
        documents: read_usize_env_with_min("FFINDEX_BENCH_DOCUMENTS", DEFAULT_DOCUMENTS, 1),
        passages_per_doc: read_usize_env_with_min(
            "FFINDEX_BENCH_PASSAGES_PER_DOC",
            DEFAULT_PASSAGES_PER_DOC,
            1,
        ),
        append_batch: read_usize_env_with_min("FFINDEX_BENCH_APPEND_BATCH", DEFAULT_APPEND_BATCH, 1),
        initial_capacity: read_usize_env_with_min(
            "FFINDEX_BENCH_INITIAL_CAPACITY",
            DEFAULT_INITIAL_CAPACITY,
            0,
        ),
        resize_increment: read_usize_env_with_min(
            "FFINDEX_BENCH_RESIZE_INCREMENT",
            DEFAULT_RESIZE_INCREMENT,
            1,
        ),
        lookup_ids: read_usize_env_with_min("FFINDEX_BENCH_LOOKUP_IDS", DEFAULT_LOOKUP_IDS, 1),
        half_precision: read_usize_env_with_min("FFINDEX_BENCH_HALF_PRECISION", 0, 0) == 1,
        warmup_runs: read_usize_env_with_min("FFINDEX_BENCH_WARMUP_RUNS", DEFAULT_WARMUP_RUNS, 0),
        measured_runs: read_usize_env_with_min(
            "FFINDEX_BENCH_MEASURED_RUNS",
            DEFAULT_MEASURED_RUNS,
            1,
        ),
    }
}

fn index_config(config: &StoreBenchConfig) -> Option<IndexConfig> {
    match IndexConfig::new(config.dimension) {
        Ok(value) => Some(
            value
                .with_dtype(config.dtype())
                .with_initial_capacity(config.initial_capacity)
                .with_resize_increment(config.resize_increment),
        ),
        Err(error) => {
            eprintln!("error=index_config_failed detail=\"{error}\"");
            None
        }
    }
}

/// Fills a fresh store batch by batch and times it.
fn fill_store(path: &Path, config: &StoreBenchConfig) -> Option<(Duration, usize, DiskIndex)> {
    let index_config = index_config(config)?;
    let entries = corpus_entries(config.documents, config.passages_per_doc, config.dimension);

    let started_at = Instant::now();
    let mut index = match DiskIndex::create(path, &index_config) {
        Ok(value) => value,
        Err(error) => {
            eprintln!("error=store_create_failed detail=\"{error}\"");
            return None;
        }
    };
    for batch in entries.chunks(config.append_batch) {
        if let Err(error) = index.append(batch) {
            eprintln!("error=store_append_failed detail=\"{error}\"");
            return None;
        }
    }
    let elapsed = started_at.elapsed();
    let capacity = index.capacity();
    Some((elapsed, capacity, index))
}

pub(crate) fn run_append_bench(mode: &str) -> bool {
    let config = load_config();
    let root = bench_root("append");

    let ok = run_append_rounds(mode, &config, &root);
    cleanup(&root);
    ok
}

fn run_append_rounds(mode: &str, config: &StoreBenchConfig, root: &Path) -> bool {
    let mut round = 0usize;
    let mut next_path = || {
        round += 1;
        root.join(format!("append_{round}.ffv"))
    };

    for _ in 0..config.warmup_runs {
        if fill_store(&next_path(), config).is_none() {
            return false;
        }
    }

    let mut elapsed_ms = Vec::with_capacity(config.measured_runs);
    let mut total = Duration::from_secs(0);
    let mut final_capacity = 0usize;
    for _ in 0..config.measured_runs {
        let Some((elapsed, capacity, _index)) = fill_store(&next_path(), config) else {
            return false;
        };
        elapsed_ms.push(elapsed.as_secs_f64() * 1_000.0);
        total += elapsed;
        final_capacity = capacity;
    }

    let (p50_ms, p95_ms, avg_ms) = summarize_ms(&elapsed_ms);
    let vectors_per_sec =
        (config.measured_runs * config.vectors()) as f64 / total.as_secs_f64().max(f64::EPSILON);

    println!(
        "bench=store_append mode={mode} dtype={} vectors={} dimension={} append_batch={} initial_capacity={} resize_increment={} final_capacity={final_capacity} warmup_runs={} measured_runs={} p50_ms={p50_ms:.3} p95_ms={p95_ms:.3} avg_ms={avg_ms:.3} vectors_per_sec={vectors_per_sec:.2}",
        config.dtype(),
        config.vectors(),
        config.dimension,
        config.append_batch,
        config.initial_capacity,
        config.resize_increment,
        config.warmup_runs,
        config.measured_runs
    );
    true
}

pub(crate) fn run_get_bench(mode: &str) -> bool {
    let config = load_config();
    let root = bench_root("get");

    let ok = run_get_rounds(mode, &config, &root);
    cleanup(&root);
    ok
}

fn run_get_rounds(mode: &str, config: &StoreBenchConfig, root: &Path) -> bool {
    let Some((_, _, index)) = fill_store(&root.join("get.ffv"), config) else {
        return false;
    };

    let lookups = config.lookup_ids.min(config.documents);
    let stride = (config.documents / lookups).max(1);
    let doc_ids: Vec<String> = (0..lookups).map(|n| format!("d{}", n * stride)).collect();
    let psg_ids: Vec<String> = (0..lookups)
        .map(|n| format!("d{}_p{}", n * stride, n % config.passages_per_doc))
        .collect();

    for retrieval_mode in [Mode::Passage, Mode::FirstP, Mode::MaxP, Mode::AveP] {
        let ids = if retrieval_mode == Mode::Passage {
            &psg_ids
        } else {
            &doc_ids
        };
        let requested: Vec<&str> = ids.iter().map(String::as_str).collect();

        for _ in 0..config.warmup_runs {
            if lookup_once(&index, &requested, retrieval_mode).is_none() {
                return false;
            }
        }

        let mut elapsed_ms = Vec::with_capacity(config.measured_runs);
        let mut total = Duration::from_secs(0);
        let mut vectors = 0usize;
        for _ in 0..config.measured_runs {
            let Some((elapsed, returned)) = lookup_once(&index, &requested, retrieval_mode) else {
                return false;
            };
            elapsed_ms.push(elapsed.as_secs_f64() * 1_000.0);
            total += elapsed;
            vectors = returned;
        }

        let (p50_ms, p95_ms, avg_ms) = summarize_ms(&elapsed_ms);
        let ids_per_sec = (config.measured_runs * requested.len()) as f64
            / total.as_secs_f64().max(f64::EPSILON);

        println!(
            "bench=store_get mode={mode} retrieval_mode={retrieval_mode} dtype={} stored={} dimension={} ids={} vectors={vectors} measured_runs={} p50_ms={p50_ms:.3} p95_ms={p95_ms:.3} avg_ms={avg_ms:.3} ids_per_sec={ids_per_sec:.2}",
            config.dtype(),
            index.len(),
            config.dimension,
            requested.len(),
            config.measured_runs
        );
    }
    true
}

fn lookup_once(index: &DiskIndex, ids: &[&str], mode: Mode) -> Option<(Duration, usize)> {
    let started_at = Instant::now();
    let retrieved = match index.get_vectors(ids, mode) {
        Ok(value) => value,
        Err(error) => {
            eprintln!("error=store_get_failed detail=\"{error}\"");
            return None;
        }
    };
    let elapsed = started_at.elapsed();

    if !retrieved.is_fully_resolved() {
        eprintln!(
            "error=store_get_unresolved ids=\"{}\"",
            retrieved.unresolved.join(",")
        );
        return None;
    }
    Some((elapsed, retrieved.vectors.len()))
}
