use std::path::Path;
use std::time::{Duration, Instant};

use ffindex_core::{
    CoalesceReport, Coalescer, DiskIndex, InMemoryIndex, Index, IndexConfig,
};

use crate::bench_utils::{
    bench_root, cleanup, corpus_entries, read_f32_env_with_min, read_usize_env_with_min,
    summarize_ms,
};

const DEFAULT_DIMENSION: usize = 128;
const DEFAULT_DOCUMENTS: usize = 1_000;
const DEFAULT_PASSAGES_PER_DOC: usize = 16;
const DEFAULT_DELTA: f32 = 0.001;
const DEFAULT_WARMUP_RUNS: usize = 1;
const DEFAULT_MEASURED_RUNS: usize = 5;

#[derive(Clone, Copy)]
struct CoalesceBenchConfig {
    dimension: usize,
    documents: usize,
    passages_per_doc: usize,
    delta: f32,
    batch_size: usize,
    disk_target: bool,
    warmup_runs: usize,
    measured_runs: usize,
}

fn load_config() -> CoalesceBenchConfig {
    CoalesceBenchConfig {
        dimension: read_usize_env_with_min("FFINDEX_BENCH_DIMENSION", DEFAULT_DIMENSION, 1),
        documents: read_usize_env_with_min("FFINDEX_BENCH_DOCUMENTS", DEFAULT_DOCUMENTS, 1),
        passages_per_doc: read_usize_env_with_min(
            "FFINDEX_BENCH_PASSAGES_PER_DOC",
            DEFAULT_PASSAGES_PER_DOC,
            1,
        ),
        delta: read_f32_env_with_min("FFINDEX_BENCH_DELTA", DEFAULT_DELTA, 0.0),
        // 0 means one flush at the end.
        batch_size: read_usize_env_with_min("FFINDEX_BENCH_COALESCE_BATCH", 0, 0),
        disk_target: read_usize_env_with_min("FFINDEX_BENCH_DISK_TARGET", 0, 0) == 1,
        warmup_runs: read_usize_env_with_min("FFINDEX_BENCH_WARMUP_RUNS", DEFAULT_WARMUP_RUNS, 0),
        measured_runs: read_usize_env_with_min(
            "FFINDEX_BENCH_MEASURED_RUNS",
            DEFAULT_MEASURED_RUNS,
            1,
        ),
    }
}

pub(crate) fn run_coalesce_bench(mode: &str) -> bool {
    let config = load_config();
    let root = bench_root("coalesce");

    let ok = run_coalesce_rounds(mode, &config, &root);
    cleanup(&root);
    ok
}

fn run_coalesce_rounds(mode: &str, config: &CoalesceBenchConfig, root: &Path) -> bool {
    let index_config = match IndexConfig::new(config.dimension) {
        Ok(value) => value,
        Err(error) => {
            eprintln!("error=index_config_failed detail=\"{error}\"");
            return false;
        }
    };
    let Some(source) = build_source(&root.join("source.ffv"), &index_config, config) else {
        return false;
    };

    let mut round = 0usize;
    let mut run_once = || {
        round += 1;
        coalesce_once(&source, &index_config, config, &root.join(format!("target_{round}.ffv")))
    };

    for _ in 0..config.warmup_runs {
        if run_once().is_none() {
            return false;
        }
    }

    let mut elapsed_ms = Vec::with_capacity(config.measured_runs);
    let mut total = Duration::from_secs(0);
    let mut last_report = CoalesceReport::default();
    for _ in 0..config.measured_runs {
        let Some((elapsed, report)) = run_once() else {
            return false;
        };
        elapsed_ms.push(elapsed.as_secs_f64() * 1_000.0);
        total += elapsed;
        last_report = report;
    }

    let (p50_ms, p95_ms, avg_ms) = summarize_ms(&elapsed_ms);
    let input_vectors = last_report.input_vectors.max(1);
    let vectors_per_sec = (config.measured_runs * last_report.input_vectors) as f64
        / total.as_secs_f64().max(f64::EPSILON);
    let compression_ratio = last_report.output_vectors as f64 / input_vectors as f64;
    let target = if config.disk_target { "disk" } else { "memory" };

    println!(
        "bench=coalesce mode={mode} target={target} documents={} input_vectors={} output_vectors={} flushes={} dimension={} delta={} warmup_runs={} measured_runs={} p50_ms={p50_ms:.3} p95_ms={p95_ms:.3} avg_ms={avg_ms:.3} vectors_per_sec={vectors_per_sec:.2} compression_ratio={compression_ratio:.4}",
        last_report.documents,
        last_report.input_vectors,
        last_report.output_vectors,
        last_report.flushes,
        config.dimension,
        config.delta,
        config.warmup_runs,
        config.measured_runs
    );
    true
}

fn build_source(
    path: &Path,
    index_config: &IndexConfig,
    config: &CoalesceBenchConfig,
) -> Option<DiskIndex> {
    let entries = corpus_entries(config.documents, config.passages_per_doc, config.dimension);
    let source_config = index_config.clone().with_initial_capacity(entries.len());

    let mut source = match DiskIndex::create(path, &source_config) {
        Ok(value) => value,
        Err(error) => {
            eprintln!("error=source_create_failed detail=\"{error}\"");
            return None;
        }
    };
    if let Err(error) = source.append(&entries) {
        eprintln!("error=source_append_failed detail=\"{error}\"");
        return None;
    }
    Some(source)
}

fn coalesce_once(
    source: &DiskIndex,
    index_config: &IndexConfig,
    config: &CoalesceBenchConfig,
    target_path: &Path,
) -> Option<(Duration, CoalesceReport)> {
    let mut coalescer = Coalescer::new(config.delta);
    if config.batch_size > 0 {
        coalescer = coalescer.with_batch_size(config.batch_size);
    }

    let mut target: Box<dyn Index> = if config.disk_target {
        match DiskIndex::create(target_path, index_config) {
            Ok(value) => Box::new(value),
            Err(error) => {
                eprintln!("error=target_create_failed detail=\"{error}\"");
                return None;
            }
        }
    } else {
        match InMemoryIndex::new(index_config.clone()) {
            Ok(value) => Box::new(value),
            Err(error) => {
                eprintln!("error=target_create_failed detail=\"{error}\"");
                return None;
            }
        }
    };

    let started_at = Instant::now();
    let report = match coalescer.run(source, target.as_mut()) {
        Ok(value) => value,
        Err(error) => {
            eprintln!("error=coalesce_failed detail=\"{error}\"");
            return None;
        }
    };
    Some((started_at.elapsed(), report))
}
