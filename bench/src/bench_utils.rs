use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ffindex_core::VectorEntry;

pub(crate) fn read_usize_env_with_min(key: &str, default: usize, min: usize) -> usize {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    match raw.parse::<usize>() {
        Ok(parsed) if parsed >= min => parsed,
        _ => default,
    }
}

pub(crate) fn read_f32_env_with_min(key: &str, default: f32, min: f32) -> f32 {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    match raw.parse::<f32>() {
        Ok(parsed) if parsed >= min => parsed,
        _ => default,
    }
}

pub(crate) fn summarize_ms(samples_ms: &[f64]) -> (f64, f64, f64) {
    let p50_ms = percentile_ms(samples_ms, 0.50);
    let p95_ms = percentile_ms(samples_ms, 0.95);
    let avg_ms = if samples_ms.is_empty() {
        0.0
    } else {
        samples_ms.iter().sum::<f64>() / samples_ms.len() as f64
    };
    (p50_ms, p95_ms, avg_ms)
}

pub(crate) fn percentile_ms(samples_ms: &[f64], quantile: f64) -> f64 {
    if samples_ms.is_empty() {
        return 0.0;
    }

    let mut sorted = samples_ms.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last_index = sorted.len().saturating_sub(1);
    let position = (quantile.clamp(0.0, 1.0) * last_index as f64).round() as usize;
    sorted[position]
}

pub(crate) fn deterministic_vector(seed: u64, dimension: usize) -> Vec<f32> {
    (0..dimension)
        .map(|index| {
            let mixed = (seed as usize)
                .wrapping_mul(31)
                .wrapping_add(index.wrapping_mul(17))
                % 10_000;
            mixed as f32 / 10_000.0
        })
        .collect()
}

/// Passage vector that drifts slowly away from its document's base vector,
/// so neighbouring passages of one document are similar.
pub(crate) fn passage_vector(doc: usize, passage: usize, dimension: usize) -> Vec<f32> {
    let mut values = deterministic_vector(doc as u64, dimension);
    let drift = deterministic_vector((doc * 7_919 + passage) as u64, dimension);
    let weight = 0.05 * passage as f32;
    for (value, offset) in values.iter_mut().zip(drift) {
        *value += weight * offset;
    }
    values
}

pub(crate) fn corpus_entries(
    documents: usize,
    passages_per_doc: usize,
    dimension: usize,
) -> Vec<VectorEntry> {
    let mut entries = Vec::with_capacity(documents * passages_per_doc);
    for doc in 0..documents {
        for passage in 0..passages_per_doc {
            entries.push(VectorEntry::doc_passage(
                format!("d{doc}"),
                format!("d{doc}_p{passage}"),
                passage_vector(doc, passage, dimension),
            ));
        }
    }
    entries
}

pub(crate) fn bench_root(prefix: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    env::temp_dir().join(format!("ffindex_bench_{prefix}_{timestamp}"))
}

pub(crate) fn cleanup(root: &Path) {
    if root.exists() {
        if let Err(error) = fs::remove_dir_all(root) {
            eprintln!(
                "warning=bench_cleanup_failed path=\"{}\" detail=\"{error}\"",
                root.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_pick_nearest_rank() {
        let samples = [5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(percentile_ms(&samples, 0.0), 1.0);
        assert_eq!(percentile_ms(&samples, 0.5), 3.0);
        assert_eq!(percentile_ms(&samples, 1.0), 5.0);
        assert_eq!(percentile_ms(&[], 0.5), 0.0);

        let (p50, p95, avg) = summarize_ms(&samples);
        assert_eq!((p50, p95, avg), (3.0, 5.0, 3.0));
    }

    #[test]
    fn corpus_is_deterministic_and_grouped_by_document() {
        let first = corpus_entries(3, 4, 8);
        let second = corpus_entries(3, 4, 8);
        assert_eq!(first, second);
        assert_eq!(first.len(), 12);
        assert_eq!(first[5].doc_id.as_deref(), Some("d1"));
        assert_eq!(first[5].psg_id.as_deref(), Some("d1_p1"));
        assert_eq!(first[0].values, deterministic_vector(0, 8));
    }
}
