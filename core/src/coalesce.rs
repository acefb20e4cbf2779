//! Sequential coalescing: compresses a multi-vector-per-document index by
//! greedily merging runs of consecutive similar vectors into their mean.
//!
//! The merge is a single left-to-right pass with no backtracking, so its
//! output depends on the order in which a document's vectors were stored.

use std::fmt;

use crate::retrieval::Mode;
use crate::vector::cosine_distance;
use crate::{Index, IndexError, VectorEntry};

pub type DistanceFn = dyn Fn(&[f32], &[f32]) -> f32;

/// Summary of one coalescing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoalesceReport {
    pub documents: usize,
    pub input_vectors: usize,
    pub output_vectors: usize,
    pub flushes: usize,
}

pub struct Coalescer<'a> {
    delta: f32,
    distance: &'a DistanceFn,
    batch_size: Option<usize>,
}

impl fmt::Debug for Coalescer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coalescer")
            .field("delta", &self.delta)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl<'a> Coalescer<'a> {
    /// A coalescer using cosine distance and a single flush at the end.
    pub fn new(delta: f32) -> Self {
        Self {
            delta,
            distance: &cosine_distance,
            batch_size: None,
        }
    }

    pub fn with_distance(mut self, distance: &'a DistanceFn) -> Self {
        self.distance = distance;
        self
    }

    /// Flush to the target whenever this many output vectors are pending.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Coalesces every document of `source` into `target`.
    ///
    /// `target` must not contain any document. On success the document ids of
    /// both indexes are identical.
    pub fn run(
        &self,
        source: &dyn Index,
        target: &mut dyn Index,
    ) -> Result<CoalesceReport, IndexError> {
        if self.delta.is_nan() {
            return Err(IndexError::InvalidConfig("delta must not be NaN".to_string()));
        }
        let existing = target.doc_ids().len();
        if existing > 0 {
            return Err(IndexError::PreconditionViolation(format!(
                "target index must not contain documents, found {existing}"
            )));
        }
        if source.dim() != target.dim() {
            return Err(IndexError::PreconditionViolation(format!(
                "source dim {} does not match target dim {}",
                source.dim(),
                target.dim()
            )));
        }

        let doc_ids = source.doc_ids();
        let batch_size = match self.batch_size {
            Some(0) => {
                return Err(IndexError::InvalidConfig(
                    "batch_size must be > 0".to_string(),
                ))
            }
            Some(size) => size,
            None => doc_ids.len().max(1),
        };

        let mut report = CoalesceReport {
            documents: doc_ids.len(),
            ..CoalesceReport::default()
        };
        let mut pending: Vec<VectorEntry> = Vec::new();

        for doc_id in &doc_ids {
            if pending.len() >= batch_size {
                flush(target, &mut pending, &mut report)?;
            }

            let retrieved = source.get_vectors(&[doc_id.as_str()], Mode::MaxP)?;
            report.input_vectors += retrieved.vectors.len();
            for values in coalesce_vectors(&retrieved.vectors, self.delta, self.distance) {
                pending.push(VectorEntry::doc(doc_id.as_str(), values));
            }
        }
        if !pending.is_empty() {
            flush(target, &mut pending, &mut report)?;
        }

        if target.doc_ids() != doc_ids {
            return Err(IndexError::InvariantViolation(
                "document ids of source and target differ after coalescing".to_string(),
            ));
        }

        tracing::info!(
            documents = report.documents,
            input_vectors = report.input_vectors,
            output_vectors = report.output_vectors,
            flushes = report.flushes,
            delta = self.delta,
            "coalescing finished"
        );
        Ok(report)
    }
}

fn flush(
    target: &mut dyn Index,
    pending: &mut Vec<VectorEntry>,
    report: &mut CoalesceReport,
) -> Result<(), IndexError> {
    target.append(pending)?;
    report.output_vectors += pending.len();
    report.flushes += 1;
    tracing::debug!(
        vectors = pending.len(),
        written = report.output_vectors,
        "flushed coalesced vectors"
    );
    pending.clear();
    Ok(())
}

/// Coalesces `source` into `target` with the given threshold and distance.
/// `batch_size` defaults to the number of source documents.
pub fn coalesce(
    source: &dyn Index,
    target: &mut dyn Index,
    delta: f32,
    distance: &DistanceFn,
    batch_size: Option<usize>,
) -> Result<CoalesceReport, IndexError> {
    let mut coalescer = Coalescer::new(delta).with_distance(distance);
    if let Some(batch_size) = batch_size {
        coalescer = coalescer.with_batch_size(batch_size);
    }
    coalescer.run(source, target)
}

/// Merges one document's vectors, in order, into cluster means.
///
/// A vector whose distance to the running cluster mean is `>= delta` closes
/// the cluster and opens a new one. Returns at least one vector for non-empty
/// input and never more vectors than were given.
pub fn coalesce_vectors(
    vectors: &[Vec<f32>],
    delta: f32,
    distance: &DistanceFn,
) -> Vec<Vec<f32>> {
    let Some((first, rest)) = vectors.split_first() else {
        return Vec::new();
    };

    let mut output = Vec::new();
    let mut cluster = Cluster::start(first);
    for vector in rest {
        if distance(vector.as_slice(), cluster.mean()) >= delta {
            output.push(cluster.mean().to_vec());
            cluster = Cluster::start(vector);
        } else {
            cluster.add(vector);
        }
    }
    output.push(cluster.into_mean());
    output
}

/// Running arithmetic mean of the vectors added so far.
struct Cluster {
    sum: Vec<f64>,
    members: usize,
    mean: Vec<f32>,
}

impl Cluster {
    fn start(vector: &[f32]) -> Self {
        Self {
            sum: vector.iter().map(|value| f64::from(*value)).collect(),
            members: 1,
            mean: vector.to_vec(),
        }
    }

    fn add(&mut self, vector: &[f32]) {
        for (sum, value) in self.sum.iter_mut().zip(vector) {
            *sum += f64::from(*value);
        }
        self.members += 1;
        let members = self.members as f64;
        for (mean, sum) in self.mean.iter_mut().zip(&self.sum) {
            *mean = (*sum / members) as f32;
        }
    }

    fn mean(&self) -> &[f32] {
        &self.mean
    }

    fn into_mean(self) -> Vec<f32> {
        self.mean
    }
}
