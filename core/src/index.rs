use std::collections::BTreeSet;

use crate::identifiers::Offset;
use crate::retrieval::{Mode, RetrievedVectors};
use crate::vector::{find_non_finite, VectorError};
use crate::IndexError;

/// One vector to append, optionally owned by a document and/or a passage.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub values: Vec<f32>,
    pub doc_id: Option<String>,
    pub psg_id: Option<String>,
}

impl VectorEntry {
    pub fn new(values: Vec<f32>, doc_id: Option<String>, psg_id: Option<String>) -> Self {
        Self {
            values,
            doc_id,
            psg_id,
        }
    }

    pub fn doc(doc_id: impl Into<String>, values: Vec<f32>) -> Self {
        Self::new(values, Some(doc_id.into()), None)
    }

    pub fn passage(psg_id: impl Into<String>, values: Vec<f32>) -> Self {
        Self::new(values, None, Some(psg_id.into()))
    }

    pub fn doc_passage(
        doc_id: impl Into<String>,
        psg_id: impl Into<String>,
        values: Vec<f32>,
    ) -> Self {
        Self::new(values, Some(doc_id.into()), Some(psg_id.into()))
    }

    pub(crate) fn id_pair(&self) -> (Option<&str>, Option<&str>) {
        (self.doc_id.as_deref(), self.psg_id.as_deref())
    }
}

/// Capabilities shared by every vector index implementation.
pub trait Index {
    fn dim(&self) -> usize;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn doc_ids(&self) -> BTreeSet<String>;

    fn psg_ids(&self) -> BTreeSet<String>;

    /// Appends `entries` and returns their offsets, contiguous and increasing.
    ///
    /// Either every entry is stored and recorded, or the index is unchanged.
    fn append(&mut self, entries: &[VectorEntry]) -> Result<Vec<Offset>, IndexError>;

    /// Resolves `ids` under `mode` and returns their vectors grouped per id.
    ///
    /// Unknown ids produce empty groups and are listed in
    /// [`RetrievedVectors::unresolved`]; they never fail the call.
    fn get_vectors(&self, ids: &[&str], mode: Mode) -> Result<RetrievedVectors, IndexError>;
}

/// Builds entries from column-oriented input.
///
/// At least one id column is required; every provided column must have one
/// slot per vector, and individual slots may be `None`.
pub fn entries_from_columns(
    vectors: Vec<Vec<f32>>,
    doc_ids: Option<Vec<Option<String>>>,
    psg_ids: Option<Vec<Option<String>>>,
) -> Result<Vec<VectorEntry>, IndexError> {
    if doc_ids.is_none() && psg_ids.is_none() {
        return Err(IndexError::InvalidBatch(
            "at least one of doc_ids and psg_ids must be provided".to_string(),
        ));
    }

    let count = vectors.len();
    let doc_ids = doc_ids.unwrap_or_else(|| vec![None; count]);
    let psg_ids = psg_ids.unwrap_or_else(|| vec![None; count]);
    if doc_ids.len() != count || psg_ids.len() != count {
        return Err(IndexError::InvalidBatch(format!(
            "got {count} vectors, {} doc ids and {} passage ids",
            doc_ids.len(),
            psg_ids.len()
        )));
    }

    Ok(vectors
        .into_iter()
        .zip(doc_ids)
        .zip(psg_ids)
        .map(|((values, doc_id), psg_id)| VectorEntry::new(values, doc_id, psg_id))
        .collect())
}

/// Rejects a batch before anything is written.
pub(crate) fn validate_entries(
    entries: &[VectorEntry],
    dim: usize,
    strict_finite: bool,
) -> Result<(), IndexError> {
    for (row, entry) in entries.iter().enumerate() {
        if entry.values.len() != dim {
            return Err(IndexError::InvalidDimension {
                expected: dim,
                got: entry.values.len(),
            });
        }
        if strict_finite {
            if let Some(VectorError::NonFinite { index, .. }) = find_non_finite(&entry.values) {
                return Err(IndexError::NonFiniteValue { row, index });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_require_at_least_one_id_column() {
        let error = entries_from_columns(vec![vec![1.0]], None, None).expect_err("must fail");
        assert!(matches!(error, IndexError::InvalidBatch(_)));
    }

    #[test]
    fn columns_must_match_vector_count() {
        let error = entries_from_columns(
            vec![vec![1.0], vec![2.0]],
            Some(vec![Some("d1".to_string())]),
            None,
        )
        .expect_err("must fail");
        assert!(matches!(error, IndexError::InvalidBatch(_)));
    }

    #[test]
    fn missing_column_becomes_absent_ids() {
        let entries = entries_from_columns(
            vec![vec![1.0], vec![2.0]],
            None,
            Some(vec![Some("p1".to_string()), None]),
        )
        .expect("must succeed");

        assert_eq!(entries[0], VectorEntry::passage("p1", vec![1.0]));
        assert_eq!(entries[1], VectorEntry::new(vec![2.0], None, None));
    }

    #[test]
    fn validation_reports_dimension_and_non_finite_rows() {
        let entries = vec![VectorEntry::doc("d1", vec![1.0, 2.0])];
        let error = validate_entries(&entries, 3, true).expect_err("must fail");
        assert!(matches!(
            error,
            IndexError::InvalidDimension {
                expected: 3,
                got: 2
            }
        ));

        let entries = vec![
            VectorEntry::doc("d1", vec![1.0, 2.0]),
            VectorEntry::doc("d1", vec![1.0, f32::NAN]),
        ];
        let error = validate_entries(&entries, 2, true).expect_err("must fail");
        assert!(matches!(
            error,
            IndexError::NonFiniteValue { row: 1, index: 1 }
        ));
        validate_entries(&entries, 2, false).expect("permissive mode accepts NaN");
    }
}
