//! In-memory index with the same growth policy and identifier semantics as
//! the disk store.

use std::collections::BTreeSet;

use crate::config::grown_capacity;
use crate::identifiers::{IdentifierIndex, Offset};
use crate::index::validate_entries;
use crate::retrieval::{retrieve, Mode, RetrievedVectors};
use crate::{Index, IndexConfig, IndexError, VectorEntry};

#[derive(Debug, Clone)]
pub struct InMemoryIndex {
    config: IndexConfig,
    /// `capacity * dim` values; rows past `count` are zeroed reserve.
    data: Vec<f32>,
    count: usize,
    ids: IdentifierIndex,
}

impl InMemoryIndex {
    pub fn new(config: IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;
        let data = vec![0.0; config.initial_capacity * config.dim];
        Ok(Self {
            config,
            data,
            count: 0,
            ids: IdentifierIndex::new(),
        })
    }

    pub(crate) fn from_parts(
        config: IndexConfig,
        vectors: Vec<f32>,
        ids: IdentifierIndex,
    ) -> Result<Self, IndexError> {
        config.validate()?;
        if vectors.len() % config.dim != 0 {
            return Err(IndexError::InvariantViolation(format!(
                "{} values do not form whole vectors of dim {}",
                vectors.len(),
                config.dim
            )));
        }
        let count = vectors.len() / config.dim;
        Ok(Self {
            config,
            data: vectors,
            count,
            ids,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.data.len() / self.config.dim
    }

    pub fn identifiers(&self) -> &IdentifierIndex {
        &self.ids
    }

    /// Returns the vectors at `offsets`, in request order.
    pub fn get(&self, offsets: &[Offset]) -> Result<Vec<Vec<f32>>, IndexError> {
        let dim = self.config.dim;
        offsets
            .iter()
            .map(|offset| {
                let row = self.checked_row(*offset)?;
                Ok(self.data[row * dim..(row + 1) * dim].to_vec())
            })
            .collect()
    }

    fn checked_row(&self, offset: Offset) -> Result<usize, IndexError> {
        match usize::try_from(offset) {
            Ok(row) if row < self.count => Ok(row),
            _ => Err(IndexError::OutOfRange {
                offset,
                count: self.count as u64,
            }),
        }
    }

    fn reserve_rows(&mut self, incoming: usize) {
        let capacity = self.capacity();
        let target = grown_capacity(
            capacity,
            self.count,
            incoming,
            self.config.resize_increment,
        );
        if target != capacity {
            tracing::debug!(from = capacity, to = target, "resizing in-memory index");
            self.data.resize(target * self.config.dim, 0.0);
        }
    }
}

impl Index for InMemoryIndex {
    fn dim(&self) -> usize {
        self.config.dim
    }

    fn len(&self) -> usize {
        self.count
    }

    fn doc_ids(&self) -> BTreeSet<String> {
        self.ids.doc_ids()
    }

    fn psg_ids(&self) -> BTreeSet<String> {
        self.ids.psg_ids()
    }

    fn append(&mut self, entries: &[VectorEntry]) -> Result<Vec<Offset>, IndexError> {
        validate_entries(entries, self.config.dim, self.config.strict_finite)?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        self.reserve_rows(entries.len());

        let dim = self.config.dim;
        let first = self.count;
        for (position, entry) in entries.iter().enumerate() {
            let row = first + position;
            self.data[row * dim..(row + 1) * dim].copy_from_slice(&entry.values);
            let (doc_id, psg_id) = entry.id_pair();
            self.ids.record(row as Offset, doc_id, psg_id);
        }
        self.count += entries.len();

        Ok((first..self.count).map(|row| row as Offset).collect())
    }

    fn get_vectors(&self, ids: &[&str], mode: Mode) -> Result<RetrievedVectors, IndexError> {
        retrieve(&self.ids, ids, mode, |offsets| self.get(offsets))
    }
}

#[cfg(test)]
mod tests;
