//! Identifier + mode resolution into offset groups.
//!
//! Resolution never aggregates: MaxP and AveP return the same offsets, and
//! pooling over a group is left to the ranking layer.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::identifiers::{IdentifierIndex, Offset};
use crate::IndexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// One vector per passage id.
    #[default]
    Passage,
    /// The first vector recorded for a document.
    FirstP,
    /// Every vector of a document, to be max-pooled by the caller.
    MaxP,
    /// Every vector of a document, to be averaged by the caller.
    AveP,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Passage => "passage",
            Self::FirstP => "firstp",
            Self::MaxP => "maxp",
            Self::AveP => "avep",
        };
        f.write_str(name)
    }
}

impl FromStr for Mode {
    type Err = IndexError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "passage" => Ok(Self::Passage),
            "firstp" => Ok(Self::FirstP),
            "maxp" => Ok(Self::MaxP),
            "avep" => Ok(Self::AveP),
            _ => Err(IndexError::InvalidConfig(format!(
                "unknown mode '{raw}', expected passage, firstp, maxp or avep"
            ))),
        }
    }
}

/// Vectors for a batch of identifiers, concatenated in request order.
///
/// `groups[i]` is the range of `vectors` that belongs to the i-th requested
/// id; it is empty when the id could not be resolved under the mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedVectors {
    pub vectors: Vec<Vec<f32>>,
    pub groups: Vec<Range<usize>>,
    pub unresolved: Vec<String>,
}

impl RetrievedVectors {
    pub fn group(&self, position: usize) -> &[Vec<f32>] {
        self.groups
            .get(position)
            .map(|range| &self.vectors[range.clone()])
            .unwrap_or(&[])
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Offsets that `id` resolves to under `mode`, or `None` if the id is unknown
/// to the map the mode consults.
pub fn resolve_offsets(ids: &IdentifierIndex, id: &str, mode: Mode) -> Option<Vec<Offset>> {
    match mode {
        Mode::Passage => ids.psg_offset(id).map(|offset| vec![offset]),
        Mode::FirstP => ids
            .doc_offsets(id)
            .and_then(|offsets| offsets.first())
            .map(|offset| vec![*offset]),
        Mode::MaxP | Mode::AveP => ids.doc_offsets(id).map(<[Offset]>::to_vec),
    }
}

/// Resolves every id, then loads all offsets through a single `fetch` call.
pub(crate) fn retrieve<F>(
    ids: &IdentifierIndex,
    requested: &[&str],
    mode: Mode,
    fetch: F,
) -> Result<RetrievedVectors, IndexError>
where
    F: FnOnce(&[Offset]) -> Result<Vec<Vec<f32>>, IndexError>,
{
    let mut offsets = Vec::new();
    let mut groups = Vec::with_capacity(requested.len());
    let mut unresolved = Vec::new();

    for id in requested {
        let start = offsets.len();
        match resolve_offsets(ids, id, mode) {
            Some(resolved) => offsets.extend(resolved),
            None => {
                tracing::warn!(id = %id, %mode, "no vectors for id");
                unresolved.push((*id).to_string());
            }
        }
        groups.push(start..offsets.len());
    }

    let vectors = if offsets.is_empty() {
        Vec::new()
    } else {
        fetch(&offsets)?
    };

    Ok(RetrievedVectors {
        vectors,
        groups,
        unresolved,
    })
}

#[cfg(test)]
mod tests;
