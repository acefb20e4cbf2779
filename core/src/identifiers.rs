//! Mapping from external document and passage identifiers to vector offsets.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub type Offset = u64;

/// One identifier assignment, as persisted in the identifier journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdRecord {
    Doc { id: String, offset: Offset },
    Psg { id: String, offset: Offset },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierIndex {
    docs: BTreeMap<String, Vec<Offset>>,
    psgs: BTreeMap<String, Offset>,
}

impl IdentifierIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `offset` to the document's list and, independently, points the
    /// passage at `offset`. A passage id seen before is silently re-pointed.
    pub fn record(&mut self, offset: Offset, doc_id: Option<&str>, psg_id: Option<&str>) {
        if let Some(doc_id) = doc_id {
            self.docs.entry(doc_id.to_string()).or_default().push(offset);
        }
        if let Some(psg_id) = psg_id {
            self.psgs.insert(psg_id.to_string(), offset);
        }
    }

    pub fn apply(&mut self, record: &IdRecord) {
        match record {
            IdRecord::Doc { id, offset } => self.record(*offset, Some(id), None),
            IdRecord::Psg { id, offset } => self.record(*offset, None, Some(id)),
        }
    }

    pub fn doc_offsets(&self, doc_id: &str) -> Option<&[Offset]> {
        self.docs.get(doc_id).map(Vec::as_slice)
    }

    pub fn psg_offset(&self, psg_id: &str) -> Option<Offset> {
        self.psgs.get(psg_id).copied()
    }

    pub fn doc_ids(&self) -> BTreeSet<String> {
        self.docs.keys().cloned().collect()
    }

    pub fn psg_ids(&self) -> BTreeSet<String> {
        self.psgs.keys().cloned().collect()
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn psg_count(&self) -> usize {
        self.psgs.len()
    }
}

/// Journal records for a batch whose first vector lands at `first_offset`.
pub(crate) fn records_for_batch<'a, I>(first_offset: Offset, ids: I) -> Vec<IdRecord>
where
    I: IntoIterator<Item = (Option<&'a str>, Option<&'a str>)>,
{
    let mut records = Vec::new();
    for (position, (doc_id, psg_id)) in ids.into_iter().enumerate() {
        let offset = first_offset + position as Offset;
        if let Some(id) = doc_id {
            records.push(IdRecord::Doc {
                id: id.to_string(),
                offset,
            });
        }
        if let Some(id) = psg_id {
            records.push(IdRecord::Psg {
                id: id.to_string(),
                offset,
            });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_offsets_keep_insertion_order() {
        let mut ids = IdentifierIndex::new();
        ids.record(7, Some("d1"), None);
        ids.record(3, Some("d1"), None);
        ids.record(5, Some("d2"), None);

        assert_eq!(ids.doc_offsets("d1"), Some(&[7, 3][..]));
        assert_eq!(ids.doc_offsets("d2"), Some(&[5][..]));
        assert_eq!(ids.doc_offsets("missing"), None);
    }

    #[test]
    fn passage_reassignment_keeps_last_offset_only() {
        let mut ids = IdentifierIndex::new();
        ids.record(1, None, Some("p1"));
        ids.record(4, None, Some("p1"));

        assert_eq!(ids.psg_offset("p1"), Some(4));
        assert_eq!(ids.psg_count(), 1);
    }

    #[test]
    fn one_offset_can_belong_to_doc_and_passage() {
        let mut ids = IdentifierIndex::new();
        ids.record(0, Some("d1"), Some("d1_p0"));

        assert_eq!(ids.doc_offsets("d1"), Some(&[0][..]));
        assert_eq!(ids.psg_offset("d1_p0"), Some(0));
        assert_eq!(ids.doc_ids().into_iter().collect::<Vec<_>>(), vec!["d1"]);
        assert_eq!(ids.psg_ids().into_iter().collect::<Vec<_>>(), vec!["d1_p0"]);
    }

    #[test]
    fn replaying_batch_records_rebuilds_the_index() {
        let records = records_for_batch(
            10,
            [
                (Some("d1"), Some("p1")),
                (None, Some("p2")),
                (Some("d1"), None),
                (None, None),
            ],
        );
        assert_eq!(records.len(), 4);

        let mut replayed = IdentifierIndex::new();
        for record in &records {
            replayed.apply(record);
        }
        assert_eq!(replayed.doc_offsets("d1"), Some(&[10, 12][..]));
        assert_eq!(replayed.psg_offset("p2"), Some(11));
    }

    #[test]
    fn records_serialize_as_tagged_json() {
        let line = serde_json::to_string(&IdRecord::Psg {
            id: "p\n1".to_string(),
            offset: 9,
        })
        .expect("must serialize");
        assert_eq!(line, r#"{"kind":"psg","id":"p\n1","offset":9}"#);
    }
}
