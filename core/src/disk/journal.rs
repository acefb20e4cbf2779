//! Identifier journal: JSON lines of [`IdRecord`]s stored after the vector slab.
//!
//! Only the first `journal_len` bytes (from the header) are committed; bytes
//! past that point belong to an append that never reached its header write.

use std::io::{BufRead, BufReader, Read};

use crate::identifiers::{IdRecord, IdentifierIndex};
use crate::IndexError;

pub(crate) fn encode_records(records: &[IdRecord]) -> Result<Vec<u8>, IndexError> {
    let mut bytes = Vec::new();
    for record in records {
        serde_json::to_writer(&mut bytes, record)?;
        bytes.push(b'\n');
    }
    Ok(bytes)
}

/// Rebuilds the identifier index from committed journal bytes.
///
/// Every record must point below `count`; anything else means the journal and
/// the vector slab disagree.
pub(crate) fn replay<R: Read>(
    reader: R,
    journal_len: u64,
    count: u64,
) -> Result<IdentifierIndex, IndexError> {
    let mut ids = IdentifierIndex::new();
    let mut reader = BufReader::new(reader.take(journal_len));
    let mut line = String::new();
    let mut line_number = 0usize;
    let mut consumed = 0u64;

    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        consumed += read as u64;
        line_number += 1;

        let trimmed = line.trim_end_matches('\n');
        if trimmed.is_empty() {
            continue;
        }

        let record: IdRecord = serde_json::from_str(trimmed).map_err(|error| {
            IndexError::CorruptFormat(format!("invalid journal line {line_number}: {error}"))
        })?;
        let offset = match &record {
            IdRecord::Doc { offset, .. } | IdRecord::Psg { offset, .. } => *offset,
        };
        if offset >= count {
            return Err(IndexError::CorruptFormat(format!(
                "journal line {line_number} points at offset {offset} but only {count} vectors are stored"
            )));
        }
        ids.apply(&record);
    }

    if consumed != journal_len {
        return Err(IndexError::CorruptFormat(format!(
            "identifier journal truncated: expected {journal_len} bytes, found {consumed}"
        )));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<IdRecord> {
        vec![
            IdRecord::Doc {
                id: "d1".to_string(),
                offset: 0,
            },
            IdRecord::Psg {
                id: "p1".to_string(),
                offset: 0,
            },
            IdRecord::Psg {
                id: "p1".to_string(),
                offset: 1,
            },
        ]
    }

    #[test]
    fn replay_restores_encoded_records() {
        let bytes = encode_records(&sample_records()).expect("must encode");
        let ids = replay(bytes.as_slice(), bytes.len() as u64, 2).expect("must replay");

        assert_eq!(ids.doc_offsets("d1"), Some(&[0][..]));
        assert_eq!(ids.psg_offset("p1"), Some(1));
    }

    #[test]
    fn uncommitted_tail_is_ignored() {
        let mut bytes = encode_records(&sample_records()[..1]).expect("must encode");
        let committed = bytes.len() as u64;
        bytes.extend_from_slice(b"{\"kind\":\"doc\",\"id\":\"torn");

        let ids = replay(bytes.as_slice(), committed, 1).expect("must replay");
        assert_eq!(ids.doc_count(), 1);
    }

    #[test]
    fn garbage_and_dangling_offsets_are_corruption() {
        let error = replay(&b"not json\n"[..], 9, 1).expect_err("must fail");
        assert!(matches!(error, IndexError::CorruptFormat(_)));

        let bytes = encode_records(&sample_records()).expect("must encode");
        let error = replay(bytes.as_slice(), bytes.len() as u64, 1).expect_err("must fail");
        assert!(matches!(error, IndexError::CorruptFormat(message) if message.contains("offset 1")));
    }

    #[test]
    fn short_journal_is_corruption() {
        let bytes = encode_records(&sample_records()).expect("must encode");
        let error =
            replay(bytes.as_slice(), bytes.len() as u64 + 10, 2).expect_err("must fail");
        assert!(matches!(error, IndexError::CorruptFormat(message) if message.contains("truncated")));
    }
}
