use super::*;

fn new_index(initial_capacity: usize, resize_increment: usize) -> InMemoryIndex {
    let config = IndexConfig::new(2)
        .expect("config must be valid")
        .with_initial_capacity(initial_capacity)
        .with_resize_increment(resize_increment);
    InMemoryIndex::new(config).expect("index must be valid")
}

fn row(seed: usize) -> Vec<f32> {
    vec![seed as f32, seed as f32 * 0.5 + 1.0]
}

#[test]
fn append_assigns_contiguous_offsets_across_batches() {
    let mut index = new_index(4, 4);

    let first = index
        .append(&[VectorEntry::doc("d1", row(0)), VectorEntry::doc("d1", row(1))])
        .expect("append must succeed");
    let second = index
        .append(&[VectorEntry::passage("p1", row(2))])
        .expect("append must succeed");

    assert_eq!(first, vec![0, 1]);
    assert_eq!(second, vec![2]);
    assert_eq!(index.len(), 3);
    assert_eq!(
        index.get(&[2, 0]).expect("get must succeed"),
        vec![row(2), row(0)]
    );
}

#[test]
fn growth_preserves_existing_rows() {
    let mut index = new_index(16, 20);
    let entries: Vec<_> = (0..16).map(|seed| VectorEntry::doc("d", row(seed))).collect();
    index.append(&entries).expect("append must succeed");

    let more: Vec<_> = (16..36).map(|seed| VectorEntry::doc("d", row(seed))).collect();
    index.append(&more).expect("append must succeed");

    assert!(index.capacity() >= 36);
    let offsets: Vec<Offset> = (0..36).collect();
    let stored = index.get(&offsets).expect("get must succeed");
    let expected: Vec<_> = (0..36).map(row).collect();
    assert_eq!(stored, expected);
}

#[test]
fn rejected_batch_leaves_index_unchanged() {
    let mut index = new_index(1, 1);
    index
        .append(&[VectorEntry::doc("d1", row(0))])
        .expect("append must succeed");

    let error = index
        .append(&[
            VectorEntry::doc("d2", row(1)),
            VectorEntry::doc("d2", vec![1.0, 2.0, 3.0]),
        ])
        .expect_err("must fail");

    assert!(matches!(error, IndexError::InvalidDimension { .. }));
    assert_eq!(index.len(), 1);
    assert!(!index.doc_ids().contains("d2"));
}

#[test]
fn out_of_range_offsets_are_rejected() {
    let mut index = new_index(8, 8);
    index
        .append(&[VectorEntry::doc("d1", row(0))])
        .expect("append must succeed");

    let error = index.get(&[0, 1]).expect_err("must fail");
    assert!(matches!(error, IndexError::OutOfRange { offset: 1, count: 1 }));
}

#[test]
fn get_vectors_groups_documents_and_passages() {
    let mut index = new_index(8, 8);
    index
        .append(&[
            VectorEntry::doc_passage("d1", "d1_p0", row(0)),
            VectorEntry::doc_passage("d1", "d1_p1", row(1)),
            VectorEntry::doc_passage("d2", "d2_p0", row(2)),
        ])
        .expect("append must succeed");

    let result = index
        .get_vectors(&["d2", "d1"], Mode::MaxP)
        .expect("lookup must succeed");
    assert_eq!(result.vectors, vec![row(2), row(0), row(1)]);
    assert_eq!(result.groups, vec![0..1, 1..3]);

    let result = index
        .get_vectors(&["d1_p1", "d1"], Mode::Passage)
        .expect("lookup must succeed");
    assert_eq!(result.vectors, vec![row(1)]);
    assert_eq!(result.unresolved, vec!["d1".to_string()]);
}

#[test]
fn empty_append_is_a_no_op() {
    let mut index = new_index(0, 0);
    assert!(index.append(&[]).expect("append must succeed").is_empty());
    assert!(index.is_empty());
    assert_eq!(index.capacity(), 0);
}
