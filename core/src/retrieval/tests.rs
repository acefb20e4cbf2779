use super::*;

fn sample_ids() -> IdentifierIndex {
    let mut ids = IdentifierIndex::new();
    for offset in 5..8 {
        ids.record(offset, Some("doc"), None);
    }
    ids.record(9, None, Some("psg"));
    ids
}

fn fetch_offsets_as_values(offsets: &[Offset]) -> Result<Vec<Vec<f32>>, IndexError> {
    Ok(offsets.iter().map(|offset| vec![*offset as f32]).collect())
}

#[test]
fn mode_table_resolves_expected_offsets() {
    let ids = sample_ids();

    assert_eq!(resolve_offsets(&ids, "doc", Mode::FirstP), Some(vec![5]));
    assert_eq!(resolve_offsets(&ids, "doc", Mode::MaxP), Some(vec![5, 6, 7]));
    assert_eq!(resolve_offsets(&ids, "doc", Mode::AveP), Some(vec![5, 6, 7]));
    assert_eq!(resolve_offsets(&ids, "psg", Mode::Passage), Some(vec![9]));
}

#[test]
fn lookups_use_only_the_map_of_the_active_mode() {
    let ids = sample_ids();

    assert_eq!(resolve_offsets(&ids, "doc", Mode::Passage), None);
    assert_eq!(resolve_offsets(&ids, "psg", Mode::MaxP), None);
    assert_eq!(resolve_offsets(&ids, "unknown", Mode::FirstP), None);
}

#[test]
fn unknown_ids_yield_empty_groups_without_aborting_the_batch() {
    let ids = sample_ids();

    let result = retrieve(
        &ids,
        &["doc", "unknown", "doc"],
        Mode::MaxP,
        fetch_offsets_as_values,
    )
    .expect("retrieval must succeed");

    assert_eq!(result.groups, vec![0..3, 3..3, 3..6]);
    assert_eq!(result.unresolved, vec!["unknown".to_string()]);
    assert!(result.group(1).is_empty());
    assert_eq!(result.group(2), &[vec![5.0f32], vec![6.0], vec![7.0]][..]);
    assert!(!result.is_fully_resolved());
}

#[test]
fn fetch_is_skipped_when_nothing_resolves() {
    let ids = sample_ids();

    let result = retrieve(&ids, &["nope"], Mode::Passage, |_| {
        Err(IndexError::InvariantViolation("fetch must not run".to_string()))
    })
    .expect("retrieval must succeed");

    assert!(result.vectors.is_empty());
    assert_eq!(result.groups, vec![0..0]);
}

#[test]
fn modes_parse_case_insensitively() {
    assert_eq!("MaxP".parse::<Mode>().expect("must parse"), Mode::MaxP);
    assert_eq!("firstp".parse::<Mode>().expect("must parse"), Mode::FirstP);
    assert!("sump".parse::<Mode>().is_err());
    assert_eq!(Mode::AveP.to_string(), "avep");
}
