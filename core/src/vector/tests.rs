use super::*;

const EPSILON: f32 = 1e-5;

fn approx_eq(left: f32, right: f32) {
    assert!((left - right).abs() < EPSILON, "expected {left} ~= {right}");
}

#[test]
fn euclidean_distance_works_across_simd_and_tail() {
    approx_eq(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);

    let left: Vec<f32> = (0..11).map(|index| index as f32).collect();
    let right: Vec<f32> = left.iter().map(|value| value + 1.0).collect();
    approx_eq(euclidean_distance(&left, &right), 11.0f32.sqrt());
}

#[test]
fn cosine_similarity_reports_zero_norm_as_none() {
    let value = cosine_similarity_unchecked(&[1.0, 0.0], &[0.0, 1.0]);
    approx_eq(value.expect("must be defined"), 0.0);

    let left: Vec<f32> = (1..12).map(|index| index as f32).collect();
    let value = cosine_similarity_unchecked(&left, &left);
    approx_eq(value.expect("must be defined"), 1.0);

    assert!(cosine_similarity_unchecked(&[0.0, 0.0], &[0.0, 1.0]).is_none());
}

#[test]
fn cosine_distance_covers_parallel_orthogonal_and_opposite() {
    approx_eq(cosine_distance(&[2.0, 0.0], &[5.0, 0.0]), 0.0);
    approx_eq(cosine_distance(&[1.0, 0.0], &[0.0, 3.0]), 1.0);
    approx_eq(cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]), 2.0);
}

#[test]
fn cosine_distance_is_never_negative_for_identical_directions() {
    let left: Vec<f32> = (0..37).map(|index| (index as f32 * 0.37).sin()).collect();
    let right: Vec<f32> = left.iter().map(|value| value * 3.0).collect();
    assert!(cosine_distance(&left, &right) >= 0.0);
}

#[test]
fn cosine_distance_treats_zero_vectors_as_orthogonal() {
    assert_eq!(cosine_distance(&[0.0; 4], &[1.0; 4]), ZERO_NORM_DISTANCE);
}

#[test]
fn finds_first_non_finite_value() {
    assert!(find_non_finite(&[1.0, 2.0]).is_none());
    let error = find_non_finite(&[1.0, f32::INFINITY, f32::NAN]).expect("must detect");
    assert!(matches!(error, VectorError::NonFinite { index: 1, .. }));
}
