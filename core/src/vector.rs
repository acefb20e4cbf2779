use std::error::Error;
use std::fmt;
use wide::f32x8;

/// Squared norm under which a vector is treated as having no direction.
pub const ZERO_NORM_EPSILON: f32 = f32::EPSILON;

/// Distance returned by [`cosine_distance`] when either vector has a near-zero norm.
pub const ZERO_NORM_DISTANCE: f32 = 1.0;

const SIMD_WIDTH: usize = 8;

/// Error type for vector validation.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorError {
    /// Returned when a vector contains NaN or an infinity.
    NonFinite { index: usize, value: f32 },
}

impl fmt::Display for VectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite { index, value } => {
                write!(f, "non-finite value at index {index}: {value}")
            }
        }
    }
}

impl Error for VectorError {}

/// Returns the first non-finite component of `values`, if any.
pub fn find_non_finite(values: &[f32]) -> Option<VectorError> {
    values
        .iter()
        .copied()
        .enumerate()
        .find(|(_, value)| !value.is_finite())
        .map(|(index, value)| VectorError::NonFinite { index, value })
}

/// Computes cosine similarity without dimension checks.
///
/// Callers must pass non-empty vectors of equal length.
pub fn cosine_similarity_unchecked(left: &[f32], right: &[f32]) -> Option<f32> {
    debug_assert!(!left.is_empty());
    debug_assert_eq!(left.len(), right.len());

    let (dot, left_sq_sum, right_sq_sum) = simd_dot_and_norms(left, right);
    if left_sq_sum <= ZERO_NORM_EPSILON || right_sq_sum <= ZERO_NORM_EPSILON {
        return None;
    }
    Some(dot / (left_sq_sum.sqrt() * right_sq_sum.sqrt()))
}

/// Cosine distance `1 - cos(left, right)`, clamped to `[0, 2]`.
///
/// This is the default distance of the coalescer. Vectors with a near-zero
/// norm have no direction and are reported at [`ZERO_NORM_DISTANCE`].
pub fn cosine_distance(left: &[f32], right: &[f32]) -> f32 {
    match cosine_similarity_unchecked(left, right) {
        Some(similarity) => (1.0 - similarity).clamp(0.0, 2.0),
        None => ZERO_NORM_DISTANCE,
    }
}

/// Euclidean distance without dimension checks, usable as a coalescing distance.
pub fn euclidean_distance(left: &[f32], right: &[f32]) -> f32 {
    debug_assert_eq!(left.len(), right.len());
    simd_l2_squared(left, right).sqrt()
}

fn load_f32x8(values: &[f32]) -> f32x8 {
    debug_assert_eq!(values.len(), SIMD_WIDTH);
    f32x8::from([
        values[0], values[1], values[2], values[3], values[4], values[5], values[6], values[7],
    ])
}

fn simd_scan(
    left: &[f32],
    right: &[f32],
    mut simd_step: impl FnMut(f32x8, f32x8),
    mut scalar_step: impl FnMut(f32, f32),
) {
    let mut left_chunks = left.chunks_exact(SIMD_WIDTH);
    let mut right_chunks = right.chunks_exact(SIMD_WIDTH);

    for (left_chunk, right_chunk) in left_chunks.by_ref().zip(right_chunks.by_ref()) {
        simd_step(load_f32x8(left_chunk), load_f32x8(right_chunk));
    }
    for (&left_value, &right_value) in left_chunks.remainder().iter().zip(right_chunks.remainder())
    {
        scalar_step(left_value, right_value);
    }
}

fn simd_l2_squared(left: &[f32], right: &[f32]) -> f32 {
    let mut simd_sum = f32x8::ZERO;
    let mut scalar_sum = 0.0;

    simd_scan(
        left,
        right,
        |left_v, right_v| {
            let delta = left_v - right_v;
            simd_sum += delta * delta;
        },
        |left_value, right_value| {
            let delta = left_value - right_value;
            scalar_sum += delta * delta;
        },
    );

    simd_sum.reduce_add() + scalar_sum
}

fn simd_dot_and_norms(left: &[f32], right: &[f32]) -> (f32, f32, f32) {
    let mut dot_sum = f32x8::ZERO;
    let mut left_sq_sum = f32x8::ZERO;
    let mut right_sq_sum = f32x8::ZERO;
    let mut dot_scalar = 0.0;
    let mut left_sq_scalar = 0.0;
    let mut right_sq_scalar = 0.0;

    simd_scan(
        left,
        right,
        |left_v, right_v| {
            dot_sum += left_v * right_v;
            left_sq_sum += left_v * left_v;
            right_sq_sum += right_v * right_v;
        },
        |left_value, right_value| {
            dot_scalar += left_value * right_value;
            left_sq_scalar += left_value * left_value;
            right_sq_scalar += right_value * right_value;
        },
    );

    (
        dot_sum.reduce_add() + dot_scalar,
        left_sq_sum.reduce_add() + left_sq_scalar,
        right_sq_sum.reduce_add() + right_sq_scalar,
    )
}

#[cfg(test)]
mod tests;
