//! Numeric helpers shared by the postprocessing and evaluation stages.

/// Additive guard used on every denominator that can reach zero.
pub const EPS: f32 = 1e-16;

/// Returns the index and value of the largest element.
///
/// Ties resolve to the first occurrence. Returns `None` for an empty slice.
pub(crate) fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let (first, rest) = values.split_first()?;
    let mut best_idx = 0usize;
    let mut best = *first;
    for (offset, &value) in rest.iter().enumerate() {
        if value > best {
            best = value;
            best_idx = offset + 1;
        }
    }
    Some((best_idx, best))
}

/// Running sum of `values`.
pub(crate) fn cumsum(values: impl IntoIterator<Item = f32>) -> Vec<f32> {
    let mut acc = 0.0f32;
    values
        .into_iter()
        .map(|v| {
            acc += v;
            acc
        })
        .collect()
}
