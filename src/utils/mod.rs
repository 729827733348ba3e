//! Host-side helpers shared by the analysis passes

/// Exclusive prefix sum with the total appended
///
/// The result has `input.len() + 1` entries: `result[i]` is the sum of
/// `input[..i]`, so `result[i]..result[i + 1]` is the span of bucket `i`.
pub fn exclusive_scan(input: &[usize]) -> Vec<usize> {
    let mut result = Vec::with_capacity(input.len() + 1);
    let mut sum = 0;

    result.push(0);
    for &val in input {
        sum += val;
        result.push(sum);
    }

    result
}
