//! Window statistics used to reject outliers and smooth depth readings.
//!
//! All functions divide by the full window length. Placeholder entries
//! (backfilled or zero) count like any other sample because the window size
//! is fixed, not the number of "real" readings in it.

/// Arithmetic mean of the window. An empty window has mean 0.
pub fn mean(history: &[i32]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let sum: i64 = history.iter().map(|&v| i64::from(v)).sum();
    sum as f64 / history.len() as f64
}

/// Mean rounded half away from zero.
pub fn rounded_mean(history: &[i32]) -> i32 {
    mean(history).round() as i32
}

/// Population standard deviation (divide by N, not N-1).
pub fn population_stddev(history: &[i32]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let avg = mean(history);
    let sum_sq: f64 = history
        .iter()
        .map(|&v| {
            let d = f64::from(v) - avg;
            d * d
        })
        .sum();
    (sum_sq / history.len() as f64).sqrt()
}

/// Shifts the window one slot toward index 0, drops the oldest sample, stores
/// `new_value` in the last slot and returns the mean of the updated window.
///
/// This mutates `history` and is the only way new readings enter the window.
pub fn moving_average(history: &mut [i32], new_value: i32) -> f64 {
    if let Some(last) = history.len().checked_sub(1) {
        history.copy_within(1.., 0);
        history[last] = new_value;
    }
    mean(history)
}
