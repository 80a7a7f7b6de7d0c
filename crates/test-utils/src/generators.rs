//! Generators for synthetic ocean-like data.
//!
//! These generators create predictable, verifiable data patterns that can
//! be used across the test suite.

/// Evenly spaced axis values: `start, start + step, ...` (`n` values).
///
/// # Example
///
/// ```
/// use test_utils::linear_axis;
///
/// assert_eq!(linear_axis(0.0, 6.0, 3), vec![0.0, 6.0, 12.0]);
/// ```
pub fn linear_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Sea water temperature in degrees Celsius, warming from 4 to 20
/// across the grid.
pub fn create_temperature_grid(width: usize, height: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f64 / width.max(1) as f64;
            let y_factor = row as f64 / height.max(1) as f64;
            data.push(4.0 + x_factor * 8.0 + y_factor * 8.0);
        }
    }
    data
}

/// `values` with every `every`-th element replaced by NaN (fill values).
pub fn with_missing(mut values: Vec<f64>, every: usize) -> Vec<f64> {
    if every > 0 {
        for v in values.iter_mut().step_by(every) {
            *v = f64::NAN;
        }
    }
    values
}
