//! NAN-aware rolling-window helpers.
//!
//! Every window here is full-window: the first (n-1) outputs are NAN, and a
//! window containing any NAN input yields NAN rather than a value computed
//! from partial data.

/// Rolling arithmetic mean over `window` observations.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Rolling population standard deviation (divisor n, not n-1).
pub fn rolling_std_pop(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| {
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let variance = w.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / w.len() as f64;
        variance.sqrt()
    })
}

/// Day-over-day fractional change; NAN for the first element and wherever
/// either endpoint is NAN.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i == 0 {
            out.push(f64::NAN);
        } else {
            out.push(values[i] / values[i - 1] - 1.0);
        }
    }
    out
}

fn rolling(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for i in (window - 1)..values.len() {
        let w = &values[i + 1 - window..=i];
        if w.iter().all(|v| !v.is_nan()) {
            out[i] = f(w);
        }
    }
    out
}
