//! Log-space helpers shared by every scorer.
//!
//! All log probabilities are base 10, matching the ARPA format, and
//! `LOG_ZERO` stands in for the log of a zero probability.

/// Log probability representing probability 0.
pub const LOG_ZERO: f32 = -99.0;

/// Convert a base-10 log probability to a probability; `LOG_ZERO` or below
/// maps to exactly 0.
pub fn to_prob(log_prob: f64) -> f64 {
    if log_prob <= LOG_ZERO as f64 {
        0.0
    } else {
        10f64.powf(log_prob)
    }
}

/// Convert a probability to a base-10 log probability; 0 maps to `LOG_ZERO`.
pub fn to_log_prob(prob: f64) -> f64 {
    if prob == 0.0 {
        LOG_ZERO as f64
    } else {
        prob.log10()
    }
}

/// Perplexity corresponding to a per-token base-10 log probability.
pub fn to_perplexity(log_prob: f64) -> f64 {
    10f64.powf(-log_prob)
}

/// Rank order centroid weights for `len` ranked items, highest first,
/// summing to 1.
pub fn rank_order_centroid_weights(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let tail: f64 = (i..len).map(|j| 1.0 / (j + 1) as f64).sum();
            tail / len as f64
        })
        .collect()
}
