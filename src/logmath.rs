//! Log-domain arithmetic for the beam search.
//!
//! All probabilities are carried as natural logs; `LOG_ZERO` is the additive
//! identity of `log_sum_exp`.

pub const LOG_ZERO: f32 = f32::NEG_INFINITY;

/// Numerically stable `ln(exp(a) + exp(b))`.
pub fn log_sum_exp(a: f32, b: f32) -> f32 {
    if a == LOG_ZERO {
        return b;
    }
    if b == LOG_ZERO {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Select the frame's candidate labels and their log-probabilities.
///
/// Entries are taken in decreasing probability (ties broken by lower index)
/// until their cumulative mass reaches `cutoff_prob`, capped at
/// `cutoff_top_n`. The blank index is appended if the cut dropped it, so a
/// prefix can always consume a blank. When neither cutoff is active the row
/// is returned in index order.
pub fn pruned_top_k(
    row: &[f32],
    cutoff_prob: f32,
    cutoff_top_n: usize,
    blank_id: usize,
) -> Vec<(usize, f32)> {
    let mut idx: Vec<usize> = (0..row.len()).collect();
    if cutoff_prob < 1.0 || cutoff_top_n < row.len() {
        idx.sort_by(|&a, &b| row[b].total_cmp(&row[a]).then(a.cmp(&b)));
        let mut keep = idx.len();
        if cutoff_prob < 1.0 {
            let mut cum = 0.0;
            keep = 0;
            for &i in &idx {
                cum += row[i];
                keep += 1;
                if cum >= cutoff_prob {
                    break;
                }
            }
        }
        idx.truncate(keep.min(cutoff_top_n));
        if !idx.contains(&blank_id) {
            idx.push(blank_id);
        }
    }
    idx.into_iter()
        .map(|i| (i, (row[i] + f32::MIN_POSITIVE).ln()))
        .collect()
}
