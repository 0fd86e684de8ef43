//! Binomial/logit helpers.

/// Fitted probabilities are kept away from 0 and 1 by this margin so logs and
/// IRLS weights stay finite.
pub const PROB_EPS: f64 = 1e-10;

pub fn sigmoid(eta: f64) -> f64 {
    if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let e = eta.exp();
        e / (1.0 + e)
    }
}

pub fn clamp_prob(p: f64) -> f64 {
    p.clamp(PROB_EPS, 1.0 - PROB_EPS)
}

/// Bernoulli log-likelihood of 0/1 outcomes `y` under probabilities `p`.
pub fn log_likelihood(y: &[f64], p: &[f64]) -> f64 {
    y.iter()
        .zip(p)
        .map(|(&yi, &pi)| {
            let pi = clamp_prob(pi);
            yi * pi.ln() + (1.0 - yi) * (1.0 - pi).ln()
        })
        .sum()
}

/// Log-likelihood of the intercept-only model (`p = mean(y)` everywhere).
pub fn null_log_likelihood(y: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let p = vec![mean; y.len()];
    log_likelihood(y, &p)
}

/// Mean negative log-likelihood.
pub fn log_loss(y: &[f64], p: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    -log_likelihood(y, p) / y.len() as f64
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores receive their average rank. `None` when only one class is
/// present.
pub fn roc_auc(y: &[f64], scores: &[f64]) -> Option<f64> {
    let n_pos = y.iter().filter(|&&v| v > 0.5).count();
    let n_neg = y.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1 ..= j+1
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y
        .iter()
        .zip(&ranks)
        .filter(|(v, _)| **v > 0.5)
        .map(|(_, r)| *r)
        .sum();
    let n_pos = n_pos as f64;
    let u = pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Some(u / (n_pos * n_neg as f64))
}
