//! Two-sided Mann-Whitney U test on game scores.
//!
//! Scores from 2048 games are far from normal (a few lucky runs dominate the
//! mean), so strategies are compared by rank. The U statistic is turned into
//! a p-value with the tie-corrected normal approximation for every sample
//! size.

use std::cmp::Ordering;

/// Significance level of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confidence {
    #[default]
    P05,
    P01,
}

impl Confidence {
    pub fn alpha(self) -> f64 {
        match self {
            Confidence::P05 => 0.05,
            Confidence::P01 => 0.01,
        }
    }
}

/// Compare two samples.
///
/// `Less` when `xs` ranks significantly below `ys`, `Greater` when above,
/// `Equal` when the difference is not significant at `confidence` (or either
/// sample is empty).
///
/// ```
/// use ai_2048::agent::strategy::compare::{mann_whitney, Confidence};
/// use std::cmp::Ordering;
/// let low: Vec<u64> = (1..=10).collect();
/// let high: Vec<u64> = (11..=20).collect();
/// assert_eq!(mann_whitney(&low, &high, Confidence::P01), Ordering::Less);
/// assert_eq!(mann_whitney(&high, &low, Confidence::P01), Ordering::Greater);
/// ```
pub fn mann_whitney(xs: &[u64], ys: &[u64], confidence: Confidence) -> Ordering {
    if xs.is_empty() || ys.is_empty() {
        return Ordering::Equal;
    }
    let (nx, ny) = (xs.len() as f64, ys.len() as f64);
    let n = nx + ny;

    // true marks a value from xs.
    let mut pooled: Vec<(u64, bool)> = xs.iter().map(|&x| (x, true)).chain(ys.iter().map(|&y| (y, false))).collect();
    pooled.sort_unstable_by_key(|&(value, _)| value);

    let mut rank_sum_x = 0.0;
    let mut tie_term = 0.0;
    let mut start = 0;
    while start < pooled.len() {
        let value = pooled[start].0;
        let end = start + pooled[start..].iter().take_while(|&&(v, _)| v == value).count();
        // 1-based ranks start + 1 ..= end share their mean.
        let rank = (start + 1 + end) as f64 / 2.0;
        rank_sum_x += rank * pooled[start..end].iter().filter(|&&(_, from_x)| from_x).count() as f64;
        let ties = (end - start) as f64;
        tie_term += ties * ties * ties - ties;
        start = end;
    }

    let ux = rank_sum_x - nx * (nx + 1.0) / 2.0;
    let uy = nx * ny - ux;
    let u = ux.min(uy);
    let mu = nx * ny / 2.0;
    let sigma = (nx * ny * ((n + 1.0) - tie_term / (n * (n - 1.0))) / 12.0).sqrt();
    if sigma.is_nan() || sigma <= 0.0 {
        return Ordering::Equal;
    }
    let z = (u - mu) / sigma;
    let p = 2.0 * (1.0 - normal_cdf(z.abs()));
    if p >= confidence.alpha() {
        Ordering::Equal
    } else if ux < uy {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn normal_cdf(x: f64) -> f64 { 0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2)) }

/// Abramowitz and Stegun 7.1.26; absolute error below 1.5e-7.
fn erf(x: f64) -> f64 {
    const A: [f64; 5] = [0.254829592, -0.284496736, 1.421413741, -1.453152027, 1.061405429];
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = A.iter().rev().fold(0.0, |acc, &a| acc * t + a) * t;
    sign * (1.0 - poly * (-x * x).exp())
}
