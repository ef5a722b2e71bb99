//! Isotopic envelope evaluation tools
pub type ScoreType = f64;

/// Score a set of observed isotopic peaks matched against a theoretical pattern.
///
/// Higher scores are better, envelopes are selected in descending score order.
pub trait EnvelopeScorer: Send + Sync {
    /// # Arguments
    /// - `total_intensity`: The summed intensity of the matched peaks
    /// - `ratios`: The theoretical over observed intensity ratio of each matched peak
    /// - `charge`: The charge the peaks were matched at, the sign is ignored
    fn score(&self, total_intensity: f64, ratios: &[f64], charge: i32) -> ScoreType;
}

/// The fixed envelope score of the classic deconvolution algorithm.
///
/// ```math
/// S = \begin{cases}
///     \frac{I \cdot n^{0.4}}{\sigma^{0.13} \cdot |z|^{0.06}} & n \ge 2 \\
///     0 & \text{otherwise}
/// \end{cases}
/// ```
///
/// where $`I`$ is the total intensity, $`n`$ the number of matched peaks and $`\sigma`$
/// the population standard deviation of the intensity ratios. A $`\sigma`$ of zero is
/// raised to the smallest positive float so a perfect fit stays finite.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassicEnvelopeScorer {}

impl ClassicEnvelopeScorer {
    pub const RATIO_STDDEV_EXPONENT: f64 = 0.13;
    pub const PEAK_COUNT_EXPONENT: f64 = 0.4;
    pub const CHARGE_EXPONENT: f64 = 0.06;
}

impl EnvelopeScorer for ClassicEnvelopeScorer {
    fn score(&self, total_intensity: f64, ratios: &[f64], charge: i32) -> ScoreType {
        let n = ratios.len();
        if n < 2 {
            return 0.0;
        }
        let sigma = population_std_dev(ratios).max(f64::MIN_POSITIVE);
        total_intensity / sigma.powf(Self::RATIO_STDDEV_EXPONENT)
            * (n as f64).powf(Self::PEAK_COUNT_EXPONENT)
            / (charge.unsigned_abs() as f64).powf(Self::CHARGE_EXPONENT)
    }
}

/// The standard deviation of `values` treated as a whole population, zero when empty
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// The median of `values`, averaging the middle pair for even lengths.
///
/// Returns `None` when `values` is empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
