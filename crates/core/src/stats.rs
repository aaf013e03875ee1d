//! Summary statistics stored alongside each snapshot channel.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WaveformStats {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub max: f64,
    pub min: f64,
}

impl WaveformStats {
    /// Compute stats for a waveform. An empty waveform yields all zeros.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));

        Self {
            mean,
            std: variance.sqrt(),
            max,
            min,
        }
    }
}
