/// Flags readings whose temperature deviates from the recent per-device mean.
///
/// Humidity carries no threshold rule and is never evaluated.
pub struct AnomalyDetector {
    tolerance: f64,
}

impl AnomalyDetector {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// `history` is the device's recent temperatures, newest first, excluding
    /// the candidate itself. Fewer than 3 baseline points never flags.
    /// Deviation equal to the tolerance does not flag.
    pub fn evaluate(&self, candidate_temp: f64, history: &[f64]) -> Option<String> {
        if history.len() < 3 {
            return None;
        }
        let mean = history.iter().sum::<f64>() / history.len() as f64;
        if (candidate_temp - mean).abs() > self.tolerance {
            Some(format!(
                "temp deviation {:.2} vs avg {:.2}",
                candidate_temp, mean
            ))
        } else {
            None
        }
    }
}
