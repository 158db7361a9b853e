//! Temperature scaling and softmax over classifier logits

/// Default temperature, fitted offline on a held-out validation split
pub const DEFAULT_TEMPERATURE: f32 = 2.77;

/// Divide every logit by the temperature.
pub fn temperature_scale(logits: &[f32], temperature: f32) -> Vec<f32> {
    logits.iter().map(|&z| z / temperature).collect()
}

/// Numerically stable softmax.
///
/// Subtracts the maximum logit before exponentiating so large logits do not
/// overflow. Returns an empty vector for empty input.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Softmax of temperature-scaled logits.
pub fn calibrated_softmax(logits: &[f32], temperature: f32) -> Vec<f32> {
    softmax(&temperature_scale(logits, temperature))
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Check that a temperature can be used for scaling.
pub fn validate_temperature(temperature: f32) -> anyhow::Result<()> {
    if !temperature.is_finite() || temperature <= 0.0 {
        anyhow::bail!("temperature must be finite and > 0, got {}", temperature);
    }
    Ok(())
}
