/// Upper bound of a reading
pub const MAX_LEVEL: u8 = 100;

/// Noise level of one byte magnitude snapshot.
///
/// RMS over the bins, rescaled from 0..=255 onto 0..=100. This is a relative
/// loudness proxy, not a calibrated sound pressure level. An empty snapshot
/// reads as 0.
pub fn level_from_magnitudes(magnitudes: &[u8]) -> u8 {
    if magnitudes.is_empty() {
        return 0;
    }

    let sum: u64 = magnitudes
        .iter()
        .map(|&m| u64::from(m) * u64::from(m))
        .sum();
    let rms = (sum as f64 / magnitudes.len() as f64).sqrt();

    normalize_rms(rms)
}

/// `round(rms / 255 * 100)`, clamped to `0..=MAX_LEVEL`
pub fn normalize_rms(rms: f64) -> u8 {
    let level = (rms / 255.0 * 100.0).round();
    level.clamp(0.0, f64::from(MAX_LEVEL)) as u8
}
