//! Audio level normalization — pure computation, no state.
//!
//! The instantaneous level shown by the avatar is the frame's RMS
//! amplitude converted to decibels and mapped into [0, 1] with a fixed
//! affine clamp: `clamp((db + 50) / 50, 0, 1)`. A frame at -50 dB or
//! quieter reads as 0, a full-scale frame as 1.

/// Decibel floor of the normalization window.
const DB_FLOOR: f32 = -50.0;

/// Root mean square amplitude of a sample buffer. Empty buffers read 0.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Map an RMS amplitude to a normalized level in [0, 1].
///
/// Monotonic non-decreasing; `normalize(0) == 0`.
pub fn normalize(rms: f32) -> f32 {
    if rms <= 0.0 {
        return 0.0;
    }
    let db = 20.0 * rms.log10();
    ((db - DB_FLOOR) / -DB_FLOOR).clamp(0.0, 1.0)
}

/// Normalized level of a raw sample frame.
pub fn frame_level(samples: &[f32]) -> f32 {
    normalize(rms(samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rms_known_signals() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5; 100]) - 0.5).abs() < 0.001);
        let alternating: Vec<f32> = (0..100)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        assert!((rms(&alternating) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_normalize_anchors() {
        assert_eq!(normalize(0.0), 0.0);
        // Full scale: 0 dB -> 1.0
        assert!((normalize(1.0) - 1.0).abs() < 0.001);
        // -50 dB and below clamp to 0
        assert!(normalize(0.003) < 0.01);
        // Above full scale stays clamped at 1
        assert_eq!(normalize(2.0), 1.0);
    }

    #[test]
    fn test_normalize_midpoint() {
        // -25 dB is the midpoint of the window
        let amplitude = 10f32.powf(-25.0 / 20.0);
        assert!((normalize(amplitude) - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_frame_level_silence() {
        assert_eq!(frame_level(&[0.0; 1024]), 0.0);
    }

    proptest! {
        #[test]
        fn prop_normalize_in_unit_interval(rms_val in 0.0f32..4.0) {
            let level = normalize(rms_val);
            prop_assert!((0.0..=1.0).contains(&level));
        }

        #[test]
        fn prop_normalize_monotonic(a in 0.0f32..4.0, b in 0.0f32..4.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(normalize(lo) <= normalize(hi));
        }

        #[test]
        fn prop_normalize_deterministic(rms_val in 0.0f32..4.0) {
            prop_assert_eq!(normalize(rms_val), normalize(rms_val));
        }
    }
}
