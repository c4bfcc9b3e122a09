//! Avatar presentation math — pure computation, no business logic.
//!
//! The avatar is a head that slowly rotates while idle, pulses and glows
//! while the assistant speaks, and opens its mouth with the instantaneous
//! audio level. This module only computes frame parameters; drawing them
//! is the embedding UI's job.

use serde::{Deserialize, Serialize};

/// Parameters for rendering one avatar frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AvatarFrame {
    /// Idle rotation around the vertical axis, in radians [0, 2π).
    pub rotation: f32,
    /// Uniform head scale; pulses while speaking, 1.0 otherwise.
    pub head_scale: f32,
    /// Mouth scale driven by audio level; 1.0 when quiet.
    pub mouth_scale: f32,
    /// Whether the speaking glow is on.
    pub glow: bool,
}

/// Computes avatar frames from the two controller-published inputs
/// (is-speaking flag and audio level) plus elapsed wall time.
#[derive(Debug, Clone)]
pub struct AvatarPresenter {
    /// Seconds per full idle rotation.
    rotation_period_secs: f32,
    /// Seconds per speaking pulse cycle.
    pulse_period_secs: f32,
    /// Peak deviation of the speaking pulse from scale 1.0.
    pulse_amplitude: f32,
    /// How strongly audio level opens the mouth.
    mouth_gain: f32,
}

impl Default for AvatarPresenter {
    fn default() -> Self {
        Self {
            rotation_period_secs: 20.0,
            pulse_period_secs: 0.6,
            pulse_amplitude: 0.05,
            mouth_gain: 0.5,
        }
    }
}

impl AvatarPresenter {
    /// Create a presenter with the default animation constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the frame for the given inputs. Deterministic: the same
    /// inputs always yield the same frame.
    pub fn frame(&self, is_speaking: bool, audio_level: f32, elapsed_secs: f32) -> AvatarFrame {
        let rotation = (elapsed_secs / self.rotation_period_secs).fract()
            * (2.0 * std::f32::consts::PI);

        let head_scale = if is_speaking {
            let phase = (elapsed_secs / self.pulse_period_secs).fract()
                * (2.0 * std::f32::consts::PI);
            1.0 + self.pulse_amplitude * phase.sin()
        } else {
            1.0
        };

        let mouth_scale = if is_speaking {
            1.0 + audio_level.clamp(0.0, 1.0) * self.mouth_gain
        } else {
            1.0
        };

        AvatarFrame {
            rotation,
            head_scale,
            mouth_scale,
            glow: is_speaking,
        }
    }
}
