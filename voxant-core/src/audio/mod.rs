//! Audio pipeline: capture, transcription, synthesis, playback, and
//! level metering.
//!
//! Hardware access sits behind the [`capture::CaptureSource`] and
//! [`output::PlaybackSink`] traits; everything else is HTTP providers
//! and pure computation.

pub mod capture;
pub mod level;
pub mod output;
pub mod stt;
pub mod tts;
pub mod types;
pub mod wav;

pub use capture::{CaptureEvent, CaptureSession, CaptureSource, CaptureTiming, MockCaptureSource};
pub use level::{frame_level, normalize, rms};
pub use output::{InstantSink, PlaybackEvent, PlaybackSink, SpeechOutput, TimedSink};
pub use stt::{MockSttProvider, OpenAiSttProvider, SttProvider};
pub use tts::{MockTtsProvider, OpenAiTtsProvider, TtsProvider};
pub use types::{AudioChunk, SynthesisResult, TranscriptionResult};
