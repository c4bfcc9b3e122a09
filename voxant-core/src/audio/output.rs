//! Speech output — synthesize text and play it as one cancellable
//! utterance.
//!
//! `speak` always cancels the current utterance first; a cancelled
//! utterance emits no `Finished`. Playback walks the synthesized buffer
//! in fixed progress windows and reports the measured level of each
//! window, so the avatar animates from real amplitude rather than a
//! simulated one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::level::frame_level;
use super::tts::TtsProvider;
use crate::error::VoiceError;

/// Events emitted by speech output.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// Playback of an utterance began.
    Started,
    /// Measured level of the progress window just played.
    Level(f32),
    /// The utterance completed naturally. Not emitted on cancellation.
    Finished,
    /// Synthesis or playback failed; the utterance is over.
    Error(String),
}

/// Callback through which playback events reach the controller's
/// serialization point.
pub type PlaybackCallback = Arc<dyn Fn(PlaybackEvent) + Send + Sync>;

/// Where synthesized audio windows go. A real speaker backend implements
/// this; [`TimedSink`] paces playback in real time without a device and
/// [`InstantSink`] returns immediately for tests.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Play one window of samples.
    async fn play(
        &self,
        window: &[f32],
        sample_rate: u32,
        channels: u16,
    ) -> Result<(), VoiceError>;
}

/// Sink that sleeps for the window's wall-clock duration.
pub struct TimedSink;

#[async_trait]
impl PlaybackSink for TimedSink {
    async fn play(
        &self,
        window: &[f32],
        sample_rate: u32,
        channels: u16,
    ) -> Result<(), VoiceError> {
        if sample_rate == 0 || channels == 0 {
            return Ok(());
        }
        let secs = window.len() as f64 / (sample_rate as f64 * channels as f64);
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        Ok(())
    }
}

/// Sink that discards audio immediately.
pub struct InstantSink;

#[async_trait]
impl PlaybackSink for InstantSink {
    async fn play(&self, _: &[f32], _: u32, _: u16) -> Result<(), VoiceError> {
        Ok(())
    }
}

/// Speech output with at most one active utterance.
pub struct SpeechOutput {
    tts: Arc<dyn TtsProvider>,
    sink: Arc<dyn PlaybackSink>,
    window_ms: u64,
    current: Option<(watch::Sender<bool>, JoinHandle<()>)>,
}

impl SpeechOutput {
    /// Create a new speech output stage.
    pub fn new(tts: Arc<dyn TtsProvider>, sink: Arc<dyn PlaybackSink>, window_ms: u64) -> Self {
        Self {
            tts,
            sink,
            window_ms: window_ms.max(1),
            current: None,
        }
    }

    /// Synthesize and play `text`, cancelling any current utterance
    /// first. `Started` is emitted when playback begins, `Finished` only
    /// on natural completion.
    pub fn speak(&mut self, text: String, on_event: PlaybackCallback) {
        self.cancel();

        let tts = self.tts.clone();
        let sink = self.sink.clone();
        let window_ms = self.window_ms;
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let result = match tts.synthesize(&text).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Speech synthesis failed");
                    on_event(PlaybackEvent::Error(e.to_string()));
                    return;
                }
            };

            debug!(duration = result.duration_secs, "Utterance playback starting");
            on_event(PlaybackEvent::Started);

            let audio = result.audio;
            for window in audio.windows_ms(window_ms) {
                if *cancel_rx.borrow() {
                    debug!("Utterance cancelled");
                    return;
                }
                on_event(PlaybackEvent::Level(frame_level(window)));
                if let Err(e) = sink.play(window, audio.sample_rate, audio.channels).await {
                    warn!(error = %e, "Audio playback failed");
                    on_event(PlaybackEvent::Error(e.to_string()));
                    return;
                }
            }

            if *cancel_rx.borrow() {
                return;
            }
            on_event(PlaybackEvent::Finished);
        });

        self.current = Some((cancel_tx, handle));
    }

    /// Cancel the current utterance immediately, if any. Emits no event.
    pub fn cancel(&mut self) {
        if let Some((cancel_tx, handle)) = self.current.take() {
            let _ = cancel_tx.send(true);
            handle.abort();
        }
    }

    /// Whether an utterance task is still running.
    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }
}

impl Drop for SpeechOutput {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tts::MockTtsProvider;
    use std::sync::Mutex;

    fn collector() -> (PlaybackCallback, Arc<Mutex<Vec<PlaybackEvent>>>) {
        let events: Arc<Mutex<Vec<PlaybackEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: PlaybackCallback = Arc::new(move |ev| {
            sink.lock().unwrap_or_else(|e| e.into_inner()).push(ev);
        });
        (callback, events)
    }

    async fn settle(output: &SpeechOutput) {
        for _ in 0..200 {
            if !output.is_active() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("utterance did not finish in time");
    }

    #[tokio::test]
    async fn test_natural_completion_emits_started_then_finished() {
        let mut output = SpeechOutput::new(
            Arc::new(MockTtsProvider::brief()),
            Arc::new(InstantSink),
            100,
        );
        let (callback, events) = collector();

        output.speak("hello".to_string(), callback);
        settle(&output).await;

        let events = events.lock().unwrap();
        assert!(matches!(events.first(), Some(PlaybackEvent::Started)));
        assert!(matches!(events.last(), Some(PlaybackEvent::Finished)));
        // Sine-wave audio carries energy; measured levels are non-zero.
        assert!(events.iter().any(|e| matches!(e, PlaybackEvent::Level(l) if *l > 0.0)));
    }

    #[tokio::test]
    async fn test_speak_while_speaking_cancels_prior() {
        let mut output = SpeechOutput::new(
            Arc::new(MockTtsProvider::new()),
            Arc::new(TimedSink),
            20,
        );
        let (y_callback, y_events) = collector();
        let (x_callback, x_events) = collector();

        // "y" is long enough (several seconds at 0.05 s/char) that it is
        // still playing when "x" arrives.
        output.speak("yyyyyyyyyyyyyyyyyyyy".to_string(), y_callback);
        tokio::time::sleep(Duration::from_millis(100)).await;
        output.speak("x".to_string(), x_callback);
        settle(&output).await;

        let y_events = y_events.lock().unwrap();
        assert!(
            matches!(y_events.first(), Some(PlaybackEvent::Started)),
            "first utterance should have started"
        );
        assert!(
            !y_events.iter().any(|e| matches!(e, PlaybackEvent::Finished)),
            "cancelled utterance must not emit Finished"
        );

        let x_events = x_events.lock().unwrap();
        assert!(x_events.iter().any(|e| matches!(e, PlaybackEvent::Started)));
        assert!(matches!(x_events.last(), Some(PlaybackEvent::Finished)));
    }

    #[tokio::test]
    async fn test_cancel_without_replacement_emits_nothing_further() {
        let mut output = SpeechOutput::new(
            Arc::new(MockTtsProvider::new()),
            Arc::new(TimedSink),
            20,
        );
        let (callback, events) = collector();

        output.speak("a fairly long sentence to play".to_string(), callback);
        tokio::time::sleep(Duration::from_millis(100)).await;
        output.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let events = events.lock().unwrap();
        assert!(!events.iter().any(|e| matches!(e, PlaybackEvent::Finished)));
    }

    #[tokio::test]
    async fn test_synthesis_failure_reports_error() {
        struct FailingTts;
        #[async_trait]
        impl TtsProvider for FailingTts {
            async fn synthesize(
                &self,
                _: &str,
            ) -> Result<crate::audio::types::SynthesisResult, VoiceError> {
                Err(VoiceError::SynthesisFailed {
                    message: "no voice".into(),
                })
            }
            fn name(&self) -> &str {
                "failing"
            }
        }

        let mut output = SpeechOutput::new(Arc::new(FailingTts), Arc::new(InstantSink), 100);
        let (callback, events) = collector();
        output.speak("x".to_string(), callback);
        settle(&output).await;

        let events = events.lock().unwrap();
        assert!(matches!(events.first(), Some(PlaybackEvent::Error(_))));
        assert!(!events.iter().any(|e| matches!(e, PlaybackEvent::Started)));
    }
}
