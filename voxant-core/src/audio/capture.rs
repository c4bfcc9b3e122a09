//! Speech capture session — background frame pull, level metering, and
//! incremental transcription.
//!
//! Runs as a `tokio::spawn` task with graceful shutdown via a `watch`
//! channel. Each partial transcript is the best current full-utterance
//! guess (the accumulated buffer re-transcribed), not a delta. Stopping
//! waits a short grace interval so trailing audio reaches the final
//! transcription, then delivers the final transcript exactly once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::level::frame_level;
use super::stt::SttProvider;
use super::types::AudioChunk;
use crate::error::VoiceError;

/// Events emitted by a capture session.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Normalized audio level of the latest captured frame.
    Level(f32),
    /// Best current guess at the full utterance so far.
    Partial(String),
    /// Capture ended; the final transcript (possibly empty). Emitted
    /// exactly once per session, never after `abort`.
    Finished { transcript: String },
}

/// Callback through which capture events reach the controller's
/// serialization point.
pub type CaptureCallback = Arc<dyn Fn(CaptureEvent) + Send + Sync>;

/// Source of captured audio frames. Microphone backends implement this;
/// tests use [`MockCaptureSource`].
#[async_trait]
pub trait CaptureSource: Send {
    /// Pull the next frame. `Ok(None)` means the source is exhausted.
    async fn next_frame(&mut self) -> Result<Option<AudioChunk>, VoiceError>;
}

/// Timing knobs for a capture session.
#[derive(Debug, Clone)]
pub struct CaptureTiming {
    /// How often the accumulated buffer is re-transcribed for partials.
    pub partial_interval: Duration,
    /// Grace interval after stop before the final transcription runs.
    pub stop_grace: Duration,
}

impl Default for CaptureTiming {
    fn default() -> Self {
        Self {
            partial_interval: Duration::from_millis(1000),
            stop_grace: Duration::from_millis(500),
        }
    }
}

/// A running capture session.
pub struct CaptureSession {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CaptureSession {
    /// Start capturing. Frames are pulled from `source`, a level event is
    /// emitted per frame, and the buffer is re-transcribed through `stt`
    /// every `timing.partial_interval`.
    pub fn start(
        mut source: Box<dyn CaptureSource>,
        stt: Arc<dyn SttProvider>,
        timing: CaptureTiming,
        on_event: CaptureCallback,
    ) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut buffer: Option<AudioChunk> = None;
            let mut last_partial = String::new();
            let mut ticker = tokio::time::interval(timing.partial_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first interval tick completes immediately; consume it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => {
                        debug!("Capture stop requested");
                        break;
                    }
                    frame = source.next_frame() => {
                        match frame {
                            Ok(Some(chunk)) => {
                                on_event(CaptureEvent::Level(frame_level(&chunk.samples)));
                                match &mut buffer {
                                    Some(buf) => {
                                        if let Err(e) = buf.append(&chunk) {
                                            warn!(error = %e, "Dropping mismatched capture frame");
                                        }
                                    }
                                    None => buffer = Some(chunk),
                                }
                            }
                            Ok(None) => {
                                debug!("Capture source exhausted");
                                break;
                            }
                            Err(e) => {
                                warn!(error = %e, "Capture source failed");
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        if let Some(buf) = &buffer {
                            match stt.transcribe(buf).await {
                                Ok(result) if result.text != last_partial => {
                                    last_partial = result.text.clone();
                                    on_event(CaptureEvent::Partial(result.text));
                                }
                                Ok(_) => {}
                                Err(e) => warn!(error = %e, "Partial transcription failed"),
                            }
                        }
                    }
                }
            }

            // Allow a trailing final result to settle before flushing.
            tokio::time::sleep(timing.stop_grace).await;

            let transcript = match &buffer {
                Some(buf) if !buf.is_empty() => match stt.transcribe(buf).await {
                    Ok(result) => result.text,
                    Err(e) => {
                        warn!(error = %e, "Final transcription failed; falling back to last partial");
                        last_partial
                    }
                },
                _ => String::new(),
            };

            debug!(len = transcript.len(), "Capture finished");
            on_event(CaptureEvent::Finished { transcript });
        });

        Self { stop_tx, handle }
    }

    /// End capture gracefully. The final transcript arrives through the
    /// session callback after the grace interval.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Abort without delivering a final transcript. Used when a new
    /// session starts while this one is still finishing.
    pub fn abort(self) {
        self.handle.abort();
    }

    /// Whether the background task has fully exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Capture source for tests: yields queued frames, then silence at a
/// fixed cadence so the session keeps running until stopped.
pub struct MockCaptureSource {
    frames: Vec<AudioChunk>,
    idle_frame_len: usize,
    cadence: Duration,
}

impl MockCaptureSource {
    /// Create a source with pre-queued frames.
    pub fn new(frames: Vec<AudioChunk>) -> Self {
        Self {
            frames,
            idle_frame_len: 160,
            cadence: Duration::from_millis(5),
        }
    }

    /// A source that only ever produces silence.
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl CaptureSource for MockCaptureSource {
    async fn next_frame(&mut self) -> Result<Option<AudioChunk>, VoiceError> {
        tokio::time::sleep(self.cadence).await;
        if self.frames.is_empty() {
            Ok(Some(AudioChunk::silence(16000, 1, self.idle_frame_len)))
        } else {
            Ok(Some(self.frames.remove(0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::stt::MockSttProvider;
    use crate::audio::types::TranscriptionResult;
    use std::sync::Mutex;

    fn fast_timing() -> CaptureTiming {
        CaptureTiming {
            partial_interval: Duration::from_millis(20),
            stop_grace: Duration::from_millis(10),
        }
    }

    fn collector() -> (CaptureCallback, Arc<Mutex<Vec<CaptureEvent>>>) {
        let events: Arc<Mutex<Vec<CaptureEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: CaptureCallback = Arc::new(move |ev| {
            sink.lock().unwrap_or_else(|e| e.into_inner()).push(ev);
        });
        (callback, events)
    }

    async fn wait_for_finish(session: &CaptureSession) {
        for _ in 0..200 {
            if session.is_finished() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("capture session did not finish in time");
    }

    #[tokio::test]
    async fn test_stop_delivers_final_exactly_once() {
        let stt = Arc::new(MockSttProvider::fixed("hello world"));
        let (callback, events) = collector();

        let session = CaptureSession::start(
            Box::new(MockCaptureSource::silent()),
            stt,
            fast_timing(),
            callback,
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.stop();
        wait_for_finish(&session).await;

        let events = events.lock().unwrap();
        let finals: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::Finished { transcript } => Some(transcript.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(finals, vec!["hello world".to_string()]);
    }

    #[tokio::test]
    async fn test_partials_are_full_utterance_guesses() {
        let stt = Arc::new(MockSttProvider::with_responses(vec![
            TranscriptionResult::text("hel"),
            TranscriptionResult::text("hello"),
            TranscriptionResult::text("hello"),
        ]));
        let (callback, events) = collector();

        let session = CaptureSession::start(
            Box::new(MockCaptureSource::silent()),
            stt,
            fast_timing(),
            callback,
        );
        tokio::time::sleep(Duration::from_millis(90)).await;
        session.stop();
        wait_for_finish(&session).await;

        let events = events.lock().unwrap();
        let partials: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::Partial(text) => Some(text.clone()),
                _ => None,
            })
            .collect();
        // Duplicate guesses are suppressed.
        assert_eq!(partials, vec!["hel".to_string(), "hello".to_string()]);
    }

    #[tokio::test]
    async fn test_levels_emitted_per_frame() {
        let stt = Arc::new(MockSttProvider::new());
        let (callback, events) = collector();

        let session = CaptureSession::start(
            Box::new(MockCaptureSource::silent()),
            stt,
            fast_timing(),
            callback,
        );
        tokio::time::sleep(Duration::from_millis(40)).await;
        session.stop();
        wait_for_finish(&session).await;

        let events = events.lock().unwrap();
        let levels = events
            .iter()
            .filter(|e| matches!(e, CaptureEvent::Level(_)))
            .count();
        assert!(levels >= 3, "expected several level samples, got {levels}");
        // Silent frames always read zero.
        for ev in events.iter() {
            if let CaptureEvent::Level(l) = ev {
                assert_eq!(*l, 0.0);
            }
        }
    }

    #[tokio::test]
    async fn test_abort_delivers_no_final() {
        let stt = Arc::new(MockSttProvider::fixed("should not surface"));
        let (callback, events) = collector();

        let session = CaptureSession::start(
            Box::new(MockCaptureSource::silent()),
            stt,
            fast_timing(),
            callback,
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        session.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = events.lock().unwrap();
        assert!(
            !events.iter().any(|e| matches!(e, CaptureEvent::Finished { .. })),
            "aborted session must not deliver a final transcript"
        );
    }

    #[tokio::test]
    async fn test_mismatched_frames_do_not_kill_session() {
        // A backend that alternates sample rates mid-stream; the odd
        // frames are dropped and the session still finishes normally.
        struct MixedRates {
            n: u32,
        }
        #[async_trait]
        impl CaptureSource for MixedRates {
            async fn next_frame(&mut self) -> Result<Option<AudioChunk>, VoiceError> {
                tokio::time::sleep(Duration::from_millis(5)).await;
                self.n += 1;
                let rate = if self.n % 2 == 0 { 44100 } else { 16000 };
                Ok(Some(AudioChunk::silence(rate, 1, 160)))
            }
        }

        let stt = Arc::new(MockSttProvider::fixed("still here"));
        let (callback, events) = collector();
        let session =
            CaptureSession::start(Box::new(MixedRates { n: 0 }), stt, fast_timing(), callback);
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.stop();
        wait_for_finish(&session).await;

        let events = events.lock().unwrap();
        match events.last() {
            Some(CaptureEvent::Finished { transcript }) => assert_eq!(transcript, "still here"),
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_buffer_finishes_with_empty_transcript() {
        // Source that is exhausted immediately: no frames at all.
        struct Empty;
        #[async_trait]
        impl CaptureSource for Empty {
            async fn next_frame(&mut self) -> Result<Option<AudioChunk>, VoiceError> {
                Ok(None)
            }
        }

        let stt = Arc::new(MockSttProvider::fixed("noise"));
        let (callback, events) = collector();
        let session = CaptureSession::start(Box::new(Empty), stt.clone(), fast_timing(), callback);
        wait_for_finish(&session).await;

        let events = events.lock().unwrap();
        match events.last() {
            Some(CaptureEvent::Finished { transcript }) => assert_eq!(transcript, ""),
            other => panic!("expected Finished, got {other:?}"),
        }
        // No audio means no transcription call either.
        assert_eq!(stt.call_count(), 0);
    }
}
