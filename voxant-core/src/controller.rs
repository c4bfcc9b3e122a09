//! Turn controller — the four-phase voice-interaction lifecycle.
//!
//! One `tokio` task owns every piece of mutable state (interaction
//! state, conversation history, the active capture session and
//! utterance). Capture, the completion call, and playback report back
//! through a single event channel, so all mutation happens at one
//! serialization point and no locks are needed. The UI observes
//! read-only `watch` cells.
//!
//! Lifecycle: idle → listening → thinking → speaking → idle. At most one
//! capture session, one in-flight completion call, and one active
//! utterance exist at any time.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::capture::{CaptureEvent, CaptureSession, CaptureSource, CaptureTiming};
use crate::audio::output::{PlaybackEvent, PlaybackSink, SpeechOutput};
use crate::audio::stt::{OpenAiSttProvider, SttProvider};
use crate::audio::tts::OpenAiTtsProvider;
use crate::client::{ChatClient, CompletionClient};
use crate::config::{AppConfig, VoiceConfig};
use crate::credentials::{CredentialStore, API_KEY_ACCOUNT};
use crate::error::{LlmError, VoxantError};
use crate::history::ConversationHistory;
use crate::types::{InteractionState, Turn};

/// Factory producing a fresh capture source per listening session.
pub type SourceFactory = Box<dyn FnMut() -> Box<dyn CaptureSource> + Send>;

/// Commands accepted by the controller.
enum TurnCommand {
    /// The user pressed the single talk toggle.
    Toggle,
    /// Clear the conversation and published text.
    Clear,
    /// Ordered copy of the conversation window.
    Snapshot(oneshot::Sender<Vec<Turn>>),
    /// Stop the controller task.
    Shutdown,
}

/// Events marshaled onto the controller task.
enum TurnEvent {
    Capture(CaptureEvent),
    Reply(Result<String, LlmError>),
    Playback(PlaybackEvent),
}

/// Read-only observable cells for the presentation layer.
#[derive(Clone)]
#[derive(Debug)]
pub struct ControllerCells {
    /// Current lifecycle phase.
    pub state: watch::Receiver<InteractionState>,
    /// Latest (partial or final) transcript of the user's utterance.
    pub transcript: watch::Receiver<String>,
    /// Latest assistant reply, or assistant-facing error text.
    pub reply: watch::Receiver<String>,
    /// Normalized audio level in [0, 1] (capture or playback).
    pub audio_level: watch::Receiver<f32>,
    /// Whether speech output is currently playing.
    pub is_speaking: watch::Receiver<bool>,
}

/// Handle to a running controller task.
#[derive(Debug)]
pub struct TurnController {
    cmd_tx: mpsc::Sender<TurnCommand>,
    cells: ControllerCells,
    handle: JoinHandle<()>,
}

impl TurnController {
    /// Spawn the controller task.
    pub fn spawn(
        client: Arc<dyn CompletionClient>,
        stt: Arc<dyn SttProvider>,
        output: SpeechOutput,
        source_factory: SourceFactory,
        voice_config: VoiceConfig,
        max_history_length: usize,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let (state_tx, state_rx) = watch::channel(InteractionState::Idle);
        let (transcript_tx, transcript_rx) = watch::channel(String::new());
        let (reply_tx, reply_rx) = watch::channel(String::new());
        let (level_tx, level_rx) = watch::channel(0.0f32);
        let (speaking_tx, speaking_rx) = watch::channel(false);

        let cells = ControllerCells {
            state: state_rx,
            transcript: transcript_rx,
            reply: reply_rx,
            audio_level: level_rx,
            is_speaking: speaking_rx,
        };

        let task = ControllerTask {
            client,
            stt,
            output,
            source_factory,
            timing: CaptureTiming {
                partial_interval: std::time::Duration::from_millis(
                    voice_config.partial_interval_ms,
                ),
                stop_grace: std::time::Duration::from_millis(voice_config.stop_grace_ms),
            },
            history: ConversationHistory::new(max_history_length),
            capture: None,
            in_flight: false,
            event_tx,
            state_tx,
            transcript_tx,
            reply_tx,
            level_tx,
            speaking_tx,
        };

        let handle = tokio::spawn(task.run(cmd_rx, event_rx));

        Self {
            cmd_tx,
            cells,
            handle,
        }
    }

    /// Spawn a controller wired to the OpenAI HTTP providers described
    /// by `config`. The STT/TTS key is resolved from the credential
    /// store at assembly time; the chat client keeps reading it per
    /// call.
    pub fn spawn_openai(
        config: &AppConfig,
        credentials: Arc<dyn CredentialStore>,
        source_factory: SourceFactory,
        sink: Arc<dyn PlaybackSink>,
    ) -> Result<Self, VoxantError> {
        let api_key = credentials.get_key(API_KEY_ACCOUNT)?;
        let client = Arc::new(ChatClient::new(config.llm.clone(), credentials)?);
        let stt = Arc::new(OpenAiSttProvider::from_config(&config.voice, api_key.clone()));
        let tts = Arc::new(OpenAiTtsProvider::from_config(&config.voice, api_key));
        let output = SpeechOutput::new(tts, sink, config.voice.playback_window_ms);
        Ok(Self::spawn(
            client,
            stt,
            output,
            source_factory,
            config.voice.clone(),
            config.memory.max_history_length,
        ))
    }

    /// Observable state cells for the presentation layer.
    pub fn cells(&self) -> ControllerCells {
        self.cells.clone()
    }

    /// Press the talk toggle.
    pub async fn toggle(&self) {
        let _ = self.cmd_tx.send(TurnCommand::Toggle).await;
    }

    /// Clear the conversation history and published text.
    pub async fn clear(&self) {
        let _ = self.cmd_tx.send(TurnCommand::Clear).await;
    }

    /// Ordered copy of the conversation window.
    pub async fn history_snapshot(&self) -> Vec<Turn> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(TurnCommand::Snapshot(tx)).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Stop the controller task and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(TurnCommand::Shutdown).await;
        let _ = self.handle.await;
    }
}

struct ControllerTask {
    client: Arc<dyn CompletionClient>,
    stt: Arc<dyn SttProvider>,
    output: SpeechOutput,
    source_factory: SourceFactory,
    timing: CaptureTiming,
    history: ConversationHistory,
    capture: Option<CaptureSession>,
    in_flight: bool,
    event_tx: mpsc::UnboundedSender<TurnEvent>,
    state_tx: watch::Sender<InteractionState>,
    transcript_tx: watch::Sender<String>,
    reply_tx: watch::Sender<String>,
    level_tx: watch::Sender<f32>,
    speaking_tx: watch::Sender<bool>,
}

impl ControllerTask {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<TurnCommand>,
        mut event_rx: mpsc::UnboundedReceiver<TurnEvent>,
    ) {
        info!("Turn controller started");
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(TurnCommand::Toggle) => self.on_toggle(),
                    Some(TurnCommand::Clear) => self.on_clear(),
                    Some(TurnCommand::Snapshot(tx)) => {
                        let _ = tx.send(self.history.snapshot());
                    }
                    Some(TurnCommand::Shutdown) | None => break,
                },
                Some(event) = event_rx.recv() => match event {
                    TurnEvent::Capture(ev) => self.on_capture(ev),
                    TurnEvent::Reply(result) => self.on_reply(result),
                    TurnEvent::Playback(ev) => self.on_playback(ev),
                },
            }
        }

        if let Some(session) = self.capture.take() {
            session.abort();
        }
        self.output.cancel();
        info!("Turn controller stopped");
    }

    fn state(&self) -> InteractionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: InteractionState) {
        debug!(from = %self.state(), to = %state, "State transition");
        let _ = self.state_tx.send(state);
    }

    fn on_toggle(&mut self) {
        match self.state() {
            InteractionState::Idle => self.start_listening(),
            InteractionState::Listening => {
                self.set_state(InteractionState::Thinking);
                if let Some(session) = &self.capture {
                    session.stop();
                }
            }
            InteractionState::Thinking => {
                // No transition defined while a call is in flight.
                debug!("Toggle ignored while thinking");
            }
            InteractionState::Speaking => {
                self.output.cancel();
                let _ = self.speaking_tx.send(false);
                let _ = self.level_tx.send(0.0);
                self.start_listening();
            }
        }
    }

    fn start_listening(&mut self) {
        // A previous session still flushing is cancelled first.
        if let Some(prev) = self.capture.take() {
            prev.abort();
        }
        let _ = self.transcript_tx.send(String::new());
        let _ = self.level_tx.send(0.0);

        let source = (self.source_factory)();
        let event_tx = self.event_tx.clone();
        let session = CaptureSession::start(
            source,
            self.stt.clone(),
            self.timing.clone(),
            Arc::new(move |ev| {
                let _ = event_tx.send(TurnEvent::Capture(ev));
            }),
        );
        self.capture = Some(session);
        self.set_state(InteractionState::Listening);
    }

    fn on_capture(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Level(level) => {
                if self.state() == InteractionState::Listening {
                    let _ = self.level_tx.send(level);
                }
            }
            CaptureEvent::Partial(text) => {
                let _ = self.transcript_tx.send(text);
            }
            CaptureEvent::Finished { transcript } => {
                self.capture = None;
                let _ = self.level_tx.send(0.0);
                match self.state() {
                    InteractionState::Thinking => self.submit_turn(transcript),
                    InteractionState::Listening => {
                        // Source ended on its own (device failure or
                        // exhaustion); treat like an empty stop.
                        warn!("Capture ended while still listening");
                        self.set_state(InteractionState::Idle);
                    }
                    _ => {}
                }
            }
        }
    }

    fn submit_turn(&mut self, transcript: String) {
        let transcript = transcript.trim().to_string();
        let _ = self.transcript_tx.send(transcript.clone());

        if transcript.is_empty() {
            debug!("Empty transcript; nothing to send");
            self.set_state(InteractionState::Idle);
            return;
        }
        if self.in_flight {
            warn!("Completion already in flight; dropping turn");
            return;
        }

        // Snapshot excludes the new user turn so the request carries it
        // exactly once; the user turn is recorded regardless of outcome.
        let window = self.history.snapshot();
        self.history.append(Turn::user(transcript.clone()));
        self.in_flight = true;

        let client = self.client.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = client.complete(&window, &transcript).await;
            let _ = event_tx.send(TurnEvent::Reply(result));
        });
    }

    fn on_reply(&mut self, result: Result<String, LlmError>) {
        self.in_flight = false;
        if self.state() != InteractionState::Thinking {
            debug!("Reply arrived outside thinking; dropped");
            return;
        }
        match result {
            Ok(reply) => {
                self.history.append(Turn::assistant(reply.clone()));
                let _ = self.reply_tx.send(reply.clone());
                self.set_state(InteractionState::Speaking);
                let event_tx = self.event_tx.clone();
                self.output.speak(
                    reply,
                    Arc::new(move |ev| {
                        let _ = event_tx.send(TurnEvent::Playback(ev));
                    }),
                );
            }
            Err(e) => {
                warn!(error = %e, "Completion failed");
                let _ = self.reply_tx.send(e.user_facing());
                self.set_state(InteractionState::Idle);
            }
        }
    }

    fn on_playback(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Started => {
                // An event queued by an utterance cancelled in the
                // meantime must not flip the flag back on.
                if self.state() == InteractionState::Speaking {
                    let _ = self.speaking_tx.send(true);
                }
            }
            PlaybackEvent::Level(level) => {
                if self.state() == InteractionState::Speaking {
                    let _ = self.level_tx.send(level);
                }
            }
            PlaybackEvent::Finished => {
                let _ = self.speaking_tx.send(false);
                let _ = self.level_tx.send(0.0);
                if self.state() == InteractionState::Speaking {
                    self.set_state(InteractionState::Idle);
                }
            }
            PlaybackEvent::Error(message) => {
                warn!(error = %message, "Speech output failed");
                let _ = self.speaking_tx.send(false);
                let _ = self.level_tx.send(0.0);
                if self.state() == InteractionState::Speaking {
                    self.set_state(InteractionState::Idle);
                }
            }
        }
    }

    fn on_clear(&mut self) {
        self.history.clear();
        let _ = self.transcript_tx.send(String::new());
        let _ = self.reply_tx.send(String::new());
        debug!("Conversation cleared");
    }
}
