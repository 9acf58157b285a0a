//! Speech-to-text input for the prompt field.
//!
//! The platform recognizer is injected through [`SpeechRecognizer`]. Its
//! callbacks are fed back in as [`SpeechEvent`]s. Absence of a recognizer is
//! decided once, at construction, and modelled as [`SpeechState::Unsupported`].
//!
//! ```text
//! Unsupported (absorbing)
//! Idle --start--> Listening --End/Error--> Idle
//! ```

use crate::image::PROMPT_MAX_LENGTH;

/// Locale recognition runs in.
pub const RECOGNITION_LOCALE: &str = "en-US";

/// Error codes that mean the user or platform refused microphone access.
const PERMISSION_DENIED_CODES: [&str; 2] = ["not-allowed", "service-not-allowed"];

/// How the platform recognizer should listen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// Keep listening after the first utterance.
    pub continuous: bool,
    /// Deliver partial transcripts.
    pub interim_results: bool,
    /// BCP 47 language tag.
    pub locale: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            interim_results: false,
            locale: RECOGNITION_LOCALE.to_string(),
        }
    }
}

/// A platform speech recognition facility.
pub trait SpeechRecognizer: Send {
    /// Begins listening. An error carries the platform's reason.
    fn start(&mut self, config: &RecognitionConfig) -> Result<(), String>;

    /// Asks the recognizer to stop. Completion is signalled with [`SpeechEvent::End`].
    fn stop(&mut self);
}

/// Callbacks from the platform recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// A final transcript.
    Result(String),
    /// Recognition failed with a platform error code.
    Error(String),
    /// The recognizer stopped listening.
    End,
}

/// Speech input state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechState {
    /// No recognizer on this platform.
    Unsupported,
    /// Ready to listen.
    Idle,
    /// A session is active.
    Listening,
}

/// Speech failures, all recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    /// No recognizer is available.
    #[error("Speech recognition is not supported on this platform.")]
    Unsupported,

    /// Microphone access was refused.
    #[error("Microphone access denied. Please enable it in your system settings.")]
    PermissionDenied,

    /// The recognizer refused to start.
    #[error("Could not start speech recognition: {0}")]
    Start(String),

    /// Any other recognition error, carrying the raw code.
    #[error("An error occurred during speech recognition: {0}")]
    Recognition(String),
}

impl SpeechError {
    /// Classifies a platform error code.
    pub fn from_code(code: &str) -> Self {
        if PERMISSION_DENIED_CODES.contains(&code) {
            Self::PermissionDenied
        } else {
            Self::Recognition(code.to_string())
        }
    }

    /// Returns the text shown to the user.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// What an event means for the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Replace the whole prompt with this transcript.
    Transcript(String),
    /// Tell the user something went wrong.
    Failed(SpeechError),
}

/// Speech input adapter around an optional platform recognizer.
pub struct SpeechInput {
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    config: RecognitionConfig,
    state: SpeechState,
}

impl SpeechInput {
    /// Wraps a recognizer, or records that there is none.
    pub fn new(recognizer: Option<Box<dyn SpeechRecognizer>>) -> Self {
        let state = if recognizer.is_some() {
            SpeechState::Idle
        } else {
            SpeechState::Unsupported
        };
        Self {
            recognizer,
            config: RecognitionConfig::default(),
            state,
        }
    }

    /// An adapter for platforms without speech recognition.
    pub fn unsupported() -> Self {
        Self::new(None)
    }

    /// Current state.
    pub fn state(&self) -> SpeechState {
        self.state
    }

    /// True while a session is active.
    pub fn is_listening(&self) -> bool {
        self.state == SpeechState::Listening
    }

    /// Starts listening. Does nothing if already listening.
    pub fn start(&mut self) -> Result<(), SpeechError> {
        let recognizer = match (self.state, self.recognizer.as_mut()) {
            (SpeechState::Idle, Some(recognizer)) => recognizer,
            (SpeechState::Listening, _) => return Ok(()),
            _ => return Err(SpeechError::Unsupported),
        };

        match recognizer.start(&self.config) {
            Ok(()) => {
                self.state = SpeechState::Listening;
                tracing::debug!(locale = %self.config.locale, "speech recognition started");
                Ok(())
            }
            Err(reason) => {
                tracing::warn!("error starting speech recognition: {reason}");
                self.state = SpeechState::Idle;
                Err(SpeechError::Start(reason))
            }
        }
    }

    /// Asks the recognizer to stop. The state changes when `End` arrives.
    pub fn stop(&mut self) {
        if self.state != SpeechState::Listening {
            return;
        }
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.stop();
        }
    }

    /// Starts when idle, stops when listening.
    pub fn toggle(&mut self) -> Result<(), SpeechError> {
        if self.is_listening() {
            self.stop();
            Ok(())
        } else {
            self.start()
        }
    }

    /// Applies a recognizer callback.
    pub fn handle_event(&mut self, event: SpeechEvent) -> Option<SpeechOutcome> {
        if self.state == SpeechState::Unsupported {
            return None;
        }

        match event {
            SpeechEvent::Result(transcript) => {
                if transcript.chars().count() <= PROMPT_MAX_LENGTH {
                    Some(SpeechOutcome::Transcript(transcript))
                } else {
                    tracing::debug!("discarding over-length transcript");
                    None
                }
            }
            SpeechEvent::Error(code) => {
                tracing::warn!(code = %code, "speech recognition error");
                self.state = SpeechState::Idle;
                Some(SpeechOutcome::Failed(SpeechError::from_code(&code)))
            }
            SpeechEvent::End => {
                self.state = SpeechState::Idle;
                None
            }
        }
    }
}

impl Drop for SpeechInput {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        starts: usize,
        stops: usize,
        config: Option<RecognitionConfig>,
    }

    struct FakeRecognizer {
        calls: Arc<Mutex<Calls>>,
        fail_start: Option<String>,
    }

    impl SpeechRecognizer for FakeRecognizer {
        fn start(&mut self, config: &RecognitionConfig) -> Result<(), String> {
            let mut calls = self.calls.lock().unwrap();
            calls.starts += 1;
            calls.config = Some(config.clone());
            match &self.fail_start {
                Some(reason) => Err(reason.clone()),
                None => Ok(()),
            }
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().stops += 1;
        }
    }

    fn input(fail_start: Option<&str>) -> (SpeechInput, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let recognizer = FakeRecognizer {
            calls: calls.clone(),
            fail_start: fail_start.map(str::to_string),
        };
        (SpeechInput::new(Some(Box::new(recognizer))), calls)
    }

    #[test]
    fn test_unsupported_is_absorbing() {
        let mut speech = SpeechInput::unsupported();
        assert_eq!(speech.state(), SpeechState::Unsupported);
        assert_eq!(speech.start(), Err(SpeechError::Unsupported));
        assert_eq!(speech.handle_event(SpeechEvent::Result("hi".into())), None);
        assert_eq!(speech.state(), SpeechState::Unsupported);
    }

    #[test]
    fn test_start_uses_single_utterance_config() {
        let (mut speech, calls) = input(None);
        speech.start().unwrap();
        assert!(speech.is_listening());

        let config = calls.lock().unwrap().config.clone().unwrap();
        assert!(!config.continuous);
        assert!(!config.interim_results);
        assert_eq!(config.locale, "en-US");
    }

    #[test]
    fn test_start_failure_returns_to_idle() {
        let (mut speech, _) = input(Some("device busy"));
        assert_eq!(
            speech.start(),
            Err(SpeechError::Start("device busy".into()))
        );
        assert_eq!(speech.state(), SpeechState::Idle);
    }

    #[test]
    fn test_stop_waits_for_end_event() {
        let (mut speech, calls) = input(None);
        speech.start().unwrap();
        speech.stop();
        assert_eq!(calls.lock().unwrap().stops, 1);
        assert!(speech.is_listening());

        assert_eq!(speech.handle_event(SpeechEvent::End), None);
        assert_eq!(speech.state(), SpeechState::Idle);
    }

    #[test]
    fn test_transcript_replaces_prompt_within_bound() {
        let (mut speech, _) = input(None);
        speech.start().unwrap();
        assert_eq!(
            speech.handle_event(SpeechEvent::Result("a castle at dusk".into())),
            Some(SpeechOutcome::Transcript("a castle at dusk".into()))
        );
        assert_eq!(
            speech.handle_event(SpeechEvent::Result("x".repeat(PROMPT_MAX_LENGTH + 1))),
            None
        );
    }

    #[test]
    fn test_permission_denied_is_distinct() {
        let (mut speech, _) = input(None);
        speech.start().unwrap();
        let denied = speech.handle_event(SpeechEvent::Error("not-allowed".into()));
        assert_eq!(speech.state(), SpeechState::Idle);

        speech.start().unwrap();
        let other = speech.handle_event(SpeechEvent::Error("network".into()));
        assert_eq!(speech.state(), SpeechState::Idle);

        let (Some(SpeechOutcome::Failed(denied)), Some(SpeechOutcome::Failed(other))) =
            (denied, other)
        else {
            panic!("expected failures");
        };
        assert_eq!(denied, SpeechError::PermissionDenied);
        assert!(denied.user_message().contains("Microphone access denied"));
        assert!(other.user_message().contains("network"));
        assert_ne!(denied.user_message(), other.user_message());
    }

    #[test]
    fn test_service_not_allowed_is_permission_denied() {
        assert_eq!(
            SpeechError::from_code("service-not-allowed"),
            SpeechError::PermissionDenied
        );
    }

    #[test]
    fn test_toggle() {
        let (mut speech, calls) = input(None);
        speech.toggle().unwrap();
        assert!(speech.is_listening());
        speech.toggle().unwrap();
        assert_eq!(calls.lock().unwrap().stops, 1);
    }

    #[test]
    fn test_drop_stops_active_session() {
        let (mut speech, calls) = input(None);
        speech.start().unwrap();
        drop(speech);
        assert_eq!(calls.lock().unwrap().stops, 1);

        let (speech, calls) = input(None);
        drop(speech);
        assert_eq!(calls.lock().unwrap().stops, 0);
    }
}
