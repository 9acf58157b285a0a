//! Generation session: form state plus the request lifecycle.
//!
//! A [`GenerationSession`] owns the user's [`GenerationOptions`], the
//! [`GenerationState`] shown to the user, the prompt draft and the speech
//! input. Everything runs on one logical thread; asynchronous completions are
//! applied in the order they arrive.
//!
//! Requests are numbered. Only the completion of the most recently issued
//! request is applied; a slower, older request finishing late is dropped
//! instead of overwriting newer state.

use crate::draft::DraftStore;
use crate::error::Result;
use crate::image::{
    AspectRatio, EmbeddedImage, GenerationOptions, ImageGenerator, ImageStyle, PROMPT_MAX_LENGTH,
};
use crate::media;
use crate::speech::{SpeechError, SpeechEvent, SpeechInput, SpeechOutcome, SpeechState};
use std::path::Path;
use std::sync::Arc;

/// Shown when there is nothing to generate from.
pub const VALIDATION_MESSAGE: &str = "Please provide a prompt or a reference image.";

/// What the user currently sees in the result area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GenerationState {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// A request is in flight.
    Loading,
    /// The latest request produced an image.
    Succeeded(EmbeddedImage),
    /// The latest request failed; the message is user-facing.
    Failed(String),
}

impl GenerationState {
    /// The displayed image, if any.
    pub fn image(&self) -> Option<&EmbeddedImage> {
        match self {
            Self::Succeeded(image) => Some(image),
            _ => None,
        }
    }

    /// The displayed error message, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// True while a request is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// A request that has been issued but whose result is not applied yet.
#[derive(Debug, Clone)]
#[must_use = "pass the pending generation to complete_generation"]
pub struct PendingGeneration {
    ticket: u64,
    options: GenerationOptions,
}

impl PendingGeneration {
    /// Sequence number of this request within the session.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Snapshot of the options the request was issued with.
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }
}

/// Form state and request lifecycle for one user session.
pub struct GenerationSession {
    generator: Arc<dyn ImageGenerator>,
    options: GenerationOptions,
    state: GenerationState,
    drafts: DraftStore,
    speech: SpeechInput,
    latest_ticket: u64,
    notice: Option<String>,
}

impl GenerationSession {
    /// Creates a session, restoring the prompt from the saved draft.
    pub fn new(generator: Arc<dyn ImageGenerator>, drafts: DraftStore) -> Self {
        let options = GenerationOptions::new(drafts.load());
        Self {
            generator,
            options,
            state: GenerationState::Idle,
            drafts,
            speech: SpeechInput::unsupported(),
            latest_ticket: 0,
            notice: None,
        }
    }

    /// Attaches speech input.
    pub fn with_speech(mut self, speech: SpeechInput) -> Self {
        self.speech = speech;
        self
    }

    /// Current options.
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Current result state.
    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    /// True while a request is in flight.
    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    /// Current prompt text.
    pub fn prompt(&self) -> &str {
        &self.options.prompt
    }

    /// Prompt length in code points, for the `n / 1000` counter.
    pub fn prompt_len(&self) -> usize {
        self.options.prompt.chars().count()
    }

    /// Maximum prompt length in code points.
    pub fn prompt_max_len(&self) -> usize {
        PROMPT_MAX_LENGTH
    }

    /// Name of the image generator in use.
    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Replaces the prompt. Returns false, changing nothing, if it is too long.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) -> bool {
        let prompt = prompt.into();
        if prompt == self.options.prompt {
            return true;
        }
        if !self.options.set_prompt(prompt) {
            return false;
        }
        self.drafts.save(self.options.prompt.clone());
        true
    }

    /// Empties the prompt.
    pub fn clear_prompt(&mut self) {
        self.set_prompt(String::new());
    }

    /// Sets the style.
    pub fn set_style(&mut self, style: ImageStyle) {
        self.options.style = style;
    }

    /// Sets the aspect ratio.
    pub fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        self.options.aspect_ratio = ratio;
    }

    /// Sets the negative prompt.
    pub fn set_negative_prompt(&mut self, negative: impl Into<String>) {
        self.options.negative_prompt = negative.into();
    }

    /// Sets or clears the seed. Zero clears it.
    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.options.seed = seed.filter(|s| *s > 0);
    }

    /// Replaces the reference image.
    pub fn set_reference_image(&mut self, image: EmbeddedImage) {
        self.options.reference_image = Some(image);
    }

    /// Removes the reference image.
    pub fn clear_reference_image(&mut self) {
        self.options.reference_image = None;
    }

    /// Loads a file as the reference image. An unreadable file changes nothing.
    pub async fn select_reference_image(&mut self, path: impl AsRef<Path>) -> bool {
        match media::load_reference_image(path).await {
            Some(image) => {
                self.set_reference_image(image);
                true
            }
            None => false,
        }
    }

    /// Validates the form and moves to `Loading`.
    ///
    /// Returns `None` when validation fails; the state is then `Failed`.
    pub fn begin_generation(&mut self) -> Option<PendingGeneration> {
        self.latest_ticket += 1;

        if !self.options.has_input() {
            self.state = GenerationState::Failed(VALIDATION_MESSAGE.to_string());
            return None;
        }

        if self.state.is_loading() {
            tracing::debug!(ticket = self.latest_ticket, "superseding in-flight generation");
        }
        self.state = GenerationState::Loading;

        Some(PendingGeneration {
            ticket: self.latest_ticket,
            options: self.options.clone(),
        })
    }

    /// Applies the outcome of a pending request.
    ///
    /// Returns false if a newer request has been issued since; the outcome is dropped.
    pub fn complete_generation(
        &mut self,
        pending: PendingGeneration,
        result: Result<EmbeddedImage>,
    ) -> bool {
        if pending.ticket != self.latest_ticket {
            tracing::warn!(
                ticket = pending.ticket,
                latest = self.latest_ticket,
                "discarding result of superseded generation"
            );
            return false;
        }

        self.state = match result {
            Ok(image) => GenerationState::Succeeded(image),
            Err(e) => {
                tracing::warn!(generator = self.generator.name(), "generation failed: {e}");
                GenerationState::Failed(e.user_message())
            }
        };
        true
    }

    /// Validates, calls the generator once and records the outcome.
    pub async fn request_generation(&mut self) -> &GenerationState {
        let Some(pending) = self.begin_generation() else {
            return &self.state;
        };

        let options = pending.options();
        tracing::info!(
            generator = self.generator.name(),
            ticket = pending.ticket(),
            style = %options.style,
            aspect_ratio = %options.aspect_ratio,
            has_reference = options.reference_image.is_some(),
            "starting generation"
        );

        let generator = Arc::clone(&self.generator);
        let result = generator.generate(options).await;
        self.complete_generation(pending, result);
        &self.state
    }

    /// Speech input state.
    pub fn speech_state(&self) -> SpeechState {
        self.speech.state()
    }

    /// Starts speech input, or stops it if already listening.
    pub fn toggle_listening(&mut self) -> std::result::Result<(), SpeechError> {
        self.speech.toggle().inspect_err(|e| {
            self.notice = Some(e.user_message());
        })
    }

    /// Starts speech input.
    pub fn start_listening(&mut self) -> std::result::Result<(), SpeechError> {
        self.speech.start().inspect_err(|e| {
            self.notice = Some(e.user_message());
        })
    }

    /// Asks speech input to stop.
    pub fn stop_listening(&mut self) {
        self.speech.stop();
    }

    /// Feeds a recognizer callback into the session.
    pub fn handle_speech_event(&mut self, event: SpeechEvent) {
        match self.speech.handle_event(event) {
            Some(SpeechOutcome::Transcript(text)) => {
                self.set_prompt(text);
            }
            Some(SpeechOutcome::Failed(e)) => {
                self.notice = Some(e.user_message());
            }
            None => {}
        }
    }

    /// Takes the pending one-off message for the user (speech problems).
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Writes any pending draft and stops speech input.
    pub fn shutdown(&mut self) {
        self.drafts.flush();
        self.speech.stop();
    }
}
