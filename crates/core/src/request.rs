//! Caller-supplied generation parameters.

use rand::Rng;

use crate::error::CoreError;
use crate::sanitizer::{sanitize, SanitizedJob};
use crate::template::JobTemplate;

/// Exclusive upper bound for randomly drawn seeds.
pub const MAX_RANDOM_SEED: u64 = 1_000_000_000;

/// Maximum prompt length in characters.
pub const MAX_PROMPT_LENGTH: usize = 10_000;

/// Prompt text and seed for one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    seed: u64,
}

impl GenerationRequest {
    /// Validate the prompt and pick a seed.
    ///
    /// Blank prompts are rejected. When `seed` is `None` a random seed in
    /// `[0, MAX_RANDOM_SEED)` is drawn.
    pub fn new(prompt: impl Into<String>, seed: Option<u64>) -> Result<Self, CoreError> {
        let prompt = prompt.into();
        validate_prompt(&prompt)?;
        let seed = seed.unwrap_or_else(random_seed);
        Ok(Self { prompt, seed })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sanitize `template` with this request's parameters.
    pub fn apply(&self, template: &JobTemplate) -> SanitizedJob {
        sanitize(template, &self.prompt, self.seed)
    }
}

/// Validate prompt text (non-blank, within length limits).
pub fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::Validation(
            "Prompt text must not be empty".to_string(),
        ));
    }
    let len = prompt.chars().count();
    if len > MAX_PROMPT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Prompt text must be at most {MAX_PROMPT_LENGTH} characters, got {len}"
        )));
    }
    Ok(())
}

/// Draw a seed in `[0, MAX_RANDOM_SEED)`.
pub fn random_seed() -> u64 {
    rand::rng().random_range(0..MAX_RANDOM_SEED)
}
