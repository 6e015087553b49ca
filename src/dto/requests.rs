//! User intents entering the core, validated before any store access.

use serde::Deserialize;
use validator::{Validate, ValidationErrors};

use crate::dto::validation::{validate_correct_index, validate_non_blank, validate_options};

/// Payload used to create a brand-new room.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomRequest {
    /// Display name of the creator.
    pub name: String,
    /// Requested rounds; clamped into range, defaulted when absent.
    #[serde(default)]
    pub rounds: Option<u32>,
    /// Asking timer in seconds; clamped into range, defaulted when absent.
    #[serde(default)]
    pub ask_time_sec: Option<u32>,
    /// Voting timer in seconds; clamped into range, defaulted when absent.
    #[serde(default)]
    pub vote_time_sec: Option<u32>,
}

impl Validate for CreateRoomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_non_blank(&self.name) {
            errors.add("name", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to join an existing room.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRoomRequest {
    /// Display name of the joining player.
    pub name: String,
    /// Room code as typed; trimmed and uppercased before lookup.
    pub code: String,
}

impl Validate for JoinRoomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_non_blank(&self.name) {
            errors.add("name", e);
        }
        if let Err(e) = validate_non_blank(&self.code) {
            errors.add("code", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// A question composed by the current asker.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    /// Question text.
    pub text: String,
    /// The four answer options.
    pub options: [String; 4],
    /// Index of the correct option.
    pub correct_index: u8,
}

impl Validate for QuestionInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_non_blank(&self.text) {
            errors.add("text", e);
        }
        if let Err(e) = validate_options(&self.options) {
            errors.add("options", e);
        }
        if let Err(e) = validate_correct_index(self.correct_index) {
            errors.add("correct_index", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
