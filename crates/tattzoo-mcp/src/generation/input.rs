use serde::{Deserialize, Serialize};

use super::GenerationRequest;

/// Minimum length of each story answer, counted after trimming.
pub const MIN_ANSWER_CHARS: usize = 50;

pub const DEFAULT_STYLE: &str = "Traditional";
pub const DEFAULT_COLOR: &str = "Black & Grey";
pub const DEFAULT_MOOD: &str = "happy";
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";
pub const DEFAULT_MODEL: &str = "sd3.5-large";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error(
        "Answer to question {question} must be at least {min} characters, got {len}",
        min = MIN_ANSWER_CHARS
    )]
    AnswerTooShort { question: u8, len: usize },
}

/// The two free-text answers that describe the story behind a tattoo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryAnswers {
    pub question1: String,
    pub question2: String,
}

impl StoryAnswers {
    pub fn new(question1: impl Into<String>, question2: impl Into<String>) -> Self {
        Self {
            question1: question1.into(),
            question2: question2.into(),
        }
    }

    pub fn validate(&self) -> Result<(), InputError> {
        for (question, answer) in [(1, &self.question1), (2, &self.question2)] {
            let len = answer.trim().chars().count();
            if len < MIN_ANSWER_CHARS {
                return Err(InputError::AnswerTooShort { question, len });
            }
        }
        Ok(())
    }

    /// Both answers, trimmed and separated by a blank line.
    pub fn combined(&self) -> Result<String, InputError> {
        self.validate()?;
        Ok(format!(
            "{}\n\n{}",
            self.question1.trim(),
            self.question2.trim()
        ))
    }
}

/// Design choices; anything left unset gets the product default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub style: Option<String>,
    pub color: Option<String>,
    pub mood: Option<String>,
    pub placement: Option<String>,
    pub size: Option<String>,
    pub aspect_ratio: Option<String>,
    pub model: Option<String>,
}

impl GenerationOptions {
    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn placement(mut self, placement: impl Into<String>) -> Self {
        self.placement = Some(placement.into());
        self
    }

    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(aspect_ratio.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

impl GenerationRequest {
    /// Validate the answers and fill unset options with defaults.
    pub fn from_input(
        answers: &StoryAnswers,
        options: GenerationOptions,
    ) -> Result<Self, InputError> {
        let questions = answers.combined()?;
        let GenerationOptions {
            style,
            color,
            mood,
            placement,
            size,
            aspect_ratio,
            model,
        } = options;
        Ok(Self {
            questions,
            style: or_default(style, DEFAULT_STYLE),
            color: or_default(color, DEFAULT_COLOR),
            mood: or_default(mood, DEFAULT_MOOD),
            placement,
            size,
            aspect_ratio: or_default(aspect_ratio, DEFAULT_ASPECT_RATIO),
            model: or_default(model, DEFAULT_MODEL),
        })
    }
}
