//! Persona the backend answers as
//!
//! A persona is a small TOML document:
//!
//! ```toml
//! name = "Nova"
//! position = "a friendly voice assistant"
//! background = "I help people find their way around new tools."
//! guidance = ["Hobbies: mention hiking."]
//! word_limit = 80
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Default reply length limit, in words
pub const DEFAULT_WORD_LIMIT: u32 = 100;

/// Identity and background used to build the system prompt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Persona {
    /// Display name, also used in the greeting
    pub name: String,

    /// Role the persona speaks from
    pub position: String,

    /// Free-form background the model may draw on
    #[serde(default)]
    pub background: String,

    /// Extra answering hints, one per line in the prompt
    #[serde(default)]
    pub guidance: Vec<String>,

    #[serde(default = "default_word_limit")]
    pub word_limit: u32,
}

const fn default_word_limit() -> u32 {
    DEFAULT_WORD_LIMIT
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "Nova".to_string(),
            position: "a friendly voice assistant".to_string(),
            background: "I am a general-purpose assistant. I enjoy explaining things clearly \
                         and helping people work through questions one step at a time."
                .to_string(),
            guidance: vec![
                "If you don't know something, say so plainly.".to_string(),
                "Avoid lists and markup; your answers are read aloud.".to_string(),
            ],
            word_limit: DEFAULT_WORD_LIMIT,
        }
    }
}

impl Persona {
    /// Load a persona from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let persona: Self = toml::from_str(&contents)?;
        tracing::debug!(path = %path.display(), name = %persona.name, "loaded persona");
        Ok(persona)
    }

    /// Load from `path` if given, otherwise the built-in persona
    ///
    /// # Errors
    ///
    /// Returns error if a given file cannot be read or parsed
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// System prompt sent ahead of every user message
    #[must_use]
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!("You are {}, {}.\n\n", self.name, self.position);

        if !self.background.trim().is_empty() {
            prompt.push_str("Here's your background:\n");
            prompt.push_str(self.background.trim());
            prompt.push_str("\n\n");
        }

        prompt.push_str(&format!(
            "Answer questions as {} would, using first person. Be conversational, confident, \
             and warm. Keep responses under {} words and natural for voice conversation.\n",
            self.name, self.word_limit
        ));

        if !self.guidance.is_empty() {
            prompt.push('\n');
            for line in &self.guidance {
                prompt.push_str("- ");
                prompt.push_str(line);
                prompt.push('\n');
            }
        }

        prompt
    }
}
