use palm2_llm::provider::ChatTurn;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AdapterError;

/// Who produced a turn, in the host's encoding (`"user"` / `"llm"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Llm,
}

impl FromStr for TurnRole {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "llm" => Ok(Self::Llm),
            other => Err(AdapterError::UnmappedRole(other.to_owned())),
        }
    }
}

/// One message of conversation history. Order in a history is chronological.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn llm(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Llm, content)
    }

    /// Parse a raw `(role, content)` pair as delivered by the host.
    pub fn from_pair(role: &str, content: impl Into<String>) -> Result<Self, AdapterError> {
        Ok(Self::new(role.parse()?, content))
    }
}

/// Parse a raw `[[role, content], ...]` history, failing on the first unknown role.
pub fn parse_history<'a, I>(pairs: I) -> Result<Vec<Turn>, AdapterError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs.into_iter().map(|(role, content)| Turn::from_pair(role, content)).collect()
}

/// Per-request override bundle. Only `description` is read here; other
/// host-defined fields ride along untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Persona {
    pub fn with_description(description: impl Into<String>) -> Self {
        Self { description: Some(description.into()), ..Self::default() }
    }
}

/// Vendor-ready prompt, built fresh for each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub system_prompt: String,
    pub chat_history: Vec<ChatTurn>,
    pub message: String,
}
