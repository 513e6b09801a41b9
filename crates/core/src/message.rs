//! Message and Conversation domain types.
//!
//! A conversation is the append-only log of one request:
//! user request → assistant requests actions → action results → ... → final answer.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (one per request).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request from the reasoning step to invoke a named action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    /// Unique ID for this call within the conversation
    pub id: String,

    /// Name of the action to invoke
    pub name: String,

    /// Structured arguments
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ActionCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Generate a fresh call id.
    pub fn generate_id() -> String {
        format!("call_{}", Uuid::new_v4().simple())
    }
}

/// A single entry in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// The initiating request. Always first, exactly once.
    User { text: String },

    /// Reasoning output that requests actions. `text` may be empty.
    AssistantRequest {
        #[serde(default)]
        text: String,
        actions: Vec<ActionCall>,
    },

    /// The outcome of one action call.
    ActionResult {
        action_id: String,
        action_name: String,
        payload: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },

    /// Terminal message of a successful run.
    AssistantFinal { text: String },
}

impl Message {
    /// Build a successful action result.
    pub fn action_result(call: &ActionCall, payload: serde_json::Value) -> Self {
        Self::ActionResult {
            action_id: call.id.clone(),
            action_name: call.name.clone(),
            payload,
            is_error: false,
        }
    }

    /// Build an error action result from a tool error.
    pub fn action_error(call: &ActionCall, error: &crate::ToolError) -> Self {
        Self::ActionResult {
            action_id: call.id.clone(),
            action_name: call.name.clone(),
            payload: error.to_payload(),
            is_error: true,
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::AssistantRequest { .. } => "assistant_request",
            Self::ActionResult { .. } => "action_result",
            Self::AssistantFinal { .. } => "assistant_final",
        }
    }
}

/// Structural problems detected by [`Conversation::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("conversation must start with exactly one user message")]
    UserNotFirst,

    #[error("duplicate action id: {0}")]
    DuplicateActionId(String),

    #[error("result for unknown or already answered action: {0}")]
    UnexpectedResult(String),

    #[error("assistant output while actions are pending: {0:?}")]
    PendingActions(Vec<String>),

    #[error("message after final answer")]
    AfterFinal,
}

/// The ordered, append-only message log of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation from the user's request.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: ConversationId::new(),
            created_at: Utc::now(),
            messages: vec![Message::User { text: text.into() }],
        }
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The user's request text.
    pub fn user_text(&self) -> &str {
        match self.messages.first() {
            Some(Message::User { text }) => text,
            _ => "",
        }
    }

    /// Final answer, if the run completed.
    pub fn final_text(&self) -> Option<&str> {
        match self.messages.last() {
            Some(Message::AssistantFinal { text }) => Some(text),
            _ => None,
        }
    }

    /// Action ids requested by the latest assistant request that have no result yet.
    pub fn pending_action_ids(&self) -> Vec<String> {
        let Some(start) = self
            .messages
            .iter()
            .rposition(|m| matches!(m, Message::AssistantRequest { .. }))
        else {
            return Vec::new();
        };

        let Message::AssistantRequest { actions, .. } = &self.messages[start] else {
            return Vec::new();
        };

        let answered: HashSet<&str> = self.messages[start + 1..]
            .iter()
            .filter_map(|m| match m {
                Message::ActionResult { action_id, .. } => Some(action_id.as_str()),
                _ => None,
            })
            .collect();

        actions
            .iter()
            .filter(|a| !answered.contains(a.id.as_str()))
            .map(|a| a.id.clone())
            .collect()
    }

    /// Distinct action names in order of first use.
    pub fn used_tools(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for message in &self.messages {
            if let Message::AssistantRequest { actions, .. } = message {
                for action in actions {
                    if seen.insert(action.name.as_str()) {
                        names.push(action.name.clone());
                    }
                }
            }
        }
        names
    }

    /// Validate the structure of the whole log.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut iter = self.messages.iter();
        if !matches!(iter.next(), Some(Message::User { .. })) {
            return Err(InvariantViolation::UserNotFirst);
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&str> = Vec::new();
        let mut finished = false;

        for message in iter {
            if finished {
                return Err(InvariantViolation::AfterFinal);
            }
            match message {
                Message::User { .. } => return Err(InvariantViolation::UserNotFirst),
                Message::AssistantRequest { actions, .. } => {
                    if !pending.is_empty() {
                        return Err(InvariantViolation::PendingActions(
                            pending.iter().map(|s| s.to_string()).collect(),
                        ));
                    }
                    for action in actions {
                        if !seen_ids.insert(action.id.as_str()) {
                            return Err(InvariantViolation::DuplicateActionId(action.id.clone()));
                        }
                        pending.push(action.id.as_str());
                    }
                }
                Message::ActionResult { action_id, .. } => {
                    match pending.iter().position(|id| *id == action_id) {
                        Some(idx) => {
                            pending.remove(idx);
                        }
                        None => return Err(InvariantViolation::UnexpectedResult(action_id.clone())),
                    }
                }
                Message::AssistantFinal { .. } => {
                    if !pending.is_empty() {
                        return Err(InvariantViolation::PendingActions(
                            pending.iter().map(|s| s.to_string()).collect(),
                        ));
                    }
                    finished = true;
                }
            }
        }

        Ok(())
    }
}
