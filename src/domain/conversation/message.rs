//! Message entity.
//!
//! Messages are immutable records of one turn in a conversation, sent either
//! by the account owner or by the counterpart.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{MessageId, Timestamp};

/// Who sent a message, relative to the account owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    /// The account owner (the side the automation speaks for).
    User,
    /// The other participant.
    Counterpart,
}

impl SenderRole {
    /// Label used when rendering transcripts into prompts.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            SenderRole::User => "You",
            SenderRole::Counterpart => "Them",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: SenderRole,
    pub text: String,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub has_attachment: bool,
}

impl Message {
    /// Creates a new message with a fresh id.
    pub fn new(sender: SenderRole, text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            text: text.into(),
            timestamp,
            has_attachment: false,
        }
    }

    /// Creates a message sent by the account owner.
    pub fn from_user(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(SenderRole::User, text, timestamp)
    }

    /// Creates a message sent by the counterpart.
    pub fn from_counterpart(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(SenderRole::Counterpart, text, timestamp)
    }

    /// Replaces the generated id (for messages loaded from a platform or store).
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    /// Marks the message as carrying an attachment.
    pub fn with_attachment(mut self) -> Self {
        self.has_attachment = true;
        self
    }

    pub fn is_from_user(&self) -> bool {
        self.sender == SenderRole::User
    }

    pub fn is_from_counterpart(&self) -> bool {
        self.sender == SenderRole::Counterpart
    }

    /// Renders the message as a `You: ...` / `Them: ...` transcript line.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.sender.prompt_label(), self.text)
    }
}
