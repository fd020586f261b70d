//! Conversation aggregate: the full message history with one counterpart.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Message;
use crate::domain::foundation::{ConversationId, Timestamp, UserId, ValidationError};

/// Messaging platform a conversation lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Telegram,
    Instagram,
    Whatsapp,
}

impl PlatformKind {
    pub fn all() -> &'static [PlatformKind] {
        &[
            PlatformKind::Telegram,
            PlatformKind::Instagram,
            PlatformKind::Whatsapp,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Telegram => "telegram",
            PlatformKind::Instagram => "instagram",
            PlatformKind::Whatsapp => "whatsapp",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "telegram" => Ok(PlatformKind::Telegram),
            "instagram" => Ok(PlatformKind::Instagram),
            "whatsapp" => Ok(PlatformKind::Whatsapp),
            other => Err(ValidationError::invalid_format(
                "platform",
                format!("unknown platform '{}'", other),
            )),
        }
    }
}

/// Ordered message history with one counterpart, owned by a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    owner: UserId,
    platform: PlatformKind,
    /// Platform-specific chat identifier (dialog id, thread id, phone number).
    platform_ref: String,
    counterpart_name: String,
    messages: Vec<Message>,
}

impl Conversation {
    /// Creates an empty conversation.
    pub fn new(
        owner: UserId,
        platform: PlatformKind,
        platform_ref: impl Into<String>,
        counterpart_name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let platform_ref = platform_ref.into();
        if platform_ref.trim().is_empty() {
            return Err(ValidationError::empty_field("platform_ref"));
        }
        Ok(Self {
            id: ConversationId::new(),
            owner,
            platform,
            platform_ref,
            counterpart_name: counterpart_name.into(),
            messages: Vec::new(),
        })
    }

    /// Reconstitutes a conversation from storage.
    pub fn reconstitute(
        id: ConversationId,
        owner: UserId,
        platform: PlatformKind,
        platform_ref: String,
        counterpart_name: String,
        mut messages: Vec<Message>,
    ) -> Self {
        messages.sort_by_key(|m| m.timestamp);
        Self {
            id,
            owner,
            platform,
            platform_ref,
            counterpart_name,
            messages,
        }
    }

    /// Adds messages in bulk, keeping timestamp order and skipping known ids.
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        for message in messages {
            self.append(message);
        }
        self
    }

    /// Inserts a message at its time-ordered position.
    ///
    /// Returns false when a message with the same id is already present.
    pub fn append(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        let position = self
            .messages
            .partition_point(|m| m.timestamp <= message.timestamp);
        self.messages.insert(position, message);
        true
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn platform(&self) -> PlatformKind {
        self.platform
    }

    pub fn platform_ref(&self) -> &str {
        &self.platform_ref
    }

    pub fn counterpart_name(&self) -> &str {
        &self.counterpart_name
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

    /// Messages strictly newer than `since`.
    pub fn messages_after(&self, since: Timestamp) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.timestamp.is_after(&since))
            .cloned()
            .collect()
    }

    /// Total characters across all message bodies.
    pub fn total_chars(&self) -> usize {
        self.messages.iter().map(|m| m.text.chars().count()).sum()
    }

    pub fn last_message_at(&self) -> Option<Timestamp> {
        self.messages.last().map(|m| m.timestamp)
    }
}
