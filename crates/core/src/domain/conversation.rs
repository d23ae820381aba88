use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::ser::PrettyFormatter;

use crate::errors::DomainError;

pub const GREETING: &str = "Hello, I am Robin from Cleaner.io. How may I help you today?";
pub const DEFAULT_CONVERSATION_LABEL: &str = "Conversation 1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(alias = "AI")]
    Assistant,
    User,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Renders history documents the way they are stored on disk: JSON with a
/// four-space indent.
pub fn render_history_json<T>(value: &T) -> Result<String, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Append-only transcript of one conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// A new conversation opens with the assistant greeting.
    pub fn seeded() -> Self {
        Self { turns: vec![Turn::assistant(GREETING)] }
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// True when the last turn came from the user and has not been answered.
    pub fn awaiting_reply(&self) -> bool {
        matches!(self.last_turn(), Some(turn) if turn.role == Role::User)
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }
}

/// One user's conversations keyed by label, in insertion order.
///
/// Serialized as a JSON object whose key order follows insertion order, so the
/// first stored conversation stays first after a reload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationSet {
    entries: Vec<(String, Conversation)>,
}

impl ConversationSet {
    /// The set every new user starts with.
    pub fn seeded() -> Self {
        Self {
            entries: vec![(DEFAULT_CONVERSATION_LABEL.to_string(), Conversation::seeded())],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == label)
    }

    pub fn get(&self, label: &str) -> Option<&Conversation> {
        self.entries.iter().find(|(existing, _)| existing == label).map(|(_, conv)| conv)
    }

    pub(crate) fn get_mut(&mut self, label: &str) -> Option<&mut Conversation> {
        self.entries.iter_mut().find(|(existing, _)| existing == label).map(|(_, conv)| conv)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Conversation)> {
        self.entries.iter().map(|(label, conversation)| (label.as_str(), conversation))
    }

    pub fn first_label(&self) -> Option<&str> {
        self.entries.first().map(|(label, _)| label.as_str())
    }

    pub fn insert(
        &mut self,
        label: impl Into<String>,
        conversation: Conversation,
    ) -> Result<(), DomainError> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(DomainError::BlankLabel);
        }
        if self.contains(&label) {
            return Err(DomainError::DuplicateConversation { label });
        }
        self.entries.push((label, conversation));
        Ok(())
    }

    pub fn remove(&mut self, label: &str) -> Result<Conversation, DomainError> {
        let position = self
            .entries
            .iter()
            .position(|(existing, _)| existing == label)
            .ok_or_else(|| DomainError::ConversationNotFound { label: label.to_string() })?;
        Ok(self.entries.remove(position).1)
    }

    /// Next free `Conversation N` label, starting after `created_so_far`.
    pub fn next_default_label(&self, created_so_far: usize) -> String {
        let mut number = created_so_far + 1;
        loop {
            let candidate = format!("Conversation {number}");
            if !self.contains(&candidate) {
                return candidate;
            }
            number += 1;
        }
    }
}

impl Serialize for ConversationSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.entries.iter().map(|(label, conv)| (label, conv)))
    }
}

impl<'de> Deserialize<'de> for ConversationSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SetVisitor;

        impl<'de> Visitor<'de> for SetVisitor {
            type Value = ConversationSet;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of conversation labels to turn lists")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(String, Conversation)> = Vec::new();
                while let Some((label, conversation)) =
                    access.next_entry::<String, Conversation>()?
                {
                    // duplicate keys: last one wins, position of the first is kept
                    match entries.iter_mut().find(|(existing, _)| *existing == label) {
                        Some(entry) => entry.1 = conversation,
                        None => entries.push((label, conversation)),
                    }
                }
                Ok(ConversationSet { entries })
            }
        }

        deserializer.deserialize_map(SetVisitor)
    }
}
