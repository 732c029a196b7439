//! In-room chat: a player stream everyone sees, a separate spectator
//! stream, bounded history, and reactions over the fixed emoji set.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::ProtocolConfig;
use crate::protocol::validation::validate_chat_content;
use crate::protocol::{
    is_allowed_reaction, quick_chat_phrase, ChatMessage, ChatMessageKind, ChatScope, ErrorKind,
    MessageId, ReactionOp, RoomEvent, UserId,
};

use super::RoomActor;

#[derive(Debug)]
struct ChatLog {
    messages: VecDeque<ChatMessage>,
    cap: usize,
}

impl ChatLog {
    fn new(cap: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(cap),
            cap,
        }
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        // Reactions die with the message they decorated
        while self.messages.len() > self.cap {
            self.messages.pop_front();
        }
    }

    fn find_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    fn history(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }
}

#[derive(Debug)]
pub(super) struct RoomChat {
    player: ChatLog,
    spectator: ChatLog,
}

impl RoomChat {
    pub(super) fn new(cap: usize) -> Self {
        Self {
            player: ChatLog::new(cap),
            spectator: ChatLog::new(cap),
        }
    }

    pub(super) fn player_message(
        &mut self,
        user_id: &UserId,
        display_name: &str,
        content: Option<String>,
        quick_key: Option<String>,
        config: &ProtocolConfig,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage, (ErrorKind, String)> {
        let (kind, text) = match (content, quick_key) {
            (_, Some(key)) => {
                let phrase = quick_chat_phrase(&key).ok_or((
                    ErrorKind::Malformed,
                    format!("Unknown quick chat key '{key}'"),
                ))?;
                (ChatMessageKind::Quick, phrase.to_string())
            }
            (Some(content), None) => {
                let trimmed = validate_chat_content(&content, config)
                    .map_err(|reason| (ErrorKind::Malformed, reason))?;
                (ChatMessageKind::Text, trimmed)
            }
            (None, None) => {
                return Err((
                    ErrorKind::Malformed,
                    "Chat needs content or a quick key".to_string(),
                ));
            }
        };

        let message = ChatMessage {
            id: Uuid::new_v4(),
            kind,
            user_id: user_id.clone(),
            display_name: display_name.to_string(),
            content: text,
            timestamp: now,
            reactions: Default::default(),
        };
        self.player.push(message.clone());
        Ok(message)
    }

    pub(super) fn spectator_message(
        &mut self,
        user_id: &UserId,
        display_name: &str,
        content: &str,
        config: &ProtocolConfig,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage, (ErrorKind, String)> {
        let trimmed = validate_chat_content(content, config)
            .map_err(|reason| (ErrorKind::Malformed, reason))?;
        let message = ChatMessage {
            id: Uuid::new_v4(),
            kind: ChatMessageKind::Text,
            user_id: user_id.clone(),
            display_name: display_name.to_string(),
            content: trimmed,
            timestamp: now,
            reactions: Default::default(),
        };
        self.spectator.push(message.clone());
        Ok(message)
    }

    pub(super) fn system_message(&mut self, text: &str, now: DateTime<Utc>) -> ChatMessage {
        let message = ChatMessage::system(text, now);
        self.player.push(message.clone());
        message
    }

    /// Add or remove a reaction on a retained player-stream message.
    pub(super) fn react(
        &mut self,
        user_id: &UserId,
        message_id: MessageId,
        emoji: &str,
        op: ReactionOp,
    ) -> Result<(), (ErrorKind, String)> {
        if !is_allowed_reaction(emoji) {
            return Err((
                ErrorKind::Malformed,
                format!("'{emoji}' is not in the reaction set"),
            ));
        }
        let Some(message) = self.player.find_mut(message_id) else {
            return Err((
                ErrorKind::NotFound,
                "Message is gone or was never here".to_string(),
            ));
        };
        let users = message.reactions.entry(emoji.to_string()).or_default();
        match op {
            ReactionOp::Add => {
                users.insert(user_id.clone());
            }
            ReactionOp::Remove => {
                users.remove(user_id);
                if users.is_empty() {
                    message.reactions.remove(emoji);
                }
            }
        }
        Ok(())
    }

    pub(super) fn player_history(&self) -> Vec<ChatMessage> {
        self.player.history()
    }

    pub(super) fn spectator_history(&self) -> Vec<ChatMessage> {
        self.spectator.history()
    }
}

impl RoomActor {
    /// Append a system line to the player stream and tell everyone.
    pub(super) async fn post_system_chat(&mut self, text: &str) {
        let message = self.chat.system_message(text, self.clock.now());
        self.broadcast(&RoomEvent::ChatMessage {
            scope: ChatScope::Player,
            message,
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProtocolConfig {
        ProtocolConfig::default()
    }

    #[test]
    fn free_text_is_validated_and_trimmed() {
        let mut chat = RoomChat::new(10);
        let message = chat
            .player_message(
                &UserId::from("u"),
                "User",
                Some("  hi there  ".to_string()),
                None,
                &config(),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(message.content, "hi there");
        assert_eq!(message.kind, ChatMessageKind::Text);
    }

    #[test]
    fn quick_keys_resolve_to_phrases() {
        let mut chat = RoomChat::new(10);
        let message = chat
            .player_message(
                &UserId::from("u"),
                "User",
                None,
                Some("gg".to_string()),
                &config(),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(message.content, "Good game!");
        assert_eq!(message.kind, ChatMessageKind::Quick);
    }

    #[test]
    fn history_is_bounded_and_drops_reactions_with_messages() {
        let mut chat = RoomChat::new(2);
        let first = chat
            .player_message(
                &UserId::from("u"),
                "User",
                Some("one".to_string()),
                None,
                &config(),
                Utc::now(),
            )
            .unwrap();
        chat.react(&UserId::from("v"), first.id, "🎲", ReactionOp::Add)
            .unwrap();
        for text in ["two", "three"] {
            chat.player_message(
                &UserId::from("u"),
                "User",
                Some(text.to_string()),
                None,
                &config(),
                Utc::now(),
            )
            .unwrap();
        }
        assert_eq!(chat.player_history().len(), 2);
        // The reacted-to message fell out of the window with its reactions
        assert!(chat
            .react(&UserId::from("v"), first.id, "🎲", ReactionOp::Remove)
            .is_err());
    }

    #[test]
    fn reactions_enforce_the_fixed_set() {
        let mut chat = RoomChat::new(10);
        let message = chat
            .player_message(
                &UserId::from("u"),
                "User",
                Some("hello".to_string()),
                None,
                &config(),
                Utc::now(),
            )
            .unwrap();
        let err = chat
            .react(&UserId::from("v"), message.id, "💀", ReactionOp::Add)
            .unwrap_err();
        assert_eq!(err.0, ErrorKind::Malformed);
        assert!(chat
            .react(&UserId::from("v"), message.id, "🔥", ReactionOp::Add)
            .is_ok());
    }

    #[test]
    fn spectator_stream_is_separate() {
        let mut chat = RoomChat::new(10);
        chat.spectator_message(
            &UserId::from("s"),
            "Watcher",
            "nice game",
            &config(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(chat.spectator_history().len(), 1);
        assert!(chat.player_history().is_empty());
    }
}
