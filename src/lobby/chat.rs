//! Lobby chat: one text channel, per-user rolling-window rate limiting,
//! bounded history replayed to new joiners.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{LobbyConfig, ProtocolConfig};
use crate::protocol::validation::validate_chat_content;
use crate::protocol::{ChatMessage, ChatMessageKind, ErrorKind, UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("{0}")]
    Invalid(String),
    #[error("rate limit exceeded; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

impl ChatError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Invalid(_) => ErrorKind::Malformed,
            ChatError::RateLimited { .. } => ErrorKind::RateLimited,
        }
    }
}

/// Rolling-window rate limiter: at most `limit` accepted messages per user
/// in any `window`. Best-effort in-memory state; resets with the actor.
#[derive(Debug)]
pub struct ChatRateLimiter {
    limit: usize,
    window: Duration,
    accepted: HashMap<UserId, VecDeque<DateTime<Utc>>>,
}

impl ChatRateLimiter {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            limit: limit as usize,
            window: Duration::seconds(window_secs as i64),
            accepted: HashMap::new(),
        }
    }

    /// Record an attempt at `now`. `Ok` admits and counts the message.
    pub fn check(&mut self, user_id: &UserId, now: DateTime<Utc>) -> Result<(), ChatError> {
        let events = self.accepted.entry(user_id.clone()).or_default();
        while events.front().is_some_and(|&t| now - t >= self.window) {
            events.pop_front();
        }
        if events.len() >= self.limit {
            let retry_after = events
                .front()
                .map(|&oldest| (oldest + self.window) - now)
                .unwrap_or_else(Duration::zero);
            return Err(ChatError::RateLimited {
                retry_after_secs: retry_after.num_seconds().max(0) as u64,
            });
        }
        events.push_back(now);
        Ok(())
    }

    /// Forget a user entirely (explicit removal clears their counters).
    pub fn clear(&mut self, user_id: &UserId) {
        self.accepted.remove(user_id);
    }
}

#[derive(Debug)]
pub struct LobbyChat {
    history: VecDeque<ChatMessage>,
    cap: usize,
    limiter: ChatRateLimiter,
}

impl LobbyChat {
    pub fn new(config: &LobbyConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.chat_history),
            cap: config.chat_history,
            limiter: ChatRateLimiter::new(config.chat_rate_limit, config.chat_rate_window_secs),
        }
    }

    /// Validate, rate-limit and record one message.
    pub fn post(
        &mut self,
        user_id: &UserId,
        display_name: &str,
        content: &str,
        protocol: &ProtocolConfig,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage, ChatError> {
        let trimmed = validate_chat_content(content, protocol).map_err(ChatError::Invalid)?;
        self.limiter.check(user_id, now)?;
        let message = ChatMessage {
            id: Uuid::new_v4(),
            kind: ChatMessageKind::Text,
            user_id: user_id.clone(),
            display_name: display_name.to_string(),
            content: trimmed,
            timestamp: now,
            reactions: Default::default(),
        };
        self.history.push_back(message.clone());
        while self.history.len() > self.cap {
            self.history.pop_front();
        }
        Ok(message)
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.iter().cloned().collect()
    }

    pub fn forget_user(&mut self, user_id: &UserId) {
        self.limiter.clear(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat() -> LobbyChat {
        LobbyChat::new(&LobbyConfig::default())
    }

    #[test]
    fn accepts_up_to_the_limit_in_a_window() {
        let mut chat = chat();
        let user = UserId::from("chatty");
        let now = Utc::now();
        for i in 0..30 {
            assert!(
                chat.post(&user, "Chatty", &format!("msg {i}"), &ProtocolConfig::default(), now)
                    .is_ok(),
                "message {i} should be admitted"
            );
        }
        let err = chat
            .post(&user, "Chatty", "one too many", &ProtocolConfig::default(), now)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[test]
    fn window_rolls_forward() {
        let mut chat = chat();
        let user = UserId::from("chatty");
        let start = Utc::now();
        for _ in 0..30 {
            chat.post(&user, "Chatty", "hi", &ProtocolConfig::default(), start)
                .unwrap();
        }
        // 61 seconds on, the window has emptied
        let later = start + Duration::seconds(61);
        assert!(chat
            .post(&user, "Chatty", "fresh window", &ProtocolConfig::default(), later)
            .is_ok());
    }

    #[test]
    fn rejected_messages_do_not_count() {
        let mut chat = chat();
        let user = UserId::from("spacey");
        let now = Utc::now();
        for _ in 0..50 {
            // Whitespace-only: invalid, must not consume quota
            let err = chat
                .post(&user, "Spacey", "   ", &ProtocolConfig::default(), now)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Malformed);
        }
        assert!(chat
            .post(&user, "Spacey", "still allowed", &ProtocolConfig::default(), now)
            .is_ok());
    }

    #[test]
    fn history_is_bounded_to_fifty() {
        let mut chat = chat();
        let now = Utc::now();
        for i in 0..60 {
            // Ten users so nobody trips the rate limit
            let user = UserId(format!("user-{}", i % 10));
            chat.post(&user, "User", &format!("msg {i}"), &ProtocolConfig::default(), now)
                .unwrap();
        }
        let history = chat.history();
        assert_eq!(history.len(), 50);
        assert_eq!(history.first().unwrap().content, "msg 10");
    }
}
