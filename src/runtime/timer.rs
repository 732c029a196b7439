/// Token attached to every scheduled timer.
///
/// Timers post their token back to the actor's mailbox when they fire; the
/// actor compares it against the current token for that subject and ignores
/// stale ones. Cancelling is therefore just issuing a new token.
pub type TimerToken = u64;

/// Monotonic token source, one per timed subject (countdown, AFK, each
/// player's grace period, AI pacing).
#[derive(Debug, Default, Clone)]
pub struct TimerTokens {
    counter: TimerToken,
}

impl TimerTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next token, invalidating any timer holding an older one.
    pub fn issue(&mut self) -> TimerToken {
        self.counter += 1;
        self.counter
    }

    /// Does `token` belong to the most recently scheduled timer?
    pub fn is_current(&self, token: TimerToken) -> bool {
        self.counter == token
    }

    /// Invalidate all outstanding timers for this subject.
    pub fn invalidate(&mut self) {
        self.counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_tokens_invalidate_older_ones() {
        let mut tokens = TimerTokens::new();
        let first = tokens.issue();
        assert!(tokens.is_current(first));
        let second = tokens.issue();
        assert!(!tokens.is_current(first));
        assert!(tokens.is_current(second));
    }

    #[test]
    fn invalidate_without_reschedule() {
        let mut tokens = TimerTokens::new();
        let token = tokens.issue();
        tokens.invalidate();
        assert!(!tokens.is_current(token));
    }
}
