//! Invites and join requests: ephemeral, idempotent social plumbing.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::protocol::{Invite, InviteId, JoinRequest, JoinRequestId, RoomCode, UserId};

/// Outstanding invites, idempotent per (from, to, room).
#[derive(Debug, Default)]
pub struct InviteBook {
    invites: HashMap<InviteId, Invite>,
}

impl InviteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an invite. A live duplicate for the same (from, to, room)
    /// triple is a conflict and returns the existing invite's id.
    pub fn create(
        &mut self,
        from_user_id: UserId,
        from_display_name: String,
        to_user_id: UserId,
        room_code: RoomCode,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Invite, InviteId> {
        if let Some(existing) = self.invites.values().find(|invite| {
            invite.from_user_id == from_user_id
                && invite.to_user_id == to_user_id
                && invite.room_code == room_code
                && invite.expires_at > now
        }) {
            return Err(existing.id);
        }
        let invite = Invite {
            id: Uuid::new_v4(),
            room_code,
            from_user_id,
            from_display_name,
            to_user_id,
            created_at: now,
            expires_at: now + ttl,
        };
        self.invites.insert(invite.id, invite.clone());
        Ok(invite)
    }

    /// Revoke an invite if the caller sent it.
    pub fn cancel(&mut self, invite_id: InviteId, caller: &UserId) -> Option<Invite> {
        let owned = self
            .invites
            .get(&invite_id)
            .is_some_and(|invite| &invite.from_user_id == caller);
        if !owned {
            return None;
        }
        self.invites.remove(&invite_id)
    }

    /// Drop expired invites, returning them for cancellation fan-out.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<Invite> {
        let expired: Vec<InviteId> = self
            .invites
            .values()
            .filter(|invite| invite.expires_at <= now)
            .map(|invite| invite.id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.invites.remove(&id))
            .collect()
    }
}

/// Pending join requests: at most one per user; a newer request cancels the
/// prior one.
#[derive(Debug, Default)]
pub struct JoinRequestBook {
    by_user: HashMap<UserId, JoinRequest>,
}

impl JoinRequestBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a request. Returns the new request and, when the user already
    /// had one pending, the superseded request.
    pub fn file(
        &mut self,
        user_id: UserId,
        display_name: String,
        avatar_seed: String,
        room_code: RoomCode,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> (JoinRequest, Option<JoinRequest>) {
        let request = JoinRequest {
            id: Uuid::new_v4(),
            room_code,
            user_id: user_id.clone(),
            display_name,
            avatar_seed,
            created_at: now,
            expires_at: now + ttl,
        };
        let prior = self.by_user.insert(user_id, request.clone());
        (request, prior)
    }

    /// Withdraw a request if the caller owns it.
    pub fn cancel(&mut self, request_id: JoinRequestId, caller: &UserId) -> Option<JoinRequest> {
        let owned = self
            .by_user
            .get(caller)
            .is_some_and(|request| request.id == request_id);
        if !owned {
            return None;
        }
        self.by_user.remove(caller)
    }

    /// Remove a request after resolution (approval or decline).
    pub fn resolve(&mut self, request_id: JoinRequestId) -> Option<JoinRequest> {
        let user = self
            .by_user
            .iter()
            .find(|(_, request)| request.id == request_id)
            .map(|(user, _)| user.clone())?;
        self.by_user.remove(&user)
    }

    pub fn pending_of(&self, user_id: &UserId) -> Option<&JoinRequest> {
        self.by_user.get(user_id)
    }

    /// Drop expired requests, returning them for cancellation fan-out.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<JoinRequest> {
        let expired: Vec<UserId> = self
            .by_user
            .iter()
            .filter(|(_, request)| request.expires_at <= now)
            .map(|(user, _)| user.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|user| self.by_user.remove(&user))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_invites_collide() {
        let mut book = InviteBook::new();
        let now = Utc::now();
        let ttl = Duration::minutes(5);
        let first = book
            .create(
                UserId::from("a"),
                "A".to_string(),
                UserId::from("b"),
                RoomCode::parse("ABC234").unwrap(),
                ttl,
                now,
            )
            .unwrap();
        let dup = book.create(
            UserId::from("a"),
            "A".to_string(),
            UserId::from("b"),
            RoomCode::parse("ABC234").unwrap(),
            ttl,
            now + Duration::seconds(10),
        );
        assert_eq!(dup, Err(first.id));
    }

    #[test]
    fn expired_invites_stop_colliding_and_sweep_out() {
        let mut book = InviteBook::new();
        let start = Utc::now();
        let ttl = Duration::minutes(5);
        book.create(
            UserId::from("a"),
            "A".to_string(),
            UserId::from("b"),
            RoomCode::parse("ABC234").unwrap(),
            ttl,
            start,
        )
        .unwrap();
        let later = start + Duration::minutes(6);
        assert!(book
            .create(
                UserId::from("a"),
                "A".to_string(),
                UserId::from("b"),
                RoomCode::parse("ABC234").unwrap(),
                ttl,
                later,
            )
            .is_ok());
        // The stale one sweeps out; the fresh one stays
        assert_eq!(book.sweep(later).len(), 1);
    }

    #[test]
    fn cancel_requires_ownership() {
        let mut book = InviteBook::new();
        let invite = book
            .create(
                UserId::from("a"),
                "A".to_string(),
                UserId::from("b"),
                RoomCode::parse("ABC234").unwrap(),
                Duration::minutes(5),
                Utc::now(),
            )
            .unwrap();
        assert!(book.cancel(invite.id, &UserId::from("b")).is_none());
        assert!(book.cancel(invite.id, &UserId::from("a")).is_some());
    }

    #[test]
    fn newer_join_request_supersedes_prior() {
        let mut book = JoinRequestBook::new();
        let now = Utc::now();
        let ttl = Duration::minutes(2);
        let (first, none) = book.file(
            UserId::from("u"),
            "U".to_string(),
            "seed".to_string(),
            RoomCode::parse("ABC234").unwrap(),
            ttl,
            now,
        );
        assert!(none.is_none());
        let (second, superseded) = book.file(
            UserId::from("u"),
            "U".to_string(),
            "seed".to_string(),
            RoomCode::parse("DEF234").unwrap(),
            ttl,
            now,
        );
        assert_eq!(superseded.unwrap().id, first.id);
        assert_eq!(book.pending_of(&UserId::from("u")).unwrap().id, second.id);
    }
}
