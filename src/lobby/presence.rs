//! Unique-user presence derived from live connections.
//!
//! Multi-tab is normal: a user with three lobby tabs is one online user.
//! Join broadcasts fire on the first concurrent connection only, leave
//! broadcasts on the last close only.

use std::collections::{HashMap, HashSet};

use crate::protocol::{ConnectionId, Identity, OnlineUser, UserId};

#[derive(Debug, Default)]
pub struct PresenceTracker {
    by_user: HashMap<UserId, PresenceEntry>,
    by_connection: HashMap<ConnectionId, UserId>,
}

#[derive(Debug)]
struct PresenceEntry {
    display_name: String,
    connections: HashSet<ConnectionId>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns true when this is the user's first
    /// concurrent connection (the moment to broadcast a join).
    pub fn connect(&mut self, conn_id: ConnectionId, identity: &Identity) -> bool {
        self.by_connection.insert(conn_id, identity.user_id.clone());
        let entry = self
            .by_user
            .entry(identity.user_id.clone())
            .or_insert_with(|| PresenceEntry {
                display_name: identity.display_name.clone(),
                connections: HashSet::new(),
            });
        entry.display_name = identity.display_name.clone();
        entry.connections.insert(conn_id);
        entry.connections.len() == 1
    }

    /// Deregister a connection. Returns the user id when this was their
    /// last connection (the moment to broadcast a leave).
    pub fn disconnect(&mut self, conn_id: ConnectionId) -> Option<UserId> {
        let user_id = self.by_connection.remove(&conn_id)?;
        let entry = self.by_user.get_mut(&user_id)?;
        entry.connections.remove(&conn_id);
        if entry.connections.is_empty() {
            self.by_user.remove(&user_id);
            Some(user_id)
        } else {
            None
        }
    }

    pub fn user_of(&self, conn_id: ConnectionId) -> Option<&UserId> {
        self.by_connection.get(&conn_id)
    }

    /// Count of distinct online users.
    pub fn online_count(&self) -> usize {
        self.by_user.len()
    }

    pub fn online_users(&self) -> Vec<OnlineUser> {
        let mut users: Vec<OnlineUser> = self
            .by_user
            .iter()
            .map(|(user_id, entry)| OnlineUser {
                user_id: user_id.clone(),
                display_name: entry.display_name.clone(),
            })
            .collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        users
    }

    /// All connection ids belonging to one user.
    pub fn connections_of(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.by_user
            .get(user_id)
            .map(|entry| entry.connections.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.by_user.contains_key(user_id)
    }
}
