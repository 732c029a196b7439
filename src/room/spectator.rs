//! Spectator participation: rooting, winner predictions, and the seat queue.

use std::collections::HashMap;

use crate::game::RankingEntry;
use crate::protocol::{
    ConnectionId, ErrorKind, PredictionResult, RoomEvent, SpectatorView, UserId,
};

use super::{Connection, RoomActor};

#[derive(Debug, Clone)]
struct SpectatorEntry {
    display_name: String,
    rooting_for: Option<UserId>,
    prediction: Option<UserId>,
}

/// Per-user spectator bookkeeping; multi-tab connections share one entry.
#[derive(Debug, Default)]
pub(super) struct SpectatorRoster {
    entries: HashMap<UserId, SpectatorEntry>,
    /// Seat queue, head first
    queue: Vec<UserId>,
}

impl SpectatorRoster {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn add(&mut self, user_id: &UserId, display_name: &str) {
        self.entries
            .entry(user_id.clone())
            .or_insert_with(|| SpectatorEntry {
                display_name: display_name.to_string(),
                rooting_for: None,
                prediction: None,
            });
    }

    pub(super) fn remove(&mut self, user_id: &UserId) {
        self.entries.remove(user_id);
        self.queue.retain(|u| u != user_id);
    }

    pub(super) fn set_rooting(&mut self, user_id: &UserId, target: UserId) -> bool {
        match self.entries.get_mut(user_id) {
            Some(entry) => {
                entry.rooting_for = Some(target);
                true
            }
            None => false,
        }
    }

    pub(super) fn set_prediction(&mut self, user_id: &UserId, winner: UserId) -> bool {
        match self.entries.get_mut(user_id) {
            Some(entry) => {
                entry.prediction = Some(winner);
                true
            }
            None => false,
        }
    }

    pub(super) fn enqueue(&mut self, user_id: &UserId) -> Result<usize, ()> {
        if !self.entries.contains_key(user_id) {
            return Err(());
        }
        if let Some(pos) = self.queue.iter().position(|u| u == user_id) {
            return Ok(pos);
        }
        self.queue.push(user_id.clone());
        Ok(self.queue.len() - 1)
    }

    pub(super) fn dequeue(&mut self, user_id: &UserId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|u| u != user_id);
        self.queue.len() != before
    }

    pub(super) fn pop_queue_head(&mut self) -> Option<(UserId, String)> {
        while !self.queue.is_empty() {
            let user_id = self.queue.remove(0);
            if let Some(entry) = self.entries.get(&user_id) {
                return Some((user_id, entry.display_name.clone()));
            }
        }
        None
    }

    pub(super) fn view(&self, user_id: &UserId) -> Option<SpectatorView> {
        let entry = self.entries.get(user_id)?;
        let queue_position = self.queue.iter().position(|u| u == user_id);
        Some(SpectatorView {
            user_id: user_id.clone(),
            display_name: entry.display_name.clone(),
            rooting_for: entry.rooting_for.clone(),
            in_queue: queue_position.is_some(),
            queue_position,
        })
    }

    pub(super) fn views(&self) -> Vec<SpectatorView> {
        let mut views: Vec<SpectatorView> = self
            .entries
            .keys()
            .filter_map(|user_id| self.view(user_id))
            .collect();
        views.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        views
    }

    /// Unique spectating users among live connections.
    pub(super) fn unique_users(&self, connections: &HashMap<ConnectionId, Connection>) -> usize {
        use crate::protocol::Role;
        let mut users: Vec<&UserId> = connections
            .values()
            .filter(|c| c.role == Role::Spectator)
            .map(|c| &c.user_id)
            .collect();
        users.sort_unstable();
        users.dedup();
        users.len()
    }

    /// Resolve recorded predictions against the final rankings.
    pub(super) fn resolve_predictions(&self, rankings: &[RankingEntry]) -> Vec<PredictionResult> {
        let winner = rankings.first().map(|r| &r.user_id);
        let mut results: Vec<PredictionResult> = self
            .entries
            .iter()
            .filter_map(|(user_id, entry)| {
                let predicted = entry.prediction.clone()?;
                Some(PredictionResult {
                    user_id: user_id.clone(),
                    display_name: entry.display_name.clone(),
                    correct: Some(&predicted) == winner,
                    predicted,
                })
            })
            .collect();
        results.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        results
    }
}

impl RoomActor {
    pub(super) async fn handle_predict(
        &mut self,
        conn_id: ConnectionId,
        user_id: &UserId,
        winner: UserId,
    ) {
        if self.state.rankings.is_some() {
            self.send_error(conn_id, ErrorKind::IllegalState, "The game is already decided")
                .await;
            return;
        }
        if self.state.round_number >= crate::game::MAX_TURNS {
            self.send_error(conn_id, ErrorKind::IllegalState, "Too late to call the winner")
                .await;
            return;
        }
        let valid_target = self
            .state
            .player(&winner)
            .is_some_and(|p| p.is_active());
        if !valid_target {
            self.send_error(conn_id, ErrorKind::NotFound, "No such player to bet on")
                .await;
            return;
        }
        if self.spectators.set_prediction(user_id, winner.clone()) {
            self.broadcast_spectators(&RoomEvent::PredictionRecorded {
                user_id: user_id.clone(),
                predicted: winner,
            })
            .await;
        } else {
            self.send_error(conn_id, ErrorKind::IllegalState, "Join as a spectator first")
                .await;
        }
    }

    pub(super) async fn handle_root_for(
        &mut self,
        conn_id: ConnectionId,
        user_id: &UserId,
        target: UserId,
    ) {
        let valid_target = self
            .state
            .player(&target)
            .is_some_and(|p| p.is_active());
        if !valid_target {
            self.send_error(conn_id, ErrorKind::NotFound, "No such player to root for")
                .await;
            return;
        }
        if self.spectators.set_rooting(user_id, target) {
            if let Some(spectator) = self.spectators.view(user_id) {
                self.broadcast(&RoomEvent::SpectatorJoined { spectator }).await;
            }
        } else {
            self.send_error(conn_id, ErrorKind::IllegalState, "Join as a spectator first")
                .await;
        }
    }

    pub(super) async fn handle_queue_join(&mut self, conn_id: ConnectionId, user_id: &UserId) {
        match self.spectators.enqueue(user_id) {
            Ok(_) => {
                self.broadcast(&RoomEvent::QueueUpdated {
                    queue: self.spectators.views().into_iter().filter(|v| v.in_queue).collect(),
                })
                .await;
                // A free seat during waiting admits the head immediately
                self.promote_from_queue().await;
            }
            Err(()) => {
                self.send_error(conn_id, ErrorKind::IllegalState, "Join as a spectator first")
                    .await;
            }
        }
    }

    pub(super) async fn handle_queue_leave(&mut self, conn_id: ConnectionId, user_id: &UserId) {
        if self.spectators.dequeue(user_id) {
            self.broadcast(&RoomEvent::QueueUpdated {
                queue: self.spectators.views().into_iter().filter(|v| v.in_queue).collect(),
            })
            .await;
        } else {
            self.send_error(conn_id, ErrorKind::NotFound, "You are not in the queue")
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_is_fifo_and_self_cleaning() {
        let mut roster = SpectatorRoster::new();
        roster.add(&UserId::from("a"), "A");
        roster.add(&UserId::from("b"), "B");
        assert_eq!(roster.enqueue(&UserId::from("a")), Ok(0));
        assert_eq!(roster.enqueue(&UserId::from("b")), Ok(1));
        // Re-queueing keeps the original position
        assert_eq!(roster.enqueue(&UserId::from("a")), Ok(0));

        roster.remove(&UserId::from("a"));
        let (head, _) = roster.pop_queue_head().unwrap();
        assert_eq!(head, UserId::from("b"));
        assert!(roster.pop_queue_head().is_none());
    }

    #[test]
    fn predictions_resolve_against_the_winner() {
        let mut roster = SpectatorRoster::new();
        roster.add(&UserId::from("s1"), "S1");
        roster.add(&UserId::from("s2"), "S2");
        roster.set_prediction(&UserId::from("s1"), UserId::from("alice"));
        roster.set_prediction(&UserId::from("s2"), UserId::from("bob"));
        let rankings = vec![
            RankingEntry {
                rank: 1,
                user_id: UserId::from("alice"),
                display_name: "Alice".to_string(),
                grand_total: 240,
            },
            RankingEntry {
                rank: 2,
                user_id: UserId::from("bob"),
                display_name: "Bob".to_string(),
                grand_total: 180,
            },
        ];
        let results = roster.resolve_predictions(&rankings);
        assert_eq!(results.len(), 2);
        assert!(results.iter().find(|r| r.user_id == UserId::from("s1")).unwrap().correct);
        assert!(!results.iter().find(|r| r.user_id == UserId::from("s2")).unwrap().correct);
    }

    #[test]
    fn rooting_requires_membership() {
        let mut roster = SpectatorRoster::new();
        assert!(!roster.set_rooting(&UserId::from("ghost"), UserId::from("x")));
        roster.add(&UserId::from("s"), "S");
        assert!(roster.set_rooting(&UserId::from("s"), UserId::from("x")));
        assert_eq!(
            roster.view(&UserId::from("s")).unwrap().rooting_for,
            Some(UserId::from("x"))
        );
    }
}
