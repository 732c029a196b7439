//! The room directory: fed by `RoomStatusUpdate` messages, queried by
//! clients, swept of stale finished entries.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::protocol::{RoomCode, RoomStatus, RoomStatusUpdate};

#[derive(Debug, Clone)]
struct DirectoryEntry {
    update: RoomStatusUpdate,
    /// Set when the room reported `finished`; drives retention
    finished_at: Option<DateTime<Utc>>,
}

/// Filters a client may apply to the room list.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomFilter {
    pub status: Option<RoomStatus>,
    /// waiting rooms with a free seat
    pub has_spots: bool,
    pub public_only: bool,
}

#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomCode, DirectoryEntry>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one status update. Returns true when the room was not listed
    /// before (a `created` delta rather than `updated`).
    pub fn upsert(&mut self, update: RoomStatusUpdate, now: DateTime<Utc>) -> bool {
        let finished_at = (update.status == RoomStatus::Finished).then_some(now);
        let code = update.code.clone();
        let created = !self.rooms.contains_key(&code);
        self.rooms.insert(
            code,
            DirectoryEntry {
                update,
                finished_at,
            },
        );
        created
    }

    /// Remove a room outright. Returns true when it was listed.
    pub fn remove(&mut self, code: &RoomCode) -> bool {
        self.rooms.remove(code).is_some()
    }

    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn get(&self, code: &RoomCode) -> Option<&RoomStatusUpdate> {
        self.rooms.get(code).map(|entry| &entry.update)
    }

    /// Directory order: playing first, then waiting, then paused, finished
    /// trailing for the recent-results view; busier (more watched) rooms
    /// first within a status.
    pub fn list(&self, filter: RoomFilter) -> Vec<RoomStatusUpdate> {
        let mut rooms: Vec<&RoomStatusUpdate> = self
            .rooms
            .values()
            .map(|entry| &entry.update)
            .filter(|room| filter.status.is_none_or(|s| room.status == s))
            .filter(|room| {
                !filter.has_spots
                    || (room.status == RoomStatus::Waiting
                        && room.player_count < usize::from(room.max_players))
            })
            .filter(|room| !filter.public_only || room.is_public)
            .collect();
        rooms.sort_by(|a, b| {
            status_rank(a.status)
                .cmp(&status_rank(b.status))
                .then_with(|| b.spectator_count.cmp(&a.spectator_count))
                .then_with(|| a.code.cmp(&b.code))
        });
        rooms.into_iter().cloned().collect()
    }

    /// Drop finished entries older than the retention window; returns the
    /// codes removed so the caller can fan out `closed` deltas.
    pub fn sweep_finished(&mut self, now: DateTime<Utc>, retention: Duration) -> Vec<RoomCode> {
        let expired: Vec<RoomCode> = self
            .rooms
            .iter()
            .filter(|(_, entry)| {
                entry
                    .finished_at
                    .is_some_and(|finished| now - finished >= retention)
            })
            .map(|(code, _)| code.clone())
            .collect();
        for code in &expired {
            self.rooms.remove(code);
        }
        expired
    }
}

fn status_rank(status: RoomStatus) -> u8 {
    match status {
        RoomStatus::Playing => 0,
        RoomStatus::Waiting => 1,
        RoomStatus::Paused => 2,
        RoomStatus::Finished => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::UserId;

    fn update(code: &str, status: RoomStatus, spectators: usize) -> RoomStatusUpdate {
        RoomStatusUpdate {
            code: RoomCode::parse(code).unwrap(),
            game: "dicee".to_string(),
            status,
            player_count: 2,
            spectator_count: spectators,
            max_players: 4,
            round_number: 1,
            total_rounds: 13,
            is_public: true,
            allow_spectators: true,
            players: vec![],
            host_id: UserId::from("h"),
            host_name: "Host".to_string(),
            updated_at: Utc::now(),
            paused_at: None,
            identity: None,
        }
    }

    #[test]
    fn sort_order_is_playing_waiting_paused() {
        let mut directory = RoomDirectory::new();
        let now = Utc::now();
        directory.upsert(update("AAAA22", RoomStatus::Paused, 0), now);
        directory.upsert(update("BBBB22", RoomStatus::Waiting, 0), now);
        directory.upsert(update("CCCC22", RoomStatus::Playing, 1), now);
        directory.upsert(update("DDDD22", RoomStatus::Playing, 5), now);

        let listed = directory.list(RoomFilter::default());
        let codes: Vec<&str> = listed.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["DDDD22", "CCCC22", "BBBB22", "AAAA22"]);
    }

    #[test]
    fn has_spots_filter_means_waiting_with_room() {
        let mut directory = RoomDirectory::new();
        let now = Utc::now();
        let mut full = update("AAAA22", RoomStatus::Waiting, 0);
        full.player_count = 4;
        directory.upsert(full, now);
        directory.upsert(update("BBBB22", RoomStatus::Waiting, 0), now);
        directory.upsert(update("CCCC22", RoomStatus::Playing, 0), now);

        let listed = directory.list(RoomFilter {
            has_spots: true,
            ..RoomFilter::default()
        });
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].code.as_str(), "BBBB22");
    }

    #[test]
    fn finished_rooms_expire_after_retention() {
        let mut directory = RoomDirectory::new();
        let start = Utc::now();
        directory.upsert(update("AAAA22", RoomStatus::Finished, 0), start);
        directory.upsert(update("BBBB22", RoomStatus::Playing, 0), start);

        assert!(directory
            .sweep_finished(start + Duration::seconds(30), Duration::seconds(60))
            .is_empty());
        let removed =
            directory.sweep_finished(start + Duration::seconds(61), Duration::seconds(60));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].as_str(), "AAAA22");
        assert!(directory.contains(&RoomCode::parse("BBBB22").unwrap()));
    }

    #[test]
    fn upsert_reports_created_once() {
        let mut directory = RoomDirectory::new();
        let now = Utc::now();
        assert!(directory.upsert(update("AAAA22", RoomStatus::Waiting, 0), now));
        assert!(!directory.upsert(update("AAAA22", RoomStatus::Playing, 0), now));
    }
}
