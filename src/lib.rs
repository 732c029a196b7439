#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Dicee Arena Server
//!
//! A realtime multiplayer dice-game backend built from two kinds of
//! cooperating actors: a singleton lobby (directory, presence, chat,
//! invites) and one game room per room code (authoritative turn-based
//! state, reconnection, AFK handling, AI opponents).
//!
//! Clients hold one WebSocket per actor; all state is actor-local and
//! cross-actor coordination happens by message passing.

/// AI decision engine: brains that drive non-human players
pub mod ai;

/// Server configuration and environment variables
pub mod config;

/// Dice, scoring, scorecards and the authoritative game state machine
pub mod game;

/// Global lobby actor: directory, presence, chat, invites
pub mod lobby;

/// Structured logging configuration
pub mod logging;

/// Wire protocol definitions: envelopes, room codes, error codes
pub mod protocol;

/// Room actor registry: spawn, lookup, restore
pub mod registry;

/// Game room actor: admission, commands, timers, AI drive loop
pub mod room;

/// Injected clock, seeded RNG and timer tokens
pub mod runtime;

/// Durable room snapshots and the append-only event log
pub mod storage;

/// WebSocket connection handling
pub mod websocket;
