//! Injected capabilities: clock, seeded randomness, timer tokens.
//!
//! Business logic never reads the wall clock or a global RNG directly; it is
//! handed these instead, which is what makes AFK, grace, countdown and AI
//! pacing testable without real waits.

pub mod clock;
pub mod rng;
pub mod timer;

pub use clock::{Clock, SystemClock, TestClock};
pub use rng::SeededRng;
pub use timer::{TimerToken, TimerTokens};
