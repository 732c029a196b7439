use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The room-code alphabet: uppercase letters and digits minus the visually
/// ambiguous `0 1 I O L`.
pub const ROOM_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Room codes are exactly this long on the wire.
pub const ROOM_CODE_LENGTH: usize = 6;

/// A canonical room code: six characters from [`ROOM_CODE_ALPHABET`], stored
/// upper-case. Input is accepted case-insensitively; anything else is
/// rejected at parse time, so holding a `RoomCode` means holding a valid one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RoomCode(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomCodeError {
    #[error("room code must be exactly {ROOM_CODE_LENGTH} characters, got {0}")]
    WrongLength(usize),
    #[error("room code contains character '{0}' outside the allowed alphabet")]
    ForbiddenChar(char),
}

impl RoomCode {
    /// Parse and canonicalize a room code. Lower-case input is accepted and
    /// upper-cased; characters outside the restricted alphabet are rejected.
    pub fn parse(input: &str) -> Result<Self, RoomCodeError> {
        let canonical = input.trim().to_ascii_uppercase();
        let len = canonical.chars().count();
        if len != ROOM_CODE_LENGTH {
            return Err(RoomCodeError::WrongLength(len));
        }
        for ch in canonical.chars() {
            let in_alphabet = ch.is_ascii() && ROOM_CODE_ALPHABET.contains(&(ch as u8));
            if !in_alphabet {
                return Err(RoomCodeError::ForbiddenChar(ch));
            }
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomCode {
    type Err = RoomCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for RoomCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Generate a random room code over the restricted alphabet.
pub fn generate_room_code() -> RoomCode {
    let mut rng = rand::rng();
    let code: String = (0..ROOM_CODE_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = ROOM_CODE_ALPHABET[idx] as char;
            ch
        })
        .collect();
    RoomCode(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_canonical() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert_eq!(code.as_str().len(), ROOM_CODE_LENGTH);
            assert!(RoomCode::parse(code.as_str()).is_ok());
        }
    }

    #[test]
    fn parse_upper_cases_input() {
        let code = RoomCode::parse("abc234").unwrap();
        assert_eq!(code.as_str(), "ABC234");
    }

    #[test]
    fn parse_rejects_ambiguous_characters() {
        for bad in ["ABC10D", "OOOOOO", "IIIIII", "LLLLLL", "ABC23I"] {
            assert!(RoomCode::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(
            RoomCode::parse("ABC23"),
            Err(RoomCodeError::WrongLength(5))
        );
        assert_eq!(
            RoomCode::parse("ABC2345"),
            Err(RoomCodeError::WrongLength(7))
        );
    }
}
