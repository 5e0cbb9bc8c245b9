//! Room code allocation.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters used for the random portion of a room code. Ambiguous glyphs
/// (0/O, 1/I/L) are excluded.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
/// Random characters following the mode prefix.
const CODE_LENGTH: usize = 5;
/// Prefix marking defence-mode rooms.
pub(crate) const MODE_PREFIX: char = 'D';

/// Short shareable identifier for one room.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomCode(String);

impl RoomCode {
    /// Wraps an already-formatted code, e.g. received from a client.
    #[must_use]
    pub fn from_string(code: String) -> Self {
        Self(code.to_ascii_uppercase())
    }

    /// Generates a fresh code with the defence-mode prefix.
    #[must_use]
    pub(crate) fn generate<R: Rng>(rng: &mut R) -> Self {
        let mut code = String::with_capacity(CODE_LENGTH + 1);
        code.push(MODE_PREFIX);
        for _ in 0..CODE_LENGTH {
            let index = rng.gen_range(0..CODE_ALPHABET.len());
            code.push(CODE_ALPHABET[index] as char);
        }
        Self(code)
    }

    /// The code as displayable text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}
