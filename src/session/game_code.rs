//! Short shareable codes for private matches.

use std::fmt;

use rand::Rng;
use serde::Serialize;

use crate::errors::GameError;

/// Letters and digits with look-alikes (`I`, `O`, `0`, `1`) removed.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct GameCode(String);

impl GameCode {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..CODE_LENGTH)
            .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
            .collect();
        Self(code)
    }

    /// Draw codes until one is not `taken`.
    pub fn generate_unique(taken: impl Fn(&GameCode) -> bool) -> Self {
        let mut rng = rand::rng();
        loop {
            let code = Self::random(&mut rng);
            if !taken(&code) {
                return code;
            }
        }
    }

    /// Normalise user input (trim, uppercase) and check it could be a code.
    pub fn parse(input: &str) -> Result<Self, GameError> {
        let code = input.trim().to_ascii_uppercase();
        let well_formed = code.len() == CODE_LENGTH
            && code.bytes().all(|b| CODE_ALPHABET.contains(&b));
        if well_formed {
            Ok(Self(code))
        } else {
            Err(GameError::InvalidGameCode)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn random_codes_use_the_unambiguous_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = GameCode::random(&mut rng);
            assert_eq!(code.as_str().len(), CODE_LENGTH);
            assert!(code.as_str().bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!code.as_str().contains(&['O', '0', 'I', '1'][..]));
        }
    }

    #[test]
    fn parse_normalises_input() {
        let code = GameCode::parse("  abc234 ").expect("code should parse");
        assert_eq!(code.as_str(), "ABC234");
        assert_eq!(GameCode::parse("ABC23"), Err(GameError::InvalidGameCode));
        assert_eq!(GameCode::parse("ABC230"), Err(GameError::InvalidGameCode));
    }

    #[test]
    fn unique_generation_skips_taken_codes() {
        let mut taken = HashSet::new();
        for _ in 0..50 {
            let code = GameCode::generate_unique(|c| taken.contains(c));
            assert!(taken.insert(code));
        }
    }
}
