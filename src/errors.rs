//! Crate error types.
//!
//! `GameError` covers every rejection a client can receive. Its `Display`
//! text is the exact `error.message` sent back over the wire.

use std::fmt;

/// Kind of two-party offer a match can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferKind {
    Undo,
    Draw,
    Rematch,
}

impl fmt::Display for OfferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferKind::Undo => write!(f, "undo request"),
            OfferKind::Draw => write!(f, "draw offer"),
            OfferKind::Rematch => write!(f, "rematch request"),
        }
    }
}

/// Errors reported to the requesting client. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    // Rejected as invalid.
    #[error("Invalid move")]
    IllegalMove,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid game code")]
    InvalidGameCode,
    #[error("You are already in the matchmaking queue")]
    AlreadyQueued,
    #[error("You are already in a game. Please finish or leave your current game first.")]
    AlreadyInGame,
    #[error("Game is already full")]
    GameFull,
    #[error("Game is still active")]
    GameInProgress,
    #[error("Game is not active")]
    GameNotActive,
    #[error("Invalid message format")]
    InvalidMessage,
    #[error("Unknown message type")]
    UnknownMessage,

    // Not found.
    #[error("Not in a game")]
    NotInGame,
    #[error("Game not found")]
    GameNotFound,
    #[error("Opponent not found")]
    OpponentMissing,

    // Offer conflicts.
    #[error("There is already a pending {0}")]
    OfferAlreadyPending(OfferKind),
    #[error("No pending {0}")]
    NoPendingOffer(OfferKind),
    #[error("Cannot respond to your own request")]
    OwnOffer,

    // Internal no-ops.
    #[error("Cannot undo")]
    NothingToUndo,
}

pub type GameResult<T> = Result<T, GameError>;

/// Startup configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::{GameError, OfferKind};

    #[test]
    fn client_messages_read_naturally() {
        assert_eq!(GameError::NotYourTurn.to_string(), "Not your turn");
        assert_eq!(
            GameError::NoPendingOffer(OfferKind::Draw).to_string(),
            "No pending draw offer"
        );
        assert_eq!(
            GameError::OfferAlreadyPending(OfferKind::Undo).to_string(),
            "There is already a pending undo request"
        );
    }
}
