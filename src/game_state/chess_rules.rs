//! Canonical chess-rule constants.
//!
//! Static literals used to set up a match and to decide rule-based draws.

/// Standard chess starting position in Forsyth-Edwards Notation (FEN).
pub const STARTING_POSITION_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Halfmove clock value at which the fifty-move rule applies.
pub const FIFTY_MOVE_HALFMOVES: u16 = 100;

/// Number of occurrences of a position that makes a threefold repetition.
pub const REPETITION_LIMIT: usize = 3;
