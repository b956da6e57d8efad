//! Crate root module declarations for the Duel Chess match server.
//!
//! The rules engine (game state, move rules, legality, fingerprints) sits at
//! the bottom; clocks and the per-match state machine build on it; the
//! session layer pairs players into matches; the server layer speaks the
//! WebSocket protocol and keeps live matches synchronised.

pub mod errors;

pub mod game_state {
    pub mod board;
    pub mod chess_rules;
    pub mod chess_types;
    pub mod undo_state;
}

pub mod moves {
    pub mod king_moves;
    pub mod knight_moves;
    pub mod pawn_moves;
    pub mod piece_rules;
    pub mod sliding_moves;
}

pub mod move_generation {
    pub mod legal_move_checks;
    pub mod move_validator;
    pub mod perft;
}

pub mod search {
    pub mod zobrist;
}

pub mod clock {
    pub mod match_clock;
    pub mod time_control;
}

pub mod game {
    pub mod game_match;
    pub mod snapshot;
}

pub mod session {
    pub mod game_code;
    pub mod identity;
    pub mod pairing_queue;
    pub mod rating;
    pub mod registry;
}

pub mod server {
    pub mod config;
    pub mod connection;
    pub mod dispatch;
    pub mod hub;
    pub mod protocol;
    pub mod sync;
}

pub mod utils {
    pub mod algebraic;
    pub mod fen_generator;
    pub mod fen_parser;
    pub mod long_algebraic;
    pub mod render_game_state;
}
