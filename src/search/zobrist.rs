//! Position fingerprints for repetition tracking.
//!
//! Keys come from a fixed splitmix64 seed so fingerprints are stable across
//! runs and processes, which keeps repetition tests deterministic.

use std::sync::OnceLock;

use crate::game_state::{board::Board, chess_types::*};

#[derive(Debug)]
struct ZobristTables {
    piece_square: [[[u64; 64]; 6]; 2],
    black_to_move: u64,
    castling: [u64; 16],
    en_passant_file: [u64; 8],
}

static TABLES: OnceLock<ZobristTables> = OnceLock::new();

#[inline]
fn tables() -> &'static ZobristTables {
    TABLES.get_or_init(build_tables)
}

fn build_tables() -> ZobristTables {
    let mut seed: u64 = 0xD1B5_4A32_D192_ED03;
    let mut next = || splitmix64(&mut seed);

    let mut piece_square = [[[0u64; 64]; 6]; 2];
    piece_square
        .iter_mut()
        .flatten()
        .flatten()
        .for_each(|key| *key = next());

    let black_to_move = next();
    let castling = std::array::from_fn(|_| next());
    let en_passant_file = std::array::from_fn(|_| next());

    ZobristTables {
        piece_square,
        black_to_move,
        castling,
        en_passant_file,
    }
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
pub fn piece_square_key(color: Color, kind: PieceKind, square: Square) -> u64 {
    tables().piece_square[color.index()][kind.index()][square as usize]
}

/// Key for a castling-rights mask (`0..=15`).
#[inline]
pub fn castling_key(castling_rights: CastlingRights) -> u64 {
    tables().castling[(castling_rights & 0x0F) as usize]
}

#[inline]
pub fn en_passant_file_key(file: u8) -> u64 {
    tables().en_passant_file[file as usize]
}

#[inline]
pub fn black_to_move_key() -> u64 {
    tables().black_to_move
}

/// Fingerprint covering placement, side to move, castling rights and the
/// en-passant target.
pub fn compute_zobrist_key(board: &Board) -> u64 {
    let mut key = board
        .pieces()
        .fold(0u64, |acc, (sq, piece)| acc ^ piece_square_key(piece.color, piece.kind, sq));

    if board.side_to_move == Color::Black {
        key ^= black_to_move_key();
    }
    key ^= castling_key(board.castling_rights);
    if let Some(ep_square) = board.en_passant_square {
        key ^= en_passant_file_key(file_of(ep_square));
    }

    key
}
