//! Geometric reachability per piece kind.
//!
//! `possible_moves` answers "where could the piece on this square go given
//! the current occupancy", with no regard for the mover's own king. King
//! safety is filtered later by the move validator.

use crate::game_state::{board::Board, chess_types::*};
use crate::move_generation::legal_move_checks::is_square_attacked;
use crate::moves::king_moves::king_attacks;
use crate::moves::knight_moves::knight_attacks;
use crate::moves::pawn_moves::{forward_square, pawn_attacks};
use crate::moves::sliding_moves::{bishop_attacks, queen_attacks, rook_attacks};

/// Destination squares for the piece on `square`, or an empty set when the
/// square is empty. Castling destinations are offered for an unmoved king
/// unless `skip_castling` is set.
pub fn possible_moves(board: &Board, square: Square, skip_castling: bool) -> SquareSet {
    let Some(piece) = board.piece_at(square) else {
        return 0;
    };
    let own = board.occupancy(piece.color);
    let occupancy = board.occupancy_all();

    match piece.kind {
        PieceKind::Pawn => pawn_destinations(board, square, piece.color),
        PieceKind::Knight => knight_attacks(square) & !own,
        PieceKind::Bishop => bishop_attacks(square, occupancy) & !own,
        PieceKind::Rook => rook_attacks(square, occupancy) & !own,
        PieceKind::Queen => queen_attacks(square, occupancy) & !own,
        PieceKind::King => {
            let steps = king_attacks(square) & !own;
            if skip_castling || piece.has_moved {
                steps
            } else {
                steps | castling_destinations(board, square, piece.color)
            }
        }
    }
}

fn pawn_destinations(board: &Board, square: Square, color: Color) -> SquareSet {
    let occupancy = board.occupancy_all();
    let mut targets = 0u64;

    if let Some(one) = forward_square(color, square) {
        if occupancy & square_bit(one) == 0 {
            targets |= square_bit(one);
            if rank_of(square) == color.pawn_start_rank() {
                if let Some(two) = forward_square(color, one) {
                    if occupancy & square_bit(two) == 0 {
                        targets |= square_bit(two);
                    }
                }
            }
        }
    }

    let mut capturable = board.occupancy(color.opposite());
    if let Some(ep) = board.en_passant_square {
        capturable |= square_bit(ep);
    }
    targets | (pawn_attacks(color, square) & capturable)
}

fn castling_destinations(board: &Board, king_square: Square, color: Color) -> SquareSet {
    let rank = color.back_rank();
    if king_square != square_at(4, rank) {
        return 0;
    }
    let enemy = color.opposite();
    if is_square_attacked(board, king_square, enemy) {
        return 0;
    }

    // (rook file, squares that must be empty, squares the king crosses, destination)
    let wings: [(u8, &[u8], [u8; 2], u8); 2] = [(7, &[5, 6], [5, 6], 6), (0, &[1, 2, 3], [3, 2], 2)];
    let mut targets = 0u64;

    for (rook_file, between, crossed, destination) in wings {
        let rook_ready = board.piece_at(square_at(rook_file, rank)).is_some_and(|rook| {
            rook.kind == PieceKind::Rook && rook.color == color && !rook.has_moved
        });
        if !rook_ready {
            continue;
        }
        if between
            .iter()
            .any(|&file| board.piece_at(square_at(file, rank)).is_some())
        {
            continue;
        }
        if crossed
            .iter()
            .any(|&file| is_square_attacked(board, square_at(file, rank), enemy))
        {
            continue;
        }
        targets |= square_bit(square_at(destination, rank));
    }

    targets
}
