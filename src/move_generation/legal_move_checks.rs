use crate::game_state::{board::Board, chess_types::*};
use crate::moves::king_moves::king_attacks;
use crate::moves::knight_moves::knight_attacks;
use crate::moves::pawn_moves::pawn_attacks;
use crate::moves::sliding_moves::{bishop_attacks, rook_attacks};

#[inline]
pub fn is_king_in_check(board: &Board, color: Color) -> bool {
    let Some(king_sq) = board.king_square(color) else {
        return false;
    };
    is_square_attacked(board, king_sq, color.opposite())
}

/// Whether any piece of `attacker_color` attacks `square`.
///
/// Works backwards from the target square, so it never asks for castling
/// destinations and cannot recurse into castling legality.
pub fn is_square_attacked(board: &Board, square: Square, attacker_color: Color) -> bool {
    let occupancy = board.occupancy_all();
    let attackers = |kind| board.bitboard(attacker_color, kind);

    // A pawn of the attacker attacks `square` exactly when a defender pawn on
    // `square` would attack the pawn's square.
    if pawn_attacks(attacker_color.opposite(), square) & attackers(PieceKind::Pawn) != 0 {
        return true;
    }
    if knight_attacks(square) & attackers(PieceKind::Knight) != 0 {
        return true;
    }
    if king_attacks(square) & attackers(PieceKind::King) != 0 {
        return true;
    }

    let queens = attackers(PieceKind::Queen);
    if bishop_attacks(square, occupancy) & (attackers(PieceKind::Bishop) | queens) != 0 {
        return true;
    }
    rook_attacks(square, occupancy) & (attackers(PieceKind::Rook) | queens) != 0
}

#[cfg(test)]
mod tests {
    use super::{is_king_in_check, is_square_attacked};
    use crate::game_state::board::Board;
    use crate::game_state::chess_types::Color;
    use crate::utils::algebraic::algebraic_to_square;

    #[test]
    fn pawns_attack_diagonally_not_forward() {
        let board = Board::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").expect("FEN should parse");
        let d3 = algebraic_to_square("d3").expect("d3 should parse");
        let e3 = algebraic_to_square("e3").expect("e3 should parse");
        assert!(is_square_attacked(&board, d3, Color::White));
        assert!(!is_square_attacked(&board, e3, Color::White));
    }

    #[test]
    fn blocked_slider_does_not_give_check() {
        let open = Board::from_fen("4k3/8/8/8/8/8/8/4R1K1 b - - 0 1").expect("FEN should parse");
        assert!(is_king_in_check(&open, Color::Black));

        let blocked =
            Board::from_fen("4k3/4n3/8/8/8/8/8/4R1K1 b - - 0 1").expect("FEN should parse");
        assert!(!is_king_in_check(&blocked, Color::Black));
    }

    #[test]
    fn missing_king_is_never_in_check() {
        let board = Board::from_fen("8/8/8/8/8/8/8/4R1K1 b - - 0 1").expect("FEN should parse");
        assert!(!is_king_in_check(&board, Color::Black));
    }
}
