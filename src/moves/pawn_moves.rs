use crate::game_state::chess_types::{Color, Square, SquareSet};
use crate::moves::knight_moves::offset_table;

pub const WHITE_PAWN_ATTACKS: [SquareSet; 64] = offset_table(&[(-1, 1), (1, 1)]);
pub const BLACK_PAWN_ATTACKS: [SquareSet; 64] = offset_table(&[(-1, -1), (1, -1)]);

/// Diagonal squares a pawn of `color` on `square` attacks.
#[inline]
pub const fn pawn_attacks(color: Color, square: Square) -> SquareSet {
    match color {
        Color::White => WHITE_PAWN_ATTACKS[square as usize],
        Color::Black => BLACK_PAWN_ATTACKS[square as usize],
    }
}

/// Square one step forward for `color`, if still on the board.
#[inline]
pub const fn forward_square(color: Color, square: Square) -> Option<Square> {
    match color {
        Color::White if square < 56 => Some(square + 8),
        Color::Black if square >= 8 => Some(square - 8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{forward_square, pawn_attacks};
    use crate::game_state::chess_types::Color;

    #[test]
    fn white_pawn_on_e2_attacks_d3_and_f3() {
        assert_eq!(pawn_attacks(Color::White, 12), (1u64 << 19) | (1u64 << 21));
    }

    #[test]
    fn black_pawn_on_a7_attacks_only_b6() {
        assert_eq!(pawn_attacks(Color::Black, 48), 1u64 << 41);
    }

    #[test]
    fn forward_square_stops_at_the_edge() {
        assert_eq!(forward_square(Color::White, 12), Some(20));
        assert_eq!(forward_square(Color::White, 60), None);
        assert_eq!(forward_square(Color::Black, 3), None);
    }
}
