use crate::game_state::chess_types::{Square, SquareSet};
use crate::moves::knight_moves::offset_table;

const KING_OFFSETS: [(i32, i32); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

pub const KING_ATTACKS: [SquareSet; 64] = offset_table(&KING_OFFSETS);

#[inline]
pub const fn king_attacks(square: Square) -> SquareSet {
    KING_ATTACKS[square as usize]
}

#[cfg(test)]
mod tests {
    use super::king_attacks;

    #[test]
    fn king_on_edges_and_centre() {
        assert_eq!(king_attacks(27).count_ones(), 8);
        assert_eq!(king_attacks(4).count_ones(), 5);
        assert_eq!(king_attacks(63).count_ones(), 3);
    }
}
