use crate::game_state::chess_types::{Square, SquareSet};

const KNIGHT_OFFSETS: [(i32, i32); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

pub const KNIGHT_ATTACKS: [SquareSet; 64] = offset_table(&KNIGHT_OFFSETS);

#[inline]
pub const fn knight_attacks(square: Square) -> SquareSet {
    KNIGHT_ATTACKS[square as usize]
}

/// Build a per-square table of the on-board squares reached by each
/// `(file, rank)` offset. Shared by the knight, king and pawn-attack tables.
pub(crate) const fn offset_table(offsets: &[(i32, i32)]) -> [SquareSet; 64] {
    let mut table = [0u64; 64];
    let mut sq = 0usize;

    while sq < 64 {
        let file = (sq % 8) as i32;
        let rank = (sq / 8) as i32;
        let mut targets = 0u64;
        let mut i = 0usize;

        while i < offsets.len() {
            targets |= bit_if_on_board(file + offsets[i].0, rank + offsets[i].1);
            i += 1;
        }

        table[sq] = targets;
        sq += 1;
    }

    table
}

const fn bit_if_on_board(file: i32, rank: i32) -> SquareSet {
    if file < 0 || file > 7 || rank < 0 || rank > 7 {
        return 0;
    }
    1u64 << ((rank as usize) * 8 + file as usize)
}
