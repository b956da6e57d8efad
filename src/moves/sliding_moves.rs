use crate::game_state::chess_types::{Square, SquareSet};

const ROOK_DIRECTIONS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
const BISHOP_DIRECTIONS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

#[inline]
pub fn rook_attacks(square: Square, occupancy: SquareSet) -> SquareSet {
    ROOK_DIRECTIONS
        .iter()
        .fold(0, |acc, &(df, dr)| acc | trace_ray(square, df, dr, occupancy))
}

#[inline]
pub fn bishop_attacks(square: Square, occupancy: SquareSet) -> SquareSet {
    BISHOP_DIRECTIONS
        .iter()
        .fold(0, |acc, &(df, dr)| acc | trace_ray(square, df, dr, occupancy))
}

#[inline]
pub fn queen_attacks(square: Square, occupancy: SquareSet) -> SquareSet {
    rook_attacks(square, occupancy) | bishop_attacks(square, occupancy)
}

/// Walk from `square` in one direction, including the first occupied square
/// and nothing beyond it.
fn trace_ray(square: Square, file_step: i32, rank_step: i32, occupancy: SquareSet) -> SquareSet {
    let mut file = i32::from(square % 8) + file_step;
    let mut rank = i32::from(square / 8) + rank_step;
    let mut ray = 0u64;

    while (0..8).contains(&file) && (0..8).contains(&rank) {
        let bit = 1u64 << (rank * 8 + file);
        ray |= bit;
        if occupancy & bit != 0 {
            break;
        }
        file += file_step;
        rank += rank_step;
    }

    ray
}
