//! Move-tree node counting used to validate move generation.

use crate::game_state::{board::Board, chess_types::*};
use crate::move_generation::legal_move_checks::is_king_in_check;
use crate::move_generation::move_validator::legal_destinations;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerftCounts {
    pub nodes: usize,
    pub captures: usize,
    pub en_passant: usize,
    pub castles: usize,
    pub promotions: usize,
    pub checks: usize,
}

impl PerftCounts {
    fn merge(&mut self, rhs: PerftCounts) {
        self.nodes += rhs.nodes;
        self.captures += rhs.captures;
        self.en_passant += rhs.en_passant;
        self.castles += rhs.castles;
        self.promotions += rhs.promotions;
        self.checks += rhs.checks;
    }
}

/// Count leaf nodes `depth` plies below `board`. Each promotion is expanded
/// into its four piece choices.
pub fn perft(board: &Board, depth: u8) -> PerftCounts {
    let mut scratch = board.clone();
    perft_recurse(&mut scratch, depth)
}

/// Per-root-move node counts, keyed by coordinate notation.
pub fn perft_divide(board: &Board, depth: u8) -> Vec<(String, usize)> {
    let mut scratch = board.clone();
    let mut out = Vec::new();
    if depth == 0 {
        return out;
    }

    for_each_legal_move(&mut scratch, |scratch, from, to, promotion| {
        let Some(record) = scratch.apply_move(from, to, promotion) else {
            return;
        };
        let nodes = perft_recurse(scratch, depth - 1).nodes;
        scratch.undo_move();
        out.push((
            crate::utils::long_algebraic::move_record_to_long_algebraic(&record),
            nodes,
        ));
    });

    out
}

fn perft_recurse(board: &mut Board, depth: u8) -> PerftCounts {
    if depth == 0 {
        return PerftCounts {
            nodes: 1,
            ..PerftCounts::default()
        };
    }

    let mut total = PerftCounts::default();
    for_each_legal_move(board, |board, from, to, promotion| {
        let Some(record) = board.apply_move(from, to, promotion) else {
            return;
        };
        if depth == 1 {
            total.merge(PerftCounts {
                nodes: 1,
                captures: usize::from(record.captured.is_some()),
                en_passant: usize::from(record.is_en_passant),
                castles: usize::from(record.is_castling),
                promotions: usize::from(record.promotion.is_some()),
                checks: usize::from(is_king_in_check(board, board.side_to_move)),
            });
        } else {
            total.merge(perft_recurse(board, depth - 1));
        }
        board.undo_move();
    });
    total
}

fn for_each_legal_move<F>(board: &mut Board, mut visit: F)
where
    F: FnMut(&mut Board, Square, Square, Option<PieceKind>),
{
    let mover = board.side_to_move;
    for from in squares(board.occupancy(mover)) {
        let Some(piece) = board.piece_at(from) else {
            continue;
        };
        for to in squares(legal_destinations(board, from)) {
            if piece.kind == PieceKind::Pawn && rank_of(to) == mover.promotion_rank() {
                for kind in PROMOTION_KINDS {
                    visit(board, from, to, Some(kind));
                }
            } else {
                visit(board, from, to, None);
            }
        }
    }
}
