//! King-safety filtering and terminal-condition detection.
//!
//! Legality is decided by playing a candidate move on a scratch copy of the
//! board and asking whether the mover's king is left attacked.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game_state::chess_rules::{FIFTY_MOVE_HALFMOVES, REPETITION_LIMIT};
use crate::game_state::{board::Board, chess_types::*};
use crate::move_generation::legal_move_checks::is_king_in_check;
use crate::moves::piece_rules::possible_moves;

/// Rule-based reason a position is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,
}

impl fmt::Display for DrawReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawReason::InsufficientMaterial => write!(f, "insufficient material"),
            DrawReason::ThreefoldRepetition => write!(f, "threefold repetition"),
            DrawReason::FiftyMoveRule => write!(f, "fifty-move rule"),
        }
    }
}

/// Stateless rules oracle consulted by a match on every transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveValidator;

impl MoveValidator {
    pub fn new() -> Self {
        Self
    }

    /// Whether `color` may move the piece on `from` to `to`.
    pub fn is_legal(&self, board: &Board, from: Square, to: Square, color: Color) -> bool {
        if !board.piece_at(from).is_some_and(|piece| piece.color == color) {
            return false;
        }
        if possible_moves(board, from, false) & square_bit(to) == 0 {
            return false;
        }
        let mut scratch = board.clone();
        leaves_king_safe(&mut scratch, from, to, color)
    }

    /// Legal destinations of the piece on `square`, as a square set.
    pub fn legal_moves(&self, board: &Board, square: Square) -> SquareSet {
        let mut scratch = board.clone();
        legal_destinations(&mut scratch, square)
    }

    pub fn has_legal_moves(&self, board: &Board, color: Color) -> bool {
        let mut scratch = board.clone();
        let own = squares(board.occupancy(color));
        own.into_iter()
            .any(|square| legal_destinations(&mut scratch, square) != 0)
    }

    #[inline]
    pub fn is_check(&self, board: &Board, color: Color) -> bool {
        is_king_in_check(board, color)
    }

    pub fn is_checkmate(&self, board: &Board, color: Color) -> bool {
        self.is_check(board, color) && !self.has_legal_moves(board, color)
    }

    pub fn is_stalemate(&self, board: &Board, color: Color) -> bool {
        !self.is_check(board, color) && !self.has_legal_moves(board, color)
    }

    /// Bare kings, king and one minor piece against a bare king, or a
    /// bishop each with both bishops on the same square color.
    pub fn is_insufficient_material(&self, board: &Board) -> bool {
        let non_kings: Vec<(Square, Piece)> = board
            .pieces()
            .filter(|(_, piece)| piece.kind != PieceKind::King)
            .collect();

        match non_kings.as_slice() {
            [] => true,
            [(_, only)] => matches!(only.kind, PieceKind::Bishop | PieceKind::Knight),
            [(sq_a, a), (sq_b, b)] => {
                a.kind == PieceKind::Bishop
                    && b.kind == PieceKind::Bishop
                    && a.color != b.color
                    && is_light_square(*sq_a) == is_light_square(*sq_b)
            }
            _ => false,
        }
    }

    /// The current position has occurred at least three times, counting
    /// the current occurrence.
    pub fn is_threefold_repetition(&self, board: &Board) -> bool {
        board.repetition_count() >= REPETITION_LIMIT
    }

    pub fn is_fifty_move_rule(&self, board: &Board) -> bool {
        board.halfmove_clock >= FIFTY_MOVE_HALFMOVES
    }

    /// First rule-based draw that applies to the position, if any.
    pub fn draw_reason(&self, board: &Board) -> Option<DrawReason> {
        if self.is_insufficient_material(board) {
            Some(DrawReason::InsufficientMaterial)
        } else if self.is_threefold_repetition(board) {
            Some(DrawReason::ThreefoldRepetition)
        } else if self.is_fifty_move_rule(board) {
            Some(DrawReason::FiftyMoveRule)
        } else {
            None
        }
    }
}

/// Legal destinations computed in place: each candidate is applied and
/// immediately undone, so `board` is unchanged on return.
pub(crate) fn legal_destinations(board: &mut Board, square: Square) -> SquareSet {
    let Some(piece) = board.piece_at(square) else {
        return 0;
    };
    let candidates = possible_moves(board, square, false);
    squares(candidates)
        .filter(|&to| leaves_king_safe(board, square, to, piece.color))
        .fold(0u64, |acc, to| acc | square_bit(to))
}

fn leaves_king_safe(board: &mut Board, from: Square, to: Square, color: Color) -> bool {
    if board.apply_move(from, to, None).is_none() {
        return false;
    }
    let safe = !is_king_in_check(board, color);
    board.undo_move();
    safe
}

#[cfg(test)]
mod tests {
    use super::{DrawReason, MoveValidator};
    use crate::game_state::board::Board;
    use crate::game_state::chess_types::*;
    use crate::utils::long_algebraic::parse_long_algebraic;

    fn play(board: &mut Board, moves: &[&str]) {
        for text in moves {
            let (from, to, promotion) = parse_long_algebraic(text).expect("test move should parse");
            assert!(
                MoveValidator.is_legal(board, from, to, board.side_to_move),
                "{text} should be legal"
            );
            board
                .apply_move(from, to, promotion)
                .expect("legal move should apply");
        }
    }

    fn total_legal_moves(board: &Board, color: Color) -> u32 {
        squares(board.occupancy(color))
            .map(|sq| MoveValidator.legal_moves(board, sq).count_ones())
            .sum()
    }

    #[test]
    fn twenty_moves_each_side_from_the_start() {
        let mut board = Board::new_game();
        assert_eq!(total_legal_moves(&board, Color::White), 20);
        play(&mut board, &["e2e4"]);
        assert_eq!(total_legal_moves(&board, Color::Black), 20);
    }

    #[test]
    fn pinned_piece_cannot_leave_the_pin_line() {
        // White knight on e2 is pinned by the rook on e8.
        let board = Board::from_fen("4r1k1/8/8/8/8/8/4N3/4K3 w - - 0 1").expect("FEN should parse");
        assert_eq!(MoveValidator.legal_moves(&board, 12), 0);
        assert!(!MoveValidator.is_legal(&board, 12, 29, Color::White));
    }

    #[test]
    fn moving_the_wrong_color_is_illegal() {
        let board = Board::new_game();
        assert!(!MoveValidator.is_legal(&board, 52, 36, Color::White));
        assert!(!MoveValidator.is_legal(&board, 12, 36, Color::White));
    }

    #[test]
    fn fools_mate_is_checkmate() {
        let mut board = Board::new_game();
        play(&mut board, &["f2f3", "e7e5", "g2g4", "d8h4"]);
        assert!(MoveValidator.is_check(&board, Color::White));
        assert!(MoveValidator.is_checkmate(&board, Color::White));
        assert!(!MoveValidator.is_stalemate(&board, Color::White));
    }

    #[test]
    fn cornered_king_is_stalemated() {
        let board = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").expect("FEN should parse");
        assert!(MoveValidator.is_stalemate(&board, Color::Black));
        assert!(!MoveValidator.is_checkmate(&board, Color::Black));
    }

    #[test]
    fn insufficient_material_cases() {
        let v = MoveValidator;
        let check = |fen: &str| v.is_insufficient_material(&Board::from_fen(fen).expect("FEN should parse"));

        assert!(check("4k3/8/8/8/8/8/8/4K3 w - - 0 1"));
        assert!(check("4k3/8/8/8/8/8/8/4KN2 w - - 0 1"));
        assert!(check("4k3/8/8/8/8/8/8/2B1K3 w - - 0 1"));
        // c1 and f8 are both dark squares.
        assert!(check("4kb2/8/8/8/8/8/8/2B1K3 w - - 0 1"));
        // c1 dark, c8 light.
        assert!(!check("2b1k3/8/8/8/8/8/8/2B1K3 w - - 0 1"));
        assert!(!check("4k3/8/8/8/8/8/8/4K1R1 w - - 0 1"));
        assert!(!check("4k3/8/8/8/8/8/8/3NKN2 w - - 0 1"));

        let bare = Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").expect("FEN should parse");
        assert_eq!(v.draw_reason(&bare), Some(DrawReason::InsufficientMaterial));
    }

    #[test]
    fn threefold_repetition_counts_the_current_position() {
        let mut board = Board::new_game();
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];

        play(&mut board, &shuffle);
        assert!(!MoveValidator.is_threefold_repetition(&board));
        play(&mut board, &shuffle[..3]);
        assert!(!MoveValidator.is_threefold_repetition(&board));
        play(&mut board, &shuffle[3..]);
        assert!(MoveValidator.is_threefold_repetition(&board));
        assert_eq!(
            MoveValidator.draw_reason(&board),
            Some(DrawReason::ThreefoldRepetition)
        );
    }

    #[test]
    fn fifty_move_rule_triggers_at_one_hundred_halfmoves() {
        let v = MoveValidator;
        let at_99 = Board::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 99 80").expect("FEN should parse");
        assert!(!v.is_fifty_move_rule(&at_99));
        let at_100 = Board::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 100 80").expect("FEN should parse");
        assert_eq!(v.draw_reason(&at_100), Some(DrawReason::FiftyMoveRule));
    }

    #[test]
    fn legal_move_query_leaves_board_untouched() {
        let board = Board::new_game();
        let before = board.to_fen();
        let _ = MoveValidator.legal_moves(&board, 12);
        assert_eq!(board.to_fen(), before);
        assert_eq!(board.position_history.len(), 1);
    }
}
