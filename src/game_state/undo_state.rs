use crate::game_state::chess_types::*;

/// What a single applied move did, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    pub piece: PieceKind,
    pub color: Color,
    pub captured: Option<PieceKind>,
    pub is_en_passant: bool,
    pub is_castling: bool,
    pub promotion: Option<PieceKind>,
}

/// Single undo record for `Board::apply_move` / `Board::undo_move`.
#[derive(Debug, Clone)]
pub struct UndoState {
    pub record: MoveRecord,
    /// `has_moved` of the moving piece before the move.
    pub moved_piece_had_moved: bool,
    /// Captured piece and the square it was taken on (differs from `to` for en passant).
    pub captured_piece: Option<(Piece, Square)>,
    /// Rook relocation `(from, to)` when the move was a castle.
    pub rook_move: Option<(Square, Square)>,

    pub prev_castling_rights: CastlingRights,
    pub prev_en_passant_square: Option<Square>,
    pub prev_halfmove_clock: u16,
    pub prev_fullmove_number: u16,
}
