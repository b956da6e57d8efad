//! Authoritative board model for a single match.
//!
//! `Board` keeps a square-indexed piece array (so per-piece flags like
//! `has_moved` live with the piece) alongside per-kind bitboards and
//! occupancy caches used by move generation. Every applied ply pushes an
//! [`UndoState`] and a position fingerprint so the last ply can be reverted
//! exactly and repetitions can be counted.

use crate::game_state::chess_types::*;
use crate::game_state::undo_state::{MoveRecord, UndoState};
use crate::search::zobrist::compute_zobrist_key;
use crate::utils::fen_generator::generate_fen;
use crate::utils::fen_parser::parse_fen;

const BACK_RANK_ORDER: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

#[derive(Debug, Clone)]
pub struct Board {
    // --- Placement ---
    squares: [Option<Piece>; 64],
    // [color][piece_kind]
    pieces: [[SquareSet; 6]; 2],
    occupancy_by_color: [SquareSet; 2],
    occupancy_all: SquareSet,

    // --- Side and state flags ---
    pub side_to_move: Color,
    pub castling_rights: CastlingRights,
    pub en_passant_square: Option<Square>,

    // --- Clocks / move counters ---
    pub halfmove_clock: u16,
    pub fullmove_number: u16,

    /// Pieces captured *by* each color, indexed by `Color::index`.
    pub captured: [Vec<Piece>; 2],

    // --- Repetition log and reversible ply stack ---
    pub position_history: Vec<u64>,
    pub undo_stack: Vec<UndoState>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new_game()
    }
}

impl Board {
    /// Board with no pieces and no history, used by the FEN parser.
    pub fn new_empty() -> Self {
        Self {
            squares: [None; 64],
            pieces: [[0; 6]; 2],
            occupancy_by_color: [0; 2],
            occupancy_all: 0,

            side_to_move: Color::White,
            castling_rights: 0,
            en_passant_square: None,

            halfmove_clock: 0,
            fullmove_number: 1,

            captured: [Vec::new(), Vec::new()],

            position_history: Vec::new(),
            undo_stack: Vec::new(),
        }
    }

    /// Standard starting position with its fingerprint recorded.
    pub fn new_game() -> Self {
        let mut board = Self::new_empty();
        for color in Color::BOTH {
            let back = color.back_rank();
            let pawns = color.pawn_start_rank();
            for (file, kind) in BACK_RANK_ORDER.iter().enumerate() {
                let file = file as u8;
                board.put_piece(square_at(file, back), Piece::new(*kind, color));
                board.put_piece(square_at(file, pawns), Piece::new(PieceKind::Pawn, color));
            }
        }
        board.castling_rights = CASTLE_ALL;
        board.reset_history();
        board
    }

    #[inline]
    pub fn from_fen(fen: &str) -> Result<Self, String> {
        parse_fen(fen)
    }

    #[inline]
    pub fn to_fen(&self) -> String {
        generate_fen(self)
    }

    #[inline]
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares.get(square as usize).copied().flatten()
    }

    #[inline]
    pub fn bitboard(&self, color: Color, kind: PieceKind) -> SquareSet {
        self.pieces[color.index()][kind.index()]
    }

    #[inline]
    pub fn occupancy(&self, color: Color) -> SquareSet {
        self.occupancy_by_color[color.index()]
    }

    #[inline]
    pub fn occupancy_all(&self) -> SquareSet {
        self.occupancy_all
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        let kings = self.bitboard(color, PieceKind::King);
        (kings != 0).then(|| kings.trailing_zeros() as Square)
    }

    /// Live pieces with their squares, `a1` first.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.squares
            .iter()
            .enumerate()
            .filter_map(|(sq, slot)| slot.map(|piece| (sq as Square, piece)))
    }

    pub fn piece_count(&self) -> u32 {
        self.occupancy_all.count_ones()
    }

    /// Fingerprint of the current position.
    #[inline]
    pub fn fingerprint(&self) -> u64 {
        compute_zobrist_key(self)
    }

    /// How many times the current position occurs in the position log,
    /// counting the current occurrence.
    pub fn repetition_count(&self) -> usize {
        let current = self.fingerprint();
        self.position_history
            .iter()
            .filter(|&&key| key == current)
            .count()
    }

    #[inline]
    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.undo_stack.last().map(|undo| &undo.record)
    }

    #[inline]
    pub fn ply_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Drop move/position logs and seed the position log with the current
    /// position. Used after constructing a position from scratch.
    pub(crate) fn reset_history(&mut self) {
        self.undo_stack.clear();
        self.position_history.clear();
        self.position_history.push(self.fingerprint());
    }

    pub(crate) fn put_piece(&mut self, square: Square, piece: Piece) {
        if let Some(existing) = self.squares[square as usize] {
            self.clear_bits(square, existing);
        }
        self.squares[square as usize] = Some(piece);
        let bit = square_bit(square);
        self.pieces[piece.color.index()][piece.kind.index()] |= bit;
        self.occupancy_by_color[piece.color.index()] |= bit;
        self.occupancy_all |= bit;
    }

    pub(crate) fn take_piece(&mut self, square: Square) -> Option<Piece> {
        let piece = self.squares[square as usize].take()?;
        self.clear_bits(square, piece);
        Some(piece)
    }

    fn clear_bits(&mut self, square: Square, piece: Piece) {
        let bit = !square_bit(square);
        self.pieces[piece.color.index()][piece.kind.index()] &= bit;
        self.occupancy_by_color[piece.color.index()] &= bit;
        self.occupancy_all &= bit;
    }

    /// Apply one ply without any legality checking.
    ///
    /// Returns `None` (and leaves the board untouched) when `from` is empty,
    /// either square is off the board, or `to` holds a piece of the mover's
    /// own color. A pawn reaching its last rank promotes to `promotion` when
    /// that is a valid promotion kind, otherwise to a queen.
    pub fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Option<MoveRecord> {
        if from >= 64 || to >= 64 || from == to {
            return None;
        }
        let piece = self.piece_at(from)?;
        let color = piece.color;
        if self.piece_at(to).is_some_and(|target| target.color == color) {
            return None;
        }

        let prev_castling_rights = self.castling_rights;
        let prev_en_passant_square = self.en_passant_square;
        let prev_halfmove_clock = self.halfmove_clock;
        let prev_fullmove_number = self.fullmove_number;

        // Rights disappear when a king or rook leaves, or a rook is taken on, its home square.
        self.castling_rights &= !(rights_tied_to(from) | rights_tied_to(to));

        // En passant removes the passed pawn behind the landing square.
        let mut captured_piece = None;
        let mut is_en_passant = false;
        if piece.kind == PieceKind::Pawn
            && Some(to) == self.en_passant_square
            && file_of(from) != file_of(to)
        {
            let victim_square = match color {
                Color::White => to - 8,
                Color::Black => to + 8,
            };
            if self
                .piece_at(victim_square)
                .is_some_and(|p| p.kind == PieceKind::Pawn && p.color != color)
            {
                captured_piece = self.take_piece(victim_square).map(|p| (p, victim_square));
                is_en_passant = true;
            }
        }

        if captured_piece.is_none() {
            captured_piece = self.take_piece(to).map(|p| (p, to));
        }

        let mut rook_move = None;
        if piece.kind == PieceKind::King && file_of(from).abs_diff(file_of(to)) == 2 {
            let rank = rank_of(from);
            let (rook_from, rook_to) = if file_of(to) > file_of(from) {
                (square_at(7, rank), square_at(5, rank))
            } else {
                (square_at(0, rank), square_at(3, rank))
            };
            if let Some(mut rook) = self.take_piece(rook_from) {
                rook.has_moved = true;
                self.put_piece(rook_to, rook);
                rook_move = Some((rook_from, rook_to));
            }
        }

        self.en_passant_square = if piece.kind == PieceKind::Pawn && from.abs_diff(to) == 16 {
            Some((from + to) / 2)
        } else {
            None
        };

        self.take_piece(from);
        let mut moved = piece;
        moved.has_moved = true;
        let mut promoted_to = None;
        if piece.kind == PieceKind::Pawn && rank_of(to) == color.promotion_rank() {
            let kind = promotion
                .filter(|kind| kind.is_promotion_target())
                .unwrap_or(PieceKind::Queen);
            moved.kind = kind;
            promoted_to = Some(kind);
        }
        self.put_piece(to, moved);

        if let Some((victim, _)) = captured_piece {
            self.captured[color.index()].push(victim);
        }

        if piece.kind == PieceKind::Pawn || captured_piece.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        }
        if color == Color::Black {
            self.fullmove_number = self.fullmove_number.saturating_add(1);
        }

        let record = MoveRecord {
            from,
            to,
            piece: piece.kind,
            color,
            captured: captured_piece.map(|(victim, _)| victim.kind),
            is_en_passant,
            is_castling: rook_move.is_some(),
            promotion: promoted_to,
        };
        self.undo_stack.push(UndoState {
            record,
            moved_piece_had_moved: piece.has_moved,
            captured_piece,
            rook_move,
            prev_castling_rights,
            prev_en_passant_square,
            prev_halfmove_clock,
            prev_fullmove_number,
        });

        self.side_to_move = color.opposite();
        self.position_history.push(self.fingerprint());

        Some(record)
    }

    /// Revert the most recent ply. Returns `None` when there is nothing to undo.
    pub fn undo_move(&mut self) -> Option<MoveRecord> {
        let undo = self.undo_stack.pop()?;
        let record = undo.record;

        self.take_piece(record.to);
        let mut restored = Piece::new(record.piece, record.color);
        restored.has_moved = undo.moved_piece_had_moved;
        self.put_piece(record.from, restored);

        if let Some((rook_from, rook_to)) = undo.rook_move {
            if let Some(mut rook) = self.take_piece(rook_to) {
                rook.has_moved = false;
                self.put_piece(rook_from, rook);
            }
        }

        if let Some((victim, square)) = undo.captured_piece {
            self.put_piece(square, victim);
            self.captured[record.color.index()].pop();
        }

        self.castling_rights = undo.prev_castling_rights;
        self.en_passant_square = undo.prev_en_passant_square;
        self.halfmove_clock = undo.prev_halfmove_clock;
        self.fullmove_number = undo.prev_fullmove_number;
        self.side_to_move = record.color;
        self.position_history.pop();

        Some(record)
    }
}

/// Castling rights that depend on the piece standing on `square` being unmoved.
const fn rights_tied_to(square: Square) -> CastlingRights {
    match square {
        0 => CASTLE_WHITE_QUEENSIDE,
        4 => CASTLE_WHITE_KINGSIDE | CASTLE_WHITE_QUEENSIDE,
        7 => CASTLE_WHITE_KINGSIDE,
        56 => CASTLE_BLACK_QUEENSIDE,
        60 => CASTLE_BLACK_KINGSIDE | CASTLE_BLACK_QUEENSIDE,
        63 => CASTLE_BLACK_KINGSIDE,
        _ => 0,
    }
}
