//! Unicode board diagram for debug logging and test output.

use crate::game_state::{board::Board, chess_types::*};

/// Render the board with `a1` at the bottom left.
pub fn render_board(board: &Board) -> String {
    let mut out = String::from("  a b c d e f g h\n");

    for rank in (0..8u8).rev() {
        let rank_char = char::from(b'1' + rank);
        out.push(rank_char);
        out.push(' ');

        for file in 0..8u8 {
            out.push(board.piece_at(square_at(file, rank)).map_or('·', piece_glyph));
            if file < 7 {
                out.push(' ');
            }
        }

        out.push(' ');
        out.push(rank_char);
        out.push('\n');
    }

    out.push_str("  a b c d e f g h");
    out
}

fn piece_glyph(piece: Piece) -> char {
    const WHITE: [char; 6] = ['♙', '♘', '♗', '♖', '♕', '♔'];
    const BLACK: [char; 6] = ['♟', '♞', '♝', '♜', '♛', '♚'];
    match piece.color {
        Color::White => WHITE[piece.kind.index()],
        Color::Black => BLACK[piece.kind.index()],
    }
}
