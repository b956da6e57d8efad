//! FEN-to-Board parser.
//!
//! Builds a fully-populated [`Board`] from a Forsyth-Edwards Notation string.
//! FEN carries no per-piece history, so `has_moved` is derived: pawns off
//! their start rank count as moved, and kings and rooks count as unmoved only
//! when a castling right still refers to them.

use crate::game_state::{board::Board, chess_types::*};
use crate::utils::algebraic::algebraic_to_square;

pub fn parse_fen(fen: &str) -> Result<Board, String> {
    let mut parts = fen.split_whitespace();

    let board_part = parts.next().ok_or("Missing board layout in FEN")?;
    let side_part = parts.next().ok_or("Missing side-to-move in FEN")?;
    let castling_part = parts.next().ok_or("Missing castling rights in FEN")?;
    let en_passant_part = parts.next().ok_or("Missing en-passant square in FEN")?;
    let halfmove_part = parts.next().unwrap_or("0");
    let fullmove_part = parts.next().unwrap_or("1");

    if parts.next().is_some() {
        return Err("FEN has extra trailing fields".to_owned());
    }

    let mut board = Board::new_empty();

    parse_placement(board_part, &mut board)?;
    board.side_to_move = parse_side_to_move(side_part)?;
    board.castling_rights = parse_castling_rights(castling_part)?;
    board.en_passant_square = parse_en_passant_square(en_passant_part)?;
    board.halfmove_clock = halfmove_part
        .parse::<u16>()
        .map_err(|_| format!("Invalid halfmove clock: {halfmove_part}"))?;
    board.fullmove_number = fullmove_part
        .parse::<u16>()
        .map_err(|_| format!("Invalid fullmove number: {fullmove_part}"))?;

    derive_has_moved(&mut board);
    board.reset_history();

    Ok(board)
}

fn parse_placement(board_part: &str, board: &mut Board) -> Result<(), String> {
    let ranks: Vec<&str> = board_part.split('/').collect();
    if ranks.len() != 8 {
        return Err("Board layout must contain 8 ranks".to_owned());
    }

    for (fen_rank_idx, rank_str) in ranks.iter().enumerate() {
        let rank = 7 - fen_rank_idx as u8;
        let mut file = 0u8;

        for ch in rank_str.chars() {
            if let Some(empty_count) = ch.to_digit(10) {
                if !(1..=8).contains(&empty_count) {
                    return Err(format!("Invalid empty-square count '{ch}'"));
                }
                if u32::from(file) + empty_count > 8 {
                    return Err("Board rank has too many files".to_owned());
                }
                file += empty_count as u8;
                continue;
            }

            let (color, kind) = piece_from_fen_char(ch)
                .ok_or_else(|| format!("Invalid piece character '{ch}' in board layout"))?;

            if file >= 8 {
                return Err("Board rank has too many files".to_owned());
            }

            board.put_piece(square_at(file, rank), Piece::new(kind, color));
            file += 1;
        }

        if file != 8 {
            return Err("Board rank does not sum to 8 files".to_owned());
        }
    }

    Ok(())
}

fn parse_side_to_move(side_part: &str) -> Result<Color, String> {
    match side_part {
        "w" => Ok(Color::White),
        "b" => Ok(Color::Black),
        _ => Err(format!("Invalid side-to-move field: {side_part}")),
    }
}

fn parse_castling_rights(castling_part: &str) -> Result<CastlingRights, String> {
    if castling_part == "-" {
        return Ok(0);
    }

    castling_part.chars().try_fold(0, |rights, ch| {
        let right = match ch {
            'K' => CASTLE_WHITE_KINGSIDE,
            'Q' => CASTLE_WHITE_QUEENSIDE,
            'k' => CASTLE_BLACK_KINGSIDE,
            'q' => CASTLE_BLACK_QUEENSIDE,
            _ => return Err(format!("Invalid castling rights character: {ch}")),
        };
        Ok(rights | right)
    })
}

fn parse_en_passant_square(en_passant_part: &str) -> Result<Option<Square>, String> {
    if en_passant_part == "-" {
        return Ok(None);
    }
    Ok(Some(algebraic_to_square(en_passant_part)?))
}

fn piece_from_fen_char(ch: char) -> Option<(Color, PieceKind)> {
    let color = if ch.is_ascii_uppercase() {
        Color::White
    } else {
        Color::Black
    };
    let kind = PieceKind::from_name(&ch.to_string())?;
    Some((color, kind))
}

fn derive_has_moved(board: &mut Board) {
    let rights = board.castling_rights;
    let unmoved_rook = |sq: Square| match sq {
        0 => rights & CASTLE_WHITE_QUEENSIDE != 0,
        7 => rights & CASTLE_WHITE_KINGSIDE != 0,
        56 => rights & CASTLE_BLACK_QUEENSIDE != 0,
        63 => rights & CASTLE_BLACK_KINGSIDE != 0,
        _ => false,
    };
    let unmoved_king = |color: Color, sq: Square| match color {
        Color::White => sq == 4 && rights & (CASTLE_WHITE_KINGSIDE | CASTLE_WHITE_QUEENSIDE) != 0,
        Color::Black => sq == 60 && rights & (CASTLE_BLACK_KINGSIDE | CASTLE_BLACK_QUEENSIDE) != 0,
    };

    let placed: Vec<(Square, Piece)> = board.pieces().collect();
    for (sq, mut piece) in placed {
        piece.has_moved = match piece.kind {
            PieceKind::Pawn => rank_of(sq) != piece.color.pawn_start_rank(),
            PieceKind::King => !unmoved_king(piece.color, sq),
            PieceKind::Rook => !(rank_of(sq) == piece.color.back_rank() && unmoved_rook(sq)),
            _ => false,
        };
        board.put_piece(sq, piece);
    }
}

#[cfg(test)]
mod tests {
    use super::parse_fen;
    use crate::game_state::chess_rules::STARTING_POSITION_FEN;
    use crate::game_state::chess_types::*;
    use crate::utils::render_game_state::render_board;

    #[test]
    fn parse_starting_fen_and_render_board() {
        let board = parse_fen(STARTING_POSITION_FEN).expect("starting FEN should parse");

        println!("\n{}", render_board(&board));

        assert_eq!(board.side_to_move, Color::White);
        assert_eq!(board.fullmove_number, 1);
        assert_eq!(board.castling_rights, CASTLE_ALL);
        assert!(board.pieces().all(|(_, piece)| !piece.has_moved));
    }

    #[test]
    fn has_moved_follows_castling_rights_and_pawn_ranks() {
        let board = parse_fen("r3k2r/8/8/4p3/8/8/P7/R3K2R w Kq - 0 1").expect("FEN should parse");

        let moved = |sq: Square| board.piece_at(sq).map(|p| p.has_moved);
        assert_eq!(moved(7), Some(false)); // h1, K right
        assert_eq!(moved(0), Some(true)); // a1, no Q right
        assert_eq!(moved(4), Some(false));
        assert_eq!(moved(56), Some(false)); // a8, q right
        assert_eq!(moved(63), Some(true));
        assert_eq!(moved(8), Some(false)); // a2 pawn at home
        assert_eq!(moved(36), Some(true)); // e5 pawn advanced
    }

    #[test]
    fn clocks_are_optional_but_layout_errors_are_not() {
        let board = parse_fen("4k3/8/8/8/8/8/8/4K3 b - -").expect("short FEN should parse");
        assert_eq!(board.halfmove_clock, 0);
        assert_eq!(board.fullmove_number, 1);

        assert!(parse_fen("4k3/8/8/8/8/8/4K3 w - - 0 1").is_err());
        assert!(parse_fen("4k3/8/8/8/8/8/8/4K2X w - - 0 1").is_err());
        assert!(parse_fen("4k3/8/8/8/8/8/8/4K3 x - - 0 1").is_err());
        assert!(parse_fen("4k3/8/8/8/8/8/8/4K3 w KX - 0 1").is_err());
    }

    #[test]
    fn oversized_empty_runs_are_rejected() {
        let long_rank = "8".repeat(32);
        let fen = format!("4k3/8/8/8/8/8/{long_rank}/4K3 w - - 0 1");
        assert_eq!(parse_fen(&fen).err().as_deref(), Some("Board rank has too many files"));
        assert!(parse_fen("4k3/8/8/8/8/8/44P/4K3 w - - 0 1").is_err());
        assert!(parse_fen("4k3/8/8/8/8/8/71/4K3 w - - 0 1").is_ok());
    }
}
