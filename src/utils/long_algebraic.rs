use crate::game_state::chess_types::{PieceKind, Square};
use crate::game_state::undo_state::MoveRecord;
use crate::utils::algebraic::{algebraic_to_square, square_name};

/// Parse a coordinate move such as `e2e4` or `e7e8q`.
pub fn parse_long_algebraic(text: &str) -> Result<(Square, Square, Option<PieceKind>), String> {
    let text = text.trim();
    if !text.is_ascii() || (text.len() != 4 && text.len() != 5) {
        return Err(format!("Invalid long algebraic move: {text}"));
    }

    let from = algebraic_to_square(&text[0..2])?;
    let to = algebraic_to_square(&text[2..4])?;
    let promotion = match text.get(4..5) {
        Some(letter) => Some(
            PieceKind::from_name(letter)
                .filter(|kind| kind.is_promotion_target())
                .ok_or_else(|| format!("Invalid promotion piece: {letter}"))?,
        ),
        None => None,
    };

    Ok((from, to, promotion))
}

/// Format an applied move as coordinate notation.
pub fn move_record_to_long_algebraic(record: &MoveRecord) -> String {
    let mut out = square_name(record.from);
    out.push_str(&square_name(record.to));
    if let Some(kind) = record.promotion {
        out.push(kind.letter());
    }
    out
}
