//! Serialisable views of a match, sent to clients as `gameState`.

use serde::Serialize;

use crate::clock::match_clock::TimerSnapshot;
use crate::clock::time_control::TimeControl;
use crate::game::game_match::{EndReason, Match, MatchId, MatchStatus};
use crate::game_state::board::Board;
use crate::game_state::chess_types::*;
use crate::game_state::undo_state::MoveRecord;
use crate::move_generation::move_validator::DrawReason;
use crate::session::game_code::GameCode;
use crate::session::identity::Identity;
use crate::utils::algebraic::square_name;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub game_id: MatchId,
    pub board: BoardSnapshot,
    pub fen: String,
    pub current_turn: Color,
    pub status: MatchStatus,
    pub winner: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draw_reason: Option<DrawReason>,
    pub players: PerColor<Option<Identity>>,
    pub is_check: PerColor<bool>,
    pub timer: TimerSnapshot,
    pub time_control: TimeControl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_code: Option<GameCode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerColor<T> {
    pub white: T,
    pub black: T,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub pieces: Vec<PieceSnapshot>,
    pub en_passant_target: Option<String>,
    /// Pieces captured *by* each color.
    pub captured_pieces: PerColor<Vec<PieceKind>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceSnapshot {
    #[serde(rename = "type")]
    pub kind: PieceKind,
    pub color: Color,
    pub position: String,
    pub has_moved: bool,
}

/// A played move as sent in `move_made`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSnapshot {
    pub from: String,
    pub to: String,
    pub piece: PieceKind,
    pub color: Color,
    pub captured: Option<PieceKind>,
    pub is_en_passant: bool,
    pub is_castling: bool,
    pub promotion: Option<PieceKind>,
}

impl From<&MoveRecord> for MoveSnapshot {
    fn from(record: &MoveRecord) -> Self {
        Self {
            from: square_name(record.from),
            to: square_name(record.to),
            piece: record.piece,
            color: record.color,
            captured: record.captured,
            is_en_passant: record.is_en_passant,
            is_castling: record.is_castling,
            promotion: record.promotion,
        }
    }
}

impl From<&Board> for BoardSnapshot {
    fn from(board: &Board) -> Self {
        let kinds = |color: Color| -> Vec<PieceKind> {
            board.captured[color.index()].iter().map(|p| p.kind).collect()
        };
        Self {
            pieces: board
                .pieces()
                .map(|(square, piece)| PieceSnapshot {
                    kind: piece.kind,
                    color: piece.color,
                    position: square_name(square),
                    has_moved: piece.has_moved,
                })
                .collect(),
            en_passant_target: board.en_passant_square.map(square_name),
            captured_pieces: PerColor {
                white: kinds(Color::White),
                black: kinds(Color::Black),
            },
        }
    }
}

impl Match {
    /// Full client-facing view of the match as of the last clock tick.
    pub fn snapshot(&self) -> MatchSnapshot {
        let board = self.board();
        MatchSnapshot {
            game_id: self.id(),
            board: BoardSnapshot::from(board),
            fen: board.to_fen(),
            current_turn: self.current_turn(),
            status: self.status(),
            winner: self.winner(),
            end_reason: self.end_reason(),
            draw_reason: self.draw_reason(),
            players: PerColor {
                white: self.seat(Color::White).cloned(),
                black: self.seat(Color::Black).cloned(),
            },
            is_check: PerColor {
                white: self.is_check(Color::White),
                black: self.is_check(Color::Black),
            },
            timer: self.clock().snapshot(),
            time_control: self.time_control(),
            game_code: self.code().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use serde_json::json;

    use crate::clock::time_control::TimeControl;
    use crate::game::game_match::Match;
    use crate::session::identity::{Identity, UserId};

    fn player(name: &str) -> Identity {
        Identity {
            id: UserId::new(name),
            username: name.to_owned(),
            rating: 600,
        }
    }

    #[test]
    fn snapshot_uses_the_wire_field_names() {
        let now = Instant::now();
        let mut game = Match::new(TimeControl::Rapid, None);
        game.add_player(player("ann"), now).expect("seat");
        game.add_player(player("ben"), now).expect("seat");
        game.make_move(&UserId::new("ann"), 12, 28, None, now)
            .expect("e2e4 should be accepted");

        let value = serde_json::to_value(game.snapshot()).expect("snapshot should serialise");
        assert_eq!(value["currentTurn"], json!("black"));
        assert_eq!(value["status"], json!("active"));
        assert_eq!(value["winner"], json!(null));
        assert_eq!(value["timeControl"], json!("rapid"));
        assert_eq!(value["board"]["enPassantTarget"], json!("e3"));
        assert_eq!(value["players"]["white"]["name"], json!("ann"));
        assert_eq!(value["isCheck"], json!({"white": false, "black": false}));
        assert_eq!(value["timer"]["activeColor"], json!("black"));
        assert_eq!(value["board"]["pieces"].as_array().map(Vec::len), Some(32));
        assert!(value.get("gameCode").is_none());

        let e4 = value["board"]["pieces"]
            .as_array()
            .and_then(|pieces| pieces.iter().find(|p| p["position"] == json!("e4")))
            .expect("e4 pawn should be listed");
        assert_eq!(e4["type"], json!("pawn"));
        assert_eq!(e4["hasMoved"], json!(true));
    }

    #[test]
    fn waiting_match_has_an_empty_seat() {
        let mut game = Match::new(TimeControl::Blitz, None);
        game.add_player(player("solo"), Instant::now()).expect("seat");
        let value = serde_json::to_value(game.snapshot()).expect("snapshot should serialise");
        assert_eq!(value["status"], json!("waiting"));
        assert_eq!(value["players"]["black"], json!(null));
        assert_eq!(value["timer"]["activeColor"], json!(null));
    }
}
