//! Wire messages.
//!
//! Every frame is a flat JSON object with a `type` discriminator in
//! snake_case and camelCase payload keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::match_clock::TimerSnapshot;
use crate::clock::time_control::TimeControl;
use crate::errors::GameError;
use crate::game::game_match::EndReason;
use crate::game::snapshot::{MatchSnapshot, MoveSnapshot, PerColor};
use crate::game_state::chess_types::Color;
use crate::session::game_code::GameCode;
use crate::session::identity::{Profile, UserId};

/// Client to server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreatePrivateGame {
        #[serde(default)]
        time_control: Option<String>,
    },
    JoinPrivateGame {
        game_code: String,
    },
    /// Enter the pairing queue.
    JoinGame {
        #[serde(default)]
        time_control: Option<String>,
    },
    Move {
        from: String,
        to: String,
        #[serde(default)]
        promotion: Option<String>,
    },
    GetLegalMoves {
        position: String,
    },
    UndoRequest,
    UndoResponse {
        accepted: bool,
    },
    DrawOffer,
    DrawResponse {
        accepted: bool,
    },
    Surrender,
    LeaveGame,
    LeaveQueue,
    ChatMessage {
        message: String,
    },
    RematchRequest,
    RematchResponse {
        accepted: bool,
    },
    GetLeaderboard,
}

impl ClientMessage {
    /// Every `type` value the server understands.
    pub const TYPES: [&'static str; 16] = [
        "create_private_game",
        "join_private_game",
        "join_game",
        "move",
        "get_legal_moves",
        "undo_request",
        "undo_response",
        "draw_offer",
        "draw_response",
        "surrender",
        "leave_game",
        "leave_queue",
        "chat_message",
        "rematch_request",
        "rematch_response",
        "get_leaderboard",
    ];

    /// Decode one text frame. A frame that is not a JSON object, or whose
    /// payload does not fit its type, is `InvalidMessage`; a well-formed frame
    /// with an unrecognised `type` is `UnknownMessage`.
    pub fn parse(text: &str) -> Result<Self, GameError> {
        let value: Value = serde_json::from_str(text).map_err(|_| GameError::InvalidMessage)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(GameError::InvalidMessage)?;
        if !Self::TYPES.contains(&kind) {
            return Err(GameError::UnknownMessage);
        }
        serde_json::from_value(value).map_err(|_| GameError::InvalidMessage)
    }
}

/// Server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    PrivateGameCreated {
        player_id: UserId,
        color: Color,
        game_code: GameCode,
        game_state: MatchSnapshot,
    },
    QueueJoined {
        time_control: TimeControl,
        position: usize,
        message: String,
    },
    QueueLeft {
        message: String,
    },
    GameJoined {
        player_id: UserId,
        color: Color,
        #[serde(skip_serializing_if = "Option::is_none")]
        game_code: Option<GameCode>,
        game_state: MatchSnapshot,
    },
    GameStart {
        game_state: MatchSnapshot,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    MoveMade {
        r#move: MoveSnapshot,
        game_state: MatchSnapshot,
        is_check: bool,
    },
    LegalMoves {
        position: String,
        moves: Vec<String>,
    },
    UndoRequestReceived {
        from: String,
    },
    UndoRequestSent {
        message: String,
    },
    UndoResponse {
        accepted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        game_state: Option<MatchSnapshot>,
    },
    DrawOfferReceived {
        from: String,
    },
    DrawOfferSent {
        message: String,
    },
    DrawResponse {
        accepted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        game_state: Option<MatchSnapshot>,
    },
    GameEnd {
        game_state: MatchSnapshot,
        reason: EndReason,
    },
    TimerUpdate {
        timer: TimerSnapshot,
    },
    PlayerLeft {
        message: String,
    },
    PlayerDisconnected {
        message: String,
    },
    LeftGame {
        message: String,
    },
    ChatMessage {
        message: String,
        sender: String,
        sender_id: UserId,
    },
    RematchRequestReceived {
        from: String,
    },
    RematchRequestSent {
        message: String,
    },
    RematchAccepted {
        player_id: UserId,
        color: Color,
        game_state: MatchSnapshot,
        message: String,
    },
    RematchDeclined {
        message: String,
    },
    EloUpdate {
        changes: PerColor<i32>,
    },
    LeaderboardUpdate {
        leaderboard: Vec<Profile>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(err: &GameError) -> Self {
        ServerMessage::Error {
            message: err.to_string(),
        }
    }

    /// The `type` tag this message is sent with.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::PrivateGameCreated { .. } => "private_game_created",
            ServerMessage::QueueJoined { .. } => "queue_joined",
            ServerMessage::QueueLeft { .. } => "queue_left",
            ServerMessage::GameJoined { .. } => "game_joined",
            ServerMessage::GameStart { .. } => "game_start",
            ServerMessage::MoveMade { .. } => "move_made",
            ServerMessage::LegalMoves { .. } => "legal_moves",
            ServerMessage::UndoRequestReceived { .. } => "undo_request_received",
            ServerMessage::UndoRequestSent { .. } => "undo_request_sent",
            ServerMessage::UndoResponse { .. } => "undo_response",
            ServerMessage::DrawOfferReceived { .. } => "draw_offer_received",
            ServerMessage::DrawOfferSent { .. } => "draw_offer_sent",
            ServerMessage::DrawResponse { .. } => "draw_response",
            ServerMessage::GameEnd { .. } => "game_end",
            ServerMessage::TimerUpdate { .. } => "timer_update",
            ServerMessage::PlayerLeft { .. } => "player_left",
            ServerMessage::PlayerDisconnected { .. } => "player_disconnected",
            ServerMessage::LeftGame { .. } => "left_game",
            ServerMessage::ChatMessage { .. } => "chat_message",
            ServerMessage::RematchRequestReceived { .. } => "rematch_request_received",
            ServerMessage::RematchRequestSent { .. } => "rematch_request_sent",
            ServerMessage::RematchAccepted { .. } => "rematch_accepted",
            ServerMessage::RematchDeclined { .. } => "rematch_declined",
            ServerMessage::EloUpdate { .. } => "elo_update",
            ServerMessage::LeaderboardUpdate { .. } => "leaderboard_update",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// Who receives an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    User(UserId),
    Users(Vec<UserId>),
    Everyone,
}

impl Recipient {
    pub fn includes(&self, user: &UserId) -> bool {
        match self {
            Recipient::User(id) => id == user,
            Recipient::Users(ids) => ids.contains(user),
            Recipient::Everyone => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Recipient,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn to_user(user: &UserId, message: ServerMessage) -> Self {
        Self {
            to: Recipient::User(user.clone()),
            message,
        }
    }

    pub fn to_users(users: Vec<UserId>, message: ServerMessage) -> Self {
        Self {
            to: Recipient::Users(users),
            message,
        }
    }

    pub fn to_everyone(message: ServerMessage) -> Self {
        Self {
            to: Recipient::Everyone,
            message,
        }
    }
}
