//! Typed dispatch from client messages to registry and match operations.
//!
//! Each handler takes the caller's identity and the decoded payload, runs the
//! operation synchronously and returns the messages to send. Nothing here
//! touches a socket, so whole games can be driven from tests.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::clock::time_control::TimeControl;
use crate::errors::{GameError, GameResult};
use crate::game::game_match::{EndReason, Match, MatchStatus};
use crate::game::snapshot::MoveSnapshot;
use crate::game_state::chess_types::{Color, PieceKind};
use crate::server::config::ServerConfig;
use crate::server::protocol::{ClientMessage, Outbound, ServerMessage};
use crate::server::sync::finalize_match;
use crate::session::identity::{Identity, IdentityProvider, UserId};
use crate::session::rating::EloCalculator;
use crate::session::registry::{SessionRegistry, SharedMatch};
use crate::utils::algebraic::{algebraic_to_square, square_name};

const WAITING_FOR_OPPONENT: &str = "Waiting for opponent response";

/// Everything a handler needs, constructed once at startup.
pub struct Services {
    pub registry: Mutex<SessionRegistry>,
    pub identities: Arc<dyn IdentityProvider>,
    pub elo: EloCalculator,
    pub config: ServerConfig,
}

impl Services {
    pub fn new(config: ServerConfig, identities: Arc<dyn IdentityProvider>) -> Self {
        Self {
            registry: Mutex::new(SessionRegistry::new()),
            identities,
            elo: EloCalculator::new(config.k_factor),
            config,
        }
    }

    /// The identity with its stored rating, which may have moved since the
    /// connection was opened.
    pub fn current_identity(&self, identity: &Identity) -> Identity {
        self.identities
            .identity(&identity.id)
            .map(|profile| profile.identity())
            .unwrap_or_else(|| identity.clone())
    }

    pub fn leaderboard(&self) -> ServerMessage {
        ServerMessage::LeaderboardUpdate {
            leaderboard: self.identities.top_leaderboard(self.config.leaderboard_size),
        }
    }

    fn match_of(&self, user: &UserId) -> Option<SharedMatch> {
        self.registry.lock().match_of(user)
    }
}

/// Messages produced by one operation, plus matches that began a new run and
/// need a sync task.
#[derive(Debug, Default)]
pub struct Outcome {
    pub outbound: Vec<Outbound>,
    pub started: Vec<SharedMatch>,
}

impl Outcome {
    fn push(&mut self, outbound: Outbound) {
        self.outbound.push(outbound);
    }

    fn reply(user: &UserId, message: ServerMessage) -> Self {
        Self {
            outbound: vec![Outbound::to_user(user, message)],
            started: Vec::new(),
        }
    }

    /// Names of the messages in send order. Handy in tests and logs.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.outbound.iter().map(|out| out.message.kind()).collect()
    }
}

/// Decode and dispatch one text frame. Rejections come back as an `error`
/// message to the sender only.
pub fn handle_text(services: &Services, identity: &Identity, text: &str, now: Instant) -> Outcome {
    match ClientMessage::parse(text) {
        Ok(message) => dispatch(services, identity, message, now),
        Err(err) => {
            debug!(user_id = %identity.id, error = %err, "rejected frame");
            Outcome::reply(&identity.id, ServerMessage::error(&err))
        }
    }
}

pub fn dispatch(services: &Services, identity: &Identity, message: ClientMessage, now: Instant) -> Outcome {
    let user = &identity.id;
    let result = match message {
        ClientMessage::CreatePrivateGame { time_control } => {
            create_private_game(services, identity, TimeControl::from_label(time_control.as_deref()), now)
        }
        ClientMessage::JoinPrivateGame { game_code } => join_private_game(services, identity, &game_code, now),
        ClientMessage::JoinGame { time_control } => {
            join_queue(services, identity, TimeControl::from_label(time_control.as_deref()), now)
        }
        ClientMessage::Move { from, to, promotion } => {
            make_move(services, user, &from, &to, promotion.as_deref(), now)
        }
        ClientMessage::GetLegalMoves { position } => legal_moves(services, user, position),
        ClientMessage::UndoRequest => request_undo(services, identity),
        ClientMessage::UndoResponse { accepted } => respond_undo(services, user, accepted, now),
        ClientMessage::DrawOffer => offer_draw(services, identity),
        ClientMessage::DrawResponse { accepted } => respond_draw(services, user, accepted),
        ClientMessage::Surrender => surrender(services, user),
        ClientMessage::LeaveGame => Ok(leave(services, user, EndReason::OpponentLeft)),
        ClientMessage::LeaveQueue => Ok(leave_queue(services, user)),
        ClientMessage::ChatMessage { message } => chat(services, identity, message),
        ClientMessage::RematchRequest => request_rematch(services, identity),
        ClientMessage::RematchResponse { accepted } => respond_rematch(services, user, accepted, now),
        ClientMessage::GetLeaderboard => Ok(Outcome::reply(user, services.leaderboard())),
    };
    result.unwrap_or_else(|err| {
        debug!(user_id = %user, error = %err, "request rejected");
        Outcome::reply(user, ServerMessage::error(&err))
    })
}

/// Run the departure of `user`: out of every queue, forfeit of a full active
/// match, then out of the seat. Used for both `leave_game` and disconnects.
pub fn leave(services: &Services, user: &UserId, reason: EndReason) -> Outcome {
    let mut outcome = Outcome::default();
    let mut registry = services.registry.lock();
    registry.leave_queue(user);

    if let Some(shared) = registry.match_of(user) {
        let forfeited = {
            let mut game = shared.lock();
            let forfeited = game.forfeit(user, reason).is_some();
            outcome.outbound.extend(finalize_match(services, &mut game));
            forfeited
        };
        registry.remove_player(user);

        let remaining = shared.lock().participants();
        if !forfeited && !remaining.is_empty() {
            let notice = match reason {
                EndReason::OpponentDisconnected => ServerMessage::PlayerDisconnected {
                    message: "Opponent disconnected".into(),
                },
                _ => ServerMessage::PlayerLeft {
                    message: "Opponent left the game".into(),
                },
            };
            outcome.push(Outbound::to_users(remaining, notice));
        }
        info!(user_id = %user, forfeited, "player left match");
    }

    if reason != EndReason::OpponentDisconnected {
        outcome.push(Outbound::to_user(
            user,
            ServerMessage::LeftGame {
                message: "You have left the game".into(),
            },
        ));
    }
    outcome
}

fn create_private_game(
    services: &Services,
    identity: &Identity,
    time_control: TimeControl,
    now: Instant,
) -> GameResult<Outcome> {
    let player = services.current_identity(identity);
    let (shared, code) = services
        .registry
        .lock()
        .create_private_match(player, time_control, now)?;
    let game = shared.lock();
    Ok(Outcome::reply(
        &identity.id,
        ServerMessage::PrivateGameCreated {
            player_id: identity.id.clone(),
            color: Color::White,
            game_code: code,
            game_state: game.snapshot(),
        },
    ))
}

fn join_private_game(services: &Services, identity: &Identity, code: &str, now: Instant) -> GameResult<Outcome> {
    let player = services.current_identity(identity);
    let (shared, color) = services.registry.lock().join_private_match(player, code, now)?;

    let mut outcome = Outcome::default();
    let started = {
        let game = shared.lock();
        outcome.push(Outbound::to_user(
            &identity.id,
            ServerMessage::GameJoined {
                player_id: identity.id.clone(),
                color,
                game_code: game.code().cloned(),
                game_state: game.snapshot(),
            },
        ));
        let started = game.status() == MatchStatus::Active;
        if started {
            outcome.push(game_start(&game, None));
        }
        started
    };
    if started {
        outcome.started.push(shared);
    }
    Ok(outcome)
}

fn join_queue(services: &Services, identity: &Identity, time_control: TimeControl, now: Instant) -> GameResult<Outcome> {
    let player = services.current_identity(identity);
    let mut registry = services.registry.lock();
    let position = registry.join_queue(player, time_control)?;
    info!(user_id = %identity.id, %time_control, position, "joined queue");

    let mut outcome = Outcome::reply(
        &identity.id,
        ServerMessage::QueueJoined {
            time_control,
            position,
            message: format!("Joined {time_control} queue. Position: {position}"),
        },
    );
    for pairing in registry.try_match(time_control, now) {
        {
            let game = pairing.game.lock();
            for (user, color) in [(&pairing.white, Color::White), (&pairing.black, Color::Black)] {
                outcome.push(Outbound::to_user(
                    user,
                    ServerMessage::GameJoined {
                        player_id: user.clone(),
                        color,
                        game_code: None,
                        game_state: game.snapshot(),
                    },
                ));
            }
            outcome.push(game_start(&game, None));
        }
        outcome.started.push(pairing.game);
    }
    Ok(outcome)
}

fn make_move(
    services: &Services,
    user: &UserId,
    from: &str,
    to: &str,
    promotion: Option<&str>,
    now: Instant,
) -> GameResult<Outcome> {
    let from = parse_square(from)?;
    let to = parse_square(to)?;
    let promotion = promotion.and_then(PieceKind::from_name);
    let shared = services.match_of(user).ok_or(GameError::GameNotFound)?;
    let mut game = shared.lock();

    let moved = game.make_move(user, from, to, promotion, now)?;
    let mut outcome = Outcome::default();
    outcome.push(Outbound::to_users(
        game.participants(),
        ServerMessage::MoveMade {
            r#move: MoveSnapshot::from(&moved.record),
            game_state: game.snapshot(),
            is_check: moved.is_check,
        },
    ));
    outcome.outbound.extend(finalize_match(services, &mut game));
    Ok(outcome)
}

fn legal_moves(services: &Services, user: &UserId, position: String) -> GameResult<Outcome> {
    let square = parse_square(&position)?;
    let shared = services.match_of(user).ok_or(GameError::NotInGame)?;
    let moves = shared
        .lock()
        .legal_moves(square)
        .into_iter()
        .map(square_name)
        .collect();
    Ok(Outcome::reply(user, ServerMessage::LegalMoves { position, moves }))
}

fn request_undo(services: &Services, identity: &Identity) -> GameResult<Outcome> {
    let shared = services.match_of(&identity.id).ok_or(GameError::NotInGame)?;
    let mut game = shared.lock();
    let responder = game.request_undo(&identity.id)?;
    Ok(offer_sent(
        &game,
        identity,
        responder,
        ServerMessage::UndoRequestReceived {
            from: identity.username.clone(),
        },
        ServerMessage::UndoRequestSent {
            message: WAITING_FOR_OPPONENT.into(),
        },
    ))
}

fn respond_undo(services: &Services, user: &UserId, accepted: bool, now: Instant) -> GameResult<Outcome> {
    let shared = services.match_of(user).ok_or(GameError::NotInGame)?;
    let mut outcome = Outcome::default();
    {
        let mut game = shared.lock();
        let epoch = game.epoch();
        let accepted = game.respond_undo(user, accepted, now)?;
        outcome.push(Outbound::to_users(
            game.participants(),
            ServerMessage::UndoResponse {
                accepted,
                game_state: accepted.then(|| game.snapshot()),
            },
        ));
        if game.epoch() == epoch {
            return Ok(outcome);
        }
    }
    // The undo reopened a finished match.
    outcome.started.push(shared);
    Ok(outcome)
}

fn offer_draw(services: &Services, identity: &Identity) -> GameResult<Outcome> {
    let shared = services.match_of(&identity.id).ok_or(GameError::NotInGame)?;
    let mut game = shared.lock();
    let responder = game.offer_draw(&identity.id)?;
    Ok(offer_sent(
        &game,
        identity,
        responder,
        ServerMessage::DrawOfferReceived {
            from: identity.username.clone(),
        },
        ServerMessage::DrawOfferSent {
            message: WAITING_FOR_OPPONENT.into(),
        },
    ))
}

fn respond_draw(services: &Services, user: &UserId, accepted: bool) -> GameResult<Outcome> {
    let shared = services.match_of(user).ok_or(GameError::NotInGame)?;
    let mut game = shared.lock();
    let accepted = game.respond_draw(user, accepted)?;
    let mut outcome = Outcome::default();
    outcome.push(Outbound::to_users(
        game.participants(),
        ServerMessage::DrawResponse {
            accepted,
            game_state: accepted.then(|| game.snapshot()),
        },
    ));
    outcome.outbound.extend(finalize_match(services, &mut game));
    Ok(outcome)
}

fn surrender(services: &Services, user: &UserId) -> GameResult<Outcome> {
    let shared = services.match_of(user).ok_or(GameError::NotInGame)?;
    let mut game = shared.lock();
    game.surrender(user)?;
    Ok(Outcome {
        outbound: finalize_match(services, &mut game),
        started: Vec::new(),
    })
}

fn leave_queue(services: &Services, user: &UserId) -> Outcome {
    if services.registry.lock().leave_queue(user) {
        info!(user_id = %user, "left queue");
    }
    Outcome::reply(
        user,
        ServerMessage::QueueLeft {
            message: "You have left the matchmaking queue".into(),
        },
    )
}

fn chat(services: &Services, identity: &Identity, message: String) -> GameResult<Outcome> {
    let shared = services.match_of(&identity.id).ok_or(GameError::NotInGame)?;
    let participants = shared.lock().participants();
    Ok(Outcome {
        outbound: vec![Outbound::to_users(
            participants,
            ServerMessage::ChatMessage {
                message,
                sender: identity.username.clone(),
                sender_id: identity.id.clone(),
            },
        )],
        started: Vec::new(),
    })
}

fn request_rematch(services: &Services, identity: &Identity) -> GameResult<Outcome> {
    let shared = services.match_of(&identity.id).ok_or(GameError::NotInGame)?;
    let mut game = shared.lock();
    let responder = game.request_rematch(&identity.id)?;
    Ok(offer_sent(
        &game,
        identity,
        responder,
        ServerMessage::RematchRequestReceived {
            from: identity.username.clone(),
        },
        ServerMessage::RematchRequestSent {
            message: "Rematch request sent".into(),
        },
    ))
}

fn respond_rematch(services: &Services, user: &UserId, accepted: bool, now: Instant) -> GameResult<Outcome> {
    let shared = services.match_of(user).ok_or(GameError::NotInGame)?;
    let mut outcome = Outcome::default();
    {
        let mut game = shared.lock();
        let requester = game
            .color_of(user)
            .and_then(|color| game.seat(color.opposite()))
            .map(|seat| seat.id.clone());
        if !game.respond_rematch(user, accepted, now)? {
            if let Some(requester) = requester {
                outcome.push(Outbound::to_user(
                    &requester,
                    ServerMessage::RematchDeclined {
                        message: "Rematch declined".into(),
                    },
                ));
            }
            return Ok(outcome);
        }

        for color in Color::BOTH {
            if let Some(seat) = game.seat(color) {
                outcome.push(Outbound::to_user(
                    &seat.id,
                    ServerMessage::RematchAccepted {
                        player_id: seat.id.clone(),
                        color,
                        game_state: game.snapshot(),
                        message: format!("Rematch started! You are now {color}"),
                    },
                ));
            }
        }
        outcome.push(game_start(&game, Some("Rematch started!")));
    }
    outcome.started.push(shared);
    Ok(outcome)
}

fn offer_sent(
    game: &Match,
    identity: &Identity,
    responder: Color,
    received: ServerMessage,
    sent: ServerMessage,
) -> Outcome {
    let mut outcome = Outcome::default();
    if let Some(opponent) = game.seat(responder) {
        outcome.push(Outbound::to_user(&opponent.id, received));
    }
    outcome.push(Outbound::to_user(&identity.id, sent));
    debug!(match_id = %game.id(), user_id = %identity.id, "offer armed");
    outcome
}

fn game_start(game: &Match, message: Option<&str>) -> Outbound {
    Outbound::to_users(
        game.participants(),
        ServerMessage::GameStart {
            game_state: game.snapshot(),
            message: message.map(str::to_owned),
        },
    )
}

fn parse_square(text: &str) -> GameResult<u8> {
    algebraic_to_square(text.trim()).map_err(|_| GameError::InvalidSquare(text.to_owned()))
}
