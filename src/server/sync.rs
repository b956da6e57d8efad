//! Per-match synchronisation.
//!
//! While a match is active one task runs two timers: a fast clock check that
//! notices a fallen flag, and a slower broadcast of the remaining times. The
//! task belongs to one run of the match (its epoch) and stops as soon as the
//! match ends, a newer run starts, or the match is dropped.
//!
//! End-of-match side effects go through [`finalize_match`], which relies on
//! the match's one-shot markers so they happen once no matter which path
//! noticed the ending first.

use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::game::game_match::{EndReason, Match, MatchStatus};
use crate::game::snapshot::PerColor;
use crate::game_state::chess_types::Color;
use crate::server::dispatch::Services;
use crate::server::hub::Hub;
use crate::server::protocol::{Outbound, ServerMessage};
use crate::session::identity::{GameOutcome, Identity};
use crate::session::registry::SharedMatch;

/// Messages from one timer step, and whether the task should stop.
#[derive(Debug, Default)]
pub struct SyncStep {
    pub outbound: Vec<Outbound>,
    pub finished: bool,
}

impl SyncStep {
    fn finished(outbound: Vec<Outbound>) -> Self {
        Self {
            outbound,
            finished: true,
        }
    }
}

/// Run the end-of-match side effects if the match has ended and nobody has
/// done so yet: final timer and `game_end` once per ending, then rating
/// changes for both seats and a fresh leaderboard for everyone once per game.
/// An ending reached again after an undo is announced but not re-rated.
pub fn finalize_match(services: &Services, game: &mut Match) -> Vec<Outbound> {
    if !game.claim_end() {
        return Vec::new();
    }
    let status = game.status();
    let reason = game.end_reason().unwrap_or_else(|| default_reason(status));
    let participants = game.participants();
    info!(match_id = %game.id(), %status, winner = ?game.winner(), reason = ?reason, "finalising match");

    let mut outbound = vec![
        Outbound::to_users(
            participants.clone(),
            ServerMessage::TimerUpdate {
                timer: game.clock().snapshot(),
            },
        ),
        Outbound::to_users(
            participants.clone(),
            ServerMessage::GameEnd {
                game_state: game.snapshot(),
                reason,
            },
        ),
    ];

    if !game.is_full() || !game.claim_results() {
        return outbound;
    }
    if let (Some(white), Some(black)) = (game.seat(Color::White), game.seat(Color::Black)) {
        let white_outcome = match game.winner() {
            Some(Color::White) => GameOutcome::Win,
            Some(Color::Black) => GameOutcome::Loss,
            None => GameOutcome::Draw,
        };
        let changes = record_ratings(services, white, black, white_outcome);
        outbound.push(Outbound::to_users(
            participants,
            ServerMessage::EloUpdate { changes },
        ));
        outbound.push(Outbound::to_everyone(services.leaderboard()));
    }
    outbound
}

fn record_ratings(services: &Services, white: &Identity, black: &Identity, white_outcome: GameOutcome) -> PerColor<i32> {
    let rating_of = |seat: &Identity| {
        services
            .identities
            .identity(&seat.id)
            .map_or(seat.rating, |profile| profile.elo_rating)
    };
    let (white_delta, black_delta) = services
        .elo
        .changes(rating_of(white), rating_of(black), white_outcome);
    let black_outcome = match white_outcome {
        GameOutcome::Win => GameOutcome::Loss,
        GameOutcome::Loss => GameOutcome::Win,
        GameOutcome::Draw => GameOutcome::Draw,
    };
    services.identities.record_result(&white.id, white_outcome, white_delta);
    services.identities.record_result(&black.id, black_outcome, black_delta);
    debug!(white = %white.id, black = %black.id, white_delta, black_delta, "ratings recorded");
    PerColor {
        white: white_delta,
        black: black_delta,
    }
}

fn default_reason(status: MatchStatus) -> EndReason {
    match status {
        MatchStatus::Checkmate => EndReason::Checkmate,
        MatchStatus::Stalemate => EndReason::Stalemate,
        MatchStatus::Resigned => EndReason::Resigned,
        MatchStatus::Timeout => EndReason::Timeout,
        _ => EndReason::Draw,
    }
}

/// Fast timer: advance the clock and finalise on a fallen flag.
pub fn clock_step(services: &Services, game: &Weak<Mutex<Match>>, epoch: u64, now: Instant) -> SyncStep {
    let Some(shared) = game.upgrade() else {
        return SyncStep::finished(Vec::new());
    };
    let mut game = shared.lock();
    if game.epoch() != epoch {
        return SyncStep::finished(Vec::new());
    }
    if let Some(flagged) = game.tick(now) {
        debug!(match_id = %game.id(), color = %flagged, "timeout detected by clock tick");
    }
    match game.status() {
        MatchStatus::Active => SyncStep::default(),
        _ => SyncStep::finished(finalize_match(services, &mut game)),
    }
}

/// Slow timer: push the remaining times to both players.
pub fn broadcast_step(services: &Services, game: &Weak<Mutex<Match>>, epoch: u64) -> SyncStep {
    let Some(shared) = game.upgrade() else {
        return SyncStep::finished(Vec::new());
    };
    let mut game = shared.lock();
    if game.epoch() != epoch {
        return SyncStep::finished(Vec::new());
    }
    match game.status() {
        MatchStatus::Active => SyncStep {
            outbound: vec![Outbound::to_users(
                game.participants(),
                ServerMessage::TimerUpdate {
                    timer: game.clock().snapshot(),
                },
            )],
            finished: false,
        },
        _ => SyncStep::finished(finalize_match(services, &mut game)),
    }
}

/// Start the sync task for the current run of `game`.
pub fn spawn_match_sync(hub: Arc<Hub>, game: &SharedMatch) -> JoinHandle<()> {
    let weak = Arc::downgrade(game);
    let (epoch, match_id) = {
        let game = game.lock();
        (game.epoch(), game.id())
    };
    let clock_period = hub.services().config.clock_tick;
    let broadcast_period = hub.services().config.broadcast_tick;

    tokio::spawn(async move {
        debug!(%match_id, epoch, "match sync started");
        let mut clock_timer = interval(clock_period);
        clock_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast_timer = interval(broadcast_period);
        broadcast_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                _ = clock_timer.tick() => clock_step(hub.services(), &weak, epoch, tokio::time::Instant::now().into_std()),
                _ = broadcast_timer.tick() => broadcast_step(hub.services(), &weak, epoch),
            };
            hub.deliver(step.outbound);
            if step.finished {
                break;
            }
        }
        debug!(%match_id, epoch, "match sync stopped");
    })
}
