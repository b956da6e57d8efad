//! Session registry: who plays where.
//!
//! The registry maps users to matches and private codes to matches, and owns
//! the pairing queue. It is shared behind its own lock; each match carries a
//! separate lock. Callers always take the registry lock before a match lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::clock::time_control::TimeControl;
use crate::errors::{GameError, GameResult};
use crate::game::game_match::{Match, MatchId, MatchStatus};
use crate::game_state::chess_types::Color;
use crate::session::game_code::GameCode;
use crate::session::identity::{Identity, UserId};
use crate::session::pairing_queue::PairingQueue;

pub type SharedMatch = Arc<Mutex<Match>>;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    matches: HashMap<MatchId, SharedMatch>,
    player_matches: HashMap<UserId, MatchId>,
    codes: HashMap<GameCode, MatchId>,
    queue: PairingQueue,
}

/// A match formed from the pairing queue.
#[derive(Debug, Clone)]
pub struct Pairing {
    pub game: SharedMatch,
    pub white: UserId,
    pub black: UserId,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn queue(&self) -> &PairingQueue {
        &self.queue
    }

    pub fn get(&self, id: &MatchId) -> Option<SharedMatch> {
        self.matches.get(id).cloned()
    }

    /// The match `user` is seated in.
    pub fn match_of(&self, user: &UserId) -> Option<SharedMatch> {
        self.player_matches.get(user).and_then(|id| self.get(id))
    }

    pub fn is_seated(&self, user: &UserId) -> bool {
        self.player_matches.contains_key(user)
    }

    /// Create a private match under a fresh code and seat its creator.
    pub fn create_private_match(
        &mut self,
        creator: Identity,
        time_control: TimeControl,
        now: Instant,
    ) -> GameResult<(SharedMatch, GameCode)> {
        self.ensure_free(&creator.id)?;
        let code = GameCode::generate_unique(|code| self.codes.contains_key(code));
        let mut game = Match::new(time_control, Some(code.clone()));
        let user = creator.id.clone();
        game.add_player(creator, now)?;

        let id = game.id();
        info!(match_id = %id, game_code = %code, %time_control, user_id = %user, "private match created");
        let shared = self.insert(game);
        self.codes.insert(code.clone(), id);
        self.player_matches.insert(user, id);
        Ok((shared, code))
    }

    /// Seat `player` in the private match behind `code`.
    pub fn join_private_match(
        &mut self,
        player: Identity,
        code: &str,
        now: Instant,
    ) -> GameResult<(SharedMatch, Color)> {
        self.ensure_free(&player.id)?;
        let code = GameCode::parse(code)?;
        let id = *self.codes.get(&code).ok_or(GameError::InvalidGameCode)?;
        let shared = self.get(&id).ok_or(GameError::GameNotFound)?;

        let user = player.id.clone();
        let color = {
            let mut game = shared.lock();
            if game.is_full() {
                return Err(GameError::GameFull);
            }
            game.add_player(player, now)?
        };
        info!(match_id = %id, game_code = %code, user_id = %user, %color, "joined private match");
        self.player_matches.insert(user, id);
        Ok((shared, color))
    }

    /// Seat `player` in the oldest open public match of this time control, or
    /// in a new one.
    pub fn find_or_create_public(
        &mut self,
        player: Identity,
        time_control: TimeControl,
        now: Instant,
    ) -> GameResult<(SharedMatch, Color)> {
        self.ensure_free(&player.id)?;
        let user = player.id.clone();

        let open = self
            .matches
            .values()
            .filter_map(|shared| {
                let game = shared.lock();
                let joinable = game.status() == MatchStatus::Waiting
                    && !game.is_private()
                    && !game.is_full()
                    && game.time_control() == time_control;
                joinable.then(|| (game.created_at(), Arc::clone(shared)))
            })
            .min_by_key(|(created_at, _)| *created_at)
            .map(|(_, shared)| shared);

        let (shared, color) = match open {
            Some(shared) => {
                let color = shared.lock().add_player(player, now)?;
                (shared, color)
            }
            None => {
                let mut game = Match::new(time_control, None);
                let color = game.add_player(player, now)?;
                (self.insert(game), color)
            }
        };
        let id = shared.lock().id();
        debug!(match_id = %id, user_id = %user, %color, "seated in public match");
        self.player_matches.insert(user, id);
        Ok((shared, color))
    }

    /// Enter the pairing queue. Returns the 1-based queue position.
    pub fn join_queue(&mut self, player: Identity, time_control: TimeControl) -> GameResult<usize> {
        if self.is_seated(&player.id) {
            return Err(GameError::AlreadyInGame);
        }
        self.queue.join(player, time_control)
    }

    pub fn leave_queue(&mut self, user: &UserId) -> bool {
        self.queue.remove(user)
    }

    /// Pair the queue of `time_control` two at a time, oldest entries first.
    /// The earlier arrival takes white.
    pub fn try_match(&mut self, time_control: TimeControl, now: Instant) -> Vec<Pairing> {
        let mut formed = Vec::new();
        while let Some((first, second)) = self.queue.pop_pair(time_control) {
            let white = first.identity.id.clone();
            let black = second.identity.id.clone();

            let mut game = Match::new(time_control, None);
            if game.add_player(first.identity, now).is_err()
                || game.add_player(second.identity, now).is_err()
            {
                continue;
            }
            let id = game.id();
            info!(match_id = %id, white = %white, black = %black, %time_control, "paired from queue");
            let shared = self.insert(game);
            self.player_matches.insert(white.clone(), id);
            self.player_matches.insert(black.clone(), id);
            formed.push(Pairing {
                game: shared,
                white,
                black,
            });
        }
        formed
    }

    /// Take `user` out of every queue and out of its seat. A match left with
    /// no players is discarded. Returns the match the user was seated in.
    pub fn remove_player(&mut self, user: &UserId) -> Option<SharedMatch> {
        self.queue.remove(user);
        let id = self.player_matches.remove(user)?;
        let shared = self.get(&id)?;
        let now_empty = {
            let mut game = shared.lock();
            game.remove_player(user);
            game.is_empty()
        };
        if now_empty {
            self.discard(&id);
        }
        Some(shared)
    }

    /// Drop a match with all of its mappings and stop its clock.
    pub fn discard(&mut self, id: &MatchId) {
        let Some(shared) = self.matches.remove(id) else {
            return;
        };
        self.codes.retain(|_, match_id| match_id != id);
        self.player_matches.retain(|_, match_id| match_id != id);
        shared.lock().retire();
        debug!(match_id = %id, "match discarded");
    }

    fn ensure_free(&self, user: &UserId) -> GameResult<()> {
        if self.is_seated(user) {
            return Err(GameError::AlreadyInGame);
        }
        if self.queue.contains(user) {
            return Err(GameError::AlreadyQueued);
        }
        Ok(())
    }

    fn insert(&mut self, game: Match) -> SharedMatch {
        let id = game.id();
        let shared = Arc::new(Mutex::new(game));
        self.matches.insert(id, Arc::clone(&shared));
        shared
    }
}
