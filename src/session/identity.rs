//! Identity provider seam.
//!
//! Credential checks and the rating store live outside the match server. The
//! server only needs to turn a connection token into an [`Identity`], read
//! profiles, record finished games and list the leaderboard.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stable identifier of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is sitting in a seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: UserId,
    #[serde(rename = "name")]
    pub username: String,
    pub rating: i32,
}

/// Stored account statistics. Also the row type of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(skip)]
    pub id: UserId,
    pub username: String,
    pub elo_rating: i32,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl Profile {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            username: self.username.clone(),
            rating: self.elo_rating,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    Win,
    Loss,
    Draw,
}

impl GameOutcome {
    /// Actual score used by the Elo formula.
    pub fn score(self) -> f64 {
        match self {
            GameOutcome::Win => 1.0,
            GameOutcome::Loss => 0.0,
            GameOutcome::Draw => 0.5,
        }
    }
}

pub trait IdentityProvider: Send + Sync {
    /// Resolve a connection token, or `None` when it is not acceptable.
    fn verify(&self, token: &str) -> Option<Identity>;

    fn identity(&self, user: &UserId) -> Option<Profile>;

    /// Store one finished game for `user`.
    fn record_result(&self, user: &UserId, outcome: GameOutcome, rating_delta: i32);

    /// Highest-rated profiles first.
    fn top_leaderboard(&self, limit: usize) -> Vec<Profile>;
}

/// In-process provider: a valid token is its own username.
///
/// Tokens of 3 to 20 ASCII letters, digits or underscores are accepted and a
/// profile is created on first sight.
#[derive(Debug)]
pub struct MemoryIdentityProvider {
    starting_rating: i32,
    profiles: RwLock<HashMap<UserId, Profile>>,
}

impl MemoryIdentityProvider {
    pub fn new(starting_rating: i32) -> Self {
        Self {
            starting_rating,
            profiles: RwLock::new(HashMap::new()),
        }
    }

    fn is_acceptable_username(token: &str) -> bool {
        (3..=20).contains(&token.len())
            && token
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    fn verify(&self, token: &str) -> Option<Identity> {
        let token = token.trim();
        if !Self::is_acceptable_username(token) {
            return None;
        }
        let id = UserId::new(token.to_ascii_lowercase());
        let mut profiles = self.profiles.write();
        let profile = profiles.entry(id.clone()).or_insert_with(|| {
            debug!(user_id = %id, "creating profile");
            Profile {
                id: id.clone(),
                username: token.to_owned(),
                elo_rating: self.starting_rating,
                games_played: 0,
                wins: 0,
                losses: 0,
                draws: 0,
            }
        });
        Some(profile.identity())
    }

    fn identity(&self, user: &UserId) -> Option<Profile> {
        self.profiles.read().get(user).cloned()
    }

    fn record_result(&self, user: &UserId, outcome: GameOutcome, rating_delta: i32) {
        let mut profiles = self.profiles.write();
        let Some(profile) = profiles.get_mut(user) else {
            return;
        };
        profile.games_played += 1;
        match outcome {
            GameOutcome::Win => profile.wins += 1,
            GameOutcome::Loss => profile.losses += 1,
            GameOutcome::Draw => profile.draws += 1,
        }
        profile.elo_rating = profile.elo_rating.saturating_add(rating_delta);
    }

    fn top_leaderboard(&self, limit: usize) -> Vec<Profile> {
        let mut rows: Vec<Profile> = self.profiles.read().values().cloned().collect();
        rows.sort_by(|a, b| {
            b.elo_rating
                .cmp(&a.elo_rating)
                .then_with(|| a.username.cmp(&b.username))
        });
        rows.truncate(limit);
        rows
    }
}
