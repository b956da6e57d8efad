//! FIFO pairing queues, one per time control.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::time_control::TimeControl;
use crate::errors::{GameError, GameResult};
use crate::session::identity::{Identity, UserId};

/// A player waiting for an opponent.
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub identity: Identity,
    pub time_control: TimeControl,
    /// When the player joined the queue.
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PairingQueue {
    queues: HashMap<TimeControl, VecDeque<QueuedPlayer>>,
}

impl PairingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a player to the back of its time control's queue. Returns the
    /// 1-based position. A player may wait in only one queue at a time.
    pub fn join(&mut self, identity: Identity, time_control: TimeControl) -> GameResult<usize> {
        if self.contains(&identity.id) {
            return Err(GameError::AlreadyQueued);
        }
        let queue = self.queues.entry(time_control).or_default();
        debug!(user_id = %identity.id, %time_control, "queued");
        queue.push_back(QueuedPlayer {
            identity,
            time_control,
            queued_at: Utc::now(),
        });
        Ok(queue.len())
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.position_of(user).is_some()
    }

    /// Queue and 1-based position of a waiting player.
    pub fn position_of(&self, user: &UserId) -> Option<(TimeControl, usize)> {
        self.queues.iter().find_map(|(tc, queue)| {
            queue
                .iter()
                .position(|entry| &entry.identity.id == user)
                .map(|idx| (*tc, idx + 1))
        })
    }

    /// Remove a player from every queue. Returns whether anything was removed.
    pub fn remove(&mut self, user: &UserId) -> bool {
        let mut removed = false;
        for queue in self.queues.values_mut() {
            let before = queue.len();
            queue.retain(|entry| &entry.identity.id != user);
            removed |= queue.len() != before;
        }
        removed
    }

    /// Take the two longest-waiting players of a time control, if there are two.
    pub fn pop_pair(&mut self, time_control: TimeControl) -> Option<(QueuedPlayer, QueuedPlayer)> {
        let queue = self.queues.get_mut(&time_control)?;
        if queue.len() < 2 {
            return None;
        }
        let first = queue.pop_front()?;
        let second = queue.pop_front()?;
        Some((first, second))
    }

    pub fn len(&self, time_control: TimeControl) -> usize {
        self.queues.get(&time_control).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str) -> Identity {
        Identity {
            id: UserId::new(name),
            username: name.to_owned(),
            rating: 600,
        }
    }

    #[test]
    fn players_pair_in_arrival_order() {
        let mut queue = PairingQueue::new();
        assert_eq!(queue.join(identity("first"), TimeControl::Blitz), Ok(1));
        assert_eq!(queue.join(identity("second"), TimeControl::Blitz), Ok(2));
        assert_eq!(queue.join(identity("third"), TimeControl::Blitz), Ok(3));

        let (a, b) = queue.pop_pair(TimeControl::Blitz).expect("two players should pair");
        assert_eq!(a.identity.username, "first");
        assert_eq!(b.identity.username, "second");
        assert!(queue.pop_pair(TimeControl::Blitz).is_none());
        assert_eq!(queue.position_of(&UserId::new("third")), Some((TimeControl::Blitz, 1)));
    }

    #[test]
    fn time_controls_do_not_mix() {
        let mut queue = PairingQueue::new();
        queue.join(identity("fast"), TimeControl::Bullet).expect("join");
        queue.join(identity("slow"), TimeControl::Classical).expect("join");
        assert!(queue.pop_pair(TimeControl::Bullet).is_none());
        assert_eq!(queue.len(TimeControl::Classical), 1);
    }

    #[test]
    fn a_player_waits_in_one_queue_only() {
        let mut queue = PairingQueue::new();
        queue.join(identity("eager"), TimeControl::Rapid).expect("join");
        assert_eq!(
            queue.join(identity("eager"), TimeControl::Bullet),
            Err(GameError::AlreadyQueued)
        );
        assert!(queue.remove(&UserId::new("eager")));
        assert!(!queue.remove(&UserId::new("eager")));
        assert!(queue.is_empty());
    }
}
